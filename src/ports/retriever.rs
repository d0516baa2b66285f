//! Retrieval port: similarity search over the task corpus.

use std::future::Future;
use std::pin::Pin;

use super::BoxError;
use crate::corpus::TaskDocument;

/// Boxed future returned by [`Retriever::build_index`].
pub type IndexFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Box<dyn RetrievalIndex>, BoxError>> + Send + 'a>>;

/// Boxed future returned by [`RetrievalIndex::retrieve`].
pub type RetrievalFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<TaskDocument>, BoxError>> + Send + 'a>>;

/// A searchable index built over one session's corpus.
pub trait RetrievalIndex: Send + Sync {
    /// Returns up to `k` documents most relevant to `query`, best first.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend query fails.
    fn retrieve<'a>(&'a self, query: &'a str, k: usize) -> RetrievalFuture<'a>;
}

/// Builds retrieval indexes.
pub trait Retriever: Send + Sync {
    /// Indexes `documents` for this session.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot build the index.
    fn build_index<'a>(&'a self, documents: &'a [TaskDocument]) -> IndexFuture<'a>;
}
