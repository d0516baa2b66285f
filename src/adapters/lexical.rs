//! In-process lexical retrieval: TF-IDF cosine similarity over word tokens.
//!
//! Offline fallback for the embedding retriever; selected with
//! `retrieval.backend: lexical`.

use std::collections::{HashMap, HashSet};

use crate::corpus::TaskDocument;
use crate::ports::{IndexFuture, RetrievalFuture, RetrievalIndex, Retriever};

/// Builds [`LexicalIndex`]es. Needs no external service.
pub struct LexicalRetriever;

impl Retriever for LexicalRetriever {
    fn build_index<'a>(&'a self, documents: &'a [TaskDocument]) -> IndexFuture<'a> {
        let index: Box<dyn RetrievalIndex> = Box::new(LexicalIndex::new(documents));
        Box::pin(async move { Ok(index) })
    }
}

/// Term-weighted vectors for one corpus.
pub struct LexicalIndex {
    documents: Vec<TaskDocument>,
    vectors: Vec<HashMap<String, f64>>,
    idf: HashMap<String, f64>,
}

impl LexicalIndex {
    /// Indexes `documents`.
    #[must_use]
    pub fn new(documents: &[TaskDocument]) -> Self {
        let counts: Vec<HashMap<String, f64>> =
            documents.iter().map(|d| term_counts(&d.text)).collect();

        let mut df: HashMap<&str, f64> = HashMap::new();
        for terms in &counts {
            for term in terms.keys() {
                *df.entry(term.as_str()).or_insert(0.0) += 1.0;
            }
        }
        #[allow(clippy::cast_precision_loss)]
        let n = documents.len() as f64;
        let idf: HashMap<String, f64> = df
            .into_iter()
            .map(|(term, df)| (term.to_string(), ((n + 1.0) / (df + 1.0)).ln() + 1.0))
            .collect();

        let vectors = counts.into_iter().map(|terms| weigh(terms, &idf)).collect();
        Self {
            documents: documents.to_vec(),
            vectors,
            idf,
        }
    }

    /// Up to `k` documents ranked against `query`, best first.
    #[must_use]
    pub fn rank(&self, query: &str, k: usize) -> Vec<TaskDocument> {
        let query = weigh(term_counts(query), &self.idf);
        let mut scored: Vec<(usize, f64)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, doc)| (i, cosine(&query, doc)))
            .collect();
        // Stable sort keeps corpus order among equal scores.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored
            .into_iter()
            .take(k)
            .map(|(i, _)| self.documents[i].clone())
            .collect()
    }
}

impl RetrievalIndex for LexicalIndex {
    fn retrieve<'a>(&'a self, query: &'a str, k: usize) -> RetrievalFuture<'a> {
        let hits = self.rank(query, k);
        Box::pin(async move { Ok(hits) })
    }
}

fn term_counts(text: &str) -> HashMap<String, f64> {
    let mut counts = HashMap::new();
    for term in tokens(text) {
        *counts.entry(term).or_insert(0.0) += 1.0;
    }
    counts
}

/// Lowercased alphanumeric runs of two or more characters. Snake-case names
/// contribute both the whole identifier and its parts.
fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
        .flat_map(|word| {
            let word = word.to_lowercase();
            let mut parts: HashSet<String> = word
                .split('_')
                .filter(|p| p.len() >= 2)
                .map(str::to_string)
                .collect();
            if word.len() >= 2 {
                parts.insert(word);
            }
            parts
        })
}

fn weigh(counts: HashMap<String, f64>, idf: &HashMap<String, f64>) -> HashMap<String, f64> {
    counts
        .into_iter()
        .filter_map(|(term, tf)| idf.get(&term).map(|w| (term, tf * w)))
        .collect()
}

fn cosine(a: &HashMap<String, f64>, b: &HashMap<String, f64>) -> f64 {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let dot: f64 = small
        .iter()
        .filter_map(|(t, x)| large.get(t).map(|y| x * y))
        .sum();
    let norm_a = a.values().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.values().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
