//! In-memory BM25 lexical index
//!
//! Scores use `idf(t) = ln(1 + (N - df + 0.5) / (df + 0.5))` and the usual
//! saturation `tf * (k1 + 1) / (tf + k1 * (1 - b + b * len / avg_len))`.
//! Document frequencies and the total length are maintained on every
//! insert and removal, so a search never rescans the corpus statistics.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde::Deserialize;

use super::synonyms::{default_synonyms, SynonymTable};
use crate::domain::index::{LexicalIndex, LexicalScore};
use crate::domain::DomainError;
use crate::infrastructure::text::tokenize;

pub const DEFAULT_K1: f32 = 1.2;
pub const DEFAULT_B: f32 = 0.75;

/// BM25 parameters
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Bm25Config {
    #[serde(default = "default_k1")]
    pub k1: f32,
    #[serde(default = "default_b")]
    pub b: f32,
    /// Augment query tokens with their synonyms before scoring
    #[serde(default = "default_expand_synonyms")]
    pub expand_synonyms: bool,
}

fn default_k1() -> f32 {
    DEFAULT_K1
}

fn default_b() -> f32 {
    DEFAULT_B
}

fn default_expand_synonyms() -> bool {
    true
}

impl Default for Bm25Config {
    fn default() -> Self {
        Self {
            k1: DEFAULT_K1,
            b: DEFAULT_B,
            expand_synonyms: true,
        }
    }
}

impl Bm25Config {
    pub fn validated(self) -> Result<Self, DomainError> {
        if !self.k1.is_finite() || self.k1 < 0.0 {
            return Err(DomainError::configuration(format!(
                "BM25 k1 must be a non-negative number, got {}",
                self.k1
            )));
        }

        if !(0.0..=1.0).contains(&self.b) {
            return Err(DomainError::configuration(format!(
                "BM25 b must be within [0, 1], got {}",
                self.b
            )));
        }

        Ok(self)
    }
}

#[derive(Debug)]
struct Document {
    term_freqs: HashMap<String, u32>,
    length: usize,
}

#[derive(Debug, Default)]
struct Corpus {
    documents: HashMap<String, Document>,
    doc_freqs: HashMap<String, usize>,
    total_length: usize,
}

impl Corpus {
    fn insert(&mut self, key: &str, tokens: Vec<String>) {
        self.remove(key);

        let length = tokens.len();
        let mut term_freqs: HashMap<String, u32> = HashMap::new();

        for token in tokens {
            *term_freqs.entry(token).or_insert(0) += 1;
        }

        for term in term_freqs.keys() {
            *self.doc_freqs.entry(term.clone()).or_insert(0) += 1;
        }

        self.total_length += length;
        self.documents
            .insert(key.to_string(), Document { term_freqs, length });
    }

    fn remove(&mut self, key: &str) -> bool {
        let Some(document) = self.documents.remove(key) else {
            return false;
        };

        for term in document.term_freqs.keys() {
            if let Some(df) = self.doc_freqs.get_mut(term) {
                *df -= 1;

                if *df == 0 {
                    self.doc_freqs.remove(term);
                }
            }
        }

        self.total_length -= document.length;
        true
    }

    fn idf(&self, term: &str) -> f32 {
        let n = self.documents.len() as f32;
        let df = self.doc_freqs.get(term).copied().unwrap_or(0) as f32;

        (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
    }

    fn avg_length(&self) -> f32 {
        if self.documents.is_empty() || self.total_length == 0 {
            return 1.0;
        }

        self.total_length as f32 / self.documents.len() as f32
    }
}

/// BM25 ranking over the stored query texts
#[derive(Debug)]
pub struct Bm25Index {
    config: Bm25Config,
    synonyms: SynonymTable,
    corpus: RwLock<Corpus>,
}

impl Default for Bm25Index {
    fn default() -> Self {
        Self::new(Bm25Config::default(), default_synonyms())
    }
}

impl Bm25Index {
    pub fn new(config: Bm25Config, synonyms: SynonymTable) -> Self {
        Self {
            config,
            synonyms,
            corpus: RwLock::new(Corpus::default()),
        }
    }

    pub fn config(&self) -> &Bm25Config {
        &self.config
    }

    fn query_terms(&self, query: &str) -> Vec<String> {
        let tokens = tokenize(query);

        if self.config.expand_synonyms {
            self.synonyms.expand(&tokens)
        } else {
            let mut terms = tokens;
            terms.sort();
            terms.dedup();
            terms
        }
    }

    fn score(&self, corpus: &Corpus, document: &Document, terms: &[(String, f32)]) -> f32 {
        let k1 = self.config.k1;
        let b = self.config.b;
        let norm = 1.0 - b + b * document.length as f32 / corpus.avg_length();

        terms
            .iter()
            .filter_map(|(term, idf)| {
                document.term_freqs.get(term).map(|tf| {
                    let tf = *tf as f32;
                    idf * tf * (k1 + 1.0) / (tf + k1 * norm)
                })
            })
            .sum()
    }
}

#[async_trait]
impl LexicalIndex for Bm25Index {
    async fn index_document(&self, key: &str, text: &str) -> Result<(), DomainError> {
        let mut corpus = self.corpus.write().map_err(|e| {
            DomainError::index(format!("Failed to acquire write lock: {}", e))
        })?;

        corpus.insert(key, tokenize(text));
        Ok(())
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<LexicalScore>, DomainError> {
        let corpus = self.corpus.read().map_err(|e| {
            DomainError::index(format!("Failed to acquire read lock: {}", e))
        })?;

        if limit == 0 || corpus.documents.is_empty() {
            return Ok(Vec::new());
        }

        let terms: Vec<(String, f32)> = self
            .query_terms(query)
            .into_iter()
            .filter(|term| corpus.doc_freqs.contains_key(term))
            .map(|term| {
                let idf = corpus.idf(&term);
                (term, idf)
            })
            .collect();

        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let mut results: Vec<LexicalScore> = corpus
            .documents
            .iter()
            .map(|(key, document)| LexicalScore::new(key.clone(), self.score(&corpus, document, &terms)))
            .filter(|scored| scored.score > 0.0)
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.key.cmp(&b.key))
        });
        results.truncate(limit);

        Ok(results)
    }

    async fn remove_document(&self, key: &str) -> Result<bool, DomainError> {
        let mut corpus = self.corpus.write().map_err(|e| {
            DomainError::index(format!("Failed to acquire write lock: {}", e))
        })?;

        Ok(corpus.remove(key))
    }

    async fn clear(&self) -> Result<(), DomainError> {
        let mut corpus = self.corpus.write().map_err(|e| {
            DomainError::index(format!("Failed to acquire write lock: {}", e))
        })?;

        *corpus = Corpus::default();
        Ok(())
    }

    async fn len(&self) -> Result<usize, DomainError> {
        let corpus = self.corpus.read().map_err(|e| {
            DomainError::index(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(corpus.documents.len())
    }
}
