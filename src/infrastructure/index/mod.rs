//! Dense and lexical index implementations

mod bm25;
mod in_memory_semantic;
mod synonyms;

pub use bm25::{Bm25Config, Bm25Index, DEFAULT_B, DEFAULT_K1};
pub use in_memory_semantic::InMemorySemanticIndex;
pub use synonyms::{default_synonyms, SynonymTable};
