//! Index domain - dense and sparse retrieval ports
//!
//! Both indexes are maintained side by side for every cached query and
//! fused by the hybrid retriever.

mod lexical;
mod semantic;

pub use lexical::{LexicalIndex, LexicalScore};
pub use semantic::{IndexMetadata, SemanticIndex};

#[cfg(test)]
pub use semantic::mock::MockSemanticIndex;
