//! Candidate retrieval over the dense and lexical indexes

mod hybrid;

pub use hybrid::{
    HybridCandidate, HybridConfig, HybridRetriever, DEFAULT_ALPHA, DEFAULT_SPARSE_CANDIDATES,
    DEFAULT_TOP_K,
};
