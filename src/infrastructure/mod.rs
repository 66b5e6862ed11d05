//! Infrastructure layer - Adapters and cache services

pub mod embedding;
pub mod events;
pub mod index;
pub mod logging;
pub mod observability;
pub mod retrieval;
pub mod services;
pub mod storage;

pub(crate) mod text;
