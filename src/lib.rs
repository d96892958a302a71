#![deny(missing_docs)]

//! Core library for the medindex biomedical literature indexer.

/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Structured logging and tracing setup.
pub mod logging;
/// Run counters.
pub mod metrics;
/// Document indexing pipeline.
pub mod processing;
/// Qdrant vector store integration.
pub mod qdrant;
/// Vector store contract and in-memory implementation.
pub mod store;
