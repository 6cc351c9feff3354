//! Repository ingestion and retrieval-augmented answering.
//!
//! Files listed from a source host are filtered, fetched, summarized, and
//! embedded twice (summary and full content). Both records of a file are
//! written in one transaction. Questions are embedded, matched against the
//! SUMMARY vectors, and answered by a streamed completion grounded in the
//! retrieved context.

pub mod answer;
pub mod assistant;
pub mod embed;
pub mod error;
pub mod filter;
pub mod in_memory;
pub mod indexer;
pub mod pg_store;
pub mod retriever;
pub mod source;
pub mod store;
pub mod summarize;

pub use error::{ErrorKind, IndexError, Result};
