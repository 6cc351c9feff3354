//! HTTP gateway for repository ingestion and streamed, retrieval-grounded chat.

mod error;
mod handlers;
mod middleware;
mod router;
mod server;
#[cfg(test)]
mod testing;

pub use error::GatewayError;
pub use server::{Assistant, GatewayOptions, GatewayServer};
