//! # Raggate Core
//!
//! Shared logic for Raggate, a role-gated retrieval-augmented chat
//! backend: data models, text chunking, the vector index abstraction,
//! role-based visibility scoping, per-user conversation memory, and the
//! ingestion and chat pipelines.
//!
//! This crate contains no tokio, sqlx, HTTP, or filesystem I/O. All
//! side-effecting collaborators (embedding model, vector store, language
//! model) are reached through traits; concrete implementations live in
//! the `raggate` app crate.

pub mod access;
pub mod chunk;
pub mod embedding;
pub mod generate;
pub mod index;
pub mod memory;
pub mod models;
pub mod pipeline;
