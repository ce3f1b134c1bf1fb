//! # Raggate
//!
//! A retrieval-augmented chat backend with role-based access control.
//!
//! Documents live in a corpus directory with one subdirectory per access
//! group. Ingestion chunks and embeds them into a SQLite-backed vector
//! index, tagging every record with its group. Chat requests retrieve
//! only records visible to the caller's role (their own group plus
//! `general`), fold in per-user conversation history, and generate an
//! answer with source provenance.
//!
//! The core pipeline types live in the `raggate-core` crate; this crate
//! provides the concrete storage, providers, HTTP API, and CLI.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | TOML configuration loading and validation |
//! | [`corpus`] | Corpus directory scanner |
//! | [`db`] | SQLite connection pool |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_index`] | SQLite vector index |
//! | [`users`] | User accounts and credential checking |
//! | [`embedding`] | Embedding providers (OpenAI-compatible) |
//! | [`generation`] | Answer generation (Groq / OpenAI chat completions) |
//! | [`ingest`] | Ingestion orchestration |
//! | [`server`] | HTTP API server |

pub mod config;
pub mod corpus;
pub mod db;
pub mod embedding;
pub mod generation;
pub mod ingest;
pub mod migrate;
pub mod server;
pub mod sqlite_index;
pub mod users;
