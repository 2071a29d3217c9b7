//! scholar: a multi-agent research assistant backend
//!
//! Papers are found on arXiv and PubMed, PDFs are chunked and embedded into
//! a vector store, and agents answer questions, chat, and write reports
//! over the indexed material. Everything is exposed through an Axum HTTP API
//! under `/api/v1`.

pub mod agents;
pub mod auth;
pub mod chunk;
pub mod commands;
pub mod config;
pub mod embed;
pub mod embedding_backend;
pub mod error;
pub mod llm;
pub mod meta;
pub mod papers;
pub mod parse;
pub mod rank;
pub mod server;
pub mod store;
