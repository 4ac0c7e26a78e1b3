//! # Briefwork
//!
//! AI-assisted legal document analysis for law-practice backends.
//!
//! Briefwork turns stored legal documents (contracts, letters, filings) into
//! structured analysis results: extracted clauses, risk assessments,
//! compliance findings, summaries, and question answers. Documents are
//! fetched from S3-compatible or local storage, text-extracted, prompted
//! against a completion API, and the parsed results persisted per
//! (document, analysis kind) in SQLite.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌───────────────┐
//! │   Storage   │──▶│   Pipeline    │──▶│    SQLite      │
//! │ S3 / local  │   │ extract →    │   │ documents +   │
//! └─────────────┘   │ prompt →     │   │ analysis slots│
//!                   │ parse        │   └──────┬────────┘
//!                   └──────┬───────┘          │
//!                          ▼                  ▼
//!                   ┌──────────┐       ┌──────────┐
//!                   │   CLI    │       │   HTTP   │
//!                   │ (briefd) │       │  (JSON)  │
//!                   └──────────┘       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! briefd init                                # create database
//! briefd serve                               # start HTTP server
//! briefd analyze contract.pdf --kind risk_assessment
//! briefd analyze brief.pdf --kind document_qa --question "Who is liable?"
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Pipeline and upstream error types |
//! | [`fetch`] | Document byte retrieval (S3 SigV4, local files) |
//! | [`extract`] | Text extraction from PDF / plain text |
//! | [`chunk`] | Fixed-budget text chunking |
//! | [`prompt`] | Per-kind prompt construction |
//! | [`completion`] | Completion API client with retry |
//! | [`parse`] | Tolerant model-output parsing |
//! | [`pipeline`] | End-to-end analysis orchestration |
//! | [`store`] | Document/analysis store abstraction |
//! | [`store_sqlite`] | SQLite connection and store implementation |
//! | [`server`] | JSON HTTP server |
//! | [`migrate`] | Schema migrations |

pub mod chunk;
pub mod completion;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod migrate;
pub mod models;
pub mod parse;
pub mod pipeline;
pub mod prompt;
pub mod server;
pub mod store;
pub mod store_sqlite;
