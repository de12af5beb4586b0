//! # Archivum
//!
//! A local-first import engine for personal data archives.
//!
//! Archivum turns heterogeneous platform exports (ChatGPT conversation
//! dumps, Facebook archives, plain Markdown trees) into one normalized,
//! queryable corpus: content units in SQLite, binary media in a
//! content-addressed file store, and typed links between units.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────────┐   ┌─────────────┐
//! │   Sources    │──▶│  Import job    │──▶│   SQLite     │
//! │ zip/json/dir │   │ detect→parse→ │   │ units+links │
//! └──────────────┘   │ store→link    │   └──────┬──────┘
//!                    └───────┬───────┘          │
//!                            ▼                  ▼
//!                    ┌──────────────┐    ┌──────────────┐
//!                    │ Media store   │    │  CLI (arv)   │
//!                    │ sha256 shards │    │ jobs/links/… │
//!                    └──────────────┘    └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! arv init                              # create database
//! arv import ~/exports/chatgpt.zip      # run a staged import
//! arv import ~/notes --dry-run          # preview without writing
//! arv jobs                              # list recent import jobs
//! arv links "content://chatgpt/conversation/<id>"
//! arv stats                             # archive overview
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`detect`] | Source-type detection and zip extraction |
//! | [`parser`] | Parser trait and ordered registry |
//! | [`parser_chatgpt`] | ChatGPT export parser |
//! | [`parser_facebook`] | Facebook export parser |
//! | [`parser_markdown`] | Markdown/plain-text parser |
//! | [`manifest`] | Pointer-resolution manifest for opaque media refs |
//! | [`store`] | Content-addressed media store |
//! | [`import`] | Staged import-job orchestrator |
//! | [`jobs`] | Durable job records |
//! | [`links`] | Typed link graph |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod config;
pub mod db;
pub mod detect;
pub mod embedding;
pub mod hash;
pub mod import;
pub mod jobs;
pub mod links;
pub mod manifest;
pub mod migrate;
pub mod models;
pub mod parser;
pub mod parser_chatgpt;
pub mod parser_facebook;
pub mod parser_markdown;
pub mod progress;
pub mod stats;
pub mod store;
pub mod text;
