//! # codelens
//!
//! Model-assisted codebase analysis. A local directory or GitHub URL is
//! loaded, split into chunks, and each chunk is described by a language
//! model as JSON. Per-chunk results are merged per file and summarized into
//! a project overview written to `final_summary.json`.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌───────────┐
//! │ Loader      │──▶│  Pipeline     │──▶│  SQLite    │
//! │ dir / GitHub│   │ chunk+analyze │   │ store+cache│
//! └─────────────┘   └──────┬───────┘   └───────────┘
//!                          ▼
//!                  merge ▶ summarize ▶ final_summary.json
//!                          │
//!                ┌─────────┴─────────┐
//!                ▼                   ▼
//!           ┌──────────┐       ┌──────────┐
//!           │   CLI    │       │   HTTP   │
//!           └──────────┘       └──────────┘
//! ```
//!
//! The I/O-free parts (chunking, merging, the local summary) live in the
//! `codelens-core` crate.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`loader`] | Source file discovery and folder trees |
//! | [`github`] | GitHub URL parsing and shallow clones |
//! | [`analyzer`] | Language-model access and response parsing |
//! | [`summarize`] | Project overview strategies |
//! | [`pipeline`] | Run orchestration and caching |
//! | [`store`] | Files, chunks, and analysis results |
//! | [`cache`] | Response cache |
//! | [`server`] | HTTP API |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`error`] | Input error taxonomy |
//! | [`logging`] | Tracing subscriber setup |

pub mod analyzer;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod github;
pub mod loader;
pub mod logging;
pub mod migrate;
pub mod pipeline;
pub mod server;
pub mod store;
pub mod summarize;
