//! # Story Book
//!
//! Offline import tooling for a blog-style content site backed by a document
//! store.
//!
//! The site reads three collections: articles, categories and gallery
//! images. Story Book fills them from flat directories of JSON exports,
//! upserting every record by its business key so re-running an import is
//! always safe.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │  JSON files  │──▶│   Importer   │──▶│ Collections  │
//! │ *_suffix.json│   │ parse+upsert │   │ SQLite / mem │
//! └──────────────┘   └──────┬───────┘   └──────────────┘
//!                           ▼
//!                    ┌──────────────┐
//!                    │ ImportReport │
//!                    └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! sbook init                    # create database
//! sbook import categories       # load *_category.json
//! sbook import all              # categories, gallery, articles
//! sbook get category 3          # inspect a document
//! sbook stats
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and import targets |
//! | [`import`] | Discover, parse and upsert pipeline |
//! | [`store`] | `Collection` trait with SQLite and in-memory backends |
//! | [`models`] | Records, keys and stored documents |
//! | [`error`] | Import error taxonomy |
//! | [`retry`] | Whole-run retry when the store is unavailable |
//! | [`progress`] | Progress reporting on stderr |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod config;
pub mod db;
pub mod error;
pub mod get;
pub mod import;
pub mod migrate;
pub mod models;
pub mod progress;
pub mod retry;
pub mod sources;
pub mod stats;
pub mod store;
