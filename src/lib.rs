//! Gavel - moderation record store.
//!
//! Bans, mutes, kicks, comments and player records persisted to SQLite,
//! PostgreSQL or MySQL, with a relationship-aware cache in front.
//!
//! ## Architecture
//!
//! - `record` - immutable records and their change-tracking mutable forms
//! - `database` - statement factories per dialect, backends, the controller
//! - `cache` - cache groups, their relatives, and the record cache
//! - `admin` - lookups and commits with context matching
//! - `config` - environment configuration
//! - `error` - error types

pub mod admin;
pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod record;

pub use admin::AdminManager;
pub use config::Config;
pub use error::{BuildError, StateError, StoreError};
