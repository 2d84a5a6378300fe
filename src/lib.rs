//! # Bucketward
//!
//! Authorization core for an object-storage dashboard: principals, groups,
//! resource permissions, bucket visibility and an audit trail, usable both as
//! a standalone HTTP service and as a library.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! bucketward = { version = "0.0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use bucketward::auth::Argon2Hasher;
//! use bucketward::config::ServerConfig;
//! use bucketward::server::{AppState, create_router};
//! use bucketward::store::{SqliteStore, Store};
//!
//! let config = ServerConfig::default();
//! let store = SqliteStore::new(config.db_path()).unwrap();
//! store.initialize().unwrap();
//!
//! let state = Arc::new(AppState::new(
//!     Arc::new(store),
//!     config,
//!     Arc::new(Argon2Hasher::new()),
//! ));
//! let router = create_router(state);
//! // Serve with axum...
//! ```
//!
//! Object-storage proxies call [`authz::Authorizer::ensure_bucket_allowed`]
//! before every bucket operation and [`authz::Authorizer::filter_buckets`]
//! on bucket listings.
//!
//! ## Feature Flags
//!
//! - `cli` (default): builds the `bucketward` binary. Disable with
//!   `default-features = false`.

pub mod admin;
pub mod audit;
pub mod auth;
pub mod authz;
pub mod config;
pub mod error;
pub mod server;
pub mod store;
pub mod types;
