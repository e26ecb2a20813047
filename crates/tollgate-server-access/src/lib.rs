// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Access resolution for Tollgate.
//!
//! This crate answers "may this principal perform this action on this
//! resource?" against grant state read through a [`GrantStore`].
//!
//! # Architecture
//!
//! - `store` - The read-only grant store trait and an in-memory implementation
//! - `repository` - SQLite-backed grant store
//! - `cache` - Read-through cache for identity lookups
//! - `aggregate` - Collects statements from every grant source
//! - `collaboration` - Content owner and co-author overlay
//! - `engine` - Deny-overrides evaluation
//! - `simulate`, `enumerate`, `bulk` - Traces, effective permissions and batches
//!
//! # Example
//!
//! ```ignore
//! use tollgate_server_access::{AccessEngine, SqliteGrantStore};
//! use tollgate_access_core::{Principal, RequestContext};
//!
//! let engine = AccessEngine::new(SqliteGrantStore::new(pool));
//! let decision = engine
//!     .evaluate(&principal, "resource:Read", "resource/123", &RequestContext::new())
//!     .await;
//! ```

pub mod aggregate;
pub mod bulk;
pub mod cache;
pub mod collaboration;
pub mod engine;
pub mod enumerate;
pub mod error;
pub mod pool;
pub mod repository;
pub mod simulate;
pub mod store;
pub mod testing;

pub use aggregate::{Aggregator, CollectedStatement, GrantSet, GrantSource};
pub use bulk::BulkCheck;
pub use cache::CachedGrantStore;
pub use engine::{decide, AccessEngine, EngineSettings};
pub use enumerate::EnumerationScope;
pub use error::{Result, StoreError};
pub use pool::create_pool;
pub use repository::SqliteGrantStore;
pub use store::{GrantStore, InMemoryGrantStore};

// Re-export core types for convenience
pub use tollgate_access_core::*;
