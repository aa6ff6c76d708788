//! Caller-facing store services.
//!
//! # Responsibility
//! - Expose `insert`, `insert_many` and `init_db` over managed session scopes.
//! - Keep callers decoupled from session and registry plumbing.

pub mod bootstrap;
pub mod store;
