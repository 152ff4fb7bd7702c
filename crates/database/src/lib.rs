//! # Recipe Database Crate
//!
//! The storage side of the recipe service: a Postgres pool, the recipe
//! repository, and the pieces every repository call goes through.
//!
//! ## Architectural Principles
//!
//! - **Classify once:** a raw `sqlx::Error` is turned into a [`ClassifiedError`]
//!   with a [`Reason`] where it leaves a repository method, and is never
//!   reclassified afterwards.
//! - **One transaction per unit of work:** [`TransactionRunner`] commits or rolls
//!   back exactly once and returns the work's error unchanged.
//! - **No global state:** the [`JunctionRegistry`] is built at start-up and
//!   injected into the repository.
//!
//! ## Public API
//!
//! - `connect` / `run_migrations`: pool construction and schema setup.
//! - `RecipeRepository`: recipe, step, review and favourite queries.
//! - `compose`: range-aware WHERE-clause folding over a `FilterMap`.
//! - `DbError`: the error type returned from this crate.

// Declare the modules that constitute this crate.
pub mod connection;
pub mod error;
pub mod junction;
pub mod query;
pub mod repository;
pub mod transaction;

// Re-export the key components to create a clean, public-facing API.
pub use connection::{connect, run_migrations};
pub use error::{ClassifiedError, ClassifyExt, DbError, Reason, classify};
pub use junction::{JunctionLink, JunctionRegistry};
pub use query::{Combinator, FilterMap, FilterParams, Predicate, SqlValue, compose};
pub use repository::{RecipeFilter, RecipeRepository};
pub use transaction::{IsolationLevel, TransactionRunner, TxHandle, TxOptions, TxSource};
pub use sqlx::PgPool;
