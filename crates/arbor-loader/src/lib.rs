//! Scoped batch loading for arbor.
//!
//! This crate provides the pieces that turn "every node asks for record X"
//! into "one fetch per unique key per resolve call":
//! - [`BatchLoad`]: the batch-fetch function a user implements
//! - [`BatchLoader`]: per-key deduplication, single-flight and caching
//! - [`Loader`] / [`LoaderFactories`]: how loaders are built, with parameters
//!   and dependencies on other loaders
//! - [`Scope`]: the per-call registry holding one instance per loader
//!
//! # Usage
//!
//! ```ignore
//! let mut factories = LoaderFactories::new();
//! factories.register::<CommentLoader>();
//!
//! let scope = Scope::new("scope-1", Arc::new(factories));
//! let comments = scope.loader::<CommentLoader>()?;
//! let (a, b) = tokio::join!(comments.load(1), comments.load(2)); // one fetch
//! ```

mod batch;
mod error;
mod factory;
mod group;
mod scope;

pub use batch::{BatchLoad, BatchLoader};
pub use error::{DependencyError, LoadError};
pub use factory::{Loader, LoaderContext, LoaderDependency, LoaderFactories};
pub use group::{build_list, build_object};
pub use scope::{LoaderHandle, Scope};

// Re-exported so loader implementations need no direct dependency.
pub use async_trait::async_trait;
