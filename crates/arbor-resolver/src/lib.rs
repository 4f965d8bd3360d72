//! Resolution engine for arbor.
//!
//! Takes root nodes whose fields need fetching and returns the fully
//! populated tree, fetching each distinct key at most once per call.
//!
//! # Architecture
//!
//! ```text
//! Resolver::resolve_all(roots)
//!   └── ScopeExecution (one per call, fresh Scope)
//!         ├── prepare: classify every reachable type, check loader bindings
//!         └── resolve_node (per node, joined with siblings)
//!               ├── resolve fields  -> BatchLoader::load -> Mapper
//!               ├── child subtrees  -> resolve_node ...
//!               └── post fields, in declaration order
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let resolver = Resolver::builder()
//!   .loader::<CommentLoader>()
//!   .loader_params("feedback", json!({ "private": true }))
//!   .loader::<FeedbackLoader>()
//!   .build();
//!
//! let tasks = resolver.resolve_all(tasks).await?;
//! ```

mod config;
mod error;
mod execution;
mod resolver;

pub use config::ResolverConfig;
pub use error::ResolveError;
pub use resolver::{Resolver, ResolverBuilder};

pub use arbor_loader as loader;
pub use arbor_schema as schema;
