//! Node model for arbor.
//!
//! Describes the records the resolver populates:
//! - [`NodeType`]: declared fields plus explicit resolve/post declarations
//! - [`Node`] / [`FieldValue`]: instances and the values their fields hold
//! - [`ResolveField`] / [`PostField`]: how a field gets its value
//! - [`Mapper`]: raw fetch result to child node(s)
//! - [`classify`]: validated, cached field plan per type
//!
//! # Usage
//!
//! ```ignore
//! let comment = NodeType::builder("Comment").field("id").field("text").build();
//!
//! let task = NodeType::builder("Task")
//!   .field("id")
//!   .field_with_default("comments", json!([]))
//!   .field("comment_count")
//!   .resolve(
//!     ResolveField::with_loader::<CommentLoader, _, _>("comments", |node, loader| {
//!       let id = node.value("id").cloned().unwrap_or_default();
//!       async move { Ok(loader.load(id).await?) }
//!     })
//!     .map(Mapper::to(comment)),
//!   )
//!   .post(PostField::new("comment_count", |node| {
//!     Ok::<_, FieldError>(json!(node.children("comments").len()))
//!   }))
//!   .build();
//! ```

mod classify;
mod error;
mod field;
mod mapper;
mod node;
mod node_type;
mod value;

pub use classify::{FieldKind, FieldPlan, PostDescriptor, ResolveDescriptor, classify};
pub use error::{FieldError, SchemaError};
pub use field::{PostField, ResolveField, ResolveFuture};
pub use mapper::Mapper;
pub use node::Node;
pub use node_type::{FieldDecl, NodeType, NodeTypeBuilder, TypeKey};
pub use value::FieldValue;
