//! # Plumbing
//!
//! A content addressable object store in the style of git's plumbing layer.
//! Blobs, trees and commits are stored zlib compressed under the SHA-1 of their
//! canonical `<kind> <length>\0<payload>` form, and whole directories can be
//! turned into a single deterministic tree id.

/// Reading and writing typed objects through a store.
pub mod codec;
/// Commit payload construction.
pub mod commit;
/// zlib compression of stored objects.
pub mod compression;
/// Turning a directory on disk into a tree of stored objects.
pub mod directory;
pub mod error;
/// Object kinds and the canonical serialized form.
pub mod object;
/// SHA-1 based binary object identifier.
pub mod object_id;
/// Content addressible store API using the [`object_id::ObjectId`].
pub mod object_store;
/// The control directory holding the store and configuration.
pub mod repository;
/// The binary tree format.
pub mod tree;

pub use error::{Error, Result};
