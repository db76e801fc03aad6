//! Document state for the vellum synchronization core.
//!
//! The shared text buffer is modeled as an opaque ordered-text register
//! ([`TextStore`]): a linearizable character sequence editable by offset. In
//! production the register is backed by a collaboration library; inside each
//! process it is a rope ([`RopeStore`]). The register's cross-process
//! replication is the `ApplyOperations` event in `vellum-proto`, not this
//! crate's concern.

#![warn(missing_docs)]

pub mod document;
pub mod lines;
pub mod persist;
pub mod store;

pub use document::{DocError, Document, DocumentMap};
pub use lines::LineDocument;
pub use persist::save_document;
pub use store::{RopeStore, TextStore};
