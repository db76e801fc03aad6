//! Shared wire types for the vellum agent/view IPC.
//!
//! This crate defines the protocol messages exchanged between the view
//! process and the agent process over a byte stream (Unix domain socket in
//! production, an in-memory duplex in tests). The protocol uses binary
//! framing with postcard encoding; subscriber-facing broadcast events are
//! plain JSON objects and live in [`events`].

#![warn(missing_docs)]

pub mod events;
pub mod ops;
pub mod protocol;
pub mod types;

pub use events::{BroadcastEvent, NotificationLevel};
pub use ops::{ContentNode, EditOperation};
pub use protocol::SyncProtocol;
pub use types::*;
