//! View-process core.
//!
//! The view process routes UI-originated commands to the agent and
//! correlates replies ([`CommandRouter`]), maintains a replica of the shared
//! document, fans state changes out to subscribed observers
//! ([`BroadcastChannel`]), and debounces persistence after bursts of edits
//! (the auto-save methods on [`ViewCore`]).

#![warn(missing_docs)]

pub mod broadcast;
pub mod config;
pub mod core;
pub mod router;
pub mod service;

pub use broadcast::{BroadcastChannel, Subscription};
pub use config::SyncConfig;
pub use router::{AgentSocket, CommandRouter, RoutedCommand};
pub use service::ViewService;

pub use crate::core::ViewCore;
