//! Agent-process core.
//!
//! The agent owns the authoritative document registers, talks to the
//! generation backend, and executes UI commands: generate, normalize, apply
//! as one batch, persist when a path is bound, replicate to every attached
//! view session. Failures become structured [`CommandOutcome`] results;
//! nothing unwinds across the process boundary.
//!
//! [`CommandOutcome`]: vellum_proto::CommandOutcome

#![warn(missing_docs)]

pub mod core;
pub mod generate;
pub mod service;

pub use crate::core::{AgentCore, AgentSocket};
pub use generate::{
	DocumentContext, GenerateError, GenerateRequest, GeneratedEdits, Generator, StreamChunk,
};
pub use service::AgentService;
