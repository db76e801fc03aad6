//! Process wiring for the vellum sync core.
//!
//! The `vellumd` binary runs either role:
//! * `vellumd agent` owns the documents and the generation backend,
//!   serving IPC on a Unix domain socket.
//! * `vellumd view` connects to the agent, routes commands, mirrors the
//!   document, and prints observer events as JSON lines.

#![warn(missing_docs)]

pub mod generator;
pub mod ipc;

pub use generator::CommandGenerator;
