//! kspy status: derive human-readable status for a traced object from its state table.
//!
//! Rules are pure functions of a [`kspy_store::ResourceStateTable`] producing [`Line`]s;
//! a [`DisplaySink`] turns each batch of lines into a frame.

#![forbid(unsafe_code)]

pub mod deployment;
pub mod line;
pub mod palette;
pub mod pods;
pub mod service;
pub mod session;
pub mod sink;

pub use deployment::deployment_lines;
pub use line::{Line, LineKind, Status};
pub use palette::Palette;
pub use service::service_lines;
pub use session::{Rule, TraceSession, UnknownRule};
pub use sink::{DisplaySink, MemorySink, TerminalSink};
