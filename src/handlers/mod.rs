// src/handlers/mod.rs

//! Job handler contract and built-in handlers.
//!
//! The engine talks to a [`HandlerRegistry`] instead of a global type map.
//! This keeps handler wiring explicit (constructed once, passed into the
//! engine) and makes test isolation with fake handlers trivial.
//!
//! - [`command`] runs a shell command (the default job type for the CLI).
//! - [`approval`] bridges a job into the approval subsystem and suspends
//!   until a human decision arrives.

pub mod approval;
pub mod command;
pub mod context;
pub mod registry;

pub use approval::ApprovalHandler;
pub use command::CommandHandler;
pub use context::JobContext;
pub use registry::{HandlerRegistry, JobHandler};
