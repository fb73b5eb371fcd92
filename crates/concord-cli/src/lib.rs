//! Shared plumbing for the `cw-run` and `cw-cert` binaries: logging setup
//! and the PDU client used to talk to a running agent or master.

pub mod args;
pub mod client;
pub mod exit;

pub use args::LogLevel;
pub use client::PduClient;
pub use exit::ExitKind;
