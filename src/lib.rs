//! blogcast - turn a blog post into an avatar video
//!
//! The crate sequences three vendor gateways: a summarization provider turns
//! blog text into a narration script, an avatar video provider renders the
//! script, and a status endpoint is polled until the video URL is known. The
//! gateways are exposed as an HTTP proxy for the browser form, and the
//! [`WorkflowController`] drives the same steps from a client.

pub mod cli;
pub mod client;
pub mod config;
pub mod gateway;
pub mod output;
pub mod server;
pub mod utils;
pub mod wizard;
pub mod workflow;

pub use cli::{Cli, Commands, OutputFormat};
pub use client::ApiClient;
pub use config::Config;
pub use gateway::{GatewayError, Gateways, JobStatusReport};
pub use workflow::{Job, JobState, PollPolicy, Script, WorkflowController, WorkflowError, WorkflowState};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;
