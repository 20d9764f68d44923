pub mod cli;
pub mod config;
pub mod git;
pub mod model;
pub mod workflow;

mod api;
mod flock;

pub use api::{GitMirror, GitMirrorBuilder};
pub use workflow::{MirrorReport, MirrorWorkflow, Phase, WorkflowError};
