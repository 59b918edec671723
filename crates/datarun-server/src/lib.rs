//! datarun Dispatch Server Library
//!
//! This crate provides the dispatch backend: the task store, the dispatch
//! queue, the runner registry, assignment and result collection, and the
//! HTTP API that exposes them.

pub mod auth;
pub mod collector;
pub mod config;
pub mod coordinator;
pub mod http;
pub mod metrics;
pub mod queue;
pub mod registry;
pub mod state;
pub mod store;
pub mod sweeper;

pub use collector::ResultCollector;
pub use config::Config;
pub use coordinator::{AssignmentCoordinator, SweepReport};
pub use queue::DispatchQueue;
pub use registry::RunnerRegistry;
pub use state::AppState;
pub use store::TaskStore;
