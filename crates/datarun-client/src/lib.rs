//! Client library for the datarun dispatch server.
//!
//! Provides a dashboard client (task submission and inspection) and a runner
//! client (registration, polling and result reporting) over HTTP.

pub mod dashboard;
pub mod error;
pub mod http;
pub mod runner;

pub use dashboard::DashboardClient;
pub use error::ClientError;
pub use http::{ClientConfig, HttpClient};
pub use runner::RunnerClient;
