//! datarun Core Domain Types
//!
//! This crate contains pure domain types with no dependencies on:
//! - Network/HTTP
//! - Storage
//! - Runtime specifics
//!
//! All types here describe tasks, operations and runners as the dispatch
//! backend sees them.

pub mod error;
pub mod ids;
pub mod operation;
pub mod runner;
pub mod status;
pub mod task;

// Re-export commonly used types
pub use error::CoreError;
pub use ids::{RunnerId, TaskId};
pub use operation::{
    ExportFormat, ExportReportParams, FetchRawDataParams, FilterDataParams, MlAnalysisParams,
    Operation, OperationCode,
};
pub use runner::{CapabilitySet, RunnerInfo};
pub use status::{RunnerLiveness, TaskStatus};
pub use task::{Task, TaskOutcome};
