//! HTTP request handlers.

mod health;
mod results;
mod runners;
mod tasks;

pub use health::{health_check, metrics_handler, service_info};
pub use results::{get_result, submit_result};
pub use runners::{heartbeat, list_runners, poll_task, register_runner, start_task};
pub use tasks::{create_task, get_task, list_tasks};
