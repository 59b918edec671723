//! datarun CLI - Command line interface for the dispatch server.

use clap::{Parser, Subcommand};
use serde_json::Value;

use datarun_api::{ResultResponse, RunnerSummary, TaskSummary};
use datarun_client::{ClientConfig, DashboardClient};
use datarun_core::{OperationCode, TaskId};

/// datarun CLI - Dispatch server dashboard
#[derive(Parser)]
#[command(name = "datarun")]
#[command(about = "CLI for the datarun dispatch server", long_about = None)]
struct Cli {
    /// Server address
    #[arg(short = 'u', long, env = "DATARUN_API_URL", default_value = "http://localhost:8000")]
    api_url: String,

    /// Shared api key for task creation
    #[arg(short = 'k', long, env = "DATARUN_API_KEY")]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new task
    Submit {
        /// Operation code (100, 200, 300, 400) or name (e.g. fetch-raw-data)
        operation: String,

        /// Params JSON object
        #[arg(short, long, default_value = "{}")]
        params: String,
    },

    /// List all tasks
    List,

    /// Show the result of a task
    Result {
        /// Task ID
        id: String,
    },

    /// List registered runners
    Runners,

    /// Check server health
    Health,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = ClientConfig::new(cli.api_url);
    config.api_key = cli.api_key;
    let client = DashboardClient::new(&config)?;

    match cli.command {
        Commands::Submit { operation, params } => {
            let code = parse_operation(&operation)?;
            let params: Value = serde_json::from_str(&params)?;
            let task_id = client.submit_task(code, params).await?;
            println!("Task created: {task_id}");
        }
        Commands::List => {
            let tasks = client.list_tasks().await?;
            print_tasks(&tasks);
        }
        Commands::Result { id } => {
            let result = client.get_result(&TaskId::new(id)).await?;
            print_result(&result)?;
        }
        Commands::Runners => {
            let runners = client.list_runners().await?;
            print_runners(&runners);
        }
        Commands::Health => {
            if client.health().await? {
                println!("Server is healthy");
            } else {
                return Err("server reported unhealthy".into());
            }
        }
    }

    Ok(())
}

/// Accept either the numeric code or its name.
fn parse_operation(input: &str) -> Result<OperationCode, Box<dyn std::error::Error>> {
    if let Ok(code) = input.parse::<i64>() {
        return Ok(OperationCode::try_from(code)?);
    }
    OperationCode::ALL
        .into_iter()
        .find(|code| code.name() == input)
        .ok_or_else(|| format!("unknown operation: {input}").into())
}

fn print_tasks(tasks: &[TaskSummary]) {
    println!("Tasks ({}):", tasks.len());
    println!(
        "{:<36}  {:<16}  {:<10}  {:<20}  {}",
        "ID", "OPERATION", "STATUS", "CREATED", "RUNNER"
    );
    println!("{}", "-".repeat(100));

    for task in tasks {
        println!(
            "{:<36}  {:<16}  {:<10}  {:<20}  {}",
            task.task_id,
            task.operation_code.name(),
            task.status,
            format_timestamp(&task.created_at),
            task.assigned_to.as_deref().unwrap_or("-")
        );
    }
}

fn print_result(result: &ResultResponse) -> Result<(), serde_json::Error> {
    println!("  ID:         {}", result.task_id);
    println!("  Status:     {}", result.status);
    println!("  Runner:     {}", result.runner_id.as_deref().unwrap_or("-"));

    if let Some(message) = &result.message {
        println!("  {message}");
    }
    if let Some(error) = &result.error {
        println!("  Error:      {error}");
    }
    if let Some(data) = &result.result_data {
        println!("  Result:");
        println!("{}", serde_json::to_string_pretty(data)?);
    }
    Ok(())
}

fn print_runners(runners: &[RunnerSummary]) {
    println!("Runners ({}):", runners.len());
    println!(
        "{:<36}  {:<8}  {:<20}  {:<20}  {}",
        "ID", "STATUS", "CAPABILITIES", "LAST HEARTBEAT", "TASK"
    );
    println!("{}", "-".repeat(100));

    for runner in runners {
        let caps: Vec<String> = runner.capabilities.iter().map(|c| c.to_string()).collect();
        println!(
            "{:<36}  {:<8}  {:<20}  {:<20}  {}",
            runner.runner_id,
            runner.status,
            caps.join(","),
            format_timestamp(&runner.last_heartbeat),
            runner.current_task.as_deref().unwrap_or("-")
        );
    }
}

fn format_timestamp(ts: &chrono::DateTime<chrono::Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}
