//! Built-in execution of the four data operations.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::debug;

use datarun_core::{
    CapabilitySet, CoreError, ExportFormat, ExportReportParams, FetchRawDataParams,
    FilterDataParams, MlAnalysisParams, Operation, OperationCode,
};

/// Rows returned by fetch-raw-data when `limit` is absent.
pub const DEFAULT_FETCH_LIMIT: u64 = 10;

/// Upper bound on generated rows.
pub const MAX_FETCH_LIMIT: u64 = 10_000;

/// Errors that can occur while executing a task.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Unsupported operation: {0}")]
    Unsupported(OperationCode),

    #[error("Invalid params: {0}")]
    InvalidParams(#[from] CoreError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Something that can run operations.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Operations this executor accepts.
    fn capabilities(&self) -> CapabilitySet;

    /// Run one operation and produce its result document.
    async fn execute(&self, operation: Operation) -> Result<Value, ExecutorError>;
}

/// In-process executor for every known operation.
#[derive(Debug, Clone)]
pub struct BuiltinExecutor {
    capabilities: CapabilitySet,
}

impl BuiltinExecutor {
    pub fn new(capabilities: CapabilitySet) -> Self {
        Self { capabilities }
    }
}

impl Default for BuiltinExecutor {
    fn default() -> Self {
        Self::new(CapabilitySet::all())
    }
}

#[async_trait]
impl Executor for BuiltinExecutor {
    fn capabilities(&self) -> CapabilitySet {
        self.capabilities.clone()
    }

    async fn execute(&self, operation: Operation) -> Result<Value, ExecutorError> {
        let code = operation.code();
        if !self.capabilities.supports(code) {
            return Err(ExecutorError::Unsupported(code));
        }
        debug!(operation = code.name(), "Executing operation");

        match operation {
            Operation::FetchRawData(params) => Ok(fetch_raw_data(&params)),
            Operation::FilterData(params) => Ok(filter_data(params)),
            Operation::MlAnalysis(params) => ml_analysis(&params),
            Operation::ExportReport(params) => export_report(params),
        }
    }
}

fn fetch_raw_data(params: &FetchRawDataParams) -> Value {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_FETCH_LIMIT)
        .min(MAX_FETCH_LIMIT);
    let source = params.source.clone().unwrap_or_else(|| "default".to_string());

    let rows: Vec<Value> = (1..=limit)
        .map(|id| json!({ "id": id, "value": (id * 37 % 101) as f64 / 10.0 }))
        .collect();

    json!({ "source": source, "rows": rows })
}

fn filter_data(params: FilterDataParams) -> Value {
    let records = params.records.unwrap_or_default();

    let matched: Vec<Value> = match &params.field {
        None => records,
        Some(field) => records
            .into_iter()
            .filter(|record| match (record.get(field), &params.equals) {
                (Some(value), Some(expected)) => value == expected,
                // No `equals` keeps every record that has the field.
                (Some(_), None) => true,
                (None, _) => false,
            })
            .collect(),
    };

    json!({ "matched": matched.len(), "records": matched })
}

fn ml_analysis(params: &MlAnalysisParams) -> Result<Value, ExecutorError> {
    let values = params.values.as_deref().unwrap_or_default();
    if values.is_empty() {
        return Err(ExecutorError::InvalidInput("no values to analyze".to_string()));
    }

    let count = values.len() as f64;
    // Scale before summing so large inputs do not overflow the accumulator.
    let mean = values.iter().map(|v| v / count).sum::<f64>();
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let variance = values.iter().map(|v| (v - mean).powi(2) / count).sum::<f64>();
    let stddev = variance.sqrt();

    // Position of the mean within the observed range.
    let score = if max > min {
        ((mean - min) / (max - min)).clamp(0.0, 1.0)
    } else {
        1.0
    };

    if ![mean, stddev, score].iter().all(|v| v.is_finite()) {
        return Err(ExecutorError::InvalidInput(
            "values out of range for analysis".to_string(),
        ));
    }

    Ok(json!({
        "dataset": params.dataset,
        "model": params.model.as_deref().unwrap_or("baseline"),
        "count": values.len(),
        "mean": mean,
        "min": min,
        "max": max,
        "stddev": stddev,
        "score": score,
    }))
}

fn export_report(params: ExportReportParams) -> Result<Value, ExecutorError> {
    let format = params.format.unwrap_or_default();
    let rows = params.rows.unwrap_or_default();

    let content = match format {
        ExportFormat::Json => {
            let doc = json!({ "title": params.title, "rows": rows });
            serde_json::to_string_pretty(&doc)
                .map_err(|e| ExecutorError::InvalidInput(e.to_string()))?
        }
        ExportFormat::Csv => render_csv(&rows),
    };

    Ok(json!({
        "format": format,
        "title": params.title,
        "row_count": rows.len(),
        "content": content,
    }))
}

/// Columns are the union of row keys in first-seen order.
fn render_csv(rows: &[Map<String, Value>]) -> String {
    let mut columns: Vec<&str> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !columns.contains(&key.as_str()) {
                columns.push(key);
            }
        }
    }

    let mut out = String::new();
    out.push_str(
        &columns
            .iter()
            .map(|c| csv_escape(c))
            .collect::<Vec<_>>()
            .join(","),
    );
    out.push('\n');

    for row in rows {
        let line = columns
            .iter()
            .map(|c| csv_escape(&cell_text(row.get(*c))))
            .collect::<Vec<_>>()
            .join(",");
        out.push_str(&line);
        out.push('\n');
    }
    out
}

fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn csv_escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
