//! Operation codes and their typed parameter schemas.
//!
//! Clients submit an integer operation code plus a free-form JSON object.
//! The object is validated against the schema of the named operation: every
//! field is optional and unknown keys are kept, but a known key carrying the
//! wrong JSON type is rejected before the task is stored.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::CoreError;

/// Integer operation codes understood by runners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum OperationCode {
    /// 100: pull raw records from a source.
    FetchRawData,
    /// 200: filter a record set.
    FilterData,
    /// 300: run an analysis model over a dataset.
    MlAnalysis,
    /// 400: render a report.
    ExportReport,
}

impl OperationCode {
    /// All known codes, in ascending order.
    pub const ALL: [OperationCode; 4] = [
        OperationCode::FetchRawData,
        OperationCode::FilterData,
        OperationCode::MlAnalysis,
        OperationCode::ExportReport,
    ];

    /// Numeric wire value.
    pub fn as_i64(&self) -> i64 {
        match self {
            Self::FetchRawData => 100,
            Self::FilterData => 200,
            Self::MlAnalysis => 300,
            Self::ExportReport => 400,
        }
    }

    /// Human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::FetchRawData => "fetch-raw-data",
            Self::FilterData => "filter-data",
            Self::MlAnalysis => "ml-analysis",
            Self::ExportReport => "export-report",
        }
    }
}

impl TryFrom<i64> for OperationCode {
    type Error = CoreError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            100 => Ok(Self::FetchRawData),
            200 => Ok(Self::FilterData),
            300 => Ok(Self::MlAnalysis),
            400 => Ok(Self::ExportReport),
            other => Err(CoreError::Validation(format!(
                "unknown operation code {other}"
            ))),
        }
    }
}

impl From<OperationCode> for i64 {
    fn from(code: OperationCode) -> Self {
        code.as_i64()
    }
}

impl fmt::Display for OperationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.as_i64(), self.name())
    }
}

/// Parameters for `fetch-raw-data` (100).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchRawDataParams {
    pub source: Option<String>,
    pub limit: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Parameters for `filter-data` (200).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterDataParams {
    pub records: Option<Vec<Value>>,
    pub field: Option<String>,
    pub equals: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Parameters for `ml-analysis` (300).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MlAnalysisParams {
    pub dataset: Option<String>,
    pub values: Option<Vec<f64>>,
    pub model: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Output format for `export-report`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

/// Parameters for `export-report` (400).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportReportParams {
    pub format: Option<ExportFormat>,
    pub rows: Option<Vec<Map<String, Value>>>,
    pub title: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A fully-typed operation: the code together with its parsed parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    FetchRawData(FetchRawDataParams),
    FilterData(FilterDataParams),
    MlAnalysis(MlAnalysisParams),
    ExportReport(ExportReportParams),
}

impl Operation {
    /// Parse `params` against the schema of `code`.
    ///
    /// `params` must be a JSON object.
    pub fn parse(code: OperationCode, params: &Value) -> Result<Self, CoreError> {
        if !params.is_object() {
            return Err(CoreError::Validation(
                "params must be a JSON object".to_string(),
            ));
        }

        let invalid = |e: serde_json::Error| {
            CoreError::Validation(format!("invalid params for {}: {}", code.name(), e))
        };

        let op = match code {
            OperationCode::FetchRawData => {
                Self::FetchRawData(serde_json::from_value(params.clone()).map_err(invalid)?)
            }
            OperationCode::FilterData => {
                Self::FilterData(serde_json::from_value(params.clone()).map_err(invalid)?)
            }
            OperationCode::MlAnalysis => {
                Self::MlAnalysis(serde_json::from_value(params.clone()).map_err(invalid)?)
            }
            OperationCode::ExportReport => {
                Self::ExportReport(serde_json::from_value(params.clone()).map_err(invalid)?)
            }
        };
        Ok(op)
    }

    /// Parse a raw integer code and params.
    pub fn from_raw(code: i64, params: &Value) -> Result<Self, CoreError> {
        Self::parse(OperationCode::try_from(code)?, params)
    }

    /// The operation code of this operation.
    pub fn code(&self) -> OperationCode {
        match self {
            Self::FetchRawData(_) => OperationCode::FetchRawData,
            Self::FilterData(_) => OperationCode::FilterData,
            Self::MlAnalysis(_) => OperationCode::MlAnalysis,
            Self::ExportReport(_) => OperationCode::ExportReport,
        }
    }
}
