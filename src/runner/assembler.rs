use serde::Serialize;
use serde_json::{json, Value};

use crate::error::PredictionError;
use crate::parser::{parse_plans, PlanDocument, PlanParseError};
use crate::worker::InvocationResult;

pub const STATUS_SUCCESS: &str = "success";
pub const STATUS_ERROR: &str = "error";

/// Plans recovered from a successful invocation, plus the records that were skipped
#[derive(Debug, Clone, PartialEq)]
pub struct PlanSet {
    pub plans: Vec<PlanDocument>,
    pub skipped: Vec<PlanParseError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    InvalidInput,
    WorkerUnavailable,
    WorkerFailed,
    WorkerTimeout,
    MalformedOutput,
    RateLimited,
}

impl ErrorKind {
    /// Message that is safe to show in hardened deployments
    pub fn public_message(self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "Validation failed",
            ErrorKind::WorkerUnavailable => "Prediction service unavailable",
            ErrorKind::WorkerFailed => "Prediction process failed",
            ErrorKind::WorkerTimeout => "Prediction process timed out",
            ErrorKind::MalformedOutput => "Error parsing prediction output",
            ErrorKind::RateLimited => "Too many requests from this client, please try again later",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub status: &'static str,
    pub plans: Vec<PlanDocument>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<PlanParseError>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: &'static str,
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Turn a worker outcome into plans or a typed error. Never retries.
pub fn assemble(invocation: InvocationResult, strict: bool) -> Result<PlanSet, PredictionError> {
    match invocation {
        InvocationResult::Success { raw_text } => {
            if raw_text.trim().is_empty() {
                return Err(PredictionError::MalformedOutput {
                    errors: Vec::new(),
                    raw_output: raw_text,
                });
            }

            let outcome = parse_plans(&raw_text);
            if outcome.plans.is_empty() || (strict && !outcome.is_clean()) {
                return Err(PredictionError::MalformedOutput {
                    errors: outcome.errors,
                    raw_output: raw_text,
                });
            }

            Ok(PlanSet {
                plans: outcome.plans,
                skipped: outcome.errors,
            })
        }
        InvocationResult::ProcessError {
            exit_code,
            stderr_text,
        } => Err(PredictionError::WorkerFailed {
            exit_code,
            stderr: stderr_text,
        }),
        InvocationResult::SpawnFailure { reason, not_found } => {
            Err(PredictionError::WorkerUnavailable { reason, not_found })
        }
        InvocationResult::TimedOut { after } => Err(PredictionError::WorkerTimeout(after)),
        InvocationResult::Cancelled => Err(PredictionError::Cancelled),
    }
}

impl PlanSet {
    pub fn to_response(&self, hardened: bool) -> SuccessResponse {
        let details = if hardened {
            self.skipped.iter().map(PlanParseError::redacted).collect()
        } else {
            self.skipped.clone()
        };
        SuccessResponse {
            status: STATUS_SUCCESS,
            plans: self.plans.clone(),
            details,
        }
    }
}

impl PredictionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PredictionError::InvalidInput(_) => ErrorKind::InvalidInput,
            PredictionError::RateLimited => ErrorKind::RateLimited,
            PredictionError::WorkerUnavailable { .. } => ErrorKind::WorkerUnavailable,
            PredictionError::WorkerFailed { .. } | PredictionError::Cancelled => {
                ErrorKind::WorkerFailed
            }
            PredictionError::WorkerTimeout(_) => ErrorKind::WorkerTimeout,
            PredictionError::MalformedOutput { .. } => ErrorKind::MalformedOutput,
        }
    }

    /// HTTP-equivalent status code
    pub fn status_code(&self) -> u16 {
        match self {
            PredictionError::InvalidInput(_) => 400,
            PredictionError::WorkerUnavailable {
                not_found: true, ..
            } => 404,
            PredictionError::RateLimited => 429,
            PredictionError::WorkerTimeout(_) => 504,
            PredictionError::WorkerUnavailable { .. }
            | PredictionError::WorkerFailed { .. }
            | PredictionError::Cancelled
            | PredictionError::MalformedOutput { .. } => 500,
        }
    }

    /// Build the error envelope. Hardened mode keeps only what the caller can act on.
    pub fn to_response(&self, hardened: bool) -> ErrorResponse {
        let kind = self.kind();

        if let PredictionError::InvalidInput(violations) = self {
            return ErrorResponse {
                status: STATUS_ERROR,
                kind,
                message: self.to_string(),
                details: Some(json!(violations)),
            };
        }

        if hardened {
            return ErrorResponse {
                status: STATUS_ERROR,
                kind,
                message: kind.public_message().to_string(),
                details: None,
            };
        }

        let details = match self {
            PredictionError::WorkerUnavailable { reason, .. } => Some(json!({ "reason": reason })),
            PredictionError::WorkerFailed { exit_code, stderr } => {
                Some(json!({ "exitCode": exit_code, "stderr": stderr }))
            }
            PredictionError::WorkerTimeout(after) => {
                Some(json!({ "timeoutMs": after.as_millis() as u64 }))
            }
            PredictionError::MalformedOutput { errors, raw_output } => {
                Some(json!({ "errors": errors, "rawOutput": raw_output }))
            }
            _ => None,
        };

        ErrorResponse {
            status: STATUS_ERROR,
            kind,
            message: self.to_string(),
            details,
        }
    }
}
