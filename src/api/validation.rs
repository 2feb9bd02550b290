//! Request-shape checks applied before any store or crypto work, so a bad
//! request fails with 400 instead of surfacing a deeper internal error.

use super::error::ApiError;
use super::models::CreateJobRequest;

pub fn validate_job_submission(req: &CreateJobRequest) -> Result<(), ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::InvalidInput("name is required".into()));
    }
    if req.job_command.trim().is_empty() {
        return Err(ApiError::InvalidInput("job_command is required".into()));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStreamSelector {
    Stdout,
    Stderr,
    Combined,
}

pub fn parse_log_stream(value: Option<&str>) -> Result<LogStreamSelector, ApiError> {
    match value.unwrap_or("combined") {
        "stdout" => Ok(LogStreamSelector::Stdout),
        "stderr" => Ok(LogStreamSelector::Stderr),
        "combined" => Ok(LogStreamSelector::Combined),
        other => Err(ApiError::InvalidInput(format!("invalid stream value: {other:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SourceType;
    use std::collections::HashMap;

    fn sample_request() -> CreateJobRequest {
        CreateJobRequest {
            name: "build".into(),
            description: String::new(),
            source_type: SourceType::None,
            source_url: None,
            source_ref: None,
            source_path: None,
            runner_image: None,
            code_dir: None,
            job_dir: None,
            job_command: "echo hi".into(),
            job_env_vars: HashMap::new(),
            timeout_seconds: None,
            priority: 0,
            queue_name: None,
            overlays: Vec::new(),
            allow_secret_overrides: false,
        }
    }

    #[test]
    fn rejects_blank_name() {
        let mut req = sample_request();
        req.name = "  ".into();
        assert!(validate_job_submission(&req).is_err());
    }

    #[test]
    fn rejects_blank_command() {
        let mut req = sample_request();
        req.job_command = "".into();
        assert!(validate_job_submission(&req).is_err());
    }

    #[test]
    fn accepts_well_formed_request() {
        assert!(validate_job_submission(&sample_request()).is_ok());
    }

    #[test]
    fn default_stream_is_combined() {
        assert_eq!(parse_log_stream(None).unwrap(), LogStreamSelector::Combined);
    }

    #[test]
    fn rejects_unknown_stream() {
        assert!(parse_log_stream(Some("garbage")).is_err());
    }
}
