pub mod ai_handlers;
pub mod file_handlers;
pub mod health_handlers;
pub mod stats_handlers;

use crate::errors::AppError;

/// Parse a numeric record id from a path segment.
pub(crate) fn parse_id(raw: &str) -> Result<i64, AppError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| AppError::validation(format!("`{}` is not a valid id", raw)))
}
