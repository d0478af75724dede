use crate::domain::entitlements::{CapacityExceeded, StandingIssue};
use crate::domain::sharing::AcceptanceError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{entity} not found")]
    NotFound { entity: &'static str },
    #[error("{0}")]
    Conflict(String),
    #[error("{message}")]
    Forbidden { code: &'static str, message: String },
    #[error("{0}")]
    CapacityExceeded(#[from] CapacityExceeded),
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("email delivery failed: {0}")]
    Email(String),
}

/// The caller-facing taxonomy; infrastructure failures collapse into `Internal`.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Forbidden,
    Validation,
    Internal,
}

impl AppError {
    pub fn not_found(entity: &'static str) -> Self {
        Self::NotFound { entity }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            code: "FORBIDDEN",
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Forbidden { .. } | Self::CapacityExceeded(_) => ErrorKind::Forbidden,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Io(_)
            | Self::Json(_)
            | Self::Sqlite(_)
            | Self::InvalidConfig(_)
            | Self::Email(_) => ErrorKind::Internal,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Forbidden { code, .. } => *code,
            Self::CapacityExceeded(_) => "PLAN_LIMIT",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::Validation(_) => "VALIDATION",
            _ => "INTERNAL",
        }
    }
}

impl From<StandingIssue> for AppError {
    fn from(issue: StandingIssue) -> Self {
        Self::Forbidden {
            code: issue.code(),
            message: issue.message(),
        }
    }
}

impl From<AcceptanceError> for AppError {
    fn from(error: AcceptanceError) -> Self {
        Self::forbidden(error.message())
    }
}

pub fn is_unique_violation(error: &rusqlite::Error) -> bool {
    matches!(error, rusqlite::Error::SqliteFailure(failure, _)
        if failure.code == rusqlite::ffi::ErrorCode::ConstraintViolation
            && failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entitlements::{PlanTier, ResourceKind};
    use crate::domain::models::SubscriptionStatus;

    #[test]
    fn capacity_exceeded_is_reported_as_forbidden() {
        let error = AppError::from(CapacityExceeded {
            tier: PlanTier::Free,
            resource: ResourceKind::Goals,
            limit: 3,
        });
        assert_eq!(error.kind(), ErrorKind::Forbidden);
        assert_eq!(error.code(), "PLAN_LIMIT");
        assert!(error.to_string().contains("FREE"));
        assert!(error.to_string().contains("goals"));
    }

    #[test]
    fn standing_issue_keeps_its_code() {
        let error = AppError::from(StandingIssue::Subscription(SubscriptionStatus::PastDue));
        assert_eq!(error.kind(), ErrorKind::Forbidden);
        assert_eq!(error.code(), "SUBSCRIPTION_ISSUE");
    }

    #[test]
    fn unique_violation_is_detected() {
        let connection = rusqlite::Connection::open_in_memory().expect("in-memory db");
        connection
            .execute_batch("CREATE TABLE t (v TEXT UNIQUE); INSERT INTO t VALUES ('a');")
            .expect("schema");
        let error = connection
            .execute("INSERT INTO t VALUES ('a')", [])
            .expect_err("duplicate insert must fail");
        assert!(is_unique_violation(&error));

        let missing = connection
            .execute("INSERT INTO nope VALUES ('a')", [])
            .expect_err("missing table");
        assert!(!is_unique_violation(&missing));
    }
}
