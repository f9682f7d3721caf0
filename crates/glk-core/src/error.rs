use thiserror::Error;

/// Store-level failure a repository can surface in addition to opaque
/// `anyhow::Error`. Kept narrow on purpose: only the two outcomes a service
/// needs to branch on (a named unique-constraint hit, or "try again") get a
/// variant; everything else stays a plain `anyhow::Error` and becomes
/// `CoreError::Unavailable` at the service boundary.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StoreError {
    /// `true` when this violation is the named constraint, so a service can
    /// translate a specific collision (the active-plan partial index, a
    /// notification/webhook idempotency key) without swallowing unrelated
    /// integrity errors.
    pub fn is_unique_violation(&self, constraint: &str) -> bool {
        matches!(self, StoreError::UniqueViolation { constraint: c } if c == constraint)
    }
}

/// Tagged domain error taxonomy. The transport shell maps each variant to
/// an HTTP status; the core never raises bare `anyhow::Error` or
/// `sqlx::Error` across a service boundary.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid source: {0}")]
    InvalidSource(String),

    #[error("plan not found: {0}")]
    PlanNotFound(String),

    #[error("reading plan not found: {0}")]
    ReadingPlanNotFound(String),

    #[error("notification not found: {0}")]
    NotificationNotFound(String),

    #[error("plan conflict: {0}")]
    PlanConflict(String),

    #[error("context mismatch: {0}")]
    ContextMismatch(String),

    #[error("set order violation: {0}")]
    SetOrderViolation(String),

    #[error("store integrity error: {0}")]
    StoreIntegrityError(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl CoreError {
    /// Coarse grouping used by the transport shell to pick a status family;
    /// exact codes live in `glk-daemon`.
    pub fn category(&self) -> &'static str {
        match self {
            CoreError::Validation(_) | CoreError::InvalidSource(_) => "bad_request",
            CoreError::PlanNotFound(_)
            | CoreError::ReadingPlanNotFound(_)
            | CoreError::NotificationNotFound(_) => "not_found",
            CoreError::PlanConflict(_) | CoreError::ContextMismatch(_) => "conflict",
            CoreError::SetOrderViolation(_) => "unprocessable",
            CoreError::StoreIntegrityError(_) | CoreError::Unavailable(_) => "server_error",
        }
    }
}
