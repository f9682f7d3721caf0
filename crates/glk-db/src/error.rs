//! Postgres error translation: detect a named unique constraint violation
//! (sqlstate `23505`) and let the caller fold it into a
//! `glk_core::StoreError::UniqueViolation` instead of an opaque failure.

use glk_core::StoreError;

/// `true` when `err` is a Postgres unique-violation on exactly `constraint`.
pub fn is_unique_constraint_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.code().as_deref() == Some("23505") && db_err.constraint() == Some(constraint)
        }
        _ => false,
    }
}

/// Translate a failed insert/update into a `StoreError`, naming `constraint`
/// as the one this call site cares about. Any other database error (a
/// different constraint, a connection failure) passes through as
/// `StoreError::Other` rather than being misreported as a violation it
/// isn't.
pub fn translate(err: sqlx::Error, constraint: &str) -> StoreError {
    if is_unique_constraint_violation(&err, constraint) {
        StoreError::UniqueViolation {
            constraint: constraint.to_string(),
        }
    } else {
        StoreError::Other(anyhow::Error::new(err))
    }
}
