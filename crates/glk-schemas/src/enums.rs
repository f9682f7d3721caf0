use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a [`crate::User`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Active,
    Inactive,
    Suspended,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Inactive => "inactive",
            UserStatus::Suspended => "suspended",
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(UserStatus::Active),
            "inactive" => Ok(UserStatus::Inactive),
            "suspended" => Ok(UserStatus::Suspended),
            other => Err(format!("unknown user status: {other}")),
        }
    }
}

/// Lifecycle status of an [`crate::ExercisePlan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Draft,
    Active,
    Done,
    Canceled,
}

impl PlanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStatus::Draft => "draft",
            PlanStatus::Active => "active",
            PlanStatus::Done => "done",
            PlanStatus::Canceled => "canceled",
        }
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PlanStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(PlanStatus::Draft),
            "active" => Ok(PlanStatus::Active),
            "done" => Ok(PlanStatus::Done),
            "canceled" => Ok(PlanStatus::Canceled),
            other => Err(format!("unknown plan status: {other}")),
        }
    }
}

/// Per-set progression status within an [`crate::ExerciseSetState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetStatus {
    Pending,
    InProgress,
    Done,
    Skipped,
    Failed,
}

impl SetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SetStatus::Pending => "pending",
            SetStatus::InProgress => "in_progress",
            SetStatus::Done => "done",
            SetStatus::Skipped => "skipped",
            SetStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SetStatus::Done | SetStatus::Skipped | SetStatus::Failed)
    }
}

impl fmt::Display for SetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SetStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SetStatus::Pending),
            "in_progress" => Ok(SetStatus::InProgress),
            "done" => Ok(SetStatus::Done),
            "skipped" => Ok(SetStatus::Skipped),
            "failed" => Ok(SetStatus::Failed),
            other => Err(format!("unknown set status: {other}")),
        }
    }
}

/// Terminal outcome of a [`crate::ReadingLog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingLogStatus {
    InProgress,
    Done,
    Skipped,
    Abandoned,
}

impl ReadingLogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadingLogStatus::InProgress => "in_progress",
            ReadingLogStatus::Done => "done",
            ReadingLogStatus::Skipped => "skipped",
            ReadingLogStatus::Abandoned => "abandoned",
        }
    }

    /// True for statuses that satisfy a day's completion-or-skip gate
    /// (used by the reading-reminder retry check and the streak walk).
    pub fn counts_as_settled(&self) -> bool {
        matches!(self, ReadingLogStatus::Done | ReadingLogStatus::Skipped)
    }
}

impl fmt::Display for ReadingLogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReadingLogStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(ReadingLogStatus::InProgress),
            "done" => Ok(ReadingLogStatus::Done),
            "skipped" => Ok(ReadingLogStatus::Skipped),
            "abandoned" => Ok(ReadingLogStatus::Abandoned),
            other => Err(format!("unknown reading log status: {other}")),
        }
    }
}

/// Delivery lifecycle of a [`crate::Notification`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Scheduled,
    Sent,
    Acknowledged,
    Complete,
    Failed,
    RetryScheduled,
    ManualReview,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Scheduled => "scheduled",
            NotificationStatus::Sent => "sent",
            NotificationStatus::Acknowledged => "acknowledged",
            NotificationStatus::Complete => "complete",
            NotificationStatus::Failed => "failed",
            NotificationStatus::RetryScheduled => "retry_scheduled",
            NotificationStatus::ManualReview => "manual_review",
        }
    }
}

impl fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for NotificationStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(NotificationStatus::Scheduled),
            "sent" => Ok(NotificationStatus::Sent),
            "acknowledged" => Ok(NotificationStatus::Acknowledged),
            "complete" => Ok(NotificationStatus::Complete),
            "failed" => Ok(NotificationStatus::Failed),
            "retry_scheduled" => Ok(NotificationStatus::RetryScheduled),
            "manual_review" => Ok(NotificationStatus::ManualReview),
            other => Err(format!("unknown notification status: {other}")),
        }
    }
}

/// Kind discriminator for a [`crate::Notification`]'s payload shape.
///
/// `kind` is stored as plain text on the row (the schema does not constrain
/// it to an enum type, since downstream providers may add kinds this core
/// does not originate), but every kind this core itself creates is one of
/// these four reserved values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    ExerciseStart,
    ExerciseNextSet,
    ReadingReminder,
    ReadingReminderRetry,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::ExerciseStart => "EXERCISE_START",
            NotificationKind::ExerciseNextSet => "EXERCISE_NEXT_SET",
            NotificationKind::ReadingReminder => "READING_REMINDER",
            NotificationKind::ReadingReminderRetry => "READING_REMINDER_RETRY",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for NotificationKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EXERCISE_START" => Ok(NotificationKind::ExerciseStart),
            "EXERCISE_NEXT_SET" => Ok(NotificationKind::ExerciseNextSet),
            "READING_REMINDER" => Ok(NotificationKind::ReadingReminder),
            "READING_REMINDER_RETRY" => Ok(NotificationKind::ReadingReminderRetry),
            other => Err(format!("unknown notification kind: {other}")),
        }
    }
}

/// Outbox delivery lifecycle (C3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxStatus {
    Pending,
    InFlight,
    Completed,
    Failed,
}

impl OutboxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxStatus::Pending => "pending",
            OutboxStatus::InFlight => "in_flight",
            OutboxStatus::Completed => "completed",
            OutboxStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for OutboxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OutboxStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OutboxStatus::Pending),
            "in_flight" => Ok(OutboxStatus::InFlight),
            "completed" => Ok(OutboxStatus::Completed),
            "failed" => Ok(OutboxStatus::Failed),
            other => Err(format!("unknown outbox status: {other}")),
        }
    }
}

/// Provenance of an [`crate::ExercisePlan`]'s seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanSource {
    Rule,
    Llm,
}

impl PlanSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanSource::Rule => "rule",
            PlanSource::Llm => "llm",
        }
    }
}

impl fmt::Display for PlanSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PlanSource {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rule" => Ok(PlanSource::Rule),
            "llm" => Ok(PlanSource::Llm),
            other => Err(format!("unknown plan source: {other}")),
        }
    }
}

/// Day-over-day or week-over-week movement used by the summary aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Up,
    Down,
    Flat,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Up => "up",
            Trend::Down => "down",
            Trend::Flat => "flat",
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
