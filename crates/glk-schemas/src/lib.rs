//! Domain entities, enums, and event payload shapes shared across the
//! workspace. Records here are immutable by convention — constructed once
//! by a repository read or a service's "new row" helper, never mutated in
//! place.

pub mod enums;
pub mod exercise;
pub mod notification;
pub mod outbox;
pub mod reading;
pub mod summary;
pub mod user;
pub mod webhook;

pub use enums::{
    NotificationKind, NotificationStatus, OutboxStatus, PlanSource, PlanStatus,
    ReadingLogStatus, SetStatus, Trend, UserStatus,
};
pub use exercise::{ExercisePlan, ExerciseSession, ExerciseSetState, SeedSession, SEED_TEMPLATE};
pub use notification::{Notification, NotificationPayload, NotificationProviderCode};
pub use outbox::{NewOutboxEvent, OutboxEvent};
pub use reading::{ReadingLog, ReadingPlan};
pub use summary::{DailySummary, WeeklySummary};
pub use user::{User, UserProfile, DEFAULT_TIMEZONE};
pub use webhook::{NewWebhookEvent, WebhookEvent};
