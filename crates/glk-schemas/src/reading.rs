use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::enums::ReadingLogStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingPlan {
    pub id: Uuid,
    pub user_id: Uuid,
    pub remind_time: NaiveTime,
    pub goal_minutes: i32,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingLog {
    pub id: Uuid,
    pub user_id: Uuid,
    pub reading_plan_id: Option<Uuid>,
    pub book_title: Option<String>,
    pub status: ReadingLogStatus,
    pub pages_read: Option<i32>,
    pub created_at: DateTime<Utc>,
}
