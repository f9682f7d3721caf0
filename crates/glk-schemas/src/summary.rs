use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::enums::Trend;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub id: Uuid,
    pub user_id: Uuid,
    pub summary_date: NaiveDate,
    pub total_sets: i32,
    pub done_sets: i32,
    pub completion_rate: f64,
    pub reading_completed: bool,
    pub streak_days: i32,
    pub trend: Trend,
    pub computed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklySummary {
    pub id: Uuid,
    pub user_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub week_avg_completion_rate: f64,
    pub streak_days: i32,
    pub trend: Trend,
    pub computed_at: DateTime<Utc>,
}
