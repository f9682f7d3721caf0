use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::enums::{PlanSource, PlanStatus, SetStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExercisePlan {
    pub id: Uuid,
    pub user_id: Uuid,
    pub target_date: NaiveDate,
    pub source: PlanSource,
    pub status: PlanStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseSession {
    pub id: Uuid,
    pub plan_id: Uuid,
    pub order_no: i32,
    pub exercise_name: String,
    pub body_part: Option<String>,
    pub target_sets: i32,
    pub target_reps: Option<i32>,
    pub target_weight_kg: Option<f64>,
    pub target_rest_sec: Option<i32>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseSetState {
    pub id: Uuid,
    pub session_id: Uuid,
    pub set_no: i32,
    pub status: SetStatus,
    pub performed_reps: Option<i32>,
    pub performed_weight_kg: Option<f64>,
    pub actual_rest_sec: Option<i32>,
    pub completed_at: Option<DateTime<Utc>>,
    pub skipped_at: Option<DateTime<Utc>>,
}

impl ExerciseSetState {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Seed session template materialized by `generate_plan`. Order matters:
/// the template's position becomes `order_no`.
pub struct SeedSession {
    pub exercise_name: &'static str,
    pub body_part: &'static str,
    pub target_sets: i32,
}

pub const SEED_TEMPLATE: &[SeedSession] = &[
    SeedSession { exercise_name: "Bench Press", body_part: "chest", target_sets: 3 },
    SeedSession { exercise_name: "Barbell Row", body_part: "back", target_sets: 3 },
    SeedSession { exercise_name: "Plank", body_part: "core", target_sets: 3 },
];
