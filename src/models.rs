use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rocket::FromForm;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub const DEFAULT_LOCATION_ICON: &str = "🏠";
pub const DEFAULT_LOCATION_COLOR: &str = "#3B82F6";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Location {
    pub id: String,
    pub owner_id: i64,
    pub name: String,
    pub icon: String,
    pub color: String,
    pub created_at: DateTime<Utc>,
}

/// Fields of a location as accepted by create; `icon` and `color` fall back to defaults.
#[derive(Debug, Clone, Default)]
pub struct NewLocation {
    pub id: String,
    pub name: String,
    pub icon: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct LocationChanges {
    pub name: String,
    pub icon: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    pub id: i64,
    pub owner_id: i64,
    pub location_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Project {
    pub id: i64,
    pub owner_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    // Free text in storage; only the API restricts it to ProjectStatus values.
    pub status: String,
    pub start_month: Option<i64>,
    pub start_year: Option<i64>,
    pub budget: Option<f64>,
    pub actual_cost: Option<f64>,
    pub estimated_days: Option<i64>,
    pub doer: String,
    pub image_filename: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    #[default]
    Planning,
    InProgress,
    Completed,
    OnHold,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Planning => "planning",
            ProjectStatus::InProgress => "in_progress",
            ProjectStatus::Completed => "completed",
            ProjectStatus::OnHold => "on_hold",
        }
    }
}

impl FromStr for ProjectStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "planning" => Ok(ProjectStatus::Planning),
            "in_progress" => Ok(ProjectStatus::InProgress),
            "completed" => Ok(ProjectStatus::Completed),
            "on_hold" => Ok(ProjectStatus::OnHold),
            _ => Err(AppError::Validation(format!(
                "status must be one of planning, in_progress, completed, on_hold (got '{}')",
                s
            ))),
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Doer {
    #[default]
    Me,
    Pro,
}

impl Doer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Doer::Me => "me",
            Doer::Pro => "pro",
        }
    }
}

impl FromStr for Doer {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "me" => Ok(Doer::Me),
            "pro" => Ok(Doer::Pro),
            _ => Err(AppError::Validation(format!(
                "doer must be one of me, pro (got '{}')",
                s
            ))),
        }
    }
}

/// The client-writable fields of a project. Create and update both write
/// every field; `image_filename` is only changed through image uploads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectInput {
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub status: ProjectStatus,
    pub start_month: Option<i64>,
    pub start_year: Option<i64>,
    pub budget: Option<f64>,
    pub actual_cost: Option<f64>,
    pub estimated_days: Option<i64>,
    pub doer: Doer,
}

impl ProjectInput {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }
}

/// All filters are ANDed; `None` means "don't filter".
#[derive(Debug, Clone, Default, PartialEq, FromForm)]
pub struct ProjectFilters {
    pub category: Option<String>,
    pub status: Option<String>,
    pub location: Option<String>,
    pub search: Option<String>,
}

impl ProjectFilters {
    /// Empty query values (`?status=`) behave as if the filter was absent.
    pub fn normalized(self) -> Self {
        fn keep(value: Option<String>) -> Option<String> {
            value.filter(|v| !v.trim().is_empty())
        }

        Self {
            category: keep(self.category),
            status: keep(self.status),
            location: keep(self.location),
            search: keep(self.search),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Photo {
    pub id: i64,
    pub project_id: i64,
    pub filename: String,
    pub original_name: String,
    pub caption: Option<String>,
    pub is_before_photo: bool,
    pub upload_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewPhoto {
    pub filename: String,
    pub original_name: String,
    pub caption: Option<String>,
    pub is_before_photo: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Note {
    pub id: i64,
    pub project_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsBucket {
    pub project_count: i64,
    pub total_budget: f64,
    pub total_spent: f64,
    pub total_estimated_days: i64,
}

impl StatsBucket {
    pub fn add(&mut self, other: &StatsBucket) {
        self.project_count += other.project_count;
        self.total_budget += other.total_budget;
        self.total_spent += other.total_spent;
        self.total_estimated_days += other.total_estimated_days;
    }
}

/// Dashboard numbers for one location. The top-level totals are always the
/// sum of the `completed` and `not_completed` buckets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationStats {
    pub completed: StatsBucket,
    pub not_completed: StatsBucket,
    pub project_count: i64,
    pub total_budget: f64,
    pub total_spent: f64,
    pub total_estimated_days: i64,
}

impl LocationStats {
    pub fn record(&mut self, completed: bool, bucket: &StatsBucket) {
        if completed {
            self.completed.add(bucket);
        } else {
            self.not_completed.add(bucket);
        }

        self.project_count += bucket.project_count;
        self.total_budget += bucket.total_budget;
        self.total_spent += bucket.total_spent;
        self.total_estimated_days += bucket.total_estimated_days;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_known_values_only() {
        assert_eq!(
            "in_progress".parse::<ProjectStatus>().unwrap(),
            ProjectStatus::InProgress
        );
        assert_eq!(ProjectStatus::OnHold.to_string(), "on_hold");
        assert!("done".parse::<ProjectStatus>().is_err());
        assert!("Completed".parse::<ProjectStatus>().is_err());
    }

    #[test]
    fn record_keeps_totals_equal_to_bucket_sum() {
        let mut stats = LocationStats::default();
        stats.record(
            true,
            &StatsBucket {
                project_count: 1,
                total_budget: 500.0,
                total_spent: 480.0,
                total_estimated_days: 3,
            },
        );
        stats.record(
            false,
            &StatsBucket {
                project_count: 1,
                total_budget: 1200.0,
                total_spent: 0.0,
                total_estimated_days: 10,
            },
        );

        assert_eq!(stats.project_count, 2);
        assert_eq!(
            stats.completed.project_count + stats.not_completed.project_count,
            stats.project_count
        );
        assert_eq!(stats.total_budget, 1700.0);
        assert_eq!(stats.total_spent, 480.0);
        assert_eq!(stats.total_estimated_days, 13);
    }

    #[test]
    fn stats_serialize_in_camel_case() {
        let value = serde_json::to_value(LocationStats::default()).unwrap();
        assert!(value.get("notCompleted").is_some());
        assert_eq!(value["completed"]["totalEstimatedDays"], 0);
        assert_eq!(value["projectCount"], 0);
    }

    #[test]
    fn blank_filters_are_dropped() {
        let filters = ProjectFilters {
            category: Some(String::new()),
            status: Some("completed".to_string()),
            location: Some("  ".to_string()),
            search: None,
        }
        .normalized();

        assert_eq!(filters.category, None);
        assert_eq!(filters.status.as_deref(), Some("completed"));
        assert_eq!(filters.location, None);
    }
}
