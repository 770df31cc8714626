//! Problem and problem pattern models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a problem as managed by users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProblemStatus {
    Open,
    Closed,
}

impl ProblemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Closed => "CLOSED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "OPEN" => Some(Self::Open),
            "CLOSED" => Some(Self::Closed),
            _ => None,
        }
    }
}

/// Status of a problem as displayed: a closed problem seen again after its
/// closing date is shown as reappeared until someone reopens it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EffectiveProblemStatus {
    Open,
    Closed,
    Reappeared,
}

/// A triaged issue grouping the errors matched by its patterns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    #[serde(default)]
    pub comment: Option<String>,
    pub status: ProblemStatus,
    #[serde(default)]
    pub closing_date_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub first_seen_date_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_seen_date_time: Option<DateTime<Utc>>,
}

impl Problem {
    pub fn effective_status(&self) -> EffectiveProblemStatus {
        match self.status {
            ProblemStatus::Open => EffectiveProblemStatus::Open,
            ProblemStatus::Closed => match (self.closing_date_time, self.last_seen_date_time) {
                (Some(closed), Some(last_seen)) if closed < last_seen => {
                    EffectiveProblemStatus::Reappeared
                }
                _ => EffectiveProblemStatus::Closed,
            },
        }
    }

    /// True when the problem is open, or closed and not seen since.
    pub fn is_handled(&self) -> bool {
        self.effective_status() != EffectiveProblemStatus::Reappeared
    }
}

/// Rule describing a class of recurring errors.
///
/// Every criterion left empty imposes no constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProblemPattern {
    pub id: i64,
    pub problem_id: i64,
    pub feature_file: Option<String>,
    pub feature_name: Option<String>,
    pub scenario_name: Option<String>,
    /// Match the beginning of the scenario name instead of all of it
    pub scenario_name_starts_with: bool,
    pub step: Option<String>,
    pub step_starts_with: bool,
    pub step_definition: Option<String>,
    pub step_definition_starts_with: bool,
    /// Matched anywhere in the exception text
    pub exception: Option<String>,
    pub release: Option<String>,
    pub country_code: Option<String>,
    pub platform: Option<String>,
    pub type_code: Option<String>,
    pub type_is_browser: Option<bool>,
    pub type_is_mobile: Option<bool>,
}

impl ProblemPattern {
    /// Compare matching criteria only, ignoring ids.
    pub fn has_same_criteria_as(&self, other: &ProblemPattern) -> bool {
        ProblemPattern {
            id: 0,
            problem_id: 0,
            ..self.clone()
        } == ProblemPattern {
            id: 0,
            problem_id: 0,
            ..other.clone()
        }
    }
}
