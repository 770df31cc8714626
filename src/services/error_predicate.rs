//! Translation of a problem pattern into SQL conditions over joined error rows.
//!
//! A predicate is a conjunction of clauses. It always holds a project clause,
//! then one clause per non-blank criterion of the pattern:
//!
//! | criterion | clause |
//! |---|---|
//! | feature file, feature name, release, country, platform, type code | `= value` |
//! | scenario name, step, step definition | `= value`, or `LIKE 'value%'` with starts-with |
//! | exception | `LIKE '%value%'` |
//! | browser and mobile flags | `= flag` when set |
//!
//! `%` and `_` inside a value keep their `LIKE` meaning. The store matches
//! `LIKE` case-sensitively.

use rusqlite::types::Value;

use crate::db::ErrorFilter;
use crate::models::ProblemPattern;

/// Text columns of a joined error row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorField {
    FeatureFile,
    FeatureName,
    ScenarioName,
    Step,
    StepDefinition,
    Exception,
    Release,
    CountryCode,
    Platform,
    TypeCode,
}

impl ErrorField {
    pub fn column(&self) -> &'static str {
        match self {
            Self::FeatureFile => "es.feature_file",
            Self::FeatureName => "es.feature_name",
            Self::ScenarioName => "es.name",
            Self::Step => "e.step",
            Self::StepDefinition => "e.step_definition",
            Self::Exception => "e.exception",
            Self::Release => "x.release",
            Self::CountryCode => "r.country_code",
            Self::Platform => "r.platform",
            Self::TypeCode => "r.type_code",
        }
    }
}

/// Boolean columns of a joined error row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagField {
    TypeIsBrowser,
    TypeIsMobile,
}

impl FlagField {
    pub fn column(&self) -> &'static str {
        match self {
            Self::TypeIsBrowser => "r.type_is_browser",
            Self::TypeIsMobile => "r.type_is_mobile",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    ProjectIs(i64),
    Equals { field: ErrorField, value: String },
    Like { field: ErrorField, pattern: String },
    FlagIs { field: FlagField, value: bool },
}

impl Clause {
    pub fn sql(&self) -> String {
        match self {
            Self::ProjectIs(_) => "x.project_id = ?".to_string(),
            Self::Equals { field, .. } => format!("{} = ?", field.column()),
            Self::Like { field, .. } => format!("{} LIKE ?", field.column()),
            Self::FlagIs { field, .. } => format!("{} = ?", field.column()),
        }
    }

    pub fn param(&self) -> Value {
        match self {
            Self::ProjectIs(project_id) => Value::Integer(*project_id),
            Self::Equals { value, .. } => Value::Text(value.clone()),
            Self::Like { pattern, .. } => Value::Text(pattern.clone()),
            Self::FlagIs { value, .. } => Value::Integer(i64::from(*value)),
        }
    }
}

/// Conjunction of clauses selecting the errors a pattern describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorPredicate {
    clauses: Vec<Clause>,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.trim().is_empty())
}

impl ErrorPredicate {
    pub fn from_pattern(project_id: i64, pattern: &ProblemPattern) -> Self {
        let mut clauses = vec![Clause::ProjectIs(project_id)];

        let mut equals = |field, value: &Option<String>| {
            if let Some(value) = non_blank(value) {
                clauses.push(Clause::Equals {
                    field,
                    value: value.to_string(),
                });
            }
        };
        equals(ErrorField::FeatureFile, &pattern.feature_file);
        equals(ErrorField::FeatureName, &pattern.feature_name);

        for (field, value, starts_with) in [
            (
                ErrorField::ScenarioName,
                &pattern.scenario_name,
                pattern.scenario_name_starts_with,
            ),
            (ErrorField::Step, &pattern.step, pattern.step_starts_with),
            (
                ErrorField::StepDefinition,
                &pattern.step_definition,
                pattern.step_definition_starts_with,
            ),
        ] {
            if let Some(value) = non_blank(value) {
                clauses.push(if starts_with {
                    Clause::Like {
                        field,
                        pattern: format!("{value}%"),
                    }
                } else {
                    Clause::Equals {
                        field,
                        value: value.to_string(),
                    }
                });
            }
        }

        if let Some(exception) = non_blank(&pattern.exception) {
            clauses.push(Clause::Like {
                field: ErrorField::Exception,
                pattern: format!("%{exception}%"),
            });
        }

        for (field, value) in [
            (ErrorField::Release, &pattern.release),
            (ErrorField::CountryCode, &pattern.country_code),
            (ErrorField::Platform, &pattern.platform),
            (ErrorField::TypeCode, &pattern.type_code),
        ] {
            if let Some(value) = non_blank(value) {
                clauses.push(Clause::Equals {
                    field,
                    value: value.to_string(),
                });
            }
        }

        for (field, value) in [
            (FlagField::TypeIsBrowser, pattern.type_is_browser),
            (FlagField::TypeIsMobile, pattern.type_is_mobile),
        ] {
            if let Some(value) = value {
                clauses.push(Clause::FlagIs { field, value });
            }
        }

        Self { clauses }
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// Store filter holding one condition per clause.
    pub fn to_filter(&self) -> ErrorFilter {
        self.clauses
            .iter()
            .fold(ErrorFilter::default(), |filter, clause| {
                filter.and(clause.sql(), [clause.param()])
            })
    }
}
