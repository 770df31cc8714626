//! JSON snapshots of legacy data, loaded into the store by the command line.

use std::fs;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::db::{errors, legacy_scenarios, problems, DbPool};
use crate::error::AppResult;
use crate::models::legacy::{self, Execution, LegacyProject};
use crate::models::migration::{Feature, Project, Tag};
use crate::models::{Problem, ProblemPattern};

/// Everything a migration or an assignment run needs, as one JSON document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub legacy_projects: Vec<LegacyProject>,
    pub migration_projects: Vec<Project>,
    pub executions: Vec<Execution>,
    pub legacy_scenarios: Vec<legacy::Scenario>,
    pub problems: Vec<Problem>,
    pub problem_patterns: Vec<ProblemPattern>,
    /// Features already migrated
    pub features: Vec<Feature>,
    /// Tags already migrated
    pub tags: Vec<Tag>,
}

impl Snapshot {
    pub fn from_json(json: &str) -> AppResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> AppResult<Self> {
        let json = fs::read_to_string(path)?;
        let snapshot = Self::from_json(&json)?;
        info!(
            "Read snapshot {} ({} executions, {} legacy scenarios, {} patterns)",
            path.display(),
            snapshot.executions.len(),
            snapshot.legacy_scenarios.len(),
            snapshot.problem_patterns.len()
        );
        Ok(snapshot)
    }

    pub fn legacy_project(&self, code: &str) -> Option<&LegacyProject> {
        self.legacy_projects.iter().find(|project| project.code == code)
    }

    pub fn migration_project(&self, code: &str) -> Option<&Project> {
        self.migration_projects.iter().find(|project| project.code == code)
    }

    /// Executions of a legacy project.
    pub fn executions_of(&self, project_id: i64) -> Vec<Execution> {
        self.executions
            .iter()
            .filter(|execution| execution.project_id == project_id)
            .cloned()
            .collect()
    }

    /// Features and tags available to a destination project.
    pub fn features_and_tags_of(&self, project: &Project) -> (Vec<Feature>, Vec<Tag>) {
        let tags = self
            .tags
            .iter()
            .filter(|tag| tag.id.project_id == project.id)
            .cloned()
            .collect();
        (self.features.clone(), tags)
    }

    /// Insert the stored records of the snapshot in one transaction.
    pub fn load_into(&self, pool: &DbPool) -> AppResult<()> {
        pool.transaction(|tx| {
            for problem in &self.problems {
                problems::insert_problem(tx.connection(), problem)?;
            }
            for pattern in &self.problem_patterns {
                problems::insert_pattern(tx.connection(), pattern)?;
            }
            for scenario in &self.legacy_scenarios {
                legacy_scenarios::insert_legacy_scenario(tx.connection(), scenario)?;
            }
            for execution in &self.executions {
                errors::insert_execution(tx.connection(), execution)?;
            }
            Ok(())
        })
    }
}

/// Write `value` as pretty JSON to `output`, or to stdout when `None`.
pub fn write_json<T: Serialize>(value: &T, output: Option<&Path>) -> AppResult<()> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            fs::write(path, json)?;
            info!("Wrote {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{}", json)?;
        }
    }
    Ok(())
}
