//! Migration (v2) models: versioned scenarios and their reference data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Name written into migrated records whose real name must be chosen by a person.
///
/// Pending manual data enrichment: never meaningful content.
pub const FIELD_TO_RENAME: &str = "[field to rename]";

/// Description written into records that did not exist in the legacy schema.
///
/// Pending manual data enrichment: never meaningful content.
pub const NEW_FIELD_GENERATION: &str = "[generated during migration]";

/// Destination project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub code: String,
    pub name: String,
}

/// Key shared by most v2 records: a code unique within a project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CodeWithProjectId {
    pub project_id: i64,
    pub code: String,
}

impl CodeWithProjectId {
    pub fn new(project: &Project, code: impl Into<String>) -> Self {
        Self {
            project_id: project.id,
            code: code.into(),
        }
    }
}

/// Functional feature covered by scenarios.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Scenario label; migrated from legacy country codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: CodeWithProjectId,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioType {
    pub id: CodeWithProjectId,
    pub name: String,
    pub technology: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub id: CodeWithProjectId,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioSeverity {
    pub id: CodeWithProjectId,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScenarioStep {
    pub line: i32,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScenarioVersionId {
    pub scenario: CodeWithProjectId,
    pub commit_sha: String,
}

/// Content of a scenario at one commit on one branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioVersion {
    pub id: ScenarioVersionId,
    pub ignored: bool,
    pub steps: Vec<ScenarioStep>,
    pub covered_features: Vec<Feature>,
    pub severity: ScenarioSeverity,
    pub branch: Branch,
    pub file_name: String,
    pub file_url: String,
    pub update_date_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub id: CodeWithProjectId,
    pub name: String,
    pub scenario_type: Option<ScenarioType>,
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub versions: Vec<ScenarioVersion>,
}

impl Scenario {
    pub fn with_versions(self, versions: Vec<ScenarioVersion>) -> Self {
        Self { versions, ..self }
    }
}

/// Build a branch record awaiting a real name and description.
pub fn branch_pending_enrichment(project: &Project, branch_name: &str) -> Branch {
    Branch {
        id: CodeWithProjectId::new(project, branch_name),
        name: FIELD_TO_RENAME.to_string(),
        description: NEW_FIELD_GENERATION.to_string(),
    }
}

/// Build a severity record awaiting a real name and description.
pub fn severity_pending_enrichment(project: &Project, severity_code: &str) -> ScenarioSeverity {
    ScenarioSeverity {
        id: CodeWithProjectId::new(project, severity_code),
        name: FIELD_TO_RENAME.to_string(),
        description: NEW_FIELD_GENERATION.to_string(),
    }
}
