//! Migration of legacy scenarios and their execution history into versioned scenarios.
//!
//! Legacy scenario definitions and executed scenarios describe the same tests
//! without sharing any id. They are paired through `ScenarioIdentity`:
//!
//! 1. every executed scenario is flattened with its execution branch and run source;
//! 2. executed scenarios are grouped by logical scenario, keeping the lowest id
//!    of each distinct version;
//! 3. each group is paired with the legacy scenario of the same identity, if any;
//! 4. legacy scenarios never executed are added without history.
//!
//! Each pair then becomes one scenario whose versions are the legacy definition
//! (first) followed by one version per distinct execution.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use crate::db::{legacy_scenarios, scenarios, Transaction};
use crate::error::{AppError, AppResult, BusinessError};
use crate::models::legacy::{
    self, Execution, LegacyProject, Source, BRANCH_VARIABLE, COUNTRY_ALL, COUNTRY_CODES_SEPARATOR,
};
use crate::models::migration::{
    branch_pending_enrichment, severity_pending_enrichment, CodeWithProjectId, Feature, Project,
    Scenario, ScenarioStep, ScenarioType, ScenarioVersion, ScenarioVersionId, Tag,
    NEW_FIELD_GENERATION,
};
use crate::services::scenario_identity::{
    ExecutedScenarioIdentity, ExecutedScenarioVersionIdentity, ExtendedExecutedScenario,
    ScenarioIdentity,
};

/// A future scenario: its legacy definition, its distinct executions, or both.
#[derive(Debug, Clone)]
pub struct MigrationCandidate<'a> {
    pub legacy_scenario: Option<&'a legacy::Scenario>,
    /// Version-distinct executions, by ascending id
    pub executed_scenarios: Vec<ExtendedExecutedScenario<'a>>,
}

/// Migrate the scenarios of a legacy project into `migration_project`.
///
/// Fails before writing anything when a project is missing or the legacy
/// project has no id.
pub fn migrate_scenarios(
    tx: &mut Transaction,
    legacy_project: Option<&LegacyProject>,
    migration_project: Option<&Project>,
    available_features: &[Feature],
    available_tags: &[Tag],
    legacy_executions: &[Execution],
) -> AppResult<Vec<Scenario>> {
    migrate_scenarios_at(
        tx,
        legacy_project,
        migration_project,
        available_features,
        available_tags,
        legacy_executions,
        Utc::now(),
    )
}

/// Same as `migrate_scenarios`, with an explicit migration time.
pub fn migrate_scenarios_at(
    tx: &mut Transaction,
    legacy_project: Option<&LegacyProject>,
    migration_project: Option<&Project>,
    available_features: &[Feature],
    available_tags: &[Tag],
    legacy_executions: &[Execution],
    migrated_at: DateTime<Utc>,
) -> AppResult<Vec<Scenario>> {
    let Some(legacy_project) = legacy_project else {
        error!("Could not migrate scenarios: no legacy project given");
        return Err(BusinessError::ProjectRequired.into());
    };
    let Some(legacy_project_id) = legacy_project.id else {
        error!(
            "Could not migrate scenarios: legacy project {} has no id",
            legacy_project.code
        );
        return Err(BusinessError::IncompleteProject.into());
    };
    let Some(migration_project) = migration_project else {
        error!("Could not migrate scenarios: no destination project given");
        return Err(BusinessError::ProjectRequired.into());
    };

    let legacy_scenarios =
        legacy_scenarios::find_all_by_source_project_id(tx.connection(), legacy_project_id)?;
    if legacy_scenarios.is_empty() {
        info!(
            "No legacy scenario to migrate for project {}",
            legacy_project.code
        );
        return Ok(Vec::new());
    }

    let candidates = reconcile(&legacy_scenarios, legacy_executions);
    info!(
        "Migrating {} scenarios of project {} ({} legacy scenarios, {} executions)",
        candidates.len(),
        legacy_project.code,
        legacy_scenarios.len(),
        legacy_executions.len()
    );

    candidates
        .iter()
        .map(|candidate| {
            migrate_scenario(
                tx,
                candidate,
                migration_project,
                available_features,
                available_tags,
                migrated_at,
            )
        })
        .collect()
}

/// Pair legacy scenarios with the executed scenarios representing them.
///
/// Executed groups come first, ordered by their lowest executed scenario id,
/// then legacy scenarios matched by no group, ordered by id. When several
/// legacy scenarios share an identity, the lowest id represents them all.
pub fn reconcile<'a>(
    legacy_scenarios: &'a [legacy::Scenario],
    legacy_executions: &'a [Execution],
) -> Vec<MigrationCandidate<'a>> {
    let mut distinct_scenarios: BTreeMap<ScenarioIdentity, &legacy::Scenario> = BTreeMap::new();
    for scenario in legacy_scenarios {
        distinct_scenarios
            .entry(ScenarioIdentity::of_scenario(scenario))
            .and_modify(|kept| {
                if scenario.id < kept.id {
                    *kept = scenario;
                }
            })
            .or_insert(scenario);
    }

    let mut extended_scenarios = flatten_executions(legacy_executions);
    extended_scenarios.sort_by_key(|extended| extended.executed_scenario.id);

    let mut group_of: HashMap<ExecutedScenarioIdentity, usize> = HashMap::new();
    let mut groups: Vec<(Vec<ExtendedExecutedScenario<'a>>, HashSet<ExecutedScenarioVersionIdentity>)> =
        Vec::new();
    for extended in extended_scenarios {
        let index = *group_of
            .entry(ExecutedScenarioIdentity::of(&extended))
            .or_insert_with(|| {
                groups.push((Vec::new(), HashSet::new()));
                groups.len() - 1
            });
        let (members, seen_versions) = &mut groups[index];
        if seen_versions.insert(ExecutedScenarioVersionIdentity::of(&extended)) {
            members.push(extended);
        } else {
            debug!(
                "Executed scenario {} repeats an already migrated version",
                extended.executed_scenario.id
            );
        }
    }

    let mut matched_identities = BTreeSet::new();
    let mut candidates: Vec<MigrationCandidate<'a>> = groups
        .into_iter()
        .filter_map(|(members, _)| {
            let identity = ScenarioIdentity::of_executed(members.first()?);
            let legacy_scenario = distinct_scenarios.get(&identity).copied();
            if legacy_scenario.is_some() {
                matched_identities.insert(identity);
            }
            Some(MigrationCandidate {
                legacy_scenario,
                executed_scenarios: members,
            })
        })
        .collect();

    let mut never_executed: Vec<&legacy::Scenario> = distinct_scenarios
        .into_iter()
        .filter(|(identity, _)| !matched_identities.contains(identity))
        .map(|(_, scenario)| scenario)
        .collect();
    never_executed.sort_by_key(|scenario| scenario.id);
    candidates.extend(never_executed.into_iter().map(|scenario| MigrationCandidate {
        legacy_scenario: Some(scenario),
        executed_scenarios: Vec::new(),
    }));

    candidates
}

fn flatten_executions(legacy_executions: &[Execution]) -> Vec<ExtendedExecutedScenario<'_>> {
    legacy_executions
        .iter()
        .flat_map(|execution| {
            execution.runs.iter().flat_map(move |run| {
                run.executed_scenarios
                    .iter()
                    .map(move |executed_scenario| ExtendedExecutedScenario {
                        executed_scenario,
                        branch: &execution.branch,
                        legacy_source: run.run_type.source.as_ref(),
                    })
            })
        })
        .collect()
}

fn migrate_scenario(
    tx: &mut Transaction,
    candidate: &MigrationCandidate<'_>,
    project: &Project,
    available_features: &[Feature],
    available_tags: &[Tag],
    migrated_at: DateTime<Utc>,
) -> AppResult<Scenario> {
    let base = match (candidate.legacy_scenario, candidate.executed_scenarios.first()) {
        (Some(legacy_scenario), _) => {
            base_scenario_from_legacy_scenario(legacy_scenario, project, available_tags)
        }
        (None, Some(first_executed)) => base_scenario_from_executed_scenario(first_executed, project),
        (None, None) => {
            return Err(AppError::InvalidInput(
                "A migrated scenario needs a legacy scenario or an execution".to_string(),
            ));
        }
    };
    let migrated = scenarios::save_scenario(tx.connection(), &base)?;

    let mut versions = Vec::with_capacity(candidate.executed_scenarios.len() + 1);
    if let Some(legacy_scenario) = candidate.legacy_scenario {
        versions.push(definition_version(
            legacy_scenario,
            project,
            &migrated.id,
            available_features,
            migrated_at,
        ));
    }
    versions.extend(candidate.executed_scenarios.iter().map(|extended| {
        executed_version(
            extended,
            candidate.legacy_scenario,
            project,
            &migrated.id,
            available_features,
            migrated_at,
        )
    }));

    let migrated_versions = scenarios::save_all_versions(tx.connection(), &versions)?;
    debug!(
        "Migrated scenario {} with {} versions",
        migrated.id.code,
        migrated_versions.len()
    );
    Ok(migrated.with_versions(migrated_versions))
}

fn base_scenario_from_legacy_scenario(
    legacy_scenario: &legacy::Scenario,
    project: &Project,
    available_tags: &[Tag],
) -> Scenario {
    let (name, _) = legacy_scenario.name_and_functionality_codes();
    Scenario {
        id: CodeWithProjectId::new(project, format!("s-{}", legacy_scenario.id)),
        name,
        scenario_type: scenario_type_from_source(legacy_scenario.source.as_ref(), project),
        tags: tags_from_country_codes(&legacy_scenario.country_codes, available_tags),
        versions: Vec::new(),
    }
}

fn base_scenario_from_executed_scenario(
    extended: &ExtendedExecutedScenario<'_>,
    project: &Project,
) -> Scenario {
    let (name, _) = extended.executed_scenario.name_and_functionality_codes();
    Scenario {
        id: CodeWithProjectId::new(project, format!("e-{}", extended.executed_scenario.id)),
        name,
        scenario_type: scenario_type_from_source(extended.legacy_source, project),
        tags: Vec::new(),
        versions: Vec::new(),
    }
}

fn definition_version(
    legacy_scenario: &legacy::Scenario,
    project: &Project,
    scenario_id: &CodeWithProjectId,
    available_features: &[Feature],
    migrated_at: DateTime<Utc>,
) -> ScenarioVersion {
    let source = legacy_scenario.source.as_ref();
    let branch_name = source
        .map(|source| source.default_branch.as_str())
        .unwrap_or_default();
    let (_, feature_codes) = legacy_scenario.name_and_functionality_codes();

    ScenarioVersion {
        id: ScenarioVersionId {
            scenario: scenario_id.clone(),
            commit_sha: format!("generated_SHA-s-{}-{}", branch_name, legacy_scenario.id),
        },
        ignored: legacy_scenario.ignored,
        steps: migrated_steps(legacy_scenario.steps()),
        covered_features: features_from_codes(available_features, &feature_codes),
        severity: severity_pending_enrichment(project, &legacy_scenario.severity),
        branch: branch_pending_enrichment(project, branch_name),
        file_name: legacy_scenario.feature_name.clone(),
        file_url: file_url(source, None, &legacy_scenario.feature_file),
        update_date_time: migrated_at,
    }
}

fn executed_version(
    extended: &ExtendedExecutedScenario<'_>,
    legacy_scenario: Option<&legacy::Scenario>,
    project: &Project,
    scenario_id: &CodeWithProjectId,
    available_features: &[Feature],
    migrated_at: DateTime<Utc>,
) -> ScenarioVersion {
    let executed_scenario = extended.executed_scenario;
    let (_, feature_codes) = executed_scenario.name_and_functionality_codes();

    ScenarioVersion {
        id: ScenarioVersionId {
            scenario: scenario_id.clone(),
            commit_sha: format!("generated_SHA-e-{}-{}", extended.branch, executed_scenario.id),
        },
        ignored: legacy_scenario.is_some_and(|scenario| scenario.ignored),
        steps: migrated_steps(executed_scenario.stateless_steps()),
        covered_features: features_from_codes(available_features, &feature_codes),
        severity: severity_pending_enrichment(project, &executed_scenario.severity),
        branch: branch_pending_enrichment(project, extended.branch),
        file_name: legacy_scenario
            .map(|scenario| scenario.feature_name.clone())
            .unwrap_or_else(|| executed_scenario.feature_name.clone()),
        file_url: file_url(
            extended.legacy_source,
            Some(extended.branch),
            &executed_scenario.feature_file,
        ),
        update_date_time: executed_scenario.start_date_time.unwrap_or(migrated_at),
    }
}

fn migrated_steps(steps: Vec<legacy::ScenarioStep>) -> Vec<ScenarioStep> {
    steps
        .into_iter()
        .map(|step| ScenarioStep {
            line: step.line,
            content: step.content,
        })
        .collect()
}

/// Scenario type of a source, absent when the source or its technology is.
pub fn scenario_type_from_source(source: Option<&Source>, project: &Project) -> Option<ScenarioType> {
    let source = source?;
    let technology = source.technology?;
    Some(ScenarioType {
        id: CodeWithProjectId::new(project, source.code.clone()),
        name: source.name.clone(),
        technology: technology.to_string(),
        description: NEW_FIELD_GENERATION.to_string(),
    })
}

/// Resolve tags from legacy country codes.
///
/// Blank codes give no tag; `all` gives every available tag; otherwise codes
/// are trimmed, lowercased and deduplicated, and unknown codes are dropped.
pub fn tags_from_country_codes(country_codes: &str, available_tags: &[Tag]) -> Vec<Tag> {
    if country_codes.trim().is_empty() || available_tags.is_empty() {
        return Vec::new();
    }
    if country_codes == COUNTRY_ALL {
        return available_tags.to_vec();
    }

    let mut seen = HashSet::new();
    country_codes
        .split(COUNTRY_CODES_SEPARATOR)
        .map(|code| code.trim().to_lowercase())
        .filter(|code| !code.is_empty() && seen.insert(code.clone()))
        .filter_map(|code| available_tags.iter().find(|tag| tag.id.code == code).cloned())
        .collect()
}

/// Features of the given codes, in code order. Unknown codes are dropped.
pub fn features_from_codes(available_features: &[Feature], feature_codes: &[String]) -> Vec<Feature> {
    feature_codes
        .iter()
        .filter_map(|code| {
            available_features
                .iter()
                .find(|feature| &feature.code == code)
                .cloned()
        })
        .collect()
}

/// URL of a scenario file in the source repository.
///
/// `branch` defaults to the source default branch. A missing source or blank
/// base URL gives an empty URL.
pub fn file_url(source: Option<&Source>, branch: Option<&str>, file_name: &str) -> String {
    let Some(source) = source else {
        return String::new();
    };
    if source.vcs_url.trim().is_empty() {
        return String::new();
    }

    let base_url = source
        .vcs_url
        .strip_suffix('/')
        .unwrap_or(source.vcs_url.as_str())
        .replace(BRANCH_VARIABLE, branch.unwrap_or(source.default_branch.as_str()));
    let file_name = file_name.strip_prefix('/').unwrap_or(file_name);
    format!("{}/{}", base_url, file_name)
}
