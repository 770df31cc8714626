//! Database operations for migrated scenarios and their versions.
//!
//! Reference records nested in a scenario (type, tags, features, severity,
//! branch) are stored as JSON columns.

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::{date_column, json_column};
use crate::error::{AppError, AppResult};
use crate::models::migration::{CodeWithProjectId, Scenario, ScenarioVersion, ScenarioVersionId};

/// Insert or replace a scenario. Its versions are saved separately.
pub fn save_scenario(conn: &Connection, scenario: &Scenario) -> AppResult<Scenario> {
    let scenario_type = scenario
        .scenario_type
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    conn.prepare_cached(
        "INSERT INTO scenario (project_id, code, name, scenario_type, tags)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(project_id, code) DO UPDATE SET
             name = excluded.name,
             scenario_type = excluded.scenario_type,
             tags = excluded.tags",
    )?
    .execute(params![
        scenario.id.project_id,
        scenario.id.code,
        scenario.name,
        scenario_type,
        serde_json::to_string(&scenario.tags)?,
    ])?;

    Ok(Scenario {
        versions: Vec::new(),
        ..scenario.clone()
    })
}

/// Insert or replace versions in one batch.
///
/// A version of an unsaved scenario fails with a database error.
pub fn save_all_versions(
    conn: &Connection,
    versions: &[ScenarioVersion],
) -> AppResult<Vec<ScenarioVersion>> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO scenario_version (project_id, scenario_code, commit_sha, ignored, steps,
             covered_features, severity, branch, file_name, file_url, update_date_time)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
         ON CONFLICT(project_id, scenario_code, commit_sha) DO UPDATE SET
             ignored = excluded.ignored,
             steps = excluded.steps,
             covered_features = excluded.covered_features,
             severity = excluded.severity,
             branch = excluded.branch,
             file_name = excluded.file_name,
             file_url = excluded.file_url,
             update_date_time = excluded.update_date_time",
    )?;

    for version in versions {
        stmt.execute(params![
            version.id.scenario.project_id,
            version.id.scenario.code,
            version.id.commit_sha,
            version.ignored,
            serde_json::to_string(&version.steps)?,
            serde_json::to_string(&version.covered_features)?,
            serde_json::to_string(&version.severity)?,
            serde_json::to_string(&version.branch)?,
            version.file_name,
            version.file_url,
            version.update_date_time.to_rfc3339(),
        ])
        .map_err(|e| {
            AppError::Database(format!(
                "Failed to save version {} of scenario {}: {}",
                version.id.commit_sha, version.id.scenario.code, e
            ))
        })?;
    }
    Ok(versions.to_vec())
}

fn scenario_from_row(row: &Row<'_>) -> rusqlite::Result<Scenario> {
    let scenario_type: Option<String> = row.get(3)?;
    let scenario_type = match scenario_type {
        Some(_) => Some(json_column(row, 3)?),
        None => None,
    };
    Ok(Scenario {
        id: CodeWithProjectId {
            project_id: row.get(0)?,
            code: row.get(1)?,
        },
        name: row.get(2)?,
        scenario_type,
        tags: json_column(row, 4)?,
        versions: Vec::new(),
    })
}

fn version_from_row(row: &Row<'_>) -> rusqlite::Result<ScenarioVersion> {
    let update_date_time = date_column(row, 10)?.ok_or(rusqlite::Error::InvalidColumnType(
        10,
        "update_date_time".to_string(),
        rusqlite::types::Type::Null,
    ))?;
    Ok(ScenarioVersion {
        id: ScenarioVersionId {
            scenario: CodeWithProjectId {
                project_id: row.get(0)?,
                code: row.get(1)?,
            },
            commit_sha: row.get(2)?,
        },
        ignored: row.get(3)?,
        steps: json_column(row, 4)?,
        covered_features: json_column(row, 5)?,
        severity: json_column(row, 6)?,
        branch: json_column(row, 7)?,
        file_name: row.get(8)?,
        file_url: row.get(9)?,
        update_date_time,
    })
}

fn versions_of(conn: &Connection, id: &CodeWithProjectId) -> AppResult<Vec<ScenarioVersion>> {
    let mut stmt = conn.prepare_cached(
        "SELECT project_id, scenario_code, commit_sha, ignored, steps, covered_features, severity,
                branch, file_name, file_url, update_date_time
         FROM scenario_version
         WHERE project_id = ?1 AND scenario_code = ?2
         ORDER BY commit_sha",
    )?;
    let versions = stmt
        .query_map(params![id.project_id, id.code], version_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(versions)
}

/// Load a scenario with its versions ordered by commit SHA.
pub fn find_scenario(conn: &Connection, id: &CodeWithProjectId) -> AppResult<Option<Scenario>> {
    let scenario = conn
        .query_row(
            "SELECT project_id, code, name, scenario_type, tags FROM scenario
             WHERE project_id = ?1 AND code = ?2",
            params![id.project_id, id.code],
            scenario_from_row,
        )
        .optional()?;
    match scenario {
        Some(scenario) => {
            let versions = versions_of(conn, &scenario.id)?;
            Ok(Some(scenario.with_versions(versions)))
        }
        None => Ok(None),
    }
}

/// Scenarios of a project with their versions, ordered by code.
pub fn scenarios_of_project(conn: &Connection, project_id: i64) -> AppResult<Vec<Scenario>> {
    let mut stmt = conn.prepare_cached(
        "SELECT project_id, code, name, scenario_type, tags FROM scenario
         WHERE project_id = ?1
         ORDER BY code",
    )?;
    let scenarios = stmt
        .query_map(params![project_id], scenario_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    scenarios
        .into_iter()
        .map(|scenario| {
            let versions = versions_of(conn, &scenario.id)?;
            Ok(scenario.with_versions(versions))
        })
        .collect()
}
