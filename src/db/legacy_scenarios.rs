//! Database operations for legacy scenario definitions and their sources.

use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};

use crate::db::insert_error;
use crate::error::{AppError, AppResult};
use crate::models::legacy::Scenario;
use crate::models::{Source, Technology};

/// Insert or update a source.
pub fn save_source(conn: &Connection, source: &Source) -> AppResult<()> {
    conn.prepare_cached(
        "INSERT INTO source (id, project_id, code, name, technology, vcs_url, default_branch)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(id) DO UPDATE SET
             project_id = excluded.project_id,
             code = excluded.code,
             name = excluded.name,
             technology = excluded.technology,
             vcs_url = excluded.vcs_url,
             default_branch = excluded.default_branch",
    )?
    .execute(params![
        source.id,
        source.project_id,
        source.code,
        source.name,
        source.technology.map(|technology| technology.as_str()),
        source.vcs_url,
        source.default_branch,
    ])?;
    Ok(())
}

/// Insert a legacy scenario, saving its source along.
pub fn insert_legacy_scenario(conn: &Connection, scenario: &Scenario) -> AppResult<()> {
    if let Some(source) = &scenario.source {
        save_source(conn, source)?;
    }

    conn.prepare_cached(
        "INSERT INTO legacy_scenario (id, source_id, feature_file, feature_name, name, severity,
                                      ignored, country_codes, line, content)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
    )?
    .execute(params![
        scenario.id,
        scenario.source.as_ref().map(|source| source.id),
        scenario.feature_file,
        scenario.feature_name,
        scenario.name,
        scenario.severity,
        scenario.ignored,
        scenario.country_codes,
        scenario.line,
        scenario.content,
    ])
    .map_err(|e| insert_error(e, || format!("Legacy scenario {}", scenario.id)))?;
    Ok(())
}

fn scenario_from_row(row: &Row<'_>) -> rusqlite::Result<Scenario> {
    let technology: Option<String> = row.get(14)?;
    let technology = technology
        .map(|technology| {
            Technology::parse(&technology).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    14,
                    Type::Text,
                    Box::new(AppError::Database(format!("Unknown technology {}", technology))),
                )
            })
        })
        .transpose()?;

    Ok(Scenario {
        id: row.get(0)?,
        feature_file: row.get(1)?,
        feature_name: row.get(2)?,
        name: row.get(3)?,
        severity: row.get(4)?,
        ignored: row.get(5)?,
        country_codes: row.get(6)?,
        line: row.get(7)?,
        content: row.get(8)?,
        source: Some(Source {
            id: row.get(9)?,
            project_id: row.get(10)?,
            code: row.get(11)?,
            name: row.get(12)?,
            vcs_url: row.get(13)?,
            technology,
            default_branch: row.get(15)?,
        }),
    })
}

/// Legacy scenarios whose source belongs to the project, ordered by id.
pub fn find_all_by_source_project_id(conn: &Connection, project_id: i64) -> AppResult<Vec<Scenario>> {
    let mut stmt = conn.prepare_cached(
        "SELECT ls.id, ls.feature_file, ls.feature_name, ls.name, ls.severity, ls.ignored,
                ls.country_codes, ls.line, ls.content,
                s.id, s.project_id, s.code, s.name, s.vcs_url, s.technology, s.default_branch
         FROM legacy_scenario ls
         JOIN source s ON s.id = ls.source_id
         WHERE s.project_id = ?1
         ORDER BY ls.id",
    )?;
    let scenarios = stmt
        .query_map(params![project_id], scenario_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(scenarios)
}
