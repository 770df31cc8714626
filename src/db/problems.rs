//! Database operations for problems, problem patterns and problem occurrences.

use std::collections::BTreeMap;

use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use crate::db::{date_column, insert_error, placeholders, to_db_date};
use crate::error::{AppError, AppResult};
use crate::models::{Problem, ProblemPattern, ProblemStatus};

const PROBLEM_COLUMNS: &str = "p.id, p.project_id, p.name, p.comment, p.status,
     p.closing_date_time, p.first_seen_date_time, p.last_seen_date_time";

const PATTERN_COLUMNS: &str = "pp.id, pp.problem_id, pp.feature_file, pp.feature_name,
     pp.scenario_name, pp.scenario_name_starts_with, pp.step, pp.step_starts_with,
     pp.step_definition, pp.step_definition_starts_with, pp.exception, pp.release,
     pp.country_code, pp.platform, pp.type_code, pp.type_is_browser, pp.type_is_mobile";

/// Map `PROBLEM_COLUMNS` starting at `offset`.
fn problem_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Problem> {
    let status: String = row.get(offset + 4)?;
    let status = ProblemStatus::parse(&status).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            offset + 4,
            Type::Text,
            Box::new(AppError::Database(format!("Unknown problem status {}", status))),
        )
    })?;
    Ok(Problem {
        id: row.get(offset)?,
        project_id: row.get(offset + 1)?,
        name: row.get(offset + 2)?,
        comment: row.get(offset + 3)?,
        status,
        closing_date_time: date_column(row, offset + 5)?,
        first_seen_date_time: date_column(row, offset + 6)?,
        last_seen_date_time: date_column(row, offset + 7)?,
    })
}

fn pattern_from_row(row: &Row<'_>) -> rusqlite::Result<ProblemPattern> {
    Ok(ProblemPattern {
        id: row.get(0)?,
        problem_id: row.get(1)?,
        feature_file: row.get(2)?,
        feature_name: row.get(3)?,
        scenario_name: row.get(4)?,
        scenario_name_starts_with: row.get(5)?,
        step: row.get(6)?,
        step_starts_with: row.get(7)?,
        step_definition: row.get(8)?,
        step_definition_starts_with: row.get(9)?,
        exception: row.get(10)?,
        release: row.get(11)?,
        country_code: row.get(12)?,
        platform: row.get(13)?,
        type_code: row.get(14)?,
        type_is_browser: row.get(15)?,
        type_is_mobile: row.get(16)?,
    })
}

/// Insert a problem, letting the database assign an id when it has none.
pub fn insert_problem(conn: &Connection, problem: &Problem) -> AppResult<Problem> {
    conn.execute(
        "INSERT INTO problem (id, project_id, name, comment, status, closing_date_time,
                              first_seen_date_time, last_seen_date_time)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            (problem.id > 0).then_some(problem.id),
            problem.project_id,
            problem.name,
            problem.comment,
            problem.status.as_str(),
            to_db_date(problem.closing_date_time),
            to_db_date(problem.first_seen_date_time),
            to_db_date(problem.last_seen_date_time),
        ],
    )
    .map_err(|e| insert_error(e, || format!("Problem {}", problem.id)))?;

    Ok(Problem {
        id: conn.last_insert_rowid(),
        ..problem.clone()
    })
}

/// Find a problem of a project.
pub fn find_problem(conn: &Connection, project_id: i64, problem_id: i64) -> AppResult<Option<Problem>> {
    let problem = conn
        .query_row(
            &format!(
                "SELECT {} FROM problem p WHERE p.id = ?1 AND p.project_id = ?2",
                PROBLEM_COLUMNS
            ),
            params![problem_id, project_id],
            |row| problem_from_row(row, 0),
        )
        .optional()?;
    Ok(problem)
}

/// Problems with the given ids, ordered by id. Unknown ids are skipped.
pub fn problems_by_ids(conn: &Connection, problem_ids: &[i64]) -> AppResult<Vec<Problem>> {
    if problem_ids.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        "SELECT {} FROM problem p WHERE p.id IN ({}) ORDER BY p.id",
        PROBLEM_COLUMNS,
        placeholders(problem_ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let problems = stmt
        .query_map(params_from_iter(problem_ids), |row| problem_from_row(row, 0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(problems)
}

/// Delete a problem, returning it when it existed.
pub fn delete_problem(conn: &Connection, problem_id: i64) -> AppResult<Option<Problem>> {
    let Some(problem) = problems_by_ids(conn, &[problem_id])?.pop() else {
        return Ok(None);
    };
    conn.execute("DELETE FROM problem WHERE id = ?1", params![problem_id])?;
    Ok(Some(problem))
}

/// Patterns whose problem belongs to the project, ordered by id.
pub fn patterns_of_project(conn: &Connection, project_id: i64) -> AppResult<Vec<ProblemPattern>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {} FROM problem_pattern pp
         JOIN problem p ON p.id = pp.problem_id
         WHERE p.project_id = ?1
         ORDER BY pp.id",
        PATTERN_COLUMNS
    ))?;
    let patterns = stmt
        .query_map(params![project_id], pattern_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(patterns)
}

pub fn patterns_of_problem(conn: &Connection, problem_id: i64) -> AppResult<Vec<ProblemPattern>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {} FROM problem_pattern pp WHERE pp.problem_id = ?1 ORDER BY pp.id",
        PATTERN_COLUMNS
    ))?;
    let patterns = stmt
        .query_map(params![problem_id], pattern_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(patterns)
}

/// Find a pattern whose problem belongs to the project.
pub fn find_pattern(
    conn: &Connection,
    project_id: i64,
    pattern_id: i64,
) -> AppResult<Option<ProblemPattern>> {
    let pattern = conn
        .query_row(
            &format!(
                "SELECT {} FROM problem_pattern pp
                 JOIN problem p ON p.id = pp.problem_id
                 WHERE pp.id = ?1 AND p.project_id = ?2",
                PATTERN_COLUMNS
            ),
            params![pattern_id, project_id],
            pattern_from_row,
        )
        .optional()?;
    Ok(pattern)
}

/// Insert a pattern, letting the database assign an id when it has none.
///
/// A pattern of an unknown problem fails with a database error.
pub fn insert_pattern(conn: &Connection, pattern: &ProblemPattern) -> AppResult<ProblemPattern> {
    conn.execute(
        "INSERT INTO problem_pattern (id, problem_id, feature_file, feature_name, scenario_name,
             scenario_name_starts_with, step, step_starts_with, step_definition,
             step_definition_starts_with, exception, release, country_code, platform, type_code,
             type_is_browser, type_is_mobile)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        params![
            (pattern.id > 0).then_some(pattern.id),
            pattern.problem_id,
            pattern.feature_file,
            pattern.feature_name,
            pattern.scenario_name,
            pattern.scenario_name_starts_with,
            pattern.step,
            pattern.step_starts_with,
            pattern.step_definition,
            pattern.step_definition_starts_with,
            pattern.exception,
            pattern.release,
            pattern.country_code,
            pattern.platform,
            pattern.type_code,
            pattern.type_is_browser,
            pattern.type_is_mobile,
        ],
    )
    .map_err(|e| insert_error(e, || format!("Problem pattern {}", pattern.id)))?;

    Ok(ProblemPattern {
        id: conn.last_insert_rowid(),
        ..pattern.clone()
    })
}

/// Replace the criteria of an existing pattern.
pub fn save_pattern(conn: &Connection, pattern: &ProblemPattern) -> AppResult<ProblemPattern> {
    let updated = conn.execute(
        "UPDATE problem_pattern SET problem_id = ?2, feature_file = ?3, feature_name = ?4,
             scenario_name = ?5, scenario_name_starts_with = ?6, step = ?7, step_starts_with = ?8,
             step_definition = ?9, step_definition_starts_with = ?10, exception = ?11,
             release = ?12, country_code = ?13, platform = ?14, type_code = ?15,
             type_is_browser = ?16, type_is_mobile = ?17
         WHERE id = ?1",
        params![
            pattern.id,
            pattern.problem_id,
            pattern.feature_file,
            pattern.feature_name,
            pattern.scenario_name,
            pattern.scenario_name_starts_with,
            pattern.step,
            pattern.step_starts_with,
            pattern.step_definition,
            pattern.step_definition_starts_with,
            pattern.exception,
            pattern.release,
            pattern.country_code,
            pattern.platform,
            pattern.type_code,
            pattern.type_is_browser,
            pattern.type_is_mobile,
        ],
    )?;

    if updated == 0 {
        return Err(AppError::NotFound(format!("Problem pattern {}", pattern.id)));
    }
    Ok(pattern.clone())
}

/// Delete a pattern, returning it when it existed. Its occurrences must be deleted first.
pub fn delete_pattern(conn: &Connection, pattern_id: i64) -> AppResult<Option<ProblemPattern>> {
    let pattern = conn
        .query_row(
            &format!("SELECT {} FROM problem_pattern pp WHERE pp.id = ?1", PATTERN_COLUMNS),
            params![pattern_id],
            pattern_from_row,
        )
        .optional()?;
    if pattern.is_some() {
        conn.execute("DELETE FROM problem_pattern WHERE id = ?1", params![pattern_id])?;
    }
    Ok(pattern)
}

/// Insert `(error_id, pattern_id)` occurrences, skipping existing ones.
///
/// Returns the number of rows actually inserted.
pub fn insert_occurrences(
    conn: &Connection,
    occurrences: impl IntoIterator<Item = (i64, i64)>,
) -> AppResult<usize> {
    let mut stmt = conn.prepare_cached(
        "INSERT OR IGNORE INTO problem_occurrence (error_id, problem_pattern_id) VALUES (?1, ?2)",
    )?;
    let mut inserted = 0;
    for (error_id, pattern_id) in occurrences {
        inserted += stmt.execute(params![error_id, pattern_id])?;
    }
    Ok(inserted)
}

/// Delete the occurrences of a pattern, returning the ids of their errors.
pub fn delete_occurrences_of_pattern(conn: &Connection, pattern_id: i64) -> AppResult<Vec<i64>> {
    let error_ids = error_ids_of_pattern(conn, pattern_id)?;
    conn.execute(
        "DELETE FROM problem_occurrence WHERE problem_pattern_id = ?1",
        params![pattern_id],
    )?;
    Ok(error_ids)
}

pub fn error_ids_of_pattern(conn: &Connection, pattern_id: i64) -> AppResult<Vec<i64>> {
    let mut stmt = conn.prepare_cached(
        "SELECT error_id FROM problem_occurrence WHERE problem_pattern_id = ?1 ORDER BY error_id",
    )?;
    let ids = stmt
        .query_map(params![pattern_id], |row| row.get(0))?
        .collect::<Result<Vec<i64>, _>>()?;
    Ok(ids)
}

pub fn pattern_ids_of_error(conn: &Connection, error_id: i64) -> AppResult<Vec<i64>> {
    let mut stmt = conn.prepare_cached(
        "SELECT problem_pattern_id FROM problem_occurrence WHERE error_id = ?1
         ORDER BY problem_pattern_id",
    )?;
    let ids = stmt
        .query_map(params![error_id], |row| row.get(0))?
        .collect::<Result<Vec<i64>, _>>()?;
    Ok(ids)
}

/// Distinct problems of each error, ordered by problem id.
///
/// Errors without any problem are absent from the map.
pub fn problems_of_errors(conn: &Connection, error_ids: &[i64]) -> AppResult<BTreeMap<i64, Vec<Problem>>> {
    if error_ids.is_empty() {
        return Ok(BTreeMap::new());
    }
    let sql = format!(
        "SELECT DISTINCT o.error_id, {}
         FROM problem_occurrence o
         JOIN problem_pattern pp ON pp.id = o.problem_pattern_id
         JOIN problem p ON p.id = pp.problem_id
         WHERE o.error_id IN ({})
         ORDER BY o.error_id, p.id",
        PROBLEM_COLUMNS,
        placeholders(error_ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(error_ids), |row| {
            Ok((row.get::<_, i64>(0)?, problem_from_row(row, 1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut problems_by_error: BTreeMap<i64, Vec<Problem>> = BTreeMap::new();
    for (error_id, problem) in rows {
        problems_by_error.entry(error_id).or_default().push(problem);
    }
    Ok(problems_by_error)
}
