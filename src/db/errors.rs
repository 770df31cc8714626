//! Database operations for executions and the step errors they own.

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

use crate::db::{insert_error, placeholders, to_db_date};
use crate::error::AppResult;
use crate::models::{Execution, StepError};

/// Joins every error to its executed scenario, run and execution.
const ERROR_JOIN: &str = "FROM error e
     JOIN executed_scenario es ON es.id = e.executed_scenario_id
     JOIN run r ON r.id = es.run_id
     JOIN execution x ON x.id = r.execution_id";

/// A step error with the context of the executed scenario, run and execution owning it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRow {
    pub error: StepError,
    pub executed_scenario_id: i64,
    pub feature_file: String,
    pub scenario_name: String,
    pub run_id: i64,
    pub country_code: String,
    pub execution_id: i64,
    pub branch: String,
    pub release: String,
}

impl ErrorRow {
    const COLUMNS: &'static str = "e.id, e.step, e.step_definition, e.step_line, e.exception,
         es.id, es.feature_file, es.name, r.id, r.country_code, x.id, x.branch, x.release";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(ErrorRow {
            error: StepError {
                id: row.get(0)?,
                step: row.get(1)?,
                step_definition: row.get(2)?,
                step_line: row.get(3)?,
                exception: row.get(4)?,
            },
            executed_scenario_id: row.get(5)?,
            feature_file: row.get(6)?,
            scenario_name: row.get(7)?,
            run_id: row.get(8)?,
            country_code: row.get(9)?,
            execution_id: row.get(10)?,
            branch: row.get(11)?,
            release: row.get(12)?,
        })
    }
}

/// Conditions over the joined error columns, combined with AND.
///
/// Columns are qualified by `e` (error), `es` (executed scenario), `r` (run)
/// and `x` (execution).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorFilter {
    conditions: Vec<String>,
    params: Vec<Value>,
}

impl ErrorFilter {
    /// Add a condition holding `?` placeholders for `params`, in order.
    pub fn and(mut self, condition: impl Into<String>, params: impl IntoIterator<Item = Value>) -> Self {
        self.conditions.push(condition.into());
        self.params.extend(params);
        self
    }

    /// Restrict to the given error ids.
    pub fn among_ids(self, error_ids: &[i64]) -> Self {
        let condition = format!("e.id IN ({})", placeholders(error_ids.len()));
        self.and(condition, error_ids.iter().map(|&id| Value::Integer(id)))
    }

    pub fn conditions(&self) -> &[String] {
        &self.conditions
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    fn where_clause(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.conditions.join(" AND "))
        }
    }
}

/// Insert an execution with its runs, executed scenarios and errors.
///
/// An id already used by any of those records fails with `NotUnique`.
pub fn insert_execution(conn: &Connection, execution: &Execution) -> AppResult<()> {
    conn.execute(
        "INSERT INTO execution (id, project_id, branch, cycle, release, test_date_time)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            execution.id,
            execution.project_id,
            execution.branch,
            execution.cycle,
            execution.release,
            to_db_date(execution.test_date_time),
        ],
    )
    .map_err(|e| insert_error(e, || format!("Execution {}", execution.id)))?;

    for run in &execution.runs {
        conn.prepare_cached(
            "INSERT INTO run (id, execution_id, country_code, platform, type_code, type_name,
                              type_is_browser, type_is_mobile)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?
        .execute(params![
            run.id,
            execution.id,
            run.country_code,
            run.platform,
            run.run_type.code,
            run.run_type.name,
            run.run_type.is_browser,
            run.run_type.is_mobile,
        ])
        .map_err(|e| insert_error(e, || format!("Run {}", run.id)))?;

        for executed_scenario in &run.executed_scenarios {
            conn.prepare_cached(
                "INSERT INTO executed_scenario (id, run_id, feature_file, feature_name, name,
                                                severity, line, content, start_date_time)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?
            .execute(params![
                executed_scenario.id,
                run.id,
                executed_scenario.feature_file,
                executed_scenario.feature_name,
                executed_scenario.name,
                executed_scenario.severity,
                executed_scenario.line,
                executed_scenario.content,
                to_db_date(executed_scenario.start_date_time),
            ])
            .map_err(|e| insert_error(e, || format!("Executed scenario {}", executed_scenario.id)))?;

            for error in &executed_scenario.errors {
                conn.prepare_cached(
                    "INSERT INTO error (id, executed_scenario_id, step, step_definition, step_line, exception)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )?
                .execute(params![
                    error.id,
                    executed_scenario.id,
                    error.step,
                    error.step_definition,
                    error.step_line,
                    error.exception,
                ])
                .map_err(|e| insert_error(e, || format!("Error {}", error.id)))?;
            }
        }
    }
    Ok(())
}

/// Ids of every error of a project, ascending.
pub fn error_ids_of_project(conn: &Connection, project_id: i64) -> AppResult<Vec<i64>> {
    let filter = ErrorFilter::default().and("x.project_id = ?", [Value::Integer(project_id)]);
    matching_error_ids(conn, &filter)
}

/// Ids of the errors passing the filter, ascending.
pub fn matching_error_ids(conn: &Connection, filter: &ErrorFilter) -> AppResult<Vec<i64>> {
    let sql = format!("SELECT e.id {}{} ORDER BY e.id", ERROR_JOIN, filter.where_clause());
    let mut stmt = conn.prepare(&sql)?;
    let ids = stmt
        .query_map(params_from_iter(filter.params()), |row| row.get(0))?
        .collect::<Result<Vec<i64>, _>>()?;
    Ok(ids)
}

pub fn count_errors(conn: &Connection, filter: &ErrorFilter) -> AppResult<u64> {
    let sql = format!("SELECT COUNT(*) {}{}", ERROR_JOIN, filter.where_clause());
    let count: i64 = conn.query_row(&sql, params_from_iter(filter.params()), |row| row.get(0))?;
    Ok(count as u64)
}

/// Errors passing the filter, in `order_by` order then by error id.
///
/// `order_by` is a list of SQL sort terms over the joined columns, such as
/// `es.id ASC`. `limit: None` returns every row from `offset`.
pub fn find_errors(
    conn: &Connection,
    filter: &ErrorFilter,
    order_by: &[String],
    limit: Option<u32>,
    offset: usize,
) -> AppResult<Vec<ErrorRow>> {
    let mut sort_terms = order_by.to_vec();
    sort_terms.push("e.id ASC".to_string());
    let sql = format!(
        "SELECT {} {}{} ORDER BY {} LIMIT ? OFFSET ?",
        ErrorRow::COLUMNS,
        ERROR_JOIN,
        filter.where_clause(),
        sort_terms.join(", ")
    );

    let mut values = filter.params().to_vec();
    values.push(Value::Integer(limit.map(i64::from).unwrap_or(-1)));
    values.push(Value::Integer(offset as i64));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(values), ErrorRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
