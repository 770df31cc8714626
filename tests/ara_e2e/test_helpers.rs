//! Shared builders for ARA E2E tests.

use chrono::{DateTime, TimeZone, Utc};

use ara_lib::db::DbPool;
use ara_lib::models::legacy::{self, LegacyProject, Technology};
use ara_lib::models::migration::{CodeWithProjectId, Feature, Project, Tag};
use ara_lib::models::{
    ExecutedScenario, Execution, Problem, ProblemPattern, ProblemStatus, Run, RunType, Source,
    StepError,
};
use ara_lib::services::Snapshot;

/// Legacy project whose errors are matched in most tests.
pub const PROJECT_ID: i64 = 1;

/// Another legacy project, whose errors must never leak into `PROJECT_ID` results.
pub const OTHER_PROJECT_ID: i64 = 2;

pub fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, day, hour, 0, 0).unwrap()
}

pub fn source(project_id: i64, code: &str, vcs_url: &str) -> Source {
    Source {
        id: project_id * 100,
        project_id,
        code: code.to_string(),
        name: format!("Source {code}"),
        technology: Some(Technology::Cucumber),
        vcs_url: vcs_url.to_string(),
        default_branch: "develop".to_string(),
    }
}

pub fn run_type(code: &str, is_browser: bool, is_mobile: bool, source: Option<Source>) -> RunType {
    RunType {
        code: code.to_string(),
        name: code.to_uppercase(),
        is_browser,
        is_mobile,
        source,
    }
}

pub fn step_error(id: i64, step: &str, step_line: i32, exception: &str) -> StepError {
    StepError {
        id,
        step: step.to_string(),
        step_definition: format!("^{}$", step),
        step_line,
        exception: exception.to_string(),
    }
}

pub fn executed_scenario(
    id: i64,
    feature_file: &str,
    name: &str,
    errors: Vec<StepError>,
) -> ExecutedScenario {
    ExecutedScenario {
        id,
        feature_file: feature_file.to_string(),
        feature_name: feature_file.trim_end_matches(".feature").to_string(),
        name: name.to_string(),
        severity: "high".to_string(),
        line: 1,
        content: "1:passed:12:Given a cart\n2:failed:Then I pay".to_string(),
        start_date_time: None,
        errors,
    }
}

pub fn run(
    id: i64,
    country_code: &str,
    run_type: RunType,
    executed_scenarios: Vec<ExecutedScenario>,
) -> Run {
    Run {
        id,
        country_code: country_code.to_string(),
        run_type,
        platform: "integ".to_string(),
        executed_scenarios,
    }
}

pub fn execution(id: i64, project_id: i64, branch: &str, runs: Vec<Run>) -> Execution {
    Execution {
        id,
        project_id,
        branch: branch.to_string(),
        cycle: "day".to_string(),
        release: "v1".to_string(),
        test_date_time: None,
        runs,
    }
}

pub fn problem(id: i64, project_id: i64, name: &str) -> Problem {
    Problem {
        id,
        project_id,
        name: name.to_string(),
        comment: None,
        status: ProblemStatus::Open,
        closing_date_time: None,
        first_seen_date_time: None,
        last_seen_date_time: None,
    }
}

/// Errors of the matching fixture:
///
/// | error | project | executed scenario | step line | run type | exception |
/// |---|---|---|---|---|---|
/// | 1001 | 1 | 100 cart.feature | 5 | firefox (browser), fr | Timeout |
/// | 1002 | 1 | 100 cart.feature | 8 | firefox (browser), fr | NoSuchElement |
/// | 1003 | 1 | 101 api.feature | 3 | api, us | HTTP 500 |
/// | 2001 | 2 | 200 cart.feature | 5 | firefox (browser), fr | Timeout |
pub fn matching_executions() -> Vec<Execution> {
    let firefox = run_type("firefox", true, false, None);
    vec![
        execution(
            1,
            PROJECT_ID,
            "develop",
            vec![
                run(
                    10,
                    "fr",
                    firefox.clone(),
                    vec![executed_scenario(
                        100,
                        "cart.feature",
                        "functionality 1: Add a product",
                        vec![
                            step_error(
                                1001,
                                "I click on \"buy\"",
                                5,
                                "java.lang.AssertionError: Timeout after 30s",
                            ),
                            step_error(1002, "I see the cart", 8, "NoSuchElementException: cart"),
                        ],
                    )],
                ),
                run(
                    11,
                    "us",
                    run_type("api", false, false, None),
                    vec![executed_scenario(
                        101,
                        "api.feature",
                        "Call the API",
                        vec![step_error(1003, "I call GET /products", 3, "HTTP 500 Internal Server Error")],
                    )],
                ),
            ],
        ),
        execution(
            2,
            OTHER_PROJECT_ID,
            "develop",
            vec![run(
                20,
                "fr",
                firefox,
                vec![executed_scenario(
                    200,
                    "cart.feature",
                    "Add a product",
                    vec![step_error(2001, "I click on \"buy\"", 5, "Timeout after 30s")],
                )],
            )],
        ),
    ]
}

/// Store holding the matching fixture plus the given problems and patterns.
pub fn matching_pool(problems: Vec<Problem>, problem_patterns: Vec<ProblemPattern>) -> DbPool {
    let pool = DbPool::new().unwrap();
    Snapshot {
        executions: matching_executions(),
        problems,
        problem_patterns,
        ..Default::default()
    }
    .load_into(&pool)
    .unwrap();
    pool
}

pub fn pattern(id: i64, problem_id: i64) -> ProblemPattern {
    ProblemPattern {
        id,
        problem_id,
        ..Default::default()
    }
}

pub fn legacy_project() -> LegacyProject {
    LegacyProject {
        id: Some(PROJECT_ID),
        code: "shop".to_string(),
        name: "Shop".to_string(),
    }
}

pub fn migration_project() -> Project {
    Project {
        id: 50,
        code: "shop".to_string(),
        name: "Shop".to_string(),
    }
}

pub fn tags(codes: &[&str]) -> Vec<Tag> {
    codes
        .iter()
        .map(|code| Tag {
            id: CodeWithProjectId::new(&migration_project(), *code),
            name: code.to_uppercase(),
            description: String::new(),
        })
        .collect()
}

pub fn features(codes: &[&str]) -> Vec<Feature> {
    codes
        .iter()
        .map(|code| Feature {
            code: code.to_string(),
            name: format!("Feature {code}"),
            description: String::new(),
        })
        .collect()
}

pub fn legacy_scenario(id: i64, source: &Source, name: &str, country_codes: &str) -> legacy::Scenario {
    legacy::Scenario {
        id,
        source: Some(source.clone()),
        feature_file: "/features/cart.feature".to_string(),
        feature_name: "Cart".to_string(),
        name: name.to_string(),
        severity: "high".to_string(),
        ignored: false,
        country_codes: country_codes.to_string(),
        line: 3,
        content: "3:given:Given a cart\n4:when:When I pay".to_string(),
    }
}

/// One executed occurrence of `legacy_scenario`'s test in a run of `source`.
pub fn executed_occurrence(
    id: i64,
    branch: &str,
    severity: &str,
    source: &Source,
    start: DateTime<Utc>,
) -> Execution {
    let mut executed = executed_scenario(id, "/features/cart.feature", "Buy a product", vec![]);
    executed.severity = severity.to_string();
    executed.start_date_time = Some(start);
    executed.content = "3:passed:120:Given a cart\n4:passed:80:When I pay".to_string();
    execution(
        id * 10,
        PROJECT_ID,
        branch,
        vec![run(
            id * 10,
            "fr",
            run_type("firefox", true, false, Some(source.clone())),
            vec![executed],
        )],
    )
}

/// Store holding only legacy scenarios.
pub fn migration_pool(legacy_scenarios: Vec<legacy::Scenario>) -> DbPool {
    let pool = DbPool::new().unwrap();
    Snapshot {
        legacy_scenarios,
        ..Default::default()
    }
    .load_into(&pool)
    .unwrap();
    pool
}
