//! E2E tests: migrating legacy scenarios and their execution history.

use ara_lib::db::{scenarios, DbPool};
use ara_lib::error::{AppError, BusinessError};
use ara_lib::models::legacy::{self, LegacyProject, Source};
use ara_lib::models::migration::{Scenario, ScenarioStep, FIELD_TO_RENAME};
use ara_lib::services::scenario_migration::migrate_scenarios_at;
use ara_lib::services::migrate_scenarios;

use super::test_helpers::*;

fn web_source() -> Source {
    source(PROJECT_ID, "web", "https://vcs.example/shop/{{branch}}/")
}

fn migrate(pool: &DbPool, executions: &[ara_lib::models::Execution]) -> Vec<Scenario> {
    pool.transaction(|tx| {
        migrate_scenarios_at(
            tx,
            Some(&legacy_project()),
            Some(&migration_project()),
            &features(&["1", "2"]),
            &tags(&["fr", "be"]),
            executions,
            at(20, 12),
        )
    })
    .unwrap()
}

fn stored(pool: &DbPool) -> Vec<Scenario> {
    pool.read(|conn| scenarios::scenarios_of_project(conn, migration_project().id))
        .unwrap()
}

fn codes(scenarios: &[Scenario]) -> Vec<&str> {
    scenarios.iter().map(|scenario| scenario.id.code.as_str()).collect()
}

fn shas(scenario: &Scenario) -> Vec<&str> {
    scenario
        .versions
        .iter()
        .map(|version| version.id.commit_sha.as_str())
        .collect()
}

#[test]
fn test_missing_projects_fail_before_any_write() {
    let pool = migration_pool(vec![legacy_scenario(42, &web_source(), "Buy a product", "fr")]);

    let err = pool
        .transaction(|tx| migrate_scenarios(tx, None, Some(&migration_project()), &[], &[], &[]))
        .unwrap_err();
    assert!(matches!(err, AppError::Business(BusinessError::ProjectRequired)));

    let without_id = LegacyProject {
        id: None,
        ..legacy_project()
    };
    let err = pool
        .transaction(|tx| {
            migrate_scenarios(tx, Some(&without_id), Some(&migration_project()), &[], &[], &[])
        })
        .unwrap_err();
    assert!(matches!(err, AppError::Business(BusinessError::IncompleteProject)));

    let err = pool
        .transaction(|tx| migrate_scenarios(tx, Some(&legacy_project()), None, &[], &[], &[]))
        .unwrap_err();
    assert!(matches!(err, AppError::Business(BusinessError::ProjectRequired)));
    assert!(err.is_validation());

    assert!(stored(&pool).is_empty());
}

#[test]
fn test_project_without_legacy_scenarios_migrates_nothing() {
    let pool = migration_pool(vec![legacy_scenario(
        42,
        &source(OTHER_PROJECT_ID, "web", ""),
        "Buy a product",
        "fr",
    )]);
    let executions = vec![executed_occurrence(11, "develop", "high", &web_source(), at(1, 8))];

    assert!(migrate(&pool, &executions).is_empty());
    assert!(stored(&pool).is_empty());
}

#[test]
fn test_legacy_scenario_with_history() {
    let web = web_source();
    let pool = migration_pool(vec![legacy_scenario(
        42,
        &web,
        "functionality 1: Buy a product",
        "FR, us",
    )]);
    let executions = vec![
        executed_occurrence(11, "develop", "high", &web, at(1, 8)),
        executed_occurrence(12, "develop", "low", &web, at(2, 8)),
        // Same version as 11, ran later
        executed_occurrence(13, "develop", "high", &web, at(3, 8)),
        executed_occurrence(14, "master", "high", &web, at(4, 8)),
    ];

    let migrated = migrate(&pool, &executions);
    assert_eq!(codes(&migrated), vec!["s-42"]);

    let scenario = &migrated[0];
    assert_eq!(scenario.name, "Buy a product");
    assert_eq!(scenario.id.project_id, migration_project().id);
    let tag_codes: Vec<&str> = scenario.tags.iter().map(|tag| tag.id.code.as_str()).collect();
    assert_eq!(tag_codes, vec!["fr"]);
    let scenario_type = scenario.scenario_type.as_ref().unwrap();
    assert_eq!(scenario_type.id.code, "web");
    assert_eq!(scenario_type.technology, "CUCUMBER");

    assert_eq!(
        shas(scenario),
        vec![
            "generated_SHA-s-develop-42",
            "generated_SHA-e-develop-11",
            "generated_SHA-e-develop-12",
            "generated_SHA-e-master-14",
        ]
    );

    let definition = &scenario.versions[0];
    assert_eq!(definition.update_date_time, at(20, 12));
    assert_eq!(definition.branch.id.code, "develop");
    assert_eq!(definition.branch.name, FIELD_TO_RENAME);
    assert_eq!(definition.severity.id.code, "high");
    assert_eq!(definition.file_name, "Cart");
    assert_eq!(
        definition.file_url,
        "https://vcs.example/shop/develop/features/cart.feature"
    );
    assert_eq!(
        definition.steps,
        vec![
            ScenarioStep {
                line: 3,
                content: "Given a cart".to_string()
            },
            ScenarioStep {
                line: 4,
                content: "When I pay".to_string()
            },
        ]
    );
    let covered: Vec<&str> = definition
        .covered_features
        .iter()
        .map(|feature| feature.code.as_str())
        .collect();
    assert_eq!(covered, vec!["1"]);

    let low = &scenario.versions[2];
    assert_eq!(low.severity.id.code, "low");
    assert_eq!(low.update_date_time, at(2, 8));
    assert_eq!(low.file_name, "Cart");
    assert_eq!(low.steps, definition.steps);

    let on_master = &scenario.versions[3];
    assert_eq!(on_master.branch.id.code, "master");
    assert_eq!(
        on_master.file_url,
        "https://vcs.example/shop/master/features/cart.feature"
    );
}

#[test]
fn test_executed_versions_keep_their_own_steps_and_the_ignored_flag() {
    let web = web_source();
    let pool = migration_pool(vec![legacy::Scenario {
        ignored: true,
        ..legacy_scenario(42, &web, "Buy a product", "fr")
    }]);
    let mut older = executed_occurrence(11, "develop", "high", &web, at(1, 8));
    older.runs[0].executed_scenarios[0].content = "7:passed:10:Given an old step".to_string();

    let migrated = migrate(&pool, &[older]);
    assert_eq!(codes(&migrated), vec!["s-42"]);

    let versions = &migrated[0].versions;
    assert_eq!(versions.len(), 2);
    assert!(versions[0].ignored);
    assert!(versions[1].ignored);
    assert_eq!(versions[0].steps.len(), 2);
    assert_eq!(
        versions[1].steps,
        vec![ScenarioStep {
            line: 7,
            content: "Given an old step".to_string()
        }]
    );

    let stored = stored(&pool);
    let executed = stored[0]
        .versions
        .iter()
        .find(|version| version.id.commit_sha == "generated_SHA-e-develop-11")
        .unwrap();
    assert!(executed.ignored);
    assert_eq!(executed.steps, versions[1].steps);
}

#[test]
fn test_duplicate_legacy_scenarios_keep_lowest_id() {
    let web = web_source();
    let pool = migration_pool(vec![
        legacy_scenario(42, &web, "Buy a product", "fr"),
        legacy_scenario(40, &web, "functionality 2: Buy a product", "be"),
    ]);

    let migrated = migrate(&pool, &[]);

    assert_eq!(codes(&migrated), vec!["s-40"]);
    assert_eq!(shas(&migrated[0]), vec!["generated_SHA-s-develop-40"]);
    assert_eq!(migrated[0].tags[0].id.code, "be");
}

#[test]
fn test_orphan_executions_and_unexecuted_scenarios() {
    let web = web_source();
    let pool = migration_pool(vec![
        legacy_scenario(43, &web, "Check out", ""),
        legacy_scenario(42, &web, "Buy a product", "fr"),
    ]);
    let mut orphan = executed_occurrence(15, "develop", "medium", &web, at(5, 8));
    orphan.runs[0].executed_scenarios[0].name = "Pay an order".to_string();
    let executions = vec![executed_occurrence(11, "develop", "high", &web, at(1, 8)), orphan];

    let migrated = migrate(&pool, &executions);
    assert_eq!(codes(&migrated), vec!["s-42", "e-15", "s-43"]);

    let orphan = &migrated[1];
    assert_eq!(orphan.name, "Pay an order");
    assert!(orphan.tags.is_empty());
    assert_eq!(shas(orphan), vec!["generated_SHA-e-develop-15"]);
    assert_eq!(orphan.versions[0].file_name, "/features/cart");
    assert!(!orphan.versions[0].ignored);

    let unexecuted = &migrated[2];
    assert!(unexecuted.tags.is_empty());
    assert_eq!(shas(unexecuted), vec!["generated_SHA-s-develop-43"]);
}

#[test]
fn test_migrated_scenarios_are_stored() {
    let web = web_source();
    let pool = migration_pool(vec![legacy_scenario(42, &web, "Buy a product", "fr")]);
    let executions = vec![executed_occurrence(11, "develop", "high", &web, at(1, 8))];

    let migrated = migrate(&pool, &executions);
    let stored = stored(&pool);

    assert_eq!(codes(&stored), vec!["s-42"]);
    // Stored versions come back ordered by commit SHA
    assert_eq!(
        shas(&stored[0]),
        vec!["generated_SHA-e-develop-11", "generated_SHA-s-develop-42"]
    );
    assert_eq!(stored[0].versions.len(), migrated[0].versions.len());
}

#[test]
fn test_failed_transaction_stores_nothing() {
    let web = web_source();
    let pool = migration_pool(vec![legacy_scenario(42, &web, "Buy a product", "fr")]);

    let result: Result<(), AppError> = pool.transaction(|tx| {
        let migrated = migrate_scenarios(
            tx,
            Some(&legacy_project()),
            Some(&migration_project()),
            &[],
            &[],
            &[],
        )?;
        assert_eq!(migrated.len(), 1);
        Err(AppError::Database("disk full".to_string()))
    });

    assert!(result.is_err());
    assert!(stored(&pool).is_empty());
}
