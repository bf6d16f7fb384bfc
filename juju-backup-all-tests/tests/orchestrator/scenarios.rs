//! Successful runs and the shape of the output tree

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use test_utils::{
    app_result, sample_fleet, ConfigBuilder, ItemKind, MockControlPlane, MockRemote, Report,
    TestContext,
};

fn single_postgres() -> MockControlPlane {
    MockControlPlane::new()
        .with_controller("ctl1")
        .with_model("ctl1", "modelA")
        .with_application("ctl1", "modelA", "pg", "postgresql", 2)
}

fn artifacts(report: &Report) -> BTreeSet<PathBuf> {
    report
        .results
        .iter()
        .filter_map(|r| r.artifact.clone())
        .collect()
}

#[tokio::test]
async fn test_single_application_and_client_config() {
    let ctx = TestContext::from_builder(ConfigBuilder::new().without_controller_backup());

    let report = ctx.run(single_postgres(), MockRemote::new()).await;

    assert_eq!(report.exit_code(), 0);
    assert_eq!(report.results.len(), 2);
    assert!(ctx.output_path("local_configs/juju.tar.gz").is_file());
    assert!(ctx
        .output_path("ctl1/modelA/pg/juju-postgresql-backup.gz")
        .is_file());
    assert!(!ctx.output_path(".staging").exists());
}

#[tokio::test]
async fn test_leader_unit_is_recorded() {
    let ctx = TestContext::from_builder(ConfigBuilder::new().without_controller_backup());

    let report = ctx.run(single_postgres(), MockRemote::new()).await;

    let pg = app_result(&report, "ctl1", "modelA", "pg").unwrap();
    assert!(pg.is_success());
    assert_eq!(pg.source.unit.as_deref(), Some("pg/0"));
    assert_eq!(
        pg.artifact.as_deref(),
        Some(ctx.output_path("ctl1/modelA/pg/juju-postgresql-backup.gz").as_path())
    );
}

#[tokio::test]
async fn test_all_controllers_tree() {
    let ctx = TestContext::from_builder(ConfigBuilder::new().all_controllers());

    let report = ctx.run(sample_fleet(), MockRemote::new()).await;

    // client config, pg, mysql, ctl1 controller, etcd, ctl2 controller
    assert_eq!(report.results.len(), 6);
    assert_eq!(report.exit_code(), 0);

    for relative in [
        "local_configs/juju.tar.gz",
        "ctl1/modelA/pg/juju-postgresql-backup.gz",
        "ctl1/modelB/mysql/mysqldump-all-databases.sql.gz",
        "ctl1/controller/controller/juju-controller-backup.tar.gz",
        "ctl2/k8s/etcd/etcd-snapshot.db",
        "ctl2/controller/controller/juju-controller-backup.tar.gz",
    ] {
        assert!(ctx.output_path(relative).is_file(), "missing {}", relative);
    }
}

#[tokio::test]
async fn test_unsupported_charms_are_absent() {
    let ctx = TestContext::from_builder(ConfigBuilder::new().all_controllers());

    let report = ctx.run(sample_fleet(), MockRemote::new()).await;

    assert!(app_result(&report, "ctl1", "modelB", "wordpress").is_none());
    assert!(app_result(&report, "ctl2", "k8s", "containerd").is_none());
    assert!(!ctx.output_path("ctl1/modelB/wordpress").exists());
    assert!(!ctx.output_path("ctl2/k8s/containerd").exists());
}

#[tokio::test]
async fn test_excluded_charm_skipped_on_every_controller() {
    let ctx = TestContext::from_builder(
        ConfigBuilder::new()
            .all_controllers()
            .exclude_charm("etcd")
            .exclude_charm("postgresql"),
    );

    let report = ctx.run(sample_fleet(), MockRemote::new()).await;

    assert!(app_result(&report, "ctl2", "k8s", "etcd").is_none());
    assert!(app_result(&report, "ctl1", "modelA", "pg").is_none());
    assert!(app_result(&report, "ctl1", "modelB", "mysql").is_some());
    // Controller backups are unaffected by charm exclusions
    let controllers = report
        .results
        .iter()
        .filter(|r| r.source.kind == ItemKind::Controller)
        .count();
    assert_eq!(controllers, 2);
}

#[tokio::test]
async fn test_excluded_controller_and_model() {
    let ctx = TestContext::from_builder(
        ConfigBuilder::new()
            .all_controllers()
            .exclude_controller("ctl2")
            .exclude_model("modelB"),
    );

    let report = ctx.run(sample_fleet(), MockRemote::new()).await;

    assert!(report
        .results
        .iter()
        .all(|r| r.source.controller.as_deref() != Some("ctl2")));
    assert!(app_result(&report, "ctl1", "modelB", "mysql").is_none());
    assert!(app_result(&report, "ctl1", "modelA", "pg").is_some());
    assert!(!ctx.output_path("ctl2").exists());
}

#[tokio::test]
async fn test_named_controllers_are_deduplicated() {
    let ctx = TestContext::from_builder(
        ConfigBuilder::new()
            .controller("ctl2")
            .controller("ctl2")
            .without_client_config(),
    );

    let report = ctx.run(sample_fleet(), MockRemote::new()).await;

    // etcd and the ctl2 controller, once each
    assert_eq!(report.results.len(), 2);
    assert!(report
        .results
        .iter()
        .all(|r| r.source.controller.as_deref() == Some("ctl2")));
}

#[tokio::test]
async fn test_current_controller_is_default() {
    let ctx = TestContext::from_builder(ConfigBuilder::new().without_client_config());
    let fleet = sample_fleet().with_current("ctl2");

    let report = ctx.run(fleet, MockRemote::new()).await;

    assert!(app_result(&report, "ctl2", "k8s", "etcd").is_some());
    assert!(app_result(&report, "ctl1", "modelA", "pg").is_none());
}

#[tokio::test]
async fn test_paths_are_stable_across_runs() {
    let ctx = TestContext::from_builder(ConfigBuilder::new().all_controllers());

    let first = ctx.run(sample_fleet(), MockRemote::new()).await;
    let second = ctx.run(sample_fleet(), MockRemote::new()).await;

    assert_eq!(artifacts(&first), artifacts(&second));
    assert_eq!(second.exit_code(), 0);
}

#[tokio::test]
async fn test_remote_dir_override_is_used() {
    let ctx = TestContext::from_builder(
        ConfigBuilder::new()
            .without_client_config()
            .without_controller_backup()
            .postgresql_dir("/srv/pg-dumps"),
    );
    let remote = Arc::new(MockRemote::new());

    let report = ctx.run_shared(Arc::new(single_postgres()), remote.clone()).await;

    assert_eq!(report.exit_code(), 0);
    let commands = remote.commands_for("pg/0");
    assert!(commands[0].contains("mkdir -p /srv/pg-dumps"));
    assert!(commands
        .iter()
        .any(|c| c.contains("/srv/pg-dumps/juju-postgresql-backup.gz")));
}

#[tokio::test]
async fn test_json_report_groups() {
    let ctx = TestContext::from_builder(ConfigBuilder::new().all_controllers());
    let fleet = sample_fleet().with_unreachable("ctl2");

    let report = ctx.run(fleet, MockRemote::new()).await;
    let json = report.to_json();

    assert_eq!(json["config_backups"].as_array().unwrap().len(), 1);
    assert_eq!(json["config_backups"][0]["config"], "juju");
    assert_eq!(json["controller_backups"].as_array().unwrap().len(), 1);
    assert_eq!(json["controller_backups"][0]["controller"], "ctl1");
    assert_eq!(json["app_backups"].as_array().unwrap().len(), 2);
    assert_eq!(json["errors"].as_array().unwrap().len(), 1);
    assert_eq!(json["errors"][0]["controller"], "ctl2");
    assert_eq!(json["errors"][0]["error_type"], "DiscoveryError");
    assert!(json["started_at"].is_string());
}
