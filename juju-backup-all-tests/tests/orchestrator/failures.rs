//! Failure isolation: one bad item never takes down the run

use juju_backup_all::utils::juju::Unit;
use juju_backup_all::utils::locker::OutputLock;
use juju_backup_all::BackupOrchestrator;
use std::sync::Arc;
use std::time::Duration;
use test_utils::{
    app_result, sample_fleet, BackupError, ConfigBuilder, ItemKind, MockControlPlane, MockRemote,
    RemoteBehaviour, TestContext,
};

fn fleet() -> MockControlPlane {
    MockControlPlane::new()
        .with_controller("ctl1")
        .with_model("ctl1", "modelA")
        .with_application("ctl1", "modelA", "pg", "postgresql", 2)
        .with_application("ctl1", "modelA", "mysql", "mysql-innodb-cluster", 3)
}

fn error_kinds(report: &test_utils::Report) -> Vec<&'static str> {
    report
        .failures()
        .filter_map(|r| r.error.as_ref().map(BackupError::kind))
        .collect()
}

#[tokio::test]
async fn test_trigger_failure_is_isolated() {
    let ctx = TestContext::new();
    let remote = MockRemote::new().with_exit("pg/0", "pg_dumpall", 1, "disk full");

    let report = ctx.run(fleet(), remote).await;

    assert_eq!(report.exit_code(), 1);
    let pg = app_result(&report, "ctl1", "modelA", "pg").unwrap();
    match pg.error.as_ref().unwrap() {
        BackupError::RemoteTrigger {
            unit,
            exit_code,
            stderr,
        } => {
            assert_eq!(unit, "pg/0");
            assert_eq!(*exit_code, 1);
            assert!(stderr.contains("disk full"));
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert!(!ctx.output_path("ctl1/modelA/pg").exists());

    // client config, mysql and the controller still succeed
    assert_eq!(report.successes().count(), 3);
    assert!(ctx
        .output_path("ctl1/modelA/mysql/mysqldump-all-databases.sql.gz")
        .is_file());
}

#[tokio::test]
async fn test_unwritable_remote_dir_hints_option() {
    let ctx = TestContext::from_builder(ConfigBuilder::new().without_controller_backup());
    let remote = MockRemote::new().with_exit("pg/0", "mkdir -p", 1, "Permission denied");

    let report = ctx.run(fleet(), remote).await;

    let err = app_result(&report, "ctl1", "modelA", "pg")
        .and_then(|r| r.error.as_ref())
        .unwrap();
    assert_eq!(err.kind(), "RemoteIOError");
    assert!(err.to_string().contains("--backup-location-on-postgresql"));
}

#[tokio::test]
async fn test_failed_download_still_cleans_up() {
    let ctx = TestContext::from_builder(ConfigBuilder::new().without_controller_backup());
    let remote = Arc::new(MockRemote::new().with_failing_fetch("mysql/0"));

    let report = ctx.run_shared(Arc::new(fleet()), remote.clone()).await;

    let err = app_result(&report, "ctl1", "modelA", "mysql")
        .and_then(|r| r.error.as_ref())
        .unwrap();
    assert_eq!(err.kind(), "TransferError");

    let commands = remote.commands_for("mysql/0");
    assert!(commands.last().unwrap().starts_with("sudo rm -f"));
    assert!(app_result(&report, "ctl1", "modelA", "pg").unwrap().is_success());
}

#[tokio::test]
async fn test_unreachable_controller_is_one_failure() {
    let ctx = TestContext::from_builder(ConfigBuilder::new().all_controllers());
    let fleet = sample_fleet().with_unreachable("ctl2");

    let report = ctx.run(fleet, MockRemote::new()).await;

    let ctl2: Vec<_> = report
        .results
        .iter()
        .filter(|r| r.source.controller.as_deref() == Some("ctl2"))
        .collect();
    assert_eq!(ctl2.len(), 1);
    assert_eq!(ctl2[0].source.kind, ItemKind::Discovery);
    assert_eq!(ctl2[0].error.as_ref().unwrap().kind(), "DiscoveryError");

    assert!(app_result(&report, "ctl1", "modelA", "pg").unwrap().is_success());
    assert!(app_result(&report, "ctl1", "modelB", "mysql").unwrap().is_success());
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test]
async fn test_failing_model_keeps_controller_backup() {
    let ctx = TestContext::from_builder(ConfigBuilder::new().controller("ctl1"));
    let fleet = sample_fleet().with_failing_model("ctl1", "modelB");

    let report = ctx.run(fleet, MockRemote::new()).await;

    assert_eq!(error_kinds(&report), vec!["DiscoveryError"]);
    assert!(app_result(&report, "ctl1", "modelA", "pg").unwrap().is_success());
    assert!(ctx
        .output_path("ctl1/controller/controller/juju-controller-backup.tar.gz")
        .is_file());
}

#[tokio::test]
async fn test_unhealthy_units_are_never_used() {
    let ctx = TestContext::from_builder(
        ConfigBuilder::new()
            .without_client_config()
            .without_controller_backup(),
    );
    let broken = |name: &str| Unit {
        name: name.to_string(),
        leader: name.ends_with("/0"),
        workload_status: "error".to_string(),
        agent_status: "idle".to_string(),
    };
    let fleet = MockControlPlane::new()
        .with_controller("ctl1")
        .with_model("ctl1", "modelA")
        .with_units(
            "ctl1",
            "modelA",
            "pg",
            "postgresql",
            vec![broken("pg/0"), broken("pg/1")],
        );
    let remote = Arc::new(MockRemote::new());

    let report = ctx.run_shared(Arc::new(fleet), remote.clone()).await;

    assert_eq!(error_kinds(&report), vec!["NoUsableUnitError"]);
    assert!(remote.get_calls().is_empty());
}

#[tokio::test]
async fn test_slow_unit_times_out() {
    let ctx = TestContext::from_builder(
        ConfigBuilder::new()
            .without_controller_backup()
            .timeout_seconds(1),
    );
    let remote = MockRemote::new().with_behaviour(
        "pg/0",
        "pg_dumpall",
        RemoteBehaviour::Sleep(Duration::from_secs(3)),
    );

    let report = ctx.run(fleet(), remote).await;

    let err = app_result(&report, "ctl1", "modelA", "pg")
        .and_then(|r| r.error.as_ref())
        .unwrap();
    assert_eq!(err.kind(), "TimeoutError");
    assert!(err.to_string().contains("timeout=1s"));
    assert!(app_result(&report, "ctl1", "modelA", "mysql").unwrap().is_success());
}

#[tokio::test]
async fn test_remote_command_timeout() {
    let ctx = TestContext::from_builder(ConfigBuilder::new().without_controller_backup());
    let remote = MockRemote::new().with_behaviour("mysql/0", "mysqldump", RemoteBehaviour::Timeout);

    let report = ctx.run(fleet(), remote).await;

    assert_eq!(error_kinds(&report), vec!["TimeoutError"]);
}

#[tokio::test]
async fn test_controller_backup_retries() {
    let ctx = TestContext::from_builder(ConfigBuilder::new().controller_backup_retries(3));
    let fleet = Arc::new(fleet().with_failing_controller_backup("ctl1", 2));

    let report = ctx.run_shared(fleet.clone(), Arc::new(MockRemote::new())).await;

    assert_eq!(report.exit_code(), 0);
    assert_eq!(fleet.backup_attempts_for("ctl1"), 3);
}

#[tokio::test]
async fn test_controller_backup_gives_up() {
    let ctx = TestContext::from_builder(ConfigBuilder::new().controller_backup_retries(2));
    let fleet = Arc::new(fleet().with_failing_controller_backup("ctl1", 5));

    let report = ctx.run_shared(fleet.clone(), Arc::new(MockRemote::new())).await;

    assert_eq!(error_kinds(&report), vec!["ControllerBackupError"]);
    assert_eq!(fleet.backup_attempts_for("ctl1"), 2);
    assert!(!ctx.output_path("ctl1/controller").exists());
}

#[tokio::test]
async fn test_no_current_controller() {
    let ctx = TestContext::new();

    let report = ctx.run(MockControlPlane::new(), MockRemote::new()).await;

    assert_eq!(report.results.len(), 2);
    let failure = report.failures().next().unwrap();
    assert_eq!(failure.source.controller.as_deref(), Some("current"));
    assert_eq!(failure.error.as_ref().unwrap().kind(), "DiscoveryError");
    assert!(ctx.output_path("local_configs/juju.tar.gz").is_file());
}

#[tokio::test]
async fn test_missing_client_config_dir() {
    let builder = ConfigBuilder::new();
    let missing = builder.temp_path().join("no-such-juju");
    let ctx = TestContext::from_builder(builder.client_config_dir(missing));

    let report = ctx.run(fleet(), MockRemote::new()).await;

    assert_eq!(error_kinds(&report), vec!["ClientConfigError"]);
    assert!(!ctx.output_path("local_configs").exists());
}

#[tokio::test]
async fn test_held_lock_aborts_run() {
    let ctx = TestContext::new();
    std::fs::create_dir_all(ctx.output_dir()).unwrap();
    let mut lock = OutputLock::open(ctx.output_dir()).unwrap();
    let _held = lock.try_acquire().unwrap();

    let orchestrator = BackupOrchestrator::new(
        ctx.config().clone(),
        Arc::new(fleet()),
        Arc::new(MockRemote::new()),
    );

    assert!(orchestrator.run().await.is_err());
}
