//! Discovery through the `juju` CLI client with canned output

use juju_backup_all::config::Config;
use juju_backup_all::managers::EnvironmentScanner;
use juju_backup_all::strategies::BackupStrategy;
use juju_backup_all::utils::JujuCli;
use std::sync::Arc;
use std::time::Duration;
use test_utils::{
    controllers_json, models_json, status_json, ControlPlane, MockExecutor, MockResponse,
};

fn juju(executor: &MockExecutor) -> JujuCli {
    JujuCli::with_executor(Arc::new(executor.clone()), Duration::from_secs(30))
}

fn two_model_executor() -> MockExecutor {
    MockExecutor::new()
        .expect(
            "juju controllers",
            MockResponse::stdout(controllers_json(&["ctl1", "ctl2"], Some("ctl1"))),
        )
        .expect(
            "juju models -c ctl1",
            MockResponse::stdout(models_json(&["controller", "modelA", "modelB"])),
        )
        .expect(
            "juju status -m ctl1:controller",
            MockResponse::stdout(status_json(&[("controller", "ch:juju-controller-14", 1)])),
        )
        .expect(
            "juju status -m ctl1:modelA",
            MockResponse::stdout(status_json(&[
                ("pg", "ch:amd64/focal/postgresql-429", 2),
                ("ubuntu", "cs:ubuntu-18", 1),
            ])),
        )
        .expect(
            "juju status -m ctl1:modelB",
            MockResponse::stdout(status_json(&[
                ("etcd", "cs:~containers/etcd-553", 3),
                ("mysql", "cs:mysql-innodb-cluster-9", 3),
            ])),
        )
}

#[test]
fn test_controllers_from_cli() {
    let executor = two_model_executor();
    let cli = juju(&executor);

    assert_eq!(cli.list_controllers().unwrap(), vec!["ctl1", "ctl2"]);
    assert_eq!(cli.current_controller().unwrap(), "ctl1");
}

#[test]
fn test_scan_through_cli_keeps_reported_order() {
    let executor = two_model_executor();
    let cli = juju(&executor);
    let config = Config::default();

    let report = EnvironmentScanner::new(&config, &cli).scan("ctl1");

    assert!(report.failures.is_empty());
    let models: Vec<_> = report.environments.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(models, vec!["controller", "modelA", "modelB"]);

    let items = report.into_items();
    let charms: Vec<_> = items
        .iter()
        .map(|i| i.source.charm.clone().unwrap())
        .collect();
    assert_eq!(charms, vec!["postgresql", "etcd", "mysql-innodb-cluster"]);

    match &items[0].strategy {
        BackupStrategy::Application { units, .. } => {
            assert_eq!(units.len(), 2);
            assert!(units[0].leader);
        }
        other => panic!("unexpected strategy {:?}", other),
    }
}

#[test]
fn test_scan_lists_units_per_application() {
    let executor = two_model_executor();
    let cli = juju(&executor);
    let config = Config::default();

    EnvironmentScanner::new(&config, &cli).scan("ctl1");

    assert!(executor.was_called("juju status -m ctl1:modelA pg --format json"));
    assert!(executor.was_called("juju status -m ctl1:modelB etcd --format json"));
    // Unsupported applications are never asked for units
    assert!(!executor.was_called("juju status -m ctl1:modelA ubuntu"));
}

#[test]
fn test_unreachable_controller_through_cli() {
    let executor = two_model_executor().expect(
        "juju models -c ctl2",
        MockResponse::failure(1, "ERROR cannot connect to API: connection refused"),
    );
    let cli = juju(&executor);
    let config = Config::default();

    let report = EnvironmentScanner::new(&config, &cli).scan("ctl2");

    assert_eq!(report.item_count(), 0);
    assert_eq!(report.failures.len(), 1);
    let err = report.failures[0].error.as_ref().unwrap();
    assert_eq!(err.kind(), "DiscoveryError");
    assert!(err.to_string().contains("connection refused"));
}

#[test]
fn test_listing_timeout_is_discovery_error() {
    let executor = two_model_executor().expect("juju status -m ctl1:modelB", MockResponse::Timeout);
    let cli = juju(&executor);
    let config = Config::default();

    let report = EnvironmentScanner::new(&config, &cli).scan("ctl1");

    assert_eq!(report.failures.len(), 1);
    let err = report.failures[0].error.as_ref().unwrap();
    assert_eq!(err.kind(), "DiscoveryError");
    assert!(err.to_string().contains("timed out"));
    assert_eq!(report.item_count(), 1);
}

#[test]
fn test_hung_controller_is_one_discovery_error() {
    let executor = two_model_executor().expect("juju models -c ctl2", MockResponse::Timeout);
    let cli = juju(&executor);
    let config = Config::default();

    let report = EnvironmentScanner::new(&config, &cli).scan("ctl2");

    assert_eq!(report.item_count(), 0);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].source.controller.as_deref(), Some("ctl2"));
    assert_eq!(report.failures[0].error.as_ref().unwrap().kind(), "DiscoveryError");
}
