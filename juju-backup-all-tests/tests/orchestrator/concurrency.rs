//! Bounded parallelism

use juju_backup_all::utils::command::CommandError;
use juju_backup_all::utils::remote::{RemoteOutput, RemoteTarget};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use test_utils::{
    app_result, ConfigBuilder, MockControlPlane, MockRemote, RemoteBehaviour, RemoteExecutor,
    TestContext,
};

const SLOW_TRIGGER: Duration = Duration::from_millis(500);

fn four_databases() -> MockControlPlane {
    let mut fleet = MockControlPlane::new()
        .with_controller("ctl1")
        .with_model("ctl1", "db");
    for i in 0..4 {
        fleet = fleet.with_application("ctl1", "db", &format!("pg{}", i), "postgresql", 1);
    }
    fleet
}

fn slow_remote() -> MockRemote {
    (0..4).fold(MockRemote::new(), |remote, i| {
        remote.with_behaviour(
            &format!("pg{}/0", i),
            "pg_dumpall",
            RemoteBehaviour::Sleep(SLOW_TRIGGER),
        )
    })
}

fn builder(concurrency: usize) -> ConfigBuilder {
    ConfigBuilder::new()
        .without_client_config()
        .without_controller_backup()
        .concurrency(concurrency)
}

#[tokio::test]
async fn test_serial_run_takes_sum_of_items() {
    let ctx = TestContext::from_builder(builder(1));

    let start = Instant::now();
    let report = ctx.run(four_databases(), slow_remote()).await;

    assert_eq!(report.exit_code(), 0);
    assert!(start.elapsed() >= SLOW_TRIGGER * 4);
}

#[tokio::test]
async fn test_parallel_run_overlaps_items() {
    let ctx = TestContext::from_builder(builder(4));

    let start = Instant::now();
    let report = ctx.run(four_databases(), slow_remote()).await;

    assert_eq!(report.exit_code(), 0);
    assert!(start.elapsed() < SLOW_TRIGGER * 4);
}

#[tokio::test]
async fn test_concurrency_does_not_change_results() {
    let serial = TestContext::from_builder(builder(1));
    let parallel = TestContext::from_builder(builder(8));

    let serial_report = serial.run(four_databases(), MockRemote::new()).await;
    let parallel_report = parallel.run(four_databases(), MockRemote::new()).await;

    let relative = |ctx: &TestContext, report: &test_utils::Report| -> BTreeSet<PathBuf> {
        report
            .results
            .iter()
            .filter_map(|r| r.artifact.as_ref())
            .map(|p| p.strip_prefix(ctx.output_dir()).unwrap().to_path_buf())
            .collect()
    };
    assert_eq!(
        relative(&serial, &serial_report),
        relative(&parallel, &parallel_report)
    );
    assert_eq!(serial_report.results.len(), 4);
}

/// Tracks how many remote calls are running at the same time
struct CountingRemote {
    inner: MockRemote,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl CountingRemote {
    fn new(inner: MockRemote) -> Self {
        Self {
            inner,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn track<T>(&self, call: impl FnOnce() -> T) -> T {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let result = call();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

impl RemoteExecutor for CountingRemote {
    fn run(
        &self,
        target: &RemoteTarget,
        command: &str,
        timeout: Duration,
    ) -> Result<RemoteOutput, CommandError> {
        self.track(|| self.inner.run(target, command, timeout))
    }

    fn fetch(
        &self,
        target: &RemoteTarget,
        remote_path: &str,
        local_path: &Path,
        timeout: Duration,
    ) -> Result<(), CommandError> {
        self.track(|| self.inner.fetch(target, remote_path, local_path, timeout))
    }
}

#[tokio::test]
async fn test_timed_out_item_keeps_its_slot_until_it_ends() {
    let ctx = TestContext::from_builder(builder(1).timeout_seconds(1));
    let fleet = MockControlPlane::new()
        .with_controller("ctl1")
        .with_model("ctl1", "db")
        .with_application("ctl1", "db", "pg", "postgresql", 1)
        .with_application("ctl1", "db", "pg2", "postgresql", 1);
    let remote = Arc::new(CountingRemote::new(MockRemote::new().with_behaviour(
        "pg/0",
        "pg_dumpall",
        RemoteBehaviour::Sleep(Duration::from_millis(2500)),
    )));

    let report = ctx.run_shared(Arc::new(fleet), remote.clone()).await;

    let pg = app_result(&report, "ctl1", "db", "pg").unwrap();
    assert_eq!(pg.error.as_ref().unwrap().kind(), "TimeoutError");
    assert!(app_result(&report, "ctl1", "db", "pg2").unwrap().is_success());
    assert_eq!(remote.peak(), 1);

    // The late pg download must not land in the tree once the run is over
    assert!(!ctx.output_path(".staging").exists());
    assert!(!ctx.output_path("ctl1/db/pg").exists());
}
