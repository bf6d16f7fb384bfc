//! Canned `juju` output and sample fleets

use juju_backup_all::utils::juju::mock::MockControlPlane;
use serde_json::{json, Map, Value};

/// `juju controllers --format json`
pub fn controllers_json(names: &[&str], current: Option<&str>) -> String {
    let controllers: Map<String, Value> = names
        .iter()
        .map(|name| {
            (
                name.to_string(),
                json!({"current-model": "admin/default", "user": "admin"}),
            )
        })
        .collect();
    let mut doc = json!({ "controllers": controllers });
    if let Some(current) = current {
        doc["current-controller"] = json!(current);
    }
    doc.to_string()
}

/// `juju models -c <ctl> --format json`
pub fn models_json(names: &[&str]) -> String {
    let models: Vec<Value> = names
        .iter()
        .map(|name| json!({"name": format!("admin/{}", name), "short-name": name}))
        .collect();
    json!({ "models": models }).to_string()
}

/// `juju status --format json` for applications with `(name, charm url, unit count)`;
/// the first unit of each application leads
pub fn status_json(apps: &[(&str, &str, usize)]) -> String {
    let applications: Map<String, Value> = apps
        .iter()
        .map(|(name, charm, count)| {
            let units: Map<String, Value> = (0..*count)
                .map(|i| {
                    let mut unit = json!({
                        "workload-status": {"current": "active"},
                        "juju-status": {"current": "idle"}
                    });
                    if i == 0 {
                        unit["leader"] = json!(true);
                    }
                    (format!("{}/{}", name, i), unit)
                })
                .collect();
            (
                name.to_string(),
                json!({"charm": charm, "units": units}),
            )
        })
        .collect();
    json!({ "model": {"name": "m"}, "applications": applications }).to_string()
}

/// Two controllers; `ctl1` has a postgresql and a wordpress model, `ctl2`
/// runs kubernetes pieces
pub fn sample_fleet() -> MockControlPlane {
    MockControlPlane::new()
        .with_controller("ctl1")
        .with_controller("ctl2")
        .with_model("ctl1", "modelA")
        .with_model("ctl1", "modelB")
        .with_application("ctl1", "modelA", "pg", "postgresql", 2)
        .with_application("ctl1", "modelB", "wordpress", "wordpress", 1)
        .with_application("ctl1", "modelB", "mysql", "mysql-innodb-cluster", 3)
        .with_model("ctl2", "k8s")
        .with_application("ctl2", "k8s", "etcd", "etcd", 3)
        .with_application("ctl2", "k8s", "containerd", "containerd", 3)
}

/// Sample configuration file
pub fn sample_config_toml() -> &'static str {
    r#"
[backup]
output_dir = "/srv/juju-backups"
all_controllers = true
exclude_charms = ["etcd"]
exclude_models = ["sandbox"]
concurrency = 2
timeout_seconds = 300

[remote_dirs]
mysql = "/var/lib/mysql-backups"

[logging]
level = "debug"
"#
}
