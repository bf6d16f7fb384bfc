//! Remote execution on units over `juju ssh` / `juju scp`
//!
//! Each call spawns its own `juju` process, so every command and every
//! download gets a private session that ends with the process.

use super::command::{CommandError, CommandOutput};
use super::executor::{CommandExecutor, RealExecutor};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// A unit addressed through its controller and model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    pub controller: String,
    pub environment: String,
    pub unit: String,
}

impl RemoteTarget {
    pub fn new(controller: &str, environment: &str, unit: &str) -> Self {
        Self {
            controller: controller.to_string(),
            environment: environment.to_string(),
            unit: unit.to_string(),
        }
    }

    /// `controller:model` form accepted by `juju -m`
    pub fn model_ref(&self) -> String {
        format!("{}:{}", self.controller, self.environment)
    }
}

/// Output of a remote command
pub type RemoteOutput = CommandOutput;

/// Abstraction for remote execution, enabling mocking in tests
pub trait RemoteExecutor: Send + Sync {
    /// Run a shell command on the unit, returning its output whatever the exit code
    fn run(
        &self,
        target: &RemoteTarget,
        command: &str,
        timeout: Duration,
    ) -> Result<RemoteOutput, CommandError>;

    /// Download `remote_path` from the unit into `local_path`
    fn fetch(
        &self,
        target: &RemoteTarget,
        remote_path: &str,
        local_path: &Path,
        timeout: Duration,
    ) -> Result<(), CommandError>;
}

/// Remote execution through the `juju` CLI
pub struct JujuSsh {
    executor: Arc<dyn CommandExecutor>,
}

impl JujuSsh {
    pub fn new() -> Self {
        Self::with_executor(Arc::new(RealExecutor::new()))
    }

    pub fn with_executor(executor: Arc<dyn CommandExecutor>) -> Self {
        Self { executor }
    }
}

impl Default for JujuSsh {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteExecutor for JujuSsh {
    fn run(
        &self,
        target: &RemoteTarget,
        command: &str,
        timeout: Duration,
    ) -> Result<RemoteOutput, CommandError> {
        let model = target.model_ref();
        debug!("[{} {}] ssh: {}", model, target.unit, command);
        self.executor.run(
            "juju",
            &["ssh", "-m", &model, &target.unit, "--", command],
            timeout,
        )
    }

    fn fetch(
        &self,
        target: &RemoteTarget,
        remote_path: &str,
        local_path: &Path,
        timeout: Duration,
    ) -> Result<(), CommandError> {
        let model = target.model_ref();
        let source = format!("{}:{}", target.unit, remote_path);
        let destination = local_path.display().to_string();
        debug!("[{} {}] scp {} -> {}", model, target.unit, source, destination);
        self.executor
            .run_checked("juju", &["scp", "-m", &model, "--", &source, &destination], timeout)
            .map(|_| ())
    }
}

/// Mock remote executor for testing
/// Available for use in external test crates
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    /// Recorded remote call
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum RemoteCall {
        Run { unit: String, command: String },
        Fetch { unit: String, remote_path: String },
    }

    /// Scripted behaviour for commands whose text contains a pattern
    #[derive(Clone, Debug)]
    pub enum RemoteBehaviour {
        Exit { exit_code: i32, stderr: String },
        Timeout,
        Sleep(Duration),
        /// The ssh session cannot be opened
        Unreachable,
    }

    /// Mock remote executor
    ///
    /// Commands succeed unless a rule matches `(unit, command substring)`.
    /// Fetches write a small file to the local path unless the unit is set
    /// to fail transfers.
    #[derive(Default)]
    pub struct MockRemote {
        pub calls: Mutex<Vec<RemoteCall>>,
        rules: Mutex<Vec<(String, String, RemoteBehaviour)>>,
        failing_fetches: Mutex<Vec<String>>,
    }

    impl MockRemote {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make commands on `unit` containing `pattern` exit with a code and stderr
        pub fn with_exit(self, unit: &str, pattern: &str, exit_code: i32, stderr: &str) -> Self {
            self.rules.lock().unwrap().push((
                unit.to_string(),
                pattern.to_string(),
                RemoteBehaviour::Exit {
                    exit_code,
                    stderr: stderr.to_string(),
                },
            ));
            self
        }

        /// Script an arbitrary behaviour for matching commands
        pub fn with_behaviour(self, unit: &str, pattern: &str, behaviour: RemoteBehaviour) -> Self {
            self.rules
                .lock()
                .unwrap()
                .push((unit.to_string(), pattern.to_string(), behaviour));
            self
        }

        /// Make every download from `unit` fail
        pub fn with_failing_fetch(self, unit: &str) -> Self {
            self.failing_fetches.lock().unwrap().push(unit.to_string());
            self
        }

        pub fn get_calls(&self) -> Vec<RemoteCall> {
            self.calls.lock().unwrap().clone()
        }

        /// Commands run on a unit, in order
        pub fn commands_for(&self, unit: &str) -> Vec<String> {
            self.get_calls()
                .into_iter()
                .filter_map(|call| match call {
                    RemoteCall::Run { unit: u, command } if u == unit => Some(command),
                    _ => None,
                })
                .collect()
        }

        pub fn fetch_count(&self) -> usize {
            self.get_calls()
                .iter()
                .filter(|c| matches!(c, RemoteCall::Fetch { .. }))
                .count()
        }
    }

    impl RemoteExecutor for MockRemote {
        fn run(
            &self,
            target: &RemoteTarget,
            command: &str,
            timeout: Duration,
        ) -> Result<RemoteOutput, CommandError> {
            self.calls.lock().unwrap().push(RemoteCall::Run {
                unit: target.unit.clone(),
                command: command.to_string(),
            });

            let behaviour = self
                .rules
                .lock()
                .unwrap()
                .iter()
                .find(|(unit, pattern, _)| *unit == target.unit && command.contains(pattern.as_str()))
                .map(|(_, _, b)| b.clone());

            match behaviour {
                Some(RemoteBehaviour::Exit { exit_code, stderr }) => Ok(RemoteOutput {
                    exit_code,
                    stdout: String::new(),
                    stderr,
                }),
                Some(RemoteBehaviour::Timeout) => Err(CommandError::Timeout {
                    command: command.to_string(),
                    timeout,
                }),
                Some(RemoteBehaviour::Unreachable) => Err(CommandError::Spawn {
                    program: "juju".to_string(),
                    reason: format!("cannot connect to unit {}", target.unit),
                }),
                Some(RemoteBehaviour::Sleep(duration)) => {
                    std::thread::sleep(duration);
                    Ok(RemoteOutput::default())
                }
                None => Ok(RemoteOutput::default()),
            }
        }

        fn fetch(
            &self,
            target: &RemoteTarget,
            remote_path: &str,
            local_path: &Path,
            _timeout: Duration,
        ) -> Result<(), CommandError> {
            self.calls.lock().unwrap().push(RemoteCall::Fetch {
                unit: target.unit.clone(),
                remote_path: remote_path.to_string(),
            });

            if self.failing_fetches.lock().unwrap().contains(&target.unit) {
                return Err(CommandError::Failed {
                    command: format!("juju scp {}:{}", target.unit, remote_path),
                    exit_code: 1,
                    stderr: "connection reset by peer".to_string(),
                });
            }

            std::fs::write(local_path, format!("{}:{}", target.unit, remote_path)).map_err(|e| {
                CommandError::Failed {
                    command: "write".to_string(),
                    exit_code: 1,
                    stderr: e.to_string(),
                }
            })
        }
    }
}
