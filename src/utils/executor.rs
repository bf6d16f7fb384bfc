//! Command execution abstraction for testability
//!
//! This module provides a trait-based abstraction for command execution,
//! enabling dependency injection and mocking for tests.

use super::command::{CommandError, CommandOutput};
use std::time::Duration;

/// Abstraction for command execution, enabling mocking in tests
pub trait CommandExecutor: Send + Sync {
    /// Run a command and return its output regardless of exit code
    fn run(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<CommandOutput, CommandError>;

    /// Run a command, treating a non-zero exit as an error
    fn run_checked(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<CommandOutput, CommandError> {
        let output = self.run(program, args, timeout)?;
        if !output.success() {
            return Err(CommandError::Failed {
                command: super::command::display_command(program, args),
                exit_code: output.exit_code,
                stderr: output.stderr.trim_end().to_string(),
            });
        }
        Ok(output)
    }
}

/// Default implementation using real subprocess calls
#[derive(Debug, Clone, Default)]
pub struct RealExecutor;

impl RealExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl CommandExecutor for RealExecutor {
    fn run(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<CommandOutput, CommandError> {
        super::command::run_command(program, args, timeout)
    }
}

/// A mock executor for testing that records calls and returns configured responses
/// Available for use in external test crates
pub mod mock {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Recorded command invocation
    #[derive(Clone, Debug)]
    pub struct CommandCall {
        pub program: String,
        pub args: Vec<String>,
    }

    impl CommandCall {
        pub fn command_line(&self) -> String {
            let args: Vec<&str> = self.args.iter().map(String::as_str).collect();
            super::super::command::display_command(&self.program, &args)
        }
    }

    /// Response configuration for mock
    #[derive(Clone, Debug)]
    pub enum MockResponse {
        Success { stdout: String, stderr: String },
        Failure { stderr: String, exit_code: i32 },
        Timeout,
        SpawnError,
    }

    impl MockResponse {
        pub fn stdout(stdout: impl Into<String>) -> Self {
            MockResponse::Success {
                stdout: stdout.into(),
                stderr: String::new(),
            }
        }

        pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
            MockResponse::Failure {
                stderr: stderr.into(),
                exit_code,
            }
        }
    }

    impl Default for MockResponse {
        fn default() -> Self {
            MockResponse::Success {
                stdout: String::new(),
                stderr: String::new(),
            }
        }
    }

    /// Mock executor for testing
    ///
    /// Responses are keyed by command-line prefix; the longest matching
    /// prefix wins, so `"juju status -m c1:m1"` can override `"juju status"`.
    #[derive(Clone, Default)]
    pub struct MockExecutor {
        /// Recorded command invocations
        pub calls: Arc<Mutex<Vec<CommandCall>>>,
        /// Pre-configured responses: command-line prefix -> response
        responses: Arc<Mutex<Vec<(String, MockResponse)>>>,
        /// Default response when no specific response is configured
        default_response: Arc<Mutex<MockResponse>>,
    }

    impl MockExecutor {
        pub fn new() -> Self {
            Self::default()
        }

        /// Configure a response for commands starting with `prefix`
        pub fn expect(self, prefix: &str, response: MockResponse) -> Self {
            self.responses
                .lock()
                .unwrap()
                .push((prefix.to_string(), response));
            self
        }

        /// Set the default response for unconfigured commands
        pub fn with_default_response(self, response: MockResponse) -> Self {
            *self.default_response.lock().unwrap() = response;
            self
        }

        /// Get all recorded calls
        pub fn get_calls(&self) -> Vec<CommandCall> {
            self.calls.lock().unwrap().clone()
        }

        /// Check if any call started with the given command-line prefix
        pub fn was_called(&self, prefix: &str) -> bool {
            self.call_count(prefix) > 0
        }

        /// Number of calls starting with the given command-line prefix
        pub fn call_count(&self, prefix: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.command_line().starts_with(prefix))
                .count()
        }

        fn record_call(&self, program: &str, args: &[&str]) -> String {
            let call = CommandCall {
                program: program.to_string(),
                args: args.iter().map(|s| s.to_string()).collect(),
            };
            let line = call.command_line();
            self.calls.lock().unwrap().push(call);
            line
        }

        fn get_response(&self, command_line: &str) -> MockResponse {
            self.responses
                .lock()
                .unwrap()
                .iter()
                .filter(|(prefix, _)| command_line.starts_with(prefix.as_str()))
                .max_by_key(|(prefix, _)| prefix.len())
                .map(|(_, response)| response.clone())
                .unwrap_or_else(|| self.default_response.lock().unwrap().clone())
        }
    }

    impl CommandExecutor for MockExecutor {
        fn run(
            &self,
            program: &str,
            args: &[&str],
            timeout: Duration,
        ) -> Result<CommandOutput, CommandError> {
            let command_line = self.record_call(program, args);
            match self.get_response(&command_line) {
                MockResponse::Success { stdout, stderr } => Ok(CommandOutput {
                    exit_code: 0,
                    stdout,
                    stderr,
                }),
                MockResponse::Failure { stderr, exit_code } => Ok(CommandOutput {
                    exit_code,
                    stdout: String::new(),
                    stderr,
                }),
                MockResponse::Timeout => Err(CommandError::Timeout {
                    command: command_line,
                    timeout,
                }),
                MockResponse::SpawnError => Err(CommandError::Spawn {
                    program: program.to_string(),
                    reason: "No such file or directory".to_string(),
                }),
            }
        }
    }
}
