//! Error types used by the procvisor runtime.
//!
//! This module defines three enums:
//!
//! - [`FatalCondition`] - a failure that ends the whole supervisor.
//! - [`RestartError`] - a restart request that could not be honored.
//! - [`CommandError`] - an invalid command specification.
//!
//! Each type provides `as_label` for logs/metrics, mirroring the event kinds.

use std::process::ExitStatus;

use thiserror::Error;

/// # Conditions that terminate the supervisor.
///
/// Produced by exactly one of the concurrent tasks (leader loop or a sentinel loop)
/// and consumed once by the coordinator, which kills every tracked process and
/// reports the condition at the process boundary.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum FatalCondition {
    /// Leader process terminated without a preceding restart request.
    #[error("leader exited unexpectedly ({command})")]
    LeaderExitedUnexpectedly {
        /// Leader command line.
        command: String,
    },

    /// A sentinel check exited with a nonzero status.
    #[error("sentinel exited with non-zero exit code ({command}): {status}")]
    SentinelFailed {
        /// Sentinel command line.
        command: String,
        /// Exit status reported by the OS.
        status: ExitStatus,
    },

    /// A command could not be launched at all.
    #[error("failed to spawn ({command}): {source}")]
    SpawnFailed {
        /// Command line that failed to start.
        command: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// Waiting on a running child failed.
    #[error("failed to wait on ({command}): {source}")]
    WaitFailed {
        /// Command line of the child.
        command: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },
}

impl FatalCondition {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use procvisor::FatalCondition;
    ///
    /// let err = FatalCondition::LeaderExitedUnexpectedly { command: "./wpt serve".into() };
    /// assert_eq!(err.as_label(), "leader_exited_unexpectedly");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            FatalCondition::LeaderExitedUnexpectedly { .. } => "leader_exited_unexpectedly",
            FatalCondition::SentinelFailed { .. } => "sentinel_failed",
            FatalCondition::SpawnFailed { .. } => "spawn_failed",
            FatalCondition::WaitFailed { .. } => "wait_failed",
        }
    }

    /// Returns the command line that caused the condition.
    pub fn command(&self) -> &str {
        match self {
            FatalCondition::LeaderExitedUnexpectedly { command }
            | FatalCondition::SentinelFailed { command, .. }
            | FatalCondition::SpawnFailed { command, .. }
            | FatalCondition::WaitFailed { command, .. } => command,
        }
    }
}

/// # Errors returned by [`Leader::restart`](crate::Leader::restart).
#[non_exhaustive]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartError {
    /// The leader loop is no longer running (fatal exit or shutdown); the request was discarded.
    #[error("leader is gone; restart request discarded")]
    LeaderGone,
}

impl RestartError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RestartError::LeaderGone => "restart_leader_gone",
        }
    }
}

/// # Errors produced while building a [`CommandSpec`](crate::CommandSpec).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// The argument vector has no program.
    #[error("command is empty")]
    Empty,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leader_condition_names_the_command() {
        let err = FatalCondition::LeaderExitedUnexpectedly {
            command: "./wpt serve".into(),
        };
        assert_eq!(err.command(), "./wpt serve");
        assert_eq!(err.to_string(), "leader exited unexpectedly (./wpt serve)");
    }

    #[test]
    fn spawn_failure_keeps_source() {
        let err = FatalCondition::SpawnFailed {
            command: "missing-binary".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        };
        assert_eq!(err.as_label(), "spawn_failed");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn restart_error_label() {
        assert_eq!(RestartError::LeaderGone.as_label(), "restart_leader_gone");
    }
}
