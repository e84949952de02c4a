//! # Command specification for supervised processes.
//!
//! [`CommandSpec`] describes how to launch one OS process: the argument vector plus
//! launch options (working directory, extra environment). The same spec is reused
//! for every restart of the leader and every run of a sentinel check.
//!
//! A spec can be created:
//! - **From an argument vector** with [`CommandSpec::new`]
//! - **From a shell command line** with [`CommandSpec::shell`]
//!
//! ## Example
//! ```rust
//! use procvisor::CommandSpec;
//!
//! let leader = CommandSpec::new(["./wpt", "serve"]).unwrap();
//! assert_eq!(leader.to_string(), "./wpt serve");
//!
//! let sentinel = CommandSpec::shell("/bin/sh", "sync-wpt.py");
//! assert_eq!(sentinel.argv(), ["/bin/sh", "-c", "sync-wpt.py"]);
//! ```

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::{Child, Command};

use crate::error::CommandError;

/// Specification of a command to launch as a child process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    argv: Vec<String>,
    /// Set by [`CommandSpec::shell`]; `argv[2]` is then the command line.
    shell_line: bool,
    cwd: Option<PathBuf>,
    env: Vec<(OsString, OsString)>,
}

impl CommandSpec {
    /// Creates a spec from an argument vector (`argv[0]` is the program).
    ///
    /// Returns [`CommandError::Empty`] if the vector is empty.
    pub fn new<I, S>(argv: I) -> Result<Self, CommandError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let argv: Vec<String> = argv.into_iter().map(Into::into).collect();
        if argv.is_empty() {
            return Err(CommandError::Empty);
        }
        Ok(Self {
            argv,
            shell_line: false,
            cwd: None,
            env: Vec::new(),
        })
    }

    /// Wraps a single command line as `<shell> -c <line>`.
    pub fn shell(shell: impl AsRef<Path>, line: impl Into<String>) -> Self {
        Self {
            argv: vec![
                shell.as_ref().to_string_lossy().into_owned(),
                "-c".to_string(),
                line.into(),
            ],
            shell_line: true,
            cwd: None,
            env: Vec::new(),
        }
    }

    /// Returns a new spec that runs in `dir`.
    pub fn with_cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Returns a new spec with an extra environment variable.
    pub fn with_env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Returns the argument vector.
    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    /// Launches the command.
    ///
    /// Stdio is inherited; the child is killed if its handle is dropped. On Unix the
    /// child leads a new process group so that signals reach its descendants too.
    pub(crate) fn spawn(&self) -> std::io::Result<Child> {
        let (program, args) = self
            .argv
            .split_first()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty argv"))?;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        for (k, v) in &self.env {
            cmd.env(k, v);
        }
        #[cfg(unix)]
        cmd.process_group(0);
        cmd.spawn()
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.argv.as_slice() {
            [_, _, line] if self.shell_line => f.write_str(line),
            argv => f.write_str(&argv.join(" ")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_argv_is_rejected() {
        let res = CommandSpec::new(Vec::<String>::new());
        assert_eq!(res, Err(CommandError::Empty));
    }

    #[test]
    fn display_joins_argv() {
        let spec = CommandSpec::new(["python", "-m", "http.server"]).unwrap();
        assert_eq!(spec.to_string(), "python -m http.server");
    }

    #[test]
    fn shell_spec_displays_the_line() {
        let spec = CommandSpec::shell("/bin/sh", "sleep 1 && exit 0");
        assert_eq!(spec.argv(), ["/bin/sh", "-c", "sleep 1 && exit 0"]);
        assert_eq!(spec.to_string(), "sleep 1 && exit 0");
    }

    #[test]
    fn argv_resembling_a_shell_call_displays_in_full() {
        let spec = CommandSpec::new(["ssh", "-c", "aes128-ctr"]).unwrap();
        assert_eq!(spec.to_string(), "ssh -c aes128-ctr");
    }

    #[test]
    fn builders_keep_options() {
        let spec = CommandSpec::new(["true"])
            .unwrap()
            .with_cwd("/tmp")
            .with_env("MARKER", "1");
        assert_eq!(spec.cwd.as_deref(), Some(Path::new("/tmp")));
        assert_eq!(spec.env.len(), 1);
    }

    #[tokio::test]
    async fn spawn_reports_exit_status() {
        let spec = CommandSpec::shell("/bin/sh", "exit 3");
        let mut child = spec.spawn().unwrap();
        let status = child.wait().await.unwrap();
        assert_eq!(status.code(), Some(3));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn child_leads_its_own_process_group() {
        let child = CommandSpec::new(["sleep", "5"]).unwrap().spawn().unwrap();
        let pid = nix::unistd::Pid::from_raw(child.id().unwrap() as i32);
        assert_eq!(nix::unistd::getpgid(Some(pid)).unwrap(), pid);
    }
}
