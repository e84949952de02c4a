use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

fn procvisor() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_procvisor"));
    cmd.env("RUST_LOG", "warn")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    cmd
}

#[test]
fn leader_exit_fails_the_process() {
    let out = procvisor()
        .args(["--grace", "1", "--", "/bin/sh", "-c", "exit 0"])
        .output()
        .unwrap();

    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(
        stderr.contains("procvisor: leader exited unexpectedly"),
        "stderr: {stderr}"
    );
}

#[test]
fn failing_sentinel_fails_the_process() {
    let out = procvisor()
        .args(["--grace", "1", "--sentinel", "exit 3", "--", "sleep", "30"])
        .output()
        .unwrap();

    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("exit 3"));
}

#[test]
fn missing_leader_is_a_usage_error() {
    let out = procvisor().output().unwrap();
    assert_eq!(out.status.code(), Some(2));
}

#[cfg(unix)]
#[test]
fn sigterm_shuts_down_cleanly() {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let mut child = procvisor()
        .args(["--grace", "1", "--", "sleep", "30"])
        .spawn()
        .unwrap();
    std::thread::sleep(Duration::from_millis(500));
    kill(Pid::from_raw(child.id() as i32), Signal::SIGTERM).unwrap();

    let deadline = Instant::now() + Duration::from_secs(10);
    let status = loop {
        if let Some(status) = child.try_wait().unwrap() {
            break status;
        }
        assert!(Instant::now() < deadline, "procvisor did not stop");
        std::thread::sleep(Duration::from_millis(20));
    };
    assert_eq!(status.code(), Some(0));
}
