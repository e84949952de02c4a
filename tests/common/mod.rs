#![allow(dead_code)]

use std::path::Path;
use std::time::Duration;

use procvisor::{CommandSpec, Event, EventKind};
use tokio::sync::broadcast;

/// Leader script: logs `start`, logs `int` on SIGINT/SIGTERM and exits 0.
pub fn leader(dir: &Path) -> CommandSpec {
    let log = dir.join("leader.log");
    let line = format!(
        "echo start >> '{log}'; trap 'echo int >> \"{log}\"; exit 0' INT TERM; while :; do sleep 0.1; done",
        log = log.display()
    );
    CommandSpec::shell("/bin/sh", line)
}

/// Leader script that ignores SIGINT.
pub fn stubborn_leader(dir: &Path) -> CommandSpec {
    let log = dir.join("leader.log");
    let line = format!(
        "echo start >> '{log}'; trap '' INT; while :; do sleep 0.1; done",
        log = log.display()
    );
    CommandSpec::shell("/bin/sh", line)
}

/// Lines written to `leader.log` so far.
pub fn leader_log(dir: &Path) -> Vec<String> {
    std::fs::read_to_string(dir.join("leader.log"))
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

/// Number of `start` lines in `leader.log`.
pub fn starts(dir: &Path) -> usize {
    leader_log(dir).iter().filter(|l| *l == "start").count()
}

/// Polls `cond` every 20ms; panics after 10s.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while !cond() {
        assert!(tokio::time::Instant::now() < deadline, "condition not met in time");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Drains every event currently buffered in `rx`.
pub fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut out = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(ev) => out.push(ev),
            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    out
}

/// Pids carried by events of the given kinds.
pub fn pids(events: &[Event], kinds: &[EventKind]) -> Vec<u32> {
    events
        .iter()
        .filter(|e| kinds.contains(&e.kind))
        .filter_map(|e| e.pid)
        .collect()
}

/// True if a process with `pid` is still running. Zombies count as gone.
pub fn alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    if kill(Pid::from_raw(pid as i32), None).is_err() {
        return false;
    }
    // Orphans are reaped by whatever init the host runs; do not wait on that.
    match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
        Ok(stat) => stat
            .rsplit_once(") ")
            .map_or(true, |(_, rest)| !rest.starts_with('Z')),
        Err(_) => !std::path::Path::new("/proc/self").exists(),
    }
}

/// Reads a pid written by a test script.
pub fn read_pid(path: &Path) -> Option<u32> {
    std::fs::read_to_string(path).ok()?.trim().parse().ok()
}
