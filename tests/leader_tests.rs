mod common;

use std::sync::Arc;
use std::time::Duration;

use procvisor::{Bus, CommandSpec, Config, EventKind, FatalCondition, Leader, RestartError};

use common::{alive, drain, leader, leader_log, read_pid, starts, stubborn_leader, wait_until};

fn new_leader(cmd: CommandSpec, cfg: &Config) -> (Arc<Leader>, Bus) {
    let bus = Bus::new(1024);
    (Arc::new(Leader::new(cmd, cfg, bus.clone())), bus)
}

#[tokio::test(flavor = "multi_thread")]
async fn restart_interrupts_old_instance_before_starting_new_one() {
    let dir = tempfile::tempdir().unwrap();
    let (leader, _bus) = new_leader(leader(dir.path()), &Config::default());

    let run = tokio::spawn({
        let leader = Arc::clone(&leader);
        async move { leader.run_forever().await }
    });
    wait_until(|| starts(dir.path()) == 1).await;

    leader.restart().await.unwrap();
    assert_eq!(leader.instances(), 2);
    wait_until(|| leader_log(dir.path()).len() == 3).await;
    assert_eq!(leader_log(dir.path()), ["start", "int", "start"]);

    leader.kill();
    run.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn unexpected_exit_is_fatal() {
    let (leader, _bus) = new_leader(
        CommandSpec::shell("/bin/sh", "sleep 0.2; exit 0"),
        &Config::default(),
    );

    let res = tokio::time::timeout(Duration::from_secs(5), leader.run_forever())
        .await
        .expect("leader loop did not end");
    assert!(matches!(
        res,
        Err(FatalCondition::LeaderExitedUnexpectedly { .. })
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn restart_after_leader_is_gone_is_refused() {
    let (leader, _bus) = new_leader(CommandSpec::shell("/bin/sh", "exit 0"), &Config::default());

    assert!(leader.run_forever().await.is_err());
    assert_eq!(leader.restart().await, Err(RestartError::LeaderGone));
}

#[tokio::test(flavor = "multi_thread")]
async fn spawn_failure_is_fatal() {
    let (leader, _bus) = new_leader(
        CommandSpec::new(["/nonexistent/procvisor-leader"]).unwrap(),
        &Config::default(),
    );

    let err = leader.run_forever().await.unwrap_err();
    assert_eq!(err.as_label(), "spawn_failed");
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_restarts_never_interleave() {
    let dir = tempfile::tempdir().unwrap();
    let (leader, bus) = new_leader(leader(dir.path()), &Config::default());
    let mut rx = bus.subscribe();

    let run = tokio::spawn({
        let leader = Arc::clone(&leader);
        async move { leader.run_forever().await }
    });
    wait_until(|| starts(dir.path()) == 1).await;

    let restarts: Vec<_> = (0..3)
        .map(|_| {
            let leader = Arc::clone(&leader);
            tokio::spawn(async move { leader.restart().await })
        })
        .collect();
    for r in restarts {
        r.await.unwrap().unwrap();
    }
    assert_eq!(leader.instances(), 4);

    leader.kill();
    run.await.unwrap().unwrap();

    let lifecycle: Vec<EventKind> = drain(&mut rx)
        .into_iter()
        .map(|e| e.kind)
        .filter(|k| matches!(k, EventKind::LeaderStarted | EventKind::LeaderExited))
        .collect();
    assert_eq!(lifecycle.len(), 8);
    for pair in lifecycle.chunks(2) {
        assert_eq!(pair, [EventKind::LeaderStarted, EventKind::LeaderExited]);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn kill_during_handshake_releases_restart_caller() {
    let dir = tempfile::tempdir().unwrap();
    let (leader, _bus) = new_leader(stubborn_leader(dir.path()), &Config::default());

    let run = tokio::spawn({
        let leader = Arc::clone(&leader);
        async move { leader.run_forever().await }
    });
    wait_until(|| starts(dir.path()) == 1).await;

    let restart = tokio::spawn({
        let leader = Arc::clone(&leader);
        async move { leader.restart().await }
    });
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!restart.is_finished());

    leader.kill();
    run.await.unwrap().unwrap();
    assert_eq!(restart.await.unwrap(), Err(RestartError::LeaderGone));
    assert_eq!(leader.pid(), None);
}

#[tokio::test(flavor = "multi_thread")]
async fn interrupt_grace_escalates_to_kill() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = Config {
        interrupt_grace: Some(Duration::from_millis(200)),
        ..Config::default()
    };
    let (leader, bus) = new_leader(stubborn_leader(dir.path()), &cfg);
    let mut rx = bus.subscribe();

    let run = tokio::spawn({
        let leader = Arc::clone(&leader);
        async move { leader.run_forever().await }
    });
    wait_until(|| starts(dir.path()) == 1).await;

    tokio::time::timeout(Duration::from_secs(5), leader.restart())
        .await
        .expect("restart hung")
        .unwrap();
    assert_eq!(leader.instances(), 2);

    leader.kill();
    run.await.unwrap().unwrap();

    let kinds: Vec<EventKind> = drain(&mut rx).into_iter().map(|e| e.kind).collect();
    assert!(kinds.contains(&EventKind::LeaderForceKilled));
    assert!(kinds.contains(&EventKind::LeaderRestarted));
}

#[tokio::test(flavor = "multi_thread")]
async fn restart_leaves_no_process_of_the_old_instance() {
    let dir = tempfile::tempdir().unwrap();
    let gc = dir.path().join("gc.pid");
    let cmd = CommandSpec::shell(
        "/bin/sh",
        format!("sleep 30 & echo $! > '{}'; trap 'exit 0' INT; wait", gc.display()),
    );
    let (leader, _bus) = new_leader(cmd, &Config::default());

    let run = tokio::spawn({
        let leader = Arc::clone(&leader);
        async move { leader.run_forever().await }
    });
    wait_until(|| read_pid(&gc).is_some()).await;
    let old = read_pid(&gc).unwrap();
    std::fs::remove_file(&gc).unwrap();

    leader.restart().await.unwrap();
    wait_until(|| !alive(old)).await;
    wait_until(|| read_pid(&gc).is_some()).await;
    assert!(alive(read_pid(&gc).unwrap()));

    leader.kill();
    run.await.unwrap().unwrap();
}
