//! Integration tests for session lifecycle, dispatch and event handling,
//! run against an in-memory spawner.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{test_conductor, test_config, wait_until, work_dir, FakeSpawner};
use conductor::session::SnapshotStore;
use conductor::{Conductor, ConductorError, NewSession, SessionRole, SessionStatus};
use tempfile::TempDir;

fn new_session(name: &str, dir: &std::path::Path) -> NewSession {
    NewSession::new(Some(name), Some(dir.to_str().unwrap())).unwrap()
}

#[test]
fn test_create_starts_process_with_port_env() {
    let (conductor, spawner, dir) = test_conductor();
    let session = conductor
        .create_session(new_session("w1", &work_dir(&dir, "w1")).with_port(Some(56000)))
        .unwrap();

    assert_eq!(session.status, SessionStatus::Working);
    assert_eq!(session.mcp_port, 56000);
    assert!(conductor.has_handle(session.id));

    let spec = spawner.last_spec(session.id).unwrap();
    assert_eq!(spec.directory, work_dir(&dir, "w1"));
    assert!(spec
        .env
        .iter()
        .any(|(k, v)| k == "MCP_PORT" && v == "56000"));
    assert_eq!(spec.args.last().map(String::as_str), Some("claude"));
}

#[test]
fn test_initial_prompt_dispatched_after_start() {
    let (conductor, spawner, dir) = test_conductor();
    let session = conductor
        .create_session(
            new_session("w1", &work_dir(&dir, "w1"))
                .with_initial_prompt(Some("list the open TODOs".to_string())),
        )
        .unwrap();

    assert_eq!(session.status, SessionStatus::Working);
    assert_eq!(
        spawner.writes(session.id),
        vec!["list the open TODOs\r".to_string()]
    );
    let tasks = conductor.tasks(Some(session.id));
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].prompt, "list the open TODOs");
}

#[test]
fn test_initial_prompt_skipped_when_start_fails() {
    let (conductor, spawner, dir) = test_conductor();
    let session = conductor
        .create_session(
            new_session("ghost", &dir.path().join("missing"))
                .with_initial_prompt(Some("hello".to_string())),
        )
        .unwrap();

    assert_eq!(session.status, SessionStatus::Error);
    assert_eq!(spawner.total_writes(), 0);
    assert!(conductor.tasks(None).is_empty());
}

#[test]
fn test_ports_are_allocated_distinctly() {
    let (conductor, _spawner, dir) = test_conductor();
    let a = conductor
        .create_session(new_session("a", &work_dir(&dir, "a")))
        .unwrap();
    let b = conductor
        .create_session(new_session("b", &work_dir(&dir, "b")))
        .unwrap();

    assert_ne!(a.id, b.id);
    assert_ne!(a.mcp_port, b.mcp_port);
}

#[test]
fn test_restart_keeps_single_handle() {
    let (conductor, spawner, dir) = test_conductor();
    let id = conductor
        .create_session(new_session("w", &work_dir(&dir, "w")))
        .unwrap()
        .id;

    conductor.start_session(id).unwrap();
    conductor.stop_session(id).unwrap();
    assert!(!conductor.has_handle(id));
    conductor.start_session(id).unwrap();
    conductor.start_session(id).unwrap();

    assert_eq!(conductor.handle_count(), 1);
    assert_eq!(spawner.live_count(id), 1);
    assert_eq!(spawner.spawn_count(), 4);
}

#[test]
fn test_stop_sets_idle_and_is_safe_twice() {
    let (conductor, _spawner, dir) = test_conductor();
    let id = conductor
        .create_session(new_session("w", &work_dir(&dir, "w")))
        .unwrap()
        .id;

    assert_eq!(conductor.stop_session(id).unwrap().status, SessionStatus::Idle);
    assert_eq!(conductor.stop_session(id).unwrap().status, SessionStatus::Idle);
    assert!(matches!(
        conductor.stop_session(999),
        Err(ConductorError::NotFound(999))
    ));
}

#[test]
fn test_missing_directory_sets_error_but_keeps_session() {
    let (conductor, _spawner, dir) = test_conductor();
    let missing = dir.path().join("does-not-exist");

    let session = conductor
        .create_session(new_session("ghost", &missing))
        .unwrap();

    assert_eq!(session.status, SessionStatus::Error);
    assert!(session.last_error.is_some());
    assert_eq!(conductor.session_count(), 1);
    assert!(!conductor.has_handle(session.id));
}

#[test]
fn test_broadcast_skips_conductor_role() {
    let (conductor, spawner, dir) = test_conductor();
    let lead = conductor
        .create_session(
            new_session("lead", &work_dir(&dir, "lead")).with_role(SessionRole::Conductor),
        )
        .unwrap();
    let workers: Vec<_> = (0..3)
        .map(|i| {
            let name = format!("w{i}");
            conductor
                .create_session(new_session(&name, &work_dir(&dir, &name)))
                .unwrap()
                .id
        })
        .collect();

    let receipts = conductor.broadcast("run the tests").unwrap();

    assert_eq!(receipts.len(), 3);
    assert!(receipts.iter().all(|r| r.delivered));
    assert!(spawner.writes(lead.id).is_empty());
    for id in workers {
        assert_eq!(spawner.writes(id), vec!["run the tests\r".to_string()]);
    }
    assert_eq!(spawner.total_writes(), 3);
    assert_eq!(conductor.tasks(None).len(), 3);
}

#[test]
fn test_broadcast_with_no_workers_is_empty() {
    let (conductor, spawner, _dir) = test_conductor();
    assert!(conductor.broadcast("hello").unwrap().is_empty());
    assert_eq!(spawner.total_writes(), 0);
}

#[test]
fn test_send_validates_before_lookup() {
    let (conductor, _spawner, _dir) = test_conductor();
    assert!(matches!(
        conductor.send(42, "   "),
        Err(ConductorError::Validation(_))
    ));
    assert!(matches!(
        conductor.send(42, "hi"),
        Err(ConductorError::NotFound(42))
    ));
}

#[test]
fn test_send_to_stopped_session_records_task_without_delivery() {
    let (conductor, spawner, dir) = test_conductor();
    let id = conductor
        .create_session(new_session("w", &work_dir(&dir, "w")))
        .unwrap()
        .id;
    conductor.stop_session(id).unwrap();

    let receipt = conductor.send(id, "anyone there?").unwrap();

    assert!(!receipt.delivered);
    assert_eq!(conductor.session(id).unwrap().status, SessionStatus::Idle);
    assert_eq!(conductor.tasks(Some(id)).len(), 1);
    assert!(spawner.writes(id).is_empty());
}

#[test]
fn test_failed_write_marks_disconnected() {
    let (conductor, spawner, dir) = test_conductor();
    let id = conductor
        .create_session(new_session("w", &work_dir(&dir, "w")))
        .unwrap()
        .id;
    spawner.fail_writes();

    let receipt = conductor.send(id, "hello").unwrap();

    assert!(!receipt.delivered);
    assert_eq!(
        conductor.session(id).unwrap().status,
        SessionStatus::Disconnected
    );
    assert!(!conductor.has_handle(id));
}

#[test]
fn test_prompt_output_moves_working_to_waiting() {
    let (conductor, spawner, dir) = test_conductor();
    let id = conductor
        .create_session(new_session("w", &work_dir(&dir, "w")))
        .unwrap()
        .id;

    conductor.apply_event(spawner.output_event(id, "Thinking...\n"));
    assert_eq!(conductor.session(id).unwrap().status, SessionStatus::Working);

    conductor.apply_event(spawner.output_event(id, "Done.\n\x1b[1m> \x1b[0m"));
    assert_eq!(
        conductor.session(id).unwrap().status,
        SessionStatus::WaitingForInput
    );

    conductor.send(id, "next").unwrap();
    assert_eq!(conductor.session(id).unwrap().status, SessionStatus::Working);
}

#[test]
fn test_output_is_stripped_and_limited() {
    let (conductor, spawner, dir) = test_conductor();
    let id = conductor
        .create_session(new_session("w", &work_dir(&dir, "w")))
        .unwrap()
        .id;

    conductor.apply_event(spawner.output_event(id, "one\n\x1b[32mtwo\x1b[0m\nthree\n"));

    // The trailing newline ends an empty last line
    let output = conductor.output(id, Some(3)).unwrap();
    assert_eq!(output.output, "two\nthree\n");
    assert!(!output.awaiting_input);
    assert!(matches!(
        conductor.output(7, None),
        Err(ConductorError::NotFound(7))
    ));
}

#[test]
fn test_exit_event_sets_disconnected_via_pump() {
    let (conductor, spawner, dir) = test_conductor();
    let id = conductor
        .create_session(new_session("w", &work_dir(&dir, "w")))
        .unwrap()
        .id;

    spawner.emit(spawner.exit_event(id));

    assert!(wait_until(Duration::from_secs(2), || {
        conductor.session(id).unwrap().status == SessionStatus::Disconnected
    }));
    assert!(!conductor.has_handle(id));
}

#[test]
fn test_stale_generation_events_ignored() {
    let (conductor, spawner, dir) = test_conductor();
    let id = conductor
        .create_session(new_session("w", &work_dir(&dir, "w")))
        .unwrap()
        .id;
    let old_exit = spawner.exit_event(id);
    let old_output = spawner.output_event(id, "stale\n> ");

    conductor.start_session(id).unwrap();
    conductor.apply_event(old_exit);
    conductor.apply_event(old_output);

    let session = conductor.session(id).unwrap();
    assert_eq!(session.status, SessionStatus::Working);
    assert!(conductor.has_handle(id));
    assert_eq!(conductor.output(id, None).unwrap().output, "");
}

#[test]
fn test_delete_removes_session_and_unknown_id_is_not_found() {
    let (conductor, _spawner, dir) = test_conductor();
    let a = conductor
        .create_session(new_session("a", &work_dir(&dir, "a")))
        .unwrap()
        .id;
    let b = conductor
        .create_session(new_session("b", &work_dir(&dir, "b")))
        .unwrap()
        .id;

    assert!(matches!(
        conductor.remove_session(999),
        Err(ConductorError::NotFound(999))
    ));
    assert_eq!(conductor.session_count(), 2);

    conductor.remove_session(a).unwrap();
    assert_eq!(conductor.session_count(), 1);
    assert!(!conductor.has_handle(a));
    assert!(conductor.has_handle(b));
    assert!(matches!(conductor.session(a), Err(ConductorError::NotFound(_))));
}

#[test]
fn test_delete_asks_live_process_to_exit() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    config.agent.stop_grace_ms = 100;
    let spawner = FakeSpawner::new();
    let conductor = Conductor::new(&config, Arc::new(spawner.clone()), None);
    let id = conductor
        .create_session(new_session("w", &work_dir(&dir, "w")))
        .unwrap()
        .id;

    conductor.remove_session(id).unwrap();

    assert_eq!(spawner.writes(id), vec!["/exit\r".to_string()]);
    assert_eq!(spawner.live_count(id), 0);
}

#[test]
fn test_snapshot_restores_sessions_idle() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let w1 = work_dir(&dir, "w1");

    let (first_id, first_port) = {
        let conductor = Conductor::new(
            &config,
            Arc::new(FakeSpawner::new()),
            Some(SnapshotStore::new(config.snapshot_path())),
        );
        let session = conductor.create_session(new_session("w1", &w1)).unwrap();
        conductor
            .create_session(
                new_session("lead", &work_dir(&dir, "lead")).with_role(SessionRole::Conductor),
            )
            .unwrap();
        conductor.shutdown();
        (session.id, session.mcp_port)
    };

    let spawner = FakeSpawner::new();
    let restored = Conductor::new(
        &config,
        Arc::new(spawner.clone()),
        Some(SnapshotStore::new(config.snapshot_path())),
    );

    let sessions = restored.list_sessions();
    assert_eq!(sessions.len(), 2);
    assert!(sessions.iter().all(|s| s.status == SessionStatus::Idle));
    assert_eq!(sessions[0].id, first_id);
    assert_eq!(sessions[0].directory, w1);
    assert_eq!(sessions[0].mcp_port, first_port);
    assert_eq!(sessions[1].role, SessionRole::Conductor);
    assert_eq!(spawner.spawn_count(), 0);

    // New ids continue after the restored ones
    let next = restored
        .create_session(new_session("w2", &work_dir(&dir, "w2")))
        .unwrap();
    assert!(next.id > sessions[1].id);
}

#[test]
fn test_autostart_restored_sessions() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    {
        let conductor = Conductor::new(
            &config,
            Arc::new(FakeSpawner::new()),
            Some(SnapshotStore::new(config.snapshot_path())),
        );
        conductor
            .create_session(new_session("w", &work_dir(&dir, "w")))
            .unwrap();
    }

    config.agent.autostart_restored = true;
    let spawner = FakeSpawner::new();
    let restored = Conductor::new(
        &config,
        Arc::new(spawner.clone()),
        Some(SnapshotStore::new(config.snapshot_path())),
    );

    assert_eq!(spawner.spawn_count(), 1);
    assert_eq!(restored.list_sessions()[0].status, SessionStatus::Working);
}

#[test]
fn test_shutdown_stops_everything() {
    let (conductor, spawner, dir) = test_conductor();
    let a = conductor
        .create_session(new_session("a", &work_dir(&dir, "a")))
        .unwrap()
        .id;
    conductor
        .create_session(new_session("b", &work_dir(&dir, "b")))
        .unwrap();

    conductor.shutdown();

    assert_eq!(conductor.handle_count(), 0);
    assert_eq!(spawner.live_count(a), 0);
    assert!(conductor
        .list_sessions()
        .iter()
        .all(|s| s.status == SessionStatus::Idle));
}
