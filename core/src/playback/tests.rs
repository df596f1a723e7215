//! Tests for the playback session

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::*;
use crate::command::CommandRegistry;
use crate::config::EngineConfig;
use crate::script::Actions;

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

/// Replace a script and push its modification time forward
fn edit(path: &Path, content: &str) {
    let before = fs::metadata(path).unwrap().modified().unwrap();
    fs::write(path, content).unwrap();
    fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(before + Duration::from_secs(5))
        .unwrap();
}

fn session(root: &Path) -> Session {
    Session::new(
        root,
        Arc::new(CommandRegistry::with_builtins()),
        EngineConfig::default(),
    )
}

fn applied_actions(host: &HeadlessHost) -> Vec<Actions> {
    host.applied().iter().map(|tick| tick.actions).collect()
}

#[derive(Clone, Default)]
struct RecordingEditor {
    positions: Arc<Mutex<Vec<EditorPosition>>>,
    lines: Arc<Mutex<BTreeMap<usize, String>>>,
}

impl EditorLink for RecordingEditor {
    fn update_position(&mut self, position: &EditorPosition) {
        self.positions.lock().unwrap().push(*position);
    }

    fn replace_lines(&mut self, lines: &BTreeMap<usize, String>) {
        self.lines.lock().unwrap().extend(lines.clone());
    }
}

#[test]
fn test_one_frame_per_tick_until_finished() {
    let dir = tempfile::tempdir().unwrap();
    let root = write(dir.path(), "run.tas", "3,R\n2,J\n");
    let mut host = HeadlessHost::new();
    let mut session = session(&root);

    assert_eq!(session.tick(&mut host), TickOutcome::Inactive);
    session.start(&mut host).unwrap();
    assert_eq!(session.state(), PlaybackState::Playing);

    for _ in 0..5 {
        assert!(matches!(session.tick(&mut host), TickOutcome::Applied(_)));
    }
    assert_eq!(session.state(), PlaybackState::Finished);
    assert_eq!(session.tick(&mut host), TickOutcome::Inactive);

    assert_eq!(
        applied_actions(&host),
        vec![
            Actions::RIGHT,
            Actions::RIGHT,
            Actions::RIGHT,
            Actions::JUMP,
            Actions::JUMP
        ]
    );
}

#[test]
fn test_cursor_accessors() {
    let dir = tempfile::tempdir().unwrap();
    let root = write(dir.path(), "run.tas", "1,R\n1,J\n1,X\n");
    let mut host = HeadlessHost::new();
    let mut session = session(&root);
    session.start(&mut host).unwrap();

    assert!(session.previous_input().is_none());
    session.tick(&mut host);
    assert_eq!(session.previous_input().unwrap().actions, Actions::RIGHT);
    assert_eq!(session.current_input().unwrap().actions, Actions::JUMP);
    assert_eq!(session.next_input().unwrap().actions, Actions::DASH);
    assert_eq!(session.cursor().index, 1);
}

#[test]
fn test_loading_host_leaves_cursor_alone() {
    let dir = tempfile::tempdir().unwrap();
    let root = write(dir.path(), "run.tas", "3\n");
    let mut host = HeadlessHost::new();
    let mut session = session(&root);
    session.start(&mut host).unwrap();

    host.set_loading(true);
    assert_eq!(session.tick(&mut host), TickOutcome::Waiting);
    assert_eq!(session.tick(&mut host), TickOutcome::Waiting);
    assert_eq!(session.cursor(), Cursor::default());
    assert!(host.applied().is_empty());

    host.set_loading(false);
    assert!(matches!(session.tick(&mut host), TickOutcome::Applied(_)));
    assert_eq!(session.cursor().frame, 1);
}

#[test]
fn test_pauses_at_marker_and_resumes_through_it() {
    let dir = tempfile::tempdir().unwrap();
    let root = write(dir.path(), "run.tas", "5\n***\n5\n");
    let mut host = HeadlessHost::new();
    let mut session = session(&root);
    session.start(&mut host).unwrap();

    assert!(session.has_fast_forward());
    assert_eq!(session.playback_speed(), 400);

    for _ in 0..5 {
        assert!(matches!(session.tick(&mut host), TickOutcome::Applied(_)));
    }
    assert_eq!(session.tick(&mut host), TickOutcome::Paused);
    assert_eq!(session.state(), PlaybackState::Paused);
    assert!(!session.has_fast_forward());
    assert_eq!(session.playback_speed(), 1);
    assert_eq!(session.tick(&mut host), TickOutcome::Paused);

    session.resume();
    for _ in 0..5 {
        assert!(matches!(session.tick(&mut host), TickOutcome::Applied(_)));
    }
    assert_eq!(session.state(), PlaybackState::Finished);
}

#[test]
fn test_fast_forward_speed_follows_remaining_markers() {
    let dir = tempfile::tempdir().unwrap();
    let root = write(dir.path(), "run.tas", "2\n***8\n2\n***\n1\n");
    let mut host = HeadlessHost::new();
    let mut session = session(&root);
    session.start(&mut host).unwrap();

    assert_eq!(session.fast_forward_speed(), 8);
    session.tick(&mut host);
    session.tick(&mut host);
    assert_eq!(session.tick(&mut host), TickOutcome::Paused);

    session.resume();
    session.tick(&mut host);
    assert_eq!(session.fast_forward_speed(), 400);
}

#[test]
fn test_step_plays_one_frame() {
    let dir = tempfile::tempdir().unwrap();
    let root = write(dir.path(), "run.tas", "4\n");
    let mut host = HeadlessHost::new();
    let mut session = session(&root);
    session.start(&mut host).unwrap();

    session.tick(&mut host);
    session.pause();
    assert_eq!(session.tick(&mut host), TickOutcome::Paused);

    session.step();
    assert!(matches!(session.tick(&mut host), TickOutcome::Applied(_)));
    assert_eq!(session.state(), PlaybackState::Paused);
    assert_eq!(session.cursor().frame, 2);
    assert_eq!(session.tick(&mut host), TickOutcome::Paused);

    session.resume();
    session.tick(&mut host);
    session.tick(&mut host);
    assert_eq!(session.state(), PlaybackState::Finished);
}

#[test]
fn test_stop_drops_the_timeline() {
    let dir = tempfile::tempdir().unwrap();
    let root = write(dir.path(), "run.tas", "4\n");
    let mut host = HeadlessHost::new();
    let mut session = session(&root);
    session.start(&mut host).unwrap();
    session.tick(&mut host);

    session.stop();
    assert_eq!(session.state(), PlaybackState::Stopped);
    assert!(session.timeline().is_empty());
    assert_eq!(session.tick(&mut host), TickOutcome::Inactive);
}

#[test]
fn test_runtime_commands_fire_at_their_frame() {
    let dir = tempfile::tempdir().unwrap();
    let root = write(dir.path(), "run.tas", "Console, load, 1\n2\nPress, t\n1\n");
    let mut host = HeadlessHost::new();
    let mut session = session(&root);
    session.start(&mut host).unwrap();

    session.tick(&mut host);
    assert_eq!(
        host.console_commands(),
        &[vec!["load".to_string(), "1".to_string()]]
    );

    session.tick(&mut host);
    match session.tick(&mut host) {
        TickOutcome::Applied(input) => assert_eq!(input.extra_keys, vec!["T".to_string()]),
        other => panic!("expected applied tick, got {other:?}"),
    }
    assert_eq!(host.console_commands().len(), 1);
    assert!(host.applied()[0].extra_keys.is_empty());
}

#[test]
fn test_restricted_timeline_skips_illegal_commands() {
    let dir = tempfile::tempdir().unwrap();
    let root = write(dir.path(), "run.tas", "Console, load\nEnforceLegal\n2\n");
    let mut host = HeadlessHost::new();
    let mut session = session(&root);
    session.start(&mut host).unwrap();

    session.tick(&mut host);
    assert!(host.console_commands().is_empty());
}

#[test]
fn test_hot_reload_keeps_position_without_refiring() {
    let dir = tempfile::tempdir().unwrap();
    let root = write(
        dir.path(),
        "run.tas",
        "RecordCount: 0\nConsole, hello\n3\n3\n",
    );
    let mut host = HeadlessHost::new();
    let mut session = session(&root);
    session.start(&mut host).unwrap();
    session.tick(&mut host);
    session.tick(&mut host);
    assert_eq!(host.console_commands().len(), 1);

    edit(&root, "RecordCount: 0\nConsole, hello\n3\n3,J\n3\n");
    assert!(matches!(session.tick(&mut host), TickOutcome::Applied(_)));
    assert_eq!(session.timeline().frame_count(), 9);
    assert_eq!(session.cursor().frame, 3);
    assert_eq!(host.console_commands().len(), 1);

    match session.tick(&mut host) {
        TickOutcome::Applied(input) => assert_eq!(input.actions, Actions::JUMP),
        other => panic!("expected applied tick, got {other:?}"),
    }

    let content = fs::read_to_string(&root).unwrap();
    assert!(content.starts_with("RecordCount: 1\n"));
    assert!(!session.tracker().is_stale());
}

#[test]
fn test_failed_reload_aborts() {
    let dir = tempfile::tempdir().unwrap();
    let root = write(dir.path(), "run.tas", "3\n");
    let mut host = HeadlessHost::new();
    let mut session = session(&root);
    session.start(&mut host).unwrap();
    session.tick(&mut host);

    edit(&root, "3,Z\n");
    assert_eq!(session.tick(&mut host), TickOutcome::Inactive);
    assert_eq!(session.state(), PlaybackState::Stopped);
    assert!(session.timeline().is_empty());
    assert!(host.aborted().is_some());
}

#[test]
fn test_build_error_on_start_aborts() {
    let dir = tempfile::tempdir().unwrap();
    let root = write(dir.path(), "run.tas", "Teleport\n");
    let mut host = HeadlessHost::new();
    let mut session = session(&root);

    assert!(session.start(&mut host).is_err());
    assert_eq!(session.state(), PlaybackState::Stopped);
    assert!(host.aborted().unwrap().contains("Teleport"));
}

#[test]
fn test_file_time_written_on_finish() {
    let dir = tempfile::tempdir().unwrap();
    let root = write(dir.path(), "run.tas", "3\nFileTime:\n");
    let editor = RecordingEditor::default();
    let mut host = HeadlessHost::new();
    let mut session = session(&root).with_editor(Box::new(editor.clone()));
    session.start(&mut host).unwrap();

    for _ in 0..3 {
        session.tick(&mut host);
    }
    assert_eq!(session.state(), PlaybackState::Finished);
    assert_eq!(
        fs::read_to_string(&root).unwrap(),
        "3\nFileTime: 0:00.050(3)\n"
    );
    assert_eq!(
        editor.lines.lock().unwrap().get(&2).map(String::as_str),
        Some("FileTime: 0:00.050(3)")
    );
}

#[test]
fn test_midway_file_time_written_when_reached() {
    let dir = tempfile::tempdir().unwrap();
    let root = write(dir.path(), "run.tas", "2\nMidwayFileTime:\n2\n");
    let mut host = HeadlessHost::new();
    let mut session = session(&root);
    session.start(&mut host).unwrap();

    for _ in 0..3 {
        session.tick(&mut host);
    }
    assert_eq!(
        fs::read_to_string(&root).unwrap(),
        "2\nMidwayFileTime: 0:00.033(2)\n2\n"
    );
    assert!(!session.tracker().is_stale());
}

#[test]
fn test_save_point_reused_only_while_prefix_matches() {
    let dir = tempfile::tempdir().unwrap();
    let root = write(dir.path(), "run.tas", "3\n***S\n2\n");
    let mut host = HeadlessHost::new();
    let mut session = session(&root);
    session.start(&mut host).unwrap();

    for _ in 0..3 {
        session.tick(&mut host);
    }
    assert_eq!(session.tick(&mut host), TickOutcome::Paused);
    session.resume();
    session.tick(&mut host);
    assert_eq!(session.save_point().map(|point| point.frame), Some(3));

    session.start(&mut host).unwrap();
    assert_eq!(session.cursor().frame, 3);
    assert!(matches!(session.tick(&mut host), TickOutcome::Applied(_)));

    fs::write(&root, "4\n***S\n2\n").unwrap();
    session.start(&mut host).unwrap();
    assert_eq!(session.cursor().frame, 0);
    assert!(session.save_point().is_none());
}

#[test]
fn test_editor_follows_split_inputs() {
    let dir = tempfile::tempdir().unwrap();
    let root = write(
        dir.path(),
        "run.tas",
        "AutoInput, 2\n1,S\nStartAutoInput\n4,R\nEndAutoInput\n",
    );
    let editor = RecordingEditor::default();
    let mut host = HeadlessHost::new();
    let mut session = session(&root).with_editor(Box::new(editor.clone()));
    session.start(&mut host).unwrap();
    for _ in 0..6 {
        session.tick(&mut host);
    }

    let positions: Vec<(usize, u32, u32, usize)> = editor
        .positions
        .lock()
        .unwrap()
        .iter()
        .map(|p| {
            (
                p.display_line,
                p.ticks_into_input,
                p.total_ticks_for_input,
                p.inputs_consumed,
            )
        })
        .collect();
    assert_eq!(
        positions,
        vec![
            (2, 1, 1, 0),
            (4, 1, 4, 1),
            (4, 2, 4, 1),
            (2, 1, 1, 2),
            (4, 3, 4, 3),
            (4, 4, 4, 3),
        ]
    );
}

#[test]
fn test_headless_runner_report() {
    let dir = tempfile::tempdir().unwrap();
    let root = write(dir.path(), "run.tas", "3,R\n***\n2,J\nConsole, x\n");

    let mut runner = HeadlessRunner::new(&root, EngineConfig::default());
    let report = runner.run().unwrap();

    assert_eq!(report.state, PlaybackState::Finished);
    assert_eq!(report.frame_count, 5);
    assert_eq!(report.frames_played, 5);
    assert_eq!(report.breakpoints, vec![3]);
    assert_eq!(report.checksum.len(), 16);

    let runs: Vec<(u64, u64, &str)> = report
        .runs
        .iter()
        .map(|run| (run.start_frame, run.duration, run.actions.as_str()))
        .collect();
    assert_eq!(runs, vec![(0, 3, "R"), (3, 2, "J")]);
    assert_eq!(runner.host().console_commands(), &[vec!["x".to_string()]]);

    let json = report.to_json().unwrap();
    assert!(json.contains("\"state\": \"finished\""));
}

#[test]
fn test_headless_runner_stops_at_tick_limit() {
    let dir = tempfile::tempdir().unwrap();
    let root = write(dir.path(), "run.tas", "100\n");

    let mut runner = HeadlessRunner::new(&root, EngineConfig::default()).with_max_ticks(10);
    let report = runner.run().unwrap();
    assert_eq!(report.frames_played, 10);
    assert_eq!(report.state, PlaybackState::Playing);
}

/// Host without a console, so `Console` fails through the default
#[derive(Default)]
struct ConsolelessHost {
    ticks: u64,
    aborted: bool,
}

impl Host for ConsolelessHost {
    fn apply_tick_input(&mut self, _input: &TickInput) {
        self.ticks += 1;
    }

    fn abort(&mut self, _message: &str, _show_dialog: bool, _notice: Option<Duration>) {
        self.aborted = true;
    }

    fn tick_counter(&self) -> u64 {
        self.ticks
    }
}

#[test]
fn test_failed_runtime_command_does_not_stop_playback() {
    let dir = tempfile::tempdir().unwrap();
    let root = write(dir.path(), "run.tas", "Console, load\n3\n");
    let mut host = ConsolelessHost::default();
    let mut session = session(&root);
    session.start(&mut host).unwrap();

    for _ in 0..3 {
        assert!(matches!(session.tick(&mut host), TickOutcome::Applied(_)));
    }
    assert_eq!(session.state(), PlaybackState::Finished);
    assert_eq!(host.ticks, 3);
    assert!(!host.aborted);
}

#[test]
fn test_fast_forward_to_next_label() {
    let dir = tempfile::tempdir().unwrap();
    let root = write(dir.path(), "run.tas", "3\n#one\n4\n#two\n2\n");
    let mut host = HeadlessHost::new();
    let mut session = session(&root);
    session.start(&mut host).unwrap();
    assert_eq!(session.playback_speed(), 1);

    session.tick(&mut host);
    assert_eq!(session.fast_forward_to_next_label(), Some(3));
    assert_eq!(session.playback_speed(), 400);
    session.tick(&mut host);
    session.tick(&mut host);
    assert_eq!(session.tick(&mut host), TickOutcome::Paused);
    assert_eq!(session.cursor().frame, 3);
    assert_eq!(session.playback_speed(), 1);

    assert_eq!(session.fast_forward_to_next_label(), Some(7));
    for _ in 0..4 {
        assert!(matches!(session.tick(&mut host), TickOutcome::Applied(_)));
    }
    assert_eq!(session.tick(&mut host), TickOutcome::Paused);
    assert_eq!(session.cursor().frame, 7);

    // The end of the script is the last stop
    assert_eq!(session.fast_forward_to_next_label(), Some(9));
    session.tick(&mut host);
    session.tick(&mut host);
    assert_eq!(session.state(), PlaybackState::Finished);
    assert_eq!(session.fast_forward_to_next_label(), None);
}

#[test]
fn test_label_fast_forward_stops_at_earlier_marker() {
    let dir = tempfile::tempdir().unwrap();
    let root = write(dir.path(), "run.tas", "3\n***\n2\n#one\n1\n");
    let mut host = HeadlessHost::new();
    let mut session = session(&root);
    session.start(&mut host).unwrap();

    assert_eq!(session.fast_forward_to_next_label(), Some(3));
    for _ in 0..3 {
        assert!(matches!(session.tick(&mut host), TickOutcome::Applied(_)));
    }
    assert_eq!(session.tick(&mut host), TickOutcome::Paused);

    assert_eq!(session.fast_forward_to_next_label(), Some(5));
    session.tick(&mut host);
    session.tick(&mut host);
    assert_eq!(session.tick(&mut host), TickOutcome::Paused);
    assert_eq!(session.cursor().frame, 5);
}

#[test]
fn test_step_back_replays_from_the_top() {
    let dir = tempfile::tempdir().unwrap();
    let root = write(dir.path(), "run.tas", "Console, load\n2\n***\n4\n");
    let mut host = HeadlessHost::new();
    let mut session = session(&root);
    session.start(&mut host).unwrap();

    session.tick(&mut host);
    session.tick(&mut host);
    assert_eq!(session.tick(&mut host), TickOutcome::Paused);
    session.resume();
    for _ in 0..3 {
        session.tick(&mut host);
    }
    assert_eq!(session.cursor().frame, 5);

    session.step_back(&mut host, 1).unwrap();
    assert_eq!(session.cursor().frame, 0);
    assert!(host.applied().is_empty());
    assert_eq!(session.state(), PlaybackState::Playing);
    assert_eq!(session.playback_speed(), 400);

    // Runs through the marker at frame 2 without pausing
    for _ in 0..4 {
        assert!(matches!(session.tick(&mut host), TickOutcome::Applied(_)));
    }
    assert_eq!(session.state(), PlaybackState::Paused);
    assert_eq!(session.cursor().frame, 4);
    assert_eq!(host.applied().len(), 4);
    assert_eq!(host.console_commands().len(), 2);
    assert_eq!(session.tick(&mut host), TickOutcome::Paused);

    session.resume();
    session.tick(&mut host);
    session.tick(&mut host);
    assert_eq!(session.state(), PlaybackState::Finished);
}

#[test]
fn test_step_back_never_goes_before_frame_one() {
    let dir = tempfile::tempdir().unwrap();
    let root = write(dir.path(), "run.tas", "5\n");
    let mut host = HeadlessHost::new();
    let mut session = session(&root);
    session.start(&mut host).unwrap();
    session.tick(&mut host);
    session.tick(&mut host);

    session.step_back(&mut host, 10).unwrap();
    assert!(matches!(session.tick(&mut host), TickOutcome::Applied(_)));
    assert_eq!(session.state(), PlaybackState::Paused);
    assert_eq!(session.cursor().frame, 1);
}
