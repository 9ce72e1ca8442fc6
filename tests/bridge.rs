//! End-to-end tests driving the simulated glove as the bridge subprocess

use std::fs;
use std::thread;
use std::time::{Duration, Instant};

use glove_feedback::amplitude::SENTINEL;
use glove_feedback::bridge::{Bridge, BridgeChannel, BridgeConfig};
use glove_feedback::protocol::{decode_line, GestureId};
use glove_feedback::session::{BridgeStatus, Session};

const FAKE_GLOVE: &str = env!("CARGO_BIN_EXE_fake-glove");
const DEADLINE: Duration = Duration::from_secs(20);

fn fake_glove(args: &[&str]) -> BridgeConfig {
    BridgeConfig::new(FAKE_GLOVE, "USB0").with_args(args.iter().copied())
}

fn drain_until_closed(channel: &mut BridgeChannel) -> Vec<String> {
    let start = Instant::now();
    let mut lines = Vec::new();
    while !channel.is_closed() {
        assert!(start.elapsed() < DEADLINE, "bridge channel never closed");
        lines.extend(channel.drain());
        thread::sleep(Duration::from_millis(10));
    }
    lines
}

fn poll_until_stopped(session: &mut Session) {
    let start = Instant::now();
    while session.status() == &BridgeStatus::Running {
        assert!(start.elapsed() < DEADLINE, "bridge never stopped");
        session.poll();
        thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn lines_arrive_in_production_order() {
    let config = fake_glove(&["--count", "40", "--rate", "0", "--seed", "7"]);
    let (mut bridge, mut channel) = Bridge::start(&config).unwrap();

    let lines = drain_until_closed(&mut channel);
    assert_eq!(lines.len(), 40);

    for (index, line) in lines.iter().enumerate() {
        let record = decode_line(line).unwrap();
        assert_eq!(record.gesture, GestureId((index % 17) as i32 - 1));
        assert!(record.reading.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    assert!(bridge.shutdown());
    assert!(!bridge.is_reading());
}

#[test]
fn session_survives_malformed_lines_and_stream_end() {
    let config = fake_glove(&["--count", "10", "--rate", "0", "--malformed-every", "5"]);
    let mut session = Session::new();
    session.start_bridge(&config, Duration::from_secs(2));
    assert_eq!(session.status(), &BridgeStatus::Running);

    poll_until_stopped(&mut session);

    let stats = session.stats();
    assert_eq!(stats.records, 8);
    assert_eq!(stats.malformed, 2);

    // Lines 5 and 10 were truncated, so the last good record is index 8
    let latest = session.latest().unwrap().clone();
    assert_eq!(latest.gesture, GestureId(7));
    let minima = *session.tracker().minima();
    assert!(minima.iter().all(|&m| m <= 1.0));

    // Nothing changes once the bridge is gone
    session.poll();
    assert_eq!(session.latest(), Some(&latest));
    assert_eq!(session.tracker().minima(), &minima);

    session.shutdown();
}

#[test]
fn shutdown_terminates_a_streaming_bridge() {
    let config = fake_glove(&["--rate", "200"]);
    let (mut bridge, mut channel) = Bridge::start(&config).unwrap();
    bridge.set_shutdown_timeout(Duration::from_secs(5));
    assert!(bridge.pid().is_some());

    let start = Instant::now();
    let mut received = 0;
    while received == 0 {
        assert!(start.elapsed() < DEADLINE, "bridge produced no data");
        received += channel.drain().len();
        thread::sleep(Duration::from_millis(10));
    }

    assert!(bridge.shutdown());
    assert!(bridge.pid().is_none());
    assert!(!bridge.is_reading());
    drain_until_closed(&mut channel);

    // A second shutdown is a no-op
    assert!(bridge.shutdown());
}

#[test]
fn dropping_the_bridge_stops_the_subprocess() {
    let config = fake_glove(&["--rate", "100"]);
    let (bridge, mut channel) = Bridge::start(&config).unwrap();
    drop(bridge);

    // The subprocess is gone, so its stdout closes and so does the channel
    drain_until_closed(&mut channel);
}

#[test]
fn replays_captured_lines_verbatim() {
    let tmp = tempfile::tempdir().unwrap();
    let capture = tmp.path().join("capture.log");
    let mut contents = String::new();
    for gesture in [3, -1, 12] {
        contents.push_str(&gesture.to_string());
        for channel in 0..18 {
            contents.push_str(&format!(",{:.3}", channel as f64 / 18.0));
        }
        contents.push('\n');
    }
    fs::write(&capture, &contents).unwrap();

    let capture_arg = capture.to_str().unwrap();
    let config = fake_glove(&["--rate", "0", "--replay", capture_arg]);
    let (_bridge, mut channel) = Bridge::start(&config).unwrap();

    let lines = drain_until_closed(&mut channel);
    assert_eq!(lines, contents.lines().collect::<Vec<_>>());
}

#[test]
fn reset_mid_stream_starts_from_sentinel() {
    let config = fake_glove(&["--count", "5", "--rate", "0", "--seed", "1"]);
    let mut session = Session::new();
    session.start_bridge(&config, Duration::from_secs(2));
    poll_until_stopped(&mut session);
    assert!(session.tracker().minima().iter().all(|&m| m < SENTINEL));

    session.reset_amplitude();
    assert!(session.tracker().minima().iter().all(|&m| m == SENTINEL));
    assert!(session.tracker().is_collecting());
}

#[test]
fn missing_bridge_leaves_session_usable() {
    let config = BridgeConfig::new("./definitely-not-a-glove-bridge", "USB0");
    let mut session = Session::new();
    session.start_bridge(&config, Duration::from_millis(100));

    assert!(matches!(session.status(), BridgeStatus::Failed(_)));
    assert_eq!(session.poll().records, 0);
    session.reset_amplitude();
    session.shutdown();
}
