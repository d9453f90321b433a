#![cfg(all(unix, feature = "cli"))]

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/msgbridge-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn wait_for_socket(path: &Path, timeout: Duration) {
    let start = Instant::now();
    while !path.exists() {
        if start.elapsed() >= timeout {
            panic!("server socket never appeared");
        }
        thread::sleep(Duration::from_millis(25));
    }
}

fn serve(path: &Path, connections: usize) -> Child {
    let child = Command::new(env!("CARGO_BIN_EXE_msgbridge"))
        .arg("--log-level")
        .arg("error")
        .arg("serve")
        .arg(path)
        .arg("--connections")
        .arg(connections.to_string())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .expect("serve command should start");
    wait_for_socket(path, Duration::from_secs(3));
    child
}

fn msgbridge(args: &[&str], path: &Path) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_msgbridge"))
        .arg("--log-level")
        .arg("error")
        .arg("--format")
        .arg("json")
        .args(args)
        .env("MSGBRIDGE_SOCKET", path)
        .output()
        .expect("command should run")
}

#[test]
fn call_echo_prints_reply() {
    let dir = unique_temp_dir("call");
    let sock_path = dir.join("bridge.sock");
    let mut server = serve(&sock_path, 1);

    let output = msgbridge(&["call", "--action", "Echo", "--json", "{\"x\":1}"], &sock_path);
    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"reply\":{\"x\":1}"), "{stdout}");
    assert!(stdout.contains("\"action\":\"Echo\""));

    let _ = server.wait();
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn stream_limit_cancels_after_k_chunks() {
    let dir = unique_temp_dir("stream");
    let sock_path = dir.join("bridge.sock");
    let mut server = serve(&sock_path, 1);

    let output = msgbridge(
        &[
            "stream",
            "--action",
            "Count",
            "--json",
            "{\"count\":100}",
            "--high-water-mark",
            "2",
            "--limit",
            "3",
        ],
        &sock_path,
    );
    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 3, "{stdout}");
    assert!(lines[2].contains("\"chunk\":2"));

    let _ = server.wait();
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn unknown_action_fails_the_call() {
    let dir = unique_temp_dir("unknown");
    let sock_path = dir.join("bridge.sock");
    let mut server = serve(&sock_path, 1);

    let output = msgbridge(
        &["call", "--action", "Nope", "--timeout", "300ms"],
        &sock_path,
    );
    assert_eq!(output.status.code(), Some(124));

    let _ = server.wait();
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn connect_to_missing_socket_is_a_transport_error() {
    let dir = unique_temp_dir("missing");
    let output = msgbridge(&["notify", "--action", "Log"], &dir.join("absent.sock"));
    assert_eq!(output.status.code(), Some(3));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn version_prints_package_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_msgbridge"))
        .arg("version")
        .output()
        .expect("version should run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("msgbridge "));
}
