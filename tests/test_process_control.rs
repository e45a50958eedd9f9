//! Termination state-machine tests against real spawned processes

use std::process::Command;

use procwarden::control::{process_is_running, ProcessController};

/// A throwaway process we are allowed to kill. `sh -c "sleep 30; true"`
/// keeps the shell alive as the parent of a real `sleep` child, giving the
/// controller an actual two-level tree to work on.
fn spawn_tree() -> std::process::Child {
    Command::new("sh")
        .args(["-c", "sleep 30; true"])
        .spawn()
        .expect("failed to spawn test process tree")
}

fn spawn_sleeper() -> std::process::Child {
    Command::new("sleep")
        .arg("30")
        .spawn()
        .expect("failed to spawn test process")
}

/// A PID far beyond any live process on a test machine
const ABSENT_PID: i32 = i32::MAX - 7;

#[tokio::test]
async fn test_close_gracefully_on_absent_pid_succeeds() {
    let controller = ProcessController;
    assert!(controller.close_gracefully(ABSENT_PID).await);
}

#[tokio::test]
async fn test_kill_tree_on_absent_pid_succeeds() {
    let controller = ProcessController;
    assert!(controller.kill_tree(ABSENT_PID).await);
}

#[tokio::test]
async fn test_close_gracefully_terminates_sigterm_responsive_process() {
    let mut child = spawn_sleeper();
    let pid = child.id() as i32;
    assert!(process_is_running(pid));

    let controller = ProcessController;
    assert!(controller.close_gracefully(pid).await);
    assert!(!process_is_running(pid));

    let _ = child.wait();
}

#[tokio::test]
async fn test_kill_tree_terminates_parent_and_child() {
    let mut child = spawn_tree();
    let pid = child.id() as i32;
    // Give the shell a moment to fork its sleep child
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    assert!(process_is_running(pid));

    let controller = ProcessController;
    assert!(controller.kill_tree(pid).await);
    assert!(!process_is_running(pid));

    let _ = child.wait();
}

#[tokio::test]
async fn test_kill_tree_is_idempotent() {
    let mut child = spawn_sleeper();
    let pid = child.id() as i32;

    let controller = ProcessController;
    assert!(controller.kill_tree(pid).await);
    // Second invocation on the already-terminated process also succeeds
    assert!(controller.kill_tree(pid).await);

    let _ = child.wait();
}
