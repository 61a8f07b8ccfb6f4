/// Integration test suite. Drives the compiled `dirmirror` binary and the library's
/// dispatcher against temporary source/destination trees.
///
/// Binary tests use `CARGO_BIN_EXE_dirmirror`, which Cargo sets during `cargo test`
/// to the compiled binary for the current profile. The mirroring binary never exits
/// on its own (it waits for Ctrl-C), so end-to-end tests spawn it, poll the
/// destination, and kill it.
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use dirmirror::{IgnoreFilter, RootDispatcher};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_dirmirror"))
}

/// Run a dirmirror command and assert it exits with a non-zero status.
/// Returns (stdout, stderr) as Strings.
fn run_failure(args: &[&str]) -> (String, String) {
    let out = Command::new(binary())
        .args(args)
        .output()
        .expect("failed to invoke dirmirror binary");
    let stdout = String::from_utf8_lossy(&out.stdout).to_string();
    let stderr = String::from_utf8_lossy(&out.stderr).to_string();
    assert!(
        !out.status.success(),
        "command {:?} expected to fail but exited successfully\nstdout: {}\nstderr: {}",
        args,
        stdout,
        stderr
    );
    (stdout, stderr)
}

/// Kills the spawned mirror when dropped, even if an assertion fails first.
struct Running(Child);

impl Drop for Running {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

fn spawn_mirror(src: &Path, dst: &Path, logs: &Path, extra: &[&str]) -> Running {
    let child = Command::new(binary())
        .arg("--source")
        .arg(src)
        .arg("--destination")
        .arg(dst)
        .arg("--log-output")
        .arg(logs)
        .args(extra)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to spawn dirmirror binary");
    Running(child)
}

/// Poll until `check` holds or five seconds pass.
fn eventually(mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        thread::sleep(Duration::from_millis(25));
    }
    check()
}

fn has_contents(path: &Path, expected: &str) -> bool {
    fs::read_to_string(path).is_ok_and(|s| s == expected)
}

/// Build `<tmp>/src/proj`, `<tmp>/dst`, `<tmp>/logs`.
fn layout() -> (tempfile::TempDir, PathBuf, PathBuf, PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let src = dir.path().join("src");
    fs::create_dir_all(src.join("proj")).unwrap();
    let dst = dir.path().join("dst");
    let logs = dir.path().join("logs");
    (dir, src, dst, logs)
}

// ---------------------------------------------------------------------------
// Startup validation
// ---------------------------------------------------------------------------

/// test_missing_source_is_fatal: a source that is not a directory stops startup.
#[test]
fn test_missing_source_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing");
    let dst = dir.path().join("dst");
    let (_, stderr) = run_failure(&[
        "-s",
        missing.to_str().unwrap(),
        "-d",
        dst.to_str().unwrap(),
    ]);
    assert!(
        stderr.contains("not a directory"),
        "stderr should explain the bad source\nstderr: {}",
        stderr
    );
    assert!(!dst.exists(), "no destination should be created on a config error");
}

/// test_file_destination_is_fatal: an existing non-directory destination stops startup.
#[test]
fn test_file_destination_is_fatal() {
    let (_dir, src, dst, _) = layout();
    fs::write(&dst, "i am a file").unwrap();
    let (_, stderr) = run_failure(&["-s", src.to_str().unwrap(), "-d", dst.to_str().unwrap()]);
    assert!(stderr.contains("destination"), "stderr: {}", stderr);
}

/// test_invalid_ignore_pattern_is_fatal: an uncompilable regex stops startup.
#[test]
fn test_invalid_ignore_pattern_is_fatal() {
    let (_dir, src, dst, _) = layout();
    let (_, stderr) = run_failure(&[
        "-s",
        src.to_str().unwrap(),
        "-d",
        dst.to_str().unwrap(),
        "-i",
        "(",
    ]);
    assert!(stderr.contains("ignore pattern"), "stderr: {}", stderr);
}

/// test_missing_required_args: clap rejects an invocation without a destination.
#[test]
fn test_missing_required_args() {
    let (_, stderr) = run_failure(&["-s", "."]);
    assert!(stderr.contains("--destination"), "stderr: {}", stderr);
}

// ---------------------------------------------------------------------------
// End-to-end mirroring through the binary
// ---------------------------------------------------------------------------

/// test_binary_mirrors_created_file: /src/proj/x.txt "hi" appears as /dst/proj/x.txt "hi".
#[test]
fn test_binary_mirrors_created_file() {
    let (_dir, src, dst, logs) = layout();
    let _mirror = spawn_mirror(&src, &dst, &logs, &[]);

    // The log file exists once logging is up, which precedes subscription by
    // microseconds; the extra pause covers watcher registration.
    assert!(eventually(|| fs::read_dir(&logs).is_ok_and(|mut d| d.next().is_some())));
    thread::sleep(Duration::from_millis(300));

    fs::write(src.join("proj").join("x.txt"), "hi").unwrap();

    let target = dst.join("proj").join("x.txt");
    assert!(
        eventually(|| has_contents(&target, "hi")),
        "expected {} to contain \"hi\"",
        target.display()
    );
}

/// test_binary_respects_ignore_pattern: ignored files never reach the destination.
#[test]
fn test_binary_respects_ignore_pattern() {
    let (_dir, src, dst, logs) = layout();
    let _mirror = spawn_mirror(&src, &dst, &logs, &["-i", r"\.tmp$"]);
    assert!(eventually(|| fs::read_dir(&logs).is_ok_and(|mut d| d.next().is_some())));
    thread::sleep(Duration::from_millis(300));

    fs::write(src.join("proj").join("scratch.tmp"), "t").unwrap();
    fs::write(src.join("proj").join("kept.txt"), "k").unwrap();

    assert!(eventually(|| has_contents(&dst.join("proj").join("kept.txt"), "k")));
    assert!(!dst.join("proj").join("scratch.tmp").exists());
}

// ---------------------------------------------------------------------------
// Library-level scenarios through the dispatcher
// ---------------------------------------------------------------------------

/// test_dispatcher_modify_move_delete: the full lifecycle of a file is mirrored,
/// including pruning of directories left empty.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dispatcher_modify_move_delete() {
    let (_dir, src, dst, _) = layout();
    fs::create_dir_all(&dst).unwrap();
    fs::create_dir_all(src.join("proj").join("a")).unwrap();
    fs::create_dir_all(src.join("proj").join("c")).unwrap();
    let dst = fs::canonicalize(&dst).unwrap();

    let dispatcher = Arc::new(RootDispatcher::new(
        src.clone(),
        dst.clone(),
        IgnoreFilter::none(),
    ));
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let run = tokio::spawn({
        let dispatcher = Arc::clone(&dispatcher);
        async move {
            dispatcher
                .run_until(async {
                    let _ = stop_rx.await;
                })
                .await
        }
    });
    tokio::time::sleep(Duration::from_millis(300)).await;

    let old = src.join("proj").join("a").join("b.txt");
    let new = src.join("proj").join("c").join("d.txt");
    let mirrored_old = dst.join("proj").join("a").join("b.txt");
    let mirrored_new = dst.join("proj").join("c").join("d.txt");

    fs::write(&old, "first").unwrap();
    let check = mirrored_old.clone();
    assert!(
        tokio::task::spawn_blocking(move || eventually(|| has_contents(&check, "first")))
            .await
            .unwrap()
    );

    fs::write(&old, "second").unwrap();
    let check = mirrored_old.clone();
    assert!(
        tokio::task::spawn_blocking(move || eventually(|| has_contents(&check, "second")))
            .await
            .unwrap(),
        "modification should replace destination content"
    );

    fs::rename(&old, &new).unwrap();
    let (check_new, check_old_dir) = (mirrored_new.clone(), dst.join("proj").join("a"));
    assert!(
        tokio::task::spawn_blocking(move || eventually(|| {
            has_contents(&check_new, "second") && !check_old_dir.exists()
        }))
        .await
        .unwrap(),
        "move should relocate the file and prune the emptied directory"
    );

    fs::remove_file(&new).unwrap();
    let check_dir = dst.join("proj").join("c");
    assert!(
        tokio::task::spawn_blocking(move || eventually(|| !check_dir.exists()))
            .await
            .unwrap(),
        "delete should remove the copy and prune its directory"
    );
    assert!(dst.exists(), "destination root is never pruned");

    let _ = stop_tx.send(());
    let summary = run.await.unwrap().unwrap();
    assert_eq!(summary.watchers, 1);
    assert_eq!(summary.failures, 0);
}

/// test_dispatcher_directory_rename_and_move_in: a renamed directory relocates
/// every mirrored file under it, and a directory moved in from outside the
/// source tree has its files mirrored.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dispatcher_directory_rename_and_move_in() {
    let (dir, src, dst, _) = layout();
    fs::create_dir_all(&dst).unwrap();
    fs::create_dir_all(src.join("proj").join("old").join("nested")).unwrap();
    let dst = fs::canonicalize(&dst).unwrap();

    let dispatcher = Arc::new(RootDispatcher::new(
        src.clone(),
        dst.clone(),
        IgnoreFilter::none(),
    ));
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let run = tokio::spawn({
        let dispatcher = Arc::clone(&dispatcher);
        async move {
            dispatcher
                .run_until(async {
                    let _ = stop_rx.await;
                })
                .await
        }
    });
    tokio::time::sleep(Duration::from_millis(300)).await;

    fs::write(src.join("proj").join("old").join("f.txt"), "f").unwrap();
    fs::write(src.join("proj").join("old").join("nested").join("g.txt"), "g").unwrap();
    let (check_f, check_g) = (
        dst.join("proj").join("old").join("f.txt"),
        dst.join("proj").join("old").join("nested").join("g.txt"),
    );
    assert!(
        tokio::task::spawn_blocking(move || eventually(|| {
            has_contents(&check_f, "f") && has_contents(&check_g, "g")
        }))
        .await
        .unwrap()
    );

    fs::rename(src.join("proj").join("old"), src.join("proj").join("new")).unwrap();
    let (new_f, new_g, old_dir) = (
        dst.join("proj").join("new").join("f.txt"),
        dst.join("proj").join("new").join("nested").join("g.txt"),
        dst.join("proj").join("old"),
    );
    assert!(
        tokio::task::spawn_blocking(move || eventually(|| {
            has_contents(&new_f, "f") && has_contents(&new_g, "g") && !old_dir.exists()
        }))
        .await
        .unwrap(),
        "directory rename should relocate its files and leave no stale copies"
    );

    let outside = dir.path().join("outside").join("incoming");
    fs::create_dir_all(&outside).unwrap();
    fs::write(outside.join("in.txt"), "in").unwrap();
    fs::rename(&outside, src.join("proj").join("incoming")).unwrap();
    let check_in = dst.join("proj").join("incoming").join("in.txt");
    assert!(
        tokio::task::spawn_blocking(move || eventually(|| has_contents(&check_in, "in")))
            .await
            .unwrap(),
        "files of a directory moved into the tree should be mirrored"
    );

    let _ = stop_tx.send(());
    let summary = run.await.unwrap().unwrap();
    assert_eq!(summary.failures, 0);
}
