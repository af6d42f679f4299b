//! Termination signal handling of the `iomux_hal` binary.

use iomux_common::shm::names::SegmentNames;
use iomux_shared_memory::{SharedStateStore, ShmError};
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use std::fs;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn wait_for_exit(child: &mut Child, limit: Duration) -> Option<ExitStatus> {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if let Some(status) = child.try_wait().unwrap() {
            return Some(status);
        }
        thread::sleep(Duration::from_millis(10));
    }
    None
}

#[test]
fn sigterm_shuts_down_cleanly() {
    let prefix = format!("iomux_sig_{}", std::process::id());
    let names = SegmentNames::new(&prefix);
    let _ = SharedStateStore::unlink_names(&names);

    let dir = TempDir::new().unwrap();
    let config = dir.path().join("iomux.toml");
    fs::write(
        &config,
        format!(
            r#"
[shared]
service_name = "signal-test"

[pins]
backend = "simulation"
wait_timeout_ms = 20

[bus]
enabled = false

[interrupt]
enabled = false

[shared_state]
prefix = "{prefix}"
"#
        ),
    )
    .unwrap();

    let mut child = Command::new(env!("CARGO_BIN_EXE_iomux_hal"))
        .arg("--config")
        .arg(&config)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    // The handler is installed before the store is attached.
    let deadline = Instant::now() + Duration::from_secs(5);
    while SharedStateStore::open_existing(&names).is_err() {
        assert!(Instant::now() < deadline, "store never attached");
        assert!(child.try_wait().unwrap().is_none(), "exited before attaching");
        thread::sleep(Duration::from_millis(10));
    }

    kill(Pid::from_raw(child.id() as i32), Signal::SIGTERM).unwrap();
    let status = match wait_for_exit(&mut child, Duration::from_secs(5)) {
        Some(status) => status,
        None => {
            let _ = child.kill();
            panic!("no exit after SIGTERM");
        }
    };

    assert!(status.success(), "exit status {status}");
    assert!(matches!(
        SharedStateStore::open_existing(&names),
        Err(ShmError::NotFound { .. })
    ));
}
