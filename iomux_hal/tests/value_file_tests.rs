//! Lifecycle over the value-file backend against a fake class directory.

use iomux_common::mux::config::{MuxConfig, PinBackendKind};
use iomux_hal::{BackendRegistry, LifecycleController, LifecycleState};
use iomux_shared_memory::SharedStateStore;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const BASE: u32 = 2027;

/// Minimal stand-in for `/sys/class/gpio` with all 8 pins exported.
fn fake_gpio_class() -> TempDir {
    let root = TempDir::new().unwrap();
    fs::write(root.path().join("export"), "").unwrap();
    fs::write(root.path().join("unexport"), "").unwrap();
    for offset in 0..8 {
        let dir = root.path().join(format!("gpio{}", BASE + offset));
        fs::create_dir(&dir).unwrap();
        for attr in ["direction", "edge"] {
            fs::write(dir.join(attr), "").unwrap();
        }
        fs::write(dir.join("value"), "0\n").unwrap();
    }
    root
}

fn value(root: &Path, offset: u32) -> String {
    fs::read_to_string(root.join(format!("gpio{}/value", BASE + offset)))
        .unwrap()
        .trim()
        .to_string()
}

#[test]
fn startup_mirrors_initial_levels_and_shutdown_unexports() {
    let root = fake_gpio_class();
    fs::write(root.path().join(format!("gpio{}/value", BASE + 1)), "1\n").unwrap();

    let mut config = MuxConfig::default();
    config.pins.backend = PinBackendKind::ValueFile;
    config.pins.sysfs_root = root.path().to_path_buf();
    config.pins.pin_base = BASE;
    config.pins.wait_timeout_ms = 5;
    config.bus.enabled = false;
    config.interrupt.enabled = false;
    config.shared_state.prefix = format!("iomux_vf_{}", std::process::id());
    let names = config.shared_state.names();
    let _ = SharedStateStore::unlink_names(&names);

    let mut controller = LifecycleController::new(config, BackendRegistry::with_builtin()).unwrap();
    controller.start().unwrap();

    let store = controller.store().unwrap();
    assert_eq!(store.read_pin_mask().bits(), 0x22);
    assert_eq!(store.revision_count().unwrap(), 1);
    assert_eq!(value(root.path(), 5), "1");
    assert_eq!(value(root.path(), 4), "0");
    assert_eq!(
        fs::read_to_string(root.path().join(format!("gpio{}/edge", BASE))).unwrap(),
        "both"
    );

    controller.shutdown().unwrap();
    assert_eq!(controller.state(), LifecycleState::Terminated);
    assert_eq!(
        fs::read_to_string(root.path().join("unexport")).unwrap(),
        (BASE + 7).to_string()
    );
}
