//! Legacy file-per-pin backend (`/sys/class/gpio`).
//!
//! Each pin `N` (global number = base + offset) lives in `gpioN/` with
//! `direction`, `edge` and `value` attributes. Pins are exported through
//! `export` and given back through `unexport`. Edges are signalled as
//! `POLLPRI` on the input value files.

use super::PinBackend;
use crate::error::PinError;
use crate::wait::wait_ready;
use iomux_common::consts::{INPUT_PINS, OUTPUT_PINS, TOTAL_PINS};
use iomux_common::mux::config::PinConfig;
use iomux_common::mux::pins::{PinEvent, PinEvents, PinSample, PinSamples, PinSet};
use nix::poll::{PollFd, PollFlags};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::os::fd::AsFd;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

const EDGE_FLAGS: PollFlags = PollFlags::POLLPRI.union(PollFlags::POLLERR);

struct ValueFile {
    path: PathBuf,
    file: File,
}

/// File-per-pin backend.
pub struct ValueFileBackend {
    root: PathBuf,
    pins: PinSet,
    base: u32,
    inputs: Vec<ValueFile>,
    outputs: Vec<ValueFile>,
    exported: bool,
}

fn write_attr(path: &Path, value: &str) -> Result<(), PinError> {
    OpenOptions::new()
        .write(true)
        .open(path)
        .and_then(|mut file| file.write_all(value.as_bytes()))
        .map_err(|e| PinError::file(path, e))
}

fn read_level(value: &mut ValueFile) -> Result<bool, PinError> {
    let mut buf = [0u8; 8];
    let n = value
        .file
        .seek(SeekFrom::Start(0))
        .and_then(|_| value.file.read(&mut buf))
        .map_err(|e| PinError::file(&value.path, e))?;
    match buf[..n].iter().find(|b| !b.is_ascii_whitespace()) {
        Some(b'0') => Ok(false),
        Some(b'1') => Ok(true),
        _ => Err(PinError::InvalidLevel {
            path: value.path.clone(),
            value: String::from_utf8_lossy(&buf[..n]).into_owned(),
        }),
    }
}

impl ValueFileBackend {
    /// Backend for `pins` under `root`, offsets relative to `base`.
    pub fn new(root: impl Into<PathBuf>, pins: PinSet, base: u32) -> Self {
        Self {
            root: root.into(),
            pins,
            base,
            inputs: Vec::with_capacity(INPUT_PINS),
            outputs: Vec::with_capacity(OUTPUT_PINS),
            exported: false,
        }
    }

    /// Global number of a logical pin.
    pub fn gpio_number(&self, index: usize) -> u32 {
        self.base + self.pins.offset(index)
    }

    fn pin_dir(&self, index: usize) -> PathBuf {
        self.root.join(format!("gpio{}", self.gpio_number(index)))
    }

    fn export(&self, index: usize) -> Result<PathBuf, PinError> {
        let dir = self.pin_dir(index);
        if !dir.exists() {
            let number = self.gpio_number(index);
            debug!("Exporting gpio{}", number);
            write_attr(&self.root.join("export"), &number.to_string())?;
        }
        Ok(dir)
    }

    fn request_pins(&mut self) -> Result<(), PinError> {
        self.exported = true;
        for index in 0..TOTAL_PINS {
            let dir = self.export(index)?;
            let value_path = dir.join("value");
            if index < INPUT_PINS {
                write_attr(&dir.join("direction"), "in")?;
                write_attr(&dir.join("edge"), "both")?;
                let file = File::open(&value_path).map_err(|e| PinError::file(&value_path, e))?;
                let mut value = ValueFile {
                    path: value_path,
                    file,
                };
                // Priming read clears the pending edge state.
                read_level(&mut value)?;
                self.inputs.push(value);
            } else {
                write_attr(&dir.join("direction"), "out")?;
                let file = OpenOptions::new()
                    .write(true)
                    .open(&value_path)
                    .map_err(|e| PinError::file(&value_path, e))?;
                self.outputs.push(ValueFile {
                    path: value_path,
                    file,
                });
            }
        }
        Ok(())
    }

    fn ensure_requested(&self) -> Result<(), PinError> {
        if self.inputs.len() == INPUT_PINS && self.outputs.len() == OUTPUT_PINS {
            Ok(())
        } else {
            Err(PinError::NotRequested(self.name()))
        }
    }
}

impl PinBackend for ValueFileBackend {
    fn name(&self) -> &'static str {
        "value_file"
    }

    fn request(&mut self) -> Result<(), PinError> {
        if let Err(e) = self.request_pins() {
            let _ = self.release();
            return Err(e);
        }
        self.write_levels([false; OUTPUT_PINS])?;
        info!(
            "Value-file pins requested under {} (gpio{}..)",
            self.root.display(),
            self.base
        );
        Ok(())
    }

    fn wait_for_change(&mut self, timeout: Duration) -> Result<PinEvents, PinError> {
        self.ensure_requested()?;
        let mut events = PinEvents::new();
        let mut fds: heapless::Vec<PollFd<'_>, INPUT_PINS> = self
            .inputs
            .iter()
            .map(|value| PollFd::new(value.file.as_fd(), EDGE_FLAGS))
            .collect();
        if wait_ready(&mut fds, timeout)? == 0 {
            return Ok(events);
        }
        for (input, fd) in fds.iter().enumerate() {
            if fd.revents().is_some_and(|r| r.intersects(EDGE_FLAGS)) {
                let _ = events.push(PinEvent { input, edge: None });
            }
        }
        Ok(events)
    }

    fn read_levels(&mut self, inputs: &[usize]) -> Result<PinSamples, PinError> {
        self.ensure_requested()?;
        let mut samples = PinSamples::new();
        for &input in inputs.iter().take(INPUT_PINS) {
            let level = read_level(&mut self.inputs[input])?;
            let _ = samples.push(PinSample { input, level });
        }
        Ok(samples)
    }

    fn write_levels(&mut self, levels: [bool; OUTPUT_PINS]) -> Result<(), PinError> {
        self.ensure_requested()?;
        for (value, level) in self.outputs.iter_mut().zip(levels) {
            let text: &[u8] = if level { b"1" } else { b"0" };
            value
                .file
                .seek(SeekFrom::Start(0))
                .and_then(|_| value.file.write_all(text))
                .map_err(|e| PinError::file(&value.path, e))?;
        }
        Ok(())
    }

    fn release(&mut self) -> Result<(), PinError> {
        self.inputs.clear();
        self.outputs.clear();
        if !std::mem::take(&mut self.exported) {
            return Ok(());
        }

        let unexport = self.root.join("unexport");
        let mut first_error = None;
        for index in 0..TOTAL_PINS {
            let number = self.gpio_number(index);
            if let Err(e) = write_attr(&unexport, &number.to_string()) {
                warn!("Failed to unexport gpio{}: {}", number, e);
                first_error.get_or_insert(e);
            }
        }
        debug!("Value-file pins released");
        first_error.map_or(Ok(()), Err)
    }
}

/// Factory for the backend registry.
pub fn create_backend(config: &PinConfig) -> Box<dyn PinBackend> {
    Box::new(ValueFileBackend::new(
        &config.sysfs_root,
        config.pin_set(),
        config.pin_base,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const BASE: u32 = 100;

    fn fake_sysfs() -> TempDir {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join("export"), "").unwrap();
        fs::write(root.path().join("unexport"), "").unwrap();
        for offset in 0..8 {
            let dir = root.path().join(format!("gpio{}", BASE + offset));
            fs::create_dir(&dir).unwrap();
            fs::write(dir.join("direction"), "in").unwrap();
            fs::write(dir.join("edge"), "none").unwrap();
            fs::write(dir.join("value"), "0\n").unwrap();
        }
        root
    }

    fn attr(root: &TempDir, offset: u32, name: &str) -> String {
        fs::read_to_string(root.path().join(format!("gpio{}", BASE + offset)).join(name)).unwrap()
    }

    #[test]
    fn request_configures_every_pin() {
        let root = fake_sysfs();
        let mut backend = ValueFileBackend::new(root.path(), PinSet::default(), BASE);
        backend.request().unwrap();

        for offset in 0..4 {
            assert_eq!(attr(&root, offset, "direction"), "in");
            assert_eq!(attr(&root, offset, "edge"), "both");
        }
        for offset in 4..8 {
            assert_eq!(attr(&root, offset, "direction"), "out");
            assert_eq!(attr(&root, offset, "value").trim(), "0");
        }
        // Existing pins are not exported again.
        assert_eq!(fs::read_to_string(root.path().join("export")).unwrap(), "");
    }

    #[test]
    fn reads_and_writes_levels() {
        let root = fake_sysfs();
        let mut backend = ValueFileBackend::new(root.path(), PinSet::default(), BASE);
        backend.request().unwrap();

        fs::write(root.path().join("gpio102/value"), "1\n").unwrap();
        let samples = backend.read_levels(&[0, 2]).unwrap();
        assert_eq!(samples[0], PinSample { input: 0, level: false });
        assert_eq!(samples[1], PinSample { input: 2, level: true });

        backend.write_levels([true, false, true, false]).unwrap();
        assert_eq!(attr(&root, 4, "value").trim(), "1");
        assert_eq!(attr(&root, 5, "value").trim(), "0");
        assert_eq!(attr(&root, 6, "value").trim(), "1");
    }

    #[test]
    fn garbage_value_is_an_error() {
        let root = fake_sysfs();
        let mut backend = ValueFileBackend::new(root.path(), PinSet::default(), BASE);
        backend.request().unwrap();
        fs::write(root.path().join("gpio101/value"), "x").unwrap();
        assert!(matches!(
            backend.read_levels(&[1]),
            Err(PinError::InvalidLevel { .. })
        ));
    }

    #[test]
    fn release_unexports() {
        let root = fake_sysfs();
        let mut backend = ValueFileBackend::new(root.path(), PinSet::default(), BASE);
        backend.request().unwrap();
        backend.release().unwrap();

        // The fake unexport file keeps the last number written.
        assert_eq!(fs::read_to_string(root.path().join("unexport")).unwrap(), "107");
        assert!(matches!(
            backend.read_levels(&[0]),
            Err(PinError::NotRequested("value_file"))
        ));
        backend.release().unwrap();
    }

    #[test]
    fn missing_pin_is_exported_then_fails() {
        let root = fake_sysfs();
        fs::remove_dir_all(root.path().join("gpio100")).unwrap();
        let mut backend = ValueFileBackend::new(root.path(), PinSet::default(), BASE);

        let err = backend.request().unwrap_err();
        assert!(matches!(err, PinError::File { .. }));
        assert_eq!(fs::read_to_string(root.path().join("export")).unwrap(), "100");
    }

    #[test]
    fn regular_files_raise_no_edges() {
        let root = fake_sysfs();
        let mut backend = ValueFileBackend::new(root.path(), PinSet::default(), BASE);
        backend.request().unwrap();
        let events = backend.wait_for_change(Duration::from_millis(5)).unwrap();
        assert!(events.is_empty());
    }
}
