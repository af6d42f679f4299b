//! Names of the shared objects owned by one multiplexer instance.

use super::consts::{
    BUS_SUFFIX, COMMAND_SUFFIX, INTERRUPT_SUFFIX, MAX_NAME_LEN, PINS_SUFFIX, REVISION_SUFFIX,
};

/// Segment and semaphore names derived from a single prefix.
///
/// Names carry the leading `/` required by `shm_open(3)` and `sem_open(3)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentNames {
    /// Pin mask segment.
    pub pins: String,
    /// Bus sample segment.
    pub bus: String,
    /// Interrupt sample segment.
    pub interrupt: String,
    /// Requested-output overlay segment.
    pub command: String,
    /// Pin revision semaphore.
    pub revision: String,
}

impl SegmentNames {
    /// Derive all names from `prefix` (`"iomux"` gives `/iomux_pins`, ...).
    ///
    /// The prefix is not checked here; see [`SegmentNames::validate_prefix`].
    pub fn new(prefix: &str) -> Self {
        let name = |suffix: &str| format!("/{prefix}{suffix}");
        Self {
            pins: name(PINS_SUFFIX),
            bus: name(BUS_SUFFIX),
            interrupt: name(INTERRUPT_SUFFIX),
            command: name(COMMAND_SUFFIX),
            revision: name(REVISION_SUFFIX),
        }
    }

    /// Check that `prefix` yields valid object names.
    ///
    /// Accepts ASCII alphanumerics, `_`, `-` and `.`, and rejects names that
    /// would exceed [`MAX_NAME_LEN`].
    pub fn validate_prefix(prefix: &str) -> Result<(), String> {
        if prefix.is_empty() {
            return Err("prefix cannot be empty".to_string());
        }
        if let Some(bad) = prefix
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
        {
            return Err(format!("invalid character {bad:?} in {prefix:?}"));
        }
        let longest = 1 + prefix.len() + REVISION_SUFFIX.len();
        if longest > MAX_NAME_LEN {
            return Err(format!("prefix too long ({} bytes)", prefix.len()));
        }
        Ok(())
    }

    /// Segment names in unlink order.
    pub fn segments(&self) -> [&str; 4] {
        [&self.pins, &self.bus, &self.interrupt, &self.command]
    }
}

impl Default for SegmentNames {
    fn default() -> Self {
        Self::new(crate::consts::SERVICE_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_names() {
        let names = SegmentNames::default();
        assert_eq!(names.pins, "/iomux_pins");
        assert_eq!(names.bus, "/iomux_bus");
        assert_eq!(names.interrupt, "/iomux_irq");
        assert_eq!(names.command, "/iomux_cmd");
        assert_eq!(names.revision, "/iomux_pins_rev");
    }

    #[test]
    fn prefix_validation() {
        assert!(SegmentNames::validate_prefix("iomux-test.01").is_ok());
        assert!(SegmentNames::validate_prefix("").is_err());
        assert!(SegmentNames::validate_prefix("a/b").is_err());
        assert!(SegmentNames::validate_prefix("has space").is_err());
        assert!(SegmentNames::validate_prefix(&"x".repeat(300)).is_err());
    }
}
