//! Shared state layout constants.
//!
//! Every segment holds exactly one 32-bit word at offset 0. Consumers map the
//! same names and read the word directly, so these values are part of the
//! external contract.

/// Size of every shared segment in bytes.
pub const SEGMENT_SIZE: usize = 4;

/// Suffix of the pin mask segment (`u32`, bit `i` = logical pin `i`).
pub const PINS_SUFFIX: &str = "_pins";

/// Suffix of the bus sample segment (`i32`).
pub const BUS_SUFFIX: &str = "_bus";

/// Suffix of the interrupt sample segment (`i32`).
pub const INTERRUPT_SUFFIX: &str = "_irq";

/// Suffix of the requested-output overlay segment (`u32`, written by consumers).
pub const COMMAND_SUFFIX: &str = "_cmd";

/// Suffix of the pin revision semaphore.
pub const REVISION_SUFFIX: &str = "_pins_rev";

/// Longest accepted object name including the leading `/`.
///
/// Named semaphores live under `/dev/shm/sem.<name>`, which leaves
/// `NAME_MAX - 4` bytes.
pub const MAX_NAME_LEN: usize = 251;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_holds_one_word() {
        assert_eq!(SEGMENT_SIZE, core::mem::size_of::<u32>());
        assert_eq!(SEGMENT_SIZE, core::mem::size_of::<i32>());
    }

    #[test]
    fn suffixes_are_distinct() {
        let all = [PINS_SUFFIX, BUS_SUFFIX, INTERRUPT_SUFFIX, COMMAND_SUFFIX, REVISION_SUFFIX];
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
