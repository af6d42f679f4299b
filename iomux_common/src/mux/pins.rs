//! Pin model: logical pin levels, pin roles and edge events.
//!
//! ## Layout
//!
//! The multiplexer drives 8 logical pins. Logical pins 0-3 are inputs,
//! logical pins 4-7 are outputs, and input `k` is mirrored onto output
//! `k + 4`. The shared pin mask uses bit `i` for logical pin `i`,
//! independent of the backend offsets the pins are wired to.
//!
//! ```text
//!  bit:   7  6  5  4 | 3  2  1  0
//!  pin:  O3 O2 O1 O0 | I3 I2 I1 I0
//! ```

use crate::consts::{INPUT_PINS, OUTPUT_PINS, TOTAL_PINS};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use static_assertions::const_assert_eq;

bitflags! {
    /// Levels of all logical pins, one bit per pin.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PinMask: u32 {
        /// Input 0.
        const PIN0 = 1 << 0;
        /// Input 1.
        const PIN1 = 1 << 1;
        /// Input 2.
        const PIN2 = 1 << 2;
        /// Input 3.
        const PIN3 = 1 << 3;
        /// Output 0 (mirrors input 0).
        const PIN4 = 1 << 4;
        /// Output 1 (mirrors input 1).
        const PIN5 = 1 << 5;
        /// Output 2 (mirrors input 2).
        const PIN6 = 1 << 6;
        /// Output 3 (mirrors input 3).
        const PIN7 = 1 << 7;

        /// All input bits.
        const INPUTS = Self::PIN0.bits() | Self::PIN1.bits() | Self::PIN2.bits() | Self::PIN3.bits();
        /// All output bits.
        const OUTPUTS = Self::PIN4.bits() | Self::PIN5.bits() | Self::PIN6.bits() | Self::PIN7.bits();
    }
}

const_assert_eq!(PinMask::INPUTS.bits(), 0x0F);
const_assert_eq!(PinMask::OUTPUTS.bits(), 0xF0);

impl PinMask {
    /// Single-bit mask for a logical pin.
    #[inline]
    pub fn pin(index: usize) -> Self {
        debug_assert!(index < TOTAL_PINS, "pin index {index} out of range");
        Self::from_bits_retain(1 << index)
    }

    /// Level of one logical pin.
    #[inline]
    pub fn level(self, index: usize) -> bool {
        self.contains(Self::pin(index))
    }

    /// Set the level of one input pin (`input` in 0..4).
    #[inline]
    pub fn set_input(&mut self, input: usize, level: bool) {
        debug_assert!(input < INPUT_PINS);
        self.set(Self::pin(input), level);
    }

    /// Build a mask holding only input levels.
    pub fn from_inputs(levels: [bool; INPUT_PINS]) -> Self {
        let mut mask = Self::empty();
        for (input, level) in levels.into_iter().enumerate() {
            mask.set_input(input, level);
        }
        mask
    }

    /// Input levels in logical order.
    pub fn input_levels(self) -> [bool; INPUT_PINS] {
        core::array::from_fn(|i| self.level(i))
    }

    /// Output levels in logical order.
    pub fn output_levels(self) -> [bool; OUTPUT_PINS] {
        core::array::from_fn(|i| self.level(INPUT_PINS + i))
    }

    /// Composite mask with outputs mirroring inputs.
    ///
    /// `overlay` is the requested-output word written by the presentation
    /// process; bit `k` (0-3) forces output `k` high.
    #[inline]
    pub fn mirrored(self, overlay: u32) -> Self {
        let inputs = (self & Self::INPUTS).bits();
        let requested = overlay & Self::INPUTS.bits();
        Self::from_bits_retain(inputs | ((inputs | requested) << INPUT_PINS))
    }
}

/// Role of a logical pin, fixed for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinRole {
    /// Edge-triggered input.
    Input,
    /// Mirrored output.
    Output,
}

/// The 8 pins the multiplexer owns, as backend-relative offsets.
///
/// Logical pin `i < 4` is `inputs[i]`, logical pin `i >= 4` is
/// `outputs[i - 4]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinSet {
    /// Offsets of the input pins.
    pub inputs: [u32; INPUT_PINS],
    /// Offsets of the output pins.
    pub outputs: [u32; OUTPUT_PINS],
}

impl Default for PinSet {
    fn default() -> Self {
        Self {
            inputs: [0, 1, 2, 3],
            outputs: [4, 5, 6, 7],
        }
    }
}

impl PinSet {
    /// Role of a logical pin.
    pub fn role(&self, index: usize) -> PinRole {
        if index < INPUT_PINS {
            PinRole::Input
        } else {
            PinRole::Output
        }
    }

    /// Backend offset of a logical pin.
    pub fn offset(&self, index: usize) -> u32 {
        match self.role(index) {
            PinRole::Input => self.inputs[index],
            PinRole::Output => self.outputs[index - INPUT_PINS],
        }
    }

    /// All offsets in logical order.
    pub fn offsets(&self) -> [u32; TOTAL_PINS] {
        core::array::from_fn(|i| self.offset(i))
    }

    /// Whether every offset is used exactly once.
    pub fn is_distinct(&self) -> bool {
        let offsets = self.offsets();
        offsets
            .iter()
            .enumerate()
            .all(|(i, a)| offsets[i + 1..].iter().all(|b| a != b))
    }
}

/// Direction of an input transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    /// 0 -> 1.
    Rising,
    /// 1 -> 0.
    Falling,
}

impl Edge {
    /// Level after the transition.
    #[inline]
    pub fn level(self) -> bool {
        matches!(self, Self::Rising)
    }

    /// Edge that ends at `level`.
    #[inline]
    pub fn from_level(level: bool) -> Self {
        if level { Self::Rising } else { Self::Falling }
    }
}

/// Readiness reported by a pin backend for one input.
///
/// `edge` is `None` when the backend cannot tell the direction and the
/// level has to be re-read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinEvent {
    /// Input index (0-3).
    pub input: usize,
    /// Transition direction, if reported.
    pub edge: Option<Edge>,
}

/// Level read back from one input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinSample {
    /// Input index (0-3).
    pub input: usize,
    /// Current logical level.
    pub level: bool,
}

/// Events of one wakeup, at most one per input.
pub type PinEvents = heapless::Vec<PinEvent, INPUT_PINS>;

/// Levels read in one cycle, at most one per input.
pub type PinSamples = heapless::Vec<PinSample, INPUT_PINS>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pin_bits_follow_logical_index() {
        for i in 0..TOTAL_PINS {
            assert_eq!(PinMask::pin(i).bits(), 1 << i);
        }
    }

    #[test]
    fn mirrored_copies_inputs_to_outputs() {
        let inputs = PinMask::from_inputs([true, false, true, false]);
        let mask = inputs.mirrored(0);
        assert_eq!(mask.bits(), 0b0101_0101);
        assert_eq!(mask.output_levels(), [true, false, true, false]);
    }

    #[test]
    fn mirrored_ignores_stale_output_bits() {
        let stale = PinMask::OUTPUTS | PinMask::PIN1;
        assert_eq!(stale.mirrored(0).bits(), 0b0010_0010);
    }

    #[test]
    fn overlay_forces_outputs_high() {
        let inputs = PinMask::from_inputs([false, false, true, false]);
        let mask = inputs.mirrored(0b1001);
        assert_eq!(mask.input_levels(), [false, false, true, false]);
        assert_eq!(mask.output_levels(), [true, false, true, true]);
    }

    #[test]
    fn overlay_upper_bits_are_ignored() {
        let mask = PinMask::empty().mirrored(0xFFFF_FFF0);
        assert_eq!(mask, PinMask::empty());
    }

    #[test]
    fn pin_set_roles_and_offsets() {
        let set = PinSet {
            inputs: [10, 11, 12, 13],
            outputs: [20, 21, 22, 23],
        };
        assert_eq!(set.role(3), PinRole::Input);
        assert_eq!(set.role(4), PinRole::Output);
        assert_eq!(set.offset(0), 10);
        assert_eq!(set.offset(7), 23);
        assert!(set.is_distinct());
    }

    #[test]
    fn pin_set_detects_duplicates() {
        let set = PinSet {
            inputs: [0, 1, 2, 3],
            outputs: [3, 5, 6, 7],
        };
        assert!(!set.is_distinct());
    }

    #[test]
    fn edge_levels() {
        assert!(Edge::Rising.level());
        assert!(!Edge::Falling.level());
        assert_eq!(Edge::from_level(true), Edge::Rising);
        assert_eq!(Edge::from_level(false), Edge::Falling);
    }
}
