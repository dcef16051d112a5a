//! The 21 byte time/trigger register.
//!
//! The scope multiplexes timebase and trigger settings into one register that
//! is written with two requests (`0xb1` and `0xb3`, always the same bytes).
//! The layout of the timebase part was never decoded, so each timebase is a
//! complete command word captured from the vendor driver. Switching timebase
//! XORs the old word out and the new one in, which leaves the trigger bits
//! alone.

use std::fmt;

use crate::protocol::{
    RAW_BUFFER_SIZE, STATE_SIZE, TRIGGER_BYTE, TRIGGER_MODE_BYTE, TRIGGER_MODE_MASK,
    TRIGGER_SLOPE_MASK, TRIGGER_SOURCE_MASK,
};

pub type StateWord = [u8; STATE_SIZE];

/// Time per division.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Timebase {
    Ns2,
    Ns4,
    Ns10,
    Ns20,
    Ns40,
    Ns100,
    Ns200,
    Ns400,
    Us1,
    Us2,
    Us4,
    Us10,
    Us20,
    Us40,
    Us100,
    Us200,
    Us400,
    Ms1,
    Ms2,
    Ms4,
    Ms10,
    Ms20,
    Ms40,
    Ms100,
    Ms200,
    Ms400,
    S1,
    S2,
    S4,
    S10,
}

#[rustfmt::skip]
const TIME_COMMANDS: [StateWord; 30] = [
    // 2ns
    [0x0e, 0x01, 0x00, 0x00, 0x08, 0x00, 0x50, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01],
    // 4ns
    [0x0e, 0x01, 0x00, 0x00, 0x08, 0x00, 0x50, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x01],
    // 10ns
    [0x0e, 0x01, 0x00, 0x00, 0x08, 0x00, 0x51, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x01],
    // 20ns
    [0x0e, 0x01, 0x00, 0x00, 0x08, 0x00, 0x50, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x03, 0x01],
    // 40ns
    [0x0e, 0x01, 0x00, 0x00, 0x08, 0x00, 0x50, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x04, 0x01],
    // 100ns
    [0x0e, 0x01, 0x00, 0x00, 0x08, 0x00, 0x50, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x05, 0x01],
    // 200ns
    [0x0e, 0x01, 0x00, 0x00, 0x08, 0x00, 0x50, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x06, 0x01],
    // 400ns
    [0x0e, 0x01, 0x00, 0x00, 0x0e, 0x00, 0x80, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x07, 0x01],
    // 1us
    [0x0e, 0x01, 0x00, 0x00, 0x21, 0x00, 0x18, 0x01, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x08, 0x01],
    // 2us
    [0x0e, 0x01, 0x00, 0x00, 0x40, 0x00, 0x0e, 0x02, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x09, 0x01],
    // 4us
    [0x0e, 0x01, 0x00, 0x00, 0x7f, 0x00, 0x08, 0x04, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x0a, 0x01],
    // 10us
    [0x0e, 0x01, 0x00, 0x00, 0x3a, 0x01, 0xde, 0x09, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x0b, 0x01],
    // 20us
    [0x1e, 0x03, 0x00, 0x00, 0x3a, 0x01, 0xdc, 0x09, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x0c, 0x01],
    // 40us
    [0x1e, 0x07, 0x00, 0x00, 0x3a, 0x01, 0xdb, 0x09, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x0d, 0x01],
    // 100us
    [0x16, 0x09, 0x01, 0x00, 0x3a, 0x01, 0xdb, 0x09, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x0e, 0x01],
    // 200us
    [0x16, 0x09, 0x03, 0x00, 0x3a, 0x01, 0xdb, 0x09, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x0f, 0x01],
    // 400us
    [0x16, 0x09, 0x07, 0x00, 0x3a, 0x01, 0xda, 0x09, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10, 0x01],
    // 1ms
    [0x16, 0x09, 0x13, 0x00, 0x3a, 0x01, 0xda, 0x09, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x11, 0x01],
    // 2ms
    [0x16, 0x09, 0x27, 0x00, 0x3a, 0x01, 0xda, 0x09, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x12, 0x01],
    // 4ms
    [0x16, 0x09, 0x4f, 0x00, 0x3a, 0x01, 0xda, 0x09, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x13, 0x01],
    // 10ms
    [0x16, 0x09, 0xc7, 0x00, 0x3a, 0x01, 0xda, 0x09, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x14, 0x01],
    // 20ms
    [0x16, 0x09, 0x8f, 0x01, 0x3a, 0x01, 0xda, 0x09, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x15, 0x01],
    // 40ms
    [0x16, 0x09, 0x1f, 0x03, 0x3a, 0x01, 0xda, 0x09, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x16, 0x01],
    // 100ms
    [0x16, 0x09, 0xcf, 0x07, 0x3a, 0x01, 0xda, 0x09, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x17, 0x01],
    // 200ms
    [0x16, 0x09, 0x9f, 0x0f, 0x3a, 0x01, 0xda, 0x09, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x18, 0x01],
    // 400ms
    [0x16, 0x13, 0x40, 0x1f, 0x3a, 0x01, 0xda, 0x09, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x19, 0x01],
    // 1s
    [0x2e, 0x01, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00, 0x05, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x9d, 0x01],
    // 2s
    [0x2e, 0x01, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00, 0x05, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x9e, 0x01],
    // 4s
    [0x2e, 0x01, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00, 0x05, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x9f, 0x01],
    // 10s
    [0x2e, 0x01, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00, 0x05, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xa0, 0x01],
];

impl Timebase {
    pub const ALL: [Self; 30] = [
        Self::Ns2,
        Self::Ns4,
        Self::Ns10,
        Self::Ns20,
        Self::Ns40,
        Self::Ns100,
        Self::Ns200,
        Self::Ns400,
        Self::Us1,
        Self::Us2,
        Self::Us4,
        Self::Us10,
        Self::Us20,
        Self::Us40,
        Self::Us100,
        Self::Us200,
        Self::Us400,
        Self::Ms1,
        Self::Ms2,
        Self::Ms4,
        Self::Ms10,
        Self::Ms20,
        Self::Ms40,
        Self::Ms100,
        Self::Ms200,
        Self::Ms400,
        Self::S1,
        Self::S2,
        Self::S4,
        Self::S10,
    ];

    /// Timebase the scope is put into on initialization.
    pub const DEFAULT: Self = Self::Us2;

    /// Command word captured from the vendor driver for this timebase.
    pub fn command_word(self) -> &'static StateWord {
        &TIME_COMMANDS[self as usize]
    }

    pub fn seconds_per_div(self) -> f64 {
        match self {
            Self::Ns2 => 2e-9,
            Self::Ns4 => 4e-9,
            Self::Ns10 => 10e-9,
            Self::Ns20 => 20e-9,
            Self::Ns40 => 40e-9,
            Self::Ns100 => 100e-9,
            Self::Ns200 => 200e-9,
            Self::Ns400 => 400e-9,
            Self::Us1 => 1e-6,
            Self::Us2 => 2e-6,
            Self::Us4 => 4e-6,
            Self::Us10 => 10e-6,
            Self::Us20 => 20e-6,
            Self::Us40 => 40e-6,
            Self::Us100 => 100e-6,
            Self::Us200 => 200e-6,
            Self::Us400 => 400e-6,
            Self::Ms1 => 1e-3,
            Self::Ms2 => 2e-3,
            Self::Ms4 => 4e-3,
            Self::Ms10 => 10e-3,
            Self::Ms20 => 20e-3,
            Self::Ms40 => 40e-3,
            Self::Ms100 => 100e-3,
            Self::Ms200 => 200e-3,
            Self::Ms400 => 400e-3,
            Self::S1 => 1.0,
            Self::S2 => 2.0,
            Self::S4 => 4.0,
            Self::S10 => 10.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ns2 => "2ns",
            Self::Ns4 => "4ns",
            Self::Ns10 => "10ns",
            Self::Ns20 => "20ns",
            Self::Ns40 => "40ns",
            Self::Ns100 => "100ns",
            Self::Ns200 => "200ns",
            Self::Ns400 => "400ns",
            Self::Us1 => "1us",
            Self::Us2 => "2us",
            Self::Us4 => "4us",
            Self::Us10 => "10us",
            Self::Us20 => "20us",
            Self::Us40 => "40us",
            Self::Us100 => "100us",
            Self::Us200 => "200us",
            Self::Us400 => "400us",
            Self::Ms1 => "1ms",
            Self::Ms2 => "2ms",
            Self::Ms4 => "4ms",
            Self::Ms10 => "10ms",
            Self::Ms20 => "20ms",
            Self::Ms40 => "40ms",
            Self::Ms100 => "100ms",
            Self::Ms200 => "200ms",
            Self::Ms400 => "400ms",
            Self::S1 => "1s",
            Self::S2 => "2s",
            Self::S4 => "4s",
            Self::S10 => "10s",
        }
    }

    /// Bytes requested per bulk read at this timebase.
    ///
    /// How the transfer size depends on the timebase is not known yet, so every
    /// timebase uses the size the vendor driver was seen requesting.
    pub fn raw_buffer_size(self) -> usize {
        RAW_BUFFER_SIZE
    }
}

impl fmt::Display for Timebase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/div", self.as_str())
    }
}

/// In-memory mirror of the device's time/trigger register.
#[derive(Clone, PartialEq, Eq)]
pub struct TimeTriggerRegister {
    bytes: StateWord,
}

impl fmt::Debug for TimeTriggerRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TimeTriggerRegister({:02x?})", self.bytes)
    }
}

impl Default for TimeTriggerRegister {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeTriggerRegister {
    pub fn new() -> Self {
        Self {
            bytes: [0; STATE_SIZE],
        }
    }

    pub fn from_bytes(bytes: StateWord) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &StateWord {
        &self.bytes
    }

    fn xor(&mut self, word: &StateWord) {
        for (byte, delta) in self.bytes.iter_mut().zip(word) {
            *byte ^= delta;
        }
    }

    /// Swap the command word of `old` for the one of `new`.
    ///
    /// `old` is `None` before any timebase has been applied.
    pub fn apply_timebase(&mut self, old: Option<Timebase>, new: Timebase) {
        if let Some(old) = old {
            self.xor(old.command_word());
        }
        self.xor(new.command_word());
    }

    fn set_bit(&mut self, byte: usize, mask: u8, on: bool) {
        if on {
            self.bytes[byte] |= mask;
        } else {
            self.bytes[byte] &= !mask;
        }
    }

    /// `false` selects channel 1, `true` channel 2.
    pub fn set_trigger_source_bit(&mut self, on: bool) {
        self.set_bit(TRIGGER_BYTE, TRIGGER_SOURCE_MASK, on);
    }

    /// `false` triggers on the rising edge, `true` on the falling one.
    pub fn set_trigger_slope_bit(&mut self, on: bool) {
        self.set_bit(TRIGGER_BYTE, TRIGGER_SLOPE_MASK, on);
    }

    /// `true` for normal mode, `false` for automatic.
    pub fn set_trigger_mode_bit(&mut self, on: bool) {
        self.set_bit(TRIGGER_MODE_BYTE, TRIGGER_MODE_MASK, on);
    }

    pub fn trigger_source_bit(&self) -> bool {
        self.bytes[TRIGGER_BYTE] & TRIGGER_SOURCE_MASK != 0
    }

    pub fn trigger_slope_bit(&self) -> bool {
        self.bytes[TRIGGER_BYTE] & TRIGGER_SLOPE_MASK != 0
    }

    pub fn trigger_mode_bit(&self) -> bool {
        self.bytes[TRIGGER_MODE_BYTE] & TRIGGER_MODE_MASK != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xor3(a: &StateWord, b: &StateWord, c: &StateWord) -> StateWord {
        let mut out = *a;
        for i in 0..STATE_SIZE {
            out[i] ^= b[i] ^ c[i];
        }
        out
    }

    #[test]
    fn command_table_covers_every_timebase() {
        assert_eq!(Timebase::ALL.len(), TIME_COMMANDS.len());
        for (i, tb) in Timebase::ALL.iter().enumerate() {
            assert_eq!(*tb as usize, i);
            assert_eq!(tb.command_word().len(), STATE_SIZE);
        }
    }

    #[test]
    fn captured_words_are_verbatim() {
        assert_eq!(
            Timebase::Us2.command_word(),
            &[
                0x0e, 0x01, 0x00, 0x00, 0x40, 0x00, 0x0e, 0x02, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00,
                0x00, 0x00, 0x00, 0x00, 0x00, 0x09, 0x01
            ]
        );
        assert_eq!(Timebase::S10.command_word()[19], 0xa0);
        assert_eq!(Timebase::Ms400.command_word()[..4], [0x16, 0x13, 0x40, 0x1f]);
    }

    #[test]
    fn timebase_change_is_xor_delta_for_all_pairs() {
        let mut seed = TimeTriggerRegister::new();
        seed.apply_timebase(None, Timebase::Us2);
        seed.set_trigger_mode_bit(true);
        seed.set_trigger_slope_bit(true);

        for old in Timebase::ALL {
            for new in Timebase::ALL {
                let mut reg = seed.clone();
                let before = *reg.as_bytes();
                reg.apply_timebase(Some(old), new);
                assert_eq!(
                    reg.as_bytes(),
                    &xor3(&before, old.command_word(), new.command_word()),
                    "{old} -> {new}"
                );
            }
        }
    }

    #[test]
    fn reapplying_same_timebase_is_a_no_op() {
        let mut reg = TimeTriggerRegister::new();
        reg.apply_timebase(None, Timebase::Ms1);
        let before = reg.clone();
        reg.apply_timebase(Some(Timebase::Ms1), Timebase::Ms1);
        assert_eq!(reg, before);
    }

    #[test]
    fn first_timebase_loads_its_word() {
        let mut reg = TimeTriggerRegister::new();
        reg.apply_timebase(None, Timebase::Ns400);
        assert_eq!(reg.as_bytes(), Timebase::Ns400.command_word());
    }

    #[test]
    fn trigger_bits_survive_timebase_change() {
        let mut reg = TimeTriggerRegister::new();
        reg.apply_timebase(None, Timebase::Us2);
        reg.set_trigger_source_bit(true);
        reg.set_trigger_slope_bit(true);
        reg.set_trigger_mode_bit(true);

        reg.apply_timebase(Some(Timebase::Us2), Timebase::Ms10);
        assert!(reg.trigger_source_bit());
        assert!(reg.trigger_slope_bit());
        assert!(reg.trigger_mode_bit());
    }

    #[test]
    fn trigger_bits_set_and_clear() {
        let mut reg = TimeTriggerRegister::new();
        reg.set_trigger_mode_bit(true);
        assert_eq!(reg.as_bytes()[TRIGGER_MODE_BYTE], 0x80);
        reg.set_trigger_source_bit(true);
        reg.set_trigger_slope_bit(true);
        assert_eq!(reg.as_bytes()[TRIGGER_BYTE], 0x03);
        reg.set_trigger_source_bit(false);
        assert_eq!(reg.as_bytes()[TRIGGER_BYTE], 0x01);
        reg.set_trigger_mode_bit(false);
        assert!(!reg.trigger_mode_bit());
    }

    #[test]
    fn display_and_scale() {
        assert_eq!(Timebase::Us2.to_string(), "2us/div");
        assert!((Timebase::Ms400.seconds_per_div() - 0.4).abs() < 1e-12);
        assert_eq!(Timebase::S1.raw_buffer_size(), RAW_BUFFER_SIZE);
    }
}
