use crate::sds_scope::Channel;
use crate::state_word::TimeTriggerRegister;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TriggerSlope {
    Rising,
    Falling,
}

impl TriggerSlope {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerSlope::Rising => "rising",
            TriggerSlope::Falling => "falling",
        }
    }

    fn register_bit(self) -> bool {
        matches!(self, TriggerSlope::Falling)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TriggerMode {
    /// Only capture when the trigger condition is met.
    Normal,
    /// Free-run when no trigger arrives.
    Automatic,
}

impl TriggerMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerMode::Normal => "normal",
            TriggerMode::Automatic => "auto",
        }
    }

    fn register_bit(self) -> bool {
        matches!(self, TriggerMode::Normal)
    }
}

/// Everything the register knows about triggering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TriggerConfig {
    pub source: Channel,
    pub slope: TriggerSlope,
    pub mode: TriggerMode,
}

impl Default for TriggerConfig {
    /// The trigger a freshly initialized scope runs with.
    fn default() -> Self {
        Self {
            source: Channel::Ch1,
            slope: TriggerSlope::Rising,
            mode: TriggerMode::Normal,
        }
    }
}

impl TriggerConfig {
    /// Read the trigger fields back out of a register image.
    pub fn from_register(register: &TimeTriggerRegister) -> Self {
        Self {
            source: if register.trigger_source_bit() {
                Channel::Ch2
            } else {
                Channel::Ch1
            },
            slope: if register.trigger_slope_bit() {
                TriggerSlope::Falling
            } else {
                TriggerSlope::Rising
            },
            mode: if register.trigger_mode_bit() {
                TriggerMode::Normal
            } else {
                TriggerMode::Automatic
            },
        }
    }
}

pub(crate) fn encode_source(register: &mut TimeTriggerRegister, source: Channel) {
    register.set_trigger_source_bit(matches!(source, Channel::Ch2));
}

pub(crate) fn encode_slope(register: &mut TimeTriggerRegister, slope: TriggerSlope) {
    register.set_trigger_slope_bit(slope.register_bit());
}

pub(crate) fn encode_mode(register: &mut TimeTriggerRegister, mode: TriggerMode) {
    register.set_trigger_mode_bit(mode.register_bit());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_word::Timebase;

    #[test]
    fn encoded_fields_read_back() {
        let mut register = TimeTriggerRegister::new();
        register.apply_timebase(None, Timebase::Us2);

        encode_source(&mut register, Channel::Ch2);
        encode_slope(&mut register, TriggerSlope::Falling);
        encode_mode(&mut register, TriggerMode::Automatic);
        assert_eq!(
            TriggerConfig::from_register(&register),
            TriggerConfig {
                source: Channel::Ch2,
                slope: TriggerSlope::Falling,
                mode: TriggerMode::Automatic,
            }
        );

        encode_source(&mut register, Channel::Ch1);
        encode_slope(&mut register, TriggerSlope::Rising);
        encode_mode(&mut register, TriggerMode::Normal);
        assert_eq!(TriggerConfig::from_register(&register), TriggerConfig::default());
    }

    #[test]
    fn normal_mode_sets_the_msb_of_byte_19() {
        let mut register = TimeTriggerRegister::new();
        encode_mode(&mut register, TriggerMode::Normal);
        assert_eq!(register.as_bytes()[19], 0x80);
        assert_eq!(register.as_bytes()[15], 0x00);
    }

    #[test]
    fn names() {
        assert_eq!(TriggerSlope::Falling.as_str(), "falling");
        assert_eq!(TriggerMode::Automatic.as_str(), "auto");
    }
}
