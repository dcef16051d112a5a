//! Analog front end: attenuator and coupling relays plus the offset DAC.

use std::fmt;
use std::thread;

use crate::protocol::{OFFSET_DAC_CENTER, REQUEST_OFFSET, REQUEST_RELAY};
use crate::sds_scope::{Channel, SdsScope, SdsScopeError};
use crate::usb_transport::SdsTransport;

/// The six relays behind request `0xb5`. The discriminant is the bit index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relay {
    Ch1Coupling = 0,
    Ch1X10 = 1,
    Ch1X100 = 2,
    Ch2Coupling = 3,
    Ch2X10 = 4,
    Ch2X100 = 5,
}

impl Relay {
    /// Order in which initialization releases the relays.
    pub const INIT_ORDER: [Relay; 6] = [
        Relay::Ch1X10,
        Relay::Ch1X100,
        Relay::Ch1Coupling,
        Relay::Ch2X10,
        Relay::Ch2X100,
        Relay::Ch2Coupling,
    ];

    pub fn bit(self) -> u8 {
        1 << self as u8
    }

    /// The single byte sent to switch this relay: only its bit set to engage,
    /// every other bit set to release.
    pub fn command_byte(self, on: bool) -> u8 {
        if on {
            self.bit()
        } else {
            !self.bit()
        }
    }

    pub fn x10(channel: Channel) -> Self {
        match channel {
            Channel::Ch1 => Relay::Ch1X10,
            Channel::Ch2 => Relay::Ch2X10,
        }
    }

    pub fn x100(channel: Channel) -> Self {
        match channel {
            Channel::Ch1 => Relay::Ch1X100,
            Channel::Ch2 => Relay::Ch2X100,
        }
    }

    pub fn coupling(channel: Channel) -> Self {
        match channel {
            Channel::Ch1 => Relay::Ch1Coupling,
            Channel::Ch2 => Relay::Ch2Coupling,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Relay::Ch1Coupling => "ch1 coupling",
            Relay::Ch1X10 => "ch1 x10",
            Relay::Ch1X100 => "ch1 x100",
            Relay::Ch2Coupling => "ch2 coupling",
            Relay::Ch2X10 => "ch2 x10",
            Relay::Ch2X100 => "ch2 x100",
        }
    }
}

/// Volts per division.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VoltageRange {
    Mv10,
    Mv20,
    Mv40,
    Mv100,
    Mv200,
    Mv400,
    V1,
    V2,
    V4,
    V10,
}

impl VoltageRange {
    pub const ALL: [VoltageRange; 10] = [
        VoltageRange::Mv10,
        VoltageRange::Mv20,
        VoltageRange::Mv40,
        VoltageRange::Mv100,
        VoltageRange::Mv200,
        VoltageRange::Mv400,
        VoltageRange::V1,
        VoltageRange::V2,
        VoltageRange::V4,
        VoltageRange::V10,
    ];

    pub fn volts_per_div(self) -> f64 {
        match self {
            VoltageRange::Mv10 => 0.01,
            VoltageRange::Mv20 => 0.02,
            VoltageRange::Mv40 => 0.04,
            VoltageRange::Mv100 => 0.1,
            VoltageRange::Mv200 => 0.2,
            VoltageRange::Mv400 => 0.4,
            VoltageRange::V1 => 1.0,
            VoltageRange::V2 => 2.0,
            VoltageRange::V4 => 4.0,
            VoltageRange::V10 => 10.0,
        }
    }

    pub fn needs_x10(self) -> bool {
        self > VoltageRange::Mv100
    }

    pub fn needs_x100(self) -> bool {
        self > VoltageRange::V1
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VoltageRange::Mv10 => "10mV",
            VoltageRange::Mv20 => "20mV",
            VoltageRange::Mv40 => "40mV",
            VoltageRange::Mv100 => "100mV",
            VoltageRange::Mv200 => "200mV",
            VoltageRange::Mv400 => "400mV",
            VoltageRange::V1 => "1V",
            VoltageRange::V2 => "2V",
            VoltageRange::V4 => "4V",
            VoltageRange::V10 => "10V",
        }
    }
}

impl fmt::Display for VoltageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/div", self.as_str())
    }
}

/// DAC code for an offset in `-1.0 ..= 1.0`.
pub fn offset_dac(offset: f64) -> u16 {
    let code = f64::from(OFFSET_DAC_CENTER) + (offset * f64::from(OFFSET_DAC_CENTER)).round();
    code.clamp(0.0, f64::from(2 * OFFSET_DAC_CENTER)) as u16
}

impl<T: SdsTransport> SdsScope<T> {
    /// Switch one relay and wait for it to settle.
    ///
    /// A zero byte follows every relay command. Its outcome is ignored; the
    /// result is the one of the relay command itself.
    pub fn set_relay(&mut self, relay: Relay, on: bool) -> Result<(), SdsScopeError> {
        self.ensure_open()?;
        log::debug!("Relay {} {}", relay.as_str(), if on { "on" } else { "off" });

        let result = self.control_out(REQUEST_RELAY, &[relay.command_byte(on)]);
        if !self.config.relay_settle.is_zero() {
            thread::sleep(self.config.relay_settle);
        }
        if let Err(e) = self.control_out(REQUEST_RELAY, &[0x00]) {
            log::warn!("Relay flush after {} failed: {}", relay.as_str(), e);
        }
        result
    }

    /// Cache update for a relay the initialization sequence just released.
    pub(crate) fn relay_released(&mut self, relay: Relay) {
        match relay {
            Relay::Ch1Coupling => self.coupling[Channel::Ch1.index()] = false,
            Relay::Ch2Coupling => self.coupling[Channel::Ch2.index()] = false,
            // x10 goes first, so both attenuators are off by now
            Relay::Ch1X100 => self.voltage[Channel::Ch1.index()] = VoltageRange::Mv10,
            Relay::Ch2X100 => self.voltage[Channel::Ch2.index()] = VoltageRange::Mv10,
            Relay::Ch1X10 | Relay::Ch2X10 => {}
        }
    }

    /// Select the input attenuation. The x10 relay is switched before the
    /// x100 one; if the latter fails the x10 relay keeps its new position.
    pub fn set_voltage(
        &mut self,
        channel: Channel,
        range: VoltageRange,
    ) -> Result<(), SdsScopeError> {
        self.ensure_open()?;
        self.set_relay(Relay::x10(channel), range.needs_x10())?;
        self.set_relay(Relay::x100(channel), range.needs_x100())?;
        self.voltage[channel.index()] = range;
        Ok(())
    }

    pub fn voltage(&self, channel: Channel) -> Result<VoltageRange, SdsScopeError> {
        self.ensure_open()?;
        Ok(self.voltage[channel.index()])
    }

    /// `true` engages the coupling relay.
    pub fn set_coupling(&mut self, channel: Channel, on: bool) -> Result<(), SdsScopeError> {
        self.ensure_open()?;
        self.set_relay(Relay::coupling(channel), on)?;
        self.coupling[channel.index()] = on;
        Ok(())
    }

    pub fn coupling(&self, channel: Channel) -> Result<bool, SdsScopeError> {
        self.ensure_open()?;
        Ok(self.coupling[channel.index()])
    }

    /// Move the trace vertically; `offset` is a fraction of the full DAC range.
    pub fn set_offset(&mut self, channel: Channel, offset: f64) -> Result<(), SdsScopeError> {
        self.ensure_open()?;
        if !offset.is_finite() || !(-1.0..=1.0).contains(&offset) {
            return Err(SdsScopeError::OffsetOutOfRange(offset));
        }

        let dac = offset_dac(offset);
        log::trace!("Offset {} = {} (dac {:#06x})", channel, offset, dac);
        self.control_out(
            REQUEST_OFFSET,
            &[
                (dac & 0xff) as u8,
                ((dac >> 8) & 0x0f) as u8,
                channel.offset_selector(),
            ],
        )?;
        self.offset[channel.index()] = offset;
        Ok(())
    }

    pub fn offset(&self, channel: Channel) -> Result<f64, SdsScopeError> {
        self.ensure_open()?;
        Ok(self.offset[channel.index()])
    }
}
