//! Offset calibration.
//!
//! With the input grounded, the zero of a channel is the smallest offset at
//! which the ADC reads at least its midpoint. The search walks the offset up
//! from -1.0 in steps of 0.001.

use crate::protocol::{ADC_MIDPOINT, SAMPLE_HEADER_SIZE};
use crate::sds_scope::{Channel, SdsScope, SdsScopeError};
use crate::usb_transport::SdsTransport;

const SEARCH_START: f64 = -1.0;
const SEARCH_STEP: f64 = 0.001;
const SEARCH_STEPS: u32 = 2000;

/// Calibration state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Calibration {
    /// Offset at which channel 1 reads zero volts.
    pub zero1: f64,
    pub zero2: f64,
    /// Microvolts per ADC tick; stays 0 until scale calibration exists.
    pub uv_per_tick1: u32,
    pub uv_per_tick2: u32,
}

impl Calibration {
    pub fn zero(&self, channel: Channel) -> f64 {
        match channel {
            Channel::Ch1 => self.zero1,
            Channel::Ch2 => self.zero2,
        }
    }

    pub fn uv_per_tick(&self, channel: Channel) -> u32 {
        match channel {
            Channel::Ch1 => self.uv_per_tick1,
            Channel::Ch2 => self.uv_per_tick2,
        }
    }
}

fn check_zero(zero: f64) -> Result<f64, SdsScopeError> {
    if zero.is_finite() && zero > -1.0 && zero < 1.0 {
        Ok(zero)
    } else {
        Err(SdsScopeError::InvalidCalibration(zero))
    }
}

impl<T: SdsTransport> SdsScope<T> {
    /// Determine the zero offset of every channel whose zero is not supplied.
    ///
    /// Searching a channel reinitializes the scope first, so all settings are
    /// back to their power-on values afterwards except the offsets, which are
    /// restored. Nothing is stored unless both channels succeed.
    #[tracing::instrument(skip(self))]
    pub fn calibrate_offset(
        &mut self,
        zero1: Option<f64>,
        zero2: Option<f64>,
    ) -> Result<Calibration, SdsScopeError> {
        self.ensure_open()?;
        for zero in [zero1, zero2].into_iter().flatten() {
            check_zero(zero)?;
        }

        let saved_offsets = self.offset;
        let mut zeros = [0.0; 2];
        for (channel, supplied) in Channel::ALL.into_iter().zip([zero1, zero2]) {
            zeros[channel.index()] = match supplied {
                Some(zero) => zero,
                None => self.find_zero(channel)?,
            };
            log::debug!("Zero of {}: {}", channel, zeros[channel.index()]);
        }

        for channel in Channel::ALL {
            if let Err(e) = self.set_offset(channel, saved_offsets[channel.index()]) {
                log::warn!("Could not restore offset of {}: {}", channel, e);
            }
        }

        self.zero = zeros;
        self.calibration()
    }

    fn find_zero(&mut self, channel: Channel) -> Result<f64, SdsScopeError> {
        self.reinitialize()?;

        for step in 0..=SEARCH_STEPS {
            let offset = f64::from(step).mul_add(SEARCH_STEP, SEARCH_START).min(1.0);
            self.set_offset(channel, offset)?;
            let samples = self.raw_samples()?;
            // the first transfer still holds data from before the offset change
            if step == 0 {
                continue;
            }

            let value = samples
                .first(channel)
                .ok_or(SdsScopeError::ShortSampleBuffer {
                    len: SAMPLE_HEADER_SIZE + 2 * samples.len(),
                })?;
            log::trace!("{} offset {:.3} reads {}", channel, offset, value);
            if value >= ADC_MIDPOINT {
                return Ok(offset);
            }
        }

        log::debug!("No zero crossing on {}", channel);
        Err(SdsScopeError::CalibrationDiverged { channel })
    }

    /// Gain calibration. Not implemented by the driver.
    pub fn calibrate_scale(&mut self) -> Result<Calibration, SdsScopeError> {
        self.ensure_open()?;
        Err(SdsScopeError::NotSupported("scale calibration"))
    }

    pub fn calibration(&self) -> Result<Calibration, SdsScopeError> {
        self.ensure_open()?;
        Ok(Calibration {
            zero1: self.zero[0],
            zero2: self.zero[1],
            uv_per_tick1: self.uv_per_tick[0],
            uv_per_tick2: self.uv_per_tick[1],
        })
    }

    /// Reuse the outcome of an earlier calibration without talking to the
    /// device.
    pub fn restore_calibration(&mut self, calibration: Calibration) -> Result<(), SdsScopeError> {
        self.ensure_open()?;
        check_zero(calibration.zero1)?;
        check_zero(calibration.zero2)?;
        self.zero = [calibration.zero1, calibration.zero2];
        self.uv_per_tick = [calibration.uv_per_tick1, calibration.uv_per_tick2];
        Ok(())
    }
}
