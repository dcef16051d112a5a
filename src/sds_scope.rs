use std::fmt;
use std::time::Duration;

use crate::error::ErrorKind;
use crate::front_end::{Relay, VoltageRange};
use crate::protocol::{
    DEFAULT_TIMEOUT, ENDPOINT_BULK_IN, OFFSET_SELECTOR_CH1, OFFSET_SELECTOR_CH2, RELAY_SETTLE,
    REQUEST_RESET, REQUEST_STATE1, REQUEST_STATE2, REQUEST_TYPE_IN, REQUEST_TYPE_OUT,
};
use crate::state_word::{TimeTriggerRegister, Timebase};
use crate::trigger_config::{self, TriggerConfig, TriggerMode, TriggerSlope};
use crate::usb_transport::{SdsTransport, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Channel {
    Ch1,
    Ch2,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Ch1, Channel::Ch2];

    /// Position in per-channel arrays.
    pub fn index(self) -> usize {
        match self {
            Channel::Ch1 => 0,
            Channel::Ch2 => 1,
        }
    }

    /// The tag printed on the front panel, `1` or `2`.
    pub fn number(self) -> u8 {
        match self {
            Channel::Ch1 => 1,
            Channel::Ch2 => 2,
        }
    }

    pub(crate) fn offset_selector(self) -> u8 {
        match self {
            Channel::Ch1 => OFFSET_SELECTOR_CH1,
            Channel::Ch2 => OFFSET_SELECTOR_CH2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Ch1 => "ch1",
            Channel::Ch2 => "ch2",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<u8> for Channel {
    type Error = SdsScopeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Channel::Ch1),
            2 => Ok(Channel::Ch2),
            other => Err(SdsScopeError::InvalidChannel(other)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SdsScopeError {
    #[error("USB transfer failed: {0}")]
    Transport(#[from] TransportError),

    #[error("Session is closed")]
    SessionClosed,

    #[error("Invalid channel {0} (expected 1 or 2)")]
    InvalidChannel(u8),

    #[error("Offset {0} out of range (must be within -1.0 ..= 1.0)")]
    OffsetOutOfRange(f64),

    #[error("Calibration zero {0} out of range (must be within -1.0 .. 1.0)")]
    InvalidCalibration(f64),

    #[error("Timebase has not been set yet")]
    Uninitialized,

    #[error("{0} is not supported by this driver")]
    NotSupported(&'static str),

    #[error("Offset calibration of {channel} found no zero crossing")]
    CalibrationDiverged { channel: Channel },

    #[error("Sample transfer too short ({len} bytes, header alone is 8)")]
    ShortSampleBuffer { len: usize },
}

impl SdsScopeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(e) => e.kind(),
            Self::SessionClosed
            | Self::InvalidChannel(_)
            | Self::OffsetOutOfRange(_)
            | Self::InvalidCalibration(_)
            | Self::Uninitialized => ErrorKind::InvalidParam,
            Self::NotSupported(_) => ErrorKind::NotSupported,
            Self::CalibrationDiverged { .. } | Self::ShortSampleBuffer { .. } => ErrorKind::Unknown,
        }
    }
}

/// Timing knobs of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SdsConfig {
    /// Timeout of every control and bulk transfer.
    pub timeout: Duration,
    /// Pause after switching a relay.
    pub relay_settle: Duration,
    /// Pause between empty polls while streaming.
    pub poll_interval: Duration,
    /// Largest chunk a stream hands out at once.
    pub stream_chunk_size: usize,
}

impl Default for SdsConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            relay_settle: RELAY_SETTLE,
            poll_interval: Duration::from_millis(1),
            stream_chunk_size: 65536,
        }
    }
}

impl SdsConfig {
    /// Default timeouts without any deliberate waiting, for simulated devices.
    pub fn immediate() -> Self {
        Self {
            relay_settle: Duration::ZERO,
            poll_interval: Duration::ZERO,
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_relay_settle(mut self, relay_settle: Duration) -> Self {
        self.relay_settle = relay_settle;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_stream_chunk_size(mut self, stream_chunk_size: usize) -> Self {
        self.stream_chunk_size = stream_chunk_size;
        self
    }
}

/// An initialized SDS 200A.
///
/// The session owns the USB handle and caches every setting the device cannot
/// report back. Cached fields only change after the device accepted the
/// corresponding command.
#[derive(Debug)]
pub struct SdsScope<T: SdsTransport> {
    pub(crate) transport: Option<T>,
    pub(crate) config: SdsConfig,
    pub(crate) channel_active: [bool; 2],
    pub(crate) coupling: [bool; 2],
    pub(crate) offset: [f64; 2],
    pub(crate) voltage: [VoltageRange; 2],
    pub(crate) timebase: Option<Timebase>,
    pub(crate) trigger: TriggerConfig,
    pub(crate) register: TimeTriggerRegister,
    // timebase whose word is currently xored into `register`
    register_timebase: Option<Timebase>,
    pub(crate) zero: [f64; 2],
    pub(crate) uv_per_tick: [u32; 2],
}

impl<T: SdsTransport> SdsScope<T> {
    /// Take ownership of an opened transport and bring the scope into its
    /// power-on state.
    ///
    /// The transport is dropped if any step fails.
    #[tracing::instrument(skip_all)]
    pub fn initialize(transport: T, config: SdsConfig) -> Result<Self, SdsScopeError> {
        let mut scope = Self {
            transport: Some(transport),
            config,
            channel_active: [false; 2],
            coupling: [false; 2],
            offset: [0.0; 2],
            voltage: [VoltageRange::Mv10; 2],
            timebase: None,
            trigger: TriggerConfig::default(),
            register: TimeTriggerRegister::new(),
            register_timebase: None,
            zero: [0.0; 2],
            uv_per_tick: [0; 2],
        };

        if let Err(e) = scope.run_init_sequence() {
            log::debug!("Initialization failed: {}", e);
            scope.close();
            return Err(e);
        }
        log::debug!("SDS 200A initialized");
        Ok(scope)
    }

    /// Run the initialization sequence again on the open handle.
    ///
    /// Cached settings follow the steps that went through: on failure the
    /// relays and offsets the device already accepted read back as reset,
    /// everything else keeps its previous value.
    pub fn reinitialize(&mut self) -> Result<(), SdsScopeError> {
        self.ensure_open()?;
        self.run_init_sequence()?;
        self.channel_active = [false; 2];
        Ok(())
    }

    fn run_init_sequence(&mut self) -> Result<(), SdsScopeError> {
        self.reset()?;
        for relay in Relay::INIT_ORDER {
            self.set_relay(relay, false)?;
            self.relay_released(relay);
        }
        self.reset()?;
        self.set_offset(Channel::Ch1, 0.0)?;
        self.set_offset(Channel::Ch2, 0.0)?;
        self.set_timebase(Timebase::DEFAULT)?;
        self.set_trigger_source(Channel::Ch1)?;
        self.set_trigger_mode(TriggerMode::Normal)?;
        self.set_trigger_slope(TriggerSlope::Rising)?;
        Ok(())
    }

    fn reset(&mut self) -> Result<(), SdsScopeError> {
        log::debug!("Resetting device");
        self.control_out(REQUEST_RESET, &[])
    }

    /// Release the USB handle. Calling it again does nothing.
    pub fn close(&mut self) {
        if self.transport.take().is_some() {
            log::debug!("SDS 200A session closed");
        }
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_some()
    }

    pub fn config(&self) -> &SdsConfig {
        &self.config
    }

    pub(crate) fn ensure_open(&self) -> Result<(), SdsScopeError> {
        if self.transport.is_some() {
            Ok(())
        } else {
            Err(SdsScopeError::SessionClosed)
        }
    }

    fn transport(&mut self) -> Result<&mut T, SdsScopeError> {
        self.transport.as_mut().ok_or(SdsScopeError::SessionClosed)
    }

    /// Vendor control-out request; anything but a complete transfer fails.
    pub(crate) fn control_out(&mut self, request: u8, data: &[u8]) -> Result<(), SdsScopeError> {
        let timeout = self.config.timeout;
        log::trace!("control out {:#04x} {:02x?}", request, data);
        let written =
            self.transport()?
                .write_control(REQUEST_TYPE_OUT, request, 0, 0, data, timeout)?;
        if written != data.len() {
            return Err(TransportError::ShortTransfer {
                expected: data.len(),
                actual: written,
            }
            .into());
        }
        Ok(())
    }

    pub(crate) fn control_in(&mut self, request: u8, buf: &mut [u8]) -> Result<(), SdsScopeError> {
        let timeout = self.config.timeout;
        let read = self
            .transport()?
            .read_control(REQUEST_TYPE_IN, request, 0, 0, buf, timeout)?;
        log::trace!("control in {:#04x} {:02x?}", request, &buf[..read.min(buf.len())]);
        if read != buf.len() {
            return Err(TransportError::ShortTransfer {
                expected: buf.len(),
                actual: read,
            }
            .into());
        }
        Ok(())
    }

    pub(crate) fn bulk_in(&mut self, buf: &mut [u8]) -> Result<usize, SdsScopeError> {
        let timeout = self.config.timeout;
        let read = self.transport()?.read_bulk(ENDPOINT_BULK_IN, buf, timeout)?;
        log::trace!("bulk in {:#04x}: {} bytes", ENDPOINT_BULK_IN, read);
        Ok(read)
    }

    /// Both halves of the register write carry the same bytes.
    fn send_state_word(&mut self) -> Result<(), SdsScopeError> {
        let bytes = *self.register.as_bytes();
        self.control_out(REQUEST_STATE1, &bytes)?;
        self.control_out(REQUEST_STATE2, &bytes)
    }

    /// Remember whether a channel is in use. The hardware has no command for
    /// this.
    pub fn set_channel(&mut self, channel: Channel, active: bool) -> Result<(), SdsScopeError> {
        self.ensure_open()?;
        self.channel_active[channel.index()] = active;
        Ok(())
    }

    pub fn channel(&self, channel: Channel) -> Result<bool, SdsScopeError> {
        self.ensure_open()?;
        Ok(self.channel_active[channel.index()])
    }

    pub fn set_timebase(&mut self, timebase: Timebase) -> Result<(), SdsScopeError> {
        self.ensure_open()?;
        log::debug!("Setting timebase to {}", timebase);
        self.register.apply_timebase(self.register_timebase, timebase);
        self.register_timebase = Some(timebase);
        self.send_state_word()?;
        self.timebase = Some(timebase);
        // the 1s..10s words carry the mode bit
        self.trigger = TriggerConfig::from_register(&self.register);
        Ok(())
    }

    pub fn timebase(&self) -> Result<Timebase, SdsScopeError> {
        self.ensure_open()?;
        self.timebase.ok_or(SdsScopeError::Uninitialized)
    }

    pub fn set_trigger_source(&mut self, source: Channel) -> Result<(), SdsScopeError> {
        self.ensure_open()?;
        trigger_config::encode_source(&mut self.register, source);
        self.send_state_word()?;
        self.trigger.source = source;
        Ok(())
    }

    pub fn trigger_source(&self) -> Result<Channel, SdsScopeError> {
        self.ensure_open()?;
        Ok(self.trigger.source)
    }

    pub fn set_trigger_slope(&mut self, slope: TriggerSlope) -> Result<(), SdsScopeError> {
        self.ensure_open()?;
        trigger_config::encode_slope(&mut self.register, slope);
        self.send_state_word()?;
        self.trigger.slope = slope;
        Ok(())
    }

    pub fn trigger_slope(&self) -> Result<TriggerSlope, SdsScopeError> {
        self.ensure_open()?;
        Ok(self.trigger.slope)
    }

    pub fn set_trigger_mode(&mut self, mode: TriggerMode) -> Result<(), SdsScopeError> {
        self.ensure_open()?;
        trigger_config::encode_mode(&mut self.register, mode);
        self.send_state_word()?;
        self.trigger.mode = mode;
        Ok(())
    }

    pub fn trigger_mode(&self) -> Result<TriggerMode, SdsScopeError> {
        self.ensure_open()?;
        Ok(self.trigger.mode)
    }

    /// Source, slope and mode in one go.
    pub fn trigger_config(&self) -> Result<TriggerConfig, SdsScopeError> {
        self.ensure_open()?;
        Ok(self.trigger)
    }

    pub fn set_trigger_offset(
        &mut self,
        _channel: Channel,
        _offset: f64,
    ) -> Result<(), SdsScopeError> {
        self.ensure_open()?;
        Err(SdsScopeError::NotSupported("trigger offset"))
    }

    pub fn trigger_offset(&self, _channel: Channel) -> Result<f64, SdsScopeError> {
        self.ensure_open()?;
        Err(SdsScopeError::NotSupported("trigger offset"))
    }

    /// Raw image of the time/trigger register as last sent.
    pub fn register(&self) -> &TimeTriggerRegister {
        &self.register
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::protocol::{REQUEST_OFFSET, REQUEST_RELAY};
    use crate::usb_transport::mock::{MockDevice, MockTransport, Transfer};

    /// Number of transfers the initialization sequence issues.
    pub(crate) const INIT_TRANSFERS: usize = 24;

    pub(crate) fn mock_scope() -> (MockDevice, SdsScope<MockTransport>) {
        let device = MockDevice::new();
        let scope = SdsScope::initialize(device.transport(), SdsConfig::immediate())
            .expect("mock initialization");
        (device, scope)
    }

    fn is_relay_command(index: usize) -> bool {
        (1..=11).contains(&index) && index % 2 == 1
    }

    fn is_relay_flush(index: usize) -> bool {
        (2..=12).contains(&index) && index % 2 == 0
    }

    #[test]
    fn init_sequence_is_byte_exact() {
        let (device, scope) = mock_scope();
        let transfers = device.transfers();
        assert_eq!(transfers.len(), INIT_TRANSFERS);

        let keys: Vec<u8> = transfers.iter().map(Transfer::key).collect();
        let mut expected = vec![REQUEST_RESET];
        expected.extend([REQUEST_RELAY; 12]);
        expected.extend([REQUEST_RESET, REQUEST_OFFSET, REQUEST_OFFSET]);
        for _ in 0..4 {
            expected.extend([REQUEST_STATE1, REQUEST_STATE2]);
        }
        assert_eq!(keys, expected);

        assert_eq!(
            device.payloads(REQUEST_RELAY),
            vec![
                vec![0xfd],
                vec![0x00],
                vec![0xfb],
                vec![0x00],
                vec![0xfe],
                vec![0x00],
                vec![0xef],
                vec![0x00],
                vec![0xdf],
                vec![0x00],
                vec![0xf7],
                vec![0x00],
            ]
        );
        assert_eq!(
            device.payloads(REQUEST_OFFSET),
            vec![vec![0x00, 0x04, 0x01], vec![0x00, 0x04, 0x00]]
        );
        for transfer in &transfers {
            if let Transfer::ControlOut {
                request_type,
                value,
                index,
                ..
            } = transfer
            {
                assert_eq!((*request_type, *value, *index), (REQUEST_TYPE_OUT, 0, 0));
            }
        }

        assert_eq!(scope.timebase().unwrap(), Timebase::Us2);
        assert_eq!(scope.trigger_config().unwrap(), TriggerConfig::default());
        let mut expected_register = *Timebase::Us2.command_word();
        expected_register[19] |= 0x80;
        assert_eq!(scope.register().as_bytes(), &expected_register);
        assert!(device.is_open());
    }

    #[test]
    fn failing_any_init_step_returns_its_error_and_closes() {
        for index in 0..INIT_TRANSFERS {
            if is_relay_flush(index) {
                continue;
            }
            let device = MockDevice::new();
            device.fail_transfer(index, TransportError::Pipe);

            let err = SdsScope::initialize(device.transport(), SdsConfig::immediate())
                .expect_err("step failure must abort initialization");
            assert!(
                matches!(err, SdsScopeError::Transport(TransportError::Pipe)),
                "step {index}: {err:?}"
            );
            assert!(!device.is_open(), "step {index} left the handle open");

            // a failed relay still waits and sends its flush byte
            let issued = if is_relay_command(index) { index + 2 } else { index + 1 };
            assert_eq!(device.transfers().len(), issued, "step {index}");
        }
    }

    #[test]
    fn failing_relay_flush_does_not_abort_init() {
        for index in (2..=12).step_by(2) {
            let device = MockDevice::new();
            device.fail_transfer(index, TransportError::Timeout);
            let scope = SdsScope::initialize(device.transport(), SdsConfig::immediate());
            assert!(scope.is_ok(), "flush {index}");
            assert_eq!(device.transfers().len(), INIT_TRANSFERS);
        }
    }

    #[test]
    fn short_control_transfer_is_an_error() {
        let device = MockDevice::new();
        device.short_transfer(INIT_TRANSFERS - 2, 20);
        let err = SdsScope::initialize(device.transport(), SdsConfig::immediate()).unwrap_err();
        assert!(matches!(
            err,
            SdsScopeError::Transport(TransportError::ShortTransfer {
                expected: 21,
                actual: 20
            })
        ));
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn state_word_goes_out_twice_b1_first() {
        let (device, mut scope) = mock_scope();
        device.clear_transfers();

        scope.set_timebase(Timebase::Ms1).unwrap();
        let transfers = device.transfers();
        assert_eq!(transfers.len(), 2);
        assert_eq!(transfers[0].key(), REQUEST_STATE1);
        assert_eq!(transfers[1].key(), REQUEST_STATE2);
        assert_eq!(transfers[0].payload(), transfers[1].payload());
        assert_eq!(transfers[0].payload(), Some(&scope.register().as_bytes()[..]));
    }

    #[test]
    fn failed_b1_skips_b3_and_keeps_cached_timebase() {
        let (device, mut scope) = mock_scope();
        device.clear_transfers();
        device.fail_transfer(0, TransportError::NoDevice);

        let err = scope.set_timebase(Timebase::Ms10).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoDevice);
        assert_eq!(device.transfers().len(), 1);
        assert_eq!(scope.timebase().unwrap(), Timebase::Us2);

        // the register already holds Ms10, so the next change swaps that out
        scope.set_timebase(Timebase::Us2).unwrap();
        let mut expected = *Timebase::Us2.command_word();
        expected[19] |= 0x80;
        assert_eq!(scope.register().as_bytes(), &expected);
    }

    #[test]
    fn trigger_setters_flip_single_bits() {
        let (_device, mut scope) = mock_scope();
        let before = *scope.register().as_bytes();

        scope.set_trigger_source(Channel::Ch2).unwrap();
        scope.set_trigger_slope(TriggerSlope::Falling).unwrap();
        scope.set_trigger_mode(TriggerMode::Automatic).unwrap();

        let after = scope.register().as_bytes();
        assert_eq!(after[15], before[15] | 0x03);
        assert_eq!(after[19], before[19] & !0x80);
        assert_eq!(
            TriggerConfig::from_register(scope.register()),
            scope.trigger_config().unwrap()
        );
    }

    #[test]
    fn failed_trigger_change_keeps_cache() {
        let (device, mut scope) = mock_scope();
        device.fail_request(REQUEST_STATE2, 4, TransportError::Busy);
        assert!(scope.set_trigger_slope(TriggerSlope::Falling).is_err());
        assert_eq!(scope.trigger_slope().unwrap(), TriggerSlope::Rising);
    }

    #[test]
    fn channel_flag_round_trip() {
        let (device, mut scope) = mock_scope();
        device.clear_transfers();
        assert!(!scope.channel(Channel::Ch1).unwrap());
        scope.set_channel(Channel::Ch1, true).unwrap();
        assert!(scope.channel(Channel::Ch1).unwrap());
        assert!(!scope.channel(Channel::Ch2).unwrap());
        scope.set_channel(Channel::Ch1, false).unwrap();
        assert!(!scope.channel(Channel::Ch1).unwrap());
        assert!(device.transfers().is_empty());
    }

    #[test]
    fn channel_from_wire_tag() {
        assert_eq!(Channel::try_from(1).unwrap(), Channel::Ch1);
        assert_eq!(Channel::try_from(2).unwrap(), Channel::Ch2);
        let err = Channel::try_from(3).unwrap_err();
        assert!(matches!(err, SdsScopeError::InvalidChannel(3)));
        assert_eq!(err.kind(), ErrorKind::InvalidParam);
        assert!(Channel::try_from(0).is_err());
    }

    #[test]
    fn closed_session_rejects_everything_without_io() {
        let (device, mut scope) = mock_scope();
        scope.close();
        scope.close();
        assert!(!device.is_open());
        device.clear_transfers();

        assert!(matches!(
            scope.set_timebase(Timebase::Ms1),
            Err(SdsScopeError::SessionClosed)
        ));
        assert!(matches!(scope.channel(Channel::Ch1), Err(SdsScopeError::SessionClosed)));
        assert_eq!(
            scope.set_trigger_mode(TriggerMode::Automatic).unwrap_err().kind(),
            ErrorKind::InvalidParam
        );
        assert!(scope.reinitialize().is_err());
        assert!(device.transfers().is_empty());
    }

    #[test]
    fn reinitialize_resets_channel_state() {
        let (device, mut scope) = mock_scope();
        scope.set_channel(Channel::Ch2, true).unwrap();
        scope.set_timebase(Timebase::Ms100).unwrap();
        device.clear_transfers();

        scope.reinitialize().unwrap();
        assert!(!scope.channel(Channel::Ch2).unwrap());
        assert_eq!(scope.timebase().unwrap(), Timebase::Us2);
        assert_eq!(device.transfers().len(), INIT_TRANSFERS);
        let mut expected = *Timebase::Us2.command_word();
        expected[19] |= 0x80;
        assert_eq!(scope.register().as_bytes(), &expected);
    }

    #[test]
    fn failed_reinit_reset_keeps_front_end_cache() {
        let (device, mut scope) = mock_scope();
        scope.set_voltage(Channel::Ch1, VoltageRange::V2).unwrap();
        scope.set_coupling(Channel::Ch1, true).unwrap();
        scope.set_channel(Channel::Ch1, true).unwrap();
        device.clear_transfers();
        device.fail_transfer(0, TransportError::Pipe);

        let err = scope.reinitialize().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Pipe);
        assert_eq!(device.transfers().len(), 1);
        assert!(scope.is_open());
        assert_eq!(scope.voltage(Channel::Ch1).unwrap(), VoltageRange::V2);
        assert!(scope.coupling(Channel::Ch1).unwrap());
        assert!(scope.channel(Channel::Ch1).unwrap());
    }

    #[test]
    fn failed_reinit_relay_only_forgets_released_relays() {
        let (device, mut scope) = mock_scope();
        for channel in Channel::ALL {
            scope.set_voltage(channel, VoltageRange::V10).unwrap();
            scope.set_coupling(channel, true).unwrap();
        }
        device.clear_transfers();
        // reset, ch1 x10 + flush, ch1 x100 + flush, then ch1 coupling
        device.fail_transfer(5, TransportError::Busy);

        assert!(scope.reinitialize().is_err());
        assert_eq!(scope.voltage(Channel::Ch1).unwrap(), VoltageRange::Mv10);
        assert!(scope.coupling(Channel::Ch1).unwrap());
        assert_eq!(scope.voltage(Channel::Ch2).unwrap(), VoltageRange::V10);
        assert!(scope.coupling(Channel::Ch2).unwrap());
    }

    #[test]
    fn slow_timebases_flip_the_cached_trigger_mode() {
        let (_device, mut scope) = mock_scope();
        assert_eq!(scope.trigger_mode().unwrap(), TriggerMode::Normal);

        scope.set_timebase(Timebase::S1).unwrap();
        assert_eq!(scope.trigger_mode().unwrap(), TriggerMode::Automatic);
        assert_eq!(
            TriggerConfig::from_register(scope.register()),
            scope.trigger_config().unwrap()
        );

        scope.set_timebase(Timebase::Us2).unwrap();
        assert_eq!(scope.trigger_mode().unwrap(), TriggerMode::Normal);
        assert_eq!(
            TriggerConfig::from_register(scope.register()),
            scope.trigger_config().unwrap()
        );
    }

    #[test]
    fn trigger_offset_is_not_supported() {
        let (_device, mut scope) = mock_scope();
        assert_eq!(
            scope.set_trigger_offset(Channel::Ch1, 0.5).unwrap_err().kind(),
            ErrorKind::NotSupported
        );
        assert_eq!(
            scope.trigger_offset(Channel::Ch2).unwrap_err().kind(),
            ErrorKind::NotSupported
        );
    }

    #[test]
    fn config_builders() {
        let config = SdsConfig::default()
            .with_timeout(Duration::from_secs(1))
            .with_stream_chunk_size(512);
        assert_eq!(config.timeout, Duration::from_secs(1));
        assert_eq!(config.relay_settle, RELAY_SETTLE);
        assert_eq!(config.stream_chunk_size, 512);
        assert_eq!(SdsConfig::immediate().relay_settle, Duration::ZERO);
    }
}
