//! Wire constants of the SDS 200A USB protocol.
//!
//! Everything here was recovered from USB captures of the vendor driver. The
//! values are byte exact; a capture analyzer can check a trace against them.

use std::time::Duration;

/// USB vendor ID.
pub const SDS_VID: u16 = 0x0da8;
/// USB product ID.
pub const SDS_PID: u16 = 0x0001;

/// Control out, recipient = device.
pub const REQUEST_TYPE_OUT: u8 = 0x40;
/// Control in, recipient = device.
pub const REQUEST_TYPE_IN: u8 = 0xc0;

pub const REQUEST_RESET: u8 = 0xd0;
pub const REQUEST_RELAY: u8 = 0xb5;
pub const REQUEST_STATE1: u8 = 0xb1;
pub const REQUEST_OFFSET: u8 = 0xb2;
pub const REQUEST_STATE2: u8 = 0xb3;
pub const REQUEST_DATA_AVAILABLE: u8 = 0xc0;

pub const ENDPOINT_BULK_IN: u8 = 0x82;

/// Payload size of a `0xb1`/`0xb3` request.
pub const STATE_SIZE: usize = 21;

/// Register byte holding the trigger source (bit 1) and slope (bit 0).
pub const TRIGGER_BYTE: usize = 15;
pub const TRIGGER_SOURCE_MASK: u8 = 0x02;
pub const TRIGGER_SLOPE_MASK: u8 = 0x01;
/// Register byte holding the trigger mode in its MSB.
pub const TRIGGER_MODE_BYTE: usize = 19;
pub const TRIGGER_MODE_MASK: u8 = 0x80;

/// Third byte of a `0xb2` request. Not confirmed on hardware.
pub const OFFSET_SELECTOR_CH1: u8 = 1;
pub const OFFSET_SELECTOR_CH2: u8 = 0;

/// Offset DAC value for an offset of 0.0; the full range is twice this.
pub const OFFSET_DAC_CENTER: u16 = 1024;

/// Bytes of unknown meaning in front of every bulk sample transfer.
pub const SAMPLE_HEADER_SIZE: usize = 8;
/// Bulk transfer size used for every timebase until the relation is known.
pub const RAW_BUFFER_SIZE: usize = 8192;

/// Highest 10 bit ADC code.
pub const ADC_MAX: u16 = 1023;
/// Code a grounded input reads once the offset is at zero.
pub const ADC_MIDPOINT: u16 = 511;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(250);
/// The relays need this long to settle into their new position.
pub const RELAY_SETTLE: Duration = Duration::from_millis(500);
