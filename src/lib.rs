//! # SDS200A RS
//!
//! A Rust driver for the SDS 200A two channel USB oscilloscope.
//!
//! The scope speaks an undocumented vendor protocol over libusb: a handful of
//! control requests to switch relays, set the offset DAC and program a 21 byte
//! time/trigger register, and a bulk endpoint that delivers raw samples. This
//! crate wraps that protocol in a typed session.
//!
//! ## Features
//!
//! - **Device discovery**: Uses `rusb` to find every attached SDS 200A
//! - **Front end control**: Volts/div relays, coupling and vertical offset
//! - **Timebase and trigger**: The captured timebase command words plus trigger source, slope and mode
//! - **Offset calibration**: Finds the zero offset of each channel
//! - **DataFrame output**: Decoded samples as a `polars` DataFrame or CSV
//! - **Simulated device**: Every operation can be exercised without hardware
//!
//! ## Examples
//!
//! ### Connecting and configuring
//!
//! ```rust,no_run
//! use sds200a_rs::{Channel, SdsConnector, Timebase, TriggerSlope, VoltageRange};
//!
//! let mut scope = SdsConnector::open_first()?;
//!
//! scope.set_voltage(Channel::Ch1, VoltageRange::Mv200)?;
//! scope.set_offset(Channel::Ch1, 0.1)?;
//! scope.set_timebase(Timebase::Us10)?;
//! scope.set_trigger_slope(TriggerSlope::Falling)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ### Choosing among several scopes
//!
//! ```rust,no_run
//! use sds200a_rs::SdsConnector;
//!
//! let mut devices = SdsConnector::enumerate()?;
//! for descriptor in devices.descriptors() {
//!     println!("bus {} port {}", descriptor.bus_number, descriptor.port_number);
//! }
//!
//! let descriptor = devices.descriptors()[0];
//! let scope = devices.open(&descriptor)?;
//! drop(devices); // the session keeps working
//! # drop(scope);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ### Calibration and acquisition
//!
//! ```rust,no_run
//! use sds200a_rs::{Channel, SdsConnector};
//!
//! let mut scope = SdsConnector::open_first()?;
//!
//! // inputs must be grounded for this
//! let calibration = scope.calibrate_offset(None, None)?;
//! println!("zero ch1 = {}", calibration.zero1);
//!
//! let samples = scope.raw_samples()?;
//! println!("{} samples, first ch1 code {:?}", samples.len(), samples.first(Channel::Ch1));
//! println!("{}", samples.to_dataframe()?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ### Streaming
//!
//! ```rust,no_run
//! use sds200a_rs::{CancelToken, SdsConnector};
//!
//! let mut scope = SdsConnector::open_first()?;
//! let cancel = CancelToken::new();
//!
//! for chunk in scope.stream(cancel.clone()).take(10) {
//!     println!("{} bytes", chunk?.len());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ### Without hardware
//!
//! ```rust
//! use sds200a_rs::usb_transport::mock::MockDevice;
//! use sds200a_rs::{Channel, SdsConfig, SdsScope, VoltageRange};
//!
//! let device = MockDevice::new();
//! let mut scope = SdsScope::initialize(device.transport(), SdsConfig::immediate()).unwrap();
//! scope.set_voltage(Channel::Ch2, VoltageRange::V2).unwrap();
//! assert_eq!(scope.voltage(Channel::Ch2).unwrap(), VoltageRange::V2);
//! ```

pub mod acquisition;
pub mod calibration;
pub mod error;
pub mod front_end;
pub mod protocol;
pub mod sds_connector;
pub mod sds_scope;
pub mod state_word;
pub mod trigger_config;
pub mod usb_transport;

// Re-export the main types for convenience
pub use acquisition::{decode_sample, CancelToken, DataStream, RawSampleBuffer};

pub use calibration::Calibration;

pub use error::ErrorKind;

pub use front_end::{Relay, VoltageRange};

pub use sds_connector::{
    DeviceDescriptor, DeviceList, RusbBus, SdsConnector, SdsConnectorError, UsbBus, UsbCandidate,
};

pub use sds_scope::{Channel, SdsConfig, SdsScope, SdsScopeError};

pub use state_word::{TimeTriggerRegister, Timebase};

pub use trigger_config::{TriggerConfig, TriggerMode, TriggerSlope};

pub use usb_transport::{RusbTransport, SdsTransport, TransportError};
