use std::time::Duration;

use crate::error::ErrorKind;

/// Errors reported by the host USB stack, one variant per libusb code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Input/output error")]
    Io,

    #[error("Invalid parameter")]
    InvalidParam,

    #[error("Access denied (insufficient permissions)")]
    Access,

    #[error("No such device (it may have been disconnected)")]
    NoDevice,

    #[error("Entity not found")]
    NotFound,

    #[error("Resource busy")]
    Busy,

    #[error("Operation timed out")]
    Timeout,

    #[error("Overflow")]
    Overflow,

    #[error("Pipe error")]
    Pipe,

    #[error("System call interrupted")]
    Interrupted,

    #[error("Insufficient memory")]
    NoMemory,

    #[error("Operation not supported on this platform")]
    NotSupported,

    #[error("Unknown USB error")]
    Unknown,

    #[error("Short transfer: expected {expected} bytes but {actual} were transferred")]
    ShortTransfer { expected: usize, actual: usize },
}

impl TransportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io | Self::ShortTransfer { .. } => ErrorKind::Io,
            Self::InvalidParam => ErrorKind::InvalidParam,
            Self::Access => ErrorKind::Access,
            Self::NoDevice => ErrorKind::NoDevice,
            Self::NotFound => ErrorKind::NotFound,
            Self::Busy => ErrorKind::Busy,
            Self::Timeout => ErrorKind::Timeout,
            Self::Overflow => ErrorKind::Overflow,
            Self::Pipe => ErrorKind::Pipe,
            Self::Interrupted => ErrorKind::Interrupted,
            Self::NoMemory => ErrorKind::NoMemory,
            Self::NotSupported => ErrorKind::NotSupported,
            Self::Unknown => ErrorKind::Unknown,
        }
    }
}

impl From<rusb::Error> for TransportError {
    fn from(error: rusb::Error) -> Self {
        match error {
            rusb::Error::Io => Self::Io,
            rusb::Error::InvalidParam => Self::InvalidParam,
            rusb::Error::Access => Self::Access,
            rusb::Error::NoDevice => Self::NoDevice,
            rusb::Error::NotFound => Self::NotFound,
            rusb::Error::Busy => Self::Busy,
            rusb::Error::Timeout => Self::Timeout,
            rusb::Error::Overflow => Self::Overflow,
            rusb::Error::Pipe => Self::Pipe,
            rusb::Error::Interrupted => Self::Interrupted,
            rusb::Error::NoMem => Self::NoMemory,
            rusb::Error::NotSupported => Self::NotSupported,
            // codes libusb did not have a name for when this was written
            rusb::Error::BadDescriptor | rusb::Error::Other => Self::Unknown,
        }
    }
}

/// Raw control/bulk primitive the driver is built on.
///
/// Implementations pass transfers through unchanged; length checks and
/// retries (there are none) live in the session.
pub trait SdsTransport {
    fn write_control(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, TransportError>;

    fn read_control(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, TransportError>;

    fn read_bulk(
        &mut self,
        endpoint: u8,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, TransportError>;
}

impl<T: SdsTransport + ?Sized> SdsTransport for Box<T> {
    fn write_control(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, TransportError> {
        (**self).write_control(request_type, request, value, index, data, timeout)
    }

    fn read_control(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, TransportError> {
        (**self).read_control(request_type, request, value, index, buf, timeout)
    }

    fn read_bulk(
        &mut self,
        endpoint: u8,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, TransportError> {
        (**self).read_bulk(endpoint, buf, timeout)
    }
}

/// An open libusb handle to a SDS 200A.
pub struct RusbTransport {
    handle: rusb::DeviceHandle<rusb::Context>,
}

impl RusbTransport {
    /// Open the device and try to claim its only interface
    pub fn open(device: &rusb::Device<rusb::Context>) -> Result<Self, TransportError> {
        log::debug!(
            "Opening SDS 200A at bus {} port {}",
            device.bus_number(),
            device.port_number()
        );
        let mut handle = device.open()?;

        // The vendor driver never claims the interface; some kernels refuse bulk
        // transfers without it, so try but do not insist.
        if let Err(e) = handle.set_auto_detach_kernel_driver(true) {
            log::debug!("Kernel driver auto-detach unavailable: {}", e);
        }
        if let Err(e) = handle.claim_interface(0) {
            log::debug!("Could not claim interface 0: {}", e);
        }

        Ok(Self { handle })
    }
}

impl std::fmt::Debug for RusbTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let device = self.handle.device();
        f.debug_struct("RusbTransport")
            .field("bus", &device.bus_number())
            .field("port", &device.port_number())
            .finish()
    }
}

impl SdsTransport for RusbTransport {
    fn write_control(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, TransportError> {
        Ok(self
            .handle
            .write_control(request_type, request, value, index, data, timeout)?)
    }

    fn read_control(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, TransportError> {
        Ok(self
            .handle
            .read_control(request_type, request, value, index, buf, timeout)?)
    }

    fn read_bulk(
        &mut self,
        endpoint: u8,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, TransportError> {
        Ok(self.handle.read_bulk(endpoint, buf, timeout)?)
    }
}

/// In-memory scope for unit tests.
///
/// Always compiled, hidden from public docs.
#[doc(hidden)]
pub mod mock {
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;
    use std::time::Duration;

    use super::{SdsTransport, TransportError};
    use crate::protocol::{
        OFFSET_DAC_CENTER, OFFSET_SELECTOR_CH1, REQUEST_DATA_AVAILABLE, REQUEST_OFFSET,
        SAMPLE_HEADER_SIZE,
    };
    use crate::sds_connector::{UsbBus, UsbCandidate};

    /// One recorded transfer, in the order the driver issued it.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Transfer {
        ControlOut {
            request_type: u8,
            request: u8,
            value: u16,
            index: u16,
            data: Vec<u8>,
        },
        ControlIn {
            request_type: u8,
            request: u8,
            length: usize,
        },
        BulkIn {
            endpoint: u8,
            length: usize,
        },
    }

    impl Transfer {
        /// Request code for control transfers, endpoint for bulk ones.
        pub fn key(&self) -> u8 {
            match self {
                Self::ControlOut { request, .. } | Self::ControlIn { request, .. } => *request,
                Self::BulkIn { endpoint, .. } => *endpoint,
            }
        }

        pub fn payload(&self) -> Option<&[u8]> {
            match self {
                Self::ControlOut { data, .. } => Some(data),
                _ => None,
            }
        }
    }

    #[derive(Debug)]
    enum Matcher {
        Index(usize),
        Key { key: u8, nth: usize },
    }

    #[derive(Debug)]
    enum Injected {
        Error(TransportError),
        Short(usize),
    }

    #[derive(Debug)]
    struct MockState {
        transfers: Vec<Transfer>,
        open: bool,
        opened: usize,
        data_available: u8,
        bulk_frames: VecDeque<Vec<u8>>,
        adc_model: Option<fn(u16) -> u16>,
        dac: [u16; 2],
        failures: Vec<(Matcher, Injected)>,
    }

    impl MockState {
        fn record(&mut self, transfer: Transfer) -> Option<Injected> {
            let index = self.transfers.len();
            let key = transfer.key();
            if self.failures.is_empty() {
                self.transfers.push(transfer);
                return None;
            }
            let seen = self.transfers.iter().filter(|t| t.key() == key).count();
            self.transfers.push(transfer);

            let position = self.failures.iter().position(|(matcher, _)| match matcher {
                Matcher::Index(i) => *i == index,
                Matcher::Key { key: k, nth } => *k == key && *nth == seen,
            })?;
            Some(self.failures.remove(position).1)
        }

        fn sample_frame(&self) -> Vec<u8> {
            let Some(model) = self.adc_model else {
                return Vec::new();
            };
            let mut frame = vec![0u8; SAMPLE_HEADER_SIZE];
            for _ in 0..4 {
                for dac in self.dac {
                    frame.extend_from_slice(&encode_sample(model(dac)));
                }
            }
            frame
        }
    }

    /// Wire encoding of a 10 bit ADC code.
    pub fn encode_sample(value: u16) -> [u8; 2] {
        [(value & 0x3f) as u8, ((value >> 6) & 0x0f) as u8]
    }

    /// A sample transfer: zero header followed by the given interleaved codes.
    pub fn sample_frame(codes: &[u16]) -> Vec<u8> {
        let mut frame = vec![0u8; SAMPLE_HEADER_SIZE];
        for &code in codes {
            frame.extend_from_slice(&encode_sample(code));
        }
        frame
    }

    /// Shared handle to a simulated device; clones observe the same state.
    #[derive(Debug, Clone)]
    pub struct MockDevice {
        state: Rc<RefCell<MockState>>,
    }

    impl Default for MockDevice {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MockDevice {
        pub fn new() -> Self {
            Self {
                state: Rc::new(RefCell::new(MockState {
                    transfers: Vec::new(),
                    open: false,
                    opened: 0,
                    data_available: 0,
                    bulk_frames: VecDeque::new(),
                    adc_model: None,
                    dac: [OFFSET_DAC_CENTER; 2],
                    failures: Vec::new(),
                })),
            }
        }

        /// Open a transport onto this device.
        pub fn transport(&self) -> MockTransport {
            let mut state = self.state.borrow_mut();
            state.open = true;
            state.opened += 1;
            MockTransport {
                state: Rc::clone(&self.state),
            }
        }

        pub fn is_open(&self) -> bool {
            self.state.borrow().open
        }

        /// How many transports were ever opened onto this device.
        pub fn times_opened(&self) -> usize {
            self.state.borrow().opened
        }

        pub fn transfers(&self) -> Vec<Transfer> {
            self.state.borrow().transfers.clone()
        }

        pub fn clear_transfers(&self) {
            self.state.borrow_mut().transfers.clear();
        }

        /// Payloads of every control-out transfer with the given request code.
        pub fn payloads(&self, request: u8) -> Vec<Vec<u8>> {
            self.state
                .borrow()
                .transfers
                .iter()
                .filter(|t| matches!(t, Transfer::ControlOut { request: r, .. } if *r == request))
                .filter_map(|t| t.payload().map(<[u8]>::to_vec))
                .collect()
        }

        /// Fail the transfer at the given position in the overall sequence.
        pub fn fail_transfer(&self, index: usize, error: TransportError) {
            self.state
                .borrow_mut()
                .failures
                .push((Matcher::Index(index), Injected::Error(error)));
        }

        /// Fail the `nth` (0 based) transfer carrying this request code or endpoint.
        pub fn fail_request(&self, key: u8, nth: usize, error: TransportError) {
            self.state
                .borrow_mut()
                .failures
                .push((Matcher::Key { key, nth }, Injected::Error(error)));
        }

        /// Let the transfer at `index` move only `actual` bytes.
        pub fn short_transfer(&self, index: usize, actual: usize) {
            self.state
                .borrow_mut()
                .failures
                .push((Matcher::Index(index), Injected::Short(actual)));
        }

        pub fn set_data_available(&self, flag: u8) {
            self.state.borrow_mut().data_available = flag;
        }

        /// Queue a bulk frame; queued frames take precedence over the ADC model.
        pub fn push_bulk_frame(&self, frame: Vec<u8>) {
            self.state.borrow_mut().bulk_frames.push_back(frame);
        }

        /// Derive every channel's sample from that channel's last offset DAC value.
        pub fn set_adc_model(&self, model: fn(u16) -> u16) {
            self.state.borrow_mut().adc_model = Some(model);
        }

        /// Last offset DAC value per channel, `[ch1, ch2]`.
        pub fn dac(&self) -> [u16; 2] {
            self.state.borrow().dac
        }
    }

    #[derive(Debug)]
    pub struct MockTransport {
        state: Rc<RefCell<MockState>>,
    }

    impl Drop for MockTransport {
        fn drop(&mut self) {
            self.state.borrow_mut().open = false;
        }
    }

    impl SdsTransport for MockTransport {
        fn write_control(
            &mut self,
            request_type: u8,
            request: u8,
            value: u16,
            index: u16,
            data: &[u8],
            _timeout: Duration,
        ) -> Result<usize, TransportError> {
            let mut state = self.state.borrow_mut();
            let injected = state.record(Transfer::ControlOut {
                request_type,
                request,
                value,
                index,
                data: data.to_vec(),
            });
            match injected {
                Some(Injected::Error(e)) => return Err(e),
                Some(Injected::Short(n)) => return Ok(n),
                None => {}
            }

            if request == REQUEST_OFFSET && data.len() == 3 {
                let dac = u16::from(data[0]) | (u16::from(data[1]) << 8);
                let slot = usize::from(data[2] != OFFSET_SELECTOR_CH1);
                state.dac[slot] = dac;
            }
            Ok(data.len())
        }

        fn read_control(
            &mut self,
            request_type: u8,
            request: u8,
            _value: u16,
            _index: u16,
            buf: &mut [u8],
            _timeout: Duration,
        ) -> Result<usize, TransportError> {
            let mut state = self.state.borrow_mut();
            let injected = state.record(Transfer::ControlIn {
                request_type,
                request,
                length: buf.len(),
            });
            match injected {
                Some(Injected::Error(e)) => return Err(e),
                Some(Injected::Short(n)) => return Ok(n),
                None => {}
            }

            if request == REQUEST_DATA_AVAILABLE && !buf.is_empty() {
                buf[0] = state.data_available;
                return Ok(1);
            }
            Ok(0)
        }

        fn read_bulk(
            &mut self,
            endpoint: u8,
            buf: &mut [u8],
            _timeout: Duration,
        ) -> Result<usize, TransportError> {
            let mut state = self.state.borrow_mut();
            let injected = state.record(Transfer::BulkIn {
                endpoint,
                length: buf.len(),
            });
            match injected {
                Some(Injected::Error(e)) => return Err(e),
                Some(Injected::Short(n)) => return Ok(n.min(buf.len())),
                None => {}
            }

            let frame = match state.bulk_frames.pop_front() {
                Some(frame) => frame,
                None => state.sample_frame(),
            };
            let n = frame.len().min(buf.len());
            buf[..n].copy_from_slice(&frame[..n]);
            Ok(n)
        }
    }

    /// A device as it shows up on a [`MockBus`].
    #[derive(Debug, Clone)]
    pub struct MockCandidate {
        vendor_id: u16,
        product_id: u16,
        bus_number: u8,
        port_number: u8,
        device: MockDevice,
        open_error: Option<TransportError>,
    }

    impl MockCandidate {
        pub fn new(
            vendor_id: u16,
            product_id: u16,
            bus_number: u8,
            port_number: u8,
            device: MockDevice,
        ) -> Self {
            Self {
                vendor_id,
                product_id,
                bus_number,
                port_number,
                device,
                open_error: None,
            }
        }

        /// Make opening this candidate fail.
        pub fn failing_open(mut self, error: TransportError) -> Self {
            self.open_error = Some(error);
            self
        }
    }

    impl UsbCandidate for MockCandidate {
        type Transport = MockTransport;

        fn vendor_id(&self) -> u16 {
            self.vendor_id
        }

        fn product_id(&self) -> u16 {
            self.product_id
        }

        fn bus_number(&self) -> u8 {
            self.bus_number
        }

        fn port_number(&self) -> u8 {
            self.port_number
        }

        fn open(self) -> Result<MockTransport, TransportError> {
            match self.open_error {
                Some(e) => Err(e),
                None => Ok(self.device.transport()),
            }
        }
    }

    #[derive(Debug, Default)]
    pub struct MockBus {
        candidates: Vec<MockCandidate>,
        scan_error: Option<TransportError>,
    }

    impl MockBus {
        pub fn new() -> Self {
            Self::default()
        }

        /// A bus whose scan always fails.
        pub fn failing(error: TransportError) -> Self {
            Self {
                candidates: Vec::new(),
                scan_error: Some(error),
            }
        }

        pub fn with(mut self, candidate: MockCandidate) -> Self {
            self.candidates.push(candidate);
            self
        }
    }

    impl UsbBus for MockBus {
        type Candidate = MockCandidate;

        fn scan(&self) -> Result<Vec<MockCandidate>, TransportError> {
            match &self.scan_error {
                Some(e) => Err(e.clone()),
                None => Ok(self.candidates.clone()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::{sample_frame, MockDevice, Transfer};
    use super::*;
    use crate::protocol::{ENDPOINT_BULK_IN, REQUEST_RELAY, REQUEST_TYPE_OUT};

    #[test]
    fn rusb_errors_map_one_to_one() {
        assert_eq!(TransportError::from(rusb::Error::Timeout), TransportError::Timeout);
        assert_eq!(TransportError::from(rusb::Error::NoMem), TransportError::NoMemory);
        assert_eq!(TransportError::from(rusb::Error::Pipe).kind(), ErrorKind::Pipe);
        assert_eq!(TransportError::from(rusb::Error::Access).kind(), ErrorKind::Access);
    }

    #[test]
    fn unnamed_rusb_errors_are_unknown_not_success() {
        assert_eq!(TransportError::from(rusb::Error::Other).kind(), ErrorKind::Unknown);
        assert_eq!(
            TransportError::from(rusb::Error::BadDescriptor).kind(),
            ErrorKind::Unknown
        );
    }

    #[test]
    fn short_transfer_is_an_io_error() {
        let e = TransportError::ShortTransfer {
            expected: 21,
            actual: 3,
        };
        assert_eq!(e.kind(), ErrorKind::Io);
        assert!(e.to_string().contains("21"));
    }

    #[test]
    fn mock_records_and_injects_failures() {
        let device = MockDevice::new();
        let mut transport = device.transport();
        device.fail_request(REQUEST_RELAY, 1, TransportError::Pipe);

        let timeout = Duration::from_millis(1);
        assert_eq!(
            transport.write_control(REQUEST_TYPE_OUT, REQUEST_RELAY, 0, 0, &[0x01], timeout),
            Ok(1)
        );
        assert_eq!(
            transport.write_control(REQUEST_TYPE_OUT, REQUEST_RELAY, 0, 0, &[0x00], timeout),
            Err(TransportError::Pipe)
        );
        assert_eq!(device.payloads(REQUEST_RELAY), vec![vec![0x01], vec![0x00]]);
    }

    #[test]
    fn mock_bulk_returns_queued_frames_then_nothing() {
        let device = MockDevice::new();
        let mut transport = device.transport();
        device.push_bulk_frame(sample_frame(&[1, 2]));

        let mut buf = [0u8; 64];
        let timeout = Duration::from_millis(1);
        assert_eq!(transport.read_bulk(ENDPOINT_BULK_IN, &mut buf, timeout), Ok(12));
        assert_eq!(transport.read_bulk(ENDPOINT_BULK_IN, &mut buf, timeout), Ok(0));
        assert!(matches!(
            device.transfers()[0],
            Transfer::BulkIn { endpoint: ENDPOINT_BULK_IN, length: 64 }
        ));
    }

    #[test]
    fn dropping_mock_transport_closes_device() {
        let device = MockDevice::new();
        let transport = device.transport();
        assert!(device.is_open());
        drop(transport);
        assert!(!device.is_open());
        assert_eq!(device.times_opened(), 1);
    }
}
