use std::sync::atomic::{AtomicUsize, Ordering};

use rusb::UsbContext;

use crate::error::ErrorKind;
use crate::protocol::{SDS_PID, SDS_VID};
use crate::sds_scope::{SdsConfig, SdsScope, SdsScopeError};
use crate::usb_transport::{RusbTransport, SdsTransport, TransportError};

#[derive(Debug, thiserror::Error)]
pub enum SdsConnectorError {
    #[error("No SDS 200A found. Please connect a scope and check its permissions")]
    NoDevice,

    #[error("USB error: {0}")]
    Transport(#[from] TransportError),

    #[error("Scope initialization failed: {0}")]
    Scope(#[from] SdsScopeError),

    #[error("Device descriptor is not part of this list or was already opened")]
    SlotUnavailable,
}

impl SdsConnectorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoDevice => ErrorKind::NoDevice,
            Self::Transport(e) => e.kind(),
            Self::Scope(e) => e.kind(),
            Self::SlotUnavailable => ErrorKind::InvalidParam,
        }
    }
}

/// A device found on the bus that has not been opened yet.
pub trait UsbCandidate {
    type Transport: SdsTransport;

    fn vendor_id(&self) -> u16;
    fn product_id(&self) -> u16;
    fn bus_number(&self) -> u8;
    fn port_number(&self) -> u8;
    fn open(self) -> Result<Self::Transport, TransportError>;
}

/// Source of candidates, in bus-scan order.
pub trait UsbBus {
    type Candidate: UsbCandidate;

    fn scan(&self) -> Result<Vec<Self::Candidate>, TransportError>;
}

/// The host's USB bus as seen by libusb.
#[derive(Debug, Clone, Copy, Default)]
pub struct RusbBus;

impl UsbBus for RusbBus {
    type Candidate = RusbCandidate;

    fn scan(&self) -> Result<Vec<RusbCandidate>, TransportError> {
        // reference counted: every candidate, and every transport opened from
        // one, keeps this context alive
        let context = rusb::Context::new()?;
        let mut candidates = Vec::new();
        for device in context.devices()?.iter() {
            match device.device_descriptor() {
                Ok(descriptor) => candidates.push(RusbCandidate {
                    vendor_id: descriptor.vendor_id(),
                    product_id: descriptor.product_id(),
                    device,
                }),
                Err(e) => log::debug!(
                    "Skipping device at bus {} port {}: {}",
                    device.bus_number(),
                    device.port_number(),
                    e
                ),
            }
        }
        Ok(candidates)
    }
}

#[derive(Debug)]
pub struct RusbCandidate {
    vendor_id: u16,
    product_id: u16,
    device: rusb::Device<rusb::Context>,
}

impl UsbCandidate for RusbCandidate {
    type Transport = RusbTransport;

    fn vendor_id(&self) -> u16 {
        self.vendor_id
    }

    fn product_id(&self) -> u16 {
        self.product_id
    }

    fn bus_number(&self) -> u8 {
        self.device.bus_number()
    }

    fn port_number(&self) -> u8 {
        self.device.port_number()
    }

    fn open(self) -> Result<RusbTransport, TransportError> {
        RusbTransport::open(&self.device)
    }
}

/// Where a scope is plugged in. Only valid for the list that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceDescriptor {
    pub bus_number: u8,
    pub port_number: u8,
    list: usize,
    slot: usize,
}

static NEXT_LIST_ID: AtomicUsize = AtomicUsize::new(0);

/// Scopes found by one enumeration. Each can be opened once.
#[derive(Debug)]
pub struct DeviceList<C> {
    id: usize,
    descriptors: Vec<DeviceDescriptor>,
    candidates: Vec<Option<C>>,
}

impl<C: UsbCandidate> DeviceList<C> {
    fn new(candidates: Vec<C>) -> Self {
        let id = NEXT_LIST_ID.fetch_add(1, Ordering::Relaxed);
        let descriptors = candidates
            .iter()
            .enumerate()
            .map(|(slot, candidate)| DeviceDescriptor {
                bus_number: candidate.bus_number(),
                port_number: candidate.port_number(),
                list: id,
                slot,
            })
            .collect();
        Self {
            id,
            descriptors,
            candidates: candidates.into_iter().map(Some).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn descriptors(&self) -> &[DeviceDescriptor] {
        &self.descriptors
    }

    /// Open and initialize a scope with the default configuration.
    pub fn open(
        &mut self,
        descriptor: &DeviceDescriptor,
    ) -> Result<SdsScope<C::Transport>, SdsConnectorError> {
        self.open_with(descriptor, SdsConfig::default())
    }

    /// Open and initialize a scope. The descriptor is used up even if this
    /// fails.
    pub fn open_with(
        &mut self,
        descriptor: &DeviceDescriptor,
        config: SdsConfig,
    ) -> Result<SdsScope<C::Transport>, SdsConnectorError> {
        if descriptor.list != self.id {
            return Err(SdsConnectorError::SlotUnavailable);
        }
        let candidate = self
            .candidates
            .get_mut(descriptor.slot)
            .and_then(Option::take)
            .ok_or(SdsConnectorError::SlotUnavailable)?;

        let transport = candidate.open()?;
        Ok(SdsScope::initialize(transport, config)?)
    }
}

pub struct SdsConnector;

impl SdsConnector {
    /// Find every SDS 200A attached to the host.
    pub fn enumerate() -> Result<DeviceList<RusbCandidate>, SdsConnectorError> {
        Self::enumerate_on(&RusbBus)
    }

    /// Find every SDS 200A on the given bus. An empty result is an error.
    pub fn enumerate_on<B: UsbBus>(bus: &B) -> Result<DeviceList<B::Candidate>, SdsConnectorError> {
        let matching: Vec<B::Candidate> = bus
            .scan()?
            .into_iter()
            .filter(|c| c.vendor_id() == SDS_VID && c.product_id() == SDS_PID)
            .collect();
        log::debug!("Found {} SDS 200A device(s)", matching.len());

        if matching.is_empty() {
            return Err(SdsConnectorError::NoDevice);
        }
        Ok(DeviceList::new(matching))
    }

    /// Open the first scope found, with the default configuration.
    pub fn open_first() -> Result<SdsScope<RusbTransport>, SdsConnectorError> {
        Self::open_first_on(&RusbBus, SdsConfig::default())
    }

    pub fn open_first_on<B: UsbBus>(
        bus: &B,
        config: SdsConfig,
    ) -> Result<SdsScope<<B::Candidate as UsbCandidate>::Transport>, SdsConnectorError> {
        let mut list = Self::enumerate_on(bus)?;
        let first = *list
            .descriptors()
            .first()
            .ok_or(SdsConnectorError::NoDevice)?;
        list.open_with(&first, config)
    }
}
