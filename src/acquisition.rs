//! Sample acquisition and the 10 bit sample decoder.
//!
//! The device sets a flag once a bulk read will not block; every read checks
//! that flag first. A sample transfer is an 8 byte header of unknown meaning
//! followed by little-endian words alternating between channel 1 and 2.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use polars::prelude::*;

use crate::protocol::{RAW_BUFFER_SIZE, REQUEST_DATA_AVAILABLE, SAMPLE_HEADER_SIZE};
use crate::sds_scope::{Channel, SdsScope, SdsScopeError};
use crate::state_word::Timebase;
use crate::usb_transport::SdsTransport;

const SAMPLE_COLUMN_NAME: &str = "sample";
const CH1_COLUMN_NAME: &str = "ch1_raw";
const CH2_COLUMN_NAME: &str = "ch2_raw";

/// ADC code of one sample: bits 0..5 of the low byte, bits 0..3 of the high one.
pub fn decode_sample(low: u8, high: u8) -> u16 {
    (u16::from(high & 0x0f) << 6) | u16::from(low & 0x3f)
}

/// [`decode_sample`] on a word as it sits in a [`RawSampleBuffer`].
pub fn decode_word(word: u16) -> u16 {
    let [low, high] = word.to_le_bytes();
    decode_sample(low, high)
}

/// One bulk sample transfer, undecoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSampleBuffer {
    pub header: [u8; SAMPLE_HEADER_SIZE],
    /// Interleaved ch1, ch2, ch1, ... words.
    pub samples: Vec<u16>,
}

impl RawSampleBuffer {
    /// Split a transfer into header and words. A trailing odd byte is dropped.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SdsScopeError> {
        let (header, body) = bytes
            .split_first_chunk::<SAMPLE_HEADER_SIZE>()
            .ok_or(SdsScopeError::ShortSampleBuffer { len: bytes.len() })?;

        let samples = body
            .chunks_exact(2)
            .map(|word| u16::from_le_bytes([word[0], word[1]]))
            .collect();
        Ok(Self {
            header: *header,
            samples,
        })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Decoded ADC codes of one channel, in time order.
    pub fn channel(&self, channel: Channel) -> Vec<u16> {
        self.samples
            .iter()
            .skip(channel.index())
            .step_by(2)
            .map(|&word| decode_word(word))
            .collect()
    }

    /// First decoded sample of a channel.
    pub fn first(&self, channel: Channel) -> Option<u16> {
        self.samples.get(channel.index()).map(|&word| decode_word(word))
    }

    /// Decoded samples as a frame with one row per ch1/ch2 pair.
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let pairs = self.samples.len() / 2;
        let index: Vec<u32> = (0..pairs as u32).collect();
        let ch1: Vec<u32> = self
            .channel(Channel::Ch1)
            .into_iter()
            .take(pairs)
            .map(u32::from)
            .collect();
        let ch2: Vec<u32> = self
            .channel(Channel::Ch2)
            .into_iter()
            .take(pairs)
            .map(u32::from)
            .collect();

        DataFrame::new(vec![
            Series::new(SAMPLE_COLUMN_NAME.into(), index).into(),
            Series::new(CH1_COLUMN_NAME.into(), ch1).into(),
            Series::new(CH2_COLUMN_NAME.into(), ch2).into(),
        ])
    }

    pub fn write_csv<W: std::io::Write>(&self, writer: W) -> PolarsResult<()> {
        let mut df = self.to_dataframe()?;
        CsvWriter::new(writer).include_header(true).finish(&mut df)
    }
}

/// Stops a [`DataStream`], from any thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Endless sequence of raw transfers, see [`SdsScope::stream`].
#[derive(Debug)]
pub struct DataStream<'a, T: SdsTransport> {
    scope: &'a mut SdsScope<T>,
    cancel: CancelToken,
    buf: Vec<u8>,
    done: bool,
}

impl<T: SdsTransport> Iterator for DataStream<'_, T> {
    type Item = Result<Vec<u8>, SdsScopeError>;

    fn next(&mut self) -> Option<Self::Item> {
        let poll_interval = self.scope.config.poll_interval;
        loop {
            if self.done || self.cancel.is_cancelled() {
                return None;
            }
            match self.scope.read_raw(&mut self.buf) {
                Ok(0) => {
                    if !poll_interval.is_zero() {
                        thread::sleep(poll_interval);
                    }
                }
                Ok(n) => return Some(Ok(self.buf[..n].to_vec())),
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

impl<T: SdsTransport> SdsScope<T> {
    /// Whether the next bulk read will return data right away.
    pub fn data_available(&mut self) -> Result<bool, SdsScopeError> {
        let mut flag = [0u8; 1];
        self.control_in(REQUEST_DATA_AVAILABLE, &mut flag)?;
        Ok(flag[0] != 0)
    }

    /// One bulk read into `buf` if data is pending, otherwise `Ok(0)`.
    pub fn read_raw(&mut self, buf: &mut [u8]) -> Result<usize, SdsScopeError> {
        if !self.data_available()? {
            return Ok(0);
        }
        self.bulk_in(buf)
    }

    /// Read one sample transfer. "No data yet" counts as a short buffer.
    pub fn raw_samples(&mut self) -> Result<RawSampleBuffer, SdsScopeError> {
        let size = self.timebase.map_or(RAW_BUFFER_SIZE, Timebase::raw_buffer_size);
        let mut buf = vec![0u8; size];
        let len = self.read_raw(&mut buf)?;
        buf.truncate(len);
        RawSampleBuffer::from_bytes(&buf)
    }

    /// Convert a sample word to volts. Needs a scale calibration, which the
    /// driver cannot produce yet.
    pub fn decode_volts(&self, _channel: Channel, _word: u16) -> Result<f64, SdsScopeError> {
        self.ensure_open()?;
        Err(SdsScopeError::NotSupported("voltage conversion"))
    }

    /// Poll the device until `cancel` fires, yielding every non-empty transfer.
    pub fn stream(&mut self, cancel: CancelToken) -> DataStream<'_, T> {
        let chunk = self.config.stream_chunk_size;
        DataStream {
            scope: self,
            cancel,
            buf: vec![0u8; chunk],
            done: false,
        }
    }
}
