//! Mock UART implementation for testing

use crate::platform::{
    error::{PlatformError, UartError},
    traits::{UartConfig, UartInterface},
    Result,
};
use heapless::{Deque, Vec};

/// Maximum size of a single receive chunk
const MOCK_CHUNK_SIZE: usize = 128;
/// Maximum number of buffered receive items
const MOCK_MAX_CHUNKS: usize = 256;
/// Maximum number of scripted response groups
const MOCK_MAX_RESPONSES: usize = 64;
/// Capacity of the transmit capture buffer
const MOCK_TX_SIZE: usize = 4096;

/// One element of the simulated receive stream
#[derive(Debug)]
enum RxItem {
    /// Bytes ready to read
    Data(Vec<u8, MOCK_CHUNK_SIZE>),
    /// A gap in delivery: the next read returns nothing once
    Pause,
}

/// Mock UART implementation
///
/// Provides an in-memory transmit capture buffer and a scripted receive
/// side, allowing unit tests to verify UART conversations without hardware.
///
/// Receive data can be supplied two ways:
///
/// - [`inject_rx_data`](MockUart::inject_rx_data) makes bytes readable
///   immediately (unsolicited data such as NMEA sentences or URCs)
/// - [`queue_response`](MockUart::queue_response) /
///   [`queue_response_chunks`](MockUart::queue_response_chunks) hold bytes
///   back until the next `write` call, modelling a request/response
///   peripheral
///
/// The chunked variant places a delivery gap between chunks: each chunk
/// arrives on a separate read with an empty read in between, so tests can
/// split a terminator or frame at any byte boundary and exercise the
/// partial-delivery paths of the drivers.
#[derive(Debug)]
pub struct MockUart {
    config: UartConfig,
    tx_buffer: Vec<u8, MOCK_TX_SIZE>,
    rx_items: Deque<RxItem, MOCK_MAX_CHUNKS>,
    scripted: Deque<RxItem, MOCK_MAX_CHUNKS>,
    script_groups: Deque<usize, MOCK_MAX_RESPONSES>,
}

impl MockUart {
    /// Create a new mock UART
    pub fn new(config: UartConfig) -> Self {
        Self {
            config,
            tx_buffer: Vec::new(),
            rx_items: Deque::new(),
            scripted: Deque::new(),
            script_groups: Deque::new(),
        }
    }

    /// Get transmitted data (for test verification)
    pub fn tx_buffer(&self) -> &[u8] {
        &self.tx_buffer
    }

    /// Clear transmit buffer
    pub fn clear_tx_buffer(&mut self) {
        self.tx_buffer.clear();
    }

    /// Inject receive data that becomes readable immediately
    pub fn inject_rx_data(&mut self, data: &[u8]) {
        for piece in data.chunks(MOCK_CHUNK_SIZE) {
            let chunk = Vec::from_slice(piece).unwrap();
            self.rx_items.push_back(RxItem::Data(chunk)).unwrap();
        }
    }

    /// Queue a response that becomes readable after the next `write`
    pub fn queue_response(&mut self, data: &[u8]) {
        let mut count = 0;
        for piece in data.chunks(MOCK_CHUNK_SIZE) {
            let chunk = Vec::from_slice(piece).unwrap();
            self.scripted.push_back(RxItem::Data(chunk)).unwrap();
            count += 1;
        }
        self.script_groups.push_back(count).unwrap();
    }

    /// Queue a response delivered with a gap between the given chunks
    ///
    /// Each element of `chunks` arrives on its own read, separated by an
    /// empty read, so a terminator or frame can be split at any byte
    /// boundary.
    pub fn queue_response_chunks(&mut self, chunks: &[&[u8]]) {
        let mut count = 0;
        for (index, data) in chunks.iter().enumerate() {
            if index > 0 {
                self.scripted.push_back(RxItem::Pause).unwrap();
                count += 1;
            }
            for piece in data.chunks(MOCK_CHUNK_SIZE) {
                let chunk = Vec::from_slice(piece).unwrap();
                self.scripted.push_back(RxItem::Data(chunk)).unwrap();
                count += 1;
            }
        }
        self.script_groups.push_back(count).unwrap();
    }

    /// Get current baud rate
    pub fn baud_rate(&self) -> u32 {
        self.config.baud_rate
    }
}

impl UartInterface for MockUart {
    fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.tx_buffer
            .extend_from_slice(data)
            .map_err(|_| PlatformError::Uart(UartError::WriteFailed))?;

        // Release the next scripted response group, if any
        if let Some(count) = self.script_groups.pop_front() {
            for _ in 0..count {
                if let Some(item) = self.scripted.pop_front() {
                    self.rx_items.push_back(item).unwrap();
                }
            }
        }
        Ok(data.len())
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        match self.rx_items.pop_front() {
            None => Ok(0),
            Some(RxItem::Pause) => Ok(0),
            Some(RxItem::Data(chunk)) => {
                let to_read = core::cmp::min(buffer.len(), chunk.len());
                buffer[..to_read].copy_from_slice(&chunk[..to_read]);

                if to_read < chunk.len() {
                    let rest = Vec::from_slice(&chunk[to_read..]).unwrap();
                    self.rx_items.push_front(RxItem::Data(rest)).unwrap();
                }
                Ok(to_read)
            }
        }
    }

    fn set_baud_rate(&mut self, baud: u32) -> Result<()> {
        self.config.baud_rate = baud;
        Ok(())
    }

    fn available(&self) -> bool {
        matches!(self.rx_items.front(), Some(RxItem::Data(_)))
    }

    fn flush(&mut self) -> Result<()> {
        // Mock implementation - nothing to flush
        Ok(())
    }
}
