//! Byte-stream accumulation
//!
//! Serial peripherals deliver bytes in arbitrarily small pieces with no
//! session boundaries; [`RxBuffer`] accumulates them until a caller can
//! extract a complete protocol unit, and [`Deadline`] bounds how long a
//! caller keeps waiting. Unconsumed bytes stay in the buffer for the next
//! call - a later message's bytes are never dropped.

use crate::platform::{
    error::{PlatformError, UartError},
    traits::{TimerInterface, UartInterface},
};
use heapless::Vec;

/// Delay between polls while waiting for more bytes
///
/// Also what advances simulated time in tests, so every wait loop must go
/// through [`RxBuffer::poll`] rather than spinning on `available`.
pub const IDLE_POLL_DELAY_MS: u32 = 1;

/// A timeout budget measured against the platform's monotonic clock
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start_ms: u64,
    budget_ms: u64,
}

impl Deadline {
    /// Start a new budget of `budget_ms` milliseconds from now
    pub fn new<T: TimerInterface>(timer: &T, budget_ms: u64) -> Self {
        Self {
            start_ms: timer.now_ms(),
            budget_ms,
        }
    }

    /// Whether the budget has elapsed
    ///
    /// A zero budget is expired from the start; callers use that to issue a
    /// request whose reply is known to arrive where it cannot be read (the
    /// baud-rate renegotiation handshake).
    pub fn expired<T: TimerInterface>(&self, timer: &T) -> bool {
        timer.now_ms().saturating_sub(self.start_ms) >= self.budget_ms
    }
}

/// Growable receive buffer with explicit consumption
///
/// `N` bounds how many unparsed bytes may accumulate; exceeding it reports a
/// receive overrun rather than silently discarding data.
#[derive(Debug, Default)]
pub struct RxBuffer<const N: usize> {
    buf: Vec<u8, N>,
}

impl<const N: usize> RxBuffer<N> {
    /// Create an empty buffer
    pub const fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Number of buffered bytes
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// View of the buffered bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Drop all buffered bytes
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Append every byte the transport currently has pending
    ///
    /// Reads until the transport reports an empty read. Returns the number
    /// of bytes appended (zero when the transport is idle).
    ///
    /// # Errors
    ///
    /// Propagates transport read errors; reports
    /// `UartError::Overrun` if the buffer capacity would be exceeded.
    pub fn fill<U: UartInterface>(&mut self, uart: &mut U) -> Result<usize, PlatformError> {
        let mut total = 0;
        let mut chunk = [0u8; 64];
        loop {
            let count = uart.read(&mut chunk)?;
            if count == 0 {
                break;
            }
            self.buf
                .extend_from_slice(&chunk[..count])
                .map_err(|_| PlatformError::Uart(UartError::Overrun))?;
            total += count;
        }
        Ok(total)
    }

    /// Append pending bytes, or yield briefly if there are none
    ///
    /// The yield keeps wait loops from spinning and advances the clock that
    /// their [`Deadline`] is measured against.
    pub fn poll<U: UartInterface, T: TimerInterface>(
        &mut self,
        uart: &mut U,
        timer: &mut T,
    ) -> Result<usize, PlatformError> {
        let count = self.fill(uart)?;
        if count == 0 {
            timer.delay_ms(IDLE_POLL_DELAY_MS)?;
        }
        Ok(count)
    }

    /// Locate `needle` in the buffered bytes
    pub fn find(&self, needle: &[u8]) -> Option<usize> {
        find_subslice(&self.buf, needle)
    }

    /// Remove the first `count` bytes, keeping the rest for later calls
    pub fn consume(&mut self, count: usize) {
        let len = self.buf.len();
        let count = count.min(len);
        self.buf.copy_within(count..len, 0);
        self.buf.truncate(len - count);
    }
}

/// Locate `needle` within `haystack`
///
/// An empty needle matches at position zero - the behavior the modem driver
/// relies on for commands that declare no response terminator.
pub fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    if needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::mock::{MockTimer, MockUart};
    use crate::platform::traits::UartConfig;

    #[test]
    fn test_fill_accumulates_partial_reads() {
        let mut uart = MockUart::new(UartConfig::default());
        let mut rx: RxBuffer<64> = RxBuffer::new();

        uart.inject_rx_data(b"Hel");
        uart.inject_rx_data(b"lo");
        let n = rx.fill(&mut uart).unwrap();
        assert_eq!(n, 5);
        assert_eq!(rx.as_slice(), b"Hello");
    }

    #[test]
    fn test_consume_retains_remainder() {
        let mut uart = MockUart::new(UartConfig::default());
        let mut rx: RxBuffer<64> = RxBuffer::new();

        uart.inject_rx_data(b"abcdef");
        rx.fill(&mut uart).unwrap();
        rx.consume(4);
        assert_eq!(rx.as_slice(), b"ef");
    }

    #[test]
    fn test_poll_advances_time_when_idle() {
        let mut uart = MockUart::new(UartConfig::default());
        let mut timer = MockTimer::new();
        let mut rx: RxBuffer<64> = RxBuffer::new();

        let deadline = Deadline::new(&timer, 3);
        while !deadline.expired(&timer) {
            rx.poll(&mut uart, &mut timer).unwrap();
        }
        assert!(rx.is_empty());
        assert_eq!(timer.now_ms(), 3);
    }

    #[test]
    fn test_zero_budget_deadline_is_expired() {
        let timer = MockTimer::new();
        let deadline = Deadline::new(&timer, 0);
        assert!(deadline.expired(&timer));
    }

    #[test]
    fn test_find_subslice() {
        assert_eq!(find_subslice(b"abcdef", b"cd"), Some(2));
        assert_eq!(find_subslice(b"abcdef", b"xy"), None);
        assert_eq!(find_subslice(b"abcdef", b""), Some(0));
        assert_eq!(find_subslice(b"ab", b"abc"), None);
    }

    #[test]
    fn test_overrun_reported() {
        let mut uart = MockUart::new(UartConfig::default());
        let mut rx: RxBuffer<4> = RxBuffer::new();

        uart.inject_rx_data(b"too many bytes");
        let err = rx.fill(&mut uart).unwrap_err();
        assert_eq!(err, PlatformError::Uart(UartError::Overrun));
    }
}
