//! u-blox NEO-6M navigation receiver driver
//!
//! Implements the UBX request/response session on top of the frame codec:
//! write an encoded frame, hunt the sync word in the reply stream, split
//! complete frames out of the buffer, and classify them against the
//! outstanding request. Configuration messages (class `0x06`) complete on
//! ACK or NAK; polls complete on a frame matching the request's class/id.
//!
//! The driver also carries the module's session procedures: the baud-rate
//! renegotiation handshake (whose reply arrives at the *new* rate), the
//! reset/restart variants, NMEA output rate control, and the typed NAV
//! polls.

use crate::communication::rx::{Deadline, RxBuffer};
use crate::communication::ubx::frame::{Frame, FrameError, SYNC_WORD};
use crate::communication::ubx::messages::{
    MeasurementRate, NavPosLlh, NavStatus, NavTimeUtc, UartPortConfig, PORT_UART1,
};
use crate::communication::ubx::types::{MessageId, NmeaOutput, ProtocolMask};
use crate::communication::ubx::FieldError;
use crate::core::config::UartModuleConfig;
use crate::log_warn;
use crate::platform::{
    traits::{TimerInterface, UartInterface},
    PlatformError,
};
use core::fmt;
use heapless::Vec;

/// Receive buffer capacity for the UBX stream
pub const GPS_RX_BUFFER_SIZE: usize = 512;

/// Baud rate a factory-fresh module starts at
pub const FACTORY_BAUD_RATE: u32 = 9_600;

/// Budget for one ordinary request/response exchange
pub const EXCHANGE_TIMEOUT_MS: u64 = 1_000;

/// Budget for re-reading the acknowledgement after a baud switch
const PORT_ACK_TIMEOUT_MS: u64 = 1_000;

/// Settle time after a hardware reset before the module responds again
const HW_RESET_SETTLE_MS: u32 = 300;

/// An ACK/NAK frame is always this long on the wire
const ACK_FRAME_LEN: usize = 10;

/// Maximum frames collected in one exchange
pub const MAX_EXCHANGE_FRAMES: usize = 8;

/// How an exchange completed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ExchangeStatus {
    /// Configuration message acknowledged
    Acknowledged,
    /// Configuration message rejected with a NAK
    Rejected,
    /// Non-configuration request answered by a matching frame
    Untyped,
}

/// Result of one request/response exchange
///
/// `frames` holds every frame collected while the exchange was open, in
/// arrival order - poll responses preceding an acknowledgement included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    /// How the exchange completed
    pub status: ExchangeStatus,
    /// All frames received during the exchange
    pub frames: Vec<Frame, MAX_EXCHANGE_FRAMES>,
}

/// How a port reconfiguration completed
///
/// Changing the baud rate makes the reply arrive at the new rate, so the
/// exchange at the old rate is *expected* to starve. That disconnect
/// heuristic is a named outcome here, not an incidentally-caught timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PortSwitch {
    /// The acknowledgement arrived at the current rate
    CompletedAtCurrentRate,
    /// The exchange starved, the transport was reopened at the new rate and
    /// the acknowledgement was read there
    ReplyReadAtNewRate,
}

/// CFG-RST reset type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResetMode {
    /// Full hardware reset; drops back to the factory configuration
    Hardware,
    /// Controlled software reset
    Software,
    /// Software reset of the GPS core only; configuration persists
    SoftwareGpsOnly,
    /// Hardware reset after shutdown
    HardwareAfterShutdown,
    /// Start GPS operation
    GpsStart,
    /// Stop GPS operation
    GpsStop,
}

impl ResetMode {
    const fn raw(self) -> u8 {
        match self {
            ResetMode::Hardware => 0x00,
            ResetMode::Software => 0x01,
            ResetMode::SoftwareGpsOnly => 0x02,
            ResetMode::HardwareAfterShutdown => 0x04,
            ResetMode::GpsStart => 0x08,
            ResetMode::GpsStop => 0x09,
        }
    }

    /// Whether this reset wipes the port configuration
    const fn is_hardware(self) -> bool {
        matches!(self, ResetMode::Hardware | ResetMode::HardwareAfterShutdown)
    }
}

/// CFG-RST restart type (which navigation data to discard)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RestartMode {
    /// Discard all navigation data
    Cold,
    /// Discard ephemeris only
    Warm,
    /// Keep all navigation data
    Hot,
}

impl RestartMode {
    const fn nav_bbr_mask(self) -> u16 {
        match self {
            RestartMode::Cold => 0xFFFF,
            RestartMode::Warm => 0x0001,
            RestartMode::Hot => 0x0000,
        }
    }
}

/// Errors from the navigation receiver session
#[derive(Debug, Clone, PartialEq)]
pub enum GpsError {
    /// Budget elapsed without a completing frame; carries every frame
    /// collected before the deadline for diagnostics
    Timeout(Vec<Frame, MAX_EXCHANGE_FRAMES>),
    /// A received frame failed structural or checksum validation
    Malformed(FrameError),
    /// A response arrived but violated an expected invariant (wrong payload
    /// size, wrong port, mismatched acknowledgement)
    ProtocolViolation,
    /// The receiver rejected a configuration message with a NAK
    Rejected,
    /// Transport or timer failure
    Platform(PlatformError),
}

impl fmt::Display for GpsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpsError::Timeout(frames) => {
                write!(f, "exchange timed out ({} frames collected)", frames.len())
            }
            GpsError::Malformed(e) => write!(f, "{}", e),
            GpsError::ProtocolViolation => write!(f, "response violated protocol invariant"),
            GpsError::Rejected => write!(f, "configuration rejected (NAK)"),
            GpsError::Platform(e) => write!(f, "{}", e),
        }
    }
}

impl From<FrameError> for GpsError {
    fn from(error: FrameError) -> Self {
        GpsError::Malformed(error)
    }
}

impl From<PlatformError> for GpsError {
    fn from(error: PlatformError) -> Self {
        GpsError::Platform(error)
    }
}

impl From<FieldError> for GpsError {
    fn from(_: FieldError) -> Self {
        GpsError::ProtocolViolation
    }
}

/// Navigation receiver session driver
///
/// Generic over the platform UART and timer; owns the receive buffer that
/// carries partially-delivered frames across read polls.
pub struct GpsDriver<U: UartInterface, T: TimerInterface> {
    uart: U,
    timer: T,
    config: UartModuleConfig,
    baud_rate: u32,
    rx: RxBuffer<GPS_RX_BUFFER_SIZE>,
}

impl<U: UartInterface, T: TimerInterface> GpsDriver<U, T> {
    /// Create a driver over an already-opened transport
    pub fn new(uart: U, timer: T, config: &UartModuleConfig) -> Self {
        Self {
            uart,
            timer,
            config: *config,
            baud_rate: config.baud_rate,
            rx: RxBuffer::new(),
        }
    }

    /// Mutable access to the transport (vendor-specific raw writes, tests)
    pub fn uart_mut(&mut self) -> &mut U {
        &mut self.uart
    }

    /// The baud rate the driver currently runs the transport at
    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    /// Bring the module to the configured baud rate
    ///
    /// A factory-fresh module listens at [`FACTORY_BAUD_RATE`]; a module
    /// configured on an earlier boot already runs the configured rate and
    /// lets the first attempt starve. The fallback retries there.
    pub fn init(&mut self) -> Result<(), GpsError> {
        self.set_baud_rate(FACTORY_BAUD_RATE)?;
        match self.configure_port(Some(self.config.baud_rate), None, None, None) {
            Ok(_) => Ok(()),
            Err(GpsError::Timeout(_)) => {
                self.set_baud_rate(self.config.baud_rate)?;
                self.configure_port(Some(self.config.baud_rate), None, None, None)
                    .map(|_| ())
            }
            Err(error) => Err(error),
        }
    }

    fn set_baud_rate(&mut self, baud: u32) -> Result<(), GpsError> {
        self.uart.set_baud_rate(baud)?;
        self.baud_rate = baud;
        Ok(())
    }

    /// Send one frame and run the exchange to completion
    ///
    /// Any bytes a prior exchange left unread are reported and flushed
    /// first. Frames are split out of the stream as they complete; junk
    /// preceding a sync word is reported and dropped.
    ///
    /// # Errors
    ///
    /// `Timeout` (carrying the frames collected so far) when no completing
    /// frame arrives in the budget; `Malformed` for a frame that fails
    /// validation; `ProtocolViolation` for an unexpected response class.
    pub fn send_message(&mut self, frame: &Frame, timeout_ms: u64) -> Result<Exchange, GpsError> {
        self.rx.fill(&mut self.uart)?;
        if !self.rx.is_empty() {
            log_warn!(
                "gps: rx buffer was not empty, flushing {} stale bytes",
                self.rx.len()
            );
            self.rx.clear();
        }

        let encoded = frame.encode();
        self.uart.write(&encoded)?;
        self.uart.flush()?;

        let request = frame.message_id();
        let mut frames: Vec<Frame, MAX_EXCHANGE_FRAMES> = Vec::new();
        let deadline = Deadline::new(&self.timer, timeout_ms);

        while !deadline.expired(&self.timer) {
            self.rx.poll(&mut self.uart, &mut self.timer)?;
            if self.rx.len() < SYNC_WORD.len() {
                continue;
            }

            let Some(header_index) = self.rx.find(&SYNC_WORD) else {
                continue;
            };
            if header_index != 0 {
                log_warn!(
                    "gps: ignoring {} unexpected bytes before frame header",
                    header_index
                );
                self.rx.consume(header_index);
            }

            // Class, id and length fields must be present before the frame
            // size is known
            if self.rx.len() < 6 {
                continue;
            }
            let buffered = self.rx.as_slice();
            let payload_len = u16::from_le_bytes([buffered[4], buffered[5]]) as usize;
            if payload_len > crate::communication::ubx::MAX_PAYLOAD {
                return Err(GpsError::Malformed(FrameError::PayloadTooLarge));
            }
            let frame_len = Frame::encoded_len(payload_len);
            if self.rx.len() < frame_len {
                continue;
            }

            let received = Frame::decode(&self.rx.as_slice()[..frame_len])?;
            self.rx.consume(frame_len);
            let response = received.message_id();
            frames
                .push(received)
                .map_err(|_| GpsError::ProtocolViolation)?;

            if request.is_configuration() {
                if response == MessageId::ACK_ACK {
                    return Ok(Exchange {
                        status: ExchangeStatus::Acknowledged,
                        frames,
                    });
                }
                if response == MessageId::ACK_NAK {
                    return Ok(Exchange {
                        status: ExchangeStatus::Rejected,
                        frames,
                    });
                }
                if response == request {
                    // Poll response; the acknowledgement is still outstanding
                    continue;
                }
                return Err(GpsError::ProtocolViolation);
            } else if response == request {
                return Ok(Exchange {
                    status: ExchangeStatus::Untyped,
                    frames,
                });
            }
            // Unrelated frame (periodic output); recorded and skipped
        }

        Err(GpsError::Timeout(frames))
    }

    /// Poll the primary port's configuration
    pub fn poll_port_config(&mut self) -> Result<UartPortConfig, GpsError> {
        let frame = Frame::new(MessageId::CFG_PRT, &[PORT_UART1])?;
        let exchange = self.send_message(&frame, EXCHANGE_TIMEOUT_MS)?;
        if exchange.status != ExchangeStatus::Acknowledged {
            return Err(GpsError::Rejected);
        }

        let response = exchange
            .frames
            .iter()
            .find(|frame| frame.message_id() == MessageId::CFG_PRT)
            .ok_or(GpsError::ProtocolViolation)?;
        let config = UartPortConfig::decode(response.payload())?;
        if config.port_id != PORT_UART1 || config.tx_ready != 0 {
            return Err(GpsError::ProtocolViolation);
        }
        Ok(config)
    }

    /// Reconfigure the primary port, renegotiating the baud rate if needed
    ///
    /// Settings left as `None` keep their polled values. When the baud rate
    /// changes, the acknowledgement arrives at the requested rate: the
    /// exchange at the current rate is given no budget, its starvation
    /// selects the [`PortSwitch::ReplyReadAtNewRate`] path, and the fixed
    /// 10-byte acknowledgement is re-read after reopening the transport.
    /// The new configuration is polled back and verified either way.
    pub fn configure_port(
        &mut self,
        baud_rate: Option<u32>,
        mode: Option<u32>,
        in_proto: Option<ProtocolMask>,
        out_proto: Option<ProtocolMask>,
    ) -> Result<PortSwitch, GpsError> {
        let current = self.poll_port_config()?;
        let requested = UartPortConfig {
            port_id: PORT_UART1,
            tx_ready: 0,
            mode: mode.unwrap_or(current.mode),
            baud_rate: baud_rate.unwrap_or(current.baud_rate),
            in_proto: in_proto.unwrap_or(current.in_proto),
            out_proto: out_proto.unwrap_or(current.out_proto),
        };

        let payload = requested.encode_payload()?;
        let frame = Frame::new(MessageId::CFG_PRT, &payload)?;

        let outcome = match self.send_message(&frame, 0) {
            Ok(exchange) => match exchange.status {
                ExchangeStatus::Acknowledged => PortSwitch::CompletedAtCurrentRate,
                ExchangeStatus::Rejected => return Err(GpsError::Rejected),
                ExchangeStatus::Untyped => return Err(GpsError::ProtocolViolation),
            },
            Err(GpsError::Timeout(_)) => {
                self.set_baud_rate(requested.baud_rate)?;
                self.read_port_ack(PORT_ACK_TIMEOUT_MS)?;
                PortSwitch::ReplyReadAtNewRate
            }
            Err(error) => return Err(error),
        };

        let polled = self.poll_port_config()?;
        if polled.mode != requested.mode
            || polled.baud_rate != requested.baud_rate
            || polled.in_proto != requested.in_proto
            || polled.out_proto != requested.out_proto
        {
            return Err(GpsError::ProtocolViolation);
        }
        Ok(outcome)
    }

    /// Read the fixed-size acknowledgement after a baud switch
    fn read_port_ack(&mut self, timeout_ms: u64) -> Result<(), GpsError> {
        let deadline = Deadline::new(&self.timer, timeout_ms);
        while !deadline.expired(&self.timer) {
            self.rx.poll(&mut self.uart, &mut self.timer)?;
            if self.rx.len() < ACK_FRAME_LEN {
                continue;
            }

            let Some(header_index) = self.rx.find(&SYNC_WORD) else {
                continue;
            };
            if header_index != 0 {
                log_warn!(
                    "gps: ignoring {} unexpected bytes before frame header",
                    header_index
                );
                self.rx.consume(header_index);
                if self.rx.len() < ACK_FRAME_LEN {
                    continue;
                }
            }

            let frame = Frame::decode(&self.rx.as_slice()[..ACK_FRAME_LEN])?;
            self.rx.consume(ACK_FRAME_LEN);
            if !self.rx.is_empty() {
                log_warn!(
                    "gps: ignoring {} bytes after port acknowledgement",
                    self.rx.len()
                );
                self.rx.clear();
            }

            // Must be an ACK naming the port-configuration message
            if frame.message_id() != MessageId::ACK_ACK
                || frame.payload() != [MessageId::CFG_PRT.class, MessageId::CFG_PRT.id]
            {
                return Err(GpsError::ProtocolViolation);
            }
            return Ok(());
        }
        Err(GpsError::Timeout(Vec::new()))
    }

    /// Issue a CFG-RST and restore the configured port afterwards
    ///
    /// Hardware resets wipe the port configuration: the driver falls back to
    /// the factory baud rate, waits out the module's recovery, then restores
    /// the configured rate.
    pub fn reset_and_restart(
        &mut self,
        reset: ResetMode,
        restart: RestartMode,
    ) -> Result<(), GpsError> {
        let mask = restart.nav_bbr_mask().to_le_bytes();
        let payload = [mask[0], mask[1], reset.raw(), 0x00];
        let frame = Frame::new(MessageId::CFG_RST, &payload)?;

        let exchange = self.send_message(&frame, EXCHANGE_TIMEOUT_MS)?;
        if exchange.status != ExchangeStatus::Acknowledged {
            return Err(GpsError::Rejected);
        }

        if reset.is_hardware() {
            self.set_baud_rate(FACTORY_BAUD_RATE)?;
            self.timer.delay_ms(HW_RESET_SETTLE_MS)?;
        }

        self.configure_port(Some(self.config.baud_rate), None, None, None)?;
        Ok(())
    }

    /// GPS-only software reset, cold restart (configuration persists)
    pub fn reset_software_cold(&mut self) -> Result<(), GpsError> {
        self.reset_and_restart(ResetMode::SoftwareGpsOnly, RestartMode::Cold)
    }

    /// GPS-only software reset, warm restart (configuration persists)
    pub fn reset_software_warm(&mut self) -> Result<(), GpsError> {
        self.reset_and_restart(ResetMode::SoftwareGpsOnly, RestartMode::Warm)
    }

    /// GPS-only software reset, hot restart (configuration persists)
    pub fn reset_software_hot(&mut self) -> Result<(), GpsError> {
        self.reset_and_restart(ResetMode::SoftwareGpsOnly, RestartMode::Hot)
    }

    /// Set the output rate of one NMEA sentence on the primary port
    ///
    /// Rate 0 disables the sentence, 1 emits it every navigation solution.
    pub fn set_nmea_rate(&mut self, sentence: NmeaOutput, rate: u8) -> Result<(), GpsError> {
        let frame = Frame::new(
            MessageId::CFG_MSG,
            &[NmeaOutput::CLASS, sentence.id(), rate],
        )?;
        let exchange = self.send_message(&frame, EXCHANGE_TIMEOUT_MS)?;
        match exchange.status {
            ExchangeStatus::Acknowledged => Ok(()),
            _ => Err(GpsError::Rejected),
        }
    }

    /// Disable the six sentences a factory-fresh module emits periodically
    ///
    /// Keeps the periodic NMEA chatter from interleaving with UBX
    /// exchanges when only polled operation is wanted.
    pub fn disable_default_nmea(&mut self) -> Result<(), GpsError> {
        for sentence in NmeaOutput::DEFAULT_ENABLED {
            self.set_nmea_rate(sentence, 0)?;
        }
        Ok(())
    }

    /// Poll the navigation/measurement rate
    pub fn poll_measurement_rate(&mut self) -> Result<MeasurementRate, GpsError> {
        let frame = Frame::new(MessageId::CFG_RATE, &[])?;
        let exchange = self.send_message(&frame, EXCHANGE_TIMEOUT_MS)?;
        if exchange.status != ExchangeStatus::Acknowledged {
            return Err(GpsError::Rejected);
        }
        let response = exchange
            .frames
            .iter()
            .find(|frame| frame.message_id() == MessageId::CFG_RATE)
            .ok_or(GpsError::ProtocolViolation)?;
        Ok(MeasurementRate::decode(response.payload())?)
    }

    /// Set the navigation/measurement rate
    ///
    /// A shorter measurement interval lets the module answer consecutive
    /// NAV polls promptly, at the cost of power.
    pub fn set_measurement_rate(&mut self, rate: MeasurementRate) -> Result<(), GpsError> {
        let payload = rate.encode_payload()?;
        let frame = Frame::new(MessageId::CFG_RATE, &payload)?;
        let exchange = self.send_message(&frame, EXCHANGE_TIMEOUT_MS)?;
        match exchange.status {
            ExchangeStatus::Acknowledged => Ok(()),
            _ => Err(GpsError::Rejected),
        }
    }

    /// Poll the geodetic position solution
    pub fn poll_position(&mut self) -> Result<NavPosLlh, GpsError> {
        let response = self.poll_nav(MessageId::NAV_POSLLH)?;
        Ok(NavPosLlh::decode(response.payload())?)
    }

    /// Poll the receiver status (fix type, time to first fix, uptime)
    pub fn poll_status(&mut self) -> Result<NavStatus, GpsError> {
        let response = self.poll_nav(MessageId::NAV_STATUS)?;
        Ok(NavStatus::decode(response.payload())?)
    }

    /// Poll the UTC time solution
    pub fn poll_time(&mut self) -> Result<NavTimeUtc, GpsError> {
        let response = self.poll_nav(MessageId::NAV_TIMEUTC)?;
        Ok(NavTimeUtc::decode(response.payload())?)
    }

    /// Send a zero-payload poll and return the matching response frame
    fn poll_nav(&mut self, message: MessageId) -> Result<Frame, GpsError> {
        let frame = Frame::new(message, &[])?;
        let exchange = self.send_message(&frame, EXCHANGE_TIMEOUT_MS)?;
        if exchange.status != ExchangeStatus::Untyped {
            return Err(GpsError::ProtocolViolation);
        }
        // The completing frame is always the last one collected
        exchange
            .frames
            .last()
            .cloned()
            .ok_or(GpsError::ProtocolViolation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::communication::ubx::fields::{pack_fields, FieldValue};
    use crate::communication::ubx::messages::{GpsFixType, DEFAULT_UART_MODE};
    use crate::platform::mock::{MockTimer, MockUart};
    use crate::platform::traits::UartConfig;

    fn test_config() -> UartModuleConfig {
        UartModuleConfig {
            name: "gps",
            baud_rate: 115_200,
            ..Default::default()
        }
    }

    fn driver() -> GpsDriver<MockUart, MockTimer> {
        let config = test_config();
        GpsDriver::new(
            MockUart::new(UartConfig::default()),
            MockTimer::new(),
            &config,
        )
    }

    fn ack_for(message: MessageId) -> heapless::Vec<u8, { crate::communication::ubx::MAX_FRAME }> {
        Frame::new(MessageId::ACK_ACK, &[message.class, message.id])
            .unwrap()
            .encode()
    }

    fn nak_for(message: MessageId) -> heapless::Vec<u8, { crate::communication::ubx::MAX_FRAME }> {
        Frame::new(MessageId::ACK_NAK, &[message.class, message.id])
            .unwrap()
            .encode()
    }

    fn nav_posllh_payload() -> heapless::Vec<u8, { crate::communication::ubx::MAX_PAYLOAD }> {
        pack_fields(&[
            FieldValue::U4(123_000),
            FieldValue::I4(115_166_667),
            FieldValue::I4(481_173_000),
            FieldValue::I4(545_400),
            FieldValue::I4(498_500),
            FieldValue::U4(2_500),
            FieldValue::U4(3_100),
        ])
        .unwrap()
    }

    fn port_config_frame(baud_rate: u32) -> Frame {
        let config = UartPortConfig {
            port_id: PORT_UART1,
            tx_ready: 0,
            mode: DEFAULT_UART_MODE,
            baud_rate,
            in_proto: ProtocolMask::UBX | ProtocolMask::NMEA | ProtocolMask::RTCM,
            out_proto: ProtocolMask::UBX | ProtocolMask::NMEA | ProtocolMask::RTCM,
        };
        Frame::new(MessageId::CFG_PRT, &config.encode_payload().unwrap()).unwrap()
    }

    #[test]
    fn test_config_message_acknowledged() {
        let mut gps = driver();
        gps.uart_mut().queue_response(&ack_for(MessageId::CFG_MSG));

        gps.set_nmea_rate(NmeaOutput::Gga, 1).unwrap();

        // Known-good encoding of CFG-MSG enabling GGA at rate 1
        assert_eq!(
            gps.uart_mut().tx_buffer(),
            &[0xB5, 0x62, 0x06, 0x01, 0x03, 0x00, 0xF0, 0x00, 0x01, 0xFB, 0x11]
        );
    }

    #[test]
    fn test_config_message_rejected_with_nak() {
        let mut gps = driver();
        gps.uart_mut().queue_response(&nak_for(MessageId::CFG_MSG));

        let frame = Frame::new(MessageId::CFG_MSG, &[0xF0, 0x00, 0x01]).unwrap();
        let exchange = gps.send_message(&frame, EXCHANGE_TIMEOUT_MS).unwrap();

        // Failure, not success - and the NAK frame is in the returned list
        assert_eq!(exchange.status, ExchangeStatus::Rejected);
        assert_eq!(exchange.frames.len(), 1);
        assert_eq!(exchange.frames[0].message_id(), MessageId::ACK_NAK);
    }

    #[test]
    fn test_poll_position() {
        let mut gps = driver();
        let response = Frame::new(MessageId::NAV_POSLLH, &nav_posllh_payload()).unwrap();
        gps.uart_mut().queue_response(&response.encode());

        let position = gps.poll_position().unwrap();
        assert_eq!(position.lat_1e7, 481_173_000);
        assert!((position.latitude_deg() - 48.1173).abs() < 1e-9);
    }

    #[test]
    fn test_poll_position_chunked_delivery_matches_single_read() {
        let response = Frame::new(MessageId::NAV_POSLLH, &nav_posllh_payload()).unwrap();
        let encoded = response.encode();

        let mut all_at_once = driver();
        all_at_once.uart_mut().queue_response(&encoded);
        let expected = all_at_once.poll_position().unwrap();

        // Same frame delivered one byte per read
        let mut byte_at_a_time = driver();
        let single_bytes: heapless::Vec<&[u8], 64> =
            encoded.chunks(1).collect();
        byte_at_a_time
            .uart_mut()
            .queue_response_chunks(&single_bytes);
        let chunked = byte_at_a_time.poll_position().unwrap();

        assert_eq!(expected, chunked);
    }

    #[test]
    fn test_poll_wrong_payload_size_is_protocol_violation() {
        let mut gps = driver();
        // 27-byte payload where NAV-POSLLH requires 28
        let response = Frame::new(MessageId::NAV_POSLLH, &nav_posllh_payload()[..27]).unwrap();
        gps.uart_mut().queue_response(&response.encode());

        assert_eq!(gps.poll_position(), Err(GpsError::ProtocolViolation));
    }

    #[test]
    fn test_junk_before_header_is_skipped() {
        let mut gps = driver();
        let mut noisy: heapless::Vec<u8, 64> = heapless::Vec::new();
        noisy.extend_from_slice(b"$GPGGA,").unwrap();
        noisy
            .extend_from_slice(&ack_for(MessageId::CFG_MSG))
            .unwrap();
        gps.uart_mut().queue_response(&noisy);

        gps.set_nmea_rate(NmeaOutput::Gsv, 0).unwrap();
    }

    #[test]
    fn test_timeout_returns_collected_frames() {
        let mut gps = driver();
        // Response of the wrong class/id never completes the poll
        let unrelated = Frame::new(MessageId::NAV_STATUS, &[0u8; 16]).unwrap();
        gps.uart_mut().queue_response(&unrelated.encode());

        let frame = Frame::new(MessageId::NAV_POSLLH, &[]).unwrap();
        match gps.send_message(&frame, 50) {
            Err(GpsError::Timeout(frames)) => {
                assert_eq!(frames.len(), 1);
                assert_eq!(frames[0].message_id(), MessageId::NAV_STATUS);
            }
            other => panic!("expected timeout with frames, got {:?}", other),
        }
    }

    #[test]
    fn test_corrupted_frame_is_malformed() {
        let mut gps = driver();
        let mut corrupted = ack_for(MessageId::CFG_MSG);
        let payload_index = 6;
        corrupted[payload_index] ^= 0x01;
        gps.uart_mut().queue_response(&corrupted);

        let frame = Frame::new(MessageId::CFG_MSG, &[0xF0, 0x00, 0x01]).unwrap();
        assert!(matches!(
            gps.send_message(&frame, EXCHANGE_TIMEOUT_MS),
            Err(GpsError::Malformed(FrameError::ChecksumMismatch { .. }))
        ));
    }

    #[test]
    fn test_stale_bytes_flushed_before_send() {
        let mut gps = driver();
        // Unread periodic output from before this exchange
        gps.uart_mut().inject_rx_data(b"$GPGSV,3,1,11*4F\r\n");
        gps.uart_mut().queue_response(&ack_for(MessageId::CFG_MSG));

        gps.set_nmea_rate(NmeaOutput::Vtg, 0).unwrap();
    }

    #[test]
    fn test_configure_port_baud_handshake() {
        let mut gps = driver();

        // Poll at the old rate: CFG-PRT response then its acknowledgement
        let mut poll_reply: heapless::Vec<u8, 64> = heapless::Vec::new();
        poll_reply
            .extend_from_slice(&port_config_frame(9_600).encode())
            .unwrap();
        poll_reply
            .extend_from_slice(&ack_for(MessageId::CFG_PRT))
            .unwrap();
        gps.uart_mut().queue_response(&poll_reply);

        // The write's acknowledgement, read after the transport reopens at
        // the new rate
        gps.uart_mut().queue_response(&ack_for(MessageId::CFG_PRT));

        // Verification poll reports the new rate
        let mut verify_reply: heapless::Vec<u8, 64> = heapless::Vec::new();
        verify_reply
            .extend_from_slice(&port_config_frame(115_200).encode())
            .unwrap();
        verify_reply
            .extend_from_slice(&ack_for(MessageId::CFG_PRT))
            .unwrap();
        gps.uart_mut().queue_response(&verify_reply);

        let outcome = gps
            .configure_port(Some(115_200), None, None, None)
            .unwrap();
        assert_eq!(outcome, PortSwitch::ReplyReadAtNewRate);
        assert_eq!(gps.baud_rate(), 115_200);
        assert_eq!(gps.uart_mut().baud_rate(), 115_200);
    }

    #[test]
    fn test_reset_and_restart_software_cold() {
        let mut gps = driver();

        // CFG-RST acknowledgement
        gps.uart_mut().queue_response(&ack_for(MessageId::CFG_RST));
        // configure_port: poll, write acknowledgement at "new" rate, verify
        let mut poll_reply: heapless::Vec<u8, 64> = heapless::Vec::new();
        poll_reply
            .extend_from_slice(&port_config_frame(115_200).encode())
            .unwrap();
        poll_reply
            .extend_from_slice(&ack_for(MessageId::CFG_PRT))
            .unwrap();
        gps.uart_mut().queue_response(&poll_reply);
        gps.uart_mut().queue_response(&ack_for(MessageId::CFG_PRT));
        gps.uart_mut().queue_response(&poll_reply);

        gps.reset_software_cold().unwrap();

        // CFG-RST for a cold GPS-only software restart
        assert_eq!(
            &gps.uart_mut().tx_buffer()[..12],
            &[0xB5, 0x62, 0x06, 0x04, 0x04, 0x00, 0xFF, 0xFF, 0x02, 0x00, 0x0E, 0x61]
        );
    }

    #[test]
    fn test_poll_status_fix_type() {
        let mut gps = driver();
        let payload = pack_fields(&[
            FieldValue::U4(1_000),
            FieldValue::U1(0x03),
            FieldValue::X1(0x0D),
            FieldValue::X1(0x00),
            FieldValue::X1(0x00),
            FieldValue::U4(28_000),
            FieldValue::U4(64_000),
        ])
        .unwrap();
        let response = Frame::new(MessageId::NAV_STATUS, &payload).unwrap();
        gps.uart_mut().queue_response(&response.encode());

        let status = gps.poll_status().unwrap();
        assert_eq!(status.fix_type, GpsFixType::Fix3D);
        assert_eq!(status.ttff_ms, 28_000);
    }
}
