//! SIM800L cellular modem driver
//!
//! Implements the AT command/response session: write a formatted command
//! line, accumulate reply bytes in a persistent carry-over buffer, locate
//! the expected start bytes (the echoed command when echo mode is active, a
//! bare delimiter otherwise), then search for the command's terminator and
//! slice the response out as non-empty lines. Bytes after the response stay
//! buffered for the next exchange.
//!
//! Higher-level session state machines live in the sibling files:
//! registration and the GPRS bearer in `bearer`, the HTTP session in
//! `http`, TCP/UDP sockets in `socket`.

mod bearer;
mod http;
mod socket;

pub use bearer::RegistrationStatus;
pub use http::status_text;
pub use socket::SocketProtocol;

use crate::communication::at::{AtCommand, AtFormatError, AtResponse, AtSyntax};
use crate::communication::rx::{find_subslice, Deadline, RxBuffer};
use crate::core::config::UartModuleConfig;
use crate::log_warn;
use crate::platform::{
    traits::{GpioInterface, TimerInterface, UartInterface},
    PlatformError,
};
use core::fmt;
use core::fmt::Write as _;
use heapless::{String, Vec};

/// Receive buffer capacity for the modem stream
///
/// Sized for a full read-data chunk (1460 bytes) plus framing.
pub const MODEM_RX_BUFFER_SIZE: usize = 2048;

/// Line delimiter used by the modem in both directions
pub const LINE_DELIMITER: &[u8] = b"\r\n";

/// Baud rates the module supports (0 selects auto-bauding)
pub const SUPPORTED_BAUD_RATES: [u32; 11] = [
    0, 1_200, 2_400, 4_800, 9_600, 19_200, 38_400, 57_600, 115_200, 230_400, 460_800,
];

/// Default budget for one command/response exchange
pub const DEFAULT_TIMEOUT_MS: u64 = 1_000;
/// Budget for each startup notification during bring-up
const URC_TIMEOUT_MS: u64 = 3_000;
/// Budget for the network registration query
const REGISTRATION_TIMEOUT_MS: u64 = 5_000;

/// Reset line low pulse (datasheet minimum 105 ms)
const RESET_PULSE_MS: u32 = 200;
/// Recovery time after releasing the reset line (datasheet minimum 2.7 s)
const RESET_SETTLE_MS: u32 = 3_000;

/// Startup notifications the module emits after reset, in order
const STARTUP_URCS: [&str; 5] = ["RDY", "+CFUN: 1", "+CPIN: READY", "Call Ready", "SMS Ready"];

/// Capacity for one outgoing request line (command text plus delimiter)
const REQUEST_SIZE: usize = crate::communication::at::command::AT_COMMAND_SIZE + 2;

/// Tri-state lifecycle status of a session surface
///
/// `Unknown` until the first operation observes or changes the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkState {
    /// Not yet observed
    #[default]
    Unknown,
    /// Known closed
    Closed,
    /// Known open
    Open,
}

/// Cross-call modem session status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SessionState {
    /// GPRS bearer (profile 1)
    pub bearer: LinkState,
    /// HTTP session bound to the bearer
    pub http: LinkState,
    /// TCP connection
    pub tcp: LinkState,
    /// UDP connection
    pub udp: LinkState,
}

/// Errors from the modem session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModemError {
    /// Budget elapsed before the response terminator appeared
    Timeout,
    /// The startup notification sequence did not complete
    InitFailed,
    /// Operation requires a session that is not open
    SessionNotOpen,
    /// The peer reported an HTTP-level failure
    Http {
        /// Three-digit status code as reported by the module
        code: u16,
        /// Whether the code is in the module's 6xx network/billing range
        network_related: bool,
    },
    /// The peer closed the connection
    ConnectionClosed,
    /// Socket teardown acknowledgements did not match
    CloseFailed,
    /// A response arrived but violated the expected shape
    ProtocolViolation,
    /// Configured baud rate is not supported by the module
    UnsupportedBaudRate(u32),
    /// Command construction failed
    Format(AtFormatError),
    /// Transport, GPIO or timer failure
    Platform(PlatformError),
}

impl fmt::Display for ModemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModemError::Timeout => write!(f, "response terminator not received in budget"),
            ModemError::InitFailed => write!(f, "module initialization failed"),
            ModemError::SessionNotOpen => write!(f, "required session is not open"),
            ModemError::Http {
                code,
                network_related,
            } => {
                if *network_related {
                    write!(f, "HTTP error {} (network/billing condition)", code)
                } else {
                    write!(f, "HTTP error {}", code)
                }
            }
            ModemError::ConnectionClosed => write!(f, "connection closed by peer"),
            ModemError::CloseFailed => write!(f, "socket teardown acknowledgement mismatch"),
            ModemError::ProtocolViolation => write!(f, "response violated expected shape"),
            ModemError::UnsupportedBaudRate(baud) => {
                write!(f, "unsupported baud rate {}", baud)
            }
            ModemError::Format(e) => write!(f, "{}", e),
            ModemError::Platform(e) => write!(f, "{}", e),
        }
    }
}

impl From<AtFormatError> for ModemError {
    fn from(error: AtFormatError) -> Self {
        ModemError::Format(error)
    }
}

impl From<PlatformError> for ModemError {
    fn from(error: PlatformError) -> Self {
        ModemError::Platform(error)
    }
}

/// Modem session driver
///
/// Generic over the platform UART, timer and the GPIO pin wired to the
/// module's reset line.
pub struct ModemDriver<U: UartInterface, T: TimerInterface, G: GpioInterface> {
    uart: U,
    timer: T,
    reset_pin: G,
    echo_mode: bool,
    rx: RxBuffer<MODEM_RX_BUFFER_SIZE>,
    state: SessionState,
}

impl<U: UartInterface, T: TimerInterface, G: GpioInterface> ModemDriver<U, T, G> {
    /// Create a driver over an already-opened transport
    ///
    /// # Errors
    ///
    /// `UnsupportedBaudRate` if the configured rate is not one the module
    /// supports.
    pub fn new(
        uart: U,
        timer: T,
        reset_pin: G,
        config: &UartModuleConfig,
    ) -> Result<Self, ModemError> {
        if !SUPPORTED_BAUD_RATES.contains(&config.baud_rate) {
            return Err(ModemError::UnsupportedBaudRate(config.baud_rate));
        }
        Ok(Self {
            uart,
            timer,
            reset_pin,
            echo_mode: true,
            rx: RxBuffer::new(),
            state: SessionState::default(),
        })
    }

    /// Mutable access to the transport (tests, raw escapes)
    pub fn uart_mut(&mut self) -> &mut U {
        &mut self.uart
    }

    /// Current session status snapshot
    pub fn session_state(&self) -> SessionState {
        self.state
    }

    pub(crate) fn state_mut(&mut self) -> &mut SessionState {
        &mut self.state
    }

    /// Pulse the hardware reset line and wait out the module's recovery
    ///
    /// All session state is unknown afterwards; run [`init`](Self::init)
    /// before issuing commands.
    pub fn reset(&mut self) -> Result<(), ModemError> {
        self.reset_pin.set_low()?;
        self.timer.delay_ms(RESET_PULSE_MS)?;
        self.reset_pin.set_high()?;
        self.timer.delay_ms(RESET_SETTLE_MS)?;

        self.echo_mode = true;
        self.rx.clear();
        self.state = SessionState::default();
        Ok(())
    }

    /// Send one command and collect its response lines
    ///
    /// Writes the formatted command plus delimiter, then reads into the
    /// persistent carry-over buffer until the command's terminator appears
    /// on a line. Anything before the expected start bytes is reported and
    /// dropped; anything after the response is retained for the next call
    /// (with a warning, since it usually means an unsolicited notification
    /// arrived mid-exchange).
    ///
    /// `suppress_warning` quiets those reports for exchanges that are known
    /// to leave bytes behind, like the send-prompt sub-protocol.
    pub fn send_command(
        &mut self,
        command: &AtCommand,
        timeout_ms: u64,
        suppress_warning: bool,
    ) -> Result<AtResponse, ModemError> {
        // Command text and delimiter leave as one write
        let mut request: Vec<u8, REQUEST_SIZE> = Vec::new();
        request
            .extend_from_slice(command.formatted().as_bytes())
            .ok();
        request.push(b'\n').ok();
        self.uart.write(&request)?;
        self.uart.flush()?;

        // Expected start of the response: the echoed command plus delimiter
        // in echo mode, a bare delimiter otherwise
        let mut start: Vec<u8, REQUEST_SIZE> = Vec::new();
        if self.echo_mode {
            start
                .extend_from_slice(command.formatted().as_bytes())
                .ok();
        }
        start.extend_from_slice(LINE_DELIMITER).ok();

        let terminator = command.terminator().as_bytes();
        let deadline = Deadline::new(&self.timer, timeout_ms);

        while !deadline.expired(&self.timer) {
            self.rx.poll(&mut self.uart, &mut self.timer)?;
            if self.rx.len() < start.len() + terminator.len() {
                continue;
            }

            let Some(start_index) = self.rx.find(&start) else {
                continue;
            };
            if start_index != 0 {
                if !suppress_warning {
                    log_warn!(
                        "modem: ignoring {} unexpected bytes before response start",
                        start_index
                    );
                }
                self.rx.consume(start_index);
            }

            // The response spans from the start bytes to the line delimiter
            // that follows the terminator
            let Some(terminator_index) = self.rx.find(terminator) else {
                continue;
            };
            let tail = &self.rx.as_slice()[terminator_index..];
            let Some(delimiter_offset) = find_subslice(tail, LINE_DELIMITER) else {
                continue;
            };
            let response_end = terminator_index + delimiter_offset + LINE_DELIMITER.len();

            let mut response = AtResponse::new();
            let mut rest = &self.rx.as_slice()[..response_end];
            while !rest.is_empty() {
                let (line, remaining) = match find_subslice(rest, LINE_DELIMITER) {
                    Some(index) => (&rest[..index], &rest[index + LINE_DELIMITER.len()..]),
                    None => (rest, &rest[rest.len()..]),
                };
                rest = remaining;
                if line.is_empty() {
                    continue;
                }
                let text =
                    core::str::from_utf8(line).map_err(|_| ModemError::ProtocolViolation)?;
                if response.push_line(text).is_err() {
                    if !suppress_warning {
                        log_warn!("modem: response line limit reached, dropping remainder");
                    }
                    break;
                }
            }

            self.rx.consume(response_end);
            if !self.rx.is_empty() && !suppress_warning {
                log_warn!(
                    "modem: {} unparsed bytes retained for next exchange",
                    self.rx.len()
                );
            }
            return Ok(response);
        }

        Err(ModemError::Timeout)
    }

    /// Bring the module up after a reset
    ///
    /// Sends a bare `AT` probe so auto-bauding locks on, then awaits the
    /// fixed startup notification sequence (ready, function level, SIM
    /// ready, call ready, SMS ready) - missing any of them is fatal.
    /// Finally disables command echo (unless `echo_mode` is requested) and
    /// enables verbose error reporting.
    pub fn init(&mut self, echo_mode: bool) -> Result<(), ModemError> {
        let probe = AtCommand::bare("AT")?;
        let response = self.send_command(&probe, DEFAULT_TIMEOUT_MS, false)?;
        if response.last() != Some("OK") {
            return Err(ModemError::InitFailed);
        }

        for urc in STARTUP_URCS {
            let wait = AtCommand::with_terminator(AtSyntax::Bare, "", &[], urc)?;
            match self.send_command(&wait, URC_TIMEOUT_MS, true) {
                Ok(_) => {}
                Err(ModemError::Timeout) => return Err(ModemError::InitFailed),
                Err(error) => return Err(error),
            }
        }

        if !echo_mode {
            let disable_echo = AtCommand::new(AtSyntax::Basic, "E", &["0"])?;
            self.send_command(&disable_echo, DEFAULT_TIMEOUT_MS, false)?;
            self.echo_mode = false;
        }

        // Verbose mobile-equipment error reporting
        let verbose_errors = AtCommand::new(AtSyntax::ExtendedWrite, "CMEE", &["2"])?;
        self.send_command(&verbose_errors, DEFAULT_TIMEOUT_MS, false)?;
        Ok(())
    }

    /// Whether a SIM card is inserted (AT+CSMINS?)
    pub fn sim_inserted(&mut self) -> Result<bool, ModemError> {
        let query = AtCommand::new(AtSyntax::ExtendedRead, "CSMINS", &[])?;
        let response = self.send_command(&query, DEFAULT_TIMEOUT_MS, false)?;
        let line = response.first().ok_or(ModemError::ProtocolViolation)?;
        let inserted = line
            .split(',')
            .nth(1)
            .ok_or(ModemError::ProtocolViolation)?;
        Ok(inserted.trim() == "1")
    }

    /// Module hardware identification (ATI)
    pub fn module_info(&mut self) -> Result<String<64>, ModemError> {
        let query = AtCommand::bare("ATI")?;
        let response = self.send_command(&query, DEFAULT_TIMEOUT_MS, false)?;
        let line = response.first().ok_or(ModemError::ProtocolViolation)?;
        let revision = line
            .split_whitespace()
            .nth(1)
            .ok_or(ModemError::ProtocolViolation)?;
        let mut out = String::new();
        out.push_str(revision)
            .map_err(|_| ModemError::ProtocolViolation)?;
        Ok(out)
    }

    /// Name of the network operator the SIM is registered with (AT+COPS?)
    pub fn operator(&mut self) -> Result<String<32>, ModemError> {
        let query = AtCommand::new(AtSyntax::ExtendedRead, "COPS", &[])?;
        let response = self.send_command(&query, DEFAULT_TIMEOUT_MS, false)?;
        let line = response.first().ok_or(ModemError::ProtocolViolation)?;
        let name = line
            .split(',')
            .nth(2)
            .ok_or(ModemError::ProtocolViolation)?
            .trim()
            .trim_matches('"');
        let mut out = String::new();
        out.push_str(name).map_err(|_| ModemError::ProtocolViolation)?;
        Ok(out)
    }

    /// Signal quality (AT+CSQ): RSSI 0-31 (higher is better, 99 unknown)
    /// and bit error rate 0-7 (lower is better, 99 unknown)
    pub fn signal_quality(&mut self) -> Result<(u8, u8), ModemError> {
        let query = AtCommand::new(AtSyntax::ExtendedExecute, "CSQ", &[])?;
        let response = self.send_command(&query, DEFAULT_TIMEOUT_MS, false)?;
        let line = response.first().ok_or(ModemError::ProtocolViolation)?;
        let values = value_after_colon(line)?;
        let mut parts = values.split(',');
        let rssi = parse_field::<u8>(parts.next())?;
        let ber = parse_field::<u8>(parts.next())?;
        Ok((rssi, ber))
    }

    pub(crate) fn send_simple(&mut self, command: &AtCommand) -> Result<AtResponse, ModemError> {
        self.send_command(command, DEFAULT_TIMEOUT_MS, false)
    }

    pub(crate) fn registration_timeout() -> u64 {
        REGISTRATION_TIMEOUT_MS
    }

    pub(crate) fn rx_carry(&self) -> &[u8] {
        self.rx.as_slice()
    }

    pub(crate) fn rx_clear(&mut self) {
        self.rx.clear();
    }

    pub(crate) fn rx_poll(&mut self) -> Result<usize, ModemError> {
        Ok(self.rx.poll(&mut self.uart, &mut self.timer)?)
    }

    pub(crate) fn deadline(&self, budget_ms: u64) -> Deadline {
        Deadline::new(&self.timer, budget_ms)
    }

    pub(crate) fn deadline_expired(&self, deadline: &Deadline) -> bool {
        deadline.expired(&self.timer)
    }
}

/// The text after the first `:` on a line, trimmed
pub(crate) fn value_after_colon(line: &str) -> Result<&str, ModemError> {
    line.split(':')
        .nth(1)
        .map(str::trim)
        .ok_or(ModemError::ProtocolViolation)
}

/// Parse one comma-separated field, rejecting absent or malformed values
pub(crate) fn parse_field<T: core::str::FromStr>(field: Option<&str>) -> Result<T, ModemError> {
    field
        .ok_or(ModemError::ProtocolViolation)?
        .trim()
        .parse()
        .map_err(|_| ModemError::ProtocolViolation)
}

/// Wrap a value in double quotes (modem parameter syntax)
pub(crate) fn quoted(value: &str) -> Result<String<{ REQUEST_SIZE }>, ModemError> {
    let mut out: String<REQUEST_SIZE> = String::new();
    if out.push('"').is_err() || out.push_str(value).is_err() || out.push('"').is_err() {
        return Err(ModemError::Format(AtFormatError::TooLong));
    }
    Ok(out)
}

/// Format an integer as a command argument
pub(crate) fn format_u32(value: u32) -> String<12> {
    let mut out: String<12> = String::new();
    // 12 characters always fit a u32
    write!(out, "{}", value).ok();
    out
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use crate::platform::mock::{MockGpio, MockTimer, MockUart};
    use crate::platform::traits::UartConfig;

    pub(crate) type TestModem = ModemDriver<MockUart, MockTimer, MockGpio>;

    pub(crate) fn test_config() -> UartModuleConfig {
        UartModuleConfig {
            name: "sim800l",
            reset_pin: Some(5),
            baud_rate: 115_200,
            ..Default::default()
        }
    }

    pub(crate) fn modem() -> TestModem {
        let config = test_config();
        ModemDriver::new(
            MockUart::new(UartConfig::default()),
            MockTimer::new(),
            MockGpio::new_output(),
            &config,
        )
        .unwrap()
    }

    /// Queue the full bring-up conversation and run `init(false)`
    pub(crate) fn initialized_modem() -> TestModem {
        let mut modem = modem();
        queue_init_responses(modem.uart_mut());
        modem.init(false).unwrap();
        modem.uart_mut().clear_tx_buffer();
        modem
    }

    pub(crate) fn queue_init_responses(uart: &mut MockUart) {
        // Probe echoes while echo mode is still on
        uart.queue_response(b"AT\r\nOK\r\n");
        uart.queue_response(b"\r\nRDY\r\n");
        uart.queue_response(b"\r\n+CFUN: 1\r\n");
        uart.queue_response(b"\r\n+CPIN: READY\r\n");
        uart.queue_response(b"\r\nCall Ready\r\n");
        uart.queue_response(b"\r\nSMS Ready\r\n");
        uart.queue_response(b"ATE0\r\nOK\r\n");
        uart.queue_response(b"\r\nOK\r\n");
    }
}

#[cfg(test)]
mod tests {
    use super::testutil::*;
    use super::*;
    use crate::platform::mock::{MockGpio, MockTimer, MockUart};
    use crate::platform::traits::UartConfig;

    #[test]
    fn test_unsupported_baud_rate_rejected() {
        let config = UartModuleConfig {
            baud_rate: 14_400,
            ..test_config()
        };
        let result = ModemDriver::new(
            MockUart::new(UartConfig::default()),
            MockTimer::new(),
            MockGpio::new_output(),
            &config,
        );
        match result {
            Err(ModemError::UnsupportedBaudRate(14_400)) => {}
            _ => panic!("expected unsupported baud rate error"),
        }
    }

    #[test]
    fn test_init_sequence() {
        let mut modem = modem();
        queue_init_responses(modem.uart_mut());

        modem.init(false).unwrap();

        // Echo disabled, verbose errors enabled, in order
        let tx = core::str::from_utf8(modem.uart_mut().tx_buffer()).unwrap();
        assert!(tx.starts_with("AT\n"));
        assert!(tx.contains("ATE0\n"));
        assert!(tx.ends_with("AT+CMEE=2\n"));
    }

    #[test]
    fn test_init_fails_when_urc_missing() {
        let mut modem = modem();
        let uart = modem.uart_mut();
        uart.queue_response(b"AT\r\nOK\r\n");
        uart.queue_response(b"\r\nRDY\r\n");
        // +CFUN never arrives

        assert_eq!(modem.init(false), Err(ModemError::InitFailed));
    }

    #[test]
    fn test_send_command_with_echo() {
        let mut modem = modem();
        modem
            .uart_mut()
            .queue_response(b"AT+CSQ\r\n+CSQ: 17,0\r\nOK\r\n");

        let command = AtCommand::new(AtSyntax::ExtendedExecute, "CSQ", &[]).unwrap();
        let response = modem.send_command(&command, 1_000, false).unwrap();

        // Echo mode includes the echoed command as the first line
        assert_eq!(response.len(), 3);
        assert_eq!(response.first(), Some("AT+CSQ"));
        assert_eq!(response.get(1), Some("+CSQ: 17,0"));
        assert_eq!(response.last(), Some("OK"));
    }

    #[test]
    fn test_send_command_terminator_split_across_reads() {
        let mut modem = modem();
        // Terminator OK arrives split as "O" then "K\r\n"
        modem
            .uart_mut()
            .queue_response_chunks(&[b"AT\r\n", b"O", b"K\r\n"]);

        let command = AtCommand::bare("AT").unwrap();
        let response = modem.send_command(&command, 1_000, false).unwrap();
        assert_eq!(response.len(), 2);
        assert_eq!(response.last(), Some("OK"));
    }

    #[test]
    fn test_send_command_times_out_without_terminator() {
        let mut modem = modem();
        modem.uart_mut().queue_response(b"AT\r\nERROR\r\n");

        let command = AtCommand::bare("AT").unwrap();
        assert_eq!(
            modem.send_command(&command, 50, false),
            Err(ModemError::Timeout)
        );
    }

    #[test]
    fn test_send_command_retains_trailing_bytes() {
        let mut modem = modem();
        modem
            .uart_mut()
            .queue_response(b"AT\r\nOK\r\n+CIPRXGET: 1\r\n");

        let command = AtCommand::bare("AT").unwrap();
        modem.send_command(&command, 1_000, false).unwrap();

        // The unsolicited notification stays buffered for the next call
        assert_eq!(modem.rx_carry(), b"+CIPRXGET: 1\r\n");
    }

    #[test]
    fn test_send_command_skips_junk_before_start() {
        let mut modem = initialized_modem();
        modem
            .uart_mut()
            .queue_response(b"noise\r\n+CSQ: 17,0\r\nOK\r\n");

        let command = AtCommand::new(AtSyntax::ExtendedExecute, "CSQ", &[]).unwrap();
        let response = modem.send_command(&command, 1_000, false).unwrap();
        assert_eq!(response.first(), Some("+CSQ: 17,0"));
    }

    #[test]
    fn test_reset_clears_session_state() {
        let mut modem = initialized_modem();
        modem.state_mut().bearer = LinkState::Open;
        modem.state_mut().http = LinkState::Open;

        modem.reset().unwrap();
        assert_eq!(modem.session_state(), SessionState::default());
    }

    #[test]
    fn test_sim_inserted() {
        let mut modem = initialized_modem();
        modem
            .uart_mut()
            .queue_response(b"\r\n+CSMINS: 0,1\r\nOK\r\n");
        assert!(modem.sim_inserted().unwrap());

        modem
            .uart_mut()
            .queue_response(b"\r\n+CSMINS: 0,0\r\nOK\r\n");
        assert!(!modem.sim_inserted().unwrap());
    }

    #[test]
    fn test_module_info() {
        let mut modem = initialized_modem();
        modem
            .uart_mut()
            .queue_response(b"\r\nSIM800 R14.18\r\nOK\r\n");
        assert_eq!(modem.module_info().unwrap().as_str(), "R14.18");
    }

    #[test]
    fn test_operator() {
        let mut modem = initialized_modem();
        modem
            .uart_mut()
            .queue_response(b"\r\n+COPS: 0,0,\"TestNet\"\r\nOK\r\n");
        assert_eq!(modem.operator().unwrap().as_str(), "TestNet");
    }

    #[test]
    fn test_signal_quality() {
        let mut modem = initialized_modem();
        modem.uart_mut().queue_response(b"\r\n+CSQ: 17,0\r\nOK\r\n");
        assert_eq!(modem.signal_quality().unwrap(), (17, 0));
    }
}
