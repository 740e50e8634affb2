//! TCP/UDP socket lifecycle
//!
//! Single-connection mode: one socket at a time, its responses stored
//! module-side for manual retrieval (CIPRXGET). Sending uses a binary
//! sub-protocol - a prompt command with no normal terminator, a `> ` prompt
//! marker, then the raw payload closed by an end-of-data byte. Closing
//! tears down the socket and the CIP-side PDP context, since only
//! single-connection mode is supported.

use super::{format_u32, LinkState, ModemDriver, ModemError};
use crate::communication::at::{command::AT_COMMAND_SIZE, AtCommand, AtSyntax, AT_LINE_SIZE};
use crate::communication::rx::find_subslice;
use crate::platform::traits::{GpioInterface, TimerInterface, UartInterface};
use heapless::String;

/// Budget for establishing a connection
const CONNECT_TIMEOUT_MS: u64 = 3_000;
/// Budget for the payload transmission acknowledgement
const SEND_TIMEOUT_MS: u64 = 3_000;

/// A single read returns at most this many bytes (module limit)
const READ_CHUNK_LIMIT: &str = "1460";

/// Prompt marker the module emits when ready for payload bytes
const SEND_PROMPT: &[u8] = b"> ";
/// End-of-data byte closing a payload (Ctrl+Z)
const END_OF_DATA: char = '\x1a';

/// Notification that received data is stored for retrieval
const DATA_AVAILABLE: &[u8] = b"+CIPRXGET: 1";
/// Notification that the peer closed the connection
const PEER_CLOSED: &[u8] = b"CLOSED";

/// Transport protocol of a socket connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SocketProtocol {
    /// Transmission Control Protocol
    Tcp,
    /// User Datagram Protocol
    Udp,
}

impl SocketProtocol {
    /// Quoted protocol keyword for CIPSTART
    const fn keyword(self) -> &'static str {
        match self {
            SocketProtocol::Tcp => "\"TCP\"",
            SocketProtocol::Udp => "\"UDP\"",
        }
    }
}

impl<U: UartInterface, T: TimerInterface, G: GpioInterface> ModemDriver<U, T, G> {
    fn socket_state_mut(&mut self, protocol: SocketProtocol) -> &mut LinkState {
        match protocol {
            SocketProtocol::Tcp => &mut self.state_mut().tcp,
            SocketProtocol::Udp => &mut self.state_mut().udp,
        }
    }

    /// Open a TCP connection to `remote_address:remote_port`
    pub fn tcp_connect(&mut self, remote_address: &str, remote_port: u16) -> Result<(), ModemError> {
        self.socket_connect(SocketProtocol::Tcp, remote_address, remote_port)
    }

    /// Open a UDP connection to `remote_address:remote_port`
    pub fn udp_connect(&mut self, remote_address: &str, remote_port: u16) -> Result<(), ModemError> {
        self.socket_connect(SocketProtocol::Udp, remote_address, remote_port)
    }

    fn socket_connect(
        &mut self,
        protocol: SocketProtocol,
        remote_address: &str,
        remote_port: u16,
    ) -> Result<(), ModemError> {
        // The bearer must be attached before a socket can open
        if !self.gprs_attached()? {
            return Err(ModemError::SessionNotOpen);
        }

        // Store received data module-side for manual retrieval
        let manual_rx = AtCommand::new(AtSyntax::ExtendedWrite, "CIPRXGET", &["1"])?;
        self.send_simple(&manual_rx)?;

        let port = format_u32(remote_port as u32);
        let start = AtCommand::with_terminator(
            AtSyntax::ExtendedWrite,
            "CIPSTART",
            &[protocol.keyword(), remote_address, port.as_str()],
            "CONNECT OK",
        )?;
        self.send_command(&start, CONNECT_TIMEOUT_MS, false)?;

        *self.socket_state_mut(protocol) = LinkState::Open;
        Ok(())
    }

    /// Query the module's connection state line (CIPSTATUS)
    pub fn connection_status(&mut self) -> Result<String<AT_LINE_SIZE>, ModemError> {
        let status = AtCommand::with_terminator(AtSyntax::ExtendedExecute, "CIPSTATUS", &[], "STATE:")?;
        let response = self.send_simple(&status)?;
        let line = response.get(1).ok_or(ModemError::ProtocolViolation)?;
        let mut out: String<AT_LINE_SIZE> = String::new();
        out.push_str(line).map_err(|_| ModemError::ProtocolViolation)?;
        Ok(out)
    }

    /// Whether the connection is live right now, per a status query
    ///
    /// Queries the module rather than trusting the cached state, and
    /// refreshes the cached state from the answer.
    pub fn connection_active(&mut self, protocol: SocketProtocol) -> Result<bool, ModemError> {
        let active = self.connection_status()?.as_str() == "STATE: CONNECT OK";
        *self.socket_state_mut(protocol) = if active {
            LinkState::Open
        } else {
            LinkState::Closed
        };
        Ok(active)
    }

    /// Send `data` over the open TCP connection
    ///
    /// The connection stays open afterwards; the server (or
    /// [`tcp_close`](Self::tcp_close)) ends it.
    pub fn tcp_send(&mut self, data: &str) -> Result<(), ModemError> {
        self.socket_send(SocketProtocol::Tcp, data)
    }

    /// Send `data` over the open UDP connection
    pub fn udp_send(&mut self, data: &str) -> Result<(), ModemError> {
        self.socket_send(SocketProtocol::Udp, data)
    }

    fn socket_send(&mut self, protocol: SocketProtocol, data: &str) -> Result<(), ModemError> {
        // Live check against the module, not the cached state
        if !self.connection_active(protocol)? {
            return Err(ModemError::SessionNotOpen);
        }

        // The prompt command has no normal terminator: the exchange ends at
        // the first delimiter and the prompt marker stays in the carry-over
        // buffer, where it is verified and cleared
        let prompt = AtCommand::with_terminator(AtSyntax::ExtendedExecute, "CIPSEND", &[], "")?;
        self.send_command(&prompt, super::DEFAULT_TIMEOUT_MS, true)?;
        if self.rx_carry() != SEND_PROMPT {
            return Err(ModemError::ProtocolViolation);
        }
        self.rx_clear();

        // Payload plus end-of-data marker, acknowledged with SEND OK
        let mut payload: String<AT_COMMAND_SIZE> = String::new();
        if payload.push_str(data).is_err() || payload.push(END_OF_DATA).is_err() {
            return Err(ModemError::Format(
                crate::communication::at::AtFormatError::TooLong,
            ));
        }
        let transmit = AtCommand::with_terminator(AtSyntax::Bare, &payload, &[], "SEND OK")?;
        self.send_command(&transmit, SEND_TIMEOUT_MS, false)?;
        Ok(())
    }

    /// Receive one stored data chunk from the TCP connection
    pub fn tcp_receive(&mut self, timeout_ms: u64) -> Result<String<AT_LINE_SIZE>, ModemError> {
        self.socket_receive(SocketProtocol::Tcp, timeout_ms)
    }

    /// Receive one stored data chunk from the UDP connection
    pub fn udp_receive(&mut self, timeout_ms: u64) -> Result<String<AT_LINE_SIZE>, ModemError> {
        self.socket_receive(SocketProtocol::Udp, timeout_ms)
    }

    /// Scan incoming lines for a data-available notification, then read
    ///
    /// A `CLOSED` notification transitions the connection to closed and
    /// fails the call; absence of any notification within the budget is a
    /// timeout.
    fn socket_receive(
        &mut self,
        protocol: SocketProtocol,
        timeout_ms: u64,
    ) -> Result<String<AT_LINE_SIZE>, ModemError> {
        #[derive(Clone, Copy)]
        enum Notification {
            DataAvailable,
            Closed,
        }

        let deadline = self.deadline(timeout_ms);
        while !self.deadline_expired(&deadline) {
            self.rx_poll()?;

            let mut notification = None;
            let mut rest = self.rx_carry();
            while !rest.is_empty() {
                let (line, remaining) = match find_subslice(rest, super::LINE_DELIMITER) {
                    Some(index) => (&rest[..index], &rest[index + 2..]),
                    None => (rest, &rest[rest.len()..]),
                };
                rest = remaining;
                if line.is_empty() {
                    continue;
                }
                if line.starts_with(DATA_AVAILABLE) {
                    notification = Some(Notification::DataAvailable);
                    break;
                }
                if line.starts_with(PEER_CLOSED) {
                    notification = Some(Notification::Closed);
                    break;
                }
            }

            match notification {
                Some(Notification::DataAvailable) => {
                    // The notification is consumed before issuing the read
                    self.rx_clear();
                    let read = AtCommand::new(
                        AtSyntax::ExtendedWrite,
                        "CIPRXGET",
                        &["2", READ_CHUNK_LIMIT],
                    )?;
                    let response = self.send_simple(&read)?;

                    let mut out: String<AT_LINE_SIZE> = String::new();
                    // "+CIPRXGET: 2,<len>,<rest>", the data, then "OK"
                    if response.len() == 3 {
                        let body = response.get(1).ok_or(ModemError::ProtocolViolation)?;
                        out.push_str(body).map_err(|_| ModemError::ProtocolViolation)?;
                    }
                    return Ok(out);
                }
                Some(Notification::Closed) => {
                    *self.socket_state_mut(protocol) = LinkState::Closed;
                    return Err(ModemError::ConnectionClosed);
                }
                None => {}
            }
        }
        Err(ModemError::Timeout)
    }

    /// Close the TCP connection and the CIP-side PDP context
    pub fn tcp_close(&mut self) -> Result<(), ModemError> {
        self.socket_close(SocketProtocol::Tcp)
    }

    /// Close the UDP connection and the CIP-side PDP context
    pub fn udp_close(&mut self) -> Result<(), ModemError> {
        self.socket_close(SocketProtocol::Udp)
    }

    fn socket_close(&mut self, protocol: SocketProtocol) -> Result<(), ModemError> {
        let close = AtCommand::with_terminator(AtSyntax::ExtendedExecute, "CIPCLOSE", &[], "CLOSE OK")?;
        let close_reply = self.send_simple(&close)?;

        // Only single-connection mode is supported, so the PDP context goes
        // down with the socket
        let shutdown = AtCommand::new(AtSyntax::ExtendedExecute, "CIPSHUT", &[])?;
        let shutdown_reply = self.send_simple(&shutdown)?;

        if close_reply.first() == Some("CLOSE OK") && shutdown_reply.first() == Some("SHUT OK") {
            *self.socket_state_mut(protocol) = LinkState::Closed;
            Ok(())
        } else {
            Err(ModemError::CloseFailed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::{initialized_modem, TestModem};
    use super::*;

    fn modem_with_tcp_open() -> TestModem {
        let mut modem = initialized_modem();
        let uart = modem.uart_mut();
        uart.queue_response(b"\r\n+CGATT: 1\r\nOK\r\n");
        uart.queue_response(b"\r\nOK\r\n"); // CIPRXGET=1
        uart.queue_response(b"\r\nOK\r\n\r\nCONNECT OK\r\n");
        modem.tcp_connect("example.com", 7777).unwrap();
        modem.uart_mut().clear_tx_buffer();
        modem
    }

    #[test]
    fn test_tcp_connect() {
        let mut modem = initialized_modem();
        let uart = modem.uart_mut();
        uart.queue_response(b"\r\n+CGATT: 1\r\nOK\r\n");
        uart.queue_response(b"\r\nOK\r\n");
        uart.queue_response(b"\r\nOK\r\n\r\nCONNECT OK\r\n");

        modem.tcp_connect("example.com", 7777).unwrap();
        assert_eq!(modem.session_state().tcp, LinkState::Open);

        let tx = core::str::from_utf8(modem.uart_mut().tx_buffer()).unwrap();
        assert!(tx.contains("AT+CIPRXGET=1\n"));
        assert!(tx.contains("AT+CIPSTART=\"TCP\",example.com,7777\n"));
    }

    #[test]
    fn test_connect_requires_attached_bearer() {
        let mut modem = initialized_modem();
        modem.uart_mut().queue_response(b"\r\n+CGATT: 0\r\nOK\r\n");

        assert_eq!(
            modem.udp_connect("example.com", 9999),
            Err(ModemError::SessionNotOpen)
        );
    }

    #[test]
    fn test_connection_active_refreshes_state() {
        let mut modem = modem_with_tcp_open();
        modem
            .uart_mut()
            .queue_response(b"\r\nOK\r\n\r\nSTATE: CONNECT OK\r\n");
        assert!(modem.connection_active(SocketProtocol::Tcp).unwrap());
        assert_eq!(modem.session_state().tcp, LinkState::Open);

        modem
            .uart_mut()
            .queue_response(b"\r\nOK\r\n\r\nSTATE: TCP CLOSED\r\n");
        assert!(!modem.connection_active(SocketProtocol::Tcp).unwrap());
        assert_eq!(modem.session_state().tcp, LinkState::Closed);
    }

    #[test]
    fn test_tcp_send_prompt_protocol() {
        let mut modem = modem_with_tcp_open();
        let uart = modem.uart_mut();
        uart.queue_response(b"\r\nOK\r\n\r\nSTATE: CONNECT OK\r\n"); // liveness
        uart.queue_response(b"\r\n> "); // prompt
        uart.queue_response(b"\r\nSEND OK\r\n");

        modem.tcp_send("hello").unwrap();

        let tx = modem.uart_mut().tx_buffer();
        let tx_text = core::str::from_utf8(tx).unwrap();
        assert!(tx_text.contains("AT+CIPSEND\n"));
        // Payload closed by the end-of-data byte
        assert!(tx_text.contains("hello\x1a\n"));
    }

    #[test]
    fn test_tcp_send_fails_when_connection_dead() {
        let mut modem = modem_with_tcp_open();
        modem
            .uart_mut()
            .queue_response(b"\r\nOK\r\n\r\nSTATE: TCP CLOSED\r\n");

        assert_eq!(modem.tcp_send("hello"), Err(ModemError::SessionNotOpen));
        assert_eq!(modem.session_state().tcp, LinkState::Closed);
    }

    #[test]
    fn test_tcp_receive_reads_stored_data() {
        let mut modem = modem_with_tcp_open();
        modem.uart_mut().inject_rx_data(b"\r\n+CIPRXGET: 1\r\n");
        modem
            .uart_mut()
            .queue_response(b"\r\n+CIPRXGET: 2,5,0\r\nhello\r\nOK\r\n");

        let data = modem.tcp_receive(1_000).unwrap();
        assert_eq!(data.as_str(), "hello");

        let tx = core::str::from_utf8(modem.uart_mut().tx_buffer()).unwrap();
        assert!(tx.contains("AT+CIPRXGET=2,1460\n"));
    }

    #[test]
    fn test_tcp_receive_closed_notification() {
        let mut modem = modem_with_tcp_open();
        modem.uart_mut().inject_rx_data(b"\r\nCLOSED\r\n");

        assert_eq!(modem.tcp_receive(1_000), Err(ModemError::ConnectionClosed));
        assert_eq!(modem.session_state().tcp, LinkState::Closed);
    }

    #[test]
    fn test_tcp_receive_times_out_quietly() {
        let mut modem = modem_with_tcp_open();
        assert_eq!(modem.tcp_receive(50), Err(ModemError::Timeout));
    }

    #[test]
    fn test_tcp_close_tears_down_socket_and_context() {
        let mut modem = modem_with_tcp_open();
        let uart = modem.uart_mut();
        uart.queue_response(b"\r\nCLOSE OK\r\n");
        uart.queue_response(b"\r\nSHUT OK\r\n");

        modem.tcp_close().unwrap();
        assert_eq!(modem.session_state().tcp, LinkState::Closed);
    }

    #[test]
    fn test_tcp_close_acknowledgement_mismatch() {
        let mut modem = modem_with_tcp_open();
        let uart = modem.uart_mut();
        uart.queue_response(b"\r\nCLOSE OK\r\n");
        uart.queue_response(b"\r\nNOT SHUT OK\r\n");

        assert_eq!(modem.tcp_close(), Err(ModemError::CloseFailed));
        // State unchanged on a failed teardown
        assert_eq!(modem.session_state().tcp, LinkState::Open);
    }
}
