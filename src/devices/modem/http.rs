//! HTTP session lifecycle and requests
//!
//! The module's HTTP stack binds to bearer profile 1. A session is opened
//! once and reused across requests; GET and POST set the URL (POST also the
//! content type and body), trigger the action, classify the three-digit
//! status code the module reports, and read the response body back.

use super::{format_u32, quoted, value_after_colon, LinkState, ModemDriver, ModemError};
use crate::communication::at::{AtCommand, AtSyntax, AT_LINE_SIZE};
use crate::log_warn;
use crate::platform::traits::{GpioInterface, TimerInterface, UartInterface};
use heapless::String;

/// Budget for HTTPACTION: the network round trip happens inside it
const HTTP_ACTION_TIMEOUT_MS: u64 = 30_000;

/// Milliseconds the module is given to accept POST body bytes
const HTTP_DATA_WINDOW_MS: u32 = 1_000;

/// GET action code for HTTPACTION
const ACTION_GET: &str = "0";
/// POST action code for HTTPACTION
const ACTION_POST: &str = "1";

impl<U: UartInterface, T: TimerInterface, G: GpioInterface> ModemDriver<U, T, G> {
    /// Open and configure the HTTP session on bearer profile 1
    ///
    /// Optionally enables automatic redirect following and TLS, and sets the
    /// module-side request timeout. A no-op with a warning when the session
    /// is already open.
    pub fn http_open(
        &mut self,
        enable_redirects: bool,
        enable_tls: bool,
        request_timeout_sec: u32,
    ) -> Result<(), ModemError> {
        if self.session_state().http == LinkState::Open {
            log_warn!("modem: HTTP session is already open");
            return Ok(());
        }

        let init = AtCommand::new(AtSyntax::ExtendedExecute, "HTTPINIT", &[])?;
        self.send_simple(&init)?;

        // Bind the session to bearer profile 1
        let bind = AtCommand::new(AtSyntax::ExtendedWrite, "HTTPPARA", &["\"CID\"", "1"])?;
        self.send_simple(&bind)?;

        if enable_redirects {
            let redir = AtCommand::new(AtSyntax::ExtendedWrite, "HTTPPARA", &["\"REDIR\"", "1"])?;
            self.send_simple(&redir)?;
        }
        if enable_tls {
            let tls = AtCommand::new(AtSyntax::ExtendedWrite, "HTTPSSL", &["1"])?;
            self.send_simple(&tls)?;
        }

        let timeout_value = format_u32(request_timeout_sec);
        let timeout = AtCommand::new(
            AtSyntax::ExtendedWrite,
            "HTTPPARA",
            &["\"TIMEOUT\"", timeout_value.as_str()],
        )?;
        self.send_simple(&timeout)?;

        self.state_mut().http = LinkState::Open;
        Ok(())
    }

    /// Terminate the HTTP session
    ///
    /// A no-op with a warning when the session is not known open.
    pub fn http_close(&mut self) -> Result<(), ModemError> {
        if self.session_state().http != LinkState::Open {
            log_warn!("modem: HTTP session is already closed");
            return Ok(());
        }

        let term = AtCommand::new(AtSyntax::ExtendedExecute, "HTTPTERM", &[])?;
        self.send_simple(&term)?;
        self.state_mut().http = LinkState::Closed;
        Ok(())
    }

    /// Perform a GET request; returns the status code and response body
    ///
    /// # Errors
    ///
    /// `SessionNotOpen` without an open HTTP session; `Http` for a 4xx/5xx
    /// status, or a 6xx module code flagged as a network/billing condition
    /// (an expired data plan reports this way) - in both cases before any
    /// body read is attempted.
    pub fn http_get(&mut self, url: &str) -> Result<(u16, String<AT_LINE_SIZE>), ModemError> {
        if self.session_state().http != LinkState::Open {
            return Err(ModemError::SessionNotOpen);
        }

        self.http_set_url(url)?;
        let code = self.http_action(ACTION_GET)?;
        let body = self.http_read()?;
        Ok((code, body))
    }

    /// Perform a POST request; returns the status code and response body
    ///
    /// Streams `body` to the module after announcing its length, then
    /// triggers the action. Same status classification as
    /// [`http_get`](Self::http_get).
    pub fn http_post(
        &mut self,
        url: &str,
        body: &str,
        content_type: &str,
    ) -> Result<(u16, String<AT_LINE_SIZE>), ModemError> {
        if self.session_state().http != LinkState::Open {
            return Err(ModemError::SessionNotOpen);
        }

        self.http_set_url(url)?;

        let content_quoted = quoted(content_type)?;
        let content = AtCommand::new(
            AtSyntax::ExtendedWrite,
            "HTTPPARA",
            &["\"CONTENT\"", content_quoted.as_str()],
        )?;
        self.send_simple(&content)?;

        // Announce the body size; the module answers with a DOWNLOAD prompt
        // and accepts raw bytes for the next window
        let length = format_u32(body.len() as u32);
        let window = format_u32(HTTP_DATA_WINDOW_MS);
        let announce = AtCommand::with_terminator(
            AtSyntax::ExtendedWrite,
            "HTTPDATA",
            &[length.as_str(), window.as_str()],
            "DOWNLOAD",
        )?;
        self.send_simple(&announce)?;

        // The body itself goes out as a bare line
        let payload = AtCommand::bare(body)?;
        self.send_simple(&payload)?;

        let code = self.http_action(ACTION_POST)?;
        let response_body = self.http_read()?;
        Ok((code, response_body))
    }

    /// Set the request URL parameter
    fn http_set_url(&mut self, url: &str) -> Result<(), ModemError> {
        let url_quoted = quoted(url)?;
        let set_url = AtCommand::new(
            AtSyntax::ExtendedWrite,
            "HTTPPARA",
            &["\"URL\"", url_quoted.as_str()],
        )?;
        self.send_simple(&set_url)?;
        Ok(())
    }

    /// Trigger HTTPACTION and classify the reported status code
    fn http_action(&mut self, action: &str) -> Result<u16, ModemError> {
        let trigger = AtCommand::with_terminator(
            AtSyntax::ExtendedWrite,
            "HTTPACTION",
            &[action],
            "+HTTPACTION",
        )?;
        let response = self.send_command(&trigger, HTTP_ACTION_TIMEOUT_MS, false)?;

        // "+HTTPACTION: <method>,<code>,<length>" on the final line
        let line = response.last().ok_or(ModemError::ProtocolViolation)?;
        let values = value_after_colon(line)?;
        let code_text = values
            .split(',')
            .nth(1)
            .ok_or(ModemError::ProtocolViolation)?
            .trim();
        let code: u16 = code_text.parse().map_err(|_| ModemError::ProtocolViolation)?;

        match code / 100 {
            4 | 5 => Err(ModemError::Http {
                code,
                network_related: false,
            }),
            // The module's own 6xx range: network failures, DNS errors,
            // stack exhaustion - commonly an expired SIM data plan
            6 => Err(ModemError::Http {
                code,
                network_related: true,
            }),
            _ => Ok(code),
        }
    }

    /// Read the response body after a successful action
    fn http_read(&mut self) -> Result<String<AT_LINE_SIZE>, ModemError> {
        let read = AtCommand::new(AtSyntax::ExtendedExecute, "HTTPREAD", &[])?;
        let response = self.send_simple(&read)?;

        // "+HTTPREAD: <length>", the body, then "OK"
        if response.len() != 3 {
            return Err(ModemError::ProtocolViolation);
        }
        let body = response.get(1).ok_or(ModemError::ProtocolViolation)?;
        let mut out: String<AT_LINE_SIZE> = String::new();
        out.push_str(body).map_err(|_| ModemError::ProtocolViolation)?;
        Ok(out)
    }
}

/// Description of a module-reported HTTP status code
///
/// Covers the standard ranges plus the module's vendor 6xx codes; unknown
/// codes map to an empty string.
pub fn status_text(code: u16) -> &'static str {
    match code {
        100 => "Continue",
        101 => "Switching Protocols",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        203 => "Non-Authoritative Information",
        204 => "No Content",
        205 => "Reset Content",
        206 => "Partial Content",
        300 => "Multiple Choices",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        305 => "Use Proxy",
        307 => "Temporary Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        402 => "Payment Required",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        406 => "Not Acceptable",
        407 => "Proxy Authentication Required",
        408 => "Request Time-out",
        409 => "Conflict",
        410 => "Gone",
        411 => "Length Required",
        412 => "Precondition Failed",
        413 => "Request Entity Too Large",
        414 => "Request-URI Too Large",
        415 => "Unsupported Media Type",
        416 => "Requested range not satisfiable",
        417 => "Expectation Failed",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Time-out",
        505 => "HTTP Version not supported",
        600 => "Not HTTP PDU",
        601 => "Network Error",
        602 => "No memory",
        603 => "DNS Error",
        604 => "Stack Busy",
        _ => "",
    }
}
