//! Network registration and the GPRS bearer lifecycle
//!
//! The bearer (profile 1) is the data session everything else rides on:
//! HTTP, TCP and UDP operations all require it open. Opening and closing
//! are idempotent - repeating them is a logged no-op, not an error.

use super::{parse_field, quoted, LinkState, ModemDriver, ModemError};
use crate::communication::at::{AtCommand, AtSyntax};
use crate::log_warn;
use crate::platform::traits::{GpioInterface, TimerInterface, UartInterface};

/// Budget for opening the bearer (the module can take tens of seconds)
const BEARER_OPEN_TIMEOUT_MS: u64 = 30_000;

/// Attempts to poll for an assigned IP address before giving up
const IP_POLL_ATTEMPTS: usize = 30;

/// Network registration status (AT+CREG)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegistrationStatus {
    /// Not registered, not searching
    NotRegistered,
    /// Registered on the home network
    Home,
    /// Not registered, searching for an operator
    Searching,
    /// Registration denied by the network
    Denied,
    /// Status unknown
    Unknown,
    /// Registered, roaming
    Roaming,
}

impl RegistrationStatus {
    fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(RegistrationStatus::NotRegistered),
            1 => Some(RegistrationStatus::Home),
            2 => Some(RegistrationStatus::Searching),
            3 => Some(RegistrationStatus::Denied),
            4 => Some(RegistrationStatus::Unknown),
            5 => Some(RegistrationStatus::Roaming),
            _ => None,
        }
    }

    /// Whether this status allows data traffic
    pub const fn is_registered(self) -> bool {
        matches!(self, RegistrationStatus::Home | RegistrationStatus::Roaming)
    }
}

impl<U: UartInterface, T: TimerInterface, G: GpioInterface> ModemDriver<U, T, G> {
    /// Query the network registration status (AT+CREG?)
    ///
    /// Registration takes the module a while after power-up; callers retry
    /// this at their own cadence rather than the driver looping internally.
    pub fn registration_status(&mut self) -> Result<RegistrationStatus, ModemError> {
        let query = AtCommand::new(AtSyntax::ExtendedRead, "CREG", &[])?;
        let response = self.send_command(&query, Self::registration_timeout(), false)?;
        let line = response.first().ok_or(ModemError::ProtocolViolation)?;
        let code: u8 = parse_field(line.split(',').nth(1))?;
        RegistrationStatus::from_code(code).ok_or(ModemError::ProtocolViolation)
    }

    /// Whether the module is registered on a network (home or roaming)
    pub fn is_registered(&mut self) -> Result<bool, ModemError> {
        Ok(self.registration_status()?.is_registered())
    }

    /// Whether GPRS is attached (AT+CGATT?)
    pub fn gprs_attached(&mut self) -> Result<bool, ModemError> {
        let query = AtCommand::new(AtSyntax::ExtendedRead, "CGATT", &[])?;
        let response = self.send_command(&query, super::DEFAULT_TIMEOUT_MS, false)?;
        let line = response.first().ok_or(ModemError::ProtocolViolation)?;
        match super::value_after_colon(line)? {
            "1" => Ok(true),
            "0" => Ok(false),
            _ => Err(ModemError::ProtocolViolation),
        }
    }

    /// Open the GPRS bearer on profile 1
    ///
    /// Sets the connection type, APN and optional credentials, opens the
    /// bearer, then polls until the module reports a non-zero IP address.
    /// A no-op with a warning when the bearer is already open.
    pub fn bearer_open(
        &mut self,
        apn: &str,
        user_name: &str,
        password: &str,
    ) -> Result<(), ModemError> {
        if self.session_state().bearer == LinkState::Open {
            log_warn!("modem: GPRS bearer is already open");
            return Ok(());
        }

        let contype = AtCommand::new(
            AtSyntax::ExtendedWrite,
            "SAPBR",
            &["3", "1", "\"Contype\"", "\"GPRS\""],
        )?;
        self.send_simple(&contype)?;

        let apn_quoted = quoted(apn)?;
        let set_apn = AtCommand::new(
            AtSyntax::ExtendedWrite,
            "SAPBR",
            &["3", "1", "\"APN\"", apn_quoted.as_str()],
        )?;
        self.send_simple(&set_apn)?;

        if !user_name.is_empty() {
            let set_user =
                AtCommand::new(AtSyntax::ExtendedWrite, "SAPBR", &["3", "1", "USER", user_name])?;
            self.send_simple(&set_user)?;
        }
        if !password.is_empty() {
            let set_password =
                AtCommand::new(AtSyntax::ExtendedWrite, "SAPBR", &["3", "1", "PWD", password])?;
            self.send_simple(&set_password)?;
        }

        // Opening the context can take much longer than a normal exchange
        let open = AtCommand::new(AtSyntax::ExtendedWrite, "SAPBR", &["1", "1"])?;
        self.send_command(&open, BEARER_OPEN_TIMEOUT_MS, false)?;

        // Wait until the module holds a local IP address
        for _ in 0..IP_POLL_ATTEMPTS {
            let status = AtCommand::new(AtSyntax::ExtendedWrite, "SAPBR", &["2", "1"])?;
            let response = self.send_simple(&status)?;
            let line = response.first().ok_or(ModemError::ProtocolViolation)?;
            let ip_address = line
                .split(',')
                .nth(2)
                .ok_or(ModemError::ProtocolViolation)?
                .trim();
            if ip_address != "\"0.0.0.0\"" {
                self.state_mut().bearer = LinkState::Open;
                return Ok(());
            }
        }
        Err(ModemError::Timeout)
    }

    /// Close the GPRS bearer on profile 1
    ///
    /// A no-op with a warning when the bearer is not known open.
    pub fn bearer_close(&mut self) -> Result<(), ModemError> {
        if self.session_state().bearer != LinkState::Open {
            log_warn!("modem: GPRS bearer is already closed");
            return Ok(());
        }

        let close = AtCommand::new(AtSyntax::ExtendedWrite, "SAPBR", &["0", "1"])?;
        self.send_simple(&close)?;
        self.state_mut().bearer = LinkState::Closed;
        Ok(())
    }
}
