//! AT command formatting
//!
//! Command text follows one of several fixed syntaxes; which arguments a
//! syntax admits is checked when the command is constructed, so a malformed
//! command can never reach the wire.

use core::fmt;
use heapless::String;

/// Maximum length of a formatted command line
pub const AT_COMMAND_SIZE: usize = 256;
/// Maximum length of a response terminator token
pub const AT_TERMINATOR_SIZE: usize = 24;

/// Terminator that closes most command responses
pub const DEFAULT_TERMINATOR: &str = "OK";

/// Command-text syntaxes understood by the modem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AtSyntax {
    /// `{cmd}` - raw text, also used for data payloads and empty probes
    Bare,
    /// `AT{cmd}{args}` - basic command
    Basic,
    /// `AT&{cmd}{args}` - basic command, ampersand group
    BasicAmpersand,
    /// `AT+{cmd}=?` - extended syntax, test form
    ExtendedTest,
    /// `AT+{cmd}?` - extended syntax, read form
    ExtendedRead,
    /// `AT+{cmd}={args}` - extended syntax, write form
    ExtendedWrite,
    /// `AT+{cmd}` - extended syntax, execute form
    ExtendedExecute,
    /// `ATS{index}={value}` - S-register assignment
    Register,
}

/// Construction-time command errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AtFormatError {
    /// The syntax requires at least one argument and none were supplied
    MissingArguments,
    /// The syntax admits no (or fewer) arguments than were supplied
    UnexpectedArguments,
    /// The formatted command exceeds [`AT_COMMAND_SIZE`]
    TooLong,
}

impl fmt::Display for AtFormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AtFormatError::MissingArguments => write!(f, "syntax requires arguments"),
            AtFormatError::UnexpectedArguments => write!(f, "syntax admits no further arguments"),
            AtFormatError::TooLong => write!(f, "formatted command too long"),
        }
    }
}

/// One outgoing modem command
///
/// Carries the formatted command text and the terminator whose appearance on
/// a line closes the response. The formatted text doubles as the echo
/// pattern when the modem echoes commands back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtCommand {
    syntax: AtSyntax,
    formatted: String<AT_COMMAND_SIZE>,
    terminator: String<AT_TERMINATOR_SIZE>,
}

impl AtCommand {
    /// Build a command expecting the default `OK` terminator
    pub fn new(syntax: AtSyntax, command: &str, args: &[&str]) -> Result<Self, AtFormatError> {
        Self::with_terminator(syntax, command, args, DEFAULT_TERMINATOR)
    }

    /// Shorthand for a bare command with the default terminator
    pub fn bare(command: &str) -> Result<Self, AtFormatError> {
        Self::new(AtSyntax::Bare, command, &[])
    }

    /// Build a command with an explicit response terminator
    ///
    /// An empty terminator means the response has no closing token; the
    /// exchange completes at the first line delimiter and anything after it
    /// stays buffered for the caller to inspect.
    ///
    /// # Errors
    ///
    /// Argument arity is validated here: bare/test/read/execute forms take
    /// no arguments, write and basic forms at least one, the register form
    /// exactly one.
    pub fn with_terminator(
        syntax: AtSyntax,
        command: &str,
        args: &[&str],
        terminator: &str,
    ) -> Result<Self, AtFormatError> {
        match syntax {
            AtSyntax::Bare
            | AtSyntax::ExtendedTest
            | AtSyntax::ExtendedRead
            | AtSyntax::ExtendedExecute => {
                if !args.is_empty() {
                    return Err(AtFormatError::UnexpectedArguments);
                }
            }
            AtSyntax::Basic | AtSyntax::BasicAmpersand | AtSyntax::ExtendedWrite => {
                if args.is_empty() {
                    return Err(AtFormatError::MissingArguments);
                }
            }
            AtSyntax::Register => {
                if args.is_empty() {
                    return Err(AtFormatError::MissingArguments);
                }
                if args.len() > 1 {
                    return Err(AtFormatError::UnexpectedArguments);
                }
            }
        }

        let mut formatted: String<AT_COMMAND_SIZE> = String::new();
        format_command(&mut formatted, syntax, command, args)
            .map_err(|_| AtFormatError::TooLong)?;

        let mut terminator_owned: String<AT_TERMINATOR_SIZE> = String::new();
        terminator_owned
            .push_str(terminator)
            .map_err(|_| AtFormatError::TooLong)?;

        Ok(Self {
            syntax,
            formatted,
            terminator: terminator_owned,
        })
    }

    /// The syntax this command was built with
    pub fn syntax(&self) -> AtSyntax {
        self.syntax
    }

    /// The exact text sent to the modem (without the trailing delimiter)
    pub fn formatted(&self) -> &str {
        &self.formatted
    }

    /// The token that closes this command's response
    pub fn terminator(&self) -> &str {
        &self.terminator
    }
}

impl fmt::Display for AtCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.formatted)
    }
}

fn format_command(
    out: &mut String<AT_COMMAND_SIZE>,
    syntax: AtSyntax,
    command: &str,
    args: &[&str],
) -> Result<(), ()> {
    match syntax {
        AtSyntax::Bare => out.push_str(command)?,
        AtSyntax::Basic => {
            out.push_str("AT")?;
            out.push_str(command)?;
            push_args(out, args)?;
        }
        AtSyntax::BasicAmpersand => {
            out.push_str("AT&")?;
            out.push_str(command)?;
            push_args(out, args)?;
        }
        AtSyntax::ExtendedTest => {
            out.push_str("AT+")?;
            out.push_str(command)?;
            out.push_str("=?")?;
        }
        AtSyntax::ExtendedRead => {
            out.push_str("AT+")?;
            out.push_str(command)?;
            out.push('?')?;
        }
        AtSyntax::ExtendedWrite => {
            out.push_str("AT+")?;
            out.push_str(command)?;
            out.push('=')?;
            push_args(out, args)?;
        }
        AtSyntax::ExtendedExecute => {
            out.push_str("AT+")?;
            out.push_str(command)?;
        }
        AtSyntax::Register => {
            out.push_str("ATS")?;
            out.push_str(command)?;
            out.push('=')?;
            push_args(out, args)?;
        }
    }
    Ok(())
}

fn push_args(out: &mut String<AT_COMMAND_SIZE>, args: &[&str]) -> Result<(), ()> {
    for (index, arg) in args.iter().enumerate() {
        if index > 0 {
            out.push(',')?;
        }
        out.push_str(arg)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_syntax() {
        let cmd = AtCommand::new(AtSyntax::Basic, "D", &["+911234567890"]).unwrap();
        assert_eq!(cmd.formatted(), "ATD+911234567890");
        assert_eq!(cmd.terminator(), "OK");
    }

    #[test]
    fn test_basic_ampersand_syntax() {
        let cmd = AtCommand::new(AtSyntax::BasicAmpersand, "F", &["0"]).unwrap();
        assert_eq!(cmd.formatted(), "AT&F0");
    }

    #[test]
    fn test_register_syntax() {
        let cmd = AtCommand::new(AtSyntax::Register, "0", &["0"]).unwrap();
        assert_eq!(cmd.formatted(), "ATS0=0");
    }

    #[test]
    fn test_extended_forms() {
        let test = AtCommand::new(AtSyntax::ExtendedTest, "CIPSEND", &[]).unwrap();
        assert_eq!(test.formatted(), "AT+CIPSEND=?");

        let read = AtCommand::new(AtSyntax::ExtendedRead, "CIPSEND", &[]).unwrap();
        assert_eq!(read.formatted(), "AT+CIPSEND?");

        let write = AtCommand::new(AtSyntax::ExtendedWrite, "CIPSEND", &["16"]).unwrap();
        assert_eq!(write.formatted(), "AT+CIPSEND=16");

        let execute = AtCommand::new(AtSyntax::ExtendedExecute, "CIPSEND", &[]).unwrap();
        assert_eq!(execute.formatted(), "AT+CIPSEND");
    }

    #[test]
    fn test_bare_syntax() {
        let cmd = AtCommand::bare("A/").unwrap();
        assert_eq!(cmd.formatted(), "A/");
    }

    #[test]
    fn test_write_args_joined_with_commas() {
        let cmd =
            AtCommand::new(AtSyntax::ExtendedWrite, "SAPBR", &["3", "1", "\"Contype\"", "\"GPRS\""])
                .unwrap();
        assert_eq!(cmd.formatted(), "AT+SAPBR=3,1,\"Contype\",\"GPRS\"");
    }

    #[test]
    fn test_arity_is_checked_at_construction() {
        assert_eq!(
            AtCommand::new(AtSyntax::ExtendedRead, "CREG", &["1"]),
            Err(AtFormatError::UnexpectedArguments)
        );
        assert_eq!(
            AtCommand::new(AtSyntax::ExtendedWrite, "CMEE", &[]),
            Err(AtFormatError::MissingArguments)
        );
        assert_eq!(
            AtCommand::new(AtSyntax::Register, "0", &["0", "1"]),
            Err(AtFormatError::UnexpectedArguments)
        );
        assert_eq!(
            AtCommand::new(AtSyntax::Bare, "AT", &["x"]),
            Err(AtFormatError::UnexpectedArguments)
        );
    }

    #[test]
    fn test_custom_terminator() {
        let cmd = AtCommand::with_terminator(
            AtSyntax::ExtendedWrite,
            "HTTPACTION",
            &["0"],
            "+HTTPACTION",
        )
        .unwrap();
        assert_eq!(cmd.formatted(), "AT+HTTPACTION=0");
        assert_eq!(cmd.terminator(), "+HTTPACTION");
    }

    #[test]
    fn test_empty_terminator_allowed() {
        let cmd =
            AtCommand::with_terminator(AtSyntax::ExtendedExecute, "CIPSEND", &[], "").unwrap();
        assert_eq!(cmd.terminator(), "");
    }
}
