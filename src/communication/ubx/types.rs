//! UBX message identifiers and protocol constants

use bitflags::bitflags;
use core::fmt;

/// Message class values used by the driver
pub const CLASS_NAV: u8 = 0x01;
/// Acknowledgement class; replies to configuration messages
pub const CLASS_ACK: u8 = 0x05;
/// Configuration class; messages of this class are acknowledged
pub const CLASS_CFG: u8 = 0x06;

/// A message's class/id pair
///
/// The two bytes that select a binary message's category and specific type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MessageId {
    /// Message class byte
    pub class: u8,
    /// Message id byte
    pub id: u8,
}

impl MessageId {
    /// Message acknowledged
    pub const ACK_ACK: MessageId = MessageId::new(CLASS_ACK, 0x01);
    /// Message not acknowledged
    pub const ACK_NAK: MessageId = MessageId::new(CLASS_ACK, 0x00);

    /// Port configuration (baud rate, protocol masks)
    pub const CFG_PRT: MessageId = MessageId::new(CLASS_CFG, 0x00);
    /// Per-message output rate configuration
    pub const CFG_MSG: MessageId = MessageId::new(CLASS_CFG, 0x01);
    /// Reset command
    pub const CFG_RST: MessageId = MessageId::new(CLASS_CFG, 0x04);
    /// Navigation/measurement rate configuration
    pub const CFG_RATE: MessageId = MessageId::new(CLASS_CFG, 0x08);

    /// Geodetic position solution
    pub const NAV_POSLLH: MessageId = MessageId::new(CLASS_NAV, 0x02);
    /// Receiver navigation status
    pub const NAV_STATUS: MessageId = MessageId::new(CLASS_NAV, 0x03);
    /// UTC time solution
    pub const NAV_TIMEUTC: MessageId = MessageId::new(CLASS_NAV, 0x21);

    /// Build a class/id pair
    pub const fn new(class: u8, id: u8) -> Self {
        Self { class, id }
    }

    /// Whether messages of this class must be acknowledged by the receiver
    pub const fn is_configuration(&self) -> bool {
        self.class == CLASS_CFG
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x}/{:#04x}", self.class, self.id)
    }
}

/// Standard NMEA sentences the receiver can emit on its serial port
///
/// Addressed through CFG-MSG with message class `0xF0`. The first six are
/// enabled from the factory and transmitted periodically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NmeaOutput {
    /// Fix data
    Gga,
    /// Geographic position
    Gll,
    /// DOP and active satellites
    Gsa,
    /// Satellites in view
    Gsv,
    /// Recommended minimum data
    Rmc,
    /// Course over ground and speed
    Vtg,
}

impl NmeaOutput {
    /// Sentences enabled by default on a factory-fresh module
    pub const DEFAULT_ENABLED: [NmeaOutput; 6] = [
        NmeaOutput::Gga,
        NmeaOutput::Gll,
        NmeaOutput::Gsa,
        NmeaOutput::Gsv,
        NmeaOutput::Rmc,
        NmeaOutput::Vtg,
    ];

    /// CFG-MSG message class for standard NMEA sentences
    pub const CLASS: u8 = 0xF0;

    /// CFG-MSG message id for this sentence
    pub const fn id(self) -> u8 {
        match self {
            NmeaOutput::Gga => 0x00,
            NmeaOutput::Gll => 0x01,
            NmeaOutput::Gsa => 0x02,
            NmeaOutput::Gsv => 0x03,
            NmeaOutput::Rmc => 0x04,
            NmeaOutput::Vtg => 0x05,
        }
    }
}

bitflags! {
    /// Active protocols on a receiver port (CFG-PRT proto mask fields)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ProtocolMask: u16 {
        /// UBX binary protocol
        const UBX = 0x0001;
        /// NMEA text protocol
        const NMEA = 0x0002;
        /// RTCM corrections
        const RTCM = 0x0004;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_class() {
        assert!(MessageId::CFG_PRT.is_configuration());
        assert!(MessageId::CFG_RST.is_configuration());
        assert!(!MessageId::NAV_POSLLH.is_configuration());
        assert!(!MessageId::ACK_ACK.is_configuration());
    }

    #[test]
    fn test_ack_and_nak_are_distinct() {
        assert_ne!(MessageId::ACK_ACK, MessageId::ACK_NAK);
        assert_eq!(MessageId::ACK_ACK.class, MessageId::ACK_NAK.class);
    }

    #[test]
    fn test_nmea_output_ids() {
        assert_eq!(NmeaOutput::Gga.id(), 0x00);
        assert_eq!(NmeaOutput::Rmc.id(), 0x04);
        assert_eq!(NmeaOutput::Vtg.id(), 0x05);
    }
}
