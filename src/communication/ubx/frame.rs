//! UBX frame codec
//!
//! Wire layout of one frame:
//!
//! 1. 2 bytes sync word `0xB5 0x62`
//! 2. 1 byte message class + 1 byte message id
//! 3. 2 bytes payload length, little endian
//! 4. payload
//! 5. 2 bytes checksum (`CK_A` then `CK_B`), computed over class, id, length
//!    and payload

use super::types::MessageId;
use core::fmt;
use heapless::Vec;

/// Frame sync word; every UBX frame starts with these two bytes
pub const SYNC_WORD: [u8; 2] = [0xB5, 0x62];

/// Maximum payload this codec handles
///
/// The largest payload the drivers consume is CFG-PRT at 20 bytes; 128
/// leaves room for firmware variants that pad their responses.
pub const MAX_PAYLOAD: usize = 128;

/// Bytes of framing around the payload: sync(2) + class/id(2) + length(2) +
/// checksum(2)
pub const FRAME_OVERHEAD: usize = 8;

/// Maximum encoded frame size
pub const MAX_FRAME: usize = MAX_PAYLOAD + FRAME_OVERHEAD;

/// Frame-level decode/encode errors
///
/// All of these mean the single frame is unusable; they are reported to the
/// caller and never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Input does not start with the sync word
    BadSyncWord,
    /// Fewer bytes than the minimum frame size
    Truncated,
    /// Declared payload length does not match the actual payload byte count
    LengthMismatch {
        /// Length field value
        declared: usize,
        /// Bytes actually present between length field and checksum
        actual: usize,
    },
    /// Transmitted checksum does not match the computed one
    ChecksumMismatch {
        /// Checksum computed over the received bytes, `(CK_A << 8) | CK_B`
        computed: u16,
        /// Checksum transmitted with the frame
        received: u16,
    },
    /// Payload exceeds [`MAX_PAYLOAD`]
    PayloadTooLarge,
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::BadSyncWord => write!(f, "malformed frame: bad sync word"),
            FrameError::Truncated => write!(f, "malformed frame: truncated"),
            FrameError::LengthMismatch { declared, actual } => write!(
                f,
                "malformed frame: length field {} but {} payload bytes",
                declared, actual
            ),
            FrameError::ChecksumMismatch { computed, received } => write!(
                f,
                "malformed frame: checksum {:#06x} received, {:#06x} computed",
                received, computed
            ),
            FrameError::PayloadTooLarge => write!(f, "payload exceeds codec limit"),
        }
    }
}

/// Compute the frame checksum over `data`
///
/// Two running 8-bit accumulators, both seeded at zero:
/// `CK_A += byte; CK_B += CK_A`, each wrapped to 8 bits. The checked range
/// is class, id, length and payload - the sync word is excluded.
pub fn checksum(data: &[u8]) -> (u8, u8) {
    let mut ck_a: u8 = 0;
    let mut ck_b: u8 = 0;
    for &byte in data {
        ck_a = ck_a.wrapping_add(byte);
        ck_b = ck_b.wrapping_add(ck_a);
    }
    (ck_a, ck_b)
}

/// One UBX protocol message
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Frame {
    class: u8,
    id: u8,
    payload: Vec<u8, MAX_PAYLOAD>,
}

impl Frame {
    /// Build a frame for `message` with the given payload bytes
    ///
    /// # Errors
    ///
    /// Returns `FrameError::PayloadTooLarge` if the payload exceeds
    /// [`MAX_PAYLOAD`].
    pub fn new(message: MessageId, payload: &[u8]) -> Result<Self, FrameError> {
        let payload = Vec::from_slice(payload).map_err(|_| FrameError::PayloadTooLarge)?;
        Ok(Self {
            class: message.class,
            id: message.id,
            payload,
        })
    }

    /// The frame's class/id pair
    pub fn message_id(&self) -> MessageId {
        MessageId::new(self.class, self.id)
    }

    /// The frame's payload bytes
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Serialize to wire bytes
    pub fn encode(&self) -> Vec<u8, MAX_FRAME> {
        let len = (self.payload.len() as u16).to_le_bytes();
        let header = [
            SYNC_WORD[0],
            SYNC_WORD[1],
            self.class,
            self.id,
            len[0],
            len[1],
        ];

        // Capacity is MAX_PAYLOAD + FRAME_OVERHEAD and the payload is bounded
        // at construction, so none of these can fail.
        let mut out: Vec<u8, MAX_FRAME> = Vec::new();
        out.extend_from_slice(&header).ok();
        out.extend_from_slice(&self.payload).ok();
        let (ck_a, ck_b) = checksum(&out[2..]);
        out.push(ck_a).ok();
        out.push(ck_b).ok();
        out
    }

    /// Parse and validate one complete frame
    ///
    /// `bytes` must span exactly one frame, starting at the sync word and
    /// ending at the second checksum byte.
    ///
    /// # Errors
    ///
    /// Returns a [`FrameError`] on any sync word, length or checksum
    /// mismatch.
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() < FRAME_OVERHEAD {
            return Err(FrameError::Truncated);
        }
        if bytes[..2] != SYNC_WORD {
            return Err(FrameError::BadSyncWord);
        }

        let declared = u16::from_le_bytes([bytes[4], bytes[5]]) as usize;
        let payload = &bytes[6..bytes.len() - 2];
        if payload.len() != declared {
            return Err(FrameError::LengthMismatch {
                declared,
                actual: payload.len(),
            });
        }
        if declared > MAX_PAYLOAD {
            return Err(FrameError::PayloadTooLarge);
        }

        let (ck_a, ck_b) = checksum(&bytes[2..bytes.len() - 2]);
        let received = &bytes[bytes.len() - 2..];
        if received != [ck_a, ck_b] {
            return Err(FrameError::ChecksumMismatch {
                computed: ((ck_a as u16) << 8) | ck_b as u16,
                received: ((received[0] as u16) << 8) | received[1] as u16,
            });
        }

        Frame::new(MessageId::new(bytes[2], bytes[3]), payload)
    }

    /// Total frame size implied by a declared payload length
    pub const fn encoded_len(payload_len: usize) -> usize {
        payload_len + FRAME_OVERHEAD
    }
}
