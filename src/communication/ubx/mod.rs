//! UBX binary protocol
//!
//! The navigation receiver speaks a length-prefixed, checksummed binary
//! framing (sync word `0xB5 0x62`, class/id pair, little-endian payload
//! length, payload, two checksum bytes). This module provides the frame
//! codec, the typed payload field layouts, and the typed messages the
//! session driver exchanges.

pub mod fields;
pub mod frame;
pub mod messages;
pub mod types;

pub use fields::{pack_fields, split_fields, FieldError, FieldType, FieldValue};
pub use frame::{checksum, Frame, FrameError, MAX_FRAME, MAX_PAYLOAD, SYNC_WORD};
pub use types::{MessageId, NmeaOutput, ProtocolMask};
