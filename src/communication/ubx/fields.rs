//! Typed payload field layouts
//!
//! UBX payloads are flat sequences of little-endian fields. A message's
//! layout is declared as a `[FieldType]` slice; [`split_fields`] decodes raw
//! payload bytes against a layout and [`pack_fields`] serializes values back.
//! The two round-trip byte-exactly.

use super::frame::MAX_PAYLOAD;
use core::fmt;
use heapless::Vec;

/// Maximum number of fields in one payload layout
pub const MAX_FIELDS: usize = 24;

/// Payload field wire types
///
/// `U`/`I` are unsigned/signed integers, `X` bitfields (decoded as their
/// unsigned carrier), `R` IEEE-754 floats, `CH` a single ISO 8859-1
/// character. The digit is the width in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FieldType {
    /// 1 byte, unsigned
    U1,
    /// 1 byte, signed
    I1,
    /// 1 byte, bitfield
    X1,
    /// 2 bytes, unsigned
    U2,
    /// 2 bytes, signed
    I2,
    /// 2 bytes, bitfield
    X2,
    /// 4 bytes, unsigned
    U4,
    /// 4 bytes, signed
    I4,
    /// 4 bytes, bitfield
    X4,
    /// 4 bytes, float
    R4,
    /// 8 bytes, double
    R8,
    /// 1 byte, character
    Ch,
}

impl FieldType {
    /// Encoded size of this field in bytes
    pub const fn size(self) -> usize {
        match self {
            FieldType::U1 | FieldType::I1 | FieldType::X1 | FieldType::Ch => 1,
            FieldType::U2 | FieldType::I2 | FieldType::X2 => 2,
            FieldType::U4 | FieldType::I4 | FieldType::X4 | FieldType::R4 => 4,
            FieldType::R8 => 8,
        }
    }
}

/// A decoded payload field
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FieldValue {
    /// 1 byte, unsigned
    U1(u8),
    /// 1 byte, signed
    I1(i8),
    /// 1 byte, bitfield
    X1(u8),
    /// 2 bytes, unsigned
    U2(u16),
    /// 2 bytes, signed
    I2(i16),
    /// 2 bytes, bitfield
    X2(u16),
    /// 4 bytes, unsigned
    U4(u32),
    /// 4 bytes, signed
    I4(i32),
    /// 4 bytes, bitfield
    X4(u32),
    /// 4 bytes, float
    R4(f32),
    /// 8 bytes, double
    R8(f64),
    /// 1 byte, character
    Ch(u8),
}

impl FieldValue {
    /// The wire type this value encodes as
    pub const fn field_type(&self) -> FieldType {
        match self {
            FieldValue::U1(_) => FieldType::U1,
            FieldValue::I1(_) => FieldType::I1,
            FieldValue::X1(_) => FieldType::X1,
            FieldValue::U2(_) => FieldType::U2,
            FieldValue::I2(_) => FieldType::I2,
            FieldValue::X2(_) => FieldType::X2,
            FieldValue::U4(_) => FieldType::U4,
            FieldValue::I4(_) => FieldType::I4,
            FieldValue::X4(_) => FieldType::X4,
            FieldValue::R4(_) => FieldType::R4,
            FieldValue::R8(_) => FieldType::R8,
            FieldValue::Ch(_) => FieldType::Ch,
        }
    }
}

/// Field layout errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FieldError {
    /// Payload byte count does not match the layout's total size
    SizeMismatch {
        /// Bytes the layout requires
        expected: usize,
        /// Bytes actually supplied
        actual: usize,
    },
    /// Layout declares more fields than [`MAX_FIELDS`]
    TooManyFields,
    /// Serialized values exceed the payload capacity
    Overflow,
    /// A field held a value outside its message-defined range
    InvalidValue,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldError::SizeMismatch { expected, actual } => {
                write!(f, "payload size {} does not match layout size {}", actual, expected)
            }
            FieldError::TooManyFields => write!(f, "layout exceeds field limit"),
            FieldError::Overflow => write!(f, "packed fields exceed payload capacity"),
            FieldError::InvalidValue => write!(f, "field value outside message range"),
        }
    }
}

/// Total encoded size of a layout in bytes
pub fn layout_size(layout: &[FieldType]) -> usize {
    layout.iter().map(|field| field.size()).sum()
}

/// Decode payload bytes against a layout
///
/// # Errors
///
/// Returns `FieldError::SizeMismatch` unless `bytes` is exactly the layout's
/// size - a response with the wrong payload size is a protocol violation,
/// never partially decoded.
pub fn split_fields(
    layout: &[FieldType],
    bytes: &[u8],
) -> Result<Vec<FieldValue, MAX_FIELDS>, FieldError> {
    let expected = layout_size(layout);
    if bytes.len() != expected {
        return Err(FieldError::SizeMismatch {
            expected,
            actual: bytes.len(),
        });
    }

    let mut values = Vec::new();
    let mut offset = 0;
    for &field in layout {
        let raw = &bytes[offset..offset + field.size()];
        offset += field.size();

        let value = match field {
            FieldType::U1 => FieldValue::U1(raw[0]),
            FieldType::I1 => FieldValue::I1(raw[0] as i8),
            FieldType::X1 => FieldValue::X1(raw[0]),
            FieldType::U2 => FieldValue::U2(u16::from_le_bytes([raw[0], raw[1]])),
            FieldType::I2 => FieldValue::I2(i16::from_le_bytes([raw[0], raw[1]])),
            FieldType::X2 => FieldValue::X2(u16::from_le_bytes([raw[0], raw[1]])),
            FieldType::U4 => {
                FieldValue::U4(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
            }
            FieldType::I4 => {
                FieldValue::I4(i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
            }
            FieldType::X4 => {
                FieldValue::X4(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
            }
            FieldType::R4 => {
                FieldValue::R4(f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
            }
            FieldType::R8 => FieldValue::R8(f64::from_le_bytes([
                raw[0], raw[1], raw[2], raw[3], raw[4], raw[5], raw[6], raw[7],
            ])),
            FieldType::Ch => FieldValue::Ch(raw[0]),
        };
        values.push(value).map_err(|_| FieldError::TooManyFields)?;
    }
    Ok(values)
}

/// Serialize field values to payload bytes, little endian
///
/// # Errors
///
/// Returns `FieldError::Overflow` if the result would exceed the payload
/// capacity.
pub fn pack_fields(values: &[FieldValue]) -> Result<Vec<u8, MAX_PAYLOAD>, FieldError> {
    let mut out: Vec<u8, MAX_PAYLOAD> = Vec::new();
    for value in values {
        let result = match *value {
            FieldValue::U1(v) => out.extend_from_slice(&[v]),
            FieldValue::I1(v) => out.extend_from_slice(&[v as u8]),
            FieldValue::X1(v) => out.extend_from_slice(&[v]),
            FieldValue::U2(v) => out.extend_from_slice(&v.to_le_bytes()),
            FieldValue::I2(v) => out.extend_from_slice(&v.to_le_bytes()),
            FieldValue::X2(v) => out.extend_from_slice(&v.to_le_bytes()),
            FieldValue::U4(v) => out.extend_from_slice(&v.to_le_bytes()),
            FieldValue::I4(v) => out.extend_from_slice(&v.to_le_bytes()),
            FieldValue::X4(v) => out.extend_from_slice(&v.to_le_bytes()),
            FieldValue::R4(v) => out.extend_from_slice(&v.to_le_bytes()),
            FieldValue::R8(v) => out.extend_from_slice(&v.to_le_bytes()),
            FieldValue::Ch(v) => out.extend_from_slice(&[v]),
        };
        result.map_err(|_| FieldError::Overflow)?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::FieldType as T;
    use super::FieldValue as V;
    use super::*;

    #[test]
    fn test_layout_size() {
        assert_eq!(layout_size(&[T::U1, T::U1, T::X2, T::X4, T::U4]), 12);
        assert_eq!(layout_size(&[]), 0);
    }

    #[test]
    fn test_split_then_pack_round_trips() {
        let layout = [T::U1, T::I1, T::X2, T::U2, T::I4, T::U4, T::R4, T::R8];
        let bytes: [u8; 26] = [
            0x2A, 0xFF, 0x34, 0x12, 0x78, 0x56, 0xF0, 0xFF, 0xFF, 0xFF, 0x01, 0x02, 0x03, 0x04,
            0x00, 0x00, 0x80, 0x3F, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xF0, 0x3F,
        ];

        let values = split_fields(&layout, &bytes).unwrap();
        assert_eq!(values[0], V::U1(0x2A));
        assert_eq!(values[1], V::I1(-1));
        assert_eq!(values[4], V::I4(-16));
        assert_eq!(values[6], V::R4(1.0));
        assert_eq!(values[7], V::R8(1.0));

        let packed = pack_fields(&values).unwrap();
        assert_eq!(packed.as_slice(), &bytes);
    }

    #[test]
    fn test_pack_then_split_round_trips() {
        let values = [
            V::U2(0x1234),
            V::X4(0xDEAD_BEEF),
            V::I2(-300),
            V::Ch(b'A'),
        ];
        let layout: [T; 4] = [T::U2, T::X4, T::I2, T::Ch];

        let bytes = pack_fields(&values).unwrap();
        let decoded = split_fields(&layout, &bytes).unwrap();
        assert_eq!(decoded.as_slice(), &values);
    }

    #[test]
    fn test_size_mismatch_rejected() {
        let err = split_fields(&[T::U4], &[0x01, 0x02]).unwrap_err();
        assert_eq!(
            err,
            FieldError::SizeMismatch {
                expected: 4,
                actual: 2
            }
        );
    }
}
