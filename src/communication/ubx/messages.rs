//! Typed UBX messages
//!
//! Payload layouts and decoded forms of the messages the session driver
//! exchanges: CFG-PRT (port configuration), CFG-RATE (measurement rate) and
//! the NAV polls (position, status, UTC time).

use super::fields::{layout_size, pack_fields, split_fields, FieldError, FieldType, FieldValue};
use super::frame::MAX_PAYLOAD;
use super::types::ProtocolMask;
use heapless::Vec;

/// Port id of the receiver's primary serial interface
pub const PORT_UART1: u8 = 0x01;

/// Default UART mode bits: 8 data bits, no parity, 1 stop bit
pub const DEFAULT_UART_MODE: u32 = 0x0000_08D0;

/// CFG-PRT payload layout (UART port variant)
pub const CFG_PRT_LAYOUT: [FieldType; 9] = [
    FieldType::U1, // portID
    FieldType::U1, // reserved0
    FieldType::X2, // txReady
    FieldType::X4, // mode
    FieldType::U4, // baudRate
    FieldType::X2, // inProtoMask
    FieldType::X2, // outProtoMask
    FieldType::U2, // reserved4
    FieldType::U2, // reserved5
];

/// Decoded CFG-PRT port configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UartPortConfig {
    /// Port the configuration applies to
    pub port_id: u8,
    /// TX-ready pin configuration (always zero on this hardware)
    pub tx_ready: u16,
    /// UART mode bits (character length, parity, stop bits)
    pub mode: u32,
    /// Port baud rate
    pub baud_rate: u32,
    /// Protocols accepted on the port
    pub in_proto: ProtocolMask,
    /// Protocols emitted on the port
    pub out_proto: ProtocolMask,
}

impl UartPortConfig {
    /// Decode a CFG-PRT response payload
    ///
    /// # Errors
    ///
    /// Returns `FieldError::SizeMismatch` for a payload of the wrong size.
    pub fn decode(payload: &[u8]) -> Result<Self, FieldError> {
        let fields = split_fields(&CFG_PRT_LAYOUT, payload)?;
        match fields.as_slice() {
            &[FieldValue::U1(port_id), FieldValue::U1(_), FieldValue::X2(tx_ready), FieldValue::X4(mode), FieldValue::U4(baud_rate), FieldValue::X2(in_proto), FieldValue::X2(out_proto), FieldValue::U2(_), FieldValue::U2(_)] => {
                Ok(Self {
                    port_id,
                    tx_ready,
                    mode,
                    baud_rate,
                    in_proto: ProtocolMask::from_bits_retain(in_proto),
                    out_proto: ProtocolMask::from_bits_retain(out_proto),
                })
            }
            _ => Err(FieldError::SizeMismatch {
                expected: layout_size(&CFG_PRT_LAYOUT),
                actual: payload.len(),
            }),
        }
    }

    /// Serialize to a CFG-PRT write payload
    pub fn encode_payload(&self) -> Result<Vec<u8, MAX_PAYLOAD>, FieldError> {
        pack_fields(&[
            FieldValue::U1(self.port_id),
            FieldValue::U1(0),
            FieldValue::X2(self.tx_ready),
            FieldValue::X4(self.mode),
            FieldValue::U4(self.baud_rate),
            FieldValue::X2(self.in_proto.bits()),
            FieldValue::X2(self.out_proto.bits()),
            FieldValue::U2(0),
            FieldValue::U2(0),
        ])
    }
}

/// CFG-RATE payload layout
pub const CFG_RATE_LAYOUT: [FieldType; 3] = [FieldType::U2, FieldType::U2, FieldType::U2];

/// Decoded CFG-RATE measurement/navigation rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MeasurementRate {
    /// Measurement interval in milliseconds
    pub meas_rate_ms: u16,
    /// Navigation solutions per measurement
    pub nav_rate: u16,
    /// Time reference (0 = UTC, 1 = GPS)
    pub time_ref: u16,
}

impl MeasurementRate {
    /// Decode a CFG-RATE response payload
    pub fn decode(payload: &[u8]) -> Result<Self, FieldError> {
        let fields = split_fields(&CFG_RATE_LAYOUT, payload)?;
        match fields.as_slice() {
            &[FieldValue::U2(meas_rate_ms), FieldValue::U2(nav_rate), FieldValue::U2(time_ref)] => {
                Ok(Self {
                    meas_rate_ms,
                    nav_rate,
                    time_ref,
                })
            }
            _ => Err(FieldError::SizeMismatch {
                expected: layout_size(&CFG_RATE_LAYOUT),
                actual: payload.len(),
            }),
        }
    }

    /// Serialize to a CFG-RATE write payload
    pub fn encode_payload(&self) -> Result<Vec<u8, MAX_PAYLOAD>, FieldError> {
        pack_fields(&[
            FieldValue::U2(self.meas_rate_ms),
            FieldValue::U2(self.nav_rate),
            FieldValue::U2(self.time_ref),
        ])
    }
}

/// Receiver fix type reported in NAV-STATUS
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GpsFixType {
    /// No fix
    NoFix,
    /// Dead reckoning only
    DeadReckoning,
    /// 2D fix (latitude, longitude only)
    Fix2D,
    /// 3D fix (latitude, longitude, altitude)
    Fix3D,
    /// Combined GPS and dead reckoning
    GpsDeadReckoning,
    /// Time-only fix
    TimeOnly,
}

impl GpsFixType {
    /// Map the wire value to a fix type
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0x00 => Some(GpsFixType::NoFix),
            0x01 => Some(GpsFixType::DeadReckoning),
            0x02 => Some(GpsFixType::Fix2D),
            0x03 => Some(GpsFixType::Fix3D),
            0x04 => Some(GpsFixType::GpsDeadReckoning),
            0x05 => Some(GpsFixType::TimeOnly),
            _ => None,
        }
    }

    /// Whether the fix carries a usable position
    pub const fn has_position(self) -> bool {
        matches!(
            self,
            GpsFixType::Fix2D | GpsFixType::Fix3D | GpsFixType::GpsDeadReckoning
        )
    }
}

/// NAV-POSLLH payload layout
pub const NAV_POSLLH_LAYOUT: [FieldType; 7] = [
    FieldType::U4, // iTOW
    FieldType::I4, // lon
    FieldType::I4, // lat
    FieldType::I4, // height
    FieldType::I4, // hMSL
    FieldType::U4, // hAcc
    FieldType::U4, // vAcc
];

/// Decoded NAV-POSLLH geodetic position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NavPosLlh {
    /// GPS time of week, milliseconds
    pub itow_ms: u32,
    /// Longitude, 1e-7 degrees
    pub lon_1e7: i32,
    /// Latitude, 1e-7 degrees
    pub lat_1e7: i32,
    /// Height above ellipsoid, millimeters
    pub height_mm: i32,
    /// Height above mean sea level, millimeters
    pub hmsl_mm: i32,
    /// Horizontal accuracy estimate, millimeters
    pub h_acc_mm: u32,
    /// Vertical accuracy estimate, millimeters
    pub v_acc_mm: u32,
}

impl NavPosLlh {
    /// Decode a NAV-POSLLH response payload
    pub fn decode(payload: &[u8]) -> Result<Self, FieldError> {
        let fields = split_fields(&NAV_POSLLH_LAYOUT, payload)?;
        match fields.as_slice() {
            &[FieldValue::U4(itow_ms), FieldValue::I4(lon_1e7), FieldValue::I4(lat_1e7), FieldValue::I4(height_mm), FieldValue::I4(hmsl_mm), FieldValue::U4(h_acc_mm), FieldValue::U4(v_acc_mm)] => {
                Ok(Self {
                    itow_ms,
                    lon_1e7,
                    lat_1e7,
                    height_mm,
                    hmsl_mm,
                    h_acc_mm,
                    v_acc_mm,
                })
            }
            _ => Err(FieldError::SizeMismatch {
                expected: layout_size(&NAV_POSLLH_LAYOUT),
                actual: payload.len(),
            }),
        }
    }

    /// Latitude in decimal degrees
    pub fn latitude_deg(&self) -> f64 {
        self.lat_1e7 as f64 * 1e-7
    }

    /// Longitude in decimal degrees
    pub fn longitude_deg(&self) -> f64 {
        self.lon_1e7 as f64 * 1e-7
    }
}

/// NAV-STATUS payload layout
pub const NAV_STATUS_LAYOUT: [FieldType; 7] = [
    FieldType::U4, // iTOW
    FieldType::U1, // gpsFix
    FieldType::X1, // flags
    FieldType::X1, // fixStat
    FieldType::X1, // flags2
    FieldType::U4, // ttff
    FieldType::U4, // msss
];

/// Decoded NAV-STATUS receiver status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NavStatus {
    /// GPS time of week, milliseconds
    pub itow_ms: u32,
    /// Fix type
    pub fix_type: GpsFixType,
    /// Navigation status flags
    pub flags: u8,
    /// Fix status information
    pub fix_stat: u8,
    /// Additional status flags
    pub flags2: u8,
    /// Time to first fix, milliseconds
    pub ttff_ms: u32,
    /// Milliseconds since startup or reset
    pub uptime_ms: u32,
}

impl NavStatus {
    /// Decode a NAV-STATUS response payload
    ///
    /// # Errors
    ///
    /// `FieldError::InvalidValue` if the fix-type byte is outside the
    /// documented range.
    pub fn decode(payload: &[u8]) -> Result<Self, FieldError> {
        let fields = split_fields(&NAV_STATUS_LAYOUT, payload)?;
        match fields.as_slice() {
            &[FieldValue::U4(itow_ms), FieldValue::U1(fix_raw), FieldValue::X1(flags), FieldValue::X1(fix_stat), FieldValue::X1(flags2), FieldValue::U4(ttff_ms), FieldValue::U4(uptime_ms)] => {
                let fix_type = GpsFixType::from_raw(fix_raw).ok_or(FieldError::InvalidValue)?;
                Ok(Self {
                    itow_ms,
                    fix_type,
                    flags,
                    fix_stat,
                    flags2,
                    ttff_ms,
                    uptime_ms,
                })
            }
            _ => Err(FieldError::SizeMismatch {
                expected: layout_size(&NAV_STATUS_LAYOUT),
                actual: payload.len(),
            }),
        }
    }
}

/// NAV-TIMEUTC payload layout
pub const NAV_TIMEUTC_LAYOUT: [FieldType; 10] = [
    FieldType::U4, // iTOW
    FieldType::U4, // tAcc
    FieldType::I4, // nano
    FieldType::U2, // year
    FieldType::U1, // month
    FieldType::U1, // day
    FieldType::U1, // hour
    FieldType::U1, // min
    FieldType::U1, // sec
    FieldType::X1, // valid
];

/// Decoded NAV-TIMEUTC time solution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NavTimeUtc {
    /// GPS time of week, milliseconds
    pub itow_ms: u32,
    /// Time accuracy estimate, nanoseconds
    pub t_acc_ns: u32,
    /// Sub-second remainder, nanoseconds
    pub nano_ns: i32,
    /// Calendar year
    pub year: u16,
    /// Calendar month (1..=12)
    pub month: u8,
    /// Calendar day (1..=31)
    pub day: u8,
    /// Hour of day
    pub hour: u8,
    /// Minute of hour
    pub minute: u8,
    /// Second of minute
    pub second: u8,
    /// Validity flags (bit 2: UTC fully resolved)
    pub valid: u8,
}

impl NavTimeUtc {
    /// Decode a NAV-TIMEUTC response payload
    pub fn decode(payload: &[u8]) -> Result<Self, FieldError> {
        let fields = split_fields(&NAV_TIMEUTC_LAYOUT, payload)?;
        match fields.as_slice() {
            &[FieldValue::U4(itow_ms), FieldValue::U4(t_acc_ns), FieldValue::I4(nano_ns), FieldValue::U2(year), FieldValue::U1(month), FieldValue::U1(day), FieldValue::U1(hour), FieldValue::U1(minute), FieldValue::U1(second), FieldValue::X1(valid)] => {
                Ok(Self {
                    itow_ms,
                    t_acc_ns,
                    nano_ns,
                    year,
                    month,
                    day,
                    hour,
                    minute,
                    second,
                    valid,
                })
            }
            _ => Err(FieldError::SizeMismatch {
                expected: layout_size(&NAV_TIMEUTC_LAYOUT),
                actual: payload.len(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_config_round_trip() {
        let config = UartPortConfig {
            port_id: PORT_UART1,
            tx_ready: 0,
            mode: DEFAULT_UART_MODE,
            baud_rate: 115_200,
            in_proto: ProtocolMask::UBX | ProtocolMask::NMEA | ProtocolMask::RTCM,
            out_proto: ProtocolMask::UBX | ProtocolMask::NMEA,
        };

        let payload = config.encode_payload().unwrap();
        assert_eq!(payload.len(), 20);
        let decoded = UartPortConfig::decode(&payload).unwrap();
        assert_eq!(decoded, config);
    }

    #[test]
    fn test_port_config_wrong_size() {
        assert!(matches!(
            UartPortConfig::decode(&[0u8; 19]),
            Err(FieldError::SizeMismatch { expected: 20, actual: 19 })
        ));
    }

    #[test]
    fn test_nav_posllh_decode() {
        // lat 48.1173000 deg, lon 11.5166667 deg
        let fields = [
            FieldValue::U4(123_000),
            FieldValue::I4(115_166_667),
            FieldValue::I4(481_173_000),
            FieldValue::I4(545_400),
            FieldValue::I4(498_500),
            FieldValue::U4(2_500),
            FieldValue::U4(3_100),
        ];
        let payload = pack_fields(&fields).unwrap();

        let pos = NavPosLlh::decode(&payload).unwrap();
        assert_eq!(pos.lat_1e7, 481_173_000);
        assert!((pos.latitude_deg() - 48.1173).abs() < 1e-9);
        assert!((pos.longitude_deg() - 11.516_666_7).abs() < 1e-9);
        assert_eq!(pos.h_acc_mm, 2_500);
    }

    #[test]
    fn test_nav_status_decode() {
        let fields = [
            FieldValue::U4(5_000),
            FieldValue::U1(0x03),
            FieldValue::X1(0x0D),
            FieldValue::X1(0x00),
            FieldValue::X1(0x00),
            FieldValue::U4(31_000),
            FieldValue::U4(120_000),
        ];
        let payload = pack_fields(&fields).unwrap();

        let status = NavStatus::decode(&payload).unwrap();
        assert_eq!(status.fix_type, GpsFixType::Fix3D);
        assert!(status.fix_type.has_position());
        assert_eq!(status.ttff_ms, 31_000);
    }

    #[test]
    fn test_nav_status_invalid_fix_type() {
        let fields = [
            FieldValue::U4(0),
            FieldValue::U1(0x09),
            FieldValue::X1(0),
            FieldValue::X1(0),
            FieldValue::X1(0),
            FieldValue::U4(0),
            FieldValue::U4(0),
        ];
        let payload = pack_fields(&fields).unwrap();
        assert_eq!(NavStatus::decode(&payload), Err(FieldError::InvalidValue));
    }

    #[test]
    fn test_nav_timeutc_decode() {
        let fields = [
            FieldValue::U4(0),
            FieldValue::U4(50),
            FieldValue::I4(-3),
            FieldValue::U2(2024),
            FieldValue::U1(3),
            FieldValue::U1(17),
            FieldValue::U1(12),
            FieldValue::U1(35),
            FieldValue::U1(19),
            FieldValue::X1(0x07),
        ];
        let payload = pack_fields(&fields).unwrap();

        let time = NavTimeUtc::decode(&payload).unwrap();
        assert_eq!(time.year, 2024);
        assert_eq!(time.month, 3);
        assert_eq!(time.second, 19);
    }

    #[test]
    fn test_measurement_rate_round_trip() {
        let rate = MeasurementRate {
            meas_rate_ms: 100,
            nav_rate: 1,
            time_ref: 1,
        };
        let payload = rate.encode_payload().unwrap();
        assert_eq!(MeasurementRate::decode(&payload).unwrap(), rate);
    }
}
