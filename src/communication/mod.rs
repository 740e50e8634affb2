//! Communication protocols
//!
//! Protocol engines that turn raw serial byte streams into typed values:
//!
//! - `rx`: timeout-budgeted byte accumulation shared by both session drivers
//! - `ubx`: the navigation receiver's binary frame protocol
//! - `at`: the modem's textual command/response protocol
//! - `nmea`: incremental parsing of plain-text position sentences

pub mod at;
pub mod nmea;
pub mod rx;
pub mod ubx;
