#![cfg_attr(not(test), no_std)]

//! pico_beacon - GPS + cellular position-reporting drivers
//!
//! This library provides the protocol engines and device drivers that link a
//! microcontroller to a u-blox NEO-6M navigation receiver (UBX binary
//! protocol + NMEA sentence stream) and a SIM800L cellular modem (AT
//! command/response protocol), so a beacon can report its position over the
//! internet.
//!
//! Hardware access goes through the traits in [`platform`]; the protocol
//! codecs live in [`communication`]; the stateful session drivers live in
//! [`devices`].

// Platform abstraction layer (UART, timer, GPIO traits + host mocks)
pub mod platform;

// Cross-cutting services: logging macros, device configuration, the shared
// position snapshot
pub mod core;

// Protocol engines: byte-stream accumulation, UBX frame codec, AT command
// codec, incremental NMEA parser
pub mod communication;

// Device drivers built on the protocol engines
pub mod devices;
