//! Device drivers
//!
//! Stateful session drivers built on the protocol engines in
//! [`crate::communication`], generic over the platform traits:
//!
//! - `gps`: u-blox NEO-6M navigation receiver (UBX request/response)
//! - `modem`: SIM800L cellular modem (AT command/response, bearer, HTTP,
//!   TCP/UDP)

pub mod gps;
pub mod modem;
