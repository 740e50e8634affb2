//! Core systems
//!
//! Cross-cutting services shared by the device drivers:
//!
//! - `logging`: leveled log macros (defmt on target, println in host tests)
//! - `config`: statically-typed device configuration
//! - `position`: the decoded position snapshot exchanged between tasks
//! - `traits`: synchronization abstractions for sharing that snapshot

pub mod config;
pub mod logging;
pub mod position;
pub mod traits;
