//! Core trait definitions

pub mod sync;

pub use sync::SharedState;
