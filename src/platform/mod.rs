//! Platform abstraction layer
//!
//! This module provides hardware abstraction for different microcontroller
//! platforms. The drivers in [`crate::devices`] are generic over these traits
//! and never touch hardware registers directly; pin muxing and peripheral
//! bring-up belong to the platform implementation.

pub mod error;
pub mod traits;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export commonly used types
pub use error::{PlatformError, Result};
pub use traits::{GpioInterface, TimerInterface, UartInterface};
