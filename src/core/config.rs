//! Device configuration
//!
//! Statically-typed configuration for the beacon's peripherals. A
//! [`DeviceConfig`] is constructed once at startup (by the application, from
//! whatever source it chooses) and passed by reference into the drivers;
//! there is no ambient global configuration object, and unknown or missing
//! settings are construction-time errors at the call site rather than
//! runtime attribute lookups.

/// Configuration for one UART-attached module
#[derive(Debug, Clone, Copy)]
pub struct UartModuleConfig {
    /// Human-readable module name (for log messages)
    pub name: &'static str,
    /// Platform-specific UART identifier
    pub uart_id: u8,
    /// TX pin number
    pub tx_pin: u8,
    /// RX pin number
    pub rx_pin: u8,
    /// Reset pin number, for modules wired with a hardware reset line
    pub reset_pin: Option<u8>,
    /// Operating baud rate
    pub baud_rate: u32,
}

impl Default for UartModuleConfig {
    fn default() -> Self {
        Self {
            name: "",
            uart_id: 0,
            tx_pin: 0,
            rx_pin: 0,
            reset_pin: None,
            baud_rate: 115200,
        }
    }
}

/// Top-level device configuration
#[derive(Debug, Clone, Copy)]
pub struct DeviceConfig {
    /// Device name reported in telemetry
    pub device_name: &'static str,
    /// Firmware version string
    pub firmware_version: &'static str,
    /// Hardware revision string
    pub hardware_revision: &'static str,
    /// Navigation receiver UART settings
    pub gps: UartModuleConfig,
    /// Cellular modem UART settings
    pub modem: UartModuleConfig,
}
