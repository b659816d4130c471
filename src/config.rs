//! Configuration constants for the sensor bridge firmware

use crate::drivers::serial_console::Level;

/// CPU frequency in Hz
pub const CPU_FREQ_HZ: u32 = 16_000_000;

/// Console UART baud rate
pub const UART_BAUD: u32 = 9600;

/// GNSS module UART baud rate (8N1, no flow control)
pub const GNSS_UART_BAUD: u32 = 115_200;

/// Maximum number of fields in one NMEA sentence
pub const NMEA_MAX_FIELDS: usize = 32;

/// Maximum number of characters in one NMEA field
pub const NMEA_MAX_FIELD_LEN: usize = 20;

/// Serial line buffer size in bytes
pub const LINE_BUFFER_SIZE: usize = NMEA_MAX_FIELDS * NMEA_MAX_FIELD_LEN;

/// Reject sentences whose checksum does not match instead of flagging them
pub const REJECT_BAD_CHECKSUM: bool = cfg!(feature = "strict-checksum");

/// Infrared thermometer 7-bit I2C address
pub const MLX_I2C_ADDR: u8 = 0x3A;

/// Status polls before a measurement wait gives up
pub const MLX_MAX_READ_TRIES: u16 = 100;

/// Delay between two status polls in milliseconds
pub const MLX_POLL_INTERVAL_MS: u16 = 50;

/// Fixed number of object temperature refinement steps
pub const CALIBRATION_ITERATIONS: usize = 5;

/// Object temperature estimate the refinement starts from, in °C
pub const CALIBRATION_SEED_CELSIUS: f64 = 25.0;

/// Emissivity of the measured object
pub const DEFAULT_EMISSIVITY: f64 = 1.0;

/// Lower bound of a physically plausible object temperature, in °C
pub const PLAUSIBLE_MIN_CELSIUS: f64 = -40.0;

/// Upper bound of a physically plausible object temperature, in °C
pub const PLAUSIBLE_MAX_CELSIUS: f64 = 380.0;

/// Console log threshold
#[cfg(feature = "debug")]
pub const LOG_LEVEL: Level = Level::Debug;

/// Console log threshold
#[cfg(not(feature = "debug"))]
pub const LOG_LEVEL: Level = Level::Info;

/// Main loop iterations between two temperature measurements
pub const MEASURE_EVERY_LOOPS: u16 = 1000;
