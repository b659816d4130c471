//! Sensor bridge: NMEA 0183 sentence parsing for a GNSS receiver and
//! calibrated readings of an MLX90632 infrared thermometer.
#![cfg_attr(not(test), no_std)]
#![cfg_attr(feature = "atmega128", feature(abi_avr_interrupt))]

pub mod config;
pub mod drivers;
pub mod protocol;
pub mod testing;

#[cfg(feature = "atmega128")]
pub mod hal;
