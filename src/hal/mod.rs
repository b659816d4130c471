//! ATmega128 peripherals behind the `embedded-hal` traits used by the drivers

pub mod timer;
pub mod twi;
pub mod uart;

// Re-export commonly used types
pub use timer::{Delay, Prescaler};
pub use twi::{Twi, TwiError, TwiSpeed};
pub use uart::{Uart, UartError};
