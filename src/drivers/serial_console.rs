use ufmt::{uDisplay, uWrite};

use crate::config::LOG_LEVEL;

/// Message severity, most severe first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Level {
    Error,
    Warn,
    Info,
    Debug,
}

impl Level {
    fn prefix(self) -> &'static str {
        match self {
            Level::Error => "[ERR] ",
            Level::Warn => "[WRN] ",
            Level::Info => "[INF] ",
            Level::Debug => "[DBG] ",
        }
    }
}

const HEX_CHARS: [u8; 16] = *b"0123456789ABCDEF";

/// Line-oriented text console on top of any `uWrite` sink.
///
/// Write errors of the sink are dropped: logging must never take the
/// firmware down.
pub struct SerialConsole<W> {
    out: W,
    level: Level,
}

impl<W: uWrite> SerialConsole<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            level: LOG_LEVEL,
        }
    }

    pub fn set_level(&mut self, level: Level) {
        self.level = level;
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn enabled(&self, level: Level) -> bool {
        level <= self.level
    }

    pub fn release(self) -> W {
        self.out
    }

    pub fn write_str(&mut self, s: &str) {
        let _ = self.out.write_str(s);
    }

    pub fn write_line(&mut self, s: &str) {
        self.write_str(s);
        self.write_str("\r\n");
    }

    pub fn write_byte(&mut self, byte: u8) {
        let _ = self.out.write_char(byte as char);
    }

    // Debug helper - print hex value
    pub fn write_hex(&mut self, val: u8) {
        self.write_byte(HEX_CHARS[(val >> 4) as usize]);
        self.write_byte(HEX_CHARS[(val & 0xF) as usize]);
    }

    /// Print `value` with a fixed number of decimals, e.g. `-3.25`.
    ///
    /// Rounds half away from zero. Non-finite values print as `nan` or `inf`.
    pub fn write_fixed(&mut self, value: f64, decimals: u8) {
        if value.is_nan() {
            return self.write_str("nan");
        }
        if value.is_infinite() {
            return self.write_str(if value < 0.0 { "-inf" } else { "inf" });
        }

        let scale = libm::pow(10.0, f64::from(decimals));
        let scaled = libm::round(libm::fabs(value) * scale);
        if value < 0.0 && scaled > 0.0 {
            self.write_byte(b'-');
        }

        let whole = libm::floor(scaled / scale);
        let frac = scaled - whole * scale;
        let _ = ufmt::uwrite!(self.out, "{}", whole as u64);

        if decimals > 0 {
            self.write_byte(b'.');
            let mut digits = [b'0'; 20];
            let len = usize::from(decimals).min(digits.len());
            let mut rest = frac as u64;
            for digit in digits[..len].iter_mut().rev() {
                *digit = b'0' + (rest % 10) as u8;
                rest /= 10;
            }
            for &digit in &digits[..len] {
                self.write_byte(digit);
            }
        }
    }

    // Print formatted debug info
    pub fn debug(&mut self, msg: &str, val: u8) {
        if !self.enabled(Level::Debug) {
            return;
        }
        self.write_str(Level::Debug.prefix());
        self.write_str(msg);
        self.write_str(": 0x");
        self.write_hex(val);
        self.write_str("\r\n");
    }

    /// Start a log line; returns false when `level` is filtered out and
    /// nothing was written.
    pub fn begin(&mut self, level: Level) -> bool {
        if !self.enabled(level) {
            return false;
        }
        self.write_str(level.prefix());
        true
    }

    pub fn log(&mut self, level: Level, msg: &str) {
        if self.begin(level) {
            self.write_line(msg);
        }
    }

    pub fn error(&mut self, msg: &str) {
        self.log(Level::Error, msg);
    }

    pub fn warn(&mut self, msg: &str) {
        self.log(Level::Warn, msg);
    }

    pub fn info(&mut self, msg: &str) {
        self.log(Level::Info, msg);
    }

    pub fn trace(&mut self, msg: &str) {
        self.log(Level::Debug, msg);
    }

    /// Log `msg: <value>` using the value's `uDisplay` impl
    pub fn report<T: uDisplay + ?Sized>(&mut self, level: Level, msg: &str, value: &T) {
        if self.begin(level) {
            self.write_str(msg);
            self.write_str(": ");
            let _ = ufmt::uwrite!(self.out, "{}", value);
            self.write_str("\r\n");
        }
    }
}

impl<W: uWrite> uWrite for SerialConsole<W> {
    type Error = W::Error;

    fn write_str(&mut self, s: &str) -> Result<(), Self::Error> {
        self.out.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::{CalibrationRangeWarning, GnssError, MlxError};
    use crate::protocol::{LineError, ParseError};
    use std::convert::Infallible;
    use std::string::String;

    struct Capture(String);

    impl uWrite for Capture {
        type Error = Infallible;

        fn write_str(&mut self, s: &str) -> Result<(), Infallible> {
            self.0.push_str(s);
            Ok(())
        }
    }

    fn console() -> SerialConsole<Capture> {
        let mut console = SerialConsole::new(Capture(String::new()));
        console.set_level(Level::Debug);
        console
    }

    fn fixed(value: f64, decimals: u8) -> String {
        let mut console = console();
        console.write_fixed(value, decimals);
        console.release().0
    }

    #[test]
    fn hex_and_debug_lines() {
        let mut console = console();
        console.write_hex(0x3A);
        console.debug("addr", 0x0F);
        assert_eq!(console.release().0, "3A[DBG] addr: 0x0F\r\n");
    }

    #[test]
    fn level_filter() {
        let mut console = console();
        console.set_level(Level::Warn);
        console.info("hidden");
        console.trace("hidden");
        console.debug("hidden", 1);
        console.warn("no fix");
        console.error("bus");
        assert_eq!(console.release().0, "[WRN] no fix\r\n[ERR] bus\r\n");
    }

    #[test]
    fn reports_errors_with_display() {
        let mut console = console();
        console.report(Level::Warn, "gnss", &ParseError::FrameNotFound);
        assert_eq!(
            console.release().0,
            "[WRN] gnss: NMEA message was not found\r\n"
        );
    }

    fn render<T: uDisplay>(value: &T) -> String {
        let mut console = console();
        console.report(Level::Error, "e", value);
        console.release().0
    }

    #[test]
    fn driver_errors_render() {
        assert_eq!(
            render(&GnssError::<()>::Line(LineError::Serial(()))),
            "[ERR] e: serial read failed\r\n"
        );
        assert_eq!(
            render(&GnssError::<()>::Line(LineError::BufferOverflow)),
            "[ERR] e: line too long\r\n"
        );
        assert_eq!(
            render(&GnssError::<()>::Parse(ParseError::ChecksumMismatch {
                claimed: 0x5C,
                computed: 0x5B,
            })),
            "[ERR] e: checksum mismatch (claimed 92, computed 91)\r\n"
        );

        assert_eq!(render(&MlxError::Bus(())), "[ERR] e: i2c transfer failed\r\n");
        assert_eq!(render(&MlxError::<()>::Timeout), "[ERR] e: measurement timeout\r\n");
        assert_eq!(
            render(&MlxError::<()>::InvalidCycle(5)),
            "[ERR] e: invalid cycle position 5\r\n"
        );

        assert_eq!(
            render(&CalibrationRangeWarning { celsius: 43715.7 }),
            "[ERR] e: object temperature out of range: 43715 C\r\n"
        );
        assert_eq!(
            render(&CalibrationRangeWarning { celsius: f64::NAN }),
            "[ERR] e: object temperature not finite\r\n"
        );
    }

    #[test]
    fn fixed_point_output() {
        assert_eq!(fixed(73.64614601477194, 2), "73.65");
        assert_eq!(fixed(-3.25, 1), "-3.3");
        assert_eq!(fixed(0.004, 2), "0.00");
        assert_eq!(fixed(-0.004, 2), "0.00");
        assert_eq!(fixed(25.0, 0), "25");
        assert_eq!(fixed(9.996, 2), "10.00");
        assert_eq!(fixed(1.05, 3), "1.050");
        assert_eq!(fixed(f64::NAN, 2), "nan");
        assert_eq!(fixed(f64::NEG_INFINITY, 2), "-inf");
    }
}
