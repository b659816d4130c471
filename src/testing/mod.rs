//! On-target self tests with results printed on the console

use ufmt::uWrite;

use crate::drivers::calibration::{self, Coefficients, RawSample};
use crate::drivers::SerialConsole;
use crate::protocol::{self, MessageType, ParseError};

pub struct TestRunner<W> {
    console: SerialConsole<W>,
    total_tests: u32,
    passed_tests: u32,
    current_suite: &'static str,
}

pub trait TestCase {
    fn run(&self) -> TestResult;
    fn name(&self) -> &'static str;
}

#[derive(Debug, PartialEq)]
pub enum TestResult {
    Pass,
    Fail(TestError),
}

#[derive(Debug, PartialEq)]
pub enum TestError {
    AssertionFailed(&'static str),
    Parse(ParseError),
}

impl From<ParseError> for TestError {
    fn from(error: ParseError) -> Self {
        TestError::Parse(error)
    }
}

impl ufmt::uDisplay for TestError {
    fn fmt<W>(&self, f: &mut ufmt::Formatter<'_, W>) -> Result<(), W::Error>
    where
        W: uWrite + ?Sized,
    {
        match self {
            TestError::AssertionFailed(what) => f.write_str(what),
            TestError::Parse(e) => ufmt::uwrite!(f, "{}", e),
        }
    }
}

impl<W: uWrite> TestRunner<W> {
    pub fn new(console: SerialConsole<W>) -> Self {
        Self {
            console,
            total_tests: 0,
            passed_tests: 0,
            current_suite: "",
        }
    }

    /// Run every case and print a summary; returns true when all passed.
    pub fn run_suite(&mut self, name: &'static str, tests: &[&dyn TestCase]) -> bool {
        self.current_suite = name;
        self.total_tests = 0;
        self.passed_tests = 0;
        let _ = ufmt::uwrite!(self.console, "\r\n=== Test Suite: {} ===\r\n", name);

        for test in tests {
            self.total_tests += 1;
            let _ = ufmt::uwrite!(self.console, "Running {}: ", test.name());

            match test.run() {
                TestResult::Pass => {
                    self.passed_tests += 1;
                    self.console.write_line("PASS");
                }
                TestResult::Fail(err) => {
                    let _ = ufmt::uwrite!(self.console, "FAIL - {}\r\n", err);
                }
            }
        }

        self.print_summary();
        self.passed_tests == self.total_tests
    }

    pub fn passed(&self) -> u32 {
        self.passed_tests
    }

    pub fn total(&self) -> u32 {
        self.total_tests
    }

    pub fn release(self) -> SerialConsole<W> {
        self.console
    }

    fn print_summary(&mut self) {
        let percent = if self.total_tests == 0 {
            100
        } else {
            (self.passed_tests * 100) / self.total_tests
        };

        let _ = ufmt::uwrite!(
            self.console,
            "\r\nTest Summary for {}:\r\nPassed: {}/{} ({}%)\r\n",
            self.current_suite,
            self.passed_tests,
            self.total_tests,
            percent
        );
    }
}

#[doc(hidden)]
pub fn within(value: f64, target: f64, tolerance: f64) -> bool {
    libm::fabs(value - target) <= tolerance
}

#[macro_export]
macro_rules! check_eq {
    ($left:expr, $right:expr) => {
        if $left != $right {
            return $crate::testing::TestResult::Fail($crate::testing::TestError::AssertionFailed(
                concat!(
                    "`",
                    stringify!($left),
                    "` != `",
                    stringify!($right),
                    "`"
                ),
            ));
        }
    };
}

#[macro_export]
macro_rules! check_within {
    ($value:expr, $target:expr, $tolerance:expr) => {
        if !$crate::testing::within($value, $target, $tolerance) {
            return $crate::testing::TestResult::Fail($crate::testing::TestError::AssertionFailed(
                concat!(
                    "`",
                    stringify!($value),
                    "` not within ",
                    stringify!($tolerance),
                    " of `",
                    stringify!($target),
                    "`"
                ),
            ));
        }
    };
}

macro_rules! check_ok {
    ($result:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => return TestResult::Fail(TestError::from(e)),
        }
    };
}

const GGA: &[u8] = b"$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47\r\n";

pub struct GgaSentenceTest;
impl TestCase for GgaSentenceTest {
    fn name(&self) -> &'static str {
        "NMEA GGA sentence"
    }

    fn run(&self) -> TestResult {
        let sentence = check_ok!(protocol::parse(GGA));

        check_eq!(sentence.len(), 15);
        check_eq!(sentence.field(0), Some("GPGGA"));
        check_eq!(sentence.field(9), Some("545.4"));
        check_eq!(sentence.field(14), Some(""));
        check_eq!(sentence.claimed_checksum(), 0x47);
        check_eq!(sentence.checksum_valid(), true);
        check_eq!(sentence.address().message, MessageType::Gga);

        TestResult::Pass
    }
}

pub struct ChecksumSensitivityTest;
impl TestCase for ChecksumSensitivityTest {
    fn name(&self) -> &'static str {
        "NMEA checksum sensitivity"
    }

    fn run(&self) -> TestResult {
        let mut line = [0u8; GGA.len()];
        line.copy_from_slice(GGA);

        // Every content byte between `$` and `*`, low and high bit
        for i in 1..GGA.len() - 5 {
            for mask in [0x01, 0x80] {
                line[i] ^= mask;
                let valid = check_ok!(protocol::parse(&line)).checksum_valid();
                line[i] ^= mask;
                check_eq!(valid, false);
            }
        }

        let valid = check_ok!(protocol::parse(&line)).checksum_valid();
        check_eq!(valid, true);

        TestResult::Pass
    }
}

pub struct CalibrationGoldenTest;
impl TestCase for CalibrationGoldenTest {
    fn name(&self) -> &'static str {
        "Calibration golden vector"
    }

    fn run(&self) -> TestResult {
        let coeffs = Coefficients {
            ea: 4_859_535,
            eb: 5_686_508,
            fa: 53_855_361,
            fb: 42_874_149,
            ga: -14_556_410,
            gb: 9728,
            ha: 16384,
            hb: 0,
            ka: 10752,
        };
        let raw = RawSample {
            ambient_new: 22550,
            ambient_old: 21458,
            object_new: 1204,
            object_old: 1180,
        };

        check_within!(
            calibration::ambient_temperature(&raw, &coeffs),
            63.434934464972855,
            1e-6
        );
        check_within!(
            calibration::compute_object_temperature(&raw, &coeffs),
            73.64614601477194,
            1e-6
        );

        let first = calibration::compute_object_temperature(&raw, &coeffs);
        let second = calibration::compute_object_temperature(&raw, &coeffs);
        check_eq!(first.to_bits(), second.to_bits());

        TestResult::Pass
    }
}

/// Self tests that need no peripherals
pub fn builtin_cases() -> [&'static dyn TestCase; 3] {
    [&GgaSentenceTest, &ChecksumSensitivityTest, &CalibrationGoldenTest]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::Level;
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

    struct AlwaysFails;
    impl TestCase for AlwaysFails {
        fn name(&self) -> &'static str {
            "Always fails"
        }

        fn run(&self) -> TestResult {
            check_eq!(1 + 1, 3);
            TestResult::Pass
        }
    }

    fn runner() -> TestRunner<Capture> {
        let mut console = SerialConsole::new(Capture(String::new()));
        console.set_level(Level::Info);
        TestRunner::new(console)
    }

    #[test]
    fn builtin_cases_pass() {
        let mut runner = runner();
        assert!(runner.run_suite("builtin", &builtin_cases()));
        assert_eq!(runner.passed(), 3);

        let out = runner.release().release().0;
        assert!(out.contains("=== Test Suite: builtin ==="));
        assert!(out.contains("Running NMEA GGA sentence: PASS"));
        assert!(out.contains("Passed: 3/3 (100%)"));
    }

    #[test]
    fn failure_is_reported() {
        let mut runner = runner();
        assert!(!runner.run_suite("mixed", &[&GgaSentenceTest, &AlwaysFails]));
        assert_eq!(runner.total(), 2);
        assert_eq!(runner.passed(), 1);

        let out = runner.release().release().0;
        assert!(out.contains("Running Always fails: FAIL - `1 + 1` != `3`"));
        assert!(out.contains("Passed: 1/2 (50%)"));
    }

    #[test]
    fn parse_errors_fail_the_case() {
        struct Truncated;
        impl TestCase for Truncated {
            fn name(&self) -> &'static str {
                "Truncated"
            }

            fn run(&self) -> TestResult {
                check_ok!(protocol::parse(b"$GPGGA,1"));
                TestResult::Pass
            }
        }

        assert_eq!(
            Truncated.run(),
            TestResult::Fail(TestError::Parse(ParseError::FrameNotFound))
        );
    }
}
