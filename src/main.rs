#![no_std]
#![no_main]
#![feature(abi_avr_interrupt)]

use panic_halt as _;

use avr_device::atmega128a::Peripherals;
use embedded_hal::serial::Write;
use sensor_bridge::config::{GNSS_UART_BAUD, MEASURE_EVERY_LOOPS, UART_BAUD};
use sensor_bridge::drivers::calibration::{self, Coefficients};
use sensor_bridge::drivers::{GnssReceiver, Level, Mlx90632, SerialConsole};
use sensor_bridge::hal::{Delay, Twi, TwiSpeed, Uart};
use sensor_bridge::protocol;
use sensor_bridge::testing::{self, TestRunner};

// Enable GGA and RMC output on the receiver
const GNSS_SETUP: [&str; 8] = ["PQCFGNMEAMSG", "1", "0", "0", "0", "0", "1", "0"];

fn halt() -> ! {
    loop {
        avr_device::asm::sleep();
    }
}

#[avr_device::entry]
fn main() -> ! {
    let Some(dp) = Peripherals::take() else {
        halt()
    };

    let mut console = SerialConsole::new(Uart::new(dp.USART0, UART_BAUD));
    let mut gnss_uart = Uart::new(dp.USART1, GNSS_UART_BAUD);
    let mut delay = Delay::new(dp.TC0);
    let mut thermometer = Mlx90632::new(Twi::new(dp.TWI, TwiSpeed::Fast400k));

    // Enable interrupts globally
    unsafe { avr_device::interrupt::enable() };

    console.write_line("Sensor bridge v0.1.0");

    let mut runner = TestRunner::new(console);
    let passed = runner.run_suite("self test", &testing::builtin_cases());
    let mut console = runner.release();
    if !passed {
        console.error("self test failed");
    }

    let mut command = [0u8; 64];
    match protocol::encode(&GNSS_SETUP, &mut command) {
        Ok(bytes) => {
            for &byte in bytes {
                let _ = nb::block!(gnss_uart.write(byte));
            }
        }
        Err(e) => console.report(Level::Error, "gnss setup", &e),
    }
    let mut gnss = GnssReceiver::new(gnss_uart);

    let coeffs: Option<Coefficients> = match thermometer.read_coefficients() {
        Ok(coeffs) => {
            console.info("thermometer ready");
            Some(coeffs)
        }
        Err(e) => {
            console.report(Level::Error, "thermometer", &e);
            None
        }
    };

    let mut loops = 0u16;

    loop {
        match gnss.poll() {
            Ok(sentence) => {
                if !sentence.checksum_valid() {
                    console.debug("bad checksum", sentence.claimed_checksum());
                }
                match sentence.address().config_ack() {
                    Some(true) => console.info("gnss configured"),
                    Some(false) => console.warn("gnss rejected configuration"),
                    None => console.debug("fields", sentence.len() as u8),
                }
            }
            Err(nb::Error::WouldBlock) => {}
            Err(nb::Error::Other(e)) => console.report(Level::Warn, "gnss", &e),
        }

        loops = loops.wrapping_add(1);
        if loops < MEASURE_EVERY_LOOPS {
            continue;
        }
        loops = 0;

        let Some(coeffs) = coeffs.as_ref() else {
            continue;
        };
        match thermometer.measure(&mut delay, coeffs) {
            Ok(m) => {
                if console.begin(Level::Info) {
                    console.write_str("ambient ");
                    console.write_fixed(m.ambient_celsius, 2);
                    console.write_str(" C, object ");
                    console.write_fixed(m.object_celsius, 2);
                    console.write_line(" C");
                }
                if let Err(w) = calibration::check_range(m.object_celsius) {
                    console.report(Level::Warn, "thermometer", &w);
                }
            }
            Err(e) => console.report(Level::Error, "thermometer", &e),
        }
    }
}
