//! TWI (I2C) master with `embedded-hal` blocking traits

use avr_device::atmega128a::TWI;
use embedded_hal::blocking::i2c::{Write, WriteRead};

use crate::config::CPU_FREQ_HZ;

// TWCR bits
const TWINT: u8 = 1 << 7;
const TWEA: u8 = 1 << 6;
const TWSTA: u8 = 1 << 5;
const TWSTO: u8 = 1 << 4;
const TWEN: u8 = 1 << 2;

/// Bus clock
#[derive(Clone, Copy)]
pub enum TwiSpeed {
    Standard100k,
    Fast400k,
}

impl TwiSpeed {
    // TWBR with a prescaler of 1
    const fn bit_rate(self) -> u8 {
        let scl = match self {
            TwiSpeed::Standard100k => 100_000,
            TwiSpeed::Fast400k => 400_000,
        };
        ((CPU_FREQ_HZ / scl - 16) / 2) as u8
    }
}

/// TWI status codes
#[derive(Clone, Copy, PartialEq)]
#[repr(u8)]
enum TwiStatus {
    StartTransmitted = 0x08,
    RepStartTransmitted = 0x10,
    AddrWriteAck = 0x18,
    DataWriteAck = 0x28,
    AddrReadAck = 0x40,
    DataReadAck = 0x50,
    DataReadNack = 0x58,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TwiError {
    /// START or repeated START was not transmitted
    Start,
    /// Slave did not acknowledge its address
    AddressNack,
    /// Slave did not acknowledge a data byte
    DataNack,
    /// Unexpected status while receiving
    Read,
}

pub struct Twi {
    twi: TWI,
}

impl Twi {
    pub fn new(twi: TWI, speed: TwiSpeed) -> Self {
        twi.twsr.write(|w| unsafe { w.bits(0) });
        twi.twbr.write(|w| unsafe { w.bits(speed.bit_rate()) });
        twi.twcr.write(|w| unsafe { w.bits(TWEN) });
        Self { twi }
    }

    pub fn release(self) -> TWI {
        self.twi
    }

    fn command(&mut self, bits: u8) -> u8 {
        self.twi.twcr.write(|w| unsafe { w.bits(TWINT | TWEN | bits) });
        while self.twi.twcr.read().bits() & TWINT == 0 {}
        self.twi.twsr.read().bits() & 0xF8
    }

    fn start(&mut self) -> Result<(), TwiError> {
        match self.command(TWSTA) {
            s if s == TwiStatus::StartTransmitted as u8 => Ok(()),
            s if s == TwiStatus::RepStartTransmitted as u8 => Ok(()),
            _ => Err(TwiError::Start),
        }
    }

    fn stop(&mut self) {
        self.twi.twcr.write(|w| unsafe { w.bits(TWINT | TWEN | TWSTO) });
        while self.twi.twcr.read().bits() & TWSTO != 0 {}
    }

    fn write_address(&mut self, addr: u8, read: bool) -> Result<(), TwiError> {
        self.twi.twdr.write(|w| unsafe { w.bits((addr << 1) | read as u8) });
        let expected = if read {
            TwiStatus::AddrReadAck
        } else {
            TwiStatus::AddrWriteAck
        };
        if self.command(0) == expected as u8 {
            Ok(())
        } else {
            Err(TwiError::AddressNack)
        }
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), TwiError> {
        self.twi.twdr.write(|w| unsafe { w.bits(byte) });
        if self.command(0) == TwiStatus::DataWriteAck as u8 {
            Ok(())
        } else {
            Err(TwiError::DataNack)
        }
    }

    // ACK every byte but the last
    fn read_byte(&mut self, ack: bool) -> Result<u8, TwiError> {
        let (bits, expected) = if ack {
            (TWEA, TwiStatus::DataReadAck)
        } else {
            (0, TwiStatus::DataReadNack)
        };
        if self.command(bits) == expected as u8 {
            Ok(self.twi.twdr.read().bits())
        } else {
            Err(TwiError::Read)
        }
    }

    fn transfer(&mut self, address: u8, bytes: &[u8], buffer: &mut [u8]) -> Result<(), TwiError> {
        self.start()?;
        self.write_address(address, false)?;
        for &byte in bytes {
            self.write_byte(byte)?;
        }

        if !buffer.is_empty() {
            self.start()?;
            self.write_address(address, true)?;
            let last = buffer.len() - 1;
            for (i, byte) in buffer.iter_mut().enumerate() {
                *byte = self.read_byte(i != last)?;
            }
        }
        Ok(())
    }
}

impl WriteRead for Twi {
    type Error = TwiError;

    fn write_read(&mut self, address: u8, bytes: &[u8], buffer: &mut [u8]) -> Result<(), TwiError> {
        let result = self.transfer(address, bytes, buffer);
        self.stop();
        result
    }
}

impl Write for Twi {
    type Error = TwiError;

    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), TwiError> {
        let result = self.transfer(address, bytes, &mut []);
        self.stop();
        result
    }
}
