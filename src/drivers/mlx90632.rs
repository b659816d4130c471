//! MLX90632 infrared thermometer driver
//!
//! Registers are 16-bit addressed and 16-bit wide, both big-endian on the
//! bus. 32-bit calibration constants occupy two consecutive registers, least
//! significant word first.

use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::blocking::i2c::{Write, WriteRead};

use crate::config::{MLX_I2C_ADDR, MLX_MAX_READ_TRIES, MLX_POLL_INTERVAL_MS};
use crate::drivers::calibration::{self, Coefficients, RawSample};

// EEPROM calibration constants, 32-bit
pub const EE_P_R: u16 = 0x240C;
pub const EE_P_G: u16 = 0x240E;
pub const EE_P_T: u16 = 0x2410;
pub const EE_P_O: u16 = 0x2412;
pub const EE_EA: u16 = 0x2424;
pub const EE_EB: u16 = 0x2426;
pub const EE_FA: u16 = 0x2428;
pub const EE_FB: u16 = 0x242A;
pub const EE_GA: u16 = 0x242C;

// EEPROM calibration constants, 16-bit
pub const EE_GB: u16 = 0x242E;
pub const EE_KA: u16 = 0x242F;
pub const EE_HA: u16 = 0x2481;
pub const EE_HB: u16 = 0x2482;

/// I2C address as programmed in EEPROM
pub const EE_I2C_ADDRESS: u16 = 0x24D5;

// Volatile registers
pub const REG_I2C_ADDR: u16 = 0x3000;
pub const REG_CTRL: u16 = 0x3001;
pub const REG_STATUS: u16 = 0x3FFF;

/// Start of the measurement RAM
pub const ADDR_RAM: u16 = 0x4000;

const STATUS_DATA_READY: u16 = 1 << 0;
const STATUS_BROWN_OUT: u16 = 1 << 7;
const STATUS_EEPROM_BUSY: u16 = 1 << 8;
const STATUS_DEVICE_BUSY: u16 = 1 << 9;

/// RAM word of object channel 1 for measurement `meas`
pub const fn ram_1(meas: u16) -> u16 {
    ADDR_RAM + 3 * meas
}

/// RAM word of object channel 2 for measurement `meas`
pub const fn ram_2(meas: u16) -> u16 {
    ADDR_RAM + 3 * meas + 1
}

/// RAM word of the ambient channel for measurement `meas`
pub const fn ram_3(meas: u16) -> u16 {
    ADDR_RAM + 3 * meas + 2
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MlxError<E> {
    /// I2C transfer failed
    Bus(E),
    /// No new data after the maximum number of status polls
    Timeout,
    /// The status register reported a cycle position other than 1 or 2
    InvalidCycle(u8),
}

impl<E> From<E> for MlxError<E> {
    fn from(error: E) -> Self {
        MlxError::Bus(error)
    }
}

impl<E> ufmt::uDisplay for MlxError<E> {
    fn fmt<W>(&self, f: &mut ufmt::Formatter<'_, W>) -> Result<(), W::Error>
    where
        W: ufmt::uWrite + ?Sized,
    {
        match self {
            MlxError::Bus(_) => f.write_str("i2c transfer failed"),
            MlxError::Timeout => f.write_str("measurement timeout"),
            MlxError::InvalidCycle(pos) => ufmt::uwrite!(f, "invalid cycle position {}", pos),
        }
    }
}

/// Content of the status register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Status(pub u16);

impl Status {
    pub fn data_ready(&self) -> bool {
        self.0 & STATUS_DATA_READY != 0
    }

    /// Measurement that was completed last
    pub fn cycle_position(&self) -> u8 {
        ((self.0 >> 2) & 0x1F) as u8
    }

    pub fn brown_out(&self) -> bool {
        self.0 & STATUS_BROWN_OUT != 0
    }

    pub fn eeprom_busy(&self) -> bool {
        self.0 & STATUS_EEPROM_BUSY != 0
    }

    pub fn device_busy(&self) -> bool {
        self.0 & STATUS_DEVICE_BUSY != 0
    }
}

/// One calibrated measurement cycle
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Measurement {
    pub raw: RawSample,
    pub ambient_celsius: f64,
    pub object_celsius: f64,
}

/// MLX90632 driver
pub struct Mlx90632<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C, E> Mlx90632<I2C>
where
    I2C: WriteRead<Error = E> + Write<Error = E>,
{
    /// Create driver on the default address
    pub fn new(i2c: I2C) -> Self {
        Self::with_address(i2c, MLX_I2C_ADDR)
    }

    pub fn with_address(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    /// Give the bus back
    pub fn release(self) -> I2C {
        self.i2c
    }

    /// Read the nine calibration constants from EEPROM
    pub fn read_coefficients(&mut self) -> Result<Coefficients, MlxError<E>> {
        Ok(Coefficients {
            ea: self.read_register32(EE_EA)?,
            eb: self.read_register32(EE_EB)?,
            fa: self.read_register32(EE_FA)?,
            fb: self.read_register32(EE_FB)?,
            ga: self.read_register32(EE_GA)?,
            gb: self.read_register(EE_GB)? as i16,
            ha: self.read_register(EE_HA)? as i16,
            hb: self.read_register(EE_HB)? as i16,
            ka: self.read_register(EE_KA)? as i16,
        })
    }

    pub fn status(&mut self) -> Result<Status, MlxError<E>> {
        self.read_register(REG_STATUS).map(Status)
    }

    /// Poll until a new measurement is available; returns its cycle position.
    pub fn wait_for_data<D>(&mut self, delay: &mut D) -> Result<u8, MlxError<E>>
    where
        D: DelayMs<u16>,
    {
        for _ in 0..MLX_MAX_READ_TRIES {
            let status = self.status()?;
            if status.data_ready() {
                return Ok(status.cycle_position());
            }
            delay.delay_ms(MLX_POLL_INTERVAL_MS);
        }
        Err(MlxError::Timeout)
    }

    /// Acknowledge the current measurement so the next one can be detected
    pub fn clear_data_ready(&mut self) -> Result<(), MlxError<E>> {
        let status = self.status()?;
        self.write_register(REG_STATUS, status.0 & !STATUS_DATA_READY)
    }

    /// Read the raw counts belonging to the measurement at `cycle_position`
    pub fn read_raw_sample(&mut self, cycle_position: u8) -> Result<RawSample, MlxError<E>> {
        let (new, old) = match cycle_position {
            1 => (1, 2),
            2 => (2, 1),
            pos => return Err(MlxError::InvalidCycle(pos)),
        };

        Ok(RawSample {
            ambient_new: self.read_register(ram_3(1))?,
            ambient_old: self.read_register(ram_3(2))?,
            object_new: self.read_object_channels(new)?,
            object_old: self.read_object_channels(old)?,
        })
    }

    /// Run one measurement cycle and calibrate it
    pub fn measure<D>(
        &mut self,
        delay: &mut D,
        coeffs: &Coefficients,
    ) -> Result<Measurement, MlxError<E>>
    where
        D: DelayMs<u16>,
    {
        let cycle = self.wait_for_data(delay)?;
        let raw = self.read_raw_sample(cycle)?;
        self.clear_data_ready()?;

        Ok(Measurement {
            raw,
            ambient_celsius: calibration::ambient_temperature(&raw, coeffs),
            object_celsius: calibration::compute_object_temperature(&raw, coeffs),
        })
    }

    // Average of both object channels of one measurement
    fn read_object_channels(&mut self, meas: u16) -> Result<u16, MlxError<E>> {
        let channel_2 = u32::from(self.read_register(ram_2(meas))?);
        let channel_1 = u32::from(self.read_register(ram_1(meas))?);
        Ok(((channel_2 + channel_1) / 2) as u16)
    }

    /// Read a single register
    pub fn read_register(&mut self, reg: u16) -> Result<u16, MlxError<E>> {
        let mut data = [0u8; 2];
        self.i2c.write_read(self.address, &reg.to_be_bytes(), &mut data)?;
        Ok(u16::from_be_bytes(data))
    }

    /// Read a 32-bit constant spread over `reg` (LSW) and `reg + 1` (MSW)
    pub fn read_register32(&mut self, reg: u16) -> Result<i32, MlxError<E>> {
        let lsw = u32::from(self.read_register(reg)?);
        let msw = u32::from(self.read_register(reg + 1)?);
        Ok((msw << 16 | lsw) as i32)
    }

    /// Write a single register
    pub fn write_register(&mut self, reg: u16, value: u16) -> Result<(), MlxError<E>> {
        let [reg_hi, reg_lo] = reg.to_be_bytes();
        let [val_hi, val_lo] = value.to_be_bytes();
        self.i2c.write(self.address, &[reg_hi, reg_lo, val_hi, val_lo])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal_mock::delay::MockNoop;
    use embedded_hal_mock::i2c::{Mock as I2cMock, Transaction as I2cTransaction};
    use embedded_hal_mock::MockError;
    use std::io::ErrorKind;
    use std::vec::Vec;

    fn word(reg: u16, value: u16) -> I2cTransaction {
        I2cTransaction::write_read(
            MLX_I2C_ADDR,
            reg.to_be_bytes().to_vec(),
            value.to_be_bytes().to_vec(),
        )
    }

    #[test]
    fn reads_coefficients_into_return_value() {
        let expectations = [
            word(EE_EA, 0x268F),
            word(EE_EA + 1, 0x004A),
            word(EE_EB, 0xC4EC),
            word(EE_EB + 1, 0x0056),
            word(EE_FA, 0xC481),
            word(EE_FA + 1, 0x0335),
            word(EE_FB, 0x3525),
            word(EE_FB + 1, 0x028E),
            word(EE_GA, 0xE306),
            word(EE_GA + 1, 0xFF21),
            word(EE_GB, 9728),
            word(EE_HA, 16384),
            word(EE_HB, 0),
            word(EE_KA, 10752),
        ];
        let mut sensor = Mlx90632::new(I2cMock::new(&expectations));

        let coeffs = sensor.read_coefficients().unwrap();
        assert_eq!(
            coeffs,
            Coefficients {
                ea: 4_859_535,
                eb: 5_686_508,
                fa: 53_855_361,
                fb: 42_874_149,
                ga: -14_556_410,
                gb: 9728,
                ha: 16384,
                hb: 0,
                ka: 10752,
            }
        );

        sensor.release().done();
    }

    #[test]
    fn status_bits() {
        let status = Status(0x0009);
        assert!(status.data_ready());
        assert_eq!(status.cycle_position(), 2);
        assert!(!status.brown_out());

        let status = Status(STATUS_BROWN_OUT | STATUS_EEPROM_BUSY | STATUS_DEVICE_BUSY | 0x0004);
        assert!(!status.data_ready());
        assert_eq!(status.cycle_position(), 1);
        assert!(status.brown_out());
        assert!(status.eeprom_busy());
        assert!(status.device_busy());
    }

    #[test]
    fn ram_layout() {
        assert_eq!(ram_1(1), 0x4003);
        assert_eq!(ram_2(1), 0x4004);
        assert_eq!(ram_3(1), 0x4005);
        assert_eq!(ram_3(2), 0x4008);
    }

    #[test]
    fn full_measurement_cycle() {
        let expectations = [
            word(REG_STATUS, 0x0000),
            word(REG_STATUS, 0x0009),
            word(ram_3(1), 22550),
            word(ram_3(2), 21458),
            // cycle position 2: new data sits in measurement 2
            word(ram_2(2), 1200),
            word(ram_1(2), 1208),
            word(ram_2(1), 1170),
            word(ram_1(1), 1190),
            word(REG_STATUS, 0x0009),
            I2cTransaction::write(MLX_I2C_ADDR, vec![0x3F, 0xFF, 0x00, 0x08]),
        ];
        let mut sensor = Mlx90632::new(I2cMock::new(&expectations));
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

        let measurement = sensor.measure(&mut MockNoop::new(), &coeffs).unwrap();
        assert_eq!(
            measurement.raw,
            RawSample {
                ambient_new: 22550,
                ambient_old: 21458,
                object_new: 1204,
                object_old: 1180,
            }
        );
        assert!((measurement.ambient_celsius - 63.434934464972855).abs() < 1e-9);
        assert!((measurement.object_celsius - 73.64614601477194).abs() < 1e-9);

        sensor.release().done();
    }

    #[test]
    fn wait_gives_up_after_max_tries() {
        let expectations: Vec<_> = (0..MLX_MAX_READ_TRIES)
            .map(|_| word(REG_STATUS, 0x0004))
            .collect();
        let mut sensor = Mlx90632::new(I2cMock::new(&expectations));

        assert_eq!(
            sensor.wait_for_data(&mut MockNoop::new()),
            Err(MlxError::Timeout)
        );

        sensor.release().done();
    }

    #[test]
    fn rejects_unknown_cycle_position() {
        let mut sensor = Mlx90632::new(I2cMock::new(&[]));
        assert_eq!(sensor.read_raw_sample(5), Err(MlxError::InvalidCycle(5)));
        sensor.release().done();
    }

    #[test]
    fn bus_error_propagates() {
        let expectations = [word(REG_STATUS, 0).with_error(MockError::Io(ErrorKind::Other))];
        let mut sensor = Mlx90632::new(I2cMock::new(&expectations));

        assert_eq!(
            sensor.status(),
            Err(MlxError::Bus(MockError::Io(ErrorKind::Other)))
        );

        sensor.release().done();
    }

    #[test]
    fn writes_register_big_endian() {
        let expectations = [I2cTransaction::write(0x3B, vec![0x30, 0x01, 0x00, 0x06])];
        let mut sensor = Mlx90632::with_address(I2cMock::new(&expectations), 0x3B);

        sensor.write_register(REG_CTRL, 0x0006).unwrap();

        sensor.release().done();
    }
}
