//! BMA421 accelerometer step counter
//!
//! The step counter runs on the chip's feature engine. The engine needs its
//! configuration uploaded after every power cycle, unless the bootloader
//! already did it. Only the step counter is enabled here.

use core::fmt;

use embedded_hal::{delay::DelayNs, i2c::I2c};

/// I2C address on the PineTime
pub const ADDRESS: u8 = 0x18;

const REG_CHIP_ID: u8 = 0x00;
const REG_STEP_COUNTER_0: u8 = 0x1E;
const REG_INTERNAL_STATUS: u8 = 0x2A;
const REG_INIT_CTRL: u8 = 0x59;
const REG_INIT_ADDR_0: u8 = 0x5B;
const REG_INIT_ADDR_1: u8 = 0x5C;
const REG_FEATURES_IN: u8 = 0x5E;
const REG_PWR_CONF: u8 = 0x7C;
const REG_PWR_CTRL: u8 = 0x7D;

const CHIP_ID_BMA421: u8 = 0x11;
const CHIP_ID_BMA423: u8 = 0x13;

/// Message field of INTERNAL_STATUS
const STATUS_MESSAGE_MASK: u8 = 0x1F;
const STATUS_INIT_OK: u8 = 0x01;

/// Accelerometer enable bit of PWR_CTRL
const ACC_EN: u8 = 0x04;

/// Size of the feature engine settings readable through FEATURES_IN
const FEATURE_SIZE: usize = 0x46;
/// Step counter settings inside the feature area
const STEP_COUNTER_OFFSET: usize = 0x3A;
/// Enable bit, in the second byte of the step counter settings
const STEP_COUNTER_EN: u8 = 0x10;

/// Bytes per config upload transfer, one more goes to the register address
const UPLOAD_CHUNK: usize = 32;

/// Errors of the step counter driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// I2C transfer failed
    Bus(E),
    /// Chip id is neither BMA421 nor BMA423
    UnknownChip(u8),
    /// Feature engine not initialised and no config to upload
    NoFeatureConfig,
    /// Config must be a whole number of 16-bit words
    OddFeatureConfig(usize),
    /// Feature engine rejected the uploaded config
    InitFailed(u8),
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Bus(error) => write!(f, "bus error: {:?}", error),
            Error::UnknownChip(id) => write!(f, "unknown chip id {:#04x}", id),
            Error::NoFeatureConfig => write!(f, "feature engine not initialised"),
            Error::OddFeatureConfig(len) => write!(f, "feature config of {} bytes", len),
            Error::InitFailed(status) => write!(f, "feature engine status {:#04x}", status),
        }
    }
}

pub struct Bma421<I2C> {
    i2c: I2C,
}

impl<I2C> Bma421<I2C>
where
    I2C: I2c,
{
    /// Check the chip, load the feature engine and enable the step counter.
    ///
    /// `feature_config` is the vendor configuration file. It may be empty when
    /// the bootloader leaves the feature engine initialised.
    pub fn init<D: DelayNs>(
        i2c: I2C,
        delay: &mut D,
        feature_config: &[u8],
    ) -> Result<Self, Error<I2C::Error>> {
        let mut sensor = Self { i2c };

        let id = sensor.read_register(REG_CHIP_ID)?;
        if id != CHIP_ID_BMA421 && id != CHIP_ID_BMA423 {
            return Err(Error::UnknownChip(id));
        }

        // Advanced power save blocks access to the feature area
        sensor.write_register(REG_PWR_CONF, 0x00)?;
        delay.delay_us(450);

        if sensor.feature_status()? != STATUS_INIT_OK {
            if feature_config.is_empty() {
                return Err(Error::NoFeatureConfig);
            }
            sensor.upload(feature_config, delay)?;
            let status = sensor.feature_status()?;
            if status != STATUS_INIT_OK {
                return Err(Error::InitFailed(status));
            }
            debug!("BMA421 feature engine loaded");
        }

        sensor.write_register(REG_PWR_CTRL, ACC_EN)?;
        sensor.enable_step_counter()?;
        Ok(sensor)
    }

    /// Cumulative step count since the counter was last reset
    pub fn step_count(&mut self) -> Result<u32, Error<I2C::Error>> {
        let mut buf = [0u8; 4];
        self.i2c
            .write_read(ADDRESS, &[REG_STEP_COUNTER_0], &mut buf)
            .map_err(Error::Bus)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn feature_status(&mut self) -> Result<u8, Error<I2C::Error>> {
        Ok(self.read_register(REG_INTERNAL_STATUS)? & STATUS_MESSAGE_MASK)
    }

    fn upload<D: DelayNs>(&mut self, config: &[u8], delay: &mut D) -> Result<(), Error<I2C::Error>> {
        if config.len() % 2 != 0 {
            return Err(Error::OddFeatureConfig(config.len()));
        }

        self.write_register(REG_INIT_CTRL, 0x00)?;

        let mut buf = [0u8; UPLOAD_CHUNK + 1];
        buf[0] = REG_FEATURES_IN;
        for (index, chunk) in config.chunks(UPLOAD_CHUNK).enumerate() {
            // The engine addresses the config in 16-bit words
            let word = index * UPLOAD_CHUNK / 2;
            self.write_register(REG_INIT_ADDR_0, (word & 0x0F) as u8)?;
            self.write_register(REG_INIT_ADDR_1, (word >> 4) as u8)?;

            buf[1..=chunk.len()].copy_from_slice(chunk);
            self.i2c
                .write(ADDRESS, &buf[..=chunk.len()])
                .map_err(Error::Bus)?;
        }

        self.write_register(REG_INIT_CTRL, 0x01)?;
        delay.delay_ms(150);
        Ok(())
    }

    fn enable_step_counter(&mut self) -> Result<(), Error<I2C::Error>> {
        let mut features = [0u8; FEATURE_SIZE + 1];
        self.i2c
            .write_read(ADDRESS, &[REG_FEATURES_IN], &mut features[1..])
            .map_err(Error::Bus)?;

        features[0] = REG_FEATURES_IN;
        features[1 + STEP_COUNTER_OFFSET + 1] |= STEP_COUNTER_EN;
        self.i2c.write(ADDRESS, &features).map_err(Error::Bus)
    }

    fn read_register(&mut self, register: u8) -> Result<u8, Error<I2C::Error>> {
        let mut value = [0u8; 1];
        self.i2c
            .write_read(ADDRESS, &[register], &mut value)
            .map_err(Error::Bus)?;
        Ok(value[0])
    }

    fn write_register(&mut self, register: u8, value: u8) -> Result<(), Error<I2C::Error>> {
        self.i2c.write(ADDRESS, &[register, value]).map_err(Error::Bus)
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use embedded_hal::i2c::{ErrorKind, ErrorType, Operation};
    use std::vec::Vec;

    /// Register file of a BMA421 on the host
    struct FakeChip {
        registers: [u8; 0x80],
        /// Feature engine memory, written through FEATURES_IN
        config: Vec<u8>,
        /// Feature settings read and written after init
        features: [u8; FEATURE_SIZE],
        /// Status reported once INIT_CTRL is set
        status_after_init: u8,
        /// INIT_CTRL cleared, FEATURES_IN writes go to the config
        loading: bool,
        uploads: usize,
        /// Bus does not answer
        offline: bool,
    }

    impl FakeChip {
        fn new(id: u8) -> Self {
            let mut registers = [0u8; 0x80];
            registers[REG_CHIP_ID as usize] = id;
            Self {
                registers,
                config: Vec::new(),
                features: [0; FEATURE_SIZE],
                status_after_init: STATUS_INIT_OK,
                loading: false,
                uploads: 0,
                offline: false,
            }
        }

        fn initialised(id: u8) -> Self {
            let mut chip = Self::new(id);
            chip.registers[REG_INTERNAL_STATUS as usize] = STATUS_INIT_OK;
            chip
        }

        fn with_steps(mut self, steps: u32) -> Self {
            let at = REG_STEP_COUNTER_0 as usize;
            self.registers[at..at + 4].copy_from_slice(&steps.to_le_bytes());
            self
        }

        fn write(&mut self, bytes: &[u8]) {
            let (&register, data) = bytes.split_first().unwrap();
            match register {
                REG_FEATURES_IN if self.loading => {
                    let word = self.registers[REG_INIT_ADDR_0 as usize] as usize
                        | (self.registers[REG_INIT_ADDR_1 as usize] as usize) << 4;
                    let start = word * 2;
                    if self.config.len() < start + data.len() {
                        self.config.resize(start + data.len(), 0);
                    }
                    self.config[start..start + data.len()].copy_from_slice(data);
                }
                REG_FEATURES_IN => self.features[..data.len()].copy_from_slice(data),
                REG_INIT_CTRL => {
                    self.loading = data[0] == 0x00;
                    if data[0] == 0x01 {
                        self.uploads += 1;
                        self.registers[REG_INTERNAL_STATUS as usize] = self.status_after_init;
                    }
                }
                _ => {
                    let at = register as usize;
                    self.registers[at..at + data.len()].copy_from_slice(data);
                }
            }
        }

        fn read(&self, register: u8, buf: &mut [u8]) {
            if register == REG_FEATURES_IN {
                buf.copy_from_slice(&self.features[..buf.len()]);
            } else {
                let at = register as usize;
                buf.copy_from_slice(&self.registers[at..at + buf.len()]);
            }
        }
    }

    impl ErrorType for FakeChip {
        type Error = ErrorKind;
    }

    impl I2c for FakeChip {
        fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            if self.offline || address != ADDRESS {
                return Err(ErrorKind::Other);
            }
            let mut register = None;
            for operation in operations {
                match operation {
                    Operation::Write(bytes) => {
                        register = bytes.first().copied();
                        if bytes.len() > 1 {
                            self.write(bytes);
                        }
                    }
                    Operation::Read(buf) => FakeChip::read(self, register.ok_or(ErrorKind::Other)?, buf),
                }
            }
            Ok(())
        }
    }

    struct NoDelay;

    impl DelayNs for NoDelay {
        fn delay_ns(&mut self, _ns: u32) {}
    }

    fn config_blob(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn test_uploads_config_on_cold_boot() {
        let blob = config_blob(100);
        let sensor = Bma421::init(FakeChip::new(CHIP_ID_BMA421), &mut NoDelay, &blob).unwrap();
        let chip = sensor.i2c;

        assert_eq!(chip.uploads, 1);
        assert_eq!(chip.config, blob);
        assert_eq!(chip.registers[REG_PWR_CONF as usize], 0x00);
        assert_eq!(chip.registers[REG_PWR_CTRL as usize], ACC_EN);
        assert_eq!(chip.features[STEP_COUNTER_OFFSET + 1], STEP_COUNTER_EN);
    }

    #[test]
    fn test_skips_upload_when_engine_is_running() {
        let mut chip = FakeChip::initialised(CHIP_ID_BMA423);
        chip.features[STEP_COUNTER_OFFSET] = 0x2D;
        chip.features[STEP_COUNTER_OFFSET + 1] = 0x01;

        let sensor = Bma421::init(chip, &mut NoDelay, &[]).unwrap();
        let chip = sensor.i2c;

        assert_eq!(chip.uploads, 0);
        // Other step counter settings are kept
        assert_eq!(chip.features[STEP_COUNTER_OFFSET], 0x2D);
        assert_eq!(chip.features[STEP_COUNTER_OFFSET + 1], 0x11);
    }

    #[test]
    fn test_cold_boot_without_config() {
        let result = Bma421::init(FakeChip::new(CHIP_ID_BMA421), &mut NoDelay, &[]);
        assert_eq!(result.err(), Some(Error::NoFeatureConfig));
    }

    #[test]
    fn test_rejected_config() {
        let mut chip = FakeChip::new(CHIP_ID_BMA421);
        chip.status_after_init = 0x02;
        let result = Bma421::init(chip, &mut NoDelay, &config_blob(64));
        assert_eq!(result.err(), Some(Error::InitFailed(0x02)));

        let result = Bma421::init(FakeChip::new(CHIP_ID_BMA421), &mut NoDelay, &[1, 2, 3]);
        assert_eq!(result.err(), Some(Error::OddFeatureConfig(3)));
    }

    #[test]
    fn test_unknown_chip() {
        let result = Bma421::init(FakeChip::initialised(0x42), &mut NoDelay, &[]);
        assert_eq!(result.err(), Some(Error::UnknownChip(0x42)));
    }

    #[test]
    fn test_reads_step_counter() {
        let chip = FakeChip::initialised(CHIP_ID_BMA421).with_steps(70_123);
        let mut sensor = Bma421::init(chip, &mut NoDelay, &[]).unwrap();
        assert_eq!(sensor.step_count(), Ok(70_123));
    }

    #[test]
    fn test_bus_error() {
        let mut chip = FakeChip::initialised(CHIP_ID_BMA421);
        chip.offline = true;
        let result = Bma421::init(chip, &mut NoDelay, &[]);
        assert_eq!(result.err(), Some(Error::Bus(ErrorKind::Other)));

        let mut sensor = Bma421::init(FakeChip::initialised(CHIP_ID_BMA421), &mut NoDelay, &[])
            .unwrap();
        sensor.i2c.offline = true;
        assert_eq!(sensor.step_count(), Err(Error::Bus(ErrorKind::Other)));
    }
}
