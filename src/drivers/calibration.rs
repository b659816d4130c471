//! Infrared thermometer calibration routines
//!
//! Reconstructs the object temperature from the raw ADC counts of the
//! ambient and object channels and the nine EEPROM calibration constants:
//!
//! 1. ambient and object preprocessing against the ambient reference channel,
//! 2. conversion of the preprocessed ambient value to the die temperature,
//! 3. a fixed number of refinement steps, each feeding the previous object
//!    estimate back into the gain correction before solving the radiative
//!    balance `T_obj^4 = flux + T_amb^4`.
//!
//! All steps are pure and work in double precision.

use libm::sqrt;

use crate::config::{
    CALIBRATION_ITERATIONS, CALIBRATION_SEED_CELSIUS, DEFAULT_EMISSIVITY, PLAUSIBLE_MAX_CELSIUS,
    PLAUSIBLE_MIN_CELSIUS,
};

/// ResCtrlRef of the ambient (channel 3) and object (channels 1, 2) readouts
const REF: f64 = 12.0;
const KELVIN_OFFSET: f64 = 273.15;

const SCALE_2_8: f64 = 256.0;
const SCALE_2_10: f64 = 1024.0;
const SCALE_2_14: f64 = 16384.0;
const SCALE_2_16: f64 = 65536.0;
const SCALE_2_19: f64 = 524288.0;
const SCALE_2_36: f64 = 68719476736.0;
const SCALE_2_46: f64 = 70368744177664.0;

/// Fixed-point calibration constants as stored in the sensor EEPROM
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Coefficients {
    /// Ambient slope, scaled by 2^16
    pub ea: i32,
    /// Ambient offset, scaled by 2^8
    pub eb: i32,
    /// Object sensitivity, scaled by 2^46
    pub fa: i32,
    /// Ambient dependence of the object sensitivity, scaled by 2^36
    pub fb: i32,
    /// Object dependence of the object sensitivity, scaled by 2^36
    pub ga: i32,
    /// Ambient beta, scaled by 2^10
    pub gb: i16,
    /// Customer gain, scaled by 2^14
    pub ha: i16,
    /// Customer offset, scaled by 2^10
    pub hb: i16,
    /// IR beta, scaled by 2^10
    pub ka: i16,
}

/// Raw counts of one measurement cycle
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RawSample {
    pub ambient_new: u16,
    pub ambient_old: u16,
    pub object_new: u16,
    pub object_old: u16,
}

/// Result outside the plausible object range
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationRangeWarning {
    pub celsius: f64,
}

impl ufmt::uDisplay for CalibrationRangeWarning {
    fn fmt<W>(&self, f: &mut ufmt::Formatter<'_, W>) -> Result<(), W::Error>
    where
        W: ufmt::uWrite + ?Sized,
    {
        if !self.celsius.is_finite() {
            return f.write_str("object temperature not finite");
        }
        // ufmt has no float support, whole degrees are enough here
        ufmt::uwrite!(f, "object temperature out of range: {} C", self.celsius as i32)
    }
}

/// Ambient preprocessing (`precompAmbient`)
pub fn preprocess_ambient(raw: &RawSample, gb: i16) -> f64 {
    let kgb = f64::from(gb) / SCALE_2_10;
    let ambient_new = f64::from(raw.ambient_new) / REF;
    let vr_ta = f64::from(raw.ambient_old) + kgb * ambient_new;

    ambient_new / vr_ta * SCALE_2_19
}

/// Object preprocessing (`precompObject`)
pub fn preprocess_object(raw: &RawSample, ka: i16) -> f64 {
    let kka = f64::from(ka) / SCALE_2_10;
    let vr_ir = f64::from(raw.ambient_old) + kka * (f64::from(raw.ambient_new) / REF);
    let object = (f64::from(raw.object_new) + f64::from(raw.object_old)) / 2.0;

    object / REF / vr_ir * SCALE_2_19
}

/// Die temperature `TAdut` in °C from the preprocessed ambient value
pub fn ambient_celsius(precomp_ambient: f64, ea: i32, eb: i32) -> f64 {
    let kea = f64::from(ea) / SCALE_2_16;
    let keb = f64::from(eb) / SCALE_2_8;

    (precomp_ambient - keb) / kea + 25.0
}

/// One refinement step of the object temperature.
///
/// `previous` is the estimate of the step before, in °C.
pub fn object_iteration(
    previous: f64,
    precomp_object: f64,
    ta_dut: f64,
    coeffs: &Coefficients,
    emissivity: f64,
) -> f64 {
    let ha_customer = f64::from(coeffs.ha) / SCALE_2_14;
    let hb_customer = f64::from(coeffs.hb) / SCALE_2_10;

    let calced_ga = f64::from(coeffs.ga) * (previous - 25.0) / SCALE_2_36;
    let calced_gb = f64::from(coeffs.fb) * (ta_dut - 25.0) / SCALE_2_36;
    let alpha_corr = f64::from(coeffs.fa) * ha_customer * (1.0 + calced_ga + calced_gb) / SCALE_2_46;
    let flux = precomp_object / (emissivity * alpha_corr);

    let ta_kelvin = ta_dut + KELVIN_OFFSET;
    let ta4 = ta_kelvin * ta_kelvin * ta_kelvin * ta_kelvin;

    sqrt(sqrt(flux + ta4)) - KELVIN_OFFSET - hb_customer
}

/// Die temperature in °C of one measurement cycle
pub fn ambient_temperature(raw: &RawSample, coeffs: &Coefficients) -> f64 {
    ambient_celsius(preprocess_ambient(raw, coeffs.gb), coeffs.ea, coeffs.eb)
}

/// Object temperature in °C with unit emissivity
pub fn compute_object_temperature(raw: &RawSample, coeffs: &Coefficients) -> f64 {
    compute_object_temperature_with_emissivity(raw, coeffs, DEFAULT_EMISSIVITY)
}

pub fn compute_object_temperature_with_emissivity(
    raw: &RawSample,
    coeffs: &Coefficients,
    emissivity: f64,
) -> f64 {
    let ta_dut = ambient_temperature(raw, coeffs);
    let precomp_object = preprocess_object(raw, coeffs.ka);

    (0..CALIBRATION_ITERATIONS).fold(CALIBRATION_SEED_CELSIUS, |previous, _| {
        object_iteration(previous, precomp_object, ta_dut, coeffs, emissivity)
    })
}

/// Like [`compute_object_temperature`], but flags implausible results
/// (including NaN) instead of passing them on silently.
pub fn checked_object_temperature(
    raw: &RawSample,
    coeffs: &Coefficients,
) -> Result<f64, CalibrationRangeWarning> {
    check_range(compute_object_temperature(raw, coeffs))
}

pub fn check_range(celsius: f64) -> Result<f64, CalibrationRangeWarning> {
    if (PLAUSIBLE_MIN_CELSIUS..=PLAUSIBLE_MAX_CELSIUS).contains(&celsius) {
        Ok(celsius)
    } else {
        Err(CalibrationRangeWarning { celsius })
    }
}
