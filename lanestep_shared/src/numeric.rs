//! Forgiving number decoding for persisted state.
//!
//! Any JSON number is accepted and saturated into the field's type; the
//! owning struct's `sanitize` then pulls it into the legal range. A single
//! odd field therefore never rejects the whole document.

use serde::{Deserialize, Deserializer};

use crate::NUM_STEPS;

fn number<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    f64::deserialize(d)
}

pub fn saturating_usize<'de, D: Deserializer<'de>>(d: D) -> Result<usize, D::Error> {
    Ok(number(d)? as usize)
}

pub fn saturating_u32<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    Ok(number(d)? as u32)
}

pub fn saturating_u8<'de, D: Deserializer<'de>>(d: D) -> Result<u8, D::Error> {
    Ok(number(d)? as u8)
}

pub fn saturating_i32<'de, D: Deserializer<'de>>(d: D) -> Result<i32, D::Error> {
    Ok(number(d)? as i32)
}

pub fn saturating_values<'de, D: Deserializer<'de>>(d: D) -> Result<[i32; NUM_STEPS], D::Error> {
    let raw = <[f64; NUM_STEPS]>::deserialize(d)?;
    Ok(raw.map(|v| v as i32))
}

/// Negative coordinates become out of range instead of wrapping to zero.
pub fn grid_index<'de, D: Deserializer<'de>>(d: D) -> Result<usize, D::Error> {
    let v = number(d)?;
    Ok(if v < 0.0 { usize::MAX } else { v as usize })
}
