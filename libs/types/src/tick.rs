//! Tick/price codec
//!
//! Valid prices form a discrete, totally ordered set indexed by an `i32`
//! tick. Within the decade `[10^e, 10^(e+1))` prices step linearly by
//! `10^e / TICK_STEPS`, so adjacent ticks differ by a relative step of at
//! most `1/TICK_STEPS`. Every valid price therefore has at most three
//! significant digits, and the round-trip law
//! `tick_at_price(price_at_tick(t)) == t` holds for every tick in range.
//!
//! The module also provides a fixed-width, order-preserving byte encoding of
//! prices used as the price component of order-book storage keys:
//! `p1 < p2` implies `price_to_bytes(p1) < price_to_bytes(p2)`
//! lexicographically.

use crate::errors::{ExchangeError, Result};
use crate::numeric::Price;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Linear steps per power of ten; yields a price step of 0.01 in `[1, 10)`
pub const TICK_STEPS: i32 = 100;

/// Number of ticks in one decade: `9 * TICK_STEPS`
pub const TICKS_PER_DECADE: i32 = 9 * TICK_STEPS;

/// Exponent of the lowest representable price (`10^-14`)
pub const MIN_PRICE_EXPONENT: i32 = -14;

/// Exponent of the highest representable price (`10^24`)
///
/// The decimal backend carries 28 significant digits, so the upper bound is
/// chosen to keep price*quantity products exactly representable.
pub const MAX_PRICE_EXPONENT: i32 = 24;

/// Lowest valid tick (price `10^-14`)
pub const MIN_TICK: i32 = MIN_PRICE_EXPONENT * TICKS_PER_DECADE;

/// Highest valid tick (price `10^24`)
pub const MAX_TICK: i32 = MAX_PRICE_EXPONENT * TICKS_PER_DECADE;

/// Width of the byte encoding produced by [`price_to_bytes`]
pub const PRICE_BYTES_LEN: usize = 32;

const EXP_BIAS: i32 = 0x4000;

/// Lowest valid price
pub fn min_price() -> Price {
    price_at_tick(MIN_TICK).expect("min tick is valid")
}

/// Highest valid price
pub fn max_price() -> Price {
    price_at_tick(MAX_TICK).expect("max tick is valid")
}

/// The exact price at `tick`
pub fn price_at_tick(tick: i32) -> Result<Price> {
    if !(MIN_TICK..=MAX_TICK).contains(&tick) {
        return Err(ExchangeError::invalid_request(format!(
            "tick out of range: {tick}"
        )));
    }
    let e = tick.div_euclid(TICKS_PER_DECADE);
    let r = tick.rem_euclid(TICKS_PER_DECADE);
    // price = (TICK_STEPS + r) * 10^(e-2); the mantissa is 100..=999
    let mantissa = (TICK_STEPS + r) as i128;
    let exp = e - 2;
    let value = if exp >= 0 {
        Decimal::try_from_i128_with_scale(mantissa * 10i128.pow(exp as u32), 0)
    } else {
        Decimal::try_from_i128_with_scale(mantissa, (-exp) as u32)
    }
    .map_err(|err| ExchangeError::internal(format!("tick {tick} not representable: {err}")))?;
    Price::try_new(value)
}

/// The tick whose price is exactly `price`, or `InvalidTickPrice`
pub fn tick_at_price(price: Price) -> Result<i32> {
    let (tick, valid) = validate_tick_price(price);
    if valid {
        Ok(tick)
    } else {
        Err(ExchangeError::InvalidTickPrice(price.to_string()))
    }
}

/// Validate that `price` lies exactly on a tick boundary
///
/// Returns `(tick, true)` when exact; `(floor_tick, false)` when the price
/// falls between ticks or outside the price bounds.
pub fn validate_tick_price(price: Price) -> (i32, bool) {
    let value = price.as_decimal();
    if value < min_price().as_decimal() || value > max_price().as_decimal() {
        return (tick_floor_clamped(value), false);
    }
    let (mantissa, digits, e) = canonical_parts(value);
    if digits > 3 {
        return (tick_floor_clamped(value), false);
    }
    let m3 = mantissa * pow10_u128(3 - digits);
    let r = (m3 - TICK_STEPS as u128) as i32;
    (e * TICKS_PER_DECADE + r, true)
}

/// The valid tick nearest to `value`, clamped to the tick range
///
/// When `value` falls exactly between two ticks the lower tick is chosen.
pub fn nearest_tick(value: Decimal) -> i32 {
    if value <= min_price().as_decimal() {
        return MIN_TICK;
    }
    if value >= max_price().as_decimal() {
        return MAX_TICK;
    }
    let lower = tick_floor_clamped(value);
    let lower_price = price_at_tick(lower).expect("floor tick is in range");
    if lower_price.as_decimal() == value || lower == MAX_TICK {
        return lower;
    }
    let upper_price = price_at_tick(lower + 1).expect("tick above floor is in range");
    let down = value - lower_price.as_decimal();
    let up = upper_price.as_decimal() - value;
    if up < down {
        lower + 1
    } else {
        lower
    }
}

/// Fixed-width, order-preserving byte encoding of a price
///
/// Layout: `[0x01 | biased msd-exponent (2 bytes BE) | mantissa normalized
/// to 29 digits (16 bytes BE) | zero padding]`. Positive values only; byte
/// order equals numeric order because the exponent field dominates and the
/// mantissa is left-aligned to a fixed digit count.
pub fn price_to_bytes(price: Price) -> [u8; PRICE_BYTES_LEN] {
    let (mantissa, digits, e) = canonical_parts(price.as_decimal());
    let m29 = mantissa * pow10_u128(29 - digits);
    let mut buf = [0u8; PRICE_BYTES_LEN];
    buf[0] = 0x01;
    buf[1..3].copy_from_slice(&((e + EXP_BIAS) as u16).to_be_bytes());
    buf[3..19].copy_from_slice(&m29.to_be_bytes());
    buf
}

/// Decode a price previously encoded with [`price_to_bytes`]
pub fn bytes_to_price(bytes: &[u8]) -> Result<Price> {
    if bytes.len() != PRICE_BYTES_LEN || bytes[0] != 0x01 {
        return Err(ExchangeError::internal(format!(
            "malformed price key: {} bytes",
            bytes.len()
        )));
    }
    let e = u16::from_be_bytes([bytes[1], bytes[2]]) as i32 - EXP_BIAS;
    let mut m29 = [0u8; 16];
    m29.copy_from_slice(&bytes[3..19]);
    let m29 = u128::from_be_bytes(m29);
    if m29 == 0 {
        return Err(ExchangeError::internal("zero mantissa in price key".to_string()));
    }
    let (mut mantissa, _) = strip_tens(m29);
    let digits = digit_count(mantissa) as i32;
    let mut scale = digits - 1 - e;
    if scale < 0 {
        mantissa *= pow10_u128((-scale) as u32);
        scale = 0;
    }
    if scale > 28 {
        return Err(ExchangeError::internal(format!(
            "price key scale out of range: {scale}"
        )));
    }
    let value = Decimal::try_from_i128_with_scale(mantissa as i128, scale as u32)
        .map_err(|err| ExchangeError::internal(format!("price key decode: {err}")))?;
    Price::try_new(value)
}

/// Largest tick at or below `value`, clamped into the valid range
fn tick_floor_clamped(value: Decimal) -> i32 {
    if value <= min_price().as_decimal() {
        return MIN_TICK;
    }
    if value >= max_price().as_decimal() {
        return MAX_TICK;
    }
    let (_, _, e) = canonical_parts(value);
    let base = dec_pow10(e);
    let step = dec_pow10(e - 2);
    // Dividing by a power of ten is exact scaling, so the quotient is exact.
    let r = ((value - base) / step)
        .floor()
        .to_i32()
        .expect("tick offset fits in i32");
    e * TICKS_PER_DECADE + r.min(TICKS_PER_DECADE - 1)
}

/// Decompose a positive decimal into (stripped mantissa, digit count,
/// most-significant-digit exponent): `value = mantissa * 10^(e - digits + 1)`
fn canonical_parts(value: Decimal) -> (u128, u32, i32) {
    debug_assert!(value > Decimal::ZERO);
    let normalized = value.normalize();
    let (mantissa, stripped) = strip_tens(normalized.mantissa().unsigned_abs());
    let digits = digit_count(mantissa);
    let e = digits as i32 - 1 + stripped as i32 - normalized.scale() as i32;
    (mantissa, digits, e)
}

fn digit_count(mut value: u128) -> u32 {
    let mut digits = 1;
    while value >= 10 {
        value /= 10;
        digits += 1;
    }
    digits
}

fn strip_tens(mut value: u128) -> (u128, u32) {
    debug_assert!(value > 0);
    let mut stripped = 0;
    while value % 10 == 0 {
        value /= 10;
        stripped += 1;
    }
    (value, stripped)
}

fn pow10_u128(exp: u32) -> u128 {
    10u128.pow(exp)
}

fn dec_pow10(exp: i32) -> Decimal {
    if exp >= 0 {
        Decimal::from_i128_with_scale(10i128.pow(exp as u32), 0)
    } else {
        Decimal::from_i128_with_scale(1, (-exp) as u32)
    }
}
