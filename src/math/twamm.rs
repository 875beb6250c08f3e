//
// Copyright (c) the twamm-core contributors
//
// Licensed under the MIT license.
// See the LICENSE file in the project root for license information.
//

//! Closed-form price evolution for two opposing virtual flows.
//!
//! When both directions stream simultaneously against constant-product
//! liquidity, the sqrt price follows a known closed form that converges to
//! the equilibrium `sqrt(rate_b / rate_a)`. The transcendental part runs in
//! `f64` via `libm`; the integer endpoints it produces are what the
//! conservation math in [`flow_earnings`] is anchored to, so float error
//! never leaks into token accounting.

use ethnum::U256;

use crate::{
    try_get_amount_delta_a, try_get_amount_delta_b, TwammError, MAX_SQRT_PRICE, MIN_SQRT_PRICE,
    Q64, Q64_RESOLUTION,
};

// Beyond this exponent e^pow has fully converged in f64 terms.
const POW_CONVERGED: f64 = 80.0;

fn to_float_price(sqrt_price: u128) -> f64 {
    sqrt_price as f64 / Q64 as f64
}

fn from_float_price(value: f64) -> Result<u128, TwammError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(TwammError::PriceSolutionFailed);
    }
    let raw = (value * Q64 as f64) as u128;
    Ok(raw.clamp(MIN_SQRT_PRICE, MAX_SQRT_PRICE))
}

/// Total amount sold by a flow of `sell_rate` tokens per second over
/// `dt_x64` Q64.64 seconds, rounded down.
pub fn sold_amount(sell_rate: u128, dt_x64: u128) -> Result<u128, TwammError> {
    let product = (U256::from(sell_rate) * U256::from(dt_x64)) >> Q64_RESOLUTION;
    let (hi, lo) = product.into_words();
    if hi != 0 {
        return Err(TwammError::ArithmeticOverflow);
    }
    Ok(lo)
}

/// Token amounts produced by a stretch of simultaneous virtual execution:
/// `earned_b` is owed to the a-to-b selling pool, `earned_a` to the b-to-a
/// selling pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowEarnings {
    pub earned_a: u128,
    pub earned_b: u128,
}

/// The sqrt price after `dt_x64` seconds (Q64.64) of two opposing flows
/// streaming against the given liquidity.
///
/// Requires both rates and the liquidity to be nonzero; single-sided and
/// zero-liquidity stretches take the swap-step path instead.
pub fn next_sqrt_price_from_flows(
    sqrt_price: u128,
    liquidity: u128,
    sell_rate_a: u128,
    sell_rate_b: u128,
    dt_x64: u128,
) -> Result<u128, TwammError> {
    if liquidity == 0 || sell_rate_a == 0 || sell_rate_b == 0 {
        return Err(TwammError::PriceSolutionFailed);
    }
    if dt_x64 == 0 {
        return Ok(sqrt_price);
    }
    let rate_a = sell_rate_a as f64;
    let rate_b = sell_rate_b as f64;
    let seconds = dt_x64 as f64 / Q64 as f64;
    let price = to_float_price(sqrt_price);

    let eq_price = libm::sqrt(rate_b / rate_a);
    let pow = 2.0 * libm::sqrt(rate_a * rate_b) * seconds / liquidity as f64;
    if !pow.is_finite() || pow >= POW_CONVERGED {
        return from_float_price(eq_price);
    }
    let c = (eq_price - price) / (eq_price + price);
    let exp_pow = libm::exp(pow);
    from_float_price(eq_price * (exp_pow - c) / (exp_pow + c))
}

/// How long two opposing flows take to carry the sqrt price from `sqrt_price`
/// to `target_sqrt_price`, in Q64.64 seconds, rounded up.
///
/// Fails when the target is not between the current price and the flow
/// equilibrium, since the closed form never reaches such a price.
pub fn seconds_until_price(
    sqrt_price: u128,
    target_sqrt_price: u128,
    liquidity: u128,
    sell_rate_a: u128,
    sell_rate_b: u128,
) -> Result<u128, TwammError> {
    if liquidity == 0 || sell_rate_a == 0 || sell_rate_b == 0 {
        return Err(TwammError::PriceSolutionFailed);
    }
    if target_sqrt_price == sqrt_price {
        return Ok(0);
    }
    let rate_a = sell_rate_a as f64;
    let rate_b = sell_rate_b as f64;
    let price = to_float_price(sqrt_price);
    let target = to_float_price(target_sqrt_price);

    let eq_price = libm::sqrt(rate_b / rate_a);
    let c = (eq_price - price) / (eq_price + price);
    let ratio = c * (eq_price + target) / (eq_price - target);
    if !ratio.is_finite() || ratio < 1.0 {
        return Err(TwammError::PriceSolutionFailed);
    }
    let pow = libm::log(ratio);
    let seconds = pow * liquidity as f64 / (2.0 * libm::sqrt(rate_a * rate_b));
    let dt_x64 = libm::ceil(seconds * Q64 as f64);
    if !dt_x64.is_finite() || dt_x64 < 0.0 {
        return Err(TwammError::PriceSolutionFailed);
    }
    Ok(dt_x64 as u128)
}

/// Splits the token flows of a stretch of simultaneous execution between the
/// two selling pools, conserving inputs exactly.
///
/// Each side pours `rate * dt` of its sell token in; the curve absorbs or
/// releases whatever the integer price endpoints imply, and the remainder is
/// distributed as earnings. Curve absorption rounds up, release rounds down.
pub fn flow_earnings(
    sqrt_price_start: u128,
    sqrt_price_end: u128,
    liquidity: u128,
    sell_rate_a: u128,
    sell_rate_b: u128,
    dt_x64: u128,
) -> Result<FlowEarnings, TwammError> {
    let sold_a = sold_amount(sell_rate_a, dt_x64)?;
    let sold_b = sold_amount(sell_rate_b, dt_x64)?;
    let delta_a_up = try_get_amount_delta_a(sqrt_price_start, sqrt_price_end, liquidity, true)?;
    let delta_a_down = try_get_amount_delta_a(sqrt_price_start, sqrt_price_end, liquidity, false)?;
    let delta_b_up = try_get_amount_delta_b(sqrt_price_start, sqrt_price_end, liquidity, true)?;
    let delta_b_down = try_get_amount_delta_b(sqrt_price_start, sqrt_price_end, liquidity, false)?;

    let (earned_a, earned_b) = if sqrt_price_end >= sqrt_price_start {
        // price rose: the curve absorbed token B and released token A
        (sold_a.saturating_add(delta_a_down), sold_b.saturating_sub(delta_b_up))
    } else {
        // price fell: the curve absorbed token A and released token B
        (sold_a.saturating_sub(delta_a_up), sold_b.saturating_add(delta_b_down))
    };
    Ok(FlowEarnings { earned_a, earned_b })
}
