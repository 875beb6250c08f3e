//
// Copyright (c) the twamm-core contributors
//
// Licensed under the MIT license.
// See the LICENSE file in the project root for license information.
//

//! Constant-product step math in the Q64.64 sqrt-price domain.
//!
//! Token A is the base token (its amount varies with `1 / sqrt_price`),
//! token B the quote token (varies with `sqrt_price`). All intermediates are
//! computed in `U256` so no product of in-range operands can overflow.

use ethnum::U256;

use crate::{TwammError, MAX_SQRT_PRICE, MIN_SQRT_PRICE, Q64, Q64_RESOLUTION};

fn try_into_u128(value: U256) -> Result<u128, TwammError> {
    let (hi, lo) = value.into_words();
    if hi != 0 {
        return Err(TwammError::ArithmeticOverflow);
    }
    Ok(lo)
}

fn div_round_up(numerator: U256, denominator: U256) -> Result<U256, TwammError> {
    if denominator == U256::ZERO {
        return Err(TwammError::ArithmeticOverflow);
    }
    let quotient = numerator / denominator;
    if numerator % denominator != U256::ZERO {
        Ok(quotient + U256::ONE)
    } else {
        Ok(quotient)
    }
}

/// Computes `a * b / denominator` with full 256-bit intermediates.
pub fn try_mul_div(a: u128, b: u128, denominator: u128, round_up: bool) -> Result<u128, TwammError> {
    if denominator == 0 {
        return Err(TwammError::ArithmeticOverflow);
    }
    let numerator = U256::from(a) * U256::from(b);
    let denominator = U256::from(denominator);
    let quotient = if round_up {
        div_round_up(numerator, denominator)?
    } else {
        numerator / denominator
    };
    try_into_u128(quotient)
}

/// Amount of token A held between two sqrt prices at the given liquidity:
/// `liquidity * (1/sqrt_lo - 1/sqrt_hi)`.
pub fn try_get_amount_delta_a(
    sqrt_price_0: u128,
    sqrt_price_1: u128,
    liquidity: u128,
    round_up: bool,
) -> Result<u128, TwammError> {
    let (lo, hi) = if sqrt_price_0 < sqrt_price_1 {
        (sqrt_price_0, sqrt_price_1)
    } else {
        (sqrt_price_1, sqrt_price_0)
    };
    if lo == hi || liquidity == 0 {
        return Ok(0);
    }
    if lo == 0 {
        return Err(TwammError::ArithmeticOverflow);
    }
    let base = U256::from(liquidity) << Q64_RESOLUTION;
    let (lo, hi) = (U256::from(lo), U256::from(hi));
    let amount = if round_up {
        div_round_up(base, lo)? - base / hi
    } else {
        let at_lo = base / lo;
        let at_hi = div_round_up(base, hi)?;
        if at_lo > at_hi {
            at_lo - at_hi
        } else {
            U256::ZERO
        }
    };
    try_into_u128(amount)
}

/// Amount of token B held between two sqrt prices at the given liquidity:
/// `liquidity * (sqrt_hi - sqrt_lo)`.
pub fn try_get_amount_delta_b(
    sqrt_price_0: u128,
    sqrt_price_1: u128,
    liquidity: u128,
    round_up: bool,
) -> Result<u128, TwammError> {
    let (lo, hi) = if sqrt_price_0 < sqrt_price_1 {
        (sqrt_price_0, sqrt_price_1)
    } else {
        (sqrt_price_1, sqrt_price_0)
    };
    let numerator = U256::from(liquidity) * U256::from(hi - lo);
    let amount = if round_up {
        (numerator + U256::from(Q64 - 1)) >> Q64_RESOLUTION
    } else {
        numerator >> Q64_RESOLUTION
    };
    try_into_u128(amount)
}

/// The sqrt price reached by selling `amount_in` of token A into the curve
/// (price decreases). Rounds toward the starting price so the implied output
/// is never overstated.
pub fn try_get_next_sqrt_price_from_a_input(
    sqrt_price: u128,
    liquidity: u128,
    amount_in: u128,
) -> Result<u128, TwammError> {
    if amount_in == 0 {
        return Ok(sqrt_price);
    }
    if liquidity == 0 || sqrt_price == 0 {
        return Err(TwammError::ArithmeticOverflow);
    }
    let base = U256::from(liquidity) << Q64_RESOLUTION;
    let denominator = base / U256::from(sqrt_price) + U256::from(amount_in);
    let next = try_into_u128(div_round_up(base, denominator)?)?;
    if next < MIN_SQRT_PRICE {
        return Err(TwammError::SqrtPriceOutOfBounds);
    }
    Ok(next)
}

/// The sqrt price reached by selling `amount_in` of token B into the curve
/// (price increases). Rounds down.
pub fn try_get_next_sqrt_price_from_b_input(
    sqrt_price: u128,
    liquidity: u128,
    amount_in: u128,
) -> Result<u128, TwammError> {
    if amount_in == 0 {
        return Ok(sqrt_price);
    }
    if liquidity == 0 {
        return Err(TwammError::ArithmeticOverflow);
    }
    let delta = (U256::from(amount_in) << Q64_RESOLUTION) / U256::from(liquidity);
    let next = U256::from(sqrt_price) + delta;
    let next = try_into_u128(next)?;
    if next > MAX_SQRT_PRICE {
        return Err(TwammError::SqrtPriceOutOfBounds);
    }
    Ok(next)
}
