//
// Copyright (c) the twamm-core contributors
//
// Licensed under the MIT license.
// See the LICENSE file in the project root for license information.
//

use ethnum::U256;

use crate::{
    TwammError, MAX_SQRT_PRICE, MAX_TICK_INDEX, MIN_SQRT_PRICE, MIN_TICK_INDEX, Q64,
    Q64_RESOLUTION,
};

/// Pre-computed `sqrt(1.0001)^(2^i)` in Q64.64, for the binary decomposition
/// of a tick index. Bit 18 is the highest bit a valid tick can set.
const SQRT_RATIO_POWERS: [u128; 19] = [
    18447666387855959850,
    18448588748116922571,
    18450433606991734263,
    18454123878217468680,
    18461506635090006701,
    18476281010653910144,
    18505865242158250041,
    18565175891880433522,
    18684368066214940582,
    18925053041275764671,
    19415764168677886926,
    20435687552633177494,
    22639080592224303007,
    27784196929998399742,
    41848122137994986128,
    94936283578220370716,
    488590176327622479860,
    12941056668319229769860,
    9078618265828848800676189,
];

fn mul_shift(a: u128, b: u128) -> u128 {
    ((U256::from(a) * U256::from(b)) >> Q64_RESOLUTION).as_u128()
}

fn sqrt_price_at_valid_tick(tick_index: i32) -> u128 {
    let abs_tick = tick_index.unsigned_abs();
    let mut ratio = Q64;
    for (i, power) in SQRT_RATIO_POWERS.iter().enumerate() {
        if abs_tick & (1 << i) != 0 {
            ratio = mul_shift(ratio, *power);
        }
    }
    if tick_index < 0 {
        ratio = ((U256::ONE << (2 * Q64_RESOLUTION)) / U256::from(ratio)).as_u128();
    }
    ratio
}

/// Converts a tick index to a Q64.64 sqrt price.
///
/// # Errors
/// `TickIndexOutOfBounds` if the tick is outside `[MIN_TICK_INDEX, MAX_TICK_INDEX]`.
pub fn tick_index_to_sqrt_price(tick_index: i32) -> Result<u128, TwammError> {
    if !(MIN_TICK_INDEX..=MAX_TICK_INDEX).contains(&tick_index) {
        return Err(TwammError::TickIndexOutOfBounds);
    }
    Ok(sqrt_price_at_valid_tick(tick_index))
}

/// Converts a Q64.64 sqrt price to the greatest tick index whose sqrt price
/// does not exceed it.
///
/// # Errors
/// `SqrtPriceOutOfBounds` if the price is outside `[MIN_SQRT_PRICE, MAX_SQRT_PRICE]`.
pub fn sqrt_price_to_tick_index(sqrt_price: u128) -> Result<i32, TwammError> {
    if !(MIN_SQRT_PRICE..=MAX_SQRT_PRICE).contains(&sqrt_price) {
        return Err(TwammError::SqrtPriceOutOfBounds);
    }
    let mut low = MIN_TICK_INDEX;
    let mut high = MAX_TICK_INDEX;
    while low <= high {
        let mid = low + (high - low) / 2;
        let mid_sqrt_price = sqrt_price_at_valid_tick(mid);
        match mid_sqrt_price.cmp(&sqrt_price) {
            std::cmp::Ordering::Equal => return Ok(mid),
            std::cmp::Ordering::Less => low = mid + 1,
            std::cmp::Ordering::Greater => high = mid - 1,
        }
    }
    Ok(high)
}
