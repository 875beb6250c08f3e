//
// Copyright (c) the twamm-core contributors
//
// Licensed under the MIT license.
// See the LICENSE file in the project root for license information.
//

/// Liquidity bookkeeping at one initialized tick.
///
/// `liquidity_net` is added to the active liquidity when the price crosses
/// the tick moving up and subtracted when crossing down. `liquidity_gross`
/// tracks whether any position references the tick at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickState {
    pub liquidity_gross: u128,
    pub liquidity_net: i128,
}

impl TickState {
    pub fn is_initialized(&self) -> bool {
        self.liquidity_gross > 0
    }
}
