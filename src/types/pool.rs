//
// Copyright (c) the twamm-core contributors
//
// Licensed under the MIT license.
// See the LICENSE file in the project root for license information.
//

/// Snapshot of the curve state the executor advances: the current Q64.64
/// sqrt price and the liquidity active at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolParams {
    pub sqrt_price: u128,
    pub liquidity: u128,
}
