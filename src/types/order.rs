//
// Copyright (c) the twamm-core contributors
//
// Licensed under the MIT license.
// See the LICENSE file in the project root for license information.
//

use ethnum::U256;

use crate::AccountId;

/// Which token a long-term order sells.
///
/// `AToB` sells token A and pushes the sqrt price down; `BToA` sells token B
/// and pushes it up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OrderDirection {
    AToB,
    BToA,
}

impl OrderDirection {
    pub fn opposite(&self) -> Self {
        match self {
            OrderDirection::AToB => OrderDirection::BToA,
            OrderDirection::BToA => OrderDirection::AToB,
        }
    }
}

/// Identifies one long-term order within a market. Two submissions with the
/// same owner, expiration and direction address the same order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OrderKey {
    pub owner: AccountId,
    pub expiration: u64,
    pub direction: OrderDirection,
}

/// Per-order state. The proceeds owed to the order are
/// `sell_rate * (pool earnings factor - earnings_factor_last) >> 64`,
/// where the pool factor is read at the order's expiration snapshot once it
/// has expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Order {
    pub sell_rate: u128,
    pub earnings_factor_last: U256,
}
