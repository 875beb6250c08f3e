//
// Copyright (c) the twamm-core contributors
//
// Licensed under the MIT license.
// See the LICENSE file in the project root for license information.
//

use std::collections::BTreeMap;

use ethnum::U256;

use crate::TwammError;

/// Aggregate book for all live orders selling in one direction.
///
/// `sell_rate_current` is the sum of the sell rates of every unexpired order;
/// `earnings_factor_current` accumulates purchased-token output per unit of
/// sell rate, scaled by 2^64, and only ever grows. The two schedules record
/// the rate drop and the factor snapshot at each expiration boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderPool {
    pub sell_rate_current: u128,
    pub earnings_factor_current: U256,
    pub sell_rate_ending_at: BTreeMap<u64, u128>,
    pub earnings_factor_at: BTreeMap<u64, U256>,
}

impl OrderPool {
    /// Crosses an expiration boundary: accrues the earnings of the stretch
    /// that just executed, snapshots the factor so orders expiring here can
    /// settle later, and drops the expiring sell rate.
    pub fn advance_to_interval(
        &mut self,
        timestamp: u64,
        earnings_factor_delta: U256,
    ) -> Result<(), TwammError> {
        self.earnings_factor_current = self
            .earnings_factor_current
            .checked_add(earnings_factor_delta)
            .ok_or(TwammError::ArithmeticOverflow)?;
        self.earnings_factor_at
            .insert(timestamp, self.earnings_factor_current);
        let expiring = self.sell_rate_ending_at.remove(&timestamp).unwrap_or(0);
        self.sell_rate_current = self
            .sell_rate_current
            .checked_sub(expiring)
            .ok_or(TwammError::ArithmeticOverflow)?;
        Ok(())
    }

    /// Accrues earnings for a stretch that ends between boundaries; no order
    /// expires, so no snapshot is taken and the rate is unchanged.
    pub fn advance_to_current_time(
        &mut self,
        earnings_factor_delta: U256,
    ) -> Result<(), TwammError> {
        self.earnings_factor_current = self
            .earnings_factor_current
            .checked_add(earnings_factor_delta)
            .ok_or(TwammError::ArithmeticOverflow)?;
        Ok(())
    }

    /// Registers a new order's sell rate and its scheduled drop-off.
    pub fn add_sell_rate(&mut self, sell_rate: u128, expiration: u64) -> Result<(), TwammError> {
        self.sell_rate_current = self
            .sell_rate_current
            .checked_add(sell_rate)
            .ok_or(TwammError::ArithmeticOverflow)?;
        let scheduled = self.sell_rate_ending_at.entry(expiration).or_default();
        *scheduled = scheduled
            .checked_add(sell_rate)
            .ok_or(TwammError::ArithmeticOverflow)?;
        Ok(())
    }

    /// Removes part of a live order's sell rate and its scheduled drop-off.
    pub fn remove_sell_rate(&mut self, sell_rate: u128, expiration: u64) -> Result<(), TwammError> {
        self.sell_rate_current = self
            .sell_rate_current
            .checked_sub(sell_rate)
            .ok_or(TwammError::ArithmeticOverflow)?;
        let scheduled = self
            .sell_rate_ending_at
            .get_mut(&expiration)
            .ok_or(TwammError::ArithmeticOverflow)?;
        *scheduled = scheduled
            .checked_sub(sell_rate)
            .ok_or(TwammError::ArithmeticOverflow)?;
        if *scheduled == 0 {
            self.sell_rate_ending_at.remove(&expiration);
        }
        Ok(())
    }
}
