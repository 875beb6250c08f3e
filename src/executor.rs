//
// Copyright (c) the twamm-core contributors
//
// Licensed under the MIT license.
// See the LICENSE file in the project root for license information.
//

//! Virtual-order execution: advances a market from its last executed
//! timestamp to "now" in stretches bounded by order expirations and
//! initialized ticks, accruing earnings into the directional order pools.
//!
//! The executor works on a private copy of the curve's price and liquidity
//! and never mutates the curve; the caller reconciles the real pool with the
//! returned final price afterwards. All pool mutations happen through
//! [`OrderPool`](crate::OrderPool) accessors, so a failed step leaves the
//! market exactly as the caller snapshotted it only if the caller discards
//! the state — the engine runs this on a scratch clone for that reason.

use std::ops::Bound;

use ethnum::U256;
use log::{debug, trace};

use crate::{
    flow_earnings, next_sqrt_price_from_flows, seconds_until_price, sold_amount,
    sqrt_price_to_tick_index, tick_index_to_sqrt_price, try_get_amount_delta_a,
    try_get_amount_delta_b, try_get_next_sqrt_price_from_a_input,
    try_get_next_sqrt_price_from_b_input, FlowEarnings, MarketId, MarketState, OrderDirection,
    PoolParams, PriceCurve, TwammError, MAX_SQRT_PRICE, MIN_SQRT_PRICE, Q64, Q64_RESOLUTION,
};

/// Advances all virtual orders of a market.
pub struct VirtualOrderExecutor;

impl VirtualOrderExecutor {
    /// Executes the market's virtual orders from its watermark up to `now`.
    ///
    /// Returns the direction and final sqrt price of the net price move when
    /// the working price ended away from `params.sqrt_price`, so the caller
    /// can reconcile the real curve with one swap. Returns `None` when
    /// nothing executed or the flows netted out exactly.
    pub fn execute<C: PriceCurve>(
        market: &mut MarketState,
        curve: &C,
        market_id: MarketId,
        params: PoolParams,
        now: u64,
    ) -> Result<Option<(OrderDirection, u128)>, TwammError> {
        if now <= market.last_virtual_order_timestamp {
            return Ok(None);
        }
        let mut working = Working {
            curve,
            market_id,
            sqrt_price: params.sqrt_price,
            liquidity: params.liquidity,
        };
        let mut prev = market.last_virtual_order_timestamp;
        while prev < now {
            let rate_a = market.order_pool_a_to_b.sell_rate_current;
            let rate_b = market.order_pool_b_to_a.sell_rate_current;
            if rate_a == 0 && rate_b == 0 {
                break;
            }
            // expirations land only on interval boundaries; boundaries with
            // no scheduled rate drop never split a stretch
            match next_expiration(market, prev, now) {
                Some(boundary) => {
                    let dt_x64 = u128::from(boundary - prev) << 64;
                    let earnings = working.advance(rate_a, rate_b, dt_x64)?;
                    let (delta_a_to_b, delta_b_to_a) =
                        factor_deltas(&earnings, rate_a, rate_b)?;
                    market
                        .order_pool_a_to_b
                        .advance_to_interval(boundary, delta_a_to_b)?;
                    market
                        .order_pool_b_to_a
                        .advance_to_interval(boundary, delta_b_to_a)?;
                    trace!(
                        "{market_id}: executed {prev}..{boundary}, \
                         earned a={} b={}",
                        earnings.earned_a,
                        earnings.earned_b
                    );
                    prev = boundary;
                }
                None => {
                    let dt_x64 = u128::from(now - prev) << 64;
                    let earnings = working.advance(rate_a, rate_b, dt_x64)?;
                    let (delta_a_to_b, delta_b_to_a) =
                        factor_deltas(&earnings, rate_a, rate_b)?;
                    market
                        .order_pool_a_to_b
                        .advance_to_current_time(delta_a_to_b)?;
                    market
                        .order_pool_b_to_a
                        .advance_to_current_time(delta_b_to_a)?;
                    trace!(
                        "{market_id}: executed {prev}..{now}, earned a={} b={}",
                        earnings.earned_a,
                        earnings.earned_b
                    );
                    prev = now;
                }
            }
        }
        market.last_virtual_order_timestamp = now;

        if working.sqrt_price == params.sqrt_price {
            return Ok(None);
        }
        let direction = if working.sqrt_price < params.sqrt_price {
            OrderDirection::AToB
        } else {
            OrderDirection::BToA
        };
        debug!(
            "{market_id}: virtual orders moved sqrt price {} -> {} ({direction:?})",
            params.sqrt_price, working.sqrt_price
        );
        Ok(Some((direction, working.sqrt_price)))
    }
}

/// The earliest scheduled sell-rate drop in `(prev, now]` across both pools.
fn next_expiration(market: &MarketState, prev: u64, now: u64) -> Option<u64> {
    let bounds = (Bound::Excluded(prev), Bound::Included(now));
    let next_a = market
        .order_pool_a_to_b
        .sell_rate_ending_at
        .range(bounds)
        .next()
        .map(|(&at, _)| at);
    let next_b = market
        .order_pool_b_to_a
        .sell_rate_ending_at
        .range(bounds)
        .next()
        .map(|(&at, _)| at);
    match (next_a, next_b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// Earnings-factor increments for each pool: output per unit of sell rate,
/// scaled by 2^64. The a-to-b pool earns token B and vice versa.
fn factor_deltas(
    earnings: &FlowEarnings,
    rate_a: u128,
    rate_b: u128,
) -> Result<(U256, U256), TwammError> {
    let delta_a_to_b = if rate_a > 0 {
        (U256::from(earnings.earned_b) << Q64_RESOLUTION) / U256::from(rate_a)
    } else {
        U256::ZERO
    };
    let delta_b_to_a = if rate_b > 0 {
        (U256::from(earnings.earned_a) << Q64_RESOLUTION) / U256::from(rate_b)
    } else {
        U256::ZERO
    };
    Ok((delta_a_to_b, delta_b_to_a))
}

fn checked_accumulate(total: &mut u128, amount: u128) -> Result<(), TwammError> {
    *total = total
        .checked_add(amount)
        .ok_or(TwammError::ArithmeticOverflow)?;
    Ok(())
}

/// Working copy of the curve state being advanced.
struct Working<'a, C: PriceCurve> {
    curve: &'a C,
    market_id: MarketId,
    sqrt_price: u128,
    liquidity: u128,
}

impl<C: PriceCurve> Working<'_, C> {
    fn advance(
        &mut self,
        rate_a: u128,
        rate_b: u128,
        dt_x64: u128,
    ) -> Result<FlowEarnings, TwammError> {
        if dt_x64 == 0 {
            return Ok(FlowEarnings { earned_a: 0, earned_b: 0 });
        }
        match (rate_a > 0, rate_b > 0) {
            (true, true) => self.advance_two_sided(rate_a, rate_b, dt_x64),
            (true, false) => {
                let earned_b = self.advance_single_sided(OrderDirection::AToB, rate_a, dt_x64)?;
                Ok(FlowEarnings { earned_a: 0, earned_b })
            }
            (false, true) => {
                let earned_a = self.advance_single_sided(OrderDirection::BToA, rate_b, dt_x64)?;
                Ok(FlowEarnings { earned_a, earned_b: 0 })
            }
            (false, false) => Ok(FlowEarnings { earned_a: 0, earned_b: 0 }),
        }
    }

    /// Both directions stream at once: the price follows the closed form
    /// toward the flow equilibrium, split at each initialized tick.
    fn advance_two_sided(
        &mut self,
        rate_a: u128,
        rate_b: u128,
        mut budget_x64: u128,
    ) -> Result<FlowEarnings, TwammError> {
        let mut earned_a = 0u128;
        let mut earned_b = 0u128;
        while budget_x64 > 0 {
            if self.liquidity == 0 {
                let filled =
                    self.advance_two_sided_without_liquidity(rate_a, rate_b, budget_x64)?;
                if let Some(earnings) = filled {
                    checked_accumulate(&mut earned_a, earnings.earned_a)?;
                    checked_accumulate(&mut earned_b, earnings.earned_b)?;
                    budget_x64 = 0;
                }
                continue;
            }
            let target = next_sqrt_price_from_flows(
                self.sqrt_price,
                self.liquidity,
                rate_a,
                rate_b,
                budget_x64,
            )?;
            if target == self.sqrt_price {
                // pinned at equilibrium: the flows trade through the curve
                // at a standstill price and fill each other entirely
                let earnings = flow_earnings(
                    self.sqrt_price,
                    self.sqrt_price,
                    self.liquidity,
                    rate_a,
                    rate_b,
                    budget_x64,
                )?;
                checked_accumulate(&mut earned_a, earnings.earned_a)?;
                checked_accumulate(&mut earned_b, earnings.earned_b)?;
                break;
            }
            let moving_up = target > self.sqrt_price;
            let crossing = self.next_tick_toward(moving_up)?.filter(|(_, tick_price)| {
                if moving_up {
                    *tick_price <= target
                } else {
                    *tick_price >= target
                }
            });
            match crossing {
                Some((tick_index, tick_price)) => {
                    let dt_x64 = seconds_until_price(
                        self.sqrt_price,
                        tick_price,
                        self.liquidity,
                        rate_a,
                        rate_b,
                    )?
                    .min(budget_x64);
                    let earnings = flow_earnings(
                        self.sqrt_price,
                        tick_price,
                        self.liquidity,
                        rate_a,
                        rate_b,
                        dt_x64,
                    )?;
                    checked_accumulate(&mut earned_a, earnings.earned_a)?;
                    checked_accumulate(&mut earned_b, earnings.earned_b)?;
                    self.sqrt_price = tick_price;
                    self.cross(tick_index, moving_up)?;
                    budget_x64 -= dt_x64;
                }
                None => {
                    let earnings = flow_earnings(
                        self.sqrt_price,
                        target,
                        self.liquidity,
                        rate_a,
                        rate_b,
                        budget_x64,
                    )?;
                    checked_accumulate(&mut earned_a, earnings.earned_a)?;
                    checked_accumulate(&mut earned_b, earnings.earned_b)?;
                    self.sqrt_price = target;
                    budget_x64 = 0;
                }
            }
        }
        Ok(FlowEarnings { earned_a, earned_b })
    }

    /// With no active liquidity the price snaps toward the flow-ratio
    /// equilibrium, crossing intervening ticks at zero time cost. Returns
    /// the direct-fill earnings once the price can no longer move, or `None`
    /// when a crossing re-activated liquidity and normal stepping resumes.
    fn advance_two_sided_without_liquidity(
        &mut self,
        rate_a: u128,
        rate_b: u128,
        budget_x64: u128,
    ) -> Result<Option<FlowEarnings>, TwammError> {
        let eq_price = equilibrium_sqrt_price(rate_a, rate_b)?;
        if eq_price != self.sqrt_price {
            let moving_up = eq_price > self.sqrt_price;
            let crossing = self.next_tick_toward(moving_up)?.filter(|(_, tick_price)| {
                if moving_up {
                    *tick_price <= eq_price
                } else {
                    *tick_price >= eq_price
                }
            });
            if let Some((tick_index, tick_price)) = crossing {
                self.sqrt_price = tick_price;
                self.cross(tick_index, moving_up)?;
                return Ok(None);
            }
            self.sqrt_price = eq_price;
        }
        // no counterparty on the curve: the two flows fill each other
        let earnings = flow_earnings(self.sqrt_price, self.sqrt_price, 0, rate_a, rate_b, budget_x64)?;
        Ok(Some(earnings))
    }

    /// One direction streams alone: a plain swap of `rate * elapsed` input,
    /// stepped at each initialized tick. Returns the purchased amount.
    fn advance_single_sided(
        &mut self,
        direction: OrderDirection,
        rate: u128,
        dt_x64: u128,
    ) -> Result<u128, TwammError> {
        let mut remaining = sold_amount(rate, dt_x64)?;
        let mut amount_out = 0u128;
        let moving_up = direction == OrderDirection::BToA;
        let limit = if moving_up { MAX_SQRT_PRICE } else { MIN_SQRT_PRICE };

        while remaining > 0 && self.sqrt_price != limit {
            let next_tick = self.next_tick_toward(moving_up)?;
            if self.liquidity == 0 {
                // hop empty ranges to the next one with depth
                match next_tick {
                    Some((tick_index, tick_price)) => {
                        self.sqrt_price = tick_price;
                        self.cross(tick_index, moving_up)?;
                        continue;
                    }
                    None => {
                        self.sqrt_price = limit;
                        break;
                    }
                }
            }
            let step_target = match next_tick {
                Some((_, tick_price)) => tick_price,
                None => limit,
            };
            let step_input = if moving_up {
                try_get_amount_delta_b(self.sqrt_price, step_target, self.liquidity, true)?
            } else {
                try_get_amount_delta_a(self.sqrt_price, step_target, self.liquidity, true)?
            };
            if step_input > remaining {
                let next_price = if moving_up {
                    try_get_next_sqrt_price_from_b_input(self.sqrt_price, self.liquidity, remaining)?
                } else {
                    try_get_next_sqrt_price_from_a_input(self.sqrt_price, self.liquidity, remaining)?
                };
                let step_output = if moving_up {
                    try_get_amount_delta_a(self.sqrt_price, next_price, self.liquidity, false)?
                } else {
                    try_get_amount_delta_b(self.sqrt_price, next_price, self.liquidity, false)?
                };
                checked_accumulate(&mut amount_out, step_output)?;
                self.sqrt_price = next_price;
                remaining = 0;
            } else {
                let step_output = if moving_up {
                    try_get_amount_delta_a(self.sqrt_price, step_target, self.liquidity, false)?
                } else {
                    try_get_amount_delta_b(self.sqrt_price, step_target, self.liquidity, false)?
                };
                checked_accumulate(&mut amount_out, step_output)?;
                remaining -= step_input;
                self.sqrt_price = step_target;
                match next_tick {
                    Some((tick_index, _)) => self.cross(tick_index, moving_up)?,
                    None => break,
                }
            }
        }
        Ok(amount_out)
    }

    /// The nearest initialized tick strictly beyond the working price in the
    /// direction of travel, with its sqrt price.
    fn next_tick_toward(&self, moving_up: bool) -> Result<Option<(i32, u128)>, TwammError> {
        let current_tick = sqrt_price_to_tick_index(self.sqrt_price)?;
        let (search_from, direction) = if moving_up {
            (current_tick, OrderDirection::BToA)
        } else {
            // a price sitting exactly on its tick boundary has already
            // crossed that tick on the way down
            let search_from = if tick_index_to_sqrt_price(current_tick)? == self.sqrt_price {
                current_tick - 1
            } else {
                current_tick
            };
            (search_from, OrderDirection::AToB)
        };
        match self
            .curve
            .next_initialized_tick(self.market_id, search_from, direction)?
        {
            Some(tick_index) => Ok(Some((tick_index, tick_index_to_sqrt_price(tick_index)?))),
            None => Ok(None),
        }
    }

    fn cross(&mut self, tick_index: i32, moving_up: bool) -> Result<(), TwammError> {
        let liquidity_net = self.curve.tick_liquidity_net(self.market_id, tick_index)?;
        self.liquidity = crate::apply_liquidity_net(self.liquidity, liquidity_net, moving_up)?;
        Ok(())
    }
}

/// The price two bare flows settle at: `sqrt(rate_b / rate_a)` in Q64.64.
fn equilibrium_sqrt_price(rate_a: u128, rate_b: u128) -> Result<u128, TwammError> {
    if rate_a == 0 || rate_b == 0 {
        return Err(TwammError::PriceSolutionFailed);
    }
    let value = libm::sqrt(rate_b as f64 / rate_a as f64) * Q64 as f64;
    if !value.is_finite() || value <= 0.0 {
        return Err(TwammError::PriceSolutionFailed);
    }
    Ok((value as u128).clamp(MIN_SQRT_PRICE, MAX_SQRT_PRICE))
}
