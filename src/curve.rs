//
// Copyright (c) the twamm-core contributors
//
// Licensed under the MIT license.
// See the LICENSE file in the project root for license information.
//

use std::collections::{BTreeMap, HashMap};

use log::debug;

use crate::{
    tick_index_to_sqrt_price, MarketId, OrderDirection, PoolParams, TickState, TwammError,
    MAX_TICK_INDEX, MIN_TICK_INDEX,
};

/// The price curve the virtual orders trade against.
///
/// The executor reads curve state through this trait and the engine pushes
/// the net result of a round of virtual execution back through
/// [`execute_real_swap`](PriceCurve::execute_real_swap). Hosts embedding the
/// engine implement this over their own pool state; [`ReferenceCurve`] is a
/// complete in-memory implementation.
pub trait PriceCurve {
    /// Current sqrt price and active liquidity.
    fn pool_params(&self, market: MarketId) -> Result<PoolParams, TwammError>;

    /// Signed liquidity change when crossing the tick moving up; zero for
    /// uninitialized ticks.
    fn tick_liquidity_net(&self, market: MarketId, tick_index: i32) -> Result<i128, TwammError>;

    /// The nearest initialized tick in the direction of travel: at or below
    /// `from_tick` for `AToB`, strictly above it for `BToA`.
    fn next_initialized_tick(
        &self,
        market: MarketId,
        from_tick: i32,
        direction: OrderDirection,
    ) -> Result<Option<i32>, TwammError>;

    /// Moves the real pool price to `target_sqrt_price`, crossing every
    /// initialized tick on the way and updating active liquidity.
    fn execute_real_swap(
        &mut self,
        market: MarketId,
        direction: OrderDirection,
        target_sqrt_price: u128,
    ) -> Result<(), TwammError>;
}

/// Applies a tick's net liquidity to the active liquidity for a given
/// direction of travel: added when crossing up, removed when crossing down.
pub fn apply_liquidity_net(
    liquidity: u128,
    liquidity_net: i128,
    moving_up: bool,
) -> Result<u128, TwammError> {
    let signed = if moving_up {
        liquidity_net
    } else {
        liquidity_net.checked_neg().ok_or(TwammError::ArithmeticOverflow)?
    };
    let next = if signed >= 0 {
        liquidity.checked_add(signed as u128)
    } else {
        liquidity.checked_sub(signed.unsigned_abs())
    };
    next.ok_or(TwammError::ArithmeticOverflow)
}

#[derive(Debug, Clone)]
struct CurvePool {
    sqrt_price: u128,
    liquidity: u128,
    ticks: BTreeMap<i32, TickState>,
}

/// In-memory constant-product curve with tick-ranged liquidity.
#[derive(Debug, Clone, Default)]
pub struct ReferenceCurve {
    pools: HashMap<MarketId, CurvePool>,
}

impl ReferenceCurve {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates or resets the pool backing a market.
    pub fn set_pool(
        &mut self,
        market: MarketId,
        sqrt_price: u128,
        liquidity: u128,
    ) -> Result<(), TwammError> {
        if !(crate::MIN_SQRT_PRICE..=crate::MAX_SQRT_PRICE).contains(&sqrt_price) {
            return Err(TwammError::SqrtPriceOutOfBounds);
        }
        self.pools.insert(
            market,
            CurvePool {
                sqrt_price,
                liquidity,
                ticks: BTreeMap::new(),
            },
        );
        Ok(())
    }

    /// Adds `liquidity` over `[lower_tick, upper_tick)`, maintaining the
    /// gross/net bookkeeping at both boundary ticks and the active liquidity
    /// when the current price sits inside the range.
    pub fn add_tick_liquidity(
        &mut self,
        market: MarketId,
        lower_tick: i32,
        upper_tick: i32,
        liquidity: u128,
    ) -> Result<(), TwammError> {
        if lower_tick >= upper_tick
            || lower_tick < MIN_TICK_INDEX
            || upper_tick > MAX_TICK_INDEX
        {
            return Err(TwammError::TickIndexOutOfBounds);
        }
        let signed: i128 = liquidity
            .try_into()
            .map_err(|_| TwammError::ArithmeticOverflow)?;
        let lower_price = tick_index_to_sqrt_price(lower_tick)?;
        let upper_price = tick_index_to_sqrt_price(upper_tick)?;
        let pool = self
            .pools
            .get_mut(&market)
            .ok_or(TwammError::NotInitialized)?;

        for (tick_index, net_delta) in [(lower_tick, signed), (upper_tick, -signed)] {
            let tick = pool.ticks.entry(tick_index).or_default();
            tick.liquidity_gross = tick
                .liquidity_gross
                .checked_add(liquidity)
                .ok_or(TwammError::ArithmeticOverflow)?;
            tick.liquidity_net = tick
                .liquidity_net
                .checked_add(net_delta)
                .ok_or(TwammError::ArithmeticOverflow)?;
        }
        if (lower_price..upper_price).contains(&pool.sqrt_price) {
            pool.liquidity = pool
                .liquidity
                .checked_add(liquidity)
                .ok_or(TwammError::ArithmeticOverflow)?;
        }
        Ok(())
    }

    /// Removes `liquidity` previously added over `[lower_tick, upper_tick)`.
    pub fn remove_tick_liquidity(
        &mut self,
        market: MarketId,
        lower_tick: i32,
        upper_tick: i32,
        liquidity: u128,
    ) -> Result<(), TwammError> {
        if lower_tick >= upper_tick {
            return Err(TwammError::TickIndexOutOfBounds);
        }
        let signed: i128 = liquidity
            .try_into()
            .map_err(|_| TwammError::ArithmeticOverflow)?;
        let lower_price = tick_index_to_sqrt_price(lower_tick)?;
        let upper_price = tick_index_to_sqrt_price(upper_tick)?;
        let pool = self
            .pools
            .get_mut(&market)
            .ok_or(TwammError::NotInitialized)?;

        for (tick_index, net_delta) in [(lower_tick, signed), (upper_tick, -signed)] {
            let tick = pool
                .ticks
                .get_mut(&tick_index)
                .ok_or(TwammError::ArithmeticOverflow)?;
            tick.liquidity_gross = tick
                .liquidity_gross
                .checked_sub(liquidity)
                .ok_or(TwammError::ArithmeticOverflow)?;
            tick.liquidity_net = tick
                .liquidity_net
                .checked_sub(net_delta)
                .ok_or(TwammError::ArithmeticOverflow)?;
            if !tick.is_initialized() {
                pool.ticks.remove(&tick_index);
            }
        }
        if (lower_price..upper_price).contains(&pool.sqrt_price) {
            pool.liquidity = pool
                .liquidity
                .checked_sub(liquidity)
                .ok_or(TwammError::ArithmeticOverflow)?;
        }
        Ok(())
    }

    fn pool(&self, market: MarketId) -> Result<&CurvePool, TwammError> {
        self.pools.get(&market).ok_or(TwammError::NotInitialized)
    }
}

impl PriceCurve for ReferenceCurve {
    fn pool_params(&self, market: MarketId) -> Result<PoolParams, TwammError> {
        let pool = self.pool(market)?;
        Ok(PoolParams {
            sqrt_price: pool.sqrt_price,
            liquidity: pool.liquidity,
        })
    }

    fn tick_liquidity_net(&self, market: MarketId, tick_index: i32) -> Result<i128, TwammError> {
        Ok(self
            .pool(market)?
            .ticks
            .get(&tick_index)
            .map(|tick| tick.liquidity_net)
            .unwrap_or(0))
    }

    fn next_initialized_tick(
        &self,
        market: MarketId,
        from_tick: i32,
        direction: OrderDirection,
    ) -> Result<Option<i32>, TwammError> {
        let pool = self.pool(market)?;
        let next = match direction {
            OrderDirection::AToB => pool
                .ticks
                .range(..=from_tick)
                .rev()
                .find(|(_, tick)| tick.is_initialized())
                .map(|(&index, _)| index),
            OrderDirection::BToA => pool
                .ticks
                .range(from_tick + 1..)
                .find(|(_, tick)| tick.is_initialized())
                .map(|(&index, _)| index),
        };
        Ok(next)
    }

    fn execute_real_swap(
        &mut self,
        market: MarketId,
        direction: OrderDirection,
        target_sqrt_price: u128,
    ) -> Result<(), TwammError> {
        let pool = self
            .pools
            .get_mut(&market)
            .ok_or(TwammError::NotInitialized)?;
        let start = pool.sqrt_price;
        if target_sqrt_price == start {
            return Ok(());
        }
        let moving_up = target_sqrt_price > start;
        match direction {
            OrderDirection::AToB if moving_up => return Err(TwammError::SqrtPriceOutOfBounds),
            OrderDirection::BToA if !moving_up => return Err(TwammError::SqrtPriceOutOfBounds),
            _ => {}
        }

        // ticks whose boundary lies strictly between the start price and the
        // target, plus the target itself when it lands exactly on one
        let mut crossed = Vec::new();
        for (&tick_index, tick) in pool.ticks.iter() {
            if !tick.is_initialized() {
                continue;
            }
            let tick_price = tick_index_to_sqrt_price(tick_index)?;
            let hit = if moving_up {
                tick_price > start && tick_price <= target_sqrt_price
            } else {
                tick_price < start && tick_price >= target_sqrt_price
            };
            if hit {
                crossed.push(tick.liquidity_net);
            }
        }
        // fold the crossings first so a failed flip leaves the pool untouched
        let mut liquidity = pool.liquidity;
        for liquidity_net in crossed {
            liquidity = apply_liquidity_net(liquidity, liquidity_net, moving_up)?;
        }
        pool.liquidity = liquidity;
        pool.sqrt_price = target_sqrt_price;
        debug!(
            "real swap on {market}: {start} -> {target_sqrt_price}, liquidity {}",
            pool.liquidity
        );
        Ok(())
    }
}
