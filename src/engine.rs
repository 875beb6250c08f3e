//
// Copyright (c) the twamm-core contributors
//
// Licensed under the MIT license.
// See the LICENSE file in the project root for license information.
//

//! The engine service: market store, order ledger and the public
//! submit/update/claim/execute entry points.
//!
//! Every entry point takes `&mut self`, so a single engine value gives each
//! call exclusive access to all market state. Timestamps come from the
//! caller; the engine never reads a clock.

use std::collections::HashMap;

use ethnum::U256;
use log::debug;

use crate::{
    AccountId, MarketId, MarketState, Order, OrderDirection, OrderKey, OrderPool, PriceCurve,
    TokenId, TokenLedger, TwammError, VirtualOrderExecutor, CANCEL_ALL,
    DEFAULT_EXPIRATION_INTERVAL, Q64_RESOLUTION,
};

/// Engine-wide parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Granularity all order expirations must align to, in seconds.
    pub expiration_interval: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            expiration_interval: DEFAULT_EXPIRATION_INTERVAL,
        }
    }
}

/// A TWAMM engine over a price curve and a token ledger.
///
/// Long-term orders stream one token into the curve over a fixed window and
/// accrue the other token as earnings. All proceeds (earnings and refunds)
/// accumulate in an internal owed-balance book and leave engine custody only
/// through [`claim_tokens`](TwammEngine::claim_tokens).
#[derive(Debug)]
pub struct TwammEngine<C: PriceCurve, L: TokenLedger> {
    config: EngineConfig,
    curve: C,
    ledger: L,
    markets: HashMap<MarketId, MarketState>,
    tokens_owed: HashMap<(TokenId, AccountId), u128>,
}

impl<C: PriceCurve, L: TokenLedger> TwammEngine<C, L> {
    pub fn new(curve: C, ledger: L) -> Self {
        Self {
            config: EngineConfig::default(),
            curve,
            ledger,
            markets: HashMap::new(),
            tokens_owed: HashMap::new(),
        }
    }

    pub fn with_config(curve: C, ledger: L, config: EngineConfig) -> Result<Self, TwammError> {
        if config.expiration_interval == 0 {
            return Err(TwammError::InvalidConfiguration);
        }
        Ok(Self {
            config,
            curve,
            ledger,
            markets: HashMap::new(),
            tokens_owed: HashMap::new(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn curve(&self) -> &C {
        &self.curve
    }

    pub fn curve_mut(&mut self) -> &mut C {
        &mut self.curve
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut L {
        &mut self.ledger
    }

    pub fn market_state(&self, market: MarketId) -> Option<&MarketState> {
        self.markets.get(&market)
    }

    pub fn get_order(&self, market: MarketId, key: &OrderKey) -> Option<Order> {
        self.markets.get(&market)?.get_order(key).copied()
    }

    pub fn get_order_pool(
        &self,
        market: MarketId,
        direction: OrderDirection,
    ) -> Option<&OrderPool> {
        Some(self.markets.get(&market)?.order_pool(direction))
    }

    /// Tokens the account can currently claim.
    pub fn tokens_owed(&self, token: TokenId, account: AccountId) -> u128 {
        self.tokens_owed.get(&(token, account)).copied().unwrap_or(0)
    }

    /// Registers a market over an existing curve pool.
    pub fn initialize_market(
        &mut self,
        market: MarketId,
        token_a: TokenId,
        token_b: TokenId,
        now: u64,
    ) -> Result<(), TwammError> {
        if self.markets.contains_key(&market) {
            return Err(TwammError::MarketAlreadyExists);
        }
        self.curve.pool_params(market)?;
        self.markets
            .insert(market, MarketState::new(token_a, token_b, now));
        debug!("{market}: initialized with {token_a} / {token_b} at t={now}");
        Ok(())
    }

    /// Catches the market's virtual orders up to `now` and reconciles the
    /// curve with the executed price move. A no-op when already caught up.
    pub fn execute_virtual_orders(&mut self, market: MarketId, now: u64) -> Result<(), TwammError> {
        let state = self.markets.get(&market).ok_or(TwammError::NotInitialized)?;
        if now < state.last_virtual_order_timestamp {
            return Err(TwammError::InvalidTimestamp);
        }
        if now == state.last_virtual_order_timestamp {
            return Ok(());
        }
        let params = self.curve.pool_params(market)?;
        // run on a scratch copy; commit only if every step succeeded
        let mut scratch = state.clone();
        let outcome = VirtualOrderExecutor::execute(&mut scratch, &self.curve, market, params, now)?;
        if let Some((direction, sqrt_price)) = outcome {
            self.curve.execute_real_swap(market, direction, sqrt_price)?;
        }
        self.markets.insert(market, scratch);
        Ok(())
    }

    /// Opens a long-term order selling `amount_in` evenly until
    /// `key.expiration`. The sell rate rounds down; only
    /// `rate * duration` is pulled from the owner. Returns the sell rate.
    pub fn submit_order(
        &mut self,
        market: MarketId,
        caller: AccountId,
        key: OrderKey,
        amount_in: u128,
        now: u64,
    ) -> Result<u128, TwammError> {
        if caller != key.owner {
            return Err(TwammError::MustBeOwner);
        }
        self.execute_virtual_orders(market, now)?;

        if key.expiration <= now {
            return Err(TwammError::ExpirationBeforeCurrentTime);
        }
        if key.expiration % self.config.expiration_interval != 0 {
            return Err(TwammError::ExpirationNotOnInterval);
        }
        let duration = key.expiration - now;
        let sell_rate = amount_in / u128::from(duration);
        if sell_rate == 0 {
            return Err(TwammError::SellRateZero);
        }
        let sell_amount = sell_rate
            .checked_mul(u128::from(duration))
            .ok_or(TwammError::ArithmeticOverflow)?;

        let state = self.markets.get_mut(&market).ok_or(TwammError::NotInitialized)?;
        if state.orders.contains_key(&key) {
            return Err(TwammError::OrderAlreadyExists);
        }
        let sell_token = state.sell_token(key.direction);
        let pool = state.order_pool_mut(key.direction);
        // overflow pre-checks so a successful transfer cannot strand funds
        pool.sell_rate_current
            .checked_add(sell_rate)
            .ok_or(TwammError::ArithmeticOverflow)?;
        pool.sell_rate_ending_at
            .get(&key.expiration)
            .copied()
            .unwrap_or(0)
            .checked_add(sell_rate)
            .ok_or(TwammError::ArithmeticOverflow)?;

        self.ledger.transfer_in(sell_token, caller, sell_amount)?;
        pool.add_sell_rate(sell_rate, key.expiration)?;
        let earnings_factor_last = pool.earnings_factor_current;
        state.orders.insert(
            key,
            Order {
                sell_rate,
                earnings_factor_last,
            },
        );
        debug!(
            "{market}: {} opened {:?} order, rate {sell_rate} until {}",
            key.owner, key.direction, key.expiration
        );
        Ok(sell_rate)
    }

    /// Settles an order's accrued earnings into the owed book and applies
    /// `amount_delta` to its unsold remainder. `CANCEL_ALL` drops the whole
    /// remainder; any other nonzero delta on an expired order is rejected.
    ///
    /// Returns the caller's owed balances in the order's sell and buy tokens
    /// after settlement.
    pub fn update_order(
        &mut self,
        market: MarketId,
        caller: AccountId,
        key: OrderKey,
        amount_delta: i128,
        now: u64,
    ) -> Result<(u128, u128), TwammError> {
        if caller != key.owner {
            return Err(TwammError::MustBeOwner);
        }
        self.execute_virtual_orders(market, now)?;

        let state = self.markets.get_mut(&market).ok_or(TwammError::NotInitialized)?;
        let sell_token = state.sell_token(key.direction);
        let buy_token = state.buy_token(key.direction);
        let order = *state.orders.get(&key).ok_or(TwammError::OrderDoesNotExist)?;
        let expired = key.expiration <= now;

        let pool = state.order_pool_mut(key.direction);
        let settle_factor = if expired {
            // the expiration boundary was crossed during the prologue, so
            // its snapshot exists; fall back to the live factor if the
            // order expired with no stretch left to execute
            pool.earnings_factor_at
                .get(&key.expiration)
                .copied()
                .unwrap_or(pool.earnings_factor_current)
        } else {
            pool.earnings_factor_current
        };
        let earned = settled_earnings(&order, settle_factor)?;

        if expired {
            if amount_delta != 0 {
                return Err(TwammError::CannotModifyCompletedOrder);
            }
            state.orders.remove(&key);
            credit(&mut self.tokens_owed, buy_token, key.owner, earned)?;
            debug!("{market}: {} settled expired {:?} order, earned {earned}", key.owner, key.direction);
            return Ok((
                self.tokens_owed(sell_token, key.owner),
                self.tokens_owed(buy_token, key.owner),
            ));
        }

        let duration_remaining = u128::from(key.expiration - now);
        let remaining = order
            .sell_rate
            .checked_mul(duration_remaining)
            .ok_or(TwammError::ArithmeticOverflow)?;
        let new_remaining = if amount_delta == CANCEL_ALL {
            0
        } else if amount_delta < 0 {
            remaining
                .checked_sub(amount_delta.unsigned_abs())
                .ok_or(TwammError::InvalidAmountDelta)?
        } else {
            remaining
                .checked_add(amount_delta as u128)
                .ok_or(TwammError::ArithmeticOverflow)?
        };
        let new_rate = new_remaining / duration_remaining;
        let new_sell_amount = new_rate
            .checked_mul(duration_remaining)
            .ok_or(TwammError::ArithmeticOverflow)?;
        // the truncation remainder of a reduced order is donated, not
        // refunded; a top-up pulls exactly the requested delta
        let refund = remaining.saturating_sub(new_remaining);

        if amount_delta > 0 {
            let pool = state.order_pool_mut(key.direction);
            pool.sell_rate_current
                .checked_add(new_rate)
                .ok_or(TwammError::ArithmeticOverflow)?;
            self.ledger
                .transfer_in(sell_token, caller, amount_delta as u128)?;
        }

        let pool = state.order_pool_mut(key.direction);
        pool.remove_sell_rate(order.sell_rate, key.expiration)?;
        if new_rate > 0 {
            pool.add_sell_rate(new_rate, key.expiration)?;
            let earnings_factor_last = pool.earnings_factor_current;
            state.orders.insert(
                key,
                Order {
                    sell_rate: new_rate,
                    earnings_factor_last,
                },
            );
        } else {
            state.orders.remove(&key);
        }

        credit(&mut self.tokens_owed, buy_token, key.owner, earned)?;
        credit(&mut self.tokens_owed, sell_token, key.owner, refund)?;
        debug!(
            "{market}: {} updated {:?} order by {amount_delta}, \
             rate {} -> {new_rate} ({new_sell_amount} committed)",
            key.owner, key.direction, order.sell_rate
        );
        Ok((
            self.tokens_owed(sell_token, key.owner),
            self.tokens_owed(buy_token, key.owner),
        ))
    }

    /// Pays out owed tokens to `to`, capped at what is owed and what the
    /// engine actually holds. Never fails on shortfall; returns the amount
    /// paid.
    pub fn claim_tokens(
        &mut self,
        token: TokenId,
        caller: AccountId,
        to: AccountId,
        amount_requested: u128,
    ) -> Result<u128, TwammError> {
        let owed = self.tokens_owed(token, caller);
        let amount = amount_requested
            .min(owed)
            .min(self.ledger.engine_balance(token));
        if amount == 0 {
            return Ok(0);
        }
        self.ledger.transfer_out(token, to, amount)?;
        if let Some(balance) = self.tokens_owed.get_mut(&(token, caller)) {
            *balance -= amount;
            if *balance == 0 {
                self.tokens_owed.remove(&(token, caller));
            }
        }
        debug!("{caller} claimed {amount} of {token} to {to}");
        Ok(amount)
    }
}

/// Earnings owed to an order against a settled pool factor.
fn settled_earnings(order: &Order, settle_factor: U256) -> Result<u128, TwammError> {
    let factor_delta = settle_factor
        .checked_sub(order.earnings_factor_last)
        .ok_or(TwammError::ArithmeticOverflow)?;
    let amount = factor_delta
        .checked_mul(U256::from(order.sell_rate))
        .ok_or(TwammError::ArithmeticOverflow)?
        >> Q64_RESOLUTION;
    let (hi, lo) = amount.into_words();
    if hi != 0 {
        return Err(TwammError::ArithmeticOverflow);
    }
    Ok(lo)
}

fn credit(
    owed: &mut HashMap<(TokenId, AccountId), u128>,
    token: TokenId,
    account: AccountId,
    amount: u128,
) -> Result<(), TwammError> {
    if amount == 0 {
        return Ok(());
    }
    let balance = owed.entry((token, account)).or_default();
    *balance = balance
        .checked_add(amount)
        .ok_or(TwammError::ArithmeticOverflow)?;
    Ok(())
}
