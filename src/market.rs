//
// Copyright (c) the twamm-core contributors
//
// Licensed under the MIT license.
// See the LICENSE file in the project root for license information.
//

use std::collections::HashMap;

use crate::{Order, OrderDirection, OrderKey, OrderPool, TokenId};

/// All long-term-order state of one market: the two directional aggregate
/// pools, the individual order records, and the watermark up to which
/// virtual orders have been executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketState {
    pub token_a: TokenId,
    pub token_b: TokenId,
    pub last_virtual_order_timestamp: u64,
    pub order_pool_a_to_b: OrderPool,
    pub order_pool_b_to_a: OrderPool,
    pub orders: HashMap<OrderKey, Order>,
}

impl MarketState {
    pub fn new(token_a: TokenId, token_b: TokenId, now: u64) -> Self {
        Self {
            token_a,
            token_b,
            last_virtual_order_timestamp: now,
            order_pool_a_to_b: OrderPool::default(),
            order_pool_b_to_a: OrderPool::default(),
            orders: HashMap::new(),
        }
    }

    pub fn order_pool(&self, direction: OrderDirection) -> &OrderPool {
        match direction {
            OrderDirection::AToB => &self.order_pool_a_to_b,
            OrderDirection::BToA => &self.order_pool_b_to_a,
        }
    }

    pub fn order_pool_mut(&mut self, direction: OrderDirection) -> &mut OrderPool {
        match direction {
            OrderDirection::AToB => &mut self.order_pool_a_to_b,
            OrderDirection::BToA => &mut self.order_pool_b_to_a,
        }
    }

    /// The token an order in the given direction sells.
    pub fn sell_token(&self, direction: OrderDirection) -> TokenId {
        match direction {
            OrderDirection::AToB => self.token_a,
            OrderDirection::BToA => self.token_b,
        }
    }

    /// The token an order in the given direction earns.
    pub fn buy_token(&self, direction: OrderDirection) -> TokenId {
        match direction {
            OrderDirection::AToB => self.token_b,
            OrderDirection::BToA => self.token_a,
        }
    }

    pub fn get_order(&self, key: &OrderKey) -> Option<&Order> {
        self.orders.get(key)
    }
}
