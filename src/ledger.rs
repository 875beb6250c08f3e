//
// Copyright (c) the twamm-core contributors
//
// Licensed under the MIT license.
// See the LICENSE file in the project root for license information.
//

use std::collections::HashMap;

use crate::{AccountId, TokenId, TwammError};

/// Custody of tokens on behalf of the engine.
///
/// Both transfers are atomic: they either move the full amount or leave all
/// balances untouched. Hosts back this with their own asset layer;
/// [`InMemoryLedger`] is a self-contained implementation for embedding and
/// tests.
pub trait TokenLedger {
    /// Pulls `amount` of `token` from `from` into engine custody.
    fn transfer_in(
        &mut self,
        token: TokenId,
        from: AccountId,
        amount: u128,
    ) -> Result<(), TwammError>;

    /// Pays `amount` of `token` out of engine custody to `to`.
    fn transfer_out(
        &mut self,
        token: TokenId,
        to: AccountId,
        amount: u128,
    ) -> Result<(), TwammError>;

    /// Tokens currently held in engine custody.
    fn engine_balance(&self, token: TokenId) -> u128;
}

/// Map-backed ledger with simple account balances and one engine custody
/// balance per token.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    accounts: HashMap<(TokenId, AccountId), u128>,
    engine: HashMap<TokenId, u128>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credits new tokens to an account.
    pub fn mint(&mut self, token: TokenId, account: AccountId, amount: u128) -> Result<(), TwammError> {
        let balance = self.accounts.entry((token, account)).or_default();
        *balance = balance
            .checked_add(amount)
            .ok_or(TwammError::ArithmeticOverflow)?;
        Ok(())
    }

    pub fn balance_of(&self, token: TokenId, account: AccountId) -> u128 {
        self.accounts.get(&(token, account)).copied().unwrap_or(0)
    }
}

impl TokenLedger for InMemoryLedger {
    fn transfer_in(
        &mut self,
        token: TokenId,
        from: AccountId,
        amount: u128,
    ) -> Result<(), TwammError> {
        let balance = self.accounts.entry((token, from)).or_default();
        *balance = balance
            .checked_sub(amount)
            .ok_or(TwammError::InsufficientBalance)?;
        let custody = self.engine.entry(token).or_default();
        *custody = custody
            .checked_add(amount)
            .ok_or(TwammError::ArithmeticOverflow)?;
        Ok(())
    }

    fn transfer_out(
        &mut self,
        token: TokenId,
        to: AccountId,
        amount: u128,
    ) -> Result<(), TwammError> {
        let custody = self.engine.entry(token).or_default();
        *custody = custody
            .checked_sub(amount)
            .ok_or(TwammError::InsufficientBalance)?;
        let balance = self.accounts.entry((token, to)).or_default();
        *balance = balance
            .checked_add(amount)
            .ok_or(TwammError::ArithmeticOverflow)?;
        Ok(())
    }

    fn engine_balance(&self, token: TokenId) -> u128 {
        self.engine.get(&token).copied().unwrap_or(0)
    }
}
