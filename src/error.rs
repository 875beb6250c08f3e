//
// Copyright (c) the twamm-core contributors
//
// Licensed under the MIT license.
// See the LICENSE file in the project root for license information.
//

use thiserror::Error;

/// Failure modes of the engine.
///
/// Order-lifecycle violations are rejected before any state mutation;
/// arithmetic and tick-state violations abort the whole operation with no
/// partial state committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TwammError {
    #[error("market not initialized")]
    NotInitialized,
    #[error("market already exists")]
    MarketAlreadyExists,
    #[error("caller is not the order owner")]
    MustBeOwner,
    #[error("expiration is not in the future")]
    ExpirationBeforeCurrentTime,
    #[error("expiration does not fall on the expiration interval")]
    ExpirationNotOnInterval,
    #[error("sell rate cannot be zero")]
    SellRateZero,
    #[error("an order already exists for this key")]
    OrderAlreadyExists,
    #[error("order does not exist")]
    OrderDoesNotExist,
    #[error("cannot modify a completed order")]
    CannotModifyCompletedOrder,
    #[error("amount delta would make the remaining sell amount negative")]
    InvalidAmountDelta,
    #[error("timestamp precedes the last executed timestamp")]
    InvalidTimestamp,
    #[error("arithmetic over- or underflow")]
    ArithmeticOverflow,
    #[error("tick index out of bounds")]
    TickIndexOutOfBounds,
    #[error("sqrt price out of bounds")]
    SqrtPriceOutOfBounds,
    #[error("closed-form price solution failed")]
    PriceSolutionFailed,
    #[error("insufficient balance")]
    InsufficientBalance,
    #[error("invalid engine configuration")]
    InvalidConfiguration,
}
