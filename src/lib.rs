//
// Copyright (c) the twamm-core contributors
//
// Licensed under the MIT license.
// See the LICENSE file in the project root for license information.
//

//! Virtual-order execution engine for time-weighted average market making.
//!
//! Long-term orders sell one token at a fixed per-second rate until an
//! expiration aligned to the engine's interval. Between interactions the
//! orders exist only as two directional aggregates per market; any caller
//! can catch a market up by executing its virtual orders against the price
//! curve, and order owners settle and claim proceeds afterwards.
//!
//! The engine is host-agnostic: prices and custody sit behind the
//! [`PriceCurve`] and [`TokenLedger`] traits, timestamps are passed in by
//! the caller, and all arithmetic is deterministic fixed point (Q64.64 sqrt
//! prices, 2^64-scaled earnings factors).

mod constants;
mod curve;
mod engine;
mod error;
mod executor;
mod ledger;
mod market;
mod math;
mod order_pool;
mod types;

pub use constants::*;
pub use curve::*;
pub use engine::*;
pub use error::*;
pub use executor::*;
pub use ledger::*;
pub use market::*;
pub use math::*;
pub use order_pool::*;
pub use types::*;
