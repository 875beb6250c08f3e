//
// Copyright (c) the twamm-core contributors
//
// Licensed under the MIT license.
// See the LICENSE file in the project root for license information.
//

/// Q64.64 fixed-point one: scales sqrt prices and earnings factors.
pub const Q64: u128 = 1 << 64;

/// Width of the Q64.64 fraction, typed for 256-bit shifts.
pub const Q64_RESOLUTION: u32 = 64;

/// The minimum tick index.
pub const MIN_TICK_INDEX: i32 = -443636;

/// The maximum tick index.
pub const MAX_TICK_INDEX: i32 = 443636;

/// Sqrt price at `MIN_TICK_INDEX`, in Q64.64.
pub const MIN_SQRT_PRICE: u128 = 4295048016;

/// Sqrt price at `MAX_TICK_INDEX`, in Q64.64.
pub const MAX_SQRT_PRICE: u128 = 79226673515401279963822778343;

/// Default granularity all order expirations must align to, in seconds.
pub const DEFAULT_EXPIRATION_INTERVAL: u64 = 3600;

/// Sentinel `amount_delta` for [`update_order`](crate::TwammEngine::update_order)
/// that cancels the entire unsold remainder of an order.
pub const CANCEL_ALL: i128 = i128::MIN;
