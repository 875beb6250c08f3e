//
// Copyright (c) the twamm-core contributors
//
// Licensed under the MIT license.
// See the LICENSE file in the project root for license information.
//

mod ids;
mod order;
mod pool;
mod tick;

pub use ids::*;
pub use order::*;
pub use pool::*;
pub use tick::*;
