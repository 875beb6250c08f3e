//
// Copyright (c) the twamm-core contributors
//
// Licensed under the MIT license.
// See the LICENSE file in the project root for license information.
//

mod swap;
mod tick;
mod twamm;

pub use swap::*;
pub use tick::*;
pub use twamm::*;
