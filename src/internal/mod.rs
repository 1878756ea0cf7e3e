// SPDX-License-Identifier: MPL-2.0

//! Non exposed modules.

mod arena;
mod core;
mod incompatibility;
mod partial_solution;
mod small_map;
mod small_vec;

pub(crate) use self::core::State;
pub(crate) use self::incompatibility::Incompatibility;
pub(crate) use self::small_vec::SmallVec;
