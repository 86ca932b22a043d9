// Copyright (C) 2025 Ryan Daum <ryan.daum@gmail.com> This program is free
// software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, version
// 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Lowering of parsed syntax trees into executable node trees.
//!
//! Lowering resolves every local variable to a frame slot, expands parameter lists into explicit
//! argument-loading preludes, gives each closure its proc and lambda entry points, rewrites bare
//! `super` into a reload of the enclosing method's parameters, and expands pattern matching into
//! primitive tests. The result is a [`CompiledUnit`](garnet_ir::CompiledUnit) per script, method
//! and module body.

mod arguments;
pub mod cache;
mod closures;
mod env;
mod lower;
mod parameters;
mod patterns;
mod reload;
mod session;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

#[cfg(test)]
mod lower_tests;
#[cfg(test)]
mod tests;

pub use crate::cache::UnitCache;
pub use crate::closures::lower_closure;
pub use crate::env::{Environment, Scope, ScopeId};
pub use crate::lower::{lower_method_body, lower_top_level};
pub use crate::parameters::{ParameterNames, arity_of, descriptors_of};
pub use crate::session::LowerSession;
