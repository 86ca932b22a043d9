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

//! The executable side of lowering: primitive node trees and the metadata an evaluator needs to
//! run them (frame layouts, arities, parameter descriptors, closure call targets).
//!
//! Everything here is immutable once built, with two exceptions that are both build-at-most-once
//! caches: a closure's lazily compiled calling-convention entries, and a unit's deferred warnings.

mod arity;
mod control;
mod dump;
mod frame;
mod node;
mod symbol;
mod unit;
pub mod visit;

pub use arity::{ArgumentDescriptor, ArgumentKind, Arity};
pub use control::{BreakId, ControlIds, ReturnId, ReturnTarget};
pub use frame::{
    ANONYMOUS_BLOCK_NAME, ANONYMOUS_KEYWORD_REST_NAME, ANONYMOUS_REST_NAME, FrameLayout,
    FrameRef, METHOD_BLOCK_NAME, SELF_NAME, SELF_SLOT, SPECIAL_VARIABLES_NAME,
    SPECIAL_VARIABLES_SLOT, ScopeKind, Slot, is_hidden_name,
};
pub use node::{
    ArgumentSource, CallSite, ConstantScope, FindRestSide, KeywordArguments, Literal,
    MissingArgument, ModuleKind, Node, PostShape, RescueClause, RescueMatcher, SplatBehavior,
    SuperArguments,
};
pub use symbol::Symbol;
pub use unit::{
    CallTargets, CallingConvention, ClosureDefinition, ClosureKind, CompiledUnit,
    DeferredWarnings, EntryBuilder, LazyEntry, RootNode, UnitKind,
};
