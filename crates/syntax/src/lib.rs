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

//! The syntax tree handed to the lowering stage by an external parser.
//!
//! Trees are immutable once built. Every node carries its source span and whether it starts a
//! new source line; everything else is kind-specific. The types derive `serde` so a parser
//! living in another process (or another language) can hand trees over as JSON.

pub mod build;
mod node;
mod params;
mod pattern;
mod span;
mod target;

pub use node::{
    BlockArgument, BlockLiteral, CallNode, ConstRef, ConstScope, DefNode, HashElement, InClause,
    NodeKind, RescueClause, SyntaxNode, WhenClause,
};
pub use params::{
    BlockParam, KeywordParam, KeywordRestParam, OptionalParam, ParamTarget, Parameters,
    RequiredParam, RestParam,
};
pub use pattern::{Guard, HashPatternElement, HashPatternRest, Pattern, PatternKind, PatternRest};
pub use span::Span;
pub use target::{AssignOperator, MultiTarget, OpTarget, RestTarget, Target};
