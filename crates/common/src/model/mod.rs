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

use garnet_syntax::Span;
use serde::Serialize;
use std::fmt::{Display, Formatter};
use thiserror::Error;

mod pragmas;
mod warnings;

pub use pragmas::SourcePragmas;
pub use warnings::{Warning, WarningKind};

/// Where in the source a lowering error was raised.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CompileContext {
    pub line: u32,
    pub span: Span,
}

impl CompileContext {
    pub fn new(span: Span) -> Self {
        Self {
            line: span.line,
            span,
        }
    }
}

impl Display for CompileContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}", self.line)
    }
}

/// Everything lowering can fail with.
///
/// The user-visible variants correspond to programs the parser accepted but which have no
/// meaning in their position. `Internal` means the lowerer and the parser disagree about the
/// grammar, and is never the user's fault.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize)]
pub enum CompileError {
    #[error("{0}: Invalid break")]
    InvalidBreak(CompileContext),
    #[error("{0}: Invalid next")]
    InvalidNext(CompileContext),
    #[error("{0}: Invalid redo")]
    InvalidRedo(CompileContext),
    #[error("{0}: Invalid retry")]
    InvalidRetry(CompileContext),
    #[error("{0}: Invalid yield")]
    InvalidYield(CompileContext),
    #[error("{0}: Invalid return in class/module body")]
    InvalidReturn(CompileContext),
    #[error(
        "{context}: super called outside of method{}",
        define_method_note(.inside_define_method)
    )]
    SuperOutsideMethod {
        context: CompileContext,
        inside_define_method: bool,
    },
    #[error("{context}: unsupported pattern: {reason}")]
    UnsupportedPattern {
        context: CompileContext,
        reason: String,
    },
    #[error("{0}: pattern matching is disabled")]
    PatternMatchingDisabled(CompileContext),
    #[error("compilation cancelled")]
    Cancelled,
    #[error("internal error: {0}")]
    Internal(#[from] InternalError),
}

impl CompileError {
    pub fn is_internal(&self) -> bool {
        matches!(self, CompileError::Internal(_))
    }

    pub fn context(&self) -> Option<&CompileContext> {
        match self {
            CompileError::InvalidBreak(c)
            | CompileError::InvalidNext(c)
            | CompileError::InvalidRedo(c)
            | CompileError::InvalidRetry(c)
            | CompileError::InvalidYield(c)
            | CompileError::InvalidReturn(c)
            | CompileError::PatternMatchingDisabled(c) => Some(c),
            CompileError::SuperOutsideMethod { context, .. }
            | CompileError::UnsupportedPattern { context, .. } => Some(context),
            CompileError::Cancelled | CompileError::Internal(_) => None,
        }
    }
}

fn define_method_note(inside_define_method: &bool) -> &'static str {
    if *inside_define_method {
        concat!(
            " (implicit argument passing of super from method defined by define_method()",
            " is not supported)"
        )
    } else {
        ""
    }
}

/// Consistency failures inside the lowerer itself.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize)]
pub enum InternalError {
    #[error("expected a slot for `{name}` but none was declared")]
    MissingSlot { name: String },
    #[error("no lowering for `{kind}` in this position")]
    UnhandledNode { kind: String },
    #[error("frame layout was already frozen")]
    FrameAlreadyFrozen,
    #[error("declared `{name}` after its frame layout was frozen")]
    DeclareAfterFreeze { name: String },
    #[error("scope stack underflow")]
    ScopeUnderflow,
    #[error("no slot left in the frame for `{name}`")]
    TooManySlots { name: String },
}
