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
use strum::{Display, IntoStaticStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum WarningKind {
    UselessLiteralInVoidContext,
    LiteralInCondition,
    DuplicatedWhenClause,
    ElseWithoutRescue,
}

/// A non-fatal notice raised while lowering. The lowerer only records these; they are handed to
/// the evaluator with the compiled unit and printed (or not) when it first runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub file: String,
    pub span: Span,
    pub message: String,
}

impl Warning {
    pub fn new(kind: WarningKind, file: &str, span: Span, message: impl Into<String>) -> Self {
        Self {
            kind,
            file: file.to_string(),
            span,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: warning: {}", self.file, self.span.line, self.message)
    }
}
