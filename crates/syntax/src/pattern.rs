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

use serde::{Deserialize, Serialize};

use crate::node::SyntaxNode;
use crate::span::Span;

/// A `case/in` pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub kind: PatternKind,
    #[serde(default)]
    pub span: Span,
}

impl Pattern {
    pub fn new(kind: PatternKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    /// Any expression matched with `===`: literals, ranges, constants.
    Value(Box<SyntaxNode>),
    /// `Const[pre, *rest, post]`
    Array {
        #[serde(default)]
        constant: Option<Box<SyntaxNode>>,
        #[serde(default)]
        requireds: Vec<Pattern>,
        #[serde(default)]
        rest: Option<PatternRest>,
        #[serde(default)]
        posts: Vec<Pattern>,
    },
    /// `[*, middle, *]`
    Find {
        #[serde(default)]
        constant: Option<Box<SyntaxNode>>,
        left: PatternRest,
        requireds: Vec<Pattern>,
        right: PatternRest,
    },
    /// `Const(key: pattern, **rest)`
    Hash {
        #[serde(default)]
        constant: Option<Box<SyntaxNode>>,
        #[serde(default)]
        elements: Vec<HashPatternElement>,
        #[serde(default)]
        rest: Option<HashPatternRest>,
    },
    Alternation {
        left: Box<Pattern>,
        right: Box<Pattern>,
    },
    /// `pattern => name`
    Capture {
        pattern: Box<Pattern>,
        name: String,
    },
    /// A bare identifier: always matches and binds.
    Bind {
        name: String,
    },
    /// `^name`, `^@ivar`, `^(expr)`
    Pin(Box<SyntaxNode>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternRest {
    Named(String),
    /// `*`
    Anonymous,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HashPatternElement {
    pub key: String,
    /// `None` for `key:` alone, which binds a local named after the key.
    #[serde(default)]
    pub pattern: Option<Pattern>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashPatternRest {
    Named(String),
    Anonymous,
    /// `**nil`
    NoKeywords,
}

/// `in pattern if cond` / `in pattern unless cond`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guard {
    pub condition: Box<SyntaxNode>,
    #[serde(default)]
    pub negated: bool,
}
