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

use crate::node::{ConstRef, SyntaxNode};

/// Something that can be assigned to by multiple assignment, `for` or `rescue => x`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    Local {
        name: String,
    },
    Instance {
        name: String,
    },
    ClassVar {
        name: String,
    },
    Global {
        name: String,
    },
    Constant(ConstRef),
    Attribute {
        receiver: Box<SyntaxNode>,
        name: String,
        #[serde(default)]
        safe_navigation: bool,
    },
    Index {
        receiver: Box<SyntaxNode>,
        #[serde(default)]
        arguments: Vec<SyntaxNode>,
    },
    /// `(a, b)` nested in a multiple-assignment target list.
    Nested(MultiTarget),
}

/// `lefts, *rest, rights = ...`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MultiTarget {
    #[serde(default)]
    pub lefts: Vec<Target>,
    #[serde(default)]
    pub rest: Option<RestTarget>,
    #[serde(default)]
    pub rights: Vec<Target>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestTarget {
    Named(Box<Target>),
    /// `a, * = ...`
    Anonymous,
    /// `a, = ...`
    Implicit,
}

/// The left-hand side of `x op= value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpTarget {
    Local {
        name: String,
    },
    Instance {
        name: String,
    },
    ClassVar {
        name: String,
    },
    Global {
        name: String,
    },
    Constant(ConstRef),
    Attribute {
        receiver: Box<SyntaxNode>,
        name: String,
        #[serde(default)]
        safe_navigation: bool,
    },
    Index {
        receiver: Box<SyntaxNode>,
        #[serde(default)]
        arguments: Vec<SyntaxNode>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignOperator {
    /// `&&=`
    And,
    /// `||=`
    Or,
    /// `+=`, `<<=`, ...: carries the binary operator's method name.
    Binary(String),
}
