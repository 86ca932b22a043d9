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

//! Identity tokens tying `return` and `break` to the method, lambda or loop that catches them.
//!
//! Tokens compare by identity, never by value: two tokens minted separately are different even
//! if their ordinals collide across compilations. The ordinal exists only for dumps.

use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

#[derive(Debug)]
pub struct Token {
    ordinal: u32,
}

/// The target of a `return`.
#[derive(Clone)]
pub enum ReturnId {
    /// Blocks directly inside a module body. A `return` there is invalid at run time unless the
    /// block ends up used as a lambda.
    ModuleBody,
    Unique(Arc<Token>),
}

impl ReturnId {
    pub const MODULE_BODY: ReturnId = ReturnId::ModuleBody;

    pub fn is_module_body(&self) -> bool {
        matches!(self, ReturnId::ModuleBody)
    }
}

impl PartialEq for ReturnId {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ReturnId::ModuleBody, ReturnId::ModuleBody) => true,
            (ReturnId::Unique(a), ReturnId::Unique(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Eq for ReturnId {}

impl Display for ReturnId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ReturnId::ModuleBody => write!(f, "ret#module"),
            ReturnId::Unique(t) => write!(f, "ret#{}", t.ordinal),
        }
    }
}

impl Debug for ReturnId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

/// The target of a `break`: a loop, or the call site a literal block was passed to.
#[derive(Clone)]
pub struct BreakId(Arc<Token>);

impl PartialEq for BreakId {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for BreakId {}

impl Display for BreakId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "brk#{}", self.0.ordinal)
    }
}

impl Debug for BreakId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

/// How a lowered `return` leaves its frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnTarget {
    /// Directly out of the current method or top-level frame.
    Local,
    /// Unwinds through block frames to whoever owns the id.
    Dynamic(ReturnId),
    /// A `return` that can never succeed when run as a proc (a block directly in a module body).
    Invalid,
}

/// Mints control-flow tokens for one compilation. Ordinals start at 1.
#[derive(Debug, Default)]
pub struct ControlIds {
    next: u32,
}

impl ControlIds {
    pub fn new() -> Self {
        Self::default()
    }

    fn token(&mut self) -> Arc<Token> {
        self.next += 1;
        Arc::new(Token { ordinal: self.next })
    }

    pub fn return_id(&mut self) -> ReturnId {
        ReturnId::Unique(self.token())
    }

    pub fn break_id(&mut self) -> BreakId {
        BreakId(self.token())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_compare_by_identity() {
        let mut first = ControlIds::new();
        let mut second = ControlIds::new();
        let a = first.return_id();
        let b = second.return_id();
        // Same ordinal, different identity.
        assert_eq!(a.to_string(), b.to_string());
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        assert_eq!(ReturnId::MODULE_BODY, ReturnId::ModuleBody);
        assert_ne!(a, ReturnId::MODULE_BODY);

        let x = first.break_id();
        assert_eq!(x, x.clone());
        assert_ne!(x, second.break_id());
    }
}
