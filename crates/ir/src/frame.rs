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

use serde::Serialize;
use std::fmt::{Display, Formatter};
use strum::Display as StrumDisplay;

use crate::symbol::Symbol;

/// Index into one runtime frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Slot(pub u16);

/// Every frame keeps its receiver in slot 0.
pub const SELF_SLOT: Slot = Slot(0);
/// Method, lambda and top-level frames reserve slot 1 for the `$~`/`$_` cell.
pub const SPECIAL_VARIABLES_SLOT: Slot = Slot(1);

// Hidden slot names start with `%`, which no source identifier can.
pub const SELF_NAME: &str = "%self";
pub const SPECIAL_VARIABLES_NAME: &str = "%special_variables";
/// The block passed to the current method, whether or not it has a named `&blk` parameter.
pub const METHOD_BLOCK_NAME: &str = "%method_block";
/// `*`, and the positional part of `...`.
pub const ANONYMOUS_REST_NAME: &str = "%rest";
/// `**`, and the keyword part of `...`.
pub const ANONYMOUS_KEYWORD_REST_NAME: &str = "%kwrest";
/// `&`, and the block part of `...`.
pub const ANONYMOUS_BLOCK_NAME: &str = "%block";

pub fn is_hidden_name(name: &str) -> bool {
    name.starts_with('%')
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, StrumDisplay)]
#[strum(serialize_all = "snake_case")]
pub enum ScopeKind {
    Method,
    Block,
    Lambda,
    ModuleBody,
    TopLevel,
}

impl ScopeKind {
    /// Blocks and lambdas see their enclosing scope's locals.
    pub fn is_closure(&self) -> bool {
        matches!(self, ScopeKind::Block | ScopeKind::Lambda)
    }

    /// Whether the frame reserves `SPECIAL_VARIABLES_SLOT` up front.
    pub fn reserves_special_variables(&self) -> bool {
        matches!(
            self,
            ScopeKind::Method | ScopeKind::Lambda | ScopeKind::TopLevel
        )
    }
}

/// A slot `depth` closure frames outward from the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FrameRef {
    pub depth: u16,
    pub slot: Slot,
}

impl FrameRef {
    pub const SELF: FrameRef = FrameRef {
        depth: 0,
        slot: SELF_SLOT,
    };

    pub fn local(slot: Slot) -> Self {
        Self { depth: 0, slot }
    }

    pub fn new(depth: u16, slot: Slot) -> Self {
        Self { depth, slot }
    }
}

impl Display for FrameRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.depth, self.slot.0)
    }
}

/// The frozen slot table of one scope. Slot `n` holds the variable named `names[n]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameLayout {
    pub kind: ScopeKind,
    names: Vec<Symbol>,
}

impl FrameLayout {
    pub fn new(kind: ScopeKind, names: Vec<Symbol>) -> Self {
        Self { kind, names }
    }

    pub fn width(&self) -> usize {
        self.names.len()
    }

    pub fn name_of(&self, slot: Slot) -> Option<&Symbol> {
        self.names.get(slot.0 as usize)
    }

    pub fn slot_of(&self, name: &str) -> Option<Slot> {
        self.names
            .iter()
            .position(|n| n.as_str() == name)
            .and_then(|i| u16::try_from(i).ok())
            .map(Slot)
    }

    /// The source-visible locals, in slot order.
    pub fn visible_names(&self) -> impl Iterator<Item = &Symbol> {
        self.names.iter().filter(|n| !is_hidden_name(n))
    }

    pub fn names(&self) -> &[Symbol] {
        &self.names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_lookup_and_hidden_names() {
        let layout = FrameLayout::new(
            ScopeKind::Method,
            vec![
                Symbol::new(SELF_NAME),
                Symbol::new(SPECIAL_VARIABLES_NAME),
                Symbol::new("a"),
                Symbol::new(METHOD_BLOCK_NAME),
                Symbol::new("b"),
            ],
        );
        assert_eq!(layout.width(), 5);
        assert_eq!(layout.slot_of("b"), Some(Slot(4)));
        assert_eq!(layout.slot_of("c"), None);
        assert_eq!(layout.name_of(Slot(2)).map(|s| s.as_str()), Some("a"));
        let visible: Vec<_> = layout.visible_names().map(|s| s.as_str()).collect();
        assert_eq!(visible, vec!["a", "b"]);
    }

    #[test]
    fn test_slot_of_past_the_slot_range() {
        let mut names: Vec<Symbol> = (0..=u16::MAX)
            .map(|i| Symbol::new(&format!("v{i}")))
            .collect();
        names.push(Symbol::new("unreachable"));
        let layout = FrameLayout::new(ScopeKind::Method, names);
        assert_eq!(layout.slot_of("v65535"), Some(Slot(u16::MAX)));
        assert_eq!(layout.slot_of("unreachable"), None);
    }

    #[test]
    fn test_special_variable_reservation() {
        assert!(ScopeKind::Method.reserves_special_variables());
        assert!(ScopeKind::Lambda.reserves_special_variables());
        assert!(ScopeKind::TopLevel.reserves_special_variables());
        assert!(!ScopeKind::Block.reserves_special_variables());
        assert!(!ScopeKind::ModuleBody.reserves_special_variables());
    }
}
