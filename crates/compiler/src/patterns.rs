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

//! The pattern matcher: `case/in` patterns become boolean condition trees.
//!
//! Conditions are chained with short-circuit `And`, left to right, so bindings made by an earlier
//! element are visible to later ones and to the clause's guard. Deconstructed arrays and hashes
//! are held in hidden temps and never re-evaluated.

use garnet_common::CompileError;
use garnet_ir::{ArgumentSource, FindRestSide, Node, Symbol};
use garnet_syntax::{HashPatternElement, HashPatternRest, Pattern, PatternKind, PatternRest};

use crate::lower::{Lowerer, context};

/// `a && b && c`, nested to the right.
fn all(conditions: Vec<Node>) -> Node {
    conditions
        .into_iter()
        .rev()
        .reduce(|rest, condition| Node::and(condition, rest))
        .unwrap_or_else(|| Node::boolean(true))
}

fn visible(name: &str) -> Option<&str> {
    (!name.starts_with('_')).then_some(name)
}

/// The first name a pattern would bind, ignoring `_`-prefixed ones.
fn first_binding(pattern: &Pattern) -> Option<&str> {
    match &pattern.kind {
        PatternKind::Value(_) | PatternKind::Pin(_) => None,
        PatternKind::Bind { name } => visible(name),
        PatternKind::Capture { pattern, name } => {
            visible(name).or_else(|| first_binding(pattern))
        }
        PatternKind::Alternation { left, right } => {
            first_binding(left).or_else(|| first_binding(right))
        }
        PatternKind::Array {
            requireds,
            rest,
            posts,
            ..
        } => requireds
            .iter()
            .chain(posts)
            .find_map(first_binding)
            .or_else(|| match rest {
                Some(PatternRest::Named(name)) => visible(name),
                _ => None,
            }),
        PatternKind::Find {
            left,
            requireds,
            right,
            ..
        } => requireds.iter().find_map(first_binding).or_else(|| {
            [left, right].into_iter().find_map(|rest| match rest {
                PatternRest::Named(name) => visible(name),
                PatternRest::Anonymous => None,
            })
        }),
        PatternKind::Hash { elements, rest, .. } => elements
            .iter()
            .find_map(|element| match &element.pattern {
                Some(pattern) => first_binding(pattern),
                None => visible(&element.key),
            })
            .or_else(|| match rest {
                Some(HashPatternRest::Named(name)) => visible(name),
                _ => None,
            }),
    }
}

impl Lowerer<'_> {
    /// A condition that is true when `value` matches, binding pattern variables as it goes.
    /// `value` must be free of side effects; it may be evaluated more than once.
    pub(crate) fn lower_pattern(
        &mut self,
        pattern: &Pattern,
        value: Node,
    ) -> Result<Node, CompileError> {
        match &pattern.kind {
            PatternKind::Value(expression) | PatternKind::Pin(expression) => {
                let expected = self.lower_node(expression)?;
                Ok(Node::case_equal(expected, value))
            }
            PatternKind::Bind { name } => self.bind_pattern_variable(name, value),
            PatternKind::Capture { pattern, name } => {
                let matched = self.lower_pattern(pattern, value.clone())?;
                let bound = self.bind_pattern_variable(name, value)?;
                Ok(Node::and(matched, bound))
            }
            PatternKind::Alternation { left, right } => {
                if let Some(name) = first_binding(left).or_else(|| first_binding(right)) {
                    return Err(CompileError::UnsupportedPattern {
                        context: context(pattern.span),
                        reason: format!("illegal variable in alternative pattern ({name})"),
                    });
                }
                let left = self.lower_pattern(left, value.clone())?;
                let right = self.lower_pattern(right, value)?;
                Ok(Node::or(left, right))
            }
            PatternKind::Array {
                constant,
                requireds,
                rest,
                posts,
            } => {
                let mut conditions = vec![];
                if let Some(constant) = constant {
                    let constant = self.lower_node(constant)?;
                    conditions.push(Node::case_equal(constant, value.clone()));
                }
                let array = self.temp("pattern_array")?;
                conditions.push(Node::Sequence(vec![
                    Node::write(array, Node::DeconstructArray(Box::new(value))),
                    Node::ArrayPatternLengthCheck {
                        array: Box::new(Node::read(array)),
                        length: requireds.len() + posts.len(),
                        exact: rest.is_none(),
                    },
                ]));
                for (index, element) in requireds.iter().enumerate() {
                    let item = Node::ArrayIndex {
                        array: Box::new(Node::read(array)),
                        index: index as i64,
                    };
                    conditions.push(self.lower_pattern(element, item)?);
                }
                if let Some(PatternRest::Named(name)) = rest {
                    let middle = Node::ReadRestArgument {
                        source: ArgumentSource::Array(array),
                        from: requireds.len(),
                        post: posts.len(),
                    };
                    conditions.push(self.bind_pattern_variable(name, middle)?);
                }
                for (j, element) in posts.iter().enumerate() {
                    let item = Node::ArrayIndex {
                        array: Box::new(Node::read(array)),
                        index: j as i64 - posts.len() as i64,
                    };
                    conditions.push(self.lower_pattern(element, item)?);
                }
                Ok(all(conditions))
            }
            PatternKind::Find {
                constant,
                left,
                requireds,
                right,
            } => {
                let mut conditions = vec![];
                if let Some(constant) = constant {
                    let constant = self.lower_node(constant)?;
                    conditions.push(Node::case_equal(constant, value.clone()));
                }
                let array = self.temp("pattern_array")?;
                let cursor = self.temp("pattern_cursor")?;
                let width = requireds.len();
                conditions.push(Node::Sequence(vec![
                    Node::write(array, Node::DeconstructArray(Box::new(value))),
                    Node::not(Node::IsNil(Box::new(Node::read(array)))),
                ]));
                conditions.push(Node::ArrayIsAtLeast {
                    array: Box::new(Node::read(array)),
                    length: width,
                });
                let mut window = vec![];
                for (offset, element) in requireds.iter().enumerate() {
                    let item = Node::ArrayIndexAt {
                        array: Box::new(Node::read(array)),
                        cursor,
                        offset,
                    };
                    window.push(self.lower_pattern(element, item)?);
                }
                conditions.push(Node::FindPattern {
                    array: Box::new(Node::read(array)),
                    width,
                    cursor,
                    matcher: Box::new(all(window)),
                });
                let sides = [
                    (left, FindRestSide::Before),
                    (right, FindRestSide::After { width }),
                ];
                for (rest, side) in sides {
                    if let PatternRest::Named(name) = rest {
                        let slice = Node::FindPatternRest {
                            array: Box::new(Node::read(array)),
                            cursor,
                            side,
                        };
                        conditions.push(self.bind_pattern_variable(name, slice)?);
                    }
                }
                Ok(all(conditions))
            }
            PatternKind::Hash {
                constant,
                elements,
                rest,
            } => self.lower_hash_pattern(constant.as_deref(), elements, rest.as_ref(), value),
        }
    }

    fn lower_hash_pattern(
        &mut self,
        constant: Option<&garnet_syntax::SyntaxNode>,
        elements: &[HashPatternElement],
        rest: Option<&HashPatternRest>,
        value: Node,
    ) -> Result<Node, CompileError> {
        let mut conditions = vec![];
        if let Some(constant) = constant {
            let constant = self.lower_node(constant)?;
            conditions.push(Node::case_equal(constant, value.clone()));
        }
        let keys: Vec<Symbol> = elements.iter().map(|e| Symbol::new(&e.key)).collect();
        // A named rest needs every key; otherwise only the ones the pattern mentions.
        let requested = match rest {
            Some(HashPatternRest::Named(_)) => None,
            _ => Some(keys.clone()),
        };
        let hash = self.temp("pattern_hash")?;
        conditions.push(Node::Sequence(vec![
            Node::write(
                hash,
                Node::DeconstructKeys {
                    value: Box::new(value),
                    keys: requested,
                },
            ),
            Node::not(Node::IsNil(Box::new(Node::read(hash)))),
        ]));

        for (element, key) in elements.iter().zip(&keys) {
            let found = self.temp("pattern_value")?;
            conditions.push(Node::Sequence(vec![
                Node::write(
                    found,
                    Node::HashPatternValue {
                        hash: Box::new(Node::read(hash)),
                        key: key.clone(),
                    },
                ),
                Node::not(Node::IsAbsent(Box::new(Node::read(found)))),
            ]));
            conditions.push(match &element.pattern {
                Some(pattern) => self.lower_pattern(pattern, Node::read(found))?,
                None => self.bind_pattern_variable(&element.key, Node::read(found))?,
            });
        }

        let leftovers = || Node::HashExcept {
            hash: Box::new(Node::read(hash)),
            keys: keys.clone(),
        };
        match rest {
            Some(HashPatternRest::Named(name)) => {
                conditions.push(self.bind_pattern_variable(name, leftovers())?);
            }
            Some(HashPatternRest::NoKeywords) => {
                conditions.push(Node::HashIsEmpty(Box::new(leftovers())));
            }
            Some(HashPatternRest::Anonymous) => {}
            None if elements.is_empty() => {
                conditions.push(Node::HashIsEmpty(Box::new(Node::read(hash))));
            }
            None => {}
        }
        Ok(all(conditions))
    }

    fn bind_pattern_variable(&mut self, name: &str, value: Node) -> Result<Node, CompileError> {
        let target = self.env.find_or_declare(name)?;
        Ok(Node::execute_and_return_true(Node::write(target, value)))
    }
}
