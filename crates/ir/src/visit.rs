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

//! Child traversal over node trees.
//!
//! Traversal stops at the boundary of separately compiled code: closure definitions, method
//! definitions and module bodies are roots of their own and are not entered, though expressions
//! evaluated by the defining node itself (a singleton receiver, a superclass) are.

use crate::control::{ReturnId, ReturnTarget};
use crate::node::{ConstantScope, ModuleKind, Node, RescueMatcher, SuperArguments};

fn scope_child(scope: &ConstantScope) -> Option<&Node> {
    match scope {
        ConstantScope::Within(parent) => Some(parent),
        ConstantScope::Lexical { .. } | ConstantScope::TopLevel => None,
    }
}

fn scope_child_mut(scope: &mut ConstantScope) -> Option<&mut Node> {
    match scope {
        ConstantScope::Within(parent) => Some(parent),
        ConstantScope::Lexical { .. } | ConstantScope::TopLevel => None,
    }
}

/// Calls `f` on each direct child of `node`.
pub fn for_each_child<'a>(node: &'a Node, f: &mut dyn FnMut(&'a Node)) {
    match node {
        Node::Literal(_)
        | Node::StringLiteral { .. }
        | Node::ReadLocal(_)
        | Node::ReadReceiver
        | Node::ReadInstanceVariable(_)
        | Node::ReadClassVariable(_)
        | Node::ReadGlobal(_)
        | Node::AliasGlobal { .. }
        | Node::ReadSpecialVariable { .. }
        | Node::ReadBackReference { .. }
        | Node::ReadNthReference { .. }
        | Node::CurrentException
        | Node::Redo
        | Node::Retry
        | Node::InitFlipFlopStates(_)
        | Node::Closure(_)
        | Node::CheckArity(_)
        | Node::CheckKeywords(_)
        | Node::CheckNoKeywords
        | Node::ShouldDestructure
        | Node::SaveMethodBlock(_)
        | Node::ReadPreArgument { .. }
        | Node::ReadRestArgument { .. }
        | Node::ReadPostArgument { .. }
        | Node::ReadKeywordRest { .. } => {}
        Node::Interpolation(parts)
        | Node::DynamicSymbol(parts)
        | Node::DynamicRegex { parts, .. }
        | Node::ArrayLiteral(parts)
        | Node::ArrayConcat(parts)
        | Node::HashConcat(parts)
        | Node::Sequence(parts)
        | Node::Undef(parts) => parts.iter().for_each(f),
        Node::HashLiteral(pairs) => {
            for (key, value) in pairs {
                f(key);
                f(value);
            }
        }
        Node::Once(value)
        | Node::SplatCast { value, .. }
        | Node::WriteLocal { value, .. }
        | Node::WriteInstanceVariable { value, .. }
        | Node::WriteClassVariable { value, .. }
        | Node::WriteGlobal { value, .. }
        | Node::WriteSpecialVariable { value, .. }
        | Node::IsDefined(value)
        | Node::Defined(value)
        | Node::Not(value)
        | Node::IsNil(value)
        | Node::Break { value, .. }
        | Node::Next(value)
        | Node::Return { value, .. }
        | Node::Line { body: value, .. }
        | Node::FrameOnStack { body: value, .. }
        | Node::CatchBreak { body: value, .. }
        | Node::RaiseNoMatchingPattern(value)
        | Node::ToProc(value)
        | Node::ReadOptionalArgument { default: value, .. }
        | Node::ArrayIndex { array: value, .. }
        | Node::ArrayIsAtLeast { array: value, .. }
        | Node::ArrayPatternLengthCheck { array: value, .. }
        | Node::DeconstructArray(value)
        | Node::DeconstructKeys { value, .. }
        | Node::HashPatternValue { hash: value, .. }
        | Node::IsAbsent(value)
        | Node::HashExcept { hash: value, .. }
        | Node::HashIsEmpty(value)
        | Node::ArrayIndexAt { array: value, .. }
        | Node::FindPatternRest { array: value, .. }
        | Node::ExecuteAndReturnTrue(value) => f(value),
        Node::ReadKeywordArgument { default, .. } => {
            if let Some(default) = default {
                f(default);
            }
        }
        Node::Range { from, to, .. } => {
            f(from);
            f(to);
        }
        Node::ReadConstant { scope, .. } => {
            if let Some(parent) = scope_child(scope) {
                f(parent);
            }
        }
        Node::WriteConstant { scope, value, .. } => {
            if let Some(parent) = scope_child(scope) {
                f(parent);
            }
            f(value);
        }
        Node::If {
            condition,
            then,
            otherwise,
        } => {
            f(condition);
            f(then);
            f(otherwise);
        }
        Node::And(left, right) | Node::Or(left, right) => {
            f(left);
            f(right);
        }
        Node::While {
            condition, body, ..
        } => {
            f(condition);
            f(body);
        }
        Node::TryRescue {
            body,
            clauses,
            otherwise,
        } => {
            f(body);
            for clause in clauses {
                match &clause.matcher {
                    RescueMatcher::StandardError => {}
                    RescueMatcher::Classes(classes) => classes.iter().for_each(&mut *f),
                    RescueMatcher::Splat(classes) => f(classes),
                }
                f(&clause.body);
            }
            if let Some(otherwise) = otherwise {
                f(otherwise);
            }
        }
        Node::Ensure { body, ensure } => {
            f(body);
            f(ensure);
        }
        Node::FlipFlop { begin, end, .. } => {
            f(begin);
            f(end);
        }
        Node::WhenSplat { cases, value } => {
            f(cases);
            if let Some(value) = value {
                f(value);
            }
        }
        Node::Call(call) => {
            f(&call.receiver);
            call.arguments.iter().for_each(&mut *f);
            if let Some(block) = &call.block {
                f(block);
            }
        }
        Node::Super { arguments, block } => {
            match arguments {
                SuperArguments::Explicit { arguments, .. } => arguments.iter().for_each(&mut *f),
                SuperArguments::Reload {
                    arguments,
                    keywords,
                    ..
                } => {
                    arguments.iter().for_each(&mut *f);
                    if let Some(keywords) = keywords {
                        f(keywords);
                    }
                }
            }
            if let Some(block) = block {
                f(block);
            }
        }
        Node::Yield { arguments, .. } => arguments.iter().for_each(f),
        Node::MethodDefinition { singleton, .. } => {
            if let Some(singleton) = singleton {
                f(singleton);
            }
        }
        Node::ModuleDefinition { kind, scope, .. } => {
            if let Some(parent) = scope_child(scope) {
                f(parent);
            }
            match kind {
                ModuleKind::Class {
                    superclass: Some(superclass),
                } => f(superclass),
                ModuleKind::SingletonClass { of } => f(of),
                ModuleKind::Class { superclass: None } | ModuleKind::Module => {}
            }
        }
        Node::Alias { new_name, old_name } => {
            f(new_name);
            f(old_name);
        }
        Node::FindPattern { array, matcher, .. } => {
            f(array);
            f(matcher);
        }
    }
}

/// Calls `f` on each direct child of `node`, mutably.
pub fn for_each_child_mut(node: &mut Node, f: &mut dyn FnMut(&mut Node)) {
    match node {
        Node::Literal(_)
        | Node::StringLiteral { .. }
        | Node::ReadLocal(_)
        | Node::ReadReceiver
        | Node::ReadInstanceVariable(_)
        | Node::ReadClassVariable(_)
        | Node::ReadGlobal(_)
        | Node::AliasGlobal { .. }
        | Node::ReadSpecialVariable { .. }
        | Node::ReadBackReference { .. }
        | Node::ReadNthReference { .. }
        | Node::CurrentException
        | Node::Redo
        | Node::Retry
        | Node::InitFlipFlopStates(_)
        | Node::Closure(_)
        | Node::CheckArity(_)
        | Node::CheckKeywords(_)
        | Node::CheckNoKeywords
        | Node::ShouldDestructure
        | Node::SaveMethodBlock(_)
        | Node::ReadPreArgument { .. }
        | Node::ReadRestArgument { .. }
        | Node::ReadPostArgument { .. }
        | Node::ReadKeywordRest { .. } => {}
        Node::Interpolation(parts)
        | Node::DynamicSymbol(parts)
        | Node::DynamicRegex { parts, .. }
        | Node::ArrayLiteral(parts)
        | Node::ArrayConcat(parts)
        | Node::HashConcat(parts)
        | Node::Sequence(parts)
        | Node::Undef(parts) => parts.iter_mut().for_each(f),
        Node::HashLiteral(pairs) => {
            for (key, value) in pairs {
                f(key);
                f(value);
            }
        }
        Node::Once(value)
        | Node::SplatCast { value, .. }
        | Node::WriteLocal { value, .. }
        | Node::WriteInstanceVariable { value, .. }
        | Node::WriteClassVariable { value, .. }
        | Node::WriteGlobal { value, .. }
        | Node::WriteSpecialVariable { value, .. }
        | Node::IsDefined(value)
        | Node::Defined(value)
        | Node::Not(value)
        | Node::IsNil(value)
        | Node::Break { value, .. }
        | Node::Next(value)
        | Node::Return { value, .. }
        | Node::Line { body: value, .. }
        | Node::FrameOnStack { body: value, .. }
        | Node::CatchBreak { body: value, .. }
        | Node::RaiseNoMatchingPattern(value)
        | Node::ToProc(value)
        | Node::ReadOptionalArgument { default: value, .. }
        | Node::ArrayIndex { array: value, .. }
        | Node::ArrayIsAtLeast { array: value, .. }
        | Node::ArrayPatternLengthCheck { array: value, .. }
        | Node::DeconstructArray(value)
        | Node::DeconstructKeys { value, .. }
        | Node::HashPatternValue { hash: value, .. }
        | Node::IsAbsent(value)
        | Node::HashExcept { hash: value, .. }
        | Node::HashIsEmpty(value)
        | Node::ArrayIndexAt { array: value, .. }
        | Node::FindPatternRest { array: value, .. }
        | Node::ExecuteAndReturnTrue(value) => f(value),
        Node::ReadKeywordArgument { default, .. } => {
            if let Some(default) = default {
                f(default);
            }
        }
        Node::Range { from, to, .. } => {
            f(from);
            f(to);
        }
        Node::ReadConstant { scope, .. } => {
            if let Some(parent) = scope_child_mut(scope) {
                f(parent);
            }
        }
        Node::WriteConstant { scope, value, .. } => {
            if let Some(parent) = scope_child_mut(scope) {
                f(parent);
            }
            f(value);
        }
        Node::If {
            condition,
            then,
            otherwise,
        } => {
            f(condition);
            f(then);
            f(otherwise);
        }
        Node::And(left, right) | Node::Or(left, right) => {
            f(left);
            f(right);
        }
        Node::While {
            condition, body, ..
        } => {
            f(condition);
            f(body);
        }
        Node::TryRescue {
            body,
            clauses,
            otherwise,
        } => {
            f(body);
            for clause in clauses {
                match &mut clause.matcher {
                    RescueMatcher::StandardError => {}
                    RescueMatcher::Classes(classes) => classes.iter_mut().for_each(&mut *f),
                    RescueMatcher::Splat(classes) => f(classes),
                }
                f(&mut clause.body);
            }
            if let Some(otherwise) = otherwise {
                f(otherwise);
            }
        }
        Node::Ensure { body, ensure } => {
            f(body);
            f(ensure);
        }
        Node::FlipFlop { begin, end, .. } => {
            f(begin);
            f(end);
        }
        Node::WhenSplat { cases, value } => {
            f(cases);
            if let Some(value) = value {
                f(value);
            }
        }
        Node::Call(call) => {
            f(&mut call.receiver);
            call.arguments.iter_mut().for_each(&mut *f);
            if let Some(block) = &mut call.block {
                f(block);
            }
        }
        Node::Super { arguments, block } => {
            match arguments {
                SuperArguments::Explicit { arguments, .. } => {
                    arguments.iter_mut().for_each(&mut *f)
                }
                SuperArguments::Reload {
                    arguments,
                    keywords,
                    ..
                } => {
                    arguments.iter_mut().for_each(&mut *f);
                    if let Some(keywords) = keywords {
                        f(keywords);
                    }
                }
            }
            if let Some(block) = block {
                f(block);
            }
        }
        Node::Yield { arguments, .. } => arguments.iter_mut().for_each(f),
        Node::MethodDefinition { singleton, .. } => {
            if let Some(singleton) = singleton {
                f(singleton);
            }
        }
        Node::ModuleDefinition { kind, scope, .. } => {
            if let Some(parent) = scope_child_mut(scope) {
                f(parent);
            }
            match kind {
                ModuleKind::Class {
                    superclass: Some(superclass),
                } => f(superclass),
                ModuleKind::SingletonClass { of } => f(of),
                ModuleKind::Class { superclass: None } | ModuleKind::Module => {}
            }
        }
        Node::Alias { new_name, old_name } => {
            f(new_name);
            f(old_name);
        }
        Node::FindPattern { array, matcher, .. } => {
            f(array);
            f(matcher);
        }
    }
}

/// Visits `node` and all its descendants, parents first.
pub fn walk<'a>(node: &'a Node, f: &mut dyn FnMut(&'a Node)) {
    f(node);
    for_each_child(node, &mut |child| walk(child, &mut *f));
}

pub fn walk_mut(node: &mut Node, f: &mut dyn FnMut(&mut Node)) {
    f(node);
    for_each_child_mut(node, &mut |child| walk_mut(child, &mut *f));
}

/// Counts the nodes for which `predicate` holds.
pub fn count(node: &Node, predicate: impl Fn(&Node) -> bool) -> usize {
    let mut n = 0;
    walk(node, &mut |child| {
        if predicate(child) {
            n += 1;
        }
    });
    n
}

/// Turns every proc-only invalid return into one that targets `return_id`.
pub fn retarget_invalid_returns(node: &mut Node, return_id: &ReturnId) {
    walk_mut(node, &mut |child| {
        if let Node::Return { target, .. } = child
            && *target == ReturnTarget::Invalid
        {
            *target = ReturnTarget::Dynamic(return_id.clone());
        }
    });
}

/// Turns every return aimed at the module-body sentinel back into an invalid return.
pub fn invalidate_module_body_returns(node: &mut Node) {
    walk_mut(node, &mut |child| {
        if let Node::Return { target, .. } = child
            && *target == ReturnTarget::Dynamic(ReturnId::MODULE_BODY)
        {
            *target = ReturnTarget::Invalid;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::ControlIds;
    use crate::frame::{FrameRef, Slot};

    fn ret(target: ReturnTarget) -> Node {
        Node::Return {
            target,
            value: Box::new(Node::integer(1)),
        }
    }

    #[test]
    fn test_retarget_reaches_nested_returns() {
        let mut ids = ControlIds::new();
        let lambda_id = ids.return_id();
        let mut body = Node::Sequence(vec![
            Node::write(FrameRef::local(Slot(2)), Node::integer(3)),
            Node::if_else(
                Node::read(FrameRef::local(Slot(2))),
                ret(ReturnTarget::Invalid),
                Node::nil(),
            ),
            ret(ReturnTarget::Local),
        ]);
        retarget_invalid_returns(&mut body, &lambda_id);
        assert_eq!(
            count(&body, |n| matches!(n, Node::Return { target: ReturnTarget::Invalid, .. })),
            0
        );
        assert_eq!(
            count(&body, |n| matches!(
                n,
                Node::Return { target: ReturnTarget::Dynamic(id), .. } if *id == lambda_id
            )),
            1
        );
        // Local returns are not touched.
        assert_eq!(
            count(&body, |n| matches!(n, Node::Return { target: ReturnTarget::Local, .. })),
            1
        );
    }

    #[test]
    fn test_invalidate_only_module_body_returns() {
        let mut ids = ControlIds::new();
        let method_id = ids.return_id();
        let mut body = Node::Sequence(vec![
            ret(ReturnTarget::Dynamic(ReturnId::MODULE_BODY)),
            ret(ReturnTarget::Dynamic(method_id.clone())),
        ]);
        invalidate_module_body_returns(&mut body);
        let Node::Sequence(nodes) = &body else {
            panic!("expected sequence");
        };
        assert!(matches!(
            &nodes[0],
            Node::Return {
                target: ReturnTarget::Invalid,
                ..
            }
        ));
        assert!(matches!(
            &nodes[1],
            Node::Return { target: ReturnTarget::Dynamic(id), .. } if *id == method_id
        ));
    }
}
