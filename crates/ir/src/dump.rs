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

//! A one-line s-expression rendering of node trees, for debugging and test expectations.
//! Separately compiled bodies (closures, methods, module bodies) print as a summary only.

use std::fmt::{Display, Formatter};

use crate::control::ReturnTarget;
use crate::node::{
    ArgumentSource, ConstantScope, FindRestSide, KeywordArguments, Literal, MissingArgument,
    ModuleKind, Node, SplatBehavior, SuperArguments,
};
use crate::unit::RootNode;
use crate::visit::for_each_child;

impl Display for Literal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::Nil => write!(f, "nil"),
            Literal::True => write!(f, "true"),
            Literal::False => write!(f, "false"),
            Literal::Integer(i) => write!(f, "{i}"),
            Literal::Float(x) => write!(f, "{x:?}"),
            Literal::Symbol(s) => write!(f, ":{s}"),
            Literal::Regex { source, options } => write!(f, "/{source}/{options}"),
            Literal::Encoding(e) => write!(f, "enc:{e}"),
        }
    }
}

fn source(source: &ArgumentSource) -> String {
    match source {
        ArgumentSource::Arguments => "args".to_string(),
        ArgumentSource::Array(array) => format!("array@{array}"),
    }
}

fn keywords(keywords: &KeywordArguments) -> Option<String> {
    match keywords {
        KeywordArguments::None => None,
        KeywordArguments::Literal(keys) => Some(format!(
            "kw[{}]",
            keys.iter().map(|k| k.as_str()).collect::<Vec<_>>().join(",")
        )),
        KeywordArguments::Splat => Some("kw**".to_string()),
    }
}

fn scope(scope: &ConstantScope) -> &'static str {
    match scope {
        ConstantScope::Lexical { dynamic: false } => "lexical",
        ConstantScope::Lexical { dynamic: true } => "dynamic",
        ConstantScope::TopLevel => "top",
        ConstantScope::Within(_) => "within",
    }
}

enum Head {
    /// Complete on its own.
    Leaf(String),
    /// An open list, to be followed by the node's children and a closing paren.
    Open(String),
}

/// The head of a node's s-expression: its name and any non-node fields.
fn label(node: &Node) -> Head {
    let mut parts: Vec<String> = vec![];
    let name = match node {
        Node::Interpolation(_) => "dstr",
        Node::DynamicSymbol(_) => "dsym",
        Node::DynamicRegex { options, .. } => {
            parts.push(format!("/{options}"));
            "dregex"
        }
        Node::Once(_) => "once",
        Node::ArrayLiteral(_) => "array",
        Node::ArrayConcat(_) => "array_concat",
        Node::SplatCast { behavior, .. } => {
            parts.push(
                match behavior {
                    SplatBehavior::ToArray => "to_a",
                    SplatBehavior::WrapWithNil => "wrap",
                    SplatBehavior::ToAryOrNil => "to_ary?",
                }
                .to_string(),
            );
            "splat"
        }
        Node::HashLiteral(_) => "hash",
        Node::HashConcat(_) => "hash_concat",
        Node::Range { exclusive, .. } => {
            if *exclusive {
                "erange"
            } else {
                "irange"
            }
        }
        Node::WriteLocal { target, .. } => {
            parts.push(target.to_string());
            "lasgn"
        }
        Node::ReadInstanceVariable(name) => {
            parts.push(name.to_string());
            "ivar"
        }
        Node::WriteInstanceVariable { name, .. } => {
            parts.push(name.to_string());
            "iasgn"
        }
        Node::ReadClassVariable(name) => {
            parts.push(name.to_string());
            "cvar"
        }
        Node::WriteClassVariable { name, .. } => {
            parts.push(name.to_string());
            "cvasgn"
        }
        Node::ReadGlobal(name) => {
            parts.push(name.to_string());
            "gvar"
        }
        Node::WriteGlobal { name, .. } => {
            parts.push(name.to_string());
            "gasgn"
        }
        Node::AliasGlobal { new_name, old_name } => {
            parts.push(new_name.to_string());
            parts.push(old_name.to_string());
            "valias"
        }
        Node::ReadSpecialVariable { cell, name } => {
            parts.push(name.to_string());
            parts.push(cell.to_string());
            "special"
        }
        Node::WriteSpecialVariable { cell, name, .. } => {
            parts.push(name.to_string());
            parts.push(cell.to_string());
            "special_asgn"
        }
        Node::ReadBackReference { cell, kind } => {
            parts.push(format!("${kind}"));
            parts.push(cell.to_string());
            "back_ref"
        }
        Node::ReadNthReference { cell, number } => {
            parts.push(format!("${number}"));
            parts.push(cell.to_string());
            "nth_ref"
        }
        Node::ReadConstant { scope: s, name } => {
            parts.push(scope(s).to_string());
            parts.push(name.to_string());
            "const"
        }
        Node::WriteConstant { scope: s, name, .. } => {
            parts.push(scope(s).to_string());
            parts.push(name.to_string());
            "cdecl"
        }
        Node::IsDefined(_) => "is_defined",
        Node::Defined(_) => "defined",
        Node::Sequence(_) => "seq",
        Node::If { .. } => "if",
        Node::And(..) => "and",
        Node::Or(..) => "or",
        Node::Not(_) => "not",
        Node::IsNil(_) => "nil?",
        Node::While { do_while, .. } => {
            if *do_while {
                "do_while"
            } else {
                "while"
            }
        }
        Node::CatchBreak { id, in_while, .. } => {
            parts.push(id.to_string());
            if *in_while {
                parts.push("while".to_string());
            }
            "catch_break"
        }
        Node::Break { id, in_while, .. } => {
            parts.push(id.to_string());
            if *in_while {
                parts.push("while".to_string());
            }
            "break"
        }
        Node::Next(_) => "next",
        Node::Return { target, .. } => {
            parts.push(match target {
                ReturnTarget::Local => "local".to_string(),
                ReturnTarget::Dynamic(id) => id.to_string(),
                ReturnTarget::Invalid => "invalid".to_string(),
            });
            "return"
        }
        Node::TryRescue { clauses, .. } => {
            parts.push(format!("clauses={}", clauses.len()));
            "rescue"
        }
        Node::Ensure { .. } => "ensure",
        Node::Line { line, .. } => {
            parts.push(format!("{line}"));
            "line"
        }
        Node::FlipFlop {
            state, exclusive, ..
        } => {
            parts.push(state.to_string());
            if *exclusive {
                "flip_flop3"
            } else {
                "flip_flop"
            }
        }
        Node::InitFlipFlopStates(slots) => {
            parts.extend(slots.iter().map(|s| s.0.to_string()));
            "init_flip_flops"
        }
        Node::FrameOnStack { marker, .. } => {
            parts.push(marker.0.to_string());
            "frame_on_stack"
        }
        Node::WhenSplat { .. } => "when_splat",
        Node::RaiseNoMatchingPattern(_) => "no_matching_pattern",
        Node::Call(call) => {
            parts.push(call.method.to_string());
            if call.splatted {
                parts.push("splat".to_string());
            }
            if let Some(kw) = keywords(&call.keywords) {
                parts.push(kw);
            }
            if call.private {
                parts.push("private".to_string());
            }
            if call.variable_call {
                parts.push("vcall".to_string());
            }
            if call.attribute_write {
                parts.push("attr".to_string());
            }
            "call"
        }
        Node::ToProc(_) => "to_proc",
        Node::Super { arguments, .. } => match arguments {
            SuperArguments::Explicit {
                splatted,
                keywords: kw,
                ..
            } => {
                if *splatted {
                    parts.push("splat".to_string());
                }
                if let Some(kw) = keywords(kw) {
                    parts.push(kw);
                }
                "super"
            }
            SuperArguments::Reload {
                rest_index,
                inside_define_method,
                ..
            } => {
                if let Some(index) = rest_index {
                    parts.push(format!("rest@{index}"));
                }
                if *inside_define_method {
                    parts.push("define_method".to_string());
                }
                "zsuper"
            }
        },
        Node::Yield {
            block,
            splatted,
            keywords: kw,
            ..
        } => {
            parts.push(block.to_string());
            if *splatted {
                parts.push("splat".to_string());
            }
            if let Some(kw) = keywords(kw) {
                parts.push(kw);
            }
            "yield"
        }
        Node::Closure(closure) => {
            parts.push(closure.kind.to_string());
            parts.push(format!("width={}", closure.frame.width()));
            "closure"
        }
        Node::MethodDefinition { name, singleton, .. } => {
            parts.push(name.to_string());
            if singleton.is_some() {
                parts.push("singleton".to_string());
            }
            "def"
        }
        Node::ModuleDefinition {
            kind,
            scope: s,
            name,
            ..
        } => {
            parts.push(scope(s).to_string());
            if let Some(name) = name {
                parts.push(name.to_string());
            }
            match kind {
                ModuleKind::Class { .. } => "class",
                ModuleKind::Module => "module",
                ModuleKind::SingletonClass { .. } => "sclass",
            }
        }
        Node::Alias { .. } => "alias",
        Node::Undef(_) => "undef",
        Node::CheckArity(arity) => {
            parts.push(format!("{}", arity.arity_number()));
            "check_arity"
        }
        Node::CheckKeywords(arity) => {
            parts.extend(arity.keywords.iter().map(|k| k.as_str().to_string()));
            "check_keywords"
        }
        Node::SaveMethodBlock(slot) => {
            parts.push(slot.0.to_string());
            "save_block"
        }
        Node::ReadPreArgument {
            source: s,
            index,
            missing,
        } => {
            parts.push(source(s));
            parts.push(index.to_string());
            if *missing == MissingArgument::Nil {
                parts.push("nil".to_string());
            }
            "pre"
        }
        Node::ReadOptionalArgument {
            source: s,
            index,
            minimum,
            ..
        } => {
            parts.push(source(s));
            parts.push(index.to_string());
            parts.push(format!(">={minimum}"));
            "opt"
        }
        Node::ReadRestArgument {
            source: s,
            from,
            post,
        } => {
            parts.push(source(s));
            parts.push(format!("{from}..-{post}"));
            "rest"
        }
        Node::ReadPostArgument {
            source: s,
            index_from_end,
            ..
        } => {
            parts.push(source(s));
            parts.push(format!("-{index_from_end}"));
            "post"
        }
        Node::ReadKeywordArgument { name, .. } => {
            parts.push(name.to_string());
            "kwarg"
        }
        Node::ReadKeywordRest { known } => {
            parts.extend(known.iter().map(|k| k.to_string()));
            "kwrest"
        }
        Node::ArrayIndex { index, .. } => {
            parts.push(index.to_string());
            "index"
        }
        Node::ArrayIsAtLeast { length, .. } => {
            parts.push(length.to_string());
            "at_least"
        }
        Node::ArrayPatternLengthCheck { length, exact, .. } => {
            parts.push(format!("{}{length}", if *exact { "==" } else { ">=" }));
            "length_check"
        }
        Node::DeconstructArray(_) => "deconstruct",
        Node::DeconstructKeys { keys, .. } => {
            match keys {
                Some(keys) => parts.extend(keys.iter().map(|k| k.to_string())),
                None => parts.push("*".to_string()),
            }
            "deconstruct_keys"
        }
        Node::HashPatternValue { key, .. } => {
            parts.push(key.to_string());
            "hash_value"
        }
        Node::IsAbsent(_) => "absent?",
        Node::HashExcept { keys, .. } => {
            parts.extend(keys.iter().map(|k| k.to_string()));
            "hash_except"
        }
        Node::HashIsEmpty(_) => "hash_empty?",
        Node::FindPattern { width, cursor, .. } => {
            parts.push(width.to_string());
            parts.push(cursor.to_string());
            "find"
        }
        Node::ArrayIndexAt { cursor, offset, .. } => {
            parts.push(cursor.to_string());
            parts.push(format!("+{offset}"));
            "index_at"
        }
        Node::FindPatternRest { cursor, side, .. } => {
            parts.push(cursor.to_string());
            parts.push(match side {
                FindRestSide::Before => "before".to_string(),
                FindRestSide::After { width } => format!("after+{width}"),
            });
            "find_rest"
        }
        Node::ExecuteAndReturnTrue(_) => "then_true",
        Node::Literal(literal) => return Head::Leaf(literal.to_string()),
        Node::StringLiteral { value, frozen } => {
            return Head::Leaf(format!("{}{:?}", if *frozen { "f" } else { "" }, value));
        }
        Node::ReadLocal(frame_ref) => return Head::Leaf(format!("(lvar {frame_ref})")),
        Node::ReadReceiver => return Head::Leaf("receiver".to_string()),
        Node::CurrentException => return Head::Leaf("$!".to_string()),
        Node::Redo => return Head::Leaf("(redo)".to_string()),
        Node::Retry => return Head::Leaf("(retry)".to_string()),
        Node::CheckNoKeywords => return Head::Leaf("(check_no_keywords)".to_string()),
        Node::ShouldDestructure => return Head::Leaf("(should_destructure)".to_string()),
    };
    let mut out = format!("({name}");
    for part in parts {
        out.push(' ');
        out.push_str(&part);
    }
    Head::Open(out)
}

impl Display for Node {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let head = match label(self) {
            Head::Leaf(leaf) => return f.write_str(&leaf),
            Head::Open(head) => head,
        };
        f.write_str(&head)?;
        let mut result = Ok(());
        for_each_child(self, &mut |child| {
            if result.is_ok() {
                result = write!(f, " {child}");
            }
        });
        result?;
        f.write_str(")")
    }
}

impl Display for RootNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "(root {} {} {})", self.convention, self.prelude, self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{FrameRef, Slot};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_dump_small_tree() {
        let node = Node::Sequence(vec![
            Node::write(FrameRef::local(Slot(2)), Node::integer(1)),
            Node::if_else(
                Node::IsNil(Box::new(Node::read(FrameRef::new(1, Slot(3))))),
                Node::symbol("a"),
                Node::StringLiteral {
                    value: "x".into(),
                    frozen: true,
                },
            ),
            Node::call(Node::read_self(), "puts", vec![Node::nil()]),
        ]);
        assert_eq!(
            node.to_string(),
            r#"(seq (lasgn 0.2 1) (if (nil? (lvar 1.3)) :a f"x") (call puts (lvar 0.0) nil))"#
        );
    }
}
