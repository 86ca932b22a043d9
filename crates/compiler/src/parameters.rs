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

//! What a parameter list binds, and the arity and reflection descriptors it reports.
//!
//! `ParameterNames` is computed once per parameter list and shared by the argument loader and
//! the super reloader, so both agree on which slot each parameter lives in. Repeated
//! underscore-prefixed names (`|_, _|`) get hidden slots after the first occurrence.

use std::collections::HashSet;

use garnet_ir::{
    ANONYMOUS_BLOCK_NAME, ANONYMOUS_KEYWORD_REST_NAME, ANONYMOUS_REST_NAME, ArgumentDescriptor,
    ArgumentKind, Arity, Symbol,
};
use garnet_syntax::{
    BlockParam, KeywordRestParam, ParamTarget, Parameters, RequiredParam, RestParam,
};

/// A required parameter's binding: a plain slot, or a destructuring group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundParam {
    Named(String),
    Destructure(DestructureNames),
}

/// The slots of a `(a, *b, c)` group: a hidden slot holding the splatted array, then the
/// group's own members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestructureNames {
    pub array: String,
    pub lefts: Vec<BoundParam>,
    /// `Some(None)` is an anonymous `*`.
    pub rest: Option<Option<String>>,
    pub rights: Vec<BoundParam>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeywordRestBinding {
    Absent,
    Named(String),
    /// `**nil`
    NoKeywords,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordBinding {
    pub name: String,
    pub slot_name: String,
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterNames {
    pub requireds: Vec<BoundParam>,
    pub optionals: Vec<String>,
    /// The rest slot. Named, anonymous and forwarded rests all have one.
    pub rest: Option<String>,
    /// `|a,|`: extra arguments are dropped, as though a rest were present.
    pub implicit_rest: bool,
    pub posts: Vec<BoundParam>,
    pub keywords: Vec<KeywordBinding>,
    pub keyword_rest: KeywordRestBinding,
    pub block: Option<String>,
}

#[derive(Default)]
struct Renamer {
    seen: HashSet<String>,
    hidden: usize,
}

impl Renamer {
    fn bind(&mut self, name: &str) -> String {
        if name.starts_with('_') && !self.seen.insert(name.to_string()) {
            self.hidden += 1;
            return format!("%{}_{}", name, self.hidden);
        }
        self.seen.insert(name.to_string());
        name.to_string()
    }

    fn destructure_slot(&mut self) -> String {
        self.hidden += 1;
        format!("%destructure_{}", self.hidden)
    }

    fn required(&mut self, param: &RequiredParam) -> BoundParam {
        match param {
            RequiredParam::Named(name) => BoundParam::Named(self.bind(name)),
            RequiredParam::Destructure(target) => BoundParam::Destructure(self.group(target)),
        }
    }

    fn group(&mut self, target: &ParamTarget) -> DestructureNames {
        let array = self.destructure_slot();
        let lefts = target.lefts.iter().map(|p| self.required(p)).collect();
        let rest = match &target.rest {
            None => None,
            Some(RestParam::Named(name)) => Some(Some(self.bind(name))),
            Some(RestParam::Anonymous) | Some(RestParam::Implicit) => Some(None),
        };
        let rights = target.rights.iter().map(|p| self.required(p)).collect();
        DestructureNames {
            array,
            lefts,
            rest,
            rights,
        }
    }
}

impl ParameterNames {
    pub fn new(params: &Parameters) -> Self {
        let mut renamer = Renamer::default();
        let requireds = params.requireds.iter().map(|p| renamer.required(p)).collect();
        let optionals = params
            .optionals
            .iter()
            .map(|o| renamer.bind(&o.name))
            .collect();
        let forwarding = params.is_forwarding();
        let rest = match &params.rest {
            Some(RestParam::Named(name)) => Some(renamer.bind(name)),
            Some(RestParam::Anonymous) => Some(ANONYMOUS_REST_NAME.to_string()),
            Some(RestParam::Implicit) => None,
            None if forwarding => Some(ANONYMOUS_REST_NAME.to_string()),
            None => None,
        };
        let posts = params.posts.iter().map(|p| renamer.required(p)).collect();
        let keywords = params
            .keywords
            .iter()
            .map(|k| KeywordBinding {
                name: k.name.clone(),
                slot_name: renamer.bind(&k.name),
                required: k.value.is_none(),
            })
            .collect();
        let keyword_rest = match &params.keyword_rest {
            None => KeywordRestBinding::Absent,
            Some(KeywordRestParam::Named(name)) => KeywordRestBinding::Named(renamer.bind(name)),
            Some(KeywordRestParam::Anonymous) | Some(KeywordRestParam::Forwarding) => {
                KeywordRestBinding::Named(ANONYMOUS_KEYWORD_REST_NAME.to_string())
            }
            Some(KeywordRestParam::NoKeywords) => KeywordRestBinding::NoKeywords,
        };
        let block = match &params.block {
            Some(BlockParam::Named(name)) => Some(renamer.bind(name)),
            Some(BlockParam::Anonymous) => Some(ANONYMOUS_BLOCK_NAME.to_string()),
            None if forwarding => Some(ANONYMOUS_BLOCK_NAME.to_string()),
            None => None,
        };
        Self {
            requireds,
            optionals,
            rest,
            implicit_rest: matches!(params.rest, Some(RestParam::Implicit)),
            posts,
            keywords,
            keyword_rest,
            block,
        }
    }

    pub fn empty() -> Self {
        Self::new(&Parameters::default())
    }
}

/// Required keywords first, then optional ones, each in source order.
pub fn arity_of(params: Option<&Parameters>) -> Arity {
    let Some(params) = params else {
        return Arity::no_arguments();
    };
    let required_keywords: Vec<Symbol> = params
        .keywords
        .iter()
        .filter(|k| k.value.is_none())
        .map(|k| Symbol::new(&k.name))
        .collect();
    let required_keyword_count = required_keywords.len();
    let mut keywords = required_keywords;
    keywords.extend(
        params
            .keywords
            .iter()
            .filter(|k| k.value.is_some())
            .map(|k| Symbol::new(&k.name)),
    );
    Arity {
        required: params.requireds.len() + params.posts.len(),
        optional: params.optionals.len(),
        has_rest: matches!(
            params.rest,
            Some(RestParam::Named(_)) | Some(RestParam::Anonymous)
        ) || params.is_forwarding(),
        post: params.posts.len(),
        keywords,
        required_keywords: required_keyword_count,
        has_keyword_rest: matches!(
            params.keyword_rest,
            Some(KeywordRestParam::Named(_))
                | Some(KeywordRestParam::Anonymous)
                | Some(KeywordRestParam::Forwarding)
        ),
    }
}

/// Whether a proc with this parameter list may auto-splat a single array argument. Skipped when
/// the outcome could never differ.
pub fn should_consider_destructuring(params: &Parameters) -> bool {
    let arity = arity_of(Some(params));
    let has_rest = arity.has_rest || matches!(params.rest, Some(RestParam::Implicit));
    if arity.required == 1 && arity.optional == 0 && !has_rest && arity.has_keyword_rest {
        // |a, **kw| still splats
        return true;
    }
    if !has_rest && arity.required + arity.optional <= 1 {
        false
    } else {
        !(has_rest && arity.required == 0)
    }
}

fn required_descriptor(param: &RequiredParam) -> ArgumentDescriptor {
    match param {
        RequiredParam::Named(name) => ArgumentDescriptor::named(ArgumentKind::Required, name),
        RequiredParam::Destructure(_) => {
            ArgumentDescriptor::anonymous(ArgumentKind::AnonymousRequired)
        }
    }
}

/// Reflection descriptors, in parameter order, under their source names.
pub fn descriptors_of(params: Option<&Parameters>) -> Vec<ArgumentDescriptor> {
    let Some(params) = params else {
        return vec![];
    };
    let mut descriptors: Vec<ArgumentDescriptor> =
        params.requireds.iter().map(required_descriptor).collect();
    for optional in &params.optionals {
        descriptors.push(ArgumentDescriptor::named(
            ArgumentKind::Optional,
            &optional.name,
        ));
    }
    match &params.rest {
        Some(RestParam::Named(name)) => {
            descriptors.push(ArgumentDescriptor::named(ArgumentKind::Rest, name))
        }
        Some(RestParam::Anonymous) => {
            descriptors.push(ArgumentDescriptor::anonymous(ArgumentKind::AnonymousRest))
        }
        Some(RestParam::Implicit) => {}
        None if params.is_forwarding() => {
            descriptors.push(ArgumentDescriptor::anonymous(ArgumentKind::AnonymousRest))
        }
        None => {}
    }
    descriptors.extend(params.posts.iter().map(required_descriptor));
    for keyword in &params.keywords {
        let kind = if keyword.value.is_none() {
            ArgumentKind::KeywordRequired
        } else {
            ArgumentKind::KeywordOptional
        };
        descriptors.push(ArgumentDescriptor::named(kind, &keyword.name));
    }
    match &params.keyword_rest {
        Some(KeywordRestParam::Named(name)) => descriptors.push(ArgumentDescriptor::named(
            ArgumentKind::KeywordRest,
            name,
        )),
        Some(KeywordRestParam::Anonymous) | Some(KeywordRestParam::Forwarding) => descriptors
            .push(ArgumentDescriptor::anonymous(
                ArgumentKind::AnonymousKeywordRest,
            )),
        Some(KeywordRestParam::NoKeywords) => {
            descriptors.push(ArgumentDescriptor::anonymous(ArgumentKind::NoKeywords))
        }
        None => {}
    }
    match &params.block {
        Some(BlockParam::Named(name)) => {
            descriptors.push(ArgumentDescriptor::named(ArgumentKind::Block, name))
        }
        Some(BlockParam::Anonymous) => {
            descriptors.push(ArgumentDescriptor::anonymous(ArgumentKind::AnonymousBlock))
        }
        None if params.is_forwarding() => {
            descriptors.push(ArgumentDescriptor::anonymous(ArgumentKind::AnonymousBlock))
        }
        None => {}
    }
    descriptors
}

#[cfg(test)]
mod tests {
    use super::*;
    use garnet_syntax::build::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test]
    fn test_golden_method_arity() {
        // def foo(a, b=1, *c, d, e:, **f)
        let params = params()
            .req("a")
            .opt("b", int(1))
            .rest("c")
            .post("d")
            .key("e")
            .kwrest("f")
            .build();
        assert_eq!(
            arity_of(Some(&params)),
            Arity {
                required: 2,
                optional: 1,
                has_rest: true,
                post: 1,
                keywords: vec![Symbol::new("e")],
                required_keywords: 1,
                has_keyword_rest: true,
            }
        );
    }

    #[test]
    fn test_required_keywords_come_first() {
        let params = params()
            .key_opt("a", int(1))
            .key("b")
            .key_opt("c", int(2))
            .key("d")
            .build();
        let arity = arity_of(Some(&params));
        let names: Vec<&str> = arity.keywords.iter().map(|k| k.as_str()).collect();
        assert_eq!(names, vec!["b", "d", "a", "c"]);
        assert_eq!(arity.required_keywords, 2);
    }

    #[test]
    fn test_descriptors_follow_reflection_names() {
        let params = params()
            .req("a")
            .opt("b", int(1))
            .rest("c")
            .post("d")
            .key("e")
            .key_opt("g", nil())
            .kwrest("f")
            .block("blk")
            .build();
        let rendered: Vec<String> = descriptors_of(Some(&params))
            .iter()
            .map(|d| d.to_string())
            .collect();
        assert_eq!(
            rendered,
            vec![
                "[:req, :a]",
                "[:opt, :b]",
                "[:rest, :c]",
                "[:req, :d]",
                "[:keyreq, :e]",
                "[:key, :g]",
                "[:keyrest, :f]",
                "[:block, :blk]",
            ]
        );
    }

    #[test]
    fn test_forwarding_binds_hidden_names() {
        let params = params().req("a").forwarding().build();
        let names = ParameterNames::new(&params);
        assert_eq!(names.rest.as_deref(), Some(ANONYMOUS_REST_NAME));
        assert_eq!(
            names.keyword_rest,
            KeywordRestBinding::Named(ANONYMOUS_KEYWORD_REST_NAME.to_string())
        );
        assert_eq!(names.block.as_deref(), Some(ANONYMOUS_BLOCK_NAME));
        assert!(arity_of(Some(&params)).has_rest);
    }

    #[test]
    fn test_repeated_underscores_get_hidden_slots() {
        let params = params().req("_").req("_").req("_x").post("_x").build();
        let names = ParameterNames::new(&params);
        let BoundParam::Named(first) = &names.requireds[0] else {
            panic!("expected a named parameter");
        };
        let BoundParam::Named(second) = &names.requireds[1] else {
            panic!("expected a named parameter");
        };
        assert_eq!(first, "_");
        assert!(second.starts_with("%_"));
        assert_eq!(names.posts[0], BoundParam::Named("%_x_2".to_string()));
        // Non-underscore names are never renamed.
        let plain = ParameterNames::new(&params_with_duplicate_plain());
        assert_eq!(plain.requireds[1], BoundParam::Named("a".to_string()));
    }

    fn params_with_duplicate_plain() -> Parameters {
        params().req("a").req("a").build()
    }

    #[test_case(params().req("a").build(), false ; "single required")]
    #[test_case(params().opt("a", nil()).build(), false ; "single optional")]
    #[test_case(params().req("a").req("b").build(), true ; "two required")]
    #[test_case(params().req("a").implicit_rest().build(), true ; "trailing comma")]
    #[test_case(params().rest("r").build(), false ; "rest only")]
    #[test_case(params().opt("a", nil()).rest("r").build(), false ; "optional and rest")]
    #[test_case(params().req("a").rest("r").build(), true ; "required and rest")]
    #[test_case(params().req("a").kwrest("kw").build(), true ; "required and keyword rest")]
    fn test_auto_splat_consideration(params: Parameters, expected: bool) {
        assert_eq!(should_consider_destructuring(&params), expected);
    }
}
