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

use itertools::Itertools;
use serde::Serialize;
use std::fmt::{Display, Formatter};
use strum::{Display as StrumDisplay, IntoStaticStr};

use crate::symbol::Symbol;

/// The shape of a parameter list, as used to validate calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Arity {
    /// Pre and post required parameters together.
    pub required: usize,
    pub optional: usize,
    pub has_rest: bool,
    pub post: usize,
    /// Required keywords first, then optional ones, each group in source order.
    pub keywords: Vec<Symbol>,
    pub required_keywords: usize,
    pub has_keyword_rest: bool,
}

impl Arity {
    pub fn no_arguments() -> Self {
        Self::default()
    }

    pub fn pre(&self) -> usize {
        self.required - self.post
    }

    pub fn with_rest(&self, has_rest: bool) -> Self {
        Self {
            has_rest,
            ..self.clone()
        }
    }

    pub fn required_keyword_names(&self) -> &[Symbol] {
        &self.keywords[..self.required_keywords]
    }

    pub fn accepts_keywords(&self) -> bool {
        !self.keywords.is_empty() || self.has_keyword_rest
    }

    /// Whether `given` positional arguments satisfy this arity.
    pub fn accepts(&self, given: usize) -> bool {
        given >= self.required && (self.has_rest || given <= self.required + self.optional)
    }

    /// The reflection arity number: the required count when fixed, `-(required + 1)` when
    /// variable. A required keyword counts as one more required argument.
    pub fn arity_number(&self) -> i64 {
        let mut count = self.required as i64;
        if self.required_keywords > 0 {
            count += 1;
        }
        let optional_keywords_only = self.required_keywords == 0 && self.accepts_keywords();
        if self.optional > 0 || self.has_rest || optional_keywords_only {
            -count - 1
        } else {
            count
        }
    }
}

impl Display for Arity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "req={} opt={} rest={} post={} kw=[{}] kwreq={} kwrest={}",
            self.required,
            self.optional,
            self.has_rest,
            self.post,
            self.keywords.iter().map(|k| k.as_str()).join(","),
            self.required_keywords,
            self.has_keyword_rest
        )
    }
}

/// Parameter kinds, named as the language's reflection reports them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, StrumDisplay, IntoStaticStr)]
pub enum ArgumentKind {
    #[strum(serialize = "req")]
    Required,
    #[strum(serialize = "opt")]
    Optional,
    #[strum(serialize = "rest")]
    Rest,
    #[strum(serialize = "keyreq")]
    KeywordRequired,
    #[strum(serialize = "key")]
    KeywordOptional,
    #[strum(serialize = "keyrest")]
    KeywordRest,
    #[strum(serialize = "nokey")]
    NoKeywords,
    #[strum(serialize = "block")]
    Block,
    /// A destructuring group, `(a, b)`.
    #[strum(serialize = "req")]
    AnonymousRequired,
    #[strum(serialize = "opt")]
    AnonymousOptional,
    #[strum(serialize = "rest")]
    AnonymousRest,
    #[strum(serialize = "keyrest")]
    AnonymousKeywordRest,
    #[strum(serialize = "block")]
    AnonymousBlock,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ArgumentDescriptor {
    pub kind: ArgumentKind,
    pub name: Option<Symbol>,
}

impl ArgumentDescriptor {
    pub fn named(kind: ArgumentKind, name: &str) -> Self {
        Self {
            kind,
            name: Some(Symbol::new(name)),
        }
    }

    pub fn anonymous(kind: ArgumentKind) -> Self {
        Self { kind, name: None }
    }

    /// Procs report their required parameters as optional.
    pub fn for_proc(&self) -> Self {
        let kind = match self.kind {
            ArgumentKind::Required => ArgumentKind::Optional,
            ArgumentKind::AnonymousRequired => ArgumentKind::AnonymousOptional,
            other => other,
        };
        Self {
            kind,
            name: self.name.clone(),
        }
    }
}

impl Display for ArgumentDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => write!(f, "[:{}, :{}]", self.kind, name),
            None => write!(f, "[:{}]", self.kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn arity(
        required: usize,
        optional: usize,
        has_rest: bool,
        keywords: &[&str],
        required_keywords: usize,
        has_keyword_rest: bool,
    ) -> Arity {
        Arity {
            required,
            optional,
            has_rest,
            post: 0,
            keywords: keywords.iter().map(|k| Symbol::new(k)).collect(),
            required_keywords,
            has_keyword_rest,
        }
    }

    #[test_case(arity(2, 0, false, &[], 0, false), 2 ; "fixed")]
    #[test_case(arity(1, 1, false, &[], 0, false), -2 ; "optional")]
    #[test_case(arity(0, 0, true, &[], 0, false), -1 ; "rest only")]
    #[test_case(arity(1, 0, false, &["b"], 1, false), 2 ; "required keyword")]
    #[test_case(arity(1, 0, false, &["b"], 0, false), -2 ; "optional keyword")]
    #[test_case(arity(1, 0, false, &[], 0, true), -2 ; "keyword rest")]
    #[test_case(arity(1, 0, false, &["b", "c"], 1, true), 2 ; "required keyword with rest")]
    fn test_arity_number(arity: Arity, expected: i64) {
        assert_eq!(arity.arity_number(), expected);
    }

    #[test]
    fn test_accepts_counts() {
        let a = arity(2, 1, false, &[], 0, false);
        assert!(!a.accepts(1));
        assert!(a.accepts(2));
        assert!(a.accepts(3));
        assert!(!a.accepts(4));
        assert!(a.with_rest(true).accepts(10));
    }

    #[test]
    fn test_descriptor_display_and_proc_form() {
        let req = ArgumentDescriptor::named(ArgumentKind::Required, "a");
        assert_eq!(req.to_string(), "[:req, :a]");
        assert_eq!(req.for_proc().to_string(), "[:opt, :a]");
        let group = ArgumentDescriptor::anonymous(ArgumentKind::AnonymousRequired);
        assert_eq!(group.to_string(), "[:req]");
        assert_eq!(group.for_proc().to_string(), "[:opt]");
        let nokey = ArgumentDescriptor::anonymous(ArgumentKind::NoKeywords);
        assert_eq!(nokey.to_string(), "[:nokey]");
    }
}
