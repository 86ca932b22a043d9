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

/// A formal parameter list, in source order by group:
/// `def m(pre, opt = 1, *rest, post, key:, opt_key: 2, **kwrest, &blk)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    #[serde(default)]
    pub requireds: Vec<RequiredParam>,
    #[serde(default)]
    pub optionals: Vec<OptionalParam>,
    #[serde(default)]
    pub rest: Option<RestParam>,
    #[serde(default)]
    pub posts: Vec<RequiredParam>,
    #[serde(default)]
    pub keywords: Vec<KeywordParam>,
    #[serde(default)]
    pub keyword_rest: Option<KeywordRestParam>,
    #[serde(default)]
    pub block: Option<BlockParam>,
}

impl Parameters {
    /// `def m(...)`: everything after the leading requireds is forwarded.
    pub fn is_forwarding(&self) -> bool {
        matches!(self.keyword_rest, Some(KeywordRestParam::Forwarding))
    }

    pub fn is_empty(&self) -> bool {
        self.requireds.is_empty()
            && self.optionals.is_empty()
            && self.rest.is_none()
            && self.posts.is_empty()
            && self.keywords.is_empty()
            && self.keyword_rest.is_none()
            && self.block.is_none()
    }

    /// Every name these parameters bind, including those inside destructuring groups, in source
    /// order. Repeated names appear once per occurrence.
    pub fn bound_names(&self) -> Vec<&str> {
        let mut names = vec![];
        for required in &self.requireds {
            required.collect_names(&mut names);
        }
        for optional in &self.optionals {
            names.push(optional.name.as_str());
        }
        if let Some(RestParam::Named(name)) = &self.rest {
            names.push(name.as_str());
        }
        for post in &self.posts {
            post.collect_names(&mut names);
        }
        for keyword in &self.keywords {
            names.push(keyword.name.as_str());
        }
        if let Some(KeywordRestParam::Named(name)) = &self.keyword_rest {
            names.push(name.as_str());
        }
        if let Some(BlockParam::Named(name)) = &self.block {
            names.push(name.as_str());
        }
        names
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredParam {
    Named(String),
    /// `def m((a, *b), c)`
    Destructure(ParamTarget),
}

impl RequiredParam {
    fn collect_names<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            RequiredParam::Named(name) => names.push(name.as_str()),
            RequiredParam::Destructure(target) => target.collect_names(names),
        }
    }
}

/// A parenthesised destructuring group inside a parameter list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamTarget {
    #[serde(default)]
    pub lefts: Vec<RequiredParam>,
    #[serde(default)]
    pub rest: Option<RestParam>,
    #[serde(default)]
    pub rights: Vec<RequiredParam>,
}

impl ParamTarget {
    pub(crate) fn collect_names<'a>(&'a self, names: &mut Vec<&'a str>) {
        for left in &self.lefts {
            left.collect_names(names);
        }
        if let Some(RestParam::Named(name)) = &self.rest {
            names.push(name.as_str());
        }
        for right in &self.rights {
            right.collect_names(names);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionalParam {
    pub name: String,
    pub value: SyntaxNode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestParam {
    Named(String),
    /// `*`
    Anonymous,
    /// The trailing comma in `|a,|`.
    Implicit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordParam {
    pub name: String,
    /// `None` for a required keyword.
    #[serde(default)]
    pub value: Option<SyntaxNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeywordRestParam {
    Named(String),
    /// `**`
    Anonymous,
    /// `**nil`
    NoKeywords,
    /// `...`
    Forwarding,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockParam {
    Named(String),
    /// `&`
    Anonymous,
}
