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

//! Strategies for positional parameter lists and the arguments they are called with.

use garnet_syntax::build::*;
use garnet_syntax::{Parameters, SyntaxNode};
use proptest::prelude::*;

/// The shape of `def m(p0, .., o0 = 100, .., *r, q0, ..)`.
#[derive(Debug, Clone, Copy)]
pub struct Signature {
    pub pre: usize,
    pub optional: usize,
    pub rest: bool,
    pub post: usize,
}

impl Signature {
    pub fn required(&self) -> usize {
        self.pre + self.post
    }

    pub fn parameters(&self) -> Parameters {
        let mut builder = params();
        for i in 0..self.pre {
            builder = builder.req(&format!("p{i}"));
        }
        for i in 0..self.optional {
            builder = builder.opt(&format!("o{i}"), int(Self::default_of(i)));
        }
        if self.rest {
            builder = builder.rest("r");
        }
        for i in 0..self.post {
            builder = builder.post(&format!("q{i}"));
        }
        builder.build()
    }

    /// Reads of every parameter, in declaration order.
    pub fn reads(&self) -> Vec<SyntaxNode> {
        let mut reads: Vec<_> = (0..self.pre).map(|i| lvar(&format!("p{i}"))).collect();
        reads.extend((0..self.optional).map(|i| lvar(&format!("o{i}"))));
        if self.rest {
            reads.push(lvar("r"));
        }
        reads.extend((0..self.post).map(|i| lvar(&format!("q{i}"))));
        reads
    }

    pub fn default_of(index: usize) -> i64 {
        100 + index as i64
    }
}

pub fn arb_signature() -> impl Strategy<Value = Signature> {
    (0..3usize, 0..3usize, any::<bool>(), 0..3usize).prop_map(|(pre, optional, rest, post)| {
        Signature {
            pre,
            optional,
            rest,
            post,
        }
    })
}

/// A signature and an argument count near its accepted range, on both sides of it.
pub fn arb_call() -> impl Strategy<Value = (Signature, usize)> {
    arb_signature().prop_flat_map(|signature| {
        let low = signature.required().saturating_sub(1);
        let high = signature.required() + signature.optional + 2;
        (Just(signature), low..=high)
    })
}

/// Arrays long enough to fill `a, *b, c`.
pub fn arb_values() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(-1000i64..1000, 2..8)
}
