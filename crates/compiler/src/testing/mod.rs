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

//! Testing utilities: compile syntax trees and run the result on a small evaluator.

pub mod eval;

use garnet_common::{CompileError, LowerOptions, SourcePragmas};
use garnet_ir::CompiledUnit;
use garnet_syntax::SyntaxNode;

pub use eval::{CallArgs, Evaluator, SuperCall, Unwind, Value};

use crate::{LowerSession, lower_top_level};

/// The outcome of running one script.
pub struct Run {
    pub unit: CompiledUnit,
    pub evaluator: Evaluator,
    pub result: Result<Value, String>,
}

impl Run {
    pub fn recorded(&self) -> Vec<Value> {
        self.evaluator.recorded.borrow().clone()
    }
}

pub fn lower(tree: &SyntaxNode) -> Result<CompiledUnit, CompileError> {
    lower_with(LowerOptions::default(), tree)
}

pub fn lower_with(options: LowerOptions, tree: &SyntaxNode) -> Result<CompiledUnit, CompileError> {
    let mut session = LowerSession::new(options, SourcePragmas::default());
    lower_top_level(&mut session, tree, &[])
}

/// Compiles `tree` with `arguments` as its argument names and runs it with their values.
pub fn run_with(tree: &SyntaxNode, arguments: Vec<(&str, Value)>) -> Result<Run, CompileError> {
    let (names, values): (Vec<&str>, Vec<Value>) = arguments.into_iter().unzip();
    let mut session = LowerSession::default();
    let unit = lower_top_level(&mut session, tree, &names)?;
    let evaluator = Evaluator::new();
    let result = evaluator.run(&unit, values);
    Ok(Run {
        unit,
        evaluator,
        result,
    })
}

pub fn run(tree: &SyntaxNode) -> Result<Run, CompileError> {
    run_with(tree, vec![])
}

/// The value of running `tree`, panicking on compile or run-time errors.
pub fn eval_ok(tree: &SyntaxNode) -> Value {
    match run(tree) {
        Ok(Run {
            result: Ok(value), ..
        }) => value,
        Ok(Run {
            result: Err(error), ..
        }) => panic!("evaluation failed: {error}"),
        Err(error) => panic!("lowering failed: {error}"),
    }
}
