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

use garnet_common::Warning;
use once_cell::sync::OnceCell;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use strum::Display;

use crate::arity::{ArgumentDescriptor, Arity};
use crate::control::{BreakId, ReturnId};
use crate::frame::{FrameLayout, Slot};
use crate::node::Node;
use crate::symbol::Symbol;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum UnitKind {
    TopLevel,
    Method,
    ModuleBody,
}

/// Warnings raised while lowering a unit, released exactly once: to whichever caller first
/// executes the unit.
#[derive(Default)]
pub struct DeferredWarnings {
    warnings: Vec<Warning>,
    released: AtomicBool,
}

impl DeferredWarnings {
    pub fn new(warnings: Vec<Warning>) -> Self {
        Self {
            warnings,
            released: AtomicBool::new(false),
        }
    }

    /// All warnings on the first call, nothing afterwards.
    pub fn take_for_first_execution(&self) -> &[Warning] {
        if self.released.swap(true, Ordering::AcqRel) {
            &[]
        } else {
            &self.warnings
        }
    }

    /// Inspect without releasing.
    pub fn pending(&self) -> &[Warning] {
        if self.released.load(Ordering::Acquire) {
            &[]
        } else {
            &self.warnings
        }
    }
}

impl Debug for DeferredWarnings {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredWarnings")
            .field("count", &self.warnings.len())
            .field("released", &self.released.load(Ordering::Relaxed))
            .finish()
    }
}

impl PartialEq for DeferredWarnings {
    fn eq(&self, other: &Self) -> bool {
        self.warnings == other.warnings
    }
}

/// A method body, module body or top-level script, ready to run.
#[derive(Debug, PartialEq)]
pub struct CompiledUnit {
    pub kind: UnitKind,
    pub name: Symbol,
    pub frame: Arc<FrameLayout>,
    pub arity: Arity,
    pub parameters: Vec<ArgumentDescriptor>,
    pub return_id: ReturnId,
    pub body: Node,
    pub warnings: DeferredWarnings,
}

impl CompiledUnit {
    pub fn take_warnings_for_first_execution(&self) -> &[Warning] {
        self.warnings.take_for_first_execution()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum CallingConvention {
    Proc,
    Lambda,
}

/// How a closure was written, which decides the entry built eagerly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ClosureKind {
    /// A block literal; called as a proc unless later converted.
    Proc,
    /// A block given to `lambda`; the proc entry is still reachable through `&`-conversion.
    LambdaCall,
    /// `-> {}`: only ever a lambda.
    StabbyLambda,
}

impl ClosureKind {
    pub fn eager_convention(&self) -> CallingConvention {
        match self {
            ClosureKind::Proc => CallingConvention::Proc,
            ClosureKind::LambdaCall | ClosureKind::StabbyLambda => CallingConvention::Lambda,
        }
    }
}

/// One calling convention's entry point into a closure body.
#[derive(Debug, PartialEq)]
pub struct RootNode {
    pub convention: CallingConvention,
    pub return_id: ReturnId,
    pub break_id: BreakId,
    /// Receiver store, arity check (lambdas) and parameter binding.
    pub prelude: Node,
    pub body: Arc<Node>,
}

pub type EntryBuilder = Box<dyn Fn() -> RootNode + Send + Sync>;

/// A root node built at most once, either up front or on first request.
pub struct LazyEntry {
    cell: OnceCell<Arc<RootNode>>,
    builder: Option<EntryBuilder>,
}

impl LazyEntry {
    pub fn built(root: RootNode) -> Self {
        Self {
            cell: OnceCell::with_value(Arc::new(root)),
            builder: None,
        }
    }

    pub fn deferred(builder: EntryBuilder) -> Self {
        Self {
            cell: OnceCell::new(),
            builder: Some(builder),
        }
    }

    /// Never buildable: the proc side of a stabby lambda.
    pub fn unavailable() -> Self {
        Self {
            cell: OnceCell::new(),
            builder: None,
        }
    }

    /// The entry, building it on first use. Concurrent first callers block on one build.
    pub fn get(&self) -> Option<Arc<RootNode>> {
        if let Some(root) = self.cell.get() {
            return Some(root.clone());
        }
        let builder = self.builder.as_ref()?;
        Some(self.cell.get_or_init(|| Arc::new(builder())).clone())
    }

    /// The entry if it has already been built; never triggers a build.
    pub fn peek(&self) -> Option<&Arc<RootNode>> {
        self.cell.get()
    }

    pub fn is_built(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl Debug for LazyEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match (self.cell.get(), &self.builder) {
            (Some(root), _) => f.debug_tuple("Built").field(root).finish(),
            (None, Some(_)) => f.write_str("Deferred"),
            (None, None) => f.write_str("Unavailable"),
        }
    }
}

/// The two possible calling conventions of one closure.
#[derive(Debug)]
pub struct CallTargets {
    pub proc_entry: LazyEntry,
    pub lambda_entry: LazyEntry,
}

impl CallTargets {
    pub fn entry(&self, convention: CallingConvention) -> Option<Arc<RootNode>> {
        match convention {
            CallingConvention::Proc => self.proc_entry.get(),
            CallingConvention::Lambda => self.lambda_entry.get(),
        }
    }

    pub fn is_built(&self, convention: CallingConvention) -> bool {
        match convention {
            CallingConvention::Proc => self.proc_entry.is_built(),
            CallingConvention::Lambda => self.lambda_entry.is_built(),
        }
    }
}

/// Everything an evaluator needs to create a closure value at run time.
#[derive(Debug)]
pub struct ClosureDefinition {
    pub kind: ClosureKind,
    /// The method the closure is lexically inside, for backtraces.
    pub name: Symbol,
    pub frame: Arc<FrameLayout>,
    pub arity: Arity,
    pub parameters: Vec<ArgumentDescriptor>,
    pub return_id: ReturnId,
    pub break_id: BreakId,
    /// The caller-frame slot marking a literal block's call site as live. Never set for lambdas.
    pub frame_on_stack_marker: Option<Slot>,
    pub targets: CallTargets,
}

impl ClosureDefinition {
    pub fn proc_entry(&self) -> Option<Arc<RootNode>> {
        self.targets.proc_entry.get()
    }

    pub fn lambda_entry(&self) -> Option<Arc<RootNode>> {
        self.targets.lambda_entry.get()
    }

    /// Reflection descriptors as seen through the given convention.
    pub fn parameters_for(&self, convention: CallingConvention) -> Vec<ArgumentDescriptor> {
        match convention {
            CallingConvention::Lambda => self.parameters.clone(),
            CallingConvention::Proc => self.parameters.iter().map(|p| p.for_proc()).collect(),
        }
    }
}

/// Structural equality over metadata and whichever entries are already built. Comparing never
/// forces a lazy build.
impl PartialEq for ClosureDefinition {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.frame == other.frame
            && self.arity == other.arity
            && self.parameters == other.parameters
            && self.frame_on_stack_marker == other.frame_on_stack_marker
            && self.targets.proc_entry.peek() == other.targets.proc_entry.peek()
            && self.targets.lambda_entry.peek() == other.targets.lambda_entry.peek()
    }
}
