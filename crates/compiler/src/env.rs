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

//! The compile-time scope chain.
//!
//! Scopes live in an arena owned by the `Environment` and refer to their parent by index, so a
//! scope can be frozen into a `FrameLayout` while its children are still being built and nothing
//! ever holds a back-pointer. Lowering always works in the `current` scope; `enter` and `leave`
//! move along the chain.

use std::collections::HashMap;
use std::sync::Arc;

use garnet_common::{CompileError, InternalError};
use garnet_ir::{
    BreakId, FrameLayout, FrameRef, ReturnId, SELF_NAME, SELF_SLOT, SPECIAL_VARIABLES_NAME,
    SPECIAL_VARIABLES_SLOT, ScopeKind, Slot, Symbol,
};
use tracing::{error, trace};

use crate::parameters::ParameterNames;
use crate::session::LowerSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

#[derive(Debug)]
pub struct Scope {
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    names: Vec<String>,
    slots: HashMap<String, Slot>,
    /// False for the block of a `for` loop, whose new variables belong to the enclosing scope.
    pub own_scope_for_assignments: bool,
    /// Only ever switches from false to true.
    dynamic_constant_lookup: bool,
    pub return_id: ReturnId,
    /// The break target of a block or lambda body.
    pub break_id: Option<BreakId>,
    pub flip_flop_states: Vec<Slot>,
    frame: Option<Arc<FrameLayout>>,
    /// The method this scope is lexically inside, for backtraces.
    pub method_name: Symbol,
    /// The parameters of a method scope, for bare `super`.
    pub parameters: Option<Arc<ParameterNames>>,
    /// For a block literal, the name of the method it was passed to.
    pub block_call_name: Option<String>,
}

impl Scope {
    fn new(
        kind: ScopeKind,
        parent: Option<ScopeId>,
        return_id: ReturnId,
        method_name: Symbol,
    ) -> Self {
        let mut scope = Self {
            kind,
            parent,
            names: vec![],
            slots: HashMap::new(),
            own_scope_for_assignments: true,
            dynamic_constant_lookup: false,
            return_id,
            break_id: None,
            flip_flop_states: vec![],
            frame: None,
            method_name,
            parameters: None,
            block_call_name: None,
        };
        scope.reserve(SELF_NAME, SELF_SLOT);
        if kind.reserves_special_variables() {
            scope.reserve(SPECIAL_VARIABLES_NAME, SPECIAL_VARIABLES_SLOT);
        }
        scope
    }

    fn reserve(&mut self, name: &str, slot: Slot) {
        self.names.push(name.to_string());
        self.slots.insert(name.to_string(), slot);
    }

    fn add(&mut self, name: &str) -> Result<Slot, InternalError> {
        if let Some(slot) = self.slots.get(name) {
            return Ok(*slot);
        }
        let index = u16::try_from(self.names.len()).map_err(|_| InternalError::TooManySlots {
            name: name.to_string(),
        })?;
        let slot = Slot(index);
        self.names.push(name.to_string());
        self.slots.insert(name.to_string(), slot);
        Ok(slot)
    }

    pub fn slot(&self, name: &str) -> Option<Slot> {
        self.slots.get(name).copied()
    }

    pub fn is_module_body(&self) -> bool {
        self.kind == ScopeKind::ModuleBody
    }

    pub fn dynamic_constant_lookup(&self) -> bool {
        self.dynamic_constant_lookup
    }

    pub fn is_frozen(&self) -> bool {
        self.frame.is_some()
    }

    pub fn width(&self) -> usize {
        self.names.len()
    }
}

#[derive(Debug)]
pub struct Environment {
    scopes: Vec<Scope>,
    current: ScopeId,
}

impl Environment {
    pub fn new(kind: ScopeKind, return_id: ReturnId, method_name: Symbol) -> Self {
        Self {
            scopes: vec![Scope::new(kind, None, return_id, method_name)],
            current: ScopeId(0),
        }
    }

    pub fn current_id(&self) -> ScopeId {
        self.current
    }

    pub fn current(&self) -> &Scope {
        &self.scopes[self.current.0]
    }

    pub fn current_mut(&mut self) -> &mut Scope {
        &mut self.scopes[self.current.0]
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0]
    }

    pub fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.0]
    }

    /// The parent of `id`, if it has one.
    pub fn parent(&self, id: ScopeId) -> Option<ScopeId> {
        self.scope(id).parent
    }

    /// Opens a child of the current scope and makes it current. It starts with the parent's
    /// constant-lookup mode.
    pub fn enter(&mut self, kind: ScopeKind, return_id: ReturnId, method_name: Symbol) -> ScopeId {
        let dynamic = self.current().dynamic_constant_lookup;
        let mut scope = Scope::new(kind, Some(self.current), return_id, method_name);
        scope.dynamic_constant_lookup = dynamic;
        self.scopes.push(scope);
        self.current = ScopeId(self.scopes.len() - 1);
        self.current
    }

    /// Returns to the parent of the current scope.
    pub fn leave(&mut self) -> Result<(), CompileError> {
        match self.current().parent {
            Some(parent) => {
                self.current = parent;
                Ok(())
            }
            None => Err(InternalError::ScopeUnderflow.into()),
        }
    }

    pub fn set_dynamic_constant_lookup(&mut self) {
        self.current_mut().dynamic_constant_lookup = true;
    }

    /// The slot for `name` in the current scope, allocating the next free one if new.
    pub fn declare_var(&mut self, name: &str) -> Result<Slot, CompileError> {
        self.declare_var_in(self.current, name)
    }

    pub fn declare_var_in(&mut self, id: ScopeId, name: &str) -> Result<Slot, CompileError> {
        let scope = self.scope_mut(id);
        if let Some(slot) = scope.slot(name) {
            return Ok(slot);
        }
        if scope.is_frozen() {
            error!(name, "declaration after frame layout was frozen");
            return Err(InternalError::DeclareAfterFreeze {
                name: name.to_string(),
            }
            .into());
        }
        let slot = scope.add(name)?;
        trace!(name, slot = slot.0, kind = %scope.kind, "declared slot");
        Ok(slot)
    }

    /// A hidden variable in the current scope, named from the session's counter.
    pub fn declare_local_temp(
        &mut self,
        session: &mut LowerSession,
        category: &str,
    ) -> Result<Slot, CompileError> {
        let name = session.next_temp_name(category);
        self.declare_var(&name)
    }

    /// Looks `name` up outward from the current scope. Blocks and lambdas are transparent; the
    /// first method, module body or top-level scope is searched and then ends the walk.
    pub fn find_local_var(&self, name: &str) -> Option<FrameRef> {
        let mut id = self.current;
        let mut depth = 0u16;
        loop {
            let scope = self.scope(id);
            if let Some(slot) = scope.slot(name) {
                return Some(FrameRef::new(depth, slot));
            }
            match scope.parent {
                Some(parent) if scope.kind.is_closure() => {
                    id = parent;
                    depth += 1;
                }
                _ => return None,
            }
        }
    }

    /// Like `find_local_var`, but a miss declares `name` in the nearest scope that owns its own
    /// assignments.
    pub fn find_or_declare(&mut self, name: &str) -> Result<FrameRef, CompileError> {
        if let Some(found) = self.find_local_var(name) {
            return Ok(found);
        }
        let mut id = self.current;
        let mut depth = 0u16;
        while !self.scope(id).own_scope_for_assignments {
            match self.scope(id).parent {
                Some(parent) => {
                    id = parent;
                    depth += 1;
                }
                None => break,
            }
        }
        let slot = self.declare_var_in(id, name)?;
        Ok(FrameRef::new(depth, slot))
    }

    /// A slot that must already exist, such as a parameter bound by the loader.
    pub fn expect_local_var(&self, name: &str) -> Result<FrameRef, CompileError> {
        self.find_local_var(name).ok_or_else(|| {
            error!(name, "expected slot missing");
            InternalError::MissingSlot {
                name: name.to_string(),
            }
            .into()
        })
    }

    /// The nearest enclosing scope that is not a block or lambda, with its frame depth.
    pub fn nearest_frame_owner(&self) -> (ScopeId, u16) {
        let mut id = self.current;
        let mut depth = 0u16;
        while self.scope(id).kind.is_closure() {
            match self.scope(id).parent {
                Some(parent) => {
                    id = parent;
                    depth += 1;
                }
                None => break,
            }
        }
        (id, depth)
    }

    /// The `$~`/`$_` cell: the current frame's own for methods, lambdas and the top level, the
    /// nearest such ancestor's for blocks. Module bodies allocate theirs on first use.
    pub fn special_variables_cell(&mut self) -> Result<FrameRef, CompileError> {
        let mut id = self.current;
        let mut depth = 0u16;
        loop {
            let scope = self.scope(id);
            if scope.kind.reserves_special_variables() {
                return Ok(FrameRef::new(depth, SPECIAL_VARIABLES_SLOT));
            }
            match (scope.kind, scope.parent) {
                (ScopeKind::Block, Some(parent)) => {
                    id = parent;
                    depth += 1;
                }
                _ => {
                    let slot = self.declare_var_in(id, SPECIAL_VARIABLES_NAME)?;
                    return Ok(FrameRef::new(depth, slot));
                }
            }
        }
    }

    /// Freezes the current scope's slot table. Later declarations in it are internal errors.
    pub fn compute_frame_layout(&mut self) -> Result<Arc<FrameLayout>, CompileError> {
        let scope = self.current_mut();
        if scope.is_frozen() {
            error!(kind = %scope.kind, "frame layout computed twice");
            return Err(InternalError::FrameAlreadyFrozen.into());
        }
        let layout = Arc::new(FrameLayout::new(
            scope.kind,
            scope.names.iter().map(|n| Symbol::new(n)).collect(),
        ));
        scope.frame = Some(layout.clone());
        Ok(layout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use garnet_ir::ControlIds;

    fn method_env() -> (Environment, ControlIds) {
        let mut ids = ControlIds::new();
        let env = Environment::new(ScopeKind::Method, ids.return_id(), Symbol::new("m"));
        (env, ids)
    }

    #[test]
    fn test_declare_is_idempotent_and_reserves_hidden_slots() {
        let (mut env, _) = method_env();
        assert_eq!(env.current().slot(SELF_NAME), Some(SELF_SLOT));
        assert_eq!(
            env.current().slot(SPECIAL_VARIABLES_NAME),
            Some(SPECIAL_VARIABLES_SLOT)
        );
        let a = env.declare_var("a").unwrap();
        assert_eq!(a, Slot(2));
        assert_eq!(env.declare_var("a").unwrap(), a);
        assert_eq!(env.declare_var("b").unwrap(), Slot(3));
    }

    #[test]
    fn test_blocks_are_transparent_and_methods_are_walls() {
        let (mut env, mut ids) = method_env();
        let outer = env.declare_var("x").unwrap();
        let rid = env.current().return_id.clone();
        env.enter(ScopeKind::Block, rid.clone(), Symbol::new("m"));
        env.enter(ScopeKind::Block, rid, Symbol::new("m"));
        assert_eq!(env.find_local_var("x"), Some(FrameRef::new(2, outer)));

        env.enter(ScopeKind::Method, ids.return_id(), Symbol::new("inner"));
        assert_eq!(env.find_local_var("x"), None);
        env.leave().unwrap();
        assert_eq!(env.find_local_var("x"), Some(FrameRef::new(2, outer)));
    }

    #[test]
    fn test_find_or_declare_skips_scopes_without_own_assignments() {
        let (mut env, _) = method_env();
        let rid = env.current().return_id.clone();
        env.enter(ScopeKind::Block, rid, Symbol::new("m"));
        env.current_mut().own_scope_for_assignments = false;
        let found = env.find_or_declare("m1").unwrap();
        assert_eq!(found.depth, 1);
        env.leave().unwrap();
        assert_eq!(env.current().slot("m1"), Some(found.slot));
    }

    #[test]
    fn test_freeze_once() {
        let (mut env, _) = method_env();
        env.declare_var("a").unwrap();
        let layout = env.compute_frame_layout().unwrap();
        assert_eq!(layout.width(), 3);
        assert_eq!(
            env.compute_frame_layout(),
            Err(CompileError::Internal(InternalError::FrameAlreadyFrozen))
        );
        assert_eq!(env.declare_var("a").unwrap(), Slot(2));
        assert!(env.declare_var("b").unwrap_err().is_internal());
    }

    #[test]
    fn test_special_variables_cell() {
        let (mut env, _) = method_env();
        let rid = env.current().return_id.clone();
        env.enter(ScopeKind::Block, rid, Symbol::new("m"));
        assert_eq!(
            env.special_variables_cell().unwrap(),
            FrameRef::new(1, SPECIAL_VARIABLES_SLOT)
        );
        env.enter(ScopeKind::ModuleBody, ReturnId::MODULE_BODY, Symbol::new("C"));
        let cell = env.special_variables_cell().unwrap();
        assert_eq!(cell.depth, 0);
        assert_eq!(env.current().slot(SPECIAL_VARIABLES_NAME), Some(cell.slot));
    }

    #[test]
    fn test_slot_numbers_do_not_wrap() {
        let (mut env, _) = method_env();
        for i in 2..=usize::from(u16::MAX) {
            env.declare_var(&format!("v{i}")).unwrap();
        }
        assert_eq!(env.current().slot("v65535"), Some(Slot(u16::MAX)));
        assert_eq!(
            env.declare_var("one_too_many"),
            Err(CompileError::Internal(InternalError::TooManySlots {
                name: "one_too_many".to_string()
            }))
        );
        assert_eq!(env.declare_var("v2").unwrap(), Slot(2));
    }

    #[test]
    fn test_missing_slot_is_internal() {
        let (env, _) = method_env();
        let err = env.expect_local_var("nope").unwrap_err();
        assert!(err.is_internal());
    }
}
