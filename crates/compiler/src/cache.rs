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

//! A process-wide cache of compiled units, keyed by whatever identifies their source (a library
//! path, a method's owner and name).
//!
//! Each key maps to a shared cell. The first requester compiles into it; concurrent requesters
//! for the same key block on that cell and receive the same unit, so a key is compiled at most
//! once. A failed compilation leaves the cell empty and the next request tries again.

use std::hash::Hash;
use std::sync::Arc;

use garnet_common::CompileError;
use garnet_ir::CompiledUnit;
use once_cell::sync::OnceCell;
use tracing::debug;

type UnitCell = Arc<OnceCell<Arc<CompiledUnit>>>;

pub struct UnitCache<K> {
    units: papaya::HashMap<K, UnitCell>,
}

impl<K> Default for UnitCache<K>
where
    K: Hash + Eq,
{
    fn default() -> Self {
        Self {
            units: papaya::HashMap::new(),
        }
    }
}

impl<K> UnitCache<K>
where
    K: Hash + Eq,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached unit for `key`, compiling it with `compile` if no other caller has.
    pub fn get_or_compile<F>(&self, key: K, compile: F) -> Result<Arc<CompiledUnit>, CompileError>
    where
        F: FnOnce() -> Result<CompiledUnit, CompileError>,
    {
        let cell = {
            let guard = self.units.pin();
            guard
                .get_or_insert_with(key, || Arc::new(OnceCell::new()))
                .clone()
        };
        cell.get_or_try_init(|| {
            let unit = compile()?;
            debug!(name = %unit.name, "cached compiled unit");
            Ok(Arc::new(unit))
        })
        .cloned()
    }

    /// The unit for `key` if it has finished compiling.
    pub fn get(&self, key: &K) -> Option<Arc<CompiledUnit>> {
        let guard = self.units.pin();
        guard.get(key).and_then(|cell| cell.get().cloned())
    }

    /// The number of keys that have been requested, compiled or not.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
