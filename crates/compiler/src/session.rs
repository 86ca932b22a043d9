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

//! Per-compilation state shared by every scope of one lowering run.

use garnet_common::{
    CancellationFlag, CompileError, LowerOptions, SourcePragmas, Warning, WarningKind,
};
use garnet_ir::ControlIds;
use garnet_syntax::Span;
use tracing::trace;

/// One lowering run: options, the source's pragmas, the temp-name counter, the control-flow
/// token mint, warnings raised so far, and an optional cancellation flag.
///
/// Sessions share nothing with each other, so independent compilations may run on separate
/// threads without coordination.
#[derive(Debug)]
pub struct LowerSession {
    pub options: LowerOptions,
    pub pragmas: SourcePragmas,
    temp_counter: u64,
    pub(crate) control_ids: ControlIds,
    warnings: Vec<Warning>,
    cancellation: Option<CancellationFlag>,
    statements_since_check: u32,
}

impl Default for LowerSession {
    fn default() -> Self {
        Self::new(LowerOptions::default(), SourcePragmas::default())
    }
}

impl LowerSession {
    pub fn new(options: LowerOptions, pragmas: SourcePragmas) -> Self {
        Self {
            options,
            pragmas,
            temp_counter: 0,
            control_ids: ControlIds::new(),
            warnings: vec![],
            cancellation: None,
            statements_since_check: 0,
        }
    }

    pub fn with_cancellation(mut self, flag: CancellationFlag) -> Self {
        self.cancellation = Some(flag);
        self
    }

    /// A name no source identifier can collide with, unique within this session.
    pub fn next_temp_name(&mut self, category: &str) -> String {
        let n = self.temp_counter;
        self.temp_counter += 1;
        let name = format!("%{category}_{n}");
        trace!(name, "minted temp name");
        name
    }

    /// Restart temp numbering, so fixtures dump identically run after run.
    #[cfg(any(test, feature = "test-util"))]
    pub fn reset_temp_names(&mut self) {
        self.temp_counter = 0;
    }

    /// Called at each statement boundary.
    pub(crate) fn check_cancelled(&mut self) -> Result<(), CompileError> {
        let Some(flag) = &self.cancellation else {
            return Ok(());
        };
        self.statements_since_check += 1;
        if self.statements_since_check < self.options.check_cancellation_every.max(1) {
            return Ok(());
        }
        self.statements_since_check = 0;
        if flag.is_cancelled() {
            return Err(CompileError::Cancelled);
        }
        Ok(())
    }

    pub(crate) fn warn(&mut self, kind: WarningKind, span: Span, message: impl Into<String>) {
        let warning = Warning::new(kind, &self.pragmas.file, span, message);
        self.warnings.push(warning);
    }

    /// Sets aside the warnings gathered so far, so a nested unit collects only its own.
    pub(crate) fn begin_unit_warnings(&mut self) -> Vec<Warning> {
        std::mem::take(&mut self.warnings)
    }

    /// The warnings raised since the matching `begin_unit_warnings`, restoring the outer list.
    pub(crate) fn end_unit_warnings(&mut self, outer: Vec<Warning>) -> Vec<Warning> {
        std::mem::replace(&mut self.warnings, outer)
    }

    pub(crate) fn freeze_string_literals(&self) -> bool {
        self.pragmas
            .freeze_string_literals(self.options.frozen_string_literals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_names_are_unique_and_resettable() {
        let mut session = LowerSession::default();
        let a = session.next_temp_name("case");
        let b = session.next_temp_name("case");
        assert_ne!(a, b);
        assert!(a.starts_with('%'));
        session.reset_temp_names();
        assert_eq!(session.next_temp_name("case"), a);
    }

    #[test]
    fn test_cancellation_checked_every_n_statements() {
        let flag = CancellationFlag::new();
        let options = LowerOptions {
            check_cancellation_every: 3,
            ..LowerOptions::default()
        };
        let mut session =
            LowerSession::new(options, SourcePragmas::default()).with_cancellation(flag.clone());
        flag.cancel();
        assert_eq!(session.check_cancelled(), Ok(()));
        assert_eq!(session.check_cancelled(), Ok(()));
        assert_eq!(session.check_cancelled(), Err(CompileError::Cancelled));
    }

    #[test]
    fn test_unit_warnings_are_nested() {
        let mut session = LowerSession::default();
        session.warn(WarningKind::LiteralInCondition, Span::at_line(1), "outer");
        let outer = session.begin_unit_warnings();
        session.warn(WarningKind::LiteralInCondition, Span::at_line(2), "inner");
        let inner = session.end_unit_warnings(outer);
        assert_eq!(inner.len(), 1);
        assert_eq!(inner[0].message, "inner");
        let rest = session.begin_unit_warnings();
        assert_eq!(rest[0].message, "outer");
    }
}
