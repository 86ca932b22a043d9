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

/// What the external encoding/pragma scanner found in the source's magic comments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePragmas {
    /// The path reported by `__FILE__` and used in warnings.
    pub file: String,
    pub encoding: String,
    /// `# frozen_string_literal: true|false`, if present.
    #[serde(default)]
    pub frozen_string_literal: Option<bool>,
}

impl Default for SourcePragmas {
    fn default() -> Self {
        Self {
            file: "-".to_string(),
            encoding: "UTF-8".to_string(),
            frozen_string_literal: None,
        }
    }
}

impl SourcePragmas {
    pub fn for_file(file: &str) -> Self {
        Self {
            file: file.to_string(),
            ..Default::default()
        }
    }

    /// The pragma wins over the configured default.
    pub fn freeze_string_literals(&self, default: bool) -> bool {
        self.frozen_string_literal.unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pragma_overrides_default() {
        let mut pragmas = SourcePragmas::for_file("a.rb");
        assert!(pragmas.freeze_string_literals(true));
        assert!(!pragmas.freeze_string_literals(false));
        pragmas.frozen_string_literal = Some(false);
        assert!(!pragmas.freeze_string_literals(true));
    }
}
