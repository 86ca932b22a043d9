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

//! Options that steer lowering. Created by whatever embeds the compiler and handed to each
//! `LowerSession`; the lowerer itself never reads configuration files or the environment.

use eyre::eyre;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LowerOptions {
    /// Whether `case/in`, `expr => pattern` and `expr in pattern` are accepted. When false, any
    /// of them is a compile error.
    pub pattern_matching: bool,
    /// Whether string literals are frozen when the source has no `frozen_string_literal` pragma.
    pub frozen_string_literals: bool,
    /// Record deferred warnings for literals in void context or conditions, and for duplicated
    /// `when` literals.
    pub warn_useless_literals: bool,
    /// Log (at info) each module body that switches to dynamic constant lookup.
    pub log_dynamic_constant_lookup: bool,
    /// Number of statements lowered between checks of the cancellation flag.
    pub check_cancellation_every: u32,
}

impl Default for LowerOptions {
    fn default() -> Self {
        Self {
            pattern_matching: true,
            frozen_string_literals: false,
            warn_useless_literals: true,
            log_dynamic_constant_lookup: false,
            check_cancellation_every: 1,
        }
    }
}

impl LowerOptions {
    /// Defaults, overlaid by the YAML file at `path` (if given), overlaid by `GARNET_*`
    /// environment variables.
    pub fn load(path: Option<&Path>) -> Result<LowerOptions, eyre::Report> {
        let mut figment = Figment::new().merge(Serialized::defaults(LowerOptions::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        figment
            .merge(Env::prefixed("GARNET_"))
            .extract::<LowerOptions>()
            .map_err(|e| eyre!("Failed to parse lowering options from {:?}: {}", path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_load_defaults_without_file() {
        let options = LowerOptions::load(None).unwrap();
        assert_eq!(options, LowerOptions::default());
    }

    #[test]
    fn test_load_overlays_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "pattern_matching: false").unwrap();
        writeln!(file, "check_cancellation_every: 16").unwrap();
        let options = LowerOptions::load(Some(file.path())).unwrap();
        assert!(!options.pattern_matching);
        assert_eq!(options.check_cancellation_every, 16);
        assert!(options.warn_useless_literals);
    }

    #[test]
    fn test_load_rejects_bad_types() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "pattern_matching: sometimes").unwrap();
        assert!(LowerOptions::load(Some(file.path())).is_err());
    }
}
