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

//! Subscriber setup for drivers and test binaries that embed the lowering stage. The lowering
//! crates only emit events; installing a subscriber is always the embedder's call.

use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

/// `RUST_LOG` if set, otherwise `debug` or `info`.
fn filter_or(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// Installs a compact fmt subscriber as the global default.
///
/// Fails if a global subscriber is already installed.
pub fn init_tracing(debug_fallback: bool) -> Result<(), eyre::Report> {
    let level = if debug_fallback { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .compact()
                .with_file(true)
                .with_line_number(true)
                .with_target(true),
        )
        .with(filter_or(level))
        .try_init()
        .map_err(|e| eyre::eyre!("Unable to install tracing subscriber: {e}"))
}

/// For tests: output goes through the test writer, and only the first call installs anything.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().compact().with_test_writer())
        .with(filter_or("warn"))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_install_is_reported() {
        init_test_tracing();
        init_test_tracing();
        assert!(init_tracing(false).is_err());
    }
}
