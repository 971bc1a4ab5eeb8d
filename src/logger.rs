/*
 * This file is part of ibfan.
 *
 * Copyright (C) 2026 ibfan contributors
 *
 * ibfan is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * ibfan is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with ibfan. If not, see <https://www.gnu.org/licenses/>.
 */

//! Logging setup
//!
//! `tracing` everywhere. Under systemd (journal socket present, stdout not a
//! terminal) events go to the journal; otherwise they are formatted to
//! stderr so the status line on stdout stays intact.

use std::path::Path;

use ibf_core::constants::paths;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "IBFAN_LOG";

const DEFAULT_FILTER: &str = "info";

/// Where log events end up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    Journald,
    Stderr,
}

impl std::fmt::Display for LogTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogTarget::Journald => write!(f, "systemd journal"),
            LogTarget::Stderr => write!(f, "stderr"),
        }
    }
}

/// Filter from `IBFAN_LOG`, falling back to `info` when unset or invalid
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Pick the log target for this process
pub fn choose_target(interactive: bool, journal_socket: &Path) -> LogTarget {
    if !interactive && journal_socket.exists() {
        LogTarget::Journald
    } else {
        LogTarget::Stderr
    }
}

/// Install the global subscriber. Call once, early in `main`.
pub fn init(interactive: bool) -> LogTarget {
    if choose_target(interactive, Path::new(paths::JOURNAL_SOCKET)) == LogTarget::Journald {
        match tracing_journald::layer() {
            Ok(journald) => {
                tracing_subscriber::registry()
                    .with(journald)
                    .with(env_filter())
                    .init();
                return LogTarget::Journald;
            }
            Err(e) => {
                eprintln!("Failed to create journald layer: {}, falling back to stderr", e);
            }
        }
    }

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .with_env_filter(env_filter())
        .init();
    LogTarget::Stderr
}
