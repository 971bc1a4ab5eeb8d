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

//! Command line interface
//!
//! The daemon takes no options beyond help and version; everything else
//! comes from the optional settings file.

use std::ffi::OsString;

use clap::error::ErrorKind;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "ibfan")]
#[command(version)]
#[command(about = "Silent fan control for TUXEDO InfinityBook Gen10")]
#[command(long_about = "Silent fan control for TUXEDO InfinityBook Gen10

Reads CPU and GPU temperatures, keeps both fans on one shared curve and
hands control back to the embedded controller on exit (Ctrl+C, SIGTERM).

ENVIRONMENT VARIABLES:
    IBFAN_LOG        Log filter (trace, debug, info, warn, error)
    IBFAN_CONFIG     Settings file (default /etc/ibfan/config.json)")]
pub struct Cli {}

/// What `main` should do after argument parsing
#[derive(Debug)]
pub enum Invocation {
    Run(Cli),
    /// Help or version text to print on stdout, exit 0
    Info(String),
    /// Usage error to print on stderr, exit 1
    Usage(String),
}

/// Parse arguments without letting clap exit the process
pub fn parse<I, T>(args: I) -> Invocation
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    match Cli::try_parse_from(args) {
        Ok(cli) => Invocation::Run(cli),
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => Invocation::Info(e.to_string()),
            _ => Invocation::Usage(e.to_string()),
        },
    }
}
