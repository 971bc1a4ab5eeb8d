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

//! ibfan - silent fan control for TUXEDO InfinityBook Gen10 laptops
//!
//! This library holds the daemon's moving parts: argument parsing, logging
//! setup, the control loop and the console status output. Hardware access
//! lives in `ibf-core`.

pub mod cli;
pub mod control;
pub mod logger;
pub mod status;
