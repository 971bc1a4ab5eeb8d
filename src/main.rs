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

use std::io::{stdout, IsTerminal};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{error, info, warn};

use ibf_core::{discover_actuator, SensorSet, Settings};
use ibfan::cli::{self, Invocation};
use ibfan::control::{self, Controller};
use ibfan::logger::{self, LogTarget};
use ibfan::status::{status_enabled, StatusWriter};

fn main() -> ExitCode {
    // PHASE 1: Arguments
    match cli::parse(std::env::args_os()) {
        Invocation::Run(_) => {}
        Invocation::Info(text) => {
            print!("{}", text);
            return ExitCode::SUCCESS;
        }
        Invocation::Usage(text) => {
            eprint!("{}", text);
            return ExitCode::FAILURE;
        }
    }

    // PHASE 2: Logging
    let interactive = stdout().is_terminal();
    let log_target = logger::init(interactive);
    info!(version = env!("CARGO_PKG_VERSION"), log = %log_target, "ibfan starting");

    match run(interactive) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match log_target {
                LogTarget::Journald => error!("{:#}", e),
                LogTarget::Stderr => eprintln!("Error: {:#}", e),
            }
            ExitCode::FAILURE
        }
    }
}

fn run(interactive: bool) -> anyhow::Result<()> {
    // PHASE 3: Settings
    let settings_path = Settings::path();
    let settings = Settings::load_from(&settings_path)
        .with_context(|| format!("invalid settings file {}", settings_path.display()))?;

    // SAFETY: geteuid has no preconditions and cannot fail.
    if unsafe { libc::geteuid() } != 0 {
        warn!("Not running as root; fan and EC writes will most likely be refused");
    }

    // PHASE 4: Resolve actuator, sensors and profile
    let actuator = discover_actuator(&settings).context("no fan actuator available")?;
    let sensors = SensorSet::resolve(&settings.hwmon_root, actuator.temperature_source())
        .context("no temperature sensor available")?;

    let profile_kind = settings.profile.unwrap_or_else(|| actuator.default_profile());
    let profile = profile_kind.profile();
    let range = actuator.range();
    if profile.max != *range.end() {
        warn!(
            profile = profile.name,
            profile_max = profile.max,
            actuator_max = *range.end(),
            "Pinned profile does not match the actuator range; commands will be clamped"
        );
    }
    let actuator_name = actuator.describe();
    info!(actuator = %actuator_name, profile = profile.name, "Resolved fan control path");

    // PHASE 5: Signals (before the takeover)
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    if let Err(e) = ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install signal handler; only SIGKILL will stop the daemon");
    }

    // PHASE 6: Take over the fans
    let controller = Controller::start(actuator, sensors, profile)
        .with_context(|| format!("failed to enter manual mode on {}", actuator_name))?;

    if shutdown.load(Ordering::SeqCst) {
        info!("Stop requested during takeover");
        controller
            .shutdown()
            .context("failed to restore automatic fan control")?;
        return Ok(());
    }

    // PHASE 7: Run
    let mut status = StatusWriter::stdout(status_enabled(settings.status_line, interactive));
    if let Err(e) = status.banner(profile, controller.sensors(), &actuator_name) {
        warn!(error = %e, "Failed to write startup banner");
    }

    let interval = Duration::from_millis(settings.poll_interval_ms);
    control::run(controller, &shutdown, interval, &mut status)
        .context("failed to restore automatic fan control")?;

    info!("ibfan stopped");
    Ok(())
}
