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

//! Control loop
//!
//! One thread, one tick per poll interval:
//! read sources -> max -> moving average -> curve with hysteresis -> actuator.
//! The loop owns all state. Manual mode is held through a [`ManualSession`]
//! whose drop hands the fans back to the firmware, so every exit path after
//! takeover restores automatic control exactly once.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use ibf_core::constants::timing;
use ibf_core::{FanActuator, HardwareProfile, Result, SensorSet, TempHistory};

use crate::status::{format_status_line, StatusWriter, Trend};

/// Who currently drives the fans
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMode {
    Auto,
    Manual,
}

/// Commanded speed bookkeeping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlState {
    /// Last commanded target (before any actuator-side remap)
    pub current: Option<u16>,
    /// Target commanded the tick before `current`
    pub previous: Option<u16>,
    pub mode: ControlMode,
}

impl Default for ControlState {
    fn default() -> Self {
        Self {
            current: None,
            previous: None,
            mode: ControlMode::Auto,
        }
    }
}

impl ControlState {
    /// Compute the next target for a smoothed temperature
    pub fn advance(&mut self, smoothed: i32, profile: &HardwareProfile) -> (u16, Trend) {
        let target = profile
            .curve
            .calc_target(smoothed, self.current.unwrap_or(0))
            .min(profile.max);
        let trend = Trend::between(self.current, target);
        self.previous = self.current;
        self.current = Some(target);
        (target, trend)
    }
}

/// Holds the actuator in manual mode; restores automatic control once
pub struct ManualSession {
    actuator: Box<dyn FanActuator>,
    restored: bool,
}

impl ManualSession {
    /// Take over the fans
    pub fn enter(mut actuator: Box<dyn FanActuator>) -> Result<Self> {
        if let Ok(speeds) = actuator.read_speeds() {
            debug!(?speeds, "Fan speeds before takeover");
        }

        if let Err(e) = actuator.enter_manual() {
            // a failed takeover may still have flipped some enables
            if let Err(restore_err) = actuator.restore_auto() {
                debug!(error = %restore_err, "Cleanup after failed takeover also failed");
            }
            return Err(e);
        }

        info!(actuator = %actuator.describe(), "Manual fan control active");
        Ok(Self {
            actuator,
            restored: false,
        })
    }

    pub fn actuator(&self) -> &dyn FanActuator {
        self.actuator.as_ref()
    }

    pub fn actuator_mut(&mut self) -> &mut dyn FanActuator {
        self.actuator.as_mut()
    }

    pub fn is_restored(&self) -> bool {
        self.restored
    }

    /// Hand the fans back. Later calls (and the drop) do nothing.
    pub fn restore(&mut self) -> Result<()> {
        if self.restored {
            return Ok(());
        }
        self.restored = true;

        match self.actuator.restore_auto() {
            Ok(()) => {
                info!("Restored automatic fan control");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Failed to restore automatic fan control");
                Err(e)
            }
        }
    }
}

impl Drop for ManualSession {
    fn drop(&mut self) {
        let _ = self.restore();
    }
}

/// What one tick measured and commanded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub cpu: Option<i32>,
    pub gpu: Option<i32>,
    pub smoothed: i32,
    pub target: u16,
    pub written: Option<u16>,
    pub percent: u16,
    pub trend: Trend,
}

/// Everything the loop needs, owned in one place
pub struct Controller {
    session: ManualSession,
    sensors: SensorSet,
    profile: &'static HardwareProfile,
    history: TempHistory,
    state: ControlState,
    last_smoothed: Option<i32>,
}

impl Controller {
    /// Enter manual mode on `actuator` and build the loop state
    pub fn start(
        actuator: Box<dyn FanActuator>,
        sensors: SensorSet,
        profile: &'static HardwareProfile,
    ) -> Result<Self> {
        let session = ManualSession::enter(actuator)?;
        let state = ControlState {
            mode: ControlMode::Manual,
            ..ControlState::default()
        };
        Ok(Self {
            session,
            sensors,
            profile,
            history: TempHistory::default(),
            state,
            last_smoothed: None,
        })
    }

    pub fn state(&self) -> &ControlState {
        &self.state
    }

    pub fn profile(&self) -> &'static HardwareProfile {
        self.profile
    }

    pub fn sensors(&self) -> &SensorSet {
        &self.sensors
    }

    pub fn session(&self) -> &ManualSession {
        &self.session
    }

    /// Run the curve on an already smoothed temperature and command the fans
    pub fn command(&mut self, smoothed: i32) -> (u16, Option<u16>, Trend) {
        let (target, trend) = self.state.advance(smoothed, self.profile);
        let written = match self.session.actuator_mut().set_target(target) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(target, error = %e, "Failed to command fans");
                None
            }
        };
        (target, written, trend)
    }

    /// One control iteration. `None` when no temperature has ever been read.
    pub fn tick(&mut self) -> Option<TickReport> {
        let readings = self.sensors.read();

        let smoothed = match readings.combined() {
            Some(raw) => {
                let smoothed = self.history.push(raw);
                self.last_smoothed = Some(smoothed);
                smoothed
            }
            None => {
                let held = self.last_smoothed?;
                warn!(held, "No temperature source readable, holding last value");
                held
            }
        };

        let (target, written, trend) = self.command(smoothed);
        debug!(smoothed, target, ?written, "Tick");

        Some(TickReport {
            cpu: readings.cpu.map(|s| s.celsius),
            gpu: readings.gpu.map(|s| s.celsius),
            smoothed,
            target,
            written,
            percent: self.profile.percent(target),
            trend,
        })
    }

    /// Restore automatic control and consume the controller
    pub fn shutdown(mut self) -> Result<()> {
        self.state.mode = ControlMode::Auto;
        self.session.restore()
    }
}

/// Sleep for `total`, waking early when `shutdown` is set
pub fn sleep_sliced(total: Duration, shutdown: &AtomicBool) {
    let deadline = Instant::now() + total;
    while !shutdown.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep(timing::SLEEP_SLICE.min(deadline - now));
    }
}

/// Tick until `shutdown` is set, then restore automatic control
pub fn run<W: Write>(
    mut controller: Controller,
    shutdown: &AtomicBool,
    interval: Duration,
    status: &mut StatusWriter<W>,
) -> Result<()> {
    info!(interval_ms = interval.as_millis() as u64, profile = controller.profile().name, "Control loop started");

    while !shutdown.load(Ordering::SeqCst) {
        if let Some(report) = controller.tick() {
            let time = chrono::Local::now().format("%H:%M:%S").to_string();
            let line = format_status_line(
                &time,
                report.cpu.unwrap_or(0),
                report.gpu.unwrap_or(0),
                report.percent,
                report.trend,
            );
            if let Err(e) = status.update(&line) {
                debug!(error = %e, "Status line write failed");
            }
        }
        sleep_sliced(interval, shutdown);
    }

    info!("Shutdown requested");
    controller.shutdown()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ibf_core::{IbfanError, ProfileKind, SourceRole, TempSource, GEN10_EC, GEN10_HWMON};
    use mockall::mock;
    use std::fs;
    use std::ops::RangeInclusive;
    use tempfile::TempDir;

    mock! {
        Actuator {}
        impl FanActuator for Actuator {
            fn describe(&self) -> String;
            fn range(&self) -> RangeInclusive<u16>;
            fn default_profile(&self) -> ProfileKind;
            fn enter_manual(&mut self) -> Result<()>;
            fn set_target(&mut self, value: u16) -> Result<u16>;
            fn read_speeds(&self) -> Result<Vec<u16>>;
            fn restore_auto(&mut self) -> Result<()>;
            fn temperature_source(&self) -> Option<TempSource>;
        }
    }

    fn actuator(restores: usize) -> MockActuator {
        let mut m = MockActuator::new();
        m.expect_describe().return_const("mock".to_string());
        m.expect_read_speeds().returning(|| Ok(vec![0, 0]));
        m.expect_enter_manual().times(1).returning(|| Ok(()));
        m.expect_set_target().returning(Ok);
        m.expect_restore_auto().times(restores).returning(|| Ok(()));
        m
    }

    fn sensor(dir: &TempDir, millideg: i32) -> SensorSet {
        let node = dir.path().join("temp1_input");
        fs::write(&node, millideg.to_string()).unwrap();
        SensorSet {
            cpu: Some(TempSource::hwmon(SourceRole::Primary, node)),
            gpu: None,
            fallback: None,
        }
    }

    #[test]
    fn state_tracks_trend() {
        let mut state = ControlState::default();
        assert_eq!(state.advance(64, &GEN10_EC), (31, Trend::First));
        assert_eq!(state.advance(72, &GEN10_EC), (62, Trend::Rising));
        assert_eq!(state.advance(72, &GEN10_EC), (62, Trend::Steady));
        assert_eq!(state.advance(60, &GEN10_EC), (25, Trend::Falling));
        assert_eq!(state.previous, Some(62));
    }

    #[test]
    fn hwmon_profile_can_switch_off() {
        let mut state = ControlState::default();
        assert_eq!(state.advance(50, &GEN10_HWMON).0, 0);
        assert_eq!(state.advance(70, &GEN10_HWMON).0, 112);
        // 58 + 8 = 66 still maps to 86 < 112, so the drop goes through
        assert_eq!(state.advance(58, &GEN10_HWMON).0, 39);
    }

    #[test]
    fn shutdown_restores_exactly_once() {
        let dir = TempDir::new().unwrap();
        let mut c = Controller::start(Box::new(actuator(1)), sensor(&dir, 70_000), &GEN10_EC).unwrap();
        assert_eq!(c.state().mode, ControlMode::Manual);
        assert!(!c.session().is_restored());
        c.tick().unwrap();
        c.shutdown().unwrap();
    }

    #[test]
    fn dropping_controller_restores_once() {
        let dir = TempDir::new().unwrap();
        let c = Controller::start(Box::new(actuator(1)), sensor(&dir, 70_000), &GEN10_EC).unwrap();
        drop(c);
    }

    #[test]
    fn explicit_restore_then_drop_is_single_call() {
        let mut session = ManualSession::enter(Box::new(actuator(1))).unwrap();
        session.restore().unwrap();
        assert!(session.is_restored());
        session.restore().unwrap();
        drop(session);
    }

    #[test]
    fn failed_takeover_is_cleaned_up_and_reported() {
        let mut m = MockActuator::new();
        m.expect_read_speeds().returning(|| Ok(vec![]));
        m.expect_enter_manual()
            .returning(|| Err(IbfanError::ModeSwitch { failed: 4, total: 4 }));
        m.expect_restore_auto().times(1).returning(|| Ok(()));

        let err = ManualSession::enter(Box::new(m)).err().unwrap();
        assert!(err.is_fatal());
    }

    #[test]
    fn tick_holds_last_value_when_sensors_vanish() {
        let dir = TempDir::new().unwrap();
        let sensors = sensor(&dir, 80_000);
        let mut c = Controller::start(Box::new(actuator(1)), sensors, &GEN10_EC).unwrap();

        let first = c.tick().unwrap();
        assert_eq!(first.smoothed, 80);
        assert_eq!(first.target, 112);
        assert_eq!(first.written, Some(112));

        fs::remove_file(dir.path().join("temp1_input")).unwrap();
        let held = c.tick().unwrap();
        assert_eq!(held.cpu, None);
        assert_eq!(held.smoothed, 80);
        assert_eq!(held.trend, Trend::Steady);
    }

    #[test]
    fn tick_without_any_reading_commands_nothing() {
        let dir = TempDir::new().unwrap();
        let sensors = SensorSet {
            cpu: Some(TempSource::hwmon(SourceRole::Primary, dir.path().join("missing"))),
            gpu: None,
            fallback: None,
        };
        let mut m = MockActuator::new();
        m.expect_read_speeds().returning(|| Ok(vec![]));
        m.expect_describe().return_const("mock".to_string());
        m.expect_enter_manual().returning(|| Ok(()));
        m.expect_set_target().never();
        m.expect_restore_auto().times(1).returning(|| Ok(()));

        let mut c = Controller::start(Box::new(m), sensors, &GEN10_EC).unwrap();
        assert!(c.tick().is_none());
    }

    #[test]
    fn signal_during_takeover_restores_without_ticking() {
        let dir = TempDir::new().unwrap();
        let mut m = MockActuator::new();
        m.expect_describe().return_const("mock".to_string());
        m.expect_read_speeds().returning(|| Ok(vec![0, 0]));
        m.expect_enter_manual().times(1).returning(|| Ok(()));
        m.expect_set_target().never();
        m.expect_restore_auto().times(1).returning(|| Ok(()));
        let c = Controller::start(Box::new(m), sensor(&dir, 70_000), &GEN10_EC).unwrap();

        // Flag raised by the handler while the takeover was still running
        let flag = AtomicBool::new(true);
        let mut status = StatusWriter::new(Vec::new(), true);
        run(c, &flag, Duration::from_secs(5), &mut status).unwrap();
        assert!(status.into_inner().is_empty());
    }

    #[test]
    fn sliced_sleep_wakes_on_shutdown() {
        let flag = AtomicBool::new(true);
        let start = Instant::now();
        sleep_sliced(Duration::from_secs(5), &flag);
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
