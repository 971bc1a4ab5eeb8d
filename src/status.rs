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

//! Console status output
//!
//! On a terminal: a banner describing the curve and the resolved devices,
//! then one status line redrawn in place each tick. Detached: a single
//! startup line, nothing per tick.

use std::fmt;
use std::io::{self, Write};

use crossterm::cursor::MoveUp;
use crossterm::queue;

use ibf_core::{HardwareProfile, SensorSet, StatusLine};

/// Direction of the commanded speed relative to the previous tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    /// No previous command yet
    First,
    Rising,
    Falling,
    Steady,
}

impl Trend {
    pub fn between(previous: Option<u16>, current: u16) -> Self {
        match previous {
            None => Trend::First,
            Some(p) if current > p => Trend::Rising,
            Some(p) if current < p => Trend::Falling,
            Some(_) => Trend::Steady,
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Trend::First => " ",
            Trend::Rising => "^",
            Trend::Falling => "v",
            Trend::Steady => "=",
        };
        f.write_str(symbol)
    }
}

/// `HH:MM:SS | CPU | GPU | NN% T`
pub fn format_status_line(time: &str, cpu: i32, gpu: i32, percent: u16, trend: Trend) -> String {
    format!("{} | {:>3} | {:>3} | {:>3}% {}", time, cpu, gpu, percent, trend)
}

/// Whether the banner and status line are drawn
pub fn status_enabled(setting: StatusLine, stdout_is_tty: bool) -> bool {
    match setting {
        StatusLine::Auto => stdout_is_tty,
        StatusLine::Always => true,
        StatusLine::Never => false,
    }
}

/// Writes the banner and the per-tick status line
pub struct StatusWriter<W: Write> {
    out: W,
    enabled: bool,
}

impl StatusWriter<io::Stdout> {
    pub fn stdout(enabled: bool) -> Self {
        Self::new(io::stdout(), enabled)
    }
}

impl<W: Write> StatusWriter<W> {
    pub fn new(out: W, enabled: bool) -> Self {
        Self { out, enabled }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Startup output: the full banner, or one line when detached
    pub fn banner(&mut self, profile: &HardwareProfile, sensors: &SensorSet, actuator: &str) -> io::Result<()> {
        if !self.enabled {
            writeln!(self.out, "Starting fan control daemon...")?;
            return self.out.flush();
        }

        let source = |s: Option<&ibf_core::TempSource>| s.map(|s| s.describe()).unwrap_or_else(|| "none".to_string());

        writeln!(self.out)?;
        writeln!(self.out, "  TUXEDO InfinityBook Gen10 Silent Fan Control ({})", profile.name)?;
        writeln!(self.out, "  ----------------------------------------------------")?;
        for line in profile.describe_thresholds() {
            writeln!(self.out, "  {}", line)?;
        }
        writeln!(self.out)?;
        writeln!(self.out, "  Temp source (CPU): {}", source(sensors.cpu.as_ref()))?;
        writeln!(self.out, "  Temp source (GPU): {}", source(sensors.gpu.as_ref()))?;
        writeln!(self.out, "  Fan actuator:      {}", actuator)?;
        writeln!(self.out, "  Mode: Unified (both fans follow max temp - shared heatpipes)")?;
        writeln!(self.out)?;
        writeln!(self.out, "  Trend: ^ = ramping up, v = slowing down, = = steady")?;
        writeln!(self.out, "  Ctrl+C to stop and restore automatic control")?;
        writeln!(self.out)?;
        writeln!(self.out, "Time     | CPU | GPU | Fan")?;
        writeln!(self.out, "---------|-----|-----|-------")?;
        // placeholder line the first status update overwrites
        writeln!(self.out)?;
        self.out.flush()
    }

    /// Redraw the status line in place
    pub fn update(&mut self, line: &str) -> io::Result<()> {
        if !self.enabled {
            return Ok(());
        }
        queue!(self.out, MoveUp(1))?;
        writeln!(self.out, "{}", line)?;
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ibf_core::{SourceRole, TempSource, GEN10_HWMON};

    fn sensors() -> SensorSet {
        SensorSet {
            cpu: Some(TempSource::hwmon(SourceRole::Primary, "/sys/class/hwmon/hwmon2/temp1_input")),
            gpu: None,
            fallback: None,
        }
    }

    #[test]
    fn trend_symbols() {
        assert_eq!(Trend::between(None, 100).to_string(), " ");
        assert_eq!(Trend::between(Some(50), 100).to_string(), "^");
        assert_eq!(Trend::between(Some(100), 50).to_string(), "v");
        assert_eq!(Trend::between(Some(50), 50).to_string(), "=");
    }

    #[test]
    fn status_line_layout() {
        assert_eq!(
            format_status_line("14:03:27", 68, 0, 37, Trend::Rising),
            "14:03:27 |  68 |   0 |  37% ^"
        );
        assert_eq!(
            format_status_line("00:00:01", 101, 95, 100, Trend::First),
            "00:00:01 | 101 |  95 | 100%  "
        );
    }

    #[test]
    fn status_setting_overrides_tty_detection() {
        assert!(status_enabled(StatusLine::Auto, true));
        assert!(!status_enabled(StatusLine::Auto, false));
        assert!(status_enabled(StatusLine::Always, false));
        assert!(!status_enabled(StatusLine::Never, true));
    }

    #[test]
    fn detached_output_is_one_line() {
        let mut w = StatusWriter::new(Vec::new(), false);
        w.banner(&GEN10_HWMON, &sensors(), "hwmon uniwill_ibg10_fanctl").unwrap();
        w.update("ignored").unwrap();
        let out = String::from_utf8(w.into_inner()).unwrap();
        assert_eq!(out, "Starting fan control daemon...\n");
    }

    #[test]
    fn banner_lists_sources_and_sink() {
        let mut w = StatusWriter::new(Vec::new(), true);
        w.banner(&GEN10_HWMON, &sensors(), "hwmon uniwill_ibg10_fanctl").unwrap();
        let out = String::from_utf8(w.into_inner()).unwrap();
        assert!(out.contains("Fan off:    <= 55 C"));
        assert!(out.contains("Temp source (CPU): /sys/class/hwmon/hwmon2/temp1_input"));
        assert!(out.contains("Temp source (GPU): none"));
        assert!(out.contains("Fan actuator:      hwmon uniwill_ibg10_fanctl"));
    }

    #[test]
    fn update_moves_cursor_up_before_redraw() {
        let mut w = StatusWriter::new(Vec::new(), true);
        w.update("12:00:00 |  60 |  55 |  15% =").unwrap();
        let out = String::from_utf8(w.into_inner()).unwrap();
        assert_eq!(out, "\x1b[1A12:00:00 |  60 |  55 |  15% =\n");
    }
}
