//! Temperature acquisition
//!
//! Sources are resolved once at startup by hwmon device name. Each tick the
//! available sources are read, combined by maximum and pushed through a
//! short moving-average window to filter spikes from localized heating.

use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::constants::temperature;
use crate::ec::{EcTransport, Fan};
use crate::error::{IbfanError, Result};
use crate::hw;

/// Why a source was picked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceRole {
    /// CPU package sensor
    Primary,
    /// GPU sensor
    Secondary,
    /// EC-reported temperature, used when no chip sensor exists
    Fallback,
}

/// Where a temperature comes from
#[derive(Clone)]
pub enum SourceKind {
    /// hwmon `tempN_input`, millidegrees
    Hwmon(PathBuf),
    /// Node holding whole degrees (legacy module `temp1`)
    Degrees(PathBuf),
    /// EC temperature register of a fan zone
    EcZone { transport: Arc<EcTransport>, fan: Fan },
}

impl fmt::Debug for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Hwmon(p) => f.debug_tuple("Hwmon").field(p).finish(),
            SourceKind::Degrees(p) => f.debug_tuple("Degrees").field(p).finish(),
            SourceKind::EcZone { fan, .. } => f.debug_struct("EcZone").field("fan", fan).finish(),
        }
    }
}

/// A resolved temperature source
#[derive(Debug, Clone)]
pub struct TempSource {
    pub role: SourceRole,
    pub kind: SourceKind,
}

impl TempSource {
    pub fn hwmon(role: SourceRole, path: impl Into<PathBuf>) -> Self {
        Self { role, kind: SourceKind::Hwmon(path.into()) }
    }

    /// Read the current temperature in °C
    pub fn read(&self) -> Result<i32> {
        match &self.kind {
            SourceKind::Hwmon(path) => hw::read_millidegrees(path),
            SourceKind::Degrees(path) => hw::read_degrees(path),
            SourceKind::EcZone { transport, fan } => transport
                .read(fan.temperature_register())
                .map(i32::from)
                .map_err(|e| IbfanError::sensor_unavailable(self.describe(), e.to_string())),
        }
    }

    /// Take a timestamped sample
    pub fn sample(&self) -> Result<TempSample> {
        Ok(TempSample {
            celsius: self.read()?,
            role: self.role,
            at: Instant::now(),
        })
    }

    pub fn describe(&self) -> String {
        match &self.kind {
            SourceKind::Hwmon(p) | SourceKind::Degrees(p) => p.display().to_string(),
            SourceKind::EcZone { transport, fan } => {
                format!("EC 0x{:04x} ({})", fan.temperature_register(), transport.describe())
            }
        }
    }
}

/// One temperature reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TempSample {
    pub celsius: i32,
    pub role: SourceRole,
    pub at: Instant,
}

/// Per-tick readings of the CPU-side and GPU-side sources
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Readings {
    pub cpu: Option<TempSample>,
    pub gpu: Option<TempSample>,
}

impl Readings {
    /// Hottest available reading
    pub fn combined(&self) -> Option<i32> {
        match (self.cpu, self.gpu) {
            (Some(c), Some(g)) => Some(c.celsius.max(g.celsius)),
            (Some(s), None) | (None, Some(s)) => Some(s.celsius),
            (None, None) => None,
        }
    }
}

/// Resolved sources; at least one slot is filled
#[derive(Debug, Clone)]
pub struct SensorSet {
    /// Primary sensor, or the fallback when no chip sensor was found
    pub cpu: Option<TempSource>,
    pub gpu: Option<TempSource>,
    /// Read only on ticks where neither chip sensor answered
    pub fallback: Option<TempSource>,
}

impl SensorSet {
    /// Resolve sources under `hwmon_root` by device name priority
    ///
    /// `fallback` (normally the actuator's own temperature) takes the primary
    /// slot when neither a primary nor a secondary sensor exists. Otherwise it
    /// is kept in reserve for ticks where the chip sensors stop answering.
    pub fn resolve(hwmon_root: &Path, fallback: Option<TempSource>) -> Result<Self> {
        let cpu = temperature::PRIMARY_CHIPS
            .iter()
            .find_map(|name| hw::find_by_name(hwmon_root, name))
            .map(|dev| {
                info!(chip = %dev.name, path = %dev.path.display(), "Primary temperature source");
                TempSource::hwmon(SourceRole::Primary, dev.temp_input())
            });

        let gpu = temperature::SECONDARY_CHIPS
            .iter()
            .find_map(|name| hw::find_by_name(hwmon_root, name))
            .map(|dev| {
                info!(chip = %dev.name, path = %dev.path.display(), "Secondary temperature source");
                TempSource::hwmon(SourceRole::Secondary, dev.temp_input())
            });

        let fallback = fallback.map(|source| TempSource {
            role: SourceRole::Fallback,
            ..source
        });

        if cpu.is_some() || gpu.is_some() {
            return Ok(Self { cpu, gpu, fallback });
        }

        match fallback {
            Some(source) => {
                info!(source = %source.describe(), "No chip sensor found, using EC temperature");
                Ok(Self {
                    cpu: Some(source),
                    gpu: None,
                    fallback: None,
                })
            }
            None => Err(IbfanError::NoSensor {
                searched: format!(
                    "{} under {}",
                    temperature::PRIMARY_CHIPS
                        .iter()
                        .chain(temperature::SECONDARY_CHIPS)
                        .copied()
                        .collect::<Vec<_>>()
                        .join("/"),
                    hwmon_root.display()
                ),
            }),
        }
    }

    /// Read every resolved source; unreadable ones are reported and skipped.
    /// When no chip sensor answers, the fallback fills the CPU slot.
    pub fn read(&self) -> Readings {
        let mut readings = Readings {
            cpu: self.cpu.as_ref().and_then(read_logged),
            gpu: self.gpu.as_ref().and_then(read_logged),
        };
        if readings.cpu.is_none() && readings.gpu.is_none() {
            readings.cpu = self.fallback.as_ref().and_then(read_logged);
        }
        readings
    }
}

fn read_logged(source: &TempSource) -> Option<TempSample> {
    match source.sample() {
        Ok(sample) => Some(sample),
        Err(e @ IbfanError::SensorUnavailable { .. }) => {
            warn!(role = ?source.role, error = %e, "Temperature source unavailable");
            None
        }
        Err(e) => {
            debug!(role = ?source.role, error = %e, "Temperature read failed");
            None
        }
    }
}

/// Moving average over the last few combined samples
#[derive(Debug, Clone)]
pub struct TempHistory {
    samples: VecDeque<i32>,
    capacity: usize,
}

impl Default for TempHistory {
    fn default() -> Self {
        Self::new(temperature::HISTORY_LEN)
    }
}

impl TempHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Add a sample, evicting the oldest once full, and return the new mean
    pub fn push(&mut self, celsius: i32) -> i32 {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(celsius);
        self.mean().unwrap_or(celsius)
    }

    /// Integer mean (truncating), `None` before the first sample
    pub fn mean(&self) -> Option<i32> {
        if self.samples.is_empty() {
            return None;
        }
        let sum: i64 = self.samples.iter().map(|&s| s as i64).sum();
        Some((sum / self.samples.len() as i64) as i32)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn add_sensor(root: &Path, dir: &str, name: &str, millideg: i32) -> PathBuf {
        let path = root.join(dir);
        fs::create_dir_all(&path).unwrap();
        fs::write(path.join("name"), format!("{}\n", name)).unwrap();
        fs::write(path.join("temp1_input"), format!("{}\n", millideg)).unwrap();
        path
    }

    #[test]
    fn primary_priority_prefers_uniwill() {
        let root = TempDir::new().unwrap();
        add_sensor(root.path(), "hwmon0", "k10temp", 60_000);
        let uw = add_sensor(root.path(), "hwmon1", "uniwill", 58_000);

        let set = SensorSet::resolve(root.path(), None).unwrap();
        let cpu = set.cpu.unwrap();
        assert_eq!(cpu.role, SourceRole::Primary);
        assert_eq!(cpu.describe(), uw.join("temp1_input").display().to_string());
        assert!(set.gpu.is_none());
    }

    #[test]
    fn combines_cpu_and_gpu_by_max() {
        let root = TempDir::new().unwrap();
        add_sensor(root.path(), "hwmon0", "k10temp", 61_500);
        add_sensor(root.path(), "hwmon1", "amdgpu", 67_900);

        let set = SensorSet::resolve(root.path(), None).unwrap();
        let readings = set.read();
        assert_eq!(readings.cpu.unwrap().celsius, 61);
        assert_eq!(readings.gpu.unwrap().role, SourceRole::Secondary);
        assert_eq!(readings.combined(), Some(67));
    }

    #[test]
    fn vanished_source_is_skipped() {
        let root = TempDir::new().unwrap();
        let cpu = add_sensor(root.path(), "hwmon0", "coretemp", 50_000);
        add_sensor(root.path(), "hwmon1", "amdgpu", 45_000);
        let set = SensorSet::resolve(root.path(), None).unwrap();

        fs::remove_file(cpu.join("temp1_input")).unwrap();
        let readings = set.read();
        assert!(readings.cpu.is_none());
        assert_eq!(readings.combined(), Some(45));

        fs::remove_dir_all(root.path().join("hwmon1")).unwrap();
        assert_eq!(set.read().combined(), None);
    }

    #[test]
    fn fallback_used_only_without_chip_sensors() {
        let root = TempDir::new().unwrap();
        let node = root.path().join("temp1");
        fs::write(&node, "63\n").unwrap();
        let fallback = TempSource { role: SourceRole::Primary, kind: SourceKind::Degrees(node) };

        let set = SensorSet::resolve(root.path(), Some(fallback.clone())).unwrap();
        let cpu = set.cpu.as_ref().unwrap();
        assert_eq!(cpu.role, SourceRole::Fallback);
        assert_eq!(set.read().combined(), Some(63));

        add_sensor(root.path(), "hwmon2", "amdgpu", 40_000);
        let set = SensorSet::resolve(root.path(), Some(fallback)).unwrap();
        assert!(set.cpu.is_none());
        assert!(set.gpu.is_some());
        assert_eq!(set.fallback.as_ref().unwrap().role, SourceRole::Fallback);
        assert_eq!(set.read().combined(), Some(40));
    }

    #[test]
    fn fallback_takes_over_when_chip_sensor_vanishes() {
        let root = TempDir::new().unwrap();
        let k10 = add_sensor(root.path(), "hwmon0", "k10temp", 70_000);
        let node = root.path().join("temp1");
        fs::write(&node, "85\n").unwrap();
        let fallback = TempSource { role: SourceRole::Primary, kind: SourceKind::Degrees(node) };

        let set = SensorSet::resolve(root.path(), Some(fallback)).unwrap();
        assert_eq!(set.read().combined(), Some(70));

        fs::remove_file(k10.join("temp1_input")).unwrap();
        let readings = set.read();
        assert_eq!(readings.cpu.unwrap().role, SourceRole::Fallback);
        assert_eq!(readings.combined(), Some(85));
    }

    #[test]
    fn nothing_resolved_is_fatal() {
        let root = TempDir::new().unwrap();
        let err = SensorSet::resolve(root.path(), None).unwrap_err();
        assert!(matches!(err, IbfanError::NoSensor { .. }));
        assert!(err.is_fatal());
        assert!(err.to_string().contains("uniwill/k10temp/coretemp/amdgpu"));
    }

    #[test]
    fn history_is_integer_mean_of_last_eight() {
        let mut h = TempHistory::default();
        assert_eq!(h.mean(), None);
        assert_eq!(h.push(50), 50);
        assert_eq!(h.push(51), 50);
        for t in [60, 60, 60, 60, 60, 60] {
            h.push(t);
        }
        assert_eq!(h.len(), 8);
        // (50 + 51 + 6*60) / 8 = 461 / 8
        assert_eq!(h.mean(), Some(57));

        // 50 evicted
        assert_eq!(h.push(70), (51 + 6 * 60 + 70) / 8);
        assert_eq!(h.len(), 8);
    }
}
