//! hwmon device discovery
//!
//! Devices are matched by the contents of their `name` node. Directories are
//! visited in sorted order so repeated runs pick the same device.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::trace;

use super::control::is_writable;
use crate::constants::devices;

/// One `/sys/class/hwmon/hwmonN` directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HwmonDevice {
    pub path: PathBuf,
    pub name: String,
}

impl HwmonDevice {
    /// First temperature input of the device
    pub fn temp_input(&self) -> PathBuf {
        self.path.join("temp1_input")
    }

    /// `pwmN` node
    pub fn pwm(&self, channel: u8) -> PathBuf {
        self.path.join(format!("pwm{}", channel))
    }

    /// `pwmN_enable` node
    pub fn pwm_enable(&self, channel: u8) -> PathBuf {
        self.path.join(format!("pwm{}_enable", channel))
    }

    /// Lowest of pwm1..pwm3 that is writable
    pub fn first_writable_pwm(&self) -> Option<u8> {
        (1..=devices::MAX_PWM_CHANNELS).find(|&ch| is_writable(&self.pwm(ch)))
    }
}

/// List hwmon devices under `root`, skipping entries without a readable name
pub fn list_devices(root: &Path) -> Vec<HwmonDevice> {
    let Ok(entries) = fs::read_dir(root) else {
        trace!(root = %root.display(), "hwmon root not readable");
        return Vec::new();
    };

    let mut dirs: Vec<PathBuf> = entries
        .flatten()
        .filter(|e| e.file_name().to_string_lossy().starts_with("hwmon"))
        .map(|e| e.path())
        .collect();
    dirs.sort();

    dirs.into_iter()
        .filter_map(|path| {
            let name = fs::read_to_string(path.join("name")).ok()?;
            Some(HwmonDevice {
                path,
                name: name.trim().to_string(),
            })
        })
        .collect()
}

/// First device whose `name` matches exactly
pub fn find_by_name(root: &Path, name: &str) -> Option<HwmonDevice> {
    list_devices(root).into_iter().find(|d| d.name == name)
}

/// First device with a writable pwm channel, together with that channel
pub fn find_with_writable_pwm(root: &Path) -> Option<(HwmonDevice, u8)> {
    list_devices(root)
        .into_iter()
        .find_map(|d| d.first_writable_pwm().map(|ch| (d, ch)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn add_device(root: &Path, dir: &str, name: &str, nodes: &[&str]) -> PathBuf {
        let path = root.join(dir);
        fs::create_dir_all(&path).unwrap();
        fs::write(path.join("name"), format!("{}\n", name)).unwrap();
        for node in nodes {
            fs::write(path.join(node), "0\n").unwrap();
        }
        path
    }

    #[test]
    fn finds_device_by_exact_name() {
        let root = TempDir::new().unwrap();
        add_device(root.path(), "hwmon0", "acpitz", &[]);
        let k10 = add_device(root.path(), "hwmon1", "k10temp", &["temp1_input"]);
        add_device(root.path(), "hwmon2", "k10temp_extra", &[]);

        let dev = find_by_name(root.path(), "k10temp").unwrap();
        assert_eq!(dev.path, k10);
        assert_eq!(dev.temp_input(), k10.join("temp1_input"));
        assert!(find_by_name(root.path(), "amdgpu").is_none());
    }

    #[test]
    fn ignores_non_hwmon_entries_and_nameless_dirs() {
        let root = TempDir::new().unwrap();
        add_device(root.path(), "thermal0", "uniwill", &[]);
        fs::create_dir_all(root.path().join("hwmon3")).unwrap();

        assert!(list_devices(root.path()).is_empty());
    }

    #[test]
    fn finds_writable_pwm() {
        let root = TempDir::new().unwrap();
        add_device(root.path(), "hwmon0", "nvme", &["temp1_input"]);
        let fan = add_device(root.path(), "hwmon1", "it8613", &["pwm2"]);

        let (dev, channel) = find_with_writable_pwm(root.path()).unwrap();
        assert_eq!(dev.path, fan);
        assert_eq!(channel, 2);
    }

    #[test]
    fn missing_root_yields_nothing() {
        assert!(list_devices(Path::new("/nonexistent/hwmon")).is_empty());
    }
}
