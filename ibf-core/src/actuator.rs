//! Fan actuators
//!
//! Three ways to drive the InfinityBook fans, all behind [`FanActuator`]:
//!
//! - **EC**: the register handshake over the WMI method (needs `acpi_call`)
//! - **Module**: the legacy kernel module's class directory
//!   (`fan1_speed`, `fan2_speed`, `temp1`, `fan_auto`)
//! - **hwmon**: a PWM sink (`pwmN` + `pwmN_enable`)
//!
//! Both fans share heatpipes, so every actuator drives them to one target.

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::constants::{devices, ec_speed, pwm};
use crate::ec::{AcpiCallChannel, EcModeMachine, EcTransport, Fan};
use crate::error::{IbfanError, Result};
use crate::hw::{self, HwmonDevice};
use crate::profile::ProfileKind;
use crate::sensors::{SourceKind, SourceRole, TempSource};
use crate::settings::{Backend, Settings};

/// Something that can take over, command and release the fans
pub trait FanActuator {
    /// Short description for logs and the startup banner
    fn describe(&self) -> String;

    /// Accepted command range; commands outside it are clamped
    fn range(&self) -> RangeInclusive<u16>;

    /// Profile tuned for this actuator
    fn default_profile(&self) -> ProfileKind;

    /// Take control away from the firmware
    fn enter_manual(&mut self) -> Result<()>;

    /// Command both fans. Returns the value actually written.
    fn set_target(&mut self, value: u16) -> Result<u16>;

    /// Current per-fan speed values as reported by the actuator
    fn read_speeds(&self) -> Result<Vec<u16>>;

    /// Give control back to the firmware
    fn restore_auto(&mut self) -> Result<()>;

    /// Temperature the actuator itself can report, used as sensor fallback
    fn temperature_source(&self) -> Option<TempSource> {
        None
    }
}

// ============================================================================
// EC register actuator
// ============================================================================

/// Drives the EC directly through the register handshake
pub struct EcActuator {
    machine: EcModeMachine,
}

impl EcActuator {
    pub fn new(transport: EcTransport) -> Self {
        Self {
            machine: EcModeMachine::new(Arc::new(transport)),
        }
    }

    pub fn machine(&self) -> &EcModeMachine {
        &self.machine
    }
}

impl FanActuator for EcActuator {
    fn describe(&self) -> String {
        format!("EC registers ({})", self.machine.transport().describe())
    }

    fn range(&self) -> RangeInclusive<u16> {
        0..=ec_speed::MAX
    }

    fn default_profile(&self) -> ProfileKind {
        ProfileKind::Gen10Ec
    }

    fn enter_manual(&mut self) -> Result<()> {
        self.machine.enter_manual_table()
    }

    fn set_target(&mut self, value: u16) -> Result<u16> {
        let mut written = None;
        let mut last_error = None;
        for fan in Fan::ALL {
            match self.machine.set_target(fan, value) {
                Ok(speed) => written = Some(speed as u16),
                Err(e) => {
                    warn!(fan = ?fan, error = %e, "Failed to command fan");
                    last_error = Some(e);
                }
            }
        }
        match (written, last_error) {
            (Some(speed), _) => Ok(speed),
            (None, Some(e)) => Err(e),
            (None, None) => Err(IbfanError::generic("no fans commanded")),
        }
    }

    fn read_speeds(&self) -> Result<Vec<u16>> {
        Fan::ALL
            .iter()
            .map(|&fan| self.machine.read_fan_speed(fan).map(u16::from))
            .collect()
    }

    fn restore_auto(&mut self) -> Result<()> {
        self.machine.exit_to_auto()
    }

    fn temperature_source(&self) -> Option<TempSource> {
        Some(TempSource {
            role: SourceRole::Fallback,
            kind: SourceKind::EcZone {
                transport: Arc::clone(self.machine.transport()),
                fan: Fan::Cpu,
            },
        })
    }
}

// ============================================================================
// Legacy kernel module actuator
// ============================================================================

/// Drives the fans through the legacy module's sysfs class directory
#[derive(Debug, Clone)]
pub struct ModuleActuator {
    dir: PathBuf,
}

impl ModuleActuator {
    /// `None` unless the directory exposes the fan nodes
    pub fn probe(dir: &Path) -> Option<Self> {
        let has_nodes = [devices::MODULE_FAN1, devices::MODULE_FAN2, devices::MODULE_AUTO]
            .iter()
            .all(|node| dir.join(node).exists());
        has_nodes.then(|| Self { dir: dir.to_path_buf() })
    }

    fn node(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

impl FanActuator for ModuleActuator {
    fn describe(&self) -> String {
        format!("fan module ({})", self.dir.display())
    }

    fn range(&self) -> RangeInclusive<u16> {
        0..=ec_speed::MAX
    }

    fn default_profile(&self) -> ProfileKind {
        ProfileKind::Gen10Ec
    }

    fn enter_manual(&mut self) -> Result<()> {
        hw::write_int(&self.node(devices::MODULE_AUTO), 0)
    }

    fn set_target(&mut self, value: u16) -> Result<u16> {
        let value = value.min(ec_speed::MAX);
        hw::write_int(&self.node(devices::MODULE_FAN1), value as i64)?;
        hw::write_int(&self.node(devices::MODULE_FAN2), value as i64)?;
        Ok(value)
    }

    fn read_speeds(&self) -> Result<Vec<u16>> {
        [devices::MODULE_FAN1, devices::MODULE_FAN2]
            .iter()
            .map(|node| hw::read_int(&self.node(node)).map(|v| v.clamp(0, u16::MAX as i64) as u16))
            .collect()
    }

    fn restore_auto(&mut self) -> Result<()> {
        hw::write_int(&self.node(devices::MODULE_AUTO), 1)
    }

    fn temperature_source(&self) -> Option<TempSource> {
        let node = self.node(devices::MODULE_TEMP);
        node.exists().then(|| TempSource {
            role: SourceRole::Fallback,
            kind: SourceKind::Degrees(node),
        })
    }
}

// ============================================================================
// hwmon PWM actuator
// ============================================================================

/// Drives a hwmon PWM sink
#[derive(Debug, Clone)]
pub struct HwmonActuator {
    device: HwmonDevice,
    channels: Vec<u8>,
}

impl HwmonActuator {
    /// Drives pwm1, plus pwm2 when both `pwm2` and `pwm2_enable` exist
    pub fn new(device: HwmonDevice) -> Self {
        let mut channels = vec![1];
        if device.pwm(2).exists() && device.pwm_enable(2).exists() {
            channels.push(2);
        }
        Self { device, channels }
    }

    /// Drives a single channel
    pub fn with_channel(device: HwmonDevice, channel: u8) -> Self {
        if channel == 1 {
            return Self::new(device);
        }
        Self {
            device,
            channels: vec![channel],
        }
    }

    fn channels(&self) -> &[u8] {
        &self.channels
    }

    /// Writes every channel's enable node even when an earlier one fails;
    /// the first error is returned once all channels were attempted.
    fn set_enable(&self, mode: u8) -> Result<()> {
        let mut first_err = None;
        for &ch in self.channels() {
            let enable = self.device.pwm_enable(ch);
            // No enable node means the channel is always under manual control
            if !enable.exists() {
                continue;
            }
            if let Err(e) = hw::write_int(&enable, mode as i64) {
                warn!(channel = ch, mode, error = %e, "Failed to set pwm enable");
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl FanActuator for HwmonActuator {
    fn describe(&self) -> String {
        format!("hwmon {} ({})", self.device.name, self.device.path.display())
    }

    fn range(&self) -> RangeInclusive<u16> {
        0..=pwm::MAX
    }

    fn default_profile(&self) -> ProfileKind {
        ProfileKind::Gen10Hwmon
    }

    fn enter_manual(&mut self) -> Result<()> {
        self.set_enable(pwm::enable::MANUAL)
    }

    fn set_target(&mut self, value: u16) -> Result<u16> {
        let value = value.min(pwm::MAX);
        for &ch in self.channels() {
            hw::write_int(&self.device.pwm(ch), value as i64)?;
        }
        Ok(value)
    }

    fn read_speeds(&self) -> Result<Vec<u16>> {
        self.channels()
            .iter()
            .map(|&ch| hw::read_int(&self.device.pwm(ch)).map(|v| v.clamp(0, u16::MAX as i64) as u16))
            .collect()
    }

    fn restore_auto(&mut self) -> Result<()> {
        self.set_enable(pwm::enable::AUTOMATIC)
    }
}

// ============================================================================
// Discovery
// ============================================================================

/// Pick an actuator in priority order:
///
/// 1. hwmon device named `uniwill_ibg10_fanctl`
/// 2. legacy module class directory
/// 3. direct EC access when `acpi_call` is present
/// 4. any hwmon device with a writable pwm1..pwm3
///
/// A backend other than `auto` in the settings restricts the search to it.
pub fn discover_actuator(settings: &Settings) -> Result<Box<dyn FanActuator>> {
    let allow = |b: Backend| settings.backend == Backend::Auto || settings.backend == b;

    if allow(Backend::Hwmon) {
        if let Some(dev) = hw::find_by_name(&settings.hwmon_root, devices::UNIWILL_HWMON) {
            info!(path = %dev.path.display(), "Using uniwill hwmon fan control");
            return Ok(Box::new(HwmonActuator::new(dev)));
        }
    }

    if allow(Backend::Module) {
        if let Some(module) = ModuleActuator::probe(&settings.module_root) {
            info!(path = %settings.module_root.display(), "Using fan module");
            return Ok(Box::new(module));
        }
    }

    if allow(Backend::Ec) && settings.acpi_call_path.exists() {
        info!(method = %settings.acpi_method, "Using direct EC access via acpi_call");
        let channel = AcpiCallChannel::new(&settings.acpi_call_path, settings.acpi_method.clone());
        return Ok(Box::new(EcActuator::new(EcTransport::new(Box::new(channel)))));
    }

    if allow(Backend::Hwmon) {
        if let Some((dev, channel)) = hw::find_with_writable_pwm(&settings.hwmon_root) {
            info!(chip = %dev.name, path = %dev.path.display(), channel, "Using generic hwmon PWM");
            return Ok(Box::new(HwmonActuator::with_channel(dev, channel)));
        }
    }

    debug!(backend = ?settings.backend, "No actuator matched");
    Err(IbfanError::NoActuator {
        searched: searched_description(settings),
    })
}

fn searched_description(settings: &Settings) -> String {
    let mut searched = Vec::new();
    if matches!(settings.backend, Backend::Auto | Backend::Hwmon) {
        searched.push(format!(
            "{} or writable pwm under {}",
            devices::UNIWILL_HWMON,
            settings.hwmon_root.display()
        ));
    }
    if matches!(settings.backend, Backend::Auto | Backend::Module) {
        searched.push(settings.module_root.display().to_string());
    }
    if matches!(settings.backend, Backend::Auto | Backend::Ec) {
        searched.push(settings.acpi_call_path.display().to_string());
    }
    searched.join(", ")
}
