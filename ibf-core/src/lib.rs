//! ibfan Core Library
//!
//! Fan control for Uniwill / TUXEDO InfinityBook Gen10 laptops.
//!
//! # Module Structure
//!
//! - `ec/` - embedded controller register transport and mode handshakes
//! - `hw/` - sysfs node access and hwmon discovery
//! - `engine/` - fan curve interpolation and hysteresis
//! - `sensors` - temperature source resolution and smoothing
//! - `actuator` - EC, legacy module and hwmon PWM fan actuators
//! - `profile` - compiled per-hardware fan curves
//! - `settings` - optional JSON configuration
//!
//! # Example
//!
//! ```no_run
//! use ibf_core::{discover_actuator, SensorSet, Settings};
//!
//! let settings = Settings::load().unwrap();
//! let actuator = discover_actuator(&settings).unwrap();
//! let sensors = SensorSet::resolve(&settings.hwmon_root, actuator.temperature_source()).unwrap();
//! let profile = actuator.default_profile().profile();
//! let temp = sensors.read().combined().unwrap_or(0);
//! println!("{} -> {}", temp, profile.curve.interpolate(temp));
//! ```

// Grouped modules
pub mod ec;
pub mod engine;
pub mod hw;

// Standalone modules
pub mod actuator;
pub mod constants;
pub mod profile;
pub mod sensors;
pub mod settings;

pub mod error {
    //! Error types shared with the daemon
    pub use ibf_error::{IbfanError, Result};
}

pub use actuator::{discover_actuator, EcActuator, FanActuator, HwmonActuator, ModuleActuator};
pub use engine::{CurvePoint, CurveTable, FanCurve};
pub use error::{IbfanError, Result};
pub use profile::{HardwareProfile, ProfileKind, GEN10_EC, GEN10_HWMON};
pub use sensors::{Readings, SensorSet, SourceKind, SourceRole, TempHistory, TempSample, TempSource};
pub use settings::{Backend, Settings, StatusLine};
