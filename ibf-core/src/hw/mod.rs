//! Hardware interaction modules
//!
//! Plain sysfs access: integer nodes and hwmon device discovery.

mod control;
mod hwmon;

pub use control::{is_writable, read_degrees, read_int, read_millidegrees, write_int};
pub use hwmon::{find_by_name, find_with_writable_pwm, list_devices, HwmonDevice};
