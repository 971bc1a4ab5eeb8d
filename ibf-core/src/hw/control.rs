//! sysfs key-value node access
//!
//! Every node is a single decimal integer followed by a newline. Temperatures
//! are reported in millidegrees Celsius and converted to whole degrees here.

use std::ffi::CString;
use std::fs;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use crate::constants::temperature;
use crate::error::{IbfanError, Result};

/// Read a decimal integer node
pub fn read_int(path: &Path) -> Result<i64> {
    let content = fs::read_to_string(path).map_err(|e| IbfanError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    content.trim().parse::<i64>().map_err(|e| {
        IbfanError::InvalidArgument(format!(
            "{}: cannot parse '{}': {}",
            path.display(),
            content.trim(),
            e
        ))
    })
}

/// Write a decimal integer node
pub fn write_int(path: &Path, value: i64) -> Result<()> {
    fs::write(path, value.to_string()).map_err(|e| IbfanError::ActuatorWrite {
        path: path.to_path_buf(),
        reason: format!("Failed to write {}: {}", value, e),
    })
}

/// Read an hwmon `tempN_input` node in whole degrees Celsius
///
/// Truncates toward zero, like integer division in the firmware tools.
pub fn read_millidegrees(path: &Path) -> Result<i32> {
    let milli = read_int(path).map_err(|e| IbfanError::sensor_unavailable(path, e.to_string()))?;
    Ok((milli / temperature::MILLIDEGREE_DIVISOR as i64) as i32)
}

/// Read a node that already holds whole degrees (EC module `temp1`)
pub fn read_degrees(path: &Path) -> Result<i32> {
    let value = read_int(path).map_err(|e| IbfanError::sensor_unavailable(path, e.to_string()))?;
    Ok(value as i32)
}

/// True when the calling process may write `path` (access(2) with W_OK)
pub fn is_writable(path: &Path) -> bool {
    let Ok(c_path) = CString::new(path.as_os_str().as_bytes()) else {
        return false;
    };
    // SAFETY: c_path is a valid NUL-terminated string that outlives the call.
    unsafe { libc::access(c_path.as_ptr(), libc::W_OK) == 0 }
}
