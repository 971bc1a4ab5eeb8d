//! Constants for ibfan
//!
//! Register addresses, timings, sysfs paths and device names live here.
//! Never use magic numbers in other files - add them here first.

use std::time::Duration;

/// System paths
pub mod paths {
    /// Base path for hwmon devices
    pub const HWMON_BASE: &str = "/sys/class/hwmon";

    /// Class directory exported by the legacy InfinityBook Gen10 fan module
    pub const MODULE_CLASS_DIR: &str =
        "/sys/class/tuxedo_infinitybook_gen10_fan/tuxedo_infinitybook_gen10_fan";

    /// acpi_call kernel interface
    pub const ACPI_CALL: &str = "/proc/acpi/call";

    /// Configuration file
    pub const CONFIG_FILE: &str = "/etc/ibfan/config.json";

    /// Environment variable overriding the configuration file location
    pub const CONFIG_ENV: &str = "IBFAN_CONFIG";

    /// systemd journal socket; its presence selects journald logging
    pub const JOURNAL_SOCKET: &str = "/run/systemd/journal/socket";
}

/// Uniwill WMI management interface
pub mod wmi {
    /// ACPI path of the method behind the GUID
    pub const DEFAULT_METHOD: &str = "\\_SB.WMI.WMBC";

    /// WMI instance passed to the method
    pub const INSTANCE: u8 = 0;

    /// Method id for EC RAM access
    pub const METHOD_ID: u8 = 4;

    /// Size of the argument buffer in bytes
    pub const FRAME_LEN: usize = 40;

    /// Frame byte offsets
    pub const FRAME_ADDR_LO: usize = 0;
    pub const FRAME_ADDR_HI: usize = 1;
    pub const FRAME_VALUE: usize = 2;
    pub const FRAME_FUNCTION: usize = 5;

    /// Function codes carried in the frame
    pub const FUNCTION_READ: u8 = 1;
    pub const FUNCTION_WRITE: u8 = 0;
}

/// EC RAM register map (InfinityBook Gen10 family)
pub mod registers {
    /// Custom-profile mode register (bit 6)
    pub const CUSTOM_PROFILE: u16 = 0x0727;

    /// Manual fan control register
    pub const MANUAL_MODE: u16 = 0x0741;
    pub const MANUAL_MODE_ON: u8 = 0x01;
    pub const MANUAL_MODE_OFF: u8 = 0x00;

    /// Fan mode register (bit 6 = full automatic)
    pub const FAN_MODE: u16 = 0x0751;

    /// Custom fan table enable registers
    pub const CUSTOM_TABLE_0: u16 = 0x07c5;
    pub const CUSTOM_TABLE_1: u16 = 0x07c6;

    /// CPU fan table bases (zone i at base + i)
    pub const CPU_FAN_END_TEMP: u16 = 0x0f00;
    pub const CPU_FAN_START_TEMP: u16 = 0x0f10;
    pub const CPU_FAN_SPEED: u16 = 0x0f20;

    /// GPU fan table bases (zone i at base + i)
    pub const GPU_FAN_END_TEMP: u16 = 0x0f30;
    pub const GPU_FAN_START_TEMP: u16 = 0x0f40;
    pub const GPU_FAN_SPEED: u16 = 0x0f50;

    /// Direct speed registers
    pub const FAN1_SPEED: u16 = 0x1804;
    pub const FAN2_SPEED: u16 = 0x1809;

    /// EC temperature registers
    pub const FAN1_TEMP: u16 = 0x043e;
    pub const FAN2_TEMP: u16 = 0x044f;
}

/// Fan table layout written by the manual-table handshake
pub mod fan_table {
    /// Zones per fan
    pub const ZONES: u16 = 16;

    /// Zone 0 end temperatures
    pub const CPU_ZONE0_END: u8 = 115;
    pub const GPU_ZONE0_END: u8 = 120;

    /// Dummy zones start here (zone i covers 115+i .. 116+i)
    pub const DUMMY_BASE_TEMP: u8 = 115;
}

/// EC fan speed values
pub mod ec_speed {
    /// Maximum speed value accepted by the EC
    pub const MAX: u16 = 0xc8;

    /// Lowest speed that keeps the fan spinning
    pub const MIN_ON: u16 = 25;

    /// Written instead of 0, which the EC reads as "no command"
    pub const PARKED: u16 = 1;
}

/// hwmon PWM values
pub mod pwm {
    /// Maximum PWM value (full speed)
    pub const MAX: u16 = 255;

    /// pwmN_enable values
    pub mod enable {
        pub const MANUAL: u8 = 1;
        pub const AUTOMATIC: u8 = 2;
    }
}

/// Temperature conversion and sensor names
pub mod temperature {
    /// hwmon reports millidegrees
    pub const MILLIDEGREE_DIVISOR: i32 = 1000;

    /// Smoothing window (samples)
    pub const HISTORY_LEN: usize = 8;

    /// Primary CPU sensors in priority order
    pub const PRIMARY_CHIPS: &[&str] = &["uniwill", "k10temp", "coretemp"];

    /// Secondary (GPU) sensors
    pub const SECONDARY_CHIPS: &[&str] = &["amdgpu"];
}

/// Actuator device names
pub mod devices {
    /// hwmon name exported by the uniwill fan control driver
    pub const UNIWILL_HWMON: &str = "uniwill_ibg10_fanctl";

    /// Legacy module nodes
    pub const MODULE_FAN1: &str = "fan1_speed";
    pub const MODULE_FAN2: &str = "fan2_speed";
    pub const MODULE_TEMP: &str = "temp1";
    pub const MODULE_AUTO: &str = "fan_auto";

    /// Number of pwm channels probed on generic hwmon devices
    pub const MAX_PWM_CHANNELS: u8 = 3;
}

/// Timing constants
pub mod timing {
    use super::Duration;

    /// Delay between the two custom-profile writes
    pub const PROFILE_TOGGLE_DELAY: Duration = Duration::from_millis(50);

    /// Delay between write retries
    pub const WRITE_RETRY_DELAY: Duration = Duration::from_millis(50);

    /// Write attempts before a transport error is returned
    pub const WRITE_ATTEMPTS: u32 = 3;

    /// Direct speed register is written this many times per command
    pub const DIRECT_SPEED_REPEATS: u32 = 5;

    /// Delay between direct speed writes
    pub const DIRECT_SPEED_DELAY: Duration = Duration::from_millis(10);

    /// Default control loop period
    pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

    /// Bounds for the control loop period
    pub const MIN_POLL_INTERVAL_MS: u64 = 100;
    pub const MAX_POLL_INTERVAL_MS: u64 = 10_000;

    /// Sleep slice used while waiting for the next tick
    pub const SLEEP_SLICE: Duration = Duration::from_millis(50);
}
