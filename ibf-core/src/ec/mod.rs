//! Uniwill embedded controller access
//!
//! - `transport` - serialized register reads/writes over the WMI method
//! - `acpi_call` - production WMI channel through `/proc/acpi/call`
//! - `registers` - named bitfields for the mode-select registers
//! - `mode` - fan mode handshakes (auto / manual direct / manual table)

mod acpi_call;
mod mode;
pub mod registers;
mod transport;

#[cfg(any(test, feature = "test-support"))]
pub mod ram;

pub use acpi_call::{parse_reply, AcpiCallChannel};
pub use mode::{remap_speed, EcModeMachine, Mode};
pub use transport::{encode_frame, Direction, EcTransport, WmiChannel};

use crate::constants::registers as reg;

/// The two EC-driven fans
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fan {
    /// Fan 1, CPU side
    Cpu,
    /// Fan 2, GPU side
    Gpu,
}

impl Fan {
    pub const ALL: [Fan; 2] = [Fan::Cpu, Fan::Gpu];

    /// Zone 0 speed entry of the fan's custom table
    pub fn table_speed_register(self) -> u16 {
        match self {
            Fan::Cpu => reg::CPU_FAN_SPEED,
            Fan::Gpu => reg::GPU_FAN_SPEED,
        }
    }

    pub fn direct_speed_register(self) -> u16 {
        match self {
            Fan::Cpu => reg::FAN1_SPEED,
            Fan::Gpu => reg::FAN2_SPEED,
        }
    }

    pub fn temperature_register(self) -> u16 {
        match self {
            Fan::Cpu => reg::FAN1_TEMP,
            Fan::Gpu => reg::FAN2_TEMP,
        }
    }
}
