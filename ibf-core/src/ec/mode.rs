//! EC fan mode state machine
//!
//! The EC starts (and must always end) in hardware-automatic mode. Taking
//! over the fans is a fixed register handshake; handing them back is the
//! same handshake in reverse. Individual register failures are logged and
//! the sequence carries on: a half-applied handshake is still better than
//! aborting with the EC in an unknown mix of modes.

use std::sync::Arc;
use std::thread;

use tracing::{debug, info, warn};

use super::registers::{CustomProfileReg, CustomTable0Reg, CustomTable1Reg, FanModeReg, ModeRegister};
use super::transport::EcTransport;
use super::Fan;
use crate::constants::{ec_speed, fan_table, registers, timing};
use crate::error::{IbfanError, Result};

/// Who owns the fans
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// EC firmware controls the fans
    HardwareAuto,
    /// Manual mode without the custom tables (direct speed registers only)
    ManualDirect,
    /// Custom tables installed, zone 0 speed follows our commands
    ManualTable,
}

/// Counts register operations of one handshake
#[derive(Debug, Default)]
struct Steps {
    total: usize,
    failed: usize,
}

impl Steps {
    fn record<T>(&mut self, what: &str, result: Result<T>) -> Option<T> {
        self.total += 1;
        match result {
            Ok(v) => Some(v),
            Err(e) => {
                self.failed += 1;
                warn!(step = what, error = %e, "EC handshake step failed, continuing");
                None
            }
        }
    }

    fn all_failed(&self) -> bool {
        self.total > 0 && self.failed == self.total
    }
}

/// Sequences EC mode switches over a register transport
pub struct EcModeMachine {
    transport: Arc<EcTransport>,
    mode: Mode,
}

impl EcModeMachine {
    pub fn new(transport: Arc<EcTransport>) -> Self {
        Self {
            transport,
            mode: Mode::HardwareAuto,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Shared handle, also used for EC temperature reads
    pub fn transport(&self) -> &Arc<EcTransport> {
        &self.transport
    }

    /// Install the custom fan tables and take over both fans.
    ///
    /// A no-op once the tables are installed. Fails only when every register
    /// operation of the handshake failed.
    pub fn enter_manual_table(&mut self) -> Result<()> {
        if self.mode == Mode::ManualTable {
            debug!("Custom fan tables already installed");
            return Ok(());
        }

        info!(from = ?self.mode, "Installing custom EC fan tables");
        let mut steps = Steps::default();

        self.toggle_custom_profile(&mut steps);
        steps.record(
            "manual_mode",
            self.transport.write(registers::MANUAL_MODE, registers::MANUAL_MODE_ON),
        );
        self.ensure_flag::<FanModeReg>(false, &mut steps);
        self.ensure_flag::<CustomTable0Reg>(true, &mut steps);
        self.write_fan_tables(&mut steps);
        self.ensure_flag::<CustomTable1Reg>(true, &mut steps);

        self.finish_entry(steps, Mode::ManualTable)
    }

    /// Take over the fans through the direct speed registers only
    pub fn enter_manual_direct(&mut self) -> Result<()> {
        if self.mode != Mode::HardwareAuto {
            return Ok(());
        }

        info!("Entering direct EC fan control");
        let mut steps = Steps::default();
        self.toggle_custom_profile(&mut steps);
        steps.record(
            "manual_mode",
            self.transport.write(registers::MANUAL_MODE, registers::MANUAL_MODE_ON),
        );

        self.finish_entry(steps, Mode::ManualDirect)
    }

    fn finish_entry(&mut self, steps: Steps, target: Mode) -> Result<()> {
        if steps.all_failed() {
            return Err(IbfanError::ModeSwitch {
                failed: steps.failed,
                total: steps.total,
            });
        }
        if steps.failed > 0 {
            warn!(
                failed = steps.failed,
                total = steps.total,
                mode = ?target,
                "EC handshake partially applied"
            );
        }
        self.mode = target;
        Ok(())
    }

    /// Command one fan. Returns the speed value actually written.
    ///
    /// Installs the custom tables first if needed. The zone 0 table entry is
    /// written once, then the direct speed register is written several times
    /// because the EC occasionally drops a single write while it is busy.
    pub fn set_target(&mut self, fan: Fan, value: u16) -> Result<u8> {
        if self.mode != Mode::ManualTable {
            self.enter_manual_table()?;
        }

        let speed = remap_speed(value);
        let table_ok = match self.transport.write(fan.table_speed_register(), speed) {
            Ok(()) => true,
            Err(e) => {
                warn!(fan = ?fan, error = %e, "Failed to write fan table speed");
                false
            }
        };

        let mut last_error = None;
        for i in 0..timing::DIRECT_SPEED_REPEATS {
            if let Err(e) = self.transport.write(fan.direct_speed_register(), speed) {
                last_error = Some(e);
            }
            if i + 1 < timing::DIRECT_SPEED_REPEATS {
                thread::sleep(timing::DIRECT_SPEED_DELAY);
            }
        }

        match last_error {
            Some(e) if !table_ok => Err(e),
            _ => {
                debug!(fan = ?fan, requested = value, written = speed, "Fan speed set");
                Ok(speed)
            }
        }
    }

    /// Hand both fans back to the EC. Safe from any mode.
    pub fn exit_to_auto(&mut self) -> Result<()> {
        info!(from = ?self.mode, "Restoring automatic EC fan control");
        let mut steps = Steps::default();

        self.ensure_flag::<CustomTable1Reg>(false, &mut steps);
        self.ensure_flag::<CustomTable0Reg>(false, &mut steps);
        self.ensure_flag::<FanModeReg>(false, &mut steps);
        steps.record(
            "manual_mode",
            self.transport.write(registers::MANUAL_MODE, registers::MANUAL_MODE_OFF),
        );
        self.ensure_flag::<CustomProfileReg>(false, &mut steps);

        self.mode = Mode::HardwareAuto;

        if steps.all_failed() {
            return Err(IbfanError::ModeSwitch {
                failed: steps.failed,
                total: steps.total,
            });
        }
        if steps.failed > 0 {
            warn!(failed = steps.failed, total = steps.total, "EC restore partially applied");
        }
        Ok(())
    }

    /// Current direct speed register value (0-200)
    pub fn read_fan_speed(&self, fan: Fan) -> Result<u8> {
        self.transport.read(fan.direct_speed_register())
    }

    /// EC temperature register for the fan's zone (°C)
    pub fn read_zone_temperature(&self, fan: Fan) -> Result<u8> {
        self.transport.read(fan.temperature_register())
    }

    /// Clear then set the custom-profile bit; the EC only latches the
    /// profile on a rising edge.
    fn toggle_custom_profile(&self, steps: &mut Steps) {
        let Some(bits) = steps.record(CustomProfileReg::NAME, self.transport.read(CustomProfileReg::ADDR)) else {
            return;
        };
        let reg = CustomProfileReg::from_bits(bits);

        steps.record(
            CustomProfileReg::NAME,
            self.transport.write(CustomProfileReg::ADDR, reg.with_flag(false).bits()),
        );
        thread::sleep(timing::PROFILE_TOGGLE_DELAY);
        steps.record(
            CustomProfileReg::NAME,
            self.transport.write(CustomProfileReg::ADDR, reg.with_flag(true).bits()),
        );
    }

    /// Read-modify-write a single flag, skipping the write if it already matches
    fn ensure_flag<R: ModeRegister>(&self, on: bool, steps: &mut Steps) {
        let Some(bits) = steps.record(R::NAME, self.transport.read(R::ADDR)) else {
            return;
        };
        let reg = R::from_bits(bits);
        if reg.flag() != on {
            steps.record(R::NAME, self.transport.write(R::ADDR, reg.with_flag(on).bits()));
        }
    }

    /// Zone 0 covers every reachable temperature; zones 1-15 are parked
    /// above it at full speed.
    fn write_fan_tables(&self, steps: &mut Steps) {
        let zone0 = [
            (registers::CPU_FAN_END_TEMP, fan_table::CPU_ZONE0_END),
            (registers::CPU_FAN_START_TEMP, 0),
            (registers::CPU_FAN_SPEED, 0),
            (registers::GPU_FAN_END_TEMP, fan_table::GPU_ZONE0_END),
            (registers::GPU_FAN_START_TEMP, 0),
            (registers::GPU_FAN_SPEED, 0),
        ];
        for (addr, value) in zone0 {
            steps.record("fan_table", self.transport.write(addr, value));
        }

        let max = ec_speed::MAX as u8;
        for zone in 1..fan_table::ZONES {
            let start = fan_table::DUMMY_BASE_TEMP + zone as u8;
            let end = start + 1;
            let entries = [
                (registers::CPU_FAN_END_TEMP + zone, end),
                (registers::CPU_FAN_START_TEMP + zone, start),
                (registers::CPU_FAN_SPEED + zone, max),
                (registers::GPU_FAN_END_TEMP + zone, end),
                (registers::GPU_FAN_START_TEMP + zone, start),
                (registers::GPU_FAN_SPEED + zone, max),
            ];
            for (addr, value) in entries {
                steps.record("fan_table", self.transport.write(addr, value));
            }
        }
    }
}

/// Map a requested speed onto what the EC accepts: clamp to the EC maximum,
/// park 0 at 1 (the EC treats 0 as "no command" and spins up), raise
/// anything below the spin-up floor to the floor.
pub fn remap_speed(value: u16) -> u8 {
    let clamped = value.min(ec_speed::MAX);
    let speed = if clamped == 0 {
        ec_speed::PARKED
    } else if clamped < ec_speed::MIN_ON {
        ec_speed::MIN_ON
    } else {
        clamped
    };
    speed as u8
}
