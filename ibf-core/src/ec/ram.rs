//! In-memory EC RAM for exercising the transport and mode handshakes
//!
//! `EcRam` decodes argument frames the way the firmware does and keeps the
//! register file in a shared map, so a test can hand one handle to the
//! transport and inspect the end state through a clone.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;

use super::transport::WmiChannel;
use crate::constants::wmi;
use crate::error::{IbfanError, Result};

#[derive(Debug, Default)]
struct RamState {
    regs: HashMap<u16, u8>,
    writes: Vec<(u16, u8)>,
    reads: Vec<u16>,
    failing: HashSet<u16>,
    fail_all: bool,
}

/// Shared in-memory register file implementing [`WmiChannel`]
#[derive(Debug, Clone, Default)]
pub struct EcRam {
    state: Arc<Mutex<RamState>>,
}

impl EcRam {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preset a register value
    pub fn with(self, addr: u16, value: u8) -> Self {
        self.set(addr, value);
        self
    }

    /// Change a register behind the transport's back, like the firmware would
    pub fn set(&self, addr: u16, value: u8) {
        self.state.lock().regs.insert(addr, value);
    }

    pub fn get(&self, addr: u16) -> u8 {
        self.state.lock().regs.get(&addr).copied().unwrap_or(0)
    }

    /// Every write seen so far, in order
    pub fn writes(&self) -> Vec<(u16, u8)> {
        self.state.lock().writes.clone()
    }

    pub fn writes_to(&self, addr: u16) -> usize {
        self.state.lock().writes.iter().filter(|(a, _)| *a == addr).count()
    }

    pub fn reads(&self) -> Vec<u16> {
        self.state.lock().reads.clone()
    }

    pub fn clear_log(&self) {
        let mut state = self.state.lock();
        state.writes.clear();
        state.reads.clear();
    }

    /// Make every transaction on `addr` fail
    pub fn fail_on(&self, addr: u16) {
        self.state.lock().failing.insert(addr);
    }

    /// Make every transaction fail
    pub fn fail_all(&self, fail: bool) {
        self.state.lock().fail_all = fail;
    }
}

impl WmiChannel for EcRam {
    fn evaluate(&mut self, frame: &[u8; wmi::FRAME_LEN]) -> Result<Vec<u8>> {
        let addr = u16::from_le_bytes([frame[wmi::FRAME_ADDR_LO], frame[wmi::FRAME_ADDR_HI]]);
        let mut state = self.state.lock();

        if state.fail_all || state.failing.contains(&addr) {
            return Err(IbfanError::Channel(format!("injected failure at 0x{:04x}", addr)));
        }

        match frame[wmi::FRAME_FUNCTION] {
            wmi::FUNCTION_READ => {
                state.reads.push(addr);
                let value = state.regs.get(&addr).copied().unwrap_or(0);
                Ok(vec![value, 0, 0, 0])
            }
            wmi::FUNCTION_WRITE => {
                let value = frame[wmi::FRAME_VALUE];
                state.writes.push((addr, value));
                state.regs.insert(addr, value);
                Ok(vec![0, 0, 0, 0])
            }
            other => Err(IbfanError::Channel(format!("unknown function {}", other))),
        }
    }

    fn describe(&self) -> String {
        "in-memory EC RAM".to_string()
    }
}
