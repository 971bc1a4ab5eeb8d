//! WMI channel backed by the `acpi_call` kernel module
//!
//! acpi_call evaluates an arbitrary ACPI method: the request is written to
//! `/proc/acpi/call` and the result is read back from the same node. Buffers
//! come back as `{0x39, 0x00, ...}`; failures as `Error: AE_...`.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::trace;

use super::transport::WmiChannel;
use crate::constants::wmi;
use crate::error::{IbfanError, Result};

/// Evaluates the Uniwill EC access method through acpi_call
#[derive(Debug, Clone)]
pub struct AcpiCallChannel {
    call_path: PathBuf,
    method: String,
}

impl AcpiCallChannel {
    pub fn new(call_path: impl Into<PathBuf>, method: impl Into<String>) -> Self {
        Self {
            call_path: call_path.into(),
            method: method.into(),
        }
    }

    pub fn call_path(&self) -> &Path {
        &self.call_path
    }

    /// Request line for one frame: `<method> <instance> <method id> b<hex>`
    pub fn request(&self, frame: &[u8; wmi::FRAME_LEN]) -> String {
        let mut hex = String::with_capacity(wmi::FRAME_LEN * 2);
        for byte in frame {
            let _ = write!(hex, "{:02x}", byte);
        }
        format!(
            "{} 0x{:x} 0x{:x} b{}",
            self.method,
            wmi::INSTANCE,
            wmi::METHOD_ID,
            hex
        )
    }
}

impl WmiChannel for AcpiCallChannel {
    fn evaluate(&mut self, frame: &[u8; wmi::FRAME_LEN]) -> Result<Vec<u8>> {
        let request = self.request(frame);
        fs::write(&self.call_path, &request).map_err(|e| IbfanError::FileWrite {
            path: self.call_path.clone(),
            source: e,
        })?;

        let reply = fs::read_to_string(&self.call_path).map_err(|e| IbfanError::FileRead {
            path: self.call_path.clone(),
            source: e,
        })?;
        trace!(reply = %reply.trim_end_matches('\0').trim(), "acpi_call reply");

        parse_reply(&reply)
    }

    fn describe(&self) -> String {
        format!("acpi_call {} via {}", self.method, self.call_path.display())
    }
}

/// Parse an acpi_call result into a byte buffer
pub fn parse_reply(reply: &str) -> Result<Vec<u8>> {
    let reply = reply.trim_end_matches('\0').trim();

    if reply.starts_with("Error") {
        return Err(IbfanError::Channel(reply.to_string()));
    }

    let inner = reply
        .strip_prefix('{')
        .and_then(|r| r.strip_suffix('}'))
        .ok_or_else(|| IbfanError::Channel(format!("reply is not a buffer: '{}'", reply)))?;

    let mut bytes = Vec::new();
    for token in inner.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let digits = token
            .strip_prefix("0x")
            .or_else(|| token.strip_prefix("0X"))
            .unwrap_or(token);
        let byte = u8::from_str_radix(digits, 16)
            .map_err(|e| IbfanError::Channel(format!("bad buffer byte '{}': {}", token, e)))?;
        bytes.push(byte);
    }

    if bytes.is_empty() {
        return Err(IbfanError::Channel("empty buffer".to_string()));
    }
    Ok(bytes)
}
