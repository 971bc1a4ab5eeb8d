//! EC register transport
//!
//! Every EC RAM access goes through the Uniwill WMI method with a 40-byte
//! argument frame. The transport owns the channel behind a mutex so two
//! transactions never interleave, and retries writes a bounded number of
//! times. Reads are never retried.

use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::constants::{timing, wmi};
use crate::error::{IbfanError, Result};

/// One evaluation of the WMI EC access method
///
/// Implementations return the raw reply buffer. Anything that is not a
/// buffer (an integer, an empty package, an ACPI error) is an `Err`.
#[cfg_attr(test, mockall::automock)]
pub trait WmiChannel: Send {
    fn evaluate(&mut self, frame: &[u8; wmi::FRAME_LEN]) -> Result<Vec<u8>>;

    /// Short description for logs and the startup banner
    fn describe(&self) -> String;
}

/// Transaction direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write(u8),
}

/// Build the argument frame for a transaction
pub fn encode_frame(addr: u16, direction: Direction) -> [u8; wmi::FRAME_LEN] {
    let mut frame = [0u8; wmi::FRAME_LEN];
    let [lo, hi] = addr.to_le_bytes();
    frame[wmi::FRAME_ADDR_LO] = lo;
    frame[wmi::FRAME_ADDR_HI] = hi;
    match direction {
        Direction::Read => frame[wmi::FRAME_FUNCTION] = wmi::FUNCTION_READ,
        Direction::Write(value) => {
            frame[wmi::FRAME_VALUE] = value;
            frame[wmi::FRAME_FUNCTION] = wmi::FUNCTION_WRITE;
        }
    }
    frame
}

/// Serialized, retrying access to EC RAM
pub struct EcTransport {
    channel: Mutex<Box<dyn WmiChannel>>,
    description: String,
    retry_delay: Duration,
}

impl EcTransport {
    pub fn new(channel: Box<dyn WmiChannel>) -> Self {
        let description = channel.describe();
        Self {
            channel: Mutex::new(channel),
            description,
            retry_delay: timing::WRITE_RETRY_DELAY,
        }
    }

    /// Override the pause between write attempts
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn describe(&self) -> &str {
        &self.description
    }

    /// Read one register. A single failure is returned as-is.
    pub fn read(&self, addr: u16) -> Result<u8> {
        let frame = encode_frame(addr, Direction::Read);
        let reply = {
            let mut channel = self.channel.lock();
            channel.evaluate(&frame)
        };

        let value = match reply {
            Ok(buf) => match buf.first() {
                Some(&value) => value,
                None => return Err(IbfanError::transport(addr, "empty reply buffer")),
            },
            Err(e) => return Err(IbfanError::transport(addr, e.to_string())),
        };

        trace!(addr = %format!("0x{:04x}", addr), value, "EC read");
        Ok(value)
    }

    /// Write one register, retrying on channel failure.
    ///
    /// After the last failed attempt the register state is unknown.
    pub fn write(&self, addr: u16, value: u8) -> Result<()> {
        let frame = encode_frame(addr, Direction::Write(value));
        let mut channel = self.channel.lock();
        let mut last_error = String::new();

        for attempt in 1..=timing::WRITE_ATTEMPTS {
            match channel.evaluate(&frame) {
                Ok(_) => {
                    trace!(addr = %format!("0x{:04x}", addr), value, attempt, "EC write");
                    return Ok(());
                }
                Err(e) => {
                    debug!(
                        addr = %format!("0x{:04x}", addr),
                        attempt,
                        error = %e,
                        "EC write attempt failed"
                    );
                    last_error = e.to_string();
                    if attempt < timing::WRITE_ATTEMPTS {
                        thread::sleep(self.retry_delay);
                    }
                }
            }
        }

        warn!(
            addr = %format!("0x{:04x}", addr),
            value,
            attempts = timing::WRITE_ATTEMPTS,
            "EC write failed, register state unknown"
        );
        Err(IbfanError::transport(
            addr,
            format!("write of 0x{:02x} failed after {} attempts: {}", value, timing::WRITE_ATTEMPTS, last_error),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::*;
    use mockall::Sequence;

    fn transport(mock: MockWmiChannel) -> EcTransport {
        EcTransport::new(Box::new(mock))
    }

    fn mock() -> MockWmiChannel {
        let mut mock = MockWmiChannel::new();
        mock.expect_describe().return_const("mock".to_string());
        mock
    }

    #[test]
    fn read_frame_layout() {
        let frame = encode_frame(0x0751, Direction::Read);
        assert_eq!(frame[0], 0x51);
        assert_eq!(frame[1], 0x07);
        assert_eq!(frame[2], 0);
        assert_eq!(frame[5], 1);
        assert!(frame[6..].iter().all(|&b| b == 0));
    }

    #[test]
    fn write_frame_layout() {
        let frame = encode_frame(0x1804, Direction::Write(0xc8));
        assert_eq!(&frame[..6], &[0x04, 0x18, 0xc8, 0, 0, 0]);
        assert!(frame[6..].iter().all(|&b| b == 0));
    }

    #[test]
    fn read_returns_first_reply_byte() {
        let mut mock = mock();
        mock.expect_evaluate()
            .withf(|f| f[0] == 0x3e && f[1] == 0x04 && f[5] == 1)
            .times(1)
            .returning(|_| Ok(vec![57, 0, 0, 0]));

        assert_eq!(transport(mock).read(0x043e).unwrap(), 57);
    }

    #[test]
    fn read_is_not_retried() {
        let mut mock = mock();
        mock.expect_evaluate()
            .times(1)
            .returning(|_| Err(IbfanError::Channel("AE_NOT_FOUND".into())));

        let err = transport(mock).read(0x0727).unwrap_err();
        assert!(matches!(err, IbfanError::Transport { addr: 0x0727, .. }));
    }

    #[test]
    fn empty_reply_is_a_failure() {
        let mut mock = mock();
        mock.expect_evaluate().times(1).returning(|_| Ok(Vec::new()));

        assert!(transport(mock).read(0x0741).is_err());
    }

    #[test]
    fn write_retries_then_succeeds() {
        let mut mock = mock();
        let mut seq = Sequence::new();
        mock.expect_evaluate()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_| Err(IbfanError::Channel("busy".into())));
        mock.expect_evaluate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(vec![0]));

        assert!(transport(mock).write(0x0741, 0x01).is_ok());
    }

    #[test]
    fn write_gives_up_after_three_attempts() {
        let mut mock = mock();
        mock.expect_evaluate()
            .with(eq(encode_frame(0x0741, Direction::Write(0x01))))
            .times(3)
            .returning(|_| Err(IbfanError::Channel("busy".into())));

        let err = transport(mock).write(0x0741, 0x01).unwrap_err();
        assert!(matches!(err, IbfanError::Transport { addr: 0x0741, .. }));
        assert!(err.to_string().contains("3 attempts"));
    }
}
