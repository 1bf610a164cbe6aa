//! Producer-side adapter between the external IR protocol decoder and the
//! monitor engine.
//!
//! The monitor treats the hardware decoder as an opaque producer of
//! (address, code) pairs. `DecoderHandle` is the seam it feeds through: the
//! real firmware decoder, a replay harness, or a test all deliver raw
//! events the same way.

use crate::config::IrProtocol;
use chrono::{DateTime, Local};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error};

/// Raw decoded code as delivered by the protocol decoder
#[derive(Debug, Clone)]
pub struct RawCodeEvent {
    /// Address of the remote control that sent the code
    pub address: u16,

    /// The decoded protocol-level code
    pub code: u8,

    /// Protocol the decoder extracted the code from
    pub protocol: IrProtocol,

    /// Arrival time of the decoded signal
    pub timestamp: DateTime<Local>,
}

/// Errors on the decoder-to-monitor path
#[derive(Debug, Error)]
pub enum DecoderError {
    #[error("Failed to deliver raw code event: {0}")]
    DeliveryError(String),

    #[error("Failed to parse code line: {0}")]
    ParseError(String),
}

/// Handle the decoding side uses to push raw events into the monitor
pub struct DecoderHandle {
    protocol: IrProtocol,
    code_sender: mpsc::Sender<RawCodeEvent>,
}

impl DecoderHandle {
    pub fn new(protocol: IrProtocol, code_sender: mpsc::Sender<RawCodeEvent>) -> Self {
        Self {
            protocol,
            code_sender,
        }
    }

    /// Timestamps and delivers one decoded (address, code) pair
    ///
    /// Non-blocking; bursts beyond the channel capacity are reported as
    /// delivery errors rather than stalling the decoder.
    pub fn deliver(&self, address: u16, code: u8) -> Result<(), DecoderError> {
        let event = RawCodeEvent {
            address,
            code,
            protocol: self.protocol,
            timestamp: Local::now(),
        };
        debug!(
            "Decoded {} code {:#04x} from address {:#06x} at {}",
            event.protocol,
            code,
            address,
            event.timestamp.format("%H:%M:%S%.3f")
        );

        match self.code_sender.try_send(event) {
            Ok(_) => Ok(()),
            Err(e) => {
                error!("Failed to deliver raw code event: {}", e);
                Err(DecoderError::DeliveryError(e.to_string()))
            }
        }
    }

    /// Clones the raw-event sender for producers that need their own copy
    pub fn code_sender(&self) -> mpsc::Sender<RawCodeEvent> {
        self.code_sender.clone()
    }
}

/// Parses a harness line of the form `"<address> <code>"` in hex
///
/// Accepts an optional `0x` prefix on either field, e.g. `10 01` or
/// `0x10 0x01`.
pub fn parse_code_line(line: &str) -> Result<(u16, u8), DecoderError> {
    let mut fields = line.split_whitespace();
    let (Some(address), Some(code), None) = (fields.next(), fields.next(), fields.next()) else {
        return Err(DecoderError::ParseError(format!(
            "expected '<address> <code>', got '{}'",
            line.trim()
        )));
    };

    let address = u16::from_str_radix(address.trim_start_matches("0x"), 16)
        .map_err(|e| DecoderError::ParseError(format!("bad address '{}': {}", address, e)))?;
    let code = u8::from_str_radix(code.trim_start_matches("0x"), 16)
        .map_err(|e| DecoderError::ParseError(format!("bad code '{}': {}", code, e)))?;
    Ok((address, code))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_hex_pairs() {
        assert_eq!(parse_code_line("10 01").unwrap(), (0x10, 0x01));
        assert_eq!(parse_code_line("  ffee 7f ").unwrap(), (0xffee, 0x7f));
    }

    #[test]
    fn parses_prefixed_hex_pairs() {
        assert_eq!(parse_code_line("0x10 0x01").unwrap(), (0x10, 0x01));
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(parse_code_line("").is_err());
        assert!(parse_code_line("10").is_err());
        assert!(parse_code_line("10 01 02").is_err());
        assert!(parse_code_line("zz 01").is_err());
        assert!(parse_code_line("10 1ff").is_err());
    }

    #[tokio::test]
    async fn deliver_stamps_and_sends() {
        let (tx, mut rx) = mpsc::channel(4);
        let decoder = DecoderHandle::new(IrProtocol::Nec, tx);
        decoder.deliver(0x10, 0x01).unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.address, 0x10);
        assert_eq!(event.code, 0x01);
        assert_eq!(event.protocol, IrProtocol::Nec);
    }

    #[tokio::test]
    async fn deliver_reports_full_channel() {
        let (tx, _rx) = mpsc::channel(1);
        let decoder = DecoderHandle::new(IrProtocol::Nec, tx);
        decoder.deliver(0x10, 0x01).unwrap();
        assert!(decoder.deliver(0x10, 0x02).is_err());
    }
}
