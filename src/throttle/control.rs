//! Throttle control messages.
//!
//! Wire format: UTF-8 `"<key>:<value>"` with keys `limit`, `bleed`,
//! `vent-at` and `status`. Whitespace around key and value is ignored.

use std::str::FromStr;

use crate::error::SupplyError;

/// A parsed control message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
  /// Set the permit limit; `allowed` shifts by the difference.
  Limit(usize),
  /// Move up to N buffered values to the bleed supplier.
  Bleed(usize),
  /// Set the venting threshold and vent right away.
  VentAt(usize),
  /// Emit a status record now.
  Status,
}

impl FromStr for ControlMessage {
  type Err = SupplyError;

  fn from_str(message: &str) -> Result<Self, Self::Err> {
    let invalid = |reason| SupplyError::Control { message: message.to_string(), reason };
    let (key, value) = message.split_once(':').ok_or_else(|| invalid("expected `key:value`"))?;
    let count = || {
      let parsed = value.trim().parse::<usize>();
      parsed.map_err(|_| invalid("value is not a non-negative integer"))
    };
    match key.trim() {
      "limit" => Ok(ControlMessage::Limit(count()?)),
      "bleed" => Ok(ControlMessage::Bleed(count()?)),
      "vent-at" => Ok(ControlMessage::VentAt(count()?)),
      "status" => Ok(ControlMessage::Status),
      _ => Err(invalid("unknown key")),
    }
  }
}
