use std::collections::BTreeMap;

/// Snapshot of a throttle's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ThrottleStatus {
  /// Permits currently available. Negative after the limit was lowered
  /// below the number of permits in use.
  pub allowed: i64,
  /// Values routed to the bleed supplier so far.
  pub bled: usize,
  /// Values waiting for a permit.
  pub buffered: usize,
  /// Values (or results) emitted so far.
  pub emitted: usize,
  /// Sequence number of this record, starting at 1.
  pub id: u64,
  pub limit: usize,
  pub vent_at: usize,
}

impl ThrottleStatus {
  /// The record as a string keyed map, using the wire key names.
  pub fn to_map(&self) -> BTreeMap<&'static str, i64> {
    BTreeMap::from([
      ("allowed", self.allowed),
      ("bled", self.bled as i64),
      ("buffered", self.buffered as i64),
      ("emitted", self.emitted as i64),
      ("id", self.id as i64),
      ("limit", self.limit as i64),
      ("vent-at", self.vent_at as i64),
    ])
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn map_uses_wire_keys() {
    let status =
      ThrottleStatus { allowed: -1, bled: 2, buffered: 3, emitted: 4, id: 5, limit: 6, vent_at: 7 };
    let map = status.to_map();
    assert_eq!(map.keys().copied().collect::<Vec<_>>(), vec![
      "allowed", "bled", "buffered", "emitted", "id", "limit", "vent-at"
    ]);
    assert_eq!(map["allowed"], -1);
    assert_eq!(map["vent-at"], 7);
  }
}
