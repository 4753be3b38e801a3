//! Pure per-item state classification for the pull phase.

/// The five states a listed remote item can be in relative to local storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
  /// No correlation; a genuinely new remote contact.
  Unmatched,
  /// Correlated and neither side moved; zero further work.
  MatchedUnchanged,
  /// Remote content moved, local did not; safe to overwrite locally.
  MatchedRemoteChanged,
  /// Local content moved, remote did not; the push phase handles it.
  MatchedLocalChanged,
  /// Both moved since the last sync; snapshot a conflict, overwrite neither.
  MatchedBothChanged,
}

/// Classify one item from its correlation and change bits. Both bits come
/// from content-hash comparison, never from wall-clock timestamps.
pub fn classify(
  matched: bool,
  remote_changed: bool,
  local_changed: bool,
) -> ItemState {
  if !matched {
    return ItemState::Unmatched;
  }
  match (remote_changed, local_changed) {
    (false, false) => ItemState::MatchedUnchanged,
    (true, false) => ItemState::MatchedRemoteChanged,
    (false, true) => ItemState::MatchedLocalChanged,
    (true, true) => ItemState::MatchedBothChanged,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn unmatched_wins_regardless_of_change_bits() {
    assert_eq!(classify(false, true, true), ItemState::Unmatched);
    assert_eq!(classify(false, false, false), ItemState::Unmatched);
  }

  #[test]
  fn matched_states_follow_the_change_bits() {
    assert_eq!(classify(true, false, false), ItemState::MatchedUnchanged);
    assert_eq!(classify(true, true, false), ItemState::MatchedRemoteChanged);
    assert_eq!(classify(true, false, true), ItemState::MatchedLocalChanged);
    assert_eq!(classify(true, true, true), ItemState::MatchedBothChanged);
  }
}
