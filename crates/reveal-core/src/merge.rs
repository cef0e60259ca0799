//! Merge-safe transforms
//!
//! Writes to the shared document are a non-atomic read-modify-write. A
//! transform must only ever add information to the state it is given, so
//! that replaying it on top of a newer state never discards another
//! session's edits.

use crate::state::{GuestId, SharedState};

/// Transform that checks a guest in (set-union with the loaded guests)
pub fn admit_guest(guest: impl Into<GuestId>) -> impl FnOnce(SharedState) -> SharedState {
    let guest = guest.into();
    move |state| state.with_guest(guest)
}

/// Transform that reveals the name (logical OR with the loaded flag)
pub fn reveal_name() -> impl FnOnce(SharedState) -> SharedState {
    SharedState::with_name_revealed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admit_guest_keeps_existing_guests() {
        let loaded = SharedState::initial(0).with_guest("A");
        let next = admit_guest("B")(loaded);

        assert_eq!(next.revealed_count(), 2);
        assert!(next.is_guest_authenticated(&GuestId::from("A")));
    }

    #[test]
    fn test_reveal_name_keeps_guests() {
        let loaded = SharedState::initial(0).with_guest("A");
        let next = reveal_name()(loaded.clone());

        assert!(next.is_name_revealed);
        assert_eq!(next.authenticated_guests, loaded.authenticated_guests);
    }

    #[test]
    fn test_transforms_commute() {
        let base = SharedState::initial(0).with_guest("A");

        let left = reveal_name()(admit_guest("B")(base.clone()));
        let right = admit_guest("B")(reveal_name()(base));
        assert_eq!(left, right);
    }
}
