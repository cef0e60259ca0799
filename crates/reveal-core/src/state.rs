//! The shared ceremony document
//!
//! [`SharedState`] is stored remotely as a single JSON blob and read by every
//! session. Its wire form uses camelCase keys.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Epoch milliseconds
pub type Timestamp = i64;

/// Identifier of a guest who has checked in
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuestId(String);

impl GuestId {
    /// Create a guest id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GuestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GuestId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for GuestId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Ceremony settings provisioned out of band
///
/// Effectively immutable once the document exists. Sessions read it to decide
/// when the reveal may be triggered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RevealConfig {
    /// The name shown once the reveal happens
    pub reveal_name: String,
    /// Number of checked-in guests needed before the reveal is allowed
    pub required_reveals: u32,
    /// Passcode the host enters to trigger the reveal
    pub admin_passcode: String,
}

impl RevealConfig {
    /// Check a host-entered passcode.
    ///
    /// Surrounding whitespace is ignored. An empty configured passcode never
    /// matches. This gates the UI only; it is not an access control.
    pub fn verify_admin_passcode(&self, candidate: &str) -> bool {
        !self.admin_passcode.is_empty() && candidate.trim() == self.admin_passcode
    }
}

/// The single shared document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedState {
    /// Terminal flag, only ever moves from `false` to `true`
    pub is_name_revealed: bool,
    /// Guests that have checked in; grows monotonically
    pub authenticated_guests: BTreeSet<GuestId>,
    /// Provisioned settings; absent in older documents
    #[serde(default)]
    pub config: RevealConfig,
    /// Version marker, epoch milliseconds
    pub last_updated: Timestamp,
}

impl SharedState {
    /// The fallback state used when neither the remote nor the cache has
    /// anything: nobody checked in, nothing revealed.
    pub fn initial(now: Timestamp) -> Self {
        Self {
            is_name_revealed: false,
            authenticated_guests: BTreeSet::new(),
            config: RevealConfig::default(),
            last_updated: now,
        }
    }

    /// Add a guest (set-union). Adding a present guest is a no-op.
    pub fn with_guest(mut self, guest: impl Into<GuestId>) -> Self {
        self.authenticated_guests.insert(guest.into());
        self
    }

    /// Mark the name as revealed (logical OR with the current flag)
    pub fn with_name_revealed(mut self) -> Self {
        self.is_name_revealed = true;
        self
    }

    /// Least upper bound of two versions of the document.
    ///
    /// Guests are unioned, the reveal flag is OR-ed and the version is the
    /// maximum of both. The config comes from the newer side; on a tie the
    /// receiver's config is kept. Commutative on every mergeable field,
    /// associative and idempotent.
    pub fn join(&self, other: &SharedState) -> SharedState {
        let config = if other.last_updated > self.last_updated {
            other.config.clone()
        } else {
            self.config.clone()
        };

        SharedState {
            is_name_revealed: self.is_name_revealed || other.is_name_revealed,
            authenticated_guests: self
                .authenticated_guests
                .union(&other.authenticated_guests)
                .cloned()
                .collect(),
            config,
            last_updated: self.last_updated.max(other.last_updated),
        }
    }

    /// True when `self` already contains everything `other` knows about
    pub fn subsumes(&self, other: &SharedState) -> bool {
        (self.is_name_revealed || !other.is_name_revealed)
            && self
                .authenticated_guests
                .is_superset(&other.authenticated_guests)
    }

    /// Number of guests that have checked in
    pub fn revealed_count(&self) -> usize {
        self.authenticated_guests.len()
    }

    /// Whether enough guests have checked in for the host to reveal
    pub fn can_reveal(&self) -> bool {
        self.revealed_count() >= self.config.required_reveals as usize
    }

    /// Whether a given guest has checked in
    pub fn is_guest_authenticated(&self, guest: &GuestId) -> bool {
        self.authenticated_guests.contains(guest)
    }

    /// Serialize to the JSON wire form
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse the JSON wire form
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
