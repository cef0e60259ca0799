//! # Reveal Core
//!
//! Core types for the reveal ceremony synchronization stack.
//!
//! Every browser session shares one small JSON document. This crate defines
//! that document and the rules for combining two versions of it, so the
//! higher layers can write without a transactional store.
//!
//! ## Key Types
//!
//! - [`SharedState`]: The single shared document (reveal flag, guests, config, version)
//! - [`RevealConfig`]: Provisioned ceremony settings
//! - [`GuestId`]: Identifier of a checked-in guest
//! - [`Clock`]: Time abstraction for testability
//!
//! ## Merge rules
//!
//! All mutable fields of [`SharedState`] only move one way: guests are only
//! ever added and the reveal flag only goes from `false` to `true`. Mutations
//! must therefore be expressed as joins ([`SharedState::with_guest`],
//! [`SharedState::with_name_revealed`], [`SharedState::join`]) rather than
//! replacements. A future field that is not naturally mergeable (a counter,
//! a free-form string edited by guests) breaks this and brings back lost
//! updates under concurrent writers.

pub mod clock;
pub mod merge;
pub mod state;

pub use clock::{Clock, ManualClock, SystemClock};
pub use merge::{admit_guest, reveal_name};
pub use state::{GuestId, RevealConfig, SharedState, Timestamp};
