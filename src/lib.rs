//! # Goal
//! The main goal of this library is to let several values jointly act as a single key
//! of a map or a set, where some of those values must not be kept alive by the map.
//!
//! Using such tuple directly as a map key would keep all of its values alive for as long
//! as the entry exists, which for weak values is forever.
//!
//! # Features
//! - Identity of values, through Hasher.
//!      - Responsible for: Have I seen this value before, and under which identifier?
//! - Canonical keys of tuples, through Composer.
//!      - Responsible for: Which key belongs to this tuple of weak and strong values?
//!      - Responsible for: When is nobody able to ask for this key again?
//!
//! # Architecture
//! There are several pieces that interact with one another:
//! - Values - objects, compared by identity, and primitives, compared by value.
//! - Hasher - assigns identifiers to values and joins them into a hash of a sequence.
//! - Composer - hash-conses tuples into CompositeKeys and reclaims them once their weak
//!   values are gone.
//! - Collections - consumers which store CompositeKeys weakly, so their entries go with them.
//!
//! Based on observations:
//! - Tuple is alive while any of its weak values is alive.
//! - Key is reclaimable once nobody can present its tuple again.

//? Important decisions:
//? - There is no tracing GC, so reclamation is done by sweeping weak handles. Sweeps run
//?   on their own every so often, and can be forced. Until the sweep, a key whose weak values
//?   are gone is still counted, but can't be looked up since nobody can present its tuple.
//?
//? - Key stays until the last of its weak values is gone, not the first one.
//?   It's simpler, and correct, at the cost of holding bookkeeping somewhat longer.
//?
//? - Single threaded. Everything is built on Rc.

mod core;
pub mod composer;
pub mod hasher;

#[cfg(feature = "collections")]
pub mod collection;

pub use crate::core::*;
pub use composer::{Arity, Composer, ComposerOptions};
pub use hasher::Hasher;
