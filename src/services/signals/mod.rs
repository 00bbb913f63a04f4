//! Signal voting and accuracy verification.
//!
//! candles -> [`IndicatorSnapshot`] -> [`VotePolicy`] -> [`Aggregator`] -> prediction log
//! -> [`Verifier`] -> [`AccuracyReporter`]

pub mod accuracy;
pub mod aggregator;
pub mod indicators;
pub mod policy;
pub mod snapshot;
pub mod store;
pub mod verifier;

pub use accuracy::AccuracyReporter;
pub use aggregator::{Aggregation, Aggregator, EntryGate};
pub use policy::{outlook, VotePolicy};
pub use snapshot::{IndicatorSnapshot, SnapshotBuilder};
pub use store::SignalService;
pub use verifier::{VerificationSummary, Verifier};
