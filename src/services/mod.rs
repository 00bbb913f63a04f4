pub mod scheduler;
pub mod signals;
pub mod sqlite_store;

pub use scheduler::{PeriodicHandle, PeriodicTask, Shutdown};
pub use signals::{AccuracyReporter, SignalService, Verifier};
pub use sqlite_store::{PredictionFilter, SqliteStore};
