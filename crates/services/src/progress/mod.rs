//! The progress store and the machinery around it.

mod driver;
mod flush;
mod settings;
mod state;
mod store;

pub use driver::{SharedStore, run_driver};
pub use flush::{FlushScheduler, FlushState, MutationOutcome};
pub use settings::{
    DEFAULT_AUTO_ADVANCE_DELAY, DEFAULT_FLUSH_DELAY, DEFAULT_STORAGE_KEY, StoreSettings,
};
pub use state::{AutoAction, DiagnosticPhase, ExternalOutcome, TickReport};
pub use store::ProgressStore;
