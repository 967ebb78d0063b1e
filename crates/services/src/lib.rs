#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod export;
pub mod progress;
pub mod reconcile;

pub use study_core::Clock;

pub use app_services::AppServices;
pub use error::{AppServicesError, ImportError, ProgressError, SettingsError};
pub use export::{DeviceInfo, ExportMeta, ExportPayload};
pub use progress::{
    AutoAction, DiagnosticPhase, ExternalOutcome, ProgressStore, SharedStore, StoreSettings,
    TickReport, run_driver,
};
pub use reconcile::{ConfirmedImport, ImportPreview, ImportWarning};
