//! The stages every tool run goes through between intake and delivery

pub mod output;
pub mod progress;
pub mod state;
pub mod validate;

pub use output::{base_name, deliver, output_file_name, OutputFile, OutputKind};
pub use progress::{
    NoopObserver, ProgressObserver, ProgressTracker, SharedObserver, TracingObserver,
};
pub use state::{Operation, OperationState};
pub use validate::{validate, validate_all, Rejected, ValidatedPdf};
