//! Recording collaborators for tests.
//!
//! Available behind the `test-utils` feature flag.

mod echo_handler;
mod failing_conversion;
mod recording_resource;

pub use echo_handler::EchoHandler;
pub use failing_conversion::FailingConversion;
pub use recording_resource::{DisposalLog, RecordingResource};
