use crate::discovery::DiscoveryError;
use crate::mock::MockError;
use crate::report::ReportError;
use thiserror::Error;

/// Harness-internal errors: misuse of the engine's own API, never modeled
/// test failures (those are `TestFault`s and stay inside results).
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Mock(#[from] MockError),
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error(transparent)]
    Report(#[from] ReportError),
}

pub type Result<T> = std::result::Result<T, HarnessError>;
