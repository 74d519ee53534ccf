// ABOUTME: Error taxonomy shared by every workflow
// ABOUTME: Distinguishes remote API failures from bad local input and bad configuration

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolkitError {
    /// The API answered with a non-2xx status. The body is kept verbatim.
    Remote { status: u16, body: String },
    InvalidInput(String),
    Configuration(String),
}

impl fmt::Display for ToolkitError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ToolkitError::Remote { status, body } => {
                write!(f, "Remote error: status {}: {}", status, body)
            }
            ToolkitError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            ToolkitError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for ToolkitError {}

/// Text to show for a failed item: the raw response body for remote errors,
/// the full error chain otherwise.
pub fn raw_error_text(err: &anyhow::Error) -> String {
    match err.downcast_ref::<ToolkitError>() {
        Some(ToolkitError::Remote { body, .. }) => body.clone(),
        _ => format!("{:#}", err),
    }
}
