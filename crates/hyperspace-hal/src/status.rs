//! Driver status checking.
//!
//! The radio master library reports the outcome of most calls as a free-form
//! string and of `load_config` as an integer code.  An output starting with
//! `"error"` (or a non-zero code) is a failure.

use hyperspace_types::HyperError;
use tracing::debug;

/// Check a string status returned by `operation`.
///
/// # Errors
///
/// Returns [`HyperError::HardwareFault`] when `output` starts with `"error"`.
pub fn check(operation: &str, output: &str) -> Result<(), HyperError> {
    let trimmed = output.trim_start();
    if trimmed.get(..5).is_some_and(|p| p.eq_ignore_ascii_case("error")) {
        return Err(HyperError::hardware(operation, trimmed));
    }
    debug!(operation, output = trimmed, "shutter driver call ok");
    Ok(())
}

/// Check an integer status code returned by `operation`.
///
/// # Errors
///
/// Returns [`HyperError::HardwareFault`] for any non-zero `code`.
pub fn check_code(operation: &str, code: i32) -> Result<(), HyperError> {
    if code != 0 {
        return Err(HyperError::hardware(
            operation,
            format!("driver returned status code {code}"),
        ));
    }
    Ok(())
}
