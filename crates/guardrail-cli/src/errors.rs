// SPDX-License-Identifier: Apache-2.0

//! CLI-specific error formatting with user-friendly hints.
//!
//! Downcasts `anyhow::Error` to `GuardrailError` and adds hints for the
//! failures a hook user can fix.

use anyhow::Error;
use guardrail_core::GuardrailError;

/// Formats an error for CLI display with helpful hints.
///
/// If the error is not a `GuardrailError`, returns the error chain.
pub fn format_error(error: &Error) -> String {
    let Some(guardrail_err) = error.downcast_ref::<GuardrailError>() else {
        return format!("{error:#}");
    };
    match guardrail_err {
        GuardrailError::Git { .. } => format!(
            "{guardrail_err}\n\nTip: Run guardrail inside a git repository, or pass the files to check explicitly."
        ),
        GuardrailError::Timeout { .. } => format!(
            "{guardrail_err}\n\nTip: Raise `revisions.timeout_seconds` (or GUARDRAIL_REVISIONS__TIMEOUT_SECONDS)."
        ),
        GuardrailError::Config { .. } => {
            let path = guardrail_core::config_file_path()
                .map_or_else(|| "~/.config/guardrail/config.toml".to_string(), |p| p.display().to_string());
            format!(
                "{guardrail_err}\n\nTip: Check .guardrail.toml in this directory and your config file at {path}"
            )
        }
        GuardrailError::Grammar { .. } => format!(
            "{guardrail_err}\n\nTip: This build's Python grammar is incompatible with its parser; reinstall guardrail."
        ),
        _ => guardrail_err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_error_has_hint() {
        let err = Error::new(GuardrailError::Git {
            command: "diff".to_string(),
            message: "not a git repository".to_string(),
        });
        let formatted = format_error(&err);
        assert!(formatted.contains("not a git repository"));
        assert!(formatted.contains("Tip:"));
    }

    #[test]
    fn test_context_is_kept_for_other_errors() {
        let err = anyhow::anyhow!("boom").context("Failed to render text");
        assert_eq!(format_error(&err), "Failed to render text: boom");
    }
}
