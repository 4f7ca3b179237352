use dialoguer::Confirm;

use crate::error::TfstateError;

/// Decides whether a destructive step may go ahead.
pub trait ConfirmationPolicy {
    fn confirm(&self, prompt: &str) -> Result<bool, TfstateError>;
}

/// Used for `--force`.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysConfirm;

impl ConfirmationPolicy for AlwaysConfirm {
    fn confirm(&self, _prompt: &str) -> Result<bool, TfstateError> {
        Ok(true)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NeverConfirm;

impl ConfirmationPolicy for NeverConfirm {
    fn confirm(&self, _prompt: &str) -> Result<bool, TfstateError> {
        Ok(false)
    }
}

/// Asks on the terminal, defaulting to "no".
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompt;

impl ConfirmationPolicy for TerminalPrompt {
    fn confirm(&self, prompt: &str) -> Result<bool, TfstateError> {
        Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .map_err(|e| TfstateError::io("<terminal>", std::io::Error::other(e)))
    }
}

pub fn policy_for(force: bool) -> Box<dyn ConfirmationPolicy> {
    if force {
        Box::new(AlwaysConfirm)
    } else {
        Box::new(TerminalPrompt)
    }
}

/// Asks `policy` and turns a refusal into `Cancelled`.
pub fn require(policy: &dyn ConfirmationPolicy, prompt: &str) -> Result<(), TfstateError> {
    if policy.confirm(prompt)? {
        Ok(())
    } else {
        tracing::debug!(prompt, "confirmation declined");
        Err(TfstateError::Cancelled)
    }
}
