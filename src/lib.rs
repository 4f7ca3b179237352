//! tfstate-tool - Terraform state file editor
//!
//! Lists, exports, modifies, moves and deletes resources in a Terraform state
//! file, taking a backup before every destructive write.

pub mod backup;
pub mod cli;
pub mod confirm;
pub mod error;
pub mod mutator;
pub mod output;
pub mod state_file;
pub mod terraform;

pub use backup::{BackupHandle, BackupManager};
pub use confirm::{AlwaysConfirm, ConfirmationPolicy, NeverConfirm, TerminalPrompt};
pub use error::TfstateError;
pub use mutator::{Mutation, Outcome};
pub use state_file::StateFile;
pub use terraform::{Address, AttributePath, ResourceFilter, ResourceIndex, StateDocument};
