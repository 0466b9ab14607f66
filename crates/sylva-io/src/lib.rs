//! Persistence: the save pipeline that keeps the file on disk, the row
//! store, and the backup set jointly consistent, plus the backup manager
//! and the best-effort VCS collaborator it invokes.

pub mod backup;
pub mod save;
pub mod vcs;

pub use backup::{BackupManager, BackupVersion};
pub use save::{save_tree, SaveOutcome, SaveRequest};
pub use vcs::{GitCli, Vcs};
