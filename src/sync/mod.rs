mod reconciler;
pub mod status;

pub use reconciler::{Mutation, ReconcileError, Reconciler};
pub use status::{SyncState, SyncStatus, SyncStatusTracker};
