pub mod prelude;
pub mod sync_state;

pub use sync_state::{dispatch, dispatch2, SyncError, SyncState};
