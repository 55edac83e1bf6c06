//! Change detection and the periodic jobs built on it.
//!
//! - `detect_changes`: Pure diff of two event lists
//! - `ChangeCheckJob`: Fetch, diff and notify for every subscribed group
//! - `DigestJob`: Daily and weekly schedule digests
//! - `Scheduler`: Runs the jobs on tokio tasks

mod check;
mod delivery;
mod diff;
mod digest;
mod scheduler;

pub use check::{ChangeCheckJob, CheckReport};
pub use delivery::Delivery;
pub use diff::{DiffResult, detect_changes};
pub use digest::{DigestJob, DigestKind, DigestReport};
pub use scheduler::{Scheduler, next_run_after};
