//! Scrape core: pure pagination state machine and acquisition status.
mod effect;
mod msg;
mod policy;
mod state;
mod status;
mod update;

pub use effect::Effect;
pub use msg::Msg;
pub use policy::PaginationPolicy;
pub use state::{PageCursor, PaginationState, Phase};
pub use status::{AcquisitionStatus, CompletionReason, PartialReason};
pub use update::{start, update};
