mod store;

pub use store::{ProgressStore, RunClaim, RunTicket};
