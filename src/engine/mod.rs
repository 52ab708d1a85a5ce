//! Session engine: entry buffering, staking ledger, and the controller
//! that sequences them.

pub mod buffer;
pub mod ledger;
pub mod session;
