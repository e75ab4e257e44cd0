//! The provisioning chain: discovery, slave and master state machines, and
//! master-session management.
//!
//! Concurrency model: one tokio task per role. The slave task loops
//! scan → request → open → whitelist → publish until it publishes or is
//! stopped; the master task serves requesters strictly one at a time for a
//! bounded duration. All radio waits are bounded; nothing busy-polls. The
//! only shared-mutable structures are the bounded scan queue (radio callback
//! producer, slave consumer) and the lifecycle flags on the handles.

pub mod master;
pub mod scan;
pub mod session;
pub mod slave;
