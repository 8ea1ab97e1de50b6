//! Infrastructure shared by pools: waiter and request queues.

pub mod queue;

pub use queue::{InFlight, RequestQueue, WaiterQueue};
