//! Acquire waiters and the callback request queue.

pub mod request;
pub mod waiters;

pub use request::{InFlight, InFlightGuard, RequestQueue};
pub use waiters::{Reply, Waiter, WaiterQueue};
