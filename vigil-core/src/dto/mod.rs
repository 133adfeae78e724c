//! Data Transfer Objects
//!
//! Wire representations exchanged with the outside world: job payloads
//! pushed onto the queue and result uploads sent to the backend.

pub mod job;
pub mod result;
