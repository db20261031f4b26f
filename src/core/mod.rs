//! Core queue machinery: time, timers, receipts, redrive and access control.

pub mod access;
pub mod clock;
pub mod dlq;
pub mod receipt;
pub mod scheduler;
pub mod shutdown;
pub mod visibility;
