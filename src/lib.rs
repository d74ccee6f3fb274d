//! Offload: run a CPU-heavy computation on a background worker while the
//! host runtime stays responsive.

pub mod compute;
pub mod config;
pub mod error;
pub mod liveness;
pub mod staggered;
pub mod throttle;
pub mod worker;
