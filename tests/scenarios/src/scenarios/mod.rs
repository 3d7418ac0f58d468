//! Live scenarios, grouped by what they exercise:
//!
//! - `lifecycle` - container create/start/stop/remove, resolve, logs
//! - `topology` - entry node plus peers on one run network
//! - `partition` - Pumba-driven network isolation

#[cfg(test)]
mod lifecycle;
#[cfg(test)]
mod partition;
#[cfg(test)]
mod topology;
