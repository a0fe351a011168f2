//! Distributed Firewall (DFW) management for vCloud Director.
//!
//! Provides the rule-section model, a conditional-write XML request executor,
//! and [`DistributedFirewall`], which drives the enable / check / update /
//! delete lifecycle of a VDC's firewall section under ETag concurrency control.

#![deny(missing_docs)]

pub mod client;
pub mod controller;
pub mod models;

pub use client::{VcdClient, VcdClientBuilder, XmlRequest, XmlResponse};
pub use controller::DistributedFirewall;
pub use models::{
    AppliedToEntry, AppliedToList, ConcurrencyToken, Destinations, Rule, RuleAction, RuleSection,
    Services, Sources,
};

/// Convenient result alias that reuses the shared vCD error type.
pub type Result<T> = vcd_core::Result<T>;
