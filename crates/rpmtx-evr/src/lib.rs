//! Epoch:version-release handling for RPM-style dependencies
//!
//! This crate provides EVR parsing, segment-wise version comparison and the
//! range overlap test used when matching a requirement against a provide.

mod compare;
mod evr;
mod sense;
mod vercmp;

pub use compare::ranges_overlap;
pub use evr::{Evr, EvrError};
pub use sense::Sense;
pub use vercmp::rpmvercmp;
