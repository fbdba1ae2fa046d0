//! Execution ordering
//!
//! Builds precedence relations between transaction elements from their
//! requirements, then sorts them so providers are installed before their
//! requirers and requirers are erased before their providers. Loops are
//! broken by removing one relation at a time.

mod relations;
mod tsort;
mod whiteout;

pub use relations::{EdgeIndex, RelationEdge, RelationMode};
pub use whiteout::Whiteout;
