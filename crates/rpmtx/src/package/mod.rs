//! Package model: dependency descriptors, name classification and headers

mod dependency;
mod header;
mod namespace;

pub use dependency::{DepTag, Dependency, DependencySet};
pub use header::{FileEntry, Header, Relocation};
pub use namespace::{AccessMode, Namespace};
