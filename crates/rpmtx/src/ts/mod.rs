//! Transaction set and its elements
//!
//! A [`TransactionSet`] owns every pending install and erase, the provider
//! indexes for both, and the problems found by the last check. Elements are
//! addressed by [`ElementRef`] keys that stay stable across reordering.

mod element;
mod flags;
mod index;
mod linker;
mod problems;
mod transaction_set;


pub use element::{AddStatus, ChainLink, ChainRelation, ElementKind, ElementRef, OrderInfo, TransactionElement};
pub use flags::CheckFlags;
pub use index::ProviderIndex;
pub use problems::{Problem, ProblemKind, ProblemSet};
pub use transaction_set::TransactionSet;
