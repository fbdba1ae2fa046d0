//! Transaction resolution for RPM-style package sets.
//!
//! Given packages to install and erase, a [`TransactionSet`] checks every
//! dependency against the staged packages, the installed database and a
//! collection of virtual capability probes, adds the erasures implied by
//! upgrades and obsoletes, and computes an execution order that respects
//! every precedence constraint, breaking dependency loops when it must.

pub mod config;
pub mod db;
pub mod depends;
pub mod error;
pub mod order;
pub mod package;
pub mod probe;
pub mod ts;

pub use config::{ConfigLoader, MacroContext, MacroTable, ResolverConfig};
pub use db::{DbMatch, DbOffset, HeaderStore, MatchIterator, MatchTag, MemoryStore};
pub use depends::{
    AvailableSolver, DepContext, DepStatus, DependencySolver, JsonResultCache, MemoryResultCache, Resolution,
    ResultCache, SolveOutcome,
};
pub use error::{ResolutionError, Result};
pub use order::{EdgeIndex, RelationEdge, RelationMode, Whiteout};
pub use package::{DepTag, Dependency, DependencySet, Header, Namespace, Relocation};
pub use probe::{Note, ProbeContext, ProbeOutcome};
pub use rpmtx_evr::{Evr, Sense};
pub use ts::{AddStatus, CheckFlags, ElementRef, Problem, ProblemKind, TransactionSet};
