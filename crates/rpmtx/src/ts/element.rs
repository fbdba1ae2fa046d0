use std::fmt;
use std::sync::Arc;

use crate::db::DbOffset;
use crate::package::Header;

/// Stable key of a transaction element.
///
/// Added and removed elements are numbered independently in the order they
/// joined the transaction; a replaced duplicate keeps its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementRef {
    Added(usize),
    Removed(usize),
}

impl ElementRef {
    pub fn index(&self) -> usize {
        match self {
            ElementRef::Added(i) | ElementRef::Removed(i) => *i,
        }
    }

    pub fn is_added(&self) -> bool {
        matches!(self, ElementRef::Added(_))
    }

    pub fn kind(&self) -> ElementKind {
        match self {
            ElementRef::Added(_) => ElementKind::Added,
            ElementRef::Removed(_) => ElementKind::Removed,
        }
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementRef::Added(i) => write!(f, "added#{}", i),
            ElementRef::Removed(i) => write!(f, "removed#{}", i),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Added,
    Removed,
}

impl ElementKind {
    /// `+` for installs, `-` for erasures
    pub fn marker(&self) -> char {
        match self {
            ElementKind::Added => '+',
            ElementKind::Removed => '-',
        }
    }
}

/// Why an implicit erasure was created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainRelation {
    Upgrades,
    Obsoletes,
}

impl ChainRelation {
    pub fn description(&self) -> &'static str {
        match self {
            ChainRelation::Upgrades => "Upgrades",
            ChainRelation::Obsoletes => "Obsoletes",
        }
    }
}

impl fmt::Display for ChainRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Link between an install and an erasure it caused
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainLink {
    pub relation: ChainRelation,
    pub target: ElementRef,
    pub pkgid: String,
    pub nevra: String,
}

/// Sorter results kept on each element
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderInfo {
    /// Live predecessor count; relations removed to break loops are not counted
    pub npreds: usize,
    pub depth: usize,
    /// Tree id, `None` when never reached from a root
    pub tree: Option<usize>,
    pub breadth: usize,
    pub parent: Option<ElementRef>,
    /// Number of successors released by this element
    pub degree: usize,
}

/// One install or erase operation
#[derive(Debug, Clone)]
pub struct TransactionElement {
    pub key: ElementRef,
    pub header: Arc<Header>,
    /// Installed row, for erasures
    pub db_offset: Option<DbOffset>,
    /// Opaque caller key, usually the package file name
    pub user_key: Option<String>,
    /// Install that caused this erasure
    pub depends: Option<ElementRef>,
    /// On erasures: the installs that replace this package
    pub flink: Vec<ChainLink>,
    /// On installs: the erasures this package causes
    pub blink: Vec<ChainLink>,
    /// Earliest (tid, time) of the packages this install replaces
    pub origin_tid: Option<(u32, u32)>,
    pub order: OrderInfo,
}

impl TransactionElement {
    pub(crate) fn new(key: ElementRef, header: Arc<Header>) -> Self {
        Self {
            key,
            header,
            db_offset: None,
            user_key: None,
            depends: None,
            flink: Vec::new(),
            blink: Vec::new(),
            origin_tid: None,
            order: OrderInfo::default(),
        }
    }

    pub fn kind(&self) -> ElementKind {
        self.key.kind()
    }

    pub fn name(&self) -> &str {
        &self.header.name
    }

    pub fn nevra(&self) -> String {
        self.header.nevra()
    }

    pub fn color(&self) -> u32 {
        self.header.color
    }

    pub fn is_source(&self) -> bool {
        self.header.is_source()
    }

    /// Package id used in chain links: pkgid, then hdrid, then NEVRA.
    pub fn pkgid(&self) -> String {
        self.header
            .pkgid
            .clone()
            .or_else(|| self.header.hdrid.clone())
            .unwrap_or_else(|| self.header.nevra())
    }
}

impl fmt::Display for TransactionElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind().marker(), self.nevra())
    }
}

/// Result of adding an install element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddStatus {
    Added(ElementRef),
    /// An older duplicate was replaced in place
    Replaced(ElementRef),
    /// A newer or equal duplicate is already present
    Skipped,
}

impl AddStatus {
    pub fn key(&self) -> Option<ElementRef> {
        match self {
            AddStatus::Added(k) | AddStatus::Replaced(k) => Some(*k),
            AddStatus::Skipped => None,
        }
    }
}
