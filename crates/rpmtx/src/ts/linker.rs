//! Adding elements and the implicit erasures they cause

use rpmtx_evr::Sense;
use std::sync::Arc;

use super::element::{AddStatus, ChainLink, ChainRelation, ElementRef, TransactionElement};
use super::flags::CheckFlags;
use super::transaction_set::TransactionSet;
use crate::db::{DbMatch, DbOffset, MatchTag};
use crate::error::{ResolutionError, Result};
use crate::package::{DepTag, Dependency, Header, Relocation};

const DEBUGINFO_SUFFIX: &str = "-debuginfo";

/// i?86 architectures are interchangeable when matching duplicates.
fn same_arch(a: &str, b: &str) -> bool {
    let (x, y) = (a.as_bytes(), b.as_bytes());
    let is_ix86 = |s: &[u8]| s.len() >= 4 && s[0] == b'i' && s[2] == b'8' && s[3] == b'6';
    if is_ix86(x) {
        is_ix86(y) && x[4..] == y[4..]
    } else {
        a == b
    }
}

impl TransactionSet {
    /// Add a package to install.
    ///
    /// With `upgrade` set, an already added package of the same name (and,
    /// for colored transactions, arch and os) is replaced when older or
    /// causes this one to be skipped when newer or equal. Installed packages
    /// it upgrades or obsoletes are scheduled for erasure and chained to it.
    pub fn add_install_element(
        &mut self,
        header: Header,
        user_key: Option<&str>,
        upgrade: bool,
        relocations: &[Relocation],
    ) -> Result<AddStatus> {
        let mut header = header;
        header.relocate(relocations);
        let header = Arc::new(header);
        let tscolor = self.config.transaction_color;

        let mut replace: Option<(usize, ElementRef)> = None;
        if upgrade && !header.is_source() {
            let evr = header.evr().to_string();
            let newer_or_same = Dependency::new(DepTag::Requires, header.name.as_str(), Sense::GE, evr.as_str());
            let older = Dependency::new(DepTag::Requires, header.name.as_str(), Sense::LESS, evr.as_str());

            for (pos, e) in self.elements.iter().enumerate() {
                if !e.key.is_added() || e.is_source() {
                    continue;
                }
                if tscolor != 0 {
                    match (&header.arch, &e.header.arch) {
                        (Some(a), Some(b)) if same_arch(a, b) => {}
                        _ => continue,
                    }
                    match (&header.os, &e.header.os) {
                        (Some(a), Some(b)) if a == b => {}
                        _ => continue,
                    }
                }

                let this = e.header.self_provide();
                if newer_or_same.overlaps(&this, self.config.nopromote) {
                    log::warn!("package {} was already added, skipping {}", e.nevra(), header.nevra());
                    return Ok(AddStatus::Skipped);
                }
                if older.overlaps(&this, self.config.nopromote) {
                    log::warn!("package {} was already added, replacing with {}", e.nevra(), header.nevra());
                    replace = Some((pos, e.key));
                    break;
                }
            }
        }

        let (key, status) = match replace {
            Some((_, key)) => (key, AddStatus::Replaced(key)),
            None => {
                let key = ElementRef::Added(self.next_added);
                self.next_added += 1;
                (key, AddStatus::Added(key))
            }
        };

        let mut element = TransactionElement::new(key, Arc::clone(&header));
        element.user_key = user_key.map(str::to_string);
        match replace {
            Some((pos, _)) => {
                let old = std::mem::replace(&mut self.elements[pos], element);
                self.elements[pos].blink = old.blink;
                self.elements[pos].origin_tid = old.origin_tid;
            }
            None => self.elements.push(element),
        }
        self.added.add(key, &header, tscolor);

        if !upgrade || header.is_source() {
            return Ok(status);
        }

        if !self.flags.contains(CheckFlags::NOUPGRADE) {
            let nrefs = self.erase_debuginfo(&header, Some(key))?;
            if !header.name.ends_with(DEBUGINFO_SUFFIX) || nrefs == 0 {
                self.add_upgrades(key, &header)?;
            }
        }

        if !self.flags.contains(CheckFlags::NOOBSOLETES) {
            self.add_obsoletes(key, &header)?;
        }

        Ok(status)
    }

    /// Schedule an installed package for erasure. Erasing the same row twice
    /// returns the existing element.
    pub fn add_erase_element(&mut self, header: impl Into<Arc<Header>>, offset: DbOffset) -> Result<ElementRef> {
        let header = header.into();
        let (key, created) = self.remove_package(Arc::clone(&header), offset, None)?;
        if created {
            self.erase_debuginfo(&header, None)?;
        }
        Ok(key)
    }

    fn remove_package(
        &mut self,
        header: Arc<Header>,
        offset: DbOffset,
        depends: Option<ElementRef>,
    ) -> Result<(ElementRef, bool)> {
        let pos = match self.removed_offsets.binary_search(&offset) {
            Ok(_) => {
                let existing = self
                    .elements
                    .iter()
                    .find(|e| e.db_offset == Some(offset))
                    .map(|e| e.key)
                    .ok_or_else(|| ResolutionError::Database(format!("erased row {} has no element", offset)))?;
                return Ok((existing, false));
            }
            Err(pos) => pos,
        };
        self.removed_offsets.insert(pos, offset);

        let key = ElementRef::Removed(self.next_removed);
        self.next_removed += 1;

        let mut element = TransactionElement::new(key, Arc::clone(&header));
        element.db_offset = Some(offset);
        element.depends = depends;
        self.elements.push(element);
        self.erased.add(key, &header, self.config.transaction_color);

        Ok((key, true))
    }

    fn chain(&mut self, install: ElementRef, erase: ElementRef, relation: ChainRelation) {
        let (install_id, install_nevra) = match self.element(install) {
            Some(e) => (e.pkgid(), e.nevra()),
            None => return,
        };
        let (erase_id, erase_nevra) = match self.element(erase) {
            Some(e) => (e.pkgid(), e.nevra()),
            None => return,
        };

        if let Some(p) = self.element_mut(install) {
            if !p.blink.iter().any(|l| l.target == erase) {
                p.blink.push(ChainLink {
                    relation,
                    target: erase,
                    pkgid: erase_id,
                    nevra: erase_nevra,
                });
            }
        }
        if let Some(q) = self.element_mut(erase) {
            if !q.flink.iter().any(|l| l.target == install) {
                q.flink.push(ChainLink {
                    relation,
                    target: install,
                    pkgid: install_id,
                    nevra: install_nevra,
                });
            }
        }
    }

    fn color_compatible(&self, hcolor: u32, ohcolor: u32) -> bool {
        let tscolor = self.config.transaction_color;
        !(tscolor != 0 && hcolor != 0 && ohcolor != 0 && hcolor & ohcolor == 0)
    }

    fn add_upgrades(&mut self, key: ElementRef, header: &Header) -> Result<()> {
        let tag = self.config.upgrade_match_tag();
        let matches: Vec<DbMatch> = self.init_iterator(tag, &header.name)?.collect();

        for m in matches {
            let old = &m.header;
            if !self.color_compatible(header.color, old.color) {
                continue;
            }

            if let Some(tid) = old.install_tid {
                let candidate = (tid, old.install_time.unwrap_or(0));
                if let Some(p) = self.element_mut(key) {
                    if p.origin_tid.map_or(true, |cur| candidate < cur) {
                        p.origin_tid = Some(candidate);
                    }
                }
            }

            if header.identical(old) {
                continue;
            }

            let (q, _) = self.remove_package(Arc::clone(old), m.offset, Some(key))?;
            self.chain(key, q, ChainRelation::Upgrades);
            log::debug!("   upgrade erases {}", old.nevra());
        }
        Ok(())
    }

    fn add_obsoletes(&mut self, key: ElementRef, header: &Header) -> Result<()> {
        let tscolor = self.config.transaction_color;
        let nopromote = self.config.nopromote;

        for obsolete in &header.obsoletes {
            if tscolor != 0 && header.color != 0 && tscolor & header.color == 0 {
                continue;
            }
            if obsolete.name == header.name {
                continue;
            }

            let tag = if obsolete.name.starts_with('/') {
                MatchTag::Basenames
            } else {
                self.config.obsolete_match_tag()
            };
            let matches: Vec<DbMatch> = self
                .init_iterator(tag, &obsolete.name)?
                .prune(&self.removed_offsets)
                .collect();

            for m in matches {
                if !self.color_compatible(header.color, m.header.color) {
                    continue;
                }
                if !m.header.any_provide_matches(obsolete, nopromote) {
                    continue;
                }

                let (q, _) = self.remove_package(Arc::clone(&m.header), m.offset, Some(key))?;
                self.chain(key, q, ChainRelation::Obsoletes);
                log::debug!("  Obsoletes: {}\t\terases {}", obsolete.nevr(), m.header.nevra());
            }
        }
        Ok(())
    }

    /// Erase the `-debuginfo` member of a build set once no other member
    /// remains installed. Returns the number of remaining members.
    fn erase_debuginfo(&mut self, header: &Header, chain_to: Option<ElementRef>) -> Result<usize> {
        if !self.config.debuginfo_by_sourcerpm() {
            return Ok(0);
        }
        let sourcerpm = match &header.sourcerpm {
            Some(s) => s.clone(),
            None => return Ok(0),
        };

        let mut nrefs = 0;
        let mut debuginfo: Option<DbMatch> = None;
        let matches = self
            .init_iterator(MatchTag::SourceRpm, &sourcerpm)?
            .prune(&self.removed_offsets);
        for m in matches {
            if header.identical(&m.header) {
                continue;
            }
            if m.header.name.ends_with(DEBUGINFO_SUFFIX) {
                debuginfo = Some(m);
            } else {
                nrefs += 1;
            }
        }

        if nrefs == 0 {
            if let Some(m) = debuginfo {
                let (q, _) = self.remove_package(Arc::clone(&m.header), m.offset, chain_to)?;
                if let Some(key) = chain_to {
                    self.chain(key, q, ChainRelation::Upgrades);
                }
                log::debug!("   lastref erases {}", m.header.nevra());
            }
        }
        Ok(nrefs)
    }
}
