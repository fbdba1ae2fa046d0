//! Version range overlap

use std::cmp::Ordering;

use crate::evr::Evr;
use crate::sense::Sense;
use crate::vercmp::rpmvercmp;

/// Check whether two same-named ranges overlap.
///
/// `a` is usually the requirement and `b` the candidate provide. Unversioned
/// ranges and empty EVRs always overlap. When only `a` carries a non-zero
/// epoch, `nopromote` decides whether `b` is treated as older (`true`) or as
/// having the same epoch (`false`).
pub fn ranges_overlap(a_evr: &str, a_flags: Sense, b_evr: &str, b_flags: Sense, nopromote: bool) -> bool {
    if !a_flags.is_versioned() || !b_flags.is_versioned() {
        return true;
    }
    if a_evr.is_empty() || b_evr.is_empty() {
        return true;
    }

    let a = Evr::parse(a_evr);
    let b = Evr::parse(b_evr);

    let mut sense = if a.has_epoch() && b.has_epoch() {
        rpmvercmp(a.epoch.as_deref().unwrap_or("0"), b.epoch.as_deref().unwrap_or("0"))
    } else if a.has_epoch() && a.epoch_num() > 0 {
        if nopromote {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    } else if b.has_epoch() && b.epoch_num() > 0 {
        Ordering::Less
    } else {
        Ordering::Equal
    };

    if sense == Ordering::Equal {
        sense = rpmvercmp(&a.version, &b.version);
        if sense == Ordering::Equal && a.has_release() && b.has_release() {
            sense = rpmvercmp(a.release.as_deref().unwrap_or(""), b.release.as_deref().unwrap_or(""));
        }
    }

    match sense {
        Ordering::Less => a_flags.contains(Sense::GREATER) || b_flags.contains(Sense::LESS),
        Ordering::Greater => a_flags.contains(Sense::LESS) || b_flags.contains(Sense::GREATER),
        Ordering::Equal => {
            (a_flags.contains(Sense::EQUAL) && b_flags.contains(Sense::EQUAL))
                || (a_flags.contains(Sense::LESS) && b_flags.contains(Sense::LESS))
                || (a_flags.contains(Sense::GREATER) && b_flags.contains(Sense::GREATER))
        }
    }
}
