//! Segment-wise version string comparison

use std::cmp::Ordering;

/// Punctuation that separates segments instead of belonging to them.
const NOT_ALPHA: &[u8] = b".:-";

fn is_rpmalpha(c: u8) -> bool {
    (c.is_ascii_alphabetic() || c.is_ascii_punctuation()) && !NOT_ALPHA.contains(&c)
}

fn is_segment_char(c: u8) -> bool {
    c.is_ascii_digit() || is_rpmalpha(c)
}

#[inline]
fn at(s: &[u8], i: usize) -> u8 {
    s.get(i).copied().unwrap_or(0)
}

/// C-style bounded compare: bytes past the end read as NUL.
fn strncmp(a: &[u8], b: &[u8], n: usize) -> i32 {
    for k in 0..n {
        let (ca, cb) = (at(a, k), at(b, k));
        if ca != cb {
            return ca as i32 - cb as i32;
        }
        if ca == 0 {
            break;
        }
    }
    0
}

/// Compare two version (or release) strings.
///
/// Strings are split into runs of digits and runs of "alpha" characters
/// (letters and punctuation other than `.`, `:` and `-`); everything else
/// separates segments. Digit runs compare numerically, alpha runs compare
/// bytewise, and a run of zeros is empty. When one side has a digit run and the other an alpha run, the
/// raw characters decide. A trailing `*` segment matches whatever remains of
/// the other string. If all segments tie, the string with more left over wins.
pub fn rpmvercmp(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }

    let a = a.as_bytes();
    let b = b.as_bytes();
    let (mut i, mut j) = (0usize, 0usize);
    let mut rc: i32 = 0;

    while i < a.len() && j < b.len() && rc == 0 {
        while i < a.len() && !is_segment_char(a[i]) {
            i += 1;
        }
        while j < b.len() && !is_segment_char(b[j]) {
            j += 1;
        }

        // Suffix wildcard
        if &a[i..] == b"*" || &b[j..] == b"*" {
            i = a.len();
            j = b.len();
            break;
        }

        if at(a, i).is_ascii_digit() || at(b, j).is_ascii_digit() {
            while at(a, i) == b'0' {
                i += 1;
            }
            while at(b, j) == b'0' {
                j += 1;
            }

            let ae = i + a[i..].iter().take_while(|c| c.is_ascii_digit()).count();
            let be = j + b[j..].iter().take_while(|c| c.is_ascii_digit()).count();

            if ae == i && be == j {
                rc = 0;
            } else if ae == i || be == j {
                rc = at(a, i) as i32 - at(b, j) as i32;
            } else {
                rc = (ae - i) as i32 - (be - j) as i32;
                if rc == 0 {
                    rc = strncmp(&a[i..], &b[j..], ae - i);
                }
            }
            i = ae;
            j = be;
        } else {
            let ae = i + a[i..].iter().take_while(|c| is_rpmalpha(**c)).count();
            let be = j + b[j..].iter().take_while(|c| is_rpmalpha(**c)).count();

            rc = strncmp(&a[i..], &b[j..], (ae - i).max(be - j));
            i = ae;
            j = be;
        }
    }

    if rc == 0 {
        rc = at(a, i) as i32 - at(b, j) as i32;
    }

    rc.cmp(&0)
}
