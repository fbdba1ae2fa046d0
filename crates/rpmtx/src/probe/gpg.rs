//! GnuPG backed probes
//!
//! Signature mechanics stay in gpg; these probes only run it and read its
//! exit status and output.

use std::process::{Command, Output};

fn run_gpg(program: &str, args: &[&str]) -> Option<Output> {
    match Command::new(program).args(args).output() {
        Ok(output) => Some(output),
        Err(e) => {
            log::debug!("cannot run {}: {}", program, e);
            None
        }
    }
}

/// Fingerprint from gpg's `Primary key fingerprint:` line with the spaces
/// removed.
pub fn primary_fingerprint(output: &str) -> Option<String> {
    output
        .lines()
        .find_map(|line| line.strip_prefix("Primary key fingerprint:"))
        .map(|fpr| fpr.chars().filter(|c| !c.is_whitespace()).collect())
}

/// Key ids and fingerprints reported on `--status-fd` `GOODSIG` and
/// `VALIDSIG` lines.
pub fn status_key_ids(status: &str) -> Vec<String> {
    status
        .lines()
        .filter_map(|line| {
            let mut words = line.split_whitespace();
            if words.next() != Some("[GNUPG:]") {
                return None;
            }
            match words.next() {
                Some("GOODSIG") | Some("VALIDSIG") => words.next().map(str::to_string),
                _ => None,
            }
        })
        .collect()
}

/// `gnupg(file)`: without an expected fingerprint the file only has to
/// verify; otherwise the signing key's primary fingerprint must equal it.
pub fn gnupg_ok(program: &str, file: &str, expected: &str, equal: bool) -> bool {
    let output = match run_gpg(program, &["--batch", "--no-tty", "--quiet", "--verify", file]) {
        Some(output) => output,
        None => return false,
    };
    if expected.is_empty() {
        return output.status.success();
    }
    if !equal {
        return false;
    }

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    primary_fingerprint(&text).map_or(false, |fpr| fpr.eq_ignore_ascii_case(expected))
}

/// `signature(file:sig) = pubkey:id`: verify a detached (or, without `sig`,
/// clearsigned) signature, optionally against a specific keyring file and
/// key id suffix.
pub fn signature_ok(program: &str, target: &str, key: &str) -> bool {
    let (file, sig) = match target.split_once(':') {
        Some((file, sig)) => (file, Some(sig).filter(|s| !s.is_empty())),
        None => (target, None),
    };
    let (pubkey, id) = match key.split_once(':') {
        Some((pubkey, id)) => (pubkey, id),
        None => (key, ""),
    };

    let mut args = vec!["--batch", "--no-tty", "--status-fd", "1"];
    if !pubkey.is_empty() {
        args.extend(["--no-default-keyring", "--keyring", pubkey]);
    }
    args.push("--verify");
    if let Some(sig) = sig {
        args.push(sig);
    }
    args.push(file);

    let output = match run_gpg(program, &args) {
        Some(output) => output,
        None => return false,
    };
    if !output.status.success() {
        return false;
    }
    if id.is_empty() {
        return true;
    }

    let id = id.to_ascii_uppercase();
    status_key_ids(&String::from_utf8_lossy(&output.stdout))
        .iter()
        .any(|found| found.to_ascii_uppercase().ends_with(&id))
}
