//! Operating system probes: users, groups, file access, mounts, disk
//! space, environment variables and running processes

use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::{access, AccessFlags, Gid, Group, Pid, Uid, User};
use rpmtx_evr::Sense;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use crate::package::AccessMode;

/// A mounted filesystem as seen by the disk space probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSystem {
    pub mount_point: String,
    pub block_size: u64,
    pub avail_blocks: u64,
}

impl FileSystem {
    pub fn new(mount_point: &str, block_size: u64, avail_blocks: u64) -> Self {
        Self {
            mount_point: mount_point.to_string(),
            block_size,
            avail_blocks,
        }
    }
}

/// Mount table octal escapes (`\040` for space).
fn unescape_mount(field: &str) -> String {
    let b = field.as_bytes();
    let mut out = Vec::with_capacity(b.len());
    let mut i = 0;
    while i < b.len() {
        if b[i] == b'\\' && i + 3 < b.len() && b[i + 1..i + 4].iter().all(|c| (b'0'..=b'7').contains(c)) {
            let code = b[i + 1..i + 4].iter().fold(0u32, |acc, c| acc * 8 + u32::from(c - b'0'));
            out.push(code as u8);
            i += 4;
        } else {
            out.push(b[i]);
            i += 1;
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Mount points listed in a `/proc/self/mounts` style table.
pub fn parse_mounts(text: &str) -> Vec<String> {
    let mut points: Vec<String> = Vec::new();
    for line in text.lines() {
        if let Some(field) = line.split_whitespace().nth(1) {
            let point = unescape_mount(field);
            if !points.contains(&point) {
                points.push(point);
            }
        }
    }
    points
}

/// Filesystems with their free space. Mount points that cannot be queried
/// are left out.
pub fn read_filesystems(mounts: &Path) -> Vec<FileSystem> {
    let text = match std::fs::read_to_string(mounts) {
        Ok(text) => text,
        Err(e) => {
            log::debug!("cannot read {}: {}", mounts.display(), e);
            return Vec::new();
        }
    };

    parse_mounts(&text)
        .into_iter()
        .filter_map(|point| match nix::sys::statvfs::statvfs(point.as_str()) {
            Ok(st) => Some(FileSystem {
                block_size: st.block_size() as u64,
                avail_blocks: st.blocks_available() as u64,
                mount_point: point,
            }),
            Err(e) => {
                log::debug!("statvfs {} failed: {}", point, e);
                None
            }
        })
        .collect()
}

pub fn user_exists(name: &str) -> bool {
    let found = if !name.is_empty() && name.bytes().all(|c| c.is_ascii_digit()) {
        name.parse().ok().map(|uid| User::from_uid(Uid::from_raw(uid)))
    } else {
        Some(User::from_name(name))
    };
    matches!(found, Some(Ok(Some(_))))
}

pub fn group_exists(name: &str) -> bool {
    let found = if !name.is_empty() && name.bytes().all(|c| c.is_ascii_digit()) {
        name.parse().ok().map(|gid| Group::from_gid(Gid::from_raw(gid)))
    } else {
        Some(Group::from_name(name))
    };
    matches!(found, Some(Ok(Some(_))))
}

fn access_flags(mode: AccessMode) -> AccessFlags {
    if mode.is_exists() {
        return AccessFlags::F_OK;
    }
    let mut flags = AccessFlags::empty();
    if mode.read {
        flags |= AccessFlags::R_OK;
    }
    if mode.write {
        flags |= AccessFlags::W_OK;
    }
    if mode.exec {
        flags |= AccessFlags::X_OK;
    }
    flags
}

/// Check `path` against `mode`. Relative names are searched on `PATH`; an
/// empty name always passes.
pub fn access_ok(path: &str, mode: AccessMode) -> bool {
    if path.is_empty() {
        return true;
    }
    let flags = access_flags(mode);
    if path.starts_with('/') {
        return access(path, flags).is_ok();
    }

    let search = std::env::var("PATH").unwrap_or_default();
    search
        .split(':')
        .filter(|dir| !dir.is_empty())
        .map(|dir| PathBuf::from(shellexpand::tilde(dir).as_ref()).join(path))
        .any(|candidate| access(&candidate, flags).is_ok())
}

pub fn is_mounted(filesystems: &[FileSystem], mount_point: &str) -> bool {
    filesystems.iter().any(|fs| fs.mount_point == mount_point)
}

/// Filesystem holding `path`: the longest mount point that is a whole
/// path-component prefix of it.
pub fn filesystem_for<'a>(filesystems: &'a [FileSystem], path: &str) -> Option<&'a FileSystem> {
    filesystems
        .iter()
        .filter(|fs| {
            let mp = fs.mount_point.as_str();
            match path.strip_prefix(mp) {
                Some(rest) => mp.len() <= 1 || rest.is_empty() || rest.starts_with('/'),
                None => false,
            }
        })
        .max_by_key(|fs| fs.mount_point.len())
}

/// Byte count from a size such as `500`, `2Gb` or `100kb`. Plain numbers
/// are megabytes.
pub fn parse_size(size: &str) -> Option<u64> {
    let size = size.trim();
    let digits = size.bytes().take_while(u8::is_ascii_digit).count();
    let value: u64 = size[..digits].parse().ok()?;
    let unit = &size[digits..];
    let multiplier = match unit.to_ascii_lowercase().as_str() {
        "" => 1024 * 1024,
        "gb" => 1024 * 1024 * 1024,
        "mb" => 1024 * 1024,
        "kb" => 1024,
        _ => 1,
    };
    value.checked_mul(multiplier)
}

/// Compare free space on the filesystem holding `path` with `size`: `LESS`
/// holds when less space than requested is free, `GREATER` when more is.
pub fn diskspace_ok(filesystems: &[FileSystem], path: &str, size: &str, flags: Sense) -> bool {
    let fs = match filesystem_for(filesystems, path) {
        Some(fs) => fs,
        None => return false,
    };
    let needed = match parse_size(size) {
        Some(n) => n,
        None => return false,
    };
    let bsize = fs.block_size.max(1);
    let needed_blocks = needed.div_ceil(bsize);

    match fs.avail_blocks.cmp(&needed_blocks) {
        Ordering::Less => flags.contains(Sense::LESS),
        Ordering::Greater => flags.contains(Sense::GREATER),
        Ordering::Equal => flags.contains(Sense::EQUAL),
    }
}

/// Environment variable test. Without an expected value this is an
/// existence test on a non-empty variable.
pub fn envvar_ok(value: Option<&str>, expected: &str, flags: Sense) -> bool {
    let value = value.filter(|v| !v.is_empty());
    if expected.is_empty() {
        return value.is_some();
    }

    let sense = match value {
        Some(v) => v.cmp(expected),
        None => Ordering::Less,
    };
    if flags.range() == Sense::NOTEQUAL {
        return sense != Ordering::Equal;
    }
    match sense {
        Ordering::Less => flags.contains(Sense::LESS),
        Ordering::Greater => flags.contains(Sense::GREATER),
        Ordering::Equal => flags.contains(Sense::EQUAL),
    }
}

/// Pid named by `arg`: a number, or the content of `<varrun>/<arg>.pid`.
pub fn resolve_pid(arg: &str, varrun: &Path) -> i32 {
    if let Ok(pid) = arg.parse::<i32>() {
        return pid;
    }
    let pidfile = varrun.join(format!("{}.pid", arg));
    match std::fs::read_to_string(&pidfile) {
        Ok(text) => {
            let text = text.trim_start();
            let digits = text.bytes().take_while(u8::is_ascii_digit).count();
            text[..digits].parse().unwrap_or(0)
        }
        Err(_) => 0,
    }
}

/// A process is running unless signalling it reports that it does not
/// exist.
pub fn is_running(arg: &str, varrun: &Path) -> bool {
    let pid = resolve_pid(arg, varrun);
    if pid <= 0 {
        return false;
    }
    !matches!(kill(Pid::from_raw(pid), None), Err(Errno::ESRCH))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn filesystems() -> Vec<FileSystem> {
        vec![
            FileSystem::new("/", 4096, 1000),
            FileSystem::new("/usr", 4096, 256),
            FileSystem::new("/usr/local", 1024, 10),
        ]
    }

    #[test]
    fn test_parse_mounts() {
        let text = "\
proc /proc proc rw 0 0
/dev/sda1 / ext4 rw 0 0
/dev/sdb1 /mnt/my\\040disk ext4 rw 0 0
tmpfs /proc proc rw 0 0
";
        assert_eq!(parse_mounts(text), vec!["/proc", "/", "/mnt/my disk"]);
    }

    #[test]
    fn test_filesystem_for() {
        let fs = filesystems();
        assert_eq!(filesystem_for(&fs, "/usr/lib").unwrap().mount_point, "/usr");
        assert_eq!(filesystem_for(&fs, "/usr").unwrap().mount_point, "/usr");
        assert_eq!(filesystem_for(&fs, "/usrlocal").unwrap().mount_point, "/");
        assert_eq!(filesystem_for(&fs, "/usr/local/bin").unwrap().mount_point, "/usr/local");
        assert!(filesystem_for(&[], "/usr").is_none());
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("1"), Some(1024 * 1024));
        assert_eq!(parse_size("2Gb"), Some(2 * 1024 * 1024 * 1024));
        assert_eq!(parse_size("3kb"), Some(3 * 1024));
        assert_eq!(parse_size("5MB"), Some(5 * 1024 * 1024));
        assert_eq!(parse_size("mb"), None);
    }

    #[test]
    fn test_diskspace() {
        let fs = filesystems();
        // /usr has 1 MiB free in 4 KiB blocks
        assert!(diskspace_ok(&fs, "/usr/share", "512kb", Sense::GREATER));
        assert!(!diskspace_ok(&fs, "/usr/share", "2", Sense::GREATER));
        assert!(diskspace_ok(&fs, "/usr/share", "2", Sense::LESS));
        assert!(diskspace_ok(&fs, "/usr/share", "1", Sense::EQUAL));
        assert!(diskspace_ok(&fs, "/usr/share", "1", Sense::GE));
        assert!(!diskspace_ok(&[], "/usr", "1", Sense::GE));
    }

    #[test]
    fn test_diskspace_with_huge_request() {
        let fs = vec![FileSystem::new("/", 4096, 1000)];
        assert!(diskspace_ok(&fs, "/usr", "18446744073709551615b", Sense::LESS));
        assert!(!diskspace_ok(&fs, "/usr", "18446744073709551615b", Sense::GREATER));
        assert!(!diskspace_ok(&fs, "/usr", "18446744073709551615gb", Sense::LESS));
    }

    #[test]
    fn test_envvar() {
        assert!(envvar_ok(Some("C"), "", Sense::ANY));
        assert!(!envvar_ok(Some(""), "", Sense::ANY));
        assert!(!envvar_ok(None, "", Sense::ANY));
        assert!(envvar_ok(Some("C"), "C", Sense::EQUAL));
        assert!(envvar_ok(Some("en_US"), "C", Sense::NOTEQUAL));
        assert!(!envvar_ok(Some("C"), "C", Sense::NOTEQUAL));
        assert!(envvar_ok(Some("b"), "a", Sense::GREATER));
        assert!(envvar_ok(None, "a", Sense::LESS));
    }

    #[test]
    fn test_users_and_groups() {
        assert!(user_exists("root"));
        assert!(user_exists("0"));
        assert!(!user_exists("no-such-user-rpmtx"));
        assert!(group_exists("0"));
        assert!(!group_exists("no-such-group-rpmtx"));
    }

    #[test]
    fn test_access() {
        assert!(access_ok("", AccessMode::EXISTS));
        assert!(access_ok("/", AccessMode::EXISTS));
        assert!(access_ok("sh", AccessMode { exec: true, ..AccessMode::EXISTS }));
        assert!(!access_ok("/nonexistent/rpmtx", AccessMode::EXISTS));
    }

    #[test]
    fn test_running() {
        let dir = TempDir::new().unwrap();
        let own = std::process::id().to_string();
        assert!(is_running(&own, dir.path()));

        std::fs::write(dir.path().join("self.pid"), format!("{}\n", own)).unwrap();
        assert!(is_running("self", dir.path()));

        std::fs::write(dir.path().join("stale.pid"), "garbage").unwrap();
        assert!(!is_running("stale", dir.path()));
        assert!(!is_running("missing", dir.path()));
        assert!(!is_running("0", dir.path()));
    }
}
