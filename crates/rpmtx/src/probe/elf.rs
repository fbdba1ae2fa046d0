//! Minimal ELF dynamic section reader for the soname probe

use std::path::Path;

use crate::error::{ResolutionError, Result};

const ELF_MAGIC: &[u8; 4] = b"\x7fELF";
const ELFCLASS32: u8 = 1;
const ELFCLASS64: u8 = 2;
const ELFDATA2LSB: u8 = 1;
const ELFDATA2MSB: u8 = 2;
const ET_DYN: u16 = 3;

const PT_LOAD: u32 = 1;
const PT_DYNAMIC: u32 = 2;

const DT_NULL: u64 = 0;
const DT_STRTAB: u64 = 5;
const DT_SONAME: u64 = 14;
const DT_VERDEF: u64 = 0x6fff_fffc;
const DT_VERDEFNUM: u64 = 0x6fff_fffd;

const VER_FLG_BASE: u16 = 0x1;

/// What a shared object exports by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElfInfo {
    pub is_64: bool,
    pub is_dso: bool,
    pub soname: Option<String>,
    /// Version definitions, excluding the base definition
    pub versions: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
struct Segment {
    offset: u64,
    vaddr: u64,
    filesz: u64,
}

struct Reader<'a> {
    data: &'a [u8],
    big_endian: bool,
}

impl<'a> Reader<'a> {
    fn bytes<const N: usize>(&self, off: u64) -> std::result::Result<[u8; N], String> {
        let start = usize::try_from(off).map_err(|_| format!("offset {} out of range", off))?;
        let end = start.checked_add(N).ok_or_else(|| format!("offset {} out of range", off))?;
        let mut buf = [0u8; N];
        buf.copy_from_slice(
            self.data
                .get(start..end)
                .ok_or_else(|| format!("truncated at offset {}", off))?,
        );
        Ok(buf)
    }

    fn u16(&self, off: u64) -> std::result::Result<u16, String> {
        let b = self.bytes::<2>(off)?;
        Ok(if self.big_endian { u16::from_be_bytes(b) } else { u16::from_le_bytes(b) })
    }

    fn u32(&self, off: u64) -> std::result::Result<u32, String> {
        let b = self.bytes::<4>(off)?;
        Ok(if self.big_endian { u32::from_be_bytes(b) } else { u32::from_le_bytes(b) })
    }

    fn u64(&self, off: u64) -> std::result::Result<u64, String> {
        let b = self.bytes::<8>(off)?;
        Ok(if self.big_endian { u64::from_be_bytes(b) } else { u64::from_le_bytes(b) })
    }

    fn cstr(&self, off: u64) -> std::result::Result<String, String> {
        let start = usize::try_from(off).map_err(|_| format!("offset {} out of range", off))?;
        let rest = self
            .data
            .get(start..)
            .ok_or_else(|| format!("string offset {} past end", off))?;
        let len = rest
            .iter()
            .position(|&c| c == 0)
            .ok_or_else(|| format!("unterminated string at {}", off))?;
        Ok(String::from_utf8_lossy(&rest[..len]).into_owned())
    }
}

fn add(base: u64, delta: u64) -> std::result::Result<u64, String> {
    base.checked_add(delta)
        .ok_or_else(|| format!("offset {:#x} + {:#x} overflows", base, delta))
}

fn to_offset(loads: &[Segment], addr: u64) -> std::result::Result<u64, String> {
    let segment = loads
        .iter()
        .find(|s| addr >= s.vaddr && addr - s.vaddr < s.filesz)
        .ok_or_else(|| format!("address {:#x} is not in a loaded segment", addr))?;
    add(addr - segment.vaddr, segment.offset)
}

impl ElfInfo {
    pub fn parse(data: &[u8]) -> std::result::Result<Self, String> {
        if data.len() < 16 || &data[..4] != ELF_MAGIC {
            return Err("not an ELF object".to_string());
        }
        let is_64 = match data[4] {
            ELFCLASS32 => false,
            ELFCLASS64 => true,
            c => return Err(format!("unknown ELF class {}", c)),
        };
        let big_endian = match data[5] {
            ELFDATA2LSB => false,
            ELFDATA2MSB => true,
            d => return Err(format!("unknown ELF data encoding {}", d)),
        };
        let r = Reader { data, big_endian };

        let e_type = r.u16(16)?;
        let (phoff, phentsize, phnum) = if is_64 {
            (r.u64(0x20)?, r.u16(0x36)?, r.u16(0x38)?)
        } else {
            (u64::from(r.u32(0x1c)?), r.u16(0x2a)?, r.u16(0x2c)?)
        };

        let mut loads = Vec::new();
        let mut dynamic = None;
        for i in 0..u64::from(phnum) {
            let base = add(phoff, i * u64::from(phentsize))?;
            let p_type = r.u32(base)?;
            let segment = if is_64 {
                Segment {
                    offset: r.u64(add(base, 8)?)?,
                    vaddr: r.u64(add(base, 16)?)?,
                    filesz: r.u64(add(base, 32)?)?,
                }
            } else {
                Segment {
                    offset: u64::from(r.u32(add(base, 4)?)?),
                    vaddr: u64::from(r.u32(add(base, 8)?)?),
                    filesz: u64::from(r.u32(add(base, 16)?)?),
                }
            };
            match p_type {
                PT_LOAD => loads.push(segment),
                PT_DYNAMIC => dynamic = Some(segment),
                _ => {}
            }
        }

        let mut info = ElfInfo {
            is_64,
            is_dso: e_type == ET_DYN,
            ..ElfInfo::default()
        };
        let dynamic = match dynamic {
            Some(d) => d,
            None => return Ok(info),
        };

        let entsize = if is_64 { 16 } else { 8 };
        let mut strtab = None;
        let mut soname = None;
        let mut verdef = None;
        let mut verdefnum = 0;
        let end = add(dynamic.offset, dynamic.filesz)?;
        let mut off = dynamic.offset;
        while add(off, entsize)? <= end {
            let (tag, val) = if is_64 {
                (r.u64(off)?, r.u64(add(off, 8)?)?)
            } else {
                (u64::from(r.u32(off)?), u64::from(r.u32(add(off, 4)?)?))
            };
            match tag {
                DT_NULL => break,
                DT_STRTAB => strtab = Some(val),
                DT_SONAME => soname = Some(val),
                DT_VERDEF => verdef = Some(val),
                DT_VERDEFNUM => verdefnum = val,
                _ => {}
            }
            off += entsize;
        }

        let strtab = match strtab {
            Some(addr) => to_offset(&loads, addr)?,
            None => return Ok(info),
        };
        if let Some(idx) = soname {
            info.soname = Some(r.cstr(add(strtab, idx)?)?);
        }

        if let Some(addr) = verdef {
            let mut off = to_offset(&loads, addr)?;
            for _ in 0..verdefnum {
                let flags = r.u16(add(off, 2)?)?;
                let aux = u64::from(r.u32(add(off, 12)?)?);
                let next = u64::from(r.u32(add(off, 16)?)?);
                if flags & VER_FLG_BASE == 0 {
                    let name = u64::from(r.u32(add(off, aux)?)?);
                    info.versions.push(r.cstr(add(strtab, name)?)?);
                }
                if next == 0 {
                    break;
                }
                off = add(off, next)?;
            }
        }

        Ok(info)
    }

    /// Provides a shared object exports: the soname itself plus one
    /// `soname(VERSION)` per version definition, marked for 64-bit objects.
    pub fn provides(&self) -> Vec<String> {
        let soname = match (&self.soname, self.is_dso) {
            (Some(s), true) => s,
            _ => return Vec::new(),
        };
        let mut provides = Vec::with_capacity(self.versions.len() + 1);
        if self.is_64 {
            provides.push(format!("{}()(64bit)", soname));
            provides.extend(self.versions.iter().map(|v| format!("{}({})(64bit)", soname, v)));
        } else {
            provides.push(soname.clone());
            provides.extend(self.versions.iter().map(|v| format!("{}({})", soname, v)));
        }
        provides
    }
}

/// Read and parse an ELF object from disk.
pub fn read_elf(path: &Path) -> Result<ElfInfo> {
    if !std::fs::metadata(path)?.is_file() {
        return Err(ResolutionError::MalformedElf {
            path: path.display().to_string(),
            reason: "not a regular file".to_string(),
        });
    }
    let data = std::fs::read(path)?;
    ElfInfo::parse(&data).map_err(|reason| ResolutionError::MalformedElf {
        path: path.display().to_string(),
        reason,
    })
}
