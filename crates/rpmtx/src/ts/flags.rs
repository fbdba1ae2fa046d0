use bitflags::bitflags;

bitflags! {
    /// Dependency check and ordering switches.
    #[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
    pub struct CheckFlags: u32 {
        const NOREQUIRES = 1 << 0;
        const NOCONFLICTS = 1 << 1;
        const NOPARENTDIRS = 1 << 2;
        const NOLINKTOS = 1 << 3;
        const NOUPGRADE = 1 << 4;
        const NOOBSOLETES = 1 << 5;
        const NOSUGGEST = 1 << 6;
        /// Installer mode: presentation order decides queue priority
        const ANACONDA = 1 << 7;
        /// Report whiteout entries and loops loudly
        const DEPLOOPS = 1 << 8;
    }
}

impl Default for CheckFlags {
    fn default() -> Self {
        CheckFlags::empty()
    }
}

impl CheckFlags {
    /// Look a flag up by its lowercase name.
    pub fn from_flag_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "norequires" => Some(CheckFlags::NOREQUIRES),
            "noconflicts" => Some(CheckFlags::NOCONFLICTS),
            "noparentdirs" => Some(CheckFlags::NOPARENTDIRS),
            "nolinktos" => Some(CheckFlags::NOLINKTOS),
            "noupgrade" => Some(CheckFlags::NOUPGRADE),
            "noobsoletes" => Some(CheckFlags::NOOBSOLETES),
            "nosuggest" => Some(CheckFlags::NOSUGGEST),
            "anaconda" => Some(CheckFlags::ANACONDA),
            "deploops" => Some(CheckFlags::DEPLOOPS),
            _ => None,
        }
    }

    /// Level used for diagnostics that the caller asked to see.
    pub(crate) fn loop_log_level(&self) -> log::Level {
        if self.intersects(CheckFlags::ANACONDA | CheckFlags::DEPLOOPS) {
            log::Level::Warn
        } else {
            log::Level::Debug
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_flag_name() {
        assert_eq!(CheckFlags::from_flag_name("NoSuggest"), Some(CheckFlags::NOSUGGEST));
        assert_eq!(CheckFlags::from_flag_name("deploops"), Some(CheckFlags::DEPLOOPS));
        assert_eq!(CheckFlags::from_flag_name("nothing"), None);
    }

    #[test]
    fn test_loop_log_level() {
        assert_eq!(CheckFlags::empty().loop_log_level(), log::Level::Debug);
        assert_eq!(CheckFlags::ANACONDA.loop_log_level(), log::Level::Warn);
    }
}
