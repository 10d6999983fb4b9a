//! Calling conventions available on this build target.
//!
//! The codes are the ones the call engine uses for the same conventions.
//! The table is fixed at compile time and always ends with `default`.

/// One calling convention: its name and the engine's code for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformAbi {
    pub name: &'static str,
    pub code: u32,
}

impl PlatformAbi {
    const fn new(name: &'static str, code: u32) -> Self {
        Self { name, code }
    }
}

#[cfg(all(target_arch = "x86", target_os = "windows"))]
mod codes {
    pub const SYSV: u32 = 1;
    pub const STDCALL: u32 = 2;
    pub const THISCALL: u32 = 3;
    pub const FASTCALL: u32 = 4;
    pub const MS_CDECL: u32 = 5;
    pub const DEFAULT: u32 = MS_CDECL;
}

#[cfg(all(target_arch = "x86_64", target_os = "windows"))]
mod codes {
    pub const WIN64: u32 = 1;
    pub const DEFAULT: u32 = WIN64;
}

#[cfg(all(target_arch = "x86", not(target_os = "windows")))]
mod codes {
    pub const SYSV: u32 = 1;
    pub const DEFAULT: u32 = SYSV;
}

#[cfg(all(target_arch = "x86_64", not(target_os = "windows")))]
mod codes {
    pub const UNIX64: u32 = 2;
    pub const DEFAULT: u32 = UNIX64;
}

// sysv on aarch64 and the other non-x86 targets
#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
mod codes {
    pub const DEFAULT: u32 = 1;
}

/// Code of the convention used when hosted code does not name one.
pub const DEFAULT_ABI: u32 = codes::DEFAULT;

#[cfg(all(target_arch = "x86", target_os = "windows"))]
pub static ABI_TABLE: &[PlatformAbi] = &[
    PlatformAbi::new("sysv", codes::SYSV),
    PlatformAbi::new("stdcall", codes::STDCALL),
    PlatformAbi::new("thiscall", codes::THISCALL),
    PlatformAbi::new("fastcall", codes::FASTCALL),
    PlatformAbi::new("ms_cdecl", codes::MS_CDECL),
    PlatformAbi::new("default", DEFAULT_ABI),
];

#[cfg(all(target_arch = "x86_64", target_os = "windows"))]
pub static ABI_TABLE: &[PlatformAbi] = &[
    PlatformAbi::new("win64", codes::WIN64),
    PlatformAbi::new("default", DEFAULT_ABI),
];

#[cfg(all(target_arch = "x86", not(target_os = "windows")))]
pub static ABI_TABLE: &[PlatformAbi] = &[
    PlatformAbi::new("sysv", codes::SYSV),
    PlatformAbi::new("default", DEFAULT_ABI),
];

#[cfg(all(target_arch = "x86_64", not(target_os = "windows")))]
pub static ABI_TABLE: &[PlatformAbi] = &[
    PlatformAbi::new("unix64", codes::UNIX64),
    PlatformAbi::new("default", DEFAULT_ABI),
];

// Other architectures expose only the default convention by name.
#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
pub static ABI_TABLE: &[PlatformAbi] = &[PlatformAbi::new("default", DEFAULT_ABI)];

/// The platform table in declaration order.
pub fn enumerate_abis() -> &'static [PlatformAbi] {
    ABI_TABLE
}

/// True if `code` names a convention on this platform.
pub fn is_known_abi(code: u32) -> bool {
    ABI_TABLE.iter().any(|abi| abi.code == code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_ends_with_default() {
        let last = enumerate_abis().last().unwrap();
        assert_eq!(last.name, "default");
        assert_eq!(last.code, DEFAULT_ABI);
    }

    #[test]
    fn default_is_a_named_convention() {
        assert!(is_known_abi(DEFAULT_ABI));
        assert!(!is_known_abi(0));
    }

    #[cfg(all(target_arch = "x86_64", not(target_os = "windows")))]
    #[test]
    fn unix64_table() {
        let names: Vec<_> = enumerate_abis().iter().map(|a| a.name).collect();
        assert_eq!(names, ["unix64", "default"]);
        assert_eq!(DEFAULT_ABI, 2);
    }
}
