// Licensed under the Apache-2.0 license

//! CPU targets the generator knows a register-access convention for.

use crate::error::UnsupportedTargetError;
use crate::model::RegisterWidth;
use std::fmt;
use std::str::FromStr;

/// A crate the generated PAC depends on, with the version it is pinned to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SupportCrate {
    pub name: &'static str,
    pub version: &'static str,
}

/// The register-access crate every generated PAC depends on.
pub const REGISTER_CRATE: SupportCrate = SupportCrate {
    name: "tock-registers",
    version: "0.9.0",
};

/// A supported CPU family.
///
/// Only one family is supported at a time; anything else is rejected by
/// [`CpuTarget::from_str`] before any file is touched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CpuTarget {
    /// VexRiscv, the RV32 soft core LiteX builds by default.
    VexRiscv,
}

impl CpuTarget {
    /// Every target, in the order they are listed in error messages.
    pub const ALL: &'static [CpuTarget] = &[CpuTarget::VexRiscv];

    /// The CPU identifier used by the SoC builder.
    pub fn name(self) -> &'static str {
        match self {
            CpuTarget::VexRiscv => "vexriscv",
        }
    }

    /// Runtime (startup, linker script) support crate.
    pub fn runtime_crate(self) -> SupportCrate {
        match self {
            CpuTarget::VexRiscv => SupportCrate {
                name: "riscv-rt",
                version: "0.8.0",
            },
        }
    }

    /// Architecture support crate, re-exported by the PAC as `arch`.
    pub fn arch_crate(self) -> SupportCrate {
        match self {
            CpuTarget::VexRiscv => SupportCrate {
                name: "riscv",
                version: "0.6.0",
            },
        }
    }

    /// Natural access width of the data bus; no register may be wider.
    pub fn bus_width(self) -> RegisterWidth {
        match self {
            CpuTarget::VexRiscv => RegisterWidth::U32,
        }
    }

    /// One past the highest physical address.
    pub fn address_space_end(self) -> u64 {
        match self {
            CpuTarget::VexRiscv => 1 << 32,
        }
    }

    fn supported_list() -> String {
        Self::ALL
            .iter()
            .map(|t| t.name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl FromStr for CpuTarget {
    type Err = UnsupportedTargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.name() == s)
            .ok_or_else(|| UnsupportedTargetError {
                cpu_type: s.to_string(),
                supported: Self::supported_list(),
            })
    }
}

impl fmt::Display for CpuTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
