// Licensed under the Apache-2.0 license

//! Code generation for the PAC crate's `src/` tree.
//!
//! ## Code Generation Flow
//!
//! ```text
//! PeripheralMap ─► GeneratedPeripheral[] ─► src/soc/<name>.rs
//!       │          ├── bitfield types      → register_bitfields! (per width)
//!       │          └── registers           → register_structs!
//! MemoryMap ────► SocModule              ─► src/soc/mod.rs
//! CpuTarget ────► lib_rs()                ─► src/lib.rs
//! ```
//!
//! ## Generated Code Structure
//!
//! For a peripheral named "uart", the generated module looks like:
//!
//! ```text
//! pub const UART_ADDR: usize = 0x8200_0000;
//! pub const UART_IRQ: u32 = 2;
//!
//! pub mod bits {
//!     use tock_registers::register_bitfields;
//!     register_bitfields! { u8,
//!         pub Status [ Ready OFFSET(0) NUMBITS(1) [], ],
//!     }
//! }
//!
//! pub mod regs {
//!     use tock_registers::register_structs;
//!     register_structs! {
//!         pub Uart {
//!             (0x0 => pub rxtx: ReadWrite<u8>),
//!             (0x1 => _reserved0),
//!             (0x4 => pub status: ReadOnly<u8, super::bits::Status::Register>),
//!             (0x5 => @END),
//!         }
//!     }
//! }
//!
//! pub unsafe fn registers() -> &'static regs::Uart { ... }
//! ```
//!
//! Access modes map onto `ReadOnly`, `WriteOnly` and `ReadWrite`, so a write
//! to a read-only register does not compile.

use crate::error::ArtifactWriteError;
use crate::model::{Access, Peripheral, PeripheralMap, Register, RegisterWidth};
use crate::regions::MemoryMap;
use crate::target::CpuTarget;
use crate::util::{camel_case, hex_const, snake_case, upper_snake_case};
use log::debug;
use quote::format_ident;
use std::collections::BTreeMap;
use std::fmt::{self, Write};
use std::path::{Path, PathBuf};

/// First line of every generated source file.
pub const GENERATED_HEADER: &str = "// Generated by litex-pac-generator. Do not edit.";

//=============================================================================
// Generated Types
//=============================================================================

/// A generated bit field within a register.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratedField {
    /// Field name, CamelCase.
    pub name: String,
    pub offset: u32,
    pub width: u32,
    pub description: Option<String>,
}

/// A register instance in a peripheral's `register_structs!` block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratedRegister {
    /// Struct field name, snake_case.
    pub name: String,
    /// Bitfield type name, CamelCase; `None` when the register declares no
    /// fields.
    pub type_name: Option<String>,
    pub offset: u64,
    pub width: RegisterWidth,
    pub access: Access,
    pub fields: Vec<GeneratedField>,
}

impl GeneratedRegister {
    fn new(register: &Register) -> Self {
        let fields: Vec<GeneratedField> = register
            .fields
            .iter()
            .map(|f| GeneratedField {
                name: camel_case(&f.name),
                offset: f.bit_offset,
                width: f.bit_width,
                description: f.description.clone(),
            })
            .collect();
        Self {
            name: snake_case(&register.name),
            type_name: (!fields.is_empty()).then(|| camel_case(&register.name)),
            offset: register.offset,
            width: register.width,
            access: register.access,
            fields,
        }
    }

    /// The tock-registers type of this register.
    pub fn register_type(&self) -> String {
        let wrapper = match self.access {
            Access::ReadOnly => "ReadOnly",
            Access::WriteOnly => "WriteOnly",
            Access::ReadWrite => "ReadWrite",
        };
        let width = self.width.rust_type();
        match &self.type_name {
            Some(type_name) => format!(
                "tock_registers::registers::{wrapper}<{width}, super::bits::{type_name}::Register>"
            ),
            None => format!("tock_registers::registers::{wrapper}<{width}>"),
        }
    }
}

/// Everything needed to emit one peripheral module.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratedPeripheral {
    /// Module name, snake_case.
    pub module: String,
    /// Register block struct name, CamelCase.
    pub struct_name: String,
    pub base_address: u64,
    pub irq: Option<u32>,
    pub description: Option<String>,
    /// Sorted by offset.
    pub registers: Vec<GeneratedRegister>,
}

impl From<&Peripheral> for GeneratedPeripheral {
    fn from(peripheral: &Peripheral) -> Self {
        let mut registers: Vec<GeneratedRegister> =
            peripheral.registers.iter().map(GeneratedRegister::new).collect();
        registers.sort_by_key(|r| r.offset);
        Self {
            module: snake_case(&peripheral.name),
            struct_name: camel_case(&peripheral.name),
            base_address: peripheral.base_address,
            irq: peripheral.irq,
            description: peripheral.description.clone(),
            registers,
        }
    }
}

//=============================================================================
// Code Generation
//=============================================================================

impl GeneratedPeripheral {
    fn const_prefix(&self) -> String {
        upper_snake_case(&self.module)
    }

    /// One `register_bitfields!` block per register width, types sorted
    /// alphabetically within each block.
    fn write_bitfields(&self, out: &mut String) -> fmt::Result {
        let mut by_width: BTreeMap<RegisterWidth, Vec<&GeneratedRegister>> = BTreeMap::new();
        for register in self.registers.iter().filter(|r| r.type_name.is_some()) {
            by_width.entry(register.width).or_default().push(register);
        }
        if by_width.is_empty() {
            return Ok(());
        }

        writeln!(out)?;
        writeln!(out, "pub mod bits {{")?;
        writeln!(out, "    //! Types that represent individual registers (bitfields).")?;
        writeln!(out, "    use tock_registers::register_bitfields;")?;
        for (width, mut registers) in by_width {
            registers.sort_by(|a, b| a.type_name.cmp(&b.type_name));
            writeln!(out, "    register_bitfields! {{")?;
            writeln!(out, "        {},", width.rust_type())?;
            for register in registers {
                let type_name = register.type_name.as_deref().unwrap_or_default();
                writeln!(out, "        pub {type_name} [")?;
                for field in &register.fields {
                    if let Some(desc) = &field.description {
                        for line in desc.lines() {
                            writeln!(out, "            /// {}", line.trim())?;
                        }
                    }
                    writeln!(
                        out,
                        "            {} OFFSET({}) NUMBITS({}) [],",
                        field.name, field.offset, field.width
                    )?;
                }
                writeln!(out, "        ],")?;
            }
            writeln!(out, "    }}")?;
        }
        writeln!(out, "}}")
    }

    /// The `register_structs!` block, with `_reservedN` padding between
    /// registers and the end rounded up to the widest register.
    fn write_register_struct(&self, out: &mut String) -> fmt::Result {
        writeln!(out)?;
        writeln!(out, "pub mod regs {{")?;
        writeln!(out, "    //! Types that represent registers.")?;
        writeln!(out, "    use tock_registers::register_structs;")?;
        writeln!(out, "    register_structs! {{")?;
        writeln!(out, "        pub {} {{", self.struct_name)?;

        let mut next_offset = 0u64;
        let mut reserved_count = 0;
        for register in &self.registers {
            if register.offset > next_offset {
                writeln!(out, "            (0x{next_offset:x} => _reserved{reserved_count}),")?;
                reserved_count += 1;
            }
            writeln!(
                out,
                "            (0x{:x} => pub {}: {}),",
                register.offset,
                register.name,
                register.register_type()
            )?;
            next_offset = register.offset + register.width.bytes();
        }

        let align = self
            .registers
            .iter()
            .map(|r| r.width.bytes())
            .max()
            .unwrap_or(1);
        let end = next_offset.div_ceil(align) * align;
        if end > next_offset {
            writeln!(out, "            (0x{next_offset:x} => _reserved{reserved_count}),")?;
        }
        writeln!(out, "            (0x{end:x} => @END),")?;
        writeln!(out, "        }}")?;
        writeln!(out, "    }}")?;
        writeln!(out, "}}")
    }

    fn write_accessor(&self, out: &mut String) -> fmt::Result {
        let prefix = self.const_prefix();
        let name = &self.struct_name;
        writeln!(out)?;
        writeln!(out, "/// Returns the register block at [`{prefix}_ADDR`].")?;
        writeln!(out, "///")?;
        writeln!(out, "/// # Safety")?;
        writeln!(out, "///")?;
        writeln!(
            out,
            "/// The caller must not create aliasing accesses that break the peripheral's protocol."
        )?;
        writeln!(out, "pub unsafe fn registers() -> &'static regs::{name} {{")?;
        writeln!(out, "    unsafe {{ &*({prefix}_ADDR as *const regs::{name}) }}")?;
        writeln!(out, "}}")
    }
}

impl fmt::Display for GeneratedPeripheral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        writeln!(out, "{GENERATED_HEADER}")?;
        if let Some(desc) = &self.description {
            for line in desc.lines() {
                writeln!(out, "//! {}", line.trim())?;
            }
        }
        writeln!(out)?;

        let prefix = self.const_prefix();
        writeln!(
            out,
            "pub const {prefix}_ADDR: usize = {};",
            hex_const(self.base_address)
        )?;
        if let Some(irq) = self.irq {
            writeln!(out, "pub const {prefix}_IRQ: u32 = {irq};")?;
        }

        self.write_bitfields(&mut out)?;
        if !self.registers.is_empty() {
            self.write_register_struct(&mut out)?;
            self.write_accessor(&mut out)?;
        }
        f.write_str(&out)
    }
}

/// The aggregating `soc/mod.rs`: peripheral modules plus the `interrupt`
/// and `memory` constant modules.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SocModule<'a> {
    pub peripherals: &'a [GeneratedPeripheral],
    pub memory: &'a MemoryMap,
}

impl fmt::Display for SocModule<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{GENERATED_HEADER}")?;
        writeln!(f)?;
        for peripheral in self.peripherals {
            writeln!(f, "pub mod {};", peripheral.module)?;
        }

        writeln!(f)?;
        writeln!(f, "/// Interrupt line of each peripheral that has one.")?;
        writeln!(f, "pub mod interrupt {{")?;
        for peripheral in self.peripherals {
            if let Some(irq) = peripheral.irq {
                writeln!(f, "    pub const {}: u32 = {irq};", peripheral.const_prefix())?;
            }
        }
        writeln!(f, "}}")?;

        writeln!(f)?;
        writeln!(f, "/// Linker memory regions.")?;
        writeln!(f, "pub mod memory {{")?;
        for region in self.memory.regions() {
            let name = upper_snake_case(&region.name);
            writeln!(
                f,
                "    pub const {name}_ORIGIN: usize = {};",
                hex_const(region.origin)
            )?;
            writeln!(
                f,
                "    pub const {name}_LENGTH: usize = {};",
                hex_const(region.length)
            )?;
        }
        writeln!(f, "}}")
    }
}

/// The crate root: `no_std`, the architecture crate re-exported as `arch`,
/// and everything under `soc` re-exported at the top level.
pub fn lib_rs(target: CpuTarget) -> String {
    let arch = format_ident!("{}", target.arch_crate().name.replace('-', "_"));
    let file: syn::File = syn::parse_quote! {
        #![no_std]

        pub use #arch as arch;
        pub use tock_registers;

        mod soc;
        pub use soc::*;
    };
    format!("{GENERATED_HEADER}\n\n{}", prettyplease::unparse(&file))
}

//=============================================================================
// Source tree
//=============================================================================

/// A generated source file, relative to the PAC crate's `src/` directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratedFile {
    pub path: PathBuf,
    pub contents: String,
}

/// The directory under `src/` holding the generated peripheral modules.
pub const SOC_DIR: &str = "soc";

/// Renders the complete `src/` tree: `lib.rs`, `soc/mod.rs` and one
/// `soc/<peripheral>.rs` per peripheral, in declaration order.
pub fn generate_sources(peripherals: &PeripheralMap, memory: &MemoryMap) -> Vec<GeneratedFile> {
    let generated: Vec<GeneratedPeripheral> = peripherals
        .peripherals()
        .iter()
        .map(GeneratedPeripheral::from)
        .collect();

    let mut files = vec![
        GeneratedFile {
            path: PathBuf::from("lib.rs"),
            contents: lib_rs(peripherals.target()),
        },
        GeneratedFile {
            path: Path::new(SOC_DIR).join("mod.rs"),
            contents: SocModule {
                peripherals: &generated,
                memory,
            }
            .to_string(),
        },
    ];
    for peripheral in &generated {
        debug!(
            "Generating {} ({} registers)",
            peripheral.module,
            peripheral.registers.len()
        );
        files.push(GeneratedFile {
            path: Path::new(SOC_DIR).join(format!("{}.rs", peripheral.module)),
            contents: peripheral.to_string(),
        });
    }
    files
}

/// Writes `files` under `src_dir`, replacing `src_dir/soc` wholesale so
/// modules of removed peripherals do not linger.
pub fn write_sources(src_dir: &Path, files: &[GeneratedFile]) -> Result<(), ArtifactWriteError> {
    let soc_dir = src_dir.join(SOC_DIR);
    if soc_dir.exists() {
        std::fs::remove_dir_all(&soc_dir).map_err(ArtifactWriteError::at(&soc_dir))?;
    }
    std::fs::create_dir_all(&soc_dir).map_err(ArtifactWriteError::at(&soc_dir))?;
    for file in files {
        let path = src_dir.join(&file.path);
        std::fs::write(&path, &file.contents).map_err(ArtifactWriteError::at(&path))?;
    }
    Ok(())
}
