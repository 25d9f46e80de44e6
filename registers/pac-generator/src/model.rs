// Licensed under the Apache-2.0 license

//! Register description model.
//!
//! ## Architecture Overview
//!
//! ```text
//! Description                      # as read from csr.svd / JSON, unchecked
//! ├── peripherals: Vec<Peripheral>
//! │   └── registers: Vec<Register>
//! │       └── fields: Vec<Field>
//! └── memory_regions: Vec<MemoryRegion>
//!
//! Description::resolve ──► PeripheralMap   # validated, read-only
//! MemoryMap::new        ──► MemoryMap       # validated, see `regions`
//! ```
//!
//! Addresses and widths are transcribed verbatim from the SoC build. The
//! only way to obtain a [`PeripheralMap`] is through validation, so the code
//! emitter never sees overlapping registers or out-of-range fields.

use crate::config::FilterConfig;
use crate::error::{MalformedDescriptionError, PacError, PacResult};
use crate::target::CpuTarget;
use crate::util::{camel_case, snake_case};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

//=============================================================================
// Access modes and widths
//=============================================================================

/// Software access permitted on a register.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Access {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl Access {
    pub fn can_read(self) -> bool {
        matches!(self, Access::ReadOnly | Access::ReadWrite)
    }

    pub fn can_write(self) -> bool {
        matches!(self, Access::WriteOnly | Access::ReadWrite)
    }

    /// Parses an SVD `<access>` value.
    pub fn from_svd(value: &str) -> Option<Self> {
        match value.trim() {
            "read-only" => Some(Access::ReadOnly),
            "write-only" | "writeOnce" => Some(Access::WriteOnly),
            "read-write" | "read-writeOnce" => Some(Access::ReadWrite),
            _ => None,
        }
    }
}

/// Register width. Values are always unsigned and exactly this wide.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum RegisterWidth {
    U8,
    U16,
    U32,
    U64,
}

impl RegisterWidth {
    pub fn bits(self) -> u32 {
        match self {
            RegisterWidth::U8 => 8,
            RegisterWidth::U16 => 16,
            RegisterWidth::U32 => 32,
            RegisterWidth::U64 => 64,
        }
    }

    pub fn bytes(self) -> u64 {
        u64::from(self.bits() / 8)
    }

    /// The unsigned Rust integer type holding a value of this width.
    pub fn rust_type(self) -> &'static str {
        match self {
            RegisterWidth::U8 => "u8",
            RegisterWidth::U16 => "u16",
            RegisterWidth::U32 => "u32",
            RegisterWidth::U64 => "u64",
        }
    }

    /// Mask covering every bit of the register.
    pub fn mask(self) -> u64 {
        match self {
            RegisterWidth::U64 => u64::MAX,
            w => (1u64 << w.bits()) - 1,
        }
    }
}

/// A width other than 8, 16, 32 or 64 bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InvalidWidth(pub u32);

impl fmt::Display for InvalidWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unsupported register width {} (expected 8, 16, 32 or 64)", self.0)
    }
}

impl TryFrom<u32> for RegisterWidth {
    type Error = InvalidWidth;

    fn try_from(bits: u32) -> Result<Self, Self::Error> {
        match bits {
            8 => Ok(RegisterWidth::U8),
            16 => Ok(RegisterWidth::U16),
            32 => Ok(RegisterWidth::U32),
            64 => Ok(RegisterWidth::U64),
            other => Err(InvalidWidth(other)),
        }
    }
}

impl From<RegisterWidth> for u32 {
    fn from(width: RegisterWidth) -> u32 {
        width.bits()
    }
}

//=============================================================================
// Peripherals, registers, fields
//=============================================================================

/// A bit field within a register.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    /// Position of the least significant bit.
    pub bit_offset: u32,
    pub bit_width: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Field {
    /// Mask of the bits this field owns, in register position.
    pub fn mask(&self) -> u64 {
        let unshifted = if self.bit_width >= 64 {
            u64::MAX
        } else {
            (1u64 << self.bit_width) - 1
        };
        unshifted.checked_shl(self.bit_offset).unwrap_or(0)
    }

    /// One past the most significant bit.
    pub fn end(&self) -> u64 {
        u64::from(self.bit_offset) + u64::from(self.bit_width)
    }
}

/// A memory-mapped register.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Register {
    pub name: String,
    /// Byte offset from the peripheral base.
    pub offset: u64,
    pub width: RegisterWidth,
    pub access: Access,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<Field>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Register {
    /// One past the last byte this register occupies, relative to the base.
    pub fn end(&self) -> u64 {
        self.offset + self.width.bytes()
    }
}

/// A peripheral: a named block of registers at a base address.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peripheral {
    pub name: String,
    pub base_address: u64,
    #[serde(default)]
    pub registers: Vec<Register>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub irq: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Peripheral {
    /// The byte range `[start, end)` covered by the registers, if there are any.
    pub fn window(&self) -> Option<(u64, u64)> {
        let start = self.registers.iter().map(|r| r.offset).min()?;
        let end = self.registers.iter().map(Register::end).max()?;
        Some((self.base_address + start, self.base_address + end))
    }
}

//=============================================================================
// Memory regions
//=============================================================================

/// Access attributes of a memory region. Regions are always readable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegionAttributes {
    pub executable: bool,
    pub writable: bool,
}

impl RegionAttributes {
    /// Attributes LiteX implies by a region's name.
    pub fn for_name(name: &str) -> Self {
        let name = name.to_ascii_lowercase();
        if name == "rom" || name.contains("flash") {
            RegionAttributes {
                executable: true,
                writable: false,
            }
        } else if name == "csr" || name.starts_with("io") {
            RegionAttributes {
                executable: false,
                writable: true,
            }
        } else {
            RegionAttributes {
                executable: true,
                writable: true,
            }
        }
    }

    /// GNU ld attribute letters, e.g. `rx` or `rwx`.
    pub fn flags(self) -> String {
        let mut flags = String::from("r");
        if self.writable {
            flags.push('w');
        }
        if self.executable {
            flags.push('x');
        }
        flags
    }

    /// Parses GNU ld attribute letters.
    pub fn from_flags(flags: &str) -> Option<Self> {
        let mut attributes = RegionAttributes {
            executable: false,
            writable: false,
        };
        for c in flags.chars() {
            match c.to_ascii_lowercase() {
                'r' | 'a' | 'i' | 'l' => {}
                'w' => attributes.writable = true,
                'x' => attributes.executable = true,
                _ => return None,
            }
        }
        Some(attributes)
    }
}

/// A named, contiguous address range the linker may place sections in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryRegion {
    pub name: String,
    pub origin: u64,
    /// Length in bytes; zero means the region is absent from this build.
    pub length: u64,
    /// Derived from the name when the input does not say.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<RegionAttributes>,
}

impl MemoryRegion {
    pub fn new(name: impl Into<String>, origin: u64, length: u64) -> Self {
        Self {
            name: name.into(),
            origin,
            length,
            attributes: None,
        }
    }

    pub fn attributes(&self) -> RegionAttributes {
        self.attributes
            .unwrap_or_else(|| RegionAttributes::for_name(&self.name))
    }

    /// One past the last byte of the region.
    pub fn end(&self) -> u64 {
        self.origin.saturating_add(self.length)
    }
}

//=============================================================================
// Description document
//=============================================================================

/// A register description as produced by the SoC build, not yet validated.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Description {
    pub peripherals: Vec<Peripheral>,
    #[serde(default)]
    pub memory_regions: Vec<MemoryRegion>,
}

impl Description {
    /// Reads an SVD document (LiteX `csr.svd`).
    pub fn from_svd(xml: &str) -> Result<Self, MalformedDescriptionError> {
        crate::svd::parse(xml)
    }

    /// Reads the JSON rendition of this model.
    pub fn from_json(json: &str) -> Result<Self, MalformedDescriptionError> {
        serde_json::from_str(json).map_err(|e| MalformedDescriptionError::Syntax(e.to_string()))
    }

    /// Loads a description file, choosing the reader by extension: `.json`
    /// is JSON, anything else is SVD.
    pub fn load(path: &Path) -> PacResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| PacError::ReadInput {
            path: path.to_path_buf(),
            source,
        })?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let description = if is_json {
            Self::from_json(&text)?
        } else {
            Self::from_svd(&text)?
        };
        Ok(description)
    }

    /// Applies `filter` and validates the peripherals for `target`.
    pub fn resolve(
        &self,
        target: CpuTarget,
        filter: &FilterConfig,
    ) -> Result<PeripheralMap, MalformedDescriptionError> {
        let peripherals = self
            .peripherals
            .iter()
            .filter(|p| {
                let keep = filter.should_include(&p.name);
                if !keep {
                    debug!("Excluding peripheral {}", p.name);
                }
                keep
            })
            .map(|p| Peripheral {
                registers: p
                    .registers
                    .iter()
                    .filter(|r| filter.should_include(&r.name))
                    .cloned()
                    .collect(),
                ..p.clone()
            })
            .collect();
        PeripheralMap::new(peripherals, target)
    }
}

//=============================================================================
// PeripheralMap - validated view
//=============================================================================

/// Modules `soc/mod.rs` declares next to the peripheral modules.
pub const RESERVED_MODULES: &[&str] = &["interrupt", "memory"];

/// The validated, read-only set of peripherals the emitter works from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeripheralMap {
    target: CpuTarget,
    peripherals: Vec<Peripheral>,
}

impl PeripheralMap {
    /// Validates `peripherals` against every layout invariant for `target`.
    pub fn new(
        peripherals: Vec<Peripheral>,
        target: CpuTarget,
    ) -> Result<Self, MalformedDescriptionError> {
        let mut names = HashSet::new();
        for peripheral in &peripherals {
            let module = snake_case(&peripheral.name);
            if RESERVED_MODULES.contains(&module.as_str()) {
                return Err(MalformedDescriptionError::ReservedPeripheralName {
                    name: peripheral.name.clone(),
                });
            }
            if !names.insert(module) {
                return Err(MalformedDescriptionError::DuplicatePeripheral {
                    name: peripheral.name.clone(),
                });
            }
            validate_peripheral(peripheral, target)?;
        }

        let mut windows: Vec<_> = peripherals
            .iter()
            .filter_map(|p| p.window().map(|w| (w, p.name.as_str())))
            .collect();
        windows.sort();
        for pair in windows.windows(2) {
            let ((_, first_end), first) = pair[0];
            let ((second_start, _), second) = pair[1];
            if second_start < first_end {
                return Err(MalformedDescriptionError::OverlappingPeripherals {
                    first: first.to_string(),
                    second: second.to_string(),
                });
            }
        }

        Ok(Self {
            target,
            peripherals,
        })
    }

    pub fn target(&self) -> CpuTarget {
        self.target
    }

    pub fn peripherals(&self) -> &[Peripheral] {
        &self.peripherals
    }

    pub fn get(&self, name: &str) -> Option<&Peripheral> {
        self.peripherals.iter().find(|p| p.name == name)
    }

    pub fn len(&self) -> usize {
        self.peripherals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peripherals.is_empty()
    }
}

fn validate_peripheral(
    peripheral: &Peripheral,
    target: CpuTarget,
) -> Result<(), MalformedDescriptionError> {
    let bus = target.bus_width();
    if peripheral.base_address % bus.bytes() != 0 {
        return Err(MalformedDescriptionError::MisalignedBase {
            peripheral: peripheral.name.clone(),
            base: peripheral.base_address,
            align: bus.bytes(),
        });
    }

    let mut names = HashSet::new();
    let mut types = HashSet::new();
    for register in &peripheral.registers {
        // Struct fields are snake_case, bitfield types CamelCase.
        if !names.insert(snake_case(&register.name)) || !types.insert(camel_case(&register.name)) {
            return Err(MalformedDescriptionError::DuplicateRegister {
                peripheral: peripheral.name.clone(),
                register: register.name.clone(),
            });
        }
        if register.width > bus {
            return Err(MalformedDescriptionError::WidthExceedsTarget {
                peripheral: peripheral.name.clone(),
                register: register.name.clone(),
                width: register.width.bits(),
                bus: bus.bits(),
            });
        }
        if register.offset % register.width.bytes() != 0 {
            return Err(MalformedDescriptionError::MisalignedRegister {
                peripheral: peripheral.name.clone(),
                register: register.name.clone(),
                offset: register.offset,
                align: register.width.bytes(),
            });
        }
        let end = peripheral
            .base_address
            .checked_add(register.end())
            .filter(|end| *end <= target.address_space_end());
        if end.is_none() {
            return Err(MalformedDescriptionError::AddressOutOfRange {
                peripheral: peripheral.name.clone(),
                register: register.name.clone(),
                address: peripheral.base_address.saturating_add(register.offset),
            });
        }
        validate_fields(peripheral, register)?;
    }

    let mut sorted: Vec<&Register> = peripheral.registers.iter().collect();
    sorted.sort_by_key(|r| (r.offset, r.end()));
    for pair in sorted.windows(2) {
        if pair[1].offset < pair[0].end() {
            return Err(MalformedDescriptionError::OverlappingRegisters {
                peripheral: peripheral.name.clone(),
                first: pair[0].name.clone(),
                second: pair[1].name.clone(),
            });
        }
    }
    Ok(())
}

fn validate_fields(
    peripheral: &Peripheral,
    register: &Register,
) -> Result<(), MalformedDescriptionError> {
    let mut names = HashSet::new();
    for field in &register.fields {
        if field.bit_width == 0 || field.end() > u64::from(register.width.bits()) {
            return Err(MalformedDescriptionError::FieldOutOfRange {
                peripheral: peripheral.name.clone(),
                register: register.name.clone(),
                field: field.name.clone(),
                offset: field.bit_offset,
                width: field.bit_width,
                register_width: register.width.bits(),
            });
        }
        if !names.insert(camel_case(&field.name)) {
            return Err(MalformedDescriptionError::DuplicateField {
                peripheral: peripheral.name.clone(),
                register: register.name.clone(),
                field: field.name.clone(),
            });
        }
    }

    let mut sorted: Vec<&Field> = register.fields.iter().collect();
    sorted.sort_by_key(|f| f.bit_offset);
    for pair in sorted.windows(2) {
        if u64::from(pair[1].bit_offset) < pair[0].end() {
            return Err(MalformedDescriptionError::OverlappingFields {
                peripheral: peripheral.name.clone(),
                register: register.name.clone(),
                first: pair[0].name.clone(),
                second: pair[1].name.clone(),
            });
        }
    }
    Ok(())
}
