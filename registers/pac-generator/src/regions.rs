// Licensed under the Apache-2.0 license

//! Memory regions and the linker-script fragment (`regions.ld`) describing
//! them.
//!
//! The fragment is a single GNU ld `MEMORY` block in the same shape LiteX
//! writes:
//!
//! ```text
//! MEMORY {
//! 	rom : ORIGIN = 0x00000000, LENGTH = 0xA000 /* rx */
//! 	sram : ORIGIN = 0x10000000, LENGTH = 0x2000 /* rwx */
//! }
//! ```
//!
//! [`parse_linker_fragment`] reads that shape back (and the `name (attrs) :`
//! and `org`/`len` spellings ld also accepts), so the build hook can recover
//! the memory map from the file the pipeline wrote.

use crate::error::{MalformedDescriptionError, PacError, PacResult};
use crate::model::{MemoryRegion, RegionAttributes};
use crate::target::CpuTarget;
use crate::util::{parse_int, upper_snake_case};
use log::debug;
use std::collections::HashSet;
use std::path::Path;
use winnow::ascii::{multispace1, space0, Caseless};
use winnow::combinator::{alt, delimited, eof, opt, preceded, repeat, terminated};
use winnow::prelude::*;
use winnow::token::{take_until, take_while};

/// Header comment written at the top of the fragment.
pub const FRAGMENT_HEADER: &str = "/* Generated by litex-pac-generator. Do not edit. */";

/// Validated memory regions, in declaration order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemoryMap {
    target: CpuTarget,
    regions: Vec<MemoryRegion>,
}

impl MemoryMap {
    /// Validates `regions` for `target`.
    ///
    /// Zero-length regions mean "not present in this build" (for example
    /// `main_ram` when main memory is external SDRAM) and are dropped.
    /// Every kept region gets explicit attributes.
    pub fn new(
        regions: Vec<MemoryRegion>,
        target: CpuTarget,
    ) -> Result<Self, MalformedDescriptionError> {
        let regions: Vec<MemoryRegion> = regions
            .into_iter()
            .filter(|r| {
                if r.length == 0 {
                    debug!("Omitting zero-length memory region {}", r.name);
                }
                r.length != 0
            })
            .map(|r| MemoryRegion {
                attributes: Some(r.attributes()),
                ..r
            })
            .collect();

        let mut names = HashSet::new();
        for region in &regions {
            if !names.insert(upper_snake_case(&region.name)) {
                return Err(MalformedDescriptionError::DuplicateRegion {
                    name: region.name.clone(),
                });
            }
            let end = region
                .origin
                .checked_add(region.length)
                .filter(|end| *end <= target.address_space_end());
            if end.is_none() {
                return Err(MalformedDescriptionError::RegionOutOfRange {
                    name: region.name.clone(),
                });
            }
        }

        let mut sorted: Vec<&MemoryRegion> = regions.iter().collect();
        sorted.sort_by_key(|r| (r.origin, r.end()));
        for pair in sorted.windows(2) {
            if pair[1].origin < pair[0].end() {
                return Err(MalformedDescriptionError::OverlappingRegions {
                    first: pair[0].name.clone(),
                    second: pair[1].name.clone(),
                });
            }
        }

        Ok(Self { target, regions })
    }

    /// Reads and validates a `regions.ld` file.
    pub fn load(path: &Path, target: CpuTarget) -> PacResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| PacError::ReadInput {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(parse_linker_fragment(&text)?, target)?)
    }

    pub fn target(&self) -> CpuTarget {
        self.target
    }

    pub fn regions(&self) -> &[MemoryRegion] {
        &self.regions
    }

    pub fn get(&self, name: &str) -> Option<&MemoryRegion> {
        self.regions.iter().find(|r| r.name == name)
    }

    /// Renders the `MEMORY` block.
    pub fn linker_fragment(&self) -> String {
        let mut out = String::new();
        out.push_str(FRAGMENT_HEADER);
        out.push_str("\nMEMORY {\n");
        for region in &self.regions {
            out.push_str(&format!(
                "\t{} : ORIGIN = 0x{:08X}, LENGTH = 0x{:X} /* {} */\n",
                region.name,
                region.origin,
                region.length,
                region.attributes().flags()
            ));
        }
        out.push_str("}\n");
        out
    }
}

/// Parses a linker-script file consisting of one `MEMORY` block.
///
/// Attributes come from `name (attrs) :` if present, otherwise from a
/// trailing `/* attrs */` comment; when neither is given they are left for
/// [`MemoryRegion::attributes`] to derive from the name.
pub fn parse_linker_fragment(text: &str) -> Result<Vec<MemoryRegion>, MalformedDescriptionError> {
    memory_block
        .parse(text)
        .map_err(|e| MalformedDescriptionError::Syntax(e.to_string()))
}

fn memory_block(input: &mut &str) -> ModalResult<Vec<MemoryRegion>> {
    ws(input)?;
    Caseless("MEMORY").parse_next(input)?;
    ws(input)?;
    '{'.parse_next(input)?;
    ws(input)?;
    let regions: Vec<MemoryRegion> = repeat(0.., terminated(region, ws)).parse_next(input)?;
    '}'.parse_next(input)?;
    ws(input)?;
    eof.parse_next(input)?;
    Ok(regions)
}

fn region(input: &mut &str) -> ModalResult<MemoryRegion> {
    let name = identifier(input)?;
    ws(input)?;
    let declared = opt(terminated(attribute_list, ws)).parse_next(input)?;
    ':'.parse_next(input)?;
    ws(input)?;
    alt((Caseless("ORIGIN"), Caseless("org"), Caseless("o"))).parse_next(input)?;
    ws(input)?;
    '='.parse_next(input)?;
    ws(input)?;
    let origin = integer(input)?;
    ws(input)?;
    ','.parse_next(input)?;
    ws(input)?;
    alt((Caseless("LENGTH"), Caseless("len"), Caseless("l"))).parse_next(input)?;
    ws(input)?;
    '='.parse_next(input)?;
    ws(input)?;
    let length = integer(input)?;
    let trailing = opt(preceded(space0, comment)).parse_next(input)?;

    let attributes = declared.or_else(|| {
        trailing
            .map(str::trim)
            .filter(|flags| !flags.is_empty())
            .and_then(RegionAttributes::from_flags)
    });
    Ok(MemoryRegion {
        name: name.to_string(),
        origin,
        length,
        attributes,
    })
}

fn attribute_list(input: &mut &str) -> ModalResult<RegionAttributes> {
    delimited('(', take_while(0.., |c: char| c != ')'), ')')
        .verify_map(|flags: &str| RegionAttributes::from_flags(flags.trim()))
        .parse_next(input)
}

fn identifier<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '_').parse_next(input)
}

fn integer(input: &mut &str) -> ModalResult<u64> {
    take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '_')
        .verify_map(ld_int)
        .parse_next(input)
}

/// An ld integer: any literal [`parse_int`] accepts, optionally scaled by a
/// `K` or `M` suffix.
fn ld_int(value: &str) -> Option<u64> {
    let (digits, scale) = if let Some(v) = value.strip_suffix(['K', 'k']) {
        (v, 1024)
    } else if let Some(v) = value.strip_suffix(['M', 'm']) {
        (v, 1024 * 1024)
    } else {
        (value, 1)
    };
    parse_int(digits)?.checked_mul(scale)
}

fn comment<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    delimited("/*", take_until(0.., "*/"), "*/").parse_next(input)
}

/// Whitespace and comments.
fn ws(input: &mut &str) -> ModalResult<()> {
    repeat(0.., alt((multispace1.void(), comment.void()))).parse_next(input)
}
