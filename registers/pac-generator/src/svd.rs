// Licensed under the Apache-2.0 license

//! CMSIS-SVD reader for the register descriptions LiteX writes (`csr.svd`).
//!
//! Only the subset that maps onto the [`Description`] model is read:
//! peripherals (including `derivedFrom`), registers, fields, interrupts and
//! the LiteX `vendorExtensions/memoryRegions` block. Everything else is
//! skipped. `size` and `access` follow SVD inheritance: device, then
//! peripheral, then register.

use crate::error::MalformedDescriptionError;
use crate::model::{Access, Description, Field, MemoryRegion, Peripheral, Register, RegisterWidth};
use crate::util::parse_int;
use log::warn;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

type Result<T> = std::result::Result<T, MalformedDescriptionError>;

#[derive(Clone, Copy, Debug, Default)]
struct Properties {
    size: Option<u32>,
    access: Option<Access>,
}

impl Properties {
    fn or(self, parent: Properties) -> Properties {
        Properties {
            size: self.size.or(parent.size),
            access: self.access.or(parent.access),
        }
    }
}

#[derive(Debug, Default)]
struct RawRegister {
    name: String,
    offset: u64,
    description: Option<String>,
    properties: Properties,
    fields: Vec<Field>,
}

#[derive(Debug, Default)]
struct RawPeripheral {
    name: String,
    base: u64,
    description: Option<String>,
    properties: Properties,
    registers: Vec<RawRegister>,
    interrupts: Vec<u32>,
}

/// Parses an SVD document into a [`Description`].
pub(crate) fn parse(xml: &str) -> Result<Description> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf).map_err(xml_error)? {
            Event::Start(e) if e.local_name().as_ref() == b"device" => {
                return parse_device(&mut reader);
            }
            Event::Eof => {
                return Err(MalformedDescriptionError::MissingValue {
                    element: "document",
                    tag: "device",
                })
            }
            _ => {}
        }
        buf.clear();
    }
}

fn parse_device(reader: &mut Reader<&[u8]>) -> Result<Description> {
    let mut buf = Vec::new();
    let mut properties = Properties::default();
    let mut peripherals = Vec::new();
    let mut memory_regions = Vec::new();
    loop {
        match reader.read_event_into(&mut buf).map_err(xml_error)? {
            Event::Start(e) => {
                let tag = local_name(&e);
                match tag.as_str() {
                    "size" => properties.size = Some(read_u32(reader, "size")?),
                    "access" => properties.access = Some(read_access(reader)?),
                    "peripherals" => peripherals = parse_peripherals(reader)?,
                    "vendorExtensions" => parse_vendor_extensions(reader, &mut memory_regions)?,
                    _ => skip(reader)?,
                }
            }
            Event::End(e) if e.local_name().as_ref() == b"device" => break,
            Event::Eof => return Err(unexpected_eof("device")),
            _ => {}
        }
        buf.clear();
    }

    let peripherals = peripherals
        .into_iter()
        .map(|p| resolve_peripheral(p, properties))
        .collect::<Result<Vec<_>>>()?;
    Ok(Description {
        peripherals,
        memory_regions,
    })
}

fn parse_peripherals(reader: &mut Reader<&[u8]>) -> Result<Vec<RawPeripheral>> {
    let mut buf = Vec::new();
    let mut peripherals: Vec<RawPeripheral> = Vec::new();
    loop {
        match reader.read_event_into(&mut buf).map_err(xml_error)? {
            Event::Start(e) if e.local_name().as_ref() == b"peripheral" => {
                let derived_from = attribute(&e, "derivedFrom")?;
                let mut peripheral = parse_peripheral(reader)?;
                if let Some(base_name) = derived_from {
                    let base = peripherals
                        .iter()
                        .find(|p| p.name == base_name)
                        .ok_or_else(|| MalformedDescriptionError::MissingBasePeripheral {
                            derived: peripheral.name.clone(),
                            base: base_name.clone(),
                        })?;
                    derive_peripheral(&mut peripheral, base);
                }
                peripherals.push(peripheral);
            }
            Event::Start(_) => skip(reader)?,
            Event::End(e) if e.local_name().as_ref() == b"peripherals" => break,
            Event::Eof => return Err(unexpected_eof("peripherals")),
            _ => {}
        }
        buf.clear();
    }
    Ok(peripherals)
}

/// Fills in whatever a derived peripheral does not override.
fn derive_peripheral(peripheral: &mut RawPeripheral, base: &RawPeripheral) {
    if peripheral.registers.is_empty() {
        peripheral.registers = base
            .registers
            .iter()
            .map(|r| RawRegister {
                name: r.name.clone(),
                offset: r.offset,
                description: r.description.clone(),
                properties: r.properties,
                fields: r.fields.clone(),
            })
            .collect();
    }
    if peripheral.interrupts.is_empty() {
        peripheral.interrupts = base.interrupts.clone();
    }
    if peripheral.description.is_none() {
        peripheral.description = base.description.clone();
    }
    peripheral.properties = peripheral.properties.or(base.properties);
}

fn parse_peripheral(reader: &mut Reader<&[u8]>) -> Result<RawPeripheral> {
    let mut buf = Vec::new();
    let mut name = None;
    let mut base = None;
    let mut peripheral = RawPeripheral::default();
    loop {
        match reader.read_event_into(&mut buf).map_err(xml_error)? {
            Event::Start(e) => {
                let tag = local_name(&e);
                match tag.as_str() {
                    "name" => name = Some(read_text(reader)?),
                    "description" => peripheral.description = non_empty(read_text(reader)?),
                    "baseAddress" => base = Some(read_u64(reader, "baseAddress")?),
                    "size" => peripheral.properties.size = Some(read_u32(reader, "size")?),
                    "access" => peripheral.properties.access = Some(read_access(reader)?),
                    "registers" => peripheral.registers = parse_registers(reader)?,
                    "interrupt" => peripheral.interrupts.push(parse_interrupt(reader)?),
                    _ => skip(reader)?,
                }
            }
            Event::End(e) if e.local_name().as_ref() == b"peripheral" => break,
            Event::Eof => return Err(unexpected_eof("peripheral")),
            _ => {}
        }
        buf.clear();
    }
    peripheral.name = name.ok_or(MalformedDescriptionError::MissingValue {
        element: "peripheral",
        tag: "name",
    })?;
    peripheral.base = base.ok_or(MalformedDescriptionError::MissingValue {
        element: "peripheral",
        tag: "baseAddress",
    })?;
    Ok(peripheral)
}

fn parse_interrupt(reader: &mut Reader<&[u8]>) -> Result<u32> {
    let mut buf = Vec::new();
    let mut value = None;
    loop {
        match reader.read_event_into(&mut buf).map_err(xml_error)? {
            Event::Start(e) => {
                if local_name(&e) == "value" {
                    value = Some(read_u32(reader, "value")?);
                } else {
                    skip(reader)?;
                }
            }
            Event::End(e) if e.local_name().as_ref() == b"interrupt" => break,
            Event::Eof => return Err(unexpected_eof("interrupt")),
            _ => {}
        }
        buf.clear();
    }
    value.ok_or(MalformedDescriptionError::MissingValue {
        element: "interrupt",
        tag: "value",
    })
}

fn parse_registers(reader: &mut Reader<&[u8]>) -> Result<Vec<RawRegister>> {
    let mut buf = Vec::new();
    let mut registers = Vec::new();
    loop {
        match reader.read_event_into(&mut buf).map_err(xml_error)? {
            Event::Start(e) => {
                let tag = local_name(&e);
                if tag == "register" {
                    registers.push(parse_register(reader)?);
                } else {
                    warn!("Skipping unsupported <{tag}> in <registers>");
                    skip(reader)?;
                }
            }
            Event::End(e) if e.local_name().as_ref() == b"registers" => break,
            Event::Eof => return Err(unexpected_eof("registers")),
            _ => {}
        }
        buf.clear();
    }
    Ok(registers)
}

fn parse_register(reader: &mut Reader<&[u8]>) -> Result<RawRegister> {
    let mut buf = Vec::new();
    let mut name = None;
    let mut offset = None;
    let mut register = RawRegister::default();
    loop {
        match reader.read_event_into(&mut buf).map_err(xml_error)? {
            Event::Start(e) => {
                let tag = local_name(&e);
                match tag.as_str() {
                    "name" => name = Some(read_text(reader)?),
                    "description" => register.description = non_empty(read_text(reader)?),
                    "addressOffset" => offset = Some(read_u64(reader, "addressOffset")?),
                    "size" => register.properties.size = Some(read_u32(reader, "size")?),
                    "access" => register.properties.access = Some(read_access(reader)?),
                    "fields" => register.fields = parse_fields(reader)?,
                    _ => skip(reader)?,
                }
            }
            Event::End(e) if e.local_name().as_ref() == b"register" => break,
            Event::Eof => return Err(unexpected_eof("register")),
            _ => {}
        }
        buf.clear();
    }
    register.name = name.ok_or(MalformedDescriptionError::MissingValue {
        element: "register",
        tag: "name",
    })?;
    register.offset = offset.ok_or(MalformedDescriptionError::MissingValue {
        element: "register",
        tag: "addressOffset",
    })?;
    Ok(register)
}

fn parse_fields(reader: &mut Reader<&[u8]>) -> Result<Vec<Field>> {
    let mut buf = Vec::new();
    let mut fields = Vec::new();
    loop {
        match reader.read_event_into(&mut buf).map_err(xml_error)? {
            Event::Start(e) => {
                if local_name(&e) == "field" {
                    fields.push(parse_field(reader)?);
                } else {
                    skip(reader)?;
                }
            }
            Event::End(e) if e.local_name().as_ref() == b"fields" => break,
            Event::Eof => return Err(unexpected_eof("fields")),
            _ => {}
        }
        buf.clear();
    }
    Ok(fields)
}

fn parse_field(reader: &mut Reader<&[u8]>) -> Result<Field> {
    let mut buf = Vec::new();
    let mut name = None;
    let mut description = None;
    let mut lsb = None;
    let mut msb = None;
    let mut bit_offset = None;
    let mut bit_width = None;
    loop {
        match reader.read_event_into(&mut buf).map_err(xml_error)? {
            Event::Start(e) => {
                let tag = local_name(&e);
                match tag.as_str() {
                    "name" => name = Some(read_text(reader)?),
                    "description" => description = non_empty(read_text(reader)?),
                    "lsb" => lsb = Some(read_u32(reader, "lsb")?),
                    "msb" => msb = Some(read_u32(reader, "msb")?),
                    "bitOffset" => bit_offset = Some(read_u32(reader, "bitOffset")?),
                    "bitWidth" => bit_width = Some(read_u32(reader, "bitWidth")?),
                    "bitRange" => {
                        let (m, l) = parse_bit_range(&read_text(reader)?)?;
                        msb = Some(m);
                        lsb = Some(l);
                    }
                    _ => skip(reader)?,
                }
            }
            Event::End(e) if e.local_name().as_ref() == b"field" => break,
            Event::Eof => return Err(unexpected_eof("field")),
            _ => {}
        }
        buf.clear();
    }

    let name = name.ok_or(MalformedDescriptionError::MissingValue {
        element: "field",
        tag: "name",
    })?;
    let (bit_offset, bit_width) = match (lsb, msb, bit_offset, bit_width) {
        (Some(lsb), Some(msb), _, _) => {
            if msb < lsb {
                return Err(MalformedDescriptionError::InvalidValue {
                    tag: "msb",
                    value: format!("{name}: msb {msb} below lsb {lsb}"),
                });
            }
            (lsb, msb - lsb + 1)
        }
        (_, _, Some(offset), Some(width)) => (offset, width),
        _ => {
            return Err(MalformedDescriptionError::MissingValue {
                element: "field",
                tag: "bitRange",
            })
        }
    };
    Ok(Field {
        name,
        bit_offset,
        bit_width,
        description,
    })
}

/// Parses `[msb:lsb]`.
fn parse_bit_range(range: &str) -> Result<(u32, u32)> {
    let invalid = || MalformedDescriptionError::InvalidValue {
        tag: "bitRange",
        value: range.to_string(),
    };
    let inner = range
        .trim()
        .strip_prefix('[')
        .and_then(|r| r.strip_suffix(']'))
        .ok_or_else(invalid)?;
    let (msb, lsb) = inner.split_once(':').ok_or_else(invalid)?;
    let msb = msb.trim().parse::<u32>().map_err(|_| invalid())?;
    let lsb = lsb.trim().parse::<u32>().map_err(|_| invalid())?;
    Ok((msb, lsb))
}

fn parse_vendor_extensions(
    reader: &mut Reader<&[u8]>,
    memory_regions: &mut Vec<MemoryRegion>,
) -> Result<()> {
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf).map_err(xml_error)? {
            Event::Start(e) => {
                if local_name(&e) == "memoryRegions" {
                    parse_memory_regions(reader, memory_regions)?;
                } else {
                    skip(reader)?;
                }
            }
            Event::End(e) if e.local_name().as_ref() == b"vendorExtensions" => break,
            Event::Eof => return Err(unexpected_eof("vendorExtensions")),
            _ => {}
        }
        buf.clear();
    }
    Ok(())
}

fn parse_memory_regions(
    reader: &mut Reader<&[u8]>,
    memory_regions: &mut Vec<MemoryRegion>,
) -> Result<()> {
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf).map_err(xml_error)? {
            Event::Start(e) => {
                if local_name(&e) == "memoryRegion" {
                    memory_regions.push(parse_memory_region(reader)?);
                } else {
                    skip(reader)?;
                }
            }
            Event::End(e) if e.local_name().as_ref() == b"memoryRegions" => break,
            Event::Eof => return Err(unexpected_eof("memoryRegions")),
            _ => {}
        }
        buf.clear();
    }
    Ok(())
}

fn parse_memory_region(reader: &mut Reader<&[u8]>) -> Result<MemoryRegion> {
    let mut buf = Vec::new();
    let mut name = None;
    let mut base = None;
    let mut size = None;
    loop {
        match reader.read_event_into(&mut buf).map_err(xml_error)? {
            Event::Start(e) => {
                let tag = local_name(&e);
                match tag.as_str() {
                    "name" => name = Some(read_text(reader)?.to_lowercase()),
                    "baseAddress" => base = Some(read_u64(reader, "baseAddress")?),
                    "size" => size = Some(read_u64(reader, "size")?),
                    _ => skip(reader)?,
                }
            }
            Event::End(e) if e.local_name().as_ref() == b"memoryRegion" => break,
            Event::Eof => return Err(unexpected_eof("memoryRegion")),
            _ => {}
        }
        buf.clear();
    }
    let missing = |tag| MalformedDescriptionError::MissingValue {
        element: "memoryRegion",
        tag,
    };
    Ok(MemoryRegion::new(
        name.ok_or_else(|| missing("name"))?,
        base.ok_or_else(|| missing("baseAddress"))?,
        size.ok_or_else(|| missing("size"))?,
    ))
}

fn resolve_peripheral(raw: RawPeripheral, device: Properties) -> Result<Peripheral> {
    let defaults = raw.properties.or(device);
    if raw.interrupts.len() > 1 {
        warn!(
            "Peripheral {} declares {} interrupts; using the first ({})",
            raw.name,
            raw.interrupts.len(),
            raw.interrupts[0]
        );
    }
    let registers = raw
        .registers
        .into_iter()
        .map(|r| {
            let properties = r.properties.or(defaults);
            let bits = properties
                .size
                .ok_or(MalformedDescriptionError::MissingValue {
                    element: "register",
                    tag: "size",
                })?;
            let width = RegisterWidth::try_from(bits).map_err(|_| {
                MalformedDescriptionError::UnsupportedWidth {
                    peripheral: raw.name.clone(),
                    register: r.name.clone(),
                    width: bits,
                }
            })?;
            Ok(Register {
                name: r.name,
                offset: r.offset,
                width,
                // SVD's implied default.
                access: properties.access.unwrap_or(Access::ReadWrite),
                fields: r.fields,
                description: r.description,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Peripheral {
        name: raw.name,
        base_address: raw.base,
        registers,
        irq: raw.interrupts.first().copied(),
        description: raw.description,
    })
}

//=============================================================================
// Reader helpers
//=============================================================================

fn local_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn attribute(e: &BytesStart, name: &str) -> Result<Option<String>> {
    let attr = e
        .try_get_attribute(name)
        .map_err(|err| MalformedDescriptionError::Syntax(err.to_string()))?;
    attr.map(|a| {
        a.unescape_value()
            .map(|v| v.into_owned())
            .map_err(xml_error)
    })
    .transpose()
}

/// Reads the text content of the element just opened, consuming its end tag.
fn read_text(reader: &mut Reader<&[u8]>) -> Result<String> {
    let mut buf = Vec::new();
    let mut text = String::new();
    loop {
        match reader.read_event_into(&mut buf).map_err(xml_error)? {
            Event::Text(t) => text.push_str(&t.unescape().map_err(xml_error)?),
            Event::CData(c) => text.push_str(&String::from_utf8_lossy(&c.into_inner())),
            Event::Start(_) => skip(reader)?,
            Event::End(_) => break,
            Event::Eof => return Err(unexpected_eof("text")),
            _ => {}
        }
        buf.clear();
    }
    Ok(text.trim().to_string())
}

/// Skips the rest of the element just opened, including nested elements.
fn skip(reader: &mut Reader<&[u8]>) -> Result<()> {
    let mut buf = Vec::new();
    let mut depth = 0usize;
    loop {
        match reader.read_event_into(&mut buf).map_err(xml_error)? {
            Event::Start(_) => depth += 1,
            Event::End(_) if depth == 0 => return Ok(()),
            Event::End(_) => depth -= 1,
            Event::Eof => return Err(unexpected_eof("element")),
            _ => {}
        }
        buf.clear();
    }
}

fn read_u64(reader: &mut Reader<&[u8]>, tag: &'static str) -> Result<u64> {
    let text = read_text(reader)?;
    parse_int(&text).ok_or(MalformedDescriptionError::InvalidValue { tag, value: text })
}

fn read_u32(reader: &mut Reader<&[u8]>, tag: &'static str) -> Result<u32> {
    let text = read_text(reader)?;
    parse_int(&text)
        .and_then(|v| u32::try_from(v).ok())
        .ok_or(MalformedDescriptionError::InvalidValue { tag, value: text })
}

fn read_access(reader: &mut Reader<&[u8]>) -> Result<Access> {
    let text = read_text(reader)?;
    Access::from_svd(&text).ok_or(MalformedDescriptionError::InvalidValue {
        tag: "access",
        value: text,
    })
}

fn non_empty(text: String) -> Option<String> {
    (!text.is_empty()).then_some(text)
}

fn xml_error(err: quick_xml::Error) -> MalformedDescriptionError {
    MalformedDescriptionError::Syntax(err.to_string())
}

fn unexpected_eof(element: &'static str) -> MalformedDescriptionError {
    MalformedDescriptionError::Syntax(format!("unexpected end of document inside <{element}>"))
}
