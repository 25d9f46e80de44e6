// Licensed under the Apache-2.0 license

use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

/// The register description or memory map violates an invariant.
///
/// Raised before anything is written; every variant names the peripheral,
/// register, field or region at fault.
#[derive(Error, Debug)]
pub enum MalformedDescriptionError {
    #[error("description could not be parsed: {0}")]
    Syntax(String),

    #[error("{element} is missing required <{tag}>")]
    MissingValue { element: &'static str, tag: &'static str },

    #[error("invalid value `{value}` for <{tag}>")]
    InvalidValue { tag: &'static str, value: String },

    #[error("peripheral `{derived}` is derived from undeclared peripheral `{base}`")]
    MissingBasePeripheral { derived: String, base: String },

    #[error("duplicate peripheral `{name}`")]
    DuplicatePeripheral { name: String },

    #[error("peripheral `{name}` clashes with a module every PAC declares")]
    ReservedPeripheralName { name: String },

    #[error("peripheral `{peripheral}` base 0x{base:x} is not aligned to {align} bytes")]
    MisalignedBase {
        peripheral: String,
        base: u64,
        align: u64,
    },

    #[error("peripherals `{first}` and `{second}` have overlapping register windows")]
    OverlappingPeripherals { first: String, second: String },

    #[error("duplicate register `{peripheral}.{register}`")]
    DuplicateRegister {
        peripheral: String,
        register: String,
    },

    #[error("register `{peripheral}.{register}` has unsupported width {width}")]
    UnsupportedWidth {
        peripheral: String,
        register: String,
        width: u32,
    },

    #[error("register `{peripheral}.{register}` is {width} bits wide but the target bus is {bus} bits")]
    WidthExceedsTarget {
        peripheral: String,
        register: String,
        width: u32,
        bus: u32,
    },

    #[error("register `{peripheral}.{register}` offset 0x{offset:x} is not aligned to its {align}-byte width")]
    MisalignedRegister {
        peripheral: String,
        register: String,
        offset: u64,
        align: u64,
    },

    #[error("registers `{peripheral}.{first}` and `{peripheral}.{second}` overlap")]
    OverlappingRegisters {
        peripheral: String,
        first: String,
        second: String,
    },

    #[error("register `{peripheral}.{register}` at 0x{address:x} lies outside the target address space")]
    AddressOutOfRange {
        peripheral: String,
        register: String,
        address: u64,
    },

    #[error("field `{peripheral}.{register}.{field}` (bits {offset}+{width}) does not fit in {register_width} bits")]
    FieldOutOfRange {
        peripheral: String,
        register: String,
        field: String,
        offset: u32,
        width: u32,
        register_width: u32,
    },

    #[error("duplicate field `{peripheral}.{register}.{field}`")]
    DuplicateField {
        peripheral: String,
        register: String,
        field: String,
    },

    #[error("fields `{first}` and `{second}` of register `{peripheral}.{register}` overlap")]
    OverlappingFields {
        peripheral: String,
        register: String,
        first: String,
        second: String,
    },

    #[error("duplicate memory region `{name}`")]
    DuplicateRegion { name: String },

    #[error("memory regions `{first}` and `{second}` overlap")]
    OverlappingRegions { first: String, second: String },

    #[error("memory region `{name}` lies outside the target address space")]
    RegionOutOfRange { name: String },
}

/// The requested CPU type has no register-access convention.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unsupported CPU type `{cpu_type}` (supported: {supported})")]
pub struct UnsupportedTargetError {
    pub cpu_type: String,
    pub supported: String,
}

/// Creating a directory or writing an artifact failed.
#[derive(Error, Debug)]
#[error("failed to write {}: {source}", .path.display())]
pub struct ArtifactWriteError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

impl ArtifactWriteError {
    /// Returns a closure that wraps an I/O error with `path`, for `map_err`.
    pub fn at(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| Self { path, source }
    }
}

/// Top-level error of the generator.
#[derive(Error, Debug)]
pub enum PacError {
    #[error(transparent)]
    MalformedDescription(#[from] MalformedDescriptionError),

    #[error(transparent)]
    UnsupportedTarget(#[from] UnsupportedTargetError),

    #[error(transparent)]
    ArtifactWrite(#[from] ArtifactWriteError),

    #[error("failed to read {}: {source}", .path.display())]
    ReadInput {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to run project initializer `{command}`: {source}")]
    SkeletonSpawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("project initializer `{command}` failed: {status}")]
    SkeletonInit { command: String, status: ExitStatus },

    #[error("existing manifest {} is not valid TOML: {message}", .path.display())]
    InvalidManifest { path: PathBuf, message: String },
}

pub type PacResult<T> = Result<T, PacError>;
