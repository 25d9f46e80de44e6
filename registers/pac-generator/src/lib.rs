// Licensed under the Apache-2.0 license

//! LiteX SoC register description to tock-registers PAC generator.
//!
//! This crate turns the register description a LiteX SoC build writes
//! (`csr.svd`, or a JSON rendition of [`Description`]) into a `no_std`
//! peripheral access crate: one tock-registers module per peripheral, a
//! `regions.ld` linker fragment, the crate's dependencies and a `build.rs`
//! that regenerates everything when the hardware description changes.
//!
//! ## Usage
//!
//! ```no_run
//! use litex_pac_generator::{FilterConfig, PacBuilder};
//!
//! let report = PacBuilder::new("build/software/rust", "build/csr.svd")
//!     .memory_map("build/software/include/generated/regions.ld")
//!     .filter(FilterConfig::with_defaults().exclude_name("ddrphy"))
//!     .generate("vexriscv")
//!     .unwrap();
//! assert!(report.peripherals > 0);
//! ```
//!
//! ## Module Organization
//!
//! - [`model`]: Register description model and validation ([`PeripheralMap`])
//! - [`regions`]: Memory regions and the linker fragment ([`MemoryMap`])
//! - [`output`]: Generated peripheral modules and the crate root
//! - [`manifest`]: `Cargo.toml` fragment and `build.rs`
//! - [`pipeline`]: Orchestration ([`PacBuilder`])
//! - [`hook`]: Entry point for the generated `build.rs`
//! - [`target`]: Supported CPU types
//! - [`config`]: Peripheral/register filtering ([`FilterConfig`])
//! - [`util`]: Name conversion utilities (snake_case, camel_case, hex formatting)

pub mod config;
pub mod error;
pub mod hook;
pub mod manifest;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod regions;
pub mod target;
pub mod util;

mod svd;

// Re-export main public API
pub use config::FilterConfig;
pub use error::{
    ArtifactWriteError, MalformedDescriptionError, PacError, PacResult, UnsupportedTargetError,
};
pub use manifest::{BuildHook, GeneratorDependency, ManifestFragment};
pub use model::{
    Access, Description, Field, MemoryRegion, Peripheral, PeripheralMap, RegionAttributes,
    Register, RegisterWidth,
};
pub use output::{GeneratedField, GeneratedFile, GeneratedPeripheral, GeneratedRegister};
pub use pipeline::{
    CargoInit, GeneratedArtifactSet, GenerationReport, PacBuilder, SkeletonInit,
};
pub use regions::MemoryMap;
pub use target::CpuTarget;
