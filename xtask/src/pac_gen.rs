// Licensed under the Apache-2.0 license

//! Generate a LiteX PAC crate, or check that the one on disk is current.

use anyhow::{bail, Result};
use clap::Args;
use litex_pac_generator::pipeline::DEFAULT_CRATE_NAME;
use litex_pac_generator::{
    CpuTarget, Description, FilterConfig, GeneratorDependency, MemoryMap, PacBuilder,
};
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct PacArgs {
    /// Register description written by the SoC build (csr.svd, or .json)
    #[arg(long, value_name = "FILE", default_value = "hw/feather.svd")]
    description: PathBuf,

    /// Linker regions file; defaults to the regions in the description
    #[arg(long, value_name = "FILE")]
    regions: Option<PathBuf>,

    /// Directory the crate directory is created in
    #[arg(
        long,
        env = "LITEX_PAC_OUTPUT_DIR",
        value_name = "DIR",
        default_value = "target/rust"
    )]
    output_dir: PathBuf,

    #[arg(long, default_value = DEFAULT_CRATE_NAME)]
    crate_name: String,

    #[arg(long, env = "LITEX_CPU_TYPE", default_value = "vexriscv")]
    cpu_type: String,

    /// Additional peripherals or registers to skip
    #[arg(long, value_name = "NAME")]
    exclude: Vec<String>,

    /// Depend on this released generator version instead of this checkout
    #[arg(long, value_name = "VERSION")]
    generator_version: Option<String>,
}

impl PacArgs {
    fn builder(&self) -> PacBuilder {
        let filter = self
            .exclude
            .iter()
            .fold(FilterConfig::with_defaults(), |filter, name| {
                filter.exclude_name(name)
            });
        let mut builder = PacBuilder::new(&self.output_dir, &self.description)
            .crate_name(&self.crate_name)
            .filter(filter);
        if let Some(regions) = &self.regions {
            builder = builder.memory_map(regions);
        }
        if let Some(version) = &self.generator_version {
            builder = builder.generator_dependency(GeneratorDependency::Version(version.clone()));
        }
        builder
    }
}

/// Writes the crate.
pub fn generate(args: &PacArgs) -> Result<()> {
    let builder = args.builder();
    println!(
        "Generating {} from {} (cpu: {})",
        builder.crate_dir().display(),
        args.description.display(),
        args.cpu_type
    );

    let report = builder.generate(&args.cpu_type)?;
    if report.skeleton_initialized {
        println!("  ✓ Initialized crate skeleton");
    }
    for path in &report.written {
        println!("  ✓ Generated {}", path.display());
    }

    println!("\n=== Generation Summary ===");
    println!("Peripherals: {}", report.peripherals);
    println!("Memory regions: {}", report.regions);
    Ok(())
}

/// Fails if any generated file on disk differs from what [`generate`] would
/// write.
pub fn check(args: &PacArgs) -> Result<()> {
    let builder = args.builder();
    let stale = builder.stale_files(&args.cpu_type)?;
    if stale.is_empty() {
        println!("  ✓ {} is up to date", builder.crate_dir().display());
        return Ok(());
    }

    println!("\nStale files ({}):", stale.len());
    for path in &stale {
        println!("  ✗ {}", path.display());
    }
    bail!("PAC crate is out of date; run `cargo xtask pac`");
}

/// Prints the linker fragment the crate would get.
pub fn regions(description: &Path, regions: Option<&Path>, cpu_type: &str) -> Result<()> {
    let target: CpuTarget = cpu_type.parse()?;
    let memory = match regions {
        Some(path) => MemoryMap::load(path, target)?,
        None => MemoryMap::new(Description::load(description)?.memory_regions, target)?,
    };
    print!("{}", memory.linker_fragment());
    Ok(())
}
