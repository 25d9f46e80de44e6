// Licensed under the Apache-2.0 license

//! Entry point for the `build.rs` of a generated PAC crate.

use crate::config::FilterConfig;
use crate::error::{ArtifactWriteError, PacResult};
use crate::output::{generate_sources, write_sources};
use crate::pipeline::{load_inputs, REGIONS_FILE};
use crate::target::CpuTarget;
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

/// Regenerates `crate_dir/regions.ld`, `crate_dir/src/lib.rs` and
/// `crate_dir/src/soc/` from the register description and the upstream
/// memory map, or the description's own regions when `regions` is `None`.
///
/// Returns the path of the fresh `regions.ld`. Given the same inputs this
/// writes exactly what
/// [`PacBuilder::generate`](crate::pipeline::PacBuilder::generate) wrote.
pub fn regenerate(
    description: &Path,
    regions: Option<&Path>,
    cpu_type: &str,
    exclude: &[&str],
    crate_dir: &Path,
) -> PacResult<PathBuf> {
    let target: CpuTarget = cpu_type.parse()?;
    let filter = exclude
        .iter()
        .fold(FilterConfig::new(), |filter, name| filter.exclude_name(name));

    let (peripherals, memory) = load_inputs(description, regions, target, &filter)?;
    let files = generate_sources(&peripherals, &memory);

    let fragment = crate_dir.join(REGIONS_FILE);
    fs::write(&fragment, memory.linker_fragment()).map_err(ArtifactWriteError::at(&fragment))?;
    let src_dir = crate_dir.join("src");
    fs::create_dir_all(&src_dir).map_err(ArtifactWriteError::at(&src_dir))?;
    write_sources(&src_dir, &files)?;
    info!(
        "Regenerated {} peripherals and {} memory regions from {} into {}",
        peripherals.len(),
        memory.regions().len(),
        description.display(),
        crate_dir.display()
    );
    Ok(fragment)
}
