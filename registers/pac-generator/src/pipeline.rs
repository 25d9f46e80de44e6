// Licensed under the Apache-2.0 license

//! Pipeline orchestration: from a register description to a PAC crate on
//! disk.
//!
//! ```text
//! parse target ─► load + validate ─► render (in memory) ─► create dirs
//!     ─► init skeleton + merge manifest (no Cargo.toml yet) ─► build.rs
//!     ─► regions.ld ─► src/
//! ```
//!
//! Every check happens before the first write, so a bad CPU type or a
//! malformed description leaves the output directory untouched.

use crate::config::FilterConfig;
use crate::error::{ArtifactWriteError, PacError, PacResult};
use crate::manifest::{BuildHook, GeneratorDependency, ManifestFragment};
use crate::model::{Description, PeripheralMap};
use crate::output::{generate_sources, write_sources, GeneratedFile, SOC_DIR};
use crate::regions::MemoryMap;
use crate::target::CpuTarget;
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Default name of the generated crate.
pub const DEFAULT_CRATE_NAME: &str = "litex-pac";

/// Name of the linker fragment inside the crate directory.
pub const REGIONS_FILE: &str = "regions.ld";

/// Creates an empty library crate (at least a `Cargo.toml`) in a directory.
pub trait SkeletonInit {
    fn init(&self, dir: &Path, crate_name: &str) -> PacResult<()>;
}

/// Runs `cargo init --lib --vcs none`.
#[derive(Clone, Debug)]
pub struct CargoInit {
    pub cargo: PathBuf,
}

impl Default for CargoInit {
    /// Uses `$CARGO` when run from a cargo command, `cargo` otherwise.
    fn default() -> Self {
        let cargo = std::env::var_os("CARGO").map_or_else(|| PathBuf::from("cargo"), PathBuf::from);
        Self { cargo }
    }
}

impl SkeletonInit for CargoInit {
    fn init(&self, dir: &Path, crate_name: &str) -> PacResult<()> {
        let mut cmd = Command::new(&self.cargo);
        cmd.args(["init", "--lib", "--vcs", "none", "--name", crate_name])
            .arg(dir);
        let command = format!("{cmd:?}");
        debug!("Running {command}");
        let status = cmd.status().map_err(|source| PacError::SkeletonSpawn {
            command: command.clone(),
            source,
        })?;
        if !status.success() {
            return Err(PacError::SkeletonInit { command, status });
        }
        Ok(())
    }
}

/// The complete output of one generation, before anything is written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratedArtifactSet {
    /// The validated peripherals the sources were generated from.
    pub peripherals: PeripheralMap,
    /// The validated memory regions, as written to `regions.ld`.
    pub memory: MemoryMap,
    /// `src/lib.rs`, `src/soc/mod.rs` and one module per peripheral.
    pub sources: Vec<GeneratedFile>,
    /// Contents of `regions.ld`.
    pub linker_fragment: String,
    /// Dependencies merged into `Cargo.toml` on the first run.
    pub manifest: ManifestFragment,
    /// Contents of `build.rs`.
    pub build_rs: String,
}

/// What [`PacBuilder::generate`] did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenerationReport {
    pub crate_dir: PathBuf,
    /// The skeleton was created (and the manifest fragment merged) by this run.
    pub skeleton_initialized: bool,
    pub peripherals: usize,
    pub regions: usize,
    /// Every file written, in write order.
    pub written: Vec<PathBuf>,
}

/// Generates a PAC crate at `<rust_dir>/<crate_name>`.
///
/// # Example
///
/// ```no_run
/// use litex_pac_generator::pipeline::PacBuilder;
///
/// let report = PacBuilder::new("build/software/rust", "build/csr.svd")
///     .memory_map("build/software/include/generated/regions.ld")
///     .generate("vexriscv")?;
/// println!("wrote {} files", report.written.len());
/// # Ok::<(), litex_pac_generator::error::PacError>(())
/// ```
pub struct PacBuilder {
    rust_dir: PathBuf,
    description: PathBuf,
    memory_map: Option<PathBuf>,
    crate_name: String,
    filter: FilterConfig,
    generator: GeneratorDependency,
    skeleton: Box<dyn SkeletonInit>,
}

impl PacBuilder {
    /// Reads `description` (SVD, or JSON by extension) and writes the crate
    /// under `rust_dir`. Memory regions come from the description unless
    /// [`memory_map`](Self::memory_map) is set.
    pub fn new(rust_dir: impl Into<PathBuf>, description: impl Into<PathBuf>) -> Self {
        Self {
            rust_dir: rust_dir.into(),
            description: description.into(),
            memory_map: None,
            crate_name: DEFAULT_CRATE_NAME.to_string(),
            filter: FilterConfig::with_defaults(),
            generator: GeneratorDependency::default(),
            skeleton: Box::new(CargoInit::default()),
        }
    }

    /// Reads memory regions from a `regions.ld` file instead.
    pub fn memory_map(mut self, path: impl Into<PathBuf>) -> Self {
        self.memory_map = Some(path.into());
        self
    }

    pub fn crate_name(mut self, name: impl Into<String>) -> Self {
        self.crate_name = name.into();
        self
    }

    pub fn filter(mut self, filter: FilterConfig) -> Self {
        self.filter = filter;
        self
    }

    pub fn generator_dependency(mut self, generator: GeneratorDependency) -> Self {
        self.generator = generator;
        self
    }

    pub fn skeleton(mut self, skeleton: impl SkeletonInit + 'static) -> Self {
        self.skeleton = Box::new(skeleton);
        self
    }

    pub fn crate_dir(&self) -> PathBuf {
        self.rust_dir.join(&self.crate_name)
    }

    /// Validates the inputs and renders every artifact without touching the
    /// filesystem.
    pub fn render(&self, cpu_type: &str) -> PacResult<GeneratedArtifactSet> {
        let target: CpuTarget = cpu_type.parse()?;
        info!("Generating PAC for {target} from {}", self.description.display());

        let (peripherals, memory) = load_inputs(
            &self.description,
            self.memory_map.as_deref(),
            target,
            &self.filter,
        )?;
        debug!(
            "{} peripherals, {} memory regions",
            peripherals.len(),
            memory.regions().len()
        );

        let hook = BuildHook {
            description: absolute(&self.description)?,
            regions: self.memory_map.as_deref().map(absolute).transpose()?,
            target,
            exclude: self.filter.exclude_names.clone(),
        };
        Ok(GeneratedArtifactSet {
            sources: generate_sources(&peripherals, &memory),
            linker_fragment: memory.linker_fragment(),
            manifest: ManifestFragment::new(target, &self.generator),
            build_rs: hook.build_rs(),
            peripherals,
            memory,
        })
    }

    /// Runs the whole pipeline.
    pub fn generate(&self, cpu_type: &str) -> PacResult<GenerationReport> {
        let artifacts = self.render(cpu_type)?;
        let crate_dir = self.crate_dir();
        let mut written = Vec::new();

        fs::create_dir_all(&crate_dir).map_err(ArtifactWriteError::at(&crate_dir))?;
        let manifest_path = crate_dir.join("Cargo.toml");
        let skeleton_initialized = !manifest_path.exists();
        if skeleton_initialized {
            info!("Initializing crate skeleton in {}", crate_dir.display());
            self.skeleton.init(&crate_dir, &self.crate_name)?;
            let current = fs::read_to_string(&manifest_path).map_err(|source| {
                PacError::ReadInput {
                    path: manifest_path.clone(),
                    source,
                }
            })?;
            let merged = artifacts.manifest.merge_into(&manifest_path, &current)?;
            write_file(&manifest_path, &merged)?;
            written.push(manifest_path);
        }

        let build_rs = crate_dir.join("build.rs");
        write_file(&build_rs, &artifacts.build_rs)?;
        written.push(build_rs);

        let regions = crate_dir.join(REGIONS_FILE);
        write_file(&regions, &artifacts.linker_fragment)?;
        written.push(regions);

        let src_dir = crate_dir.join("src");
        fs::create_dir_all(&src_dir).map_err(ArtifactWriteError::at(&src_dir))?;
        write_sources(&src_dir, &artifacts.sources)?;
        written.extend(artifacts.sources.iter().map(|f| src_dir.join(&f.path)));

        let peripherals = artifacts.peripherals.len();
        let regions = artifacts.memory.regions().len();
        info!(
            "Wrote {} files ({peripherals} peripherals, {regions} regions) to {}",
            written.len(),
            crate_dir.display()
        );
        Ok(GenerationReport {
            crate_dir,
            skeleton_initialized,
            peripherals,
            regions,
            written,
        })
    }

    /// Lists the artifacts on disk that differ from what [`generate`](Self::generate)
    /// would write, including peripheral modules that would be removed.
    pub fn stale_files(&self, cpu_type: &str) -> PacResult<Vec<PathBuf>> {
        let artifacts = self.render(cpu_type)?;
        let crate_dir = self.crate_dir();
        let src_dir = crate_dir.join("src");

        let mut expected = vec![
            (crate_dir.join("build.rs"), artifacts.build_rs.as_str()),
            (crate_dir.join(REGIONS_FILE), artifacts.linker_fragment.as_str()),
        ];
        expected.extend(
            artifacts
                .sources
                .iter()
                .map(|f| (src_dir.join(&f.path), f.contents.as_str())),
        );

        let mut stale: Vec<PathBuf> = expected
            .iter()
            .filter(|(path, contents)| {
                fs::read_to_string(path).map_or(true, |current| current != *contents)
            })
            .map(|(path, _)| path.clone())
            .collect();

        if let Ok(entries) = fs::read_dir(src_dir.join(SOC_DIR)) {
            for entry in entries.flatten() {
                let path = entry.path();
                if !expected.iter().any(|(p, _)| *p == path) {
                    stale.push(path);
                }
            }
        }
        stale.sort();
        Ok(stale)
    }
}

/// Reads and validates the description and the memory map: `regions` when
/// given, the description's own regions otherwise.
pub(crate) fn load_inputs(
    description: &Path,
    regions: Option<&Path>,
    target: CpuTarget,
    filter: &FilterConfig,
) -> PacResult<(PeripheralMap, MemoryMap)> {
    let description = Description::load(description)?;
    let peripherals = description.resolve(target, filter)?;
    let memory = match regions {
        Some(path) => MemoryMap::load(path, target)?,
        None => MemoryMap::new(description.memory_regions, target)?,
    };
    Ok((peripherals, memory))
}

fn write_file(path: &Path, contents: &str) -> Result<(), ArtifactWriteError> {
    debug!("Writing {}", path.display());
    fs::write(path, contents).map_err(ArtifactWriteError::at(path))
}

fn absolute(path: &Path) -> PacResult<PathBuf> {
    std::path::absolute(path).map_err(|source| PacError::ReadInput {
        path: path.to_path_buf(),
        source,
    })
}
