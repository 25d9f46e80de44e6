// Licensed under the Apache-2.0 license

//! The PAC crate's `Cargo.toml` additions and its `build.rs`.

use crate::error::{PacError, PacResult};
use crate::output::GENERATED_HEADER;
use crate::target::{CpuTarget, REGISTER_CRATE};
use quote::quote;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Package name of this generator, as the PAC's build script depends on it.
pub const GENERATOR_CRATE: &str = "litex-pac-generator";

/// How the generated build script finds this generator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GeneratorDependency {
    /// A local checkout.
    Path(PathBuf),
    /// A registry version requirement.
    Version(String),
}

impl Default for GeneratorDependency {
    /// The checkout this generator was built from.
    fn default() -> Self {
        GeneratorDependency::Path(PathBuf::from(env!("CARGO_MANIFEST_DIR")))
    }
}

/// A dependency entry in a manifest.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Dependency {
    Version(String),
    Path { path: PathBuf },
}

impl Dependency {
    fn to_value(&self) -> toml::Value {
        match self {
            Dependency::Version(version) => toml::Value::String(version.clone()),
            Dependency::Path { path } => {
                let mut table = toml::Table::new();
                table.insert(
                    "path".to_string(),
                    toml::Value::String(path.display().to_string()),
                );
                toml::Value::Table(table)
            }
        }
    }
}

/// The dependency tables every generated PAC needs for a target.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ManifestFragment {
    pub dependencies: BTreeMap<String, Dependency>,
    pub build_dependencies: BTreeMap<String, Dependency>,
}

impl ManifestFragment {
    pub fn new(target: CpuTarget, generator: &GeneratorDependency) -> Self {
        let dependencies = [target.runtime_crate(), target.arch_crate(), REGISTER_CRATE]
            .into_iter()
            .map(|c| (c.name.to_string(), Dependency::Version(c.version.to_string())))
            .collect();
        let generator = match generator {
            GeneratorDependency::Path(path) => Dependency::Path { path: path.clone() },
            GeneratorDependency::Version(version) => Dependency::Version(version.clone()),
        };
        Self {
            dependencies,
            build_dependencies: BTreeMap::from([(GENERATOR_CRATE.to_string(), generator)]),
        }
    }

    /// Adds the fragment to the manifest text `manifest` read from `path`.
    ///
    /// Entries the manifest already declares are left alone. Other tables
    /// keep their order.
    pub fn merge_into(&self, path: &Path, manifest: &str) -> PacResult<String> {
        let invalid = |message: String| PacError::InvalidManifest {
            path: path.to_path_buf(),
            message,
        };
        let mut document: toml::Table = manifest
            .parse()
            .map_err(|e: toml::de::Error| invalid(e.message().to_string()))?;

        for (section, dependencies) in [
            ("dependencies", &self.dependencies),
            ("build-dependencies", &self.build_dependencies),
        ] {
            let table = document
                .entry(section)
                .or_insert(toml::Value::Table(toml::Table::new()))
                .as_table_mut()
                .ok_or_else(|| invalid(format!("`{section}` is not a table")))?;
            for (name, dependency) in dependencies {
                if !table.contains_key(name) {
                    table.insert(name.clone(), dependency.to_value());
                }
            }
        }
        toml::to_string(&document).map_err(|e| invalid(e.to_string()))
    }
}

impl fmt::Display for ManifestFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&toml::to_string(self).map_err(|_| fmt::Error)?)
    }
}

/// The inputs a generated `build.rs` regenerates from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildHook {
    pub description: PathBuf,
    /// The upstream memory map (a LiteX `regions.ld`); `None` takes the
    /// regions from the description.
    pub regions: Option<PathBuf>,
    pub target: CpuTarget,
    pub exclude: Vec<String>,
}

impl BuildHook {
    /// Renders `build.rs`.
    pub fn build_rs(&self) -> String {
        let description = self.description.display().to_string();
        let regions = match &self.regions {
            Some(path) => {
                let path = path.display().to_string();
                quote! { Some(#path) }
            }
            None => quote! { None },
        };
        let cpu_type = self.target.name();
        let exclude = &self.exclude;
        let file: syn::File = syn::parse_quote! {
            use std::path::{Path, PathBuf};
            use std::{env, fs};

            const DESCRIPTION_FILE: &str = #description;
            const REGIONS_FILE: Option<&str> = #regions;
            const CPU_TYPE: &str = #cpu_type;
            const EXCLUDE: &[&str] = &[#(#exclude),*];

            fn main() -> Result<(), Box<dyn std::error::Error>> {
                let out_dir = PathBuf::from(env::var("OUT_DIR")?);
                let crate_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR")?);
                let fragment = litex_pac_generator::hook::regenerate(
                    DESCRIPTION_FILE.as_ref(),
                    REGIONS_FILE.map(Path::new),
                    CPU_TYPE,
                    EXCLUDE,
                    &crate_dir,
                )?;
                fs::copy(fragment, out_dir.join("regions.ld"))?;

                println!("cargo:rustc-link-search={}", out_dir.display());
                println!("cargo:rerun-if-changed={}", DESCRIPTION_FILE);
                if let Some(regions) = REGIONS_FILE {
                    println!("cargo:rerun-if-changed={}", regions);
                }
                println!("cargo:rerun-if-changed=build.rs");
                println!("cargo:rerun-if-env-changed=FORCE");
                Ok(())
            }
        };
        format!("{GENERATED_HEADER}\n\n{}", prettyplease::unparse(&file))
    }
}
