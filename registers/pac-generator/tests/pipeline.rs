// Licensed under the Apache-2.0 license

use litex_pac_generator::{
    hook, MalformedDescriptionError, PacBuilder, PacError, PacResult, SkeletonInit,
};
use log::LevelFilter;
use simple_logger::SimpleLogger;
use std::cell::Cell;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tempfile::TempDir;

const FEATHER_SVD: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../hw/feather.svd");
const FEATHER_REGIONS: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../hw/regions.ld");

const UART_JSON: &str = r#"{
    "peripherals": [
        {
            "name": "uart",
            "base_address": 2181038080,
            "irq": 2,
            "registers": [
                { "name": "rxtx", "offset": 0, "width": 8, "access": "read-write" },
                {
                    "name": "status",
                    "offset": 4,
                    "width": 8,
                    "access": "read-only",
                    "fields": [ { "name": "ready", "bit_offset": 0, "bit_width": 1 } ]
                }
            ]
        }
    ],
    "memory_regions": [
        { "name": "rom", "origin": 0, "length": 40960 },
        { "name": "main_ram", "origin": 1073741824, "length": 0 }
    ]
}"#;

/// Writes what `cargo init --lib` would, and counts how often it ran.
#[derive(Clone, Default)]
struct FakeSkeleton {
    runs: Rc<Cell<u32>>,
}

impl SkeletonInit for FakeSkeleton {
    fn init(&self, dir: &Path, crate_name: &str) -> PacResult<()> {
        self.runs.set(self.runs.get() + 1);
        fs::create_dir_all(dir.join("src")).unwrap();
        fs::write(
            dir.join("Cargo.toml"),
            format!(
                "[package]\nname = \"{crate_name}\"\nversion = \"0.1.0\"\nedition = \"2021\"\n\n[dependencies]\n"
            ),
        )
        .unwrap();
        fs::write(dir.join("src/lib.rs"), "pub fn add() {}\n").unwrap();
        Ok(())
    }
}

/// Leaves a directory where `build.rs` goes, so the first artifact write fails.
#[derive(Clone, Default)]
struct BlockedBuildRs(FakeSkeleton);

impl SkeletonInit for BlockedBuildRs {
    fn init(&self, dir: &Path, crate_name: &str) -> PacResult<()> {
        self.0.init(dir, crate_name)?;
        fs::create_dir(dir.join("build.rs")).unwrap();
        Ok(())
    }
}

struct BrokenSkeleton;

impl SkeletonInit for BrokenSkeleton {
    fn init(&self, _dir: &Path, _crate_name: &str) -> PacResult<()> {
        Err(PacError::SkeletonSpawn {
            command: "cargo init".to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "cargo not found"),
        })
    }
}

fn setup() -> (TempDir, FakeSkeleton) {
    let _ = SimpleLogger::new().with_level(LevelFilter::Info).init();
    (TempDir::new().unwrap(), FakeSkeleton::default())
}

fn feather(rust_dir: &Path, skeleton: &FakeSkeleton) -> PacBuilder {
    PacBuilder::new(rust_dir, FEATHER_SVD)
        .memory_map(FEATHER_REGIONS)
        .skeleton(skeleton.clone())
}

/// Every file under `dir`, keyed by its path relative to `dir`.
fn snapshot(dir: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    fn walk(root: &Path, dir: &Path, files: &mut BTreeMap<PathBuf, Vec<u8>>) {
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(root, &path, files);
            } else {
                let relative = path.strip_prefix(root).unwrap().to_path_buf();
                files.insert(relative, fs::read(&path).unwrap());
            }
        }
    }
    let mut files = BTreeMap::new();
    walk(dir, dir, &mut files);
    files
}

fn read(path: impl AsRef<Path>) -> String {
    fs::read_to_string(path).unwrap()
}

#[test]
fn test_generates_feather_pac() {
    let (dir, skeleton) = setup();
    let report = feather(dir.path(), &skeleton).generate("vexriscv").unwrap();

    let crate_dir = dir.path().join("litex-pac");
    assert_eq!(report.crate_dir, crate_dir);
    assert!(report.skeleton_initialized);
    assert_eq!(report.peripherals, 6);
    assert_eq!(report.regions, 4);
    assert_eq!(skeleton.runs.get(), 1);
    assert_eq!(report.written[0], crate_dir.join("Cargo.toml"));
    assert_eq!(report.written[1], crate_dir.join("build.rs"));

    for module in ["ctrl", "i2c", "leds", "spi", "timer0", "uart"] {
        assert!(crate_dir.join(format!("src/soc/{module}.rs")).is_file());
    }
    assert!(!crate_dir.join("src/soc/identifier_mem.rs").exists());

    let lib = read(crate_dir.join("src/lib.rs"));
    assert!(lib.contains("#![no_std]"));
    assert!(!lib.contains("pub fn add"));

    let soc = read(crate_dir.join("src/soc/mod.rs"));
    assert!(soc.contains("pub mod uart;"));
    assert!(!soc.contains("identifier_mem"));
    assert!(soc.contains("    pub const TIMER0: u32 = 1;\n    pub const UART: u32 = 2;\n"));
    assert!(soc.contains("pub const MAIN_RAM_ORIGIN: usize = 0x4000_0000;"));

    let uart = read(crate_dir.join("src/soc/uart.rs"));
    assert!(uart.contains("pub const UART_ADDR: usize = 0x8200_3000;"));
    assert!(uart.contains("pub const UART_IRQ: u32 = 2;"));

    let regions = read(crate_dir.join("regions.ld"));
    assert!(regions.contains("\trom : ORIGIN = 0x00000000, LENGTH = 0xA000"));
    assert!(regions.contains("\tmain_ram : ORIGIN = 0x40000000, LENGTH = 0x4000"));
    assert!(!regions.contains("uart"));

    let build_rs = read(crate_dir.join("build.rs"));
    assert!(build_rs.contains(r#"const CPU_TYPE: &str = "vexriscv";"#));
    assert!(build_rs.contains(r#"const EXCLUDE: &[&str] = &["identifier_mem"];"#));

    let manifest: toml::Table = read(crate_dir.join("Cargo.toml")).parse().unwrap();
    assert_eq!(manifest["package"]["name"].as_str(), Some("litex-pac"));
    assert_eq!(manifest["dependencies"]["riscv-rt"].as_str(), Some("0.8.0"));
    assert_eq!(manifest["dependencies"]["riscv"].as_str(), Some("0.6.0"));
    assert_eq!(manifest["dependencies"]["tock-registers"].as_str(), Some("0.9.0"));
    assert!(manifest["build-dependencies"]
        .as_table()
        .unwrap()
        .contains_key("litex-pac-generator"));
}

#[test]
fn test_second_run_is_byte_identical() {
    let (dir, skeleton) = setup();
    let builder = feather(dir.path(), &skeleton);
    builder.generate("vexriscv").unwrap();
    let first = snapshot(dir.path());

    let report = builder.generate("vexriscv").unwrap();
    assert!(!report.skeleton_initialized);
    assert_eq!(skeleton.runs.get(), 1);
    assert!(!report.written.contains(&report.crate_dir.join("Cargo.toml")));
    assert_eq!(snapshot(dir.path()), first);
}

#[test]
fn test_manifest_is_merged_on_first_run_only() {
    let (dir, skeleton) = setup();
    let builder = feather(dir.path(), &skeleton);
    builder.generate("vexriscv").unwrap();

    let manifest = builder.crate_dir().join("Cargo.toml");
    let edited = "[package]\nname = \"litex-pac\"\nversion = \"0.2.0\"\nedition = \"2021\"\n";
    fs::write(&manifest, edited).unwrap();

    builder.generate("vexriscv").unwrap();
    assert_eq!(read(&manifest), edited);
}

#[test]
fn test_unsupported_target_writes_nothing() {
    let (dir, skeleton) = setup();
    let builder = feather(dir.path(), &skeleton);

    let err = builder.generate("picorv32").unwrap_err();
    assert!(matches!(err, PacError::UnsupportedTarget(_)));
    assert!(err.to_string().contains("picorv32"));
    assert!(!builder.crate_dir().exists());
    assert_eq!(skeleton.runs.get(), 0);
}

#[test]
fn test_malformed_description_writes_nothing() {
    let (dir, skeleton) = setup();
    let description = dir.path().join("overlap.json");
    fs::write(
        &description,
        r#"{ "peripherals": [ { "name": "uart", "base_address": 4096, "registers": [
            { "name": "a", "offset": 0, "width": 32, "access": "read-write" },
            { "name": "b", "offset": 2, "width": 16, "access": "read-write" }
        ] } ] }"#,
    )
    .unwrap();
    let rust_dir = dir.path().join("rust");
    let builder = PacBuilder::new(&rust_dir, &description).skeleton(skeleton.clone());

    let err = builder.generate("vexriscv").unwrap_err();
    assert!(matches!(
        err,
        PacError::MalformedDescription(MalformedDescriptionError::OverlappingRegisters { .. })
    ));
    assert!(!rust_dir.exists());
    assert_eq!(skeleton.runs.get(), 0);
}

#[test]
fn test_overlapping_regions_write_nothing() {
    let (dir, skeleton) = setup();
    let regions = dir.path().join("regions.ld");
    fs::write(
        &regions,
        "MEMORY {\n\trom : ORIGIN = 0x00000000, LENGTH = 0x00010000\n\tsram : ORIGIN = 0x00008000, LENGTH = 0x00002000\n}\n",
    )
    .unwrap();
    let rust_dir = dir.path().join("rust");
    let builder = PacBuilder::new(&rust_dir, FEATHER_SVD)
        .memory_map(&regions)
        .skeleton(skeleton.clone());

    let err = builder.generate("vexriscv").unwrap_err();
    assert!(matches!(
        err,
        PacError::MalformedDescription(MalformedDescriptionError::OverlappingRegions { .. })
    ));
    assert!(!rust_dir.exists());
}

#[test]
fn test_skeleton_failure_is_reported() {
    let (dir, _) = setup();
    let builder = PacBuilder::new(dir.path(), FEATHER_SVD)
        .memory_map(FEATHER_REGIONS)
        .skeleton(BrokenSkeleton);

    let err = builder.generate("vexriscv").unwrap_err();
    assert!(matches!(err, PacError::SkeletonSpawn { .. }));
    assert!(!builder.crate_dir().join("build.rs").exists());
}

#[test]
fn test_manifest_is_merged_before_artifact_writes() {
    let (dir, _) = setup();
    let skeleton = BlockedBuildRs::default();
    let builder = PacBuilder::new(dir.path(), FEATHER_SVD)
        .memory_map(FEATHER_REGIONS)
        .skeleton(skeleton.clone());
    let crate_dir = builder.crate_dir();

    let err = builder.generate("vexriscv").unwrap_err();
    assert!(matches!(err, PacError::ArtifactWrite(_)));
    let manifest: toml::Table = read(crate_dir.join("Cargo.toml")).parse().unwrap();
    assert_eq!(manifest["dependencies"]["riscv-rt"].as_str(), Some("0.8.0"));

    // The retry sees an existing Cargo.toml and keeps it as it is.
    fs::remove_dir(crate_dir.join("build.rs")).unwrap();
    let report = builder.generate("vexriscv").unwrap();
    assert!(!report.skeleton_initialized);
    assert_eq!(skeleton.0.runs.get(), 1);
    assert!(builder.stale_files("vexriscv").unwrap().is_empty());
    let manifest: toml::Table = read(crate_dir.join("Cargo.toml")).parse().unwrap();
    assert_eq!(manifest["dependencies"]["tock-registers"].as_str(), Some("0.9.0"));
}

#[test]
fn test_build_hook_regenerates_identical_sources() {
    let (dir, skeleton) = setup();
    let builder = feather(dir.path(), &skeleton);
    builder.generate("vexriscv").unwrap();

    let crate_dir = builder.crate_dir();
    let src_dir = crate_dir.join("src");
    let generated = snapshot(&crate_dir);

    // Simulate a stale tree: an edited root and a module of a removed peripheral.
    fs::write(src_dir.join("lib.rs"), "// edited\n").unwrap();
    fs::write(src_dir.join("soc/sdram.rs"), "pub const SDRAM_ADDR: usize = 0;\n").unwrap();
    fs::write(crate_dir.join("regions.ld"), "MEMORY {\n}\n").unwrap();

    let fragment = hook::regenerate(
        Path::new(FEATHER_SVD),
        Some(Path::new(FEATHER_REGIONS)),
        "vexriscv",
        &["identifier_mem"],
        &crate_dir,
    )
    .unwrap();
    assert_eq!(fragment, crate_dir.join("regions.ld"));
    assert_eq!(snapshot(&crate_dir), generated);
}

#[test]
fn test_build_hook_follows_edited_description_regions() {
    let (dir, skeleton) = setup();
    let description = dir.path().join("csr.svd");
    fs::copy(FEATHER_SVD, &description).unwrap();
    let rust_dir = dir.path().join("rust");
    let builder = PacBuilder::new(&rust_dir, &description).skeleton(skeleton.clone());
    builder.generate("vexriscv").unwrap();

    let crate_dir = builder.crate_dir();
    assert!(read(crate_dir.join("build.rs")).contains("const REGIONS_FILE: Option<&str> = None;"));
    assert!(read(crate_dir.join("src/soc/mod.rs")).contains("MAIN_RAM_LENGTH: usize = 0x4000;"));

    // The SoC is rebuilt with a bigger main RAM; only the description changes.
    let svd = read(&description);
    let main_ram = "<name>MAIN_RAM</name>\n                <baseAddress>0x40000000</baseAddress>\n                <size>0x00004000</size>";
    assert!(svd.contains(main_ram));
    fs::write(
        &description,
        svd.replace(main_ram, &main_ram.replace("0x00004000", "0x00008000")),
    )
    .unwrap();

    let fragment =
        hook::regenerate(&description, None, "vexriscv", &["identifier_mem"], &crate_dir).unwrap();
    assert!(read(&fragment).contains("\tmain_ram : ORIGIN = 0x40000000, LENGTH = 0x8000"));
    assert!(read(crate_dir.join("src/soc/mod.rs")).contains("MAIN_RAM_LENGTH: usize = 0x8000;"));
    assert!(builder.stale_files("vexriscv").unwrap().is_empty());
}

#[test]
fn test_build_hook_follows_edited_memory_map() {
    let (dir, skeleton) = setup();
    let regions = dir.path().join("regions.ld");
    fs::copy(FEATHER_REGIONS, &regions).unwrap();
    let rust_dir = dir.path().join("rust");
    let builder = PacBuilder::new(&rust_dir, FEATHER_SVD)
        .memory_map(&regions)
        .skeleton(skeleton.clone());
    builder.generate("vexriscv").unwrap();

    let crate_dir = builder.crate_dir();
    let build_rs = read(crate_dir.join("build.rs"));
    assert!(build_rs.contains(&format!(
        "const REGIONS_FILE: Option<&str> = Some({:?});",
        regions.display().to_string()
    )));

    let upstream = read(&regions);
    fs::write(
        &regions,
        upstream.replace(
            "sram : ORIGIN = 0x10000000, LENGTH = 0x00002000",
            "sram : ORIGIN = 0x10000000, LENGTH = 0x00001000",
        ),
    )
    .unwrap();

    let fragment = hook::regenerate(
        Path::new(FEATHER_SVD),
        Some(regions.as_path()),
        "vexriscv",
        &["identifier_mem"],
        &crate_dir,
    )
    .unwrap();
    assert!(read(&fragment).contains("\tsram : ORIGIN = 0x10000000, LENGTH = 0x1000"));
    assert!(read(crate_dir.join("src/soc/mod.rs")).contains("SRAM_LENGTH: usize = 0x1000;"));
    assert!(builder.stale_files("vexriscv").unwrap().is_empty());
}

#[test]
fn test_build_hook_rejects_unsupported_target() {
    let (dir, _) = setup();
    let err = hook::regenerate(
        Path::new(FEATHER_SVD),
        Some(Path::new(FEATHER_REGIONS)),
        "lm32",
        &[],
        dir.path(),
    )
    .unwrap_err();
    assert!(matches!(err, PacError::UnsupportedTarget(_)));
    assert!(fs::read_dir(dir.path()).unwrap().next().is_none());
}

#[test]
fn test_stale_files() {
    let (dir, skeleton) = setup();
    let builder = feather(dir.path(), &skeleton);
    let crate_dir = builder.crate_dir();

    let missing = builder.stale_files("vexriscv").unwrap();
    assert!(missing.contains(&crate_dir.join("build.rs")));
    assert!(missing.contains(&crate_dir.join("src/soc/uart.rs")));

    builder.generate("vexriscv").unwrap();
    assert!(builder.stale_files("vexriscv").unwrap().is_empty());

    fs::write(crate_dir.join("src/soc/uart.rs"), "").unwrap();
    fs::write(crate_dir.join("src/soc/sdram.rs"), "").unwrap();
    assert_eq!(
        builder.stale_files("vexriscv").unwrap(),
        vec![
            crate_dir.join("src/soc/sdram.rs"),
            crate_dir.join("src/soc/uart.rs"),
        ]
    );
}

#[test]
fn test_json_description_end_to_end() {
    let (dir, skeleton) = setup();
    let description = dir.path().join("uart.json");
    fs::write(&description, UART_JSON).unwrap();
    let rust_dir = dir.path().join("rust");

    let report = PacBuilder::new(&rust_dir, &description)
        .crate_name("uart-pac")
        .skeleton(skeleton.clone())
        .generate("vexriscv")
        .unwrap();
    assert_eq!(report.crate_dir, rust_dir.join("uart-pac"));
    assert_eq!(report.peripherals, 1);
    // The zero-length main_ram is not part of this build.
    assert_eq!(report.regions, 1);

    let uart = read(report.crate_dir.join("src/soc/uart.rs"));
    assert!(uart.contains("pub const UART_ADDR: usize = 0x8200_0000;"));
    assert!(uart.contains("(0x0 => pub rxtx: tock_registers::registers::ReadWrite<u8>),"));
    assert!(uart.contains(
        "(0x4 => pub status: tock_registers::registers::ReadOnly<u8, super::bits::Status::Register>),"
    ));
    assert!(uart.contains("Ready OFFSET(0) NUMBITS(1) [],"));
    assert!(uart.contains("(0x5 => @END),"));

    let regions = read(report.crate_dir.join("regions.ld"));
    assert!(regions.contains("\trom : ORIGIN = 0x00000000, LENGTH = 0xA000"));
    assert!(!regions.contains("main_ram"));
    assert!(!regions.contains("uart"));

    let manifest: toml::Table = read(report.crate_dir.join("Cargo.toml")).parse().unwrap();
    assert_eq!(manifest["package"]["name"].as_str(), Some("uart-pac"));
}
