// Licensed under the Apache-2.0 license

use clap::{ArgAction, Parser, Subcommand};
use log::LevelFilter;
use simple_logger::SimpleLogger;
use std::path::PathBuf;

mod pac_gen;

#[derive(Parser, Debug)]
#[command(name = "xtask", author, version, about = "LiteX PAC tasks")]
struct Xtask {
    /// Log more (-v for debug, -vv for trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate the PAC crate from a LiteX build
    Pac {
        #[command(flatten)]
        args: pac_gen::PacArgs,
    },

    /// Check that the PAC crate on disk matches its inputs
    Check {
        #[command(flatten)]
        args: pac_gen::PacArgs,
    },

    /// Print the regions.ld linker fragment
    Regions {
        #[arg(long, value_name = "FILE", default_value = "hw/feather.svd")]
        description: PathBuf,

        #[arg(long, value_name = "FILE")]
        regions: Option<PathBuf>,

        #[arg(long, env = "LITEX_CPU_TYPE", default_value = "vexriscv")]
        cpu_type: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Xtask::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    SimpleLogger::new().with_level(level).init()?;

    match &cli.command {
        Commands::Pac { args } => pac_gen::generate(args),
        Commands::Check { args } => pac_gen::check(args),
        Commands::Regions {
            description,
            regions,
            cpu_type,
        } => pac_gen::regions(description, regions.as_deref(), cpu_type),
    }
}
