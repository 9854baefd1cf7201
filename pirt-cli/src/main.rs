mod bam;
mod ends;
mod gff;
mod heat;
mod output;

use anyhow::Result;
use clap::Command;

pub mod consts {
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
    pub const PKG_NAME: &str = "pirt";
    pub const BIN_NAME: &str = "pirt";
}

fn build_parser() -> Command {
    Command::new(consts::BIN_NAME)
        .bin_name(consts::BIN_NAME)
        .version(consts::VERSION)
        .about("Tools for binned piRNA expression analysis and alignment end-offset correlation.")
        .subcommand_required(true)
        .subcommand(heat::cli::create_heat_cli())
        .subcommand(ends::cli::create_ends_cli())
}

fn main() -> Result<()> {
    let app = build_parser();
    let matches = app.get_matches();

    match matches.subcommand() {
        //
        // HEAT
        //
        Some((heat::cli::HEAT_CMD, matches)) => {
            heat::handlers::run_heat(matches)?;
        }

        //
        // ENDS
        //
        Some((ends::cli::ENDS_CMD, matches)) => {
            ends::handlers::run_ends(matches)?;
        }

        _ => unreachable!("Subcommand not found"),
    };

    Ok(())
}
