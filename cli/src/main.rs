use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use osy_codegen::{Codegen, GenerateOptions, Status};

#[derive(clap::Parser)]
#[command(version)]
struct PrimaryArgs {
    #[clap(subcommand)]
    subcommand: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Load and validate a node description, print it as JSON
    Compose(osy_compose::Args),
    /// Generate the files of one application of a node
    Codegen(osy_codegen::Args),
}

fn codegen(args: osy_codegen::Args) -> Result<ExitCode> {
    let node = osy_compose::load_node(&args.in_file)?;
    let opts = GenerateOptions::from(&args);

    let res = Codegen::new(&node, &args.application, opts).and_then(|cg| cg.generate(&args.out_dir));
    let status = Status::of(&res);

    match res {
        Ok(files) => {
            for f in files {
                println!("{}", f.display());
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("Code generation for `{}` failed: {e}", args.application);
            Ok(ExitCode::from(status.code() as u8))
        }
    }
}

fn main() -> Result<ExitCode> {
    env_logger::init();

    let args = PrimaryArgs::parse();

    match args.subcommand {
        Command::Compose(a) => osy_compose::compose_entry(a).map(|_| ExitCode::SUCCESS),
        Command::Codegen(a) => codegen(a),
    }
}
