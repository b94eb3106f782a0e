use anyhow::Result;
use clap::Parser;
use osy_compose::*;

fn main() -> Result<()> {
    let args = Args::parse();
    compose_entry(args).map(|_| ())
}
