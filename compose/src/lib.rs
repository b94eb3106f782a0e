//! Loading of node descriptions.
//!
//! A node description is a YAML document that maps one to one onto
//! [`osy_core::Node`]. Loading checks the model with [`Node::validate`] so
//! the code generator only ever sees consistent nodes.

use anyhow::{Context, Result};
use clap::Parser;
use osy_core::Node;

#[derive(Parser)]
#[command(version)]
pub struct Args {
    /// Node description file
    pub in_file: String,
}

/// Load and validate the node in `args.in_file`, then print it as JSON.
pub fn compose_entry(args: Args) -> Result<Node> {
    let node = load_node(&args.in_file)?;
    println!("{}", serde_json::to_string_pretty(&node)?);
    Ok(node)
}

/// Load and validate the node description at `path`.
pub fn load_node(path: &str) -> Result<Node> {
    let input = std::fs::read_to_string(path).context("Failed to read input file")?;

    compose_entry_str(&input).context(format!("Failed to ingest node description {path}"))
}

/// Parse and validate a node description.
pub fn compose_entry_str(input: &str) -> Result<Node> {
    let node: Node =
        serde_yaml::from_str(input).context("Failed to parse node description.".to_string())?;

    node.validate()
        .context(format!("Node `{}` is inconsistent.", node.name))?;

    log::debug!(
        "Loaded node `{}`: {} applications, {} data pools, {} protocols",
        node.name,
        node.applications.len(),
        node.datapools.len(),
        node.protocols.len()
    );

    Ok(node)
}
