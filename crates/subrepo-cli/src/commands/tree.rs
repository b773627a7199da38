//! Tree command implementation

use colored::Colorize;
use subrepo_core::{render_tree, tree_nodes};

use crate::context::RepoContext;
use crate::error::Result;

/// Run the tree command
pub fn run_tree(ctx: &RepoContext, json: bool) -> Result<()> {
    let engine = ctx.engine();
    let forest = engine.forest()?;
    let graph = engine.graph(&forest)?;

    if json {
        let nodes = tree_nodes(&forest, &graph);
        println!("{}", serde_json::to_string_pretty(&nodes)?);
        return Ok(());
    }

    if forest.is_empty() {
        println!(
            "{} (use {} to add one)",
            "No subrepos".dimmed(),
            "git subrepo import".cyan()
        );
        return Ok(());
    }
    print!("{}", render_tree(&forest, &graph));
    Ok(())
}
