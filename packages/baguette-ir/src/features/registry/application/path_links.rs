//! Registry entries pointing at observed files
//!
//! Runs after the filesystem tree exists: a string value (or any argument of
//! a command line stored in one) that walks down the tree from the analysis
//! host to a known node gets a `PointsToFile` edge.

use tracing::debug;

use crate::features::filesystem::{walk, FsPath};
use crate::pipeline::{BuildContext, PipelineResult};
use crate::shared::models::{EdgeKind, VertexKind};
use crate::shared::utils::split_command_line;

/// Path candidates inside one registry string, whole string first
fn candidates(content: &str) -> Vec<String> {
    let mut found = vec![content.trim().to_string()];
    for argument in split_command_line(content) {
        if !found.contains(&argument) {
            found.push(argument);
        }
    }
    found.retain(|c| !c.is_empty());
    found
}

pub(crate) fn link_paths(ctx: &mut BuildContext) -> PipelineResult<()> {
    let host = ctx.host()?;
    let mut links = Vec::new();
    for entry in ctx.members(VertexKind::KeyEntry) {
        let Some(data) = ctx.store.data(entry)?.as_entry() else {
            continue;
        };
        for content in data.value.strings() {
            for candidate in candidates(content) {
                let Some(path) = FsPath::parse(&candidate, ctx.platform) else {
                    continue;
                };
                if let Some(node) = walk(&ctx.store, host, &path) {
                    links.push((entry, node));
                }
            }
        }
    }

    debug!(links = links.len(), "Registry entries linked to files");
    for (entry, node) in links {
        ctx.link(EdgeKind::PointsToFile, entry, node)?;
    }
    Ok(())
}
