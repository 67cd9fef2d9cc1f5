//! Path classification.

use anyhow::Result;
use serde::Serialize;

use super::ClassifyArgs;
use crate::context::Context;
use crate::output::class_badge;

#[derive(Serialize)]
struct Classified<'a> {
    path: &'a str,
    class: &'static str,
    hosts_application: bool,
}

/// Run the classify command.
pub async fn run(args: ClassifyArgs, ctx: &Context) -> Result<()> {
    let classifier = &ctx.effective_config().classifier;

    let results: Vec<Classified<'_>> = args
        .paths
        .iter()
        .map(|path| {
            let class = classifier.classify(path);
            Classified {
                path,
                class: class.as_str(),
                hosts_application: class.hosts_application(),
            }
        })
        .collect();

    if ctx.output.is_json() {
        ctx.output.json(&results);
        return Ok(());
    }

    let width = args.paths.iter().map(|p| p.len()).max().unwrap_or(0);
    for path in &args.paths {
        let class = classifier.classify(path);
        let badge = class_badge(class);
        ctx.output.table_row(&[path.as_str(), badge.as_str()], &[width, 0]);
    }

    Ok(())
}
