//! Head markup rendering.

use anyhow::Result;
use loader_core::{AssetUrls, CacheBust, HeadMarkup};
use serde_json::json;

use super::RenderArgs;
use crate::context::Context;

/// Run the render command.
pub async fn run(args: RenderArgs, ctx: &Context) -> Result<()> {
    let settings = ctx.settings()?;
    let class = settings.classifier.classify(&args.path);

    let token = match args.token {
        Some(token) => CacheBust::new(token),
        None => CacheBust::now(),
    };
    let urls = AssetUrls::build(&settings.branding, &token);
    let html = HeadMarkup::new(&settings.branding, class, urls).render();

    if ctx.output.is_json() {
        ctx.output.json(&json!({
            "path": args.path,
            "class": class.as_str(),
            "token": token.to_string(),
            "html": html,
        }));
        return Ok(());
    }

    ctx.output.debug(&format!("{} is a {} (token {})", args.path, class.as_str(), token));
    ctx.output.raw(&html);

    Ok(())
}
