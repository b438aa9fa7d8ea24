//! `list-versions` command

use super::{ordered, Context};
use anyhow::Result;

pub fn run(ctx: &Context<'_>) -> Result<String> {
    let registry = ctx.iguane.registry();
    let versions = ordered(
        ctx.iguane.list_profile_versions().into_iter(),
        ctx.reverse,
    );
    ctx.formatter.render_versions(registry, &versions)
}
