//! `list-gpus` command

use super::{ordered, Context};
use anyhow::Result;

pub fn run(ctx: &Context<'_>) -> Result<String> {
    let mut names = ordered(ctx.iguane.catalog().names(), ctx.reverse);
    names.retain(|name| ctx.filter.matches(name));
    ctx.formatter.render_names("Device", &names)
}
