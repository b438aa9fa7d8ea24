//! `dump-raw` command

use super::Context;
use anyhow::Result;

pub fn run(ctx: &Context<'_>) -> Result<String> {
    ctx.formatter.render_catalog(ctx.iguane.dump_catalog())
}
