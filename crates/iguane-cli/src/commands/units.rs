//! `list-units` command

use super::{ordered, Context};
use anyhow::Result;

pub fn run(ctx: &Context<'_>) -> Result<String> {
    let units = ordered(ctx.iguane.list_units().iter().map(|u| u.as_str()), ctx.reverse);
    ctx.formatter.render_names("Unit", &units)
}
