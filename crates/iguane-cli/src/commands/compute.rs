//! `compute` command, the default when no command is given

use super::{ordered, Context, Query};
use anyhow::Result;
use tracing::debug;

/// Evaluate the query for every selected device, in listing order
pub fn values(ctx: &Context<'_>, query: &Query) -> Result<Vec<(String, f64)>> {
    let mut names = ordered(ctx.iguane.catalog().names(), ctx.reverse);
    names.retain(|name| ctx.filter.matches(name));
    debug!("Computing {} for {} devices", query.unit, names.len());

    let mut values = names
        .into_iter()
        .map(|name| {
            ctx.iguane
                .evaluate_one(query.unit, name, &query.selector, query.normalize)
                .map(|value| (name.to_string(), value))
        })
        .collect::<iguane_core::Result<Vec<_>>>()?;

    if ctx.sort {
        if ctx.reverse {
            values.sort_by(|a, b| b.1.total_cmp(&a.1));
        } else {
            values.sort_by(|a, b| a.1.total_cmp(&b.1));
        }
    }

    Ok(values)
}

pub fn run(ctx: &Context<'_>, query: &Query) -> Result<String> {
    let values = values(ctx, query)?;
    ctx.formatter.render_values(&values)
}
