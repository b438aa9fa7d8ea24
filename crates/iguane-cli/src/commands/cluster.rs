//! `cluster` command

use super::{Context, Query};
use anyhow::{Context as _, Result};
use iguane_core::{ClusterInventory, ComputedResult, Unit};
use std::path::Path;
use tracing::info;

/// Aggregate an inventory and arrange its breakdown for display
pub fn result(ctx: &Context<'_>, inventory: &ClusterInventory, query: &Query) -> Result<ComputedResult> {
    let mut result =
        ctx.iguane
            .aggregate_unit(inventory, query.unit, &query.selector, query.normalize)?;

    if ctx.reverse {
        result.reverse();
    }
    result.retain(|name| ctx.filter.matches(name));
    if ctx.sort {
        result.sort_by_value(ctx.reverse);
    }

    Ok(result)
}

pub fn run(ctx: &Context<'_>, input: &Path, query: &Query) -> Result<String> {
    let inventory = ClusterInventory::load_from_file(input)
        .with_context(|| format!("Invalid cluster input {}", input.display()))?;
    info!("Loaded {} inventory entries from {}", inventory.len(), input.display());

    let result = result(ctx, &inventory, query)?;
    ctx.formatter.render_result(&result, is_device_count(&result, query.unit))
}

/// Whether the total counts whole devices rather than equivalences
fn is_device_count(result: &ComputedResult, unit: Unit) -> bool {
    result.is_empty()
        || (unit == Unit::Count && result.breakdown().iter().all(|(_, n)| n.fract() == 0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::context;
    use crate::filter::NameFilter;
    use crate::output::OutputFormat;
    use iguane_core::{ProfileSelector, Unit};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn inventory_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    fn ugr() -> Query {
        Query {
            selector: ProfileSelector::named("1.0"),
            ..Query::default()
        }
    }

    #[test]
    fn test_cluster_total_text() {
        let file = inventory_file(r#"{"A100-SXM4-40GB": 10, "UnknownGPU-X": 5}"#);
        let ctx = context(OutputFormat::Text);
        assert_eq!(run(&ctx, file.path(), &ugr()).unwrap(), "40.00");
    }

    #[test]
    fn test_cluster_json() {
        let file = inventory_file(r#"{"A100-SXM4-40GB": 10, "UnknownGPU-X": 5}"#);
        let ctx = context(OutputFormat::Json);
        let parsed: serde_json::Value =
            serde_json::from_str(&run(&ctx, file.path(), &ugr()).unwrap()).unwrap();
        assert_eq!(parsed["breakdown"]["A100-SXM4-40GB"], 40.0);
        assert!(parsed["breakdown"].get("UnknownGPU-X").is_none());
        assert_eq!(parsed["total"], 40.0);
    }

    #[test]
    fn test_filter_recomputes_total() {
        let inventory =
            ClusterInventory::from_json_str(r#"{"T4": 4, "A100-SXM4-40GB": 2, "V100-SXM2-32GB": 8}"#)
                .unwrap();
        let mut ctx = context(OutputFormat::Text);
        ctx.filter = NameFilter::new(Some("A100")).unwrap();
        let query = Query {
            unit: Unit::Count,
            ..Query::default()
        };

        let result = result(&ctx, &inventory, &query).unwrap();
        assert_eq!(result.breakdown(), &[("A100-SXM4-40GB".to_string(), 2.0)]);
        assert_eq!(result.total(), 2.0);
    }

    #[test]
    fn test_sort_descending_with_reverse() {
        let inventory =
            ClusterInventory::from_json_str(r#"{"T4": 4, "A100-SXM4-40GB": 2, "V100-SXM2-32GB": 8}"#)
                .unwrap();
        let mut ctx = context(OutputFormat::Text);
        ctx.sort = true;
        ctx.reverse = true;
        let query = Query {
            unit: Unit::Count,
            ..Query::default()
        };

        let result = result(&ctx, &inventory, &query).unwrap();
        let names: Vec<_> = result.breakdown().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["V100-SXM2-32GB", "T4", "A100-SXM4-40GB"]);
        assert_eq!(result.total(), 14.0);
    }

    #[test]
    fn test_whole_device_count_prints_as_integer() {
        let file = inventory_file(r#"{"T4": 4, "A100-SXM4-40GB": 2, "V100-SXM2-32GB": 8}"#);
        let ctx = context(OutputFormat::Text);
        let count = Query {
            unit: Unit::Count,
            ..Query::default()
        };
        assert_eq!(run(&ctx, file.path(), &count).unwrap(), "14");

        let fractional = inventory_file(r#"{"T4": 2.5}"#);
        assert_eq!(run(&ctx, fractional.path(), &count).unwrap(), " 2.50");

        let unknown = inventory_file(r#"{"UnknownGPU-X": 5}"#);
        assert_eq!(run(&ctx, unknown.path(), &ugr()).unwrap(), "0");
    }

    #[test]
    fn test_missing_file() {
        let ctx = context(OutputFormat::Text);
        let err = run(&ctx, Path::new("/nonexistent/inventory.json"), &ugr()).unwrap_err();
        assert!(err.to_string().contains("Invalid cluster input"));
    }
}
