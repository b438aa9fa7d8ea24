//! Output formatting for the iguane CLI

use anyhow::Result;
use clap::ValueEnum;
use colored::*;
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use iguane_core::{ComputedResult, DeviceCatalog, Field, OutputSettings, ProfileRegistry};
use serde::Serialize;
use serde_json::{Map, Value};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table format
    Table,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
    /// Compact text format
    Text,
    /// Delimited text format
    Parsable,
}

impl Default for OutputFormat {
    fn default() -> Self {
        OutputFormat::Text
    }
}

/// Output formatter
pub struct OutputFormatter {
    format: OutputFormat,
    delimiter: String,
    precision: usize,
}

impl OutputFormatter {
    /// Create a new output formatter
    pub fn new(format: OutputFormat, settings: &OutputSettings) -> Self {
        Self {
            format,
            delimiter: settings.delimiter.clone(),
            precision: settings.precision,
        }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Render a list of names (devices, units, versions)
    pub fn render_names(&self, header: &str, names: &[&str]) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(names)?),
            OutputFormat::Yaml => Ok(serde_yaml::to_string(names)?),
            OutputFormat::Table => {
                let mut table = new_table(&[header]);
                for name in names {
                    table.add_row(vec![*name]);
                }
                Ok(table.to_string())
            }
            OutputFormat::Text | OutputFormat::Parsable => Ok(names.join("\n")),
        }
    }

    /// Render per-device values
    pub fn render_values(&self, values: &[(String, f64)]) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(&to_object(values))?),
            OutputFormat::Yaml => Ok(serde_yaml::to_string(&to_object(values))?),
            OutputFormat::Table => {
                let mut table = new_table(&["Value", "Device"]);
                for (name, value) in values {
                    table.add_row(vec![
                        Cell::new(self.number(*value)).set_alignment(CellAlignment::Right),
                        Cell::new(name),
                    ]);
                }
                Ok(table.to_string())
            }
            OutputFormat::Text => Ok(values
                .iter()
                .map(|(name, value)| format!("{} {}", self.number(*value), name))
                .collect::<Vec<_>>()
                .join("\n")),
            OutputFormat::Parsable => Ok(values
                .iter()
                .map(|(name, value)| format!("{}{}{:?}", name, self.delimiter, value))
                .collect::<Vec<_>>()
                .join("\n")),
        }
    }

    /// Render a cluster aggregation; plain formats only show the total
    ///
    /// An `integral` total is a whole device count and prints without decimals.
    pub fn render_result(&self, result: &ComputedResult, integral: bool) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(result)?),
            OutputFormat::Yaml => Ok(serde_yaml::to_string(result)?),
            OutputFormat::Table => {
                let mut table = new_table(&["Device", "Equivalence"]);
                for (name, value) in result.breakdown() {
                    table.add_row(vec![
                        Cell::new(name),
                        Cell::new(self.number(*value)).set_alignment(CellAlignment::Right),
                    ]);
                }
                table.add_row(vec![
                    Cell::new("Total").add_attribute(Attribute::Bold),
                    Cell::new(self.number(result.total()))
                        .add_attribute(Attribute::Bold)
                        .set_alignment(CellAlignment::Right),
                ]);
                Ok(table.to_string())
            }
            OutputFormat::Text | OutputFormat::Parsable if integral => {
                Ok(format!("{:.0}", result.total()))
            }
            OutputFormat::Text => Ok(self.number(result.total())),
            OutputFormat::Parsable => Ok(format!("{:?}", result.total())),
        }
    }

    /// Render the weight profile registry
    pub fn render_versions(&self, registry: &ProfileRegistry, versions: &[&str]) -> Result<String> {
        match self.format {
            OutputFormat::Json | OutputFormat::Yaml => {
                let mut object = Map::new();
                for version in versions {
                    let profile = registry.resolve(version)?;
                    object.insert(version.to_string(), serde_json::to_value(profile)?);
                }
                serialize(self.format, &object)
            }
            OutputFormat::Table => {
                let mut table = new_table(&["Version", "Reference", "Weights", "Aliases"]);
                for version in versions {
                    let profile = registry.resolve(version)?;
                    let weights = profile
                        .weights()
                        .iter()
                        .map(|(field, weight)| format!("{}={}", field, weight))
                        .collect::<Vec<_>>()
                        .join(" ");
                    let aliases = registry
                        .aliases()
                        .filter(|(_, target)| target == version)
                        .map(|(alias, _)| alias)
                        .collect::<Vec<_>>()
                        .join(", ");
                    table.add_row(vec![
                        version.to_string(),
                        profile.reference().to_string(),
                        weights,
                        aliases,
                    ]);
                }
                Ok(table.to_string())
            }
            // Only names, not weights
            OutputFormat::Text | OutputFormat::Parsable => Ok(versions.join("\n")),
        }
    }

    /// Render the raw device table
    pub fn render_catalog(&self, catalog: &DeviceCatalog) -> Result<String> {
        match self.format {
            OutputFormat::Yaml => Ok(serde_yaml::to_string(catalog)?),
            OutputFormat::Table => {
                let mut headers = vec!["Device"];
                headers.extend(Field::ALL.iter().map(Field::as_str));
                let mut table = new_table(&headers);
                for (name, record) in catalog.records() {
                    let mut row = vec![Cell::new(name)];
                    for field in Field::ALL {
                        let text = match record.raw(field) {
                            Some(value) => format!("{}", value),
                            None => "-".dimmed().to_string(),
                        };
                        row.push(Cell::new(text).set_alignment(CellAlignment::Right));
                    }
                    table.add_row(row);
                }
                Ok(table.to_string())
            }
            OutputFormat::Parsable => {
                let mut lines = Vec::with_capacity(catalog.len() + 1);
                let mut header = vec!["name"];
                header.extend(Field::ALL.iter().map(Field::as_str));
                lines.push(header.join(&self.delimiter));
                for (name, record) in catalog.records() {
                    let mut row = vec![name.to_string()];
                    row.extend(
                        Field::ALL
                            .iter()
                            .map(|&f| record.raw(f).map(|v| format!("{:?}", v)).unwrap_or_default()),
                    );
                    lines.push(row.join(&self.delimiter));
                }
                Ok(lines.join("\n"))
            }
            // The raw dump is JSON unless another structured format is asked for
            OutputFormat::Json | OutputFormat::Text => Ok(serde_json::to_string_pretty(catalog)?),
        }
    }

    fn number(&self, value: f64) -> String {
        format!("{:>5.*}", self.precision, value)
    }
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message.red());
}

fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let header_cells: Vec<Cell> = headers
        .iter()
        .map(|h| Cell::new(h).add_attribute(Attribute::Bold).fg(Color::Cyan))
        .collect();
    table.set_header(header_cells);
    table
}

fn to_object(values: &[(String, f64)]) -> Map<String, Value> {
    values
        .iter()
        .map(|(name, value)| (name.clone(), Value::from(*value)))
        .collect()
}

fn serialize<T: Serialize>(format: OutputFormat, value: &T) -> Result<String> {
    match format {
        OutputFormat::Yaml => Ok(serde_yaml::to_string(value)?),
        _ => Ok(serde_json::to_string_pretty(value)?),
    }
}
