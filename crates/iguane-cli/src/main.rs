//! iguane - GPU figure-of-merit calculator

use anyhow::{anyhow, bail, Context as _, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use iguane_core::{DeviceCatalog, Iguane, OutputSettings, ProfileSelector, Settings, Unit};
use std::borrow::Cow;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod filter;
mod output;

use commands::{Context, Query};
use filter::NameFilter;
use output::{OutputFormat, OutputFormatter};

/// Compute GPU unit equivalences and figures of merit
#[derive(Debug, Parser)]
#[command(name = "iguane")]
#[command(about = "Compute GPU unit equivalences and figures of merit")]
#[command(version)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Device catalog replacing the built-in one
    #[arg(long, global = true, value_name = "FILE")]
    catalog: Option<PathBuf>,

    /// Increase verbosity (repeatable)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output format
    #[arg(short, long, global = true, value_enum)]
    output: Option<OutputFormat>,

    /// Dump output as JSON (same as --output json)
    #[arg(short, long, global = true)]
    json: bool,

    /// Dump output as delimited text (same as --output parsable)
    #[arg(short, long, global = true)]
    parsable: bool,

    /// Delimiter for parsable output
    #[arg(short, long, global = true, value_name = "DELIM")]
    delimiter: Option<String>,

    /// Reverse listing
    #[arg(short, long, global = true)]
    reverse: bool,

    /// Sort device listing by value
    #[arg(short, long, global = true)]
    sort: bool,

    /// Select devices by name prefix or glob
    #[arg(short = 'G', long, global = true, value_name = "PATTERN")]
    gpu: Option<String>,

    #[command(flatten)]
    query: QueryArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Unit and weight profile selection
#[derive(Debug, Clone, Default, Args)]
pub struct QueryArgs {
    /// Unit to compute for every device: count, fp16, fp32, fp64, tf32, fom,
    /// or a profile name (ugr, rgu, iguane, iguana) for its figure of merit
    #[arg(short, long, global = true, visible_alias = "fom", value_parser = parse_unit)]
    unit: Option<UnitChoice>,

    /// Figure-of-merit weight profile version
    #[arg(long, global = true, value_name = "VERSION")]
    fom_version: Option<String>,

    /// Use the UGR/RGU profile
    #[arg(long, global = true, visible_alias = "rgu")]
    ugr: bool,

    /// Use the IGUANE/IGUANA profile
    #[arg(long, global = true, visible_alias = "iguana")]
    iguane: bool,

    /// Custom weights, e.g. '{"ref": "A100-SXM4-80GB", "fp16": 0.5, "membw": 0.5}'
    #[arg(long, global = true, value_name = "JSON")]
    custom_weights: Option<String>,

    /// Normalize the weights to sum to 1.0
    #[arg(long, global = true)]
    norm: bool,
}

/// A unit, optionally naming the weight profile it is computed with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitChoice {
    unit: Unit,
    profile: Option<&'static str>,
}

fn parse_unit(value: &str) -> std::result::Result<UnitChoice, String> {
    let profile = match value.to_lowercase().as_str() {
        "ugr" | "rgu" => Some("ugr"),
        "iguane" | "iguana" => Some("iguane"),
        _ => None,
    };
    match profile {
        Some(profile) => Ok(UnitChoice {
            unit: Unit::Fom,
            profile: Some(profile),
        }),
        None => value.parse::<Unit>().map(|unit| UnitChoice {
            unit,
            profile: None,
        }),
    }
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// List known units
    #[command(name = "list-units")]
    ListUnits,

    /// List known GPUs
    #[command(name = "list-gpus")]
    ListGpus,

    /// List weight profile versions
    #[command(name = "list-versions", visible_aliases = ["list-ugr-versions", "list-rgu-versions"])]
    ListVersions,

    /// Dump the raw device table
    #[command(name = "dump-raw")]
    DumpRaw,

    /// Compute the selected unit for every GPU (default)
    #[command(name = "compute")]
    Compute,

    /// Compute the equivalence of a GPU inventory
    #[command(name = "cluster")]
    Cluster {
        /// JSON file mapping GPU names to counts
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,
    },
}

impl Cli {
    /// Reject option combinations clap cannot express across global arguments
    fn validate(&self) -> Result<()> {
        if [self.json, self.parsable, self.output.is_some()]
            .iter()
            .filter(|set| **set)
            .count()
            > 1
        {
            bail!("--json, --parsable and --output are mutually exclusive");
        }

        let q = &self.query;
        let named_unit = q.unit.map_or(false, |choice| choice.profile.is_some());
        let profiles = [
            q.fom_version.is_some(),
            q.ugr,
            q.iguane,
            q.custom_weights.is_some(),
            named_unit,
        ]
        .iter()
        .filter(|set| **set)
        .count();
        if profiles > 1 {
            bail!("--fom-version, --ugr, --iguane, --custom-weights and a profile --unit are mutually exclusive");
        }
        if let Some(choice) = q.unit {
            if profiles > 0 && !choice.unit.uses_profile() {
                bail!("--unit {} does not use a weight profile", choice.unit);
            }
        }

        Ok(())
    }

    fn output_format(&self, settings: &OutputSettings) -> Result<OutputFormat> {
        if self.json {
            return Ok(OutputFormat::Json);
        }
        if self.parsable {
            return Ok(OutputFormat::Parsable);
        }
        match self.output {
            Some(format) => Ok(format),
            None => OutputFormat::from_str(&settings.format, true).map_err(|e| anyhow!(e)),
        }
    }

    fn output_settings(&self, settings: &Settings) -> Result<OutputSettings> {
        let mut output = settings.output.clone();
        if let Some(delimiter) = &self.delimiter {
            output.delimiter = delimiter.clone();
        }
        output.validate()?;
        Ok(output)
    }

    fn query(&self, iguane: &Iguane, settings: &Settings) -> Result<Query> {
        let q = &self.query;
        let unit_profile = q.unit.and_then(|choice| choice.profile);
        let selector = if let Some(text) = &q.custom_weights {
            iguane.custom_profile(text).context("Invalid --custom-weights")?
        } else if q.ugr {
            ProfileSelector::named("ugr")
        } else if q.iguane {
            ProfileSelector::named("iguane")
        } else if let Some(profile) = unit_profile {
            ProfileSelector::named(profile)
        } else if let Some(version) = q.fom_version.as_ref().or(settings.default_profile.as_ref()) {
            ProfileSelector::named(version.as_str())
        } else {
            ProfileSelector::Latest
        };

        Ok(Query {
            unit: q.unit.map_or(Unit::Fom, |choice| choice.unit),
            selector,
            normalize: q.norm || settings.normalize,
        })
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose)?;
    debug!("Starting iguane with arguments: {:?}", cli);

    match run(&cli) {
        Ok(rendered) => {
            if !rendered.is_empty() {
                println!("{}", rendered);
            }
            Ok(())
        }
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            std::process::exit(1);
        }
    }
}

fn init_tracing(verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("iguane={},iguane_core={}", level, level).into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))
}

fn run(cli: &Cli) -> Result<String> {
    cli.validate()?;

    let settings = Settings::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let output_settings = cli.output_settings(&settings)?;
    let format = cli.output_format(&output_settings)?;

    let iguane: Cow<'static, Iguane> = match cli.catalog.as_ref().or(settings.catalog.as_ref()) {
        Some(path) => {
            info!("Using device catalog {}", path.display());
            let catalog = DeviceCatalog::load_from_file(path)
                .with_context(|| format!("Failed to load device catalog {}", path.display()))?;
            Cow::Owned(Iguane::with_catalog(catalog)?)
        }
        None => Cow::Borrowed(Iguane::builtin()?),
    };

    let ctx = Context {
        iguane: &iguane,
        formatter: OutputFormatter::new(format, &output_settings),
        filter: NameFilter::new(cli.gpu.as_deref())?,
        reverse: cli.reverse,
        sort: cli.sort,
    };

    match cli.command.as_ref().unwrap_or(&Commands::Compute) {
        Commands::ListUnits => commands::units::run(&ctx),
        Commands::ListGpus => commands::devices::run(&ctx),
        Commands::ListVersions => commands::versions::run(&ctx),
        Commands::DumpRaw => commands::dump::run(&ctx),
        Commands::Compute => {
            let query = cli.query(&iguane, &settings)?;
            commands::compute::run(&ctx, &query)
        }
        Commands::Cluster { input } => {
            let query = cli.query(&iguane, &settings)?;
            commands::cluster::run(&ctx, input, &query)
        }
    }
}
