use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use rustctr::analysis::pipeline::{process_directory, table_name, write_json, write_table};
use rustctr::analysis::settings::{
    error_method_from_key, policy_from_index, AnalysisSettings, LocatorMode,
};

/// Batch-process CTR measurement runs into the aggregate results table.
#[derive(Parser, Debug)]
#[command(name = "rustctr", version, about)]
struct Cli {
    /// Root directory containing the oscilloscope run files
    root: PathBuf,

    /// Experiment keyword; drives crystal-length parsing and the table name
    #[arg(long, default_value = "DOI")]
    working_on: String,

    /// Only process runs whose name contains this keyword
    #[arg(long, default_value = "")]
    keyword: String,

    /// Error strategy: lsq, parametric, empirical or scikits
    #[arg(long, default_value = "scikits")]
    error_type: String,

    /// Coincidence policy: 0 intersect-all, 1 secondary-only, 2 primary-or-secondary
    #[arg(long, default_value_t = 0)]
    select_indices: u8,

    /// Keep the 00000 warm-up runs instead of skipping them
    #[arg(long)]
    keep_first: bool,

    /// Preamble rows per sample file (use 0 for combined files)
    #[arg(long, default_value_t = 4)]
    skip_rows: usize,

    /// Delay histogram bin width in ps
    #[arg(long, default_value_t = 25.0)]
    dt: f64,

    /// Base seed for the bootstrap resampling
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Hard floor on the coincident sample count per run
    #[arg(long, default_value_t = 100)]
    min_samples: usize,

    /// Use the single-peak locator instead of multi-peak detection
    #[arg(long)]
    single_peak: bool,

    /// Also write the records as JSON lines next to the CSV table
    #[arg(long)]
    json: bool,

    /// Output table path (defaults to <root>/<working-on>-<error-type>.csv)
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let settings = AnalysisSettings {
        working_on: cli.working_on,
        keyword: cli.keyword,
        error_method: error_method_from_key(&cli.error_type)?,
        policy: policy_from_index(cli.select_indices)?,
        locator: if cli.single_peak {
            LocatorMode::SinglePeak
        } else {
            LocatorMode::MultiPeak
        },
        skip_first: !cli.keep_first,
        skip_rows: cli.skip_rows,
        dt: cli.dt,
        seed: cli.seed,
        min_samples: cli.min_samples,
        ..AnalysisSettings::default()
    };

    let records = process_directory(&cli.root, &settings)
        .with_context(|| format!("discovering runs under {}", cli.root.display()))?;

    let output = cli
        .output
        .unwrap_or_else(|| cli.root.join(table_name(&settings)));
    write_table(&records, &output).with_context(|| format!("writing {}", output.display()))?;

    if cli.json {
        let json_path = output.with_extension("jsonl");
        write_json(&records, &json_path)
            .with_context(|| format!("writing {}", json_path.display()))?;
    }

    println!("{} records written to {}", records.len(), output.display());
    Ok(())
}
