//! Datacomp filtering pipeline CLI
//!
//! # Usage
//!
//! ```bash
//! datacomp-filter compile --base-path ./fondant-artifacts --output compose.json
//! datacomp-filter validate --config datacomp.json
//! datacomp-filter describe --format json
//! datacomp-filter catalog
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use datacomp_filter::config::{ConfigOverrides, DatacompConfig};
use datacomp_filter::datacomp::build_pipeline;
use datacomp_filter::logger::{init_logging, LogLevel};
use datacomp_filter::pipeline::passes::write::DEFAULT_OUTPUT_PATH;
use datacomp_filter::pipeline::{
    compile, Catalog, CompileContext, CompileOptions, Compiler, Pipeline,
};
use datacomp_filter::{FilterError, FilterResult};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "datacomp-filter")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Declare and compile the T-MARS Datacomp filtering pipeline", long_about = None)]
struct Cli {
    /// Increase verbosity (-v debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log level (debug, info, warn, error)
    #[arg(long, default_value = "info", env = "DATACOMP_LOG_LEVEL", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile the pipeline into a compose spec
    Compile {
        #[command(flatten)]
        pipeline: PipelineArgs,

        /// Where to write the compose spec
        #[arg(long, short, default_value = DEFAULT_OUTPUT_PATH)]
        output: PathBuf,

        /// Validate and print the spec without writing it
        #[arg(long)]
        dry_run: bool,

        /// Run id (defaults to `<pipeline>-<UTC timestamp>`)
        #[arg(long)]
        run_id: Option<String>,
    },
    /// Check the pipeline compiles and print its stage order
    Validate {
        #[command(flatten)]
        pipeline: PipelineArgs,
    },
    /// Print the declared stages and their arguments
    Describe {
        #[command(flatten)]
        pipeline: PipelineArgs,

        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
    /// List the known components
    Catalog,
}

#[derive(Args)]
struct PipelineArgs {
    /// JSON config file; unset fields keep their defaults
    #[arg(long, env = "DATACOMP_CONFIG")]
    config: Option<PathBuf>,

    /// Local directory or object-store URI for artifacts
    #[arg(long, env = "DATACOMP_BASE_PATH")]
    base_path: Option<String>,

    /// Number of rows to load
    #[arg(long, conflicts_with = "all_rows")]
    n_rows: Option<u64>,

    /// Load every row of the dataset
    #[arg(long)]
    all_rows: bool,

    /// Image tag for reusable components
    #[arg(long, env = "DATACOMP_COMPONENT_TAG")]
    component_tag: Option<String>,
}

impl PipelineArgs {
    fn load_config(&self) -> FilterResult<DatacompConfig> {
        let config = match &self.config {
            Some(path) => DatacompConfig::from_file(path)?,
            None => DatacompConfig::default(),
        };

        ConfigOverrides {
            base_path: self.base_path.clone(),
            n_rows_to_load: self.n_rows,
            all_rows: self.all_rows,
            component_tag: self.component_tag.clone(),
        }
        .apply(config)
    }

    fn declare(&self) -> FilterResult<(DatacompConfig, Pipeline)> {
        let config = self.load_config()?;
        let pipeline = build_pipeline(&config)?;
        Ok((config, pipeline))
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let base = LogLevel::from_str(&cli.log_level).unwrap_or_default();
    init_logging(LogLevel::from_verbosity(base, cli.verbose));

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> FilterResult<()> {
    match command {
        Commands::Compile {
            pipeline,
            output,
            dry_run,
            run_id,
        } => {
            let (config, pipeline) = pipeline.declare()?;
            let options = CompileOptions {
                run_id,
                output_path: Some(output.clone()),
                dry_run,
                component_tag: config.component_tag,
            };

            let compiled = compile(pipeline, Catalog::datacomp(), options)?;
            if dry_run {
                println!("{}", serde_json::to_string_pretty(&compiled.to_compose())?);
            } else {
                info!(
                    "Compiled run '{}' with {} stages to {}",
                    compiled.run_id,
                    compiled.stages.len(),
                    output.display()
                );
                println!("{}", output.display());
            }
        }
        Commands::Validate { pipeline } => {
            let (config, pipeline) = pipeline.declare()?;
            let options = CompileOptions {
                component_tag: config.component_tag,
                ..CompileOptions::dry_run()
            };

            let mut context = CompileContext::new(pipeline, Catalog::datacomp(), options);
            let report = Compiler::standard().run(&mut context)?;
            report.ensure_success()?;

            info!(
                "Validated with the {} compiler in {:.2}ms",
                context.get_metadata("compiler").unwrap_or("unknown"),
                report.total_duration.as_secs_f64() * 1000.0
            );
            if context.get_metadata("linear") != Some("true") {
                return Err(FilterError::GenericError(
                    "pipeline is not a linear chain".to_string(),
                ));
            }
            println!("{}", context.get_metadata("stage_order").unwrap_or_default());
            if let Some(stages) = context
                .get_metadata("accelerated_stages")
                .filter(|s| !s.is_empty())
            {
                println!("GPU stages: {}", stages);
            }
        }
        Commands::Describe { pipeline, format } => {
            let (_, pipeline) = pipeline.declare()?;
            match format {
                Format::Json => println!("{}", serde_json::to_string_pretty(&pipeline)?),
                Format::Text => print_pipeline(&pipeline),
            }
        }
        Commands::Catalog => {
            for spec in Catalog::datacomp().iter() {
                let kind = format!("{:?}", spec.kind);
                println!("{:<20} {:<10} {}", spec.name, kind, spec.description);
            }
        }
    }
    Ok(())
}

fn print_pipeline(pipeline: &Pipeline) {
    println!("{} ({})", pipeline.name(), pipeline.base_path());
    if !pipeline.description().is_empty() {
        println!("  {}", pipeline.description());
    }

    for op in pipeline.ops() {
        println!("- {} [{}]", op.name(), op.reference());
        for (key, value) in &op.arguments {
            println!("    {} = {}", key, value);
        }
        for (field, column) in &op.consumes {
            println!("    consumes {} <- {}", field, column);
        }
        if let Some((accelerator, count)) = op.resources.as_ref().and_then(|r| r.accelerator()) {
            println!("    {} x {}", count, accelerator);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn pipeline_args(argv: &[&str]) -> PipelineArgs {
        let mut full = vec!["datacomp-filter", "validate"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).unwrap().command {
            Commands::Validate { pipeline } => pipeline,
            _ => panic!("expected validate"),
        }
    }

    #[test]
    fn test_row_flags_conflict() {
        let result =
            Cli::try_parse_from(["datacomp-filter", "validate", "--n-rows", "5", "--all-rows"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_all_rows_flag() {
        let config = pipeline_args(&["--all-rows"]).load_config().unwrap();
        assert_eq!(config.n_rows_to_load, None);

        let config = pipeline_args(&["--n-rows", "25"]).load_config().unwrap();
        assert_eq!(config.n_rows_to_load, Some(25));
    }

    #[test]
    fn test_base_path_flag_overrides_config_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"base_path": "gs://bucket/from-file"}}"#).unwrap();
        let path = file.path().display().to_string();

        let config = pipeline_args(&["--config", &path]).load_config().unwrap();
        assert_eq!(config.base_path, "gs://bucket/from-file");

        let config = pipeline_args(&["--config", &path, "--base-path", "gs://bucket/from-cli"])
            .load_config()
            .unwrap();
        assert_eq!(config.base_path, "gs://bucket/from-cli");
    }

    #[test]
    fn test_global_verbosity() {
        let cli = Cli::try_parse_from(["datacomp-filter", "catalog", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::Catalog));
    }
}
