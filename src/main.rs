use clap::{Parser, Subcommand};
use hof_analysis::config::AnalysisConfig;
use hof_analysis::experiment::Experiment;
use hof_analysis::hof;
use hof_analysis::naming::Labeling;
use hof_analysis::report::Report;
use hof_analysis::tsp::{TspConfig, TspReport};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "hof-analysis")]
#[command(version, about = "Read and compare the results of evolutionary algorithm experiments")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output, repeat for more detail
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the genotypes in a Hall of Fame file
    Parse {
        /// Hall of Fame file (*.gen)
        file: PathBuf,

        /// Attribute to read, may be repeated
        #[arg(short, long = "attribute", default_values = ["genotype", "vertpos"])]
        attributes: Vec<String>,

        /// Print the records as JSON
        #[arg(long)]
        json: bool,
    },

    /// Summarize every variant of an experiment
    Summarize {
        /// Experiment directory, containing "HoF", "logs", and "runtimes"
        root: PathBuf,

        /// Analysis settings (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Naming scheme of the result files: mutation, representation, genformat, parameters
        #[arg(short, long)]
        labeling: Option<Labeling>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compare travelling salesman heuristics against the known optima
    Tsp {
        /// Results directory, containing "<instance>/<algorithm>.json"
        results: PathBuf,

        /// Optima and efficiency weights (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

/// The JSON output of the summarize command.
#[derive(Serialize)]
struct SummaryOutput<'a> {
    generated: String,
    root: String,
    config: &'a AnalysisConfig,
    report: &'a Report,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn parse(file: PathBuf, attributes: Vec<String>, json: bool) -> ExitCode {
    let wanted: Vec<&str> = attributes.iter().map(String::as_str).collect();
    let records = match hof::read_file(&file, &wanted) {
        Ok(records) => records,
        Err(err) => {
            tracing::error!("{err}");
            return ExitCode::FAILURE;
        }
    };
    if json {
        let rows: Vec<serde_json::Map<String, serde_json::Value>> = records
            .iter()
            .map(|record| {
                record
                    .iter_in(&wanted)
                    .map(|(key, value)| (key.to_string(), value.into()))
                    .collect()
            })
            .collect();
        match serde_json::to_string_pretty(&rows) {
            Ok(text) => println!("{text}"),
            Err(err) => {
                tracing::error!("{err}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        for record in &records {
            let fields: Vec<String> = record
                .iter_in(&wanted)
                .map(|(key, value)| format!("{key}={value:?}"))
                .collect();
            println!("{}", fields.join(" "));
        }
    }
    ExitCode::SUCCESS
}

fn summarize(root: PathBuf, config: Option<PathBuf>, labeling: Option<Labeling>, json: bool) -> ExitCode {
    let mut config = match config {
        Some(path) => match AnalysisConfig::load(&path) {
            Ok(config) => config,
            Err(err) => {
                tracing::error!("{}: {err}", path.display());
                return ExitCode::FAILURE;
            }
        },
        None => AnalysisConfig::default(),
    };
    if let Some(labeling) = labeling {
        config.labeling = labeling;
    }
    let experiment = Experiment::new(&root);
    let data = match experiment.load(&config) {
        Ok(data) => data,
        Err(err) => {
            tracing::error!("{}: {err}", root.display());
            return ExitCode::FAILURE;
        }
    };
    let report = Report::new(&data, &config);
    if json {
        let output = SummaryOutput {
            generated: chrono::Utc::now().to_rfc3339(),
            root: experiment.root().display().to_string(),
            config: &config,
            report: &report,
        };
        match serde_json::to_string_pretty(&output) {
            Ok(text) => println!("{text}"),
            Err(err) => {
                tracing::error!("{err}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        println!("Experiment {}", root.display());
        println!("Generated {}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"));
        println!();
        print!("{report}");
    }
    ExitCode::SUCCESS
}

fn tsp(results: PathBuf, config: Option<PathBuf>, json: bool) -> ExitCode {
    let config = match config {
        Some(path) => match TspConfig::load(&path) {
            Ok(config) => config,
            Err(err) => {
                tracing::error!("{}: {err}", path.display());
                return ExitCode::FAILURE;
            }
        },
        None => TspConfig::default(),
    };
    let report = match TspReport::load(&results, &config) {
        Ok(report) => report,
        Err(err) => {
            tracing::error!("{}: {err}", results.display());
            return ExitCode::FAILURE;
        }
    };
    if json {
        match serde_json::to_string_pretty(&report) {
            Ok(text) => println!("{text}"),
            Err(err) => {
                tracing::error!("{err}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        print!("{report}");
    }
    ExitCode::SUCCESS
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match cli.command {
        Commands::Parse { file, attributes, json } => parse(file, attributes, json),
        Commands::Summarize {
            root,
            config,
            labeling,
            json,
        } => summarize(root, config, labeling, json),
        Commands::Tsp { results, config, json } => tsp(results, config, json),
    }
}
