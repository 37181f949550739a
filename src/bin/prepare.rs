//! Creates and loads a benchmark table with both composite indexes.
#![forbid(unsafe_code)]

use std::error::Error;
use std::path::PathBuf;

use clap::Parser;
use pathbench::loader::{prepare_table, DEFAULT_BATCH_SIZE};
use pathbench::{telemetry, DatasetReader, EngineUrl, Settings, TableName};
use tracing::warn;

#[derive(Parser, Debug)]
#[command(
    name = "pathbench-prepare",
    version,
    about = "Loads a <path>;<value>;<revision> dataset and builds the vp/pv indexes"
)]
struct Args {
    #[arg(value_name = "DATASET")]
    dataset: PathBuf,

    #[arg(value_name = "TABLE")]
    table: TableName,

    #[arg(long, env = "PATHBENCH_DATABASE_URL")]
    database_url: Option<String>,

    #[arg(
        long,
        default_value_t = 0,
        help = "Import only about this many leading bytes (0 = whole file)"
    )]
    limit_bytes: u64,

    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    #[arg(long, env = "PATHBENCH_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,
}

fn main() {
    telemetry::init();
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let settings =
        Settings::load(args.config.as_deref())?.override_with(args.database_url, None, None, false);
    let url = EngineUrl::parse(settings.database_url())?;
    let mut reader = DatasetReader::open(&args.dataset, args.limit_bytes)?;

    let mut engine = url.connect()?;
    let loaded = prepare_table(engine.as_mut(), &args.table, &mut reader, args.batch_size);
    if let Err(err) = engine.close() {
        warn!(error = %err, "closing connection failed");
    }
    let imported = loaded?;
    println!("imported {imported} records into {}", args.table);
    Ok(())
}
