//! Runs a path/value query catalog against one composite index configuration.
#![forbid(unsafe_code)]

use std::error::Error;
use std::io::{self, Write};
use std::path::PathBuf;

use clap::Parser;
use pathbench::{
    executor_for, load_catalog, telemetry, Benchmark, CompositeIndex, EngineUrl, ExecutorKind,
    Settings, TableName,
};

#[derive(Parser, Debug)]
#[command(
    name = "pathbench",
    version,
    about = "Measures path-pattern/value-range query latency under a chosen composite index"
)]
struct Args {
    #[arg(value_name = "CATALOG", help = "Query file with <pattern>;<low>;<high> lines")]
    catalog: PathBuf,

    #[arg(value_name = "TABLE", help = "Table holding kpath/kvalue rows")]
    table: TableName,

    #[arg(value_name = "INDEX", help = "Composite index to enable: vp or pv")]
    index: CompositeIndex,

    #[arg(long, env = "PATHBENCH_DATABASE_URL", help = "postgres:// or sqlite:// URL")]
    database_url: Option<String>,

    #[arg(long, help = "Number of passes over the catalog")]
    repetitions: Option<usize>,

    #[arg(long, value_enum, help = "Query shape used for each measurement")]
    executor: Option<ExecutorKind>,

    #[arg(long, help = "Run the catalog once, unrecorded, before measuring")]
    warmup: bool,

    #[arg(long, value_name = "CSV", help = "Write every measurement to a CSV file")]
    export: Option<PathBuf>,

    #[arg(long, help = "Print the compiled matchers and exit without connecting")]
    dry_run: bool,

    #[arg(long, env = "PATHBENCH_CONFIG", value_name = "FILE", help = "Settings file")]
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
    let settings = Settings::load(args.config.as_deref())?.override_with(
        args.database_url,
        args.repetitions,
        args.executor,
        args.warmup,
    );
    let catalog = load_catalog(&args.catalog)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if args.dry_run {
        for query in &catalog {
            writeln!(
                out,
                "{};{};{};{}",
                query.pattern,
                query.matcher(),
                query.low,
                query.high
            )?;
        }
        return Ok(());
    }

    let url = EngineUrl::parse(settings.database_url())?;
    let executor = executor_for(settings.executor(), args.table.clone());
    let mut bench = Benchmark::new(catalog, args.table, args.index.into())
        .with_repetitions(settings.repetitions())
        .with_warmup(settings.warmup());
    bench.run(|| url.connect(), executor.as_ref(), &mut out)?;

    if let Some(path) = args.export {
        bench.export_csv(&path)?;
    }
    Ok(())
}
