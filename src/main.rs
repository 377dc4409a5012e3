//! Command-line interface for the SQL engine.

use std::io;
use std::process::ExitCode;

use log::LevelFilter;
use sqlengine::catalog::DatabaseFixture;
use sqlengine::repl::{print_result_set, Repl, ReplConfig};
use sqlengine::{Engine, EngineConfig};

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    // Parse simple command line args.
    let mut fixtures: Vec<String> = Vec::new();
    let mut database: Option<String> = None;
    let mut verbose = false;
    let mut execute: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-l" | "--load" => {
                i += 1;
                match args.get(i) {
                    Some(path) => fixtures.push(path.clone()),
                    None => {
                        eprintln!("Missing value for --load");
                        return ExitCode::FAILURE;
                    }
                }
            }
            "-d" | "--database" => {
                i += 1;
                database = args.get(i).cloned();
            }
            "-v" | "--verbose" => {
                verbose = true;
            }
            "-e" | "--execute" => {
                i += 1;
                execute = args.get(i).cloned();
            }
            "-h" | "--help" => {
                print_help();
                return ExitCode::SUCCESS;
            }
            "--version" => {
                println!("sqlengine v{}", env!("CARGO_PKG_VERSION"));
                return ExitCode::SUCCESS;
            }
            arg => {
                eprintln!("Unknown option: {}", arg);
                return ExitCode::FAILURE;
            }
        }
        i += 1;
    }

    env_logger::Builder::new()
        .filter_level(if verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Warn
        })
        .parse_default_env()
        .init();

    let mut config = EngineConfig::new();
    if let Some(name) = database {
        config = config.default_database(name);
    }

    let engine = match open(config, &fixtures) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = match execute {
        Some(sql) => execute_command(&engine, &sql),
        None => Repl::with_config(engine, ReplConfig::default()).run(),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn open(config: EngineConfig, fixtures: &[String]) -> sqlengine::Result<Engine> {
    let engine = Engine::with_config(config)?;
    for path in fixtures {
        let db = DatabaseFixture::from_path(path)?.build()?;
        engine.add_database(db)?;
    }
    Ok(engine)
}

fn execute_command(engine: &Engine, sql: &str) -> sqlengine::Result<()> {
    let rs = engine.execute(&engine.context(), sql)?;
    print_result_set(&rs, usize::MAX, &mut io::stdout().lock())?;
    Ok(())
}

fn print_help() {
    println!("sqlengine - in-memory SQL engine");
    println!();
    println!("Usage: sqlengine [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -l, --load FILE        Load a JSON database fixture (repeatable)");
    println!("  -d, --database NAME    Current database (default: first loaded)");
    println!("  -e, --execute SQL      Execute SQL and exit");
    println!("  -v, --verbose          Enable debug logging (RUST_LOG overrides)");
    println!("  -h, --help             Show this help message");
    println!("  --version              Show version");
    println!();
    println!("Examples:");
    println!("  sqlengine --load mydb.json");
    println!("  sqlengine --load mydb.json -e 'SELECT * FROM mytable'");
}
