//! Mod dependency graph CLI.
//!
//! Provides the `modgraph` binary: import parser and mod-scanner output into
//! a SQLite store, rebuild the derived graph tables, and query them.
//!
//! Exit codes follow one convention across subcommands: 0 clean, 1 medium
//! findings or an unknown entity/mod, 2 high findings, 3 store or I/O
//! failure. Logs go to stderr; results go to stdout.

use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::Level;

use modgraph_core::{EntityKind, IndirectConflict, Severity};
use modgraph_engine::{
    build_dependency_graph, check_compatibility, import_bundle, Direction, EngineConfig,
    EngineError, ImpactQuery, ImpactRow, ImportBundle,
};
use modgraph_storage::SqliteStore;

/// Dependency graph and conflict analysis for game mods.
#[derive(Parser)]
#[command(name = "modgraph", about = "Dependency graph and conflict analysis for game mods")]
struct Cli {
    /// Path to the graph database file.
    #[arg(long, global = true, env = "MODGRAPH_DB_PATH", default_value = "modgraph.db")]
    db: String,

    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Import a JSON bundle, replacing the stored snapshot.
    Import {
        /// Path to the bundle file.
        file: String,
    },

    /// Rebuild transitive references and conflict tables.
    BuildGraph {
        /// Fan-out above which a removal is a chain-amplified caution.
        #[arg(long)]
        fan_out_threshold: Option<usize>,
    },

    /// List what depends on an entity, or what it depends on.
    Impact {
        /// Entity type, e.g. `item` or `entity_class`.
        kind: String,

        /// Entity name.
        name: String,

        #[arg(long, value_enum, default_value = "dependents")]
        direction: DirectionArg,
    },

    /// Show the shortest reference chain between two entities.
    Chain {
        from_kind: String,
        from_name: String,
        to_kind: String,
        to_name: String,
    },

    /// Check a set of mods for conflicts with each other.
    Compat {
        /// Mod names.
        #[arg(required = true)]
        mods: Vec<String>,
    },

    /// Summary statistics of the store and the last build.
    Stats {
        /// Number of top fan-out entities to list.
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum DirectionArg {
    Dependents,
    Dependencies,
}

impl From<DirectionArg> for Direction {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::Dependents => Direction::Dependents,
            DirectionArg::Dependencies => Direction::Dependencies,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let exit_code = match cli.command {
        Commands::Import { file } => run_import(&cli.db, &file, cli.json),
        Commands::BuildGraph { fan_out_threshold } => {
            run_build_graph(&cli.db, fan_out_threshold, cli.json)
        }
        Commands::Impact {
            kind,
            name,
            direction,
        } => run_impact(&cli.db, &EntityKind::from(kind), &name, direction.into(), cli.json),
        Commands::Chain {
            from_kind,
            from_name,
            to_kind,
            to_name,
        } => run_chain(
            &cli.db,
            (&EntityKind::from(from_kind), &from_name),
            (&EntityKind::from(to_kind), &to_name),
            cli.json,
        ),
        Commands::Compat { mods } => run_compat(&cli.db, &mods, cli.json),
        Commands::Stats { top } => run_stats(&cli.db, top, cli.json),
    };
    process::exit(exit_code);
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .init();
}

fn open_store(db_path: &str) -> Result<SqliteStore, i32> {
    SqliteStore::new(db_path).map_err(|e| {
        eprintln!("Error: failed to open database '{}': {}", db_path, e);
        3
    })
}

fn print_json<T: Serialize>(value: &T) {
    let json = serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize result: {}\"}}", e));
    println!("{}", json);
}

/// Exit code of a failed query.
fn query_failure(err: &EngineError) -> i32 {
    eprintln!("Error: {}", err);
    match err {
        EngineError::NotFound { .. } | EngineError::ModNotFound { .. } => 1,
        EngineError::InvalidBundle { .. } | EngineError::StoreUnavailable(_) => 3,
    }
}

/// Execute the import subcommand.
///
/// Returns exit code: 0 = success, 3 = read, parse or store failure.
fn run_import(db_path: &str, file: &str, json: bool) -> i32 {
    let text = match std::fs::read_to_string(file) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("Error: failed to read '{}': {}", file, e);
            return 3;
        }
    };
    let bundle = match ImportBundle::from_json(&text) {
        Ok(bundle) => bundle,
        Err(e) => {
            eprintln!("Error: failed to parse '{}': {}", file, e);
            return 3;
        }
    };
    let mut store = match open_store(db_path) {
        Ok(store) => store,
        Err(code) => return code,
    };

    match import_bundle(&mut store, bundle) {
        Ok(stats) => {
            if json {
                print_json(&stats);
            } else {
                println!(
                    "Imported {} definitions, {} properties, {} references ({} from pointer properties)",
                    stats.definitions, stats.properties, stats.references, stats.pointer_references
                );
                println!(
                    "Imported {} mods, {} operations ({} conflict, {} caution, {} safe), {} patches",
                    stats.mods,
                    stats.operations,
                    stats.conflict,
                    stats.caution,
                    stats.safe,
                    stats.patches
                );
                if stats.supplied_status > 0 {
                    println!("Kept {} impact statuses supplied by the scanner", stats.supplied_status);
                }
                if stats.orphan_properties > 0 {
                    println!("Dropped {} properties of unknown definitions", stats.orphan_properties);
                }
                if stats.class_edges.is_none() {
                    println!("No class hierarchy supplied");
                }
            }
            0
        }
        Err(e) => {
            eprintln!("Error: import failed: {}", e);
            3
        }
    }
}

/// Execute the build-graph subcommand.
///
/// Returns exit code: 0 = clean, 1 = medium findings, 2 = high findings,
/// 3 = store failure.
fn run_build_graph(db_path: &str, fan_out_threshold: Option<usize>, json: bool) -> i32 {
    let mut config = EngineConfig::from_env();
    if let Some(threshold) = fan_out_threshold {
        config = config.with_fan_out_threshold(threshold);
    }
    let mut store = match open_store(db_path) {
        Ok(store) => store,
        Err(code) => return code,
    };

    let report = match build_dependency_graph(&mut store, config) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error: build failed: {}", e);
            return 3;
        }
    };

    if json {
        print_json(&report);
    } else {
        let t = &report.transitive;
        println!(
            "Transitive: {} definitions, {}/{} edges resolved, {} pairs, max depth {}",
            t.definitions_processed, t.edges.edges_resolved, t.edges.edges_total, t.pairs_derived, t.max_depth
        );
        let i = &report.indirect.counts;
        println!("Indirect conflicts: {} high, {} medium, {} low", i.high, i.medium, i.low);
        let p = &report.patches.counts;
        println!("Patch conflicts: {} high, {} medium, {} low", p.high, p.medium, p.low);
        for warning in &report.warnings {
            println!("Warning: {}", warning);
        }
        println!("Build {} ({})", report.build.build_id, report.build.fingerprint);
    }
    report.exit_status()
}

#[derive(Serialize)]
struct ImpactOutput<'a> {
    direction: Direction,
    rows: &'a [ImpactRow],
    conflicts: &'a [IndirectConflict],
}

/// Execute the impact subcommand.
///
/// Returns exit code: 0 = success, 1 = unknown entity, 3 = store failure.
fn run_impact(db_path: &str, kind: &EntityKind, name: &str, direction: Direction, json: bool) -> i32 {
    let store = match open_store(db_path) {
        Ok(store) => store,
        Err(code) => return code,
    };
    let query = ImpactQuery::new(&store);

    let rows = match query.impact(direction, kind, name) {
        Ok(rows) => rows,
        Err(e) => return query_failure(&e),
    };
    let conflicts = match query.conflicts_for(kind, name) {
        Ok(conflicts) => conflicts,
        Err(e) => return query_failure(&e),
    };

    if json {
        print_json(&ImpactOutput {
            direction,
            rows: &rows,
            conflicts: &conflicts,
        });
        return 0;
    }

    let heading = match direction {
        Direction::Dependents => "Dependents",
        Direction::Dependencies => "Dependencies",
    };
    println!("{} of {} '{}': {}", heading, kind, name, rows.len());
    for row in &rows {
        let labels: Vec<&str> = row.reference_types.iter().map(String::as_str).collect();
        println!("  [{}] {} '{}' via {}", row.depth, row.kind, row.name, labels.join(", "));
    }
    if !conflicts.is_empty() {
        println!("Conflicts anchored here:");
        for conflict in &conflicts {
            println!(
                "  {} {}: {}",
                severity_tag(conflict.severity),
                conflict.pattern_name,
                conflict.explanation
            );
        }
    }
    0
}

/// Execute the chain subcommand.
///
/// Returns exit code: 0 = success (chain found or not), 1 = unknown
/// entity, 3 = store failure.
fn run_chain(
    db_path: &str,
    from: (&EntityKind, &str),
    to: (&EntityKind, &str),
    json: bool,
) -> i32 {
    let store = match open_store(db_path) {
        Ok(store) => store,
        Err(code) => return code,
    };

    let chain = match ImpactQuery::new(&store).chain(from.0, from.1, to.0, to.1) {
        Ok(chain) => chain,
        Err(e) => return query_failure(&e),
    };

    if json {
        print_json(&chain);
        return 0;
    }
    match chain {
        Some(hops) => {
            for hop in &hops {
                match &hop.context {
                    Some(context) => println!("  --{}--> {} '{}'", context, hop.kind, hop.name),
                    None => println!("{} '{}'", hop.kind, hop.name),
                }
            }
        }
        None => println!(
            "No reference chain from {} '{}' to {} '{}'",
            from.0, from.1, to.0, to.1
        ),
    }
    0
}

/// Execute the compat subcommand.
///
/// Returns exit code: 0 = compatible, 1 = medium findings or unknown mod,
/// 2 = high findings, 3 = store failure.
fn run_compat(db_path: &str, mods: &[String], json: bool) -> i32 {
    let store = match open_store(db_path) {
        Ok(store) => store,
        Err(code) => return code,
    };

    let report = match check_compatibility(&store, mods) {
        Ok(report) => report,
        Err(e) => return query_failure(&e),
    };

    if json {
        print_json(&report);
    } else {
        let names: Vec<&str> = report.mods.iter().map(|m| m.name.as_str()).collect();
        println!("Compatibility of {}", names.join(", "));
        for finding in &report.findings {
            println!("  {} {}", severity_tag(finding.severity()), finding.explanation());
        }
        let s = &report.summary;
        let verdict = if s.compatible {
            "compatible"
        } else if s.compatible_with_caveats {
            "compatible with caveats"
        } else {
            "incompatible"
        };
        println!(
            "{} findings ({} high, {} medium, {} low): {}",
            s.total, s.high, s.medium, s.low, verdict
        );
    }
    report.exit_status()
}

/// Execute the stats subcommand.
///
/// Returns exit code: 0 = success, 3 = store failure.
fn run_stats(db_path: &str, top: usize, json: bool) -> i32 {
    let store = match open_store(db_path) {
        Ok(store) => store,
        Err(code) => return code,
    };

    let stats = match ImpactQuery::new(&store).stats(top) {
        Ok(stats) => stats,
        Err(e) => return query_failure(&e),
    };

    if json {
        print_json(&stats);
        return 0;
    }
    let c = &stats.counts;
    println!(
        "Definitions: {}  References: {}  Transitive pairs: {}",
        c.definitions, c.references, c.transitive
    );
    println!("Mods: {}  Operations: {}  Patches: {}", c.mods, c.operations, c.patches);
    println!(
        "Indirect conflicts: {} high, {} medium, {} low",
        stats.indirect.high, stats.indirect.medium, stats.indirect.low
    );
    println!(
        "Patch conflicts: {} high, {} medium, {} low",
        stats.patch.high, stats.patch.medium, stats.patch.low
    );
    if !stats.top_fan_out.is_empty() {
        println!("Top fan-out:");
        for entry in &stats.top_fan_out {
            println!("  {:>6}  {} '{}'", entry.fan_out, entry.kind, entry.name);
        }
    }
    match &stats.last_build {
        Some(build) => println!("Last build: {} ({})", build.build_id, build.fingerprint),
        None => println!("No graph built yet"),
    }
    0
}

fn severity_tag(severity: Severity) -> &'static str {
    match severity {
        Severity::High => "[HIGH]",
        Severity::Medium => "[MEDIUM]",
        Severity::Low => "[LOW]",
    }
}
