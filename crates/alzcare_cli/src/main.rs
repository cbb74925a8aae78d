//! `alzcare`: command-line host for the MRI dashboard core.
//!
//! History, audit trail and config live under the OS data dir
//! (`--data-dir` overrides it). Logs go to stderr; set `RUST_LOG` for detail.

mod paths;
mod session;

use std::fs;
use std::path::PathBuf;
use std::process;

use alzcare::prelude::*;
use alzcare::report::SCORE_DISCLAIMER;
use serde::Serialize;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use paths::AppPaths;
use session::{Analysis, Session};

fn usage() -> ! {
    eprintln!("alzcare - longitudinal MRI stage history");
    eprintln!("Usage: alzcare [--data-dir DIR] [--endpoint URL] <command> [args]\n");
    eprintln!("Commands:");
    eprintln!("  analyze <image> [--json]            Classify an MRI scan and record it");
    eprintln!("  history [--json]                    List analyses, most recent first");
    eprintln!("  view [--json]                       Latest result, trend and score series");
    eprintln!("  export [--id ID] [--format json|text] [--out PATH]");
    eprintln!("                                      Write a report (whole history by default)");
    eprintln!("  delete <id>                         Remove one analysis");
    eprintln!("  audit log <email> <admin|clinician> [--ip ADDR]");
    eprintln!("  audit list | audit clear            Inspect or reset the login trail");
    eprintln!("  config                              Show the effective configuration");
    eprintln!("  paths                               Show data directory locations");
    process::exit(1);
}

fn fail(msg: &str) -> ! {
    eprintln!("{msg}");
    process::exit(1);
}

struct GlobalOpts {
    data_dir: Option<PathBuf>,
    endpoint: Option<String>,
}

fn parse_args() -> (GlobalOpts, Vec<String>) {
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let mut opts = GlobalOpts {
        data_dir: None,
        endpoint: None,
    };

    while args.len() >= 2 && args[0].starts_with("--") {
        match args[0].as_str() {
            "--data-dir" => opts.data_dir = Some(PathBuf::from(&args[1])),
            "--endpoint" => opts.endpoint = Some(args[1].clone()),
            _ => break,
        }
        args.drain(0..2);
    }

    if args.is_empty() {
        usage();
    }
    (opts, args)
}

/// Removes `--name VALUE` from `args` and returns the value.
fn take_opt(args: &mut Vec<String>, name: &str) -> Option<String> {
    let pos = args.iter().position(|a| a == name)?;
    if pos + 1 >= args.len() {
        fail(&format!("{name} needs a value"));
    }
    let value = args.remove(pos + 1);
    args.remove(pos);
    Some(value)
}

/// Removes a bare `--name` flag from `args`.
fn take_flag(args: &mut Vec<String>, name: &str) -> bool {
    match args.iter().position(|a| a == name) {
        Some(pos) => {
            args.remove(pos);
            true
        }
        None => false,
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(paths: &AppPaths, endpoint: Option<String>) -> Result<AppConfig, ConfigError> {
    let mut cfg = AppConfig::load(&paths.config_file())?;
    cfg.apply_env_overrides();
    if let Some(url) = endpoint {
        cfg.inference.endpoint = Some(url);
    }
    cfg.validate()?;
    debug!("config: {:?}", cfg);
    Ok(cfg)
}

#[derive(Serialize)]
struct AnalysisOutput<'a> {
    record: &'a PredictionRecord,
    source: Source,
    fallback_reason: Option<String>,
    persisted: bool,
    cognitive_score: u8,
}

fn print_record(r: &PredictionRecord, scoring: &ScoringConfig) {
    println!(
        "{}  {}  {:<20} {:>5.1}% ({})  score={}",
        r.id(),
        r.timestamp().format("%Y-%m-%d %H:%M:%S"),
        r.stage().label(),
        r.confidence_percent(),
        r.reliability(scoring.reliability_threshold).label(),
        cognitive_score(r.stage(), r.confidence(), scoring),
    );
}

fn print_analysis(a: &Analysis, scoring: &ScoringConfig) {
    print_record(&a.record, scoring);
    println!("  {}", a.record.stage().description());
    if a.source == Source::Synthetic {
        println!("  (offline estimate: inference service unavailable)");
    }
    if let Durability::SessionOnly(e) = &a.durability {
        println!("  warning: not saved to disk: {e}");
    }
}

fn print_view(records: &[PredictionRecord], scoring: &ScoringConfig) {
    let view = derive_view(records, scoring);
    let Some(latest) = view.latest else {
        println!("No analyses recorded.");
        return;
    };
    println!("Latest:   {} ({:.1}%)", latest.stage(), latest.confidence_percent());
    if let Some(prev) = view.previous {
        println!("Previous: {} ({:.1}%)", prev.stage(), prev.confidence_percent());
    }
    println!("Trend:    {}", view.trend.label());
    if let Some(score) = view.latest_score {
        println!("Score:    {score}/100");
    }
    println!(
        "Records:  {} ({} low reliability)",
        view.stats.total, view.stats.low_reliability
    );
    println!();
    for p in &view.series {
        println!(
            "  {:<7} {:<20} rank={} conf={:>5.1}% score={:>3}",
            p.date,
            p.stage.label(),
            p.severity_rank,
            p.confidence_percent,
            p.cognitive_score
        );
    }
    println!();
    println!("Note: {SCORE_DISCLAIMER}");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let (opts, mut args) = parse_args();
    let paths = AppPaths::new(opts.data_dir)?;
    let cfg = load_config(&paths, opts.endpoint)?;
    let backend = FileStore::new(paths.store_dir());
    let cmd = args.remove(0);

    match cmd.as_str() {
        "analyze" => {
            let json = take_flag(&mut args, "--json");
            let Some(image_path) = args.first() else {
                usage();
            };
            let image = fs::read(image_path)?;
            let store = RecordStore::open(backend)?;
            let mut prng = Prng::from_entropy();
            let gateway = InferenceGateway::from_config(&cfg.inference, prng.fork());
            if !gateway.has_primary() {
                info!("no inference endpoint configured; running offline");
            }
            let session = Session::new(store, gateway, &cfg.inference, prng, SystemClock);

            let analysis = session.analyze(image).await?;
            debug!("gateway: {:?}", session.gateway_stats());
            if json {
                let out = AnalysisOutput {
                    record: &analysis.record,
                    source: analysis.source,
                    fallback_reason: analysis.fallback_reason.as_ref().map(|e| e.to_string()),
                    persisted: analysis.durability.is_persisted(),
                    cognitive_score: cognitive_score(
                        analysis.record.stage(),
                        analysis.record.confidence(),
                        &cfg.scoring,
                    ),
                };
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                print_analysis(&analysis, &cfg.scoring);
            }
        }
        "history" => {
            let json = take_flag(&mut args, "--json");
            let store = RecordStore::open(backend)?;
            if json {
                println!("{}", serde_json::to_string_pretty(store.all())?);
            } else if store.is_empty() {
                println!("No analyses recorded.");
            } else {
                for r in store.all() {
                    print_record(r, &cfg.scoring);
                }
            }
        }
        "view" => {
            let json = take_flag(&mut args, "--json");
            let store = RecordStore::open(backend)?;
            if json {
                let view = derive_view(store.all(), &cfg.scoring);
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                print_view(store.all(), &cfg.scoring);
            }
        }
        "export" => {
            let id = take_opt(&mut args, "--id");
            let format = match take_opt(&mut args, "--format") {
                Some(f) => ReportFormat::parse(&f)
                    .unwrap_or_else(|| fail("format must be 'json' or 'text'")),
                None => ReportFormat::Json,
            };
            let out = take_opt(&mut args, "--out").map(PathBuf::from);

            let store = RecordStore::open(backend)?;
            let now = SystemClock.now();
            let report = match id {
                Some(id) => match store.get(&id) {
                    Some(r) => export_one(r, &cfg.scoring, now),
                    None => fail(&format!("no analysis with id {id}")),
                },
                None => export_all(store.all(), &cfg.scoring, now),
            };
            let bytes = report.encode(format)?;
            let path = match out {
                Some(p) => p,
                None => {
                    let dir = paths.reports_dir();
                    fs::create_dir_all(&dir)?;
                    dir.join(report.file_name(format))
                }
            };
            fs::write(&path, bytes)?;
            info!("report written: {}", path.display());
            println!(
                "Exported {} record(s) to {}",
                report.record_count(),
                path.display()
            );
        }
        "delete" => {
            let Some(id) = args.first() else {
                usage();
            };
            let mut store = RecordStore::open(backend)?;
            match store.remove(id) {
                Some((_, Durability::Persisted)) => println!("Deleted {id}"),
                Some((_, Durability::SessionOnly(e))) => {
                    fail(&format!("delete of {id} not saved: {e}"))
                }
                None => fail(&format!("no analysis with id {id}")),
            }
        }
        "audit" => {
            let mut log = AuditLog::open(backend, cfg.audit.max_entries);
            let sub = args.first().cloned();
            match sub.as_deref() {
                Some("log") => {
                    let ip = take_opt(&mut args, "--ip").unwrap_or_else(|| "127.0.0.1".into());
                    if args.len() < 3 {
                        usage();
                    }
                    let role = Role::parse(&args[2])
                        .unwrap_or_else(|| fail("role must be 'admin' or 'clinician'"));
                    let mut prng = Prng::from_entropy();
                    let entry =
                        AuditLogEntry::new_login(&mut prng, &args[1], role, SystemClock.now(), ip);
                    if let Durability::SessionOnly(e) = log.record(entry) {
                        fail(&format!("audit entry not saved: {e}"));
                    }
                }
                Some("list") | None => {
                    if log.entries().is_empty() {
                        println!("No logins recorded.");
                    }
                    for e in log.entries() {
                        println!(
                            "{}  {}  {:<10} {:<30} {}",
                            e.id,
                            e.timestamp.format("%Y-%m-%d %H:%M:%S"),
                            e.role.as_str(),
                            e.email,
                            e.ip
                        );
                    }
                }
                Some("clear") => {
                    log.clear();
                    println!("Audit log cleared");
                }
                Some(other) => fail(&format!("unknown audit command: {other}")),
            }
        }
        "config" => {
            println!("{}", serde_json::to_string_pretty(&cfg)?);
        }
        "paths" => {
            println!("Data directory: {}", paths.data_dir().display());
            println!("Store:          {}", paths.store_dir().display());
            println!("Config file:    {}", paths.config_file().display());
            println!("Reports:        {}", paths.reports_dir().display());
        }
        other => {
            warn!("unknown command: {other}");
            usage();
        }
    }

    Ok(())
}
