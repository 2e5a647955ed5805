use clap::{Arg, Command};
use component_triage::config::Config;
use component_triage::engine::{ActionEngine, LogExecutor, StdinPrompter};
use component_triage::facts::FactReducer;
use component_triage::history::CommentHistory;
use component_triage::matcher::MetadataMatcher;
use component_triage::members::{FileMemberDirectory, MembersCache};
use component_triage::metadata::{ComponentMetadata, LabelCatalog};
use component_triage::resume::ResumeFile;
use component_triage::source::SnapshotDirectory;
use component_triage::triager::request_shutdown;
use component_triage::{FactPipeline, Triager};
use log::LevelFilter;
use std::path::PathBuf;
use std::process;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

fn main() {
    let matches = Command::new("component-triage")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Component matching and action reconciliation for issue and pull request triage")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("/etc/component-triage.yaml"),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Generate a default configuration file")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("test-config")
                .long("test-config")
                .help("Compile path patterns and load component metadata, then exit")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("items")
                .long("items")
                .value_name("DIR")
                .help("Directory of item snapshots (overrides items_dir)")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("number")
                .long("number")
                .value_name("N")
                .help("Only triage this issue or pull request number")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("daemon")
                .short('d')
                .long("daemon")
                .help("Repeat triage runs until interrupted")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("interval")
                .long("interval")
                .value_name("SECONDS")
                .help("Seconds between daemon runs (overrides daemonize_interval_seconds)")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .help("Compute actions without executing them")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("force")
                .long("force")
                .help("Execute actions without prompting")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("safe-force")
                .long("safe-force")
                .help("Execute without prompting only when the plan is a safe match")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("pause")
                .long("pause")
                .help("Prompt even when there is nothing to do")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("dump-actions")
                .long("dump-actions")
                .help("Write every non-empty plan to the dump directory")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("resume")
                .long("resume")
                .help("Continue from the last item of an interrupted run")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("show-facts")
                .long("show-facts")
                .help("Print the component facts of every item")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("logfile")
                .long("logfile")
                .value_name("FILE")
                .help("Append log output to this file instead of stderr")
                .action(clap::ArgAction::Set),
        )
        .get_matches();

    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let mut logger = env_logger::Builder::from_default_env();
    logger.filter_level(log_level);
    if let Some(logfile) = matches.get_one::<String>("logfile") {
        match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(logfile)
        {
            Ok(file) => {
                logger.target(env_logger::Target::Pipe(Box::new(file)));
            }
            Err(e) => {
                eprintln!("Error opening log file {logfile}: {e}");
                process::exit(1);
            }
        }
    }
    logger.init();

    if let Some(generate_path) = matches.get_one::<String>("generate-config") {
        generate_default_config(generate_path);
        return;
    }

    let config_path = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or("/etc/component-triage.yaml");
    let mut config = match Config::load_or_default(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e:#}");
            process::exit(1);
        }
    };

    if matches.get_flag("test-config") {
        test_config(&config);
        return;
    }

    let settings = &mut config.actions;
    settings.dry_run |= matches.get_flag("dry-run");
    settings.force |= matches.get_flag("force");
    settings.safe_force |= matches.get_flag("safe-force");
    settings.always_pause |= matches.get_flag("pause");
    settings.dump_actions |= matches.get_flag("dump-actions");
    settings.resume |= matches.get_flag("resume");
    if let Some(items) = matches.get_one::<String>("items") {
        config.items_dir = items.clone();
    }

    let daemon = matches.get_flag("daemon");
    let shutdown = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&shutdown);
    if let Err(e) = ctrlc::set_handler(move || {
        if request_shutdown(&handler_flag, daemon) {
            log::info!("Received shutdown signal, exiting");
            process::exit(130);
        }
        log::info!("Received shutdown signal, finishing current item (Ctrl-C again to exit)");
    }) {
        log::warn!("Failed to install signal handler: {e}");
    }

    let result = run(
        &config,
        matches.get_one::<u64>("number").copied(),
        daemon,
        matches.get_one::<u64>("interval").copied(),
        matches.get_flag("show-facts"),
        &shutdown,
    );
    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn run(
    config: &Config,
    number: Option<u64>,
    daemon: bool,
    interval: Option<u64>,
    show_facts: bool,
    shutdown: &AtomicBool,
) -> anyhow::Result<()> {
    let metadata = ComponentMetadata::from_file(&config.metadata_path)?;
    let catalog = LabelCatalog::from_metadata(&metadata);
    let matcher = MetadataMatcher::new(metadata);

    let mut history = CommentHistory::new(config.bot_names.clone(), config.command_prefix.clone());
    if let Some(members) = &config.members {
        let directory = FileMemberDirectory::new(&members.directory_path);
        let known = MembersCache::new(config.cache_dir()).members(
            &members.organization,
            &directory,
            chrono::Utc::now(),
        )?;
        log::info!("{} members of {}", known.len(), members.organization);
        history = history.with_members(known);
    }

    let pipeline = FactPipeline::new(config, &matcher, &history)?;
    let executor = LogExecutor::new(config.actions.outbox_path.as_ref().map(PathBuf::from));
    let engine = ActionEngine::new(config.actions.clone(), executor, StdinPrompter);

    let mut triager = Triager::new(config, pipeline, &catalog, engine)
        .with_only_number(number)
        .with_show_facts(show_facts);
    if config.actions.resume {
        triager = triager.with_resume(ResumeFile::new(config.cache_dir()));
    }

    let mut source = SnapshotDirectory::new(&config.items_dir);
    if daemon {
        let seconds = interval.unwrap_or(config.daemonize_interval_seconds);
        log::info!("Starting daemon for {} every {seconds}s", config.repo);
        triager.run_daemon(&mut source, Duration::from_secs(seconds), shutdown)
    } else {
        let summary = triager.run(&mut source, shutdown)?;
        println!(
            "Processed {} items: {} applied, {} skipped{}",
            summary.processed,
            summary.applied,
            summary.skipped,
            if summary.aborted { " (aborted)" } else { "" }
        );
        Ok(())
    }
}

fn test_config(config: &Config) {
    println!("Testing configuration...");
    println!("Repository: {}", config.repo);

    match FactReducer::new(&config.patterns) {
        Ok(_) => println!(
            "All path patterns compiled successfully ({} plugin types).",
            config.patterns.plugin_types.len()
        ),
        Err(e) => {
            println!("Configuration validation failed:");
            println!("Error: {e:#}");
            process::exit(1);
        }
    }

    match ComponentMetadata::from_file(&config.metadata_path) {
        Ok(metadata) => {
            println!(
                "Component metadata: {} file entries, {} labels",
                metadata.files.len(),
                metadata.labels.len()
            );
            println!("Configuration is valid.");
        }
        Err(e) => {
            println!("Configuration validation failed:");
            println!("Error: {e:#}");
            process::exit(1);
        }
    }
}

fn generate_default_config(path: &str) {
    let config = Config::default();
    match config.to_file(path) {
        Ok(()) => {
            println!("Default configuration written to: {path}");
            println!("Please edit the configuration file to suit your needs.");
        }
        Err(e) => {
            eprintln!("Error writing configuration file: {e}");
            process::exit(1);
        }
    }
}
