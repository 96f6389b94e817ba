//! Binary entry point: load settings, start one background task through the
//! task manager, stream its status lines to stderr and print the result.
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use divan_search::{
    SearchParameters, SearchScope, Settings, TaskManager, TaskOutcome, UpdateCheckParameters,
};

#[derive(Parser, Debug)]
#[command(name = "divan-search", version, about = "Search a verse database in the background")]
struct Args {
    /// Verse database (also: DIVAN_DB)
    #[arg(long)]
    database: Option<PathBuf>,

    /// Worker threads (also: DIVAN_THREADS)
    #[arg(long)]
    threads: Option<usize>,

    /// Suppress progress lines
    #[arg(short, long)]
    quiet: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Find verses containing every phrase
    Search {
        /// AND-ed terms; `x==` rhyme, `x=` radif, `%` and `%%` wildcards
        #[arg(required = true)]
        phrases: Vec<String>,

        /// Restrict to one poet id
        #[arg(long, conflicts_with = "titles")]
        poet: Option<i64>,

        /// Match poem titles instead of verses
        #[arg(long)]
        titles: bool,

        /// Drop verses containing this term (repeatable)
        #[arg(short = 'x', long = "exclude")]
        excluded: Vec<String>,

        /// Remove this fragment before matching (repeatable)
        #[arg(long)]
        strip: Vec<String>,

        /// Park the task and release it through the queued path
        #[arg(long)]
        queued: bool,
    },
    /// Fetch the latest version information
    CheckUpdate {
        /// Mark the check as automatic rather than user-initiated
        #[arg(long)]
        background: bool,
    },
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.debug);

    let mut settings = Settings::load().context("failed to load settings")?;
    if let Some(database) = args.database {
        settings.database = database;
    }
    if let Some(threads) = args.threads {
        settings.worker_threads = threads;
    }
    if args.quiet {
        settings.display_full_notification = false;
    }
    settings.validate()?;

    let manager = TaskManager::new(&settings);

    let (handle, queued) = match args.command {
        Command::Search {
            phrases,
            poet,
            titles,
            excluded,
            strip,
            queued,
        } => {
            let scope = if titles {
                SearchScope::Titles
            } else {
                poet.map(SearchScope::from_poet_id).unwrap_or(SearchScope::All)
            };
            let params = SearchParameters::new(settings.database.clone(), scope, phrases)
                .with_excluded(excluded)
                .with_strip(strip);
            (manager.start_task(params, queued)?, queued)
        }
        Command::CheckUpdate { background } => {
            let params = UpdateCheckParameters::new(!background, settings.update_mirrors.clone());
            (manager.start_task(params, false)?, false)
        }
    };

    if queued {
        manager.start_queued_tasks();
    }

    let outcome = handle.wait_with_status(|status| eprintln!("{status}"))?;
    match outcome {
        TaskOutcome::Search(results) => {
            for (poem_id, found) in results.iter() {
                println!("{poem_id}\t{found}");
            }
            eprintln!(
                "{} match(es) in {} poem(s)",
                results.len(),
                results.poem_count()
            );
        }
        TaskOutcome::UpdateCheck(report) => println!("{report}"),
    }

    manager.finish();
    Ok(())
}
