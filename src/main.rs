use std::sync::Arc;

use clap::Parser;
use env_logger::{Builder, Env};
use hades_backup::activity::ActivityLog;
use hades_backup::cli::{Cli, Command, ListArgs, TagCommand};
use hades_backup::config::{self, Config};
use hades_backup::report::{self, json, table};
use hades_backup::store::{BackupStore, Outcome};

fn init_logger(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    Builder::from_env(Env::default().default_filter_or(default))
        .format_timestamp_secs()
        .init();
}

/// Prints the message and exits non-zero on failure.
fn report_outcome<T>(outcome: Outcome<T>) -> T {
    match outcome.value {
        Some(value) => {
            println!("{}", outcome.message);
            value
        }
        None => {
            eprintln!("{}", outcome.message);
            std::process::exit(1);
        }
    }
}

fn remember_tag(store: &BackupStore, tag: &str) {
    if let Err(e) = config::set_last_tag(store.layout(), tag) {
        log::warn!("could not record last used tag: {e}");
    }
}

fn list(store: &BackupStore, args: &ListArgs) {
    let filter = if args.last_tag {
        match config::last_tag(store.layout()) {
            Some(tag) => Some(tag),
            None => {
                eprintln!("No last used tag recorded.");
                std::process::exit(1);
            }
        }
    } else {
        args.tag.clone()
    };

    if let Some(tag) = &filter {
        if !store.tags().exists(tag) {
            eprintln!("Tag '{tag}' does not exist");
            std::process::exit(1);
        }
        remember_tag(store, tag);
    }

    let ids = report::listed_ids(store, filter.as_deref());

    let rows = report::snapshot_rows(store, &ids);
    if args.json {
        println!("{}", json::render(&rows));
    } else {
        print!("{}", table::render_snapshots(&rows, args.meta));
    }
}

fn main() {
    let cli = Cli::parse();
    init_logger(cli.global.verbose);

    let config = match Config::from_args(&cli.global) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    let layout = config.layout();
    let activity = Arc::new(ActivityLog::with_file(layout.log_file()));
    let store = BackupStore::new(layout, activity);

    match cli.command {
        Command::Backup(args) => {
            report_outcome(store.create(&args.tags, args.note.as_deref()));
        }
        Command::List(args) => list(&store, &args),
        Command::ListTags(args) => {
            let rows = report::tag_rows(&store, args.counts);
            if args.json {
                println!("{}", json::render(&rows));
            } else {
                print!("{}", table::render_tags(&rows));
            }
        }
        Command::Info(args) => match store.info(&args.id) {
            Ok(info) => print!("{}", table::render_info(&info)),
            Err(e) => {
                eprintln!("{e}");
                std::process::exit(1);
            }
        },
        Command::Restore(args) => {
            report_outcome(store.restore(&args.id));
        }
        Command::RestoreTag(args) => {
            report_outcome(store.restore_by_tag(&args.tag));
            remember_tag(&store, &args.tag);
        }
        Command::Delete(args) => {
            report_outcome(store.delete_snapshot(&args.id));
        }
        Command::Tag(command) => match command {
            TagCommand::Create(args) => {
                report_outcome(store.create_tag(&args.tag));
                remember_tag(&store, &args.tag);
            }
            TagCommand::Rename { old, new } => {
                report_outcome(store.rename_tag(&old, &new));
                if config::last_tag(store.layout()).as_deref() == Some(old.as_str()) {
                    remember_tag(&store, &new);
                }
            }
            TagCommand::Delete(args) => {
                report_outcome(store.delete_tag(&args.tag));
            }
            TagCommand::Merge { source, target } => {
                report_outcome(store.merge_tags(&source, &target));
                if config::last_tag(store.layout()).as_deref() == Some(source.as_str()) {
                    remember_tag(&store, &target);
                }
            }
            TagCommand::Last => match config::last_tag(store.layout()) {
                Some(tag) => println!("{tag}"),
                None => {
                    eprintln!("No last used tag recorded.");
                    std::process::exit(1);
                }
            },
        },
    }
}
