use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hades-backup")]
#[command(about = "Snapshot, tag and restore Hades save data")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Clone, Default)]
pub struct GlobalArgs {
    /// Live save directory (overrides HADES_SAVE_DIR and the settings file)
    #[arg(long, global = true)]
    pub save_dir: Option<PathBuf>,

    /// Directory holding snapshots and tags (overrides HADES_BACKUP_ROOT)
    #[arg(long, global = true)]
    pub backup_root: Option<PathBuf>,

    /// Settings file to read instead of the default location
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Show info-level log output on stderr
    #[arg(long, short = 'v', global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Copy the live save directory into a new snapshot
    Backup(BackupArgs),

    /// List snapshots, newest first
    List(ListArgs),

    /// List known tags
    ListTags(ListTagsArgs),

    /// Show a snapshot's tags, note and size
    Info(SnapshotArgs),

    /// Replace the live save directory with a snapshot
    Restore(SnapshotArgs),

    /// Restore the most recent snapshot carrying a tag
    RestoreTag(TagArgs),

    /// Delete a snapshot and remove it from its tags
    Delete(SnapshotArgs),

    /// Create, rename, delete or merge tags
    #[command(subcommand)]
    Tag(TagCommand),
}

#[derive(Parser)]
pub struct BackupArgs {
    /// Tag to apply (repeatable)
    #[arg(long = "tag", short = 't')]
    pub tags: Vec<String>,

    /// Free-text note, also appended to the snapshot name
    #[arg(long, short = 'n')]
    pub note: Option<String>,
}

#[derive(Parser)]
pub struct ListArgs {
    /// Show tags and note for each snapshot
    #[arg(long, default_value_t = false)]
    pub meta: bool,

    /// Only show snapshots carrying this tag
    #[arg(long)]
    pub tag: Option<String>,

    /// Filter by the last used tag
    #[arg(long, conflicts_with = "tag", default_value_t = false)]
    pub last_tag: bool,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Parser)]
pub struct ListTagsArgs {
    /// Show how many snapshots carry each tag
    #[arg(long, default_value_t = false)]
    pub counts: bool,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Parser)]
pub struct SnapshotArgs {
    /// Snapshot id as shown by `list`
    pub id: String,
}

#[derive(Parser)]
pub struct TagArgs {
    pub tag: String,
}

#[derive(Subcommand)]
pub enum TagCommand {
    /// Create an empty tag
    Create(TagArgs),

    /// Rename a tag
    Rename { old: String, new: String },

    /// Delete a tag (snapshots are kept)
    Delete(TagArgs),

    /// Move every snapshot of SOURCE into TARGET and delete SOURCE
    Merge { source: String, target: String },

    /// Print the last used tag
    Last,
}
