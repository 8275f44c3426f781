use clap::error::ErrorKind;
use clap::{Parser, Subcommand, ValueEnum, ValueHint};
use clap_complete::Shell;
use fontget_core::InstallationScope;
use std::path::PathBuf;

/// Installation scope as accepted on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScopeArg {
    /// Current user only
    User,
    /// All users, requires elevation
    Machine,
}

impl From<ScopeArg> for InstallationScope {
    fn from(scope: ScopeArg) -> Self {
        match scope {
            ScopeArg::User => InstallationScope::User,
            ScopeArg::Machine => InstallationScope::Machine,
        }
    }
}

/// Font package manager: install, export, import and back up fonts from catalog sources
#[derive(Parser)]
#[command(name = "fontget")]
#[command(about = "Install, export, import and back up fonts from catalog sources", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Simulate actions without changing system state
    #[arg(
        global = true,
        long,
        help = "Print intended actions without writing fonts, archives or sources"
    )]
    pub dry_run: bool,

    /// Reduce output to errors only
    #[arg(
        global = true,
        long,
        help = "Silence routine status output",
        conflicts_with = "verbose"
    )]
    pub quiet: bool,

    /// Show additional status output
    #[arg(
        global = true,
        long,
        help = "Show verbose status messages",
        conflicts_with = "quiet"
    )]
    pub verbose: bool,

    /// Ignore cached catalogs
    #[arg(global = true, long, help = "Re-fetch source catalogs even when the cache is fresh")]
    pub refresh: bool,

    /// Output as JSON (deterministic ordering)
    #[arg(global = true, long, help = "Output results as JSON")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Install fonts from the catalog
    #[command(alias = "install")]
    Add {
        #[arg(
            value_name = "ID|NAME",
            num_args = 1..,
            required = true,
            help = "Font IDs (google.roboto) or display names to install"
        )]
        fonts: Vec<String>,

        #[arg(short, long, value_enum, help = "Target scope (default: user)")]
        scope: Option<ScopeArg>,

        #[arg(short, long, help = "Overwrite font files that already exist")]
        force: bool,
    },

    /// Remove installed fonts
    #[command(aliases = ["uninstall", "rm"])]
    Remove {
        #[arg(
            value_name = "ID|NAME",
            num_args = 1..,
            required = true,
            help = "Font IDs or family names to remove"
        )]
        fonts: Vec<String>,

        #[arg(short, long, value_enum, help = "Scope to remove from (default: user)")]
        scope: Option<ScopeArg>,
    },

    /// List installed fonts with their catalog matches
    #[command(alias = "ls")]
    List {
        #[arg(short, long, value_enum, help = "Only scan this scope")]
        scope: Option<ScopeArg>,

        #[arg(long, value_name = "FAMILY", help = "Only show families containing this text")]
        family: Option<String>,
    },

    /// Search the catalog
    #[command(alias = "s")]
    Search {
        #[arg(help = "Text matched against font ID, name and categories")]
        query: String,
    },

    /// Show catalog details for a font
    Info {
        #[arg(value_name = "ID|NAME")]
        font_id: String,
    },

    /// Export installed fonts to a manifest file
    Export {
        #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
        output: Option<PathBuf>,

        #[arg(long, help = "Include fonts not found in any catalog", conflicts_with = "matched")]
        all: bool,

        #[arg(long, help = "Only include fonts matched to a catalog (default)")]
        matched: bool,

        #[arg(long = "match", value_name = "TEXT", help = "Only export families or IDs containing TEXT")]
        match_filter: Option<String>,

        #[arg(long = "source", value_name = "SOURCE", help = "Only export fonts from this source")]
        source_filter: Option<String>,

        #[arg(short, long, value_enum, help = "Only scan this scope")]
        scope: Option<ScopeArg>,
    },

    /// Install the fonts listed in an export manifest
    Import {
        #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
        file: PathBuf,

        #[arg(short, long, value_enum, help = "Target scope (default: machine when elevated, else user)")]
        scope: Option<ScopeArg>,

        #[arg(short, long, help = "Overwrite font files that already exist")]
        force: bool,
    },

    /// Archive installed fonts into a zip file
    Backup {
        #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
        output: Option<PathBuf>,

        #[arg(short, long, value_enum, help = "Only back up this scope")]
        scope: Option<ScopeArg>,
    },

    /// Manage catalog sources
    Sources {
        #[command(subcommand)]
        command: SourcesCommand,
    },

    /// Generate shell completions
    Completions {
        /// Target shell (bash, zsh, fish, powershell, elvish)
        #[arg(value_enum, help = "Shell to generate completions for")]
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum SourcesCommand {
    /// Show configured sources
    #[command(alias = "ls")]
    List,

    /// Re-fetch every enabled source catalog
    Update,

    /// Enable a source
    Enable { name: String },

    /// Disable a source
    Disable { name: String },

    /// Add a custom source
    Add {
        name: String,

        #[arg(long, help = "Catalog URL (http or https)")]
        url: String,

        #[arg(long, help = "Prefix applied to this source's font IDs")]
        prefix: String,
    },

    /// Remove a custom source
    #[command(alias = "rm")]
    Remove { name: String },
}

/// Map clap error kinds to exit codes (0 for help/version, 1 for other errors)
pub fn exit_code_for_clap_error(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
        _ => 1,
    }
}
