//! CLI argument definitions for aimeta.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::error::PreferenceResult;
use crate::export::ExportFormat;
use crate::llm::{LlmOverrides, Transformation};
use crate::prefs::Scope;

/// aimeta - LM Studio text transforms and image sidecar metadata.
///
/// Preferences resolve as: explicit argument, session, preference store, default.
#[derive(Parser, Debug)]
#[command(name = "aimeta")]
#[command(
    author,
    version,
    about = "Preferences, LLM text transforms and image metadata for a local LM Studio",
    long_about = None
)]
pub struct Cli {
    /// Config file (defaults to <config dir>/aimeta/config.toml)
    #[arg(short = 'c', long, global = true, env = "AIMETA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Preference store location, overriding the config file
    #[arg(long = "preferences-db", global = true, env = "AIMETA_PREFERENCES_DB")]
    pub preferences_db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Which preference layers a command reads or writes.
#[derive(Args, Debug, Clone, Copy, Default)]
pub struct ScopeArgs {
    /// Only use the session; the preference store is not touched
    #[arg(long)]
    pub session_only: bool,

    /// Ignore the session and go straight to the preference store
    #[arg(long)]
    pub skip_session: bool,

    /// Drop the session value so the stored preference applies again
    #[arg(long)]
    pub clear_session: bool,
}

impl ScopeArgs {
    pub fn scope(&self) -> PreferenceResult<Scope> {
        Scope::from_flags(self.session_only, self.skip_session, self.clear_session)
    }
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Language used for translations and image descriptions
    Language {
        #[command(subcommand)]
        command: ValueCommands,
    },

    /// Directories searched for images
    ImageDirs {
        #[command(subcommand)]
        command: DirsCommands,
    },

    /// Directory holding known face images
    FacesDir {
        #[command(subcommand)]
        command: PathCommands,
    },

    /// Location of the image metadata database
    ImageDb {
        #[command(subcommand)]
        command: PathCommands,
    },

    /// Generic access to any named preference
    Pref {
        #[command(subcommand)]
        command: PrefCommands,
    },

    /// LLM connection and generation settings
    Llm {
        #[command(subcommand)]
        command: LlmCommands,
    },

    /// Run text through one of the canned LLM transformations
    ///
    /// Reads the text from stdin when none is given.
    Transform {
        kind: Transformation,

        /// Text to transform
        text: Vec<String>,

        /// Extra instructions appended to the template
        #[arg(long)]
        instructions: Option<String>,

        /// Target language for `translate`
        #[arg(long)]
        language: Option<String>,

        #[command(flatten)]
        llm: LlmOverrides,

        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Write description sidecars for images using the LLM
    DescribeImages {
        /// Directory to process (repeatable, defaults to the image directories preference)
        #[arg(long = "dir")]
        dirs: Vec<PathBuf>,

        /// Skip images that already have a description
        #[arg(long)]
        only_new: bool,

        /// Language for the descriptions
        #[arg(long)]
        language: Option<String>,

        /// Only look at the top level of each directory
        #[arg(long)]
        no_recurse: bool,

        #[command(flatten)]
        llm: LlmOverrides,

        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Find images by keyword and people sidecars
    FindImages {
        #[command(flatten)]
        filter: FilterArgs,

        /// Directory to scan (repeatable, defaults to the image directories preference)
        #[arg(long = "dir")]
        dirs: Vec<PathBuf>,

        #[arg(long)]
        no_recurse: bool,

        /// Print records instead of building the HTML gallery
        #[arg(long)]
        passthru: bool,

        /// Record format for --passthru
        #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,

        /// Write the gallery (or --passthru records) to this file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Build the gallery but do not open a browser
        #[arg(long)]
        no_open: bool,

        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Rebuild the image database from the sidecars on disk
    Index {
        #[arg(long = "dir")]
        dirs: Vec<PathBuf>,

        #[arg(long)]
        no_recurse: bool,

        /// Database file (defaults to the image database preference)
        #[arg(long)]
        image_db: Option<PathBuf>,

        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Search the image database
    SearchIndex {
        #[command(flatten)]
        filter: FilterArgs,

        #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,

        #[arg(long)]
        image_db: Option<PathBuf>,

        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Show image database statistics
    Stats {
        #[arg(long)]
        image_db: Option<PathBuf>,

        /// Print as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Interactive shell; every line shares one session
    Shell,
}

#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Keyword pattern, `*` and `?` wildcards (repeatable, any may match)
    #[arg(short, long = "keyword")]
    pub keywords: Vec<String>,

    /// Person name pattern (repeatable, any may match)
    #[arg(short, long = "person")]
    pub people: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum ValueCommands {
    /// Print the resolved value
    Get {
        /// Explicit value, returned as-is
        value: Option<String>,

        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Store a new value
    Set {
        value: Option<String>,

        #[command(flatten)]
        scope: ScopeArgs,
    },
}

#[derive(Subcommand, Debug)]
pub enum DirsCommands {
    /// Print the resolved directories, one per line
    Get {
        dirs: Vec<PathBuf>,

        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Store directories, creating any that are missing
    Set {
        dirs: Vec<PathBuf>,

        #[command(flatten)]
        scope: ScopeArgs,
    },
}

#[derive(Subcommand, Debug)]
pub enum PathCommands {
    /// Print the resolved path
    Get {
        path: Option<PathBuf>,

        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Store a path, creating its directory
    Set {
        path: Option<PathBuf>,

        #[command(flatten)]
        scope: ScopeArgs,
    },
}

#[derive(Subcommand, Debug)]
pub enum PrefCommands {
    /// Print a preference value, if any layer has one
    Get {
        name: String,

        value: Option<String>,

        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Store a preference value
    Set {
        name: String,

        value: Option<String>,

        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// List stored and session preferences
    List,
}

#[derive(Subcommand, Debug)]
pub enum LlmCommands {
    /// Print the resolved settings and where each came from
    Show {
        #[command(flatten)]
        llm: LlmOverrides,

        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Store one or more settings
    Set {
        #[command(flatten)]
        llm: LlmOverrides,

        #[command(flatten)]
        scope: ScopeArgs,
    },
}
