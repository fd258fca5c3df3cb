use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{DEFAULT_MAX_ARCHIVE_SIZE, LoadLimits};

#[derive(Parser, Debug)]
#[command(name = "tome")]
#[command(version)]
#[command(about = "Inspect and edit .tome archives", long_about = None)]
#[command(after_help = "Examples:\n  \
  tome list -v vol1.tome                 list entries with sizes and dates\n  \
  tome graph vol1.tome                   show chapters and pages in reading order\n  \
  tome set vol1.tome tome.json meta.json replace the root manifest\n  \
  tome resolve ../pages/01.jpg --base ch1/pages.json")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count, global = true)]
    pub quiet: u8,

    /// Largest archive accepted, in bytes
    #[arg(long = "max-size", value_name = "BYTES", global = true, default_value_t = DEFAULT_MAX_ARCHIVE_SIZE)]
    pub max_size: u64,

    /// Accept archives without the .tome extension
    #[arg(long = "any-extension", global = true)]
    pub any_extension: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List archive entries
    List {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Show sizes, compression and dates
        #[arg(short = 'v')]
        verbose: bool,
    },

    /// Show the folder tree
    Tree {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Show the content graph built from the manifests
    Graph {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Check every manifest reference; exits non-zero on errors
    Validate {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Resolve a link as written in a manifest
    Resolve {
        #[arg(value_name = "LINK")]
        link: String,

        /// Path of the file the link appears in
        #[arg(long, value_name = "PATH", default_value = "tome.json")]
        base: String,
    },

    /// Write an entry's content to stdout
    Cat {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        #[arg(value_name = "ENTRY")]
        entry: String,
    },

    /// Replace or add an entry with a local file, refusing invalid JSON or manifests
    Set {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        #[arg(value_name = "ENTRY")]
        entry: String,

        /// Local file holding the new content
        #[arg(value_name = "SOURCE")]
        source: PathBuf,

        /// Write the result here instead of over FILE
        #[arg(short = 'o', value_name = "OUT")]
        output: Option<PathBuf>,
    },

    /// Create a new tome from a template
    New {
        #[arg(value_name = "OUT")]
        output: PathBuf,

        #[arg(long, value_name = "ID")]
        template: Option<String>,

        /// Template catalog file
        #[arg(long, value_name = "CONFIG")]
        templates: Option<PathBuf>,
    },
}

impl Cli {
    pub fn is_quiet(&self) -> bool {
        self.quiet > 0
    }

    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }

    pub fn limits(&self) -> LoadLimits {
        LoadLimits::default()
            .with_max_archive_size(self.max_size)
            .with_tome_extension(!self.any_extension)
    }
}
