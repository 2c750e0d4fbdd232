//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};
use moorage::util::shell::ColorChoice;
use moorage::util::Shell;

/// Moorage - keeps a multi-package TypeScript workspace wired together
#[derive(Parser)]
#[command(name = "moorage")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output flags shared by every subcommand.
#[derive(Args, Clone, Copy, Debug)]
pub struct GlobalArgs {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Coloring: auto, always, never
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    pub color: ColorChoice,

    /// Disable colored output (same as `--color never`)
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,
}

impl GlobalArgs {
    /// Shell for status output; `json` switches to machine-readable events.
    pub fn shell(&self, json: bool) -> Shell {
        let color = if self.no_color {
            ColorChoice::Never
        } else {
            self.color
        };
        Shell::from_flags(self.quiet, self.verbose, color, json)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the sibling packages a package imports
    Deps(DepsArgs),

    /// Display the workspace dependency tree
    Tree(TreeArgs),

    /// Synchronize project references with actual imports
    Sync(SyncArgs),

    /// Synchronize references and compile a package
    Build(BuildArgs),

    /// Rebuild and restart a package whenever it or its dependencies change
    Watch(WatchArgs),

    /// Run a script from a package descriptor
    Run(RunArgs),

    /// Resolve a module specifier the way the runtime loader does
    Resolve(ResolveArgs),

    /// Print the compiled source served for a module
    Load(LoadArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct DepsArgs {
    /// Package name
    pub package: String,

    /// Print every extracted module reference instead
    #[arg(long)]
    pub mentions: bool,
}

#[derive(Args)]
pub struct TreeArgs {
    /// Root package (defaults to every package)
    pub package: Option<String>,

    /// Maximum depth to display
    #[arg(long)]
    pub depth: Option<usize>,

    /// Invert the tree to show dependents
    #[arg(short, long)]
    pub invert: bool,

    /// Print packages in build order (dependencies first) instead
    #[arg(long, conflicts_with_all = ["invert", "depth"])]
    pub order: bool,
}

#[derive(Args)]
pub struct SyncArgs {
    /// Package to synchronize (defaults to every package)
    pub package: Option<String>,

    /// Also synchronize everything the package depends on
    #[arg(long, requires = "package")]
    pub deep: bool,

    /// Report stale references without writing; exit non-zero if any
    #[arg(long, conflicts_with = "deep")]
    pub check: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum MessageFormat {
    #[default]
    Human,
    Json,
}

#[derive(Args)]
pub struct BuildArgs {
    /// Package name
    pub package: String,

    /// Skip reference synchronization
    #[arg(long)]
    pub no_sync: bool,

    /// Output format for build messages
    #[arg(long, value_enum, default_value_t = MessageFormat::Human)]
    pub message_format: MessageFormat,
}

#[derive(Args)]
pub struct WatchArgs {
    /// Package to supervise
    pub package: String,
}

#[derive(Args)]
pub struct RunArgs {
    /// Package name
    pub package: String,

    /// Script name (defaults to `dev`)
    pub script: Option<String>,

    /// Extra arguments passed to the script
    #[arg(last = true)]
    pub args: Vec<String>,
}

#[derive(Args)]
pub struct ResolveArgs {
    /// Module specifier
    pub specifier: String,

    /// Importing module (path or file:// URL)
    #[arg(long)]
    pub from: Option<String>,
}

#[derive(Args)]
pub struct LoadArgs {
    /// Module path or file:// URL
    pub module: String,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}
