//! CLI argument parsing and command dispatch.
//!
//! This module provides the command-line interface for tandem using clap's derive API.
//! Each command has its own argument struct with validation and helpful error messages.
//!
//! # Commands
//!
//! - `init`: Initialize a new tandem repository
//! - `load`: Load a batch of features from a JSON file
//! - `list` / `show` / `status`: Inspect features and progress
//! - `dep` / `ingest`: Add dependency edges
//! - `claim` / `pass` / `release`: Work on features
//! - `skip` / `cascade-skip` / `impact`: Skip features and see who waits on them
//! - `block` / `unblock`: Park features on external blockers
//! - `graph`: Export the dependency graph
//!
//! # Global Flags
//!
//! - `--json`: Output in JSON format (applies to all commands)
//!
//! # Example
//!
//! ```bash
//! tandem init
//! tandem load features.json
//! tandem claim agent-1
//! tandem pass 3 --mocks
//! tandem skip 4 --reason "waiting on payment sandbox"
//! ```

mod args;
mod execute;
mod types;
mod validators;

use anyhow::Result;
use clap::{Parser, Subcommand};

// Re-export argument structs
pub use args::{
    BlockArgs, ClaimArgs, DepArgs, FeatureIdArgs, GraphArgs, ImpactArgs, IngestArgs, InitArgs,
    ListArgs, LoadArgs, PassArgs, ShowArgs, SkipArgs,
};

// Re-export types
pub use types::{BlockerKindArg, FeatureStatusArg};

// Re-export validators for external use
pub use validators::{validate_depth, validate_feature_id, validate_reason, validate_worker};

/// Tandem - dependency-aware work scheduler
///
/// Hands features to concurrent workers in priority order, never before their
/// prerequisites pass. State lives in `.tandem/features.jsonl`.
#[derive(Parser, Debug)]
#[command(name = "tandem")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output in JSON format for programmatic use
    #[arg(long, global = true)]
    pub json: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Initialize a new tandem repository
    ///
    /// Creates the `.tandem/` directory with configuration and an empty
    /// features file. Run this once in your project root.
    Init(InitArgs),

    /// Load features from a JSON file
    ///
    /// The whole batch is rejected if any ID already exists or the declared
    /// dependencies would form a cycle.
    Load(LoadArgs),

    /// List features with an optional status filter
    List(ListArgs),

    /// Show a feature with its dependencies and dependents
    Show(ShowArgs),

    /// Show progress counts
    Status,

    /// Add an explicit dependency: FROM waits for TO
    Dep(DepArgs),

    /// Ingest detected dependency candidates from a JSONL file
    ///
    /// Candidates below the configured confidence floor, self-edges and
    /// cycle-closing edges are dropped and counted in the report.
    Ingest(IngestArgs),

    /// Claim the next ready feature for a worker
    Claim(ClaimArgs),

    /// Mark an in-progress feature as passing
    Pass(PassArgs),

    /// Return an in-progress feature to the back of the queue
    ///
    /// Prints the impact on dependent features so the caller can decide
    /// whether to cascade.
    Skip(SkipArgs),

    /// Skip a feature and every direct dependent that can still be skipped
    #[command(name = "cascade-skip")]
    CascadeSkip(SkipArgs),

    /// Block a feature on something outside the scheduler
    Block(BlockArgs),

    /// Return a blocked or parked feature to pending
    Unblock(FeatureIdArgs),

    /// Give up a claim without skipping
    Release(FeatureIdArgs),

    /// Analyze what skipping a feature would affect
    Impact(ImpactArgs),

    /// Export the dependency graph
    Graph(GraphArgs),
}

impl Cli {
    /// Parse CLI arguments from command line
    #[must_use]
    pub fn parse_args() -> Self {
        <Self as Parser>::parse()
    }

    /// Parse CLI arguments from an iterator (for testing)
    ///
    /// # Errors
    ///
    /// Returns the clap error for invalid arguments.
    pub fn try_parse_from<I, T>(iter: I) -> std::result::Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(iter)
    }

    /// Execute the CLI command
    ///
    /// # Errors
    ///
    /// Propagates repository, storage and scheduling errors.
    pub async fn execute(&self) -> Result<()> {
        use crate::app::App;
        use crate::output::OutputMode;

        let output_mode = if self.json {
            OutputMode::Json
        } else {
            OutputMode::Text
        };

        let Some(command) = &self.command else {
            println!("Tandem dependency-aware work scheduler");
            println!("Use --help for more information");
            return Ok(());
        };

        match command {
            Commands::Init(args) => execute::execute_init(args, output_mode).await,
            Commands::Load(args) => {
                let app = App::from_directory(&std::env::current_dir()?).await?;
                execute::execute_load(&app, args, output_mode).await
            }
            Commands::List(args) => {
                let app = App::from_directory(&std::env::current_dir()?).await?;
                execute::execute_list(&app, args, output_mode).await
            }
            Commands::Show(args) => {
                let app = App::from_directory(&std::env::current_dir()?).await?;
                execute::execute_show(&app, args, output_mode).await
            }
            Commands::Status => {
                let app = App::from_directory(&std::env::current_dir()?).await?;
                execute::execute_status(&app, output_mode).await
            }
            Commands::Dep(args) => {
                let app = App::from_directory(&std::env::current_dir()?).await?;
                execute::execute_dep(&app, args, output_mode).await
            }
            Commands::Ingest(args) => {
                let app = App::from_directory(&std::env::current_dir()?).await?;
                execute::execute_ingest(&app, args, output_mode).await
            }
            Commands::Claim(args) => {
                let app = App::from_directory(&std::env::current_dir()?).await?;
                execute::execute_claim(&app, args, output_mode).await
            }
            Commands::Pass(args) => {
                let app = App::from_directory(&std::env::current_dir()?).await?;
                execute::execute_pass(&app, args, output_mode).await
            }
            Commands::Skip(args) => {
                let app = App::from_directory(&std::env::current_dir()?).await?;
                execute::execute_skip(&app, args, output_mode).await
            }
            Commands::CascadeSkip(args) => {
                let app = App::from_directory(&std::env::current_dir()?).await?;
                execute::execute_cascade_skip(&app, args, output_mode).await
            }
            Commands::Block(args) => {
                let app = App::from_directory(&std::env::current_dir()?).await?;
                execute::execute_block(&app, args, output_mode).await
            }
            Commands::Unblock(args) => {
                let app = App::from_directory(&std::env::current_dir()?).await?;
                execute::execute_unblock(&app, args, output_mode).await
            }
            Commands::Release(args) => {
                let app = App::from_directory(&std::env::current_dir()?).await?;
                execute::execute_release(&app, args, output_mode).await
            }
            Commands::Impact(args) => {
                let app = App::from_directory(&std::env::current_dir()?).await?;
                execute::execute_impact(&app, args, output_mode).await
            }
            Commands::Graph(_) => {
                let app = App::from_directory(&std::env::current_dir()?).await?;
                execute::execute_graph(&app, output_mode).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FeatureId;
    use rstest::rstest;

    // ========== CLI Parsing Tests ==========

    #[test]
    fn test_parse_no_command() {
        let cli = Cli::try_parse_from(["tandem"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.json);
    }

    #[test]
    fn test_parse_global_json_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["tandem", "list", "--json"]).unwrap();
        assert!(cli.json);
        assert!(matches!(cli.command, Some(Commands::List(_))));
    }

    #[test]
    fn test_parse_list_with_status() {
        let cli = Cli::try_parse_from(["tandem", "list", "--status", "in-progress"]).unwrap();
        match cli.command {
            Some(Commands::List(args)) => {
                assert_eq!(args.status, Some(FeatureStatusArg::InProgress));
            }
            _ => panic!("Expected List command"),
        }
    }

    #[test]
    fn test_parse_dep() {
        let cli = Cli::try_parse_from(["tandem", "dep", "3", "#1"]).unwrap();
        match cli.command {
            Some(Commands::Dep(args)) => {
                assert_eq!(args.from, FeatureId(3));
                assert_eq!(args.to, FeatureId(1));
            }
            _ => panic!("Expected Dep command"),
        }
    }

    #[test]
    fn test_parse_claim() {
        let cli = Cli::try_parse_from(["tandem", "claim", "agent-7"]).unwrap();
        match cli.command {
            Some(Commands::Claim(args)) => assert_eq!(args.worker, "agent-7"),
            _ => panic!("Expected Claim command"),
        }
    }

    #[rstest]
    #[case::plain(&["tandem", "pass", "4"], false)]
    #[case::mocks(&["tandem", "pass", "4", "--mocks"], true)]
    fn test_parse_pass(#[case] argv: &[&str], #[case] mocks: bool) {
        let cli = Cli::try_parse_from(argv).unwrap();
        match cli.command {
            Some(Commands::Pass(args)) => {
                assert_eq!(args.id, FeatureId(4));
                assert_eq!(args.mocks, mocks);
            }
            _ => panic!("Expected Pass command"),
        }
    }

    #[test]
    fn test_parse_skip_requires_reason() {
        assert!(Cli::try_parse_from(["tandem", "skip", "2"]).is_err());
        assert!(Cli::try_parse_from(["tandem", "skip", "2", "--reason", "  "]).is_err());

        let cli = Cli::try_parse_from(["tandem", "skip", "2", "-r", "no sandbox"]).unwrap();
        match cli.command {
            Some(Commands::Skip(args)) => assert_eq!(args.reason, "no sandbox"),
            _ => panic!("Expected Skip command"),
        }
    }

    #[test]
    fn test_parse_cascade_skip_uses_kebab_name() {
        let cli =
            Cli::try_parse_from(["tandem", "cascade-skip", "2", "--reason", "dropped"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::CascadeSkip(_))));
    }

    #[test]
    fn test_parse_block() {
        let cli = Cli::try_parse_from([
            "tandem",
            "block",
            "5",
            "--kind",
            "external-service",
            "--description",
            "Stripe sandbox is down",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Block(args)) => {
                assert_eq!(args.kind, BlockerKindArg::ExternalService);
                assert_eq!(args.description, "Stripe sandbox is down");
            }
            _ => panic!("Expected Block command"),
        }
    }

    #[rstest]
    #[case::default(&["tandem", "impact", "1"], None)]
    #[case::explicit(&["tandem", "impact", "1", "--depth", "5"], Some(5))]
    fn test_parse_impact(#[case] argv: &[&str], #[case] depth: Option<usize>) {
        let cli = Cli::try_parse_from(argv).unwrap();
        match cli.command {
            Some(Commands::Impact(args)) => assert_eq!(args.depth, depth),
            _ => panic!("Expected Impact command"),
        }
    }

    #[rstest]
    #[case::bad_id(&["tandem", "show", "abc"])]
    #[case::zero_depth(&["tandem", "impact", "1", "--depth", "0"])]
    #[case::bad_kind(&["tandem", "block", "1", "--kind", "vibes", "-D", "x"])]
    #[case::missing_file(&["tandem", "load"])]
    fn test_parse_rejects_invalid(#[case] argv: &[&str]) {
        assert!(Cli::try_parse_from(argv).is_err());
    }
}
