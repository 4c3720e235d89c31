//! CLI argument parsing module
//!
//! Handles the command-line interface using clap, including:
//! - Global options (config file, store location, colour, verbosity)
//! - Subcommands for importing, listing, showing and deleting documents
//! - Drift detection with severity filtering and output selection
//! - Timeline analysis and backup maintenance

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::ffi::OsString;
use std::path::PathBuf;

use crate::constants::APP_NAME;
use crate::models::Severity;
use crate::output::Format;

/// Release version with the commit it was built from
const LONG_VERSION: &str = concat!(env!("VAINO_VERSION"), " (", env!("GIT_HASH"), ")");

/// Options shared by every subcommand
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalOptions {
    pub config: Option<PathBuf>,
    pub base_dir: Option<PathBuf>,
    pub no_color: bool,
    pub verbose: u8,
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListTarget {
    Snapshots,
    Baselines,
    Reports,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteTarget {
    Snapshot,
    Baseline,
    Report,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffArgs {
    /// Baseline id or name, or a snapshot id
    pub baseline: String,
    pub current: String,
    pub format: Option<Format>,
    pub min_severity: Option<Severity>,
    pub detect_moves: bool,
    pub ignore: Vec<String>,
    pub save: bool,
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    Import {
        files: Vec<PathBuf>,
    },
    List {
        target: ListTarget,
        format: Option<Format>,
    },
    Show {
        id: String,
        format: Option<Format>,
        stream: bool,
    },
    Baseline {
        name: String,
        snapshot: String,
        description: String,
    },
    Diff(DiffArgs),
    Timeline {
        provider: Option<String>,
        format: Option<Format>,
    },
    Delete {
        target: DeleteTarget,
        id: String,
    },
    Cleanup {
        max_age_days: Option<u64>,
        max_count: Option<usize>,
    },
    Stats,
}

/// Parsed command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cli {
    pub global: GlobalOptions,
    pub command: CliCommand,
}

fn format_arg() -> Arg {
    Arg::new("format")
        .short('f')
        .long("format")
        .value_name("FORMAT")
        .help("Output format: json, yaml, markdown, csv, html, table, unix, name-only, stat")
        .value_parser(|s: &str| s.parse::<Format>().map_err(|e| e.to_string()))
}

/// Build the clap command tree
pub fn build_command() -> Command {
    Command::new(APP_NAME)
        .version(env!("VAINO_VERSION"))
        .long_version(LONG_VERSION)
        .about("Infrastructure drift detection")
        .long_about("Store infrastructure snapshots, compare them against baselines and report drift with severity and risk classification.")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .help("Configuration file (default ~/.vaino/config.toml)")
                .value_parser(value_parser!(PathBuf))
                .global(true),
        )
        .arg(
            Arg::new("base-dir")
                .long("base-dir")
                .value_name("DIR")
                .help("Root directory of the snapshot store")
                .value_parser(value_parser!(PathBuf))
                .global(true),
        )
        .arg(
            Arg::new("no-color")
                .long("no-color")
                .help("Disable coloured output")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Increase log verbosity (-v info, -vv debug)")
                .action(ArgAction::Count)
                .global(true),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .help("Only print errors and requested output")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(
            Command::new("import")
                .about("Validate snapshot documents and save them to the store")
                .arg(
                    Arg::new("file")
                        .value_name("FILE")
                        .required(true)
                        .num_args(1..)
                        .value_parser(value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            Command::new("list")
                .about("List stored snapshots, baselines or drift reports")
                .arg(
                    Arg::new("target")
                        .value_name("WHAT")
                        .required(true)
                        .value_parser(["snapshots", "baselines", "reports"]),
                )
                .arg(format_arg()),
        )
        .subcommand(
            Command::new("show")
                .about("Show a snapshot, or a baseline by id or name")
                .arg(Arg::new("id").value_name("ID").required(true))
                .arg(format_arg())
                .arg(
                    Arg::new("stream")
                        .long("stream")
                        .help("Render resources as they are read (json, csv, table, markdown)")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("baseline")
                .about("Designate a snapshot as a named baseline")
                .arg(Arg::new("name").value_name("NAME").required(true))
                .arg(
                    Arg::new("snapshot")
                        .short('s')
                        .long("snapshot")
                        .value_name("ID")
                        .required(true),
                )
                .arg(
                    Arg::new("description")
                        .short('d')
                        .long("description")
                        .value_name("TEXT")
                        .default_value(""),
                ),
        )
        .subcommand(
            Command::new("diff")
                .about("Compare a baseline (or snapshot) with a current snapshot")
                .arg(Arg::new("baseline").value_name("BASELINE").required(true))
                .arg(Arg::new("current").value_name("CURRENT").required(true))
                .arg(format_arg())
                .arg(
                    Arg::new("min-severity")
                        .long("min-severity")
                        .value_name("LEVEL")
                        .help("Drop changes below this severity: low, medium, high, critical")
                        .value_parser(|s: &str| s.parse::<Severity>().map_err(|e| e.to_string())),
                )
                .arg(
                    Arg::new("detect-moves")
                        .long("detect-moves")
                        .help("Pair removed and added resources that look like renames")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("ignore")
                        .short('i')
                        .long("ignore")
                        .value_name("PATTERN")
                        .help("Ignore field paths matching this glob (repeatable)")
                        .action(ArgAction::Append),
                )
                .arg(
                    Arg::new("save")
                        .long("save")
                        .help("Store the drift report")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .value_name("FILE")
                        .help("Write the rendered report to FILE instead of stdout")
                        .value_parser(value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            Command::new("timeline")
                .about("Analyze resource counts across stored snapshots")
                .arg(
                    Arg::new("provider")
                        .short('p')
                        .long("provider")
                        .value_name("NAME"),
                )
                .arg(format_arg()),
        )
        .subcommand(
            Command::new("delete")
                .about("Delete a snapshot, baseline or drift report")
                .arg(
                    Arg::new("target")
                        .value_name("WHAT")
                        .required(true)
                        .value_parser(["snapshot", "baseline", "report"]),
                )
                .arg(Arg::new("id").value_name("ID").required(true)),
        )
        .subcommand(
            Command::new("cleanup")
                .about("Remove old backup files")
                .arg(
                    Arg::new("max-age-days")
                        .long("max-age-days")
                        .value_name("DAYS")
                        .value_parser(value_parser!(u64)),
                )
                .arg(
                    Arg::new("max-count")
                        .long("max-count")
                        .value_name("N")
                        .value_parser(value_parser!(usize)),
                ),
        )
        .subcommand(Command::new("stats").about("Show document counts and disk usage"))
}

/// Parse the process arguments, exiting with usage on error
pub fn parse_args() -> Cli {
    from_matches(&build_command().get_matches())
}

/// Parse an explicit argument list
pub fn parse_from<I, T>(args: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    build_command()
        .try_get_matches_from(args)
        .map(|matches| from_matches(&matches))
}

fn string(matches: &ArgMatches, id: &str) -> String {
    matches.get_one::<String>(id).cloned().unwrap_or_default()
}

fn from_matches(matches: &ArgMatches) -> Cli {
    let global = GlobalOptions {
        config: matches.get_one::<PathBuf>("config").cloned(),
        base_dir: matches.get_one::<PathBuf>("base-dir").cloned(),
        no_color: matches.get_flag("no-color"),
        verbose: matches.get_count("verbose"),
        quiet: matches.get_flag("quiet"),
    };

    let command = match matches.subcommand() {
        Some(("import", m)) => CliCommand::Import {
            files: m
                .get_many::<PathBuf>("file")
                .map(|files| files.cloned().collect())
                .unwrap_or_default(),
        },
        Some(("list", m)) => CliCommand::List {
            target: match string(m, "target").as_str() {
                "baselines" => ListTarget::Baselines,
                "reports" => ListTarget::Reports,
                _ => ListTarget::Snapshots,
            },
            format: m.get_one::<Format>("format").copied(),
        },
        Some(("show", m)) => CliCommand::Show {
            id: string(m, "id"),
            format: m.get_one::<Format>("format").copied(),
            stream: m.get_flag("stream"),
        },
        Some(("baseline", m)) => CliCommand::Baseline {
            name: string(m, "name"),
            snapshot: string(m, "snapshot"),
            description: string(m, "description"),
        },
        Some(("diff", m)) => CliCommand::Diff(DiffArgs {
            baseline: string(m, "baseline"),
            current: string(m, "current"),
            format: m.get_one::<Format>("format").copied(),
            min_severity: m.get_one::<Severity>("min-severity").copied(),
            detect_moves: m.get_flag("detect-moves"),
            ignore: m
                .get_many::<String>("ignore")
                .map(|values| values.cloned().collect())
                .unwrap_or_default(),
            save: m.get_flag("save"),
            output: m.get_one::<PathBuf>("output").cloned(),
        }),
        Some(("timeline", m)) => CliCommand::Timeline {
            provider: m.get_one::<String>("provider").cloned(),
            format: m.get_one::<Format>("format").copied(),
        },
        Some(("delete", m)) => CliCommand::Delete {
            target: match string(m, "target").as_str() {
                "baseline" => DeleteTarget::Baseline,
                "report" => DeleteTarget::Report,
                _ => DeleteTarget::Snapshot,
            },
            id: string(m, "id"),
        },
        Some(("cleanup", m)) => CliCommand::Cleanup {
            max_age_days: m.get_one::<u64>("max-age-days").copied(),
            max_count: m.get_one::<usize>("max-count").copied(),
        },
        // subcommand_required guarantees one of the above
        _ => CliCommand::Stats,
    };

    Cli { global, command }
}
