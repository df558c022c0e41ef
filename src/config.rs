use clap::Parser;

pub const PROC_ROOT: &str = "/proc";
pub const MEMINFO_FILE: &str = "meminfo";
pub const SMAPS_FILE: &str = "smaps";

pub const PIDOF_COMMAND: &str = "pidof";

pub const MEM_TOTAL_LABEL: &str = "MemTotal:";
pub const MEM_AVAILABLE_LABEL: &str = "MemAvailable:";
pub const RSS_LABEL: &str = "Rss:";

pub const DEFAULT_BAR_LENGTH: usize = 20;
pub const HUMAN_READABLE_DECIMAL_PLACES: usize = 2;

/// Memory Visualiser -- See Memory Usage Report with bar charts
#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(name = "memviz", version, about, long_about = None)]
pub struct Config {
    /// Specify the length of the graph.
    #[arg(short, long, value_name = "N", default_value_t = DEFAULT_BAR_LENGTH)]
    pub length: usize,

    /// Prints sizes in human readable format.
    #[arg(short = 'H', long)]
    pub human_readable: bool,

    /// If a program is specified, show memory use of all associated processes.
    /// Show only total use if not.
    pub program: Option<String>,
}
