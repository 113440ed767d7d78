mod discover;
mod log_parser;
mod report;
mod runner;

pub use discover::{LogSet, discover_logs};
pub use log_parser::{
    LogError, ParseResult, Status, config_name, last_summary_line, parse_log, parse_log_file,
    strip_ansi,
};
pub use report::{
    AggregateReport, ConfigRecord, JsonSummary, SweepReport, Verdict, split_config_label,
};
pub use runner::{ConfigOutcome, SweepOutcome, long_banner, run_long, run_sweep};
