//! CLI argument definitions using clap derive macros.

use chrono::NaiveDate;
use clap::Parser;

use libsafe_export::record::parse_date;

/// Export repository records and their PDFs for the libsafe archive.
///
/// Records already listed in the export directory's metadata.csv are skipped,
/// so an interrupted run picks up where it stopped.
#[derive(Parser, Debug)]
#[command(name = "libsafe-export")]
#[command(author, version, about)]
pub struct Args {
    /// Only export records that gained a file on or after this date (YYYY-MM-DD)
    #[arg(short = 's', long = "start", visible_alias = "from-date", value_parser = parse_cli_date)]
    pub start: Option<NaiveDate>,

    /// Only export records that gained a file on or before this date (YYYY-MM-DD)
    #[arg(short = 'e', long = "end", value_parser = parse_cli_date)]
    pub end: Option<NaiveDate>,

    /// Stop after exporting this many records (0 for no limit)
    #[arg(short = 'n', long = "number", default_value_t = 0)]
    pub number: usize,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Log level used when `RUST_LOG` is unset.
    #[must_use]
    pub fn default_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "info",
                1 => "debug",
                _ => "trace",
            }
        }
    }
}

fn parse_cli_date(value: &str) -> Result<NaiveDate, String> {
    parse_date(value).map_err(|e| e.to_string())
}
