use std::path::PathBuf;

use chrono::{NaiveDate, NaiveTime};
use clap::{Args, Parser, Subcommand};
use onair_core::ChangeScope;
use onair_schedule::time::parse_hhmm;
use onair_schedule::{DayOfWeek, DisplayCategory};

#[derive(Debug, Parser)]
#[command(name = "onair")]
#[command(about = "Recurring broadcast schedule and staffing")]
#[command(
    after_help = "Environment:\n  ONAIR_CONFIG   Config file path\n  RUST_LOG       Log filter (default onair=info)"
)]
pub struct Cli {
    /// Config file (defaults to $ONAIR_CONFIG, then ~/.onair/onair.toml).
    #[arg(long, global = true)]
    pub config: Option<String>,
    /// SQLite database, overriding the config file.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create the database schema.
    Init,
    /// Materialize and print the week containing DATE.
    Week { date: NaiveDate },
    /// Print the master grid.
    Templates,
    /// Create a slot on one or more days, in the master grid or one week.
    AddSlot(AddSlotArgs),
    EditSlot(EditSlotArgs),
    DeleteSlot {
        id: String,
        #[arg(long, default_value = "current")]
        scope: ChangeScope,
    },
    /// Undo a soft delete.
    RestoreSlot { id: String },
    /// Refresh unmodified instances of the week containing DATE.
    Resync { date: NaiveDate },
    /// Assign a worker to a slot instance.
    Assign(AssignArgs),
    Unassign {
        id: String,
        /// Any date in the week the delete is made from.
        #[arg(long)]
        week: NaiveDate,
        #[arg(long, default_value = "current")]
        scope: ChangeScope,
    },
    /// Staffing for every slot of the week containing DATE.
    Roster { date: NaiveDate },
    /// Assignments no slot of the week claims.
    Orphans {
        date: NaiveDate,
        /// Delete the week-only ones.
        #[arg(long)]
        purge: bool,
    },
}

#[derive(Debug, Args)]
pub struct AddSlotArgs {
    #[arg(long)]
    pub show: String,
    #[arg(long, value_parser = parse_time)]
    pub start: NaiveTime,
    #[arg(long, value_parser = parse_time)]
    pub end: NaiveTime,
    /// Comma-separated days, e.g. `mon,wed,fri`.
    #[arg(long, value_delimiter = ',', required = true)]
    pub days: Vec<DayOfWeek>,
    #[arg(long, default_value = "")]
    pub host: String,
    /// Create one-off slots in the week containing this date instead of
    /// master-grid templates.
    #[arg(long)]
    pub week: Option<NaiveDate>,
    #[arg(long)]
    pub prerecorded: bool,
    #[arg(long)]
    pub collection: bool,
    #[arg(long)]
    pub category: Option<DisplayCategory>,
}

#[derive(Debug, Args)]
pub struct EditSlotArgs {
    pub id: String,
    #[arg(long, default_value = "current")]
    pub scope: ChangeScope,
    #[arg(long)]
    pub show: Option<String>,
    #[arg(long)]
    pub host: Option<String>,
    #[arg(long, value_parser = parse_time)]
    pub start: Option<NaiveTime>,
    #[arg(long, value_parser = parse_time)]
    pub end: Option<NaiveTime>,
    #[arg(long)]
    pub day: Option<DayOfWeek>,
    #[arg(long)]
    pub prerecorded: Option<bool>,
    #[arg(long)]
    pub collection: Option<bool>,
    #[arg(long, conflicts_with = "clear_category")]
    pub category: Option<DisplayCategory>,
    /// Go back to the category derived from the slot's flags.
    #[arg(long)]
    pub clear_category: bool,
}

#[derive(Debug, Args)]
pub struct AssignArgs {
    pub slot_id: String,
    #[arg(long)]
    pub worker: String,
    #[arg(long)]
    pub role: String,
    /// Also assign the same-time slots on these days. Defaults to the
    /// slot's own day.
    #[arg(long, value_delimiter = ',')]
    pub days: Vec<DayOfWeek>,
    /// Standing rule, re-matched every week.
    #[arg(long)]
    pub recurring: bool,
    #[arg(long)]
    pub notes: Option<String>,
}

fn parse_time(s: &str) -> Result<NaiveTime, String> {
    parse_hhmm(s).map_err(|e| e.to_string())
}
