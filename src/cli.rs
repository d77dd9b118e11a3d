use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::menu_aggregator::MealFilter;
use crate::models::{ActivityLevel, Goal};

#[derive(Parser, Debug)]
#[command(author, version, about = "Plan mess-hall meals around your macro targets", long_about = None)]
pub struct Cli {
    /// Base URL of the menu analysis service
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Directory holding the local planner store
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check that the analysis service is reachable
    Health,
    /// Save your profile and compute daily targets
    SetupProfile(ProfileArgs),
    /// Show the saved profile, targets and workout split
    Profile,
    /// Upload a menu image or PDF and save the scanned days
    Scan {
        /// PNG, JPEG or PDF file, at most 10 MB
        file: PathBuf,
    },
    /// Show a month with the days that have a saved menu
    Calendar {
        /// Any date in the month to show (defaults to today)
        #[arg(long)]
        month: Option<NaiveDate>,
    },
    /// Show the saved menu for a day
    Menu(DayArgs),
    /// Sum the macros of the selected meals
    Totals(DayArgs),
    /// Get meal combos for a day's menu
    Recommend {
        #[command(flatten)]
        day: DayArgs,
        /// Build a local high-protein combo when the service fails
        #[arg(long)]
        fallback_on_error: bool,
    },
    /// Add a meal to today's intake
    LogMeal(LogMealArgs),
    /// List every logged meal
    History,
    /// Show intake against daily targets
    Progress,
    /// Set today's intake back to zero
    ResetIntake,
    /// Ask for nutrition guidance based on today's intake
    Guidance,
    /// Get a motivation message for a workout day
    Motivation {
        /// Workout to ask about (defaults to today's split entry)
        #[arg(long)]
        workout: Option<String>,
    },
    /// Look up a food in the service's nutrition database
    SearchFood {
        name: String,
    },
}

#[derive(Args, Debug)]
pub struct ProfileArgs {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub age: u32,
    /// Height in cm
    #[arg(long)]
    pub height: f64,
    /// Weight in kg
    #[arg(long)]
    pub weight: f64,
    #[arg(long, value_enum)]
    pub goal: Goal,
    #[arg(long, value_enum, default_value_t = ActivityLevel::Moderate)]
    pub activity: ActivityLevel,
    #[arg(long)]
    pub sunday: Option<String>,
    #[arg(long)]
    pub monday: Option<String>,
    #[arg(long)]
    pub tuesday: Option<String>,
    #[arg(long)]
    pub wednesday: Option<String>,
    #[arg(long)]
    pub thursday: Option<String>,
    #[arg(long)]
    pub friday: Option<String>,
    #[arg(long)]
    pub saturday: Option<String>,
}

#[derive(Args, Debug)]
pub struct DayArgs {
    /// Menu date as YYYY-MM-DD (defaults to today)
    #[arg(long)]
    pub date: Option<NaiveDate>,
    /// Meal type such as Breakfast or Lunch, or "all"
    #[arg(long, default_value = "all")]
    pub meal: MealFilter,
}

#[derive(Args, Debug)]
pub struct LogMealArgs {
    /// Number of a combo from the last `recommend` output
    #[arg(long, required_unless_present = "manual", conflicts_with = "manual")]
    pub combo: Option<usize>,
    /// Name for a manually entered meal, given with its macros
    #[arg(long)]
    pub manual: Option<String>,
    #[arg(long, default_value_t = 0.0, value_parser = parse_amount)]
    pub calories: f64,
    #[arg(long, default_value_t = 0.0, value_parser = parse_amount)]
    pub protein: f64,
    #[arg(long, default_value_t = 0.0, value_parser = parse_amount)]
    pub carbs: f64,
    #[arg(long, default_value_t = 0.0, value_parser = parse_amount)]
    pub fats: f64,
    /// Menu date the manual meal came from (defaults to today)
    #[arg(long)]
    pub date: Option<NaiveDate>,
}

/// A finite, non-negative macro amount.
fn parse_amount(raw: &str) -> Result<f64, String> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a number", raw))?;
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(format!("'{}' must be a finite amount of zero or more", raw))
    }
}

pub fn parse_args() -> Cli {
    Cli::parse()
}
