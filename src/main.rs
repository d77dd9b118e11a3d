use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, Utc, Weekday};
use tracing::{debug, warn};

use mess_planner::api_connection::ApiClient;
use mess_planner::cli::{parse_args, Command, DayArgs, LogMealArgs, ProfileArgs};
use mess_planner::config::PlannerConfig;
use mess_planner::logging::init_logging;
use mess_planner::menu_aggregator::meal_totals;
use mess_planner::menu_store::{available_dates, date_key};
use mess_planner::models::{Macros, MenuDay, RecommendedCombo, UserProfile, WorkoutSplit};
use mess_planner::planner::{Planner, PlannerError};
use mess_planner::progress::progress_report;
use mess_planner::report;
use mess_planner::storage::{AppStore, FileStore};

fn profile_from_args(args: ProfileArgs) -> UserProfile {
    let mut split = WorkoutSplit::default();
    let overrides = [
        (Weekday::Sun, args.sunday),
        (Weekday::Mon, args.monday),
        (Weekday::Tue, args.tuesday),
        (Weekday::Wed, args.wednesday),
        (Weekday::Thu, args.thursday),
        (Weekday::Fri, args.friday),
        (Weekday::Sat, args.saturday),
    ];
    for (weekday, tag) in overrides {
        if let Some(tag) = tag {
            split.set(weekday, tag.trim().to_lowercase());
        }
    }
    UserProfile {
        name: args.name,
        age: args.age,
        height_cm: args.height,
        weight_kg: args.weight,
        goal: args.goal,
        activity_level: args.activity,
        workout_split: split,
    }
}

fn saved_day(planner: &Planner, date: NaiveDate) -> Result<MenuDay> {
    planner
        .with_store(|store| store.menu_for(date))?
        .ok_or_else(|| PlannerError::NoMenuForDate(date_key(date)).into())
}

async fn recommend(planner: &Planner, day: DayArgs, fallback_on_error: bool, today: NaiveDate) -> Result<()> {
    let date = day.date.unwrap_or(today);
    let set = match planner.recommend(date, &day.meal, today).await {
        Ok(set) => set,
        Err(PlannerError::Api(err)) if fallback_on_error => {
            warn!(error = %err, "recommendation service failed, using local combo");
            println!("Recommendation service unavailable ({}), showing a local pick.\n", err);
            planner.fallback_recommendations(date, &day.meal)?
        }
        Err(err) => return Err(err).context("Failed to get recommendations"),
    };
    print!("{}", report::render_recommendations(&set));
    Ok(())
}

fn log_meal(planner: &Planner, args: LogMealArgs, today: NaiveDate) -> Result<()> {
    let now = Utc::now();
    let (combo, intake) = match (args.combo, args.manual) {
        (Some(index), _) => planner.log_recommended(index, now)?,
        (None, Some(name)) => {
            let combo = RecommendedCombo {
                items: vec![name.clone()],
                name,
                total_macros: Macros::new(args.calories, args.protein, args.carbs, args.fats),
                ..Default::default()
            };
            let menu_date = date_key(args.date.unwrap_or(today));
            let intake = planner.log_combo(&combo, &menu_date, now)?;
            (combo, intake)
        }
        (None, None) => anyhow::bail!("pass --combo or --manual"),
    };
    println!("Logged '{}'.", combo.name);
    if let Some(targets) = planner.with_store(|store| store.daily_targets())? {
        print!("{}", report::render_progress(&progress_report(&intake, &targets)));
    }
    Ok(())
}

async fn run(planner: &Planner, command: Command) -> Result<()> {
    let today = Local::now().date_naive();
    match command {
        Command::Health => {
            let health = planner.health().await.context("Health check failed")?;
            println!(
                "{}: {}{}",
                health.service.as_deref().unwrap_or("analysis service"),
                health.status,
                health
                    .timestamp
                    .map(|t| format!(" (at {})", t))
                    .unwrap_or_default()
            );
        }
        Command::SetupProfile(args) => {
            let setup = planner
                .setup_profile(profile_from_args(args), today)
                .await
                .context("Failed to set up profile")?;
            let t = setup.daily_targets;
            println!("Profile saved. TDEE: {:.0} kcal", setup.tdee);
            println!(
                "Daily targets: {:.0} kcal, {:.0}g protein, {:.0}g carbs, {:.0}g fats",
                t.calories, t.protein, t.carbs, t.fats
            );
        }
        Command::Profile => print!("{}", report::render_dashboard(&planner.dashboard(today)?)),
        Command::Scan { file } => {
            println!("Uploading {} for scanning...", file.display());
            let outcome = planner
                .scan_menu(&file, today, Utc::now())
                .await
                .with_context(|| format!("Failed to scan menu '{}'", file.display()))?;
            for (key, day) in &outcome.saved {
                println!("Saved {} ({}, {} items)", key, day.day, day.item_count());
            }
            for key in &outcome.skipped {
                println!("Skipped {}, a newer scan already saved that day.", key);
            }
        }
        Command::Calendar { month } => {
            let menus = planner.with_store(|store| store.saved_menus())?;
            print!("{}", report::render_calendar(month.unwrap_or(today), &menus, today));
            let dates = available_dates(&menus);
            if !dates.is_empty() {
                println!("Saved menus: {}", dates.join(", "));
            }
        }
        Command::Menu(day) => {
            let date = day.date.unwrap_or(today);
            let menu = saved_day(planner, date)?;
            print!("{}", report::render_menu_day(&date_key(date), &menu, &day.meal));
        }
        Command::Totals(day) => {
            let menu = saved_day(planner, day.date.unwrap_or(today))?;
            print!("{}", report::render_totals(&day.meal, &meal_totals(&menu, &day.meal)));
        }
        Command::Recommend {
            day,
            fallback_on_error,
        } => recommend(planner, day, fallback_on_error, today).await?,
        Command::LogMeal(args) => log_meal(planner, args, today)?,
        Command::History => {
            let history = planner.with_store(|store| store.meal_history())?;
            print!("{}", report::render_history(&history));
        }
        Command::Progress => print!("{}", report::render_progress(&planner.dashboard(today)?.progress)),
        Command::ResetIntake => {
            planner.with_store(|store| store.reset_intake())?;
            println!("Intake reset to zero.");
        }
        Command::Guidance => {
            let guidance = planner.guidance(today).await.context("Failed to get guidance")?;
            println!("{}", guidance);
        }
        Command::Motivation { workout } => {
            let (workout, message) = planner
                .motivation(workout.as_deref(), today)
                .await
                .context("Failed to get motivation")?;
            println!("[{}] {}", workout, message);
        }
        Command::SearchFood { name } => {
            let lookup = planner.search_food(&name).await.context("Food search failed")?;
            match lookup.nutrition {
                Some(n) => println!(
                    "{} ({}): {} kcal, {}g protein, {}g carbs, {}g fats",
                    name,
                    n.portion_label(),
                    n.calories,
                    n.protein,
                    n.carbs,
                    n.fats
                ),
                None => println!(
                    "{}",
                    lookup
                        .message
                        .unwrap_or_else(|| format!("'{}' was not found", name))
                ),
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = parse_args();
    init_logging(cli.verbose)?;

    let config = PlannerConfig::resolve(cli.api_url, cli.data_dir);
    debug!(api = %config.api_base_url, data_dir = %config.data_dir.display(), "configuration resolved");

    let store = FileStore::open(&config.data_dir)
        .with_context(|| format!("Failed to open planner store in '{}'", config.data_dir.display()))?;
    debug!(path = %store.path().display(), "using planner store");
    let client = ApiClient::new(&config.api_base_url)
        .with_context(|| format!("Failed to create API client for '{}'", config.api_base_url))?;
    let planner = Planner::new(client, AppStore::new(store));

    run(&planner, cli.command).await
}
