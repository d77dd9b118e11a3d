use chrono::{Datelike, NaiveDate};

use crate::menu_aggregator::{MealFilter, MealTotals};
use crate::menu_store::{has_menu, MenuStore};
use crate::models::{MealHistoryEntry, MealItems, MenuDay, RecommendationSet, WorkoutSplit};
use crate::planner::Dashboard;
use crate::progress::MacroProgress;

const BAR_WIDTH: usize = 20;

fn fmt_amount(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.1}", value)
    }
}

/// Terminates every line with a newline.
fn finish(lines: Vec<String>) -> String {
    lines.into_iter().map(|line| line + "\n").collect()
}

/// Month grid, Sunday first. Days with a saved menu get a `*`, today is
/// wrapped in brackets.
pub fn render_calendar(month: NaiveDate, menus: &MenuStore, today: NaiveDate) -> String {
    let first = month.with_day(1).unwrap_or(month);
    let mut lines = vec![
        format!("{:^35}", first.format("%B %Y").to_string()),
        "  Sun  Mon  Tue  Wed  Thu  Fri  Sat".to_string(),
    ];

    let mut week = " ".repeat(5 * first.weekday().num_days_from_sunday() as usize);
    let mut saved = 0;
    for day in first.iter_days().take_while(|d| d.month() == first.month()) {
        let marked = has_menu(menus, day);
        if marked {
            saved += 1;
        }
        let label = match (day == today, marked) {
            (true, true) => format!("[{}*]", day.day()),
            (true, false) => format!("[{}]", day.day()),
            (false, true) => format!("{}*", day.day()),
            (false, false) => day.day().to_string(),
        };
        week.push_str(&format!("{:>5}", label));
        if day.weekday().num_days_from_sunday() == 6 {
            lines.push(std::mem::take(&mut week));
        }
    }
    if !week.is_empty() {
        lines.push(week);
    }
    lines.push(format!("{} day(s) with a saved menu (*)", saved));
    finish(lines)
}

fn item_row(name: &str, portion: &str, amounts: [String; 4]) -> String {
    let [calories, protein, carbs, fats] = amounts;
    format!(
        "  {:<28} {:>10} {:>8} {:>8} {:>8} {:>8}",
        name, portion, calories, protein, carbs, fats
    )
}

fn item_lines(items: &MealItems) -> Vec<String> {
    let header = ["Cal", "Protein", "Carbs", "Fats"].map(String::from);
    std::iter::once(item_row("Item", "Portion", header))
        .chain(items.iter().map(|(name, record)| {
            item_row(
                name,
                record.portion_label(),
                [record.calories, record.protein, record.carbs, record.fats].map(fmt_amount),
            )
        }))
        .collect()
}

/// Per-meal item tables for one saved day.
pub fn render_menu_day(key: &str, day: &MenuDay, filter: &MealFilter) -> String {
    let mut lines = vec![format!("{} ({})", key, day.day)];
    let meals: Vec<_> = day
        .meals
        .iter()
        .filter(|(label, _)| match filter {
            MealFilter::All => true,
            MealFilter::Meal(wanted) => *label == wanted,
        })
        .collect();
    if meals.is_empty() {
        lines.push(format!("  no items for {}", filter));
    }
    for (label, items) in meals {
        lines.push(String::new());
        lines.push(label.clone());
        lines.extend(item_lines(items));
    }
    finish(lines)
}

pub fn render_totals(filter: &MealFilter, totals: &MealTotals) -> String {
    format!(
        "{} ({} items): {} kcal, {}g protein, {}g carbs, {}g fats\n",
        filter,
        totals.item_count,
        fmt_amount(totals.macros.calories),
        fmt_amount(totals.macros.protein),
        fmt_amount(totals.macros.carbs),
        fmt_amount(totals.macros.fats)
    )
}

/// Combos are numbered from 1, matching `log-meal --combo`.
pub fn render_recommendations(set: &RecommendationSet) -> String {
    let mut lines = Vec::new();
    if !set.motivation.is_empty() {
        lines.push(set.motivation.clone());
        lines.push(String::new());
    }
    if set.recommendations.is_empty() {
        lines.push("No combos could be built from this menu.".to_string());
    }
    for (i, combo) in set.recommendations.iter().enumerate() {
        lines.push(format!("{}. {}", i + 1, combo.name));
        if !combo.description.is_empty() {
            lines.push(format!("   {}", combo.description));
        }
        lines.extend(combo.items.iter().map(|item| format!("   - {}", item)));
        let m = combo.total_macros;
        lines.push(format!(
            "   {} kcal | P {}g | C {}g | F {}g",
            fmt_amount(m.calories),
            fmt_amount(m.protein),
            fmt_amount(m.carbs),
            fmt_amount(m.fats)
        ));
        if !combo.reasoning.is_empty() {
            lines.push(format!("   Why: {}", combo.reasoning));
        }
    }
    if !set.alternatives.is_empty() {
        lines.push(String::new());
        lines.push("Alternatives:".to_string());
        lines.extend(set.alternatives.iter().map(|alt| format!("  - {}", alt)));
    }
    finish(lines)
}

pub fn render_progress(progress: &[MacroProgress]) -> String {
    let lines = progress
        .iter()
        .map(|p| {
            let filled = (((p.percentage / 100.0) * BAR_WIDTH as f64).round() as usize).min(BAR_WIDTH);
            format!(
                "{:<9} [{}{}] {:>3.0}%  {}/{} {}{}",
                p.name,
                "#".repeat(filled),
                "-".repeat(BAR_WIDTH - filled),
                p.percentage,
                fmt_amount(p.current),
                fmt_amount(p.target),
                p.unit,
                if p.is_complete() { "  done" } else { "" }
            )
        })
        .collect();
    finish(lines)
}

pub fn render_history(history: &[MealHistoryEntry]) -> String {
    if history.is_empty() {
        return "No meals logged yet.\n".to_string();
    }
    let lines = history
        .iter()
        .map(|entry| {
            let m = entry.logged_combo.total_macros;
            format!(
                "{}  {:<24} menu {}  {} kcal, {}g protein",
                entry.timestamp.format("%Y-%m-%d %H:%M"),
                entry.logged_combo.name,
                entry.source_menu_date,
                fmt_amount(m.calories),
                fmt_amount(m.protein)
            )
        })
        .collect();
    finish(lines)
}

fn split_lines(split: &WorkoutSplit) -> Vec<String> {
    std::iter::once("Workout split:".to_string())
        .chain(
            split
                .entries()
                .into_iter()
                .map(|(weekday, tag)| format!("  {:<4} {}", weekday.to_string(), tag)),
        )
        .collect()
}

pub fn render_dashboard(dashboard: &Dashboard) -> String {
    let profile = &dashboard.profile;
    let t = dashboard.targets;
    let mut lines: Vec<String> = profile.name.iter().cloned().collect();
    lines.push(format!(
        "Age {}, {} cm, {} kg, goal {}, activity {}",
        profile.age,
        fmt_amount(profile.height_cm),
        fmt_amount(profile.weight_kg),
        profile.goal,
        profile.activity_level
    ));
    lines.extend(dashboard.tdee.map(|tdee| format!("TDEE: {} kcal", fmt_amount(tdee))));
    lines.push(format!(
        "Daily targets: {} kcal, {}g protein, {}g carbs, {}g fats",
        fmt_amount(t.calories),
        fmt_amount(t.protein),
        fmt_amount(t.carbs),
        fmt_amount(t.fats)
    ));
    lines.push(format!(
        "Today: {} day, {}",
        dashboard.workout_today,
        if dashboard.menu_today {
            "menu saved"
        } else {
            "no menu saved"
        }
    ));
    lines.extend(split_lines(&profile.workout_split));
    finish(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Macros, NutritionRecord, RecommendedCombo};
    use crate::progress::progress_report;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_calendar_marks_saved_days_and_today() {
        let mut menus = MenuStore::new();
        menus.insert("2024-01-10".to_string(), MenuDay::default());
        menus.insert("2024-02-01".to_string(), MenuDay::default());

        let grid = render_calendar(date(2024, 1, 20), &menus, date(2024, 1, 15));
        assert!(grid.contains("January 2024"));
        assert!(grid.contains("10*"));
        assert!(grid.contains("[15]"));
        assert!(grid.contains("31"));
        assert!(!grid.contains("32"));
        assert!(grid.contains("1 day(s) with a saved menu"));
        // January 2024 starts on a Monday: one blank Sunday cell.
        let first_week = grid.lines().nth(2).unwrap();
        assert!(first_week.starts_with("         1"));
    }

    #[test]
    fn test_menu_day_shows_missing_portion_as_na() {
        let mut lunch = MealItems::new();
        lunch.insert(
            "Dal".to_string(),
            NutritionRecord {
                protein: 8.0,
                ..Default::default()
            },
        );
        let mut meals = BTreeMap::new();
        meals.insert("Lunch".to_string(), lunch);
        let day = MenuDay {
            day: "Monday".to_string(),
            meals,
            ..Default::default()
        };

        let text = render_menu_day("2024-01-08", &day, &MealFilter::All);
        assert!(text.contains("2024-01-08 (Monday)"));
        assert!(text.contains("N/A"));

        assert!(text.contains("\n\nLunch\n  Item"));
        assert!(text.ends_with('\n'));

        let text = render_menu_day("2024-01-08", &day, &"Dinner".parse().unwrap());
        assert!(text.contains("no items for Dinner"));
    }

    #[test]
    fn test_recommendations_are_numbered() {
        let set = RecommendationSet {
            motivation: "Go".to_string(),
            recommendations: vec![
                RecommendedCombo {
                    name: "A".to_string(),
                    items: vec!["Rice".to_string()],
                    total_macros: Macros::new(400.0, 12.5, 70.0, 5.0),
                    ..Default::default()
                },
                RecommendedCombo {
                    name: "B".to_string(),
                    ..Default::default()
                },
            ],
            alternatives: vec!["Add curd".to_string()],
        };
        let text = render_recommendations(&set);
        assert!(text.contains("1. A"));
        assert!(text.contains("2. B"));
        assert!(text.contains("P 12.5g"));
        assert!(text.contains("Alternatives:"));
    }

    #[test]
    fn test_progress_bar_is_capped() {
        let report = progress_report(&Macros::new(5000.0, 0.0, 0.0, 0.0), &Macros::new(2500.0, 100.0, 0.0, 0.0));
        let text = render_progress(&report);
        let calories = text.lines().next().unwrap();
        assert!(calories.contains(&"#".repeat(BAR_WIDTH)));
        assert!(calories.contains("100%"));
        assert!(calories.ends_with("done"));
        assert!(text.lines().nth(1).unwrap().contains(&"-".repeat(BAR_WIDTH)));
        assert_eq!(text.lines().count(), report.len());
        assert!(text.ends_with('\n'));
        assert_eq!(render_progress(&[]), "");
    }

    #[test]
    fn test_calendar_closes_last_week_once() {
        // August 2024 ends on a Saturday.
        let grid = render_calendar(date(2024, 8, 1), &MenuStore::new(), date(2024, 1, 1));
        assert!(!grid.contains("\n\n"));
        assert!(grid.lines().rev().nth(1).unwrap().ends_with("31"));
        assert!(grid.ends_with("0 day(s) with a saved menu (*)\n"));
    }

    #[test]
    fn test_history_lists_entries() {
        assert_eq!(render_history(&[]), "No meals logged yet.\n");
        let entry = MealHistoryEntry {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 10, 13, 5, 0).unwrap(),
            logged_combo: RecommendedCombo {
                name: "Lunch Combo".to_string(),
                total_macros: Macros::new(600.0, 30.0, 0.0, 0.0),
                ..Default::default()
            },
            source_menu_date: "2024-01-10".to_string(),
        };
        let text = render_history(&[entry]);
        assert!(text.starts_with("2024-01-10 13:05"));
        assert!(text.contains("600 kcal, 30g protein"));
    }
}
