use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use crate::models::{Macros, MealItems, MenuDay};

/// Which meals of a day to look at.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MealFilter {
    #[default]
    All,
    /// A meal-type label exactly as the scan reported it, e.g. `Lunch`.
    Meal(String),
}

impl FromStr for MealFilter {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            Ok(MealFilter::All)
        } else {
            Ok(MealFilter::Meal(trimmed.to_string()))
        }
    }
}

impl fmt::Display for MealFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MealFilter::All => f.write_str("all"),
            MealFilter::Meal(label) => f.write_str(label),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MealTotals {
    pub item_count: usize,
    pub macros: Macros,
}

/// Sums the nutrition of every item the filter selects.
///
/// With `All`, each meal contributes all of its items, so a dish served at
/// lunch and dinner counts twice. An unknown meal label yields zero items.
pub fn meal_totals(day: &MenuDay, filter: &MealFilter) -> MealTotals {
    let mut totals = MealTotals::default();
    let meals: Vec<&MealItems> = match filter {
        MealFilter::All => day.meals.values().collect(),
        MealFilter::Meal(label) => day.meals.get(label).into_iter().collect(),
    };
    for items in meals {
        for record in items.values() {
            totals.item_count += 1;
            totals.macros += record.macros();
        }
    }
    totals
}

/// Item map sent to the recommendation service.
///
/// `All` flattens the meals in label order; an item name seen again in a
/// later meal replaces the earlier record.
pub fn select_items(day: &MenuDay, filter: &MealFilter) -> MealItems {
    match filter {
        MealFilter::All => {
            let mut merged = MealItems::new();
            for items in day.meals.values() {
                merged.extend(items.iter().map(|(name, record)| (name.clone(), record.clone())));
            }
            merged
        }
        MealFilter::Meal(label) => day.meals.get(label).cloned().unwrap_or_default(),
    }
}
