use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use clap::ValueEnum;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Add, AddAssign};

/// Reads a macro value the way the analysis API may send it: a JSON number,
/// a numeric string, or nothing at all. Anything unusable counts as zero.
pub fn number_from_value(value: &Value) -> f64 {
    let parsed = value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse::<f64>().ok()))
        .unwrap_or(0.0);
    if parsed.is_finite() && parsed > 0.0 {
        parsed
    } else {
        0.0
    }
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(number_from_value(&value))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Goal {
    Bulk,
    Cut,
}

impl Goal {
    pub fn as_str(self) -> &'static str {
        match self {
            Goal::Bulk => "bulk",
            Goal::Cut => "cut",
        }
    }
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Sedentary,
    Light,
    Moderate,
    Active,
    #[value(name = "very_active")]
    VeryActive,
}

impl ActivityLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            ActivityLevel::Sedentary => "sedentary",
            ActivityLevel::Light => "light",
            ActivityLevel::Moderate => "moderate",
            ActivityLevel::Active => "active",
            ActivityLevel::VeryActive => "very_active",
        }
    }
}

impl fmt::Display for ActivityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Muscle group trained on each day of the week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkoutSplit {
    pub sunday: String,
    pub monday: String,
    pub tuesday: String,
    pub wednesday: String,
    pub thursday: String,
    pub friday: String,
    pub saturday: String,
}

impl Default for WorkoutSplit {
    fn default() -> Self {
        Self {
            sunday: "rest".to_string(),
            monday: "chest".to_string(),
            tuesday: "back".to_string(),
            wednesday: "legs".to_string(),
            thursday: "shoulders".to_string(),
            friday: "arms".to_string(),
            saturday: "cardio".to_string(),
        }
    }
}

impl WorkoutSplit {
    pub fn tag_for(&self, weekday: Weekday) -> &str {
        let tag = match weekday {
            Weekday::Sun => &self.sunday,
            Weekday::Mon => &self.monday,
            Weekday::Tue => &self.tuesday,
            Weekday::Wed => &self.wednesday,
            Weekday::Thu => &self.thursday,
            Weekday::Fri => &self.friday,
            Weekday::Sat => &self.saturday,
        };
        if tag.trim().is_empty() {
            "rest"
        } else {
            tag
        }
    }

    pub fn set(&mut self, weekday: Weekday, tag: impl Into<String>) {
        let slot = match weekday {
            Weekday::Sun => &mut self.sunday,
            Weekday::Mon => &mut self.monday,
            Weekday::Tue => &mut self.tuesday,
            Weekday::Wed => &mut self.wednesday,
            Weekday::Thu => &mut self.thursday,
            Weekday::Fri => &mut self.friday,
            Weekday::Sat => &mut self.saturday,
        };
        *slot = tag.into();
    }

    /// Days in display order, Sunday first.
    pub fn entries(&self) -> [(Weekday, &str); 7] {
        [
            Weekday::Sun,
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
            Weekday::Sat,
        ]
        .map(|day| (day, self.tag_for(day)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub age: u32,
    #[serde(rename = "height")]
    pub height_cm: f64,
    #[serde(rename = "weight")]
    pub weight_kg: f64,
    pub goal: Goal,
    pub activity_level: ActivityLevel,
    #[serde(default)]
    pub workout_split: WorkoutSplit,
}

impl UserProfile {
    pub fn validate(&self) -> Result<(), String> {
        if self.age == 0 {
            return Err("age must be greater than zero".to_string());
        }
        if !(self.height_cm.is_finite() && self.height_cm > 0.0) {
            return Err(format!("height must be a positive number of cm, got {}", self.height_cm));
        }
        if !(self.weight_kg.is_finite() && self.weight_kg > 0.0) {
            return Err(format!("weight must be a positive number of kg, got {}", self.weight_kg));
        }
        Ok(())
    }

    pub fn workout_on(&self, date: NaiveDate) -> &str {
        self.workout_split.tag_for(date.weekday())
    }
}

/// Calories (kcal) and grams of protein, carbs and fats.
///
/// Used both for the server-computed daily targets and for the running intake.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Macros {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub calories: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub protein: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub carbs: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub fats: f64,
}

pub type DailyTargets = Macros;
pub type IntakeTotals = Macros;

impl Macros {
    pub fn new(calories: f64, protein: f64, carbs: f64, fats: f64) -> Self {
        Self {
            calories,
            protein,
            carbs,
            fats,
        }
    }

    /// Each field clamped to a finite, non-negative amount.
    pub fn sanitized(self) -> Self {
        let clamp = |v: f64| if v.is_finite() && v > 0.0 { v } else { 0.0 };
        Self {
            calories: clamp(self.calories),
            protein: clamp(self.protein),
            carbs: clamp(self.carbs),
            fats: clamp(self.fats),
        }
    }

    /// Non-object values yield all zeros.
    pub fn from_value(value: &Value) -> Self {
        let field = |key: &str| value.get(key).map(number_from_value).unwrap_or(0.0);
        Self {
            calories: field("calories"),
            protein: field("protein"),
            carbs: field("carbs"),
            fats: field("fats"),
        }
    }
}

impl Add for Macros {
    type Output = Macros;

    fn add(self, rhs: Macros) -> Macros {
        Macros {
            calories: self.calories + rhs.calories,
            protein: self.protein + rhs.protein,
            carbs: self.carbs + rhs.carbs,
            fats: self.fats + rhs.fats,
        }
    }
}

impl AddAssign for Macros {
    fn add_assign(&mut self, rhs: Macros) {
        *self = *self + rhs;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NutritionRecord {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub calories: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub protein: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub carbs: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub fats: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portion: Option<String>,
}

impl NutritionRecord {
    pub fn from_value(value: &Value) -> Self {
        let macros = Macros::from_value(value);
        let portion = value.get("portion").and_then(|p| match p {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });
        Self {
            calories: macros.calories,
            protein: macros.protein,
            carbs: macros.carbs,
            fats: macros.fats,
            portion,
        }
    }

    pub fn macros(&self) -> Macros {
        Macros::new(self.calories, self.protein, self.carbs, self.fats)
    }

    pub fn portion_label(&self) -> &str {
        self.portion.as_deref().unwrap_or("N/A")
    }
}

/// Food item name -> nutrition for one meal.
pub type MealItems = BTreeMap<String, NutritionRecord>;

/// One scanned day of the mess menu.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MenuDay {
    /// Date as reported by the scan, `"unknown"` when none was detected.
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub day: String,
    #[serde(default)]
    pub meals: BTreeMap<String, MealItems>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_items: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
}

impl MenuDay {
    /// Builds a day from a raw `/scan-menu` entry without ever failing.
    ///
    /// A meal given as a plain list of names gets zeroed records, anything
    /// else that is not an object is dropped.
    pub fn from_value(value: &Value) -> Self {
        let date = value.get("date").and_then(|d| d.as_str()).map(String::from);
        let day = value
            .get("day")
            .and_then(|d| d.as_str())
            .filter(|d| !d.trim().is_empty())
            .unwrap_or("Unknown")
            .to_string();

        let mut meals = BTreeMap::new();
        if let Some(obj) = value.get("meals").and_then(|m| m.as_object()) {
            for (meal_type, items) in obj {
                let parsed: MealItems = match items {
                    Value::Object(map) => map
                        .iter()
                        .map(|(name, record)| (name.clone(), NutritionRecord::from_value(record)))
                        .collect(),
                    Value::Array(list) => list
                        .iter()
                        .filter_map(|v| v.as_str())
                        .map(|name| (name.to_string(), NutritionRecord::default()))
                        .collect(),
                    _ => continue,
                };
                meals.insert(meal_type.clone(), parsed);
            }
        }

        Self {
            date,
            day,
            meals,
            raw_items: value.get("raw_items").filter(|v| !v.is_null()).cloned(),
            saved_at: None,
        }
    }

    pub fn item_count(&self) -> usize {
        self.meals.values().map(|items| items.len()).sum()
    }
}

/// A meal combination suggested by the recommendation service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecommendedCombo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub items: Vec<String>,
    #[serde(default)]
    pub total_macros: Macros,
    #[serde(default)]
    pub reasoning: String,
}

impl RecommendedCombo {
    pub fn from_value(value: &Value) -> Self {
        let text = |key: &str| {
            value
                .get(key)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };
        let items = value
            .get("items")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|item| match item {
                        Value::String(s) => Some(s.clone()),
                        Value::Null => None,
                        other => Some(other.to_string()),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            name: text("name"),
            description: text("description"),
            items,
            total_macros: value
                .get("total_macros")
                .map(Macros::from_value)
                .unwrap_or_default(),
            reasoning: text("reasoning"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecommendationSet {
    #[serde(default)]
    pub motivation: String,
    #[serde(default)]
    pub recommendations: Vec<RecommendedCombo>,
    #[serde(default)]
    pub alternatives: Vec<String>,
}

/// Append-only record of a logged combo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealHistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub logged_combo: RecommendedCombo,
    pub source_menu_date: String,
}
