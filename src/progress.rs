use serde::Serialize;

use crate::models::{DailyTargets, IntakeTotals};

/// How far today's intake has come toward one daily target.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MacroProgress {
    pub name: &'static str,
    pub unit: &'static str,
    pub current: f64,
    pub target: f64,
    /// Share of the target reached, capped at 100.
    pub percentage: f64,
    pub remaining: f64,
}

impl MacroProgress {
    fn new(name: &'static str, unit: &'static str, current: f64, target: f64) -> Self {
        let percentage = if target > 0.0 {
            (current / target * 100.0).min(100.0)
        } else {
            0.0
        };
        Self {
            name,
            unit,
            current,
            target,
            percentage,
            remaining: (target - current).max(0.0),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.target > 0.0 && self.percentage >= 100.0
    }
}

/// Calories, protein, carbs, fats, in that order.
pub fn progress_report(intake: &IntakeTotals, targets: &DailyTargets) -> Vec<MacroProgress> {
    vec![
        MacroProgress::new("Calories", "kcal", intake.calories, targets.calories),
        MacroProgress::new("Protein", "g", intake.protein, targets.protein),
        MacroProgress::new("Carbs", "g", intake.carbs, targets.carbs),
        MacroProgress::new("Fats", "g", intake.fats, targets.fats),
    ]
}
