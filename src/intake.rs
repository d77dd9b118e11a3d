use chrono::{DateTime, Utc};
use tracing::info;

use crate::models::{IntakeTotals, MealHistoryEntry, RecommendedCombo};
use crate::storage::{AppStore, StoreError, WriteBatch, CURRENT_INTAKE_KEY, MEAL_HISTORY_KEY};

/// Adds a combo's `total_macros` to the running intake. Negative or
/// non-finite amounts count as zero, so intake never goes down.
pub fn add_combo(intake: IntakeTotals, combo: &RecommendedCombo) -> IntakeTotals {
    intake + combo.total_macros.sanitized()
}

impl AppStore {
    /// Adds the combo to today's intake and appends it to the meal history.
    ///
    /// There is no way to take a logged meal back out.
    pub fn log_meal(
        &mut self,
        combo: &RecommendedCombo,
        source_menu_date: &str,
        now: DateTime<Utc>,
    ) -> Result<IntakeTotals, StoreError> {
        let updated = add_combo(self.current_intake()?, combo);
        let mut history = self.meal_history()?;
        history.push(MealHistoryEntry {
            timestamp: now,
            logged_combo: combo.clone(),
            source_menu_date: source_menu_date.to_string(),
        });

        let batch = WriteBatch::new()
            .put(CURRENT_INTAKE_KEY, &updated)?
            .put(MEAL_HISTORY_KEY, &history)?;
        self.commit(batch)?;
        info!(
            combo = %combo.name,
            calories = updated.calories,
            protein = updated.protein,
            "logged meal"
        );
        Ok(updated)
    }

    pub fn reset_intake(&mut self) -> Result<(), StoreError> {
        info!("intake reset to zero");
        self.set_current_intake(&IntakeTotals::default())
    }
}
