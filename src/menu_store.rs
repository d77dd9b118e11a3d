use chrono::{DateTime, Days, NaiveDate, Utc};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::models::MenuDay;
use crate::storage::{AppStore, StoreError};

/// Scanned menus keyed by `YYYY-MM-DD`.
pub type MenuStore = BTreeMap<String, MenuDay>;

const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

pub fn date_key(date: NaiveDate) -> String {
    date.format(DATE_KEY_FORMAT).to_string()
}

pub fn parse_date_key(key: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(key.trim(), DATE_KEY_FORMAT).ok()
}

/// Picks the store key for the record at `index` of a scanned batch.
///
/// A reported date is used when it parses as an ISO date. Otherwise the key
/// is `today + index` days. That fallback is a guess: a menu scanned without
/// a readable date may land on the wrong day.
pub fn resolve_date_key(reported: Option<&str>, index: usize, today: NaiveDate) -> (String, bool) {
    if let Some(date) = reported.and_then(parse_date_key) {
        return (date_key(date), false);
    }
    let synthetic = today
        .checked_add_days(Days::new(index as u64))
        .unwrap_or(today);
    (date_key(synthetic), true)
}

/// Pairs every record of a scanned batch with its store key, in batch order.
pub fn assign_keys(batch: Vec<MenuDay>, today: NaiveDate) -> Vec<(String, MenuDay)> {
    batch
        .into_iter()
        .enumerate()
        .map(|(index, day)| {
            let (key, synthetic) = resolve_date_key(day.date.as_deref(), index, today);
            if synthetic {
                warn!(
                    index,
                    reported = day.date.as_deref().unwrap_or(""),
                    key = %key,
                    "menu has no usable date, assigning a sequential one"
                );
            }
            (key, day)
        })
        .collect()
}

/// Writes already keyed days into `menus`, replacing whole days.
///
/// Returns the keys in order; a key repeated in the input appears twice and
/// the later record wins.
pub fn merge_keyed(menus: &mut MenuStore, keyed: Vec<(String, MenuDay)>, saved_at: DateTime<Utc>) -> Vec<String> {
    let mut written = Vec::with_capacity(keyed.len());
    for (key, mut day) in keyed {
        day.saved_at = Some(saved_at);
        debug!(key = %key, meals = day.meals.len(), "storing menu day");
        menus.insert(key.clone(), day);
        written.push(key);
    }
    written
}

/// Keys and writes every record of `batch` into `menus`.
pub fn merge_menus(
    menus: &mut MenuStore,
    batch: Vec<MenuDay>,
    today: NaiveDate,
    saved_at: DateTime<Utc>,
) -> Vec<String> {
    merge_keyed(menus, assign_keys(batch, today), saved_at)
}

pub fn has_menu(menus: &MenuStore, date: NaiveDate) -> bool {
    menus.contains_key(&date_key(date))
}

pub fn menu_for(menus: &MenuStore, date: NaiveDate) -> Option<&MenuDay> {
    menus.get(&date_key(date))
}

/// Keys in lexicographic order, which is chronological for ISO dates.
pub fn available_dates(menus: &MenuStore) -> Vec<String> {
    menus.keys().cloned().collect()
}

impl AppStore {
    /// Merges a scanned batch into the persisted menus and writes them back.
    pub fn merge_menus(
        &mut self,
        batch: Vec<MenuDay>,
        today: NaiveDate,
        saved_at: DateTime<Utc>,
    ) -> Result<Vec<String>, StoreError> {
        self.merge_keyed_menus(assign_keys(batch, today), saved_at)
    }

    pub fn merge_keyed_menus(
        &mut self,
        keyed: Vec<(String, MenuDay)>,
        saved_at: DateTime<Utc>,
    ) -> Result<Vec<String>, StoreError> {
        let mut menus = self.saved_menus()?;
        let written = merge_keyed(&mut menus, keyed, saved_at);
        self.set_saved_menus(&menus)?;
        Ok(written)
    }

    pub fn has_menu(&self, date: NaiveDate) -> Result<bool, StoreError> {
        Ok(has_menu(&self.saved_menus()?, date))
    }

    pub fn menu_for(&self, date: NaiveDate) -> Result<Option<MenuDay>, StoreError> {
        Ok(self.saved_menus()?.remove(&date_key(date)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NutritionRecord;
    use chrono::TimeZone;

    fn day(date: &str, item: &str) -> MenuDay {
        let mut meals = BTreeMap::new();
        let mut items = BTreeMap::new();
        items.insert(item.to_string(), NutritionRecord::default());
        meals.insert("Lunch".to_string(), items);
        MenuDay {
            date: Some(date.to_string()),
            day: "Monday".to_string(),
            meals,
            raw_items: None,
            saved_at: None,
        }
    }

    fn jan(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_unknown_dates_get_sequential_keys_from_today() {
        assert_eq!(resolve_date_key(Some("unknown"), 0, jan(10)), ("2024-01-10".to_string(), true));
        assert_eq!(resolve_date_key(Some("unknown"), 1, jan(10)), ("2024-01-11".to_string(), true));
        assert_eq!(resolve_date_key(None, 2, jan(10)), ("2024-01-12".to_string(), true));
        assert_eq!(resolve_date_key(Some(""), 0, jan(10)), ("2024-01-10".to_string(), true));
    }

    #[test]
    fn test_valid_reported_date_is_kept() {
        assert_eq!(resolve_date_key(Some("2024-02-29"), 5, jan(10)), ("2024-02-29".to_string(), false));
        assert!(resolve_date_key(Some("2024-02-30"), 0, jan(10)).1);
    }

    #[test]
    fn test_synthetic_keys_cross_month_boundary() {
        assert_eq!(resolve_date_key(Some("unknown"), 1, jan(31)).0, "2024-02-01");
    }

    #[test]
    fn test_merge_is_last_write_wins() {
        let mut menus = MenuStore::new();
        let written = merge_menus(
            &mut menus,
            vec![day("2024-01-12", "Rajma"), day("2024-01-12", "Paneer")],
            jan(10),
            now(),
        );
        assert_eq!(written, vec!["2024-01-12".to_string(), "2024-01-12".to_string()]);
        assert_eq!(menus.len(), 1);
        assert!(menus["2024-01-12"].meals["Lunch"].contains_key("Paneer"));
        assert!(!menus["2024-01-12"].meals["Lunch"].contains_key("Rajma"));
        assert_eq!(menus["2024-01-12"].saved_at, Some(now()));
    }

    #[test]
    fn test_assign_keys_uses_batch_position() {
        let keyed = assign_keys(vec![day("2024-02-01", "a"), day("unknown", "b"), day("", "c")], jan(10));
        let keys: Vec<_> = keyed.iter().map(|(key, _)| key.as_str()).collect();
        assert_eq!(keys, vec!["2024-02-01", "2024-01-11", "2024-01-12"]);
    }

    #[test]
    fn test_merge_overwrites_existing_day_entirely() {
        let mut menus = MenuStore::new();
        merge_menus(&mut menus, vec![day("2024-01-12", "Rajma")], jan(10), now());
        merge_menus(&mut menus, vec![day("2024-01-12", "Idli")], jan(10), now());
        let lunch = &menus["2024-01-12"].meals["Lunch"];
        assert_eq!(lunch.len(), 1);
        assert!(lunch.contains_key("Idli"));
    }

    #[test]
    fn test_has_menu_flips_after_save() {
        let mut store = AppStore::in_memory();
        assert!(!store.has_menu(jan(10)).unwrap());
        store.merge_menus(vec![day("unknown", "Dal")], jan(10), now()).unwrap();
        assert!(store.has_menu(jan(10)).unwrap());
        assert!(!store.has_menu(jan(11)).unwrap());
        assert_eq!(store.menu_for(jan(10)).unwrap().unwrap().date.as_deref(), Some("unknown"));
    }

    #[test]
    fn test_available_dates_are_sorted() {
        let mut menus = MenuStore::new();
        merge_menus(
            &mut menus,
            vec![day("2024-03-01", "a"), day("2023-12-31", "b"), day("2024-01-15", "c")],
            jan(10),
            now(),
        );
        assert_eq!(available_dates(&menus), vec!["2023-12-31", "2024-01-15", "2024-03-01"]);
    }
}
