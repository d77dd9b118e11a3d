use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{info, warn};

use crate::api_connection::endpoints::{FoodLookup, HealthStatus, ProfilePayload, ProfileSetup, RecommendationRequest};
use crate::api_connection::{ApiClient, ApiConnectionError};
use crate::menu_aggregator::{select_items, MealFilter};
use crate::menu_store::{assign_keys, date_key};
use crate::models::{
    DailyTargets, IntakeTotals, MealItems, MenuDay, RecommendationSet, RecommendedCombo, UserProfile,
};
use crate::progress::{progress_report, MacroProgress};
use crate::recommendations::fallback_recommendations;
use crate::storage::{AppStore, StoreError};

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error(transparent)]
    Api(#[from] ApiConnectionError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("invalid profile: {0}")]
    InvalidProfile(String),
    #[error("no profile saved yet, run `setup-profile` first")]
    MissingProfile,
    #[error("no daily targets saved yet, run `setup-profile` first")]
    MissingTargets,
    #[error("no menu saved for {0}, scan one first")]
    NoMenuForDate(String),
    #[error("no menu entries found, please try a different image or PDF")]
    EmptyScan,
    #[error("there is no recommendation #{0} to log, run `recommend` first")]
    NoSuchCombo(usize),
}

pub type PlannerResult<T> = Result<T, PlannerError>;

#[derive(Debug, Clone, PartialEq)]
pub struct ScanOutcome {
    /// Position of this scan among all scans started by this planner.
    pub ticket: u64,
    /// Days written to the store with their keys, in batch order.
    pub saved: Vec<(String, MenuDay)>,
    /// Keys a scan started later had already written; those days were dropped.
    pub skipped: Vec<String>,
}

impl ScanOutcome {
    pub fn saved_keys(&self) -> Vec<&str> {
        self.saved.iter().map(|(key, _)| key.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dashboard {
    pub profile: UserProfile,
    pub targets: DailyTargets,
    pub tdee: Option<f64>,
    pub intake: IntakeTotals,
    pub progress: Vec<MacroProgress>,
    pub workout_today: String,
    pub menu_today: bool,
}

struct PlannerState {
    store: AppStore,
    /// Per date key, the ticket of the scan that last wrote it.
    committed_scans: BTreeMap<String, u64>,
}

/// Runs the user-facing workflows: talks to the analysis service and writes
/// the results into the store.
///
/// Store access is serialized by a mutex and never held across a request.
pub struct Planner {
    client: ApiClient,
    state: Mutex<PlannerState>,
    scan_tickets: AtomicU64,
}

impl Planner {
    pub fn new(client: ApiClient, store: AppStore) -> Self {
        Self {
            client,
            state: Mutex::new(PlannerState {
                store,
                committed_scans: BTreeMap::new(),
            }),
            scan_tickets: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PlannerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` with exclusive access to the store.
    pub fn with_store<R>(&self, f: impl FnOnce(&mut AppStore) -> R) -> R {
        f(&mut self.lock().store)
    }

    fn require_profile(store: &AppStore) -> PlannerResult<UserProfile> {
        store.user_profile()?.ok_or(PlannerError::MissingProfile)
    }

    fn require_targets(store: &AppStore) -> PlannerResult<DailyTargets> {
        store.daily_targets()?.ok_or(PlannerError::MissingTargets)
    }

    pub async fn health(&self) -> PlannerResult<HealthStatus> {
        Ok(self.client.health().await?)
    }

    /// Sends the profile for target calculation and, on success, replaces the
    /// saved profile, targets and TDEE and starts intake from zero.
    pub async fn setup_profile(&self, profile: UserProfile, today: NaiveDate) -> PlannerResult<ProfileSetup> {
        profile.validate().map_err(PlannerError::InvalidProfile)?;
        let payload = ProfilePayload::from_profile(&profile, today);
        let setup = self.client.setup_profile(&payload).await?;

        let mut state = self.lock();
        state.store.set_user_profile(&profile)?;
        state.store.set_daily_targets(&setup.daily_targets)?;
        state.store.set_tdee(setup.tdee)?;
        state.store.set_onboarding_complete(true)?;
        state.store.reset_intake()?;
        info!(
            tdee = setup.tdee,
            calories = setup.daily_targets.calories,
            protein = setup.daily_targets.protein,
            "profile saved"
        );
        Ok(setup)
    }

    /// Uploads a menu and saves every scanned day.
    ///
    /// An empty scan is an error and leaves the store untouched. When scans
    /// overlap, the one started last wins for each date key: a day from an
    /// older response is dropped only if a newer scan already wrote that key.
    pub async fn scan_menu(&self, path: &Path, today: NaiveDate, now: DateTime<Utc>) -> PlannerResult<ScanOutcome> {
        let ticket = self.scan_tickets.fetch_add(1, Ordering::SeqCst) + 1;
        let menus = self.client.scan_menu(path).await?;
        if menus.is_empty() {
            return Err(PlannerError::EmptyScan);
        }

        let mut state = self.lock();
        let (fresh, stale): (Vec<_>, Vec<_>) = assign_keys(menus, today)
            .into_iter()
            .partition(|(key, _)| {
                state
                    .committed_scans
                    .get(key)
                    .map_or(true, |&newest| newest <= ticket)
            });
        let skipped: Vec<String> = stale.into_iter().map(|(key, _)| key).collect();
        if !skipped.is_empty() {
            warn!(
                ticket,
                skipped = ?skipped,
                "dropping days a newer scan already saved"
            );
        }

        if !fresh.is_empty() {
            let written = state.store.merge_keyed_menus(fresh.clone(), now)?;
            for key in written {
                state.committed_scans.insert(key, ticket);
            }
        }
        info!(ticket, saved = fresh.len(), skipped = skipped.len(), "saved scanned menus");
        Ok(ScanOutcome {
            ticket,
            saved: fresh,
            skipped,
        })
    }

    /// Items of the chosen meals on `date`, or an error when no menu is saved for it.
    pub fn menu_items(&self, date: NaiveDate, filter: &MealFilter) -> PlannerResult<MealItems> {
        let state = self.lock();
        let day = state
            .store
            .menu_for(date)?
            .ok_or_else(|| PlannerError::NoMenuForDate(date_key(date)))?;
        Ok(select_items(&day, filter))
    }

    fn recommendation_request(
        &self,
        date: NaiveDate,
        filter: &MealFilter,
        today: NaiveDate,
    ) -> PlannerResult<RecommendationRequest> {
        let menu_items = self.menu_items(date, filter)?;
        let state = self.lock();
        let profile = Self::require_profile(&state.store)?;
        let daily_target = Self::require_targets(&state.store)?;
        Ok(RecommendationRequest {
            user_profile: ProfilePayload::from_profile(&profile, today),
            menu_items,
            current_intake: state.store.current_intake()?,
            daily_target,
        })
    }

    /// Asks the service for combos from the menu saved for `date` and keeps
    /// them so one can be logged later.
    pub async fn recommend(
        &self,
        date: NaiveDate,
        filter: &MealFilter,
        today: NaiveDate,
    ) -> PlannerResult<RecommendationSet> {
        let request = self.recommendation_request(date, filter, today)?;
        let set = self.client.get_recommendations(&request).await?;
        self.remember_recommendations(date, &set)?;
        Ok(set)
    }

    /// Locally built combo for when [`Planner::recommend`] fails.
    pub fn fallback_recommendations(&self, date: NaiveDate, filter: &MealFilter) -> PlannerResult<RecommendationSet> {
        let set = fallback_recommendations(&self.menu_items(date, filter)?);
        self.remember_recommendations(date, &set)?;
        Ok(set)
    }

    fn remember_recommendations(&self, date: NaiveDate, set: &RecommendationSet) -> PlannerResult<()> {
        self.lock().store.set_last_recommendations(&date_key(date), set)?;
        Ok(())
    }

    pub fn log_combo(
        &self,
        combo: &RecommendedCombo,
        menu_date: &str,
        now: DateTime<Utc>,
    ) -> PlannerResult<IntakeTotals> {
        Ok(self.lock().store.log_meal(combo, menu_date, now)?)
    }

    /// Logs combo number `index` (1-based) from the last recommendations.
    pub fn log_recommended(&self, index: usize, now: DateTime<Utc>) -> PlannerResult<(RecommendedCombo, IntakeTotals)> {
        let mut state = self.lock();
        let (menu_date, set) = state
            .store
            .last_recommendations()?
            .ok_or(PlannerError::NoSuchCombo(index))?;
        let combo = index
            .checked_sub(1)
            .and_then(|i| set.recommendations.get(i))
            .cloned()
            .ok_or(PlannerError::NoSuchCombo(index))?;
        let intake = state.store.log_meal(&combo, &menu_date, now)?;
        Ok((combo, intake))
    }

    pub async fn guidance(&self, today: NaiveDate) -> PlannerResult<String> {
        let request = {
            let state = self.lock();
            let profile = Self::require_profile(&state.store)?;
            RecommendationRequest {
                user_profile: ProfilePayload::from_profile(&profile, today),
                menu_items: MealItems::new(),
                current_intake: state.store.current_intake()?,
                daily_target: Self::require_targets(&state.store)?,
            }
        };
        Ok(self.client.get_guidance(&request).await?)
    }

    /// Motivation for today's workout, or for `workout` when given.
    pub async fn motivation(&self, workout: Option<&str>, today: NaiveDate) -> PlannerResult<(String, String)> {
        let profile = Self::require_profile(&self.lock().store)?;
        let workout = workout
            .map(String::from)
            .unwrap_or_else(|| profile.workout_on(today).to_string());
        let message = self
            .client
            .workout_motivation(&workout, profile.goal.as_str())
            .await?;
        Ok((workout, message))
    }

    pub async fn search_food(&self, name: &str) -> PlannerResult<FoodLookup> {
        Ok(self.client.search_food(name).await?)
    }

    pub fn dashboard(&self, today: NaiveDate) -> PlannerResult<Dashboard> {
        let state = self.lock();
        let profile = Self::require_profile(&state.store)?;
        let targets = Self::require_targets(&state.store)?;
        let intake = state.store.current_intake()?;
        Ok(Dashboard {
            workout_today: profile.workout_on(today).to_string(),
            progress: progress_report(&intake, &targets),
            tdee: state.store.tdee()?,
            menu_today: state.store.has_menu(today)?,
            profile,
            targets,
            intake,
        })
    }
}
