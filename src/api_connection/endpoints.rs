use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::connection::ApiConnectionError;
use crate::models::{
    number_from_value, DailyTargets, IntakeTotals, Macros, MealItems, MenuDay, NutritionRecord,
    RecommendationSet, RecommendedCombo, UserProfile,
};

pub const HEALTH: &str = "health";
pub const SETUP_PROFILE: &str = "setup-profile";
pub const SCAN_MENU: &str = "scan-menu";
pub const GET_RECOMMENDATIONS: &str = "get-recommendations";
pub const GET_GUIDANCE: &str = "get-guidance";
pub const WORKOUT_MOTIVATION: &str = "workout-motivation";
pub const SEARCH_FOOD: &str = "search-food";

/// Largest menu upload the analysis service accepts (10 MiB).
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

const UPLOAD_TYPES: &[(&str, &str)] = &[
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("pdf", "application/pdf"),
];

/// MIME type for an accepted menu file extension, case-insensitive.
pub fn upload_mime_type(extension: &str) -> Option<&'static str> {
    UPLOAD_TYPES
        .iter()
        .find(|(ext, _)| ext.eq_ignore_ascii_case(extension))
        .map(|(_, mime)| *mime)
}

/// Profile fields in the shape `/setup-profile` and `/get-recommendations` expect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfilePayload {
    pub age: u32,
    pub height: f64,
    pub weight: f64,
    pub goal: String,
    pub activity_level: String,
    pub workout_today: String,
}

impl ProfilePayload {
    pub fn from_profile(profile: &UserProfile, today: NaiveDate) -> Self {
        Self {
            age: profile.age,
            height: profile.height_cm,
            weight: profile.weight_kg,
            goal: profile.goal.as_str().to_string(),
            activity_level: profile.activity_level.as_str().to_string(),
            workout_today: profile.workout_on(today).to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendationRequest {
    pub user_profile: ProfilePayload,
    pub menu_items: MealItems,
    pub current_intake: IntakeTotals,
    pub daily_target: DailyTargets,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: Option<String>,
    pub service: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSetup {
    pub daily_targets: DailyTargets,
    pub tdee: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodLookup {
    pub found: bool,
    pub nutrition: Option<NutritionRecord>,
    pub message: Option<String>,
}

fn malformed(message: impl Into<String>) -> ApiConnectionError {
    ApiConnectionError::MalformedResponse(message.into())
}

/// Fails unless the payload carries `"status": "success"`.
pub fn ensure_success(body: &Value) -> Result<(), ApiConnectionError> {
    match body.get("status").and_then(|s| s.as_str()) {
        Some("success") => Ok(()),
        other => {
            let message = body
                .get("detail")
                .and_then(|d| d.as_str())
                .map(String::from)
                .unwrap_or_else(|| match other {
                    Some(status) => format!("server returned status '{}'", status),
                    None => "server response has no status".to_string(),
                });
            Err(ApiConnectionError::UnsuccessfulStatus(message))
        }
    }
}

pub fn parse_health(body: &Value) -> Result<HealthStatus, ApiConnectionError> {
    let text = |key: &str| body.get(key).and_then(|v| v.as_str()).map(String::from);
    let status = text("status").ok_or_else(|| malformed("health response has no status"))?;
    Ok(HealthStatus {
        status,
        timestamp: text("timestamp"),
        service: text("service"),
    })
}

pub fn parse_profile_setup(body: &Value) -> Result<ProfileSetup, ApiConnectionError> {
    ensure_success(body)?;
    let targets = body
        .get("daily_targets")
        .filter(|t| t.is_object())
        .ok_or_else(|| malformed("response has no daily_targets"))?;
    let tdee = body
        .get("tdee")
        .filter(|t| !t.is_null())
        .ok_or_else(|| malformed("response has no tdee"))?;
    Ok(ProfileSetup {
        daily_targets: Macros::from_value(targets),
        tdee: number_from_value(tdee),
    })
}

/// Menus in the order the scanner reported them. An empty list is returned
/// as-is; deciding that it is an error is up to the caller.
pub fn parse_scan_menu(body: &Value) -> Result<Vec<MenuDay>, ApiConnectionError> {
    ensure_success(body)?;
    let menus = body
        .get("menus")
        .ok_or_else(|| malformed("no menus found in response"))?
        .as_array()
        .ok_or_else(|| malformed("menus is not an array"))?;
    Ok(menus.iter().map(MenuDay::from_value).collect())
}

pub fn parse_recommendations(body: &Value) -> Result<RecommendationSet, ApiConnectionError> {
    ensure_success(body)?;
    let payload = body
        .get("recommendations")
        .filter(|r| r.is_object())
        .ok_or_else(|| malformed("response has no recommendations object"))?;
    if let Some(error) = payload.get("error").and_then(|e| e.as_str()) {
        return Err(malformed(format!("recommendation service could not answer: {}", error)));
    }
    let combos = payload
        .get("recommendations")
        .and_then(|r| r.as_array())
        .ok_or_else(|| malformed("recommendations list is missing"))?;

    Ok(RecommendationSet {
        motivation: payload
            .get("motivation")
            .and_then(|m| m.as_str())
            .unwrap_or_default()
            .to_string(),
        recommendations: combos.iter().map(RecommendedCombo::from_value).collect(),
        alternatives: payload
            .get("alternatives")
            .and_then(|a| a.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str()).map(String::from).collect())
            .unwrap_or_default(),
    })
}

fn required_text(body: &Value, key: &str) -> Result<String, ApiConnectionError> {
    ensure_success(body)?;
    body.get(key)
        .and_then(|v| v.as_str())
        .map(String::from)
        .ok_or_else(|| malformed(format!("response has no {}", key)))
}

pub fn parse_guidance(body: &Value) -> Result<String, ApiConnectionError> {
    required_text(body, "guidance")
}

pub fn parse_motivation(body: &Value) -> Result<String, ApiConnectionError> {
    required_text(body, "motivation")
}

pub fn parse_food_lookup(body: &Value) -> Result<FoodLookup, ApiConnectionError> {
    ensure_success(body)?;
    let found = body.get("found").and_then(|f| f.as_bool()).unwrap_or(false);
    Ok(FoodLookup {
        found,
        nutrition: body
            .get("nutrition")
            .filter(|n| found && n.is_object())
            .map(NutritionRecord::from_value),
        message: body.get("message").and_then(|m| m.as_str()).map(String::from),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActivityLevel, Goal, WorkoutSplit};
    use serde_json::json;

    #[test]
    fn test_upload_mime_types() {
        assert_eq!(upload_mime_type("PDF"), Some("application/pdf"));
        assert_eq!(upload_mime_type("jpeg"), Some("image/jpeg"));
        assert_eq!(upload_mime_type("gif"), None);
    }

    #[test]
    fn test_profile_payload_uses_todays_workout() {
        let profile = UserProfile {
            name: None,
            age: 20,
            height_cm: 175.0,
            weight_kg: 70.0,
            goal: Goal::Bulk,
            activity_level: ActivityLevel::VeryActive,
            workout_split: WorkoutSplit::default(),
        };
        // 2024-01-10 is a Wednesday.
        let payload = ProfilePayload::from_profile(&profile, NaiveDate::from_ymd_opt(2024, 1, 10).unwrap());
        assert_eq!(payload.workout_today, "legs");
        assert_eq!(payload.activity_level, "very_active");
        assert_eq!(payload.goal, "bulk");
    }

    #[test]
    fn test_unsuccessful_status_surfaces_detail() {
        let err = ensure_success(&json!({"status": "error", "detail": "OCR failed"})).unwrap_err();
        assert_eq!(err.to_string(), "request failed: OCR failed");
        let err = ensure_success(&json!({"status": "pending"})).unwrap_err();
        assert!(err.to_string().contains("pending"));
    }

    #[test]
    fn test_parse_profile_setup() {
        let setup = parse_profile_setup(&json!({
            "status": "success",
            "tdee": 2700,
            "daily_targets": {"calories": 3000, "protein": 140, "carbs": 380, "fats": 83}
        }))
        .unwrap();
        assert_eq!(setup.tdee, 2700.0);
        assert_eq!(setup.daily_targets, Macros::new(3000.0, 140.0, 380.0, 83.0));

        let missing = parse_profile_setup(&json!({"status": "success", "tdee": 2700}));
        assert!(matches!(missing, Err(ApiConnectionError::MalformedResponse(_))));
    }

    #[test]
    fn test_parse_scan_menu_shapes() {
        let menus = parse_scan_menu(&json!({
            "status": "success",
            "menus": [{"date": "unknown", "day": "Monday", "meals": {"Lunch": {"Dal": {"protein": 8}}}}],
            "count": 1
        }))
        .unwrap();
        assert_eq!(menus.len(), 1);
        assert_eq!(menus[0].meals["Lunch"]["Dal"].protein, 8.0);

        assert!(parse_scan_menu(&json!({"status": "success", "menus": []})).unwrap().is_empty());
        assert!(matches!(
            parse_scan_menu(&json!({"status": "success", "menus": {}})),
            Err(ApiConnectionError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_scan_menu(&json!({"status": "success"})),
            Err(ApiConnectionError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_parse_recommendations_tolerates_partial_combos() {
        let set = parse_recommendations(&json!({
            "status": "success",
            "recommendations": {
                "motivation": "Legs day, eat up",
                "recommendations": [
                    {"name": "A", "items": ["Rajma Rice"], "total_macros": {"calories": 450, "protein": 15}},
                    {"name": "B", "items": []}
                ]
            }
        }))
        .unwrap();
        assert_eq!(set.recommendations.len(), 2);
        assert_eq!(set.recommendations[1].total_macros, Macros::default());
        assert!(set.alternatives.is_empty());
    }

    #[test]
    fn test_parse_recommendations_reports_agent_error() {
        let result = parse_recommendations(&json!({
            "status": "success",
            "recommendations": {"error": "Could not parse recommendations", "raw": "..."}
        }));
        match result {
            Err(ApiConnectionError::MalformedResponse(message)) => {
                assert!(message.contains("Could not parse recommendations"))
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_food_lookup() {
        let hit = parse_food_lookup(&json!({
            "status": "success",
            "found": true,
            "nutrition": {"name": "Paneer", "protein": 18, "carbs": 3, "fats": 20, "calories": 265, "portion": "100g"}
        }))
        .unwrap();
        assert!(hit.found);
        assert_eq!(hit.nutrition.unwrap().portion.as_deref(), Some("100g"));

        let miss = parse_food_lookup(&json!({
            "status": "success",
            "found": false,
            "message": "Food 'x' not found in database"
        }))
        .unwrap();
        assert!(!miss.found);
        assert!(miss.nutrition.is_none());
        assert!(miss.message.is_some());
    }
}
