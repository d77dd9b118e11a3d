use crate::models::{Macros, MealItems, RecommendationSet, RecommendedCombo};

const HIGH_PROTEIN_THRESHOLD_G: f64 = 15.0;
const FALLBACK_COMBO_SIZE: usize = 3;

/// Local suggestion used when the recommendation service cannot be reached:
/// the three items with the most protein among those with at least 15 g.
///
/// Returns an empty set when nothing qualifies.
pub fn fallback_recommendations(items: &MealItems) -> RecommendationSet {
    let mut high_protein: Vec<_> = items
        .iter()
        .filter(|(_, record)| record.protein >= HIGH_PROTEIN_THRESHOLD_G)
        .collect();
    if high_protein.is_empty() {
        return RecommendationSet::default();
    }
    // Stable sort keeps name order among equal protein values.
    high_protein.sort_by(|a, b| b.1.protein.total_cmp(&a.1.protein));
    high_protein.truncate(FALLBACK_COMBO_SIZE);

    let total_macros = high_protein
        .iter()
        .fold(Macros::default(), |acc, (_, record)| acc + record.macros());

    RecommendationSet {
        motivation: "Keep pushing towards your goals!".to_string(),
        recommendations: vec![RecommendedCombo {
            name: "High Protein Combo".to_string(),
            description: "Best items for muscle gain".to_string(),
            items: high_protein
                .iter()
                .map(|(name, record)| format!("{} ({}g protein)", name, record.protein))
                .collect(),
            total_macros,
            reasoning: "Selected items with highest protein content".to_string(),
        }],
        alternatives: vec![
            "Add more vegetables".to_string(),
            "Include dairy products".to_string(),
        ],
    }
}
