use super::{Category, ClassificationResult, LabelScheme};

/// Words that justify a worst-tier verdict.
pub const NEGATIVE_SIGNALS: [&str; 7] = [
    "cluttered",
    "clashing",
    "pixelated",
    "dated",
    "unprofessional",
    "poor",
    "inconsistent",
];

/// Downgrade a worst-tier result whose explanation names no concrete flaw.
///
/// Moves worst to middle only, never further. Returns whether it fired.
pub fn enforce_consistency(result: &mut ClassificationResult, scheme: &LabelScheme) -> bool {
    if result.category != Category::Outdated {
        return false;
    }
    let lower = result.explanation.to_lowercase();
    if NEGATIVE_SIGNALS.iter().any(|kw| lower.contains(kw)) {
        return false;
    }

    tracing::warn!(
        from=%scheme.worst,
        to=%scheme.middle,
        "aesthetic.reclassified: explanation lacks significant aesthetic flaws"
    );
    result.category = Category::Acceptable;
    result.explanation = format!(
        "{} (Reclassified as {} due to lack of significant aesthetic flaws by 2025 standards.)",
        result.explanation, scheme.middle
    );
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outdated(explanation: &str) -> ClassificationResult {
        ClassificationResult::new(Category::Outdated, explanation)
    }

    #[test]
    fn downgrades_without_negative_keywords() {
        let mut r = outdated("The layout feels fresh and contemporary");
        assert!(enforce_consistency(&mut r, &LabelScheme::MODERNITY));
        assert_eq!(r.category, Category::Acceptable);
        assert!(r.explanation.starts_with("The layout feels fresh and contemporary (Reclassified as Acceptable"));
    }

    #[test]
    fn keeps_outdated_when_flaws_are_named() {
        let mut r = outdated("cluttered layout, clashing colors");
        assert!(!enforce_consistency(&mut r, &LabelScheme::MODERNITY));
        assert_eq!(r, outdated("cluttered layout, clashing colors"));
    }

    #[test]
    fn keyword_match_ignores_case() {
        let mut r = outdated("Pixelated hero image.");
        assert!(!enforce_consistency(&mut r, &LabelScheme::MODERNITY));
    }

    #[test]
    fn other_tiers_are_untouched() {
        for cat in [Category::Modern, Category::Acceptable, Category::Error] {
            let mut r = ClassificationResult::new(cat, "fine");
            assert!(!enforce_consistency(&mut r, &LabelScheme::MODERNITY));
            assert_eq!(r.category, cat);
        }
    }

    #[test]
    fn note_uses_scheme_middle_label() {
        let mut r = outdated("Bright and airy.");
        enforce_consistency(&mut r, &LabelScheme::BEAUTY);
        assert!(r.explanation.contains("Reclassified as Passable"));
    }
}
