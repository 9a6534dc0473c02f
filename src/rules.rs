// 🏷️ Classification Rules - Rules as Data
// Ordered keyword rules that map a Yape message to a transaction category

use crate::transaction::Category;
use anyhow::{Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

// ============================================================================
// RULE DEFINITION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRule {
    /// Rule ID for tracking
    pub id: String,

    /// Keyword to look for (case-insensitive substring)
    pub keyword: String,

    /// Category assigned when the keyword is present
    pub category: Category,

    /// Description/notes about this rule
    #[serde(default)]
    pub description: Option<String>,
}

impl CategoryRule {
    pub fn new(id: &str, keyword: &str, category: Category) -> Self {
        CategoryRule {
            id: id.to_string(),
            keyword: keyword.to_string(),
            category,
            description: None,
        }
    }

    /// Check if the keyword appears anywhere in the text (case-insensitive)
    pub fn matches(&self, text: &str) -> bool {
        if self.keyword.is_empty() {
            return false;
        }

        text.to_lowercase().contains(&self.keyword.to_lowercase())
    }
}

/// Built-in Yape rules. Order is priority: the first matching rule wins,
/// wherever the keyword sits in the message.
pub fn yape_rules() -> Vec<CategoryRule> {
    vec![
        CategoryRule::new("recibiste", "Recibiste", Category::Income),
        CategoryRule::new("te_envio_un_pago", "te envió un pago", Category::Income),
        CategoryRule::new("te_enviaron", "te enviaron", Category::Income),
        CategoryRule::new("enviaste", "Enviaste", Category::Expense),
        CategoryRule::new("pagaste", "Pagaste", Category::Payment),
        CategoryRule::new("retiraste", "Retiraste", Category::Withdrawal),
    ]
}

// ============================================================================
// CLASSIFICATION RESULT
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    pub category: Category,
    pub rule_id: Option<String>,
}

impl Default for ClassificationResult {
    fn default() -> Self {
        ClassificationResult {
            category: Category::Other,
            rule_id: None,
        }
    }
}

// ============================================================================
// CATEGORY CLASSIFIER
// ============================================================================

#[derive(Debug, Clone)]
pub struct CategoryClassifier {
    rules: Vec<CategoryRule>,
}

impl CategoryClassifier {
    /// Create a classifier with no rules (everything is OTHER)
    pub fn new() -> Self {
        CategoryClassifier { rules: Vec::new() }
    }

    /// Load rules from a JSON array file, keeping file order
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read rules file: {:?}", path.as_ref()))?;

        let rules: Vec<CategoryRule> =
            serde_json::from_str(&content).context("Failed to parse rules JSON")?;

        Ok(CategoryClassifier::from_rules(rules))
    }

    /// Create classifier from an ordered list of rules
    pub fn from_rules(rules: Vec<CategoryRule>) -> Self {
        CategoryClassifier { rules }
    }

    /// Append a rule at the lowest priority
    pub fn add_rule(&mut self, rule: CategoryRule) {
        self.rules.push(rule);
    }

    /// Apply rules in order; first match wins
    pub fn classify(&self, text: &str) -> ClassificationResult {
        self.rules
            .iter()
            .find(|rule| rule.matches(text))
            .map(|rule| ClassificationResult {
                category: rule.category,
                rule_id: Some(rule.id.clone()),
            })
            .unwrap_or_default()
    }

    /// Shortcut when only the category matters
    pub fn category_of(&self, text: &str) -> Category {
        self.classify(text).category
    }

    pub fn rules(&self) -> &[CategoryRule] {
        &self.rules
    }

    /// Get number of rules loaded
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

impl Default for CategoryClassifier {
    /// The built-in Yape rule set
    fn default() -> Self {
        CategoryClassifier::from_rules(yape_rules())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_keyword_match_is_case_insensitive() {
        let rule = CategoryRule::new("enviaste", "Enviaste", Category::Expense);

        assert!(rule.matches("Enviaste a Maria Garcia por S/ 50.00"));
        assert!(rule.matches("ENVIASTE S/ 10"));
        assert!(rule.matches("ya enviaste"));
        assert!(!rule.matches("Recibiste de Ana"));
    }

    #[test]
    fn test_accented_keyword_match() {
        let rule = CategoryRule::new("te_envio_un_pago", "te envió un pago", Category::Income);

        assert!(rule.matches("Yape! Juan Perez te envió un pago de S/ 150.50"));
        assert!(rule.matches("JUAN TE ENVIÓ UN PAGO"));
        assert!(!rule.matches("Juan te envio un pago"));
    }

    #[test]
    fn test_empty_keyword_never_matches() {
        let rule = CategoryRule::new("empty", "", Category::Income);
        assert!(!rule.matches("anything"));
    }

    #[test]
    fn test_default_rules_each_category() {
        let classifier = CategoryClassifier::default();

        assert_eq!(classifier.category_of("Recibiste de J. Lopez por S/ 20.00"), Category::Income);
        assert_eq!(classifier.category_of("Yape! Juan te envió un pago de S/ 5"), Category::Income);
        assert_eq!(classifier.category_of("Te enviaron S/ 30"), Category::Income);
        assert_eq!(classifier.category_of("Enviaste a Maria Garcia por S/ 50.00"), Category::Expense);
        assert_eq!(classifier.category_of("Pagaste a Bodega Rosa por S/ 12.00"), Category::Payment);
        assert_eq!(classifier.category_of("Retiraste S/ 100 del cajero"), Category::Withdrawal);
        assert_eq!(classifier.category_of("Tu código de verificación es 1234"), Category::Other);
    }

    #[test]
    fn test_rule_order_wins_over_position() {
        let classifier = CategoryClassifier::default();

        // "Pagaste" appears first in the text but "Recibiste" has priority
        let result = classifier.classify("Pagaste antes, ahora Recibiste S/ 10");
        assert_eq!(result.category, Category::Income);
        assert_eq!(result.rule_id, Some("recibiste".to_string()));

        let result = classifier.classify("Enviaste y Pagaste");
        assert_eq!(result.category, Category::Expense);
    }

    #[test]
    fn test_no_match() {
        let classifier = CategoryClassifier::new();
        let result = classifier.classify("Recibiste S/ 10");

        assert_eq!(result.category, Category::Other);
        assert_eq!(result.rule_id, None);
    }

    #[test]
    fn test_add_rule_appends_lowest_priority() {
        let mut classifier = CategoryClassifier::default();
        classifier.add_rule(CategoryRule::new("recarga", "Recargaste", Category::Payment));
        classifier.add_rule(CategoryRule::new("late_income", "Enviaste", Category::Income));

        assert_eq!(classifier.rule_count(), 8);
        assert_eq!(classifier.category_of("Recargaste tu celular"), Category::Payment);
        // Built-in "enviaste" rule still fires first
        assert_eq!(classifier.category_of("Enviaste S/ 5"), Category::Expense);
    }

    #[test]
    fn test_from_file_keeps_order() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"id": "retiro", "keyword": "Retiraste", "category": "WITHDRAWAL"}},
                {{"id": "recibiste", "keyword": "Recibiste", "category": "INCOME",
                  "description": "money in"}}
            ]"#
        )
        .unwrap();

        let classifier = CategoryClassifier::from_file(file.path()).unwrap();
        assert_eq!(classifier.rule_count(), 2);
        assert_eq!(classifier.rules()[0].id, "retiro");
        assert_eq!(classifier.rules()[1].description, Some("money in".to_string()));

        // File order: Retiraste beats Recibiste here
        assert_eq!(classifier.category_of("Recibiste y Retiraste"), Category::Withdrawal);
    }

    #[test]
    fn test_from_file_missing() {
        let result = CategoryClassifier::from_file("/nonexistent/rules.json");
        assert!(result.is_err());
    }
}
