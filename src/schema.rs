use crate::utils::{format_brl, normalize_description};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema,
)]
#[serde(rename_all = "PascalCase")]
pub enum Category {
    #[schemars(description = "Revenue lines (Receita Bruta, Receita Líquida, deductions from revenue)")]
    Receita,

    #[schemars(description = "Cost of goods or services sold (Custo dos Produtos Vendidos)")]
    Custo,

    #[schemars(description = "Expenses, taxes and fees, and any line marked as a deduction")]
    Despesa,

    #[schemars(description = "Result lines: Lucro Bruto, Resultado Operacional, Lucro Líquido / Prejuízo")]
    Resultado,

    #[schemars(description = "Anything else, including all balance sheet accounts without a keyword")]
    Outros,
}

/// Keywords in priority order. Stored already normalized (upper case, no diacritics).
const CLASSIFICATION_RULES: &[(Category, &[&str])] = &[
    (Category::Custo, &["CUSTO"]),
    (Category::Receita, &["RECEITA"]),
    (Category::Despesa, &["DESPESA", "IMPOSTOS", "TAXAS", "(- )", "(-)"]),
    (Category::Resultado, &["LUCRO", "RESULTADO", "PREJUIZO"]),
];

impl Category {
    /// Classifies a line-item description. First matching rule wins, so
    /// "CUSTO DA RECEITA" is a cost even though it mentions revenue.
    pub fn from_description(description: &str) -> Self {
        let normalized = normalize_description(description);

        CLASSIFICATION_RULES
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| normalized.contains(k)))
            .map(|(category, _)| *category)
            .unwrap_or(Category::Outros)
    }
}

pub fn categorize(description: &str) -> Category {
    Category::from_description(description)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Statement {
    #[schemars(description = "Income statement (DRE)")]
    IncomeStatement,

    #[schemars(description = "Balance sheet (Balanço Patrimonial)")]
    BalanceSheet,
}

impl Statement {
    pub fn label(&self) -> &'static str {
        match self {
            Statement::IncomeStatement => "DRE",
            Statement::BalanceSheet => "Balanço",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct LineItem {
    #[schemars(description = "Account description exactly as it appears in the statement, trimmed")]
    pub description: String,

    #[schemars(description = "Reported amount. Null when the source cell was blank.")]
    pub value: Option<f64>,

    pub category: Category,

    #[schemars(description = "Reporting period such as '2024', '2024-03' or '03/2024'")]
    #[serde(default)]
    pub period: Option<String>,
}

impl LineItem {
    /// Builds an item and classifies it from its description.
    pub fn new(description: impl Into<String>, value: Option<f64>, period: Option<String>) -> Self {
        let description = description.into().trim().to_string();
        let category = Category::from_description(&description);
        Self {
            description,
            value,
            category,
            period,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MetricUnit {
    Percent,
    Ratio,
    Currency,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct MetricResult {
    pub name: String,

    /// `None` when the metric could not be computed
    pub value: Option<f64>,

    pub unit: MetricUnit,

    pub formula: String,

    pub explanation: String,

    /// Display label such as "Prejuízo do Exercício" or a trend tendency
    #[serde(default)]
    pub label: Option<String>,

    /// Set only when an anomaly was detected
    #[serde(default)]
    pub flagged: bool,

    /// Inputs that were absent, ambiguous or null
    #[serde(default)]
    pub missing: Vec<String>,

    #[serde(default)]
    pub details: BTreeMap<String, f64>,
}

impl MetricResult {
    pub fn computed(
        name: impl Into<String>,
        value: f64,
        unit: MetricUnit,
        formula: impl Into<String>,
        explanation: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: Some(value),
            unit,
            formula: formula.into(),
            explanation: explanation.into(),
            label: None,
            flagged: false,
            missing: Vec::new(),
            details: BTreeMap::new(),
        }
    }

    pub fn not_computable(
        name: impl Into<String>,
        unit: MetricUnit,
        formula: impl Into<String>,
        missing: Vec<String>,
    ) -> Self {
        let name = name.into();
        let explanation = format!(
            "{} is not computable: missing or ambiguous input(s): {}.",
            name,
            missing.join(", ")
        );
        Self {
            name,
            value: None,
            unit,
            formula: formula.into(),
            explanation,
            label: None,
            flagged: false,
            missing,
            details: BTreeMap::new(),
        }
    }

    pub fn unavailable(
        name: impl Into<String>,
        unit: MetricUnit,
        formula: impl Into<String>,
        explanation: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: None,
            unit,
            formula: formula.into(),
            explanation: explanation.into(),
            label: None,
            flagged: false,
            missing: Vec::new(),
            details: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: f64) -> Self {
        self.details.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn flagged(mut self, flagged: bool) -> Self {
        self.flagged = flagged;
        self
    }

    pub fn is_computable(&self) -> bool {
        self.value.is_some()
    }

    /// Short rendering for a dashboard tile.
    pub fn display_value(&self) -> String {
        match self.value {
            None => "n/d".to_string(),
            Some(v) => match self.unit {
                MetricUnit::Percent => format!("{:.2}%", v),
                MetricUnit::Ratio => format!("{:.2}x", v),
                MetricUnit::Currency => format_brl(v),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categorize_examples() {
        assert_eq!(categorize("(-) Despesas com Pessoal"), Category::Despesa);
        assert_eq!(categorize("RECEITA LÍQUIDA"), Category::Receita);
        assert_eq!(categorize("LUCRO BRUTO"), Category::Resultado);
        assert_eq!(categorize("Caixa e Equivalentes"), Category::Outros);
    }

    #[test]
    fn test_categorize_priority_with_multiple_keywords() {
        assert_eq!(categorize("CUSTO DA RECEITA"), Category::Custo);
        assert_eq!(categorize("CUSTO DO LUCRO X"), Category::Custo);
        assert_eq!(categorize("RECEITA DE DESPESAS REEMBOLSADAS"), Category::Receita);
        assert_eq!(categorize("DESPESAS SOBRE O LUCRO"), Category::Despesa);
        assert_eq!(categorize("(- ) Deduções da Receita"), Category::Receita);
        assert_eq!(categorize("(- ) Depreciação"), Category::Despesa);
        assert_eq!(categorize("IMPOSTOS SOBRE RESULTADO"), Category::Despesa);
    }

    #[test]
    fn test_categorize_is_case_and_accent_insensitive() {
        assert_eq!(categorize("receita líquida"), Category::Receita);
        assert_eq!(categorize("Prejuízo do Exercício"), Category::Resultado);
        assert_eq!(categorize("prejuizo do exercicio"), Category::Resultado);
        assert_eq!(categorize("taxas bancárias"), Category::Despesa);
        assert_eq!(categorize(""), Category::Outros);
    }

    #[test]
    fn test_line_item_new_trims_and_classifies() {
        let item = LineItem::new("  Lucro Bruto  ", Some(10.0), Some("2024".to_string()));
        assert_eq!(item.description, "Lucro Bruto");
        assert_eq!(item.category, Category::Resultado);
    }

    #[test]
    fn test_display_value() {
        let pct = MetricResult::computed("Margem", 42.0, MetricUnit::Percent, "f", "e");
        assert_eq!(pct.display_value(), "42.00%");

        let ratio = MetricResult::computed("Liquidez", 1.5, MetricUnit::Ratio, "f", "e");
        assert_eq!(ratio.display_value(), "1.50x");

        let money = MetricResult::computed("EBITDA", 1234.56, MetricUnit::Currency, "f", "e");
        assert_eq!(money.display_value(), "R$ 1.234,56");

        let missing =
            MetricResult::not_computable("EBITDA", MetricUnit::Currency, "f", vec!["X".into()]);
        assert_eq!(missing.display_value(), "n/d");
        assert!(missing.explanation.contains("X"));
    }

    #[test]
    fn test_metric_result_serialization() {
        let result = MetricResult::computed("ROE", 12.5, MetricUnit::Percent, "a / b", "ok")
            .with_label("Lucro Líquido")
            .with_detail("denominator", 100.0);

        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"unit\":\"percent\""));

        let back: MetricResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
    }
}
