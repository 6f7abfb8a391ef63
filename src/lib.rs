//! # Financial Metrics Engine
//!
//! Deterministic financial ratios over a company's income statement (DRE) and
//! balance sheet (Balanço) line items, with explanations suitable for a
//! dashboard tile or an agent tool response.
//!
//! ## Core Concepts
//!
//! - **Line items**: `(description, value, category, period)` rows, classified by
//!   description keywords (Custo > Receita > Despesa > Resultado > Outros)
//! - **Company ledger**: the income-statement and balance-sheet rows of one company
//! - **Metric results**: a value (or `None` when inputs are missing), the formula,
//!   and a human-readable explanation. Missing inputs never raise.
//! - **Time series**: revenue trend projection (least squares) and expense
//!   anomaly detection across periods
//!
//! ## Example
//!
//! ```rust,ignore
//! use financial_metrics_engine::*;
//!
//! let ledger = CompanyLedger::new(
//!     "ACME Ltda",
//!     vec![
//!         LineItem::new("RECEITA LÍQUIDA", Some(1_000_000.0), Some("2024".into())),
//!         LineItem::new("LUCRO BRUTO", Some(400_000.0), Some("2024".into())),
//!     ],
//!     vec![],
//! );
//!
//! let engine = MetricsEngine::default();
//! let margin = engine.gross_margin(&ledger);
//! assert_eq!(margin.display_value(), "40.00%");
//! ```

pub mod chart_of_accounts;
pub mod config;
pub mod dashboard;
pub mod engine;
pub mod error;
pub mod ingestion;
pub mod ledger;
pub mod router;
pub mod schema;
pub mod store;
pub mod tools;
pub mod trend;
pub mod utils;

pub use chart_of_accounts::{AccountEntry, ChartOfAccounts};
pub use config::EngineConfig;
pub use dashboard::{dashboard_kpis, render_kpis_markdown, DASHBOARD_METRICS};
pub use engine::{net_result_label, Account, MetricsEngine, NET_LOSS_LABEL, NET_PROFIT_LABEL};
pub use error::{MetricsError, Result};
pub use ingestion::*;
pub use ledger::{CompanyLedger, Lookup, Matcher, PeriodValue};
pub use router::{KnowledgeBase, KnowledgeEntry, MetricRouter, RouteMatch};
pub use schema::*;
pub use store::{CompanyId, LedgerStore, MemoryLedgerStore};
pub use tools::{MetricKind, MetricRequest};
pub use trend::{assess_anomaly, linear_regression, AnomalyAssessment, LinearFit, Tendency};
pub use utils::*;

use log::{debug, info};
use std::collections::HashSet;

/// Answers free-text questions by routing them to a metric and running it.
pub struct FinancialAnalyzer {
    engine: MetricsEngine,
    router: MetricRouter,
}

impl FinancialAnalyzer {
    pub fn new(engine: MetricsEngine, router: MetricRouter) -> Self {
        Self { engine, router }
    }

    pub fn with_config(config: EngineConfig) -> Result<Self> {
        Ok(Self::new(MetricsEngine::new(config)?, MetricRouter::default()))
    }

    pub fn engine(&self) -> &MetricsEngine {
        &self.engine
    }

    pub fn router_mut(&mut self) -> &mut MetricRouter {
        &mut self.router
    }

    /// Returns `Ok(None)` when the question does not map to any metric.
    pub fn answer(
        &mut self,
        ledger: &CompanyLedger,
        question: &str,
    ) -> Result<Option<MetricResult>> {
        let Some(route) = self.router.route(question) else {
            info!("No metric matches question {:?}", question);
            return Ok(None);
        };
        debug!("Question routed to {:?} (score {:.3})", route.metric, route.score);

        let mut request = MetricRequest::new(route.metric);
        if route.metric == MetricKind::ExpenseAnomaly {
            let expense = expense_mentioned_in(ledger, question).ok_or_else(|| {
                MetricsError::InvalidRequest(format!(
                    "No expense line of '{}' matches the question",
                    ledger.company
                ))
            })?;
            request.expense = Some(expense);
        }

        self.engine.run(ledger, &request).map(Some)
    }

    /// Runs one tool request against a company held in `store`.
    pub fn run_for_company<S: LedgerStore>(
        &self,
        store: &S,
        company_id: CompanyId,
        request: &MetricRequest,
    ) -> Result<MetricResult> {
        let ledger = store.ledger(company_id)?;
        self.engine.run(&ledger, request)
    }
}

impl Default for FinancialAnalyzer {
    fn default() -> Self {
        Self::new(MetricsEngine::default(), MetricRouter::default())
    }
}

fn words(text: &str) -> HashSet<String> {
    normalize_description(text)
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 4)
        .map(str::to_string)
        .collect()
}

/// Picks the expense description sharing the most words with the question.
fn expense_mentioned_in(ledger: &CompanyLedger, question: &str) -> Option<String> {
    let asked = words(question);
    let mut best: Option<(usize, &str)> = None;

    for item in ledger.items(Statement::IncomeStatement) {
        if item.category != Category::Despesa {
            continue;
        }
        let overlap = words(&item.description)
            .iter()
            .filter(|w| w.as_str() != "DESPESA" && w.as_str() != "DESPESAS")
            .filter(|w| asked.contains(*w))
            .count();
        if overlap > 0 && best.map_or(true, |(score, _)| overlap > score) {
            best = Some((overlap, item.description.as_str()));
        }
    }

    best.map(|(_, description)| description.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(description: &str, value: f64, period: &str) -> LineItem {
        LineItem::new(description, Some(value), Some(period.to_string()))
    }

    fn ledger() -> CompanyLedger {
        CompanyLedger::new(
            "CICLOMADE",
            vec![
                item("RECEITA LÍQUIDA", 1000.0, "2023"),
                item("LUCRO BRUTO", 350.0, "2023"),
                item("(-) Despesas com Pessoal", -100.0, "2023"),
                item("(-) Despesas com Aluguel", -50.0, "2023"),
                item("RECEITA LÍQUIDA", 1100.0, "2024"),
                item("LUCRO BRUTO", 440.0, "2024"),
                item("(-) Despesas com Pessoal", -160.0, "2024"),
                item("(-) Despesas com Aluguel", -50.0, "2024"),
            ],
            vec![],
        )
    }

    #[test]
    fn test_answer_routes_and_computes() {
        let mut analyzer = FinancialAnalyzer::default();
        let result = analyzer
            .answer(&ledger(), "Qual foi a margem bruta?")
            .unwrap()
            .unwrap();
        assert_eq!(result.name, "Margem Bruta");
        assert!((result.value.unwrap() - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_answer_expense_anomaly_picks_mentioned_expense() {
        let mut analyzer = FinancialAnalyzer::default();
        let result = analyzer
            .answer(&ledger(), "Há alguma anomalia nas despesas com pessoal?")
            .unwrap()
            .unwrap();
        assert!(result.name.contains("Pessoal"));
        assert!(result.flagged);
        assert!(result.explanation.contains("60.00% above historical average"));
    }

    #[test]
    fn test_answer_expense_anomaly_without_match_is_invalid() {
        let mut analyzer = FinancialAnalyzer::default();
        let err = analyzer
            .answer(&ledger(), "Alguma anomalia nas despesas de viagem?")
            .unwrap_err();
        assert!(matches!(err, MetricsError::InvalidRequest(_)));
    }

    #[test]
    fn test_answer_unrelated_question() {
        let mut analyzer = FinancialAnalyzer::default();
        assert!(analyzer.answer(&ledger(), "bom dia").unwrap().is_none());
    }

    #[test]
    fn test_run_for_company() {
        let mut store = MemoryLedgerStore::new();
        let id = store.insert_company("CICLOMADE").unwrap();
        store
            .add_items(id, Statement::IncomeStatement, ledger().income_statement)
            .unwrap();

        let analyzer = FinancialAnalyzer::default();
        let mut request = MetricRequest::new(MetricKind::GrossMargin);
        request.period = Some("2023".to_string());
        let result = analyzer.run_for_company(&store, id, &request).unwrap();
        assert!((result.value.unwrap() - 35.0).abs() < 1e-9);

        assert!(matches!(
            analyzer.run_for_company(&store, id + 1, &request),
            Err(MetricsError::UnknownCompany(_))
        ));
    }
}
