use crate::engine::MetricsEngine;
use crate::error::{MetricsError, Result};
use crate::ledger::CompanyLedger;
use crate::schema::MetricResult;
use log::info;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    #[schemars(description = "Lucro Bruto / Receita Líquida, in percent")]
    GrossMargin,

    #[schemars(description = "Lucro Líquido (or Prejuízo) / Receita Líquida, in percent")]
    NetMargin,

    #[schemars(description = "Ativo Circulante / Passivo Circulante")]
    CurrentLiquidity,

    #[schemars(description = "(Lucro Bruto + Despesas Operacionais) minus Depreciação e Amortização")]
    Ebitda,

    #[schemars(description = "Gross, operating and net margins together")]
    Profitability,

    #[schemars(description = "Return on equity: net result / Patrimônio Líquido, in percent")]
    Roe,

    #[schemars(description = "Linear trend of total revenue across periods, projected one period ahead")]
    RevenueTrend,

    #[schemars(description = "Latest period of one expense compared with its historical average. Requires 'expense'.")]
    ExpenseAnomaly,
}

impl MetricKind {
    pub const ALL: [MetricKind; 8] = [
        MetricKind::GrossMargin,
        MetricKind::NetMargin,
        MetricKind::CurrentLiquidity,
        MetricKind::Ebitda,
        MetricKind::Profitability,
        MetricKind::Roe,
        MetricKind::RevenueTrend,
        MetricKind::ExpenseAnomaly,
    ];

    /// Metrics that read a whole time series instead of one period.
    pub fn spans_periods(&self) -> bool {
        matches!(self, MetricKind::RevenueTrend | MetricKind::ExpenseAnomaly)
    }
}

/// Tool call arguments, as produced by an agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct MetricRequest {
    #[schemars(description = "Which metric to compute")]
    pub metric: MetricKind,

    #[schemars(
        description = "Period to evaluate single-period metrics on (e.g. '2024'). Defaults to the most recent period in the ledger. Ignored by revenue_trend and expense_anomaly."
    )]
    #[serde(default)]
    pub period: Option<String>,

    #[schemars(
        description = "Expense description, or part of it, to check for anomalies (e.g. 'Despesas com Pessoal'). Required for expense_anomaly."
    )]
    #[serde(default)]
    pub expense: Option<String>,
}

impl MetricRequest {
    pub fn new(metric: MetricKind) -> Self {
        Self {
            metric,
            period: None,
            expense: None,
        }
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(MetricRequest)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

impl MetricsEngine {
    /// Dispatches a tool request. Single-period metrics run on the requested
    /// period, or the latest one when none is given.
    pub fn run(&self, ledger: &CompanyLedger, request: &MetricRequest) -> Result<MetricResult> {
        info!("Running {:?} for '{}'", request.metric, ledger.company);

        let scoped = || match request.period.clone().or_else(|| ledger.latest_period()) {
            Some(period) => ledger.for_period(&period),
            None => ledger.clone(),
        };

        let result = match request.metric {
            MetricKind::GrossMargin => self.gross_margin(&scoped()),
            MetricKind::NetMargin => self.net_margin(&scoped()),
            MetricKind::CurrentLiquidity => self.current_liquidity(&scoped()),
            MetricKind::Ebitda => self.ebitda(&scoped()),
            MetricKind::Profitability => self.profitability(&scoped()),
            MetricKind::Roe => self.roe(&scoped()),
            MetricKind::RevenueTrend => self.revenue_trend(ledger),
            MetricKind::ExpenseAnomaly => {
                let expense = request
                    .expense
                    .as_deref()
                    .map(str::trim)
                    .filter(|e| !e.is_empty())
                    .ok_or_else(|| {
                        MetricsError::InvalidRequest(
                            "expense_anomaly requires a non-empty 'expense'".to_string(),
                        )
                    })?;
                self.expense_anomaly(ledger, expense)
            }
        };

        Ok(result)
    }

    /// JSON in, JSON out, for handing results to an agent as a tool response.
    pub fn run_json(
        &self,
        ledger: &CompanyLedger,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value> {
        let request: MetricRequest = serde_json::from_value(arguments)?;
        let result = self.run(ledger, &request)?;
        Ok(serde_json::to_value(result)?)
    }
}
