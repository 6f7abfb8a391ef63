use crate::config::EngineConfig;
use crate::error::Result;
use crate::ledger::{sum_values, CompanyLedger, Lookup, Matcher};
use crate::schema::{Category, LineItem, MetricResult, MetricUnit, Statement};
use crate::trend::{assess_anomaly, linear_regression};
use crate::utils::{format_brl, next_period_label};
use log::{debug, info};

pub const NET_PROFIT_LABEL: &str = "Lucro Líquido";
pub const NET_LOSS_LABEL: &str = "Prejuízo do Exercício";

/// Display label for the bottom line. Zero counts as profit.
pub fn net_result_label(value: f64) -> &'static str {
    if value >= 0.0 {
        NET_PROFIT_LABEL
    } else {
        NET_LOSS_LABEL
    }
}

/// Statement accounts the ratios are built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Account {
    ReceitaLiquida,
    LucroBruto,
    ResultadoOperacional,
    DespesasOperacionais,
    DepreciacaoAmortizacao,
    /// Net income or loss, whichever the statement reports
    ResultadoFinal,
    AtivoCirculante,
    PassivoCirculante,
    PatrimonioLiquido,
}

impl Account {
    pub fn label(&self) -> &'static str {
        match self {
            Account::ReceitaLiquida => "Receita Líquida",
            Account::LucroBruto => "Lucro Bruto",
            Account::ResultadoOperacional => "Resultado Operacional",
            Account::DespesasOperacionais => "Despesas Operacionais",
            Account::DepreciacaoAmortizacao => "Depreciação e Amortização",
            Account::ResultadoFinal => "Lucro Líquido / Prejuízo",
            Account::AtivoCirculante => "Ativo Circulante",
            Account::PassivoCirculante => "Passivo Circulante",
            Account::PatrimonioLiquido => "Patrimônio Líquido",
        }
    }

    pub fn statement(&self) -> Statement {
        match self {
            Account::AtivoCirculante | Account::PassivoCirculante | Account::PatrimonioLiquido => {
                Statement::BalanceSheet
            }
            _ => Statement::IncomeStatement,
        }
    }

    pub fn matcher(&self) -> Matcher {
        match self {
            Account::ReceitaLiquida => Matcher::prefix("RECEITA LÍQUIDA"),
            Account::LucroBruto => Matcher::any_of(vec![
                Matcher::prefix("LUCRO BRUTO"),
                Matcher::prefix("RESULTADO BRUTO"),
            ]),
            Account::ResultadoOperacional => Matcher::contains("RESULTADO OPERACIONAL"),
            Account::DespesasOperacionais => Matcher::contains("DESPESAS OPERACIONAIS"),
            Account::DepreciacaoAmortizacao => Matcher::contains("DEPRECIAÇÃO"),
            Account::ResultadoFinal => Matcher::any_of(vec![
                Matcher::contains("LUCRO LÍQUIDO"),
                Matcher::contains("PREJUÍZO"),
            ]),
            Account::AtivoCirculante => Matcher::prefix("ATIVO CIRCULANTE"),
            Account::PassivoCirculante => Matcher::prefix("PASSIVO CIRCULANTE"),
            Account::PatrimonioLiquido => Matcher::prefix("PATRIMÔNIO LÍQUIDO"),
        }
    }

    pub fn lookup<'a>(&self, ledger: &'a CompanyLedger) -> Lookup<'a> {
        ledger.find_unique(self.statement(), &self.matcher())
    }
}

/// Equity sub-accounts summed when the ledger has no single equity total.
const EQUITY_COMPONENTS: &[(&str, &str)] = &[
    ("Capital Social", "CAPITAL SOCIAL"),
    ("Reservas de Capital", "RESERVAS DE CAPITAL"),
    ("Ajustes de Avaliação Patrimonial", "AJUSTES DE AVALIAÇÃO PATRIMONIAL"),
    ("Reservas de Lucros", "RESERVAS DE LUCRO"),
    ("Lucros ou Prejuízos Acumulados", "ACUMULADOS"),
];

/// Resolves all `accounts` or reports every one that failed.
fn resolve(
    ledger: &CompanyLedger,
    accounts: &[Account],
) -> std::result::Result<Vec<f64>, Vec<String>> {
    let mut values = Vec::with_capacity(accounts.len());
    let mut missing = Vec::new();

    for account in accounts {
        let lookup = account.lookup(ledger);
        match lookup.value() {
            Some(v) => values.push(v),
            None => missing.extend(lookup.describe_failure(account.label())),
        }
    }

    if missing.is_empty() {
        Ok(values)
    } else {
        debug!("Unresolved accounts for '{}': {:?}", ledger.company, missing);
        Err(missing)
    }
}

fn percent_of(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator * 100.0
    }
}

/// Computes named ratios over a company ledger. Every operation is a pure
/// function of the rows it reads; missing inputs yield a result with no value.
#[derive(Debug, Clone, Default)]
pub struct MetricsEngine {
    config: EngineConfig,
}

impl MetricsEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn gross_margin(&self, ledger: &CompanyLedger) -> MetricResult {
        const NAME: &str = "Margem Bruta";
        const FORMULA: &str = "Lucro Bruto / Receita Líquida × 100";

        let values = match resolve(ledger, &[Account::ReceitaLiquida, Account::LucroBruto]) {
            Ok(v) => v,
            Err(missing) => {
                return MetricResult::not_computable(NAME, MetricUnit::Percent, FORMULA, missing)
            }
        };
        let (revenue, gross_profit) = (values[0], values[1]);

        let margin = percent_of(gross_profit, revenue);
        let explanation = if revenue == 0.0 {
            "Receita Líquida is zero, so the gross margin is reported as 0.00%.".to_string()
        } else {
            format!(
                "Gross margin is {:.2}%: Lucro Bruto of {} over Receita Líquida of {}.",
                margin,
                format_brl(gross_profit),
                format_brl(revenue)
            )
        };

        MetricResult::computed(NAME, margin, MetricUnit::Percent, FORMULA, explanation)
            .with_detail("receita_liquida", revenue)
            .with_detail("lucro_bruto", gross_profit)
    }

    pub fn net_margin(&self, ledger: &CompanyLedger) -> MetricResult {
        const NAME: &str = "Margem Líquida";
        const FORMULA: &str = "Resultado do Exercício / Receita Líquida × 100";

        let values = match resolve(ledger, &[Account::ReceitaLiquida, Account::ResultadoFinal]) {
            Ok(v) => v,
            Err(missing) => {
                return MetricResult::not_computable(NAME, MetricUnit::Percent, FORMULA, missing)
            }
        };
        let (revenue, net_result) = (values[0], values[1]);
        let label = net_result_label(net_result);

        let margin = percent_of(net_result, revenue);
        let explanation = if revenue == 0.0 {
            format!(
                "Receita Líquida is zero, so the net margin is reported as 0.00% ({} of {}).",
                label,
                format_brl(net_result)
            )
        } else {
            format!(
                "Net margin is {:.2}%: {} of {} over Receita Líquida of {}.",
                margin,
                label,
                format_brl(net_result),
                format_brl(revenue)
            )
        };

        MetricResult::computed(NAME, margin, MetricUnit::Percent, FORMULA, explanation)
            .with_label(label)
            .with_detail("receita_liquida", revenue)
            .with_detail("resultado", net_result)
    }

    pub fn current_liquidity(&self, ledger: &CompanyLedger) -> MetricResult {
        const NAME: &str = "Liquidez Corrente";
        const FORMULA: &str = "Ativo Circulante / Passivo Circulante";

        let values = match resolve(
            ledger,
            &[Account::AtivoCirculante, Account::PassivoCirculante],
        ) {
            Ok(v) => v,
            Err(missing) => {
                return MetricResult::not_computable(NAME, MetricUnit::Ratio, FORMULA, missing)
            }
        };
        let (current_assets, current_liabilities) = (values[0], values[1]);

        let (ratio, explanation) = if current_liabilities == 0.0 {
            (
                0.0,
                "Passivo Circulante is zero, so the current liquidity ratio is reported as 0."
                    .to_string(),
            )
        } else {
            let ratio = current_assets / current_liabilities;
            (
                ratio,
                format!(
                    "Current liquidity is {:.2}x: Ativo Circulante of {} over Passivo Circulante of {}.",
                    ratio,
                    format_brl(current_assets),
                    format_brl(current_liabilities)
                ),
            )
        };

        MetricResult::computed(NAME, ratio, MetricUnit::Ratio, FORMULA, explanation)
            .with_detail("ativo_circulante", current_assets)
            .with_detail("passivo_circulante", current_liabilities)
    }

    pub fn ebitda(&self, ledger: &CompanyLedger) -> MetricResult {
        const NAME: &str = "EBITDA";
        const FORMULA: &str = "(Lucro Bruto + Despesas Operacionais) − Depreciação e Amortização";

        let values = match resolve(
            ledger,
            &[
                Account::LucroBruto,
                Account::DespesasOperacionais,
                Account::DepreciacaoAmortizacao,
            ],
        ) {
            Ok(v) => v,
            Err(missing) => {
                return MetricResult::not_computable(NAME, MetricUnit::Currency, FORMULA, missing)
            }
        };
        let (gross_profit, operating_expenses, depreciation) = (values[0], values[1], values[2]);

        let ebitda = (gross_profit + operating_expenses) - depreciation;
        let explanation = format!(
            "EBITDA is {}: Lucro Bruto of {} plus Despesas Operacionais of {}, minus Depreciação e Amortização of {}.",
            format_brl(ebitda),
            format_brl(gross_profit),
            format_brl(operating_expenses),
            format_brl(depreciation)
        );

        MetricResult::computed(NAME, ebitda, MetricUnit::Currency, FORMULA, explanation)
            .with_detail("lucro_bruto", gross_profit)
            .with_detail("despesas_operacionais", operating_expenses)
            .with_detail("depreciacao_amortizacao", depreciation)
    }

    pub fn profitability(&self, ledger: &CompanyLedger) -> MetricResult {
        const NAME: &str = "Análise de Rentabilidade";
        const FORMULA: &str = "Lucro Bruto, Resultado Operacional and Resultado do Exercício / Receita Líquida × 100";

        let values = match resolve(
            ledger,
            &[
                Account::ReceitaLiquida,
                Account::LucroBruto,
                Account::ResultadoOperacional,
                Account::ResultadoFinal,
            ],
        ) {
            Ok(v) => v,
            Err(missing) => {
                return MetricResult::not_computable(NAME, MetricUnit::Percent, FORMULA, missing)
            }
        };
        let (revenue, gross_profit, operating_result, net_result) =
            (values[0], values[1], values[2], values[3]);

        let gross = percent_of(gross_profit, revenue);
        let operating = percent_of(operating_result, revenue);
        let net = percent_of(net_result, revenue);
        let label = net_result_label(net_result);

        let mut explanation = format!(
            "Gross margin {:.2}%, operating margin {:.2}%, net margin {:.2}% ({} of {}).",
            gross,
            operating,
            net,
            label,
            format_brl(net_result)
        );
        if revenue == 0.0 {
            explanation
                .push_str(" Receita Líquida is zero, so all margins are reported as 0.00%.");
        }

        MetricResult::computed(NAME, net, MetricUnit::Percent, FORMULA, explanation)
            .with_label(label)
            .with_detail("margem_bruta", gross)
            .with_detail("margem_operacional", operating)
            .with_detail("margem_liquida", net)
    }

    pub fn roe(&self, ledger: &CompanyLedger) -> MetricResult {
        const NAME: &str = "ROE";
        const FORMULA: &str = "Resultado do Exercício / Patrimônio Líquido × 100";

        let net_lookup = Account::ResultadoFinal.lookup(ledger);
        let net_result = match net_lookup.value() {
            Some(v) => v,
            None => {
                let missing = net_lookup
                    .describe_failure(Account::ResultadoFinal.label())
                    .into_iter()
                    .collect();
                return MetricResult::not_computable(NAME, MetricUnit::Percent, FORMULA, missing);
            }
        };

        let equity_lookup = Account::PatrimonioLiquido.lookup(ledger);
        let (equity, source) = match equity_lookup.value() {
            Some(v) => (v, "Patrimônio Líquido".to_string()),
            None => {
                let mut total = 0.0;
                let mut summed = Vec::new();
                for (label, needle) in EQUITY_COMPONENTS {
                    if let Some(v) = ledger
                        .find_unique(Statement::BalanceSheet, &Matcher::contains(needle))
                        .value()
                    {
                        total += v;
                        summed.push(*label);
                    }
                }

                if summed.is_empty() {
                    let mut missing: Vec<String> = equity_lookup
                        .describe_failure(Account::PatrimonioLiquido.label())
                        .into_iter()
                        .collect();
                    missing.push("equity sub-accounts (none found)".to_string());
                    return MetricResult::not_computable(
                        NAME,
                        MetricUnit::Percent,
                        FORMULA,
                        missing,
                    );
                }

                debug!("Equity rebuilt from sub-accounts: {:?}", summed);
                (total, format!("sum of {}", summed.join(" + ")))
            }
        };

        let label = net_result_label(net_result);
        let roe = percent_of(net_result, equity);
        let explanation = if equity == 0.0 {
            format!(
                "Equity ({}) is zero, so ROE is reported as 0.00%.",
                source
            )
        } else {
            format!(
                "ROE is {:.2}%: {} of {} over equity of {} ({}).",
                roe,
                label,
                format_brl(net_result),
                format_brl(equity),
                source
            )
        };

        MetricResult::computed(NAME, roe, MetricUnit::Percent, FORMULA, explanation)
            .with_label(label)
            .with_detail("resultado", net_result)
            .with_detail("patrimonio_liquido", equity)
    }

    /// Fits revenue per period and projects one period ahead. A period's
    /// revenue is its single Receita Líquida row; periods without one fall
    /// back to the sum of their Receita rows.
    pub fn revenue_trend(&self, ledger: &CompanyLedger) -> MetricResult {
        const NAME: &str = "Projeção de Receita";
        const FORMULA: &str = "OLS of revenue (Receita Líquida) vs. period index; projection at index n";

        let net_revenue = Account::ReceitaLiquida.matcher();
        let mut series: Vec<(String, f64)> = Vec::new();
        let mut missing = Vec::new();

        for (period, rows) in ledger.rows_by_period(Statement::IncomeStatement, |item| {
            item.category == Category::Receita
        }) {
            let net: Vec<&LineItem> = rows
                .iter()
                .copied()
                .filter(|item| net_revenue.matches(&item.description))
                .collect();

            let value = match net.as_slice() {
                [] => sum_values(&rows),
                [item] => item.value,
                many => {
                    missing.push(format!(
                        "Receita Líquida in {} ({} matching rows)",
                        period,
                        many.len()
                    ));
                    continue;
                }
            };

            match value {
                Some(v) => series.push((period, v)),
                None => missing.push(format!("revenue in {} (null value)", period)),
            }
        }

        if !missing.is_empty() {
            return MetricResult::not_computable(NAME, MetricUnit::Currency, FORMULA, missing);
        }

        let required = self.config.min_trend_periods;
        if series.len() < required {
            return MetricResult::unavailable(
                NAME,
                MetricUnit::Currency,
                FORMULA,
                format!(
                    "Insufficient history: {} period(s) of revenue available, at least {} required.",
                    series.len(),
                    required
                ),
            );
        }

        let values: Vec<f64> = series.iter().map(|(_, v)| *v).collect();
        let Some(fit) = linear_regression(&values) else {
            return MetricResult::unavailable(
                NAME,
                MetricUnit::Currency,
                FORMULA,
                "Insufficient history.",
            );
        };

        let projection = fit.predict(values.len() as f64);
        let tendency = fit.tendency();
        let first = &series[0].0;
        let last = &series[series.len() - 1].0;
        let next = next_period_label(last);

        info!(
            "Revenue trend for '{}': slope {:.2}, projection {:.2} for {}",
            ledger.company, fit.slope, projection, next
        );

        let explanation = format!(
            "Revenue shows {} of {} per period over {} periods ({} to {}). Projected revenue for {}: {}.",
            tendency.label(),
            format_brl(fit.slope),
            series.len(),
            first,
            last,
            next,
            format_brl(projection)
        );

        MetricResult::computed(NAME, projection, MetricUnit::Currency, FORMULA, explanation)
            .with_label(tendency.label())
            .with_detail("slope", fit.slope)
            .with_detail("intercept", fit.intercept)
            .with_detail("periods", values.len() as f64)
    }

    /// Compares the latest period of one expense with its history.
    pub fn expense_anomaly(&self, ledger: &CompanyLedger, expense: &str) -> MetricResult {
        const FORMULA: &str = "(|latest| − mean(|prior|)) / mean(|prior|) × 100";
        let expense = expense.trim();
        let name = format!("Anomalia de Despesa: {}", expense);

        if expense.is_empty() {
            return MetricResult::not_computable(
                name,
                MetricUnit::Percent,
                FORMULA,
                vec!["expense description (empty)".to_string()],
            );
        }

        let matcher = Matcher::contains(expense);
        let mut series = ledger.series_by_period(Statement::IncomeStatement, |item| {
            matcher.matches(&item.description)
        });
        series.reverse();

        let null_periods: Vec<String> = series
            .iter()
            .filter(|p| p.value.is_none())
            .map(|p| format!("{} in {} (null value)", expense, p.period))
            .collect();
        if !null_periods.is_empty() {
            return MetricResult::not_computable(name, MetricUnit::Percent, FORMULA, null_periods);
        }

        let required = self.config.min_anomaly_periods;
        if series.len() < required {
            return MetricResult::unavailable(
                name,
                MetricUnit::Percent,
                FORMULA,
                format!(
                    "Insufficient history for '{}': {} period(s) available, at least {} required.",
                    expense,
                    series.len(),
                    required
                ),
            );
        }

        let values: Vec<f64> = series.iter().filter_map(|p| p.value).collect();
        let threshold = self.config.anomaly_threshold_pct;
        let Some(assessment) = assess_anomaly(&values, threshold) else {
            return MetricResult::unavailable(
                name,
                MetricUnit::Percent,
                FORMULA,
                "Insufficient history.",
            );
        };

        let latest_period = &series[0].period;
        let Some(deviation) = assessment.deviation_pct else {
            return MetricResult::unavailable(
                name,
                MetricUnit::Percent,
                FORMULA,
                format!(
                    "Historical average of '{}' before {} is zero; deviation is undefined.",
                    expense,
                    latest_period
                ),
            )
            .with_detail("latest", assessment.latest);
        };

        let direction = if deviation >= 0.0 { "above" } else { "below" };
        let verdict = if assessment.flagged {
            format!("Anomaly flagged: deviation exceeds the {:.2}% threshold.", threshold)
        } else {
            format!("Within the {:.2}% threshold.", threshold)
        };
        let explanation = format!(
            "{} in {} was {}, {:.2}% {} historical average of {} over {} prior period(s). {}",
            expense,
            latest_period,
            format_brl(assessment.latest),
            deviation.abs(),
            direction,
            format_brl(assessment.historical_mean),
            values.len() - 1,
            verdict
        );

        if assessment.flagged {
            info!("Expense anomaly in '{}': {} {:.2}%", ledger.company, expense, deviation);
        }

        MetricResult::computed(name, deviation, MetricUnit::Percent, FORMULA, explanation)
            .with_label(if assessment.flagged { "anomalia" } else { "normal" })
            .flagged(assessment.flagged)
            .with_detail("latest", assessment.latest)
            .with_detail("historical_mean", assessment.historical_mean)
            .with_detail("threshold_pct", threshold)
    }
}
