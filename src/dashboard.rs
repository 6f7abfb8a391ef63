use crate::engine::MetricsEngine;
use crate::error::Result;
use crate::ledger::CompanyLedger;
use crate::schema::MetricResult;
use crate::tools::{MetricKind, MetricRequest};
use log::info;

/// The metrics shown on the headline KPI panel, in display order.
pub const DASHBOARD_METRICS: [MetricKind; 3] = [
    MetricKind::GrossMargin,
    MetricKind::NetMargin,
    MetricKind::CurrentLiquidity,
];

/// Computes the headline KPIs for one period (latest when `period` is `None`).
pub fn dashboard_kpis(
    engine: &MetricsEngine,
    ledger: &CompanyLedger,
    period: Option<&str>,
) -> Result<Vec<MetricResult>> {
    info!("Computing dashboard KPIs for '{}'", ledger.company);

    DASHBOARD_METRICS
        .iter()
        .map(|metric| {
            let request = MetricRequest {
                metric: *metric,
                period: period.map(str::to_string),
                expense: None,
            };
            engine.run(ledger, &request)
        })
        .collect()
}

pub fn render_kpis_markdown(company: &str, kpis: &[MetricResult]) -> String {
    let mut output = format!("## KPIs Essenciais - {}\n\n", company);
    output.push_str("| Indicador | Valor | Fórmula |\n");
    output.push_str("|---|---|---|\n");
    for kpi in kpis {
        output.push_str(&format!(
            "| {} | {} | {} |\n",
            kpi.name,
            kpi.display_value(),
            kpi.formula
        ));
    }

    let notes: Vec<&MetricResult> = kpis.iter().filter(|k| !k.is_computable()).collect();
    if !notes.is_empty() {
        output.push('\n');
        for kpi in notes {
            output.push_str(&format!("> {}\n", kpi.explanation));
        }
    }

    output
}
