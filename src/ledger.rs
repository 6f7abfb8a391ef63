use crate::schema::{Category, LineItem, Statement};
use crate::utils::{compare_periods, normalize_description, period_covers};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How a description lookup selects rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher {
    Prefix(String),
    Contains(String),
    AnyOf(Vec<Matcher>),
}

impl Matcher {
    pub fn prefix(text: &str) -> Self {
        Matcher::Prefix(normalize_description(text))
    }

    pub fn contains(text: &str) -> Self {
        Matcher::Contains(normalize_description(text))
    }

    pub fn any_of(matchers: Vec<Matcher>) -> Self {
        Matcher::AnyOf(matchers)
    }

    /// `normalized` must already be passed through `normalize_description`.
    fn matches_normalized(&self, normalized: &str) -> bool {
        match self {
            Matcher::Prefix(p) => normalized.starts_with(p.as_str()),
            Matcher::Contains(c) => normalized.contains(c.as_str()),
            Matcher::AnyOf(all) => all.iter().any(|m| m.matches_normalized(normalized)),
        }
    }

    pub fn matches(&self, description: &str) -> bool {
        self.matches_normalized(&normalize_description(description))
    }
}

/// Outcome of a single-row lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<'a> {
    Found { item: &'a LineItem, value: f64 },
    Missing,
    Ambiguous(usize),
    NullValue(&'a LineItem),
}

impl<'a> Lookup<'a> {
    pub fn value(&self) -> Option<f64> {
        match self {
            Lookup::Found { value, .. } => Some(*value),
            _ => None,
        }
    }

    pub fn describe_failure(&self, account: &str) -> Option<String> {
        match self {
            Lookup::Found { .. } => None,
            Lookup::Missing => Some(format!("{} (not found)", account)),
            Lookup::Ambiguous(n) => Some(format!("{} ({} matching rows)", account, n)),
            Lookup::NullValue(_) => Some(format!("{} (null value)", account)),
        }
    }
}

/// One aggregated point of a per-period series. `value` is `None` when any
/// contributing row has no value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodValue {
    pub period: String,
    pub value: Option<f64>,
}

/// Sum of `rows`, or `None` if any of them is null.
pub fn sum_values(rows: &[&LineItem]) -> Option<f64> {
    rows.iter().map(|item| item.value).sum()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyLedger {
    pub company: String,
    pub income_statement: Vec<LineItem>,
    pub balance_sheet: Vec<LineItem>,
}

impl CompanyLedger {
    pub fn new(
        company: impl Into<String>,
        income_statement: Vec<LineItem>,
        balance_sheet: Vec<LineItem>,
    ) -> Self {
        Self {
            company: company.into(),
            income_statement,
            balance_sheet,
        }
    }

    pub fn items(&self, statement: Statement) -> &[LineItem] {
        match statement {
            Statement::IncomeStatement => &self.income_statement,
            Statement::BalanceSheet => &self.balance_sheet,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.income_statement.is_empty() && self.balance_sheet.is_empty()
    }

    /// Rows for `period`, plus rows that carry no period at all. A row also
    /// belongs to `period` when one of the two spans the other, so an annual
    /// DRE "2024" pairs with a balance sheet dated "2024-12-31".
    pub fn for_period(&self, period: &str) -> CompanyLedger {
        let keep = |item: &&LineItem| match &item.period {
            Some(p) => period_covers(p, period) || period_covers(period, p),
            None => true,
        };

        CompanyLedger {
            company: self.company.clone(),
            income_statement: self.income_statement.iter().filter(keep).cloned().collect(),
            balance_sheet: self.balance_sheet.iter().filter(keep).cloned().collect(),
        }
    }

    /// Distinct periods across both statements, oldest first.
    pub fn periods(&self) -> Vec<String> {
        let mut periods: Vec<String> = self
            .income_statement
            .iter()
            .chain(self.balance_sheet.iter())
            .filter_map(|item| item.period.as_ref().map(|p| p.trim().to_string()))
            .collect();
        periods.sort_by(|a, b| compare_periods(a, b));
        periods.dedup();
        periods
    }

    pub fn latest_period(&self) -> Option<String> {
        self.periods().pop()
    }

    pub fn items_in_category(&self, category: Category) -> Vec<&LineItem> {
        self.income_statement
            .iter()
            .chain(self.balance_sheet.iter())
            .filter(|item| item.category == category)
            .collect()
    }

    /// Looks up exactly one row. Zero rows is `Missing`, several is `Ambiguous`.
    pub fn find_unique(&self, statement: Statement, matcher: &Matcher) -> Lookup<'_> {
        let matches: Vec<&LineItem> = self
            .items(statement)
            .iter()
            .filter(|item| matcher.matches(&item.description))
            .collect();

        let lookup = match matches.as_slice() {
            [] => Lookup::Missing,
            [item] => match item.value {
                Some(value) => Lookup::Found { item: *item, value },
                None => Lookup::NullValue(*item),
            },
            many => {
                warn!(
                    "Ambiguous lookup {:?} in {} of '{}': {} rows",
                    matcher,
                    statement.label(),
                    self.company,
                    many.len()
                );
                Lookup::Ambiguous(many.len())
            }
        };

        debug!("Lookup {:?} in {}: {:?}", matcher, statement.label(), lookup.value());
        lookup
    }

    /// Matching rows grouped by period, oldest period first. Rows without a
    /// period are skipped.
    pub fn rows_by_period<F>(
        &self,
        statement: Statement,
        mut include: F,
    ) -> Vec<(String, Vec<&LineItem>)>
    where
        F: FnMut(&LineItem) -> bool,
    {
        let mut groups: BTreeMap<String, Vec<&LineItem>> = BTreeMap::new();

        for item in self.items(statement) {
            if !include(item) {
                continue;
            }
            if let Some(period) = &item.period {
                groups.entry(period.trim().to_string()).or_default().push(item);
            }
        }

        let mut grouped: Vec<(String, Vec<&LineItem>)> = groups.into_iter().collect();
        grouped.sort_by(|a, b| compare_periods(&a.0, &b.0));
        grouped
    }

    /// Sums matching rows per period, oldest period first. A period with a
    /// null row keeps its place in the series with no value.
    pub fn series_by_period<F>(&self, statement: Statement, include: F) -> Vec<PeriodValue>
    where
        F: FnMut(&LineItem) -> bool,
    {
        self.rows_by_period(statement, include)
            .into_iter()
            .map(|(period, rows)| PeriodValue {
                value: sum_values(&rows),
                period,
            })
            .collect()
    }
}
