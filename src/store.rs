use crate::error::{MetricsError, Result};
use crate::ledger::CompanyLedger;
use crate::schema::{LineItem, Statement};
use crate::utils::normalize_description;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type CompanyId = u32;

/// Read access to the statements of many companies.
pub trait LedgerStore {
    fn companies(&self) -> Vec<(CompanyId, String)>;

    fn ledger(&self, company_id: CompanyId) -> Result<CompanyLedger>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CompanyRecord {
    name: String,
    income_statement: Vec<LineItem>,
    balance_sheet: Vec<LineItem>,
}

/// In-memory table of company statements keyed by company id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryLedgerStore {
    companies: BTreeMap<CompanyId, CompanyRecord>,
    next_id: CompanyId,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a company. Names are unique, compared case- and accent-insensitively.
    pub fn insert_company(&mut self, name: impl Into<String>) -> Result<CompanyId> {
        let name = name.into().trim().to_string();
        let normalized = normalize_description(&name);
        if self
            .companies
            .values()
            .any(|c| normalize_description(&c.name) == normalized)
        {
            return Err(MetricsError::DuplicateCompany(name));
        }

        self.next_id += 1;
        let id = self.next_id;
        info!("Registered company {} as id {}", name, id);
        self.companies.insert(
            id,
            CompanyRecord {
                name,
                ..CompanyRecord::default()
            },
        );
        Ok(id)
    }

    pub fn add_items(
        &mut self,
        company_id: CompanyId,
        statement: Statement,
        items: impl IntoIterator<Item = LineItem>,
    ) -> Result<()> {
        let record = self
            .companies
            .get_mut(&company_id)
            .ok_or(MetricsError::UnknownCompany(company_id))?;

        let target = match statement {
            Statement::IncomeStatement => &mut record.income_statement,
            Statement::BalanceSheet => &mut record.balance_sheet,
        };
        let before = target.len();
        target.extend(items);
        info!(
            "Added {} {} rows for company {}",
            target.len() - before,
            statement.label(),
            company_id
        );
        Ok(())
    }

    pub fn find_company(&self, name: &str) -> Option<CompanyId> {
        let normalized = normalize_description(name);
        self.companies
            .iter()
            .find(|(_, c)| normalize_description(&c.name) == normalized)
            .map(|(id, _)| *id)
    }
}

impl LedgerStore for MemoryLedgerStore {
    fn companies(&self) -> Vec<(CompanyId, String)> {
        self.companies
            .iter()
            .map(|(id, c)| (*id, c.name.clone()))
            .collect()
    }

    fn ledger(&self, company_id: CompanyId) -> Result<CompanyLedger> {
        let record = self
            .companies
            .get(&company_id)
            .ok_or(MetricsError::UnknownCompany(company_id))?;

        Ok(CompanyLedger::new(
            record.name.clone(),
            record.income_statement.clone(),
            record.balance_sheet.clone(),
        ))
    }
}
