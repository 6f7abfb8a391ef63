use crate::ledger::CompanyLedger;
use crate::schema::{Category, LineItem, Statement};
use crate::utils::{compare_periods, format_brl};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountEntry {
    pub description: String,
    pub statement: Statement,
    pub value: Option<f64>,
    pub period: Option<String>,
}

impl AccountEntry {
    fn from_item(item: &LineItem, statement: Statement) -> Self {
        Self {
            description: item.description.clone(),
            statement,
            value: item.value,
            period: item.period.clone(),
        }
    }
}

/// A company's line items grouped by classification category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartOfAccounts {
    pub company: String,
    pub receita: Vec<AccountEntry>,
    pub custo: Vec<AccountEntry>,
    pub despesa: Vec<AccountEntry>,
    pub resultado: Vec<AccountEntry>,
    pub outros: Vec<AccountEntry>,
}

impl ChartOfAccounts {
    pub fn from_ledger(ledger: &CompanyLedger) -> Self {
        let mut chart = Self {
            company: ledger.company.clone(),
            receita: Vec::new(),
            custo: Vec::new(),
            despesa: Vec::new(),
            resultado: Vec::new(),
            outros: Vec::new(),
        };

        for statement in [Statement::IncomeStatement, Statement::BalanceSheet] {
            for item in ledger.items(statement) {
                let entry = AccountEntry::from_item(item, statement);
                match item.category {
                    Category::Receita => chart.receita.push(entry),
                    Category::Custo => chart.custo.push(entry),
                    Category::Despesa => chart.despesa.push(entry),
                    Category::Resultado => chart.resultado.push(entry),
                    Category::Outros => chart.outros.push(entry),
                }
            }
        }

        for section in chart.sections_mut() {
            section.sort_by(|a, b| {
                let pa = a.period.as_deref().unwrap_or("");
                let pb = b.period.as_deref().unwrap_or("");
                compare_periods(pa, pb).then_with(|| a.description.cmp(&b.description))
            });
        }

        chart
    }

    fn sections(&self) -> [(Category, &Vec<AccountEntry>); 5] {
        [
            (Category::Receita, &self.receita),
            (Category::Custo, &self.custo),
            (Category::Despesa, &self.despesa),
            (Category::Resultado, &self.resultado),
            (Category::Outros, &self.outros),
        ]
    }

    fn sections_mut(&mut self) -> [&mut Vec<AccountEntry>; 5] {
        [
            &mut self.receita,
            &mut self.custo,
            &mut self.despesa,
            &mut self.resultado,
            &mut self.outros,
        ]
    }

    pub fn entries(&self, category: Category) -> &[AccountEntry] {
        match category {
            Category::Receita => &self.receita,
            Category::Custo => &self.custo,
            Category::Despesa => &self.despesa,
            Category::Resultado => &self.resultado,
            Category::Outros => &self.outros,
        }
    }

    pub fn total_accounts(&self) -> usize {
        self.sections().iter().map(|(_, s)| s.len()).sum()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_csv(&self) -> String {
        let mut output = String::new();
        output.push_str("Categoria,Demonstrativo,Descrição,Período,Valor\n");

        for (category, entries) in self.sections() {
            for entry in entries {
                output.push_str(&format!(
                    "{:?},{},\"{}\",{},{}\n",
                    category,
                    entry.statement.label(),
                    entry.description.replace('"', "\"\""),
                    entry.period.as_deref().unwrap_or(""),
                    entry.value.map(|v| format!("{:.2}", v)).unwrap_or_default()
                ));
            }
        }

        output
    }

    pub fn to_markdown(&self) -> String {
        let mut output = String::new();
        output.push_str(&format!("# Plano de Contas - {}\n\n", self.company));

        for (category, entries) in self.sections() {
            output.push_str(&format!("## {:?}\n\n", category));
            if entries.is_empty() {
                output.push_str("_Nenhuma conta_\n\n");
                continue;
            }
            for entry in entries {
                let period = entry
                    .period
                    .as_deref()
                    .map(|p| format!(" ({})", p))
                    .unwrap_or_default();
                let value = entry.value.map(format_brl).unwrap_or_else(|| "n/d".to_string());
                output.push_str(&format!(
                    "- {}{} [{}]: {}\n",
                    entry.description,
                    period,
                    entry.statement.label(),
                    value
                ));
            }
            output.push('\n');
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> CompanyLedger {
        CompanyLedger::new(
            "Test Corp",
            vec![
                LineItem::new("Receita Líquida", Some(1000.0), Some("2024".into())),
                LineItem::new("Receita Líquida", Some(900.0), Some("2023".into())),
                LineItem::new("(-) Custo dos Produtos Vendidos", Some(-600.0), Some("2024".into())),
                LineItem::new("Lucro \"Bruto\"", Some(400.0), Some("2024".into())),
            ],
            vec![LineItem::new("Caixa", None, None)],
        )
    }

    #[test]
    fn test_chart_groups_by_category() {
        let chart = ChartOfAccounts::from_ledger(&ledger());

        assert_eq!(chart.receita.len(), 2);
        assert_eq!(chart.receita[0].period.as_deref(), Some("2023"));
        assert_eq!(chart.custo.len(), 1);
        assert_eq!(chart.resultado.len(), 1);
        assert_eq!(chart.entries(Category::Outros)[0].statement, Statement::BalanceSheet);
        assert_eq!(chart.total_accounts(), 5);
    }

    #[test]
    fn test_chart_to_markdown() {
        let markdown = ChartOfAccounts::from_ledger(&ledger()).to_markdown();

        assert!(markdown.contains("# Plano de Contas - Test Corp"));
        assert!(markdown.contains("- Receita Líquida (2024) [DRE]: R$ 1.000,00"));
        assert!(markdown.contains("- Caixa [Balanço]: n/d"));
        assert!(markdown.contains("## Despesa\n\n_Nenhuma conta_"));
    }

    #[test]
    fn test_chart_to_csv() {
        let csv = ChartOfAccounts::from_ledger(&ledger()).to_csv();

        assert!(csv.starts_with("Categoria,Demonstrativo"));
        assert!(csv.contains("Custo,DRE,\"(-) Custo dos Produtos Vendidos\",2024,-600.00"));
        assert!(csv.contains("\"Lucro \"\"Bruto\"\"\""));
        assert!(csv.contains("Outros,Balanço,\"Caixa\",,\n"));
    }
}
