use crate::error::{MetricsError, Result};
use crate::ledger::CompanyLedger;
use crate::schema::LineItem;
use crate::utils::{normalize_description, parse_amount};
use csv::{ReaderBuilder, Trim};
use log::{debug, info};
use std::fs::File;
use std::io::Read;
use std::path::Path;

const DESCRIPTION_HEADERS: &[&str] = &["DESCRICAO", "DESCRIPTION"];
const VALUE_HEADERS: &[&str] = &["VALOR", "VALUE"];
const PERIOD_HEADERS: &[&str] = &["PERIODO", "PERIOD", "ANO"];

fn find_column(headers: &csv::StringRecord, accepted: &[&str]) -> Option<usize> {
    headers.iter().position(|h| {
        let normalized = normalize_description(h.trim_start_matches('\u{feff}'));
        accepted.contains(&normalized.as_str())
    })
}

/// Picks ';' when the header line has more semicolons than commas, the usual
/// layout for spreadsheets exported with a Brazilian locale.
fn sniff_delimiter(text: &str) -> u8 {
    let header = text.lines().next().unwrap_or("");
    if header.matches(';').count() > header.matches(',').count() {
        b';'
    } else {
        b','
    }
}

/// Reads statement rows from CSV. Requires a description column and a value
/// column; a period column is optional. Each row is classified on the way in.
pub fn read_line_items<R: Read>(mut reader: R) -> Result<Vec<LineItem>> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;

    let delimiter = sniff_delimiter(&text);
    let mut rdr = ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let headers = rdr.headers()?.clone();
    let description_idx = find_column(&headers, DESCRIPTION_HEADERS)
        .ok_or_else(|| MetricsError::MissingColumn("descrição".to_string()))?;
    let value_idx = find_column(&headers, VALUE_HEADERS)
        .ok_or_else(|| MetricsError::MissingColumn("valor".to_string()))?;
    let period_idx = find_column(&headers, PERIOD_HEADERS);

    let mut items = Vec::new();
    for (idx, record) in rdr.records().enumerate() {
        let record = record?;
        let row = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(idx + 2);

        let description = record.get(description_idx).unwrap_or("").trim();
        if description.is_empty() {
            debug!("Skipping row {} without description", row);
            continue;
        }

        let value = parse_amount(record.get(value_idx).unwrap_or(""))
            .map_err(|details| MetricsError::Parse { row, details })?;

        let period = period_idx
            .and_then(|i| record.get(i))
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string);

        items.push(LineItem::new(description, value, period));
    }

    debug!("Read {} line items", items.len());
    Ok(items)
}

pub fn load_line_items(path: impl AsRef<Path>) -> Result<Vec<LineItem>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let items = read_line_items(file)?;
    info!("Loaded {} line items from {}", items.len(), path.display());
    Ok(items)
}

/// Builds a ledger from an income statement (DRE) file and a balance sheet file.
pub fn load_company_ledger(
    company: impl Into<String>,
    dre_path: impl AsRef<Path>,
    balanco_path: impl AsRef<Path>,
) -> Result<CompanyLedger> {
    let income_statement = load_line_items(dre_path)?;
    let balance_sheet = load_line_items(balanco_path)?;
    Ok(CompanyLedger::new(company, income_statement, balance_sheet))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Category;
    use std::io::Cursor;

    #[test]
    fn test_read_comma_separated() {
        let input = "descrição,valor,período\n\
                     RECEITA LÍQUIDA,1000.50,2024\n\
                     \"(-) Custo dos Produtos Vendidos\",-600,2024\n\
                     Outras Receitas,,2024\n";
        let items = read_line_items(Cursor::new(input)).unwrap();

        assert_eq!(items.len(), 3);
        assert_eq!(items[0].value, Some(1000.5));
        assert_eq!(items[0].category, Category::Receita);
        assert_eq!(items[0].period.as_deref(), Some("2024"));
        assert_eq!(items[1].category, Category::Custo);
        assert_eq!(items[2].value, None);
    }

    #[test]
    fn test_read_semicolon_pt_br() {
        let input = "Descricao;Valor\n  Lucro Bruto  ;1.234,56\nDespesas Gerais;(500,00)\n";
        let items = read_line_items(Cursor::new(input)).unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].description, "Lucro Bruto");
        assert_eq!(items[0].value, Some(1234.56));
        assert_eq!(items[0].period, None);
        assert_eq!(items[1].value, Some(-500.0));
    }

    #[test]
    fn test_missing_column() {
        let err = read_line_items(Cursor::new("conta,saldo\nCaixa,10\n")).unwrap_err();
        assert!(matches!(err, MetricsError::MissingColumn(ref c) if c == "descrição"));
    }

    #[test]
    fn test_bad_amount_reports_row() {
        let input = "descrição,valor\nCaixa,10\nBancos,dez reais\n";
        let err = read_line_items(Cursor::new(input)).unwrap_err();
        match err {
            MetricsError::Parse { row, details } => {
                assert_eq!(row, 3);
                assert!(details.contains("dez reais"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_non_finite_amount_is_rejected() {
        let input = "descrição,valor\nCaixa,-nan\nBancos,inf\n";
        let err = read_line_items(Cursor::new(input)).unwrap_err();
        assert!(matches!(err, MetricsError::Parse { row: 3, .. }));
    }

    #[test]
    fn test_load_company_ledger_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let dre = dir.path().join("dre.csv");
        let balanco = dir.path().join("balanco.csv");
        std::fs::write(&dre, "descrição,valor\nRECEITA LÍQUIDA,100\n").unwrap();
        std::fs::write(&balanco, "descrição,valor\nATIVO CIRCULANTE,50\n").unwrap();

        let ledger = load_company_ledger("JJ MAX", &dre, &balanco).unwrap();
        assert_eq!(ledger.company, "JJ MAX");
        assert_eq!(ledger.income_statement.len(), 1);
        assert_eq!(ledger.balance_sheet.len(), 1);
    }
}
