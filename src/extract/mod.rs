// src/extract/mod.rs
//
// Turns rendered markup into header-validated tables.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

static TABLE: Lazy<Selector> = Lazy::new(|| Selector::parse("table").expect("table selector"));
static HEAD_CELL: Lazy<Selector> =
    Lazy::new(|| Selector::parse("thead th").expect("thead selector"));
static BODY_ROW: Lazy<Selector> = Lazy::new(|| Selector::parse("tbody tr").expect("tbody selector"));
static ROW: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").expect("tr selector"));
static TD: Lazy<Selector> = Lazy::new(|| Selector::parse("td").expect("td selector"));
static TH: Lazy<Selector> = Lazy::new(|| Selector::parse("th").expect("th selector"));
static ANY_CELL: Lazy<Selector> = Lazy::new(|| Selector::parse("th, td").expect("cell selector"));

/// A header row plus data rows of identical arity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Each row as ordered `(header, cell)` pairs.
    pub fn records(&self) -> impl Iterator<Item = Vec<(&str, &str)>> + '_ {
        self.rows.iter().map(move |row| {
            self.headers
                .iter()
                .map(String::as_str)
                .zip(row.iter().map(String::as_str))
                .collect()
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Result of looking for one table by id. Absence and emptiness are
/// ordinary outcomes, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    NotFound,
    NoRows { headers: Vec<String> },
    Found(Table),
}

fn cell_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Extract the table with `id == table_id`.
///
/// Headers come from `thead th` in document order and fix the arity for the
/// whole table. Body rows whose `td` count differs are dropped, which skips
/// the summary and ad rows the site injects. A table without `thead` headers
/// has nothing to validate rows against and yields `NoRows`.
pub fn extract(markup: &str, table_id: &str) -> Extraction {
    let doc = Html::parse_document(markup);
    let Some(table) = doc
        .select(&TABLE)
        .find(|t| t.value().id() == Some(table_id))
    else {
        return Extraction::NotFound;
    };

    let headers: Vec<String> = table.select(&HEAD_CELL).map(cell_text).collect();
    if headers.is_empty() {
        return Extraction::NoRows { headers };
    }

    let rows: Vec<Vec<String>> = table
        .select(&BODY_ROW)
        .map(|tr| tr.select(&TD).map(cell_text).collect::<Vec<_>>())
        .filter(|cells| cells.len() == headers.len())
        .collect();

    if rows.is_empty() {
        Extraction::NoRows { headers }
    } else {
        Extraction::Found(Table { headers, rows })
    }
}

/// Parse the first `<table>` in a server-rendered page.
///
/// Lenient where `extract` is strict: short rows are padded with empty cells
/// and long rows truncated to the header width. Headers come from `thead th`,
/// or from the first all-`th` row when the table has no `thead`. Returns
/// `None` when the document has no table, or the table has no headers or no
/// data rows.
pub fn first_table(markup: &str) -> Option<Table> {
    let doc = Html::parse_document(markup);
    let table = doc.select(&TABLE).next()?;

    let mut headers: Vec<String> = table.select(&HEAD_CELL).map(cell_text).collect();
    if headers.is_empty() {
        let header_row = table
            .select(&ROW)
            .find(|tr| tr.select(&TD).next().is_none())?;
        headers = header_row.select(&TH).map(cell_text).collect();
    }
    if headers.is_empty() {
        return None;
    }

    let width = headers.len();
    let rows: Vec<Vec<String>> = table
        .select(&ROW)
        .filter(|tr| tr.select(&TD).next().is_some())
        .map(|tr| {
            let mut cells: Vec<String> = tr.select(&ANY_CELL).map(cell_text).collect();
            cells.resize(width, String::new());
            cells
        })
        .collect();

    if rows.is_empty() {
        return None;
    }
    Some(Table { headers, rows })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOLDINGS: &str = r#"
        <html><body>
        <table id="DataTables_Table_1">
          <thead><tr><th> Symbol </th><th>Name</th><th>PE</th></tr></thead>
          <tbody>
            <tr><td>NMB50</td><td>NMB 50</td><td>12.1</td></tr>
            <tr><td>C30MF</td><td> Citizens Mutual Fund 3 </td><td>9.8</td></tr>
            <tr><td colspan="3">Showing 1 to 2 of 2 entries</td></tr>
          </tbody>
        </table>
        </body></html>"#;

    #[test]
    fn keeps_rows_matching_header_arity() {
        let Extraction::Found(table) = extract(HOLDINGS, "DataTables_Table_1") else {
            panic!("expected a table");
        };
        assert_eq!(table.headers, vec!["Symbol", "Name", "PE"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[1][1], "Citizens Mutual Fund 3");
    }

    #[test]
    fn all_conforming_rows_are_kept() {
        let markup = r#"<table id="t"><thead><tr><th>A</th><th>B</th></tr></thead>
            <tbody><tr><td>1</td><td>2</td></tr><tr><td>3</td><td>4</td></tr>
            <tr><td>5</td><td>6</td></tr></tbody></table>"#;
        match extract(markup, "t") {
            Extraction::Found(table) => assert_eq!(table.len(), 3),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_table_is_not_found() {
        assert_eq!(extract(HOLDINGS, "DataTables_Table_9"), Extraction::NotFound);
        assert_eq!(extract("<p>nothing</p>", "x"), Extraction::NotFound);
    }

    #[test]
    fn table_without_valid_rows_reports_no_rows() {
        let markup = r#"<table id="t"><thead><tr><th>A</th><th>B</th></tr></thead>
            <tbody><tr><td class="dataTables_empty" colspan="2">No data</td></tr></tbody></table>"#;
        assert_eq!(
            extract(markup, "t"),
            Extraction::NoRows {
                headers: vec!["A".into(), "B".into()]
            }
        );
    }

    #[test]
    fn table_without_thead_reports_no_rows() {
        let markup = r#"<table id="t"><tr><th>A</th><th>B</th></tr><tr><td>1</td><td>2</td></tr></table>"#;
        assert_eq!(extract(markup, "t"), Extraction::NoRows { headers: vec![] });

        let bare = r#"<table id="t"><tbody><tr></tr><tr><th>x</th></tr></tbody></table>"#;
        assert_eq!(extract(bare, "t"), Extraction::NoRows { headers: vec![] });
    }

    #[test]
    fn records_pair_headers_with_cells() {
        let Extraction::Found(table) = extract(HOLDINGS, "DataTables_Table_1") else {
            panic!("expected a table");
        };
        let first = table.records().next().unwrap();
        assert_eq!(first, vec![("Symbol", "NMB50"), ("Name", "NMB 50"), ("PE", "12.1")]);
    }

    #[test]
    fn first_table_takes_only_the_first() {
        let markup = r#"<div>
            <table><thead><tr><th>Sector</th><th>Weight</th></tr></thead>
              <tbody><tr><td>Banking</td><td>40%</td></tr><tr><td>Hydro</td></tr></tbody></table>
            <table><tr><th>Other</th></tr><tr><td>x</td></tr></table>
            </div>"#;
        let table = first_table(markup).unwrap();
        assert_eq!(table.headers, vec!["Sector", "Weight"]);
        assert_eq!(
            table.rows,
            vec![
                vec!["Banking".to_string(), "40%".to_string()],
                vec!["Hydro".to_string(), String::new()],
            ]
        );
    }

    #[test]
    fn first_table_falls_back_to_th_row() {
        let markup = "<table><tr><th>A</th><th>B</th></tr><tr><td>1</td><td>2</td><td>3</td></tr></table>";
        let table = first_table(markup).unwrap();
        assert_eq!(table.headers, vec!["A", "B"]);
        assert_eq!(table.rows, vec![vec!["1".to_string(), "2".to_string()]]);
    }

    #[test]
    fn first_table_rejects_unparseable_pages() {
        assert!(first_table("<html><body>Just a moment...</body></html>").is_none());
        assert!(first_table("<table><tr><td>no header</td></tr></table>").is_none());
        assert!(first_table("<table><thead><tr><th>A</th></tr></thead></table>").is_none());
    }
}
