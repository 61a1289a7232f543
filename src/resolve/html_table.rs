use once_cell::sync::Lazy;
use scraper::{ElementRef, Selector};

static ROW_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").unwrap());
static CELL_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("th, td").unwrap());

/// A `<table>` reduced to flat column labels and text rows.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

struct RawRow {
    in_head: bool,
    all_header_cells: bool,
    cells: Vec<(String, usize)>,
}

/// Flatten one table. Header rows are the `<thead>` rows, or the leading rows
/// made only of `<th>` cells when the table has no `<thead>`. Stacked header
/// rows are joined per column with `_`, skipping empty and repeated fragments.
pub fn flatten(table: ElementRef<'_>) -> FlatTable {
    let raw: Vec<RawRow> = table
        .select(&ROW_SELECTOR)
        .filter(|tr| belongs_to(tr, &table))
        .map(|tr| {
            let mut all_header_cells = true;
            let cells: Vec<(String, usize)> = tr
                .select(&CELL_SELECTOR)
                .filter(|cell| cell.parent().and_then(ElementRef::wrap).map(|p| p.id()) == Some(tr.id()))
                .map(|cell| {
                    if cell.value().name() != "th" {
                        all_header_cells = false;
                    }
                    (cell_text(cell), colspan(cell))
                })
                .collect();
            RawRow {
                in_head: has_ancestor(&tr, "thead", &table),
                all_header_cells,
                cells,
            }
        })
        .filter(|r| !r.cells.is_empty())
        .collect();

    let has_thead = raw.iter().any(|r| r.in_head);
    let header_count = if has_thead {
        raw.iter().take_while(|r| r.in_head).count()
    } else {
        raw.iter().take_while(|r| r.all_header_cells).count()
    };

    let header_rows: Vec<Vec<String>> = raw[..header_count].iter().map(|r| expand(&r.cells)).collect();
    let body_rows: Vec<Vec<String>> = raw[header_count..]
        .iter()
        .filter(|r| !r.in_head)
        .map(|r| expand(&r.cells))
        .filter(|cells| cells.iter().any(|c| !c.is_empty()))
        .collect();

    let width = header_rows
        .iter()
        .chain(body_rows.iter())
        .map(Vec::len)
        .max()
        .unwrap_or(0);

    let columns = (0..width)
        .map(|i| {
            let mut fragments: Vec<&str> = Vec::new();
            for row in &header_rows {
                if let Some(label) = row.get(i).map(|s| s.as_str()) {
                    if !label.is_empty() && fragments.last() != Some(&label) {
                        fragments.push(label);
                    }
                }
            }
            if fragments.is_empty() {
                format!("column_{}", i)
            } else {
                fragments.join("_")
            }
        })
        .collect();

    FlatTable {
        columns,
        rows: body_rows,
    }
}

fn expand(cells: &[(String, usize)]) -> Vec<String> {
    let mut out = Vec::new();
    for (text, span) in cells {
        for _ in 0..*span {
            out.push(text.clone());
        }
    }
    out
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn colspan(cell: ElementRef<'_>) -> usize {
    cell.value()
        .attr("colspan")
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(1)
        .min(64)
}

/// True when the nearest enclosing `<table>` of `row` is `table` (skips nested tables).
fn belongs_to(row: &ElementRef<'_>, table: &ElementRef<'_>) -> bool {
    row.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().name() == "table")
        .map(|e| e.id() == table.id())
        .unwrap_or(false)
}

fn has_ancestor(row: &ElementRef<'_>, name: &str, table: &ElementRef<'_>) -> bool {
    row.ancestors()
        .filter_map(ElementRef::wrap)
        .take_while(|e| e.id() != table.id())
        .any(|e| e.value().name() == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    fn first_table(html: &str) -> FlatTable {
        let doc = Html::parse_document(html);
        let sel = Selector::parse("table").unwrap();
        flatten(doc.select(&sel).next().unwrap())
    }

    #[test]
    fn stacked_headers_join_with_underscore() {
        let t = first_table(
            r#"<table>
              <thead>
                <tr><th></th><th></th><th colspan="2">PASSING</th><th colspan="2">MISC</th></tr>
                <tr><th>Rank</th><th>Player</th><th>YDS</th><th>TD</th><th>G</th><th>FPTS</th></tr>
              </thead>
              <tbody>
                <tr><td>1</td><td>Josh Allen (BUF)</td><td>4306</td><td>35</td><td>17</td><td>392.6</td></tr>
              </tbody>
            </table>"#,
        );
        assert_eq!(
            t.columns,
            vec!["Rank", "Player", "PASSING_YDS", "PASSING_TD", "MISC_G", "MISC_FPTS"]
        );
        assert_eq!(t.rows.len(), 1);
        assert_eq!(t.rows[0][1], "Josh Allen (BUF)");
    }

    #[test]
    fn header_rows_without_thead_and_whitespace_collapse() {
        let t = first_table(
            "<table><tr><th>Rank</th><th>Player Team (Bye)</th><th></th></tr>
             <tr><td>1</td><td><a>Ja'Marr   Chase</a> <small>CIN</small> (10)</td><td>x</td></tr>
             <tr><td></td><td></td><td></td></tr></table>",
        );
        assert_eq!(t.columns, vec!["Rank", "Player Team (Bye)", "column_2"]);
        assert_eq!(t.rows, vec![vec!["1", "Ja'Marr Chase CIN (10)", "x"]]);
    }

    #[test]
    fn nested_tables_are_not_merged() {
        let t = first_table(
            "<table><tr><th>Player</th></tr>
             <tr><td>A Player<table><tr><td>inner</td><td>cells</td></tr></table></td></tr></table>",
        );
        assert_eq!(t.columns, vec!["Player"]);
        assert_eq!(t.rows.len(), 1);
    }
}
