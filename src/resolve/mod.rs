//! Locating the data table inside a fetched document.
//!
//! Strategies run in a fixed order and the first one that produces a usable
//! table wins: embedded script payload, stable table selector, then a scan of
//! every table on the page. A linked CSV export is a separate fallback the
//! pipeline can reach for when all of them fail.

pub mod embedded;
pub mod html_table;

use crate::constants::DRAFT_PLATFORMS;
use crate::error::ExtractionError;
use crate::normalize::looks_like_names;
use crate::types::{CandidateTable, RawDocument, ResolveStrategy, SourceKind};
use html_table::FlatTable;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::{debug, info};

static TABLE_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("table").unwrap());
static RANKING_TABLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("table#ranking-table").unwrap());
static DATA_TABLE_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("table#data").unwrap());
static LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());

const IDENTITY_TOKENS: &[&str] = &["PLAYER", "NAME"];
const CONSENSUS_TOKENS: &[&str] = &["RK", "RANK", "ECR", "TIER", "AVG"];
const PERFORMANCE_TOKENS: &[&str] = &["FPTS", "FANTASY POINTS", "POINTS", "RANK"];

/// Resolve the table of `kind` carried by `doc`.
///
/// `min_rows` guards the payload and selector strategies against widgets that
/// reuse the same markup; the heuristic scan has no floor.
pub fn resolve(
    doc: &RawDocument,
    kind: SourceKind,
    min_rows: usize,
) -> Result<CandidateTable, ExtractionError> {
    let url = source_url(doc);
    let mut missing_identity = false;

    if let Some(table) = embedded::extract(&doc.body) {
        match check(&table, min_rows) {
            Check::Usable => {
                return Ok(candidate(table, kind, ResolveStrategy::EmbeddedPayload, url));
            }
            Check::NoIdentity => missing_identity = true,
            Check::TooSmall => debug!(
                "embedded payload has {} rows, below floor {}",
                table.rows.len(),
                min_rows
            ),
        }
    }

    let html = Html::parse_document(&doc.body);

    let selector: &Selector = match kind {
        SourceKind::ConsensusRanking => &RANKING_TABLE_SELECTOR,
        SourceKind::DraftPosition | SourceKind::Performance => &DATA_TABLE_SELECTOR,
    };
    if let Some(element) = html.select(selector).next() {
        let table = html_table::flatten(element);
        match check(&table, min_rows) {
            Check::Usable => {
                return Ok(candidate(table, kind, ResolveStrategy::TargetedSelector, url));
            }
            Check::NoIdentity => missing_identity = true,
            Check::TooSmall => debug!(
                "selector table has {} rows, below floor {}",
                table.rows.len(),
                min_rows
            ),
        }
    }

    let mut best: Option<FlatTable> = None;
    for element in html.select(&TABLE_SELECTOR) {
        let table = html_table::flatten(element);
        if table.rows.is_empty() || !has_kind_indicator(&table.columns, kind) {
            continue;
        }
        if !has_identity(&table) {
            missing_identity = true;
            continue;
        }
        let better = match &best {
            None => true,
            Some(b) => {
                (table.columns.len(), table.rows.len()) > (b.columns.len(), b.rows.len())
            }
        };
        if better {
            best = Some(table);
        }
    }
    if let Some(table) = best {
        debug!(
            "heuristic scan picked a {}x{} table",
            table.rows.len(),
            table.columns.len()
        );
        return Ok(candidate(table, kind, ResolveStrategy::HeuristicScan, url));
    }

    if missing_identity {
        Err(ExtractionError::MissingColumns {
            kind,
            url: url.to_string(),
            missing: "player".to_string(),
        })
    } else {
        Err(ExtractionError::NoTableFound {
            kind,
            url: url.to_string(),
        })
    }
}

/// Absolute URL of a CSV export linked from the document, if one is offered.
pub fn discover_export_link(doc: &RawDocument) -> Option<String> {
    let html = Html::parse_document(&doc.body);
    let base = reqwest::Url::parse(source_url(doc)).ok();
    html.select(&LINK_SELECTOR)
        .filter_map(|a| a.value().attr("href"))
        .map(str::trim)
        .find(|href| is_export_href(href))
        .and_then(|href| match &base {
            Some(base) => base.join(href).ok().map(|u| u.to_string()),
            None => reqwest::Url::parse(href).ok().map(|u| u.to_string()),
        })
}

fn is_export_href(href: &str) -> bool {
    let lower = href.to_ascii_lowercase();
    let path = lower.split(['?', '#']).next().unwrap_or("");
    if path.ends_with(".csv") {
        return true;
    }
    (lower.contains("export") || lower.contains("download")) && lower.contains("csv")
}

/// Parse a CSV export into a candidate table.
pub fn parse_export(
    body: &str,
    kind: SourceKind,
    url: &str,
) -> Result<CandidateTable, ExtractionError> {
    let not_found = || ExtractionError::NoTableFound {
        kind,
        url: url.to_string(),
    };
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body.trim_start_matches('\u{feff}').as_bytes());

    let columns: Vec<String> = reader
        .headers()
        .map_err(|e| {
            debug!("export at {} has no readable header: {}", url, e);
            not_found()
        })?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| {
            debug!("export at {} is malformed: {}", url, e);
            not_found()
        })?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        rows.push(record.iter().map(str::to_string).collect());
    }

    let table = FlatTable { columns, rows };
    if table.rows.is_empty() {
        return Err(not_found());
    }
    if !has_identity(&table) {
        return Err(ExtractionError::MissingColumns {
            kind,
            url: url.to_string(),
            missing: "player".to_string(),
        });
    }
    info!("parsed {} rows from export {}", table.rows.len(), url);
    Ok(candidate(table, kind, ResolveStrategy::Export, url))
}

enum Check {
    Usable,
    TooSmall,
    NoIdentity,
}

fn check(table: &FlatTable, min_rows: usize) -> Check {
    if table.rows.is_empty() || table.rows.len() < min_rows {
        Check::TooSmall
    } else if !has_identity(table) {
        Check::NoIdentity
    } else {
        Check::Usable
    }
}

fn candidate(
    table: FlatTable,
    kind: SourceKind,
    strategy: ResolveStrategy,
    url: &str,
) -> CandidateTable {
    CandidateTable {
        kind,
        columns: table.columns,
        rows: table.rows,
        strategy,
        source_url: url.to_string(),
    }
}

fn source_url(doc: &RawDocument) -> &str {
    if doc.final_url.is_empty() {
        &doc.url
    } else {
        &doc.final_url
    }
}

/// A player column is named in the headers, or an unlabeled column carries
/// name-like values the normalizer can claim positionally.
fn has_identity(table: &FlatTable) -> bool {
    let named = table
        .columns
        .iter()
        .any(|c| IDENTITY_TOKENS.iter().any(|t| header_mentions(c, t)));
    named
        || (0..table.columns.len()).any(|i| {
            looks_like_names(
                table
                    .rows
                    .iter()
                    .map(|r| r.get(i).map(String::as_str).unwrap_or("")),
            )
        })
}

fn has_kind_indicator(columns: &[String], kind: SourceKind) -> bool {
    columns.iter().any(|c| match kind {
        SourceKind::DraftPosition => {
            DRAFT_PLATFORMS.iter().any(|t| header_mentions(c, t))
                || header_mentions(c, "AVG")
                || header_mentions(c, "ADP")
        }
        SourceKind::ConsensusRanking => CONSENSUS_TOKENS.iter().any(|t| header_mentions(c, t)),
        SourceKind::Performance => PERFORMANCE_TOKENS.iter().any(|t| header_mentions(c, t)),
    })
}

/// Whole-word, case-insensitive token test: `MISC_FPTS` mentions `FPTS`,
/// `Rankings Date` does not mention `RANK`.
pub(crate) fn header_mentions(header: &str, token: &str) -> bool {
    let words: Vec<String> = header
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_ascii_uppercase)
        .collect();
    let haystack = format!(" {} ", words.join(" "));
    haystack.contains(&format!(" {} ", token))
}
