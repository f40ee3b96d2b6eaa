//! Server-status report parsing
//!
//! The report is the HTML page rendered by Apache `mod_status`. Two tables
//! matter: the per-process table (`Slot | PID | Stopping | Connections ...`)
//! and the extended worker table (`Srv | PID | Acc | M | ... | SS | ... |
//! Client ...`). Columns are located by header label so that column order
//! changes between server versions do not break the parser.

use crate::error::ParseError;
use crate::types::{canonical_ip, ListenerSection, WorkerState, WorkerThreadRecord};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::net::IpAddr;
use tracing::{debug, warn};

static TABLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<table\b[^>]*>(.*?)</table>").expect("valid table pattern"));
static ROW_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<tr\b[^>]*>(.*?)</tr>").expect("valid row pattern"));
static CELL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<t([hd])\b([^>]*)>(.*?)</t[hd]>").expect("valid cell pattern")
});
static SPAN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\b(colspan|rowspan)\s*=\s*["']?(\d+)"#).expect("valid span pattern")
});
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid tag pattern"));
static SPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid space pattern"));

/// Largest spans a browser honours; anything above is clamped
const MAX_COLSPAN: usize = 1000;
const MAX_ROWSPAN: usize = 65534;

/// Everything the parser extracted from one report
#[derive(Debug, Clone, Default, Serialize)]
pub struct ParsedReport {
    pub listeners: Vec<ListenerSection>,
    pub records: Vec<WorkerThreadRecord>,
    /// Worker rows that could not be interpreted
    pub skipped_rows: usize,
}

#[derive(Debug, Clone)]
struct Cell {
    header: bool,
    text: String,
    colspan: usize,
    rowspan: usize,
}

#[derive(Debug)]
struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    fn column(&self, label: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(label))
    }

    fn column_ending_with(&self, suffix: &str) -> Option<usize> {
        let suffix = suffix.to_ascii_lowercase();
        self.columns
            .iter()
            .position(|c| c.to_ascii_lowercase().ends_with(&suffix))
    }

    fn is_worker_table(&self) -> bool {
        ["PID", "M", "SS"].iter().all(|l| self.column(l).is_some())
    }

    fn is_listener_table(&self) -> bool {
        ["PID", "Stopping"].iter().all(|l| self.column(l).is_some())
    }
}

/// Parse a server-status page into worker records.
///
/// Fails only when no worker table can be found at all. Individual rows that
/// do not parse are skipped and counted.
pub fn parse_status_report(html: &str) -> Result<ParsedReport, ParseError> {
    let tables: Vec<Table> = TABLE_RE
        .captures_iter(html)
        .filter_map(|caps| caps.get(1).map(|m| read_table(m.as_str())))
        .collect();

    let listeners: Vec<ListenerSection> = tables
        .iter()
        .filter(|t| t.is_listener_table())
        .flat_map(parse_listener_rows)
        .collect();

    let worker_tables: Vec<&Table> = tables.iter().filter(|t| t.is_worker_table()).collect();
    if worker_tables.is_empty() {
        return Err(ParseError::MalformedReport(
            "no worker table found (is ExtendedStatus enabled?)".to_string(),
        ));
    }

    let accepting: HashMap<u32, bool> = listeners
        .iter()
        .map(|l| (l.process_id, l.accepting_connections))
        .collect();

    let mut report = ParsedReport {
        listeners,
        ..ParsedReport::default()
    };

    for table in worker_tables {
        parse_worker_rows(table, &accepting, &mut report);
    }

    debug!(
        "Parsed {} worker records from {} listener sections, skipped {} rows",
        report.records.len(),
        report.listeners.len(),
        report.skipped_rows
    );
    if report.skipped_rows > 0 {
        warn!("Skipped {} unparseable worker rows", report.skipped_rows);
    }

    Ok(report)
}

fn parse_listener_rows(table: &Table) -> Vec<ListenerSection> {
    let (Some(pid_idx), Some(stopping_idx)) = (table.column("PID"), table.column("Stopping"))
    else {
        return Vec::new();
    };
    let slot_idx = table.column("Slot");
    let accepting_idx = table.column_ending_with("accepting");

    table
        .rows
        .iter()
        .enumerate()
        .filter_map(|(position, row)| {
            let process_id = cell_text(row, pid_idx)?.parse::<u32>().ok()?;
            if process_id == 0 {
                return None;
            }
            // Summary rows carry a non-numeric slot
            let slot = match slot_idx {
                Some(idx) => cell_text(row, idx)?.parse::<u32>().ok()?,
                None => position as u32,
            };
            let stopping = cell_text(row, stopping_idx)?;
            // "no (old gen)" is a previous generation that still accepts
            let is_stopping = stopping
                .get(..3)
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case("yes"));
            let refuses = accepting_idx
                .and_then(|idx| cell_text(row, idx))
                .map(|v| v.eq_ignore_ascii_case("no"))
                .unwrap_or(false);

            Some(ListenerSection {
                slot,
                process_id,
                stopping: is_stopping.then(|| stopping.to_string()),
                accepting_connections: !is_stopping && !refuses,
            })
        })
        .collect()
}

fn parse_worker_rows(table: &Table, accepting: &HashMap<u32, bool>, report: &mut ParsedReport) {
    // is_worker_table guarantees these columns
    let (Some(pid_idx), Some(mode_idx), Some(ss_idx)) =
        (table.column("PID"), table.column("M"), table.column("SS"))
    else {
        return;
    };
    let slot_idx = table.column("Srv");
    let client_idx = table.column("Client");

    for row in &table.rows {
        match parse_worker_row(row, pid_idx, mode_idx, ss_idx, slot_idx, client_idx) {
            Some(mut record) => {
                // A process missing from the listener table is treated as accepting
                record.server_accepting_new_connections =
                    accepting.get(&record.process_id).copied().unwrap_or(true);
                report.records.push(record);
            }
            None => {
                debug!("Skipping unparseable worker row: {:?}", row_summary(row));
                report.skipped_rows += 1;
            }
        }
    }
}

fn parse_worker_row(
    row: &[Cell],
    pid_idx: usize,
    mode_idx: usize,
    ss_idx: usize,
    slot_idx: Option<usize>,
    client_idx: Option<usize>,
) -> Option<WorkerThreadRecord> {
    let process_id = cell_text(row, pid_idx)?.parse::<u32>().ok()?;
    if process_id == 0 {
        return None;
    }

    let mut letters = cell_text(row, mode_idx)?.chars();
    let worker_state = match (letters.next(), letters.next()) {
        (Some(letter), None) => WorkerState::from_letter(letter)?,
        _ => return None,
    };

    let seconds_in_state = cell_text(row, ss_idx)?.parse::<u64>().ok()?;

    let slot = slot_idx
        .and_then(|idx| cell_text(row, idx))
        .unwrap_or_default()
        .to_string();

    let remote_client_address = client_idx
        .and_then(|idx| cell_text(row, idx))
        .and_then(parse_client_address);

    Some(WorkerThreadRecord {
        process_id,
        slot,
        worker_state,
        server_accepting_new_connections: true,
        remote_client_address,
        seconds_in_state,
    })
}

fn parse_client_address(text: &str) -> Option<IpAddr> {
    if text.is_empty() {
        return None;
    }
    let trimmed = text.trim_start_matches('[').trim_end_matches(']');
    match trimmed.parse::<IpAddr>() {
        Ok(address) => Some(canonical_ip(address)),
        Err(_) => {
            debug!("Client cell is not an IP address: {}", text);
            None
        }
    }
}

fn read_table(body: &str) -> Table {
    let rows: Vec<Vec<Cell>> = ROW_RE
        .captures_iter(body)
        .filter_map(|caps| caps.get(1).map(|m| read_cells(m.as_str())))
        .filter(|cells| !cells.is_empty())
        .collect();

    let header_count = rows
        .iter()
        .take_while(|cells| cells.iter().all(|c| c.header))
        .count();

    let (headers, data) = rows.split_at(header_count);
    Table {
        columns: flatten_headers(headers),
        rows: data
            .iter()
            .filter(|cells| cells.iter().all(|c| !c.header))
            .cloned()
            .collect(),
    }
}

fn read_cells(row: &str) -> Vec<Cell> {
    CELL_RE
        .captures_iter(row)
        .map(|caps| {
            let attrs = caps.get(2).map_or("", |m| m.as_str());
            let mut colspan = 1;
            let mut rowspan = 1;
            for span in SPAN_RE.captures_iter(attrs) {
                // digits too long for usize are saturated by the clamp below
                let value = span[2].parse::<usize>().unwrap_or(usize::MAX).max(1);
                if span[1].eq_ignore_ascii_case("colspan") {
                    colspan = value.min(MAX_COLSPAN);
                } else {
                    rowspan = value.min(MAX_ROWSPAN);
                }
            }
            Cell {
                header: caps[1].eq_ignore_ascii_case("h"),
                text: clean_text(caps.get(3).map_or("", |m| m.as_str())),
                colspan,
                rowspan,
            }
        })
        .collect()
}

/// Resolve grouped header rows into one label per column.
///
/// `Connections` spanning `total | accepting` yields the labels
/// `Connections total` and `Connections accepting`.
fn flatten_headers(rows: &[Vec<Cell>]) -> Vec<String> {
    let mut grid: Vec<Vec<Option<String>>> = vec![Vec::new(); rows.len()];

    for (r, row) in rows.iter().enumerate() {
        let mut c = 0;
        for cell in row {
            while matches!(grid[r].get(c), Some(Some(_))) {
                c += 1;
            }
            let end = c.saturating_add(cell.colspan);
            for grid_row in grid.iter_mut().skip(r).take(cell.rowspan) {
                if grid_row.len() < end {
                    grid_row.resize(end, None);
                }
                for slot in grid_row.iter_mut().skip(c).take(cell.colspan) {
                    *slot = Some(cell.text.clone());
                }
            }
            c = end;
        }
    }

    let width = grid.iter().map(Vec::len).max().unwrap_or(0);
    (0..width)
        .map(|c| {
            let mut parts: Vec<&str> = Vec::new();
            for label in grid.iter().filter_map(|row| row.get(c).and_then(Option::as_deref)) {
                if !label.is_empty() && parts.last() != Some(&label) {
                    parts.push(label);
                }
            }
            parts.join(" ")
        })
        .collect()
}

fn clean_text(html: &str) -> String {
    let stripped = TAG_RE.replace_all(html, "");
    let decoded = stripped
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    SPACE_RE.replace_all(decoded.trim(), " ").into_owned()
}

fn cell_text(row: &[Cell], idx: usize) -> Option<&str> {
    row.get(idx).map(|c| c.text.as_str())
}

fn row_summary(row: &[Cell]) -> Vec<&str> {
    row.iter().map(|c| c.text.as_str()).collect()
}
