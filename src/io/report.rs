use crate::error::{PipelineError, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Number of tab-separated columns in a Kraken2 report
pub const REPORT_COLUMNS: usize = 6;

/// File name suffix of per-sample reports
pub const REPORT_SUFFIX: &str = "_report.txt";

/// Which part of the tree a report row belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaxonKind {
    Virus,
    Bacteria,
    Other,
}

impl TaxonKind {
    /// Kind implied by a domain-level (`D`) row name
    fn from_domain_name(name: &str) -> Self {
        match name {
            "Viruses" => TaxonKind::Virus,
            "Bacteria" => TaxonKind::Bacteria,
            _ => TaxonKind::Other,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TaxonKind::Virus => "virus",
            TaxonKind::Bacteria => "bacteria",
            TaxonKind::Other => "other",
        }
    }
}

/// Rank filter selected on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankFilter {
    Virus,
    Bacteria,
}

impl RankFilter {
    pub fn matches(&self, kind: TaxonKind) -> bool {
        matches!(
            (self, kind),
            (RankFilter::Virus, TaxonKind::Virus) | (RankFilter::Bacteria, TaxonKind::Bacteria)
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            RankFilter::Virus => "virus",
            RankFilter::Bacteria => "bacteria",
        }
    }
}

/// One species-level row of a sample's report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaxonRecord {
    pub sample_id: String,
    pub taxon_name: String,
    pub taxon_id: u64,
    pub kind: TaxonKind,
    /// Reads assigned directly to this taxon
    pub read_count: u64,
    /// Reads assigned to the clade rooted at this taxon
    pub clade_count: u64,
    pub percentage: f64,
}

/// A report row before kind resolution
struct ReportRow<'a> {
    percentage: f64,
    clade_count: u64,
    direct_count: u64,
    rank_code: &'a str,
    taxon_id: u64,
    name: &'a str,
}

fn parse_row<'a>(path: &Path, line_no: usize, line: &'a str) -> Result<ReportRow<'a>> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() != REPORT_COLUMNS {
        return Err(PipelineError::parse(
            path,
            Some(line_no),
            format!("expected {} columns, found {}", REPORT_COLUMNS, fields.len()),
        ));
    }

    let bad = |column: &str, value: &str| {
        PipelineError::parse(path, Some(line_no), format!("invalid {}: '{}'", column, value))
    };

    let percentage = fields[0].trim().parse::<f64>().map_err(|_| bad("percentage", fields[0]))?;
    let clade_count = fields[1].trim().parse::<u64>().map_err(|_| bad("clade count", fields[1]))?;
    let direct_count = fields[2].trim().parse::<u64>().map_err(|_| bad("direct count", fields[2]))?;
    let rank_code = fields[3].trim();
    let taxon_id = fields[4].trim().parse::<u64>().map_err(|_| bad("taxon id", fields[4]))?;
    let name = fields[5].trim();

    if rank_code.is_empty() {
        return Err(PipelineError::parse(path, Some(line_no), "empty rank code"));
    }
    if name.is_empty() {
        return Err(PipelineError::parse(path, Some(line_no), "empty taxon name"));
    }

    Ok(ReportRow {
        percentage,
        clade_count,
        direct_count,
        rank_code,
        taxon_id,
        name,
    })
}

/// Tracks the enclosing domain while walking a depth-first report
#[derive(Debug, Default)]
struct DomainTracker {
    current: Option<TaxonKind>,
}

impl DomainTracker {
    /// Resolve the kind of a row, or `None` if the row is not species level.
    fn resolve(&mut self, rank_code: &str, name: &str) -> Option<TaxonKind> {
        match rank_code {
            "V" => Some(TaxonKind::Virus),
            "B" => Some(TaxonKind::Bacteria),
            "D" => {
                self.current = Some(TaxonKind::from_domain_name(name));
                None
            }
            "U" | "R" => {
                self.current = None;
                None
            }
            "S" => Some(self.current.unwrap_or(TaxonKind::Other)),
            _ => None,
        }
    }
}

/// Parse one sample's Kraken2 report, keeping species rows that match `filter`.
///
/// The read count of each record is the number of reads assigned directly to
/// the taxon. Missing, empty and malformed reports are a `ParseError`.
pub fn parse_report(path: &Path, sample_id: &str, filter: RankFilter) -> Result<Vec<TaxonRecord>> {
    let file = File::open(path)
        .map_err(|e| PipelineError::parse(path, None, format!("cannot open report: {}", e)))?;
    let reader = BufReader::new(file);

    let mut domains = DomainTracker::default();
    let mut records = Vec::new();
    let mut rows_seen = 0usize;

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.map_err(|e| PipelineError::parse(path, Some(line_no), e.to_string()))?;
        if line.trim().is_empty() {
            continue;
        }
        rows_seen += 1;

        let row = parse_row(path, line_no, &line)?;
        let kind = match domains.resolve(row.rank_code, row.name) {
            Some(kind) => kind,
            None => continue,
        };
        if !filter.matches(kind) {
            continue;
        }

        records.push(TaxonRecord {
            sample_id: sample_id.to_string(),
            taxon_name: row.name.to_string(),
            taxon_id: row.taxon_id,
            kind,
            read_count: row.direct_count,
            clade_count: row.clade_count,
            percentage: row.percentage,
        });
    }

    if rows_seen == 0 {
        return Err(PipelineError::parse(path, None, "report is empty"));
    }
    let records = merge_duplicate_taxa(records);

    debug!(
        "Parsed {} {} records for sample {} from {}",
        records.len(),
        filter.label(),
        sample_id,
        path.display()
    );
    Ok(records)
}

/// Collapse rows that share a taxon name into one record per taxon.
///
/// Counts and percentages are summed; the first row's taxon ID is kept.
fn merge_duplicate_taxa(records: Vec<TaxonRecord>) -> Vec<TaxonRecord> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut merged: Vec<TaxonRecord> = Vec::with_capacity(records.len());
    for record in records {
        match index.get(&record.taxon_name) {
            Some(&i) => {
                let kept = &mut merged[i];
                debug!(
                    "Merging taxon {} ({} into {}) for sample {}",
                    record.taxon_name, record.taxon_id, kept.taxon_id, record.sample_id
                );
                kept.read_count += record.read_count;
                kept.clade_count += record.clade_count;
                kept.percentage += record.percentage;
            }
            None => {
                index.insert(record.taxon_name.clone(), merged.len());
                merged.push(record);
            }
        }
    }
    merged
}

/// Sample ID encoded in a report file name (`<sample>_report.txt`)
pub fn sample_id_from_report(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let sample = name.strip_suffix(REPORT_SUFFIX)?;
    if sample.is_empty() {
        None
    } else {
        Some(sample.to_string())
    }
}

/// Path of the report for `sample_id` inside `dir`
pub fn report_path(dir: &Path, sample_id: &str) -> PathBuf {
    dir.join(format!("{}{}", sample_id, REPORT_SUFFIX))
}

/// All `*_report.txt` files in `dir`, sorted by file name
pub fn discover_reports(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let entries = std::fs::read_dir(dir).map_err(|e| PipelineError::io(dir, e))?;
    let mut reports = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| PipelineError::io(dir, e))?.path();
        if !path.is_file() {
            continue;
        }
        if let Some(sample) = sample_id_from_report(&path) {
            reports.push((sample, path));
        }
    }
    reports.sort();
    Ok(reports)
}
