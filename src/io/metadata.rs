use crate::abundance::table::{AbundanceRow, AbundanceTable};
use crate::error::{PipelineError, Result};
use crate::io::report::TaxonRecord;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use tracing::{info, warn};

/// Metadata values of one sample, in the table's column order
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataRow {
    values: Vec<String>,
}

impl MetadataRow {
    pub fn values(&self) -> &[String] {
        &self.values
    }
}

/// Sample metadata loaded from a CSV whose first column is the sample ID
#[derive(Debug, Clone)]
pub struct MetadataTable {
    id_column: String,
    columns: Vec<String>,
    rows: HashMap<String, MetadataRow>,
}

/// How taxon records are matched against metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinPolicy {
    /// `--no_metadata`: rows carry no metadata columns
    Disabled,
    /// Records of samples without metadata are dropped with a warning
    Lenient,
    /// A sample without metadata is fatal
    Required,
}

/// Outcome of joining records onto metadata
#[derive(Debug, Default, Clone, PartialEq)]
pub struct JoinReport {
    pub joined: usize,
    pub dropped_samples: BTreeSet<String>,
}

fn config_error(path: &Path, message: impl std::fmt::Display) -> PipelineError {
    PipelineError::Configuration(format!("metadata file {}: {}", path.display(), message))
}

impl MetadataTable {
    pub fn from_csv(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| config_error(path, e))?;
        Self::from_reader(file, path)
    }

    /// Parse metadata CSV from any reader; `source` is only used in messages.
    pub fn from_reader<R: std::io::Read>(reader: R, source: &Path) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = rdr.headers().map_err(|e| config_error(source, e))?.clone();
        if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
            return Err(config_error(source, "missing header row"));
        }

        let id_column = headers.get(0).unwrap_or_default().to_string();
        let columns: Vec<String> = headers.iter().skip(1).map(|h| h.to_string()).collect();

        let mut rows = HashMap::new();
        for (idx, record) in rdr.records().enumerate() {
            let record = record.map_err(|e| config_error(source, e))?;
            let sample_id = record.get(0).unwrap_or_default().to_string();
            if sample_id.is_empty() {
                return Err(config_error(source, format!("row {} has an empty sample ID", idx + 2)));
            }

            let values: Vec<String> = record.iter().skip(1).map(|v| v.to_string()).collect();
            if rows.insert(sample_id.clone(), MetadataRow { values }).is_some() {
                return Err(config_error(source, format!("duplicate sample ID '{}'", sample_id)));
            }
        }

        info!(
            "Loaded metadata for {} samples ({} columns) from {}",
            rows.len(),
            columns.len(),
            source.display()
        );
        Ok(Self { id_column, columns, rows })
    }

    /// Name of the sample ID column (first header field)
    pub fn id_column(&self) -> &str {
        &self.id_column
    }

    /// Metadata columns, excluding the sample ID column
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn get(&self, sample_id: &str) -> Option<&MetadataRow> {
        self.rows.get(sample_id)
    }

    pub fn value(&self, sample_id: &str, column: &str) -> Option<&str> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.get(sample_id)?.values.get(idx).map(|v| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Sample IDs from `samples` that have no metadata row, in input order
    pub fn missing_samples<'a, I>(&self, samples: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        samples
            .into_iter()
            .filter(|s| !self.rows.contains_key(*s))
            .map(|s| s.to_string())
            .collect()
    }
}

/// Empty table whose metadata columns match the join policy
pub fn table_for(metadata: Option<&MetadataTable>, policy: JoinPolicy) -> AbundanceTable {
    match (policy, metadata) {
        (JoinPolicy::Disabled, _) | (_, None) => AbundanceTable::new(Vec::new()),
        (_, Some(meta)) => AbundanceTable::new(meta.columns().to_vec()),
    }
}

/// Join taxon records onto their sample's metadata, appending rows to `table`.
///
/// The join is many-to-one: every record of a sample receives a copy of that
/// sample's metadata row.
pub fn join_records(
    records: Vec<TaxonRecord>,
    metadata: Option<&MetadataTable>,
    policy: JoinPolicy,
    table: &mut AbundanceTable,
) -> Result<JoinReport> {
    let mut report = JoinReport::default();

    let metadata = match (policy, metadata) {
        (JoinPolicy::Disabled, _) => None,
        (_, Some(meta)) => Some(meta),
        (_, None) => {
            return Err(PipelineError::Configuration(
                "metadata join requested without a metadata table".to_string(),
            ))
        }
    };

    for record in records {
        let values = match metadata {
            None => Vec::new(),
            Some(meta) => match meta.get(&record.sample_id) {
                Some(row) => row.values.clone(),
                None if policy == JoinPolicy::Required => {
                    return Err(PipelineError::MissingMetadata {
                        sample: record.sample_id,
                    });
                }
                None => {
                    if report.dropped_samples.insert(record.sample_id.clone()) {
                        warn!("No metadata for sample {}; dropping its records", record.sample_id);
                    }
                    continue;
                }
            },
        };

        table.push(AbundanceRow {
            sample_id: record.sample_id,
            taxon_name: record.taxon_name,
            taxon_id: record.taxon_id,
            kind: record.kind,
            read_count: record.read_count,
            metadata: values,
        });
        report.joined += 1;
    }

    Ok(report)
}

/// Write the discovered sample IDs as a one-column CSV
pub fn write_sample_ids<'a, I>(samples: I, path: &Path) -> Result<()>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["Sample_IDs"])?;
    for sample in samples {
        writer.write_record([sample])?;
    }
    writer.flush().map_err(|e| PipelineError::io(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::report::TaxonKind;

    const META: &str = "SampleID,status,site\ns1,case,gut\ns2,control,lung\n";

    fn load(text: &str) -> Result<MetadataTable> {
        MetadataTable::from_reader(text.as_bytes(), Path::new("meta.csv"))
    }

    fn record(sample: &str, taxon: &str, reads: u64) -> TaxonRecord {
        TaxonRecord {
            sample_id: sample.to_string(),
            taxon_name: taxon.to_string(),
            taxon_id: 7,
            kind: TaxonKind::Virus,
            read_count: reads,
            clade_count: reads,
            percentage: 1.0,
        }
    }

    #[test]
    fn test_load_metadata() {
        let meta = load(META).unwrap();
        assert_eq!(meta.id_column(), "SampleID");
        assert_eq!(meta.columns(), &["status".to_string(), "site".to_string()]);
        assert_eq!(meta.len(), 2);
        assert_eq!(meta.value("s2", "site"), Some("lung"));
        assert_eq!(meta.value("s3", "site"), None);
    }

    #[test]
    fn test_duplicate_and_blank_ids_rejected() {
        let dup = load("id,status\ns1,case\ns1,control\n").unwrap_err();
        assert!(dup.is_fatal());
        assert!(dup.to_string().contains("duplicate sample ID 's1'"));

        assert!(load("id,status\n,case\n").is_err());
        assert!(load("").is_err());
    }

    #[test]
    fn test_ragged_row_rejected() {
        assert!(load("id,status,site\ns1,case\n").is_err());
    }

    #[test]
    fn test_join_many_to_one() {
        let meta = load(META).unwrap();
        let mut table = table_for(Some(&meta), JoinPolicy::Lenient);
        let records = vec![record("s1", "Virus A", 50), record("s1", "Virus B", 20)];

        let report = join_records(records, Some(&meta), JoinPolicy::Lenient, &mut table).unwrap();
        assert_eq!(report.joined, 2);
        assert!(report.dropped_samples.is_empty());
        for row in table.rows() {
            assert_eq!(row.metadata, vec!["case".to_string(), "gut".to_string()]);
        }
    }

    #[test]
    fn test_lenient_join_drops_unknown_sample() {
        let meta = load(META).unwrap();
        let mut table = table_for(Some(&meta), JoinPolicy::Lenient);
        let records = vec![record("s1", "Virus A", 50), record("s9", "Virus A", 20)];

        let report = join_records(records, Some(&meta), JoinPolicy::Lenient, &mut table).unwrap();
        assert_eq!(report.joined, 1);
        assert!(report.dropped_samples.contains("s9"));
        assert_eq!(table.samples().into_iter().collect::<Vec<_>>(), vec!["s1"]);
    }

    #[test]
    fn test_required_join_fails_on_unknown_sample() {
        let meta = load(META).unwrap();
        let mut table = table_for(Some(&meta), JoinPolicy::Required);
        let err = join_records(vec![record("s9", "Virus A", 20)], Some(&meta), JoinPolicy::Required, &mut table)
            .unwrap_err();
        assert!(matches!(err, PipelineError::MissingMetadata { ref sample } if sample == "s9"));
    }

    #[test]
    fn test_disabled_join_has_no_columns() {
        let mut table = table_for(None, JoinPolicy::Disabled);
        let report = join_records(vec![record("s9", "Virus A", 20)], None, JoinPolicy::Disabled, &mut table).unwrap();
        assert_eq!(report.joined, 1);
        assert!(table.metadata_columns().is_empty());
        assert!(table.rows()[0].metadata.is_empty());
    }

    #[test]
    fn test_missing_samples() {
        let meta = load(META).unwrap();
        assert_eq!(meta.missing_samples(["s1", "s3", "s2", "s4"]), vec!["s3", "s4"]);
    }

    #[test]
    fn test_write_sample_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample_ids.csv");
        write_sample_ids(["s1", "s2"], &path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Sample_IDs\ns1\ns2\n");
    }
}
