use crate::io::report::TaxonKind;
use serde::Serialize;
use std::collections::BTreeSet;

/// One (sample, taxon) observation with its joined metadata values
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AbundanceRow {
    pub sample_id: String,
    pub taxon_name: String,
    pub taxon_id: u64,
    pub kind: TaxonKind,
    pub read_count: u64,
    /// Values aligned with the owning table's `metadata_columns`
    pub metadata: Vec<String>,
}

/// Long-form abundance table accumulated across all samples of a run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AbundanceTable {
    metadata_columns: Vec<String>,
    rows: Vec<AbundanceRow>,
}

impl AbundanceTable {
    pub fn new(metadata_columns: Vec<String>) -> Self {
        Self {
            metadata_columns,
            rows: Vec::new(),
        }
    }

    pub fn with_rows(metadata_columns: Vec<String>, rows: Vec<AbundanceRow>) -> Self {
        debug_assert!(rows.iter().all(|r| r.metadata.len() == metadata_columns.len()));
        Self { metadata_columns, rows }
    }

    pub fn push(&mut self, row: AbundanceRow) {
        debug_assert_eq!(row.metadata.len(), self.metadata_columns.len());
        self.rows.push(row);
    }

    pub fn rows(&self) -> &[AbundanceRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<AbundanceRow> {
        self.rows
    }

    pub fn metadata_columns(&self) -> &[String] {
        &self.metadata_columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn retain<F: FnMut(&AbundanceRow) -> bool>(&mut self, f: F) {
        self.rows.retain(f);
    }

    /// Distinct taxon names, sorted
    pub fn taxa(&self) -> BTreeSet<&str> {
        self.rows.iter().map(|r| r.taxon_name.as_str()).collect()
    }

    /// Distinct sample IDs, sorted
    pub fn samples(&self) -> BTreeSet<&str> {
        self.rows.iter().map(|r| r.sample_id.as_str()).collect()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.metadata_columns.iter().position(|c| c == column)
    }

    /// Value of a metadata column for a row of this table
    pub fn metadata_value<'a>(&self, row: &'a AbundanceRow, column: &str) -> Option<&'a str> {
        self.column_index(column)
            .and_then(|idx| row.metadata.get(idx))
            .map(|v| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(sample: &str, taxon: &str, reads: u64, site: &str) -> AbundanceRow {
        AbundanceRow {
            sample_id: sample.to_string(),
            taxon_name: taxon.to_string(),
            taxon_id: 1,
            kind: TaxonKind::Virus,
            read_count: reads,
            metadata: vec![site.to_string()],
        }
    }

    #[test]
    fn test_taxa_and_samples_are_sorted_and_distinct() {
        let mut table = AbundanceTable::new(vec!["site".to_string()]);
        table.push(row("s2", "Virus B", 10, "lung"));
        table.push(row("s1", "Virus A", 5, "gut"));
        table.push(row("s1", "Virus B", 7, "gut"));

        assert_eq!(table.taxa().into_iter().collect::<Vec<_>>(), vec!["Virus A", "Virus B"]);
        assert_eq!(table.samples().into_iter().collect::<Vec<_>>(), vec!["s1", "s2"]);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_metadata_value_lookup() {
        let mut table = AbundanceTable::new(vec!["site".to_string()]);
        table.push(row("s1", "Virus A", 5, "gut"));

        let first = &table.rows()[0];
        assert_eq!(table.metadata_value(first, "site"), Some("gut"));
        assert_eq!(table.metadata_value(first, "age"), None);
    }
}
