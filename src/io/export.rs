use crate::abundance::{AbundanceTable, TaxonScore};
use crate::error::{PipelineError, Result};
use serde::Serialize;
use std::fs::File;
use std::path::Path;

/// Write the long-form abundance table as CSV:
/// `sample_id, taxon_name, read_count, <metadata columns...>`
pub fn write_abundance_csv(table: &AbundanceTable, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;

    let mut header = vec!["sample_id", "taxon_name", "read_count"];
    header.extend(table.metadata_columns().iter().map(|c| c.as_str()));
    writer.write_record(&header)?;

    for row in table.rows() {
        let read_count = row.read_count.to_string();
        let mut record = vec![row.sample_id.as_str(), row.taxon_name.as_str(), read_count.as_str()];
        record.extend(row.metadata.iter().map(|v| v.as_str()));
        writer.write_record(&record)?;
    }

    writer.flush().map_err(|e| PipelineError::io(path, e))?;
    Ok(())
}

#[derive(Serialize)]
struct TaxonTotalRecord<'a> {
    rank: usize,
    taxon_name: &'a str,
    score: u64,
    samples: usize,
}

/// Write the ranked per-taxon scores as CSV
pub fn write_taxon_totals(ranking: &[TaxonScore], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for (i, taxon) in ranking.iter().enumerate() {
        writer.serialize(TaxonTotalRecord {
            rank: i + 1,
            taxon_name: &taxon.taxon_name,
            score: taxon.score,
            samples: taxon.samples,
        })?;
    }
    writer.flush().map_err(|e| PipelineError::io(path, e))?;
    Ok(())
}

/// Write any serializable value as pretty JSON
pub fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let file = File::create(path).map_err(|e| PipelineError::io(path, e))?;
    serde_json::to_writer_pretty(file, value)
        .map_err(|e| PipelineError::io(path, std::io::Error::from(e)))?;
    Ok(())
}
