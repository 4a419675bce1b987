use crate::abundance::table::{AbundanceRow, AbundanceTable};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info};

/// How a taxon's per-sample read counts are combined into its ranking score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ScoreMode {
    /// Sum of read counts across samples
    #[default]
    Sum,
    /// Largest read count in any single sample
    Max,
}

/// Aggregate score of one taxon
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaxonScore {
    pub taxon_name: String,
    pub score: u64,
    /// Number of samples the taxon was observed in
    pub samples: usize,
}

/// Rows of the N best taxa, plus the ranking that selected them
#[derive(Debug, Clone, PartialEq)]
pub struct TopNSelection {
    pub table: AbundanceTable,
    /// Selected taxa, best first
    pub ranking: Vec<TaxonScore>,
    /// Distinct taxa seen before selection
    pub total_taxa: usize,
}

impl TopNSelection {
    pub fn is_empty(&self) -> bool {
        self.ranking.is_empty()
    }

    pub fn taxa(&self) -> Vec<&str> {
        self.ranking.iter().map(|t| t.taxon_name.as_str()).collect()
    }
}

/// Drop every row whose read count is below `min_reads`
pub fn apply_threshold(mut table: AbundanceTable, min_reads: u64) -> AbundanceTable {
    let before = table.len();
    table.retain(|row| row.read_count >= min_reads);
    debug!(
        "Read-count threshold {} kept {} of {} rows",
        min_reads,
        table.len(),
        before
    );
    table
}

/// Per-taxon scores, sorted best first with ties broken by name
pub fn score_taxa(table: &AbundanceTable, mode: ScoreMode) -> Vec<TaxonScore> {
    let mut acc: BTreeMap<&str, (u64, BTreeSet<&str>)> = BTreeMap::new();
    for row in table.rows() {
        let entry = acc.entry(row.taxon_name.as_str()).or_default();
        entry.0 = match mode {
            ScoreMode::Sum => entry.0.saturating_add(row.read_count),
            ScoreMode::Max => entry.0.max(row.read_count),
        };
        entry.1.insert(row.sample_id.as_str());
    }

    let mut scores: Vec<TaxonScore> = acc
        .into_iter()
        .map(|(name, (score, samples))| TaxonScore {
            taxon_name: name.to_string(),
            score,
            samples: samples.len(),
        })
        .collect();
    scores.sort_by(compare_scores);
    scores
}

fn compare_scores(a: &TaxonScore, b: &TaxonScore) -> Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| a.taxon_name.cmp(&b.taxon_name))
}

/// Keep all rows of the `top_n` highest-scoring taxa.
///
/// `None` keeps every taxon. N larger than the number of distinct taxa keeps
/// them all. Output rows are ordered by taxon rank, then sample ID, so two runs
/// over the same input produce identical tables.
pub fn select_top_n(table: AbundanceTable, top_n: Option<usize>, mode: ScoreMode) -> TopNSelection {
    let mut ranking = score_taxa(&table, mode);
    let total_taxa = ranking.len();

    if let Some(n) = top_n {
        if n < ranking.len() {
            ranking.truncate(n);
        } else {
            debug!("top-N of {} covers all {} taxa", n, ranking.len());
        }
    }

    let rank_of: HashMap<&str, usize> = ranking
        .iter()
        .enumerate()
        .map(|(i, t)| (t.taxon_name.as_str(), i))
        .collect();

    let columns = table.metadata_columns().to_vec();
    let mut rows: Vec<(usize, AbundanceRow)> = Vec::new();
    for row in table.into_rows() {
        if let Some(&rank) = rank_of.get(row.taxon_name.as_str()) {
            rows.push((rank, row));
        }
    }
    rows.sort_by(|(ra, a), (rb, b)| ra.cmp(rb).then_with(|| a.sample_id.cmp(&b.sample_id)));

    info!(
        "Selected {} of {} taxa ({} rows)",
        ranking.len(),
        total_taxa,
        rows.len()
    );

    TopNSelection {
        table: AbundanceTable::with_rows(columns, rows.into_iter().map(|(_, r)| r).collect()),
        ranking,
        total_taxa,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::report::TaxonKind;

    fn row(sample: &str, taxon: &str, reads: u64) -> AbundanceRow {
        AbundanceRow {
            sample_id: sample.to_string(),
            taxon_name: taxon.to_string(),
            taxon_id: 0,
            kind: TaxonKind::Virus,
            read_count: reads,
            metadata: Vec::new(),
        }
    }

    fn table(rows: Vec<AbundanceRow>) -> AbundanceTable {
        AbundanceTable::with_rows(Vec::new(), rows)
    }

    #[test]
    fn test_threshold_removes_low_counts() {
        let t = table(vec![row("s1", "A", 9), row("s1", "B", 10), row("s2", "A", 11)]);
        let kept = apply_threshold(t, 10);
        assert_eq!(kept.len(), 2);
        assert!(kept.rows().iter().all(|r| r.read_count >= 10));
    }

    #[test]
    fn test_two_samples_same_taxon_sum_score() {
        let t = table(vec![
            row("s1", "Virus A", 50),
            row("s2", "Virus A", 70),
            row("s1", "Virus B", 40),
            row("s2", "Virus C", 5),
        ]);
        let t = apply_threshold(t, 10);
        let sel = select_top_n(t, Some(1), ScoreMode::Sum);

        assert_eq!(sel.taxa(), vec!["Virus A"]);
        assert_eq!(sel.ranking[0].score, 120);
        assert_eq!(sel.ranking[0].samples, 2);
        let samples: Vec<&str> = sel.table.rows().iter().map(|r| r.sample_id.as_str()).collect();
        assert_eq!(samples, vec!["s1", "s2"]);
    }

    #[test]
    fn test_samples_counted_once_per_taxon() {
        let t = table(vec![row("s1", "Virus A", 20), row("s1", "Virus A", 30), row("s2", "Virus A", 5)]);
        let scores = score_taxa(&t, ScoreMode::Sum);
        assert_eq!(scores[0].score, 55);
        assert_eq!(scores[0].samples, 2);
    }

    #[test]
    fn test_max_score_mode() {
        let t = table(vec![
            row("s1", "Virus A", 50),
            row("s2", "Virus A", 70),
            row("s1", "Virus B", 100),
        ]);
        let sel = select_top_n(t, Some(1), ScoreMode::Max);
        assert_eq!(sel.taxa(), vec!["Virus B"]);
        assert_eq!(sel.ranking[0].score, 100);
    }

    #[test]
    fn test_ties_broken_by_name() {
        let t = table(vec![row("s1", "Zeta", 30), row("s1", "Alpha", 30), row("s1", "Mu", 30)]);
        let sel = select_top_n(t, Some(2), ScoreMode::Sum);
        assert_eq!(sel.taxa(), vec!["Alpha", "Mu"]);
    }

    #[test]
    fn test_top_n_larger_than_taxa_keeps_all() {
        let t = table(vec![row("s1", "A", 3), row("s2", "B", 4)]);
        let sel = select_top_n(t, Some(10), ScoreMode::Sum);
        assert_eq!(sel.ranking.len(), 2);
        assert_eq!(sel.total_taxa, 2);
        assert_eq!(sel.table.len(), 2);
    }

    #[test]
    fn test_no_limit_keeps_all_ranked() {
        let t = table(vec![row("s1", "A", 3), row("s2", "B", 4), row("s3", "A", 2)]);
        let sel = select_top_n(t, None, ScoreMode::Sum);
        assert_eq!(sel.taxa(), vec!["A", "B"]);
        let order: Vec<(&str, &str)> = sel
            .table
            .rows()
            .iter()
            .map(|r| (r.taxon_name.as_str(), r.sample_id.as_str()))
            .collect();
        assert_eq!(order, vec![("A", "s1"), ("A", "s3"), ("B", "s2")]);
    }

    #[test]
    fn test_selected_taxa_dominate_unselected() {
        let mut rows = Vec::new();
        for s in 0..6u64 {
            for t in 0..9u64 {
                let reads = (s * 31 + t * 17) % 23;
                rows.push(row(&format!("s{}", s), &format!("T{}", t), reads));
            }
        }
        let all = score_taxa(&table(rows.clone()), ScoreMode::Sum);

        for n in 1..=10 {
            let sel = select_top_n(table(rows.clone()), Some(n), ScoreMode::Sum);
            assert_eq!(sel.ranking.len(), n.min(all.len()));
            let lowest = sel.ranking.last().unwrap().score;
            for other in all.iter().filter(|t| !sel.taxa().contains(&t.taxon_name.as_str())) {
                assert!(other.score <= lowest);
            }
            let kept = apply_threshold(sel.table, 0);
            assert!(kept.rows().iter().all(|r| sel.ranking.iter().any(|t| t.taxon_name == r.taxon_name)));
        }
    }

    #[test]
    fn test_empty_table() {
        let sel = select_top_n(table(Vec::new()), Some(5), ScoreMode::Sum);
        assert!(sel.is_empty());
        assert!(sel.table.is_empty());
    }
}
