use crate::abundance::TopNSelection;
use crate::error::{PipelineError, Result};
use ndarray::Array2;
use plotters::coord::Shift;
use plotters::prelude::*;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

/// Image format of the abundance plot
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum PlotFormat {
    Png,
    Svg,
}

impl PlotFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            PlotFormat::Png => "png",
            PlotFormat::Svg => "svg",
        }
    }

    /// Format implied by a file extension, defaulting to PNG
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("svg") => PlotFormat::Svg,
            _ => PlotFormat::Png,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlotOptions {
    pub title: String,
    /// Plot percentages of each bar instead of read counts
    pub relative: bool,
    pub size: (u32, u32),
}

impl Default for PlotOptions {
    fn default() -> Self {
        Self {
            title: "Taxon abundance".to_string(),
            relative: false,
            size: (1280, 800),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlotOutcome {
    Rendered { bars: usize, taxa: usize },
    /// Nothing was selected; a placeholder image was written
    Empty,
}

/// Bar heights: one row per bar (sample or group), one column per taxon
#[derive(Debug, Clone, PartialEq)]
pub struct StackedBars {
    pub bars: Vec<String>,
    pub taxa: Vec<String>,
    pub values: Array2<f64>,
}

impl StackedBars {
    /// Height of the tallest bar
    pub fn max_total(&self) -> f64 {
        self.values
            .rows()
            .into_iter()
            .map(|row| row.sum())
            .fold(0.0, f64::max)
    }
}

/// Arrange a selection into stacked bars.
///
/// Bars are samples, or the distinct values of `group_by` when given; both are
/// sorted. Taxa keep their ranking order so the legend reads best first.
pub fn build_stacks(selection: &TopNSelection, group_by: Option<&str>, relative: bool) -> Result<StackedBars> {
    let table = &selection.table;
    let taxa: Vec<String> = selection.ranking.iter().map(|t| t.taxon_name.clone()).collect();
    let taxon_idx: BTreeMap<&str, usize> = taxa.iter().enumerate().map(|(i, t)| (t.as_str(), i)).collect();

    if let Some(column) = group_by {
        if table.column_index(column).is_none() {
            return Err(PipelineError::Configuration(format!(
                "group-by column '{}' is not in the metadata",
                column
            )));
        }
    }

    let mut sums: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for row in table.rows() {
        let bar = match group_by {
            Some(column) => table.metadata_value(row, column).unwrap_or_default().to_string(),
            None => row.sample_id.clone(),
        };
        let col = match taxon_idx.get(row.taxon_name.as_str()) {
            Some(&col) => col,
            None => continue,
        };
        sums.entry(bar).or_insert_with(|| vec![0.0; taxa.len()])[col] += row.read_count as f64;
    }

    let mut values = Array2::<f64>::zeros((sums.len(), taxa.len()));
    let mut bars = Vec::with_capacity(sums.len());
    for (i, (bar, counts)) in sums.into_iter().enumerate() {
        let total: f64 = counts.iter().sum();
        for (j, count) in counts.into_iter().enumerate() {
            values[[i, j]] = if relative && total > 0.0 {
                100.0 * count / total
            } else {
                count
            };
        }
        bars.push(bar);
    }

    Ok(StackedBars { bars, taxa, values })
}

fn plot_err<E: std::fmt::Display>(e: E) -> PipelineError {
    PipelineError::Plot(e.to_string())
}

fn draw_empty<DB: DrawingBackend>(root: &DrawingArea<DB, Shift>, opts: &PlotOptions) -> Result<()> {
    root.fill(&WHITE).map_err(plot_err)?;
    let (w, h) = root.dim_in_pixel();
    root.draw(&Text::new(
        format!("{}: no data", opts.title),
        (w as i32 / 3, h as i32 / 2),
        ("sans-serif", 30).into_font(),
    ))
    .map_err(plot_err)?;
    Ok(())
}

fn draw_stacks<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    stacks: &StackedBars,
    opts: &PlotOptions,
) -> Result<()> {
    root.fill(&WHITE).map_err(plot_err)?;

    let n_bars = stacks.bars.len();
    let y_max = if opts.relative {
        100.0
    } else {
        (stacks.max_total() * 1.05).max(1.0)
    };

    let mut chart = ChartBuilder::on(root)
        .caption(&opts.title, ("sans-serif", 28))
        .margin(20)
        .x_label_area_size(120)
        .y_label_area_size(70)
        .build_cartesian_2d((0..n_bars).into_segmented(), 0f64..y_max)
        .map_err(plot_err)?;

    let bars = &stacks.bars;
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(n_bars)
        .x_label_formatter(&|x| match x {
            SegmentValue::CenterOf(i) => bars.get(*i).cloned().unwrap_or_default(),
            _ => String::new(),
        })
        .x_label_style(("sans-serif", 12).into_font().transform(FontTransform::Rotate90))
        .y_desc(if opts.relative { "Relative abundance (%)" } else { "Reads" })
        .draw()
        .map_err(plot_err)?;

    let mut base = vec![0.0f64; n_bars];
    for (j, taxon) in stacks.taxa.iter().enumerate() {
        let color = Palette99::pick(j).to_rgba();
        let mut rects = Vec::with_capacity(n_bars);
        for (i, bottom) in base.iter_mut().enumerate() {
            let height = stacks.values[[i, j]];
            if height > 0.0 {
                rects.push(Rectangle::new(
                    [(SegmentValue::Exact(i), *bottom), (SegmentValue::Exact(i + 1), *bottom + height)],
                    color.filled(),
                ));
            }
            *bottom += height;
        }

        chart
            .draw_series(rects)
            .map_err(plot_err)?
            .label(taxon.clone())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .position(SeriesLabelPosition::UpperRight)
        .draw()
        .map_err(plot_err)?;

    Ok(())
}

fn draw_to<DB: DrawingBackend>(root: DrawingArea<DB, Shift>, stacks: &StackedBars, opts: &PlotOptions) -> Result<()> {
    if stacks.taxa.is_empty() || stacks.bars.is_empty() {
        draw_empty(&root, opts)?;
    } else {
        draw_stacks(&root, stacks, opts)?;
    }
    root.present().map_err(plot_err)
}

/// Render the selection as a stacked bar chart at `output`.
///
/// PNG or SVG is chosen from the file extension. An empty selection writes a
/// "no data" image and reports `PlotOutcome::Empty`.
pub fn render_abundance_plot(
    selection: &TopNSelection,
    group_by: Option<&str>,
    opts: &PlotOptions,
    output: &Path,
) -> Result<PlotOutcome> {
    let stacks = build_stacks(selection, group_by, opts.relative)?;

    match PlotFormat::from_path(output) {
        PlotFormat::Png => draw_to(BitMapBackend::new(output, opts.size).into_drawing_area(), &stacks, opts)?,
        PlotFormat::Svg => draw_to(SVGBackend::new(output, opts.size).into_drawing_area(), &stacks, opts)?,
    }

    if stacks.taxa.is_empty() || stacks.bars.is_empty() {
        warn!("No taxa selected; wrote empty plot to {}", output.display());
        Ok(PlotOutcome::Empty)
    } else {
        info!(
            "Abundance plot with {} bars and {} taxa saved to {}",
            stacks.bars.len(),
            stacks.taxa.len(),
            output.display()
        );
        Ok(PlotOutcome::Rendered {
            bars: stacks.bars.len(),
            taxa: stacks.taxa.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abundance::{select_top_n, AbundanceRow, AbundanceTable, ScoreMode};
    use crate::io::report::TaxonKind;

    fn row(sample: &str, taxon: &str, reads: u64, status: &str) -> AbundanceRow {
        AbundanceRow {
            sample_id: sample.to_string(),
            taxon_name: taxon.to_string(),
            taxon_id: 0,
            kind: TaxonKind::Virus,
            read_count: reads,
            metadata: vec![status.to_string()],
        }
    }

    fn selection() -> TopNSelection {
        let table = AbundanceTable::with_rows(
            vec!["status".to_string()],
            vec![
                row("s1", "Virus A", 50, "case"),
                row("s2", "Virus A", 70, "control"),
                row("s1", "Virus B", 30, "case"),
                row("s3", "Virus B", 10, "case"),
            ],
        );
        select_top_n(table, None, ScoreMode::Sum)
    }

    #[test]
    fn test_stacks_per_sample() {
        let stacks = build_stacks(&selection(), None, false).unwrap();
        assert_eq!(stacks.bars, vec!["s1", "s2", "s3"]);
        assert_eq!(stacks.taxa, vec!["Virus A", "Virus B"]);
        assert_eq!(stacks.values[[0, 0]], 50.0);
        assert_eq!(stacks.values[[0, 1]], 30.0);
        assert_eq!(stacks.values[[2, 0]], 0.0);
        assert_eq!(stacks.max_total(), 80.0);
    }

    #[test]
    fn test_stacks_grouped_by_metadata() {
        let stacks = build_stacks(&selection(), Some("status"), false).unwrap();
        assert_eq!(stacks.bars, vec!["case", "control"]);
        assert_eq!(stacks.values[[0, 0]], 50.0);
        assert_eq!(stacks.values[[0, 1]], 40.0);
        assert_eq!(stacks.values[[1, 0]], 70.0);
    }

    #[test]
    fn test_relative_stacks_sum_to_100() {
        let stacks = build_stacks(&selection(), Some("status"), true).unwrap();
        for row in stacks.values.rows() {
            assert!((row.sum() - 100.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_unknown_group_column() {
        let err = build_stacks(&selection(), Some("site"), false).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_empty_selection_has_no_bars() {
        let empty = select_top_n(AbundanceTable::new(Vec::new()), Some(3), ScoreMode::Sum);
        let stacks = build_stacks(&empty, None, false).unwrap();
        assert!(stacks.bars.is_empty());
        assert!(stacks.taxa.is_empty());
        assert_eq!(stacks.max_total(), 0.0);
    }

    #[test]
    fn test_render_png_and_svg() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["virus_abundance.png", "virus_abundance.svg"] {
            let path = dir.path().join(name);
            let outcome = render_abundance_plot(&selection(), None, &PlotOptions::default(), &path).unwrap();
            assert_eq!(outcome, PlotOutcome::Rendered { bars: 3, taxa: 2 });
            assert!(std::fs::metadata(&path).unwrap().len() > 0);
        }
    }

    #[test]
    fn test_render_grouped_relative() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grouped.svg");
        let opts = PlotOptions {
            relative: true,
            ..PlotOptions::default()
        };
        let outcome = render_abundance_plot(&selection(), Some("status"), &opts, &path).unwrap();
        assert_eq!(outcome, PlotOutcome::Rendered { bars: 2, taxa: 2 });
        assert!(path.is_file());
    }

    #[test]
    fn test_render_empty_selection_writes_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["empty.png", "empty.svg"] {
            let path = dir.path().join(name);
            let empty = select_top_n(AbundanceTable::new(Vec::new()), Some(3), ScoreMode::Sum);
            let outcome = render_abundance_plot(&empty, None, &PlotOptions::default(), &path).unwrap();
            assert_eq!(outcome, PlotOutcome::Empty);
            assert!(std::fs::metadata(&path).unwrap().len() > 0);
        }
        let svg = std::fs::read_to_string(dir.path().join("empty.svg")).unwrap();
        assert!(svg.contains("no data"));
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(PlotFormat::from_path(Path::new("out/virus_abundance.svg")), PlotFormat::Svg);
        assert_eq!(PlotFormat::from_path(Path::new("out/virus_abundance.png")), PlotFormat::Png);
        assert_eq!(PlotFormat::from_path(Path::new("out/virus_abundance")), PlotFormat::Png);
    }
}
