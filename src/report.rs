//src/report.rs

use std::fmt::Write as FmtWrite;
use std::fs;
use std::path::PathBuf;

use crate::context::RunContext;
use crate::error::Result;
use crate::types::{FixRankRecord, TaxonomyTable};

pub const RANK_SUMMARY_FILENAME: &str = "rank_summary.tsv";
pub const CONF_HISTOGRAM_FILENAME: &str = "confidence_histogram.tsv";
pub const HTML_FILENAME: &str = "report.html";

/// Rank names used when the classifier table has no header
pub const DEFAULT_RANKS: [&str; 6] = ["domain", "phylum", "class", "order", "family", "genus"];
const UNCLASSIFIED_PREFIX: &str = "unclassified_";
const NUM_BINS: usize = 10;

/// How many amplicons got a real name at one rank.
#[derive(Debug, Clone, PartialEq)]
pub struct RankSummaryRow {
    pub rank: String,
    pub classified: usize,
    pub unclassified: usize,
}

/// Per-rank histogram of bootstrap confidences, ten 0.1-wide bins.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfHistogramRow {
    pub rank: String,
    pub bins: [usize; NUM_BINS],
}

/// Count named vs `unclassified_*` taxa per rank.
pub fn rank_summary(taxonomy: &TaxonomyTable) -> Vec<RankSummaryRow> {
    let depth = taxonomy.rank_depth();
    let names: Vec<String> = match &taxonomy.ranks {
        Some(r) if r.len() == depth => r.clone(),
        _ => (0..depth)
            .map(|i| {
                DEFAULT_RANKS
                    .get(i)
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| format!("rank{i}"))
            })
            .collect(),
    };

    let mut rows: Vec<RankSummaryRow> = names
        .into_iter()
        .map(|rank| RankSummaryRow {
            rank,
            classified: 0,
            unclassified: 0,
        })
        .collect();

    for (_, tax_str) in taxonomy.iter() {
        for (row, taxon) in rows.iter_mut().zip(tax_str.split(';')) {
            if taxon.is_empty() || taxon.starts_with(UNCLASSIFIED_PREFIX) {
                row.unclassified += 1;
            } else {
                row.classified += 1;
            }
        }
    }
    rows
}

/// Bin fixRank confidences per rank, in the rank order of the first record.
pub fn confidence_histogram(records: &[FixRankRecord]) -> Vec<ConfHistogramRow> {
    let mut rows: Vec<ConfHistogramRow> = match records.first() {
        Some(first) => first
            .assignments
            .iter()
            .map(|a| ConfHistogramRow {
                rank: a.rank.clone(),
                bins: [0; NUM_BINS],
            })
            .collect(),
        None => return Vec::new(),
    };

    for record in records {
        for (row, a) in rows.iter_mut().zip(&record.assignments) {
            let bin = ((a.conf.clamp(0.0, 1.0) * NUM_BINS as f64).floor() as usize).min(NUM_BINS - 1);
            row.bins[bin] += 1;
        }
    }
    rows
}

/// Renders a classification run into the report directory.
pub struct ReportWriter<'a> {
    pub ctx: &'a RunContext,
    pub taxonomy: &'a TaxonomyTable,
    pub fix_rank: &'a [FixRankRecord],
    pub short_seqs: &'a [String],
    /// Command lines that produced the classifier output
    pub cmd_lines: &'a [String],
}

impl<'a> ReportWriter<'a> {
    /// Write the TSV tables and the HTML page. Returns the paths written.
    pub fn write(&self) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(&self.ctx.report_dir)?;

        let summary = rank_summary(self.taxonomy);
        let histogram = confidence_histogram(self.fix_rank);

        let summary_path = self.ctx.report_dir.join(RANK_SUMMARY_FILENAME);
        fs::write(&summary_path, self.rank_summary_text(&summary))?;

        let histogram_path = self.ctx.report_dir.join(CONF_HISTOGRAM_FILENAME);
        fs::write(&histogram_path, self.histogram_text(&histogram))?;

        let html_path = self.ctx.report_dir.join(HTML_FILENAME);
        fs::write(&html_path, self.html(&summary, &histogram))?;

        log::info!("Wrote report to {}", self.ctx.report_dir.display());
        Ok(vec![html_path, summary_path, histogram_path])
    }

    fn rank_summary_text(&self, summary: &[RankSummaryRow]) -> String {
        let mut output = String::new();
        output.push_str("rank\tclassified\tunclassified\n");
        for row in summary {
            let _ = writeln!(output, "{}\t{}\t{}", row.rank, row.classified, row.unclassified);
        }
        if !self.short_seqs.is_empty() {
            let _ = writeln!(output, "too_short\t0\t{}", self.short_seqs.len());
        }
        output
    }

    fn histogram_text(&self, histogram: &[ConfHistogramRow]) -> String {
        let mut output = String::from("rank");
        for i in 0..NUM_BINS {
            let _ = write!(output, "\t[{:.1},{:.1}{}", i as f64 / 10.0, (i + 1) as f64 / 10.0, if i + 1 == NUM_BINS { "]" } else { ")" });
        }
        output.push('\n');
        for row in histogram {
            output.push_str(&row.rank);
            for count in row.bins {
                let _ = write!(output, "\t{count}");
            }
            output.push('\n');
        }
        output
    }

    fn html(&self, summary: &[RankSummaryRow], histogram: &[ConfHistogramRow]) -> String {
        let mut html = String::new();
        html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
        html.push_str("<title>RDP Classifier</title>\n");
        html.push_str("<style>table{border-collapse:collapse}td,th{border:1px solid #ccc;padding:2px 8px}</style>\n");
        html.push_str("</head>\n<body>\n");

        html.push_str("<h2>Parameters</h2>\n<table>\n");
        for (k, v) in self.ctx.params.prose_args() {
            let _ = writeln!(html, "<tr><th>{}</th><td>{}</td></tr>", escape(k), escape(&v));
        }
        html.push_str("</table>\n");

        if !self.cmd_lines.is_empty() {
            html.push_str("<h2>Commands</h2>\n");
            for line in self.cmd_lines {
                let _ = writeln!(html, "<pre>{}</pre>", escape(line));
            }
        }

        if !self.ctx.warnings().is_empty() {
            html.push_str("<h2>Warnings</h2>\n<ul>\n");
            for w in self.ctx.warnings() {
                let _ = writeln!(html, "<li>{}</li>", escape(w));
            }
            html.push_str("</ul>\n");
        }

        let _ = writeln!(
            html,
            "<h2>Taxonomy by rank</h2>\n<p>{} amplicons classified at confidence {}; {} too short to classify.</p>",
            self.taxonomy.len(),
            self.ctx.params.conf(),
            self.short_seqs.len()
        );
        html.push_str("<table>\n<tr><th>rank</th><th>classified</th><th>unclassified</th></tr>\n");
        for row in summary {
            let _ = writeln!(
                html,
                "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape(&row.rank),
                row.classified,
                row.unclassified
            );
        }
        html.push_str("</table>\n");

        if !histogram.is_empty() {
            html.push_str("<h2>Bootstrap confidence</h2>\n<table>\n<tr><th>rank</th>");
            for i in 0..NUM_BINS {
                let _ = write!(html, "<th>{:.1}</th>", i as f64 / 10.0);
            }
            html.push_str("</tr>\n");
            for row in histogram {
                let _ = write!(html, "<tr><td>{}</td>", escape(&row.rank));
                for count in row.bins {
                    let _ = write!(html, "<td>{count}</td>");
                }
                html.push_str("</tr>\n");
            }
            html.push_str("</table>\n");
        }

        html.push_str("</body>\n</html>\n");
        html
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
