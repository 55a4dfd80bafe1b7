//src/context.rs

use std::path::{Path, PathBuf};

use crate::params::Params;

pub const FILTER_BY_CONF_FILENAME: &str = "out_filterByConf.tsv";
pub const FIX_RANK_FILENAME: &str = "out_fixRank.tsv";
pub const SHORT_SEQ_FILENAME: &str = "out_shortSeq.txt";
pub const REPORT_DIRNAME: &str = "report";

/// Everything one run needs to know about where things live, plus the
/// validated parameters. Built once and handed to each component.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_dir: PathBuf,
    pub params: Params,
    pub out_filter_by_conf: PathBuf,
    pub out_fix_rank: PathBuf,
    pub out_short_seq: PathBuf,
    pub report_dir: PathBuf,
    warnings: Vec<String>,
}

impl RunContext {
    /// Lay out the standard classifier output paths under `run_dir`.
    pub fn new<P: AsRef<Path>>(run_dir: P, params: Params) -> Self {
        let run_dir = run_dir.as_ref().to_path_buf();
        Self {
            out_filter_by_conf: run_dir.join(FILTER_BY_CONF_FILENAME),
            out_fix_rank: run_dir.join(FIX_RANK_FILENAME),
            out_short_seq: run_dir.join(SHORT_SEQ_FILENAME),
            report_dir: run_dir.join(REPORT_DIRNAME),
            run_dir,
            params,
            warnings: Vec::new(),
        }
    }

    /// Record something the user should see in the report, and log it.
    pub fn warn(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        log::warn!("{msg}");
        self.warnings.push(msg);
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}
