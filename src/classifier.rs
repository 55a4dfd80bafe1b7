//src/classifier.rs

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::context::RunContext;
use crate::error::Result;
use crate::run_check::{describe_command, run_check};

pub const DEFAULT_JAVA_HEAP: &str = "15g";

/// The two classifier runs an annotation needs: the confidence-filtered
/// table (plus short-sequence ids) and the fixed-rank table for the report.
pub struct ClassifierInvocation {
    pub jar: PathBuf,
    pub java_heap: String,
    pub seqs_fasta: PathBuf,
}

impl ClassifierInvocation {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(jar: P, seqs_fasta: Q) -> Self {
        Self {
            jar: jar.as_ref().to_path_buf(),
            java_heap: DEFAULT_JAVA_HEAP.to_string(),
            seqs_fasta: seqs_fasta.as_ref().to_path_buf(),
        }
    }

    fn base(&self, ctx: &RunContext) -> Command {
        let mut cmd = Command::new("java");
        cmd.arg(format!("-Xmx{}", self.java_heap))
            .arg("-jar")
            .arg(&self.jar)
            .arg("classify")
            .args(ctx.params.cli_args());
        cmd
    }

    /// `... --format filterbyconf --outputFile <run_dir>/out_filterByConf.tsv --shortseq_outfile ...`
    pub fn filter_by_conf_command(&self, ctx: &RunContext) -> Command {
        let mut cmd = self.base(ctx);
        cmd.arg("--format")
            .arg("filterbyconf")
            .arg("--outputFile")
            .arg(&ctx.out_filter_by_conf)
            .arg("--shortseq_outfile")
            .arg(&ctx.out_short_seq)
            .arg(&self.seqs_fasta);
        cmd
    }

    /// `... --format fixrank --outputFile <run_dir>/out_fixRank.tsv`
    pub fn fix_rank_command(&self, ctx: &RunContext) -> Command {
        let mut cmd = self.base(ctx);
        cmd.arg("--format")
            .arg("fixrank")
            .arg("--outputFile")
            .arg(&ctx.out_fix_rank)
            .arg(&self.seqs_fasta);
        cmd
    }

    /// Run both classifications, stopping at the first failure.
    /// Returns the command lines that were run.
    pub fn run(&self, ctx: &RunContext) -> Result<Vec<String>> {
        let mut cmd_lines = Vec::with_capacity(2);
        for cmd in [self.filter_by_conf_command(ctx), self.fix_rank_command(ctx)] {
            cmd_lines.push(describe_command(&cmd));
            run_check(cmd)?;
        }
        Ok(cmd_lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Params;
    use serde_json::json;

    #[test]
    fn test_commands_carry_cli_args() {
        let params = Params::from_value(&json!({"rdp_clsf": {"gene": "fungallsu", "conf": 0.5}})).unwrap();
        let ctx = RunContext::new("/tmp/run", params);
        let inv = ClassifierInvocation::new("/opt/rdp/classifier.jar", "/tmp/run/seqs.fna");

        let line = describe_command(&inv.filter_by_conf_command(&ctx));
        assert_eq!(
            line,
            "java -Xmx15g -jar /opt/rdp/classifier.jar classify --conf 0.5 --gene fungallsu \
             --format filterbyconf --outputFile /tmp/run/out_filterByConf.tsv \
             --shortseq_outfile /tmp/run/out_shortSeq.txt /tmp/run/seqs.fna"
        );

        let line = describe_command(&inv.fix_rank_command(&ctx));
        assert!(line.contains("--format fixrank --outputFile /tmp/run/out_fixRank.tsv"));
    }

    #[test]
    fn test_default_gene_uses_train_propfile() {
        let ctx = RunContext::new("/tmp/run", Params::default());
        let inv = ClassifierInvocation::new("classifier.jar", "seqs.fna");
        let line = describe_command(&inv.filter_by_conf_command(&ctx));
        assert!(line.contains("--train_propfile /kb/module/data/SILVA_138_SSU_NR_99/rRNAClassifier.properties"));
        assert!(!line.contains("--gene"));
    }
}
