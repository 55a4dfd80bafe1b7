use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use rdp_reconcile::amplicon_matrix::AmpliconMatrix;
use rdp_reconcile::classifier::ClassifierInvocation;
use rdp_reconcile::classifier_output::parse_fix_rank;
use rdp_reconcile::context::RunContext;
use rdp_reconcile::params::Params;
use rdp_reconcile::report::ReportWriter;
use rdp_reconcile::types::AttributeMappingObject;
use rdp_reconcile::{annotate_amplicon_matrix, Result};

/// Write RDP Classifier taxonomy into an amplicon matrix's row attribute mapping
#[derive(Parser, Debug)]
#[command(name = "rdp-reconcile", version)]
struct Args {
    /// Run parameters (nested JSON)
    #[arg(long)]
    params: PathBuf,

    /// Amplicon matrix object (JSON)
    #[arg(long)]
    matrix: PathBuf,

    /// Row attribute mapping the matrix references (JSON)
    #[arg(long)]
    attribute_mapping: Option<PathBuf>,

    /// Reference to record on the matrix for the saved attribute mapping
    #[arg(long)]
    attribute_mapping_ref: Option<String>,

    /// Working directory holding (or receiving) the classifier output
    #[arg(long)]
    run_dir: PathBuf,

    /// Classifier jar; when given the classifier is run on --seqs first
    #[arg(long, requires = "seqs")]
    classifier_jar: Option<PathBuf>,

    /// Amplicon sequences (FASTA)
    #[arg(long)]
    seqs: Option<PathBuf>,

    /// Directory with the bundled training sets
    #[arg(long)]
    ref_data_dir: Option<PathBuf>,
}

fn spinner(color: &str, msg: &'static str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
        .template(&format!("{{spinner:.{color}}} {{msg}}"))
    {
        spinner.set_style(style);
    }
    spinner.set_message(msg);
    spinner
}

fn run(args: Args) -> Result<()> {
    // 1. Parameters and inputs
    let sp = spinner("blue", "Loading parameters and amplicon matrix...");
    let mut params = Params::from_json_file(&args.params)?;
    if let Some(dir) = &args.ref_data_dir {
        params = params.with_ref_data_dir(dir);
    }
    log::info!("Parameters:\n{params}");
    fs::create_dir_all(&args.run_dir)?;
    let mut ctx = RunContext::new(&args.run_dir, params);

    let mut amp_mat = AmpliconMatrix::from_json_file(&args.matrix)?;
    let existing: Option<AttributeMappingObject> = match &args.attribute_mapping {
        Some(path) => Some(serde_json::from_str(&fs::read_to_string(path)?)?),
        None => None,
    };
    sp.finish_with_message(format!("Loaded {} amplicons.", amp_mat.row_ids().len()));

    // 2. Classifier
    let mut cmd_lines = Vec::new();
    if let (Some(jar), Some(seqs)) = (&args.classifier_jar, &args.seqs) {
        let sp = spinner("green", "Running RDP Classifier...");
        cmd_lines = ClassifierInvocation::new(jar, seqs).run(&ctx)?;
        sp.finish_with_message("Classification finished.");
    }

    // 3. Reconcile
    let sp = spinner("yellow", "Writing taxonomy into row attribute mapping...");
    let results = annotate_amplicon_matrix(&mut ctx, &amp_mat, existing)?;
    if let Some(upa) = &args.attribute_mapping_ref {
        amp_mat.set_row_attributemapping_ref(upa);
    }
    fs::write(
        ctx.run_dir.join("attribute_mapping.json"),
        serde_json::to_string_pretty(&results.attribute_mapping)?,
    )?;
    fs::write(
        ctx.run_dir.join("amplicon_matrix.json"),
        serde_json::to_string_pretty(&amp_mat.obj)?,
    )?;
    fs::write(ctx.run_dir.join("taxonomy.tsv"), results.get_taxonomy_tsv())?;
    sp.finish_with_message(format!(
        "Taxonomy written to attribute slot {}{}.",
        results.attribute_index,
        if results.overwrite { " (overwritten)" } else { "" }
    ));

    // 4. Report
    let sp = spinner("cyan", "Writing report...");
    let fix_rank = if ctx.out_fix_rank.exists() {
        parse_fix_rank(&ctx.out_fix_rank)?
    } else {
        Vec::new()
    };
    let paths = ReportWriter {
        ctx: &ctx,
        taxonomy: &results.taxonomy,
        fix_rank: &fix_rank,
        short_seqs: &results.short_seqs,
        cmd_lines: &cmd_lines,
    }
    .write()?;
    sp.finish_with_message(format!("Report written ({} files).", paths.len()));

    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
