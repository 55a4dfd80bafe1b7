// src/lib.rs
pub mod error;
pub mod types;
pub mod params;
pub mod context;
pub mod classifier_output;
pub mod amplicon_matrix;
pub mod attribute_mapping;
pub mod run_check;
pub mod classifier;
pub mod report;

use std::fmt::Write as FmtWrite;

pub use crate::error::{Error, Result};

use crate::amplicon_matrix::AmpliconMatrix;
use crate::attribute_mapping::AttributeMapping;
use crate::classifier_output::{parse_filter_by_conf, parse_short_seqs};
use crate::context::RunContext;
use crate::types::{AttributeMappingObject, TaxonomyTable};

/// Source recorded on the taxonomy attribute
pub const TAXONOMY_ATTRIBUTE_SOURCE: &str = "kb_rdp_classifier/run_classify";

/// Outcome of writing one classification run into a row attribute mapping.
pub struct AnnotationResults {
    /// Parsed confidence-filtered taxonomy, in classifier output order
    pub taxonomy: TaxonomyTable,
    /// Ids the classifier skipped as too short
    pub short_seqs: Vec<String>,
    /// The reconciled mapping, ready to be saved
    pub attribute_mapping: AttributeMappingObject,
    /// Canonical row order the mapping was reconciled against
    pub row_ids: Vec<String>,
    pub attribute_index: usize,
    pub overwrite: bool,
}

impl AnnotationResults {
    /// `id\ttaxonomy` per matrix row, empty where nothing was assigned.
    pub fn get_taxonomy_tsv(&self) -> String {
        let mut output = String::new();
        for id in &self.row_ids {
            let tax_str = self
                .attribute_mapping
                .instances
                .get(id)
                .and_then(|values| values.get(self.attribute_index))
                .map(String::as_str)
                .unwrap_or_default();
            let _ = writeln!(output, "{id}\t{tax_str}");
        }
        output
    }
}

/// Parse the classifier output named in `ctx` and write it into the row
/// attribute mapping of `amp_mat`.
///
/// `existing` is the object behind `amp_mat.row_attributemapping_ref()`,
/// or `None` to start a new mapping. A matrix that references a mapping
/// which was not supplied is rejected rather than given a fresh one.
pub fn annotate_amplicon_matrix(
    ctx: &mut RunContext,
    amp_mat: &AmpliconMatrix,
    existing: Option<AttributeMappingObject>,
) -> Result<AnnotationResults> {
    if let (None, Some(upa)) = (&existing, amp_mat.row_attributemapping_ref()) {
        return Err(Error::ReconciliationConsistency(format!(
            "matrix references row attribute mapping {upa} but it was not supplied"
        )));
    }

    // 1. Classifier output
    let taxonomy = parse_filter_by_conf(&ctx.out_filter_by_conf)?;
    let short_seqs = parse_short_seqs(&ctx.out_short_seq)?;
    if !short_seqs.is_empty() {
        ctx.warn(format!(
            "{} sequences were too short to classify",
            short_seqs.len()
        ));
    }

    // 2. Attach to the matrix rows
    let mut attr_map = AttributeMapping::new(amp_mat.row_attributemapping_ref(), existing, amp_mat)?;

    // 3. Find or make the slot
    let attribute = ctx.params.taxonomy_attribute_name();
    let (attribute_index, overwrite) =
        attr_map.get_add_attribute_slot(&attribute, TAXONOMY_ATTRIBUTE_SOURCE)?;
    if overwrite {
        ctx.warn(format!(
            "Overwriting attribute `{attribute}` in row AttributeMapping {}",
            attr_map.upa.as_deref().unwrap_or("")
        ));
    }

    // 4. Write the taxonomy
    attr_map.update_attribute(attribute_index, &taxonomy.to_map())?;

    let unassigned = amp_mat
        .row_ids()
        .iter()
        .filter(|id| !taxonomy.contains(id))
        .count();
    log::info!(
        "Wrote taxonomy for {} of {} rows into slot {attribute_index}",
        amp_mat.row_ids().len() - unassigned,
        amp_mat.row_ids().len()
    );

    Ok(AnnotationResults {
        taxonomy,
        short_seqs,
        attribute_mapping: attr_map.into_object(),
        row_ids: amp_mat.row_ids().to_vec(),
        attribute_index,
        overwrite,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Params;
    use std::fs;
    use std::path::{Path, PathBuf};

    fn testdata(rel: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata").join(rel)
    }

    fn run_dir_with_output() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::copy(
            testdata("dummy10by8/out_filterByConf.tsv"),
            dir.path().join(context::FILTER_BY_CONF_FILENAME),
        )
        .unwrap();
        dir
    }

    fn load_existing(path: &Path) -> AttributeMappingObject {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn test_annotate_fresh_mapping() {
        let dir = run_dir_with_output();
        let mut ctx = RunContext::new(dir.path(), Params::default());
        let amp_mat = AmpliconMatrix::from_json_file(testdata("dummy10by8/AmpMat_noRowAttrMap.json")).unwrap();

        let results = annotate_amplicon_matrix(&mut ctx, &amp_mat, None).unwrap();

        assert_eq!(results.attribute_index, 0);
        assert!(!results.overwrite);
        assert!(ctx.warnings().is_empty());
        assert_eq!(
            results.attribute_mapping.attributes[0].name,
            "RDP Classifier taxonomy, conf=0.8, gene=silva_138_ssu, minWords=default"
        );
        assert_eq!(
            results.attribute_mapping.instances["amplicon_id_9"][0],
            "Bacteria;Proteobacteria;Gammaproteobacteria;Legionellales;Coxiellaceae;Aquicella;"
        );

        let tsv = results.get_taxonomy_tsv();
        assert_eq!(tsv.lines().count(), 10);
        assert!(tsv.starts_with("amplicon_id_0\tBacteria;Proteobacteria;"));
    }

    #[test]
    fn test_annotate_twice_overwrites() {
        let dir = run_dir_with_output();
        let amp_mat = AmpliconMatrix::from_json_file(testdata("dummy10by8/AmpMat_wRowAttrMap.json")).unwrap();
        let existing = load_existing(&testdata("dummy10by8/AttrMap_1_4_1.json"));

        let mut ctx = RunContext::new(dir.path(), Params::default());
        let first = annotate_amplicon_matrix(&mut ctx, &amp_mat, Some(existing)).unwrap();
        assert_eq!(first.attribute_index, 2);
        assert!(!first.overwrite);

        let mut ctx = RunContext::new(dir.path(), Params::default());
        let second = annotate_amplicon_matrix(&mut ctx, &amp_mat, Some(first.attribute_mapping.clone())).unwrap();
        assert_eq!(second.attribute_index, 2);
        assert!(second.overwrite);
        assert_eq!(ctx.warnings().len(), 1);
        assert_eq!(second.attribute_mapping, first.attribute_mapping);
    }

    #[test]
    fn test_annotate_requires_referenced_mapping() {
        let dir = run_dir_with_output();
        let mut ctx = RunContext::new(dir.path(), Params::default());
        let amp_mat = AmpliconMatrix::from_json_file(testdata("dummy10by8/AmpMat_wRowAttrMap.json")).unwrap();

        assert!(matches!(
            annotate_amplicon_matrix(&mut ctx, &amp_mat, None),
            Err(Error::ReconciliationConsistency(_))
        ));
    }

    #[test]
    fn test_annotate_rejects_unknown_ids() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(context::FILTER_BY_CONF_FILENAME),
            "amplicon_id_0\tBacteria\nstranger\tArchaea\n",
        )
        .unwrap();
        let mut ctx = RunContext::new(dir.path(), Params::default());
        let amp_mat = AmpliconMatrix::from_json_file(testdata("dummy10by8/AmpMat_noRowAttrMap.json")).unwrap();

        assert!(matches!(
            annotate_amplicon_matrix(&mut ctx, &amp_mat, None),
            Err(Error::ReconciliationConsistency(_))
        ));
    }
}
