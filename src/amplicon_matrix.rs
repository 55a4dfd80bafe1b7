//src/amplicon_matrix.rs

use std::path::Path;

use ahash::AHashSet;

use crate::error::{Error, Result};
use crate::types::AmpliconMatrixObject;

/// Read-only view of an amplicon matrix: the canonical row order and the
/// reference of the row attribute mapping attached to it, if any.
#[derive(Debug, Clone)]
pub struct AmpliconMatrix {
    pub obj: AmpliconMatrixObject,
}

impl AmpliconMatrix {
    /// Wrap a matrix object, rejecting duplicate or empty row ids since
    /// they would break the 1:1 row/instance pairing.
    pub fn new(obj: AmpliconMatrixObject) -> Result<Self> {
        let mut seen = AHashSet::with_capacity(obj.data.row_ids.len());
        for id in &obj.data.row_ids {
            if id.is_empty() {
                return Err(Error::ReconciliationConsistency(
                    "matrix has an empty row id".to_string(),
                ));
            }
            if !seen.insert(id.as_str()) {
                return Err(Error::ReconciliationConsistency(format!(
                    "matrix row id `{id}` appears more than once"
                )));
            }
        }
        if !obj.data.values.is_empty() && obj.data.values.len() != obj.data.row_ids.len() {
            return Err(Error::ReconciliationConsistency(format!(
                "matrix has {} rows of values for {} row ids",
                obj.data.values.len(),
                obj.data.row_ids.len()
            )));
        }
        log::info!(
            "Loaded amplicon matrix with {} rows, {} columns",
            obj.data.row_ids.len(),
            obj.data.col_ids.len()
        );
        Ok(Self { obj })
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Self::new(serde_json::from_str(&s)?)
    }

    /// Canonical row order
    pub fn row_ids(&self) -> &[String] {
        &self.obj.data.row_ids
    }

    pub fn row_attributemapping_ref(&self) -> Option<&str> {
        self.obj.row_attributemapping_ref.as_deref()
    }

    /// Point the matrix at a (newly saved) row attribute mapping.
    pub fn set_row_attributemapping_ref(&mut self, upa: &str) {
        self.obj.row_attributemapping_ref = Some(upa.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MatrixData;
    use std::path::PathBuf;

    fn testdata(rel: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata").join(rel)
    }

    #[test]
    fn test_load_with_and_without_attribute_mapping() {
        let with = AmpliconMatrix::from_json_file(testdata("dummy10by8/AmpMat_wRowAttrMap.json")).unwrap();
        assert_eq!(with.row_ids().len(), 10);
        assert_eq!(with.row_ids()[0], "amplicon_id_0");
        assert_eq!(with.row_attributemapping_ref(), Some("1/4/1"));

        let without = AmpliconMatrix::from_json_file(testdata("dummy10by8/AmpMat_noRowAttrMap.json")).unwrap();
        assert_eq!(without.row_attributemapping_ref(), None);
        // untouched fields survive
        assert!(without.obj.extra.contains_key("amplicon_set_ref"));
    }

    #[test]
    fn test_duplicate_row_ids_rejected() {
        let obj = AmpliconMatrixObject {
            data: MatrixData {
                row_ids: vec!["a".to_string(), "b".to_string(), "a".to_string()],
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            AmpliconMatrix::new(obj),
            Err(Error::ReconciliationConsistency(_))
        ));
    }
}
