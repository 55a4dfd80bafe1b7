//src/attribute_mapping.rs

use std::path::Path;

use ahash::{AHashMap, AHashSet};

use crate::amplicon_matrix::AmpliconMatrix;
use crate::error::{Error, Result};
use crate::types::{AttributeDescriptor, AttributeMappingObject};

/// Value a row holds in a slot nobody has written yet
pub const PLACEHOLDER: &str = "";
pub const FRESH_ONTOLOGY_MAPPING_METHOD: &str = "User curation";

/// A row attribute mapping kept in lockstep with an amplicon matrix.
///
/// Invariants, checked after every mutation:
///  - every instance vector is as long as `attributes`
///  - once instances exist, their key set is exactly the matrix row ids
pub struct AttributeMapping {
    /// Reference of the object this was loaded from, `None` if fresh
    pub upa: Option<String>,
    obj: AttributeMappingObject,
    row_ids: Vec<String>,
    row_set: AHashSet<String>,
}

impl AttributeMapping {
    /// Attach `existing` (the object behind the matrix's
    /// `row_attributemapping_ref`) or start a fresh mapping if there is none.
    pub fn new(
        upa: Option<&str>,
        existing: Option<AttributeMappingObject>,
        amp_mat: &AmpliconMatrix,
    ) -> Result<Self> {
        let row_ids = amp_mat.row_ids().to_vec();
        let row_set: AHashSet<String> = row_ids.iter().cloned().collect();

        let obj = match existing {
            Some(obj) => {
                // An empty instance table is filled in on first slot allocation
                if !obj.instances.is_empty()
                    && (obj.instances.len() != row_set.len()
                        || obj.instances.keys().any(|id| !row_set.contains(id)))
                {
                    return Err(Error::ReconciliationConsistency(format!(
                        "attribute mapping rows ({}) do not match matrix rows ({})",
                        obj.instances.len(),
                        row_set.len()
                    )));
                }
                obj
            }
            None => AttributeMappingObject {
                ontology_mapping_method: Some(FRESH_ONTOLOGY_MAPPING_METHOD.to_string()),
                ..Default::default()
            },
        };

        let attr_map = Self {
            upa: upa.map(str::to_string),
            obj,
            row_ids,
            row_set,
        };
        attr_map.check_invariants()?;

        log::info!(
            "Attribute mapping {} with {} attributes over {} rows",
            attr_map.upa.as_deref().unwrap_or("<new>"),
            attr_map.obj.attributes.len(),
            attr_map.row_ids.len()
        );
        Ok(attr_map)
    }

    /// Load the mapping the matrix references from a JSON dump of it.
    pub fn from_json_file<P: AsRef<Path>>(path: P, amp_mat: &AmpliconMatrix) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        let obj: AttributeMappingObject = serde_json::from_str(&s)?;
        Self::new(amp_mat.row_attributemapping_ref(), Some(obj), amp_mat)
    }

    /// Find the slot for `(name, source)` or append a new one.
    ///
    /// Returns `(index, overwrite)`, where `overwrite` is true when an existing
    /// slot was found. A new slot starts as a placeholder in every row.
    pub fn get_add_attribute_slot(&mut self, name: &str, source: &str) -> Result<(usize, bool)> {
        // First attribute on a fresh mapping: one row per matrix row
        if self.obj.instances.is_empty() {
            let width = self.obj.attributes.len();
            for id in &self.row_ids {
                self.obj
                    .instances
                    .insert(id.clone(), vec![PLACEHOLDER.to_string(); width]);
            }
        }

        if let Some(index) = self
            .obj
            .attributes
            .iter()
            .position(|a| a.name == name && a.source == source)
        {
            log::debug!("Reusing slot {index} for ({name}, {source})");
            return Ok((index, true));
        }

        let index = self.obj.attributes.len();
        self.obj.attributes.push(AttributeDescriptor::new(name, source));
        for values in self.obj.instances.values_mut() {
            values.push(PLACEHOLDER.to_string());
        }
        log::debug!("Added slot {index} for ({name}, {source})");

        self.check_invariants()?;
        Ok((index, false))
    }

    /// Write `id_to_value` into slot `index`.
    ///
    /// Rows missing from `id_to_value` keep what they had. An id that is not
    /// a matrix row fails the whole call before anything is written.
    pub fn update_attribute(
        &mut self,
        index: usize,
        id_to_value: &AHashMap<String, String>,
    ) -> Result<()> {
        if index >= self.obj.attributes.len() {
            return Err(Error::ReconciliationConsistency(format!(
                "slot {index} does not exist ({} attributes)",
                self.obj.attributes.len()
            )));
        }
        if let Some(stray) = id_to_value.keys().find(|id| !self.row_set.contains(*id)) {
            return Err(Error::ReconciliationConsistency(format!(
                "`{stray}` is not a row of the amplicon matrix"
            )));
        }

        let mut written = 0usize;
        for id in &self.row_ids {
            let Some(value) = id_to_value.get(id) else {
                continue;
            };
            let values = self.obj.instances.get_mut(id).ok_or_else(|| {
                Error::ReconciliationConsistency(format!("row `{id}` has no instance"))
            })?;
            values[index] = value.clone();
            written += 1;
        }
        log::debug!(
            "Wrote {written} of {} rows into slot {index}",
            self.row_ids.len()
        );

        self.check_invariants()
    }

    /// Verify row identity and vector lengths.
    pub fn check_invariants(&self) -> Result<()> {
        let width = self.obj.attributes.len();
        if !self.obj.instances.is_empty() && self.obj.instances.len() != self.row_ids.len() {
            return Err(Error::ReconciliationConsistency(format!(
                "{} instances for {} matrix rows",
                self.obj.instances.len(),
                self.row_ids.len()
            )));
        }
        for (id, values) in &self.obj.instances {
            if !self.row_set.contains(id) {
                return Err(Error::ReconciliationConsistency(format!(
                    "instance `{id}` is not a matrix row"
                )));
            }
            if values.len() != width {
                return Err(Error::ReconciliationConsistency(format!(
                    "instance `{id}` has {} values for {width} attributes",
                    values.len()
                )));
            }
        }
        Ok(())
    }

    pub fn attributes(&self) -> &[AttributeDescriptor] {
        &self.obj.attributes
    }

    pub fn obj(&self) -> &AttributeMappingObject {
        &self.obj
    }

    /// Hand the object back for saving.
    pub fn into_object(self) -> AttributeMappingObject {
        self.obj
    }
}
