//src/params.rs

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::error::{Error, Result};

pub const DEFAULT_CONF: f64 = 0.8;
pub const DEFAULT_GENE: &str = "silva_138_ssu";
/// Training sets the classifier knows about
pub const GENES: [&str; 5] = [
    "silva_138_ssu",
    "16srrna",
    "fungallsu",
    "fungalits_warcup",
    "fungalits_unite",
];
/// Where bundled reference data lives inside the app image
pub const DEFAULT_REF_DATA_DIR: &str = "/kb/module/data";
/// Properties file of the bundled default training set, relative to the ref data dir
pub const DEFAULT_TRAIN_PROPFILE: &str = "SILVA_138_SSU_NR_99/rRNAClassifier.properties";

/// Value shown in prose for leaves the user left unset
pub const PROSE_DEFAULT: &str = "default";

const TOP_LEVEL_KEYS: [&str; 4] = ["workspace_id", "workspace_name", "amp_mat_upa", "output_name"];
const CLASSIFIER_GROUP: &str = "rdp_clsf";
const CLASSIFIER_KEYS: [&str; 3] = ["gene", "conf", "minWords"];

/// Validated run parameters.
///
/// Built from the nested JSON the app receives, e.g.
/// ```text
/// {"amp_mat_upa": "1/2/3", "output_name": null,
///  "rdp_clsf": {"gene": "silva_138_ssu", "conf": 0.8, "minWords": null}}
/// ```
/// `null` always means "not set", so the accessors fall back to defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Params {
    workspace_id: Option<i64>,
    workspace_name: Option<String>,
    amp_mat_upa: Option<String>,
    output_name: Option<String>,
    gene: Option<String>,
    /// Value plus its JSON rendering (`1.0` stays `1.0`, `1` stays `1`)
    conf: Option<(f64, String)>,
    min_words: Option<u64>,
    ref_data_dir: PathBuf,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            workspace_id: None,
            workspace_name: None,
            amp_mat_upa: None,
            output_name: None,
            gene: None,
            conf: None,
            min_words: None,
            ref_data_dir: PathBuf::from(DEFAULT_REF_DATA_DIR),
        }
    }
}

impl Params {
    /// Validate and type a nested parameter object.
    pub fn from_value(value: &Value) -> Result<Self> {
        let map = match value {
            Value::Object(map) => map,
            Value::Null => return Ok(Self::default()),
            other => {
                return Err(Error::InvalidValue {
                    key: "<root>".to_string(),
                    reason: format!("expected an object, got `{other}`"),
                })
            }
        };

        validate(map)?;
        let flat = flatten_checked(map)?;

        Ok(Self {
            workspace_id: get_int(&flat, "workspace_id")?,
            workspace_name: get_str(&flat, "workspace_name")?,
            amp_mat_upa: get_str(&flat, "amp_mat_upa")?,
            output_name: get_str(&flat, "output_name")?,
            gene: get_gene(&flat)?,
            conf: get_conf(&flat)?,
            min_words: get_min_words(&flat)?,
            ref_data_dir: PathBuf::from(DEFAULT_REF_DATA_DIR),
        })
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(s)?;
        Self::from_value(&value)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Self::from_json_str(&s)
    }

    /// Point the default training-set path at another reference data directory.
    pub fn with_ref_data_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.ref_data_dir = dir.into();
        self
    }

    pub fn workspace_id(&self) -> Option<i64> {
        self.workspace_id
    }

    pub fn workspace_name(&self) -> Option<&str> {
        self.workspace_name.as_deref()
    }

    pub fn amp_mat_upa(&self) -> Option<&str> {
        self.amp_mat_upa.as_deref()
    }

    pub fn output_name(&self) -> Option<&str> {
        self.output_name.as_deref()
    }

    pub fn gene(&self) -> &str {
        self.gene.as_deref().unwrap_or(DEFAULT_GENE)
    }

    pub fn conf(&self) -> f64 {
        self.conf.as_ref().map(|(c, _)| *c).unwrap_or(DEFAULT_CONF)
    }

    /// `conf` as it was written in the parameters
    fn conf_text(&self) -> String {
        self.conf
            .as_ref()
            .map(|(_, text)| text.clone())
            .unwrap_or_else(|| DEFAULT_CONF.to_string())
    }

    pub fn min_words(&self) -> Option<u64> {
        self.min_words
    }

    pub fn ref_data_dir(&self) -> &Path {
        &self.ref_data_dir
    }

    /// Classifier settings as display strings, `"default"` where unset.
    pub fn prose_args(&self) -> BTreeMap<&'static str, String> {
        let mut prose = BTreeMap::new();
        prose.insert("conf", self.conf_text());
        prose.insert("gene", self.gene().to_string());
        prose.insert(
            "minWords",
            self.min_words
                .map(|m| m.to_string())
                .unwrap_or_else(|| PROSE_DEFAULT.to_string()),
        );
        prose
    }

    /// Classifier flags. Only values that differ from the classifier's own
    /// defaults are passed; the default training set is not built into the
    /// classifier, so it is given as `--train_propfile <bundled path>` instead
    /// of `--gene`.
    pub fn cli_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.conf() != DEFAULT_CONF {
            args.push("--conf".to_string());
            args.push(self.conf_text());
        }
        let default_gene = self.gene() == DEFAULT_GENE;
        if !default_gene {
            args.push("--gene".to_string());
            args.push(self.gene().to_string());
        }
        if let Some(m) = self.min_words {
            args.push("--minWords".to_string());
            args.push(m.to_string());
        }
        if default_gene {
            args.push("--train_propfile".to_string());
            args.push(
                self.ref_data_dir
                    .join(DEFAULT_TRAIN_PROPFILE)
                    .to_string_lossy()
                    .into_owned(),
            );
        }
        args
    }

    /// Name of the row attribute the taxonomy is written under
    pub fn taxonomy_attribute_name(&self) -> String {
        let prose = self.prose_args();
        format!(
            "RDP Classifier taxonomy, conf={}, gene={}, minWords={}",
            prose["conf"], prose["gene"], prose["minWords"]
        )
    }
}

impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let opt = |s: Option<&str>| s.unwrap_or("-").to_string();
        writeln!(f, "workspace_id:   {}", self.workspace_id.map(|i| i.to_string()).unwrap_or_else(|| "-".to_string()))?;
        writeln!(f, "workspace_name: {}", opt(self.workspace_name()))?;
        writeln!(f, "amp_mat_upa:    {}", opt(self.amp_mat_upa()))?;
        writeln!(f, "output_name:    {}", opt(self.output_name()))?;
        for (k, v) in self.prose_args() {
            writeln!(f, "{k}: {v}")?;
        }
        write!(f, "cli_args: {}", self.cli_args().join(" "))
    }
}

/// Collapse nested objects into one level keyed by leaf name.
/// Later leaves win on collision; see `flatten_checked` for the strict form.
pub fn flatten(map: &Map<String, Value>) -> Map<String, Value> {
    let mut flat = Map::new();
    for (k, v) in map {
        match v {
            Value::Object(inner) => flat.extend(flatten(inner)),
            _ => {
                flat.insert(k.clone(), v.clone());
            }
        }
    }
    flat
}

fn flatten_checked(map: &Map<String, Value>) -> Result<Map<String, Value>> {
    fn walk(map: &Map<String, Value>, flat: &mut Map<String, Value>) -> Result<()> {
        for (k, v) in map {
            match v {
                Value::Object(inner) => walk(inner, flat)?,
                // null means unset, so it never collides with a real value
                Value::Null => {
                    if !flat.contains_key(k) {
                        flat.insert(k.clone(), Value::Null);
                    }
                }
                _ => {
                    if flat.insert(k.clone(), v.clone()).is_some_and(|prev| !prev.is_null()) {
                        return Err(Error::InvalidValue {
                            key: k.clone(),
                            reason: "given more than once".to_string(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
    let mut flat = Map::new();
    walk(map, &mut flat)?;
    Ok(flat)
}

/// Every key, top level or nested, must be recognized. Catches misspellings.
fn validate(map: &Map<String, Value>) -> Result<()> {
    for (k, v) in map {
        let key = k.as_str();
        if key == CLASSIFIER_GROUP {
            match v {
                Value::Object(group) => {
                    for (gk, gv) in group {
                        if !CLASSIFIER_KEYS.contains(&gk.as_str()) {
                            return Err(Error::ConfigValidation { key: gk.clone() });
                        }
                        reject_object(gk, gv)?;
                    }
                }
                Value::Null => {}
                _ => {
                    return Err(Error::InvalidValue {
                        key: k.clone(),
                        reason: "expected a group of classifier settings".to_string(),
                    })
                }
            }
        } else if TOP_LEVEL_KEYS.contains(&key) || CLASSIFIER_KEYS.contains(&key) {
            reject_object(k, v)?;
        } else {
            return Err(Error::ConfigValidation { key: k.clone() });
        }
    }
    Ok(())
}

fn reject_object(key: &str, v: &Value) -> Result<()> {
    if v.is_object() {
        return Err(Error::InvalidValue {
            key: key.to_string(),
            reason: "expected a plain value, got an object".to_string(),
        });
    }
    Ok(())
}

fn invalid(key: &str, reason: impl Into<String>) -> Error {
    Error::InvalidValue {
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn get_str(flat: &Map<String, Value>, key: &str) -> Result<Option<String>> {
    match flat.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(invalid(key, format!("expected a string, got `{other}`"))),
    }
}

fn get_int(flat: &Map<String, Value>, key: &str) -> Result<Option<i64>> {
    match flat.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| invalid(key, format!("expected an integer, got `{v}`"))),
    }
}

fn get_gene(flat: &Map<String, Value>) -> Result<Option<String>> {
    let gene = get_str(flat, "gene")?;
    if let Some(g) = &gene {
        if !GENES.contains(&g.as_str()) {
            return Err(invalid(
                "gene",
                format!("`{g}` is not one of {}", GENES.join(", ")),
            ));
        }
    }
    Ok(gene)
}

fn get_conf(flat: &Map<String, Value>) -> Result<Option<(f64, String)>> {
    match flat.get("conf") {
        None | Some(Value::Null) => Ok(None),
        Some(v) => {
            let conf = v
                .as_f64()
                .ok_or_else(|| invalid("conf", format!("expected a number, got `{v}`")))?;
            if !(0.0..=1.0).contains(&conf) {
                return Err(invalid("conf", format!("{conf} is outside [0, 1]")));
            }
            Ok(Some((conf, v.to_string())))
        }
    }
}

fn get_min_words(flat: &Map<String, Value>) -> Result<Option<u64>> {
    match flat.get("minWords") {
        None | Some(Value::Null) => Ok(None),
        Some(v) => match v.as_u64() {
            Some(m) if m > 0 => Ok(Some(m)),
            _ => Err(invalid("minWords", format!("expected a positive integer, got `{v}`"))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_spots_misspelling() {
        let ok = json!({
            "workspace_id": null,
            "workspace_name": null,
            "amp_mat_upa": null,
            "rdp_clsf": {"gene": null, "conf": null},
            "output_name": null,
        });
        Params::from_value(&ok).unwrap();

        let bad = json!({
            "workspace_id": null,
            "workspace_name": null,
            "amp_mat_upa": null,
            "rdp_clsf": {"gene": null, "conf": null},
            "outptu_name": null,
        });
        match Params::from_value(&bad) {
            Err(Error::ConfigValidation { key }) => assert_eq!(key, "outptu_name"),
            other => panic!("expected ConfigValidation, got {other:?}"),
        }

        let bad_nested = json!({"rdp_clsf": {"minwords": 3}});
        match Params::from_value(&bad_nested) {
            Err(Error::ConfigValidation { key }) => assert_eq!(key, "minwords"),
            other => panic!("expected ConfigValidation, got {other:?}"),
        }
    }

    #[test]
    fn test_flatten() {
        let d = json!({
            "key0": "hat",
            "key1": "bat",
            "nest0": {"key2": "cat", "key3": "sat"},
            "key4": "chat",
            "nest1": {"key5": "gnat"},
            "key6": "mat",
        });
        let flat = flatten(d.as_object().unwrap());

        assert_eq!(flat.len(), 7);
        assert!((0..7).all(|i| flat.contains_key(&format!("key{i}"))));
        assert!((0..2).all(|i| !flat.contains_key(&format!("nest{i}"))));
        assert_eq!(flat["key5"], "gnat");
    }

    #[test]
    fn test_defaults() {
        let params = Params::from_value(&json!({
            "amp_mat_upa": "1/2/3",
            "output_name": null,
            "rdp_clsf": {"conf": 0.8, "gene": "silva_138_ssu", "minWords": null},
        }))
        .unwrap();

        assert_eq!(params.amp_mat_upa(), Some("1/2/3"));
        assert_eq!(params.output_name(), None);
        assert_eq!(params.conf(), 0.8);
        assert_eq!(params.gene(), "silva_138_ssu");
        assert_eq!(params.min_words(), None);

        let prose = params.prose_args();
        assert_eq!(prose["conf"], "0.8");
        assert_eq!(prose["gene"], "silva_138_ssu");
        assert_eq!(prose["minWords"], "default");

        assert_eq!(
            params.cli_args(),
            vec![
                "--train_propfile",
                "/kb/module/data/SILVA_138_SSU_NR_99/rRNAClassifier.properties"
            ]
        );
        let _ = params.to_string();
    }

    #[test]
    fn test_non_default() {
        let params = Params::from_value(&json!({
            "amp_mat_upa": "5/5/5",
            "output_name": "my_ampset",
            "rdp_clsf": {"conf": 0.99999, "gene": "fungallsu", "minWords": 100},
        }))
        .unwrap();

        assert_eq!(params.amp_mat_upa(), Some("5/5/5"));
        assert_eq!(params.output_name(), Some("my_ampset"));
        assert_eq!(params.conf(), 0.99999);
        assert_eq!(params.gene(), "fungallsu");
        assert_eq!(params.min_words(), Some(100));

        let prose = params.prose_args();
        assert_eq!(prose["conf"], "0.99999");
        assert_eq!(prose["gene"], "fungallsu");
        assert_eq!(prose["minWords"], "100");

        assert_eq!(
            params.cli_args(),
            vec!["--conf", "0.99999", "--gene", "fungallsu", "--minWords", "100"]
        );
        let _ = params.to_string();
    }

    #[test]
    fn test_no_user_supplied_values() {
        let params = Params::from_value(&json!({"amp_mat_upa": "6/6/6"})).unwrap();

        assert_eq!(params.amp_mat_upa(), Some("6/6/6"));
        assert_eq!(params.output_name(), None);
        assert_eq!(params.conf(), 0.8);
        assert_eq!(params.gene(), "silva_138_ssu");
        assert_eq!(params.min_words(), None);
        assert_eq!(params.prose_args()["minWords"], "default");
        assert_eq!(params.cli_args().len(), 2);
        assert_eq!(params.cli_args()[0], "--train_propfile");
    }

    #[test]
    fn test_top_level_leaf_and_ref_dir() {
        let params = Params::from_value(&json!({"conf": 0.7777}))
            .unwrap()
            .with_ref_data_dir("/data/ref");
        assert_eq!(params.conf(), 0.7777);
        assert_eq!(
            params.cli_args(),
            vec![
                "--conf",
                "0.7777",
                "--train_propfile",
                "/data/ref/SILVA_138_SSU_NR_99/rRNAClassifier.properties"
            ]
        );
    }

    #[test]
    fn test_value_validation() {
        assert!(matches!(
            Params::from_value(&json!({"rdp_clsf": {"conf": 1.5}})),
            Err(Error::InvalidValue { .. })
        ));
        assert!(matches!(
            Params::from_value(&json!({"rdp_clsf": {"gene": "18s"}})),
            Err(Error::InvalidValue { .. })
        ));
        assert!(matches!(
            Params::from_value(&json!({"rdp_clsf": {"minWords": -1}})),
            Err(Error::InvalidValue { .. })
        ));
        assert!(matches!(
            Params::from_value(&json!({"conf": 0.5, "rdp_clsf": {"conf": 0.6}})),
            Err(Error::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_null_leaf_does_not_collide() {
        let params = Params::from_value(&json!({"conf": null, "rdp_clsf": {"conf": 0.5}})).unwrap();
        assert_eq!(params.conf(), 0.5);

        let params = Params::from_value(&json!({"rdp_clsf": {"conf": 0.5}, "conf": null})).unwrap();
        assert_eq!(params.conf(), 0.5);
    }

    #[test]
    fn test_conf_keeps_json_rendering() {
        let params = Params::from_value(&json!({"rdp_clsf": {"conf": 1.0}})).unwrap();
        assert_eq!(params.prose_args()["conf"], "1.0");
        assert_eq!(params.cli_args()[..2], ["--conf", "1.0"]);
        assert_eq!(
            params.taxonomy_attribute_name(),
            "RDP Classifier taxonomy, conf=1.0, gene=silva_138_ssu, minWords=default"
        );

        let params = Params::from_value(&json!({"rdp_clsf": {"conf": 1}})).unwrap();
        assert_eq!(params.prose_args()["conf"], "1");
        assert_eq!(params.conf(), 1.0);
    }

    #[test]
    fn test_taxonomy_attribute_name() {
        let params = Params::from_value(&json!({"rdp_clsf": {"gene": "16srrna"}})).unwrap();
        assert_eq!(
            params.taxonomy_attribute_name(),
            "RDP Classifier taxonomy, conf=0.8, gene=16srrna, minWords=default"
        );
    }
}
