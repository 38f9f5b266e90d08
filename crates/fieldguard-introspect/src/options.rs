use serde::{Deserialize, Serialize};

/// Options that control how sources and types are introspected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntrospectOptions {
    /// Method names that register a handler (`map_post("/todo", handler)`).
    pub mapping_methods: Vec<String>,
    /// Method that enables validation on a registration.
    pub marker_method: String,
    /// Attribute carrying validation constraints.
    pub attribute: String,
    /// Handler parameter wrappers unwrapped to their single type argument.
    pub extractor_wrappers: Vec<String>,
    /// Single-argument collection types traversed element-wise.
    pub sequence_types: Vec<String>,
    /// Optional wrappers, transparent for validation.
    pub optional_types: Vec<String>,
    /// Owning pointer wrappers, transparent for validation.
    pub pointer_types: Vec<String>,
    /// Keyed collections; never traversed.
    pub map_types: Vec<String>,
}

impl Default for IntrospectOptions {
    fn default() -> Self {
        Self {
            mapping_methods: strings(&["map_get", "map_post", "map_put", "map_delete", "map_patch", "map"]),
            marker_method: "with_validation".to_string(),
            attribute: "validate".to_string(),
            extractor_wrappers: strings(&["Json", "Path", "Query", "Form"]),
            sequence_types: strings(&[
                "Vec",
                "VecDeque",
                "HashSet",
                "BTreeSet",
                "LinkedList",
                "BinaryHeap",
                "[]",
            ]),
            optional_types: strings(&["Option"]),
            pointer_types: strings(&["Box", "Arc", "Rc"]),
            map_types: strings(&["HashMap", "BTreeMap", "IndexMap"]),
        }
    }
}

impl IntrospectOptions {
    pub fn is_mapping_method(&self, name: &str) -> bool {
        self.mapping_methods.iter().any(|method| method == name)
    }

    pub fn is_extractor(&self, name: &str) -> bool {
        self.extractor_wrappers.iter().any(|wrapper| wrapper == name)
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}
