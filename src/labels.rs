use std::path::Path;

use crate::classifier::ClassifierError;

/// Label order of the bundled MobileNetV2 export. Index `i` is output `i` of the network.
pub const DEFAULT_LABELS: [&str; 13] = [
    "Ayam Goreng",
    "Burger",
    "French Fries",
    "Gado-Gado",
    "Ikan Goreng",
    "Mie Goreng",
    "Nasi Goreng",
    "Nasi Padang",
    "Pizza",
    "Rawon",
    "Rendang",
    "Sate",
    "Soto",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSet {
    labels: Vec<String>,
}

impl LabelSet {
    pub fn new(labels: Vec<String>) -> Result<Self, ClassifierError> {
        if labels.is_empty() {
            return Err(ClassifierError::Labels("label list is empty".to_string()));
        }
        Ok(Self { labels })
    }

    pub fn builtin() -> Self {
        Self {
            labels: DEFAULT_LABELS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Reads one label per line. Blank lines are skipped.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ClassifierError::Labels(format!("cannot read {}: {}", path.display(), e))
        })?;

        Self::new(
            contents
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(String::from)
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }
}

/// Formats a raw label for end users: underscores become spaces and each
/// alphabetic run is title-cased (`nasi_goreng` -> `Nasi Goreng`, `gado-gado` -> `Gado-Gado`).
pub fn display_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_word = false;

    for c in raw.chars() {
        let c = if c == '_' { ' ' } else { c };
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }

    out
}
