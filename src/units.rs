use serde::{Deserialize, Serialize};
use thiserror::Error;
use unicase::UniCase;

/// Arithmetic base applied per step of a unit table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Base {
    #[default]
    Binary,
    Decimal,
}

impl Base {
    pub fn step(self) -> f64 {
        match self {
            Base::Binary => 1024.0,
            Base::Decimal => 1000.0,
        }
    }

    /// `step ^ index`, as a float so large tables do not overflow.
    pub fn multiplier(self, index: usize) -> f64 {
        self.step().powi(index as i32)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum UnitTableError {
    #[error("unit table is empty")]
    Empty,
    #[error("unit label at position {0} is blank")]
    Blank(usize),
    #[error("duplicate unit label {0:?}")]
    Duplicate(String),
}

/// Ordered list of unit labels, smallest magnitude first.
///
/// The position of a label is the power of the base it stands for, so `KB`
/// at index 1 means `base^1`. Lookups ignore case.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(into = "Vec<String>")]
pub struct UnitTable {
    labels: Vec<String>,
}

impl UnitTable {
    pub fn new<I, S>(labels: I) -> Result<Self, UnitTableError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels
            .into_iter()
            .map(|label| label.into().trim().to_owned())
            .collect();

        if labels.is_empty() {
            return Err(UnitTableError::Empty);
        }

        for (idx, label) in labels.iter().enumerate() {
            if label.is_empty() {
                return Err(UnitTableError::Blank(idx));
            }

            let key = UniCase::new(label.as_str());
            if labels[..idx].iter().any(|seen| UniCase::new(seen.as_str()) == key) {
                return Err(UnitTableError::Duplicate(label.clone()));
            }
        }

        Ok(UnitTable { labels })
    }

    /// B, KB, MB, GB, TB, PB
    pub fn binary() -> Self {
        Self::from_static(&["B", "KB", "MB", "GB", "TB", "PB"])
    }

    /// B, KiB, MiB, GiB, TiB, PiB
    pub fn iec() -> Self {
        Self::from_static(&["B", "KiB", "MiB", "GiB", "TiB", "PiB"])
    }

    /// O, KO, MO, GO, TO, PO (octets)
    pub fn french() -> Self {
        Self::from_static(&["O", "KO", "MO", "GO", "TO", "PO"])
    }

    fn from_static(labels: &[&str]) -> Self {
        UnitTable {
            labels: labels.iter().map(|&label| label.to_owned()).collect(),
        }
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        let key = UniCase::new(label.trim());
        self.labels
            .iter()
            .position(|candidate| UniCase::new(candidate.as_str()) == key)
    }

    pub fn label(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl Default for UnitTable {
    fn default() -> Self {
        UnitTable::binary()
    }
}

impl From<UnitTable> for Vec<String> {
    fn from(table: UnitTable) -> Self {
        table.labels
    }
}

impl<'de> Deserialize<'de> for UnitTable {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let labels: Vec<String> = Deserialize::deserialize(deserializer)?;
        UnitTable::new(labels).map_err(serde::de::Error::custom)
    }
}
