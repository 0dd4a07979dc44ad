use crate::error::{MushguardError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Placeholder reported when a label has no advisory entry.
pub const UNKNOWN_ADVISORY: &str = "Unknown";

/// Storage advice for one species.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advisory {
    pub lifespan: String,
    pub preservation: String,
}

impl Advisory {
    pub fn new(lifespan: &str, preservation: &str) -> Self {
        Self {
            lifespan: lifespan.to_string(),
            preservation: preservation.to_string(),
        }
    }

    pub fn unknown() -> Self {
        Self::new(UNKNOWN_ADVISORY, UNKNOWN_ADVISORY)
    }
}

/// Each record in the CSV file
#[derive(Debug, Deserialize)]
struct SpeciesRecord {
    label: String,
    #[serde(default)]
    lifespan: String,
    #[serde(default)]
    preservation: String,
}

#[rustfmt::skip]
const BUILTIN_SPECIES: [(&str, &str, &str); 5] = [
    (
        "Apioperdon_pyriforme",
        "Room temp. 12hours after harvest. The mushroom is edible when its interior is completely white. Once the spores inside become yellow or the interior turns tan to brown, the mushroom should not be eaten.",
        "refrigerated 3-5 days.",
    ),
    (
        "Cerioporus_squamosus",
        "4hours room temp after harvest",
        "1 week refrigerated. Pheasant back mushrooms can be frozen. It is generally recommended to cook them first, such as by steaming or sautéing, as this helps maintain a better texture upon thawing.",
    ),
    (
        "Coprinellus_micaceus",
        "1-2 days room temp after harvest",
        "refrigerated 3-5 days.",
    ),
    (
        "Coprinus_comatus",
        "24 hours (dissolves quickly)",
        "less than 3 days room temp after harvest; 10 days refrigerated, 18 days with treatment; 2 years properly sealed and dried.",
    ),
    (
        "lactarius_torminosus",
        "1-2 days room temp after harvest",
        "refrigerated 3-7 days.",
    ),
];

/// Species labels in the species model's class order, with optional advice per label.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeciesTable {
    entries: IndexMap<String, Option<Advisory>>,
}

impl Default for SpeciesTable {
    /// The five species the deployed species model was trained on.
    fn default() -> Self {
        let entries = BUILTIN_SPECIES
            .iter()
            .map(|(label, lifespan, preservation)| {
                (label.to_string(), Some(Advisory::new(lifespan, preservation)))
            })
            .collect();
        Self { entries }
    }
}

impl SpeciesTable {
    /// Builds a table from labels in class order and advice keyed by label.
    ///
    /// Advice for labels that are not in `labels` is ignored.
    pub fn new<I, S>(labels: I, advisories: impl IntoIterator<Item = (String, Advisory)>) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut entries = IndexMap::new();
        for label in labels {
            let label = label.into();
            if entries.insert(label.clone(), None).is_some() {
                return Err(MushguardError::SpeciesTable(format!("duplicate label: {label}")));
            }
        }
        for (label, advisory) in advisories {
            if let Some(slot) = entries.get_mut(&label) {
                *slot = Some(advisory);
            }
        }
        if entries.is_empty() {
            return Err(MushguardError::SpeciesTable("no species labels".to_string()));
        }
        Ok(Self { entries })
    }

    /// Load from the local CSV file (`label,lifespan,preservation`, rows in class order).
    ///
    /// A row whose advisory columns are both empty declares a label without advice.
    pub fn load<P: AsRef<Path>>(csv_path: P) -> Result<Self> {
        let mut reader = csv::Reader::from_path(csv_path.as_ref())?;
        let mut labels = Vec::new();
        let mut advisories = Vec::new();

        for record in reader.deserialize() {
            let record: SpeciesRecord = record?;
            if !record.lifespan.is_empty() || !record.preservation.is_empty() {
                advisories.push((
                    record.label.clone(),
                    Advisory::new(&record.lifespan, &record.preservation),
                ));
            }
            labels.push(record.label);
        }

        Self::new(labels, advisories)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Label of the class at `index`.
    pub fn label(&self, index: usize) -> Option<&str> {
        self.entries.get_index(index).map(|(label, _)| label.as_str())
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Advice for `label`, or the `Unknown` placeholder.
    pub fn advisory(&self, label: &str) -> Advisory {
        self.entries
            .get(label)
            .and_then(Option::clone)
            .unwrap_or_else(Advisory::unknown)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_builtin_order() {
        let table = SpeciesTable::default();
        assert_eq!(table.len(), 5);
        assert_eq!(table.label(0), Some("Apioperdon_pyriforme"));
        assert_eq!(table.label(2), Some("Coprinellus_micaceus"));
        assert_eq!(table.label(4), Some("lactarius_torminosus"));
        assert_eq!(table.label(5), None);
        assert_eq!(
            table.advisory("Coprinus_comatus").lifespan,
            "24 hours (dissolves quickly)"
        );
    }

    #[test]
    fn test_unknown_advisory() {
        let table = SpeciesTable::new(
            ["Morchella_esculenta", "Cantharellus_cibarius"],
            [(
                "Cantharellus_cibarius".to_string(),
                Advisory::new("2 days", "dry"),
            )],
        )
        .unwrap();
        assert_eq!(table.advisory("Morchella_esculenta"), Advisory::unknown());
        assert_eq!(table.advisory("not_a_label"), Advisory::unknown());
        assert_eq!(table.advisory("Cantharellus_cibarius").preservation, "dry");
    }

    #[test]
    fn test_rejects_duplicates_and_empty() {
        assert!(SpeciesTable::new(["a", "a"], []).is_err());
        assert!(SpeciesTable::new(Vec::<String>::new(), []).is_err());
    }

    #[test]
    fn test_load_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("species.csv");
        fs::write(
            &path,
            "label,lifespan,preservation\n\
             Boletus_edulis,\"2 days, cool\",dried for months\n\
             Hydnum_repandum,,\n",
        )
        .unwrap();

        let table = SpeciesTable::load(&path).unwrap();
        assert_eq!(table.labels().collect::<Vec<_>>(), ["Boletus_edulis", "Hydnum_repandum"]);
        assert_eq!(table.advisory("Boletus_edulis").lifespan, "2 days, cool");
        assert_eq!(table.advisory("Hydnum_repandum"), Advisory::unknown());
    }
}
