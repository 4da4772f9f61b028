//! Label encoding for categorical inputs
//!
//! IDs are positions in the sorted list of distinct training values. Lookups
//! return `Option`; the open-world fallback for values never seen in training
//! is applied by [`encode_or_unseen`].

use crate::features::EncodedCategories;
use crate::models::CategoryField;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// ID assigned to categories absent from the training corpus.
///
/// This collides with the lexically first known class, which is accepted.
pub const UNSEEN_CATEGORY_ID: u32 = 0;

/// Frozen mapping from category string to ID
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryEncoding {
    /// Sorted, deduplicated training values; the index is the ID
    classes: Vec<String>,
}

impl CategoryEncoding {
    /// Learn classes from training values
    pub fn fit<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let distinct: BTreeSet<String> = values
            .into_iter()
            .map(|v| v.as_ref().to_string())
            .collect();
        Self {
            classes: distinct.into_iter().collect(),
        }
    }

    /// ID for a known value
    pub fn id_of(&self, value: &str) -> Option<u32> {
        self.classes
            .binary_search_by(|class| class.as_str().cmp(value))
            .ok()
            .map(|idx| idx as u32)
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Sorted order is what makes IDs reproducible; reject anything else on load
    pub fn is_well_formed(&self) -> bool {
        self.classes.windows(2).all(|w| w[0] < w[1])
    }
}

/// Encode with the unseen-category policy applied
pub fn encode_or_unseen(encoding: &CategoryEncoding, value: &str) -> u32 {
    encoding.id_of(value).unwrap_or(UNSEEN_CATEGORY_ID)
}

/// Fields that fell back to [`UNSEEN_CATEGORY_ID`] for one flight
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnseenFields(Vec<CategoryField>);

impl UnseenFields {
    pub fn fields(&self) -> &[CategoryField] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, field: CategoryField) -> bool {
        self.0.contains(&field)
    }
}

/// One encoder per categorical field
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryEncoders {
    pub airline: CategoryEncoding,
    pub origin: CategoryEncoding,
    pub destination: CategoryEncoding,
}

impl CategoryEncoders {
    pub fn get(&self, field: CategoryField) -> &CategoryEncoding {
        match field {
            CategoryField::Airline => &self.airline,
            CategoryField::Origin => &self.origin,
            CategoryField::Destination => &self.destination,
        }
    }

    /// Encode all three fields, recording which ones were unseen
    pub fn encode(
        &self,
        airline: &str,
        origin: &str,
        destination: &str,
    ) -> (EncodedCategories, UnseenFields) {
        let mut unseen = Vec::new();
        let mut encode_field = |field: CategoryField, value: &str| {
            let id = self.get(field).id_of(value);
            if id.is_none() {
                unseen.push(field);
            }
            id.unwrap_or(UNSEEN_CATEGORY_ID)
        };

        let categories = EncodedCategories {
            airline: encode_field(CategoryField::Airline, airline),
            origin: encode_field(CategoryField::Origin, origin),
            destination: encode_field(CategoryField::Destination, destination),
        };
        (categories, UnseenFields(unseen))
    }

    pub fn is_well_formed(&self) -> bool {
        CategoryField::ALL
            .iter()
            .all(|f| self.get(*f).is_well_formed())
    }
}
