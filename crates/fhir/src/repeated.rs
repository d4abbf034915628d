//! Repeating FHIR elements (JSON arrays) that remember an explicitly empty input.
//!
//! Typed list fields are omitted on output when empty, except when the input itself carried
//! an empty array. A list that loses all its items through editing is omitted.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::ops::{Deref, DerefMut};

#[derive(Clone, Debug, PartialEq)]
pub struct Repeated<T> {
    items: Vec<T>,
    explicit_empty: bool,
}

impl<T> Default for Repeated<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            explicit_empty: false,
        }
    }
}

impl<T> Repeated<T> {
    /// True when the list should not be written out.
    pub fn is_omitted(&self) -> bool {
        self.items.is_empty() && !self.explicit_empty
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }
}

impl<T> From<Vec<T>> for Repeated<T> {
    fn from(items: Vec<T>) -> Self {
        Self {
            items,
            explicit_empty: false,
        }
    }
}

impl<T> Deref for Repeated<T> {
    type Target = Vec<T>;

    fn deref(&self) -> &Vec<T> {
        &self.items
    }
}

impl<T> DerefMut for Repeated<T> {
    fn deref_mut(&mut self) -> &mut Vec<T> {
        &mut self.items
    }
}

impl<'a, T> IntoIterator for &'a Repeated<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<'a, T> IntoIterator for &'a mut Repeated<T> {
    type Item = &'a mut T;
    type IntoIter = std::slice::IterMut<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter_mut()
    }
}

impl<T: Serialize> Serialize for Repeated<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.items.serialize(serializer)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Repeated<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let items = Vec::<T>::deserialize(deserializer)?;
        Ok(Self {
            explicit_empty: items.is_empty(),
            items,
        })
    }
}
