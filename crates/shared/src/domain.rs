use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(PersonId);

/// Folded form of a name. Two names are duplicates when their keys are equal.
pub fn name_key(name: &str) -> String {
    name.to_lowercase()
}

/// Canonical record as returned by the collection server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    pub name: String,
    pub number: String,
}

impl Person {
    /// Case-insensitive name comparison used for duplicate detection.
    pub fn has_name(&self, name: &str) -> bool {
        name_key(&self.name) == name_key(name)
    }

    pub fn to_draft(&self) -> PersonDraft {
        PersonDraft {
            name: self.name.clone(),
            number: self.number.clone(),
        }
    }
}

/// Write body for create and update requests.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PersonDraft {
    pub name: String,
    pub number: String,
}

impl PersonDraft {
    pub fn new(name: impl Into<String>, number: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            number: number.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn person_id_serializes_as_plain_number() {
        let person = Person {
            id: PersonId(4),
            name: "Ada".into(),
            number: "1".into(),
        };
        let json = serde_json::to_value(&person).expect("json");
        assert_eq!(
            json,
            serde_json::json!({ "id": 4, "name": "Ada", "number": "1" })
        );
    }

    #[test]
    fn name_match_ignores_case() {
        let person = Person {
            id: PersonId(1),
            name: "Arto Hellas".into(),
            number: "040-1234567".into(),
        };
        assert!(person.has_name("arto hellas"));
        assert!(person.has_name("ARTO HELLAS"));
        assert!(!person.has_name("Arto"));
    }

    #[test]
    fn name_key_folds_beyond_ascii() {
        assert_eq!(name_key("ÉMILE"), name_key("émile"));
        assert_ne!(name_key("Emile"), name_key("Émile"));
    }
}
