use shared::domain::{Person, PersonId};

/// Ordered in-memory copy of the remote collection.
///
/// Insertion order is preserved; updates replace entries in place. Ids are
/// unique within the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryStore {
    persons: Vec<Person>,
}

impl DirectoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole contents. Only the initial load does this.
    pub(crate) fn populate(&mut self, persons: Vec<Person>) {
        self.persons.clear();
        for person in persons {
            self.append(person);
        }
    }

    pub fn persons(&self) -> &[Person] {
        &self.persons
    }

    pub fn len(&self) -> usize {
        self.persons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.persons.is_empty()
    }

    pub fn get(&self, id: PersonId) -> Option<&Person> {
        self.persons.iter().find(|p| p.id == id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Person> {
        self.persons.iter().find(|p| p.has_name(name))
    }

    /// Appends a canonical record; a record whose id is already present
    /// replaces the existing entry instead.
    pub fn append(&mut self, person: Person) {
        if !self.replace(person.clone()) {
            self.persons.push(person);
        }
    }

    /// Replaces the entry with the same id. Returns `false` if none matched.
    pub fn replace(&mut self, person: Person) -> bool {
        match self.persons.iter_mut().find(|p| p.id == person.id) {
            Some(slot) => {
                *slot = person;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: PersonId) -> Option<Person> {
        let index = self.persons.iter().position(|p| p.id == id)?;
        Some(self.persons.remove(index))
    }

    /// Entries whose name contains `filter` as a literal, case-insensitive
    /// substring. An empty filter yields every entry.
    pub fn visible(&self, filter: &str) -> Vec<Person> {
        self.persons
            .iter()
            .filter(|p| matches_filter(&p.name, filter))
            .cloned()
            .collect()
    }
}

pub fn matches_filter(name: &str, filter: &str) -> bool {
    filter.is_empty() || name.to_lowercase().contains(&filter.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person(id: i64, name: &str, number: &str) -> Person {
        Person {
            id: PersonId(id),
            name: name.into(),
            number: number.into(),
        }
    }

    #[test]
    fn replace_keeps_position() {
        let mut store = DirectoryStore::new();
        store.append(person(1, "Ada", "1"));
        store.append(person(2, "Mary", "2"));
        store.append(person(3, "Linus", "3"));

        assert!(store.replace(person(2, "Mary", "22")));
        let names: Vec<_> = store.persons().iter().map(|p| p.number.as_str()).collect();
        assert_eq!(names, ["1", "22", "3"]);
    }

    #[test]
    fn append_with_known_id_does_not_duplicate() {
        let mut store = DirectoryStore::new();
        store.append(person(1, "Ada", "1"));
        store.append(person(1, "Ada", "2"));
        assert_eq!(store.persons(), &[person(1, "Ada", "2")]);
    }

    #[test]
    fn remove_unknown_id_is_none() {
        let mut store = DirectoryStore::new();
        store.append(person(1, "Ada", "1"));
        assert!(store.remove(PersonId(5)).is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn find_by_name_ignores_case() {
        let mut store = DirectoryStore::new();
        store.append(person(1, "Ada Lovelace", "1"));
        assert_eq!(
            store.find_by_name("ada lovelace").map(|p| p.id),
            Some(PersonId(1))
        );
        assert!(store.find_by_name("ada").is_none());
    }

    #[test]
    fn filter_is_literal_and_case_insensitive() {
        let mut store = DirectoryStore::new();
        store.append(person(1, "Ada", "1"));
        store.append(person(2, "Mary", "2"));
        store.append(person(3, "C++ (dev)", "3"));

        let visible: Vec<_> = store.visible("DA").into_iter().map(|p| p.name).collect();
        assert_eq!(visible, ["Ada"]);
        assert_eq!(store.visible("").len(), 3);
        assert_eq!(store.visible("+ (").len(), 1);
        assert!(store.visible("[").is_empty());
        assert!(store.visible("zzz").is_empty());
        assert_eq!(store.len(), 3);
    }
}
