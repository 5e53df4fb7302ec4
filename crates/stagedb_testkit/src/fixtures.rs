//! Sample entities and session fixtures.
//!
//! Provides a ready-made entity type plus repository/session bundles
//! for exercising the engine without boilerplate.

use std::any::Any;
use std::sync::Arc;

use stagedb_core::{Entity, EntityClass, EntityId, Fingerprinter, Session, SessionFactory};
use stagedb_repository::{InMemoryRepository, Repository};

/// Entity class used by [`Person`] fixtures.
pub const PEOPLE: EntityClass = EntityClass::new(1);

/// Sample entity with an optional slug and two data fields.
#[derive(Debug, Clone)]
pub struct Person {
    id: Option<EntityId>,
    slug: Option<String>,
    name: String,
    age: u32,
}

impl Person {
    /// Creates an unidentified, slug-less person.
    #[must_use]
    pub fn new(name: &str, age: u32) -> Self {
        Self {
            id: None,
            slug: None,
            name: name.to_owned(),
            age,
        }
    }

    /// Sets the slug, builder style.
    #[must_use]
    pub fn slugged(mut self, slug: &str) -> Self {
        self.slug = Some(slug.to_owned());
        self
    }

    /// Returns the name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Replaces the name.
    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_owned();
    }

    /// Returns the age.
    #[must_use]
    pub fn age(&self) -> u32 {
        self.age
    }

    /// Replaces the age.
    pub fn set_age(&mut self, age: u32) {
        self.age = age;
    }
}

impl Entity for Person {
    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn assign_id(&mut self, id: EntityId) {
        self.id = Some(id);
    }

    fn slug(&self) -> Option<&str> {
        self.slug.as_deref()
    }

    fn fingerprint(&self, hasher: &mut Fingerprinter) {
        hasher.opt_field("id", self.id);
        hasher.opt_field("slug", self.slug.as_deref());
        hasher.field("name", &self.name);
        hasher.field("age", self.age);
    }

    fn boxed_clone(&self) -> Box<dyn Entity> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A repository with one bound session.
pub struct TestBed {
    /// The shared repository.
    pub repository: Arc<InMemoryRepository>,
    /// A session on the repository.
    pub session: Session,
}

impl TestBed {
    /// Creates an empty repository and a session on it.
    #[must_use]
    pub fn new() -> Self {
        let repository = Arc::new(InMemoryRepository::new());
        let session = Session::new(repository.clone() as Arc<dyn Repository>);
        Self {
            repository,
            session,
        }
    }

    /// Creates a repository seeded with people and a session on it.
    ///
    /// Each `(slug, name, age)` row becomes a persisted entity; ids
    /// are issued sequentially in row order, starting at zero.
    #[must_use]
    pub fn with_people(rows: &[(&str, &str, u32)]) -> Self {
        let rows: Vec<(String, String, u32)> = rows
            .iter()
            .map(|(slug, name, age)| ((*slug).to_owned(), (*name).to_owned(), *age))
            .collect();
        let repository = Arc::new(
            InMemoryRepository::builder()
                .loader(move |class| {
                    if class != PEOPLE {
                        return Vec::new();
                    }
                    rows.iter()
                        .map(|(slug, name, age)| {
                            Box::new(Person::new(name, *age).slugged(slug)) as Box<dyn Entity>
                        })
                        .collect()
                })
                .build(),
        );
        let session = Session::new(repository.clone() as Arc<dyn Repository>);
        Self {
            repository,
            session,
        }
    }

    /// Opens an independent session against the same repository.
    #[must_use]
    pub fn another_session(&self) -> Session {
        Session::new(self.repository.clone() as Arc<dyn Repository>)
    }

    /// Returns a factory handing out thread sessions on this
    /// repository.
    #[must_use]
    pub fn factory(&self) -> SessionFactory {
        SessionFactory::new(self.repository.clone() as Arc<dyn Repository>)
    }
}

impl Default for TestBed {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestBed {
    type Target = Session;

    fn deref(&self) -> &Self::Target {
        &self.session
    }
}

impl std::ops::DerefMut for TestBed {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.session
    }
}

/// Runs a test body against a fresh session on an empty repository.
///
/// # Example
///
/// ```rust
/// use stagedb_testkit::fixtures::{with_session, Person, PEOPLE};
///
/// with_session(|session| {
///     let ada = session.add(PEOPLE, Box::new(Person::new("Ada", 36))).unwrap();
///     session.commit().unwrap();
///     assert!(ada.id().is_some());
/// });
/// ```
pub fn with_session<F, R>(f: F) -> R
where
    F: FnOnce(&mut Session) -> R,
{
    let mut bed = TestBed::new();
    f(&mut bed.session)
}

/// Canned multi-entity scenarios.
pub mod scenarios {
    use super::*;

    /// A bed whose repository holds `count` committed people.
    ///
    /// People are named `person 0..count` with slugs `person-N`.
    #[must_use]
    pub fn populated(count: usize) -> TestBed {
        let mut bed = TestBed::new();
        for index in 0..count {
            let person = Person::new(&format!("person {index}"), 20 + index as u32)
                .slugged(&format!("person-{index}"));
            bed.session
                .add(PEOPLE, Box::new(person))
                .expect("failed to add person");
        }
        bed.session.commit().expect("failed to commit people");
        bed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_bed_round_trips_a_person() {
        crate::logging::init_test_logging();
        let mut bed = TestBed::new();
        let ada = bed
            .session
            .add(PEOPLE, Box::new(Person::new("Ada", 36).slugged("ada")))
            .unwrap();
        bed.session.commit().unwrap();

        assert!(bed.repository.contains(PEOPLE, ada.id().unwrap()));
        let found = bed.session.get_by_slug(PEOPLE, "ada").unwrap().unwrap();
        assert_eq!(found.read_as::<Person>().unwrap().age(), 36);
    }

    #[test]
    fn seeded_bed_hydrates_on_first_touch() {
        let mut bed = TestBed::with_people(&[("ada", "Ada", 36), ("alan", "Alan", 41)]);

        let alan = bed.session.get_by_slug(PEOPLE, "alan").unwrap().unwrap();
        assert_eq!(alan.read_as::<Person>().unwrap().name(), "Alan");
        // seeds take ids 0 and 1, so the next addition gets 2
        let fresh = bed
            .session
            .add(PEOPLE, Box::new(Person::new("Grace", 45)))
            .unwrap();
        assert_eq!(fresh.id(), Some(EntityId::new(2)));
    }

    #[test]
    fn second_session_sees_committed_work() {
        let mut bed = TestBed::new();
        let ada = bed
            .session
            .add(PEOPLE, Box::new(Person::new("Ada", 36)))
            .unwrap();
        bed.session.commit().unwrap();

        let mut other = bed.another_session();
        let found = other.get_by_id(PEOPLE, ada.id().unwrap()).unwrap().unwrap();
        // the other session holds its own copy, not the same handle
        assert!(!found.ptr_eq(&ada));
        assert_eq!(found.read_as::<Person>().unwrap().name(), "Ada");
    }

    #[test]
    fn populated_scenario_commits_everything() {
        let bed = scenarios::populated(5);
        assert_eq!(bed.repository.len(PEOPLE), 5);
    }

    #[test]
    fn deref_exposes_the_session() {
        let mut bed = TestBed::new();
        bed.add(PEOPLE, Box::new(Person::new("Ada", 36))).unwrap();
        assert_eq!(bed.unit_of_work().len(), 1);
    }

    #[test]
    fn person_fingerprint_sees_id_assignment() {
        let mut person = Person::new("Ada", 36).slugged("ada");
        let before = stagedb_core::Fingerprint::of(&person);
        person.assign_id(EntityId::new(3));
        assert_ne!(before, stagedb_core::Fingerprint::of(&person));
    }
}
