//! Shared entity fixtures for unit tests.

use std::any::Any;

use stagedb_model::{Entity, EntityClass, EntityId, Fingerprinter};

pub const TICKETS: EntityClass = EntityClass::new(1);
pub const MEMOS: EntityClass = EntityClass::new(2);

/// Work item with an optional slug, a title, and a point estimate.
#[derive(Debug, Clone)]
pub struct Ticket {
    id: Option<EntityId>,
    slug: Option<String>,
    title: String,
    points: u32,
}

impl Ticket {
    pub fn new(title: &str) -> Self {
        Self {
            id: None,
            slug: None,
            title: title.to_owned(),
            points: 0,
        }
    }

    pub fn with_id(id: u64, title: &str) -> Self {
        let mut ticket = Self::new(title);
        ticket.id = Some(EntityId::new(id));
        ticket
    }

    pub fn with_slug(title: &str, slug: &str) -> Self {
        let mut ticket = Self::new(title);
        ticket.slug = Some(slug.to_owned());
        ticket
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: &str) {
        self.title = title.to_owned();
    }

    pub fn points(&self) -> u32 {
        self.points
    }

    pub fn set_points(&mut self, points: u32) {
        self.points = points;
    }

    pub fn set_slug(&mut self, slug: &str) {
        self.slug = Some(slug.to_owned());
    }
}

impl Entity for Ticket {
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
        hasher.field("title", &self.title);
        hasher.field("points", self.points);
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

/// Minimal second entity type for cross-class tests.
#[derive(Debug, Clone)]
pub struct Memo {
    id: Option<EntityId>,
    text: String,
}

impl Memo {
    pub fn new(text: &str) -> Self {
        Self {
            id: None,
            text: text.to_owned(),
        }
    }
}

impl Entity for Memo {
    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn assign_id(&mut self, id: EntityId) {
        self.id = Some(id);
    }

    fn slug(&self) -> Option<&str> {
        None
    }

    fn fingerprint(&self, hasher: &mut Fingerprinter) {
        hasher.opt_field("id", self.id);
        hasher.field("text", &self.text);
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

mod tests {
    use super::*;
    use stagedb_model::Fingerprint;

    // fixtures hash every public field, the id included
    #[test]
    fn fixture_fingerprints_see_id_assignment() {
        let mut ticket = Ticket::with_slug("draft", "d-1");
        let before = Fingerprint::of(&ticket);
        ticket.assign_id(EntityId::new(7));
        assert_ne!(before, Fingerprint::of(&ticket));

        let mut memo = Memo::new("note to self");
        let before = Fingerprint::of(&memo);
        memo.assign_id(EntityId::new(7));
        assert_ne!(before, Fingerprint::of(&memo));
    }
}
