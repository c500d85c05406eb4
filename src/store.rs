use chrono::NaiveDateTime;
use std::collections::HashSet;
use thiserror::Error;

use crate::database::{DatabaseError, KeyValueStore};
use crate::models::{Idea, Status, now_millis};
use crate::utils::parse_schedule;

/// Key the idea list is written under.
pub const STORAGE_KEY: &str = "borrachos-ideas";
/// Key used by earlier releases. Read when [`STORAGE_KEY`] is absent, never written.
pub const LEGACY_STORAGE_KEY: &str = "patata-ideas";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),
    #[error("Stored ideas under '{key}' could not be read: {source}")]
    CorruptData {
        key: &'static str,
        source: serde_json::Error,
    },
    #[error("Failed to serialize ideas: {0}")]
    SerializeError(#[source] serde_json::Error),
}

/// Number of ideas in each column of the board.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub progress: usize,
    pub paused: usize,
}

/// Ordered, persisted collection of ideas.
///
/// Owns the in-memory list and is the only writer to the backing key-value
/// store. Every mutation writes the whole list before it becomes visible, so a
/// failed write leaves the in-memory state untouched.
pub struct IdeaStore<S: KeyValueStore> {
    kv: S,
    ideas: Vec<Idea>,
}

impl<S: KeyValueStore> IdeaStore<S> {
    /// Load the idea list, falling back to the legacy key for older installs.
    pub fn open(kv: S) -> Result<Self, StoreError> {
        let ideas = match kv.get(STORAGE_KEY)? {
            Some(raw) => parse_stored(STORAGE_KEY, &raw)?,
            None => match kv.get(LEGACY_STORAGE_KEY)? {
                Some(raw) => {
                    tracing::info!(key = LEGACY_STORAGE_KEY, "migrating ideas from legacy key");
                    parse_stored(LEGACY_STORAGE_KEY, &raw)?
                }
                None => Vec::new(),
            },
        };

        let mut store = IdeaStore {
            kv,
            ideas: Vec::new(),
        };

        // Ids already in the data must not be handed out to records lacking one
        let mut taken: HashSet<String> = ideas
            .iter()
            .filter(|i| !i.id.is_empty())
            .map(|i| i.id.clone())
            .collect();
        let mut seen = HashSet::new();
        let mut cleaned = Vec::with_capacity(ideas.len());
        let mut repaired = false;
        for mut idea in ideas {
            if idea.id.is_empty() {
                idea.id = store.mint_id(&taken);
                taken.insert(idea.id.clone());
                repaired = true;
            }
            if !seen.insert(idea.id.clone()) {
                tracing::warn!(id = %idea.id, "dropping stored idea with duplicate id");
                repaired = true;
                continue;
            }
            cleaned.push(idea);
        }

        if repaired {
            // Minted ids must survive into the next session
            store.commit(cleaned)?;
            tracing::info!(count = store.ideas.len(), "repaired stored ideas");
        } else {
            store.ideas = cleaned;
        }

        tracing::debug!(count = store.ideas.len(), "loaded ideas");
        Ok(store)
    }

    /// All ideas in insertion order
    pub fn ideas(&self) -> &[Idea] {
        &self.ideas
    }

    pub fn len(&self) -> usize {
        self.ideas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ideas.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Idea> {
        self.ideas.iter().find(|i| i.id == id)
    }

    /// Ideas in insertion order, optionally restricted to one category
    pub fn list(&self, category: Option<&str>) -> Vec<&Idea> {
        self.ideas
            .iter()
            .filter(|i| category.is_none_or(|c| i.category == c))
            .collect()
    }

    /// Column counts for the same listing `list(category)` returns
    pub fn counts(&self, category: Option<&str>) -> StatusCounts {
        self.list(category)
            .into_iter()
            .fold(StatusCounts::default(), |mut counts, idea| {
                match idea.status {
                    Status::Progress => counts.progress += 1,
                    Status::Paused => counts.paused += 1,
                }
                counts
            })
    }

    /// Ideas carrying a date, earliest first.
    /// Dates that don't parse sort last, in insertion order.
    pub fn scheduled(&self) -> Vec<&Idea> {
        let mut dated: Vec<(Option<NaiveDateTime>, &Idea)> = self
            .ideas
            .iter()
            .filter_map(|idea| {
                let date = idea.date.as_deref().filter(|d| !d.is_empty())?;
                Some((parse_schedule(date), idea))
            })
            .collect();
        // sort_by_key is stable, None must go after Some
        dated.sort_by_key(|(when, _)| (when.is_none(), *when));
        dated.into_iter().map(|(_, idea)| idea).collect()
    }

    /// Ideas whose reminder is still due to fire after `now`
    pub fn pending_reminders(&self, now: NaiveDateTime) -> Vec<&Idea> {
        self.scheduled()
            .into_iter()
            .filter(|idea| idea.notify)
            .filter(|idea| {
                idea.date
                    .as_deref()
                    .and_then(parse_schedule)
                    .is_some_and(|when| when > now)
            })
            .collect()
    }

    /// Insert a new idea or replace an existing one in place.
    ///
    /// An empty id gets a freshly minted one. The stored copy is returned.
    pub fn upsert(&mut self, mut idea: Idea) -> Result<Idea, StoreError> {
        if idea.id.is_empty() {
            let taken = self.ids();
            idea.id = self.mint_id(&taken);
        }
        idea.timestamp = now_millis();

        let mut next = self.ideas.clone();
        match next.iter_mut().find(|i| i.id == idea.id) {
            Some(existing) => *existing = idea.clone(),
            None => next.push(idea.clone()),
        }

        self.commit(next)?;
        tracing::debug!(id = %idea.id, "saved idea");
        Ok(idea)
    }

    /// Delete an idea by id. Returns whether anything was removed.
    pub fn remove(&mut self, id: &str) -> Result<bool, StoreError> {
        let next: Vec<Idea> = self.ideas.iter().filter(|i| i.id != id).cloned().collect();
        if next.len() == self.ideas.len() {
            return Ok(false);
        }

        self.commit(next)?;
        tracing::debug!(id, "removed idea");
        Ok(true)
    }

    /// Append every incoming idea whose id is not present yet.
    ///
    /// Existing ideas are never overwritten. Incoming ideas without an id get a
    /// new one; repeated ids within `incoming` are added once. The list is
    /// written a single time, and only if something was added.
    pub fn merge(&mut self, incoming: Vec<Idea>) -> Result<usize, StoreError> {
        let mut taken = self.ids();
        let mut next = self.ideas.clone();
        let offered = incoming.len();

        for mut idea in incoming {
            if idea.id.is_empty() {
                idea.id = self.mint_id(&taken);
            }
            if taken.insert(idea.id.clone()) {
                next.push(idea);
            }
        }

        let added = next.len() - self.ideas.len();
        if added > 0 {
            self.commit(next)?;
        }
        tracing::info!(offered, added, "merged imported ideas");
        Ok(added)
    }

    /// Flip an idea between in-progress and paused.
    pub fn toggle_status(&mut self, id: &str) -> Result<Option<Idea>, StoreError> {
        let Some(pos) = self.ideas.iter().position(|i| i.id == id) else {
            return Ok(None);
        };

        let mut next = self.ideas.clone();
        next[pos].status = next[pos].status.toggled();
        let updated = next[pos].clone();

        self.commit(next)?;
        tracing::debug!(id, status = %updated.status, "toggled status");
        Ok(Some(updated))
    }

    /// Borrow the backing key-value store
    pub fn backend(&self) -> &S {
        &self.kv
    }

    pub fn into_backend(self) -> S {
        self.kv
    }

    fn ids(&self) -> HashSet<String> {
        self.ideas.iter().map(|i| i.id.clone()).collect()
    }

    /// Millisecond timestamp, bumped until it collides with nothing in `taken`
    fn mint_id(&self, taken: &HashSet<String>) -> String {
        let mut candidate = now_millis();
        loop {
            let id = candidate.to_string();
            if !taken.contains(&id) && self.get(&id).is_none() {
                return id;
            }
            candidate += 1;
        }
    }

    fn commit(&mut self, next: Vec<Idea>) -> Result<(), StoreError> {
        let raw = serde_json::to_string(&next).map_err(StoreError::SerializeError)?;
        self.kv.set(STORAGE_KEY, &raw)?;
        self.ideas = next;
        Ok(())
    }
}

fn parse_stored(key: &'static str, raw: &str) -> Result<Vec<Idea>, StoreError> {
    // An explicit null is what older builds wrote for "nothing saved yet"
    let value: Option<Vec<Idea>> =
        serde_json::from_str(raw).map_err(|source| StoreError::CorruptData { key, source })?;
    Ok(value.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;

    fn idea(id: &str, name: &str, category: &str) -> Idea {
        Idea {
            id: id.to_string(),
            category: category.to_string(),
            ..Idea::new(name)
        }
    }

    fn store_with(raw: &str) -> IdeaStore<MemoryStore> {
        IdeaStore::open(MemoryStore::new().with_entry(STORAGE_KEY, raw)).unwrap()
    }

    fn stored(store: &IdeaStore<MemoryStore>) -> serde_json::Value {
        let raw = store.backend().get(STORAGE_KEY).unwrap().unwrap();
        serde_json::from_str(&raw).unwrap()
    }

    #[test]
    fn empty_backend_opens_empty() {
        let store = IdeaStore::open(MemoryStore::new()).unwrap();
        assert!(store.is_empty());
        assert_eq!(store.backend().writes(), 0);
    }

    #[test]
    fn legacy_key_is_read_when_primary_is_missing() {
        let kv = MemoryStore::new().with_entry(LEGACY_STORAGE_KEY, r#"[{"id":"1","nombre":"Old"}]"#);
        let mut store = IdeaStore::open(kv).unwrap();
        assert_eq!(store.get("1").unwrap().name, "Old");

        store.upsert(idea("", "New", "work")).unwrap();
        let kv = store.into_backend();
        assert!(kv.get(STORAGE_KEY).unwrap().is_some());
        assert_eq!(
            kv.get(LEGACY_STORAGE_KEY).unwrap().as_deref(),
            Some(r#"[{"id":"1","nombre":"Old"}]"#)
        );
    }

    #[test]
    fn primary_key_wins_over_legacy() {
        let kv = MemoryStore::new()
            .with_entry(STORAGE_KEY, r#"[{"id":"2","name":"Current"}]"#)
            .with_entry(LEGACY_STORAGE_KEY, r#"[{"id":"1","name":"Old"}]"#);
        let store = IdeaStore::open(kv).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.ideas()[0].name, "Current");
    }

    #[test]
    fn stored_null_means_empty() {
        assert!(store_with("null").is_empty());
    }

    #[test]
    fn corrupt_data_is_an_error() {
        let result = IdeaStore::open(MemoryStore::new().with_entry(STORAGE_KEY, "{not json"));
        assert!(matches!(result, Err(StoreError::CorruptData { key: STORAGE_KEY, .. })));
    }

    #[test]
    fn duplicate_stored_ids_keep_the_first() {
        let store = store_with(r#"[{"id":"1","name":"A"},{"id":"1","name":"B"}]"#);
        assert_eq!(store.len(), 1);
        assert_eq!(store.ideas()[0].name, "A");
        assert_eq!(stored(&store).as_array().unwrap().len(), 1);
    }

    #[test]
    fn ids_minted_on_open_are_persisted() {
        let store = store_with(r#"[{"name":"No id yet"},{"id":"5","name":"Has one"}]"#);
        let minted = store.ideas()[0].id.clone();
        assert!(!minted.is_empty());
        assert_ne!(minted, "5");
        assert_eq!(store.backend().writes(), 1);

        let mut reopened = IdeaStore::open(store.into_backend()).unwrap();
        assert_eq!(reopened.ideas()[0].id, minted);
        assert_eq!(reopened.backend().writes(), 1);
        assert!(reopened.toggle_status(&minted).unwrap().is_some());
    }

    #[test]
    fn clean_data_is_not_rewritten_on_open() {
        let store = store_with(r#"[{"id":"1","name":"A"}]"#);
        assert_eq!(store.backend().writes(), 0);
    }

    #[test]
    fn list_filters_by_category_in_insertion_order() {
        let store = store_with(
            r#"[{"id":"1","name":"A","category":"x"},
                {"id":"2","name":"B","category":"y"},
                {"id":"3","name":"C","category":"x"}]"#,
        );
        let all: Vec<&str> = store.list(None).iter().map(|i| i.id.as_str()).collect();
        assert_eq!(all, ["1", "2", "3"]);
        let xs: Vec<&str> = store.list(Some("x")).iter().map(|i| i.id.as_str()).collect();
        assert_eq!(xs, ["1", "3"]);
        assert!(store.list(Some("z")).is_empty());
    }

    #[test]
    fn legacy_fields_are_exposed_canonically() {
        let store = store_with(r#"[{"id":"9","titulo":"X","descripcion":"Y"}]"#);
        let listed = store.list(None);
        assert_eq!(listed[0].name, "X");
        assert_eq!(listed[0].description, "Y");
    }

    #[test]
    fn upsert_mints_unique_ids() {
        let mut store = IdeaStore::open(MemoryStore::new()).unwrap();
        let a = store.upsert(idea("", "A", "x")).unwrap();
        let b = store.upsert(idea("", "B", "x")).unwrap();
        assert!(!a.id.is_empty());
        assert_ne!(a.id, b.id);
        assert_eq!(store.len(), 2);
        assert_eq!(store.backend().writes(), 2);
    }

    #[test]
    fn upsert_replaces_in_place() {
        let mut store = store_with(r#"[{"id":"1","name":"A"},{"id":"2","name":"B"}]"#);
        let mut edited = store.get("1").unwrap().clone();
        edited.name = "A2".to_string();
        store.upsert(edited).unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.ideas()[0].id, "1");
        assert_eq!(store.ideas()[0].name, "A2");
        assert_eq!(stored(&store)[0]["name"], "A2");
    }

    #[test]
    fn upsert_with_unknown_id_appends() {
        let mut store = store_with(r#"[{"id":"1","name":"A"}]"#);
        store.upsert(idea("abc", "B", "x")).unwrap();
        assert_eq!(store.ideas()[1].id, "abc");
    }

    #[test]
    fn remove_reports_whether_anything_went() {
        let mut store = store_with(r#"[{"id":"1","name":"A"},{"id":"2","name":"B"}]"#);
        assert!(store.remove("1").unwrap());
        assert!(!store.remove("1").unwrap());
        assert_eq!(store.len(), 1);
        assert_eq!(store.backend().writes(), 1);
    }

    #[test]
    fn merge_keeps_existing_records() {
        let mut store = store_with(r#"[{"id":"1","name":"A","status":"progress","category":"x"}]"#);
        let incoming: Vec<Idea> = serde_json::from_str(
            r#"[{"id":"1","name":"A-dup"},{"id":"2","name":"B","status":"paused","category":"y"}]"#,
        )
        .unwrap();

        assert_eq!(store.merge(incoming).unwrap(), 1);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("1").unwrap().name, "A");
        assert_eq!(store.get("2").unwrap().status, Status::Paused);
        assert_eq!(store.backend().writes(), 1);
    }

    #[test]
    fn merge_is_idempotent() {
        let mut store = IdeaStore::open(MemoryStore::new()).unwrap();
        let batch = vec![idea("a", "A", "x"), idea("b", "B", "y")];
        assert_eq!(store.merge(batch.clone()).unwrap(), 2);
        assert_eq!(store.merge(batch).unwrap(), 0);
        assert_eq!(store.len(), 2);
        assert_eq!(store.backend().writes(), 1);
    }

    #[test]
    fn merge_dedupes_within_batch_and_mints_missing_ids() {
        let mut store = IdeaStore::open(MemoryStore::new()).unwrap();
        let batch = vec![idea("a", "A", "x"), idea("a", "A again", "x"), idea("", "C", "x"), idea("", "D", "x")];
        assert_eq!(store.merge(batch).unwrap(), 3);
        assert_eq!(store.get("a").unwrap().name, "A");

        let ids: HashSet<&str> = store.ideas().iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids.len(), 3);
        assert!(!ids.contains(""));
    }

    #[test]
    fn toggle_normalizes_legacy_status() {
        let mut store = store_with(r#"[{"id":"1","name":"A","status":"progreso"}]"#);
        let toggled = store.toggle_status("1").unwrap().unwrap();
        assert_eq!(toggled.status, Status::Paused);
        assert_eq!(stored(&store)[0]["status"], "paused");

        let toggled = store.toggle_status("1").unwrap().unwrap();
        assert_eq!(toggled.status, Status::Progress);
        assert!(store.toggle_status("missing").unwrap().is_none());
    }

    #[test]
    fn counts_follow_filter() {
        let store = store_with(
            r#"[{"id":"1","status":"progress","category":"x"},
                {"id":"2","status":"pausado","category":"x"},
                {"id":"3","status":"progreso","category":"y"}]"#,
        );
        assert_eq!(store.counts(None), StatusCounts { progress: 2, paused: 1 });
        assert_eq!(store.counts(Some("x")), StatusCounts { progress: 1, paused: 1 });
    }

    #[test]
    fn scheduled_sorts_by_date_with_unparseable_last() {
        let store = store_with(
            r#"[{"id":"late","date":"2030-01-02T09:00"},
                {"id":"none"},
                {"id":"blank","date":""},
                {"id":"bad","date":"someday"},
                {"id":"early","date":"2030-01-01"}]"#,
        );
        let order: Vec<&str> = store.scheduled().iter().map(|i| i.id.as_str()).collect();
        assert_eq!(order, ["early", "late", "bad"]);
    }

    #[test]
    fn pending_reminders_need_notify_and_future_date() {
        let store = store_with(
            r#"[{"id":"past","date":"2020-01-01T10:00","notify":true},
                {"id":"future","date":"2030-01-01T10:00","notify":true},
                {"id":"quiet","date":"2030-01-01T10:00","notify":false}]"#,
        );
        let now = parse_schedule("2025-06-01T00:00").unwrap();
        let due: Vec<&str> = store.pending_reminders(now).iter().map(|i| i.id.as_str()).collect();
        assert_eq!(due, ["future"]);
    }
}
