use crate::errors::{AppError, AppResult};
use crate::models::{Event, EventKind, Link, Snapshot, SnapshotPayload};
use crate::stability::StabilityScore;
use crate::vocabulary::vocabulary;

/// In-memory owner of the link list and the stability score.
///
/// Every successful mutation bumps `revision`; the tracker only schedules a
/// save when a transition moved it. Rejected transitions leave the store
/// untouched.
#[derive(Debug, Clone, Default)]
pub struct StateStore {
    links: Vec<Link>,
    stability: StabilityScore,
    loaded: bool,
    strict_vocabulary: bool,
    revision: u64,
}

impl StateStore {
    pub fn new(strict_vocabulary: bool) -> Self {
        Self {
            strict_vocabulary,
            ..Self::default()
        }
    }

    pub fn initialize(&mut self, snapshot: Option<&Snapshot>) {
        match snapshot {
            Some(snapshot) => {
                self.links = snapshot.links.clone();
                self.stability = snapshot.stability_score;
            }
            None => {
                self.links = Vec::new();
                self.stability = StabilityScore::FULL;
            }
        }
        self.loaded = true;
    }

    pub fn set_strict_vocabulary(&mut self, strict: bool) {
        self.strict_vocabulary = strict;
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn link(&self, index: usize) -> Option<&Link> {
        self.links.get(index)
    }

    pub fn stability_score(&self) -> StabilityScore {
        self.stability
    }

    pub fn add_link(&mut self, name: &str) -> AppResult<usize> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::ValidationRejected("link name cannot be empty".to_string()));
        }
        self.links.push(Link::new(name.to_string()));
        self.revision += 1;
        Ok(self.links.len() - 1)
    }

    pub fn remove_link(&mut self, index: usize) -> AppResult<Link> {
        self.check_index(index)?;
        let removed = self.links.remove(index);
        self.revision += 1;
        Ok(removed)
    }

    pub fn log_event(&mut self, index: usize, kind: EventKind, emotion: &str, habit: &str) -> AppResult<Event> {
        self.check_index(index)?;
        if self.strict_vocabulary {
            vocabulary(kind).check(emotion, habit)?;
        }
        let event = Event::new(kind, emotion, habit)?;

        // Nothing below can fail, so the append and the score move together.
        self.links[index].push_event(event.clone());
        self.stability = self.stability.apply(kind);
        self.revision += 1;
        Ok(event)
    }

    pub fn to_payload(&self) -> SnapshotPayload {
        SnapshotPayload {
            stability_score: self.stability,
            links: self.links.clone(),
        }
    }

    fn check_index(&self, index: usize) -> AppResult<()> {
        if index >= self.links.len() {
            return Err(AppError::ValidationRejected(format!(
                "link index {} out of range (have {})",
                index,
                self.links.len()
            )));
        }
        Ok(())
    }
}
