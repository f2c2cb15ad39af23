use crate::errors::{AppError, AppResult};
use crate::models::{Event, EventKind};
use crate::store::StateStore;
use crate::vocabulary::{vocabulary, Vocabulary};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum RegistrationState {
    Idle,
    #[serde(rename_all = "camelCase")]
    Selecting { link_index: usize, kind: EventKind },
    #[serde(rename_all = "camelCase")]
    Choosing {
        link_index: usize,
        kind: EventKind,
        emotion: Option<String>,
        habit: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed(Event),
    /// Emotion or habit still missing; nothing changed.
    Incomplete,
    /// No registration was open.
    Idle,
}

/// Pending "log an event" interaction for one link.
///
/// Opening resets any previous selection, picks overwrite, and commit is a
/// no-op until both an emotion and a habit are chosen.
#[derive(Debug, Clone)]
pub struct RegistrationFlow {
    state: RegistrationState,
}

impl Default for RegistrationFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistrationFlow {
    pub fn new() -> Self {
        Self {
            state: RegistrationState::Idle,
        }
    }

    pub fn state(&self) -> &RegistrationState {
        &self.state
    }

    pub fn open(&mut self, link_index: usize, kind: EventKind) {
        self.state = RegistrationState::Selecting { link_index, kind };
    }

    pub fn choose_emotion(&mut self, label: &str) -> AppResult<()> {
        self.choose(label, |emotion, _| *emotion = Some(label.to_string()))
    }

    pub fn choose_habit(&mut self, label: &str) -> AppResult<()> {
        self.choose(label, |_, habit| *habit = Some(label.to_string()))
    }

    pub fn can_commit(&self) -> bool {
        matches!(
            &self.state,
            RegistrationState::Choosing {
                emotion: Some(_),
                habit: Some(_),
                ..
            }
        )
    }

    /// Vocabulary the presentation layer should offer for the open registration.
    pub fn options(&self) -> Option<&'static Vocabulary> {
        match &self.state {
            RegistrationState::Idle => None,
            RegistrationState::Selecting { kind, .. } | RegistrationState::Choosing { kind, .. } => {
                Some(vocabulary(*kind))
            }
        }
    }

    pub fn commit(&mut self, store: &mut StateStore) -> AppResult<CommitOutcome> {
        let (link_index, kind, emotion, habit) = match &self.state {
            RegistrationState::Idle => return Ok(CommitOutcome::Idle),
            RegistrationState::Choosing {
                link_index,
                kind,
                emotion: Some(emotion),
                habit: Some(habit),
            } => (*link_index, *kind, emotion.clone(), habit.clone()),
            _ => return Ok(CommitOutcome::Incomplete),
        };

        // A rejected log keeps the pending choice so it can be corrected.
        let event = store.log_event(link_index, kind, &emotion, &habit)?;
        self.state = RegistrationState::Idle;
        Ok(CommitOutcome::Committed(event))
    }

    pub fn cancel(&mut self) -> bool {
        let was_open = self.state != RegistrationState::Idle;
        self.state = RegistrationState::Idle;
        was_open
    }

    fn choose(
        &mut self,
        label: &str,
        apply: impl FnOnce(&mut Option<String>, &mut Option<String>),
    ) -> AppResult<()> {
        if label.trim().is_empty() {
            return Err(AppError::ValidationRejected("selection cannot be empty".to_string()));
        }
        let (link_index, kind, mut emotion, mut habit) = match &self.state {
            RegistrationState::Idle => {
                return Err(AppError::ValidationRejected("no registration is open".to_string()));
            }
            RegistrationState::Selecting { link_index, kind } => (*link_index, *kind, None, None),
            RegistrationState::Choosing {
                link_index,
                kind,
                emotion,
                habit,
            } => (*link_index, *kind, emotion.clone(), habit.clone()),
        };
        apply(&mut emotion, &mut habit);
        self.state = RegistrationState::Choosing {
            link_index,
            kind,
            emotion,
            habit,
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{CommitOutcome, RegistrationFlow, RegistrationState};
    use crate::models::EventKind;
    use crate::store::StateStore;

    fn store_with_link() -> StateStore {
        let mut store = StateStore::new(false);
        store.initialize(None);
        store.add_link("Ana").expect("add");
        store
    }

    #[test]
    fn commit_is_noop_until_both_choices_are_set() {
        let mut store = store_with_link();
        let mut flow = RegistrationFlow::new();
        flow.open(0, EventKind::Negative);

        assert_eq!(flow.commit(&mut store).expect("commit"), CommitOutcome::Incomplete);
        flow.choose_emotion("Triste").expect("emotion");
        assert!(!flow.can_commit());
        assert_eq!(flow.commit(&mut store).expect("commit"), CommitOutcome::Incomplete);
        assert!(store.links()[0].history().is_empty());

        flow.choose_habit("Scroll infinito").expect("habit");
        assert!(flow.can_commit());
        let CommitOutcome::Committed(event) = flow.commit(&mut store).expect("commit") else {
            panic!("expected committed outcome");
        };
        assert_eq!(event.habit(), "Scroll infinito");
        assert_eq!(store.stability_score().value(), 92);
        assert_eq!(flow.state(), &RegistrationState::Idle);
    }

    #[test]
    fn later_picks_overwrite_earlier_ones() {
        let mut store = store_with_link();
        let mut flow = RegistrationFlow::new();
        flow.open(0, EventKind::Positive);
        flow.choose_emotion("Paz").expect("emotion");
        flow.choose_emotion("Energía").expect("emotion");
        flow.choose_habit("Medité").expect("habit");

        let CommitOutcome::Committed(event) = flow.commit(&mut store).expect("commit") else {
            panic!("expected committed outcome");
        };
        assert_eq!(event.emotion(), "Energía");
        assert_eq!(store.links()[0].history().len(), 1);
    }

    #[test]
    fn reopening_resets_pending_choices() {
        let mut flow = RegistrationFlow::new();
        flow.open(0, EventKind::Negative);
        flow.choose_emotion("Triste").expect("emotion");
        flow.choose_habit("Aislamiento").expect("habit");

        flow.open(0, EventKind::Positive);
        assert_eq!(
            flow.state(),
            &RegistrationState::Selecting {
                link_index: 0,
                kind: EventKind::Positive
            }
        );
        assert!(!flow.can_commit());
        assert!(flow.options().expect("options").has_emotion("Paz"));
    }

    #[test]
    fn cancel_discards_without_touching_the_link() {
        let mut store = store_with_link();
        let mut flow = RegistrationFlow::new();
        flow.open(0, EventKind::Negative);
        flow.choose_emotion("Triste").expect("emotion");
        flow.choose_habit("Aislamiento").expect("habit");

        assert!(flow.cancel());
        assert!(!flow.cancel());
        assert_eq!(flow.commit(&mut store).expect("commit"), CommitOutcome::Idle);
        assert!(store.links()[0].history().is_empty());
        assert_eq!(store.stability_score().value(), 100);
    }

    #[test]
    fn choosing_requires_an_open_registration() {
        let mut flow = RegistrationFlow::new();
        assert!(flow.choose_emotion("Paz").is_err());
        flow.open(0, EventKind::Positive);
        assert!(flow.choose_habit(" ").is_err());
    }

    #[test]
    fn rejected_commit_keeps_pending_selection() {
        let mut store = store_with_link();
        let mut flow = RegistrationFlow::new();
        flow.open(4, EventKind::Positive);
        flow.choose_emotion("Paz").expect("emotion");
        flow.choose_habit("Medité").expect("habit");

        assert!(flow.commit(&mut store).is_err());
        assert!(flow.can_commit());
        assert_eq!(store.stability_score().value(), 100);
    }
}
