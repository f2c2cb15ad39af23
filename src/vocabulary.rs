use crate::errors::{AppError, AppResult};
use crate::models::EventKind;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Vocabulary {
    pub kind: EventKind,
    pub emotions: &'static [&'static str],
    pub habits: &'static [&'static str],
}

const NEGATIVE: Vocabulary = Vocabulary {
    kind: EventKind::Negative,
    emotions: &["Frustrada", "Triste", "Enojada", "Ansiosa", "Sola", "Cansada"],
    habits: &[
        "Comida compulsiva",
        "Gasto innecesario",
        "Aislamiento",
        "Scroll infinito",
        "Procrastinar",
    ],
};

const POSITIVE: Vocabulary = Vocabulary {
    kind: EventKind::Positive,
    emotions: &["Paz", "Energía", "Motivación", "Amada", "Tranquila", "Inspirada"],
    habits: &[
        "Hice ejercicio",
        "Comí sano",
        "Avancé en mis proyectos",
        "Medité",
        "Dormí bien",
    ],
};

pub fn vocabulary(kind: EventKind) -> &'static Vocabulary {
    match kind {
        EventKind::Negative => &NEGATIVE,
        EventKind::Positive => &POSITIVE,
    }
}

impl Vocabulary {
    pub fn has_emotion(&self, label: &str) -> bool {
        self.emotions.contains(&label)
    }

    pub fn has_habit(&self, label: &str) -> bool {
        self.habits.contains(&label)
    }

    /// Rejects labels outside this kind's lists. Only enforced in strict mode.
    pub fn check(&self, emotion: &str, habit: &str) -> AppResult<()> {
        if !self.has_emotion(emotion) {
            return Err(AppError::ValidationRejected(format!(
                "emotion '{emotion}' is not in the {} vocabulary",
                self.kind
            )));
        }
        if !self.has_habit(habit) {
            return Err(AppError::ValidationRejected(format!(
                "habit '{habit}' is not in the {} vocabulary",
                self.kind
            )));
        }
        Ok(())
    }
}
