use shared::domain::Person;

/// Question put to the human before an overwrite or a delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmPrompt {
    ReplaceNumber { existing: Person, number: String },
    Delete { target: Person },
}

impl ConfirmPrompt {
    pub fn message(&self) -> String {
        match self {
            Self::ReplaceNumber { existing, .. } => format!(
                "{} is already added to phonebook, replace the old number with a new one?",
                existing.name
            ),
            Self::Delete { target } => format!("Delete {}?", target.name),
        }
    }
}

/// Synchronous yes/no decision point. The controller never assumes an answer.
pub trait Confirm: Send + Sync {
    fn confirm(&self, prompt: &ConfirmPrompt) -> bool;
}

/// Answers every prompt the same way.
pub struct FixedAnswer(pub bool);

impl Confirm for FixedAnswer {
    fn confirm(&self, _prompt: &ConfirmPrompt) -> bool {
        self.0
    }
}
