use serde::{Deserialize, Serialize};

/// Player record kept by the ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerEntity {
    /// Session identity of the player.
    pub id: String,
    /// Display name, the identity unless changed.
    pub name: String,
    /// Current point balance.
    pub points: i64,
}

impl PlayerEntity {
    /// A fresh player holding `points`.
    pub fn new(id: impl Into<String>, points: i64) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            points,
        }
    }
}

/// Pre-vetted topic with its question, as stored in the question bank.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BankRecordEntity {
    /// Topic text shown in the pending list.
    pub topic: String,
    /// Question prompt.
    pub question: String,
    /// Text of option A.
    pub option_a: String,
    /// Text of option B.
    pub option_b: String,
    /// Text of option C.
    pub option_c: String,
    /// Text of option D.
    pub option_d: String,
    /// Label of the correct option (`A`..`D`, `option A` is accepted too).
    pub correct_option: String,
}
