use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

/// Prize inventory stored as a single document so a draw is one read-modify-write.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PrizePoolEntity {
    /// Prizes ordered by id.
    pub prizes: Vec<PrizeEntity>,
}

/// One prize and its remaining count.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PrizeEntity {
    /// Stable 1-based identifier.
    pub id: u32,
    /// Display name.
    pub name: String,
    /// Remaining count; never negative.
    pub stock: u32,
}

/// Generated question set kept for the lifetime of a quiz.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionSetEntity {
    /// Identifier returned to the client as `session_id`.
    pub id: Uuid,
    /// Questions in `qid` order.
    pub questions: Vec<QuestionEntity>,
    /// `llm` or `fallback`.
    pub source: String,
    /// Player tags the set was themed on.
    pub tags: Vec<String>,
    /// Storage time, used to report the remaining lifetime.
    pub created_at: SystemTime,
}

/// A single multiple-choice question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionEntity {
    /// 1-based position inside the set.
    pub qid: u32,
    /// Personality axis probed by the question (`E/I`, `S/N`, ...), when known.
    pub dimension: Option<String>,
    /// Question text.
    pub question: String,
    /// Option texts.
    pub options: Vec<String>,
}
