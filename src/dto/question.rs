use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dao::models::{QuestionEntity, QuestionSetEntity};

/// Interest tags, given either as one delimited string or as a list.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum TagsInput {
    /// Delimited string.
    One(String),
    /// List of strings, each split like a single string.
    Many(Vec<String>),
}

/// Body of `POST /questions`.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct QuestionRequest {
    /// Split on commas, slashes, pipes, semicolons, backslashes and whitespace.
    #[serde(default)]
    pub tags: Option<TagsInput>,
}

/// One quiz question.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QuestionDto {
    /// 1-based position inside the set.
    pub qid: u32,
    /// Personality axis, when known.
    pub dimension: Option<String>,
    /// Question text.
    pub question: String,
    /// Option texts.
    pub options: Vec<String>,
}

impl From<&QuestionEntity> for QuestionDto {
    fn from(question: &QuestionEntity) -> Self {
        Self {
            qid: question.qid,
            dimension: question.dimension.clone(),
            question: question.question.clone(),
            options: question.options.clone(),
        }
    }
}

/// A stored question set.
#[derive(Debug, Serialize, ToSchema)]
pub struct QuestionSetResponse {
    /// Identifier to send back when evaluating.
    pub session_id: Uuid,
    /// Number of questions.
    pub question_count: usize,
    /// Questions in `qid` order.
    pub questions: Vec<QuestionDto>,
    /// `llm` or `fallback`.
    pub source: String,
    /// Tags the set was themed on.
    pub tags: Vec<String>,
    /// Seconds before the stored set expires.
    pub expires_in: u64,
    /// Why the built-in set was used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl QuestionSetResponse {
    /// Describe `set`, expiring in `expires_in` seconds.
    pub fn new(set: &QuestionSetEntity, expires_in: u64, warning: Option<String>) -> Self {
        Self {
            session_id: set.id,
            question_count: set.questions.len(),
            questions: set.questions.iter().map(QuestionDto::from).collect(),
            source: set.source.clone(),
            tags: set.tags.clone(),
            expires_in,
            warning,
        }
    }
}

/// Body of `POST /questions/evaluate`.
///
/// Answers are read from `responses` first, then positionally from `answers`.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct EvaluateRequest {
    /// Identifier returned by `POST /questions`.
    #[serde(default)]
    pub session_id: String,
    /// Objects naming their question by `qid`, `question_id` or `question` text, with the
    /// answer under `answer`, `selected_option`, `selected`, `value`, `text` or `option_index`.
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub responses: Vec<Value>,
    /// One answer per stored question, in order. Numbers pick an option by index.
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub answers: Vec<Value>,
}

/// A stored question with the answer resolved from the submitted payload.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AnswerDto {
    /// Position of the question inside its set.
    pub qid: u32,
    /// Personality axis of the question, when known.
    pub dimension: Option<String>,
    /// Question text.
    pub question: String,
    /// Option text, or the free text the player sent.
    pub answer: String,
}

/// Personality verdict.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EvaluationResult {
    /// Four-letter trait code.
    pub mbti: String,
    /// One-sentence description of the code.
    pub intro: String,
}

/// Response of `POST /questions/evaluate`.
#[derive(Debug, Serialize, ToSchema)]
pub struct EvaluationResponse {
    /// Question set the answers belong to.
    pub session_id: Uuid,
    /// Verdict, from the language model or the default.
    pub result: EvaluationResult,
    /// Answers that could be matched to a stored question.
    pub responses: Vec<AnswerDto>,
    /// The full stored question set.
    pub questions: Vec<QuestionDto>,
    /// `llm` or `fallback`.
    pub source: String,
    /// Why the default verdict was returned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}
