//! Quiz question generation and answer evaluation through an OpenAI-compatible chat
//! completion endpoint.
//!
//! The model output is never trusted. Generated questions are parsed, normalized and counted,
//! verdicts must carry a valid trait code, and any failure falls back to built-in content so a
//! quiz can always start and always finish.

use std::{collections::HashSet, env, time::Duration, time::SystemTime};

use futures::future::BoxFuture;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::models::{QuestionEntity, QuestionSetEntity},
    dto::question::{
        AnswerDto, EvaluateRequest, EvaluationResponse, EvaluationResult, QuestionDto,
        QuestionRequest, QuestionSetResponse, TagsInput,
    },
    error::ServiceError,
    state::{
        SharedState,
        session::{InvalidTraitCode, TraitCode},
    },
};

/// Personality axes a question may declare.
const DIMENSION_CHOICES: [&str; 8] = ["E/I", "I/E", "S/N", "N/S", "T/F", "F/T", "J/P", "P/J"];
const DEFAULT_MODEL: &str = "deepseek-chat";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_MBTI: &str = "INFP";
const DEFAULT_INTRO: &str = "Idealistic, empathetic and creative.";
/// Keys holding the answer of a `responses` item, by priority.
const RESPONSE_ANSWER_KEYS: [&str; 5] = ["answer", "selected_option", "selected", "value", "text"];
/// Keys searched when an answer is itself an object.
const NESTED_ANSWER_KEYS: [&str; 8] = [
    "answer",
    "value",
    "text",
    "selected_option",
    "selected",
    "selectedOption",
    "selectedText",
    "option_index",
];

/// Question produced by a generator, before it gets its position in a set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedQuestion {
    /// Normalized axis such as `E/I`; `None` when the model gave none or an unknown one.
    pub dimension: Option<String>,
    /// Question text.
    pub question: String,
    /// Non-empty option texts.
    pub options: Vec<String>,
}

/// A stored question paired with the player's resolved answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnsweredQuestion {
    /// Position of the question inside its set.
    pub qid: u32,
    /// Personality axis of the question, when known.
    pub dimension: Option<String>,
    /// Question text.
    pub question: String,
    /// Options offered to the player.
    pub options: Vec<String>,
    /// Option text, or the free text the player sent.
    pub answer: String,
}

/// Raw verdict of an evaluator. The code is validated by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    /// Trait code as written by the evaluator.
    pub mbti: String,
    /// One-sentence description; may be empty.
    pub intro: String,
}

/// Failures of the external generator. All of them trigger the fallback set.
#[derive(Debug, Error)]
pub enum QuestionError {
    /// No endpoint or key was configured.
    #[error("language model connection is not configured")]
    NotConfigured,
    /// The HTTP client could not be built.
    #[error("failed to build HTTP client")]
    ClientBuilder(#[source] reqwest::Error),
    /// The request failed or the body could not be decoded.
    #[error("failed to reach language model service")]
    Request(#[source] reqwest::Error),
    /// The endpoint answered with a non-success status.
    #[error("language model service answered with status {0}")]
    Status(StatusCode),
    /// The completion carried no message.
    #[error("language model response has no message content")]
    MissingContent,
    /// The message is not a question set.
    #[error("language model content is not a valid question set")]
    InvalidContent,
    /// Fewer usable questions than requested.
    #[error("language model returned {got} usable question(s), {expected} needed")]
    TooFewQuestions {
        /// Usable questions received.
        got: usize,
        /// Questions requested.
        expected: usize,
    },
    /// The message is not an `{mbti, intro}` object.
    #[error("language model content is not a valid evaluation")]
    InvalidEvaluation,
    /// The verdict names no valid trait code.
    #[error("language model returned an unusable trait code")]
    UnusableTraitCode(#[source] InvalidTraitCode),
}

/// Source of quiz questions and of verdicts on the answers.
pub trait QuestionGenerator: Send + Sync {
    /// Produce at least `count` questions themed on `tags`.
    fn generate(
        &self,
        tags: &[String],
        count: usize,
    ) -> BoxFuture<'static, Result<Vec<GeneratedQuestion>, QuestionError>>;

    /// Judge a trait code from the answered questions.
    fn evaluate(
        &self,
        answers: &[AnsweredQuestion],
    ) -> BoxFuture<'static, Result<Evaluation, QuestionError>>;
}

/// Connection settings of the chat completion endpoint.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Endpoint root; `/chat/completions` is appended.
    pub base_url: String,
    /// Bearer token.
    pub api_key: String,
    /// Model name sent with every request.
    pub model: String,
    /// Whole-request timeout.
    pub timeout: Duration,
}

impl LlmConfig {
    /// Read `LLM_BASE_URL`, `LLM_API_KEY`, `LLM_MODEL` and `LLM_TIMEOUT_SECS`.
    ///
    /// Returns `None` unless both the URL and the key are set.
    pub fn from_env() -> Option<Self> {
        let base_url = env::var("LLM_BASE_URL").ok().filter(|v| !v.trim().is_empty())?;
        let api_key = env::var("LLM_API_KEY").ok().filter(|v| !v.trim().is_empty())?;
        let model = env::var("LLM_MODEL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.into());
        let timeout = env::var("LLM_TIMEOUT_SECS")
            .ok()
            .and_then(|raw| raw.trim().parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT);

        Some(Self {
            base_url,
            api_key,
            model,
            timeout,
        })
    }
}

/// [`QuestionGenerator`] calling `POST {base_url}/chat/completions`.
#[derive(Clone)]
pub struct LlmQuestionGenerator {
    client: Client,
    config: Option<LlmConfig>,
}

impl LlmQuestionGenerator {
    /// Generator bound to `config`.
    pub fn new(config: LlmConfig) -> Result<Self, QuestionError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(QuestionError::ClientBuilder)?;
        Ok(Self {
            client,
            config: Some(config),
        })
    }

    /// Generator that always reports [`QuestionError::NotConfigured`].
    pub fn disabled() -> Self {
        Self {
            client: Client::new(),
            config: None,
        }
    }

    /// Configure from the environment, disabled when the variables are missing.
    pub fn from_env() -> Self {
        let Some(config) = LlmConfig::from_env() else {
            info!("LLM_BASE_URL/LLM_API_KEY not set; quiz questions use the built-in set");
            return Self::disabled();
        };
        match Self::new(config) {
            Ok(generator) => generator,
            Err(err) => {
                warn!(error = %err, "failed to configure language model client");
                Self::disabled()
            }
        }
    }
}

#[derive(Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Value,
}

impl LlmQuestionGenerator {
    /// Send one user prompt and return the text of the first choice.
    fn complete(
        &self,
        system: &'static str,
        prompt: String,
        temperature: f64,
    ) -> BoxFuture<'static, Result<String, QuestionError>> {
        let client = self.client.clone();
        let config = self.config.clone();

        Box::pin(async move {
            let config = config.ok_or(QuestionError::NotConfigured)?;
            let url = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));
            let body = json!({
                "model": config.model,
                "messages": [
                    { "role": "system", "content": system },
                    { "role": "user", "content": prompt },
                ],
                "stream": false,
                "temperature": temperature,
                "response_format": { "type": "json_object" },
            });

            let response = client
                .post(&url)
                .bearer_auth(&config.api_key)
                .json(&body)
                .send()
                .await
                .map_err(QuestionError::Request)?;
            if !response.status().is_success() {
                return Err(QuestionError::Status(response.status()));
            }
            let completion: ChatCompletion =
                response.json().await.map_err(QuestionError::Request)?;

            let content = completion
                .choices
                .into_iter()
                .next()
                .and_then(|choice| message_text(choice.message.content))
                .ok_or(QuestionError::MissingContent)?;
            debug!(bytes = content.len(), "language model answered");
            Ok(content)
        })
    }
}

impl QuestionGenerator for LlmQuestionGenerator {
    fn generate(
        &self,
        tags: &[String],
        count: usize,
    ) -> BoxFuture<'static, Result<Vec<GeneratedQuestion>, QuestionError>> {
        let completion = self.complete(
            "You write short multiple-choice personality quiz questions. Reply with JSON only.",
            build_prompt(tags, count),
            0.7,
        );

        Box::pin(async move {
            let questions = parse_questions(&completion.await?).ok_or(QuestionError::InvalidContent)?;
            if questions.len() < count {
                return Err(QuestionError::TooFewQuestions {
                    got: questions.len(),
                    expected: count,
                });
            }
            Ok(questions)
        })
    }

    fn evaluate(
        &self,
        answers: &[AnsweredQuestion],
    ) -> BoxFuture<'static, Result<Evaluation, QuestionError>> {
        let completion = self.complete(
            "You judge MBTI types from quiz answers. Reply with JSON only.",
            build_evaluation_prompt(answers),
            0.3,
        );

        Box::pin(async move {
            parse_evaluation(&completion.await?).ok_or(QuestionError::InvalidEvaluation)
        })
    }
}

fn message_text(content: Value) -> Option<String> {
    match content {
        Value::String(text) => Some(text),
        Value::Array(parts) => Some(
            parts
                .iter()
                .filter_map(|part| match part {
                    Value::String(text) => Some(text.as_str()),
                    Value::Object(map) => map.get("text").and_then(Value::as_str),
                    _ => None,
                })
                .collect(),
        ),
        _ => None,
    }
}

fn build_prompt(tags: &[String], count: usize) -> String {
    let mut prompt = format!(
        "Write {count} multiple-choice questions that reveal a person's MBTI preferences. \
         Give each question a dimension among E/I, S/N, T/F, J/P and three short options. \
         Answer as {{\"questions\": [{{\"dimension\": \"E/I\", \"question\": \"...\", \
         \"options\": [\"...\", \"...\", \"...\"]}}]}}."
    );
    if !tags.is_empty() {
        prompt.push_str(&format!(
            " Theme the situations around these player interests: {}.",
            tags.join(", ")
        ));
    }
    prompt
}

fn build_evaluation_prompt(answers: &[AnsweredQuestion]) -> String {
    let mut prompt =
        String::from("Judge the MBTI type of the person who gave these quiz answers.\n");
    for (position, answered) in answers.iter().enumerate() {
        let dimension = answered.dimension.as_deref().unwrap_or("unknown");
        prompt.push_str(&format!(
            "{}. Dimension: {dimension} | Question: {}",
            position + 1,
            answered.question
        ));
        if !answered.options.is_empty() {
            prompt.push_str(&format!(" | Options: {}", answered.options.join(" / ")));
        }
        prompt.push_str(&format!(" | Answer: {}\n", answered.answer));
    }
    prompt.push_str(
        "Answer as {\"mbti\": \"XXXX\", \"intro\": \"one-sentence description\"} and nothing else.",
    );
    prompt
}

/// Decode model content: strict JSON first, then the outermost `{...}` block.
fn parse_json_object(content: &str) -> Option<Value> {
    let content = content.trim();
    if content.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str(content) {
        return Some(value);
    }
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&content[start..=end]).ok()
}

/// Extract well-formed questions from model content; `None` when nothing usable remains.
pub fn parse_questions(content: &str) -> Option<Vec<GeneratedQuestion>> {
    let value = parse_json_object(content)?;
    let items = match &value {
        Value::Object(map) => map.get("questions")?.as_array()?,
        Value::Array(items) => items,
        _ => return None,
    };

    let questions: Vec<GeneratedQuestion> = items.iter().filter_map(normalize_question).collect();
    (!questions.is_empty()).then_some(questions)
}

/// Read an `{mbti, intro}` verdict from model content. The code is returned unvalidated.
pub fn parse_evaluation(content: &str) -> Option<Evaluation> {
    let value = parse_json_object(content)?;
    let map = value.as_object()?;
    let mbti = value_text(map.get("mbti")?);
    if mbti.is_empty() {
        return None;
    }
    let intro = map.get("intro").map(value_text).unwrap_or_default();
    Some(Evaluation { mbti, intro })
}

fn normalize_question(item: &Value) -> Option<GeneratedQuestion> {
    let map = item.as_object()?;
    let question = value_text(map.get("question")?);
    if question.is_empty() {
        return None;
    }

    let dimension = map
        .get("dimension")
        .map(value_text)
        .map(|raw| raw.to_uppercase().replace(' ', ""))
        .filter(|dimension| DIMENSION_CHOICES.contains(&dimension.as_str()));

    let options = map
        .get("options")
        .and_then(Value::as_array)
        .map(|options| {
            options
                .iter()
                .map(value_text)
                .filter(|option| !option.is_empty())
                .collect()
        })
        .unwrap_or_default();

    Some(GeneratedQuestion {
        dimension,
        question,
        options,
    })
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.trim().to_owned(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Option at `index`, read 0-based first and 1-based when that overflows.
fn option_at(index: usize, options: &[String]) -> Option<&str> {
    options
        .get(index)
        .or_else(|| index.checked_sub(1).and_then(|index| options.get(index)))
        .map(String::as_str)
}

/// Turn a submitted answer into text. Digits select an option; objects are searched for an
/// answer-like key; lists are joined. Returns an empty string when nothing usable is found.
pub fn resolve_answer(raw: &Value, options: &[String]) -> String {
    match raw {
        Value::Null => String::new(),
        Value::Bool(flag) => flag.to_string(),
        Value::Object(map) => NESTED_ANSWER_KEYS
            .iter()
            .filter_map(|key| map.get(*key))
            .map(|value| resolve_answer(value, options))
            .find(|answer| !answer.is_empty())
            .unwrap_or_default(),
        Value::Array(items) => items
            .iter()
            .map(value_text)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        Value::String(text) => {
            let text = text.trim();
            let selected = (!text.is_empty() && text.bytes().all(|byte| byte.is_ascii_digit()))
                .then(|| text.parse::<usize>().ok())
                .flatten()
                .and_then(|index| option_at(index, options));
            selected.unwrap_or(text).to_owned()
        }
        Value::Number(number) => {
            let Some(index) = number
                .as_i64()
                .or_else(|| number.as_f64().map(|value| value.trunc() as i64))
            else {
                return number.to_string();
            };
            usize::try_from(index)
                .ok()
                .and_then(|index| option_at(index, options))
                .map(str::to_owned)
                .unwrap_or_else(|| index.to_string())
        }
    }
}

fn answer_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(text) => !text.trim().is_empty(),
        _ => true,
    }
}

fn qid_of(value: &Value) -> Option<u32> {
    match value {
        Value::Number(number) => number.as_u64().and_then(|qid| u32::try_from(qid).ok()),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn answered(question: &QuestionEntity, raw: &Value) -> Option<AnsweredQuestion> {
    let answer = resolve_answer(raw, &question.options);
    (!answer.is_empty()).then(|| AnsweredQuestion {
        qid: question.qid,
        dimension: question.dimension.clone(),
        question: question.question.clone(),
        options: question.options.clone(),
        answer,
    })
}

/// Pair submitted answers with stored questions.
///
/// `responses` items find their question by `qid`/`question_id`, then by exact question text.
/// When none of them resolves, `answers` is read positionally. Unmatched or empty answers are
/// dropped.
pub fn collect_answers(
    questions: &[QuestionEntity],
    request: &EvaluateRequest,
) -> Vec<AnsweredQuestion> {
    let from_responses: Vec<AnsweredQuestion> = request
        .responses
        .iter()
        .filter_map(|item| {
            let item = item.as_object()?;
            let by_qid = ["qid", "question_id"]
                .iter()
                .find_map(|key| item.get(*key).and_then(qid_of))
                .and_then(|qid| questions.iter().find(|question| question.qid == qid));
            let question = by_qid.or_else(|| {
                let text = value_text(item.get("question")?);
                questions
                    .iter()
                    .find(|question| !text.is_empty() && question.question == text)
            })?;
            let raw = RESPONSE_ANSWER_KEYS
                .iter()
                .filter_map(|key| item.get(*key))
                .find(|value| answer_present(value))
                .or_else(|| item.get("option_index"))?;
            answered(question, raw)
        })
        .collect();
    if !from_responses.is_empty() {
        return from_responses;
    }

    questions
        .iter()
        .zip(&request.answers)
        .filter_map(|(question, raw)| answered(question, raw))
        .collect()
}

/// Split tags on `,`, `，`, `/`, `|`, `\`, `;` and whitespace, dropping case-insensitive duplicates.
pub fn extract_tags(input: Option<&TagsInput>) -> Vec<String> {
    let raw: Vec<&str> = match input {
        None => Vec::new(),
        Some(TagsInput::One(text)) => vec![text.as_str()],
        Some(TagsInput::Many(items)) => items.iter().map(String::as_str).collect(),
    };

    let mut seen = HashSet::new();
    raw.into_iter()
        .flat_map(|text| {
            text.split(|c: char| matches!(c, ',' | '，' | '/' | '|' | '\\' | ';') || c.is_whitespace())
        })
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .filter(|tag| seen.insert(tag.to_lowercase()))
        .map(str::to_owned)
        .collect()
}

/// Built-in question set used whenever the model cannot be used.
pub fn default_questions() -> Vec<GeneratedQuestion> {
    let raw: [(&str, &str, [&str; 3]); 8] = [
        (
            "E/I",
            "At a party full of strangers, what do you do?",
            [
                "Start chatting with new people",
                "Stay with the people I already know",
                "Quietly take in the atmosphere",
            ],
        ),
        (
            "E/I",
            "Which weekend plan sounds best?",
            [
                "A lively social event",
                "Resting or reading at home",
                "A small get-together with one or two close friends",
            ],
        ),
        (
            "N/S",
            "When reading a novel, what catches your attention?",
            [
                "The symbols and hidden meanings",
                "What the characters concretely do",
                "The overall mood",
            ],
        ),
        (
            "N/S",
            "Facing a new problem, you tend to...",
            [
                "Look for new approaches and possibilities",
                "Rely on past experience and facts",
                "Mix intuition with practical constraints",
            ],
        ),
        (
            "F/T",
            "A friend shares their worries with you. You usually...",
            [
                "Comfort them and empathize",
                "Offer logical advice",
                "Listen patiently without stepping in",
            ],
        ),
        (
            "F/T",
            "In a team discussion, what matters most to you?",
            [
                "Everyone feels respected and heard",
                "Finding the most effective solution",
                "Balancing feelings and efficiency",
            ],
        ),
        (
            "J/P",
            "When planning a trip, you prefer to...",
            [
                "Build a detailed itinerary in advance",
                "Go wherever the day takes you",
                "Set a rough direction and stay flexible",
            ],
        ),
        (
            "J/P",
            "Given a work assignment, you usually...",
            [
                "Finish it step by step according to plan",
                "Do it whenever the mood strikes",
                "Sketch a framework first, then adapt",
            ],
        ),
    ];

    raw.into_iter()
        .map(|(dimension, question, options)| GeneratedQuestion {
            dimension: Some(dimension.to_owned()),
            question: question.to_owned(),
            options: options.into_iter().map(str::to_owned).collect(),
        })
        .collect()
}

/// Generate a question set, falling back to the built-in one, and store it for the quiz.
pub async fn generate_questions(
    state: &SharedState,
    request: QuestionRequest,
) -> Result<QuestionSetResponse, ServiceError> {
    let repository = state.question_repository().await?;
    let settings = &state.config().questions;
    let tags = extract_tags(request.tags.as_ref());

    let (generated, source, warning) = match state
        .question_generator()
        .generate(&tags, settings.count)
        .await
    {
        Ok(questions) => (questions, "llm", None),
        Err(err) => {
            warn!(error = %err, "question generation failed; serving built-in set");
            (
                default_questions(),
                "fallback",
                Some(format!("{err}; built-in questions were used instead")),
            )
        }
    };

    let set = QuestionSetEntity {
        id: Uuid::new_v4(),
        questions: generated
            .into_iter()
            .take(settings.count)
            .zip(1..)
            .map(|(question, qid)| QuestionEntity {
                qid,
                dimension: question.dimension,
                question: question.question,
                options: question.options,
            })
            .collect(),
        source: source.to_owned(),
        tags,
        created_at: SystemTime::now(),
    };
    repository.save(&set).await?;
    info!(
        session_id = %set.id,
        source,
        questions = set.questions.len(),
        "question set stored"
    );

    Ok(QuestionSetResponse::new(
        &set,
        settings.ttl.as_secs(),
        warning,
    ))
}

/// Fetch a stored question set while it is still alive.
pub async fn get_question_set(
    state: &SharedState,
    id: Uuid,
) -> Result<QuestionSetResponse, ServiceError> {
    let repository = state.question_repository().await?;
    let set = repository
        .load(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("question set `{id}` does not exist")))?;
    let remaining = SystemTime::now()
        .duration_since(set.created_at)
        .ok()
        .and_then(|elapsed| state.config().questions.ttl.checked_sub(elapsed))
        .unwrap_or_default();

    Ok(QuestionSetResponse::new(&set, remaining.as_secs(), None))
}

/// Judge the answers given to a stored question set.
///
/// The verdict falls back to a default code, with a `warning`, when the evaluator fails or
/// names an invalid code.
pub async fn evaluate_answers(
    state: &SharedState,
    request: EvaluateRequest,
) -> Result<EvaluationResponse, ServiceError> {
    let session_id = request.session_id.trim();
    if session_id.is_empty() {
        return Err(ServiceError::InvalidInput("session_id is required".into()));
    }
    let not_found = || {
        ServiceError::NotFound(format!(
            "question set `{session_id}` does not exist or has expired"
        ))
    };
    let id = Uuid::parse_str(session_id).map_err(|_| not_found())?;
    let repository = state.question_repository().await?;
    let set = repository.load(id).await?.ok_or_else(not_found)?;

    let answers = collect_answers(&set.questions, &request);
    if answers.is_empty() {
        return Err(ServiceError::InvalidInput(
            "no answer matches a question of this set".into(),
        ));
    }

    let verdict = state
        .question_generator()
        .evaluate(&answers)
        .await
        .and_then(|evaluation| {
            TraitCode::parse(&evaluation.mbti)
                .map(|code| (code, evaluation.intro))
                .map_err(QuestionError::UnusableTraitCode)
        });
    let (result, source, warning) = match verdict {
        Ok((code, intro)) => {
            let intro = if intro.is_empty() {
                DEFAULT_INTRO.to_owned()
            } else {
                intro
            };
            let result = EvaluationResult {
                mbti: code.as_str().to_owned(),
                intro,
            };
            (result, "llm", None)
        }
        Err(err) => {
            warn!(session_id = %set.id, error = %err, "answer evaluation failed; serving default result");
            let result = EvaluationResult {
                mbti: DEFAULT_MBTI.to_owned(),
                intro: DEFAULT_INTRO.to_owned(),
            };
            (
                result,
                "fallback",
                Some(format!("{err}; a default result was returned instead")),
            )
        }
    };
    info!(
        session_id = %set.id,
        answers = answers.len(),
        mbti = %result.mbti,
        source,
        "answers evaluated"
    );

    Ok(EvaluationResponse {
        session_id: set.id,
        result,
        responses: answers
            .into_iter()
            .map(|answered| AnswerDto {
                qid: answered.qid,
                dimension: answered.dimension,
                question: answered.question,
                answer: answered.answer,
            })
            .collect(),
        questions: set.questions.iter().map(QuestionDto::from).collect(),
        source: source.to_owned(),
        warning,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::kv_store::MemoryStore,
        state::{AppState, roles::ThreadRandom},
    };

    struct CannedGenerator {
        questions: Vec<GeneratedQuestion>,
        verdict: Option<Evaluation>,
        seen: std::sync::Mutex<Vec<AnsweredQuestion>>,
    }

    impl CannedGenerator {
        fn new(questions: Vec<GeneratedQuestion>, verdict: Option<Evaluation>) -> Self {
            Self {
                questions,
                verdict,
                seen: std::sync::Mutex::new(Vec::new()),
            }
        }
    }

    impl QuestionGenerator for CannedGenerator {
        fn generate(
            &self,
            _tags: &[String],
            _count: usize,
        ) -> BoxFuture<'static, Result<Vec<GeneratedQuestion>, QuestionError>> {
            let questions = self.questions.clone();
            Box::pin(async move { Ok(questions) })
        }

        fn evaluate(
            &self,
            answers: &[AnsweredQuestion],
        ) -> BoxFuture<'static, Result<Evaluation, QuestionError>> {
            *self.seen.lock().unwrap() = answers.to_vec();
            let verdict = self.verdict.clone();
            Box::pin(async move { verdict.ok_or(QuestionError::InvalidEvaluation) })
        }
    }

    fn verdict(mbti: &str, intro: &str) -> Option<Evaluation> {
        Some(Evaluation {
            mbti: mbti.into(),
            intro: intro.into(),
        })
    }

    fn stored(qid: u32, options: &[&str]) -> QuestionEntity {
        QuestionEntity {
            qid,
            dimension: Some("E/I".into()),
            question: format!("Question {qid}?"),
            options: options.iter().map(|option| option.to_string()).collect(),
        }
    }

    async fn state_with(generator: Arc<dyn QuestionGenerator>) -> SharedState {
        let state = AppState::with_parts(AppConfig::default(), Arc::new(ThreadRandom), generator);
        state.set_kv_store(Arc::new(MemoryStore::new())).await;
        state
    }

    #[test]
    fn tags_are_split_and_deduplicated() {
        let tags = extract_tags(Some(&TagsInput::One(
            "Hiking, hiking/chess|Jazz；music  \\ go;".into(),
        )));
        assert_eq!(tags, vec!["Hiking", "chess", "Jazz；music", "go"]);

        let tags = extract_tags(Some(&TagsInput::Many(vec![
            "cats dogs".into(),
            "CATS".into(),
        ])));
        assert_eq!(tags, vec!["cats", "dogs"]);
        assert!(extract_tags(None).is_empty());
    }

    #[test]
    fn content_wrapped_in_prose_is_parsed() {
        let content = r#"Sure! {"questions": [
            {"dimension": "e / i", "question": " Party? ", "options": [" Yes ", "", "No"]},
            {"dimension": "X/Y", "question": "Plans?", "options": "none"},
            {"dimension": "T/F", "question": "   ", "options": ["a"]}
        ]} Enjoy."#;

        let questions = parse_questions(content).unwrap();
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].dimension.as_deref(), Some("E/I"));
        assert_eq!(questions[0].question, "Party?");
        assert_eq!(questions[0].options, vec!["Yes", "No"]);
        assert_eq!(questions[1].dimension, None);
        assert!(questions[1].options.is_empty());
    }

    #[test]
    fn unusable_content_is_rejected() {
        assert!(parse_questions("").is_none());
        assert!(parse_questions("no json here").is_none());
        assert!(parse_questions(r#"{"questions": []}"#).is_none());
        assert!(parse_questions(r#"{"items": [1]}"#).is_none());
    }

    #[test]
    fn array_message_content_is_joined() {
        let text = message_text(json!(["{\"a\":", {"type": "text", "text": "1}"}]));
        assert_eq!(text.as_deref(), Some("{\"a\":1}"));
        assert_eq!(message_text(Value::Null), None);
    }

    #[test]
    fn fallback_set_is_complete() {
        let questions = default_questions();
        assert_eq!(questions.len(), 8);
        assert!(questions.iter().all(|q| q.options.len() == 3));
    }

    #[tokio::test]
    async fn disabled_generator_falls_back() {
        let state = state_with(Arc::new(LlmQuestionGenerator::disabled())).await;

        let response = generate_questions(&state, QuestionRequest::default())
            .await
            .unwrap();

        assert_eq!(response.source, "fallback");
        assert_eq!(response.question_count, 8);
        assert!(response.warning.is_some());
        let qids: Vec<u32> = response.questions.iter().map(|q| q.qid).collect();
        assert_eq!(qids, (1..=8).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn generated_set_is_truncated_and_stored() {
        let mut questions = default_questions();
        questions.extend(default_questions());
        let state = state_with(Arc::new(CannedGenerator::new(questions, None))).await;

        let response = generate_questions(
            &state,
            QuestionRequest {
                tags: Some(TagsInput::One("board games".into())),
            },
        )
        .await
        .unwrap();

        assert_eq!(response.source, "llm");
        assert_eq!(response.question_count, 8);
        assert_eq!(response.tags, vec!["board", "games"]);

        let stored = get_question_set(&state, response.session_id).await.unwrap();
        assert_eq!(stored.question_count, 8);
        assert!(stored.expires_in <= 30 * 60);
    }

    #[tokio::test]
    async fn unknown_question_set_is_not_found() {
        let state = state_with(Arc::new(LlmQuestionGenerator::disabled())).await;
        assert!(matches!(
            get_question_set(&state, Uuid::new_v4()).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[test]
    fn answers_select_options_by_index_or_text() {
        let options: Vec<String> = ["Alone", "With friends", "Either"]
            .into_iter()
            .map(String::from)
            .collect();

        assert_eq!(resolve_answer(&json!(0), &options), "Alone");
        assert_eq!(resolve_answer(&json!(" 2 "), &options), "Either");
        assert_eq!(resolve_answer(&json!(3), &options), "Either");
        assert_eq!(resolve_answer(&json!(7), &options), "7");
        assert_eq!(resolve_answer(&json!(-1), &options), "-1");
        assert_eq!(resolve_answer(&json!(" my own words "), &options), "my own words");
        assert_eq!(resolve_answer(&json!(["a", " ", "b"]), &options), "a, b");
        assert_eq!(
            resolve_answer(&json!({"selected": "", "selectedText": "Either"}), &options),
            "Either"
        );
        assert_eq!(resolve_answer(&json!({"option_index": 1}), &options), "With friends");
        assert_eq!(resolve_answer(&Value::Null, &options), "");
        assert_eq!(resolve_answer(&json!({"other": 1}), &options), "");
    }

    #[test]
    fn responses_match_by_qid_alias_or_question_text() {
        let questions = vec![stored(1, &["A", "B"]), stored(2, &["C", "D"]), stored(3, &[])];
        let request = EvaluateRequest {
            session_id: String::new(),
            responses: vec![
                json!({"qid": 1, "answer": 1}),
                json!({"question_id": "2", "answer": "", "selected_option": "C"}),
                json!({"question": "Question 3?", "value": "free text"}),
                json!({"qid": 9, "answer": "A"}),
                json!({"qid": 1}),
                json!("not an object"),
            ],
            answers: vec![json!(0), json!(0), json!("ignored")],
        };

        let answers = collect_answers(&questions, &request);
        let pairs: Vec<(u32, &str)> = answers
            .iter()
            .map(|answered| (answered.qid, answered.answer.as_str()))
            .collect();
        assert_eq!(pairs, vec![(1, "B"), (2, "C"), (3, "free text")]);
    }

    #[test]
    fn positional_answers_are_used_when_responses_resolve_nothing() {
        let questions = vec![stored(1, &["A", "B"]), stored(2, &["C", "D"])];
        let request = EvaluateRequest {
            session_id: String::new(),
            responses: vec![json!({"qid": 5, "answer": "A"})],
            answers: vec![json!(""), json!({"text": "D"}), json!("extra")],
        };

        let answers = collect_answers(&questions, &request);
        assert_eq!(answers.len(), 1);
        assert_eq!((answers[0].qid, answers[0].answer.as_str()), (2, "D"));
    }

    #[test]
    fn evaluation_content_is_read_leniently() {
        let evaluation = parse_evaluation(r#"Result: {"mbti": " entp ", "intro": "Debater."}"#)
            .unwrap();
        assert_eq!(evaluation.mbti, "entp");
        assert_eq!(evaluation.intro, "Debater.");
        assert_eq!(parse_evaluation(r#"{"mbti": "INTJ"}"#).unwrap().intro, "");
        assert!(parse_evaluation(r#"{"intro": "x"}"#).is_none());
        assert!(parse_evaluation("[]").is_none());
    }

    async fn stored_set(state: &SharedState) -> Uuid {
        generate_questions(state, QuestionRequest::default())
            .await
            .unwrap()
            .session_id
    }

    #[tokio::test]
    async fn evaluator_verdict_is_validated_and_returned() {
        let generator = Arc::new(CannedGenerator::new(
            default_questions(),
            verdict("entj", "Commander."),
        ));
        let state = state_with(generator.clone()).await;
        let id = stored_set(&state).await;

        let response = evaluate_answers(
            &state,
            EvaluateRequest {
                session_id: format!(" {} ", id.simple()),
                responses: vec![json!({"qid": 1, "option_index": 0})],
                answers: Vec::new(),
            },
        )
        .await
        .unwrap();

        assert_eq!(response.source, "llm");
        assert_eq!(response.result.mbti, "ENTJ");
        assert_eq!(response.result.intro, "Commander.");
        assert!(response.warning.is_none());
        assert_eq!(response.questions.len(), 8);
        assert_eq!(response.responses.len(), 1);
        assert_eq!(response.responses[0].answer, "Start chatting with new people");

        let seen = generator.seen.lock().unwrap().clone();
        assert_eq!(seen[0].options.len(), 3);
    }

    #[tokio::test]
    async fn invalid_verdict_falls_back_with_warning() {
        for generator in [
            Arc::new(CannedGenerator::new(default_questions(), verdict("XXXX", "?")))
                as Arc<dyn QuestionGenerator>,
            Arc::new(CannedGenerator::new(default_questions(), None)),
            Arc::new(LlmQuestionGenerator::disabled()),
        ] {
            let state = state_with(generator).await;
            let id = stored_set(&state).await;

            let response = evaluate_answers(
                &state,
                EvaluateRequest {
                    session_id: id.to_string(),
                    responses: Vec::new(),
                    answers: vec![json!(0), json!(1)],
                },
            )
            .await
            .unwrap();

            assert_eq!(response.source, "fallback");
            assert_eq!(response.result.mbti, DEFAULT_MBTI);
            assert_eq!(response.result.intro, DEFAULT_INTRO);
            assert!(response.warning.is_some());
            assert_eq!(response.responses.len(), 2);
        }
    }

    async fn evaluate(
        state: &SharedState,
        session_id: String,
        answers: Vec<Value>,
    ) -> Result<EvaluationResponse, ServiceError> {
        evaluate_answers(
            state,
            EvaluateRequest {
                session_id,
                responses: Vec::new(),
                answers,
            },
        )
        .await
    }

    #[tokio::test]
    async fn evaluation_rejects_missing_or_unknown_sets() {
        let state = state_with(Arc::new(LlmQuestionGenerator::disabled())).await;
        let id = stored_set(&state).await;

        assert!(matches!(
            evaluate(&state, "  ".into(), vec![json!(0)]).await,
            Err(ServiceError::InvalidInput(_))
        ));
        assert!(matches!(
            evaluate(&state, "not-a-uuid".into(), vec![json!(0)]).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            evaluate(&state, Uuid::new_v4().to_string(), vec![json!(0)]).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            evaluate(&state, id.to_string(), vec![json!(""), Value::Null]).await,
            Err(ServiceError::InvalidInput(_))
        ));
    }
}
