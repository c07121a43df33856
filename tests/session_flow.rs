use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use spy_game_back::{
    config::AppConfig,
    dao::kv_store::MemoryStore,
    dto::session::{RegisterRequest, VoteRequest},
    error::ServiceError,
    routes,
    services::{question_service::LlmQuestionGenerator, session_service},
    state::{
        AppState, SharedState,
        outcome::Outcome,
        roles::{RandomSource, ThreadRandom},
        tally::Side,
    },
};

struct FirstIndex;

impl RandomSource for FirstIndex {
    fn pick_index(&self, _len: usize) -> usize {
        0
    }
}

async fn memory_state(random: Arc<dyn RandomSource>) -> SharedState {
    let state = AppState::with_parts(
        AppConfig::default(),
        random,
        Arc::new(LlmQuestionGenerator::disabled()),
    );
    state.set_kv_store(Arc::new(MemoryStore::new())).await;
    state
}

fn registration(name: &str, mbti: &str) -> RegisterRequest {
    RegisterRequest {
        player_name: name.into(),
        mbti: mbti.into(),
    }
}

async fn voting_session(state: &SharedState, traits: [&str; 3]) -> String {
    let code = session_service::create_session(state)
        .await
        .unwrap()
        .session_code;
    for (name, mbti) in ["Ada", "Bob", "Cy"].into_iter().zip(traits) {
        session_service::register_player(state, &code, registration(name, mbti))
            .await
            .unwrap();
    }
    session_service::check_readiness(state, &code).await.unwrap();
    session_service::start_voting(state, &code).await.unwrap();
    code
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_registration_never_overfills_roster() {
    let state = memory_state(Arc::new(ThreadRandom)).await;
    let code = session_service::create_session(&state)
        .await
        .unwrap()
        .session_code;

    let handles: Vec<_> = (0..10)
        .map(|index| {
            let state = state.clone();
            let code = code.clone();
            tokio::spawn(async move {
                session_service::register_player(
                    &state,
                    &code,
                    registration(&format!("player{index}"), "INTJ"),
                )
                .await
            })
        })
        .collect();

    let mut registered = Vec::new();
    for handle in handles {
        match handle.await.unwrap() {
            Ok(response) => registered.push(response.player_id),
            Err(ServiceError::InvalidState(_)) => {}
            Err(other) => panic!("unexpected registration failure: {other}"),
        }
    }
    registered.sort_unstable();
    assert_eq!(registered, vec![1, 2, 3]);

    let roster = session_service::list_players(&state, &code).await.unwrap();
    assert_eq!(roster.players.len(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_duplicate_names_register_once() {
    let state = memory_state(Arc::new(ThreadRandom)).await;
    let code = session_service::create_session(&state)
        .await
        .unwrap()
        .session_code;

    let handles: Vec<_> = ["Ada", "Ada", " Ada "]
        .into_iter()
        .map(|name| {
            let state = state.clone();
            let code = code.clone();
            tokio::spawn(async move {
                session_service::register_player(&state, &code, registration(name, "ENFP")).await
            })
        })
        .collect();

    let mut accepted = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(ServiceError::InvalidInput(_)) => rejected += 1,
            Err(other) => panic!("unexpected registration failure: {other}"),
        }
    }
    assert_eq!((accepted, rejected), (1, 2));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_votes_are_all_counted() {
    let state = memory_state(Arc::new(FirstIndex)).await;
    let code = voting_session(&state, ["INFJ", "INFJ", "ENTP"]).await;

    let ballots = [(1, json!(3)), (2, json!(3)), (3, json!(1))];
    let handles: Vec<_> = ballots
        .into_iter()
        .map(|(voter, target)| {
            let state = state.clone();
            let code = code.clone();
            tokio::spawn(async move {
                session_service::submit_vote(&state, &code, voter, VoteRequest { vote_for: target })
                    .await
            })
        })
        .collect();
    for handle in handles {
        assert!(!handle.await.unwrap().unwrap().is_pending());
    }

    let Outcome::Ready(results) = session_service::get_results(&state, &code).await.unwrap()
    else {
        panic!("every ballot should have been stored");
    };
    assert_eq!(results.verdict.total_ballots, 3);
    assert_eq!(results.verdict.winning_side, Side::Seekers);
    let winners: Vec<u32> = results.verdict.winners.iter().map(|p| p.id).collect();
    assert_eq!(winners, vec![1, 2]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_result_polls_tally_once() {
    let state = memory_state(Arc::new(FirstIndex)).await;
    let code = voting_session(&state, ["INFJ", "INFJ", "INFJ"]).await;
    for (voter, target) in [(1, json!("all_hidden")), (2, json!(1)), (3, json!("ALL_HIDDEN"))] {
        session_service::submit_vote(&state, &code, voter, VoteRequest { vote_for: target })
            .await
            .unwrap();
    }

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let state = state.clone();
            let code = code.clone();
            tokio::spawn(async move { session_service::get_results(&state, &code).await })
        })
        .collect();

    let mut bodies = Vec::new();
    for handle in handles {
        let Outcome::Ready(results) = handle.await.unwrap().unwrap() else {
            panic!("results should be ready");
        };
        bodies.push(serde_json::to_string(&results).unwrap());
    }
    bodies.dedup();
    assert_eq!(bodies.len(), 1);
    assert_eq!(state.tally_runs(), 1);
}

fn app(state: SharedState) -> Router {
    routes::router(state)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            request = request.header("content-type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn http_round_plays_to_results() {
    let app = app(memory_state(Arc::new(FirstIndex)).await);

    let (status, created) = send(&app, "POST", "/session", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["success"], json!(true));
    let code = created["session_code"].as_str().unwrap().to_lowercase();

    let (status, pending) = send(&app, "GET", &format!("/session/{code}/register/status"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pending["success"], json!(false));
    assert_eq!(pending["pending"], json!(true));
    assert_eq!(pending["registered_players"], json!(0));

    for (name, mbti) in [("Ada", "infj"), ("Bob", "INFJ"), ("Cy", "entp")] {
        let (status, body) = send(
            &app,
            "POST",
            &format!("/session/{code}/register"),
            Some(json!({ "player_name": name, "mbti": mbti })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
    }

    let (_, ready) = send(&app, "GET", &format!("/session/{code}/register/status"), None).await;
    assert_eq!(ready["status"], json!("ready"));
    assert_eq!(ready["hidden_trait"], json!("ENTP"));

    let (_, started) = send(&app, "POST", &format!("/session/{code}/vote/start"), None).await;
    assert_eq!(started["status"], json!("voting"));

    for (voter, target) in [(1, json!(3)), (2, json!("3")), (3, json!(2))] {
        let (status, body) = send(
            &app,
            "POST",
            &format!("/session/{code}/vote/{voter}"),
            Some(json!({ "vote_for": target })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
    }

    let (status, results) = send(&app, "GET", &format!("/session/{code}/results"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(results["success"], json!(true));
    assert_eq!(results["winning_side"], json!("seekers"));
    assert_eq!(results["tie"], json!(false));
}

#[tokio::test]
async fn http_errors_use_error_body() {
    let app = app(memory_state(Arc::new(FirstIndex)).await);

    let (status, body) = send(&app, "POST", "/session", Some(json!({ "expected_players": 4 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));

    let (_, created) = send(&app, "POST", "/session", None).await;
    let code = created["session_code"].as_str().unwrap().to_owned();

    let (status, body) = send(
        &app,
        "POST",
        &format!("/session/{code}/register"),
        Some(json!({ "player_name": "Ada", "mbti": "XXXX" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _) = send(&app, "GET", "/session/NOPE00/players", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn degraded_service_answers_503() {
    let state = AppState::with_parts(
        AppConfig::default(),
        Arc::new(ThreadRandom),
        Arc::new(LlmQuestionGenerator::disabled()),
    );
    let app = app(state);

    let (status, body) = send(&app, "POST", "/session", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["success"], json!(false));

    let (status, health) = send(&app, "GET", "/healthcheck", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], json!("degraded"));
}

#[tokio::test]
async fn http_quiz_is_generated_then_evaluated() {
    let app = app(memory_state(Arc::new(ThreadRandom)).await);

    let (status, set) = send(&app, "POST", "/questions", Some(json!({ "tags": "chess" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(set["source"], json!("fallback"));
    let session_id = set["session_id"].as_str().unwrap().to_owned();

    let (status, verdict) = send(
        &app,
        "POST",
        "/questions/evaluate",
        Some(json!({
            "session_id": session_id,
            "responses": [
                { "qid": 1, "answer": 0 },
                { "question_id": "2", "selected": { "option_index": 1 } },
            ],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{verdict}");
    assert_eq!(verdict["success"], json!(true));
    assert_eq!(verdict["result"]["mbti"], json!("INFP"));
    assert!(verdict["warning"].is_string());
    assert_eq!(verdict["responses"].as_array().unwrap().len(), 2);
    assert_eq!(
        verdict["responses"][1]["answer"],
        json!("Resting or reading at home")
    );

    let (status, body) = send(
        &app,
        "POST",
        "/questions/evaluate",
        Some(json!({ "session_id": session_id, "answers": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
}
