use std::sync::Arc;

use axum::http::StatusCode;
use axum_test::TestServer;
use mastery_system::{api::*, Database, MasteryConfig, StudyService, TracingNotifier};
use serde_json::{json, Value};
use uuid::Uuid;

async fn create_test_server() -> TestServer {
    let db = Database::new("sqlite::memory:").await.unwrap();
    let study_service = StudyService::new(db, MasteryConfig::default(), Arc::new(TracingNotifier));
    let app_state = AppState { study_service };

    let app = create_router(app_state);
    TestServer::new(app).unwrap()
}

async fn create_document(server: &TestServer) -> Value {
    let request_body = json!({
        "title": "Rust",
        "content": "Ownership and borrowing",
        "summary": "Memory safety without a GC",
        "type": "pdf",
        "concepts": [
            { "name": "Ownership", "description": "Each value has one owner" },
            { "name": "Borrowing" },
            { "name": "Lifetimes" }
        ],
        "relationships": [
            { "source": "Ownership", "target": "Borrowing", "type": "prerequisite" },
            { "source": "Borrowing", "target": "Lifetimes", "type": "extension" }
        ]
    });

    let response = server.post("/api/documents").json(&request_body).await;
    response.assert_status_ok();
    let body: Value = response.json();
    body["data"].clone()
}

async fn answer(server: &TestServer, concept_id: &str, is_correct: bool) -> Value {
    let response = server
        .post("/api/quiz/answer")
        .json(&json!({ "concept_id": concept_id, "is_correct": is_correct }))
        .await;
    response.assert_status_ok();
    response.json()
}

#[tokio::test]
async fn test_api_create_document() {
    let server = create_test_server().await;
    let document = create_document(&server).await;

    assert_eq!(document["title"], "Rust");
    assert_eq!(document["type"], "pdf");
    assert_eq!(document["concepts"].as_array().unwrap().len(), 3);
    assert_eq!(document["concepts"][0]["mastery_level"], 25);
    assert_eq!(document["concepts"][0]["status"], "learning");
    assert_eq!(document["relationships"][0]["type"], "prerequisite");
    assert_eq!(document["relationships"][0]["source_id"], document["concepts"][0]["id"]);
}

#[tokio::test]
async fn test_api_create_document_validation() {
    let server = create_test_server().await;

    let response = server
        .post("/api/documents")
        .json(&json!({
            "title": "Rust",
            "content": "notes",
            "concepts": [{ "name": "Ownership" }],
            "relationships": [{ "source": "Ownership", "target": "Traits", "type": "related" }]
        }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("Traits"));

    let response = server
        .post("/api/documents")
        .json(&json!({ "title": "   ", "content": "notes" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_api_get_and_delete_document() {
    let server = create_test_server().await;
    let document = create_document(&server).await;
    let id = document["id"].as_str().unwrap();

    let response = server.get("/api/documents").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let response = server.get(&format!("/api/documents/{}", id)).await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["summary"], "Memory safety without a GC");

    server.delete(&format!("/api/documents/{}", id)).await.assert_status_ok();
    server
        .get(&format!("/api/documents/{}", id))
        .await
        .assert_status(StatusCode::NOT_FOUND);
    server
        .delete(&format!("/api/documents/{}", id))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_api_get_nonexistent_document() {
    let server = create_test_server().await;

    let fake_id = Uuid::new_v4();
    let response = server.get(&format!("/api/documents/{}", fake_id)).await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_api_flashcard_review_cycle() {
    let server = create_test_server().await;
    let document = create_document(&server).await;
    let id = document["id"].as_str().unwrap();

    let response = server
        .post(&format!("/api/documents/{}/flashcards", id))
        .json(&json!({
            "cards": [
                { "front": "Who owns a value?", "back": "Exactly one variable" },
                { "front": "What does & create?", "back": "A shared borrow" }
            ]
        }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    let cards = body["data"].as_array().unwrap();
    assert_eq!(cards.len(), 2);
    assert_eq!(cards[0]["interval"], 0);
    assert_eq!(cards[0]["ease_factor"], 2.5);
    let card_id = cards[0]["id"].as_str().unwrap().to_string();

    let response = server.get(&format!("/api/documents/{}/flashcards/due", id)).await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["due_count"], 2);

    let response = server
        .post(&format!("/api/documents/{}/flashcards/{}/review", id, card_id))
        .json(&json!({ "button": "good" }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["interval"], 1);
    assert_eq!(body["data"]["repetition_count"], 1);

    let response = server
        .post(&format!("/api/documents/{}/flashcards/{}/review", id, card_id))
        .json(&json!({ "quality": 5 }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["interval"], 6);

    let response = server.get(&format!("/api/documents/{}/flashcards/due", id)).await;
    let body: Value = response.json();
    assert_eq!(body["data"]["due_count"], 1);

    let response = server
        .get(&format!("/api/documents/{}/flashcards/{}/reviews", id, card_id))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_api_review_rejects_invalid_quality() {
    let server = create_test_server().await;
    let document = create_document(&server).await;
    let id = document["id"].as_str().unwrap();

    let response = server
        .post(&format!("/api/documents/{}/flashcards", id))
        .json(&json!({ "cards": [{ "front": "Q", "back": "A" }] }))
        .await;
    let body: Value = response.json();
    let card_id = body["data"][0]["id"].as_str().unwrap().to_string();

    let response = server
        .post(&format!("/api/documents/{}/flashcards/{}/review", id, card_id))
        .json(&json!({ "quality": 6 }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server
        .post(&format!("/api/documents/{}/flashcards/{}/review", id, Uuid::new_v4()))
        .json(&json!({ "quality": 4 }))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_api_quiz_answers() {
    let server = create_test_server().await;
    let document = create_document(&server).await;
    let concept_id = document["concepts"][0]["id"].as_str().unwrap().to_string();

    let body = answer(&server, &concept_id, true).await;
    assert_eq!(body["data"]["concept"]["mastery_level"], 37);
    assert_eq!(body["data"]["xp_awarded"], 50);
    assert_eq!(body["data"]["stats"]["xp"], 50);

    // Graded from the generated question
    let response = server
        .post("/api/quiz/answer")
        .json(&json!({
            "question": {
                "id": "boss-1",
                "concept_id": concept_id,
                "question": "Who owns a value?",
                "options": ["Exactly one variable", "Any variable"],
                "correct_answer": "Exactly one variable",
                "explanation": "Single ownership",
                "difficulty": "boss"
            },
            "selected_option": "Exactly one variable",
            "mode": "boss"
        }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["is_correct"], true);
    assert_eq!(body["data"]["xp_awarded"], 250);
    assert_eq!(body["data"]["concept"]["mastery_level"], 49);

    let response = server
        .post("/api/quiz/answer")
        .json(&json!({ "concept_id": Uuid::new_v4(), "is_correct": true }))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);

    let response = server.get("/api/stats").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["xp"], 300);
    assert_eq!(body["data"]["level"], 1);
    assert_eq!(body["data"]["accuracy"], 100.0);
    assert_eq!(body["data"]["xp_to_next_level"], 700);
    assert_eq!(body["data"]["history"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_api_boss_battle() {
    let server = create_test_server().await;
    let document = create_document(&server).await;
    let id = document["id"].as_str().unwrap();
    let concept_ids: Vec<String> = document["concepts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_str().unwrap().to_string())
        .collect();

    let response = server.get("/api/quests").await;
    let body: Value = response.json();
    assert_eq!(body["data"][0]["state"], "locked");
    assert_eq!(body["data"][0]["id"], format!("quest-{}", id));
    assert_eq!(body["data"][0]["badge"], "Rust Sage");

    let response = server
        .post(&format!("/api/quests/{}/boss", id))
        .json(&json!({ "correct_answers": 5, "total_questions": 5 }))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    for concept_id in &concept_ids {
        for _ in 0..3 {
            answer(&server, concept_id, true).await;
        }
    }

    let response = server.get("/api/quests").await;
    let body: Value = response.json();
    assert_eq!(body["data"][0]["state"], "unlocked");

    let response = server
        .post(&format!("/api/quests/{}/boss", id))
        .json(&json!({ "correct_answers": 6, "total_questions": 5 }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server
        .post(&format!("/api/quests/{}/boss", id))
        .json(&json!({ "correct_answers": 3, "total_questions": 5 }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["defeated"], false);
    assert_eq!(body["data"]["quest"]["state"], "unlocked");

    let response = server
        .post(&format!("/api/quests/{}/boss", id))
        .json(&json!({ "correct_answers": 4, "total_questions": 5 }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["defeated"], true);
    assert_eq!(body["data"]["quest"]["state"], "completed");
    assert_eq!(body["data"]["quest"]["average_mastery"], 100);
    assert_eq!(body["data"]["xp_awarded"], 1000);
    assert_eq!(body["data"]["stats"]["level"], 2);
    assert_eq!(body["data"]["stats"]["badges"], json!(["Rust Sage"]));

    let response = server
        .post(&format!("/api/quests/{}/boss", id))
        .json(&json!({ "correct_answers": 5, "total_questions": 5 }))
        .await;
    response.assert_status(StatusCode::CONFLICT);

    let response = server.get(&format!("/api/documents/{}", id)).await;
    let body: Value = response.json();
    for concept in body["data"]["concepts"].as_array().unwrap() {
        assert_eq!(concept["mastery_level"], 100);
        assert_eq!(concept["status"], "mastered");
    }
}

#[tokio::test]
async fn test_api_weakest_concept_and_reset() {
    let server = create_test_server().await;
    let document = create_document(&server).await;
    let strong_id = document["concepts"][0]["id"].as_str().unwrap().to_string();

    let response = server.get("/api/concepts/weakest").await;
    let body: Value = response.json();
    assert_eq!(body["data"]["proficiency"], "weak");

    answer(&server, &strong_id, true).await;
    let response = server.get("/api/concepts/weakest").await;
    let body: Value = response.json();
    assert_ne!(body["data"]["concept"]["id"], strong_id);
    assert_eq!(body["data"]["concept"]["mastery_level"], 25);

    let response = server.post("/api/stats/reset").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["xp"], 0);
    assert_eq!(body["data"]["level"], 1);
    assert_eq!(body["data"]["streak"], 0);
}
