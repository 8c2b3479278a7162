use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    errors::{classify_service_error, ApiError, ErrorContext},
    models::*,
    sm2_scheduler::{Quality, ReviewButton},
    study_service::StudyService,
};

// Import logging macros
use crate::{log_api_error, log_api_start, log_api_success, log_api_warn};

type ApiResult<T> = Result<Json<ApiResponse<T>>, (StatusCode, Json<ApiResponse<()>>)>;

#[derive(Clone)]
pub struct AppState {
    pub study_service: StudyService,
}

/// Either a raw SM-2 quality or one of the review buttons.
#[derive(Deserialize)]
pub struct ReviewRequest {
    pub quality: Option<i64>,
    pub button: Option<ReviewButton>,
}

impl ReviewRequest {
    fn quality(&self) -> Result<Quality, ApiError> {
        match (self.quality, self.button) {
            (Some(quality), None) => Ok(Quality::new(quality)?),
            (None, Some(button)) => Ok(button.quality()),
            (Some(_), Some(_)) => Err(ApiError::ValidationError(
                "Provide either 'quality' or 'button', not both".to_string(),
            )),
            (None, None) => Err(ApiError::ValidationError(
                "Either 'quality' or 'button' is required".to_string(),
            )),
        }
    }
}

#[derive(Deserialize)]
pub struct BossBattleRequest {
    pub correct_answers: u32,
    pub total_questions: u32,
}

#[derive(Serialize)]
pub struct WeakestConcept {
    pub concept: Concept,
    pub proficiency: Proficiency,
}

#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

// Document endpoints
pub async fn create_document(
    State(state): State<AppState>,
    Json(request): Json<CreateDocumentRequest>,
) -> ApiResult<StudyDocument> {
    info!(
        title = %request.title,
        concept_count = request.concepts.len(),
        "Creating new document"
    );

    match state.study_service.create_document(request).await {
        Ok(document) => {
            log_api_success!("create_document", document_id = document.id, "document created");
            Ok(Json(ApiResponse::success(document)))
        }
        Err(e) => {
            let context = ErrorContext::new("create_document", "document");
            Err(classify_service_error(e).to_response_with_context(context))
        }
    }
}

pub async fn list_documents(State(state): State<AppState>) -> ApiResult<Vec<StudyDocument>> {
    log_api_start!("list_documents");

    match state.study_service.list_documents().await {
        Ok(documents) => {
            log_api_success!("list_documents", count = documents.len(), "documents listed");
            Ok(Json(ApiResponse::success(documents)))
        }
        Err(e) => {
            let context = ErrorContext::new("list_documents", "document");
            Err(ApiError::DatabaseError(e).to_response_with_context(context))
        }
    }
}

pub async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StudyDocument> {
    log_api_start!("get_document", document_id = id);

    match state.study_service.get_document(id).await {
        Ok(Some(document)) => {
            log_api_success!("get_document", document_id = id, "document retrieved");
            Ok(Json(ApiResponse::success(document)))
        }
        Ok(None) => {
            log_api_warn!("get_document", document_id = id, "document not found");
            let error = ApiError::NotFound(format!("Document with ID '{}' not found", id));
            let context = ErrorContext::new("get_document", "document").with_id(&id.to_string());
            Err(error.to_response_with_context(context))
        }
        Err(e) => {
            log_api_error!("get_document", document_id = id, error = e, "database error retrieving document");
            let context = ErrorContext::new("get_document", "document").with_id(&id.to_string());
            Err(ApiError::DatabaseError(e).to_response_with_context(context))
        }
    }
}

pub async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<()> {
    log_api_start!("delete_document", document_id = id);

    match state.study_service.delete_document(id).await {
        Ok(true) => {
            log_api_success!("delete_document", document_id = id, "document deleted");
            Ok(Json(ApiResponse::success(())))
        }
        Ok(false) => {
            let error = ApiError::NotFound(format!("Document with ID '{}' not found", id));
            let context = ErrorContext::new("delete_document", "document").with_id(&id.to_string());
            Err(error.to_response_with_context(context))
        }
        Err(e) => {
            let context = ErrorContext::new("delete_document", "document").with_id(&id.to_string());
            Err(classify_service_error(e).to_response_with_context(context))
        }
    }
}

// Flashcard endpoints
pub async fn add_flashcards(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<AddFlashcardsRequest>,
) -> ApiResult<Vec<Flashcard>> {
    log_api_start!("add_flashcards", document_id = id);

    match state.study_service.add_flashcards(id, request.cards).await {
        Ok(Some(cards)) => {
            log_api_success!("add_flashcards", count = cards.len(), "flashcards added");
            Ok(Json(ApiResponse::success(cards)))
        }
        Ok(None) => {
            let error = ApiError::NotFound(format!("Document with ID '{}' not found", id));
            let context = ErrorContext::new("add_flashcards", "document").with_id(&id.to_string());
            Err(error.to_response_with_context(context))
        }
        Err(e) => {
            let context = ErrorContext::new("add_flashcards", "flashcard").with_id(&id.to_string());
            Err(classify_service_error(e).to_response_with_context(context))
        }
    }
}

pub async fn get_due_flashcards(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<DueCards> {
    debug!(document_id = %id, "Getting due flashcards");

    match state.study_service.due_flashcards(id).await {
        Ok(Some(due)) => Ok(Json(ApiResponse::success(due))),
        Ok(None) => {
            let error = ApiError::NotFound(format!("Document with ID '{}' not found", id));
            let context = ErrorContext::new("get_due_flashcards", "document").with_id(&id.to_string());
            Err(error.to_response_with_context(context))
        }
        Err(e) => {
            let context = ErrorContext::new("get_due_flashcards", "flashcard").with_id(&id.to_string());
            Err(ApiError::DatabaseError(e).to_response_with_context(context))
        }
    }
}

pub async fn review_flashcard(
    State(state): State<AppState>,
    Path((document_id, card_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<ReviewRequest>,
) -> ApiResult<Flashcard> {
    log_api_start!("review_flashcard", card_id = card_id);

    let quality = match request.quality() {
        Ok(quality) => quality,
        Err(error) => {
            let context = ErrorContext::new("review_flashcard", "flashcard").with_id(&card_id.to_string());
            return Err(error.to_response_with_context(context));
        }
    };

    match state.study_service.review_flashcard(document_id, card_id, quality).await {
        Ok(Some(card)) => {
            log_api_success!("review_flashcard", card_id = card_id, format!("next review in {} days", card.interval));
            Ok(Json(ApiResponse::success(card)))
        }
        Ok(None) => {
            let error = ApiError::NotFound(format!("Flashcard with ID '{}' not found", card_id));
            let context = ErrorContext::new("review_flashcard", "flashcard").with_id(&card_id.to_string());
            Err(error.to_response_with_context(context))
        }
        Err(e) => {
            let context = ErrorContext::new("review_flashcard", "flashcard").with_id(&card_id.to_string());
            Err(classify_service_error(e).to_response_with_context(context))
        }
    }
}

pub async fn get_review_history(
    State(state): State<AppState>,
    Path((document_id, card_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Vec<ReviewRecord>> {
    match state.study_service.review_history(document_id, card_id).await {
        Ok(Some(reviews)) => Ok(Json(ApiResponse::success(reviews))),
        Ok(None) => {
            let error = ApiError::NotFound(format!("Flashcard with ID '{}' not found", card_id));
            let context = ErrorContext::new("get_review_history", "flashcard").with_id(&card_id.to_string());
            Err(error.to_response_with_context(context))
        }
        Err(e) => {
            let context = ErrorContext::new("get_review_history", "flashcard").with_id(&card_id.to_string());
            Err(ApiError::DatabaseError(e).to_response_with_context(context))
        }
    }
}

// Quiz endpoints
pub async fn answer_question(
    State(state): State<AppState>,
    Json(answer): Json<QuizAnswer>,
) -> ApiResult<QuizAnswerResult> {
    let (concept_id, _, _) = answer.grade();
    log_api_start!("answer_question", concept_id = concept_id);

    match state.study_service.answer_question(&answer).await {
        Ok(Some(result)) => {
            log_api_success!("answer_question", format!("{} XP awarded", result.xp_awarded));
            Ok(Json(ApiResponse::success(result)))
        }
        Ok(None) => {
            let error = ApiError::NotFound(format!("Concept with ID '{}' not found", concept_id));
            let context = ErrorContext::new("answer_question", "concept").with_id(&concept_id.to_string());
            Err(error.to_response_with_context(context))
        }
        Err(e) => {
            let context = ErrorContext::new("answer_question", "concept").with_id(&concept_id.to_string());
            Err(classify_service_error(e).to_response_with_context(context))
        }
    }
}

pub async fn get_weakest_concept(State(state): State<AppState>) -> ApiResult<Option<WeakestConcept>> {
    match state.study_service.weakest_concept().await {
        Ok(concept) => {
            let config = state.study_service.engine().config();
            let weakest = concept.map(|concept| WeakestConcept {
                proficiency: config.proficiency(concept.mastery_level),
                concept,
            });
            Ok(Json(ApiResponse::success(weakest)))
        }
        Err(e) => {
            let context = ErrorContext::new("get_weakest_concept", "concept");
            Err(ApiError::DatabaseError(e).to_response_with_context(context))
        }
    }
}

// Quest endpoints
pub async fn list_quests(State(state): State<AppState>) -> ApiResult<Vec<Quest>> {
    log_api_start!("list_quests");

    match state.study_service.list_quests().await {
        Ok(quests) => {
            log_api_success!("list_quests", count = quests.len(), "quests derived");
            Ok(Json(ApiResponse::success(quests)))
        }
        Err(e) => {
            let context = ErrorContext::new("list_quests", "quest");
            Err(ApiError::DatabaseError(e).to_response_with_context(context))
        }
    }
}

pub async fn resolve_boss_battle(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    Json(request): Json<BossBattleRequest>,
) -> ApiResult<BossBattleResult> {
    log_api_start!("resolve_boss_battle", document_id = document_id);

    match state
        .study_service
        .resolve_boss_battle(document_id, request.correct_answers, request.total_questions)
        .await
    {
        Ok(Some(result)) => {
            let outcome = if result.defeated { "boss defeated" } else { "boss survived" };
            log_api_success!("resolve_boss_battle", document_id = document_id, outcome);
            Ok(Json(ApiResponse::success(result)))
        }
        Ok(None) => {
            let error = ApiError::NotFound(format!("Document with ID '{}' not found", document_id));
            let context = ErrorContext::new("resolve_boss_battle", "quest").with_id(&document_id.to_string());
            Err(error.to_response_with_context(context))
        }
        Err(e) => {
            let context = ErrorContext::new("resolve_boss_battle", "quest").with_id(&document_id.to_string());
            Err(classify_service_error(e).to_response_with_context(context))
        }
    }
}

// Stats endpoints
pub async fn get_stats(State(state): State<AppState>) -> ApiResult<StatsSummary> {
    match state.study_service.get_stats().await {
        Ok(summary) => Ok(Json(ApiResponse::success(summary))),
        Err(e) => {
            let context = ErrorContext::new("get_stats", "stats");
            Err(ApiError::DatabaseError(e).to_response_with_context(context))
        }
    }
}

pub async fn reset_progress(State(state): State<AppState>) -> ApiResult<StatsSummary> {
    log_api_start!("reset_progress");

    match state.study_service.reset_progress().await {
        Ok(summary) => {
            log_api_success!("reset_progress", "progress reset");
            Ok(Json(ApiResponse::success(summary)))
        }
        Err(e) => {
            let context = ErrorContext::new("reset_progress", "stats");
            Err(ApiError::DatabaseError(e).to_response_with_context(context))
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Document routes
        .route("/api/documents", post(create_document))
        .route("/api/documents", get(list_documents))
        .route("/api/documents/:id", get(get_document))
        .route("/api/documents/:id", delete(delete_document))

        // Flashcard routes
        .route("/api/documents/:id/flashcards", post(add_flashcards))
        .route("/api/documents/:id/flashcards/due", get(get_due_flashcards))
        .route("/api/documents/:id/flashcards/:card_id/review", post(review_flashcard))
        .route("/api/documents/:id/flashcards/:card_id/reviews", get(get_review_history))

        // Quiz routes
        .route("/api/quiz/answer", post(answer_question))
        .route("/api/concepts/weakest", get(get_weakest_concept))

        // Quest routes
        .route("/api/quests", get(list_quests))
        .route("/api/quests/:document_id/boss", post(resolve_boss_battle))

        // Stats routes
        .route("/api/stats", get(get_stats))
        .route("/api/stats/reset", post(reset_progress))

        .with_state(state)
}
