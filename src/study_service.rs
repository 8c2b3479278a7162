use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::MasteryConfig;
use crate::database::Database;
use crate::errors::ServiceError;
use crate::mastery_engine::{BossBattleOutcome, MasteryEngine};
use crate::models::*;
use crate::notifications::{Notification, NotificationSink, Severity};
use crate::sm2_scheduler::{Quality, Sm2Scheduler};

// Import logging macros
use crate::{log_progression, log_service_start, log_service_success, log_service_warn};

const SERVICE: &str = "study_service";

/// Runs the scheduler and the mastery engine against the store. Every
/// read-modify-write of learner state holds `write_lock` for its duration.
#[derive(Clone)]
pub struct StudyService {
    db: Database,
    scheduler: Sm2Scheduler,
    engine: MasteryEngine,
    notifier: Arc<dyn NotificationSink>,
    write_lock: Arc<Mutex<()>>,
}

impl StudyService {
    pub fn new(db: Database, config: MasteryConfig, notifier: Arc<dyn NotificationSink>) -> Self {
        Self {
            db,
            scheduler: Sm2Scheduler::new(),
            engine: MasteryEngine::new(config),
            notifier,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn engine(&self) -> &MasteryEngine {
        &self.engine
    }

    // Document operations
    pub async fn create_document(&self, request: CreateDocumentRequest) -> Result<StudyDocument> {
        let start = Instant::now();
        log_service_start!(SERVICE, "create_document");

        let title = request.title.trim();
        if title.is_empty() {
            return Err(ServiceError::InvalidRequest("document title cannot be empty".to_string()).into());
        }

        let id = Uuid::new_v4();
        let initial_mastery = self.engine.config().initial_mastery;

        let mut concepts: Vec<Concept> = Vec::with_capacity(request.concepts.len());
        let mut by_name: HashMap<String, Uuid> = HashMap::new();
        for new_concept in request.concepts {
            let name = new_concept.name.trim().to_string();
            if name.is_empty() {
                return Err(ServiceError::InvalidRequest("concept name cannot be empty".to_string()).into());
            }
            let concept = Concept::new(id, name.clone(), new_concept.description, initial_mastery);
            if by_name.insert(name.to_lowercase(), concept.id).is_some() {
                return Err(ServiceError::InvalidRequest(format!("duplicate concept '{}'", name)).into());
            }
            concepts.push(concept);
        }

        let mut relationships = Vec::with_capacity(request.relationships.len());
        for relationship in request.relationships {
            let resolve = |name: &str| {
                by_name.get(&name.trim().to_lowercase()).copied().ok_or_else(|| {
                    ServiceError::InvalidRequest(format!("relationship references unknown concept '{}'", name))
                })
            };
            relationships.push(ConceptRelationship {
                source_id: resolve(&relationship.source)?,
                target_id: resolve(&relationship.target)?,
                kind: relationship.kind,
            });
        }

        let document = StudyDocument {
            id,
            title: title.to_string(),
            content: request.content,
            summary: request.summary,
            doc_type: request.doc_type,
            uploaded_at: Utc::now(),
            concepts,
            relationships,
            flashcards: Vec::new(),
        };

        self.db.create_document(&document).await?;

        log_service_success!(SERVICE, "create_document", document_id = id, duration_ms = start.elapsed().as_millis() as u64);
        Ok(document)
    }

    pub async fn get_document(&self, id: Uuid) -> Result<Option<StudyDocument>> {
        self.db.get_document(id).await
    }

    pub async fn list_documents(&self) -> Result<Vec<StudyDocument>> {
        self.db.list_documents().await
    }

    pub async fn delete_document(&self, id: Uuid) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        self.db.delete_document(id).await
    }

    // Flashcard operations
    pub async fn add_flashcards(&self, document_id: Uuid, cards: Vec<NewFlashcard>) -> Result<Option<Vec<Flashcard>>> {
        if cards.is_empty() {
            return Err(ServiceError::InvalidRequest("at least one flashcard is required".to_string()).into());
        }
        if cards.iter().any(|c| c.front.trim().is_empty() || c.back.trim().is_empty()) {
            return Err(ServiceError::InvalidRequest("flashcards need both a front and a back".to_string()).into());
        }

        if self.db.get_document(document_id).await?.is_none() {
            return Ok(None);
        }

        let now = Utc::now();
        let flashcards: Vec<Flashcard> = cards
            .into_iter()
            .map(|card| Flashcard::new(document_id, card.front, card.back, now))
            .collect();

        self.db.add_flashcards(&flashcards).await?;
        log_service_success!(SERVICE, "add_flashcards", format!("{} cards added", flashcards.len()));

        Ok(Some(flashcards))
    }

    pub async fn due_flashcards(&self, document_id: Uuid) -> Result<Option<DueCards>> {
        if self.db.get_document(document_id).await?.is_none() {
            return Ok(None);
        }

        let cards = self.db.get_flashcards_for_document(document_id).await?;
        let due = Sm2Scheduler::due_cards(&cards, Utc::now());

        Ok(Some(DueCards {
            document_id,
            due_count: due.len(),
            cards: due,
        }))
    }

    pub async fn review_flashcard(&self, document_id: Uuid, card_id: Uuid, quality: Quality) -> Result<Option<Flashcard>> {
        let start = Instant::now();
        log_service_start!(SERVICE, "review_flashcard", card_id = card_id);

        let _guard = self.write_lock.lock().await;

        let card = match self.db.get_flashcard(document_id, card_id).await? {
            Some(card) => card,
            None => return Ok(None),
        };

        let now = Utc::now();
        let was_due = Sm2Scheduler::is_due(&card, now);
        let (updated_card, review_log) = self.scheduler.schedule_with_quality(&card, quality, now);

        self.db.save_review(&updated_card, &review_log).await?;

        if was_due {
            let remaining = self.db.get_flashcards_for_document(document_id).await?;
            if !remaining.iter().any(|c| Sm2Scheduler::is_due(c, now)) {
                self.notifier.notify(Notification::new(
                    "Review session complete! No cards left due.",
                    Severity::Info,
                ));
            }
        }

        log_service_success!(SERVICE, "review_flashcard", card_id = card_id, duration_ms = start.elapsed().as_millis() as u64);
        Ok(Some(updated_card))
    }

    pub async fn review_history(&self, document_id: Uuid, card_id: Uuid) -> Result<Option<Vec<ReviewRecord>>> {
        if self.db.get_flashcard(document_id, card_id).await?.is_none() {
            return Ok(None);
        }
        Ok(Some(self.db.get_reviews_for_flashcard(card_id).await?))
    }

    // Quiz operations
    pub async fn answer_question(&self, answer: &QuizAnswer) -> Result<Option<QuizAnswerResult>> {
        let (concept_id, is_correct, mode) = answer.grade();
        log_service_start!(SERVICE, "answer_question", concept_id = concept_id);

        let _guard = self.write_lock.lock().await;

        let concept = match self.db.get_concept(concept_id).await? {
            Some(concept) => concept,
            None => {
                log_service_warn!(SERVICE, "answer_question", format!("concept {} not found", concept_id));
                return Ok(None);
            }
        };

        let updated = self.engine.apply_quiz_result(&concept, is_correct);
        log_progression!(mastery, concept_id = concept_id, from = concept.mastery_level, to = updated.mastery_level);

        let today = Utc::now().date_naive();
        let stats = self.db.load_stats().await?;
        let stats = self.engine.record_answer(&stats, is_correct);
        let xp_awarded = self.engine.quiz_xp(mode, is_correct);
        let award = self.engine.award_xp(&stats, xp_awarded, today);
        log_progression!(xp, amount = xp_awarded, total = award.stats.xp, level = award.stats.level);

        self.db.save_quiz_outcome(&updated, &award.stats).await?;
        self.notifier.publish_events(&award.events);

        Ok(Some(QuizAnswerResult {
            concept: updated,
            is_correct,
            xp_awarded,
            stats: award.stats,
        }))
    }

    // Quest operations
    pub async fn list_quests(&self) -> Result<Vec<Quest>> {
        let documents = self.db.list_documents().await?;
        let completed = self.db.completed_quests().await?;

        Ok(documents
            .iter()
            .map(|doc| self.engine.quest_for(doc, completed.contains(&doc.id)))
            .collect())
    }

    pub async fn get_quest(&self, document_id: Uuid) -> Result<Option<Quest>> {
        let document = match self.db.get_document(document_id).await? {
            Some(document) => document,
            None => return Ok(None),
        };
        let completed = self.db.is_quest_completed(document_id).await?;
        Ok(Some(self.engine.quest_for(&document, completed)))
    }

    /// Score a finished boss battery for a document's quest. Passing masters
    /// every concept of the document and completes the quest for good.
    pub async fn resolve_boss_battle(&self, document_id: Uuid, correct: u32, total: u32) -> Result<Option<BossBattleResult>> {
        let start = Instant::now();
        log_service_start!(SERVICE, "resolve_boss_battle", document_id = document_id);

        let _guard = self.write_lock.lock().await;

        let document = match self.db.get_document(document_id).await? {
            Some(document) => document,
            None => return Ok(None),
        };
        let completed = self.db.is_quest_completed(document_id).await?;
        let quest = self.engine.quest_for(&document, completed);

        let today = Utc::now().date_naive();
        let stats = self.db.load_stats().await?;

        let result = match self.engine.resolve_boss_battle(&quest, &document.concepts, correct, total, &stats, today)? {
            BossBattleOutcome::Defeated(defeat) => {
                self.db.save_boss_defeat(document_id, &defeat.concepts, &defeat.stats).await?;
                self.notifier.publish_events(&defeat.events);
                log_progression!(boss, quest_id = quest.id, "defeated");

                let document = StudyDocument {
                    concepts: defeat.concepts,
                    ..document
                };
                BossBattleResult {
                    quest: self.engine.quest_for(&document, true),
                    defeated: true,
                    correct_answers: correct,
                    total_questions: total,
                    xp_awarded: defeat.xp_awarded,
                    stats: defeat.stats,
                }
            }
            BossBattleOutcome::Failed { correct, total } => {
                log_progression!(boss, quest_id = quest.id, format!("failed with {}/{}", correct, total));
                self.notifier.notify(Notification::new(
                    format!("The boss survived ({}/{} correct). Keep practicing and try again.", correct, total),
                    Severity::Error,
                ));
                BossBattleResult {
                    quest,
                    defeated: false,
                    correct_answers: correct,
                    total_questions: total,
                    xp_awarded: 0,
                    stats,
                }
            }
        };

        log_service_success!(SERVICE, "resolve_boss_battle", document_id = document_id, duration_ms = start.elapsed().as_millis() as u64);
        Ok(Some(result))
    }

    /// Weakest concept across every document, if one is below the weak threshold.
    pub async fn weakest_concept(&self) -> Result<Option<Concept>> {
        let concepts: Vec<Concept> = self
            .db
            .list_documents()
            .await?
            .into_iter()
            .flat_map(|doc| doc.concepts)
            .collect();

        Ok(self.engine.weakest_concept(&concepts).cloned())
    }

    // Learner stats
    pub async fn get_stats(&self) -> Result<StatsSummary> {
        let stats = self.db.load_stats().await?;
        Ok(self.engine.stats_summary(&stats))
    }

    pub async fn reset_progress(&self) -> Result<StatsSummary> {
        let _guard = self.write_lock.lock().await;

        let stats = self.db.load_stats().await?;
        let reset = self.engine.reset_progress(&stats);
        self.db.save_stats(&reset).await?;

        log_service_success!(SERVICE, "reset_progress", "learner progress reset");
        Ok(self.engine.stats_summary(&reset))
    }
}
