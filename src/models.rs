use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::sm2_scheduler::INITIAL_EASE_FACTOR;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConceptStatus {
    Weak,
    Learning,
    Strong,
    Mastered,
}

impl ConceptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConceptStatus::Weak => "weak",
            ConceptStatus::Learning => "learning",
            ConceptStatus::Strong => "strong",
            ConceptStatus::Mastered => "mastered",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "weak" => Some(ConceptStatus::Weak),
            "learning" => Some(ConceptStatus::Learning),
            "strong" => Some(ConceptStatus::Strong),
            "mastered" => Some(ConceptStatus::Mastered),
            _ => None,
        }
    }
}

/// A unit of knowledge extracted from a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concept {
    pub id: Uuid,
    pub document_id: Uuid,
    pub name: String,
    pub description: String,
    pub mastery_level: u8, // 0-100
    pub status: ConceptStatus,
}

impl Concept {
    /// Freshly ingested concepts start in the learning phase.
    pub fn new(document_id: Uuid, name: String, description: String, initial_mastery: u8) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_id,
            name,
            description,
            mastery_level: initial_mastery.min(100),
            status: ConceptStatus::Learning,
        }
    }
}

/// Read-only proficiency label derived from a mastery percentage. It never
/// feeds back into `Concept::status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Proficiency {
    Weak,
    Developing,
    Proficient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationshipType {
    Prerequisite,
    Related,
    Extension,
}

impl RelationshipType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipType::Prerequisite => "prerequisite",
            RelationshipType::Related => "related",
            RelationshipType::Extension => "extension",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "prerequisite" => Some(RelationshipType::Prerequisite),
            "related" => Some(RelationshipType::Related),
            "extension" => Some(RelationshipType::Extension),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptRelationship {
    pub source_id: Uuid,
    pub target_id: Uuid,
    #[serde(rename = "type")]
    pub kind: RelationshipType,
}

/// Spaced-repetition review unit. Carries no concept id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flashcard {
    pub id: Uuid,
    pub document_id: Uuid,
    pub front: String,
    pub back: String,
    pub interval: u32, // days
    pub ease_factor: f64,
    pub repetition_count: u32,
    pub next_review_at: DateTime<Utc>,
    pub last_reviewed_at: Option<DateTime<Utc>>,
}

impl Flashcard {
    /// A new card is immediately due.
    pub fn new(document_id: Uuid, front: String, back: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_id,
            front,
            back,
            interval: 0,
            ease_factor: INITIAL_EASE_FACTOR,
            repetition_count: 0,
            next_review_at: now,
            last_reviewed_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Pdf,
    Video,
    #[default]
    Notes,
    Audio,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Pdf => "pdf",
            DocumentType::Video => "video",
            DocumentType::Notes => "notes",
            DocumentType::Audio => "audio",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pdf" => Some(DocumentType::Pdf),
            "video" => Some(DocumentType::Video),
            "notes" => Some(DocumentType::Notes),
            "audio" => Some(DocumentType::Audio),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyDocument {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub summary: Option<String>,
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    pub uploaded_at: DateTime<Utc>,
    pub concepts: Vec<Concept>,
    pub relationships: Vec<ConceptRelationship>,
    pub flashcards: Vec<Flashcard>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    Boss,
}

/// Question produced by the quiz/boss generator. Only `concept_id` and the
/// derived correctness reach the mastery engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub id: String,
    pub concept_id: Uuid,
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub explanation: String,
    pub difficulty: Difficulty,
}

impl QuizQuestion {
    pub fn is_correct(&self, selected_option: &str) -> bool {
        self.correct_answer == selected_option
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QuizMode {
    #[default]
    Daily,
    Boss,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XpHistoryEntry {
    pub date: NaiveDate,
    pub xp: u64,
}

/// Account-wide progression. `level` is always derived from `xp`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStats {
    pub xp: u64,
    pub level: u32,
    pub streak: u32,
    pub last_active_on: Option<NaiveDate>,
    pub total_questions_answered: u32,
    pub correct_answers: u32,
    pub badges: Vec<String>,
    pub history: Vec<XpHistoryEntry>,
}

impl Default for UserStats {
    fn default() -> Self {
        Self {
            xp: 0,
            level: 1,
            streak: 0,
            last_active_on: None,
            total_questions_answered: 0,
            correct_answers: 0,
            badges: Vec::new(),
            history: Vec::new(),
        }
    }
}

impl UserStats {
    /// Percentage of answered questions that were correct.
    pub fn accuracy(&self) -> f64 {
        if self.total_questions_answered == 0 {
            return 0.0;
        }
        self.correct_answers as f64 / self.total_questions_answered as f64 * 100.0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsSummary {
    #[serde(flatten)]
    pub stats: UserStats,
    pub accuracy: f64,
    pub xp_into_level: u64,
    pub xp_to_next_level: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestState {
    Locked,
    Unlocked,
    Completed,
}

/// One quest per document; locked/unlocked is recomputed from mastery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quest {
    pub id: String,
    pub document_id: Uuid,
    pub title: String,
    pub description: String,
    pub badge: String,
    pub state: QuestState,
    pub average_mastery: u8,
}

impl Quest {
    pub fn quest_id(document_id: Uuid) -> String {
        format!("quest-{}", document_id)
    }

    pub fn is_completed(&self) -> bool {
        self.state == QuestState::Completed
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub id: Uuid,
    pub flashcard_id: Uuid,
    pub quality: u8,
    pub interval: u32,
    pub ease_factor: f64,
    pub reviewed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewConcept {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Relationship between two concepts of the same request, referenced by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRelationship {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub kind: RelationshipType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDocumentRequest {
    pub title: String,
    pub content: String,
    pub summary: Option<String>,
    #[serde(rename = "type", default)]
    pub doc_type: DocumentType,
    #[serde(default)]
    pub concepts: Vec<NewConcept>,
    #[serde(default)]
    pub relationships: Vec<NewRelationship>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewFlashcard {
    pub front: String,
    pub back: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddFlashcardsRequest {
    pub cards: Vec<NewFlashcard>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DueCards {
    pub document_id: Uuid,
    pub due_count: usize,
    pub cards: Vec<Flashcard>,
}

/// A quiz answer either already graded by the caller or carrying the
/// generated question and the option the learner picked.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QuizAnswer {
    Graded {
        concept_id: Uuid,
        is_correct: bool,
        #[serde(default)]
        mode: QuizMode,
    },
    Selected {
        question: QuizQuestion,
        selected_option: String,
        #[serde(default)]
        mode: QuizMode,
    },
}

impl QuizAnswer {
    /// Concept id, correctness and mode of the answer.
    pub fn grade(&self) -> (Uuid, bool, QuizMode) {
        match self {
            QuizAnswer::Graded {
                concept_id,
                is_correct,
                mode,
            } => (*concept_id, *is_correct, *mode),
            QuizAnswer::Selected {
                question,
                selected_option,
                mode,
            } => (question.concept_id, question.is_correct(selected_option), *mode),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizAnswerResult {
    pub concept: Concept,
    pub is_correct: bool,
    pub xp_awarded: u64,
    pub stats: UserStats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BossBattleResult {
    pub quest: Quest,
    pub defeated: bool,
    pub correct_answers: u32,
    pub total_questions: u32,
    pub xp_awarded: u64,
    pub stats: UserStats,
}
