use std::collections::HashSet;
use std::str::FromStr;
use std::time::Instant;

use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::*;
use crate::sm2_scheduler::ReviewLog;

// Import logging macros
use crate::log_db_operation;

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.foreign_keys(true);

        // Every connection to an in-memory database must stay open or the data is lost
        let pool = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(options)
                .await?
        };

        let db = Database { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                summary TEXT,
                doc_type TEXT NOT NULL DEFAULT 'notes',
                uploaded_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS concepts (
                id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL,
                position INTEGER NOT NULL,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                mastery_level INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'learning',
                FOREIGN KEY (document_id) REFERENCES documents(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS concept_relationships (
                document_id TEXT NOT NULL,
                source_id TEXT NOT NULL,
                target_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                PRIMARY KEY (source_id, target_id, kind),
                FOREIGN KEY (document_id) REFERENCES documents(id) ON DELETE CASCADE,
                FOREIGN KEY (source_id) REFERENCES concepts(id) ON DELETE CASCADE,
                FOREIGN KEY (target_id) REFERENCES concepts(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS flashcards (
                id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL,
                front TEXT NOT NULL,
                back TEXT NOT NULL,
                interval INTEGER NOT NULL DEFAULT 0,
                ease_factor REAL NOT NULL DEFAULT 2.5,
                repetition_count INTEGER NOT NULL DEFAULT 0,
                next_review_at TEXT NOT NULL,
                last_reviewed_at TEXT,
                created_seq INTEGER NOT NULL,
                FOREIGN KEY (document_id) REFERENCES documents(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS reviews (
                id TEXT PRIMARY KEY,
                flashcard_id TEXT NOT NULL,
                quality INTEGER NOT NULL,
                interval INTEGER NOT NULL,
                ease_factor REAL NOT NULL,
                reviewed_at TEXT NOT NULL,
                FOREIGN KEY (flashcard_id) REFERENCES flashcards(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_stats (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                xp INTEGER NOT NULL DEFAULT 0,
                level INTEGER NOT NULL DEFAULT 1,
                streak INTEGER NOT NULL DEFAULT 0,
                last_active_on TEXT,
                total_questions_answered INTEGER NOT NULL DEFAULT 0,
                correct_answers INTEGER NOT NULL DEFAULT 0
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS badges (
                name TEXT PRIMARY KEY,
                position INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS xp_history (
                date TEXT PRIMARY KEY,
                xp INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS quests_completed (
                document_id TEXT PRIMARY KEY,
                completed_at TEXT NOT NULL,
                FOREIGN KEY (document_id) REFERENCES documents(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        log_db_operation!(info, "migrate", "schema ready");
        Ok(())
    }

    // Document operations
    pub async fn create_document(&self, document: &StudyDocument) -> Result<()> {
        let start = Instant::now();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO documents (id, title, content, summary, doc_type, uploaded_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(document.id.to_string())
        .bind(&document.title)
        .bind(&document.content)
        .bind(&document.summary)
        .bind(document.doc_type.as_str())
        .bind(document.uploaded_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        for (position, concept) in document.concepts.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO concepts (id, document_id, position, name, description, mastery_level, status)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(concept.id.to_string())
            .bind(document.id.to_string())
            .bind(position as i64)
            .bind(&concept.name)
            .bind(&concept.description)
            .bind(concept.mastery_level as i64)
            .bind(concept.status.as_str())
            .execute(&mut *tx)
            .await?;
        }

        for relationship in &document.relationships {
            sqlx::query(
                r#"
                INSERT OR IGNORE INTO concept_relationships (document_id, source_id, target_id, kind)
                VALUES (?1, ?2, ?3, ?4)
                "#,
            )
            .bind(document.id.to_string())
            .bind(relationship.source_id.to_string())
            .bind(relationship.target_id.to_string())
            .bind(relationship.kind.as_str())
            .execute(&mut *tx)
            .await?;
        }

        insert_flashcards(&mut tx, &document.flashcards).await?;

        tx.commit().await?;

        log_db_operation!(debug, "create_document", document_id = document.id, duration_ms = start.elapsed().as_millis() as u64);
        Ok(())
    }

    pub async fn get_document(&self, id: Uuid) -> Result<Option<StudyDocument>> {
        let row = sqlx::query("SELECT * FROM documents WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate_document(&row).await?)),
            None => Ok(None),
        }
    }

    pub async fn list_documents(&self) -> Result<Vec<StudyDocument>> {
        let start = Instant::now();
        let rows = sqlx::query("SELECT * FROM documents ORDER BY uploaded_at DESC")
            .fetch_all(&self.pool)
            .await?;

        let mut documents = Vec::with_capacity(rows.len());
        for row in &rows {
            documents.push(self.hydrate_document(row).await?);
        }

        log_db_operation!(debug, "list_documents", count = documents.len(), duration_ms = start.elapsed().as_millis() as u64);
        Ok(documents)
    }

    /// Concepts, relationships, flashcards and quest completion go with it.
    pub async fn delete_document(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn hydrate_document(&self, row: &SqliteRow) -> Result<StudyDocument> {
        let id = Uuid::parse_str(&row.get::<String, _>("id"))?;
        let doc_type: String = row.get("doc_type");

        Ok(StudyDocument {
            id,
            title: row.get("title"),
            content: row.get("content"),
            summary: row.get("summary"),
            doc_type: DocumentType::parse(&doc_type).unwrap_or_default(),
            uploaded_at: parse_timestamp(&row.get::<String, _>("uploaded_at"))?,
            concepts: self.get_concepts_for_document(id).await?,
            relationships: self.get_relationships_for_document(id).await?,
            flashcards: self.get_flashcards_for_document(id).await?,
        })
    }

    // Concept operations
    pub async fn get_concepts_for_document(&self, document_id: Uuid) -> Result<Vec<Concept>> {
        let rows = sqlx::query("SELECT * FROM concepts WHERE document_id = ?1 ORDER BY position")
            .bind(document_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_concept).collect()
    }

    pub async fn get_concept(&self, id: Uuid) -> Result<Option<Concept>> {
        let row = sqlx::query("SELECT * FROM concepts WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_concept).transpose()
    }

    async fn get_relationships_for_document(&self, document_id: Uuid) -> Result<Vec<ConceptRelationship>> {
        let rows = sqlx::query("SELECT * FROM concept_relationships WHERE document_id = ?1")
            .bind(document_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        let mut relationships = Vec::with_capacity(rows.len());
        for row in rows {
            let kind: String = row.get("kind");
            relationships.push(ConceptRelationship {
                source_id: Uuid::parse_str(&row.get::<String, _>("source_id"))?,
                target_id: Uuid::parse_str(&row.get::<String, _>("target_id"))?,
                kind: RelationshipType::parse(&kind)
                    .ok_or_else(|| anyhow!("Unknown relationship type '{}'", kind))?,
            });
        }

        Ok(relationships)
    }

    /// Persist a quiz outcome: the concept's new mastery and the learner's stats.
    pub async fn save_quiz_outcome(&self, concept: &Concept, stats: &UserStats) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        update_concept(&mut tx, concept).await?;
        write_stats(&mut tx, stats).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Persist a boss defeat in one transaction: mastered concepts, stats and
    /// the terminal quest completion.
    pub async fn save_boss_defeat(
        &self,
        document_id: Uuid,
        concepts: &[Concept],
        stats: &UserStats,
    ) -> Result<()> {
        let start = Instant::now();
        let mut tx = self.pool.begin().await?;

        for concept in concepts {
            update_concept(&mut tx, concept).await?;
        }
        write_stats(&mut tx, stats).await?;

        sqlx::query("INSERT OR IGNORE INTO quests_completed (document_id, completed_at) VALUES (?1, ?2)")
            .bind(document_id.to_string())
            .bind(Utc::now().to_rfc3339())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        log_db_operation!(debug, "save_boss_defeat", document_id = document_id, duration_ms = start.elapsed().as_millis() as u64);
        Ok(())
    }

    // Flashcard operations
    pub async fn add_flashcards(&self, cards: &[Flashcard]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        insert_flashcards(&mut tx, cards).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn get_flashcards_for_document(&self, document_id: Uuid) -> Result<Vec<Flashcard>> {
        let rows = sqlx::query("SELECT * FROM flashcards WHERE document_id = ?1 ORDER BY created_seq")
            .bind(document_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_flashcard).collect()
    }

    pub async fn get_flashcard(&self, document_id: Uuid, card_id: Uuid) -> Result<Option<Flashcard>> {
        let row = sqlx::query("SELECT * FROM flashcards WHERE id = ?1 AND document_id = ?2")
            .bind(card_id.to_string())
            .bind(document_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_flashcard).transpose()
    }

    /// Store the rescheduled card and append its review log entry together.
    pub async fn save_review(&self, card: &Flashcard, log: &ReviewLog) -> Result<ReviewRecord> {
        let review = ReviewRecord {
            id: Uuid::new_v4(),
            flashcard_id: card.id,
            quality: log.quality,
            interval: log.scheduled_days,
            ease_factor: log.ease_factor,
            reviewed_at: log.reviewed_at,
        };

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE flashcards
            SET interval = ?1, ease_factor = ?2, repetition_count = ?3,
                next_review_at = ?4, last_reviewed_at = ?5
            WHERE id = ?6
            "#,
        )
        .bind(card.interval as i64)
        .bind(card.ease_factor)
        .bind(card.repetition_count as i64)
        .bind(card.next_review_at.to_rfc3339())
        .bind(card.last_reviewed_at.map(|d| d.to_rfc3339()))
        .bind(card.id.to_string())
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO reviews (id, flashcard_id, quality, interval, ease_factor, reviewed_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
        )
        .bind(review.id.to_string())
        .bind(review.flashcard_id.to_string())
        .bind(review.quality as i64)
        .bind(review.interval as i64)
        .bind(review.ease_factor)
        .bind(review.reviewed_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(review)
    }

    pub async fn get_reviews_for_flashcard(&self, flashcard_id: Uuid) -> Result<Vec<ReviewRecord>> {
        let rows = sqlx::query("SELECT * FROM reviews WHERE flashcard_id = ?1 ORDER BY reviewed_at, rowid")
            .bind(flashcard_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        let mut reviews = Vec::with_capacity(rows.len());
        for row in rows {
            reviews.push(ReviewRecord {
                id: Uuid::parse_str(&row.get::<String, _>("id"))?,
                flashcard_id: Uuid::parse_str(&row.get::<String, _>("flashcard_id"))?,
                quality: row.get::<i64, _>("quality") as u8,
                interval: row.get::<i64, _>("interval") as u32,
                ease_factor: row.get("ease_factor"),
                reviewed_at: parse_timestamp(&row.get::<String, _>("reviewed_at"))?,
            });
        }

        Ok(reviews)
    }

    // Learner profile operations
    pub async fn load_stats(&self) -> Result<UserStats> {
        let row = sqlx::query("SELECT * FROM user_stats WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;

        let mut stats = match row {
            Some(row) => UserStats {
                xp: row.get::<i64, _>("xp") as u64,
                level: row.get::<i64, _>("level") as u32,
                streak: row.get::<i64, _>("streak") as u32,
                last_active_on: row
                    .get::<Option<String>, _>("last_active_on")
                    .map(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d"))
                    .transpose()?,
                total_questions_answered: row.get::<i64, _>("total_questions_answered") as u32,
                correct_answers: row.get::<i64, _>("correct_answers") as u32,
                badges: Vec::new(),
                history: Vec::new(),
            },
            None => UserStats::default(),
        };

        stats.badges = sqlx::query("SELECT name FROM badges ORDER BY position")
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(|row| row.get::<String, _>("name"))
            .collect();

        let history_rows = sqlx::query("SELECT date, xp FROM xp_history ORDER BY date")
            .fetch_all(&self.pool)
            .await?;
        for row in history_rows {
            stats.history.push(XpHistoryEntry {
                date: NaiveDate::parse_from_str(&row.get::<String, _>("date"), "%Y-%m-%d")?,
                xp: row.get::<i64, _>("xp") as u64,
            });
        }

        Ok(stats)
    }

    pub async fn save_stats(&self, stats: &UserStats) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        write_stats(&mut tx, stats).await?;
        tx.commit().await?;
        Ok(())
    }

    // Quest operations
    pub async fn completed_quests(&self) -> Result<HashSet<Uuid>> {
        let rows = sqlx::query("SELECT document_id FROM quests_completed")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| Uuid::parse_str(&row.get::<String, _>("document_id")).map_err(anyhow::Error::from))
            .collect()
    }

    pub async fn is_quest_completed(&self, document_id: Uuid) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM quests_completed WHERE document_id = ?1")
            .bind(document_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.is_some())
    }
}

async fn insert_flashcards(conn: &mut SqliteConnection, cards: &[Flashcard]) -> Result<()> {
    for card in cards {
        sqlx::query(
            r#"
            INSERT INTO flashcards (id, document_id, front, back, interval, ease_factor,
                                    repetition_count, next_review_at, last_reviewed_at, created_seq)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9,
                    (SELECT COALESCE(MAX(created_seq), 0) + 1 FROM flashcards))
            "#,
        )
        .bind(card.id.to_string())
        .bind(card.document_id.to_string())
        .bind(&card.front)
        .bind(&card.back)
        .bind(card.interval as i64)
        .bind(card.ease_factor)
        .bind(card.repetition_count as i64)
        .bind(card.next_review_at.to_rfc3339())
        .bind(card.last_reviewed_at.map(|d| d.to_rfc3339()))
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

async fn update_concept(conn: &mut SqliteConnection, concept: &Concept) -> Result<()> {
    sqlx::query("UPDATE concepts SET mastery_level = ?1, status = ?2 WHERE id = ?3")
        .bind(concept.mastery_level as i64)
        .bind(concept.status.as_str())
        .bind(concept.id.to_string())
        .execute(&mut *conn)
        .await?;

    Ok(())
}

async fn write_stats(conn: &mut SqliteConnection, stats: &UserStats) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO user_stats (id, xp, level, streak, last_active_on, total_questions_answered, correct_answers)
        VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6)
        ON CONFLICT(id) DO UPDATE SET
            xp = excluded.xp,
            level = excluded.level,
            streak = excluded.streak,
            last_active_on = excluded.last_active_on,
            total_questions_answered = excluded.total_questions_answered,
            correct_answers = excluded.correct_answers
        "#,
    )
    .bind(stats.xp as i64)
    .bind(stats.level as i64)
    .bind(stats.streak as i64)
    .bind(stats.last_active_on.map(|d| d.format("%Y-%m-%d").to_string()))
    .bind(stats.total_questions_answered as i64)
    .bind(stats.correct_answers as i64)
    .execute(&mut *conn)
    .await?;

    sqlx::query("DELETE FROM badges").execute(&mut *conn).await?;
    for (position, badge) in stats.badges.iter().enumerate() {
        sqlx::query("INSERT OR IGNORE INTO badges (name, position) VALUES (?1, ?2)")
            .bind(badge)
            .bind(position as i64)
            .execute(&mut *conn)
            .await?;
    }

    sqlx::query("DELETE FROM xp_history").execute(&mut *conn).await?;
    for entry in &stats.history {
        sqlx::query("INSERT INTO xp_history (date, xp) VALUES (?1, ?2)")
            .bind(entry.date.format("%Y-%m-%d").to_string())
            .bind(entry.xp as i64)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

fn row_to_concept(row: &SqliteRow) -> Result<Concept> {
    let status: String = row.get("status");
    Ok(Concept {
        id: Uuid::parse_str(&row.get::<String, _>("id"))?,
        document_id: Uuid::parse_str(&row.get::<String, _>("document_id"))?,
        name: row.get("name"),
        description: row.get("description"),
        mastery_level: row.get::<i64, _>("mastery_level").clamp(0, 100) as u8,
        status: ConceptStatus::parse(&status)
            .ok_or_else(|| anyhow!("Unknown concept status '{}'", status))?,
    })
}

fn row_to_flashcard(row: &SqliteRow) -> Result<Flashcard> {
    Ok(Flashcard {
        id: Uuid::parse_str(&row.get::<String, _>("id"))?,
        document_id: Uuid::parse_str(&row.get::<String, _>("document_id"))?,
        front: row.get("front"),
        back: row.get("back"),
        interval: row.get::<i64, _>("interval") as u32,
        ease_factor: row.get("ease_factor"),
        repetition_count: row.get::<i64, _>("repetition_count") as u32,
        next_review_at: parse_timestamp(&row.get::<String, _>("next_review_at"))?,
        last_reviewed_at: row
            .get::<Option<String>, _>("last_reviewed_at")
            .map(|s| parse_timestamp(&s))
            .transpose()?,
    })
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)?.with_timezone(&Utc))
}
