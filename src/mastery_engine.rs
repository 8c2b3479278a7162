use chrono::NaiveDate;
use serde::Serialize;

use crate::config::MasteryConfig;
use crate::errors::EngineError;
use crate::intervals::{average_mastery, clamp_mastery, meets_percent};
use crate::models::{
    Concept, ConceptStatus, Quest, QuestState, QuizMode, StatsSummary, StudyDocument, UserStats,
    XpHistoryEntry,
};

/// Observable outcomes of a progression update, handed to the notification
/// sink by the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressionEvent {
    XpGained { amount: u64, total: u64 },
    LevelUp { level: u32 },
    BossDefeated { quest_id: String, badge: String },
}

#[derive(Debug, Clone)]
pub struct XpAward {
    pub stats: UserStats,
    pub events: Vec<ProgressionEvent>,
}

impl XpAward {
    pub fn leveled_up_to(&self) -> Option<u32> {
        self.events.iter().find_map(|event| match event {
            ProgressionEvent::LevelUp { level } => Some(*level),
            _ => None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct BossDefeat {
    pub concepts: Vec<Concept>,
    pub stats: UserStats,
    pub xp_awarded: u64,
    pub events: Vec<ProgressionEvent>,
}

#[derive(Debug, Clone)]
pub enum BossBattleOutcome {
    Defeated(BossDefeat),
    /// The quest stays unlocked and nothing is awarded.
    Failed { correct: u32, total: u32 },
}

#[derive(Debug, Clone, Default)]
pub struct MasteryEngine {
    config: MasteryConfig,
}

impl MasteryEngine {
    pub fn new(config: MasteryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MasteryConfig {
        &self.config
    }

    /// Fixed asymmetric step, clamped to [0, 100]. Status is left alone.
    pub fn apply_quiz_result(&self, concept: &Concept, is_correct: bool) -> Concept {
        let delta = if is_correct {
            self.config.correct_step as i32
        } else {
            -(self.config.incorrect_step as i32)
        };

        Concept {
            mastery_level: clamp_mastery(concept.mastery_level, delta),
            ..concept.clone()
        }
    }

    pub fn level_for_xp(&self, xp: u64) -> u32 {
        (xp / self.config.xp_per_level) as u32 + 1
    }

    pub fn quiz_xp(&self, mode: QuizMode, is_correct: bool) -> u64 {
        match (is_correct, mode) {
            (false, _) => 0,
            (true, QuizMode::Daily) => self.config.quiz_correct_xp,
            (true, QuizMode::Boss) => self.config.boss_question_xp,
        }
    }

    /// Add XP and recompute the level from scratch. Emits `LevelUp` when the
    /// derived level exceeds the stored one.
    pub fn award_xp(&self, stats: &UserStats, amount: u64, today: NaiveDate) -> XpAward {
        let mut updated = stats.clone();
        let mut events = Vec::new();

        updated.xp = stats.xp.saturating_add(amount);
        updated.level = self.level_for_xp(updated.xp);

        if amount > 0 {
            touch_streak(&mut updated, today);
            add_history(&mut updated, today, amount);
            events.push(ProgressionEvent::XpGained {
                amount,
                total: updated.xp,
            });
        }

        if updated.level > stats.level {
            events.push(ProgressionEvent::LevelUp {
                level: updated.level,
            });
        }

        XpAward {
            stats: updated,
            events,
        }
    }

    /// Count one answered question towards accuracy. The streak is left to
    /// `award_xp`, so a wrong answer never extends it.
    pub fn record_answer(&self, stats: &UserStats, is_correct: bool) -> UserStats {
        let mut updated = stats.clone();
        updated.total_questions_answered = updated.total_questions_answered.saturating_add(1);
        if is_correct {
            updated.correct_answers = updated.correct_answers.saturating_add(1);
        }
        updated
    }

    pub fn quest_state(&self, concepts: &[Concept], completed: bool) -> QuestState {
        if completed {
            QuestState::Completed
        } else if !concepts.is_empty()
            && average_mastery(concepts) >= self.config.quest_unlock_average
        {
            QuestState::Unlocked
        } else {
            QuestState::Locked
        }
    }

    pub fn quest_for(&self, document: &StudyDocument, completed: bool) -> Quest {
        Quest {
            id: Quest::quest_id(document.id),
            document_id: document.id,
            title: format!("{} Mastery", document.title),
            description: format!("Defeat the {} Boss to earn your badge.", document.title),
            badge: format!("{} Sage", document.title),
            state: self.quest_state(&document.concepts, completed),
            average_mastery: average_mastery(&document.concepts),
        }
    }

    /// Capstone reward: every concept of the quest's document becomes
    /// mastered at 100, the defeat XP is awarded and the badge is added once.
    ///
    /// Refuses completed quests and quests whose average mastery is still
    /// below the unlock threshold.
    pub fn defeat_boss(
        &self,
        quest: &Quest,
        document_concepts: &[Concept],
        badge: &str,
        stats: &UserStats,
        today: NaiveDate,
    ) -> Result<BossDefeat, EngineError> {
        let owned = owned_concepts(quest, document_concepts);
        self.ensure_unlocked(quest, &owned)?;

        let concepts = owned
            .into_iter()
            .map(|c| Concept {
                mastery_level: 100,
                status: ConceptStatus::Mastered,
                ..c
            })
            .collect();

        let award = self.award_xp(stats, self.config.boss_defeat_xp, today);
        let mut stats = award.stats;
        if !stats.badges.iter().any(|b| b == badge) {
            stats.badges.push(badge.to_string());
        }

        let mut events = award.events;
        events.push(ProgressionEvent::BossDefeated {
            quest_id: quest.id.clone(),
            badge: badge.to_string(),
        });

        Ok(BossDefeat {
            concepts,
            stats,
            xp_awarded: self.config.boss_defeat_xp,
            events,
        })
    }

    /// Score a finished boss battery and defeat the boss when the pass
    /// percentage is reached (4 of 5 by default).
    pub fn resolve_boss_battle(
        &self,
        quest: &Quest,
        document_concepts: &[Concept],
        correct: u32,
        total: u32,
        stats: &UserStats,
        today: NaiveDate,
    ) -> Result<BossBattleOutcome, EngineError> {
        if total == 0 {
            return Err(EngineError::InvalidBattle(
                "a boss battle needs at least one question".to_string(),
            ));
        }
        if correct > total {
            return Err(EngineError::InvalidBattle(format!(
                "{} correct answers out of {} questions",
                correct, total
            )));
        }

        self.ensure_unlocked(quest, &owned_concepts(quest, document_concepts))?;

        if !meets_percent(correct, total, self.config.boss_pass_percent) {
            return Ok(BossBattleOutcome::Failed { correct, total });
        }

        let badge = quest.badge.clone();
        self.defeat_boss(quest, document_concepts, &badge, stats, today)
            .map(BossBattleOutcome::Defeated)
    }

    fn ensure_unlocked(&self, quest: &Quest, concepts: &[Concept]) -> Result<(), EngineError> {
        if quest.is_completed() {
            return Err(EngineError::QuestCompleted(quest.id.clone()));
        }
        if concepts.is_empty() {
            return Err(EngineError::PreconditionViolation(format!(
                "quest '{}' has no concepts to master",
                quest.id
            )));
        }
        let average = average_mastery(concepts);
        if average < self.config.quest_unlock_average {
            return Err(EngineError::PreconditionViolation(format!(
                "quest '{}' is locked: average mastery {}% is below {}%",
                quest.id, average, self.config.quest_unlock_average
            )));
        }
        Ok(())
    }

    /// Lowest-mastery concept under the weak threshold, if any.
    pub fn weakest_concept<'a>(&self, concepts: &'a [Concept]) -> Option<&'a Concept> {
        concepts
            .iter()
            .filter(|c| c.mastery_level < self.config.weak_concept_threshold)
            .min_by_key(|c| c.mastery_level)
    }

    /// Explicit reset: the only path on which XP decreases. Badges stay.
    pub fn reset_progress(&self, stats: &UserStats) -> UserStats {
        UserStats {
            badges: stats.badges.clone(),
            ..UserStats::default()
        }
    }

    pub fn stats_summary(&self, stats: &UserStats) -> StatsSummary {
        let xp_into_level = stats.xp % self.config.xp_per_level;
        StatsSummary {
            accuracy: stats.accuracy(),
            xp_into_level,
            xp_to_next_level: self.config.xp_per_level - xp_into_level,
            stats: stats.clone(),
        }
    }
}

fn owned_concepts(quest: &Quest, concepts: &[Concept]) -> Vec<Concept> {
    concepts
        .iter()
        .filter(|c| c.document_id == quest.document_id)
        .cloned()
        .collect()
}

/// Calendar-day streak: same day unchanged, next day +1, any gap restarts.
fn touch_streak(stats: &mut UserStats, today: NaiveDate) {
    match stats.last_active_on {
        Some(last) if last >= today => return,
        Some(last) if last.succ_opt() == Some(today) => stats.streak += 1,
        _ => stats.streak = 1,
    }
    stats.last_active_on = Some(today);
}

fn add_history(stats: &mut UserStats, today: NaiveDate, amount: u64) {
    match stats.history.iter_mut().find(|entry| entry.date == today) {
        Some(entry) => entry.xp = entry.xp.saturating_add(amount),
        None => {
            stats.history.push(XpHistoryEntry {
                date: today,
                xp: amount,
            });
            stats.history.sort_by_key(|entry| entry.date);
        }
    }
}
