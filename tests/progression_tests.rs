use chrono::{NaiveDate, Utc};
use mastery_system::{
    Concept, ConceptStatus, EngineError, MasteryEngine, ProgressionEvent, QuestState, StudyDocument,
    UserStats,
};
use mastery_system::models::DocumentType;
use uuid::Uuid;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 20).unwrap()
}

fn document_with(masteries: &[u8]) -> StudyDocument {
    let id = Uuid::new_v4();
    StudyDocument {
        id,
        title: "Graph Theory".to_string(),
        content: "Vertices and edges".to_string(),
        summary: None,
        doc_type: DocumentType::Notes,
        uploaded_at: Utc::now(),
        concepts: masteries
            .iter()
            .enumerate()
            .map(|(i, m)| Concept::new(id, format!("Concept {}", i), String::new(), *m))
            .collect(),
        relationships: vec![],
        flashcards: vec![],
    }
}

#[test]
fn test_mastery_stays_within_bounds() {
    let engine = MasteryEngine::default();
    let document = document_with(&[0]);

    for start in 0..=100u8 {
        let concept = Concept {
            mastery_level: start,
            ..document.concepts[0].clone()
        };
        assert!(engine.apply_quiz_result(&concept, true).mastery_level <= 100);
        let lowered = engine.apply_quiz_result(&concept, false).mastery_level;
        assert_eq!(lowered, start.saturating_sub(6));
    }

    let high = Concept { mastery_level: 95, ..document.concepts[0].clone() };
    assert_eq!(engine.apply_quiz_result(&high, true).mastery_level, 100);
    let low = Concept { mastery_level: 3, ..document.concepts[0].clone() };
    assert_eq!(engine.apply_quiz_result(&low, false).mastery_level, 0);
}

#[test]
fn test_level_is_derived_from_xp() {
    let engine = MasteryEngine::default();

    for xp in (0..10_000u64).step_by(37) {
        assert_eq!(engine.level_for_xp(xp), (xp / 1000) as u32 + 1);
    }
    assert_eq!(engine.level_for_xp(999), 1);
    assert_eq!(engine.level_for_xp(1000), 2);
    assert_eq!(engine.level_for_xp(2450), 3);

    let mut stats = UserStats::default();
    for _ in 0..49 {
        stats = engine.award_xp(&stats, 50, today()).stats;
        assert_eq!(stats.level, engine.level_for_xp(stats.xp));
    }
}

#[test]
fn test_boss_defeat_end_to_end() {
    let engine = MasteryEngine::default();
    let mut document = document_with(&[40, 55, 70]);

    let quest = engine.quest_for(&document, false);
    assert_eq!(quest.average_mastery, 55);
    assert_eq!(quest.state, QuestState::Locked);

    // Practice the weakest concept until the average crosses the threshold
    while engine.quest_state(&document.concepts, false) == QuestState::Locked {
        document.concepts[0] = engine.apply_quiz_result(&document.concepts[0], true);
    }
    assert_eq!(document.concepts[0].mastery_level, 64);

    let quest = engine.quest_for(&document, false);
    assert_eq!(quest.state, QuestState::Unlocked);

    let stats = UserStats::default();
    let defeat = engine
        .defeat_boss(&quest, &document.concepts, "Graph Theory Sage", &stats, today())
        .unwrap();

    assert_eq!(defeat.concepts.len(), 3);
    assert!(defeat
        .concepts
        .iter()
        .all(|c| c.mastery_level == 100 && c.status == ConceptStatus::Mastered));
    assert_eq!(defeat.xp_awarded, 1000);
    assert_eq!(defeat.stats.xp, stats.xp + 1000);
    assert_eq!(defeat.stats.level, 2);
    assert_eq!(defeat.stats.badges, vec!["Graph Theory Sage".to_string()]);
    assert!(defeat.events.contains(&ProgressionEvent::LevelUp { level: 2 }));

    // Once completed the quest is terminal and the boss cannot be fought again
    document.concepts = defeat.concepts;
    let completed = engine.quest_for(&document, true);
    assert_eq!(completed.state, QuestState::Completed);

    let again = engine.defeat_boss(&completed, &document.concepts, "Graph Theory Sage", &defeat.stats, today());
    assert!(matches!(again, Err(EngineError::QuestCompleted(_))));
    assert_eq!(defeat.stats.badges.len(), 1);
}

#[test]
fn test_failed_boss_battle_leaves_quest_unlocked() {
    let engine = MasteryEngine::default();
    let document = document_with(&[60, 60, 60]);
    let quest = engine.quest_for(&document, false);
    let stats = UserStats { xp: 500, ..UserStats::default() };

    let outcome = engine
        .resolve_boss_battle(&quest, &document.concepts, 3, 5, &stats, today())
        .unwrap();
    assert!(matches!(
        outcome,
        mastery_system::BossBattleOutcome::Failed { correct: 3, total: 5 }
    ));
    assert_eq!(engine.quest_for(&document, false).state, QuestState::Unlocked);
}
