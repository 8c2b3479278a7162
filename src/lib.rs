pub mod api;
pub mod config;
pub mod database;
pub mod errors;
pub mod intervals;
pub mod logging;
pub mod mastery_engine;
pub mod models;
pub mod notifications;
pub mod sm2_scheduler;
pub mod study_service;

pub use config::{Config, MasteryConfig};
pub use database::Database;
pub use errors::*;
pub use mastery_engine::{BossBattleOutcome, MasteryEngine, ProgressionEvent};
pub use models::*;
pub use notifications::{ChannelNotifier, Notification, NotificationSink, Severity, TracingNotifier};
pub use sm2_scheduler::{Quality, ReviewButton, Sm2Scheduler};
pub use study_service::StudyService;
