//! Logging macros shared by the handlers, the study service and the store.
//!
//! Each layer logs under fixed field names (`operation`, `service`,
//! `component`) so a single `EnvFilter` directive or log query can follow a
//! request from the router down to SQLite. Entity ids are passed as
//! `key = value` and recorded with their `Display` form.

// HTTP handlers

#[macro_export]
macro_rules! log_api_start {
    ($operation:expr, $key:ident = $id:expr) => {
        tracing::debug!(operation = $operation, $key = %$id, "API operation started");
    };
    ($operation:expr) => {
        tracing::debug!(operation = $operation, "API operation started");
    };
}

#[macro_export]
macro_rules! log_api_success {
    ($operation:expr, count = $count:expr, $msg:expr) => {
        tracing::info!(operation = $operation, count = $count, "API operation completed: {}", $msg);
    };
    ($operation:expr, $key:ident = $id:expr, $msg:expr) => {
        tracing::info!(operation = $operation, $key = %$id, "API operation completed: {}", $msg);
    };
    ($operation:expr, $msg:expr) => {
        tracing::info!(operation = $operation, "API operation completed: {}", $msg);
    };
}

#[macro_export]
macro_rules! log_api_error {
    ($operation:expr, $key:ident = $id:expr, error = $error:expr, $msg:expr) => {
        tracing::error!(
            operation = $operation,
            $key = %$id,
            error = %$error,
            "API operation failed: {}", $msg
        );
    };
}

#[macro_export]
macro_rules! log_api_warn {
    ($operation:expr, $key:ident = $id:expr, $msg:expr) => {
        tracing::warn!(operation = $operation, $key = %$id, "API operation warning: {}", $msg);
    };
}

// Study service

#[macro_export]
macro_rules! log_service_start {
    ($service:expr, $operation:expr, $key:ident = $id:expr) => {
        tracing::debug!(service = $service, operation = $operation, $key = %$id, "Service operation started");
    };
    ($service:expr, $operation:expr) => {
        tracing::debug!(service = $service, operation = $operation, "Service operation started");
    };
}

/// Timed completions carry the entity id; untimed ones a short message.
#[macro_export]
macro_rules! log_service_success {
    ($service:expr, $operation:expr, $key:ident = $id:expr, duration_ms = $duration:expr) => {
        tracing::info!(
            service = $service,
            operation = $operation,
            $key = %$id,
            duration_ms = $duration,
            "Service operation completed successfully"
        );
    };
    ($service:expr, $operation:expr, $msg:expr) => {
        tracing::info!(service = $service, operation = $operation, "Service operation completed: {}", $msg);
    };
}

#[macro_export]
macro_rules! log_service_warn {
    ($service:expr, $operation:expr, $msg:expr) => {
        tracing::warn!(service = $service, operation = $operation, "Service warning: {}", $msg);
    };
}

// Store

#[macro_export]
macro_rules! log_db_operation {
    (debug, $operation:expr, count = $count:expr, duration_ms = $duration:expr) => {
        tracing::debug!(
            component = "database",
            operation = $operation,
            result_count = $count,
            duration_ms = $duration,
            "Database operation completed"
        );
    };
    (debug, $operation:expr, $key:ident = $id:expr, duration_ms = $duration:expr) => {
        tracing::debug!(
            component = "database",
            operation = $operation,
            $key = %$id,
            duration_ms = $duration,
            "Database operation completed"
        );
    };
    (info, $operation:expr, $msg:expr) => {
        tracing::info!(component = "database", operation = $operation, "Database operation: {}", $msg);
    };
}

// Progression

/// Mastery moves and XP awards log at debug; boss outcomes at info.
#[macro_export]
macro_rules! log_progression {
    (mastery, concept_id = $concept_id:expr, from = $from:expr, to = $to:expr) => {
        tracing::debug!(
            component = "mastery_engine",
            concept_id = %$concept_id,
            mastery_from = $from,
            mastery_to = $to,
            "Concept mastery updated"
        );
    };
    (xp, amount = $amount:expr, total = $total:expr, level = $level:expr) => {
        tracing::debug!(
            component = "mastery_engine",
            xp_awarded = $amount,
            xp_total = $total,
            level = $level,
            "Experience awarded"
        );
    };
    (boss, quest_id = $quest_id:expr, $msg:expr) => {
        tracing::info!(component = "mastery_engine", quest_id = %$quest_id, "Boss battle: {}", $msg);
    };
}

// Process lifecycle and configuration

#[macro_export]
macro_rules! log_system_event {
    (startup, component = $component:expr, $msg:expr) => {
        tracing::info!(event_type = "startup", component = $component, "System event: {}", $msg);
    };
    (shutdown, component = $component:expr, $msg:expr) => {
        tracing::info!(event_type = "shutdown", component = $component, "System event: {}", $msg);
    };
    (config, $msg:expr) => {
        tracing::info!(event_type = "configuration", "System event: {}", $msg);
    };
}

#[macro_export]
macro_rules! log_validation {
    (success, $component:expr, $msg:expr) => {
        tracing::debug!(
            event_type = "validation",
            component = $component,
            result = "success",
            "Validation completed: {}", $msg
        );
    };
    (failure, $component:expr, error = $error:expr) => {
        tracing::warn!(
            event_type = "validation",
            component = $component,
            result = "failure",
            error = %$error,
            "Validation failed"
        );
    };
}
