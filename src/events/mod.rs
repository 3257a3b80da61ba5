use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use crate::errors::AppResult;

pub mod loggable;
pub use loggable::{Loggable, Severity};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent<T> {
    pub id: Uuid,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
    pub actor_id: Option<Uuid>,
    pub subject_id: Option<Uuid>,
    pub payload: T,
}

impl<T> DomainEvent<T> {
    pub fn new(name: impl Into<String>, actor_id: Option<Uuid>, subject_id: Option<Uuid>, payload: T) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            occurred_at: Utc::now(),
            actor_id,
            subject_id,
            payload,
        }
    }
}

pub type EventBus = broadcast::Sender<Value>;

pub fn init_event_bus() -> (EventBus, broadcast::Receiver<Value>) {
    broadcast::channel(1024)
}

/// Request context recorded next to each activity (IP, User-Agent).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl RequestContext {
    pub fn from_headers(headers: &axum::http::HeaderMap) -> Self {
        let ip = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.split(',').next().unwrap_or(s).trim().to_string())
            .or_else(|| {
                headers
                    .get("x-real-ip")
                    .and_then(|v| v.to_str().ok())
                    .map(String::from)
            });

        let user_agent = headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        Self { ip, user_agent }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityPayload {
    #[serde(rename = "new")]
    pub current: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<RequestContext>,
    /// Users to notify about this activity
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recipients: Vec<Uuid>,
    pub severity: Severity,
}

/// Publishes `<entity_type>.<action>` with old/new state and request context.
pub fn log_activity_with_context<T: Loggable>(
    event_bus: &EventBus,
    action: &str,
    actor_id: Option<Uuid>,
    entity: &T,
    old_entity: Option<&T>,
    context: Option<RequestContext>,
) {
    publish(event_bus, action, actor_id, entity, old_entity, context, Vec::new());
}

/// Publishes an activity and asks the listener to notify `recipients`.
/// The actor is never notified about their own action.
pub fn notify_activity<T: Loggable>(
    event_bus: &EventBus,
    action: &str,
    actor_id: Option<Uuid>,
    entity: &T,
    recipients: impl IntoIterator<Item = Uuid>,
    context: Option<RequestContext>,
) {
    let mut recipients: Vec<Uuid> = recipients
        .into_iter()
        .filter(|id| Some(*id) != actor_id)
        .collect();
    recipients.sort();
    recipients.dedup();
    publish(event_bus, action, actor_id, entity, None, context, recipients);
}

fn publish<T: Loggable>(
    event_bus: &EventBus,
    action: &str,
    actor_id: Option<Uuid>,
    entity: &T,
    old_entity: Option<&T>,
    context: Option<RequestContext>,
    recipients: Vec<Uuid>,
) {
    let event_name = format!("{}.{}", T::entity_type(), action);

    let payload = ActivityPayload {
        current: serde_json::to_value(entity).unwrap_or_default(),
        old: old_entity.map(|e| serde_json::to_value(e).unwrap_or_default()),
        context,
        recipients,
        severity: entity.severity_for_action(action),
    };

    let event = DomainEvent::new(
        event_name,
        actor_id,
        Some(entity.subject_id()),
        serde_json::to_value(&payload).unwrap_or_default(),
    );

    // Fire and forget: a missing listener must not fail the API call.
    if event_bus.send(serde_json::to_value(&event).unwrap_or_default()).is_err() {
        tracing::debug!(event = %event.name, "no activity listener subscribed");
    }
}

pub fn describe(event_name: &str) -> &'static str {
    match event_name {
        "access_request.submitted" => "Access request submitted",
        "access_request.validating" => "Access request partially validated",
        "access_request.approved" => "Access request approved",
        "access_request.rejected" => "Access request rejected",
        "access_request.finalized" => "Access request finalized",
        "access_request.withdrawn" => "Access request withdrawn",
        "access_request.deleted" => "Access request deleted",
        "validation.approved" => "Validation approved",
        "validation.rejected" => "Validation rejected",
        "request_system.provisioned" => "System access provisioned",
        "system.created" => "System created",
        "system.deleted" => "System deleted",
        "system_validator.created" => "System validator added",
        "system_validator.deleted" => "System validator removed",
        "department.created" => "Department created",
        "employee.created" => "Employee registered",
        "user.registered" => "New user registered",
        "user.login" => "User logged in",
        "user.role_granted" => "Role granted",
        "user.role_revoked" => "Role revoked",
        "user.department_changed" => "User department changed",
        _ => "System event",
    }
}

/// Projects bus events into `activity_log`, `event_store` and `notifications`.
pub async fn start_activity_listener(mut rx: broadcast::Receiver<Value>, pool: SqlitePool) {
    tracing::info!("activity listener started");
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "activity listener lagged, events dropped");
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        if let Err(err) = record_event(&pool, &event).await {
            tracing::error!(error = %err, "failed to record activity");
        }
    }
    tracing::info!("activity listener stopped");
}

async fn record_event(pool: &SqlitePool, event: &Value) -> AppResult<()> {
    let name = event.get("name").and_then(|v| v.as_str()).unwrap_or("unknown");
    let description = describe(name);
    let payload = event.get("payload");

    let severity = payload
        .and_then(|p| p.get("severity"))
        .and_then(|s| s.as_str())
        .unwrap_or(Severity::Important.as_str());

    let actor_id = event
        .get("actor_id")
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok());
    let subject_id = event
        .get("subject_id")
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok());

    let occurred_at = event
        .get("occurred_at")
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    let payload_str = serde_json::to_string(event).unwrap_or_default();

    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO activity_log (id, event_name, description, actor_id, subject_id, occurred_at, properties, severity) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(name)
    .bind(description)
    .bind(actor_id.map(|id| id.to_string()))
    .bind(subject_id.map(|id| id.to_string()))
    .bind(occurred_at)
    .bind(&payload_str)
    .bind(severity)
    .execute(&mut *tx)
    .await?;

    let previous = sqlx::query("SELECT seq, hash FROM event_store ORDER BY seq DESC LIMIT 1")
        .fetch_optional(&mut *tx)
        .await?;
    let (prev_seq, prev_hash) = match previous {
        Some(row) => (row.try_get::<i64, _>("seq")?, Some(row.try_get::<String, _>("hash")?)),
        None => (0, None),
    };

    sqlx::query(
        "INSERT INTO event_store (id, seq, event_name, occurred_at, actor_id, subject_id, payload, severity, prev_hash, hash) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(prev_seq + 1)
    .bind(name)
    .bind(occurred_at)
    .bind(actor_id.map(|id| id.to_string()))
    .bind(subject_id.map(|id| id.to_string()))
    .bind(&payload_str)
    .bind(severity)
    .bind(&prev_hash)
    .bind(chain_hash(prev_hash.as_deref(), &payload_str))
    .execute(&mut *tx)
    .await?;

    let recipients = payload
        .and_then(|p| p.get("recipients"))
        .and_then(|r| r.as_array())
        .map(|ids| {
            ids.iter()
                .filter_map(|v| v.as_str())
                .filter_map(|s| Uuid::parse_str(s).ok())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    for recipient in recipients {
        sqlx::query(
            "INSERT INTO notifications (id, recipient_id, event_name, subject_id, message, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(recipient.to_string())
        .bind(name)
        .bind(subject_id.map(|id| id.to_string()))
        .bind(description)
        .bind(occurred_at)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// SHA256(prev_hash || payload), hex encoded.
pub fn chain_hash(prev_hash: Option<&str>, payload: &str) -> String {
    let mut hasher = Sha256::new();
    if let Some(prev) = prev_hash {
        hasher.update(prev.as_bytes());
    }
    hasher.update(payload.as_bytes());
    hex::encode(hasher.finalize())
}

/// Walks the event store in order and returns the sequence number of the
/// first entry whose hash does not match, or `None` if the chain is intact.
pub async fn verify_event_chain(pool: &SqlitePool) -> AppResult<Option<i64>> {
    let rows = sqlx::query("SELECT seq, payload, prev_hash, hash FROM event_store ORDER BY seq ASC")
        .fetch_all(pool)
        .await?;

    let mut expected_prev: Option<String> = None;
    for row in rows {
        let seq: i64 = row.try_get("seq")?;
        let payload: String = row.try_get("payload")?;
        let prev_hash: Option<String> = row.try_get("prev_hash")?;
        let hash: String = row.try_get("hash")?;

        if prev_hash != expected_prev || chain_hash(prev_hash.as_deref(), &payload) != hash {
            return Ok(Some(seq));
        }
        expected_prev = Some(hash);
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Probe {
        id: Uuid,
    }

    impl Loggable for Probe {
        fn entity_type() -> &'static str { "probe" }
        fn subject_id(&self) -> Uuid { self.id }
    }

    #[test]
    fn chain_hash_depends_on_previous() {
        let first = chain_hash(None, "payload");
        let second = chain_hash(Some(&first), "payload");
        assert_ne!(first, second);
        assert_eq!(first.len(), 64);
    }

    #[tokio::test]
    async fn notify_skips_the_actor_and_duplicates() {
        let (bus, mut rx) = init_event_bus();
        let actor = Uuid::new_v4();
        let other = Uuid::new_v4();
        let probe = Probe { id: Uuid::new_v4() };

        notify_activity(&bus, "pinged", Some(actor), &probe, [actor, other, other], None);

        let event = rx.recv().await.unwrap();
        assert_eq!(event["name"], "probe.pinged");
        let recipients = event["payload"]["recipients"].as_array().unwrap();
        assert_eq!(recipients.len(), 1);
        assert_eq!(recipients[0], other.to_string());
    }

    #[test]
    fn unknown_events_get_generic_description() {
        assert_eq!(describe("access_request.approved"), "Access request approved");
        assert_eq!(describe("nope.nothing"), "System event");
    }
}
