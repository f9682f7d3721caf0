//! Webhook ingress (C7): `handle_event`. Dedup, then insert plus an
//! outbox append, the same shape the notification service uses, applied
//! here to a second aggregate (`webhook_events`) instead of notifications.

use glk_schemas::{NewOutboxEvent, NewWebhookEvent, WebhookEvent};

use crate::error::CoreError;
use crate::exercise_plan;
use crate::uow::UnitOfWork;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookResult {
    Accepted,
    Duplicate,
}

#[derive(Debug, Clone)]
pub struct WebhookOutcome {
    pub result: WebhookResult,
    pub event: WebhookEvent,
    pub set_result: Option<exercise_plan::SetResultOutcome>,
}

/// Optional embedded set-result dispatch, carried by the HTTP layer when
/// the webhook body names a specific set. Dispatched inside the same
/// transaction as the webhook insert — either both succeed or both roll
/// back.
#[derive(Debug, Clone)]
pub struct EmbeddedSetResult {
    pub plan_id: uuid::Uuid,
    pub session_id: uuid::Uuid,
    pub set_no: i32,
    pub result: String,
    pub performed_reps: Option<i32>,
    pub performed_weight_kg: Option<f64>,
    pub actual_rest_sec: Option<i32>,
}

/// Dedup by `(provider, idempotency_key)`, falling back to `(provider,
/// event_id)` when the key misses and an `event_id` is present. On a hit,
/// return the existing row, append no outbox event, and never invoke
/// `dispatch` — duplicate detection always runs before policy gates, the
/// same idempotency-before-gate ordering the reading-reminder service
/// uses. On a miss, insert and append `WebhookReceived`, then run
/// `dispatch` if supplied.
pub async fn handle_event(
    uow: &mut dyn UnitOfWork,
    new_event: NewWebhookEvent,
    dispatch: Option<EmbeddedSetResult>,
) -> Result<WebhookOutcome, CoreError> {
    if let Some(existing) = lookup(uow, &new_event).await? {
        return Ok(WebhookOutcome {
            result: WebhookResult::Duplicate,
            event: existing,
            set_result: None,
        });
    }

    let provider = new_event.provider.clone();
    let event_type = new_event.event_type.clone();
    let event_id = new_event.event_id.clone();

    let inserted = uow
        .webhook_events()
        .insert(new_event)
        .await
        .map_err(|e| CoreError::Unavailable(e.to_string()))?;

    uow.outbox_events()
        .append(NewOutboxEvent::webhook_received(
            inserted.id,
            &provider,
            &event_type,
            event_id.as_deref(),
        ))
        .await
        .map_err(|e| CoreError::Unavailable(e.to_string()))?;

    let set_result = match dispatch {
        Some(d) => Some(
            exercise_plan::submit_set_result(
                uow,
                d.plan_id,
                d.session_id,
                d.set_no,
                &d.result,
                d.performed_reps,
                d.performed_weight_kg,
                d.actual_rest_sec,
                None,
            )
            .await?,
        ),
        None => None,
    };

    Ok(WebhookOutcome {
        result: WebhookResult::Accepted,
        event: inserted,
        set_result,
    })
}

async fn lookup(
    uow: &mut dyn UnitOfWork,
    new_event: &NewWebhookEvent,
) -> Result<Option<WebhookEvent>, CoreError> {
    if let Some(existing) = uow
        .webhook_events()
        .get_by_provider_and_key(&new_event.provider, &new_event.idempotency_key)
        .await
        .map_err(|e| CoreError::Unavailable(e.to_string()))?
    {
        return Ok(Some(existing));
    }

    if let Some(event_id) = new_event.event_id.as_deref() {
        if let Some(existing) = uow
            .webhook_events()
            .get_by_provider_and_event_id(&new_event.provider, event_id)
            .await
            .map_err(|e| CoreError::Unavailable(e.to_string()))?
        {
            return Ok(Some(existing));
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glk_testkit::InMemoryUnitOfWork;
    use serde_json::json;

    fn sample_event(provider: &str, key: &str, event_id: Option<&str>) -> NewWebhookEvent {
        NewWebhookEvent {
            provider: provider.to_string(),
            event_type: "payment.settled".to_string(),
            user_id: None,
            idempotency_key: key.to_string(),
            event_id: event_id.map(|s| s.to_string()),
            raw_payload: json!({"ok": true}),
            reason_code: None,
            signature_state: None,
        }
    }

    #[tokio::test]
    async fn first_observation_is_accepted_and_appends_outbox() {
        let mut uow = InMemoryUnitOfWork::new_standalone();
        let before = uow.outbox_events().lease_pending(100).await.unwrap().len();

        let outcome = handle_event(
            &mut uow,
            sample_event("kakao", "kakao:payment.settled:evt-1", Some("evt-1")),
            None,
        )
        .await
        .unwrap();

        let after = uow.outbox_events().lease_pending(100).await.unwrap().len();

        assert_eq!(outcome.result, WebhookResult::Accepted);
        assert_eq!(after, before + 1);
    }

    #[tokio::test]
    async fn repeated_idempotency_key_is_duplicate_with_no_new_outbox_event() {
        let mut uow = InMemoryUnitOfWork::new_standalone();
        let event = sample_event("kakao", "kakao:payment.settled:evt-1", Some("evt-1"));

        let first = handle_event(&mut uow, event.clone(), None).await.unwrap();
        let before = uow.outbox_events().lease_pending(100).await.unwrap().len();
        let second = handle_event(&mut uow, event, None).await.unwrap();
        let after = uow.outbox_events().lease_pending(100).await.unwrap().len();

        assert_eq!(second.result, WebhookResult::Duplicate);
        assert_eq!(second.event.id, first.event.id);
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn repeated_event_id_with_different_key_is_still_duplicate() {
        let mut uow = InMemoryUnitOfWork::new_standalone();
        let first = handle_event(
            &mut uow,
            sample_event("kakao", "kakao:payment.settled:evt-1", Some("evt-1")),
            None,
        )
        .await
        .unwrap();

        let second = handle_event(
            &mut uow,
            sample_event("kakao", "a-different-key", Some("evt-1")),
            None,
        )
        .await
        .unwrap();

        assert_eq!(second.result, WebhookResult::Duplicate);
        assert_eq!(second.event.id, first.event.id);
    }

    #[tokio::test]
    async fn duplicate_webhook_never_invokes_dispatch() {
        let mut uow = InMemoryUnitOfWork::new_standalone();
        let event = sample_event("kakao", "kakao:set-result:evt-9", Some("evt-9"));

        handle_event(&mut uow, event.clone(), None).await.unwrap();

        let bogus_dispatch = EmbeddedSetResult {
            plan_id: uuid::Uuid::new_v4(),
            session_id: uuid::Uuid::new_v4(),
            set_no: 1,
            result: "DONE".to_string(),
            performed_reps: None,
            performed_weight_kg: None,
            actual_rest_sec: None,
        };

        let outcome = handle_event(&mut uow, event, Some(bogus_dispatch))
            .await
            .unwrap();

        assert_eq!(outcome.result, WebhookResult::Duplicate);
        assert!(outcome.set_result.is_none());
    }
}
