// Single-flight token refresh
//
// The first request that hits an expired token starts the refresh and
// parks the pending operation here. Requests that fail while it is running
// await the same operation, so one refresh call serves all of them and they
// all see the same token or the same failure. The slot is emptied as soon
// as the refresh settles.
//
// The refresh runs as its own task, so it completes (and empties the slot)
// even if every request awaiting it is dropped.

use std::sync::{Mutex, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};

use super::error::SessionExpiry;

/// New access token, or why none could be obtained
pub(crate) type RefreshOutcome = Result<String, SessionExpiry>;

type PendingRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

/// What a request that got a 401 should do next
pub(crate) enum Ticket {
    /// The token was already rotated after this request was sent
    Current(String),
    /// Await the in-flight refresh (possibly just started by this caller)
    Wait { refresh: PendingRefresh, leader: bool },
}

#[derive(Default)]
pub(crate) struct RefreshGate {
    pending: Mutex<Option<PendingRefresh>>,
}

impl RefreshGate {
    pub fn is_refreshing(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Decide how a request that was sent with `sent_token` and got a 401
    /// obtains a new token.
    ///
    /// `start` must empty the slot with [`finish`](Self::finish) once it
    /// settles. It is spawned onto the tokio runtime.
    ///
    /// `current_token` is read under the gate lock: a refresh stores the new
    /// pair before it empties the slot, so an empty slot together with an
    /// unchanged token means no refresh has happened since the request left.
    pub fn ticket<C, S>(&self, sent_token: Option<&str>, current_token: C, start: S) -> Ticket
    where
        C: FnOnce() -> Option<String>,
        S: FnOnce() -> BoxFuture<'static, RefreshOutcome>,
    {
        let mut slot = self.pending.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(refresh) = slot.as_ref() {
            return Ticket::Wait {
                refresh: refresh.clone(),
                leader: false,
            };
        }

        if let Some(current) = current_token() {
            if sent_token != Some(current.as_str()) {
                return Ticket::Current(current);
            }
        }

        let task = tokio::spawn(start());
        let refresh = async move {
            task.await.unwrap_or_else(|e| {
                Err(SessionExpiry::RefreshFailed(format!("refresh task failed: {}", e)))
            })
        }
        .boxed()
        .shared();
        *slot = Some(refresh.clone());
        Ticket::Wait {
            refresh,
            leader: true,
        }
    }

    /// Empty the slot; called by the refresh future itself once it settles
    pub fn finish(&self) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn ready(outcome: RefreshOutcome) -> BoxFuture<'static, RefreshOutcome> {
        async move { outcome }.boxed()
    }

    #[tokio::test]
    async fn test_abandoned_refresh_still_completes() {
        let gate = Arc::new(RefreshGate::default());
        let runs = Arc::new(AtomicUsize::new(0));

        let (g, r) = (gate.clone(), runs.clone());
        let ticket = gate.ticket(Some("old"), || Some("old".to_string()), move || {
            async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                r.fetch_add(1, Ordering::SeqCst);
                g.finish();
                Ok("fresh".to_string())
            }
            .boxed()
        });
        assert!(matches!(ticket, Ticket::Wait { leader: true, .. }));
        drop(ticket);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(!gate.is_refreshing());
    }

    #[test]
    fn test_rotated_token_skips_refresh() {
        let gate = RefreshGate::default();
        let ticket = gate.ticket(
            Some("old"),
            || Some("new".to_string()),
            || panic!("refresh must not start"),
        );
        assert!(matches!(ticket, Ticket::Current(token) if token == "new"));
        assert!(!gate.is_refreshing());
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_refresh() {
        let gate = Arc::new(RefreshGate::default());
        let starts = Arc::new(AtomicUsize::new(0));

        let start = |gate: Arc<RefreshGate>, starts: Arc<AtomicUsize>| {
            move || {
                starts.fetch_add(1, Ordering::SeqCst);
                async move {
                    tokio::task::yield_now().await;
                    gate.finish();
                    Ok("fresh".to_string())
                }
                .boxed()
            }
        };

        let first = gate.ticket(Some("old"), || Some("old".to_string()), start(gate.clone(), starts.clone()));
        let second = gate.ticket(Some("old"), || Some("old".to_string()), start(gate.clone(), starts.clone()));
        assert!(gate.is_refreshing());

        let (Ticket::Wait { refresh: a, leader: true }, Ticket::Wait { refresh: b, leader: false }) =
            (first, second)
        else {
            panic!("expected one leader and one follower");
        };

        let (a, b) = tokio::join!(a, b);
        assert_eq!(a, Ok("fresh".to_string()));
        assert_eq!(b, Ok("fresh".to_string()));
        assert_eq!(starts.load(Ordering::SeqCst), 1);
        assert!(!gate.is_refreshing());
    }

    #[tokio::test]
    async fn test_failure_is_shared_and_slot_resets() {
        let gate = Arc::new(RefreshGate::default());
        let g = gate.clone();
        let ticket = gate.ticket(None, || None, move || {
            async move {
                g.finish();
                Err(SessionExpiry::RefreshRejected)
            }
            .boxed()
        });
        let Ticket::Wait { refresh, .. } = ticket else {
            panic!("expected a refresh to start");
        };
        assert_eq!(refresh.await, Err(SessionExpiry::RefreshRejected));
        assert!(!gate.is_refreshing());

        // Next 401 starts a new attempt
        let ticket = gate.ticket(None, || None, || ready(Err(SessionExpiry::MissingRefreshToken)));
        assert!(matches!(ticket, Ticket::Wait { leader: true, .. }));
    }
}
