//! Callback execution modes, hook replacement and batch resets, driven by an
//! in-memory session so timing is deterministic.

mod support;

use batch_http::{BatchDispatcher, CallbackMode, Error, Outcome, RequestOptions};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use support::ScriptedSession;

fn dispatcher_with(session: Arc<ScriptedSession>, mode: Option<CallbackMode>) -> BatchDispatcher {
    let mut builder = BatchDispatcher::builder().session(session);
    if let Some(mode) = mode {
        builder = builder.callback(mode);
    }
    builder.build().unwrap()
}

#[test]
fn test_direct_callback_sees_every_outcome() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let session = Arc::new(ScriptedSession::new(Duration::from_millis(5)));
    let dispatcher = dispatcher_with(
        Arc::clone(&session),
        Some(CallbackMode::direct(move |outcome: &Outcome| {
            sink.lock().unwrap().push(outcome.request_id());
            Ok(())
        })),
    );

    let results = dispatcher
        .batch(|scope| {
            for i in 0..8 {
                scope.get(&format!("http://svc/{}", i), RequestOptions::default());
            }
            Ok(())
        })
        .unwrap();

    assert_eq!(results.len(), 8);
    assert_eq!(session.calls.load(Ordering::SeqCst), 8);
    let mut ids = seen.lock().unwrap().clone();
    ids.sort();
    let mut expected: Vec<_> = results.iter().map(|o| o.request_id()).collect();
    expected.sort();
    assert_eq!(ids, expected);
}

#[test]
fn test_blocking_callbacks_finish_before_await_returns() {
    let done = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&done);
    let session = Arc::new(ScriptedSession::new(Duration::ZERO));
    let dispatcher = dispatcher_with(
        session,
        Some(CallbackMode::blocking(move |_| {
            std::thread::sleep(Duration::from_millis(50));
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })),
    );

    for _ in 0..6 {
        dispatcher.get("http://svc/slow-callback", RequestOptions::default());
    }
    dispatcher.await_all().unwrap();

    assert_eq!(done.load(Ordering::SeqCst), 6);
    assert_eq!(dispatcher.results().len(), 6);
    assert_eq!(dispatcher.pending_count(), 0);
}

#[test]
fn test_concurrent_callbacks_are_awaited() {
    let done = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&done);
    let session = Arc::new(ScriptedSession::new(Duration::ZERO));
    let dispatcher = dispatcher_with(
        session,
        Some(CallbackMode::concurrent(move |_outcome| {
            let counter = Arc::clone(&counter);
            async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })),
    );

    dispatcher
        .batch(|scope| {
            for _ in 0..4 {
                scope.post("http://svc/items", RequestOptions::default());
            }
            Ok(())
        })
        .unwrap();

    assert_eq!(done.load(Ordering::SeqCst), 4);
}

#[test]
fn test_callback_errors_surface_at_await() {
    let session = Arc::new(ScriptedSession::new(Duration::ZERO));
    let dispatcher = dispatcher_with(
        session,
        Some(CallbackMode::direct(|outcome| {
            if outcome.url().ends_with("/bad") {
                anyhow::bail!("rejected {}", outcome.url());
            }
            Ok(())
        })),
    );

    dispatcher.get("http://svc/good", RequestOptions::default());
    dispatcher.get("http://svc/bad", RequestOptions::default());
    dispatcher.get("http://svc/bad", RequestOptions::default());

    let err = dispatcher.await_all().unwrap_err();
    match err {
        Error::Callback { failed, url, message } => {
            assert_eq!(failed, 2);
            assert_eq!(url, "http://svc/bad");
            assert!(message.contains("rejected"));
        }
        other => panic!("unexpected error: {other}"),
    }
    // Failures were drained; outcomes are still all there.
    assert_eq!(dispatcher.results().len(), 3);
    dispatcher.await_all().unwrap();
}

#[test]
fn test_panicking_callback_is_reported_not_propagated() {
    let session = Arc::new(ScriptedSession::new(Duration::ZERO));
    let dispatcher = dispatcher_with(
        session,
        Some(CallbackMode::blocking(|_| panic!("callback exploded"))),
    );

    dispatcher.get("http://svc/a", RequestOptions::default());
    let err = dispatcher.await_all().unwrap_err();
    assert!(err.to_string().contains("callback exploded"));
    assert_eq!(dispatcher.results().len(), 1);
}

#[test]
fn test_transport_failure_reaches_callback_as_error_record() {
    let handled = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&handled);
    let errors_seen = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&errors_seen);

    let dispatcher = BatchDispatcher::builder()
        .session(Arc::new(ScriptedSession::new(Duration::ZERO)))
        .error_handler(move |err| {
            assert!(err.is_connect());
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .callback(CallbackMode::direct(move |outcome| {
            if outcome.is_error() {
                seen.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        }))
        .build()
        .unwrap();

    let results = dispatcher
        .batch(|scope| {
            scope.get("http://svc/fail", RequestOptions::default());
            scope.get("http://svc/ok", RequestOptions::default());
            Ok(())
        })
        .unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(handled.load(Ordering::SeqCst), 1);
    assert_eq!(errors_seen.load(Ordering::SeqCst), 1);
}

#[test]
fn test_set_callback_only_affects_later_requests() {
    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));
    let (f, s) = (Arc::clone(&first), Arc::clone(&second));

    let session = Arc::new(ScriptedSession::new(Duration::from_millis(30)));
    let dispatcher = dispatcher_with(
        session,
        Some(CallbackMode::direct(move |_| {
            f.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })),
    );

    dispatcher.get("http://svc/1", RequestOptions::default());
    dispatcher.get("http://svc/2", RequestOptions::default());
    // Replaced while the first two are still in flight.
    dispatcher.set_callback(CallbackMode::direct(move |_| {
        s.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }));
    dispatcher.get("http://svc/3", RequestOptions::default());
    dispatcher.await_all().unwrap();

    assert_eq!(first.load(Ordering::SeqCst), 2);
    assert_eq!(second.load(Ordering::SeqCst), 1);

    dispatcher.clear_callback();
    dispatcher.get("http://svc/4", RequestOptions::default());
    dispatcher.await_all().unwrap();
    assert_eq!(second.load(Ordering::SeqCst), 1);
    assert_eq!(dispatcher.results().len(), 4);
}

#[test]
fn test_scope_reset_discards_previous_batch() {
    let session = Arc::new(ScriptedSession::new(Duration::ZERO));
    let dispatcher = dispatcher_with(session, None);

    {
        let scope = dispatcher.scope();
        scope.get("http://svc/a", RequestOptions::default());
        scope.get("http://svc/b", RequestOptions::default());
    }
    assert_eq!(dispatcher.results().len(), 2);

    let second = dispatcher
        .batch(|scope| {
            scope.get("http://svc/c", RequestOptions::default());
            Ok(())
        })
        .unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].url(), "http://svc/c");
}

#[test]
fn test_reset_with_requests_in_flight_does_not_leak() {
    let session = Arc::new(ScriptedSession::new(Duration::from_millis(100)));
    let dispatcher = dispatcher_with(session, None);

    dispatcher.get("http://svc/old", RequestOptions::default());
    dispatcher.reset();
    dispatcher.get("http://svc/new", RequestOptions::default());
    dispatcher.await_all().unwrap();

    // Give the detached request time to finish into the old batch.
    std::thread::sleep(Duration::from_millis(150));
    let results = dispatcher.results();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].url(), "http://svc/new");
}

#[test]
fn test_await_all_is_idempotent_and_noop_when_empty() {
    let session = Arc::new(ScriptedSession::new(Duration::ZERO));
    let dispatcher = dispatcher_with(session, None);

    dispatcher.await_all().unwrap();
    assert!(dispatcher.results().is_empty());

    let h1 = dispatcher.get("http://svc/x", RequestOptions::default());
    let h2 = dispatcher.get("http://svc/y", RequestOptions::default());
    assert!(h2.id > h1.id);
    dispatcher.await_all().unwrap();
    dispatcher.await_all().unwrap();
    assert_eq!(dispatcher.results().len(), 2);
    assert_eq!(dispatcher.take_results().len(), 2);
    assert!(dispatcher.results().is_empty());
}

#[test]
fn test_batch_closure_error_still_awaits_requests() {
    let session = Arc::new(ScriptedSession::new(Duration::from_millis(20)));
    let dispatcher = dispatcher_with(Arc::clone(&session), None);

    let err = dispatcher
        .batch(|scope| {
            scope.get("http://svc/a", RequestOptions::default());
            scope.enqueue("DELETE", "http://svc/b", RequestOptions::default())?;
            Ok(())
        })
        .unwrap_err();

    assert!(err.is_configuration());
    assert_eq!(session.calls.load(Ordering::SeqCst), 1);
    assert_eq!(dispatcher.results().len(), 1);
}

#[test]
fn test_panicking_error_handler_is_reported_as_callback_failure() {
    let dispatcher = BatchDispatcher::builder()
        .session(Arc::new(ScriptedSession::new(Duration::ZERO)))
        .error_handler(|_| panic!("handler exploded"))
        .build()
        .unwrap();

    let handle = dispatcher.get("http://svc/fail", RequestOptions::default());
    let err = dispatcher.await_all().unwrap_err();
    match err {
        Error::Callback { failed, url, message } => {
            assert_eq!(failed, 1);
            assert_eq!(url, "http://svc/fail");
            assert!(message.contains("error handler panicked: handler exploded"), "{message}");
        }
        other => panic!("unexpected error: {other}"),
    }

    // The record still carries the session's own error.
    let outcome = dispatcher.outcome(handle.id).expect("outcome");
    let record = outcome.as_error().expect("error record");
    assert!(record.error.is_connect());
}

#[test]
fn test_set_error_handler_only_affects_later_requests() {
    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));
    let (f, s) = (Arc::clone(&first), Arc::clone(&second));

    let dispatcher = BatchDispatcher::builder()
        .session(Arc::new(ScriptedSession::new(Duration::from_millis(30))))
        .error_handler(move |_| {
            f.fetch_add(1, Ordering::SeqCst);
        })
        .build()
        .unwrap();

    dispatcher.get("http://svc/fail-1", RequestOptions::default());
    dispatcher.get("http://svc/fail-2", RequestOptions::default());
    // Replaced while the first two are still in flight.
    dispatcher.set_error_handler(move |_| {
        s.fetch_add(1, Ordering::SeqCst);
    });
    dispatcher.get("http://svc/fail-3", RequestOptions::default());
    dispatcher.await_all().unwrap();

    assert_eq!(first.load(Ordering::SeqCst), 2);
    assert_eq!(second.load(Ordering::SeqCst), 1);
    assert_eq!(dispatcher.summary().failed, 3);
}

#[test]
fn test_concurrent_callback_error_surfaces_at_await() {
    let session = Arc::new(ScriptedSession::new(Duration::ZERO));
    let dispatcher = dispatcher_with(
        session,
        Some(CallbackMode::concurrent(|outcome: Outcome| async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            anyhow::bail!("late rejection of {}", outcome.url())
        })),
    );

    dispatcher.get("http://svc/a", RequestOptions::default());
    dispatcher.get("http://svc/b", RequestOptions::default());

    match dispatcher.await_all().unwrap_err() {
        Error::Callback { failed, message, .. } => {
            assert_eq!(failed, 2);
            assert!(message.contains("late rejection"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(dispatcher.results().len(), 2);
}

#[test]
fn test_concurrent_callback_panic_while_polled_surfaces_at_await() {
    let session = Arc::new(ScriptedSession::new(Duration::ZERO));
    let dispatcher = dispatcher_with(
        session,
        Some(CallbackMode::concurrent(|_outcome| async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            if true {
                panic!("future exploded");
            }
            Ok(())
        })),
    );

    dispatcher.get("http://svc/a", RequestOptions::default());
    let err = dispatcher.await_all().unwrap_err();
    assert!(err.to_string().contains("callback panicked: future exploded"), "{err}");
    assert_eq!(dispatcher.results().len(), 1);
    dispatcher.await_all().unwrap();
}

#[test]
fn test_outcome_lookup_by_request_id() {
    let session = Arc::new(ScriptedSession::new(Duration::ZERO));
    let dispatcher = dispatcher_with(session, None);

    let ok = dispatcher.get("http://svc/ok", RequestOptions::default());
    let bad = dispatcher.post("http://svc/fail", RequestOptions::default());
    dispatcher.await_all().unwrap();

    assert_eq!(dispatcher.outcome(ok.id).unwrap().url(), "http://svc/ok");
    assert!(dispatcher.outcome(ok.id).unwrap().is_response());
    assert!(dispatcher.outcome(bad.id).unwrap().is_error());

    dispatcher.reset();
    assert!(dispatcher.outcome(ok.id).is_none());
}
