//! # Correlation Properties
//!
//! Guarantees the engine must keep under concurrency:
//!
//! 1. **At-most-one resolution**: racing replies and cancellations settle a
//!    handle exactly once
//! 2. **No leak**: a finished request leaves no pending entry behind
//! 3. **Correct matching**: a reply reaches only the call that issued its ID
//! 4. **Unmatched drop**: a reply nobody waits for changes nothing
//! 5. **Handler isolation**: one failing request does not stop the replier
//! 6. **Cancellation precedence**: cancelling before the reply wins, and the
//!    late reply is dropped

#[cfg(test)]
mod tests {
    use crate::harness::{eventually, reply_to, RecordingSink, RejectingPublisher, Rig, TextReply, TextRequest};
    use reqrep_core::{
        CancellationToken, CompletionHandle, CompletionState, DispatchMode, HandlerFailure, PendingRequestTable,
        ReplierConfig, RequestError, Requester, RequesterConfig, ResolveOutcome,
    };
    use shared_bus::{InMemoryBus, MessagePublisher};
    use shared_types::CorrelationId;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    // =========================================================================
    // AT-MOST-ONE RESOLUTION
    // =========================================================================

    #[test]
    fn test_racing_settlers_have_one_winner() {
        for _ in 0..200 {
            let (handle, _completion) = CompletionHandle::<u32>::new();
            let wins = AtomicUsize::new(0);

            std::thread::scope(|scope| {
                for i in 0..4 {
                    let handle = &handle;
                    let wins = &wins;
                    scope.spawn(move || {
                        let won = if i % 2 == 0 { handle.resolve(i) } else { handle.cancel() };
                        if won {
                            wins.fetch_add(1, Ordering::SeqCst);
                        }
                    });
                }
            });

            assert_eq!(wins.load(Ordering::SeqCst), 1);
            assert!(handle.state().is_terminal());
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_duplicate_replies_resolve_once() {
        let table = Arc::new(PendingRequestTable::<u32>::new());
        let id = CorrelationId::new();
        let (handle, completion) = CompletionHandle::new();
        table.insert_if_absent(id, handle).unwrap();

        let deliveries: Vec<_> = (0..8)
            .map(|value| {
                let table = table.clone();
                tokio::spawn(async move { table.resolve(&id, value) })
            })
            .collect();

        let outcomes: Vec<ResolveOutcome> = futures::future::join_all(deliveries)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        let resolved = outcomes.iter().filter(|o| **o == ResolveOutcome::Resolved).count();
        assert_eq!(resolved, 1);
        assert!(completion.await.is_some());
        assert!(table.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_reply_and_cancellation_race_settles_once() {
        const ROUNDS: u64 = 100;
        let rig = Rig::new();
        let mut inbox = rig.requests.subscription();

        for _ in 0..ROUNDS {
            let token = CancellationToken::new();
            let call = tokio::spawn({
                let requester = rig.requester.clone();
                let token = token.clone();
                async move { requester.request(TextRequest::new("race"), Some(token)).await }
            });

            let request = inbox.recv().await.unwrap();
            let replies = rig.replies.clone();
            let cancel = tokio::spawn(async move { token.cancel() });
            let reply = tokio::spawn(async move { replies.publish(TextReply::answering(&request)).await });
            cancel.await.unwrap();
            reply.await.unwrap().unwrap();

            match timeout(Duration::from_secs(1), call).await.unwrap().unwrap() {
                Ok(reply) => assert_eq!(reply.text, "Reply to race"),
                Err(err) => assert!(matches!(err, RequestError::Cancelled(_))),
            }
        }

        let stats = rig.requester.stats();
        assert_eq!(stats.completed + stats.cancelled, ROUNDS);
        assert_eq!(rig.requester.pending_count(), 0);
    }

    // =========================================================================
    // NO LEAK
    // =========================================================================

    #[tokio::test]
    async fn test_every_exit_path_releases_its_entry() {
        let rig = Rig::new();
        let sink = Arc::new(RecordingSink::default());
        let (_replier, _subscription) = rig.serve(ReplierConfig::default(), sink);

        // answered
        rig.requester.request(TextRequest::new("ok"), None).await.unwrap();
        assert_eq!(rig.requester.pending_count(), 0);

        // handler failure, then timeout
        let result = rig
            .requester
            .request_with_timeout(TextRequest::new("bad"), Duration::from_millis(30))
            .await;
        assert!(matches!(result, Err(RequestError::Cancelled(_))));
        assert_eq!(rig.requester.pending_count(), 0);

        // cancelled mid-flight
        let token = CancellationToken::new();
        let canceller = {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                token.cancel();
            })
        };
        let unanswered = Requester::<TextRequest, TextReply>::new(
            Arc::new(InMemoryBus::<TextRequest>::new("void")),
            &*rig.replies,
            RequesterConfig::default(),
        );
        let result = unanswered.request(TextRequest::new("lost"), Some(token)).await;
        canceller.await.unwrap();
        assert!(matches!(result, Err(RequestError::Cancelled(_))));
        assert_eq!(unanswered.pending_count(), 0);

        // future dropped
        let dropped = timeout(Duration::from_millis(10), unanswered.request(TextRequest::new("dropped"), None)).await;
        assert!(dropped.is_err());
        assert_eq!(unanswered.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_publish_failure_releases_its_entry() {
        let replies = InMemoryBus::<TextReply>::new("replies");
        let requester = Requester::<TextRequest, TextReply>::new(
            Arc::new(RejectingPublisher),
            &replies,
            RequesterConfig::default(),
        );

        let result = requester.request(TextRequest::new("Hello"), None).await;

        assert!(matches!(result, Err(RequestError::PublishFailure(_))));
        assert_eq!(requester.pending_count(), 0);
        assert_eq!(requester.stats().publish_failures, 1);
    }

    // =========================================================================
    // CORRECT MATCHING
    // =========================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_replies_in_reverse_order_reach_their_callers() {
        const CALLS: usize = 8;
        let rig = Rig::new();
        let mut inbox = rig.requests.subscription();

        let calls: Vec<_> = (0..CALLS)
            .map(|i| {
                let requester = rig.requester.clone();
                tokio::spawn(async move {
                    let text = format!("call {i}");
                    let reply = requester.request(TextRequest::new(text.clone()), None).await;
                    (text, reply)
                })
            })
            .collect();

        let mut received = Vec::with_capacity(CALLS);
        for _ in 0..CALLS {
            received.push(inbox.recv().await.unwrap());
        }
        for request in received.iter().rev() {
            rig.replies.publish(TextReply::answering(request)).await.unwrap();
        }

        for call in calls {
            let (text, reply) = timeout(Duration::from_secs(1), call).await.unwrap().unwrap();
            assert_eq!(reply.unwrap().text, format!("Reply to {text}"));
        }
        assert_eq!(rig.requester.stats().unmatched_replies, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_dispatch_keeps_matching() {
        let rig = Rig::new();
        let sink = Arc::new(RecordingSink::default());
        let config = ReplierConfig::default().with_dispatch(DispatchMode::Concurrent);
        let (_replier, _subscription) = rig.serve(config, sink);

        let calls: Vec<_> = (0..32)
            .map(|i| {
                let requester = rig.requester.clone();
                tokio::spawn(async move {
                    let reply = requester
                        .request_with_timeout(TextRequest::new(format!("n{i}")), Duration::from_secs(1))
                        .await
                        .unwrap();
                    assert_eq!(reply.text, format!("Reply to n{i}"));
                })
            })
            .collect();

        for call in futures::future::join_all(calls).await {
            call.unwrap();
        }
        assert_eq!(rig.requester.pending_count(), 0);
    }

    // =========================================================================
    // UNMATCHED DROP
    // =========================================================================

    #[tokio::test]
    async fn test_unmatched_reply_leaves_pending_request_alone() {
        let rig = Rig::new();
        let mut inbox = rig.requests.subscription();

        let call = tokio::spawn({
            let requester = rig.requester.clone();
            async move { requester.request(TextRequest::new("waiting"), None).await }
        });
        let request = inbox.recv().await.unwrap();

        rig.replies
            .publish(TextReply {
                correlation_id: Some(CorrelationId::new()),
                text: "stray".to_string(),
            })
            .await
            .unwrap();
        let requester = rig.requester.clone();
        eventually(move || requester.stats().unmatched_replies == 1).await;

        assert_eq!(rig.requester.pending_count(), 1);
        assert!(rig.requester.is_pending(&request.correlation_id.unwrap()));

        rig.replies.publish(TextReply::answering(&request)).await.unwrap();
        let reply = timeout(Duration::from_secs(1), call).await.unwrap().unwrap().unwrap();
        assert_eq!(reply.text, "Reply to waiting");
    }

    // =========================================================================
    // HANDLER ISOLATION
    // =========================================================================

    #[tokio::test]
    async fn test_failing_request_does_not_stop_the_replier() {
        let rig = Rig::new();
        let sink = Arc::new(RecordingSink::default());
        let (replier, subscription) = rig.serve(ReplierConfig::default(), sink.clone());

        let bad = rig
            .requester
            .request_with_timeout(TextRequest::new("bad"), Duration::from_millis(50))
            .await;
        let good = rig
            .requester
            .request_with_timeout(TextRequest::new("good"), Duration::from_secs(1))
            .await;

        assert!(matches!(bad, Err(RequestError::Cancelled(_))));
        assert_eq!(good.unwrap().text, "Reply to good");
        assert!(subscription.is_active());

        let failures = sink.failures();
        assert_eq!(failures.len(), 1);
        assert!(matches!(failures[0], HandlerFailure::Handler { .. }));

        let stats = replier.stats();
        assert_eq!(stats.received, 2);
        assert_eq!(stats.replied, 1);
        assert_eq!(stats.failed, 1);
    }

    #[test]
    fn test_handler_refuses_only_bad() {
        assert!(reply_to(TextRequest::new("bad")).is_err());
        assert!(reply_to(TextRequest::new("badge")).is_ok());
    }

    // =========================================================================
    // CANCELLATION PRECEDENCE
    // =========================================================================

    #[tokio::test]
    async fn test_cancellation_before_reply_wins() {
        let rig = Rig::new();
        let mut inbox = rig.requests.subscription();
        let token = CancellationToken::new();

        let call = tokio::spawn({
            let requester = rig.requester.clone();
            let token = token.clone();
            async move { requester.request(TextRequest::new("late"), Some(token)).await }
        });
        let request = inbox.recv().await.unwrap();

        token.cancel();
        let result = timeout(Duration::from_secs(1), call).await.unwrap().unwrap();
        assert_eq!(result, Err(RequestError::Cancelled(request.correlation_id.unwrap())));

        rig.replies.publish(TextReply::answering(&request)).await.unwrap();
        let requester = rig.requester.clone();
        eventually(move || requester.stats().unmatched_replies == 1).await;

        assert_eq!(rig.requester.pending_count(), 0);
        assert_eq!(rig.requester.stats().completed, 0);
    }

    #[tokio::test]
    async fn test_cancelled_handle_rejects_late_resolution() {
        let (handle, completion) = CompletionHandle::new();

        assert!(handle.cancel());
        assert!(!handle.resolve("late"));
        assert_eq!(handle.state(), CompletionState::Cancelled);
        assert_eq!(completion.await, None);
    }
}
