use oxide_sauce::reply::{self, Reply, Segment};
use oxide_sauce::saucenao::{SauceNaoError, SearchBackend, SearchResponse};
use oxide_sauce::search::SearchHandler;
use oxide_sauce::session::{SessionExpiry, SessionTracker};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(30);

struct FixedBackend {
    body: &'static str,
    calls: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl SearchBackend for FixedBackend {
    async fn search(
        &self,
        _image_url: &str,
        _api_key: &str,
        _max_results: usize,
    ) -> Result<SearchResponse, SauceNaoError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        serde_json::from_str(self.body).map_err(|e| SauceNaoError::Json(e.to_string()))
    }
}

fn handler(body: &'static str, api_key: &str) -> (SearchHandler<FixedBackend>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let backend = FixedBackend {
        body,
        calls: Arc::clone(&calls),
    };
    (SearchHandler::new(backend, api_key, 5), calls)
}

const SIX_RESULTS: &str = r#"{"results": [
    {"header": {"similarity": "12.3"}, "data": {"member_name": "a"}},
    {"header": {"similarity": "99.0", "thumbnail": "https://t.test/b.jpg"}, "data": {"member_name": "b", "ext_urls": ["https://src.test/b"]}},
    {"header": {"similarity": "45.5"}, "data": {"creator": "c"}},
    {"header": {"similarity": "99.0"}, "data": {"member_name": "d"}},
    {"header": {"similarity": "10.0"}, "data": {"member_name": "e"}},
    {"header": {"similarity": "50.0"}, "data": {}}
]}"#;

#[tokio::test(start_paused = true)]
async fn sessions_are_isolated_between_users() {
    let sessions: SessionTracker<String> = SessionTracker::in_memory(TIMEOUT);
    let _alice = sessions.begin_session("alice".to_string()).await;
    let _bob = sessions.begin_session("bob".to_string()).await;

    assert!(sessions.end_session(&"bob".to_string()).await);
    assert!(sessions.has_session(&"alice".to_string()).await);
}

#[tokio::test(start_paused = true)]
async fn timeout_without_image_notifies_once() {
    let sessions = Arc::new(SessionTracker::<String>::in_memory(TIMEOUT));
    let armed = sessions.begin_session("alice".to_string()).await;

    let timer = tokio::spawn({
        let sessions = Arc::clone(&sessions);
        async move { sessions.wait_for_expiry(armed).await }
    });

    let outcome = timer.await.expect("timer task panicked");
    assert_eq!(outcome, SessionExpiry::Expired);
    assert!(!sessions.has_session(&"alice".to_string()).await);
    // A late image finds nothing to consume
    assert!(!sessions.end_session(&"alice".to_string()).await);
}

#[tokio::test(start_paused = true)]
async fn image_before_timeout_suppresses_notice() {
    let sessions = Arc::new(SessionTracker::<String>::in_memory(TIMEOUT));
    let armed = sessions.begin_session("alice".to_string()).await;
    let timer = tokio::spawn({
        let sessions = Arc::clone(&sessions);
        async move { sessions.wait_for_expiry(armed).await }
    });

    tokio::time::advance(Duration::from_secs(10)).await;
    assert!(sessions.end_session(&"alice".to_string()).await);

    let (search, calls) = handler(SIX_RESULTS, "key");
    let reply = search.search_reply("https://img.test/a.png").await;
    assert!(reply.text().starts_with(reply::RESULTS_HEADER));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    tokio::time::advance(TIMEOUT).await;
    let outcome = timer.await.expect("timer task panicked");
    assert_eq!(outcome, SessionExpiry::Resolved);
}

#[tokio::test(start_paused = true)]
async fn simultaneous_image_and_timeout_have_one_winner() {
    for _ in 0..50 {
        let sessions = Arc::new(SessionTracker::<String>::in_memory(TIMEOUT));
        let armed = sessions.begin_session("alice".to_string()).await;

        let timer = tokio::spawn({
            let sessions = Arc::clone(&sessions);
            async move { sessions.wait_for_expiry(armed).await }
        });
        let image = tokio::spawn({
            let sessions = Arc::clone(&sessions);
            async move {
                tokio::time::sleep(TIMEOUT).await;
                sessions.end_session(&"alice".to_string()).await
            }
        });

        let expired = timer.await.expect("timer task panicked") == SessionExpiry::Expired;
        let consumed = image.await.expect("image task panicked");

        assert!(expired ^ consumed, "expired={expired} consumed={consumed}");
        assert!(!sessions.has_session(&"alice".to_string()).await);
    }
}

#[tokio::test(start_paused = true)]
async fn repeated_command_restarts_window() {
    let sessions = Arc::new(SessionTracker::<String>::in_memory(TIMEOUT));
    let first = sessions.begin_session("alice".to_string()).await;
    let first_timer = tokio::spawn({
        let sessions = Arc::clone(&sessions);
        async move { sessions.wait_for_expiry(first).await }
    });

    tokio::time::advance(Duration::from_secs(20)).await;
    let second = sessions.begin_session("alice".to_string()).await;
    assert_eq!(
        first_timer.await.expect("timer task panicked"),
        SessionExpiry::Resolved
    );

    // 40s after the first command, 20s after the second
    tokio::time::advance(Duration::from_secs(20)).await;
    assert!(sessions.has_session(&"alice".to_string()).await);

    assert_eq!(sessions.wait_for_expiry(second).await, SessionExpiry::Expired);
}

#[tokio::test]
async fn results_are_ranked_and_truncated_to_five() {
    let (search, _) = handler(SIX_RESULTS, "key");
    let reply = search.search_reply("https://img.test/a.png").await;
    let text = reply.text();

    let ranks: Vec<&str> = text
        .lines()
        .filter(|line| line.starts_with('#'))
        .collect();
    assert_eq!(
        ranks,
        vec![
            "#1 Similarity: 99.0%",
            "#2 Similarity: 99.0%",
            "#3 Similarity: 50.0%",
            "#4 Similarity: 45.5%",
            "#5 Similarity: 12.3%",
        ]
    );
    assert!(!text.contains("Author: e"));

    // Ties keep API order; the thumbnail follows its own block
    assert_eq!(
        reply.segments()[1],
        Segment::Image("https://t.test/b.jpg".to_string())
    );
    assert!(text.contains("Author: b\nSource: https://src.test/b\n\n#2"));
    assert!(text.contains("#3 Similarity: 50.0%\nAuthor: unknown\nSource: no source link\n"));
}

#[tokio::test]
async fn empty_results_reply_is_exactly_the_notice() {
    let (search, calls) = handler(r#"{"results": []}"#, "key");
    let reply = search.search_reply("https://img.test/a.png").await;

    assert_eq!(reply, Reply::plain(reply::NO_RESULTS));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn empty_api_key_makes_no_call() {
    let (search, calls) = handler(SIX_RESULTS, "");
    let reply = search.search_reply("https://img.test/a.png").await;

    assert_eq!(reply, Reply::plain(reply::MISSING_API_KEY));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn parse_failure_yields_single_generic_reply() {
    let (search, _) = handler("<html>not json</html>", "key");
    let reply = search.search_reply("https://img.test/a.png").await;

    assert_eq!(reply, Reply::plain(reply::SEARCH_FAILED));
    assert!(reply.images().is_empty());
}

#[tokio::test]
async fn missing_header_yields_generic_reply() {
    let (search, _) = handler(r#"{"results": [{"data": {}}]}"#, "key");
    let reply = search.search_reply("https://img.test/a.png").await;

    assert_eq!(reply, Reply::plain(reply::SEARCH_FAILED));
}
