use wiremock::MockServer;

/// `false` when localhost cannot be bound, in which case the caller skips.
///
/// Panics instead when `BOORU_CRAWLER_REQUIRE_SOCKET_TESTS` is set.
#[track_caller]
pub(crate) fn localhost_bindable() -> bool {
    if std::net::TcpListener::bind("127.0.0.1:0").is_ok() {
        return true;
    }
    let required = std::env::var("BOORU_CRAWLER_REQUIRE_SOCKET_TESTS")
        .is_ok_and(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"));
    let location = std::panic::Location::caller();
    assert!(
        !required,
        "cannot bind localhost socket at {location}; unset BOORU_CRAWLER_REQUIRE_SOCKET_TESTS to skip"
    );
    eprintln!("[socket-bound-test] cannot bind localhost socket at {location}. Skipping test.");
    false
}

/// Starts a wiremock server, or returns `None` when sockets are unavailable.
pub(crate) async fn start_mock_server_or_skip() -> Option<MockServer> {
    if localhost_bindable() {
        Some(MockServer::start().await)
    } else {
        None
    }
}
