//! Integration tests for net crate

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use httpmock::Method::HEAD;
    use modsite_errors::{Error, NetworkError};
    use modsite_events::channel;
    use modsite_net::*;
    use std::time::Duration;

    fn client() -> NetClient {
        NetClient::new(NetConfig {
            retry_count: 0,
            retry_delay: Duration::from_millis(1),
            ..NetConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_text() {
        let server = MockServer::start();
        let (tx, mut rx) = channel();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/m/@v/list");
            then.status(200).body("v1.0.0\nv1.1.0\n");
        });

        let body = fetch_text(&client(), &server.url("/m/@v/list"), Some(&tx))
            .await
            .unwrap();

        mock.assert();
        assert_eq!(body, "v1.0.0\nv1.1.0\n");
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_error_status_is_http_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/gone");
            then.status(410).body("gone");
        });

        let err = fetch_text(&client(), &server.url("/gone"), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Network(NetworkError::HttpError { status: 410, .. })
        ));
    }

    #[tokio::test]
    async fn test_fetch_bytes_enforces_limit() {
        let server = MockServer::start();
        let content = vec![7u8; 4096];
        server.mock(|when, then| {
            when.method(GET).path("/big.zip");
            then.status(200).body(content.clone());
        });

        let ok = fetch_bytes(&client(), &server.url("/big.zip"), 4096, None)
            .await
            .unwrap();
        assert_eq!(ok.len(), 4096);

        let err = fetch_bytes(&client(), &server.url("/big.zip"), 1024, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Network(NetworkError::BodyTooLarge { limit: 1024, .. })
        ));
    }

    #[tokio::test]
    async fn test_content_length_from_head() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(HEAD).path("/m.zip");
            then.status(200).header("content-length", "12345");
        });

        let len = content_length(&client(), &server.url("/m.zip")).await.unwrap();
        assert_eq!(len, Some(12345));
    }

    #[tokio::test]
    async fn test_rate_limited() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/busy");
            then.status(429).header("retry-after", "30");
        });

        let err = client().get(&server.url("/busy")).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Network(NetworkError::RateLimited { seconds: 30 })
        ));
    }
}
