//! Integration tests for proxy crate

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use httpmock::prelude::*;
    use httpmock::Method::HEAD;
    use modsite_archive::build_module_zip;
    use modsite_errors::status;
    use modsite_net::NetConfig;
    use modsite_proxy::*;

    fn proxy_client(server: &MockServer, max_zip: u64) -> ProxyClient {
        let net = NetConfig {
            retry_count: 0,
            retry_delay: Duration::from_millis(1),
            ..NetConfig::default()
        };
        ProxyClient::new(&server.base_url(), net, max_zip).unwrap()
    }

    #[tokio::test]
    async fn test_resolve_latest_and_branch() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/github.com/!burnt!sushi/toml/@latest");
            then.status(200)
                .body(r#"{"Version":"v1.3.2","Time":"2023-06-08T06:07:00Z"}"#);
        });
        server.mock(|when, then| {
            when.method(GET).path("/github.com/!burnt!sushi/toml/@v/master.info");
            then.status(200).body(
                r#"{"Version":"v1.3.3-0.20230801000000-0123456789ab","Time":"2023-08-01T00:00:00Z"}"#,
            );
        });

        let client = proxy_client(&server, 1 << 20);
        let latest = client
            .resolve_version("github.com/BurntSushi/toml", "latest")
            .await
            .unwrap();
        assert_eq!(latest.version, "v1.3.2");
        let master = client
            .resolve_version("github.com/BurntSushi/toml", "master")
            .await
            .unwrap();
        assert!(master.version.starts_with("v1.3.3-0."));
    }

    #[tokio::test]
    async fn test_not_found_and_gone() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/example.com/m/@v/v1.0.0.info");
            then.status(404).body("not found");
        });
        server.mock(|when, then| {
            when.method(GET).path("/example.com/m/@v/v1.1.0.info");
            then.status(410).body("gone");
        });
        server.mock(|when, then| {
            when.method(GET).path("/example.com/m/@v/junk.info");
            then.status(400).body("bad request");
        });

        let client = proxy_client(&server, 1 << 20);
        for v in ["v1.0.0", "v1.1.0"] {
            let err = client
                .resolve_version("example.com/m", v)
                .await
                .unwrap_err();
            assert_eq!(err.status_code(), status::NOT_FOUND);
        }
        let err = client
            .resolve_version("example.com/m", "junk")
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), status::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_zip_size_and_download() {
        let server = MockServer::start();
        let zip = build_module_zip(
            "example.com/m",
            "v1.0.0",
            &[("go.mod", "module example.com/m\n"), ("m.go", "package m\n")],
        )
        .unwrap();
        let len = zip.len();
        server.mock(|when, then| {
            when.method(HEAD).path("/example.com/m/@v/v1.0.0.zip");
            then.status(200).header("content-length", len.to_string());
        });
        let body = zip.to_vec();
        server.mock(|when, then| {
            when.method(GET).path("/example.com/m/@v/v1.0.0.zip");
            then.status(200).body(body);
        });
        server.mock(|when, then| {
            when.method(GET).path("/example.com/m/@v/v1.0.0.mod");
            then.status(200).body("module example.com/m\n");
        });

        let client = proxy_client(&server, 1 << 20);
        assert_eq!(
            client.zip_size("example.com/m", "v1.0.0").await.unwrap(),
            len as u64
        );
        let archive = client.fetch_zip("example.com/m", "v1.0.0").await.unwrap();
        assert!(archive.contains("example.com/m@v1.0.0/m.go"));
        let go_mod = client.fetch_mod("example.com/m", "v1.0.0").await.unwrap();
        assert_eq!(go_mod.as_deref(), Some(&b"module example.com/m\n"[..]));

        let small = proxy_client(&server, 16);
        let err = small.fetch_zip("example.com/m", "v1.0.0").await.unwrap_err();
        assert_eq!(err.status_code(), status::MODULE_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_router_sends_std_to_snapshot() {
        let server = MockServer::start();
        let proxy: Arc<dyn ModuleSource> = Arc::new(proxy_client(&server, 1 << 20));
        let router = SourceRouter::new(proxy);
        let info = router.resolve_version("std", "master").await.unwrap();
        assert_eq!(info.version, "v1.21.0");
        assert_eq!(
            router.zip_size("std", &info.version).await.unwrap(),
            stdlib::ESTIMATED_ZIP_SIZE
        );
    }
}
