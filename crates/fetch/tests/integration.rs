//! End-to-end fetches against the in-memory proxy

use std::sync::Arc;
use std::time::Duration;

use modsite_errors::{status, FetchError};
use modsite_fetch::{ExtractLimits, FetchInfoRegistry, Fetcher};
use modsite_proxy::{MemoryProxy, SourceRouter};
use modsite_resources::{LoadShedder, ZipLoadShedder};
use modsite_types::FetchPhase;

const MIT: &str = "Permission is hereby granted, free of charge, to any person obtaining a copy of this software, to deal in the Software without restriction. The above copyright notice and this permission notice shall be included in all copies. THE SOFTWARE IS PROVIDED \"AS IS\", WITHOUT WARRANTY OF ANY KIND.";
const DEADLINE: Duration = Duration::from_secs(30);

fn fetcher(proxy: &MemoryProxy) -> Fetcher {
    Fetcher::new(Arc::new(SourceRouter::new(Arc::new(proxy.clone()))))
        .with_registry(Arc::new(FetchInfoRegistry::new()))
}

#[tokio::test]
async fn one_oversized_package_degrades_the_module() {
    let proxy = MemoryProxy::new();
    let big = format!("package b\n\n// {}\n", "x".repeat(4096));
    proxy
        .add_module(
            "example.com/m",
            "v1.0.0",
            &[
                ("go.mod", "module example.com/m\n"),
                ("LICENSE", MIT),
                ("a/a.go", "// Package a is fine.\npackage a\n"),
                ("b/b.go", big.as_str()),
            ],
        )
        .unwrap();
    let limits = ExtractLimits {
        max_file_size: 1024,
        ..ExtractLimits::default()
    };
    let fr = fetcher(&proxy)
        .with_limits(limits)
        .fetch_module("example.com/m", "v1.0.0", DEADLINE)
        .await;

    assert_eq!(fr.status, status::HAS_INCOMPLETE_PACKAGES);
    assert!(fr.is_success());
    let states: Vec<(&str, u16)> = fr
        .package_version_states
        .iter()
        .map(|s| (s.package_path.as_str(), s.status))
        .collect();
    assert_eq!(
        states,
        vec![
            ("example.com/m/a", status::OK),
            ("example.com/m/b", status::MAX_FILE_SIZE_LIMIT_EXCEEDED)
        ]
    );

    let module = fr.module.as_ref().unwrap();
    assert_eq!(module.packages().count(), 1);
    let paths: Vec<&str> = module.units.iter().map(|u| u.path.as_str()).collect();
    assert_eq!(paths, vec!["example.com/m", "example.com/m/a", "example.com/m/b"]);
    assert!(module.unit("example.com/m/a").unwrap().is_package());
    assert!(!module.unit("example.com/m/b").unwrap().is_package());
}

#[tokio::test]
async fn zero_packages_is_bad_module_with_states() {
    let proxy = MemoryProxy::new();
    proxy
        .add_module(
            "example.com/m",
            "v1.0.0",
            &[
                ("go.mod", "module example.com/m\n"),
                ("a/a.go", "//go:build plan9\n\npackage a\n"),
            ],
        )
        .unwrap();
    let fr = fetcher(&proxy)
        .fetch_module("example.com/m", "v1.0.0", DEADLINE)
        .await;

    assert_eq!(fr.status, status::BAD_MODULE);
    assert!(fr.module.is_none());
    assert_eq!(fr.package_version_states.len(), 1);
    assert_eq!(
        fr.package_version_states[0].status,
        status::BUILD_CONTEXT_NOT_SUPPORTED
    );
}

#[tokio::test]
async fn go_mod_mismatch_records_declared_path() {
    let proxy = MemoryProxy::new();
    proxy
        .add_module(
            "github.com/old/name",
            "v1.0.0",
            &[
                ("go.mod", "module github.com/new/name\n"),
                ("LICENSE", MIT),
                ("n.go", "package name\n"),
            ],
        )
        .unwrap();
    let shedder = Arc::new(ZipLoadShedder::new(u64::MAX));
    let fr = fetcher(&proxy)
        .with_shedder(shedder.clone())
        .fetch_module("github.com/old/name", "v1.0.0", DEADLINE)
        .await;

    assert_eq!(fr.status, status::ALTERNATIVE_MODULE);
    assert_eq!(fr.go_mod_path.as_deref(), Some("github.com/new/name"));
    assert!(fr.module.is_none());
    assert!(fr.package_version_states.is_empty());
    assert!(matches!(
        fr.error.as_ref().and_then(|e| e.as_fetch()),
        Some(FetchError::AlternativeModule { go_mod_path, .. }) if go_mod_path == "github.com/new/name"
    ));
    assert!(shedder.stats().is_idle());
}

#[tokio::test]
async fn missing_go_mod_is_not_an_error() {
    let proxy = MemoryProxy::new();
    proxy
        .add_module("example.com/old", "v1.0.0", &[("LICENSE", MIT), ("o.go", "package old\n")])
        .unwrap();
    let fr = fetcher(&proxy)
        .fetch_module("example.com/old", "v1.0.0", DEADLINE)
        .await;
    assert_eq!(fr.status, status::OK);
    assert!(!fr.has_go_mod);
    assert_eq!(fr.go_mod_path.as_deref(), Some("example.com/old"));
    assert!(!fr.module.unwrap().info.has_go_mod);
}

#[tokio::test]
async fn malformed_go_mod_is_bad_module() {
    let proxy = MemoryProxy::new();
    proxy
        .add_module(
            "example.com/m",
            "v1.0.0",
            &[("go.mod", "module example.com/m\nrequire (\n"), ("m.go", "package m\n")],
        )
        .unwrap();
    let fr = fetcher(&proxy)
        .fetch_module("example.com/m", "v1.0.0", DEADLINE)
        .await;
    assert_eq!(fr.status, status::BAD_MODULE);
    assert_eq!(fr.go_mod_path.as_deref(), Some("example.com/m"));
}

#[tokio::test(start_paused = true)]
async fn deadline_expiry_leaves_no_outcome() {
    let proxy = MemoryProxy::new();
    proxy
        .add_module("example.com/slow", "v1.0.0", &[("s.go", "package slow\n")])
        .unwrap();
    proxy.set_latency(Duration::from_secs(60));
    let shedder = Arc::new(ZipLoadShedder::new(u64::MAX));
    let fetcher = fetcher(&proxy).with_shedder(shedder.clone());
    let fr = fetcher
        .fetch_module("example.com/slow", "v1.0.0", Duration::from_secs(1))
        .await;

    assert_eq!(fr.status, status::REQUEST_TIMEOUT);
    assert!(matches!(
        fr.error.as_ref().and_then(|e| e.as_fetch()),
        Some(FetchError::DeadlineExceeded { seconds: 1 })
    ));
    assert!(fr.module.is_none());
    assert!(fr.package_version_states.is_empty());
    assert!(shedder.stats().is_idle());
    assert_eq!(
        fetcher.registry().get(fr.fetch_id).unwrap().phase,
        FetchPhase::Failed
    );
}

#[tokio::test]
async fn refetch_is_deterministic() {
    let proxy = MemoryProxy::new();
    proxy
        .add_module(
            "example.com/m",
            "v1.0.0",
            &[
                ("go.mod", "module example.com/m\n"),
                ("LICENSE", MIT),
                ("README.md", "hello"),
                ("x/y/z.go", "// Package z.\npackage z\n\nconst Big = \"long\"\n"),
            ],
        )
        .unwrap();
    let fetcher = fetcher(&proxy);
    let first = fetcher.fetch_module("example.com/m", "v1.0.0", DEADLINE).await;
    let second = fetcher.fetch_module("example.com/m", "v1.0.0", DEADLINE).await;
    assert_eq!(first.status, status::OK);
    assert_eq!(
        first.module.as_ref().unwrap().units,
        second.module.as_ref().unwrap().units
    );
    assert_eq!(first.package_version_states, second.package_version_states);
    assert_eq!(fetcher.registry().snapshot().len(), 2);
}

#[tokio::test]
async fn standard_library() {
    let fetcher = fetcher(&MemoryProxy::new());
    let fr = fetcher.fetch_module("std", "master", DEADLINE).await;

    assert_eq!(fr.status, status::OK, "{:?}", fr.error);
    assert_eq!(fr.resolved_version.as_deref(), Some("v1.21.0"));
    assert!(fr.has_go_mod);
    assert_eq!(fr.go_mod_path.as_deref(), Some("std"));
    let module = fr.module.as_ref().unwrap();
    let paths: Vec<&str> = module.units.iter().map(|u| u.path.as_str()).collect();
    assert_eq!(
        paths,
        vec![
            "cmd", "cmd/go", "crypto", "crypto/rand", "errors", "fmt", "io", "net", "net/http",
            "std"
        ]
    );
    assert!(module.unit("std").unwrap().is_module_root());
    assert_eq!(module.unit("cmd/go").unwrap().package.as_ref().unwrap().name, "main");
    let rand = module.unit("crypto/rand").unwrap().package.as_ref().unwrap();
    let contexts: Vec<String> = rand
        .documentation
        .iter()
        .map(|d| d.build_context.to_string())
        .collect();
    assert_eq!(contexts, vec!["linux/amd64", "windows/amd64", "darwin/amd64"]);
    let fmt = module.unit("fmt").unwrap().package.as_ref().unwrap();
    assert_eq!(fmt.imports, vec!["errors", "io"]);

    let fr = fetcher.fetch_module("std", "v1.99.0", DEADLINE).await;
    assert_eq!(fr.status, status::NOT_FOUND);
    let fr = fetcher.fetch_module("std", "not-a-version", DEADLINE).await;
    assert_eq!(fr.status, status::BAD_REQUEST);
}

#[tokio::test]
async fn held_reservation_sheds_the_next_fetch() {
    let proxy = MemoryProxy::new();
    for v in ["v1.0.0", "v1.1.0"] {
        proxy
            .add_module("example.com/m", v, &[("LICENSE", MIT), ("m.go", "package m\n")])
            .unwrap();
    }
    let shedder = Arc::new(ZipLoadShedder::new(1));
    let fetcher = fetcher(&proxy).with_shedder(shedder.clone());

    let first = fetcher.fetch_module("example.com/m", "v1.0.0", DEADLINE).await;
    assert_eq!(first.status, status::OK);
    assert!(first.holds_admission());

    let second = fetcher.fetch_module("example.com/m", "v1.1.0", DEADLINE).await;
    assert_eq!(second.status, status::SERVICE_UNAVAILABLE);
    assert_eq!(proxy.zip_requests(), 1);
    assert_eq!(shedder.stats().requests_shed, 1);

    drop(first);
    assert!(shedder.stats().is_idle());
    let third = fetcher.fetch_module("example.com/m", "v1.1.0", DEADLINE).await;
    assert_eq!(third.status, status::OK);
}
