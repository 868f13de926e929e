//! Integration tests for the SQLite store

use chrono::{TimeZone, Utc};
use modsite_errors::{status, Error, StateError};
use modsite_state::{ModuleStore, SqliteStore};
use modsite_types::{
    BuildContext, Documentation, License, LicenseMetadata, Module, ModuleInfo,
    ModuleVersionState, Package, PackageVersionState, Readme, Unit, VersionMapEntry,
    VersionType,
};
use tempfile::TempDir;

const M: &str = "example.com/m";

async fn open() -> (SqliteStore, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open(&dir.path().join("db").join("state.sqlite"))
        .await
        .unwrap();
    (store, dir)
}

fn mit() -> LicenseMetadata {
    LicenseMetadata {
        types: vec!["MIT".into()],
        file_path: "LICENSE".into(),
        coverage: 100.0,
    }
}

fn unit(path: &str, version: &str, with_package: bool) -> Unit {
    Unit {
        path: path.to_string(),
        module_path: M.to_string(),
        version: version.to_string(),
        is_redistributable: true,
        licenses: vec![mit()],
        readme: (path == M).then(|| Readme {
            file_path: "README.md".into(),
            contents: "# m".into(),
        }),
        package: with_package.then(|| Package {
            path: path.to_string(),
            name: path.rsplit('/').next().unwrap_or(path).to_string(),
            v1_path: path.to_string(),
            is_redistributable: true,
            licenses: vec![mit()],
            imports: vec!["fmt".into()],
            documentation: vec![Documentation {
                build_context: BuildContext::all(),
                synopsis: "Package doc.".into(),
                html: "<p>doc</p>".into(),
            }],
        }),
    }
}

fn module(version: &str, units: Vec<Unit>) -> Module {
    Module {
        info: ModuleInfo {
            module_path: M.to_string(),
            version: version.to_string(),
            commit_time: Utc.with_ymd_and_hms(2023, 1, 2, 3, 4, 5).unwrap(),
            version_type: VersionType::Release,
            is_redistributable: true,
            has_go_mod: true,
            deprecated_comment: Some("use example.com/n".into()),
        },
        licenses: vec![License {
            metadata: mit(),
            is_redistributable: true,
            contents: b"Permission is hereby granted".to_vec(),
        }],
        units,
    }
}

fn is_not_found(err: &Error) -> bool {
    matches!(err, Error::State(StateError::NotFound { .. })) && err.status_code() == status::NOT_FOUND
}

#[tokio::test]
async fn stores_and_reads_a_module() {
    let (store, _dir) = open().await;
    let m = module(
        "v1.0.0",
        vec![
            unit(M, "v1.0.0", false),
            unit("example.com/m/a", "v1.0.0", true),
        ],
    );
    store.upsert_module(&m).await.unwrap();

    let info = store.get_module_info(M, "v1.0.0").await.unwrap();
    assert_eq!(info, m.info);
    assert_eq!(store.get_units(M, "v1.0.0").await.unwrap(), m.units);
    assert_eq!(store.get_licenses(M, "v1.0.0").await.unwrap(), m.licenses);

    let a = store.get_unit("example.com/m/a", M, "v1.0.0").await.unwrap();
    assert_eq!(a.package.unwrap().synopsis(), "Package doc.");
    let root = store.get_unit(M, M, "v1.0.0").await.unwrap();
    assert!(root.is_module_root());
    assert_eq!(root.readme.unwrap().contents, "# m");
}

#[tokio::test]
async fn upsert_replaces_instead_of_merging() {
    let (store, _dir) = open().await;
    store
        .upsert_module(&module(
            "v1.0.0",
            vec![
                unit(M, "v1.0.0", false),
                unit("example.com/m/a", "v1.0.0", true),
                unit("example.com/m/b", "v1.0.0", true),
            ],
        ))
        .await
        .unwrap();
    store
        .upsert_module(&module(
            "v1.0.0",
            vec![unit(M, "v1.0.0", false), unit("example.com/m/a", "v1.0.0", true)],
        ))
        .await
        .unwrap();

    let paths: Vec<String> = store
        .get_units(M, "v1.0.0")
        .await
        .unwrap()
        .into_iter()
        .map(|u| u.path)
        .collect();
    assert_eq!(paths, vec![M.to_string(), "example.com/m/a".to_string()]);
    let err = store.get_unit("example.com/m/b", M, "v1.0.0").await.unwrap_err();
    assert!(is_not_found(&err));
}

#[tokio::test]
async fn failed_upsert_keeps_previous_module() {
    let (store, _dir) = open().await;
    let good = module("v1.0.0", vec![unit(M, "v1.0.0", false)]);
    store.upsert_module(&good).await.unwrap();

    let bad = module(
        "v1.0.0",
        vec![unit(M, "v1.0.0", false), unit("example.com/m/x", "v9.9.9", true)],
    );
    let err = store.upsert_module(&bad).await.unwrap_err();
    assert!(matches!(err, Error::State(StateError::InsertInvalid { .. })));
    assert_eq!(store.get_units(M, "v1.0.0").await.unwrap(), good.units);

    let empty = module("v1.0.0", Vec::new());
    assert!(store.upsert_module(&empty).await.is_err());
    assert_eq!(store.get_units(M, "v1.0.0").await.unwrap(), good.units);
}

#[tokio::test]
async fn delete_removes_module_but_not_states() {
    let (store, _dir) = open().await;
    store
        .upsert_module(&module("v1.0.0", vec![unit(M, "v1.0.0", false)]))
        .await
        .unwrap();
    store
        .upsert_package_version_states(&[PackageVersionState::new(
            "example.com/m/a",
            M,
            "v1.0.0",
            status::OK,
        )])
        .await
        .unwrap();

    assert!(store.delete_module(M, "v1.0.0").await.unwrap());
    assert!(!store.delete_module(M, "v1.0.0").await.unwrap());
    assert!(is_not_found(&store.get_module_info(M, "v1.0.0").await.unwrap_err()));
    assert!(is_not_found(&store.get_licenses(M, "v1.0.0").await.unwrap_err()));
    assert!(store.get_units(M, "v1.0.0").await.unwrap().is_empty());
    assert_eq!(store.get_package_version_states(M, "v1.0.0").await.unwrap().len(), 1);
}

#[tokio::test]
async fn module_version_state_counts_tries() {
    let (store, _dir) = open().await;
    assert!(store.get_module_version_state(M, "v1.0.0").await.unwrap().is_none());

    let mut state = ModuleVersionState {
        module_path: M.to_string(),
        version: "v1.0.0".to_string(),
        status: status::INTERNAL,
        error: Some("boom".into()),
        go_mod_path: None,
        has_go_mod: false,
        app_version: "test".into(),
        try_count: 1,
        last_processed_at: Utc::now(),
    };
    store.upsert_module_version_state(&state).await.unwrap();
    state.status = status::OK;
    state.error = None;
    state.go_mod_path = Some(M.to_string());
    state.has_go_mod = true;
    store.upsert_module_version_state(&state).await.unwrap();

    let got = store.get_module_version_state(M, "v1.0.0").await.unwrap().unwrap();
    assert_eq!(got.status, status::OK);
    assert_eq!(got.error, None);
    assert_eq!(got.go_mod_path.as_deref(), Some(M));
    assert!(got.has_go_mod);
    assert_eq!(got.try_count, 2);
}

#[tokio::test]
async fn package_states_accumulate_across_attempts() {
    let (store, _dir) = open().await;
    store
        .upsert_package_version_states(&[
            PackageVersionState::new("example.com/m/b", M, "v1.0.0", status::MAX_FILE_SIZE_LIMIT_EXCEEDED)
                .with_error("b.go: too large"),
            PackageVersionState::new("example.com/m/a", M, "v1.0.0", status::OK),
        ])
        .await
        .unwrap();
    store
        .upsert_package_version_states(&[PackageVersionState::new(
            "example.com/m/b",
            M,
            "v1.0.0",
            status::OK,
        )])
        .await
        .unwrap();

    let states = store.get_package_version_states(M, "v1.0.0").await.unwrap();
    assert_eq!(
        states,
        vec![
            PackageVersionState::new("example.com/m/a", M, "v1.0.0", status::OK),
            PackageVersionState::new("example.com/m/b", M, "v1.0.0", status::OK),
        ]
    );
}

#[tokio::test]
async fn version_map_tracks_requested_versions() {
    let (store, _dir) = open().await;
    let mut entry = VersionMapEntry {
        module_path: M.to_string(),
        requested_version: "latest".to_string(),
        resolved_version: Some("v1.0.0".to_string()),
        go_mod_path: Some(M.to_string()),
        status: status::OK,
        error: None,
    };
    store.upsert_version_map(&entry).await.unwrap();
    entry.resolved_version = Some("v1.1.0".to_string());
    store.upsert_version_map(&entry).await.unwrap();

    assert_eq!(store.get_version_map(M, "latest").await.unwrap(), Some(entry));
    assert_eq!(store.get_version_map(M, "master").await.unwrap(), None);
}

#[tokio::test]
async fn excluded_prefixes_match_by_prefix() {
    let (store, _dir) = open().await;
    assert!(!store.is_excluded("github.com/bad/repo").await.unwrap());
    store
        .insert_excluded_prefix("github.com/bad", "spam")
        .await
        .unwrap();
    store
        .insert_excluded_prefix("github.com/bad", "abuse")
        .await
        .unwrap();

    assert!(store.is_excluded("github.com/bad").await.unwrap());
    assert!(store.is_excluded("github.com/bad/repo").await.unwrap());
    assert!(!store.is_excluded("github.com/good").await.unwrap());
    assert!(store.insert_excluded_prefix("", "empty").await.is_err());
}

#[tokio::test]
async fn reopening_keeps_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.sqlite");
    {
        let store = SqliteStore::open(&path).await.unwrap();
        store
            .upsert_module(&module("v1.0.0", vec![unit(M, "v1.0.0", false)]))
            .await
            .unwrap();
        store.pool().close().await;
    }
    let store = SqliteStore::open(&path).await.unwrap();
    assert_eq!(store.get_units(M, "v1.0.0").await.unwrap().len(), 1);
}
