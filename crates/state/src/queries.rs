//! SQL queries for module and processing state

use chrono::{DateTime, Utc};
use modsite_errors::{Error, StateError};
use modsite_types::{
    License, LicenseMetadata, Module, ModuleInfo, ModuleVersionState, PackageVersionState, Unit,
    VersionMapEntry, VersionType,
};
use serde::de::DeserializeOwned;
use sqlx::sqlite::SqliteRow;
use sqlx::{query, Row, Sqlite, Transaction};

fn corrupted(message: impl Into<String>) -> Error {
    StateError::StateCorrupted {
        message: message.into(),
    }
    .into()
}

fn from_json<T: DeserializeOwned>(column: &str, text: &str) -> Result<T, Error> {
    serde_json::from_str(text).map_err(|e| corrupted(format!("{column}: {e}")))
}

fn timestamp(column: &str, millis: i64) -> Result<DateTime<Utc>, Error> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| corrupted(format!("{column}: timestamp {millis} out of range")))
}

fn status(row: &SqliteRow) -> Result<u16, Error> {
    let raw: i64 = row.get("status");
    u16::try_from(raw).map_err(|_| corrupted(format!("status {raw} out of range")))
}

fn version_type(text: &str) -> Result<VersionType, Error> {
    match text {
        "release" => Ok(VersionType::Release),
        "prerelease" => Ok(VersionType::Prerelease),
        "pseudo" => Ok(VersionType::Pseudo),
        other => Err(corrupted(format!("unknown version type {other:?}"))),
    }
}

/// Remove a module version and its units.
pub async fn delete_module(
    tx: &mut Transaction<'_, Sqlite>,
    module_path: &str,
    version: &str,
) -> Result<bool, Error> {
    query("DELETE FROM units WHERE module_path = ?1 AND version = ?2")
        .bind(module_path)
        .bind(version)
        .execute(&mut **tx)
        .await?;
    let result = query("DELETE FROM modules WHERE module_path = ?1 AND version = ?2")
        .bind(module_path)
        .bind(version)
        .execute(&mut **tx)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Write a module version and all of its units, replacing whatever was
/// stored for it before.
pub async fn replace_module(tx: &mut Transaction<'_, Sqlite>, module: &Module) -> Result<(), Error> {
    let info = &module.info;
    if module.units.is_empty() {
        return Err(StateError::InsertInvalid {
            message: format!("{}@{} has no units", info.module_path, info.version),
        }
        .into());
    }
    delete_module(tx, &info.module_path, &info.version).await?;

    query(
        "INSERT INTO modules (module_path, version, commit_time, version_type,
             is_redistributable, has_go_mod, deprecated_comment, licenses, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )
    .bind(&info.module_path)
    .bind(&info.version)
    .bind(info.commit_time.timestamp_millis())
    .bind(info.version_type.to_string())
    .bind(info.is_redistributable)
    .bind(info.has_go_mod)
    .bind(info.deprecated_comment.as_deref())
    .bind(serde_json::to_string(&module.licenses)?)
    .bind(Utc::now().timestamp_millis())
    .execute(&mut **tx)
    .await?;

    for unit in &module.units {
        if unit.module_path != info.module_path || unit.version != info.version {
            return Err(StateError::InsertInvalid {
                message: format!(
                    "unit {} belongs to {}@{}",
                    unit.path, unit.module_path, unit.version
                ),
            }
            .into());
        }
        let readme = unit.readme.as_ref().map(serde_json::to_string).transpose()?;
        let package = unit.package.as_ref().map(serde_json::to_string).transpose()?;
        query(
            "INSERT INTO units (module_path, version, path, is_redistributable, licenses, readme, package)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&unit.module_path)
        .bind(&unit.version)
        .bind(&unit.path)
        .bind(unit.is_redistributable)
        .bind(serde_json::to_string(&unit.licenses)?)
        .bind(readme)
        .bind(package)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

/// Module-level metadata of a stored version.
pub async fn get_module_info(
    tx: &mut Transaction<'_, Sqlite>,
    module_path: &str,
    version: &str,
) -> Result<Option<ModuleInfo>, Error> {
    let row = query(
        "SELECT module_path, version, commit_time, version_type, is_redistributable,
                has_go_mod, deprecated_comment
         FROM modules WHERE module_path = ?1 AND version = ?2",
    )
    .bind(module_path)
    .bind(version)
    .fetch_optional(&mut **tx)
    .await?;

    row.map(|r| {
        let kind: String = r.get("version_type");
        Ok(ModuleInfo {
            module_path: r.get("module_path"),
            version: r.get("version"),
            commit_time: timestamp("commit_time", r.get("commit_time"))?,
            version_type: version_type(&kind)?,
            is_redistributable: r.get("is_redistributable"),
            has_go_mod: r.get("has_go_mod"),
            deprecated_comment: r.get("deprecated_comment"),
        })
    })
    .transpose()
}

/// License files of a stored version.
pub async fn get_licenses(
    tx: &mut Transaction<'_, Sqlite>,
    module_path: &str,
    version: &str,
) -> Result<Option<Vec<License>>, Error> {
    let row = query("SELECT licenses FROM modules WHERE module_path = ?1 AND version = ?2")
        .bind(module_path)
        .bind(version)
        .fetch_optional(&mut **tx)
        .await?;
    row.map(|r| {
        let text: String = r.get("licenses");
        from_json("licenses", &text)
    })
    .transpose()
}

fn unit_from_row(r: &SqliteRow) -> Result<Unit, Error> {
    let licenses: String = r.get("licenses");
    let readme: Option<String> = r.get("readme");
    let package: Option<String> = r.get("package");
    Ok(Unit {
        path: r.get("path"),
        module_path: r.get("module_path"),
        version: r.get("version"),
        is_redistributable: r.get("is_redistributable"),
        licenses: from_json::<Vec<LicenseMetadata>>("licenses", &licenses)?,
        readme: readme.map(|t| from_json("readme", &t)).transpose()?,
        package: package.map(|t| from_json("package", &t)).transpose()?,
    })
}

/// One unit of a stored version.
pub async fn get_unit(
    tx: &mut Transaction<'_, Sqlite>,
    path: &str,
    module_path: &str,
    version: &str,
) -> Result<Option<Unit>, Error> {
    let row = query(
        "SELECT module_path, version, path, is_redistributable, licenses, readme, package
         FROM units WHERE path = ?1 AND module_path = ?2 AND version = ?3",
    )
    .bind(path)
    .bind(module_path)
    .bind(version)
    .fetch_optional(&mut **tx)
    .await?;
    row.as_ref().map(unit_from_row).transpose()
}

/// All units of a stored version, sorted by path.
pub async fn get_units(
    tx: &mut Transaction<'_, Sqlite>,
    module_path: &str,
    version: &str,
) -> Result<Vec<Unit>, Error> {
    let rows = query(
        "SELECT module_path, version, path, is_redistributable, licenses, readme, package
         FROM units WHERE module_path = ?1 AND version = ?2 ORDER BY path",
    )
    .bind(module_path)
    .bind(version)
    .fetch_all(&mut **tx)
    .await?;
    rows.iter().map(unit_from_row).collect()
}

/// Record the outcome of a fetch attempt. `try_count` counts attempts, so an
/// existing row has it incremented instead of overwritten.
pub async fn upsert_module_version_state(
    tx: &mut Transaction<'_, Sqlite>,
    state: &ModuleVersionState,
) -> Result<(), Error> {
    query(
        "INSERT INTO module_version_states (module_path, version, status, error, go_mod_path,
             has_go_mod, app_version, try_count, last_processed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT (module_path, version) DO UPDATE SET
             status = excluded.status,
             error = excluded.error,
             go_mod_path = excluded.go_mod_path,
             has_go_mod = excluded.has_go_mod,
             app_version = excluded.app_version,
             try_count = module_version_states.try_count + 1,
             last_processed_at = excluded.last_processed_at",
    )
    .bind(&state.module_path)
    .bind(&state.version)
    .bind(i64::from(state.status))
    .bind(state.error.as_deref())
    .bind(state.go_mod_path.as_deref())
    .bind(state.has_go_mod)
    .bind(&state.app_version)
    .bind(i64::from(state.try_count.max(1)))
    .bind(state.last_processed_at.timestamp_millis())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn get_module_version_state(
    tx: &mut Transaction<'_, Sqlite>,
    module_path: &str,
    version: &str,
) -> Result<Option<ModuleVersionState>, Error> {
    let row = query(
        "SELECT module_path, version, status, error, go_mod_path, has_go_mod, app_version,
                try_count, last_processed_at
         FROM module_version_states WHERE module_path = ?1 AND version = ?2",
    )
    .bind(module_path)
    .bind(version)
    .fetch_optional(&mut **tx)
    .await?;

    row.map(|r| {
        let try_count: i64 = r.get("try_count");
        Ok(ModuleVersionState {
            module_path: r.get("module_path"),
            version: r.get("version"),
            status: status(&r)?,
            error: r.get("error"),
            go_mod_path: r.get("go_mod_path"),
            has_go_mod: r.get("has_go_mod"),
            app_version: r.get("app_version"),
            try_count: u32::try_from(try_count)
                .map_err(|_| corrupted(format!("try_count {try_count} out of range")))?,
            last_processed_at: timestamp("last_processed_at", r.get("last_processed_at"))?,
        })
    })
    .transpose()
}

/// Insert or overwrite per-package states. Packages not named keep
/// whatever state an earlier attempt recorded.
pub async fn upsert_package_version_states(
    tx: &mut Transaction<'_, Sqlite>,
    states: &[PackageVersionState],
) -> Result<(), Error> {
    for state in states {
        query(
            "INSERT INTO package_version_states (package_path, module_path, version, status, error)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (package_path, module_path, version) DO UPDATE SET
                 status = excluded.status,
                 error = excluded.error",
        )
        .bind(&state.package_path)
        .bind(&state.module_path)
        .bind(&state.version)
        .bind(i64::from(state.status))
        .bind(state.error.as_deref())
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

pub async fn get_package_version_states(
    tx: &mut Transaction<'_, Sqlite>,
    module_path: &str,
    version: &str,
) -> Result<Vec<PackageVersionState>, Error> {
    let rows = query(
        "SELECT package_path, module_path, version, status, error
         FROM package_version_states WHERE module_path = ?1 AND version = ?2
         ORDER BY package_path",
    )
    .bind(module_path)
    .bind(version)
    .fetch_all(&mut **tx)
    .await?;
    rows.iter()
        .map(|r| {
            Ok(PackageVersionState {
                package_path: r.get("package_path"),
                module_path: r.get("module_path"),
                version: r.get("version"),
                status: status(r)?,
                error: r.get("error"),
            })
        })
        .collect()
}

pub async fn upsert_version_map(
    tx: &mut Transaction<'_, Sqlite>,
    entry: &VersionMapEntry,
) -> Result<(), Error> {
    query(
        "INSERT INTO version_map (module_path, requested_version, resolved_version, go_mod_path,
             status, error, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT (module_path, requested_version) DO UPDATE SET
             resolved_version = excluded.resolved_version,
             go_mod_path = excluded.go_mod_path,
             status = excluded.status,
             error = excluded.error,
             updated_at = excluded.updated_at",
    )
    .bind(&entry.module_path)
    .bind(&entry.requested_version)
    .bind(entry.resolved_version.as_deref())
    .bind(entry.go_mod_path.as_deref())
    .bind(i64::from(entry.status))
    .bind(entry.error.as_deref())
    .bind(Utc::now().timestamp_millis())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn get_version_map(
    tx: &mut Transaction<'_, Sqlite>,
    module_path: &str,
    requested_version: &str,
) -> Result<Option<VersionMapEntry>, Error> {
    let row = query(
        "SELECT module_path, requested_version, resolved_version, go_mod_path, status, error
         FROM version_map WHERE module_path = ?1 AND requested_version = ?2",
    )
    .bind(module_path)
    .bind(requested_version)
    .fetch_optional(&mut **tx)
    .await?;
    row.map(|r| {
        Ok(VersionMapEntry {
            module_path: r.get("module_path"),
            requested_version: r.get("requested_version"),
            resolved_version: r.get("resolved_version"),
            go_mod_path: r.get("go_mod_path"),
            status: status(&r)?,
            error: r.get("error"),
        })
    })
    .transpose()
}

pub async fn insert_excluded_prefix(
    tx: &mut Transaction<'_, Sqlite>,
    prefix: &str,
    reason: &str,
) -> Result<(), Error> {
    query(
        "INSERT INTO excluded_prefixes (prefix, reason, created_at) VALUES (?1, ?2, ?3)
         ON CONFLICT (prefix) DO UPDATE SET reason = excluded.reason",
    )
    .bind(prefix)
    .bind(reason)
    .bind(Utc::now().timestamp_millis())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Whether `path` starts with any excluded prefix.
pub async fn is_excluded(tx: &mut Transaction<'_, Sqlite>, path: &str) -> Result<bool, Error> {
    let row = query(
        "SELECT 1 FROM excluded_prefixes WHERE substr(?1, 1, length(prefix)) = prefix LIMIT 1",
    )
    .bind(path)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(row.is_some())
}
