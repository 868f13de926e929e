//! Store interface and its `SQLite` implementation

use std::path::Path;

use async_trait::async_trait;
use modsite_errors::{Error, StateError};
use modsite_types::{
    License, Module, ModuleInfo, ModuleVersionState, PackageVersionState, Unit, VersionMapEntry,
};
use sqlx::{Pool, Sqlite};

use crate::queries;

/// Persistence needed by ingestion.
///
/// `upsert_module` replaces a module version atomically: after it returns,
/// readers see either the complete new module or, on error, the previous one.
#[async_trait]
pub trait ModuleStore: Send + Sync {
    async fn upsert_module(&self, module: &Module) -> Result<(), Error>;

    /// Returns whether anything was deleted.
    async fn delete_module(&self, module_path: &str, version: &str) -> Result<bool, Error>;

    async fn get_module_info(&self, module_path: &str, version: &str) -> Result<ModuleInfo, Error>;

    async fn get_unit(&self, path: &str, module_path: &str, version: &str) -> Result<Unit, Error>;

    async fn get_units(&self, module_path: &str, version: &str) -> Result<Vec<Unit>, Error>;

    async fn get_licenses(&self, module_path: &str, version: &str) -> Result<Vec<License>, Error>;

    async fn upsert_module_version_state(&self, state: &ModuleVersionState) -> Result<(), Error>;

    async fn get_module_version_state(
        &self,
        module_path: &str,
        version: &str,
    ) -> Result<Option<ModuleVersionState>, Error>;

    async fn upsert_package_version_states(
        &self,
        states: &[PackageVersionState],
    ) -> Result<(), Error>;

    async fn get_package_version_states(
        &self,
        module_path: &str,
        version: &str,
    ) -> Result<Vec<PackageVersionState>, Error>;

    async fn upsert_version_map(&self, entry: &VersionMapEntry) -> Result<(), Error>;

    async fn get_version_map(
        &self,
        module_path: &str,
        requested_version: &str,
    ) -> Result<Option<VersionMapEntry>, Error>;

    async fn insert_excluded_prefix(&self, prefix: &str, reason: &str) -> Result<(), Error>;

    async fn is_excluded(&self, path: &str) -> Result<bool, Error>;
}

fn not_found(what: String) -> Error {
    StateError::NotFound { what }.into()
}

/// `SQLite` store shared by every worker of a process.
#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `db_path` and migrate it.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub async fn open(db_path: &Path) -> Result<Self, Error> {
        let pool = crate::create_pool(db_path).await?;
        crate::run_migrations(&pool).await?;
        tracing::debug!(path = %db_path.display(), "opened state database");
        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl ModuleStore for SqliteStore {
    async fn upsert_module(&self, module: &Module) -> Result<(), Error> {
        let mut tx = self.pool.begin().await?;
        queries::replace_module(&mut tx, module).await?;
        tx.commit().await.map_err(|e| StateError::TransactionFailed {
            message: e.to_string(),
        })?;
        tracing::debug!(
            module_path = %module.info.module_path,
            version = %module.info.version,
            units = module.units.len(),
            "stored module"
        );
        Ok(())
    }

    async fn delete_module(&self, module_path: &str, version: &str) -> Result<bool, Error> {
        let mut tx = self.pool.begin().await?;
        let deleted = queries::delete_module(&mut tx, module_path, version).await?;
        tx.commit().await?;
        Ok(deleted)
    }

    async fn get_module_info(&self, module_path: &str, version: &str) -> Result<ModuleInfo, Error> {
        let mut tx = self.pool.begin().await?;
        let info = queries::get_module_info(&mut tx, module_path, version).await?;
        tx.commit().await?;
        info.ok_or_else(|| not_found(format!("module {module_path}@{version}")))
    }

    async fn get_unit(&self, path: &str, module_path: &str, version: &str) -> Result<Unit, Error> {
        let mut tx = self.pool.begin().await?;
        let unit = queries::get_unit(&mut tx, path, module_path, version).await?;
        tx.commit().await?;
        unit.ok_or_else(|| not_found(format!("unit {path} in {module_path}@{version}")))
    }

    async fn get_units(&self, module_path: &str, version: &str) -> Result<Vec<Unit>, Error> {
        let mut tx = self.pool.begin().await?;
        let units = queries::get_units(&mut tx, module_path, version).await?;
        tx.commit().await?;
        Ok(units)
    }

    async fn get_licenses(&self, module_path: &str, version: &str) -> Result<Vec<License>, Error> {
        let mut tx = self.pool.begin().await?;
        let licenses = queries::get_licenses(&mut tx, module_path, version).await?;
        tx.commit().await?;
        licenses.ok_or_else(|| not_found(format!("module {module_path}@{version}")))
    }

    async fn upsert_module_version_state(&self, state: &ModuleVersionState) -> Result<(), Error> {
        let mut tx = self.pool.begin().await?;
        queries::upsert_module_version_state(&mut tx, state).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_module_version_state(
        &self,
        module_path: &str,
        version: &str,
    ) -> Result<Option<ModuleVersionState>, Error> {
        let mut tx = self.pool.begin().await?;
        let state = queries::get_module_version_state(&mut tx, module_path, version).await?;
        tx.commit().await?;
        Ok(state)
    }

    async fn upsert_package_version_states(
        &self,
        states: &[PackageVersionState],
    ) -> Result<(), Error> {
        if states.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        queries::upsert_package_version_states(&mut tx, states).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_package_version_states(
        &self,
        module_path: &str,
        version: &str,
    ) -> Result<Vec<PackageVersionState>, Error> {
        let mut tx = self.pool.begin().await?;
        let states = queries::get_package_version_states(&mut tx, module_path, version).await?;
        tx.commit().await?;
        Ok(states)
    }

    async fn upsert_version_map(&self, entry: &VersionMapEntry) -> Result<(), Error> {
        let mut tx = self.pool.begin().await?;
        queries::upsert_version_map(&mut tx, entry).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_version_map(
        &self,
        module_path: &str,
        requested_version: &str,
    ) -> Result<Option<VersionMapEntry>, Error> {
        let mut tx = self.pool.begin().await?;
        let entry = queries::get_version_map(&mut tx, module_path, requested_version).await?;
        tx.commit().await?;
        Ok(entry)
    }

    async fn insert_excluded_prefix(&self, prefix: &str, reason: &str) -> Result<(), Error> {
        if prefix.is_empty() {
            return Err(StateError::InsertInvalid {
                message: "excluded prefix must not be empty".to_string(),
            }
            .into());
        }
        let mut tx = self.pool.begin().await?;
        queries::insert_excluded_prefix(&mut tx, prefix, reason).await?;
        tx.commit().await?;
        tracing::info!(prefix, reason, "excluded prefix");
        Ok(())
    }

    async fn is_excluded(&self, path: &str) -> Result<bool, Error> {
        let mut tx = self.pool.begin().await?;
        let excluded = queries::is_excluded(&mut tx, path).await?;
        tx.commit().await?;
        Ok(excluded)
    }
}
