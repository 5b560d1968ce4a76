//! Generic web-application lifecycle shared by every recipe.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

use crate::adapters::database::DatabaseProvisioner;
use crate::adapters::metadata::MetadataStore;
use crate::types::DeleteScope;

pub trait ApplicationLifecycle: Send + Sync {
    /// Remove an installation's files, database and record per `scope`.
    fn remove(&self, docroot: &Path, scope: DeleteScope) -> anyhow::Result<()>;

    /// Fallback version probe when the application's own marker is unusable.
    fn detect_version(&self, docroot: &Path) -> anyhow::Result<Option<String>>;
}

/// Sweep driven by the recorded install metadata.
pub struct GenericLifecycle {
    metadata: Arc<dyn MetadataStore>,
    database: Arc<dyn DatabaseProvisioner>,
}

impl GenericLifecycle {
    pub fn new(metadata: Arc<dyn MetadataStore>, database: Arc<dyn DatabaseProvisioner>) -> Self {
        Self { metadata, database }
    }
}

impl ApplicationLifecycle for GenericLifecycle {
    fn remove(&self, docroot: &Path, scope: DeleteScope) -> anyhow::Result<()> {
        let meta = self.metadata.read(docroot)?;

        if scope.removes_database() {
            match meta
                .as_ref()
                .and_then(|m| Some((m.database.as_deref()?, m.database_user.as_deref()?)))
            {
                Some((database, user)) => self
                    .database
                    .destroy(database, user)
                    .with_context(|| format!("Failed to remove database {}", database))?,
                None => tracing::debug!(
                    docroot = %docroot.display(),
                    "no recorded database, skipping database removal"
                ),
            }
        }

        if scope.removes_files() {
            let removed = crate::fs::clear_dir_contents(docroot)
                .with_context(|| format!("Failed to clear docroot {}", docroot.display()))?;
            tracing::info!(docroot = %docroot.display(), removed, "docroot cleared");
        }

        self.metadata.remove(docroot)?;
        Ok(())
    }

    fn detect_version(&self, docroot: &Path) -> anyhow::Result<Option<String>> {
        Ok(self.metadata.read(docroot)?.map(|meta| meta.version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::metadata::FileMetadataStore;
    use crate::types::{AccountContext, DatabaseCredentials, InstallMeta};
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct DroppingDatabase {
        dropped: Mutex<Vec<String>>,
    }

    impl DatabaseProvisioner for DroppingDatabase {
        fn enabled(&self) -> bool {
            true
        }

        fn create(
            &self,
            _account: &AccountContext,
            _hostname: &str,
            _connection_limit: u32,
        ) -> anyhow::Result<DatabaseCredentials> {
            anyhow::bail!("not used")
        }

        fn destroy(&self, database: &str, _username: &str) -> anyhow::Result<()> {
            self.dropped.lock().unwrap().push(database.to_string());
            Ok(())
        }
    }

    fn setup() -> (TempDir, std::path::PathBuf, Arc<FileMetadataStore>, Arc<DroppingDatabase>) {
        let temp = TempDir::new().unwrap();
        let docroot = temp.path().join("site");
        std::fs::create_dir_all(docroot.join("crons")).unwrap();
        std::fs::write(docroot.join("index.php"), "<?php").unwrap();
        let metadata = Arc::new(FileMetadataStore::new(temp.path().join("meta")));
        metadata
            .write(
                &docroot,
                &InstallMeta {
                    app: "WHMCS".to_string(),
                    version: "8.6.1".to_string(),
                    hostname: "example.com".to_string(),
                    path: String::new(),
                    admin_user: "admin".to_string(),
                    database: Some("acme_db".to_string()),
                    database_user: Some("acme_db".to_string()),
                    installed_at: chrono::Utc::now(),
                },
            )
            .unwrap();
        (temp, docroot, metadata, Arc::new(DroppingDatabase::default()))
    }

    #[test]
    fn all_scope_removes_everything() {
        let (_temp, docroot, metadata, database) = setup();
        let lifecycle = GenericLifecycle::new(metadata.clone(), database.clone());

        lifecycle.remove(&docroot, DeleteScope::All).unwrap();

        assert_eq!(*database.dropped.lock().unwrap(), vec!["acme_db".to_string()]);
        assert_eq!(std::fs::read_dir(&docroot).unwrap().count(), 0);
        assert!(metadata.read(&docroot).unwrap().is_none());
    }

    #[test]
    fn meta_scope_keeps_files_and_database() {
        let (_temp, docroot, metadata, database) = setup();
        let lifecycle = GenericLifecycle::new(metadata.clone(), database.clone());

        lifecycle.remove(&docroot, DeleteScope::Meta).unwrap();

        assert!(database.dropped.lock().unwrap().is_empty());
        assert!(docroot.join("index.php").exists());
        assert!(metadata.read(&docroot).unwrap().is_none());
    }

    #[test]
    fn detect_version_reads_record() {
        let (_temp, docroot, metadata, database) = setup();
        let lifecycle = GenericLifecycle::new(metadata, database);
        assert_eq!(
            lifecycle.detect_version(&docroot).unwrap().as_deref(),
            Some("8.6.1")
        );
    }
}
