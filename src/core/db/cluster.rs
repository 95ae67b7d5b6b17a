/// Cluster Module
///
/// A [`DatabaseCluster`] is a directory holding one SQLite file per
/// database, standing in for a server that hosts many databases. It provides
/// the `CREATE DATABASE` / `DROP DATABASE` surface and the database catalog.

use crate::core::db::connection::Session;
use crate::core::db::schema::TableRef;
use crate::core::{Result, TenantqlError};
use rusqlite::{Connection, OpenFlags};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const DATABASE_EXTENSION: &str = "db";
const SIDE_FILE_SUFFIXES: [&str; 3] = ["-wal", "-shm", "-journal"];

/// A directory of named databases.
#[derive(Debug, Clone)]
pub struct DatabaseCluster {
    root: PathBuf,
}

impl DatabaseCluster {
    /// Uses `root` as the cluster directory, creating it if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        debug!("Opened cluster at {:?}", root);
        Ok(DatabaseCluster { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File path backing the database `name`.
    pub fn database_path(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.root.join(format!("{}.{}", name, DATABASE_EXTENSION)))
    }

    pub fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.database_path(name)?.is_file())
    }

    /// `CREATE DATABASE name`.
    ///
    /// # Errors
    ///
    /// `TenantqlError::DatabaseExists` if `name` is taken, `TenantqlError::Backend`
    /// if SQLite cannot initialise the file.
    pub fn create_database(&self, name: &str) -> Result<()> {
        let path = self.database_path(name)?;
        if path.exists() {
            return Err(TenantqlError::DatabaseExists(name.to_string()));
        }

        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )?;
        // Forces the header page to disk so the file is a valid, non-empty database.
        conn.execute_batch("PRAGMA user_version = 1;")?;
        info!("CREATE DATABASE {}", name);
        Ok(())
    }

    /// `DROP DATABASE name`.
    pub fn drop_database(&self, name: &str) -> Result<()> {
        let path = self.database_path(name)?;
        if !path.is_file() {
            return Err(TenantqlError::UnknownDatabase(name.to_string()));
        }

        fs::remove_file(&path)?;
        for suffix in SIDE_FILE_SUFFIXES {
            let mut side = path.clone().into_os_string();
            side.push(suffix);
            let side = PathBuf::from(side);
            if side.exists() {
                if let Err(e) = fs::remove_file(&side) {
                    warn!("Could not remove {:?}: {}", side, e);
                }
            }
        }
        info!("DROP DATABASE {}", name);
        Ok(())
    }

    /// Names of all databases in the cluster, sorted.
    pub fn list_databases(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(DATABASE_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if validate_name(stem).is_ok() {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Opens a session on an existing database.
    pub fn connect(&self, name: &str) -> Result<Session> {
        let path = self.database_path(name)?;
        if !path.is_file() {
            return Err(TenantqlError::UnknownDatabase(name.to_string()));
        }
        let conn = Connection::open_with_flags(&path, OpenFlags::SQLITE_OPEN_READ_WRITE)?;
        debug!("Connected to database {}", name);
        Ok(Session::for_database(conn, name))
    }

    /// Opens a session on `name`, creating the database first if it is missing.
    pub fn ensure(&self, name: &str) -> Result<Session> {
        if !self.exists(name)? {
            self.create_database(name)?;
        }
        self.connect(name)
    }

    /// All user tables of the database `name`.
    pub fn list_tables_in(&self, name: &str) -> Result<Vec<TableRef>> {
        self.connect(name)?.list_tables()
    }
}

/// Database names become file names, so only `[A-Za-z0-9_]+` is accepted.
fn validate_name(name: &str) -> Result<()> {
    if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(TenantqlError::InvalidName(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorKind;
    use crate::test_utils::temp_cluster;

    #[test]
    fn test_create_list_drop() {
        let (_dir, cluster) = temp_cluster();
        assert!(cluster.list_databases().unwrap().is_empty());

        cluster.create_database("beta").unwrap();
        cluster.create_database("alpha").unwrap();
        assert_eq!(cluster.list_databases().unwrap(), vec!["alpha", "beta"]);

        cluster.drop_database("alpha").unwrap();
        assert_eq!(cluster.list_databases().unwrap(), vec!["beta"]);
    }

    #[test]
    fn test_create_existing_fails() {
        let (_dir, cluster) = temp_cluster();
        cluster.create_database("own").unwrap();
        let err = cluster.create_database("own").unwrap_err();
        assert!(matches!(err, TenantqlError::DatabaseExists(_)));
        assert_eq!(err.kind(), ErrorKind::Backend);
    }

    #[test]
    fn test_unknown_database() {
        let (_dir, cluster) = temp_cluster();
        assert!(matches!(cluster.connect("missing"), Err(TenantqlError::UnknownDatabase(_))));
        assert!(matches!(cluster.drop_database("missing"), Err(TenantqlError::UnknownDatabase(_))));
        assert!(cluster.list_databases().unwrap().is_empty());
    }

    #[test]
    fn test_rejects_path_like_names() {
        let (_dir, cluster) = temp_cluster();
        for name in ["", "../escape", "a/b", "semi;colon", "with space"] {
            let err = cluster.create_database(name).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidQuery, "name {:?}", name);
        }
    }

    #[test]
    fn test_ensure_and_list_tables() {
        let (_dir, cluster) = temp_cluster();
        let session = cluster.ensure("own").unwrap();
        assert_eq!(session.database(), Some("own"));
        session.execute("CREATE TABLE t (a TEXT)").unwrap();
        drop(session);

        let again = cluster.ensure("own").unwrap();
        assert_eq!(again.list_tables().unwrap().len(), 1);
        assert_eq!(cluster.list_tables_in("own").unwrap()[0].name, "t");
    }

    #[test]
    fn test_ignores_foreign_files() {
        let (dir, cluster) = temp_cluster();
        fs::write(dir.path().join("notes.txt"), "hello").unwrap();
        cluster.create_database("only").unwrap();
        assert_eq!(cluster.list_databases().unwrap(), vec!["only"]);
    }
}
