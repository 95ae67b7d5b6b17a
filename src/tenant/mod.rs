//! Tenant provisioning: one physical database per tenant account, tracked in
//! a registry table inside the control database.
//!
//! A provisioning attempt moves through
//! `Idle -> ControlDbOpened -> TenantDbCreated -> RegistryRecorded`, or
//! `TenantDbCreated -> RolledBack` when the registry write fails. The steps
//! are not atomic: a crash between creating the database and recording it
//! leaves an orphan database that nothing cleans up.
use crate::config::Config;
use crate::core::db::{
    ColumnSpec, ColumnType, DatabaseCluster, Filter, Session, TableRef, TableSpec, Value,
    ALL_COLUMNS,
};
use crate::core::{Result, TenantqlError};
use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use tracing::{error, info, warn};

/// Registry column holding the generated database name.
const NAME_COLUMN: &str = "name";
/// Registry column holding the account display name.
const DISPLAY_NAME_COLUMN: &str = "real_name";

/// One registry row: generated database name and account display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TenantRegistryEntry {
    pub generated_db_name: String,
    pub display_name: String,
}

/// Steps of a provisioning attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionState {
    Idle,
    ControlDbOpened,
    TenantDbCreated,
    RegistryRecorded,
    RolledBack,
}

/// Source of the timestamp that tenant database names are derived from.
pub trait Clock {
    fn now(&self) -> NaiveDateTime;
}

/// Wall clock in the local time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalClock;

impl Clock for LocalClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

impl<F: Fn() -> NaiveDateTime> Clock for F {
    fn now(&self) -> NaiveDateTime {
        self()
    }
}

/// `<prefix>_<YYYYMMDDHHMMSS>`. Two calls within the same second collide.
pub fn generate_db_name(prefix: &str, at: NaiveDateTime) -> String {
    format!("{}_{}", prefix, at.format("%Y%m%d%H%M%S"))
}

/// Creates and tracks tenant databases in a cluster.
pub struct Provisioner<C: Clock = LocalClock> {
    cluster: DatabaseCluster,
    control_database: String,
    registry_table: String,
    name_prefix: String,
    clock: C,
    session: Option<Session>,
}

impl Provisioner<LocalClock> {
    /// Provisioner over `cluster` using the configured names.
    pub fn new(cluster: DatabaseCluster, config: &Config) -> Self {
        Provisioner::with_clock(cluster, config, LocalClock)
    }

    /// Opens the configured cluster directory.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Provisioner::new(DatabaseCluster::open(&config.data_dir)?, config))
    }
}

impl<C: Clock> Provisioner<C> {
    pub fn with_clock(cluster: DatabaseCluster, config: &Config, clock: C) -> Self {
        Provisioner {
            cluster,
            control_database: config.control_database.clone(),
            registry_table: config.registry_table.clone(),
            name_prefix: config.name_prefix.clone(),
            clock,
            session: None,
        }
    }

    pub fn cluster(&self) -> &DatabaseCluster {
        &self.cluster
    }

    pub fn control_database(&self) -> &str {
        &self.control_database
    }

    fn registry_spec(&self) -> TableSpec {
        TableSpec::new(
            self.registry_table.clone(),
            vec![
                ColumnSpec::new(NAME_COLUMN, ColumnType::Text).not_null().unique(),
                ColumnSpec::new(DISPLAY_NAME_COLUMN, ColumnType::Text).not_null().unique(),
            ],
        )
    }

    /// Session on the control database, creating the database and its
    /// registry table on first use. Reuses the open session when it already
    /// targets the control database.
    fn control_session(&mut self) -> Result<&Session> {
        let reuse = matches!(
            &self.session,
            Some(s) if s.database() == Some(self.control_database.as_str())
        );
        if !reuse {
            let session = self.cluster.ensure(&self.control_database)?;
            session.ensure_table(&self.registry_spec())?;
            self.session = Some(session);
        }
        match &self.session {
            Some(session) => Ok(session),
            None => Err(TenantqlError::UnknownDatabase(self.control_database.clone())),
        }
    }

    /// Creates the control database and registry table if they do not exist.
    pub fn init_control_database(&mut self) -> Result<()> {
        info!("Initialising control database {}", self.control_database);
        self.control_session()?;
        Ok(())
    }

    /// Creates a database for a new tenant account and records it in the registry.
    ///
    /// # Errors
    ///
    /// - `TenantqlError::DatabaseExists` (or another backend error) if the
    ///   database cannot be created; nothing is recorded.
    /// - `TenantqlError::ProvisioningFailed` if the registry insert fails; the
    ///   new database is dropped first, best effort.
    pub fn provision(&mut self, display_name: &str) -> Result<String> {
        let mut state = ProvisionState::Idle;
        info!(?state, display_name, "Provisioning tenant");

        let db_name = generate_db_name(&self.name_prefix, self.clock.now());
        let registry_table = self.registry_table.clone();
        self.control_session()?;
        state = ProvisionState::ControlDbOpened;
        info!(?state, database = %db_name, "Provisioning step");

        if let Err(e) = self.cluster.create_database(&db_name) {
            error!("Failed to create tenant database {}: {}", db_name, e);
            return Err(e);
        }
        state = ProvisionState::TenantDbCreated;
        info!(?state, database = %db_name, "Provisioning step");

        let recorded = self.control_session().and_then(|session| {
            session.insert(
                &registry_table,
                &[
                    (NAME_COLUMN, Value::from(db_name.as_str())),
                    (DISPLAY_NAME_COLUMN, Value::from(display_name)),
                ],
            )
        });

        match recorded {
            Ok(_) => {
                state = ProvisionState::RegistryRecorded;
                info!(?state, database = %db_name, display_name, "Provisioning step");
                Ok(db_name)
            }
            Err(e) => {
                error!("Failed to record tenant {} in {}: {}", db_name, registry_table, e);
                let rolled_back = match self.cluster.drop_database(&db_name) {
                    Ok(()) => true,
                    Err(drop_err) => {
                        warn!("Rollback of {} failed: {}", db_name, drop_err);
                        false
                    }
                };
                state = ProvisionState::RolledBack;
                info!(?state, database = %db_name, rolled_back, "Provisioning step");
                Err(TenantqlError::ProvisioningFailed {
                    database: db_name,
                    rolled_back,
                    source: Box::new(e),
                })
            }
        }
    }

    /// All registry entries.
    pub fn list_accounts(&mut self) -> Result<Vec<TenantRegistryEntry>> {
        let table = self.registry_table.clone();
        let rows = self.control_session()?.find(&[table], &[ALL_COLUMNS], None)?;
        Ok(rows
            .into_iter()
            .map(|mut row| TenantRegistryEntry {
                generated_db_name: row.remove(NAME_COLUMN).unwrap_or_default(),
                display_name: row.remove(DISPLAY_NAME_COLUMN).unwrap_or_default(),
            })
            .collect())
    }

    /// Registry entry for a display name, if recorded.
    pub fn find_account(&mut self, display_name: &str) -> Result<Option<TenantRegistryEntry>> {
        let table = self.registry_table.clone();
        let filter = Filter::new(format!("{} = ?1", DISPLAY_NAME_COLUMN), [display_name]);
        let mut rows = self
            .control_session()?
            .find(&[table], &[NAME_COLUMN, DISPLAY_NAME_COLUMN], Some(filter))?;
        Ok(rows.pop().map(|mut row| TenantRegistryEntry {
            generated_db_name: row.remove(NAME_COLUMN).unwrap_or_default(),
            display_name: row.remove(DISPLAY_NAME_COLUMN).unwrap_or_default(),
        }))
    }

    /// Tables of a tenant (or any cluster) database.
    pub fn list_tables(&self, database: &str) -> Result<Vec<TableRef>> {
        self.cluster.list_tables_in(database)
    }

    /// Drops a database. Registry rows are left untouched.
    pub fn remove_database(&self, database: &str) -> Result<()> {
        if database == self.control_database {
            return Err(TenantqlError::InvalidName(format!(
                "{} is the control database",
                database
            )));
        }
        self.cluster.drop_database(database)
    }
}
