//! End-to-end provisioning tests against temporary cluster directories.

use chrono::{Duration, NaiveDateTime};
use std::cell::Cell;
use tempfile::TempDir;
use tenantql::config::Config;
use tenantql::core::db::{DatabaseCluster, Filter, Value};
use tenantql::core::{ErrorKind, TenantqlError};
use tenantql::tenant::{Clock, Provisioner};

/// Clock advancing by a fixed step per reading.
struct SteppingClock {
    next: Cell<NaiveDateTime>,
    step: Duration,
}

impl SteppingClock {
    fn new(start: &str, step: Duration) -> Self {
        SteppingClock {
            next: Cell::new(NaiveDateTime::parse_from_str(start, "%Y-%m-%d %H:%M:%S").unwrap()),
            step,
        }
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> NaiveDateTime {
        let now = self.next.get();
        self.next.set(now + self.step);
        now
    }
}

fn provisioner(dir: &TempDir, step: Duration) -> Provisioner<SteppingClock> {
    let cluster = DatabaseCluster::open(dir.path()).unwrap();
    Provisioner::with_clock(
        cluster,
        &Config::default(),
        SteppingClock::new("2023-11-05 14:30:00", step),
    )
}

#[test]
fn test_sequential_provisioning_yields_distinct_accounts() {
    let dir = TempDir::new().unwrap();
    let mut provisioner = provisioner(&dir, Duration::seconds(2));

    let a = provisioner.provision("A").unwrap();
    let b = provisioner.provision("B").unwrap();
    assert_eq!(a, "account_20231105143000");
    assert_eq!(b, "account_20231105143002");

    let accounts = provisioner.list_accounts().unwrap();
    assert_eq!(accounts.len(), 2);
    let display_of = |db: &str| {
        accounts
            .iter()
            .find(|e| e.generated_db_name == db)
            .map(|e| e.display_name.clone())
    };
    assert_eq!(display_of(&a).as_deref(), Some("A"));
    assert_eq!(display_of(&b).as_deref(), Some("B"));

    let databases = provisioner.cluster().list_databases().unwrap();
    assert_eq!(databases, vec![a.clone(), b.clone(), "own".to_string()]);
    assert!(provisioner.list_tables(&a).unwrap().is_empty());
}

#[test]
fn test_failed_registry_insert_drops_tenant_database() {
    let dir = TempDir::new().unwrap();
    let mut provisioner = provisioner(&dir, Duration::seconds(5));

    provisioner.provision("Shared name").unwrap();
    let err = provisioner.provision("Shared name").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProvisioningFailed);

    let database = match &err {
        TenantqlError::ProvisioningFailed { database, rolled_back, source } => {
            assert!(*rolled_back);
            assert_eq!(source.kind(), ErrorKind::Backend);
            database.clone()
        }
        other => panic!("Expected ProvisioningFailed, got {:?}", other),
    };
    assert_eq!(database, "account_20231105143005");

    let databases = provisioner.cluster().list_databases().unwrap();
    assert!(!databases.contains(&database));
    assert_eq!(provisioner.list_accounts().unwrap().len(), 1);
}

#[test]
fn test_unknown_table_has_no_columns() {
    let dir = TempDir::new().unwrap();
    let mut provisioner = provisioner(&dir, Duration::seconds(1));
    provisioner.init_control_database().unwrap();

    let session = provisioner.cluster().connect("own").unwrap();
    assert!(session.list_columns("nonexistent_table").unwrap().is_empty());

    let registry = session.list_columns("databasenames").unwrap();
    let names: Vec<&str> = registry.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["tid", "name", "real_name", "created"]);
    assert!(registry[1].is_unique && !registry[1].nullable);
    assert!(registry[2].is_unique && !registry[2].nullable);
}

#[test]
fn test_registry_is_queryable_with_filters() {
    let dir = TempDir::new().unwrap();
    let mut provisioner = provisioner(&dir, Duration::seconds(1));
    let created = provisioner.provision("Acme").unwrap();
    provisioner.provision("Globex").unwrap();

    let session = provisioner.cluster().connect("own").unwrap();
    let rows = session
        .find(
            &["databasenames"],
            &["name", "real_name", "tid"],
            Some(Filter::new("real_name = ?1", [Value::from("Acme")])),
        )
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"], created);
    assert_eq!(rows[0]["tid"], "1");
}

#[test]
fn test_custom_registry_configuration() {
    let dir = TempDir::new().unwrap();
    let config = Config::from_toml_str(
        r#"
control_database = "control"
registry_table = "tenants"
name_prefix = "tenant"
"#,
    )
    .unwrap();
    let fixed = NaiveDateTime::parse_from_str("2020-02-29 23:59:59", "%Y-%m-%d %H:%M:%S").unwrap();
    let cluster = DatabaseCluster::open(dir.path()).unwrap();
    let mut provisioner = Provisioner::with_clock(cluster, &config, move || fixed);

    let name = provisioner.provision("Leap").unwrap();
    assert_eq!(name, "tenant_20200229235959");
    assert_eq!(
        provisioner.cluster().list_databases().unwrap(),
        vec!["control".to_string(), name]
    );
    assert_eq!(provisioner.list_tables("control").unwrap()[0].name, "tenants");
}
