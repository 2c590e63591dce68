use std::collections::HashMap;
use std::sync::Arc;

use log::info;
use parking_lot::{Mutex, RwLock};

use crate::data::model::PlanetTable;
use crate::error::AppError;

// ---------------------------------------------------------------------------
// Dataset registry
// ---------------------------------------------------------------------------

/// Named datasets plus the active one.
///
/// Tables are stored behind `Arc` and never mutated in place: readers hold a
/// snapshot, writers swap in a new table. Writes to one name are serialised
/// by a per-name lock so a prediction write and a re-upload cannot interleave.
#[derive(Default)]
pub struct DatasetRegistry {
    inner: RwLock<RegistryInner>,
    write_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

#[derive(Default)]
struct RegistryInner {
    /// Names in first-registration order.
    order: Vec<String>,
    tables: HashMap<String, Arc<PlanetTable>>,
    active: Option<String>,
}

impl DatasetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `table` under `name`, replacing any previous table, and make it
    /// the active dataset.
    pub fn register(&self, name: &str, table: PlanetTable) {
        self.with_write_lock(name, || {
            let mut inner = self.inner.write();
            let rows = table.len();
            store(&mut inner, name, table);
            inner.active = Some(name.to_string());
            info!("registered dataset '{name}' ({rows} rows), now active");
        });
    }

    /// Store `table` under `name` without touching the active dataset.
    /// Used for the lazily loaded default dataset.
    pub fn insert(&self, name: &str, table: PlanetTable) {
        self.with_write_lock(name, || {
            let rows = table.len();
            store(&mut self.inner.write(), name, table);
            info!("registered dataset '{name}' ({rows} rows)");
        });
    }

    /// Snapshot of the table stored under `name`.
    pub fn get(&self, name: &str) -> Result<Arc<PlanetTable>, AppError> {
        self.inner
            .read()
            .tables
            .get(name)
            .cloned()
            .ok_or_else(|| AppError::NotFound("Dataset not found".to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.read().tables.contains_key(name)
    }

    /// Name of the active dataset, if any.
    pub fn active(&self) -> Option<String> {
        self.inner.read().active.clone()
    }

    /// Registered names in first-registration order.
    pub fn names(&self) -> Vec<String> {
        self.inner.read().order.clone()
    }

    /// Snapshots of every dataset in first-registration order.
    pub fn snapshots(&self) -> Vec<(String, Arc<PlanetTable>)> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter_map(|name| Some((name.clone(), inner.tables.get(name)?.clone())))
            .collect()
    }

    /// Read-modify-write of one dataset under its write lock.
    ///
    /// `f` receives the current snapshot and returns the replacement table
    /// together with a result. On error nothing is stored. Unknown names fail
    /// before any lock is allocated.
    pub fn update<T, F>(&self, name: &str, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&PlanetTable) -> Result<(PlanetTable, T), AppError>,
    {
        // datasets are never removed, so a name seen here stays registered
        self.get(name)?;
        self.with_write_lock(name, || {
            let current = self.get(name)?;
            let (replacement, out) = f(&current)?;
            store(&mut self.inner.write(), name, replacement);
            Ok(out)
        })
    }

    fn with_write_lock<T>(&self, name: &str, f: impl FnOnce() -> T) -> T {
        let lock = self
            .write_locks
            .lock()
            .entry(name.to_string())
            .or_default()
            .clone();
        let _guard = lock.lock();
        f()
    }
}

fn store(inner: &mut RegistryInner, name: &str, table: PlanetTable) {
    if !inner.tables.contains_key(name) {
        inner.order.push(name.to_string());
    }
    inner.tables.insert(name.to_string(), Arc::new(table));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::read_csv;
    use crate::data::model::CellValue;

    fn table(csv: &str) -> PlanetTable {
        read_csv(csv.as_bytes()).unwrap()
    }

    #[test]
    fn register_replaces_and_activates() {
        let reg = DatasetRegistry::new();
        assert_eq!(reg.active(), None);

        reg.register("a", table("x\n1\n"));
        reg.register("b", table("x\n2\n"));
        assert_eq!(reg.active().as_deref(), Some("b"));

        reg.register("a", table("x\n3\n4\n"));
        assert_eq!(reg.active().as_deref(), Some("a"));
        assert_eq!(reg.names(), vec!["a", "b"]);
        assert_eq!(reg.get("a").unwrap().len(), 2);
    }

    #[test]
    fn unknown_name_is_not_found() {
        let reg = DatasetRegistry::new();
        assert!(matches!(reg.get("nope"), Err(AppError::NotFound(_))));
        assert!(!reg.contains("nope"));
    }

    #[test]
    fn unknown_names_allocate_no_write_locks() {
        let reg = DatasetRegistry::new();
        for i in 0..100 {
            let res: Result<(), _> = reg.update(&format!("nope{i}"), |t| Ok((t.clone(), ())));
            assert!(matches!(res, Err(AppError::NotFound(_))));
        }
        assert!(reg.write_locks.lock().is_empty());

        reg.register("a", table("x\n1\n"));
        reg.update("a", |t| Ok((t.clone(), ()))).unwrap();
        assert_eq!(reg.write_locks.lock().len(), 1);
    }

    #[test]
    fn insert_keeps_active_dataset() {
        let reg = DatasetRegistry::new();
        reg.register("mine", table("x\n1\n"));
        reg.insert("default", table("x\n1\n"));
        assert_eq!(reg.active().as_deref(), Some("mine"));
        assert!(reg.contains("default"));
    }

    #[test]
    fn failed_update_leaves_table_untouched() {
        let reg = DatasetRegistry::new();
        reg.register("a", table("x\n1\n"));
        let before = reg.get("a").unwrap();

        let res: Result<(), _> =
            reg.update("a", |_| Err(AppError::Classifier("boom".to_string())));
        assert!(res.is_err());
        assert!(Arc::ptr_eq(&before, &reg.get("a").unwrap()));
    }

    #[test]
    fn snapshots_survive_updates() {
        let reg = DatasetRegistry::new();
        reg.register("a", table("x\n1\n"));
        let snapshot = reg.get("a").unwrap();

        reg.update("a", |t| {
            let mut next = t.clone();
            next.set_column("p", vec![CellValue::Float(0.5)]);
            Ok((next, ()))
        })
        .unwrap();

        assert!(!snapshot.has_column("p"));
        assert!(reg.get("a").unwrap().has_column("p"));
    }

    #[test]
    fn concurrent_updates_are_serialised() {
        let reg = Arc::new(DatasetRegistry::new());
        reg.register("a", table("n\n0\n"));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let reg = Arc::clone(&reg);
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        reg.update("a", |t| {
                            let n = t.rows[0].get_f64("n").unwrap_or(0.0);
                            let mut next = t.clone();
                            next.set_column("n", vec![CellValue::Float(n + 1.0)]);
                            Ok((next, ()))
                        })
                        .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(reg.get("a").unwrap().rows[0].get_f64("n"), Some(200.0));
    }
}
