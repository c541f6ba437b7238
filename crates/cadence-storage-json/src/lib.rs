use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};

use cadence_config::Config;
use cadence_core::{
    CoreError, CoreResult, GoalKind, GoalRepository, GoalRow, GoalWrite, PlanRepository, PlanStore,
    TransactionQuery,
};
use cadence_domain::{PeriodWindow, Plan, PlanFields, Transaction};
use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

const STORE_FILE: &str = "plans.json";
const TMP_SUFFIX: &str = "tmp";

/// Filesystem-backed JSON persistence for plans, goal rows and transactions.
///
/// The whole [`PlanStore`] lives in one file. Every mutation is applied to a
/// copy, written to a temporary file and renamed over the original; memory
/// only changes once the file is in place.
pub struct JsonPlanStorage {
    path: PathBuf,
    store: Mutex<PlanStore>,
}

impl JsonPlanStorage {
    /// Opens the store at `path`, starting empty when the file is absent.
    pub fn open(path: PathBuf) -> CoreResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let store = if path.exists() {
            load_store_from_path(&path)?
        } else {
            PlanStore::default()
        };
        info!(path = %path.display(), "plan storage opened");
        Ok(Self {
            path,
            store: Mutex::new(store),
        })
    }

    /// Opens `plans.json` inside `dir`.
    pub fn in_dir(dir: &Path) -> CoreResult<Self> {
        Self::open(dir.join(STORE_FILE))
    }

    /// Opens `plans.json` in the configured data directory.
    pub fn from_config(config: &Config) -> CoreResult<Self> {
        Self::in_dir(&config.resolve_data_dir())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-reads the file, discarding in-memory state.
    pub fn reload(&self) -> CoreResult<()> {
        let fresh = if self.path.exists() {
            load_store_from_path(&self.path)?
        } else {
            PlanStore::default()
        };
        *self.lock()? = fresh;
        Ok(())
    }

    pub fn record_transaction(&self, user_id: &str, transaction: Transaction) -> CoreResult<()> {
        self.mutate(|store| {
            store.record_transaction(user_id, transaction);
            Ok(())
        })
    }

    fn lock(&self) -> CoreResult<MutexGuard<'_, PlanStore>> {
        self.store
            .lock()
            .map_err(|_| CoreError::Storage("plan storage lock poisoned".into()))
    }

    fn read<T>(&self, f: impl FnOnce(&PlanStore) -> T) -> CoreResult<T> {
        Ok(f(&*self.lock()?))
    }

    fn mutate<T>(&self, f: impl FnOnce(&mut PlanStore) -> CoreResult<T>) -> CoreResult<T> {
        let mut guard = self.lock()?;
        let mut next = guard.clone();
        let result = f(&mut next)?;
        save_store_to_path(&next, &self.path)?;
        *guard = next;
        debug!(path = %self.path.display(), "plan storage saved");
        Ok(result)
    }
}

impl PlanRepository for JsonPlanStorage {
    fn find_active_plan(&self, user_id: &str) -> CoreResult<Option<Plan>> {
        self.read(|store| store.find_active_plan(user_id))
    }

    fn upsert_plan(
        &self,
        user_id: &str,
        window: &PeriodWindow,
        fields: PlanFields,
    ) -> CoreResult<Plan> {
        self.mutate(|store| Ok(store.upsert_plan(user_id, window, fields)))
    }

    fn set_active_plan(&self, user_id: &str, plan_id: Uuid) -> CoreResult<()> {
        self.mutate(|store| store.set_active_plan(user_id, plan_id))
    }

    fn list_plans(&self, user_id: &str) -> CoreResult<Vec<Plan>> {
        self.read(|store| store.list_plans(user_id))
    }
}

impl GoalRepository for JsonPlanStorage {
    fn goal_rows(&self, plan_id: Uuid, kind: GoalKind) -> CoreResult<Vec<GoalRow>> {
        self.read(|store| store.goal_rows(plan_id, kind))
    }

    fn apply_goal_writes(
        &self,
        plan_id: Uuid,
        kind: GoalKind,
        writes: &[GoalWrite],
    ) -> CoreResult<()> {
        if writes.is_empty() {
            return Ok(());
        }
        self.mutate(|store| {
            store.apply_goal_writes(plan_id, kind, writes);
            Ok(())
        })
    }

    fn delete_goal_rows(&self, row_ids: &[u64]) -> CoreResult<()> {
        if row_ids.is_empty() {
            return Ok(());
        }
        self.mutate(|store| {
            store.delete_goal_rows(row_ids);
            Ok(())
        })
    }
}

impl TransactionQuery for JsonPlanStorage {
    fn transactions_between(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> CoreResult<Vec<Transaction>> {
        self.read(|store| store.transactions_between(user_id, start, end))
    }
}

/// Writes a store snapshot to `path` via a temporary file and rename.
pub fn save_store_to_path(store: &PlanStore, path: &Path) -> CoreResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = tmp_path(path);
    write_atomic(&tmp, &serde_json::to_string_pretty(store)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Loads a store snapshot from `path`.
pub fn load_store_from_path(path: &Path) -> CoreResult<PlanStore> {
    let data = fs::read_to_string(path)?;
    serde_json::from_str(&data)
        .map_err(|err| CoreError::Storage(format!("{}: {err}", path.display())))
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    let ext = match path.extension().and_then(|ext| ext.to_str()) {
        Some(existing) => format!("{existing}.{TMP_SUFFIX}"),
        None => TMP_SUFFIX.to_string(),
    };
    tmp.set_extension(ext);
    tmp
}

fn write_atomic(path: &Path, data: &str) -> CoreResult<()> {
    let mut file = File::create(path)?;
    file.write_all(data.as_bytes())?;
    file.sync_all()?;
    Ok(())
}
