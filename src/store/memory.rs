use std::io;
use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use ulid::Generator;

use crate::notify::{Change, NotifyHub};
use crate::observability::STORE_OP_DURATION_SECONDS;

use super::path::{join, segments};
use super::wal::{Mutation, Wal};
use super::{RecordStore, StoreError, StoreOp, Subscription};

/// In-process record store: one JSON tree behind an async lock, with
/// optional write-ahead logging and live subscriptions.
///
/// Every mutation is logged (and fsynced) before it is applied, and
/// subscribers are notified while the tree lock is still held so they see
/// changes in commit order.
pub struct MemoryStore {
    inner: RwLock<Inner>,
    notify: NotifyHub,
    ids: Mutex<Generator>,
    replayed: usize,
}

struct Inner {
    root: Value,
    wal: Option<Wal>,
}

/// A parsed mutation, ready to apply.
enum Op {
    Write(Value),
    Update(Map<String, Value>),
    Remove,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// A volatile store. Contents are lost on drop.
    pub fn new() -> Self {
        Self::with_state(Value::Object(Map::new()), None, 0)
    }

    /// Open a durable store backed by the WAL at `path`, replaying it first.
    pub fn open(path: &Path) -> io::Result<Self> {
        let (wal, mutations) = Wal::recover(path)?;
        let mut root = Value::Object(Map::new());
        for mutation in &mutations {
            if let Err(e) = replay_one(&mut root, mutation) {
                tracing::warn!(path = %path.display(), "skipping unreadable WAL entry: {e}");
            }
        }
        tracing::debug!(path = %path.display(), entries = mutations.len(), "store replayed");
        Ok(Self::with_state(root, Some(wal), mutations.len()))
    }

    fn with_state(root: Value, wal: Option<Wal>, replayed: usize) -> Self {
        Self {
            inner: RwLock::new(Inner { root, wal }),
            notify: NotifyHub::new(),
            ids: Mutex::new(Generator::new()),
            replayed,
        }
    }

    /// Number of WAL entries applied when the store was opened.
    pub fn replayed_entries(&self) -> usize {
        self.replayed
    }

    /// Entries in the WAL file, the last snapshot included. Zero for a volatile store.
    pub async fn log_entries(&self) -> usize {
        let inner = self.inner.read().await;
        inner.wal.as_ref().map_or(0, Wal::appends_since_compact)
    }

    /// Rewrite the WAL as a single snapshot of the current tree.
    /// No-op for a volatile store.
    pub async fn compact(&self) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let Inner { root, wal } = &mut *inner;
        let Some(wal) = wal.as_mut() else {
            return Ok(());
        };
        let json = serde_json::to_string(root).map_err(|e| StoreError::new(StoreOp::Encode, "", e))?;
        wal.compact(&[Mutation::Write {
            path: String::new(),
            json,
        }])
        .map_err(|e| StoreError::new(StoreOp::Write, "", e))?;
        tracing::info!(wal = %wal.path().display(), "WAL compacted");
        Ok(())
    }

    async fn commit(&self, operation: StoreOp, path: &str, op: Op) -> Result<(), StoreError> {
        let segs = segments(operation, path)?;
        if let Op::Update(fields) = &op {
            for key in fields.keys() {
                segments(operation, key)?;
            }
        }
        let mutation = to_mutation(&segs, &op).map_err(|e| StoreError::new(StoreOp::Encode, path, e))?;

        let start = Instant::now();
        let mut inner = self.inner.write().await;
        if let Some(wal) = inner.wal.as_mut() {
            wal.append(&mutation)
                .map_err(|e| StoreError::new(operation, path, e))?;
        }
        apply(&mut inner.root, &segs, op);

        let change = Change {
            path: segs.join("/"),
            value: get(&inner.root, &segs).cloned(),
        };
        self.notify.send(&segs, &change);
        drop(inner);

        metrics::histogram!(STORE_OP_DURATION_SECONDS, "operation" => operation.as_str())
            .record(start.elapsed().as_secs_f64());
        Ok(())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn read(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let segs = segments(StoreOp::Read, path)?;
        let inner = self.inner.read().await;
        Ok(get(&inner.root, &segs).cloned())
    }

    async fn write(&self, path: &str, value: Value) -> Result<(), StoreError> {
        self.commit(StoreOp::Write, path, Op::Write(value)).await
    }

    async fn update(&self, path: &str, fields: Map<String, Value>) -> Result<(), StoreError> {
        self.commit(StoreOp::Update, path, Op::Update(fields)).await
    }

    async fn remove(&self, path: &str) -> Result<(), StoreError> {
        self.commit(StoreOp::Remove, path, Op::Remove).await
    }

    async fn push(&self, path: &str, value: Value) -> Result<String, StoreError> {
        let key = {
            let mut ids = self.ids.lock().unwrap_or_else(|e| e.into_inner());
            ids.generate()
                .map_err(|e| StoreError::new(StoreOp::Push, path, e))?
                .to_string()
        };
        let child = join(path, &key);
        self.commit(StoreOp::Push, &child, Op::Write(value)).await?;
        Ok(key)
    }

    fn subscribe(&self, path: &str) -> Result<Subscription, StoreError> {
        let normalized = segments(StoreOp::Subscribe, path)?.join("/");
        let rx = self.notify.subscribe(&normalized);
        Ok(Subscription::new(normalized, rx))
    }
}

// ── Tree operations ─────────────────────────────────────────────

fn to_mutation(segs: &[&str], op: &Op) -> serde_json::Result<Mutation> {
    let path = segs.join("/");
    Ok(match op {
        Op::Write(value) => Mutation::Write {
            path,
            json: serde_json::to_string(value)?,
        },
        Op::Update(fields) => Mutation::Update {
            path,
            json: serde_json::to_string(fields)?,
        },
        Op::Remove => Mutation::Remove { path },
    })
}

fn replay_one(root: &mut Value, mutation: &Mutation) -> Result<(), String> {
    let (path, op) = match mutation {
        Mutation::Write { path, json } => {
            (path, Op::Write(serde_json::from_str(json).map_err(|e| e.to_string())?))
        }
        Mutation::Update { path, json } => {
            (path, Op::Update(serde_json::from_str(json).map_err(|e| e.to_string())?))
        }
        Mutation::Remove { path } => (path, Op::Remove),
    };
    let segs = segments(StoreOp::Write, path).map_err(|e| e.to_string())?;
    apply(root, &segs, op);
    Ok(())
}

fn apply(root: &mut Value, segs: &[&str], op: Op) {
    match op {
        Op::Write(value) => set(root, segs, value),
        Op::Update(fields) => {
            for (key, value) in fields {
                let mut child: Vec<&str> = segs.to_vec();
                child.extend(key.split('/').filter(|s| !s.is_empty()));
                set(root, &child, value);
            }
        }
        Op::Remove => remove(root, segs),
    }
}

fn get<'a>(root: &'a Value, segs: &[&str]) -> Option<&'a Value> {
    let mut cur = root;
    for seg in segs {
        cur = cur.as_object()?.get(*seg)?;
    }
    Some(cur)
}

/// Null and empty objects are not stored; writing one removes the path.
fn set(root: &mut Value, segs: &[&str], value: Value) {
    if value.is_null() || value.as_object().is_some_and(Map::is_empty) {
        remove(root, segs);
        return;
    }
    let Some((last, parents)) = segs.split_last() else {
        *root = value;
        return;
    };
    let mut cur = root;
    for seg in parents {
        cur = ensure_object(cur)
            .entry(seg.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    ensure_object(cur).insert(last.to_string(), value);
}

/// Remove the subtree and any ancestors left empty by it.
fn remove(root: &mut Value, segs: &[&str]) {
    let Some((first, rest)) = segs.split_first() else {
        *root = Value::Object(Map::new());
        return;
    };
    let Value::Object(map) = root else { return };
    if rest.is_empty() {
        map.remove(*first);
        return;
    }
    let now_empty = match map.get_mut(*first) {
        Some(child) => {
            remove(child, rest);
            child.as_object().is_some_and(Map::is_empty)
        }
        None => false,
    };
    if now_empty {
        map.remove(*first);
    }
}

fn ensure_object(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("value was just replaced with an object"),
    }
}
