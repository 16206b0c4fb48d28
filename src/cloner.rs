//! Open-ended settings values and their deep copy.
//!
//! Source, filter and stream settings are free-form, so they are held as a
//! small value graph whose containers are shared handles. Two handles may
//! point at the same container and a container may contain itself. Anything
//! stored in or handed out by the simulator goes through [`deep_clone`] so the
//! caller never shares a container with internal state.
//!
//! Containers are read through short-lived snapshots, so a traversal never
//! holds two locks at once and a cycle can't deadlock.

use indexmap::{IndexMap, IndexSet};
use log::warn;
use serde_json::{Map, Number, Value};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

type Shared<T> = Arc<Mutex<T>>;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// A settings value. Scalars are plain values, containers are shared handles:
/// `Clone` copies the handle, [`deep_clone`] copies the structure.
#[derive(Clone)]
pub enum SettingsValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    List(Shared<Vec<SettingsValue>>),
    Map(Shared<IndexMap<String, SettingsValue>>),
    Set(Shared<IndexSet<String>>),
}

impl SettingsValue {
    pub fn map() -> Self {
        SettingsValue::Map(Arc::new(Mutex::new(IndexMap::new())))
    }

    pub fn list() -> Self {
        SettingsValue::List(Arc::new(Mutex::new(Vec::new())))
    }

    pub fn set() -> Self {
        SettingsValue::Set(Arc::new(Mutex::new(IndexSet::new())))
    }

    pub fn string(s: impl Into<String>) -> Self {
        SettingsValue::String(s.into())
    }

    pub fn number(n: f64) -> Self {
        Number::from_f64(n)
            .map(SettingsValue::Number)
            .unwrap_or(SettingsValue::Null)
    }

    /// Identity of the container behind this value, if it is one.
    fn identity(&self) -> Option<usize> {
        match self {
            SettingsValue::List(l) => Some(Arc::as_ptr(l) as *const () as usize),
            SettingsValue::Map(m) => Some(Arc::as_ptr(m) as *const () as usize),
            SettingsValue::Set(s) => Some(Arc::as_ptr(s) as *const () as usize),
            _ => None,
        }
    }

    /// True when both values are the same container (or equal scalars).
    pub fn ptr_eq(&self, other: &SettingsValue) -> bool {
        match (self.identity(), other.identity()) {
            (Some(a), Some(b)) => a == b,
            (None, None) => scalar_eq(self, other),
            _ => false,
        }
    }

    /// Insert into a map value. Returns false if this is not a map.
    pub fn insert(&self, key: impl Into<String>, value: SettingsValue) -> bool {
        match self {
            SettingsValue::Map(m) => {
                lock(m).insert(key.into(), value);
                true
            }
            _ => false,
        }
    }

    /// Append to a list value. Returns false if this is not a list.
    pub fn push(&self, value: SettingsValue) -> bool {
        match self {
            SettingsValue::List(l) => {
                lock(l).push(value);
                true
            }
            _ => false,
        }
    }

    /// Add a member to a set value. Returns false if this is not a set.
    pub fn add(&self, member: impl Into<String>) -> bool {
        match self {
            SettingsValue::Set(s) => {
                lock(s).insert(member.into());
                true
            }
            _ => false,
        }
    }

    /// Look up a key of a map value. The result shares containers with `self`.
    pub fn get(&self, key: &str) -> Option<SettingsValue> {
        match self {
            SettingsValue::Map(m) => lock(m).get(key).cloned(),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            SettingsValue::List(l) => lock(l).len(),
            SettingsValue::Map(m) => lock(m).len(),
            SettingsValue::Set(s) => lock(s).len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SettingsValue::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SettingsValue::String(s) => Some(s),
            _ => None,
        }
    }

    fn map_entries(&self) -> Vec<(String, SettingsValue)> {
        match self {
            SettingsValue::Map(m) => lock(m)
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            _ => Vec::new(),
        }
    }

    fn list_items(&self) -> Vec<SettingsValue> {
        match self {
            SettingsValue::List(l) => lock(l).clone(),
            _ => Vec::new(),
        }
    }

    fn set_members(&self) -> Vec<String> {
        match self {
            SettingsValue::Set(s) => lock(s).iter().cloned().collect(),
            _ => Vec::new(),
        }
    }

    /// Build a value from JSON. JSON is a tree, so the result never shares
    /// containers.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => SettingsValue::Null,
            Value::Bool(b) => SettingsValue::Bool(*b),
            Value::Number(n) => SettingsValue::Number(n.clone()),
            Value::String(s) => SettingsValue::String(s.clone()),
            Value::Array(items) => SettingsValue::List(Arc::new(Mutex::new(
                items.iter().map(SettingsValue::from_json).collect(),
            ))),
            Value::Object(obj) => SettingsValue::Map(Arc::new(Mutex::new(
                obj.iter()
                    .map(|(k, v)| (k.clone(), SettingsValue::from_json(v)))
                    .collect(),
            ))),
        }
    }

    /// Render as JSON. A container reached again while it is still being
    /// rendered (a cycle) becomes `null`. Shared, acyclic containers are
    /// rendered at every place they occur.
    pub fn to_json(&self) -> Value {
        let mut in_progress = HashSet::new();
        to_json_inner(self, &mut in_progress)
    }

    /// Shallow merge of `overlay`'s keys into this map, deep-copying each
    /// incoming value. Non-map values are left unchanged.
    pub fn merge_from(&self, overlay: &SettingsValue) {
        let SettingsValue::Map(target) = self else {
            return;
        };
        let mut copies = CloneMap::default();
        let incoming: Vec<(String, SettingsValue)> = overlay
            .map_entries()
            .into_iter()
            .map(|(k, v)| (k, copies.copy(&v)))
            .collect();
        let mut target = lock(target);
        for (k, v) in incoming {
            target.insert(k, v);
        }
    }
}

impl Default for SettingsValue {
    fn default() -> Self {
        SettingsValue::Null
    }
}

impl std::fmt::Debug for SettingsValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SettingsValue({})", self.to_json())
    }
}

/// Structural equality. Cycles are compared by co-induction: a pair of
/// containers already under comparison is assumed equal.
impl PartialEq for SettingsValue {
    fn eq(&self, other: &Self) -> bool {
        let mut assumed = HashSet::new();
        structurally_eq(self, other, &mut assumed)
    }
}

fn scalar_eq(a: &SettingsValue, b: &SettingsValue) -> bool {
    match (a, b) {
        (SettingsValue::Null, SettingsValue::Null) => true,
        (SettingsValue::Bool(x), SettingsValue::Bool(y)) => x == y,
        (SettingsValue::Number(x), SettingsValue::Number(y)) => x == y,
        (SettingsValue::String(x), SettingsValue::String(y)) => x == y,
        _ => false,
    }
}

fn structurally_eq(
    a: &SettingsValue,
    b: &SettingsValue,
    assumed: &mut HashSet<(usize, usize)>,
) -> bool {
    let (Some(ia), Some(ib)) = (a.identity(), b.identity()) else {
        return scalar_eq(a, b);
    };
    if !assumed.insert((ia, ib)) {
        return true;
    }
    match (a, b) {
        (SettingsValue::List(_), SettingsValue::List(_)) => {
            let (xs, ys) = (a.list_items(), b.list_items());
            xs.len() == ys.len()
                && xs
                    .iter()
                    .zip(ys.iter())
                    .all(|(x, y)| structurally_eq(x, y, assumed))
        }
        (SettingsValue::Map(_), SettingsValue::Map(_)) => {
            let (xs, ys) = (a.map_entries(), b.map_entries());
            if xs.len() != ys.len() {
                return false;
            }
            let ys: HashMap<String, SettingsValue> = ys.into_iter().collect();
            xs.iter().all(|(k, x)| match ys.get(k) {
                Some(y) => structurally_eq(x, y, assumed),
                None => false,
            })
        }
        (SettingsValue::Set(_), SettingsValue::Set(_)) => {
            let xs: HashSet<String> = a.set_members().into_iter().collect();
            let ys: HashSet<String> = b.set_members().into_iter().collect();
            xs == ys
        }
        _ => false,
    }
}

fn to_json_inner(value: &SettingsValue, in_progress: &mut HashSet<usize>) -> Value {
    let Some(id) = value.identity() else {
        return match value {
            SettingsValue::Bool(b) => Value::Bool(*b),
            SettingsValue::Number(n) => Value::Number(n.clone()),
            SettingsValue::String(s) => Value::String(s.clone()),
            _ => Value::Null,
        };
    };
    if !in_progress.insert(id) {
        warn!("settings value contains a cycle; rendering back-reference as null");
        return Value::Null;
    }
    let rendered = match value {
        SettingsValue::List(_) => Value::Array(
            value
                .list_items()
                .iter()
                .map(|v| to_json_inner(v, in_progress))
                .collect(),
        ),
        SettingsValue::Map(_) => {
            let mut obj = Map::new();
            for (k, v) in value.map_entries() {
                obj.insert(k, to_json_inner(&v, in_progress));
            }
            Value::Object(obj)
        }
        SettingsValue::Set(_) => {
            Value::Array(value.set_members().into_iter().map(Value::String).collect())
        }
        _ => Value::Null,
    };
    in_progress.remove(&id);
    rendered
}

/// Identity map for one copy operation: source container -> its copy.
#[derive(Default)]
struct CloneMap {
    seen: HashMap<usize, SettingsValue>,
}

impl CloneMap {
    fn copy(&mut self, value: &SettingsValue) -> SettingsValue {
        let Some(id) = value.identity() else {
            return value.clone();
        };
        if let Some(existing) = self.seen.get(&id) {
            return existing.clone();
        }
        // Register the empty copy before descending so cycles resolve to it.
        match value {
            SettingsValue::List(_) => {
                let copy = SettingsValue::list();
                self.seen.insert(id, copy.clone());
                let items: Vec<SettingsValue> =
                    value.list_items().iter().map(|v| self.copy(v)).collect();
                if let SettingsValue::List(l) = &copy {
                    *lock(l) = items;
                }
                copy
            }
            SettingsValue::Map(_) => {
                let copy = SettingsValue::map();
                self.seen.insert(id, copy.clone());
                let entries: IndexMap<String, SettingsValue> = value
                    .map_entries()
                    .into_iter()
                    .map(|(k, v)| {
                        let v = self.copy(&v);
                        (k, v)
                    })
                    .collect();
                if let SettingsValue::Map(m) = &copy {
                    *lock(m) = entries;
                }
                copy
            }
            SettingsValue::Set(_) => {
                let copy = SettingsValue::set();
                self.seen.insert(id, copy.clone());
                if let SettingsValue::Set(s) = &copy {
                    *lock(s) = value.set_members().into_iter().collect();
                }
                copy
            }
            _ => value.clone(),
        }
    }
}

/// Deep structural copy. Scalars are returned unchanged; every container is
/// copied exactly once, so sharing and cycles inside `value` are reproduced
/// inside the copy and nothing in the copy is shared with `value`.
pub fn deep_clone(value: &SettingsValue) -> SettingsValue {
    CloneMap::default().copy(value)
}
