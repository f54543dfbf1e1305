//! Resource data: prior state, desired values and the id of one resource instance

use crate::error::{DispatchError, Result};
use crate::schema::ResourceDescriptor;
use crate::types::Dynamic;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// Operation whose timeout is being asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

/// Per-operation timeouts configured on the resource
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timeouts {
    pub create: Duration,
    pub read: Duration,
    pub update: Duration,
    pub delete: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            create: Duration::from_secs(20 * 60),
            read: Duration::from_secs(5 * 60),
            update: Duration::from_secs(20 * 60),
            delete: Duration::from_secs(20 * 60),
        }
    }
}

/// ResourceData carries one resource instance through a CRUD operation.
///
/// `prior` holds the last persisted state and `values` the desired values
/// (config/plan during apply, refreshed values after a read). `has_change`
/// compares the two.
#[derive(Debug, Clone, Default)]
pub struct ResourceData {
    id: String,
    prior: HashMap<String, Dynamic>,
    values: HashMap<String, Dynamic>,
    timeouts: Timeouts,
    new_resource: bool,
    descriptor: Option<&'static ResourceDescriptor>,
}

impl ResourceData {
    /// Data for a resource that is about to be created
    pub fn from_config(config: HashMap<String, Dynamic>) -> Self {
        Self {
            id: String::new(),
            prior: HashMap::new(),
            values: config,
            timeouts: Timeouts::default(),
            new_resource: true,
            descriptor: None,
        }
    }

    /// Data for refresh/delete of an existing resource
    pub fn from_state(id: impl Into<String>, state: HashMap<String, Dynamic>) -> Self {
        Self {
            id: id.into(),
            prior: state.clone(),
            values: state,
            timeouts: Timeouts::default(),
            new_resource: false,
            descriptor: None,
        }
    }

    /// Data for an in-place update: `planned` replaces `prior`
    pub fn for_update(
        id: impl Into<String>,
        prior: HashMap<String, Dynamic>,
        planned: HashMap<String, Dynamic>,
    ) -> Self {
        Self {
            id: id.into(),
            prior,
            values: planned,
            timeouts: Timeouts::default(),
            new_resource: false,
            descriptor: None,
        }
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Field kinds decide whether list order counts as a change
    pub fn with_descriptor(mut self, descriptor: &'static ResourceDescriptor) -> Self {
        self.descriptor = Some(descriptor);
        self
    }

    pub fn bind_descriptor(&mut self, descriptor: &'static ResourceDescriptor) {
        self.descriptor = Some(descriptor);
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    pub fn is_new_resource(&self) -> bool {
        self.new_resource
    }

    /// Set once a created resource has been written back, so later reads
    /// see it as existing
    pub fn mark_persisted(&mut self) {
        self.new_resource = false;
        self.prior = self.values.clone();
    }

    pub fn timeout(&self, operation: Operation) -> Duration {
        match operation {
            Operation::Create => self.timeouts.create,
            Operation::Read => self.timeouts.read,
            Operation::Update => self.timeouts.update,
            Operation::Delete => self.timeouts.delete,
        }
    }

    /// Current value, `None` when absent or null
    pub fn get(&self, key: &str) -> Option<&Dynamic> {
        self.values.get(key).filter(|v| !v.is_null())
    }

    /// Current value when it is set to something other than its zero value
    pub fn get_ok(&self, key: &str) -> Option<&Dynamic> {
        self.values.get(key).filter(|v| !v.is_zero())
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Dynamic::as_string)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Dynamic::as_bool)
    }

    pub fn get_number(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Dynamic::as_number)
    }

    pub fn get_list(&self, key: &str) -> &[Dynamic] {
        self.get(key).and_then(Dynamic::as_list).unwrap_or(&[])
    }

    pub fn require_string(&self, key: &str) -> Result<&str> {
        self.get_string(key)
            .ok_or_else(|| DispatchError::Validation(format!("{} is required", key)))
    }

    /// Prior and desired value of an attribute
    pub fn get_change(&self, key: &str) -> (Dynamic, Dynamic) {
        let old = self.prior.get(key).cloned().unwrap_or(Dynamic::Null);
        let new = self.values.get(key).cloned().unwrap_or(Dynamic::Null);
        (old, new)
    }

    pub fn has_change(&self, key: &str) -> bool {
        let (old, new) = self.get_change(key);
        if new.is_unknown() {
            return true;
        }
        if old.is_zero() && new.is_zero() {
            return false;
        }
        let ordered = self
            .descriptor
            .and_then(|d| d.field(key))
            .is_some_and(|f| !f.is_set());
        if ordered {
            old != new
        } else {
            !old.set_equals(&new)
        }
    }

    pub fn has_changes(&self, keys: &[&str]) -> bool {
        keys.iter().any(|k| self.has_change(k))
    }

    pub fn set(&mut self, key: &str, value: impl Into<Dynamic>) {
        self.values.insert(key.to_string(), value.into());
    }

    pub fn values(&self) -> &HashMap<String, Dynamic> {
        &self.values
    }

    /// The state object Terraform persists, including `id`
    pub fn state(&self) -> Dynamic {
        let mut values = self.values.clone();
        values.insert("id".to_string(), Dynamic::String(self.id.clone()));
        Dynamic::Map(values)
    }

    /// Legacy flatmap rendering of the state (`acl_entries.#`, `acl_entries.0.entry`)
    pub fn flatmap(&self) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        self.state().flatten_into("", &mut out);
        out
    }

    /// msgpack is what Terraform core exchanges state objects in
    pub fn encode_state(&self) -> Result<Vec<u8>> {
        rmp_serde::encode::to_vec_named(&self.state())
            .map_err(|e| DispatchError::EncodingError(format!("msgpack encoding failed: {}", e)))
    }

    pub fn decode_state(data: &[u8]) -> Result<Self> {
        let mut values: HashMap<String, Dynamic> = rmp_serde::decode::from_slice(data)
            .map_err(|e| DispatchError::DecodingError(format!("msgpack decoding failed: {}", e)))?;
        let id = match values.remove("id") {
            Some(Dynamic::String(id)) => id,
            _ => String::new(),
        };
        Ok(Self::from_state(id, values))
    }

    /// Attributes whose configured value differs from the current state.
    ///
    /// Only keys set in `config` are compared and computed sub-attributes of
    /// blocks are ignored, so an empty result means a re-plan shows no diff.
    pub fn plan_diff(
        &self,
        descriptor: &ResourceDescriptor,
        config: &HashMap<String, Dynamic>,
    ) -> Vec<String> {
        let mut changed: Vec<String> = descriptor
            .fields
            .iter()
            .filter(|f| !f.is_computed_only())
            .filter_map(|f| {
                let wanted = config.get(f.name).filter(|v| !v.is_null())?;
                let actual = self.values.get(f.name).unwrap_or(&Dynamic::Null);
                if config_matches(wanted, actual, f.is_set()) {
                    None
                } else {
                    Some(f.name.to_string())
                }
            })
            .collect();
        changed.sort();
        changed
    }
}

fn config_matches(wanted: &Dynamic, actual: &Dynamic, unordered: bool) -> bool {
    match (wanted, actual) {
        (Dynamic::Null, _) => true,
        (Dynamic::Map(w), Dynamic::Map(a)) => w.iter().all(|(k, v)| {
            config_matches(v, a.get(k).unwrap_or(&Dynamic::Null), unordered)
        }),
        (Dynamic::List(w), Dynamic::List(a)) => {
            if w.len() != a.len() {
                return false;
            }
            if unordered {
                w.iter().all(|x| a.iter().any(|y| config_matches(x, y, true)))
            } else {
                w.iter().zip(a).all(|(x, y)| config_matches(x, y, false))
            }
        }
        (w, a) => w == a,
    }
}
