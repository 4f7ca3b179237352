//! Terraform state document (schema version 4).
//!
//! Only the fields this tool acts on are typed. Everything else, at every
//! level, is carried through `extra` so a load/save cycle keeps it intact.
//! Optional typed fields remember whether their key was present, so an
//! explicit `null` is written back as `null` and an absent key stays absent.

use std::collections::HashSet;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::address::{Address, format_index_key};
use crate::error::TfstateError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Managed,
    Data,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StateDocument {
    version: u64,
    #[serde(default, deserialize_with = "present")]
    terraform_version: Option<Option<String>>,
    serial: u64,
    #[serde(default, deserialize_with = "present")]
    lineage: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    outputs: Option<Value>,
    pub resources: Vec<Resource>,
    #[serde(flatten)]
    extra: Map<String, Value>,
    #[serde(skip)]
    loaded: LoadedMarker,
}

/// Serial and lineage as they were when the document was read.
#[derive(Debug, Clone, Default, PartialEq)]
struct LoadedMarker {
    serial: u64,
    lineage: Option<Option<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    module: Option<Option<String>>,
    pub mode: Mode,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub name: String,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    provider: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    instances: Option<Vec<Instance>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    index_key: Option<Value>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    attributes: Option<Option<Map<String, Value>>>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    dependencies: Option<Option<Vec<String>>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// A key that is present deserializes to `Some`, even when its value is null.
// Paired with `default`, an absent key stays `None`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

// Borrowed view used for writing, so the output serial can differ from the
// in-memory one without cloning the document.
#[derive(Serialize)]
struct StateDocumentView<'a> {
    version: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    terraform_version: Option<&'a Option<String>>,
    serial: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    lineage: Option<&'a Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    outputs: Option<&'a Value>,
    resources: &'a [Resource],
    #[serde(flatten)]
    extra: &'a Map<String, Value>,
}

impl StateDocument {
    /// Parses a state file. Fails with `Format` on malformed JSON or when
    /// `version`, `serial` or `resources` is missing.
    pub fn parse(bytes: &[u8]) -> Result<Self, TfstateError> {
        let mut doc: StateDocument =
            serde_json::from_slice(bytes).map_err(|e| TfstateError::Format(e.to_string()))?;
        doc.loaded = LoadedMarker {
            serial: doc.serial,
            lineage: doc.lineage.clone(),
        };
        Ok(doc)
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn terraform_version(&self) -> Option<&str> {
        self.terraform_version.as_ref()?.as_deref()
    }

    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn lineage(&self) -> Option<&str> {
        self.lineage.as_ref()?.as_deref()
    }

    pub fn outputs(&self) -> Option<&Value> {
        self.outputs.as_ref().filter(|outputs| !outputs.is_null())
    }

    /// Every structural problem in the document, in resource order.
    pub fn violations(&self) -> Vec<String> {
        let mut problems = Vec::new();

        let loaded_lineage = self.loaded.lineage.as_ref().and_then(|l| l.as_deref());
        if self.lineage() != loaded_lineage {
            problems.push(format!(
                "lineage changed from {loaded_lineage:?} to {:?}",
                self.lineage()
            ));
        }

        let mut addresses = HashSet::new();
        for (position, resource) in self.resources.iter().enumerate() {
            if resource.resource_type.is_empty() {
                problems.push(format!("resource {position} has an empty type"));
            }
            if resource.name.is_empty() {
                problems.push(format!("resource {position} has an empty name"));
            }

            // A current object and its deposed predecessors share an index
            // key; Terraform tells them apart by the deposed id.
            let mut seen: Vec<(Option<&Value>, Option<&str>)> = Vec::new();
            for instance in resource.instances() {
                let identity = (instance.key(), instance.deposed());
                if seen.contains(&identity) {
                    problems.push(format!(
                        "resource {position} has duplicate instance key {}",
                        describe_instance(identity)
                    ));
                }
                seen.push(identity);
            }

            let address = Address::of(resource).to_string();
            if !addresses.insert(address.clone()) {
                problems.push(format!("duplicate resource address {address}"));
            }
        }

        problems
    }

    pub fn validate(&self) -> Result<(), TfstateError> {
        let problems = self.violations();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(TfstateError::Validation(problems))
        }
    }

    /// Pretty-printed JSON with `serial` one past the value at load time.
    pub fn serialize(&self) -> Result<Vec<u8>, TfstateError> {
        let view = StateDocumentView {
            version: self.version,
            terraform_version: self.terraform_version.as_ref(),
            serial: self.next_serial()?,
            lineage: self.lineage.as_ref(),
            outputs: self.outputs.as_ref(),
            resources: &self.resources,
            extra: &self.extra,
        };
        let mut bytes =
            serde_json::to_vec_pretty(&view).map_err(|e| TfstateError::Format(e.to_string()))?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    /// Fails with `Validation` once the serial has reached `u64::MAX`.
    pub fn next_serial(&self) -> Result<u64, TfstateError> {
        self.loaded.serial.checked_add(1).ok_or_else(|| {
            TfstateError::Validation(vec![format!(
                "serial {} cannot be incremented",
                self.loaded.serial
            )])
        })
    }

    /// Records that the serialized form is now what is on disk, so the next
    /// write moves the serial forward again.
    pub fn mark_persisted(&mut self) -> Result<(), TfstateError> {
        self.serial = self.next_serial()?;
        self.loaded.serial = self.serial;
        Ok(())
    }
}

fn describe_instance((key, deposed): (Option<&Value>, Option<&str>)) -> String {
    let key = key
        .map(format_index_key)
        .unwrap_or_else(|| "(none)".to_string());
    match deposed {
        Some(id) => format!("{key} (deposed {id})"),
        None => key,
    }
}

impl Resource {
    pub fn address(&self) -> Address {
        Address::of(self)
    }

    pub fn module(&self) -> Option<&str> {
        self.module.as_ref()?.as_deref()
    }

    /// Sets or clears the module path. Clearing a module that was written as
    /// `null` leaves the `null` in place.
    pub fn set_module(&mut self, module: Option<String>) {
        match module {
            Some(module) => self.module = Some(Some(module)),
            None if self.module().is_some() => self.module = None,
            None => {}
        }
    }

    pub fn provider(&self) -> Option<&str> {
        self.provider.as_ref()?.as_str()
    }

    pub fn instances(&self) -> &[Instance] {
        self.instances.as_deref().unwrap_or_default()
    }

    pub fn instances_mut(&mut self) -> &mut Vec<Instance> {
        self.instances.get_or_insert_with(Vec::new)
    }
}

impl Instance {
    /// The `count`/`for_each` key. A `null` key is treated as no key.
    pub fn key(&self) -> Option<&Value> {
        self.index_key.as_ref().filter(|key| !key.is_null())
    }

    /// Set on objects kept alive by `create_before_destroy` until their
    /// replacement is in place.
    pub fn deposed(&self) -> Option<&str> {
        self.extra.get("deposed").and_then(Value::as_str)
    }

    pub fn attributes(&self) -> Option<&Map<String, Value>> {
        self.attributes.as_ref()?.as_ref()
    }

    /// The attribute map, created empty when the instance has none.
    pub fn attributes_mut(&mut self) -> &mut Map<String, Value> {
        self.attributes
            .get_or_insert(None)
            .get_or_insert_with(Map::new)
    }

    pub fn dependencies(&self) -> Option<&[String]> {
        self.dependencies.as_ref()?.as_deref()
    }
}
