use std::collections::HashMap;

use glob::Pattern;

use super::address::Address;
use super::state::{Resource, StateDocument};
use crate::error::TfstateError;

/// Position of a resource inside `StateDocument::resources`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub position: usize,
}

/// Address lookup table for one document snapshot.
///
/// Built in one pass and never patched: anything that adds or removes
/// resources must build a fresh index.
#[derive(Debug, Default)]
pub struct ResourceIndex {
    positions: HashMap<String, usize>,
}

impl ResourceIndex {
    pub fn build(doc: &StateDocument) -> Self {
        let positions = doc
            .resources
            .iter()
            .enumerate()
            .map(|(position, resource)| (resource.address().to_string(), position))
            .collect();
        Self { positions }
    }

    /// Exact match on the resource part of `address`; an instance key is ignored.
    pub fn find(&self, address: &Address) -> Option<Location> {
        self.positions
            .get(&address.resource().to_string())
            .map(|&position| Location { position })
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Selection criteria for listing. An absent or empty type matches every
/// type; the name glob (`*`, `?`) is applied to the name segment only.
#[derive(Debug, Clone, Default)]
pub struct ResourceFilter {
    resource_type: Option<String>,
    name: Option<Pattern>,
}

impl ResourceFilter {
    pub fn new(resource_type: Option<&str>, name_glob: Option<&str>) -> Result<Self, TfstateError> {
        let name = name_glob
            .filter(|glob| !glob.is_empty())
            .map(|glob| {
                Pattern::new(glob).map_err(|e| TfstateError::InvalidPattern {
                    pattern: glob.to_string(),
                    message: e.msg.to_string(),
                })
            })
            .transpose()?;
        Ok(Self {
            resource_type: resource_type.filter(|t| !t.is_empty()).map(str::to_string),
            name,
        })
    }

    pub fn matches(&self, resource: &Resource) -> bool {
        let type_ok = self
            .resource_type
            .as_deref()
            .is_none_or(|t| t == resource.resource_type);
        let name_ok = self
            .name
            .as_ref()
            .is_none_or(|pattern| pattern.matches(&resource.name));
        type_ok && name_ok
    }

    /// Matching resources in document order.
    pub fn apply<'d>(&self, doc: &'d StateDocument) -> Vec<&'d Resource> {
        doc.resources.iter().filter(|r| self.matches(r)).collect()
    }
}
