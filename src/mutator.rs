//! Logical edits to a state document.
//!
//! Each mutation runs against a staged copy of the document. The live
//! document is only replaced once the staged copy passes validation, so a
//! failed mutation leaves it exactly as it was.

use serde_json::Value;

use crate::error::TfstateError;
use crate::terraform::{Address, AttributePath, Instance, ResourceIndex, StateDocument};

#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Modify {
        address: Address,
        path: AttributePath,
        value: Value,
    },
    Delete {
        address: Address,
    },
    Move {
        from: Address,
        to: Address,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Modified {
        address: Address,
        path: AttributePath,
        previous: Option<Value>,
    },
    Deleted {
        address: Address,
        instances: usize,
    },
    Moved {
        from: Address,
        to: Address,
        instances: usize,
    },
}

impl Mutation {
    pub fn describe(&self) -> String {
        match self {
            Mutation::Modify {
                address,
                path,
                value,
            } => format!("set {address} attribute {path} = {value}"),
            Mutation::Delete { address } => format!(
                "remove {address} from state (the real infrastructure object is not destroyed)"
            ),
            Mutation::Move { from, to } => format!("move {from} to {to}"),
        }
    }
}

/// Applies `mutation` to `doc`, keeping `doc` untouched on any failure.
pub fn apply(doc: &mut StateDocument, mutation: &Mutation) -> Result<Outcome, TfstateError> {
    let mut staged = doc.clone();
    let outcome = apply_staged(&mut staged, mutation)?;
    *doc = staged;
    Ok(outcome)
}

/// Runs `mutation` against a throwaway copy to find out whether it would succeed.
pub fn check(doc: &StateDocument, mutation: &Mutation) -> Result<Outcome, TfstateError> {
    let mut staged = doc.clone();
    apply_staged(&mut staged, mutation)
}

fn apply_staged(staged: &mut StateDocument, mutation: &Mutation) -> Result<Outcome, TfstateError> {
    staged.validate()?;
    let outcome = match mutation {
        Mutation::Modify {
            address,
            path,
            value,
        } => modify(staged, address, path, value.clone())?,
        Mutation::Delete { address } => delete(staged, address)?,
        Mutation::Move { from, to } => move_resource(staged, from, to)?,
    };
    staged.validate()?;
    tracing::debug!(?outcome, "mutation applied");
    Ok(outcome)
}

fn modify(
    doc: &mut StateDocument,
    address: &Address,
    path: &AttributePath,
    value: Value,
) -> Result<Outcome, TfstateError> {
    let location = ResourceIndex::build(doc)
        .find(address)
        .ok_or_else(|| TfstateError::NotFound(address.resource().to_string()))?;
    let resource = &mut doc.resources[location.position];

    let instance = select_instance(resource.instances_mut(), address, path)?;
    let previous = path.set(instance.attributes_mut(), value)?;

    Ok(Outcome::Modified {
        address: address.clone(),
        path: path.clone(),
        previous,
    })
}

fn select_instance<'i>(
    instances: &'i mut [Instance],
    address: &Address,
    path: &AttributePath,
) -> Result<&'i mut Instance, TfstateError> {
    // Deposed objects are on their way out and are never edited.
    let mut current = instances.iter_mut().filter(|i| i.deposed().is_none());
    if let Some(key) = &address.instance {
        return current
            .find(|instance| instance.key() == Some(key))
            .ok_or_else(|| TfstateError::NotFound(address.to_string()));
    }

    let mut current: Vec<&'i mut Instance> = current.collect();
    match current.len() {
        1 => Ok(current.remove(0)),
        0 => Err(TfstateError::path(
            path.to_string(),
            format!("{address} has no instances"),
        )),
        many => Err(TfstateError::path(
            path.to_string(),
            format!(
                "{address} has {} instances, select one with an index key such as {address}[0]",
                many
            ),
        )),
    }
}

fn delete(doc: &mut StateDocument, address: &Address) -> Result<Outcome, TfstateError> {
    address.require_whole_resource("delete")?;
    let location = ResourceIndex::build(doc)
        .find(address)
        .ok_or_else(|| TfstateError::NotFound(address.to_string()))?;
    let removed = doc.resources.remove(location.position);
    Ok(Outcome::Deleted {
        address: address.clone(),
        instances: removed.instances().len(),
    })
}

// Dependency references held by other resources are not rewritten.
fn move_resource(
    doc: &mut StateDocument,
    from: &Address,
    to: &Address,
) -> Result<Outcome, TfstateError> {
    from.require_whole_resource("move")?;
    to.require_whole_resource("move")?;
    if from.mode != to.mode {
        return Err(TfstateError::invalid_address(
            to.to_string(),
            "cannot move between managed resources and data sources",
        ));
    }

    let index = ResourceIndex::build(doc);
    let location = index
        .find(from)
        .ok_or_else(|| TfstateError::NotFound(from.to_string()))?;
    if index.find(to).is_some() {
        return Err(TfstateError::Conflict(to.to_string()));
    }

    let resource = &mut doc.resources[location.position];
    resource.set_module(to.module.clone());
    resource.resource_type = to.resource_type.clone();
    resource.name = to.name.clone();

    Ok(Outcome::Moved {
        from: from.clone(),
        to: to.clone(),
        instances: resource.instances().len(),
    })
}
