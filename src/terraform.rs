//! Terraform state data model: documents, addresses, attribute paths and lookup.

pub mod address;
pub mod attributes;
pub mod index;
pub mod state;

pub use address::{Address, format_index_key};
pub use attributes::{AttributePath, parse_value};
pub use index::{Location, ResourceFilter, ResourceIndex};
pub use state::{Instance, Mode, Resource, StateDocument};
