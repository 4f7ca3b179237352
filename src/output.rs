use serde_json::{Map, Value};
use tabled::settings::Style;
use tabled::{Table, Tabled};
use termtree::Tree;

use crate::terraform::{Mode, Resource, format_index_key};

const MAX_SCALAR_WIDTH: usize = 60;

#[derive(Tabled)]
struct ResourceRow {
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "Type")]
    resource_type: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Mode")]
    mode: &'static str,
    #[tabled(rename = "Instances")]
    instances: usize,
}

/// Address → instance → top-level attribute summary, in document order.
pub fn resource_tree(title: &str, resources: &[&Resource]) -> Tree<String> {
    let mut root = Tree::new(title.to_string());
    for resource in resources {
        let count = resource.instances().len();
        let mut node = Tree::new(format!(
            "{} ({} instance{})",
            resource.address(),
            count,
            if count == 1 { "" } else { "s" }
        ));
        for instance in resource.instances() {
            let label = match instance.key() {
                Some(key) => format_index_key(key),
                None => "instance".to_string(),
            };
            let mut instance_node = Tree::new(label);
            if let Some(attributes) = instance.attributes() {
                for line in attribute_summary(attributes) {
                    instance_node.push(line);
                }
            }
            node.push(instance_node);
        }
        root.push(node);
    }
    root
}

pub fn resource_table(resources: &[&Resource]) -> String {
    let rows = resources.iter().map(|resource| ResourceRow {
        address: resource.address().to_string(),
        resource_type: resource.resource_type.clone(),
        name: resource.name.clone(),
        mode: match resource.mode {
            Mode::Managed => "managed",
            Mode::Data => "data",
        },
        instances: resource.instances().len(),
    });
    Table::new(rows).with(Style::rounded()).to_string()
}

/// One `key = value` line per top-level attribute. Nested values are
/// summarised by size rather than printed.
pub fn attribute_summary(attributes: &Map<String, Value>) -> Vec<String> {
    attributes
        .iter()
        .map(|(key, value)| format!("{key} = {}", summarize(value)))
        .collect()
}

fn summarize(value: &Value) -> String {
    match value {
        Value::Array(items) => format!("[{} item{}]", items.len(), plural(items.len())),
        Value::Object(map) => format!("{{{} key{}}}", map.len(), plural(map.len())),
        scalar => {
            let text = scalar.to_string();
            if text.chars().count() > MAX_SCALAR_WIDTH {
                let cut: String = text.chars().take(MAX_SCALAR_WIDTH).collect();
                format!("{cut}…")
            } else {
                text
            }
        }
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}
