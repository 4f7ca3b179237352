use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use super::state::{Mode, Resource};
use crate::error::TfstateError;

/// A resource address such as `aws_instance.web`, `data.aws_ami.ubuntu`,
/// `module.vpc.aws_subnet.private` or `aws_instance.web[0]`.
///
/// The optional trailing key selects a single instance of a `count` or
/// `for_each` resource.
#[derive(Debug, Clone, PartialEq)]
pub struct Address {
    pub module: Option<String>,
    pub mode: Mode,
    pub resource_type: String,
    pub name: String,
    pub instance: Option<Value>,
}

impl Address {
    pub fn of(resource: &Resource) -> Self {
        Self {
            module: resource.module().map(str::to_string),
            mode: resource.mode,
            resource_type: resource.resource_type.clone(),
            name: resource.name.clone(),
            instance: None,
        }
    }

    /// The address of the whole resource, with any instance key dropped.
    pub fn resource(&self) -> Address {
        Address {
            instance: None,
            ..self.clone()
        }
    }

    /// Fails unless the address names a whole resource.
    pub fn require_whole_resource(&self, operation: &str) -> Result<(), TfstateError> {
        match &self.instance {
            None => Ok(()),
            Some(_) => Err(TfstateError::invalid_address(
                self.to_string(),
                format!("{operation} works on whole resources, drop the instance key"),
            )),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(module) = &self.module {
            write!(f, "{module}.")?;
        }
        if self.mode == Mode::Data {
            f.write_str("data.")?;
        }
        write!(f, "{}.{}", self.resource_type, self.name)?;
        if let Some(key) = &self.instance {
            f.write_str(&format_index_key(key))?;
        }
        Ok(())
    }
}

impl FromStr for Address {
    type Err = TfstateError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let invalid = |message: &str| TfstateError::invalid_address(input, message);

        let mut rest = input.trim();
        let mut modules = Vec::new();
        while let Some(after) = rest.strip_prefix("module.") {
            let (segment, tail) = split_top_level_dot(after);
            let tail = tail.ok_or_else(|| invalid("module path must be followed by a resource"))?;
            if segment.is_empty() {
                return Err(invalid("empty module name"));
            }
            modules.push(format!("module.{segment}"));
            rest = tail;
        }

        let (mode, rest) = match rest.strip_prefix("data.") {
            Some(after) => (Mode::Data, after),
            None => (Mode::Managed, rest),
        };

        let (resource_type, tail) = split_top_level_dot(rest);
        let tail = tail.ok_or_else(|| invalid("expected TYPE.NAME"))?;
        if !is_identifier(resource_type) {
            return Err(invalid("resource type must be a non-empty identifier"));
        }

        let (name, instance) = match tail.find('[') {
            Some(open) => {
                let key = tail[open..]
                    .strip_prefix('[')
                    .and_then(|k| k.strip_suffix(']'))
                    .ok_or_else(|| invalid("unterminated instance key"))?;
                let key = parse_index_key(key).ok_or_else(|| {
                    invalid("instance key must be an integer or a quoted string")
                })?;
                (&tail[..open], Some(key))
            }
            None => (tail, None),
        };
        if !is_identifier(name) {
            return Err(invalid("resource name must be a non-empty identifier"));
        }

        Ok(Address {
            module: (!modules.is_empty()).then(|| modules.join(".")),
            mode,
            resource_type: resource_type.to_string(),
            name: name.to_string(),
            instance,
        })
    }
}

/// Renders an instance key the way Terraform prints it: `[0]` or `["blue"]`.
pub fn format_index_key(key: &Value) -> String {
    match key {
        Value::String(s) => format!("[{}]", Value::String(s.clone())),
        other => format!("[{other}]"),
    }
}

fn parse_index_key(raw: &str) -> Option<Value> {
    if raw.starts_with('"') {
        serde_json::from_str::<String>(raw).ok().map(Value::String)
    } else {
        raw.parse::<u64>().ok().map(Value::from)
    }
}

// Splits at the first '.' that is not inside brackets or quotes.
fn split_top_level_dot(input: &str) -> (&str, Option<&str>) {
    let mut depth = 0usize;
    let mut in_quotes = false;
    let mut escaped = false;
    for (i, c) in input.char_indices() {
        if in_quotes {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_quotes = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_quotes = true,
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            '.' if depth == 0 => return (&input[..i], Some(&input[i + 1..])),
            _ => {}
        }
    }
    (input, None)
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
