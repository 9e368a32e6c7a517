//! JSON schema validation of tool call arguments
//!
//! Schemas are compiled once when a tool is registered. Arguments produced by
//! the model are checked before the tool runs.

use crate::errors::AgentError;
use jsonschema::JSONSchema;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Default)]
pub struct ArgumentValidator {
    schemas: HashMap<String, JSONSchema>,
}

impl ArgumentValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiles and stores a tool's input schema. A schema that does not
    /// compile leaves the tool unvalidated.
    pub fn add_schema(&mut self, tool_name: &str, schema: &Value) {
        match JSONSchema::compile(schema) {
            Ok(compiled) => {
                self.schemas.insert(tool_name.to_string(), compiled);
            }
            Err(e) => {
                log::warn!("Invalid input schema for tool '{}': {}", tool_name, e);
                self.schemas.remove(tool_name);
            }
        }
    }

    pub fn remove_schema(&mut self, tool_name: &str) {
        self.schemas.remove(tool_name);
    }

    pub fn validate(&self, tool_name: &str, arguments: &Value) -> Result<(), AgentError> {
        let Some(schema) = self.schemas.get(tool_name) else {
            return Ok(());
        };

        if let Err(errors) = schema.validate(arguments) {
            let messages: Vec<String> = errors
                .map(|error| {
                    let path = error.instance_path.to_string();
                    if path.is_empty() {
                        error.to_string()
                    } else {
                        format!("{}: {}", path, error)
                    }
                })
                .collect();
            let error_msg = format!(
                "Invalid arguments for '{}': {}",
                tool_name,
                messages.join("; ")
            );
            log::warn!("{}", error_msg);
            return Err(AgentError::ValidationError(error_msg));
        }

        Ok(())
    }
}
