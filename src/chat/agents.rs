//! Agent definitions and routing
//!
//! Two agents share the model: a concise general assistant and a workbook
//! agent that answers only with the rent payload JSON. Messages asking for
//! the year's rent workbook go to the workbook agent so it never asks
//! clarifying questions.

use crate::workbook::payload::{MISSING_DATA, TEMPLATE_VERSION};
use serde::Serialize;

/// General assistant name
pub const ASSISTANT_AGENT_NAME: &str = "Starter Assistant";

/// Workbook agent name
pub const RENT_WORKBOOK_AGENT_NAME: &str = "RentWorkbookAgent";

const ASSISTANT_INSTRUCTIONS: &str = "You are a concise, helpful assistant. \
Keep replies short and focus on directly answering the user's request.";

/// Hosted tool available to an agent
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentTool {
    /// Retrieval over vector stores
    FileSearch {
        /// Vector stores to search
        vector_store_ids: Vec<String>,
    },
}

/// Model, instructions and tools for one agent
#[derive(Debug, Clone, PartialEq)]
pub struct AgentDefinition {
    /// Display name (logs only)
    pub name: &'static str,
    /// Model name
    pub model: String,
    /// System instructions
    pub instructions: String,
    /// Hosted tools
    pub tools: Vec<AgentTool>,
}

/// The agents available to the chat server
#[derive(Debug, Clone)]
pub struct AgentCatalog {
    assistant: AgentDefinition,
    rent_workbook: AgentDefinition,
    trigger: String,
}

impl AgentCatalog {
    /// Build the catalog for a workbook year
    ///
    /// With a vector store the workbook agent can search the rent records.
    pub fn new(model: &str, year: i32, vector_store_id: Option<&str>) -> Self {
        let tools = vector_store_id
            .map(|id| AgentTool::FileSearch {
                vector_store_ids: vec![id.to_string()],
            })
            .into_iter()
            .collect();

        Self {
            assistant: AgentDefinition {
                name: ASSISTANT_AGENT_NAME,
                model: model.to_string(),
                instructions: ASSISTANT_INSTRUCTIONS.to_string(),
                tools: Vec::new(),
            },
            rent_workbook: AgentDefinition {
                name: RENT_WORKBOOK_AGENT_NAME,
                model: model.to_string(),
                instructions: rent_workbook_instructions(year),
                tools,
            },
            trigger: format!("{} rent workbook", year),
        }
    }

    /// Pick the agent for a user message
    pub fn route(&self, user_text: &str) -> &AgentDefinition {
        if user_text.to_lowercase().contains(&self.trigger) {
            &self.rent_workbook
        } else {
            &self.assistant
        }
    }

    /// The workbook agent
    pub fn rent_workbook(&self) -> &AgentDefinition {
        &self.rent_workbook
    }

    /// Prompt that makes the workbook agent produce the payload
    pub fn rent_workbook_prompt(&self) -> String {
        format!("Generate {}", self.trigger)
    }
}

fn rent_workbook_instructions(year: i32) -> String {
    let schema = format!(
        "{{\"template_version\":\"{version}\",\"year\":{year},\"properties\":[{{\"property_id\":\"KN01\",\
\"property_address\":null,\"tenant_name\":null,\"period_months\":12,\"rows\":[{{\"month_number\":1,\
\"month\":\"Jan\",\"rent_due\":0,\"housing_dept\":null,\"housing_paid\":0,\"tenant_paid\":0,\
\"total_received\":0,\"month_balance_due\":0,\"year_balance_due\":0,\"remarks\":\"\"}}]}}]}}",
        version = TEMPLATE_VERSION,
        year = year,
    );
    format!(
        "You are the {name}. \
If the user asks to generate/export/create the {year} rent workbook (e.g., 'generate {year} rent workbook'), \
you MUST respond with ONLY a single valid JSON object and nothing else. \
Do NOT ask clarifying questions. Do NOT include markdown. \
JSON schema (must match exactly): {schema}. \
Requirements: include KN01..KN10; each has exactly 12 rows for months 1..12 in order; total rows 120. \
If data is missing, keep the row and set numeric fields to 0 and remarks to '{missing}'.",
        name = RENT_WORKBOOK_AGENT_NAME,
        year = year,
        schema = schema,
        missing = MISSING_DATA,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routes_workbook_requests() {
        let catalog = AgentCatalog::new("gpt-4.1-mini", 2025, None);
        assert_eq!(
            catalog.route("Please GENERATE 2025 Rent Workbook").name,
            RENT_WORKBOOK_AGENT_NAME
        );
        assert_eq!(catalog.route("export 2025 rent workbook").name, RENT_WORKBOOK_AGENT_NAME);
        assert_eq!(catalog.route("what's the weather?").name, ASSISTANT_AGENT_NAME);
        assert_eq!(catalog.route("2024 rent workbook").name, ASSISTANT_AGENT_NAME);
    }

    #[test]
    fn test_instructions_embed_schema() {
        let catalog = AgentCatalog::new("gpt-4.1-mini", 2025, None);
        let instructions = &catalog.rent_workbook().instructions;
        assert!(instructions.contains("\"template_version\":\"property_rents_received_v1\",\"year\":2025"));
        assert!(instructions.contains("remarks to 'Missing data'"));
        assert_eq!(catalog.rent_workbook_prompt(), "Generate 2025 rent workbook");
    }

    #[test]
    fn test_vector_store_adds_file_search() {
        let catalog = AgentCatalog::new("gpt-4.1-mini", 2025, Some("vs_123"));
        assert_eq!(
            catalog.rent_workbook().tools,
            vec![AgentTool::FileSearch {
                vector_store_ids: vec!["vs_123".to_string()]
            }]
        );
        let json = serde_json::to_value(&catalog.rent_workbook().tools[0]).unwrap();
        assert_eq!(json["type"], "file_search");
        assert!(catalog.route("hello").tools.is_empty());
    }
}
