//! Workflow registry: fixed, scripted two-agent chats.
//!
//! ```text
//! POST /workflows/{name} ──► WorkflowRequest::parse ──► WorkflowRunner
//!                                                          │ (bounded worker pool)
//!                                                     builtin::run
//!                                                          │
//!                                               initiate_chat(agent, agent)
//!                                                          │
//!                                                     ChatModel (LLM)
//! ```

pub mod agent;
pub mod builtin;
pub mod params;
pub mod runner;

pub use agent::{initiate_chat, ChatResult, ChatTurn, ConversableAgent, SummaryMethod};
pub use params::WorkflowRequest;
pub use runner::{WorkflowOutput, WorkflowRunner};

use serde::Serialize;

/// Name and description of a registered workflow.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowDescriptor {
    pub name: &'static str,
    pub description: &'static str,
}

/// Read-only registry, in declaration order.
#[derive(Debug, Clone)]
pub struct WorkflowRegistry {
    entries: Vec<WorkflowDescriptor>,
}

impl WorkflowRegistry {
    pub fn builtin() -> Self {
        Self {
            entries: vec![
                WorkflowDescriptor {
                    name: "simple_learning",
                    description: "Student and teacher learning chat",
                },
                WorkflowDescriptor {
                    name: "chat_assistant",
                    description: "General purpose chat assistant",
                },
                WorkflowDescriptor {
                    name: "database_chat",
                    description: "Chat assistant with database integration",
                },
            ],
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|e| e.name)
    }

    pub fn get(&self, name: &str) -> Option<&WorkflowDescriptor> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn description(&self, name: &str) -> Option<&'static str> {
        self.get(name).map(|e| e.description)
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorkflowDescriptor> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
