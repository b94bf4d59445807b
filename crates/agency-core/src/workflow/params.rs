//! Typed request parameters, one variant per registered workflow.

use serde::Deserialize;

use crate::error::ServerError;

pub const MAX_ROUNDS_LIMIT: u32 = 50;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SimpleLearningParams {
    #[serde(default = "default_learning_message")]
    pub message: String,
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatAssistantParams {
    #[serde(default = "default_chat_message")]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DatabaseChatParams {
    #[serde(default = "default_chat_message")]
    pub message: String,
    #[serde(default = "default_user_id")]
    pub user_id: String,
}

fn default_learning_message() -> String {
    "I want to learn about artificial intelligence.".to_string()
}

fn default_chat_message() -> String {
    "Hello, how can you help me today?".to_string()
}

fn default_user_id() -> String {
    "anonymous".to_string()
}

fn default_max_rounds() -> u32 {
    5
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowRequest {
    SimpleLearning(SimpleLearningParams),
    ChatAssistant(ChatAssistantParams),
    DatabaseChat(DatabaseChatParams),
}

impl WorkflowRequest {
    /// Validate `params` against the workflow registered as `name`.
    ///
    /// `Null` is treated as "no parameters"; anything other than an object
    /// is rejected. Unknown fields are ignored.
    pub fn parse(name: &str, params: serde_json::Value) -> Result<Self, ServerError> {
        let params = match params {
            serde_json::Value::Null => serde_json::Value::Object(Default::default()),
            value @ serde_json::Value::Object(_) => value,
            other => {
                return Err(ServerError::BadRequest(format!(
                    "Parameters for '{}' must be a JSON object, got {}",
                    name, other
                )))
            }
        };

        let request = match name {
            "simple_learning" => {
                let p: SimpleLearningParams = decode(name, params)?;
                if p.max_rounds == 0 || p.max_rounds > MAX_ROUNDS_LIMIT {
                    return Err(ServerError::BadRequest(format!(
                        "max_rounds must be between 1 and {}, got {}",
                        MAX_ROUNDS_LIMIT, p.max_rounds
                    )));
                }
                WorkflowRequest::SimpleLearning(p)
            }
            "chat_assistant" => WorkflowRequest::ChatAssistant(decode(name, params)?),
            "database_chat" => WorkflowRequest::DatabaseChat(decode(name, params)?),
            other => return Err(ServerError::NotFound(format!("Workflow '{}' not found", other))),
        };
        Ok(request)
    }

    pub fn name(&self) -> &'static str {
        match self {
            WorkflowRequest::SimpleLearning(_) => "simple_learning",
            WorkflowRequest::ChatAssistant(_) => "chat_assistant",
            WorkflowRequest::DatabaseChat(_) => "database_chat",
        }
    }
}

fn decode<T: serde::de::DeserializeOwned>(name: &str, params: serde_json::Value) -> Result<T, ServerError> {
    serde_json::from_value(params)
        .map_err(|e| ServerError::BadRequest(format!("Invalid parameters for '{}': {}", name, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_from_empty_body() {
        let request = WorkflowRequest::parse("simple_learning", serde_json::Value::Null).unwrap();
        assert_eq!(
            request,
            WorkflowRequest::SimpleLearning(SimpleLearningParams {
                message: "I want to learn about artificial intelligence.".to_string(),
                max_rounds: 5,
            })
        );

        let request = WorkflowRequest::parse("database_chat", json!({})).unwrap();
        let WorkflowRequest::DatabaseChat(p) = request else {
            panic!("wrong variant");
        };
        assert_eq!(p.user_id, "anonymous");
        assert_eq!(p.message, "Hello, how can you help me today?");
    }

    #[test]
    fn test_extra_fields_ignored() {
        let request =
            WorkflowRequest::parse("chat_assistant", json!({ "message": "Hello", "trace": true })).unwrap();
        assert_eq!(
            request,
            WorkflowRequest::ChatAssistant(ChatAssistantParams { message: "Hello".to_string() })
        );
    }

    #[test]
    fn test_malformed_params_rejected() {
        assert!(matches!(
            WorkflowRequest::parse("chat_assistant", json!({ "message": 42 })),
            Err(ServerError::BadRequest(_))
        ));
        assert!(matches!(
            WorkflowRequest::parse("simple_learning", json!({ "max_rounds": "two" })),
            Err(ServerError::BadRequest(_))
        ));
        assert!(matches!(
            WorkflowRequest::parse("simple_learning", json!({ "max_rounds": 0 })),
            Err(ServerError::BadRequest(_))
        ));
        assert!(matches!(
            WorkflowRequest::parse("simple_learning", json!(["not", "an", "object"])),
            Err(ServerError::BadRequest(_))
        ));
    }

    #[test]
    fn test_unknown_workflow() {
        assert!(matches!(
            WorkflowRequest::parse("chess", json!({})),
            Err(ServerError::NotFound(_))
        ));
    }
}
