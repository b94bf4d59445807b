//! The three registered workflows.

use std::sync::Arc;

use super::agent::{initiate_chat, ChatResult, ConversableAgent, SummaryMethod};
use super::params::WorkflowRequest;
use crate::error::ServerError;
use crate::llm::ChatModel;

const ASSISTANT_TURNS: u32 = 2;

const STUDENT_PROMPT: &str =
    "You are a student eager to learn about various topics. Ask questions and seek clarification when needed.";
const TEACHER_PROMPT: &str =
    "You are a knowledgeable teacher. Provide clear, educational responses and encourage learning.";
const ASSISTANT_PROMPT: &str =
    "You are a helpful AI assistant. Provide accurate, helpful, and friendly responses to user queries.";
const DATABASE_ASSISTANT_PROMPT: &str = "You are a helpful AI assistant with access to conversation history. \
     Provide personalized responses based on previous interactions.";
const USER_PROXY_PROMPT: &str = "You represent the user in this conversation.";

pub async fn run(request: WorkflowRequest, model: Arc<dyn ChatModel>) -> Result<ChatResult, ServerError> {
    match request {
        WorkflowRequest::SimpleLearning(p) => {
            let student = ConversableAgent::new("Student_Agent", STUDENT_PROMPT, model.clone());
            let teacher = ConversableAgent::new("Teacher_Agent", TEACHER_PROMPT, model);
            initiate_chat(
                &student,
                &teacher,
                &p.message,
                p.max_rounds,
                SummaryMethod::ReflectionWithLlm,
            )
            .await
        }
        WorkflowRequest::ChatAssistant(p) => {
            let assistant = ConversableAgent::new("Assistant_Agent", ASSISTANT_PROMPT, model.clone());
            let user = ConversableAgent::new("User_Agent", USER_PROXY_PROMPT, model);
            initiate_chat(
                &user,
                &assistant,
                &p.message,
                ASSISTANT_TURNS,
                SummaryMethod::ReflectionWithLlm,
            )
            .await
        }
        WorkflowRequest::DatabaseChat(p) => {
            tracing::info!("[Workflow] database_chat for user '{}'", p.user_id);
            let assistant =
                ConversableAgent::new("Database_Assistant", DATABASE_ASSISTANT_PROMPT, model.clone());
            let user = ConversableAgent::new("User_Agent", USER_PROXY_PROMPT, model);
            initiate_chat(
                &user,
                &assistant,
                &p.message,
                ASSISTANT_TURNS,
                SummaryMethod::ReflectionWithLlm,
            )
            .await
        }
    }
}
