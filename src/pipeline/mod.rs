//! Retrieval-augmented generation pipelines
//!
//! [`IngestionPipeline`] embeds documents and writes them to the vector store;
//! [`QueryPipeline`] embeds a question, retrieves the closest documents and
//! asks the generation model to answer with them as context.


pub mod ingest;
pub mod query;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::RagError;
use crate::database::{PartialObject, TEXT_FIELD};

pub use ingest::IngestionPipeline;
pub use query::{CONTEXT_DOCUMENTS, QueryPipeline};

/// A document submitted for ingestion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "Text", alias = "text")]
    pub text: String,
}

impl Document {
    #[inline]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Render the augmented prompt for `question` with the retrieved `context`.
///
/// The template is unconditional: an empty context renders an empty block.
#[inline]
pub fn render_prompt(question: &str, context: &[String]) -> String {
    let context = context.join("\n");
    format!(
        r"
I will ask you a question and will provide some additional context information.
Assume this context information is factual and correct, as part of internal
documentation.
If the question relates to the context, answer it using the context.
If the question does not relate to the context, answer it as normal.

For example, let's say the context has nothing in it about tropical flowers;
then if I ask you about tropical flowers, just answer what you know about them
without referring to the context.

For example, if the context does mention minerology and I ask you about that,
provide information from the context along with general knowledge.

Question:
{question}

Context:
{context}
"
    )
}

/// Extract the text of every match, in order.
///
/// A match without a string `text` field fails the whole decode.
#[inline]
pub fn decode_texts(matches: Vec<PartialObject>) -> Result<Vec<String>, RagError> {
    matches
        .into_iter()
        .enumerate()
        .map(|(index, mut object)| match object.remove(TEXT_FIELD) {
            Some(Value::String(text)) => Ok(text),
            Some(other) => Err(RagError::Decoding(format!(
                "expected string in list of documents, found {} at position {}",
                json_type_name(&other),
                index
            ))),
            None => Err(RagError::Decoding(format!(
                "missing {} field at position {}",
                TEXT_FIELD, index
            ))),
        })
        .collect()
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Classify a collaborator failure, preferring cancellation when the request's
/// token has fired
fn classify(
    cancel: &CancellationToken,
    error: &anyhow::Error,
    kind: fn(String) -> RagError,
) -> RagError {
    if cancel.is_cancelled() {
        RagError::Cancelled
    } else {
        kind(format!("{:#}", error))
    }
}

fn ensure_not_cancelled(cancel: &CancellationToken) -> Result<(), RagError> {
    if cancel.is_cancelled() {
        Err(RagError::Cancelled)
    } else {
        Ok(())
    }
}
