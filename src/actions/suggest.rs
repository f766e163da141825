use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::LlmSettings;
use crate::llm::{ChatMessage, LlmClient, LlmResponse, Sampling, StructuredRequest};

const SYSTEM_PROMPT: &str = r#"You are a search engine query/questions generator. You 'have' to create only '3' questions for the search engine based on the message history which has been provided to you.
The questions should be open-ended and should encourage further discussion while maintaining the whole context. Limit it to 5-10 words per question.
Always put the user input's context is some way so that the next search knows what to search for exactly.
Try to stick to the context of the conversation and avoid asking questions that are too general or too specific.
For weather based conversations sent to you, always generate questions that are about news, sports, or other topics that are not related to the weather.
For programming based conversations, always generate questions that are about the algorithms, data structures, or other topics that are related to it or an improvement of the question.
For location based conversations, always generate questions that are about the culture, history, or other topics that are related to the location.
Do not use pronouns like he, she, him, his, her, etc. in the questions as they blur the context. Always use the proper nouns from the context."#;

const SAMPLING: Sampling = Sampling {
    temperature: 0.0,
    max_tokens: 300,
    top_p: 0.3,
    top_k: Some(7),
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestedQuestions {
    pub questions: Vec<String>,
}

fn output_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "questions": {
                "type": "array",
                "items": { "type": "string" },
                "description": "The generated questions based on the message history."
            }
        },
        "required": ["questions"],
        "additionalProperties": false
    })
}

pub struct QuestionSuggester {
    llm: LlmClient,
    model: String,
}

impl QuestionSuggester {
    pub fn new(settings: &LlmSettings) -> Result<Self> {
        let api_key = settings
            .api_key
            .as_deref()
            .context("OPENAI_API_KEY must be set to suggest questions")?;
        let llm = LlmClient::new(api_key, &settings.base_url, settings.timeout)?;

        Ok(Self {
            llm,
            model: settings.model.clone(),
        })
    }

    /// Asks the model for three follow-up questions. The reply is returned as
    /// produced; count and length are only requested by the instruction.
    pub async fn suggest(
        &self,
        history: &[ChatMessage],
    ) -> Result<LlmResponse<SuggestedQuestions>> {
        tracing::info!(
            history = %serde_json::to_string(history).unwrap_or_default(),
            "suggesting questions"
        );

        let request = StructuredRequest {
            model: &self.model,
            system: SYSTEM_PROMPT,
            messages: history,
            sampling: SAMPLING,
            schema_name: "suggested_questions",
            schema: output_schema(),
        };

        let response: LlmResponse<SuggestedQuestions> =
            self.llm.complete_structured(&request).await?;

        tracing::debug!(
            count = response.value.questions.len(),
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            "questions generated"
        );

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(server: &MockServer, api_key: Option<&str>) -> LlmSettings {
        LlmSettings {
            api_key: api_key.map(str::to_string),
            base_url: format!("{}/v1/chat/completions", server.uri()),
            model: "gpt-4o-mini".to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    fn history() -> Vec<ChatMessage> {
        serde_json::from_value(serde_json::json!([
            { "role": "user", "content": "What is the weather in Lisbon today?" },
            { "role": "assistant", "content": "Lisbon is sunny with a high of 24C." }
        ]))
        .unwrap()
    }

    fn completion(content: &str) -> serde_json::Value {
        serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": content } }],
            "usage": { "prompt_tokens": 120, "completion_tokens": 30 }
        })
    }

    #[tokio::test]
    async fn returns_questions_from_structured_reply() {
        let server = MockServer::start().await;
        let reply = serde_json::json!({
            "questions": [
                "Latest Lisbon football news this week",
                "Portugal national team upcoming fixtures",
                "Major Lisbon cultural events this month"
            ]
        })
        .to_string();

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-4o-mini",
                "temperature": 0.0,
                "max_tokens": 300,
                "top_k": 7,
                "response_format": { "type": "json_schema" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(&reply)))
            .expect(1)
            .mount(&server)
            .await;

        let suggester = QuestionSuggester::new(&settings(&server, Some("test-key"))).unwrap();
        let response = suggester.suggest(&history()).await.unwrap();

        let questions = &response.value.questions;
        assert_eq!(questions.len(), 3);
        for q in questions {
            let words: Vec<&str> = q.split_whitespace().collect();
            assert!((5..=10).contains(&words.len()), "{q}");
            for pronoun in ["he", "she", "him", "his", "her"] {
                assert!(
                    !words.iter().any(|w| w.eq_ignore_ascii_case(pronoun)),
                    "{q}"
                );
            }
        }
        assert_eq!(response.input_tokens, 120);
        assert_eq!(response.output_tokens, 30);
    }

    #[tokio::test]
    async fn sends_system_instruction_then_history_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(completion(r#"{"questions":["a b c d e"]}"#)),
            )
            .mount(&server)
            .await;

        let suggester = QuestionSuggester::new(&settings(&server, Some("k"))).unwrap();
        suggester.suggest(&history()).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0]["role"], "system");
        assert!(messages[0]["content"]
            .as_str()
            .unwrap()
            .contains("Do not use pronouns"));
        assert_eq!(messages[1]["content"], "What is the weather in Lisbon today?");
        assert_eq!(messages[2]["role"], "assistant");
    }

    #[tokio::test]
    async fn model_errors_propagate() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
            .expect(1)
            .mount(&server)
            .await;

        let suggester = QuestionSuggester::new(&settings(&server, Some("k"))).unwrap();
        let err = suggester.suggest(&history()).await.unwrap_err();
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn malformed_structured_output_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("not json")))
            .mount(&server)
            .await;

        let suggester = QuestionSuggester::new(&settings(&server, Some("k"))).unwrap();
        assert!(suggester.suggest(&history()).await.is_err());
    }

    #[tokio::test]
    async fn missing_credential_fails_construction() {
        let server = MockServer::start().await;
        assert!(QuestionSuggester::new(&settings(&server, None)).is_err());
    }
}
