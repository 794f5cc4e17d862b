//! The gateway: validated, metered access to the active provider.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ProviderConfig;
use crate::error::{GatewayError, Result};
use crate::pricing::completion_cost;
use crate::provider::{ChatMessage, CompletionRequest, ModelProvider, Role};

/// Cost and token counts of one completion call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageReport {
    /// Model that served the call.
    pub model: String,

    /// Cost in USD.
    pub cost_usd: f64,

    /// Prompt tokens.
    pub input_tokens: u64,

    /// Generated tokens.
    pub output_tokens: u64,
}

/// Receives a [`UsageReport`] after every metered completion.
pub trait UsageObserver: Send + Sync {
    fn on_usage(&self, report: &UsageReport);
}

impl<F> UsageObserver for F
where
    F: Fn(&UsageReport) + Send + Sync,
{
    fn on_usage(&self, report: &UsageReport) {
        self(report)
    }
}

/// A completed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Completion {
    /// Generated text.
    pub text: String,

    /// Usage, when the provider meters tokens.
    pub usage: Option<UsageReport>,
}

/// Uniform entry point for completions and embeddings.
///
/// The provider is chosen once when the gateway is built; build a new
/// gateway after the configuration changes.
pub struct Gateway {
    provider: Arc<dyn ModelProvider>,
    observer: Option<Arc<dyn UsageObserver>>,
}

impl Gateway {
    /// Create a gateway over an existing provider.
    pub fn new(provider: Arc<dyn ModelProvider>) -> Self {
        Self {
            provider,
            observer: None,
        }
    }

    /// Create a gateway for the provider selected by `config`.
    pub fn from_config(config: &ProviderConfig) -> Self {
        let provider = config.build_provider();
        info!(
            "Using {} provider (completion: {}, embedding: {})",
            provider.name(),
            provider.completion_model(),
            provider.embedding_model()
        );
        Self::new(provider)
    }

    /// Report usage of every metered completion to `observer`.
    pub fn with_observer(mut self, observer: Arc<dyn UsageObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// The active provider.
    pub fn provider(&self) -> &dyn ModelProvider {
        self.provider.as_ref()
    }

    /// Complete a single prompt under a system prompt.
    pub async fn complete(&self, input: &str, system_prompt: &str) -> Result<Completion> {
        if input.trim().is_empty() || system_prompt.trim().is_empty() {
            return Err(GatewayError::EmptyInput);
        }
        self.send(CompletionRequest::single(system_prompt, input))
            .await
    }

    /// Complete a full conversation.
    ///
    /// At least one non-system message must carry text.
    pub async fn complete_messages(&self, messages: &[ChatMessage]) -> Result<Completion> {
        let has_turn = messages
            .iter()
            .any(|m| m.role != Role::System && !m.content.trim().is_empty());
        if !has_turn {
            return Err(GatewayError::EmptyInput);
        }
        self.send(CompletionRequest::new(messages.to_vec())).await
    }

    async fn send(&self, request: CompletionRequest) -> Result<Completion> {
        let result = self.provider.complete(&request).await?;

        let usage = result.usage.map(|tokens| {
            let model = self.provider.completion_model().to_string();
            UsageReport {
                cost_usd: completion_cost(&model, tokens),
                model,
                input_tokens: tokens.input_tokens,
                output_tokens: tokens.output_tokens,
            }
        });

        if let Some(ref report) = usage {
            debug!(
                "Completion used {} input / {} output tokens (${:.6})",
                report.input_tokens, report.output_tokens, report.cost_usd
            );
            if let Some(ref observer) = self.observer {
                observer.on_usage(report);
            }
        }

        Ok(Completion {
            text: result.text,
            usage,
        })
    }

    /// Embed a piece of text.
    ///
    /// Blank text is rejected without contacting the provider.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(GatewayError::EmptyInput);
        }

        let output = self.provider.embed(text).await?;
        if output.vector.is_empty() {
            return Err(GatewayError::Protocol("provider returned an empty embedding".to_string()));
        }
        Ok(output.vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::CloudProvider;
    use crate::provider::{EmbeddingOutput, ProviderCompletion, TokenUsage};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct ScriptedProvider {
        calls: AtomicUsize,
        usage: Option<TokenUsage>,
    }

    #[async_trait]
    impl ModelProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        fn completion_model(&self) -> &str {
            "gpt-4o-mini"
        }

        fn embedding_model(&self) -> &str {
            "scripted-embed"
        }

        async fn complete(&self, request: &CompletionRequest) -> Result<ProviderCompletion> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ProviderCompletion {
                text: format!("echo: {}", request.prompt_text()),
                usage: self.usage,
            })
        }

        async fn embed(&self, text: &str) -> Result<EmbeddingOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(EmbeddingOutput {
                vector: vec![text.len() as f32, 1.0],
                total_tokens: None,
            })
        }

        fn is_available(&self) -> bool {
            true
        }
    }

    fn scripted(usage: Option<TokenUsage>) -> Arc<ScriptedProvider> {
        Arc::new(ScriptedProvider {
            calls: AtomicUsize::new(0),
            usage,
        })
    }

    #[tokio::test]
    async fn test_complete_reports_cost_to_observer() {
        let reports = Arc::new(Mutex::new(Vec::new()));
        let sink = reports.clone();
        let gateway = Gateway::new(scripted(Some(TokenUsage {
            input_tokens: 1000,
            output_tokens: 1000,
        })))
        .with_observer(Arc::new(move |r: &UsageReport| {
            sink.lock().unwrap().push(r.clone());
        }));

        let completion = gateway.complete("hello", "Be brief.").await.unwrap();
        assert_eq!(completion.text, "echo: hello");

        let reports = reports.lock().unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].input_tokens, 1000);
        assert!((reports[0].cost_usd - (0.000_15 + 0.000_6)).abs() < 1e-12);
        assert_eq!(completion.usage.as_ref(), Some(&reports[0]));
    }

    #[tokio::test]
    async fn test_unmetered_completion_skips_observer() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let gateway = Gateway::new(scripted(None)).with_observer(Arc::new(
            move |_: &UsageReport| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        ));

        let completion = gateway.complete("hello", "Be brief.").await.unwrap();
        assert!(completion.usage.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_blank_input_never_reaches_provider() {
        let provider = scripted(None);
        let gateway = Gateway::new(provider.clone());

        assert!(matches!(
            gateway.embed("").await,
            Err(GatewayError::EmptyInput)
        ));
        assert!(matches!(
            gateway.embed("  \n\t").await,
            Err(GatewayError::EmptyInput)
        ));
        assert!(matches!(
            gateway.complete("text", " ").await,
            Err(GatewayError::EmptyInput)
        ));
        assert!(matches!(
            gateway
                .complete_messages(&[ChatMessage::system("Only instructions")])
                .await,
            Err(GatewayError::EmptyInput)
        ));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unauthorized_completion_reports_no_usage() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let provider = CloudProvider::new()
            .with_api_key("sk-wrong")
            .with_base_url(server.uri());
        let gateway = Gateway::new(Arc::new(provider)).with_observer(Arc::new(
            move |_: &UsageReport| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        ));

        let err = gateway.complete("hello", "Be brief.").await.unwrap_err();
        assert!(matches!(err, GatewayError::Provider { status: 401, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
