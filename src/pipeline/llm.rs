//! Model interaction: render a predictor's messages, call the provider, and
//! parse the reply.
//!
//! All prompt text lives in [`crate::prompts`] and [`crate::signature`];
//! this module only owns the call itself.
//!
//! ## Retry Strategy
//!
//! Retries are off by default (`max_retries = 0`). When enabled, failed
//! calls back off exponentially (`retry_backoff_ms * 2^(attempt-1)`): with a
//! 500 ms base and 3 retries the waits are 500 ms → 1 s → 2 s. A single wait
//! never exceeds [`MAX_BACKOFF_MS`]. A reply that arrives but cannot be
//! parsed is not retried.

use crate::config::ExtractionConfig;
use crate::error::{ExtractError, PageError};
use crate::output::PageExtraction;
use crate::pipeline::encode;
use crate::pipeline::parse::parse_extracted_data;
use crate::pipeline::render::PageContent;
use crate::prompts::{page_extraction, EXTRACTED_DATA};
use crate::signature::{Inputs, Prediction, Predictor};
use edgequake_llm::{CompletionOptions, LLMProvider};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Ceiling for one backoff wait.
pub const MAX_BACKOFF_MS: u64 = 30_000;

/// Wait before retry number `attempt` (1-based), capped at [`MAX_BACKOFF_MS`].
pub fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    let factor = 2u64.checked_pow(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
    Duration::from_millis(base_ms.saturating_mul(factor).min(MAX_BACKOFF_MS))
}

/// Run `call` up to `max_retries + 1` times, backing off between failures.
/// Returns the first success or the last error.
pub async fn with_retries<T, F, Fut>(
    config: &ExtractionConfig,
    label: &str,
    mut call: F,
) -> Result<T, ExtractError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ExtractError>>,
{
    let mut last_err: Option<ExtractError> = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = backoff_delay(config.retry_backoff_ms, attempt);
            warn!(
                "{}: retry {}/{} after {}ms",
                label,
                attempt,
                config.max_retries,
                backoff.as_millis()
            );
            sleep(backoff).await;
        }

        match call().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                warn!("{}: attempt {} failed: {}", label, attempt + 1, e);
                last_err = Some(e);
            }
        }
    }

    Err(last_err.unwrap_or_else(|| ExtractError::LlmApiError {
        message: "no attempt was made".into(),
    }))
}

/// Run `predictor` on `inputs`. `label` names the call in logs
/// (e.g. `"document"` or `"page 3"`).
pub async fn run_predictor(
    provider: &Arc<dyn LLMProvider>,
    predictor: &Predictor,
    inputs: &Inputs,
    config: &ExtractionConfig,
    label: &str,
) -> Result<Prediction, ExtractError> {
    let messages = &predictor.messages(inputs)?;
    let options = &build_options(config);
    let start = Instant::now();

    let response = with_retries(config, label, || async move {
        let call = provider.chat(messages, Some(options));
        if config.api_timeout_secs > 0 {
            match timeout(Duration::from_secs(config.api_timeout_secs), call).await {
                Ok(r) => r.map_err(|e| ExtractError::LlmApiError {
                    message: e.to_string(),
                }),
                Err(_) => Err(ExtractError::ApiTimeout {
                    secs: config.api_timeout_secs,
                }),
            }
        } else {
            call.await.map_err(|e| ExtractError::LlmApiError {
                message: e.to_string(),
            })
        }
    })
    .await?;

    debug!(
        "{}: {} input tokens, {} output tokens, {:?}",
        label,
        response.prompt_tokens,
        response.completion_tokens,
        start.elapsed()
    );
    let mut prediction = predictor.parse(&response.content)?;
    prediction.input_tokens = response.prompt_tokens as usize;
    prediction.output_tokens = response.completion_tokens as usize;
    Ok(prediction)
}

/// Text sent as `page_text` for one page.
pub fn page_text(page: &PageContent) -> String {
    format!("\n\n--- PAGE {} CONTENT ---\n{}", page.page_number, page.text)
}

/// Run the page signature on one page.
///
/// Never returns an error: a page that cannot be rendered or answered is
/// reported through [`PageExtraction::error`] so the other pages go on.
pub async fn process_page(
    provider: &Arc<dyn LLMProvider>,
    page: &PageContent,
    config: &ExtractionConfig,
) -> PageExtraction {
    let start = Instant::now();
    let page_num = page.page_number;
    let text = page_text(page);
    let text_length = text.chars().count();

    let failed = |error: PageError| PageExtraction {
        page_number: page_num,
        success: false,
        extracted_data: serde_json::Value::Object(Default::default()),
        confidence: 0.0,
        text_length,
        error: Some(error),
        input_tokens: 0,
        output_tokens: 0,
        duration_ms: start.elapsed().as_millis() as u64,
    };

    let Some(ref img) = page.image else {
        return failed(PageError::RenderFailed {
            page: page_num,
            detail: "page has no rendered image".into(),
        });
    };
    let image_data = match encode::encode_page(img) {
        Ok(d) => d,
        Err(e) => {
            return failed(PageError::RenderFailed {
                page: page_num,
                detail: format!("Image encoding failed: {e}"),
            })
        }
    };

    let inputs = Inputs::new()
        .text("page_text", text)
        .image("page_image", image_data)
        .integer("page_number", page_num as i64);
    let predictor = Predictor::predict(page_extraction());
    let label = format!("Page {page_num}");

    match run_predictor(provider, &predictor, &inputs, config, &label).await {
        Ok(prediction) => {
            let parsed = parse_extracted_data(prediction.get(EXTRACTED_DATA).unwrap_or_default());
            PageExtraction {
                page_number: page_num,
                success: true,
                confidence: parsed.confidence(),
                extracted_data: parsed.value,
                text_length,
                error: None,
                input_tokens: prediction.input_tokens as u64,
                output_tokens: prediction.output_tokens as u64,
                duration_ms: start.elapsed().as_millis() as u64,
            }
        }
        Err(e) => failed(PageError::LlmFailed {
            page: page_num,
            retries: config.max_retries,
            detail: e.to_string(),
        }),
    }
}

/// `CompletionOptions` from the extraction config.
pub fn build_options(config: &ExtractionConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}
