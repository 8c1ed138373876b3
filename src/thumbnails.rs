//! Batched thumbnail fetching with per-item failure tracking.
//!
//! Image rendering on Figma's side is flaky and rate limited for large node
//! sets, so ids are validated up front, sent in bounded batches one batch at
//! a time, and ids that come back without a URL are retried as a group with
//! linear backoff. A batch whose request fails outright (timeout, dropped
//! connection, 429/5xx) is retried one id at a time. Nothing here returns an
//! error for a partial failure: every requested id ends up either in
//! [`ThumbnailResult::images`] or in [`ThumbnailResult::errors`].

use async_trait::async_trait;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{BridgeError, Result};
use crate::figma::api_types::{FigmaImageResponse, ImageFormat};
use crate::figma::node_id::validate_node_ids;

pub const DEFAULT_BATCH_SIZE: usize = 20;
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// The single image-export call the fetcher is built on.
#[async_trait]
pub trait ImageExporter: Send + Sync {
    async fn export_images(
        &self,
        file_id: &str,
        node_ids: &[String],
        format: ImageFormat,
        scale: f32,
        timeout: Duration,
    ) -> Result<FigmaImageResponse>;
}

#[derive(Debug, Clone)]
pub struct ThumbnailOptions {
    pub format: ImageFormat,
    pub scale: f32,
    pub batch_size: usize,
    /// Extra rounds for ids missing from a batch response.
    pub max_retries: u32,
    /// Round `n` waits `retry_base_delay * n`.
    pub retry_base_delay: Duration,
    /// Spacing between per-id requests in the fallback path.
    pub individual_delay: Duration,
    pub batch_timeout: Duration,
    pub individual_timeout: Duration,
}

impl Default for ThumbnailOptions {
    fn default() -> Self {
        Self {
            format: ImageFormat::Png,
            scale: 1.0,
            batch_size: DEFAULT_BATCH_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay: Duration::from_millis(1000),
            individual_delay: Duration::from_millis(100),
            batch_timeout: Duration::from_secs(20),
            individual_timeout: Duration::from_secs(10),
        }
    }
}

impl ThumbnailOptions {
    fn validate(&self) -> Result<()> {
        if !(self.scale > 0.0 && self.scale <= 4.0) {
            return Err(BridgeError::validation(format!(
                "image scale must be in (0, 4], got {}",
                self.scale
            )));
        }
        if self.batch_size == 0 {
            return Err(BridgeError::validation("batch size must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ThumbnailResult {
    pub images: BTreeMap<String, String>,
    pub errors: BTreeMap<String, String>,
    /// Ids that needed at least one retry, whatever the outcome.
    pub retried: BTreeSet<String>,
}

impl ThumbnailResult {
    fn succeed(&mut self, id: &str, url: &str) {
        self.errors.remove(id);
        self.images.insert(id.to_string(), url.to_string());
    }

    fn fail(&mut self, id: &str, reason: impl Into<String>) {
        if !self.images.contains_key(id) {
            self.errors.insert(id.to_string(), reason.into());
        }
    }

    pub fn is_complete_success(&self) -> bool {
        self.errors.is_empty()
    }
}

pub struct ThumbnailFetcher<'a, E: ImageExporter + ?Sized> {
    exporter: &'a E,
    options: ThumbnailOptions,
}

impl<'a, E: ImageExporter + ?Sized> ThumbnailFetcher<'a, E> {
    pub fn new(exporter: &'a E, options: ThumbnailOptions) -> Self {
        Self { exporter, options }
    }

    pub fn options(&self) -> &ThumbnailOptions {
        &self.options
    }

    /// Fetch image URLs for `node_ids`.
    ///
    /// Only a missing file id or unusable options are errors; everything
    /// that goes wrong per id is reported in the result.
    pub async fn fetch<S: AsRef<str>>(
        &self,
        file_id: &str,
        node_ids: &[S],
    ) -> Result<ThumbnailResult> {
        if file_id.trim().is_empty() {
            return Err(BridgeError::validation(
                "file id is required to fetch thumbnails",
            ));
        }
        self.options.validate()?;

        let (valid, invalid) = validate_node_ids(node_ids);
        let mut result = ThumbnailResult::default();
        for bad in invalid {
            result.errors.insert(bad.id, bad.reason);
        }
        if valid.is_empty() {
            return Ok(result);
        }

        let total_batches = valid.len().div_ceil(self.options.batch_size);
        for (index, batch) in valid.chunks(self.options.batch_size).enumerate() {
            debug!(
                batch = index + 1,
                total_batches,
                size = batch.len(),
                "fetching thumbnail batch"
            );
            self.process_batch(file_id, batch, &mut result).await;
        }

        info!(
            succeeded = result.images.len(),
            failed = result.errors.len(),
            retried = result.retried.len(),
            "thumbnail fetch finished"
        );
        Ok(result)
    }

    async fn export(
        &self,
        file_id: &str,
        ids: &[String],
        timeout: Duration,
    ) -> Result<FigmaImageResponse> {
        self.exporter
            .export_images(file_id, ids, self.options.format, self.options.scale, timeout)
            .await
    }

    async fn process_batch(&self, file_id: &str, batch: &[String], result: &mut ThumbnailResult) {
        match self.export(file_id, batch, self.options.batch_timeout).await {
            Ok(response) => {
                if let Some(api_error) = response.err.as_deref().filter(|e| !e.is_empty()) {
                    warn!(error = api_error, size = batch.len(), "image export rejected batch");
                    for id in batch {
                        result.fail(id, api_error);
                    }
                    return;
                }

                let mut missing = Vec::new();
                for id in batch {
                    match response.url_for(id) {
                        Some(url) => result.succeed(id, url),
                        None => missing.push(id.clone()),
                    }
                }
                if !missing.is_empty() {
                    debug!(missing = missing.len(), "batch returned without some images");
                    self.retry_missing(file_id, missing, result).await;
                }
            }
            Err(err) if err.is_retryable() && self.options.max_retries > 0 => {
                warn!(error = %err, "batch export failed; retrying ids individually");
                self.fetch_individually(file_id, batch, result).await;
            }
            Err(err) => {
                let reason = format!("Batch request failed: {err}");
                for id in batch {
                    result.fail(id, reason.clone());
                }
            }
        }
    }

    async fn retry_missing(
        &self,
        file_id: &str,
        mut pending: Vec<String>,
        result: &mut ThumbnailResult,
    ) {
        let mut last_error: Option<String> = None;

        for round in 1..=self.options.max_retries {
            if pending.is_empty() {
                break;
            }
            for id in &pending {
                result.retried.insert(id.clone());
            }
            tokio::time::sleep(self.options.retry_base_delay * round).await;

            match self.export(file_id, &pending, self.options.batch_timeout).await {
                Ok(response) => match response.err.as_deref().filter(|e| !e.is_empty()) {
                    Some(api_error) => last_error = Some(api_error.to_string()),
                    None => pending.retain(|id| match response.url_for(id) {
                        Some(url) => {
                            result.succeed(id, url);
                            false
                        }
                        None => true,
                    }),
                },
                Err(err) => last_error = Some(err.to_string()),
            }
        }

        let attempts = self.options.max_retries + 1;
        for id in pending {
            let reason = match &last_error {
                Some(detail) => {
                    format!("Failed to generate image after {attempts} attempts: {detail}")
                }
                None => format!("Failed to generate image after {attempts} attempts"),
            };
            result.fail(&id, reason);
        }
    }

    async fn fetch_individually(
        &self,
        file_id: &str,
        batch: &[String],
        result: &mut ThumbnailResult,
    ) {
        for (index, id) in batch.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.options.individual_delay).await;
            }
            result.retried.insert(id.clone());

            let single = std::slice::from_ref(id);
            match self
                .export(file_id, single, self.options.individual_timeout)
                .await
            {
                Ok(response) => match (response.url_for(id), response.err.as_deref()) {
                    (Some(url), _) => result.succeed(id, url),
                    (None, Some(api_error)) if !api_error.is_empty() => result.fail(id, api_error),
                    (None, _) => result.fail(id, "No image URL returned for node"),
                },
                Err(err) => result.fail(id, format!("Individual request failed: {err}")),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    type Handler = dyn Fn(usize, &[String]) -> Result<FigmaImageResponse> + Send + Sync;

    struct FakeExporter {
        handler: Box<Handler>,
        calls: Mutex<Vec<Vec<String>>>,
    }

    impl FakeExporter {
        fn new(
            handler: impl Fn(usize, &[String]) -> Result<FigmaImageResponse> + Send + Sync + 'static,
        ) -> Self {
            Self {
                handler: Box::new(handler),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<Vec<String>> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ImageExporter for FakeExporter {
        async fn export_images(
            &self,
            _file_id: &str,
            node_ids: &[String],
            _format: ImageFormat,
            _scale: f32,
            _timeout: Duration,
        ) -> Result<FigmaImageResponse> {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(node_ids.to_vec());
                calls.len() - 1
            };
            (self.handler)(call, node_ids)
        }
    }

    fn urls_for<'a>(ids: impl IntoIterator<Item = &'a String>) -> FigmaImageResponse {
        FigmaImageResponse {
            images: ids
                .into_iter()
                .map(|id| (id.clone(), Some(format!("https://img/{id}"))))
                .collect::<HashMap<_, _>>(),
            err: None,
        }
    }

    fn ids(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("{i}:{i}")).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn missing_ids_are_retried_once_and_recovered() {
        let all = ids(20);
        let flaky: Vec<String> = vec!["7:7".into(), "13:13".into()];
        let flaky_for_handler = flaky.clone();
        let exporter = FakeExporter::new(move |call, requested| {
            if call == 0 {
                Ok(urls_for(
                    requested.iter().filter(|id| !flaky_for_handler.contains(id)),
                ))
            } else {
                Ok(urls_for(requested))
            }
        });

        let result = ThumbnailFetcher::new(&exporter, ThumbnailOptions::default())
            .fetch("FILE", &all)
            .await
            .expect("fetch");

        assert_eq!(result.images.len(), 20);
        assert!(result.errors.is_empty());
        assert_eq!(result.retried, flaky.iter().cloned().collect::<BTreeSet<_>>());
        assert_eq!(exporter.calls()[1], flaky);
    }

    #[tokio::test(start_paused = true)]
    async fn every_distinct_input_lands_in_exactly_one_map() {
        let input: Vec<String> = ["1:1", "bad-id", "1:1", "2:2", "3:3", "bad-id", ""]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let exporter = FakeExporter::new(|_, requested| {
            Ok(urls_for(requested.iter().filter(|id| id.as_str() != "3:3")))
        });

        let result = ThumbnailFetcher::new(&exporter, ThumbnailOptions::default())
            .fetch("FILE", &input)
            .await
            .expect("fetch");

        let distinct: BTreeSet<String> = input.iter().cloned().collect();
        let covered: BTreeSet<String> = result
            .images
            .keys()
            .chain(result.errors.keys())
            .cloned()
            .collect();
        assert_eq!(covered, distinct);
        assert!(result.images.keys().all(|id| !result.errors.contains_key(id)));

        assert_eq!(result.errors["bad-id"], "Invalid node ID format: bad-id");
        assert_eq!(
            result.errors["3:3"],
            "Failed to generate image after 3 attempts"
        );
        assert_eq!(result.retried, BTreeSet::from(["3:3".to_string()]));
        // invalid ids never reach the exporter
        assert!(exporter
            .calls()
            .iter()
            .flatten()
            .all(|id| id != "bad-id" && !id.is_empty()));
    }

    #[tokio::test(start_paused = true)]
    async fn retry_rounds_back_off_linearly() {
        let exporter = FakeExporter::new(|_, _| Ok(FigmaImageResponse::default()));
        let started = tokio::time::Instant::now();

        let result = ThumbnailFetcher::new(&exporter, ThumbnailOptions::default())
            .fetch("FILE", &["1:2"])
            .await
            .expect("fetch");

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(3000), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(3100), "{elapsed:?}");
        assert_eq!(exporter.calls().len(), 3);
        assert!(result.errors.contains_key("1:2"));
    }

    #[tokio::test(start_paused = true)]
    async fn structured_batch_error_fails_batch_without_retry() {
        let exporter = FakeExporter::new(|_, _| {
            Ok(FigmaImageResponse {
                images: HashMap::new(),
                err: Some("Render timeout".into()),
            })
        });

        let result = ThumbnailFetcher::new(&exporter, ThumbnailOptions::default())
            .fetch("FILE", &ids(3))
            .await
            .expect("fetch");

        assert_eq!(exporter.calls().len(), 1);
        assert_eq!(result.errors.len(), 3);
        assert!(result.errors.values().all(|e| e == "Render timeout"));
        assert!(result.retried.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn retryable_batch_failure_falls_back_to_single_requests() {
        let exporter = FakeExporter::new(|call, requested| {
            if call == 0 {
                return Err(BridgeError::Network {
                    message: "operation timed out".into(),
                    timed_out: true,
                });
            }
            if requested == ["2:2"] {
                return Err(BridgeError::from_status(
                    reqwest::StatusCode::BAD_REQUEST,
                    "poison node",
                ));
            }
            Ok(urls_for(requested))
        });

        let result = ThumbnailFetcher::new(&exporter, ThumbnailOptions::default())
            .fetch("FILE", &ids(3))
            .await
            .expect("fetch");

        let calls = exporter.calls();
        assert_eq!(calls.len(), 4);
        assert!(calls[1..].iter().all(|c| c.len() == 1));
        assert_eq!(result.images.len(), 2);
        assert!(result.errors["2:2"].starts_with("Individual request failed"));
        assert_eq!(result.retried.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_batch_failure_fails_whole_batch() {
        let exporter = FakeExporter::new(|_, _| {
            Err(BridgeError::from_status(
                reqwest::StatusCode::FORBIDDEN,
                "no access",
            ))
        });

        let result = ThumbnailFetcher::new(&exporter, ThumbnailOptions::default())
            .fetch("FILE", &ids(2))
            .await
            .expect("fetch");

        assert_eq!(exporter.calls().len(), 1);
        assert!(result
            .errors
            .values()
            .all(|e| e.starts_with("Batch request failed") && e.contains("no access")));
    }

    #[tokio::test(start_paused = true)]
    async fn ids_are_split_into_bounded_batches() {
        let exporter = FakeExporter::new(|_, requested| Ok(urls_for(requested)));

        let result = ThumbnailFetcher::new(&exporter, ThumbnailOptions::default())
            .fetch("FILE", &ids(45))
            .await
            .expect("fetch");

        let sizes: Vec<usize> = exporter.calls().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![20, 20, 5]);
        assert_eq!(result.images.len(), 45);
        assert!(result.is_complete_success());
    }

    #[tokio::test]
    async fn only_invalid_ids_never_touch_the_network() {
        let exporter = FakeExporter::new(|_, requested| Ok(urls_for(requested)));

        let result = ThumbnailFetcher::new(&exporter, ThumbnailOptions::default())
            .fetch("FILE", &["nope", "also nope"])
            .await
            .expect("fetch");

        assert!(exporter.calls().is_empty());
        assert_eq!(result.errors.len(), 2);
    }

    #[tokio::test]
    async fn missing_file_id_is_a_validation_error() {
        let exporter = FakeExporter::new(|_, requested| Ok(urls_for(requested)));
        let fetcher = ThumbnailFetcher::new(&exporter, ThumbnailOptions::default());

        assert!(matches!(
            fetcher.fetch(" ", &["1:2"]).await,
            Err(BridgeError::Validation(_))
        ));

        let bad_scale = ThumbnailOptions {
            scale: 0.0,
            ..ThumbnailOptions::default()
        };
        assert!(matches!(
            ThumbnailFetcher::new(&exporter, bad_scale)
                .fetch("FILE", &["1:2"])
                .await,
            Err(BridgeError::Validation(_))
        ));
    }
}
