//! One-call aggregate fetch of everything known about a file.
//!
//! Sub-resources are fetched one after another in a fixed order. Each one
//! either succeeds or is recorded as failed with empty data; none of them
//! can abort the others, so progress always reaches 100%.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::Result;
use crate::figma::api_types::{
    FigmaComment, FigmaComponent, FigmaFile, FigmaStyle, FigmaUser, FigmaVersion, StyleType,
};
use crate::service::{require_id, FigmaDataService};

pub const RECENT_VERSIONS: usize = 5;

const PAGE_NODE_TYPE: &str = "CANVAS";
const UNGROUPED_KIND: &str = "Other";

pub type ProgressCallback = Arc<dyn Fn(&FetchProgress) + Send + Sync>;

/// Completion flags, one per sub-resource. A flag is set once the fetch
/// finished, whether it succeeded or not, and is never cleared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchProgress {
    pub file_info: bool,
    pub user: bool,
    pub comments: bool,
    pub versions: bool,
    pub components: bool,
    pub styles: bool,
}

impl FetchProgress {
    pub const TOTAL: usize = 6;

    pub fn completed(&self) -> usize {
        [
            self.file_info,
            self.user,
            self.comments,
            self.versions,
            self.components,
            self.styles,
        ]
        .iter()
        .filter(|done| **done)
        .count()
    }

    pub fn percent(&self) -> u8 {
        (self.completed() * 100 / Self::TOTAL) as u8
    }

    pub fn is_complete(&self) -> bool {
        self.completed() == Self::TOTAL
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum SubResourceOutcome {
    Fetched,
    Failed(String),
}

impl SubResourceOutcome {
    pub fn is_fetched(&self) -> bool {
        matches!(self, SubResourceOutcome::Fetched)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchOutcomes {
    pub file: SubResourceOutcome,
    pub user: SubResourceOutcome,
    pub comments: SubResourceOutcome,
    pub versions: SubResourceOutcome,
    pub components: SubResourceOutcome,
    pub styles: SubResourceOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSummary {
    pub id: String,
    pub name: String,
    pub child_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CommentGroups {
    pub resolved: Vec<FigmaComment>,
    pub unresolved: Vec<FigmaComment>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VersionTimeline {
    /// Newest first.
    pub all: Vec<FigmaVersion>,
    pub recent: Vec<FigmaVersion>,
}

/// Derived, display-ready grouping of whatever data was obtained.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizedView {
    pub pages: Vec<PageSummary>,
    /// Keyed by the name prefix before the first `/` ("Button/Primary" → "Button").
    pub components_by_kind: BTreeMap<String, Vec<FigmaComponent>>,
    pub styles_by_type: BTreeMap<StyleType, Vec<FigmaStyle>>,
    pub comments: CommentGroups,
    pub versions: VersionTimeline,
}

impl OrganizedView {
    pub fn build(
        file: Option<&FigmaFile>,
        components: &[FigmaComponent],
        styles: &[FigmaStyle],
        comments: &[FigmaComment],
        versions: &[FigmaVersion],
    ) -> Self {
        let pages = file
            .map(|file| {
                file.document
                    .children
                    .iter()
                    .filter(|node| node.node_type == PAGE_NODE_TYPE)
                    .map(|page| PageSummary {
                        id: page.id.clone(),
                        name: page.name.clone(),
                        child_count: page.children.len(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let mut components_by_kind: BTreeMap<String, Vec<FigmaComponent>> = BTreeMap::new();
        for component in components {
            components_by_kind
                .entry(component_kind(&component.name))
                .or_default()
                .push(component.clone());
        }

        let mut styles_by_type: BTreeMap<StyleType, Vec<FigmaStyle>> = BTreeMap::new();
        for style in styles {
            styles_by_type
                .entry(style.style_type)
                .or_default()
                .push(style.clone());
        }

        let mut sorted_comments = comments.to_vec();
        sorted_comments.sort_by(|a, b| timestamp_key(&b.created_at).cmp(&timestamp_key(&a.created_at)));
        let (resolved, unresolved): (Vec<_>, Vec<_>) = sorted_comments
            .into_iter()
            .partition(|comment| comment.resolved_at.is_some());

        let mut all_versions = versions.to_vec();
        all_versions.sort_by(|a, b| timestamp_key(&b.created_at).cmp(&timestamp_key(&a.created_at)));
        let recent = all_versions.iter().take(RECENT_VERSIONS).cloned().collect();

        Self {
            pages,
            components_by_kind,
            styles_by_type,
            comments: CommentGroups {
                resolved,
                unresolved,
            },
            versions: VersionTimeline {
                all: all_versions,
                recent,
            },
        }
    }
}

/// Ordering key for the API's UTC timestamps: whole seconds, then the
/// fraction scaled to nanoseconds, so `..:00Z` sorts before `..:00.5Z`.
fn timestamp_key(raw: &str) -> (&str, u32) {
    let Some(seconds) = raw.get(..19) else {
        return (raw, 0);
    };
    let nanos = raw[19..]
        .strip_prefix('.')
        .map(|fraction| {
            let digits: String = fraction
                .chars()
                .take_while(char::is_ascii_digit)
                .take(9)
                .collect();
            format!("{digits:0<9}").parse().unwrap_or(0)
        })
        .unwrap_or(0);
    (seconds, nanos)
}

fn component_kind(name: &str) -> String {
    name.split_once('/')
        .map(|(prefix, _)| prefix.trim())
        .filter(|prefix| !prefix.is_empty())
        .unwrap_or(UNGROUPED_KIND)
        .to_string()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComprehensiveResult {
    pub file_id: String,
    pub file: Option<FigmaFile>,
    pub user: Option<FigmaUser>,
    pub comments: Vec<FigmaComment>,
    pub versions: Vec<FigmaVersion>,
    pub components: Vec<FigmaComponent>,
    pub styles: Vec<FigmaStyle>,
    pub outcomes: FetchOutcomes,
    pub progress: FetchProgress,
    pub organized: OrganizedView,
}

fn settle<T: Default>(resource: &str, outcome: Result<T>) -> (T, SubResourceOutcome) {
    match outcome {
        Ok(data) => (data, SubResourceOutcome::Fetched),
        Err(err) => {
            warn!(resource, error = %err, "sub-resource fetch failed");
            (T::default(), SubResourceOutcome::Failed(err.to_string()))
        }
    }
}

struct ProgressTracker {
    progress: FetchProgress,
    callback: Option<ProgressCallback>,
}

impl ProgressTracker {
    fn mark(&mut self, set: impl FnOnce(&mut FetchProgress)) {
        set(&mut self.progress);
        if let Some(callback) = &self.callback {
            callback(&self.progress);
        }
    }
}

impl FigmaDataService {
    /// Fetch file, user, comments, versions, components and styles for
    /// `file_id`, then build the organized view.
    ///
    /// Only a missing or malformed `file_id` is an error.
    pub async fn get_all_figma_data(
        &self,
        file_id: &str,
        on_progress: Option<ProgressCallback>,
    ) -> Result<ComprehensiveResult> {
        let file_id = require_id("file id", file_id)?;
        let mut tracker = ProgressTracker {
            progress: FetchProgress::default(),
            callback: on_progress,
        };

        let (file, file_outcome) = settle("file", self.fetch_file(file_id).await.map(Some));
        tracker.mark(|p| p.file_info = true);

        let (user, user_outcome) = settle("user", self.fetch_user().await.map(Some));
        tracker.mark(|p| p.user = true);

        let (comments, comments_outcome) = settle("comments", self.fetch_comments(file_id).await);
        tracker.mark(|p| p.comments = true);

        let (versions, versions_outcome) = settle("versions", self.fetch_versions(file_id).await);
        tracker.mark(|p| p.versions = true);

        let (components, components_outcome) =
            settle("components", self.fetch_file_components(file_id).await);
        tracker.mark(|p| p.components = true);

        let (styles, styles_outcome) = settle("styles", self.fetch_file_styles(file_id).await);
        tracker.mark(|p| p.styles = true);

        let organized =
            OrganizedView::build(file.as_ref(), &components, &styles, &comments, &versions);
        let outcomes = FetchOutcomes {
            file: file_outcome,
            user: user_outcome,
            comments: comments_outcome,
            versions: versions_outcome,
            components: components_outcome,
            styles: styles_outcome,
        };
        let failed = [
            &outcomes.file,
            &outcomes.user,
            &outcomes.comments,
            &outcomes.versions,
            &outcomes.components,
            &outcomes.styles,
        ]
        .iter()
        .filter(|o| !o.is_fetched())
        .count();
        info!(file_id, failed, "aggregate fetch finished");

        Ok(ComprehensiveResult {
            file_id: file_id.to_string(),
            file,
            user,
            comments,
            versions,
            components,
            styles,
            outcomes,
            progress: tracker.progress,
            organized,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ResponseCache;
    use crate::error::BridgeError;
    use crate::figma::FigmaAuth;
    use crate::mock_data;
    use crate::service::ServiceConfig;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount(server: &MockServer, route: &str, status: u16, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(server)
            .await;
    }

    fn service(api: &MockServer) -> FigmaDataService {
        let config = ServiceConfig {
            api_base_url: api.uri(),
            request_timeout: Duration::from_secs(5),
            ..ServiceConfig::direct(Some(FigmaAuth::PersonalAccessToken("tok".into())))
        };
        FigmaDataService::new(config, Arc::new(ResponseCache::default())).expect("service")
    }

    fn versions_json(count: usize) -> serde_json::Value {
        let versions: Vec<_> = (1..=count)
            .map(|i| json!({"id": format!("v{i}"), "created_at": format!("2024-01-{i:02}T00:00:00Z")}))
            .collect();
        json!({ "versions": versions })
    }

    #[tokio::test]
    async fn failed_comments_do_not_abort_the_aggregate() {
        let api = MockServer::start().await;
        mount(
            &api,
            "/v1/files/F",
            200,
            json!({
                "name": "Library",
                "document": {"id": "0:0", "type": "DOCUMENT", "children": [
                    {"id": "0:1", "name": "Cover", "type": "CANVAS", "children": [
                        {"id": "1:1", "name": "Hero", "type": "FRAME"}
                    ]},
                    {"id": "0:2", "name": "Components", "type": "CANVAS"}
                ]}
            }),
        )
        .await;
        mount(&api, "/v1/me", 200, json!({"id": "u1", "handle": "ann"})).await;
        mount(&api, "/v1/files/F/comments", 500, json!({"err": "upstream down"})).await;
        mount(&api, "/v1/files/F/versions", 200, versions_json(7)).await;
        mount(
            &api,
            "/v1/files/F/components",
            200,
            json!({"meta": {"components": [
                {"key": "c1", "name": "Button/Primary"},
                {"key": "c2", "name": "Button/Ghost"},
                {"key": "c3", "name": "Divider"}
            ]}}),
        )
        .await;
        mount(
            &api,
            "/v1/files/F/styles",
            200,
            json!({"meta": {"styles": [
                {"key": "s1", "name": "Brand", "style_type": "FILL"},
                {"key": "s2", "name": "Body", "style_type": "TEXT"}
            ]}}),
        )
        .await;

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: ProgressCallback = Arc::new(move |p: &FetchProgress| {
            sink.lock().unwrap().push(p.percent());
        });

        let result = service(&api)
            .get_all_figma_data("F", Some(callback))
            .await
            .expect("aggregate never fails on sub-resource errors");

        assert!(result.progress.is_complete());
        assert!(result.comments.is_empty());
        assert!(matches!(
            &result.outcomes.comments,
            SubResourceOutcome::Failed(reason) if reason.contains("upstream down")
        ));
        assert!(result.outcomes.file.is_fetched());
        assert!(result.outcomes.styles.is_fetched());

        let percents = seen.lock().unwrap().clone();
        assert_eq!(percents.len(), FetchProgress::TOTAL);
        assert!(percents.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(percents.last(), Some(&100));

        let organized = &result.organized;
        assert_eq!(organized.pages.len(), 2);
        assert_eq!(organized.pages[0].child_count, 1);
        assert_eq!(organized.components_by_kind["Button"].len(), 2);
        assert_eq!(organized.components_by_kind["Other"].len(), 1);
        assert_eq!(organized.styles_by_type[&StyleType::Text].len(), 1);
        assert_eq!(organized.versions.all.len(), 7);
        assert_eq!(organized.versions.recent.len(), RECENT_VERSIONS);
        assert_eq!(organized.versions.recent[0].id, "v7");
    }

    #[tokio::test]
    async fn everything_failing_still_completes() {
        let api = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&api)
            .await;

        let result = service(&api)
            .get_all_figma_data("F", None)
            .await
            .expect("aggregate");

        assert!(result.progress.is_complete());
        assert!(result.file.is_none());
        assert!(result.user.is_none());
        assert_eq!(result.organized, OrganizedView::default());
    }

    #[tokio::test]
    async fn empty_file_id_fails_fast() {
        let api = MockServer::start().await;
        let err = service(&api).get_all_figma_data("", None).await.unwrap_err();
        assert!(matches!(err, BridgeError::Validation(_)));
    }

    #[test]
    fn comments_split_by_resolution_newest_first() {
        let view = OrganizedView::build(None, &[], &[], &mock_data::comments(), &[]);

        assert_eq!(view.comments.resolved.len(), 1);
        assert_eq!(view.comments.unresolved.len(), 1);

        let mut comments = mock_data::comments();
        comments.iter_mut().for_each(|c| c.resolved_at = None);
        let view = OrganizedView::build(None, &[], &[], &comments, &[]);
        assert!(view.comments.unresolved[0].created_at > view.comments.unresolved[1].created_at);
    }

    #[test]
    fn fractional_seconds_order_after_whole_seconds() {
        let versions: Vec<FigmaVersion> = serde_json::from_value(json!([
            {"id": "whole", "created_at": "2024-01-01T00:00:00Z"},
            {"id": "half", "created_at": "2024-01-01T00:00:00.5Z"},
            {"id": "earlier", "created_at": "2023-12-31T23:59:59.999Z"}
        ]))
        .expect("versions");

        let view = OrganizedView::build(None, &[], &[], &[], &versions);
        let order: Vec<&str> = view.versions.all.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(order, ["half", "whole", "earlier"]);
    }

    #[test]
    fn progress_percent_rounds_down() {
        let progress = FetchProgress {
            file_info: true,
            ..FetchProgress::default()
        };
        assert_eq!(progress.percent(), 16);
        assert!(!progress.is_complete());
    }
}
