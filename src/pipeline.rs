//! End-to-end comparison: fetch design components and capture the page
//! concurrently, then match, analyze and aggregate.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use futures::StreamExt;
use serde::Deserialize;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::analysis::DeviationAnalyzer;
use crate::browser::{with_session, AuthConfig, BrowserDriver, SessionOptions};
use crate::config::Config;
use crate::context::OperationContext;
use crate::error::{Result, SpcError};
use crate::extract::{Extraction, WebExtractor};
use crate::matching::{match_pairs, MatchingEngine};
use crate::report::build_report;
use crate::source::DesignSource;
use crate::types::{
    ComparisonReport, ComparisonResult, ComponentRecord, ExtractedElement, ReportMetadata,
};

/// One design-vs-page comparison.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonRequest {
    #[serde(alias = "source_ref")]
    pub source_ref: String,
    #[serde(default, alias = "node_ref")]
    pub node_ref: Option<String>,
    #[serde(alias = "target_url", alias = "url")]
    pub target_url: String,
    #[serde(default)]
    pub selector: Option<String>,
    #[serde(default)]
    pub auth: Option<AuthConfig>,
}

impl ComparisonRequest {
    pub fn new(source_ref: impl Into<String>, target_url: impl Into<String>) -> Self {
        Self {
            source_ref: source_ref.into(),
            node_ref: None,
            target_url: target_url.into(),
            selector: None,
            auth: None,
        }
    }
}

struct PageCapture {
    extraction: Extraction,
    auth_warning: Option<String>,
}

/// Run one comparison. Every fetched component appears exactly once in the
/// report, matched or not.
pub async fn run_comparison(
    request: &ComparisonRequest,
    source: &dyn DesignSource,
    driver: Arc<dyn BrowserDriver>,
    config: &Config,
    ctx: &OperationContext,
) -> Result<ComparisonReport> {
    let started = Instant::now();
    let started_at_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64;
    let target = Url::parse(&request.target_url)?;
    ctx.check("comparison")?;
    info!(source = %request.source_ref, url = %target, "starting comparison");

    let fetch = async {
        let components = source
            .fetch_components(&request.source_ref, request.node_ref.as_deref())
            .await?;
        Ok::<_, SpcError>(dedupe_components(components))
    };
    let capture = capture_page(request, target.as_str(), driver, config, ctx);
    let (components, capture) = futures::future::try_join(fetch, capture).await?;

    let elements = &capture.extraction.elements;
    let results = compare_records(&components, elements, config);

    let metadata = ReportMetadata {
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
        source_ref: request.source_ref.clone(),
        node_ref: request.node_ref.clone(),
        target_url: request.target_url.clone(),
        page_url: capture.extraction.page_url.clone(),
        page_title: capture.extraction.page_title.clone(),
        selector: request.selector.clone(),
        started_at_ms,
        elapsed_ms: started.elapsed().as_millis() as u64,
        auth_warning: capture.auth_warning,
        truncation: capture.extraction.truncation,
        matching_mode: MatchingEngine::from_settings(&config.matching).mode(),
        component_count: components.len(),
        element_count: elements.len(),
        skipped_elements: capture.extraction.skipped,
    };
    let report = build_report(metadata, results);
    info!(
        components = report.summary.total_components,
        deviations = report.summary.total_deviations,
        high = report.summary.by_severity.high,
        no_match = report.summary.by_status.no_match,
        elapsed_ms = report.metadata.elapsed_ms,
        "comparison complete"
    );
    Ok(report)
}

async fn capture_page(
    request: &ComparisonRequest,
    url: &str,
    driver: Arc<dyn BrowserDriver>,
    config: &Config,
    ctx: &OperationContext,
) -> Result<PageCapture> {
    let extractor = WebExtractor::new(config.extraction.max_elements);
    let url = url.to_string();
    let auth = request.auth.clone();
    let selector = request.selector.clone();
    let ctx = ctx.clone();

    with_session(driver, SessionOptions::from_config(config), move |session| {
        Box::pin(async move {
            let mut auth_warning = None;
            if let Some(auth) = &auth {
                auth_warning = session.authenticate(auth, &ctx).await?.warning;
            }
            session.navigate(&url, &ctx).await?;
            let extraction = extractor
                .extract(session, selector.as_deref(), &ctx)
                .await?;
            if let Some(degraded) = session.take_auth_warning() {
                auth_warning = Some(match auth_warning {
                    Some(earlier) => format!("{earlier}; {degraded}"),
                    None => degraded,
                });
            }
            Ok(PageCapture {
                extraction,
                auth_warning,
            })
        })
    })
    .await
}

/// Match and analyze already-fetched inputs. One result per component, in
/// component order.
pub fn compare_records(
    components: &[ComponentRecord],
    elements: &[ExtractedElement],
    config: &Config,
) -> Vec<ComparisonResult> {
    let engine = MatchingEngine::from_settings(&config.matching);
    let analyzer = DeviationAnalyzer::from_config(config);
    let matches = engine.match_components(components, elements);

    let results: Vec<ComparisonResult> = components
        .iter()
        .zip(&matches)
        .map(|(component, m)| match m.element.and_then(|i| elements.get(i)) {
            Some(element) => analyzer.analyze(component, element, m.score),
            None => analyzer.unmatched(component, m),
        })
        .collect();
    let pairs = match_pairs(components, elements, &matches);
    for pair in &pairs {
        trace!(
            component = %pair.component_id,
            selector = %pair.selector,
            score = pair.score,
            "component matched"
        );
    }
    debug!(
        components = components.len(),
        elements = elements.len(),
        matched = pairs.len(),
        "records compared"
    );
    results
}

/// Keep the first record per id.
fn dedupe_components(components: Vec<ComponentRecord>) -> Vec<ComponentRecord> {
    let mut seen = HashSet::new();
    let before = components.len();
    let unique: Vec<ComponentRecord> = components
        .into_iter()
        .filter(|c| seen.insert(c.id.clone()))
        .collect();
    if unique.len() < before {
        warn!(
            dropped = before - unique.len(),
            "duplicate component ids in design source; keeping first occurrence"
        );
    }
    unique
}

/// Outcome of one request in a batch.
#[derive(Debug)]
pub struct BatchItem {
    pub request: ComparisonRequest,
    pub outcome: Result<ComparisonReport>,
}

/// Run several comparisons with at most `browser.max_concurrent_sessions`
/// sessions alive at once. A failed item does not stop the others; results
/// come back in request order.
pub async fn run_batch(
    requests: Vec<ComparisonRequest>,
    source: &dyn DesignSource,
    driver: Arc<dyn BrowserDriver>,
    config: &Config,
    ctx: &OperationContext,
) -> Vec<BatchItem> {
    let limit = config.browser.max_concurrent_sessions.max(1);
    info!(items = requests.len(), limit, "starting batch");

    let items: Vec<BatchItem> = futures::stream::iter(requests.into_iter().map(|request| {
        let driver = Arc::clone(&driver);
        async move {
            let outcome = run_comparison(&request, source, driver, config, ctx).await;
            if let Err(err) = &outcome {
                warn!(url = %request.target_url, error = %err, "batch item failed");
            }
            BatchItem { request, outcome }
        }
    }))
    .buffered(limit)
    .collect()
    .await;

    let failed = items.iter().filter(|i| i.outcome.is_err()).count();
    info!(items = items.len(), failed, "batch complete");
    items
}
