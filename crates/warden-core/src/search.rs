//! Search routing: policy and permission gates, manual intake, and
//! privacy-aware search auditing.
//!
//! Concrete provider adapters live outside the core; this module owns the
//! gate sequence, the manual fallback, and the `search.execute` audit
//! contract.

use crate::audit::{AuditWriter, hash_text};
use crate::error::CoreError;
use crate::guard::PolicyGuard;
use crate::identity::IdentityService;
use crate::limits::{RateLimiter, RunLimiter};
use crate::runlog::RunLogger;
use async_trait::async_trait;
use log::warn;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;
use warden_protocol::{Permission, SearchResponse, SearchResult, SearchStatus, events};

/// Provider name used for manual intake.
pub const MANUAL_PROVIDER: &str = "manual";
/// Instructions surfaced when manual intake is required.
pub const MANUAL_INSTRUCTIONS: &str =
    "Paste JSON array of {title,url,snippet} or newline URLs with optional snippet text.";

/// User-pasted search results, either structured or as text lines.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ManualSearchInput {
    /// Structured results, used when non-empty.
    #[serde(default)]
    pub json_results: Option<Vec<SearchResult>>,
    /// Text lines: bare URLs or `Title|url|snippet` rows.
    #[serde(default)]
    pub pasted_lines: Option<String>,
}

/// Parse manual intake into results. Lines that are neither URLs nor valid
/// `Title|url|snippet` rows are skipped; nothing parseable is a validation
/// error.
pub fn parse_manual_results(input: &ManualSearchInput) -> Result<Vec<SearchResult>, CoreError> {
    if let Some(results) = &input.json_results
        && !results.is_empty()
    {
        return Ok(results.clone());
    }

    let mut results = Vec::new();
    for line in input.pasted_lines.as_deref().unwrap_or("").lines() {
        let row = line.trim();
        if row.is_empty() {
            continue;
        }
        if is_url(row) {
            results.push(SearchResult {
                title: row.to_string(),
                url: row.to_string(),
                snippet: String::new(),
            });
            continue;
        }
        if row.contains('|') {
            let parts: Vec<&str> = row.split('|').map(str::trim).collect();
            if parts.len() >= 2 && is_url(parts[1]) {
                results.push(SearchResult {
                    title: parts[0].to_string(),
                    url: parts[1].to_string(),
                    snippet: parts.get(2).copied().unwrap_or("").to_string(),
                });
            }
        }
    }
    if results.is_empty() {
        return Err(CoreError::Validation(
            "Invalid manual input. Provide JSON list or URL lines.".to_string(),
        ));
    }
    Ok(results)
}

fn is_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// External search provider interface.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Provider name used in audit payloads.
    fn name(&self) -> &str;
    /// Run a query. Transient failures surface as [`CoreError::Transient`].
    async fn search(
        &self,
        query: &str,
        num_results: usize,
        safe: bool,
    ) -> Result<Vec<SearchResult>, CoreError>;
}

/// One search request through the router.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// Query text.
    pub query: String,
    /// Desired result count.
    pub num_results: usize,
    /// Whether provider-side safe search is requested.
    pub safe: bool,
    /// Requesting session.
    pub session_id: String,
    /// Whether safe mode applies to the permission check.
    pub safe_mode: bool,
    /// Manual intake, short-circuiting providers when present.
    pub manual: Option<ManualSearchInput>,
    /// Open run to mirror the audit event into.
    pub run_id: Option<Uuid>,
}

/// Routes search requests through the guard chain and provider fallbacks.
#[derive(Clone)]
pub struct SearchRouter {
    guard: PolicyGuard,
    audit: AuditWriter,
    runlog: RunLogger,
    identity: IdentityService,
    rate: Arc<RateLimiter>,
    providers: Vec<Arc<dyn SearchProvider>>,
}

impl SearchRouter {
    /// Router without providers; every non-manual query falls back to
    /// manual intake.
    pub fn new(
        guard: PolicyGuard,
        audit: AuditWriter,
        runlog: RunLogger,
        identity: IdentityService,
        rate: Arc<RateLimiter>,
    ) -> Self {
        Self {
            guard,
            audit,
            runlog,
            identity,
            rate,
            providers: Vec::new(),
        }
    }

    /// Attach provider adapters in fallback order.
    pub fn with_providers(mut self, providers: Vec<Arc<dyn SearchProvider>>) -> Self {
        self.providers = providers;
        self
    }

    /// Run one search through policy, workspace, permission, and limit
    /// gates, then providers in order, falling back to manual intake.
    pub async fn search(
        &self,
        request: &SearchRequest,
        limiter: Option<&mut RunLimiter>,
    ) -> Result<SearchResponse, CoreError> {
        let policy = self.guard.policy_allows_action("web.search", false)?;
        if !policy.allowed {
            self.audit.log_event(
                events::POLICY_DENIED,
                "Policy denied web.search",
                json!({"tool": "web.search", "reason": policy.reason}),
                Some(&request.session_id),
            )?;
            return Err(CoreError::denied("policy", policy.reason));
        }

        let workspace = self.guard.is_tool_allowed_in_workspace("web.search")?;
        if !workspace.allowed {
            self.audit.log_event(
                events::WORKSPACE_DENIED,
                "Workspace denied web.search",
                json!({"tool": "web.search"}),
                Some(&request.session_id),
            )?;
            return Err(CoreError::denied(
                "workspace",
                "Web search not allowed by workspace",
            ));
        }

        let permission = self.guard.assert_allowed(
            Permission::WebSearch,
            &request.session_id,
            None,
            request.safe_mode,
        )?;
        if !permission.allowed {
            return Err(CoreError::denied(
                Permission::WebSearch.as_str(),
                permission.reason,
            ));
        }

        if let Some(limiter) = limiter {
            if let Err(err) = self.enforce_limits(limiter, &request.session_id) {
                if matches!(err, CoreError::Limit(_)) {
                    self.audit.log_event(
                        events::LIMIT_BLOCKED,
                        "Web search blocked by limits",
                        json!({"tool": "web.search", "reason": err.to_string()}),
                        Some(&request.session_id),
                    )?;
                }
                return Err(err);
            }
        }

        let query_hash = hash_text(&request.query);
        if let Some(manual) = &request.manual {
            let results = parse_manual_results(manual)?;
            self.log_search(request, &query_hash, MANUAL_PROVIDER, results.len(), true)?;
            return Ok(SearchResponse {
                status: SearchStatus::Ok,
                provider: MANUAL_PROVIDER.to_string(),
                results,
                detail: "manual input accepted".to_string(),
                manual_instructions: None,
            });
        }

        for provider in &self.providers {
            match provider
                .search(&request.query, request.num_results, request.safe)
                .await
            {
                Ok(results) if !results.is_empty() => {
                    self.log_search(request, &query_hash, provider.name(), results.len(), true)?;
                    return Ok(SearchResponse {
                        status: SearchStatus::Ok,
                        provider: provider.name().to_string(),
                        results,
                        detail: "ok".to_string(),
                        manual_instructions: None,
                    });
                }
                Ok(_) => continue,
                Err(err) => {
                    warn!("search provider failed (provider={}): {err}", provider.name());
                    continue;
                }
            }
        }

        self.log_search(request, &query_hash, MANUAL_PROVIDER, 0, false)?;
        Ok(SearchResponse {
            status: SearchStatus::ManualRequired,
            provider: MANUAL_PROVIDER.to_string(),
            results: Vec::new(),
            detail: "Manual input required.".to_string(),
            manual_instructions: Some(MANUAL_INSTRUCTIONS.to_string()),
        })
    }

    fn enforce_limits(&self, limiter: &mut RunLimiter, session_id: &str) -> Result<(), CoreError> {
        limiter.check_runtime()?;
        limiter.check_tool_call()?;
        self.rate
            .enforce(session_id, limiter.max_tool_calls_per_minute())?;
        limiter.record_tool_call();
        Ok(())
    }

    fn log_search(
        &self,
        request: &SearchRequest,
        query_hash: &str,
        provider: &str,
        num_results: usize,
        success: bool,
    ) -> Result<(), CoreError> {
        let settings = self.identity.effective_settings()?;
        let mut payload = json!({
            "provider": provider,
            "query_hash": query_hash,
            "num_results": num_results,
            "success": success,
        });
        if !settings.privacy_mode && settings.allow_query_text_logging {
            payload["query"] = json!(request.query);
        }
        self.audit.log_event(
            events::SEARCH_EXECUTE,
            &format!("Search via {provider}"),
            payload.clone(),
            Some(&request.session_id),
        )?;
        if let Some(run_id) = request.run_id {
            self.runlog
                .log_run_event(run_id, events::SEARCH_EXECUTE, &payload)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ManualSearchInput, MANUAL_PROVIDER, SearchProvider, SearchRequest, SearchRouter,
        parse_manual_results,
    };
    use crate::audit::AuditWriter;
    use crate::broker::{GrantRequest, PermissionBroker};
    use crate::error::CoreError;
    use crate::guard::PolicyGuard;
    use crate::identity::IdentityService;
    use crate::limits::RateLimiter;
    use crate::runlog::RunLogger;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;
    use warden_protocol::{GrantScope, Permission, SearchResult, SearchStatus};
    use warden_store::Store;

    fn router(store: &Store) -> SearchRouter {
        let identity = IdentityService::new(store.clone());
        let audit = AuditWriter::new(store.clone(), identity.clone());
        let broker = PermissionBroker::new(store.clone(), audit.clone());
        let guard = PolicyGuard::new(broker.clone(), identity.clone());
        let runlog = RunLogger::new(store.clone(), identity.clone());
        broker
            .grant(
                &GrantRequest {
                    permission: Permission::WebSearch,
                    scope: GrantScope::Session,
                    allowed_paths: vec![],
                },
                "s1",
            )
            .expect("grant");
        SearchRouter::new(guard, audit, runlog, identity, Arc::new(RateLimiter::new()))
    }

    fn request(manual: Option<ManualSearchInput>) -> SearchRequest {
        SearchRequest {
            query: "example query".to_string(),
            num_results: 3,
            safe: true,
            session_id: "s1".to_string(),
            safe_mode: false,
            manual,
            run_id: None,
        }
    }

    #[test]
    fn manual_rows_parse_into_results() {
        let input = ManualSearchInput {
            json_results: None,
            pasted_lines: Some(
                "Example|https://example.com|snippet\nhttps://plain.example.org".to_string(),
            ),
        };
        let results = parse_manual_results(&input).expect("parse");
        assert_eq!(
            results[0],
            SearchResult {
                title: "Example".to_string(),
                url: "https://example.com".to_string(),
                snippet: "snippet".to_string(),
            }
        );
        assert_eq!(results[1].title, "https://plain.example.org");
    }

    #[test]
    fn unparseable_manual_input_is_a_validation_error() {
        let input = ManualSearchInput {
            json_results: None,
            pasted_lines: Some("not a url".to_string()),
        };
        let err = parse_manual_results(&input).expect_err("invalid");
        assert_eq!(matches!(err, CoreError::Validation(_)), true);
    }

    #[tokio::test]
    async fn privacy_mode_keeps_queries_out_of_the_audit_log() {
        let store = Store::open_in_memory().expect("store");
        // Verbose logging keeps the full payload, which is exactly where a
        // leaked query would show up.
        store
            .set_app_setting("verbose_logging", &json!(true))
            .expect("setting");

        let manual = ManualSearchInput {
            json_results: None,
            pasted_lines: Some("https://example.com".to_string()),
        };
        router(&store)
            .search(&request(Some(manual)), None)
            .await
            .expect("search");

        let records = store.list_audit(10).expect("audit");
        let entry = records
            .iter()
            .find(|record| record.event_type == "search.execute")
            .expect("search event");
        assert_eq!(entry.payload.get("query"), None);
        assert_eq!(entry.payload["query_hash"].is_string(), true);
    }

    #[tokio::test]
    async fn query_text_logged_only_with_privacy_off() {
        let store = Store::open_in_memory().expect("store");
        store
            .set_app_setting("privacy_mode", &json!(false))
            .expect("privacy");
        store
            .set_app_setting("allow_query_text_logging", &json!(true))
            .expect("allow");
        store
            .set_app_setting("verbose_logging", &json!(true))
            .expect("verbose");

        let manual = ManualSearchInput {
            json_results: None,
            pasted_lines: Some("https://example.com".to_string()),
        };
        router(&store)
            .search(&request(Some(manual)), None)
            .await
            .expect("search");

        let records = store.list_audit(10).expect("audit");
        let entry = records
            .iter()
            .find(|record| record.event_type == "search.execute")
            .expect("search event");
        assert_eq!(entry.payload["query"], json!("example query"));
    }

    #[tokio::test]
    async fn no_providers_falls_back_to_manual_required() {
        let store = Store::open_in_memory().expect("store");
        let response = router(&store)
            .search(&request(None), None)
            .await
            .expect("search");
        assert_eq!(response.status, SearchStatus::ManualRequired);
        assert_eq!(response.provider, MANUAL_PROVIDER);
        assert_eq!(response.manual_instructions.is_some(), true);
    }

    struct StaticProvider;

    #[async_trait]
    impl SearchProvider for StaticProvider {
        fn name(&self) -> &str {
            "static"
        }

        async fn search(
            &self,
            _query: &str,
            _num_results: usize,
            _safe: bool,
        ) -> Result<Vec<SearchResult>, CoreError> {
            Ok(vec![SearchResult {
                title: "hit".to_string(),
                url: "https://example.com".to_string(),
                snippet: String::new(),
            }])
        }
    }

    #[tokio::test]
    async fn first_successful_provider_wins() {
        let store = Store::open_in_memory().expect("store");
        let response = router(&store)
            .with_providers(vec![Arc::new(StaticProvider)])
            .search(&request(None), None)
            .await
            .expect("search");
        assert_eq!(response.status, SearchStatus::Ok);
        assert_eq!(response.provider, "static");
        assert_eq!(response.results.len(), 1);
    }

    #[tokio::test]
    async fn missing_grant_is_a_typed_denial() {
        let store = Store::open_in_memory().expect("store");
        let identity = IdentityService::new(store.clone());
        let audit = AuditWriter::new(store.clone(), identity.clone());
        let broker = PermissionBroker::new(store.clone(), audit.clone());
        let guard = PolicyGuard::new(broker, identity.clone());
        let runlog = RunLogger::new(store.clone(), identity.clone());
        let router =
            SearchRouter::new(guard, audit, runlog, identity, Arc::new(RateLimiter::new()));

        let err = router.search(&request(None), None).await.expect_err("denied");
        assert_eq!(
            err.to_string(),
            "permission_required:web.search:No grant found"
        );
    }
}
