//! Process-wide download pipeline.
//!
//! [`DownloadCoordinator`] wires the HTTP client, download manager, media
//! store, executor, dispatcher and completion notifier together. Build it
//! once with [`CoordinatorBuilder`] and share it behind an `Arc`; every
//! download trigger goes through [`DownloadCoordinator::start`].

use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::cookies::BrowserCookies;
use crate::download::{
    ActiveDownloadRegistry, BackgroundExecutor, CompletionNotifier, ConfirmationPrompt,
    DirectoryMediaStore, DispatchError, DispatchOutcome, Dispatcher, DispatcherParts,
    DownloadRequest, FilesystemPermission, HttpClient, MediaStore, PlanRules, RequestHeaders,
    ResolvedDownloadPlan, StorageLayout, StoragePermission, SystemDownloadManager,
    constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS},
    resolve_plan,
};
use crate::ui::{UiConfirmationPrompt, UiHandle};
use crate::user_agent::default_user_agent;

/// Environment the pipeline runs in.
#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    pub layout: StorageLayout,
    pub rules: PlanRules,
    /// Used when a trigger carries no User-Agent of its own.
    pub user_agent: String,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
}

impl CoordinatorSettings {
    /// Default rules and timeouts; `rules.scoped_storage` follows the layout.
    #[must_use]
    pub fn new(layout: StorageLayout) -> Self {
        let rules = PlanRules {
            scoped_storage: layout.scoped,
            ..PlanRules::default()
        };
        Self {
            layout,
            rules,
            user_agent: default_user_agent(),
            connect_timeout_secs: CONNECT_TIMEOUT_SECS,
            read_timeout_secs: READ_TIMEOUT_SECS,
        }
    }
}

/// Builder for [`DownloadCoordinator`]. Unset collaborators get the
/// directory-backed defaults.
pub struct CoordinatorBuilder {
    settings: CoordinatorSettings,
    media_store: Option<Arc<dyn MediaStore>>,
    prompt: Option<Arc<dyn ConfirmationPrompt>>,
    permission: Option<Arc<dyn StoragePermission>>,
    cookies: BrowserCookies,
}

impl CoordinatorBuilder {
    #[must_use]
    pub fn new(settings: CoordinatorSettings) -> Self {
        Self {
            settings,
            media_store: None,
            prompt: None,
            permission: None,
            cookies: BrowserCookies::new(),
        }
    }

    #[must_use]
    pub fn media_store(mut self, store: Arc<dyn MediaStore>) -> Self {
        self.media_store = Some(store);
        self
    }

    #[must_use]
    pub fn prompt(mut self, prompt: Arc<dyn ConfirmationPrompt>) -> Self {
        self.prompt = Some(prompt);
        self
    }

    #[must_use]
    pub fn permission(mut self, permission: Arc<dyn StoragePermission>) -> Self {
        self.permission = Some(permission);
        self
    }

    #[must_use]
    pub fn cookies(mut self, cookies: BrowserCookies) -> Self {
        self.cookies = cookies;
        self
    }

    /// Assembles the pipeline. Must be called inside a Tokio runtime.
    ///
    /// Without an explicit prompt, confirmations are asked through `ui`.
    #[must_use]
    pub fn build(self, ui: UiHandle) -> DownloadCoordinator {
        let settings = self.settings;
        let layout = settings.layout.clone();
        let client =
            HttpClient::new_with_timeouts(settings.connect_timeout_secs, settings.read_timeout_secs);
        let manager = SystemDownloadManager::new(client.clone(), layout.clone());
        let registry = ActiveDownloadRegistry::new();
        let executor = BackgroundExecutor::spawn();
        let media_store = self
            .media_store
            .unwrap_or_else(|| Arc::new(DirectoryMediaStore::new(&layout.public_dir)));
        let prompt = self
            .prompt
            .unwrap_or_else(|| Arc::new(UiConfirmationPrompt::new(ui.clone())));
        let permission = self
            .permission
            .unwrap_or_else(|| Arc::new(FilesystemPermission));

        let notifier = CompletionNotifier::new(
            manager.clone(),
            registry.clone(),
            Arc::clone(&media_store),
            layout.clone(),
            executor.clone(),
            ui.clone(),
        );
        let dispatcher = Dispatcher::new(DispatcherParts {
            client: client.clone(),
            manager: manager.clone(),
            notifier,
            registry: registry.clone(),
            media_store,
            executor,
            prompt,
            permission,
            cookies: self.cookies.clone(),
            layout,
            ui,
        });
        info!(
            scoped = settings.layout.scoped,
            public = %settings.layout.public_dir.display(),
            "download coordinator ready"
        );

        DownloadCoordinator {
            client,
            manager,
            registry,
            dispatcher,
            cookies: self.cookies,
            rules: settings.rules,
            user_agent: settings.user_agent,
        }
    }
}

#[derive(Debug)]
pub struct DownloadCoordinator {
    client: HttpClient,
    manager: SystemDownloadManager,
    registry: ActiveDownloadRegistry,
    dispatcher: Dispatcher,
    cookies: BrowserCookies,
    rules: PlanRules,
    user_agent: String,
}

impl DownloadCoordinator {
    /// Resolves the plan for `request` without side effects.
    #[must_use]
    pub fn plan(&self, request: &DownloadRequest) -> ResolvedDownloadPlan {
        resolve_plan(request, &self.rules)
    }

    /// Resolves and dispatches one download.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError` when the dispatch is refused (see
    /// [`Dispatcher::dispatch`]). Transfer failures surface later, through
    /// the returned outcome and a toast.
    #[instrument(skip(self, request), fields(url = %request.url()))]
    pub async fn start(&self, request: DownloadRequest) -> Result<DispatchOutcome, DispatchError> {
        let plan = self.plan(&request);
        self.dispatcher.dispatch(&plan, &request).await
    }

    /// Builds a request for `url`, filling in headers from a HEAD probe.
    ///
    /// A failed probe is not an error; the request then carries only the
    /// URL and resolution falls back to URL evidence.
    pub async fn probe_request(&self, url: &str) -> DownloadRequest {
        let request = DownloadRequest::new(url, &self.user_agent);
        let headers =
            RequestHeaders::new(&self.user_agent).with_cookie(self.cookies.header_for(url));
        match self.client.probe(url, &headers).await {
            Ok(probe) => request
                .with_content_disposition(probe.content_disposition)
                .with_mime_type(probe.content_type)
                .with_content_length(probe.content_length),
            Err(e) => {
                debug!(url, error = %e, "probe failed, resolving from URL only");
                request
            }
        }
    }

    /// Default User-Agent for triggers without one.
    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    #[must_use]
    pub fn rules(&self) -> &PlanRules {
        &self.rules
    }

    #[must_use]
    pub fn registry(&self) -> &ActiveDownloadRegistry {
        &self.registry
    }

    #[must_use]
    pub fn manager(&self) -> &SystemDownloadManager {
        &self.manager
    }
}
