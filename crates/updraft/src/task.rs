#![forbid(unsafe_code)]

//! Launch-time orchestration.
//!
//! [`LoaderTask::run`] makes sure the embedded update is in the store, picks
//! the best cached update, and races a remote check against the launch wait
//! window. The launch decision is latched: whichever side decides first wins
//! and a remote result arriving later is published as a
//! [`TaskEvent::BackgroundUpdateFinished`].

use std::{path::PathBuf, sync::Arc};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::{sync::oneshot, task::JoinHandle};
use updraft_core::{HeaderDictionary, Update, UpdateDirective};
use updraft_events::{BackgroundUpdateStatus, Event, EventBus, TaskEvent};
use updraft_loader::{AppLoader, EmbeddedBundle, EmbeddedStrategy, FileDownloader, RemoteStrategy};
use updraft_net::{HttpClient, Net, NetExt};
use updraft_protocol::ResponseParser;
use updraft_store::{FilterAwarePolicy, Reaper, SelectionPolicy, UpdatesStore};
use url::Url;

use crate::{CheckOnLaunch, Launcher, UpdatesConfig, UpdatesError, UpdatesResult};

type UpdatePredicate = Box<dyn Fn(&Update) -> bool + Send + Sync>;

/// Owner decisions consulted during a run.
#[derive(Default)]
pub struct TaskHooks {
    accept_cached: Option<UpdatePredicate>,
    admit_remote: Option<UpdatePredicate>,
}

impl TaskHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Veto the cached candidate. Returning `false` discards it and forces a
    /// remote check.
    pub fn accept_cached(mut self, f: impl Fn(&Update) -> bool + Send + Sync + 'static) -> Self {
        self.accept_cached = Some(Box::new(f));
        self
    }

    /// Extra admission check for a remote manifest the selection policy has
    /// already accepted.
    pub fn admit_remote(mut self, f: impl Fn(&Update) -> bool + Send + Sync + 'static) -> Self {
        self.admit_remote = Some(Box::new(f));
        self
    }
}

/// What the run decided to launch.
#[derive(Debug)]
pub struct TaskOutcome {
    pub launcher: Launcher,
    /// `true` when the remote check finished before the launch decision.
    pub is_up_to_date: bool,
    /// The remote check followed by reaping, still running if the check lost
    /// the race. Its result is published on the event bus.
    pub remote_check: Option<JoinHandle<()>>,
}

type Decision = UpdatesResult<(Launcher, bool)>;

/// Hands the launch decision to the run exactly once.
struct LaunchLatch {
    tx: Mutex<Option<oneshot::Sender<Decision>>>,
}

impl LaunchLatch {
    fn new() -> (Arc<Self>, oneshot::Receiver<Decision>) {
        let (tx, rx) = oneshot::channel();
        let latch = Arc::new(Self {
            tx: Mutex::new(Some(tx)),
        });
        (latch, rx)
    }

    /// Decide with `f` unless a decision was already made. Returns whether
    /// this call decided.
    fn decide(&self, f: impl FnOnce() -> Decision) -> bool {
        let mut tx = self.tx.lock();
        let Some(sender) = tx.take() else {
            return false;
        };
        let _ = sender.send(f());
        true
    }
}

/// Result of a remote check.
enum RemoteUpdate {
    None,
    Loaded(Update),
    /// Embedded update promoted by a roll-back directive.
    RolledBack(Update),
}

/// Orchestrates one application launch.
pub struct LoaderTask {
    config: UpdatesConfig,
    update_url: Url,
    scope_key: String,
    store: Arc<dyn UpdatesStore>,
    policy: Arc<dyn SelectionPolicy>,
    downloader: Arc<FileDownloader>,
    parser: ResponseParser,
    embedded: Option<EmbeddedBundle>,
    hooks: TaskHooks,
    fs_lock: Arc<tokio::sync::Mutex<()>>,
    bus: EventBus,
}

impl LoaderTask {
    /// Build a task from `config`.
    ///
    /// # Errors
    ///
    /// Configuration errors are reported here, before any work starts.
    pub fn new(config: UpdatesConfig, store: Arc<dyn UpdatesStore>) -> UpdatesResult<Self> {
        let client = HttpClient::new(config.net.clone())?;
        let net: Arc<dyn Net> = if config.net.retry_policy.max_retries > 0 {
            Arc::new(client.with_retry(config.net.retry_policy.clone()))
        } else {
            Arc::new(client)
        };
        Self::with_net(config, store, net)
    }

    /// Build a task that sends requests through `net`.
    ///
    /// # Errors
    ///
    /// Same as [`LoaderTask::new`].
    pub fn with_net(
        config: UpdatesConfig,
        store: Arc<dyn UpdatesStore>,
        net: Arc<dyn Net>,
    ) -> UpdatesResult<Self> {
        let update_url = config.update_url()?.clone();
        let scope_key = config.resolved_scope_key()?;
        let code_signing = config.code_signing_configuration()?;

        let downloader = Arc::new(FileDownloader::new(
            net,
            config.downloader_config(code_signing.clone()),
        ));
        let parser = ResponseParser::new(config.parser_options(scope_key.clone(), code_signing));

        Ok(Self {
            policy: Arc::new(FilterAwarePolicy::new(config.runtime_version.clone())),
            bus: EventBus::new(config.event_channel_capacity),
            update_url,
            scope_key,
            store,
            downloader,
            parser,
            embedded: None,
            hooks: TaskHooks::default(),
            fs_lock: Arc::default(),
            config,
        })
    }

    pub fn with_embedded(mut self, bundle: EmbeddedBundle) -> Self {
        self.embedded = Some(bundle);
        self
    }

    pub fn with_policy(mut self, policy: Arc<dyn SelectionPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_hooks(mut self, hooks: TaskHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Subscribe to task and loader events. Subscribe before [`Self::run`]
    /// to see the whole run.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    pub fn scope_key(&self) -> &str {
        &self.scope_key
    }

    /// Decide what to launch.
    ///
    /// Publishes exactly one of [`TaskEvent::FinishedWithLauncher`] and
    /// [`TaskEvent::FinishedWithError`].
    ///
    /// # Errors
    ///
    /// Store failures, or [`UpdatesError::NoLaunchableUpdate`] when neither
    /// the store nor the remote check produced anything to launch.
    #[tracing::instrument(skip_all, fields(scope_key = %self.scope_key))]
    pub async fn run(self) -> UpdatesResult<TaskOutcome> {
        let bus = self.bus.clone();
        let result = Arc::new(self).start().await;
        match &result {
            Ok(outcome) => {
                tracing::info!(
                    update_id = %outcome.launcher.update().update_id,
                    is_up_to_date = outcome.is_up_to_date,
                    "launch decided"
                );
                bus.publish(TaskEvent::FinishedWithLauncher {
                    update_id: outcome.launcher.update().update_id,
                    is_up_to_date: outcome.is_up_to_date,
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, "launch task failed");
                bus.publish(TaskEvent::FinishedWithError {
                    error: e.to_string(),
                });
            }
        }
        result
    }

    async fn start(self: Arc<Self>) -> UpdatesResult<TaskOutcome> {
        tokio::fs::create_dir_all(&self.config.updates_dir).await?;

        let embedded = self.load_embedded().await?;
        let filters = self.store.manifest_filters(&self.scope_key)?;
        let mut candidate = self.candidate_launcher(filters.as_ref())?;

        let mut forced = false;
        if let Some(launcher) = &candidate {
            let update = launcher.update();
            self.bus.publish(TaskEvent::CachedUpdateLoaded {
                update_id: update.update_id,
            });
            if let Some(accept) = &self.hooks.accept_cached {
                if !accept(update) {
                    tracing::info!(update_id = %update.update_id, "cached update vetoed");
                    candidate = None;
                    forced = true;
                }
            }
        }

        if !forced && self.config.check_on_launch != CheckOnLaunch::Always {
            let launcher = candidate.ok_or(UpdatesError::NoLaunchableUpdate)?;
            self.reap(&launcher, embedded.as_ref()).await;
            return Ok(TaskOutcome {
                launcher,
                is_up_to_date: false,
                remote_check: None,
            });
        }

        let (latch, decision) = LaunchLatch::new();
        let launch_wait = self.config.launch_wait;

        // A zero wait decides for the cached update before the check starts.
        let mut timer = None;
        if let Some(launcher) = candidate.clone() {
            if launch_wait.is_zero() {
                latch.decide(|| Ok((launcher, false)));
            } else {
                let latch = Arc::clone(&latch);
                timer = Some(tokio::spawn(async move {
                    tokio::time::sleep(launch_wait).await;
                    if latch.decide(|| Ok((launcher, false))) {
                        tracing::info!("launch wait elapsed, using cached update");
                    }
                }));
            }
        }

        let fatal_error = self.config.fatal_error_log().consume();
        self.bus.publish(TaskEvent::RemoteCheckStarted);
        let remote_check = tokio::spawn(Arc::clone(&self).remote_check(
            candidate,
            embedded.clone(),
            fatal_error,
            latch,
        ));

        let decision = decision.await.map_err(|_| UpdatesError::TaskAborted)?;
        if let Some(timer) = timer {
            timer.abort();
        }
        let (launcher, is_up_to_date) = decision?;

        // The store is only reaped once the background check has settled.
        let task = Arc::clone(&self);
        let launched = launcher.clone();
        let remote_check = tokio::spawn(async move {
            if let Err(e) = remote_check.await {
                tracing::warn!(error = %e, "remote check task failed");
            }
            task.reap(&launched, embedded.as_ref()).await;
        });

        Ok(TaskOutcome {
            launcher,
            is_up_to_date,
            remote_check: Some(remote_check),
        })
    }

    /// Load the embedded update unless the store already holds something at
    /// least as new. Returns the embedded update as stored, if any.
    async fn load_embedded(&self) -> UpdatesResult<Option<Update>> {
        let Some(bundle) = self.embedded.clone() else {
            return Ok(None);
        };

        let filters = self.store.manifest_filters(&self.scope_key)?;
        let launchable = self.store.launchable_updates(&self.scope_key)?;
        let best = self
            .policy
            .select_update_to_launch(&launchable, filters.as_ref());
        let admit = |update: &Update| {
            self.policy
                .should_load_new_update(Some(update), best, filters.as_ref())
        };

        let manifest = match self.embedded_loader(bundle).load(Some(&admit)).await {
            Ok(outcome) => outcome.response.manifest_part,
            Err(e) => {
                tracing::warn!(error = %e, "embedded update failed to load");
                return Ok(None);
            }
        };
        let Some(manifest) = manifest else {
            return Ok(None);
        };
        Ok(Some(
            self.store
                .find_update(manifest.update_id)?
                .unwrap_or(manifest),
        ))
    }

    fn embedded_loader(&self, bundle: EmbeddedBundle) -> AppLoader {
        let strategy = EmbeddedStrategy::new(bundle, self.scope_key.clone());
        AppLoader::new(
            Arc::new(strategy),
            Arc::clone(&self.store),
            &self.config.updates_dir,
            self.bus.clone(),
        )
        .with_fs_lock(Arc::clone(&self.fs_lock))
    }

    fn candidate_launcher(
        &self,
        filters: Option<&HeaderDictionary>,
    ) -> UpdatesResult<Option<Launcher>> {
        let launchable = self.store.launchable_updates(&self.scope_key)?;
        let Some(best) = self.policy.select_update_to_launch(&launchable, filters) else {
            return Ok(None);
        };
        match Launcher::new(best.clone(), &self.config.updates_dir) {
            Ok(launcher) => Ok(Some(launcher)),
            Err(e) => {
                tracing::warn!(update_id = %best.update_id, error = %e, "cached update is not launchable");
                Ok(None)
            }
        }
    }

    async fn remote_check(
        self: Arc<Self>,
        candidate: Option<Launcher>,
        embedded: Option<Update>,
        fatal_error: Option<String>,
        latch: Arc<LaunchLatch>,
    ) {
        let launched = candidate.as_ref().map(Launcher::update);
        let result = self
            .fetch_remote(launched, embedded.as_ref(), fatal_error)
            .await;
        let background = background_event(&result);

        let decided = latch.decide(|| self.decide_after_remote(result, candidate));
        if !decided {
            tracing::info!("remote check finished after launch");
            self.bus.publish(background);
        }
    }

    async fn fetch_remote(
        &self,
        launched: Option<&Update>,
        embedded: Option<&Update>,
        fatal_error: Option<String>,
    ) -> UpdatesResult<RemoteUpdate> {
        let extra = FileDownloader::extra_headers_for_remote_update_request(
            &*self.store,
            &self.scope_key,
            launched,
            embedded,
        )?;
        let strategy = RemoteStrategy::new(
            Arc::clone(&self.downloader),
            self.parser.clone(),
            Arc::clone(&self.store),
            self.update_url.clone(),
        )
        .with_extra_headers(extra)
        .with_fatal_error(fatal_error);
        let loader = AppLoader::new(
            Arc::new(strategy),
            Arc::clone(&self.store),
            &self.config.updates_dir,
            self.bus.clone(),
        )
        .with_fs_lock(Arc::clone(&self.fs_lock));

        // Filters come from the response being loaded; the strategy stores
        // them before admission runs.
        let admit = |update: &Update| {
            let filters = self.store.manifest_filters(&self.scope_key).ok().flatten();
            let admitted = self
                .policy
                .should_load_new_update(Some(update), launched, filters.as_ref())
                && self.hooks.admit_remote.as_ref().map_or(true, |f| f(update));
            if admitted {
                self.bus.publish(TaskEvent::RemoteUpdateStarted {
                    update_id: update.update_id,
                });
            }
            admitted
        };

        let outcome = loader.load(Some(&admit)).await?;
        if let Some(update) = outcome.update {
            return Ok(RemoteUpdate::Loaded(update));
        }
        match outcome.response.directive_part {
            Some(UpdateDirective::RollBackToEmbedded { commit_time, .. }) => {
                self.roll_back_to_embedded(commit_time, embedded, launched)
                    .await
            }
            _ => Ok(RemoteUpdate::None),
        }
    }

    /// Promote the embedded update by moving its commit time forward to the
    /// directive's, so anything published later still supersedes it.
    ///
    /// An embedded update that was never admitted, or has since left the
    /// store, is loaded again from the bundle first.
    async fn roll_back_to_embedded(
        &self,
        commit_time: DateTime<Utc>,
        embedded: Option<&Update>,
        launched: Option<&Update>,
    ) -> UpdatesResult<RemoteUpdate> {
        let filters = self.store.manifest_filters(&self.scope_key)?;
        if !self.policy.should_load_rollback_directive(
            commit_time,
            embedded,
            launched,
            filters.as_ref(),
        ) {
            tracing::debug!(%commit_time, "roll-back directive not applicable");
            return Ok(RemoteUpdate::None);
        }
        let Some(embedded) = embedded else {
            return Ok(RemoteUpdate::None);
        };
        let mut stored = match self.store.find_update(embedded.update_id)? {
            Some(stored) => stored,
            None => match self.reload_embedded().await? {
                Some(stored) => stored,
                None => {
                    tracing::warn!(update_id = %embedded.update_id, "embedded update is not in the store");
                    return Ok(RemoteUpdate::None);
                }
            },
        };

        self.store
            .set_update_commit_time(stored.update_id, commit_time)?;
        stored.commit_time = commit_time;
        tracing::info!(update_id = %stored.update_id, %commit_time, "rolled back to embedded update");
        Ok(RemoteUpdate::RolledBack(stored))
    }

    async fn reload_embedded(&self) -> UpdatesResult<Option<Update>> {
        let Some(bundle) = self.embedded.clone() else {
            return Ok(None);
        };
        match self.embedded_loader(bundle).load(None).await {
            Ok(outcome) => Ok(outcome.update),
            Err(e) => {
                tracing::warn!(error = %e, "embedded update failed to reload");
                Ok(None)
            }
        }
    }

    fn decide_after_remote(
        &self,
        result: UpdatesResult<RemoteUpdate>,
        candidate: Option<Launcher>,
    ) -> Decision {
        match result {
            Ok(RemoteUpdate::Loaded(update) | RemoteUpdate::RolledBack(update)) => {
                Ok((Launcher::new(update, &self.config.updates_dir)?, true))
            }
            Ok(RemoteUpdate::None) => candidate
                .map(|launcher| (launcher, true))
                .ok_or(UpdatesError::NoLaunchableUpdate),
            Err(e) => match candidate {
                Some(launcher) => {
                    tracing::warn!(error = %e, "remote check failed, launching cached update");
                    Ok((launcher, false))
                }
                None => Err(e),
            },
        }
    }

    /// Remove updates the launched one supersedes, keeping the embedded one.
    /// Failures are logged.
    async fn reap(&self, launcher: &Launcher, embedded: Option<&Update>) {
        let store = Arc::clone(&self.store);
        let policy = Arc::clone(&self.policy);
        let updates_dir: PathBuf = self.config.updates_dir.clone();
        let scope_key = self.scope_key.clone();
        let launched = launcher.update().clone();
        let protected: Vec<_> = embedded.map(|u| u.update_id).into_iter().collect();

        let result = tokio::task::spawn_blocking(move || {
            let filters = store.manifest_filters(&scope_key)?;
            Reaper::reap(
                &*store,
                &*policy,
                &updates_dir,
                &launched,
                filters.as_ref(),
                &protected,
            )
        })
        .await;

        match result {
            Ok(Ok(report)) => tracing::debug!(?report, "reaper finished"),
            Ok(Err(e)) => tracing::warn!(error = %e, "reaper failed"),
            Err(e) => tracing::warn!(error = %e, "reaper task failed"),
        }
    }
}

fn background_event(result: &UpdatesResult<RemoteUpdate>) -> TaskEvent {
    let (status, update_id, error) = match result {
        Ok(RemoteUpdate::None) => (BackgroundUpdateStatus::NoUpdateAvailable, None, None),
        Ok(RemoteUpdate::Loaded(update) | RemoteUpdate::RolledBack(update)) => (
            BackgroundUpdateStatus::UpdateAvailable,
            Some(update.update_id),
            None,
        ),
        Err(e) => (BackgroundUpdateStatus::Error, None, Some(e.to_string())),
    };
    TaskEvent::BackgroundUpdateFinished {
        status,
        update_id,
        error,
    }
}
