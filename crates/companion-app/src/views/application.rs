//! Root view-model.

use std::sync::Arc;

use companion_core::effects::CancellationToken;
use companion_core::reactive::Dynamic;
use companion_core::SessionId;
use futures::{FutureExt, StreamExt};

use super::features::{Feature, FeatureViewModel};
use super::splash::SplashScreen;
use crate::config::AppConfig;
use crate::domain::NotificationKind;
use crate::feedback::{EvaluationTrigger, FeedbackDialog, FeedbackWorkflow, WorkflowState};
use crate::lifecycle::{Lifecycle, TaskKey};
use crate::services::{AppServices, NotificationHandler, SettingsGateway};
use crate::supervisors::{Supervisor, SupervisorStatus};

const APPEAR_TASK: TaskKey = "feedback.appear";
const RESUME_TASK: TaskKey = "feedback.resume";
const NOTIFICATION_TASK: TaskKey = "feedback.notification";
const RENDERER_TASK: TaskKey = "settings.renderer";

/// Root of the view-model tree.
pub struct ApplicationViewModel {
    lifecycle: Arc<Lifecycle>,
    workflow: Arc<FeedbackWorkflow>,
    sync: Supervisor,
    scheduling: Supervisor,
    use_alternate_renderer: Dynamic<bool>,
    splash: SplashScreen,
    schedule: Arc<FeatureViewModel>,
    agenda: Arc<FeatureViewModel>,
    sponsors: Arc<FeatureViewModel>,
    settings: Arc<FeatureViewModel>,
}

impl ApplicationViewModel {
    /// Wire the view-model tree. Nothing runs until [`on_attach`](Self::on_attach).
    pub fn new(config: &AppConfig, services: &AppServices) -> Self {
        let lifecycle = Arc::new(Lifecycle::new("application", &config.lifecycle));

        let scheduling = Supervisor::scheduling(
            &lifecycle,
            services.scheduling.clone(),
            config.supervisor.clone(),
        );
        let sync = Supervisor::sync(&lifecycle, services.sync.clone(), config.supervisor.clone());

        let use_alternate_renderer = Dynamic::new(initial_renderer(services.settings.as_ref()));
        register_renderer_forwarding(
            &lifecycle,
            services.settings.clone(),
            use_alternate_renderer.clone(),
        );

        let workflow = FeedbackWorkflow::new(
            &lifecycle,
            services.feedback.clone(),
            services.settings.clone(),
            config.feedback.clone(),
        );
        let appear = workflow.clone();
        lifecycle.while_attached(APPEAR_TASK, move |token| {
            let workflow = appear.clone();
            async move {
                workflow.evaluate(EvaluationTrigger::Appear, &token).await;
                Ok(())
            }
        });

        let [schedule, agenda, sponsors, settings] = Feature::ALL
            .map(|feature| FeatureViewModel::managed_by(&lifecycle, feature, &config.lifecycle));

        Self {
            lifecycle,
            workflow,
            sync,
            scheduling,
            use_alternate_renderer,
            splash: SplashScreen::new(),
            schedule,
            agenda,
            sponsors,
            settings,
        }
    }

    /// The platform surface became visible.
    pub fn on_attach(&self) {
        self.lifecycle.attach();
    }

    /// The platform surface went away.
    pub fn on_detach(&self) {
        self.lifecycle.detach();
    }

    /// The screen resumed without a new attachment; check for feedback again.
    pub fn on_appear(&self) {
        let workflow = self.workflow.clone();
        self.lifecycle.once_attached(RESUME_TASK, move |token| {
            let workflow = workflow.clone();
            async move {
                workflow.evaluate(EvaluationTrigger::Appear, &token).await;
                Ok(())
            }
        });
    }

    /// Dialog to render right now, if any.
    pub fn presented_feedback(&self) -> Option<FeedbackDialog> {
        self.workflow.dialog().get()
    }

    /// Observable dialog.
    pub fn feedback_dialog(&self) -> Dynamic<Option<FeedbackDialog>> {
        self.workflow.dialog()
    }

    /// Workflow state, mostly for diagnostics.
    pub fn feedback_state(&self) -> WorkflowState {
        self.workflow.state()
    }

    /// The feedback workflow itself.
    pub fn feedback_workflow(&self) -> &Arc<FeedbackWorkflow> {
        &self.workflow
    }

    /// Whether the platform should use its alternate renderer.
    pub fn use_alternate_renderer(&self) -> Dynamic<bool> {
        self.use_alternate_renderer.clone()
    }

    /// Observable splash visibility.
    pub fn show_splash_screen(&self) -> Dynamic<bool> {
        self.splash.visible()
    }

    /// The splash was painted; hide it. Returns `true` only the first time.
    pub fn did_show_splash_screen(&self) -> bool {
        self.splash.acknowledge()
    }

    /// Status of schedule synchronization.
    pub fn sync_status(&self) -> Dynamic<SupervisorStatus> {
        self.sync.status()
    }

    /// Status of notification scheduling.
    pub fn scheduling_status(&self) -> Dynamic<SupervisorStatus> {
        self.scheduling.status()
    }

    /// Root lifecycle.
    pub fn lifecycle(&self) -> &Arc<Lifecycle> {
        &self.lifecycle
    }

    /// Schedule tab.
    pub fn schedule(&self) -> &Arc<FeatureViewModel> {
        &self.schedule
    }

    /// Agenda tab.
    pub fn agenda(&self) -> &Arc<FeatureViewModel> {
        &self.agenda
    }

    /// Sponsors tab.
    pub fn sponsors(&self) -> &Arc<FeatureViewModel> {
        &self.sponsors
    }

    /// Settings tab.
    pub fn settings(&self) -> &Arc<FeatureViewModel> {
        &self.settings
    }
}

impl NotificationHandler for ApplicationViewModel {
    fn notification_received(&self, session_id: SessionId, kind: NotificationKind) {
        if kind != NotificationKind::Feedback {
            tracing::debug!(%session_id, ?kind, "notification ignored");
            return;
        }

        tracing::info!(%session_id, "feedback notification opened");
        // Queued first so the request survives a detach before the task runs.
        self.workflow.queue_notification(session_id.clone());
        let workflow = self.workflow.clone();
        self.lifecycle.once_attached(NOTIFICATION_TASK, move |token| {
            let workflow = workflow.clone();
            let session_id = session_id.clone();
            async move {
                workflow
                    .evaluate(EvaluationTrigger::Notification(session_id), &token)
                    .await;
                Ok(())
            }
        });
    }
}

impl std::fmt::Debug for ApplicationViewModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApplicationViewModel")
            .field("lifecycle", &self.lifecycle)
            .field("workflow", &self.workflow)
            .finish_non_exhaustive()
    }
}

fn initial_renderer(settings: &dyn SettingsGateway) -> bool {
    settings
        .subscribe()
        .next()
        .now_or_never()
        .flatten()
        .is_some_and(|snapshot| snapshot.use_alternate_renderer)
}

fn register_renderer_forwarding(
    lifecycle: &Lifecycle,
    settings: Arc<dyn SettingsGateway>,
    target: Dynamic<bool>,
) {
    lifecycle.while_attached(RENDERER_TASK, move |token| {
        let mut snapshots = settings.subscribe();
        let target = target.clone();
        async move {
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    next = snapshots.next() => match next {
                        Some(snapshot) => {
                            target.set_if_changed(snapshot.use_alternate_renderer);
                        }
                        None => break,
                    },
                }
            }
            Ok(())
        }
    });
}
