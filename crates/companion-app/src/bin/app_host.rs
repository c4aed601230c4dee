//! Minimal host that boots the application core with in-memory services and
//! walks through one attach / feedback / detach cycle. Useful for checking
//! the wiring from a terminal without a platform shell.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use companion_app::config::default_config_path;
use companion_app::services::offline::{
    IdleSchedulingService, IdleSyncService, InMemoryFeedbackService, TracingAnalytics,
};
use companion_app::services::NotificationHandler;
use companion_app::{
    AppConfig, AppServices, Application, Feedback, FeedbackCandidate, NotificationKind, Rating,
    SettingsSnapshot, SettingsStore,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "companion-host")]
#[command(about = "Boot the companion application core with in-memory services")]
struct Cli {
    /// Configuration file (TOML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Start with automatic feedback prompts turned off
    #[arg(long)]
    feedback_disabled: bool,

    /// Open a feedback notification for this session after attaching
    #[arg(long)]
    notify: Option<String>,
}

fn init_tracing(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.filter));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let path = cli.config.unwrap_or_else(default_config_path);
    let config = AppConfig::load(&path)?;
    init_tracing(&config);

    let feedback = Arc::new(InMemoryFeedbackService::new([
        FeedbackCandidate::new("opening-keynote", "Opening Keynote"),
        FeedbackCandidate::new("flows-in-practice", "Flows in Practice"),
    ]));
    let settings = Arc::new(SettingsStore::new(SettingsSnapshot {
        is_feedback_enabled: !cli.feedback_disabled,
        ..SettingsSnapshot::default()
    }));
    let services = AppServices {
        sync: Arc::new(IdleSyncService),
        scheduling: Arc::new(IdleSchedulingService),
        feedback: feedback.clone(),
        settings,
        analytics: Arc::new(TracingAnalytics),
    };

    let app = Application::launch(config, services)?;
    app.on_attach();
    app.did_show_splash_screen();
    if let Some(session) = cli.notify {
        app.notification_received(session.into(), NotificationKind::Feedback);
    }

    let mut dialogs = app.feedback_dialog().subscribe();
    for _ in 0..20 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        if let Some(Some(dialog)) = dialogs.poll() {
            println!("feedback requested for \"{}\"", dialog.candidate().session.title);
            dialog
                .submit(Feedback::new(Rating::Satisfied, "submitted from companion-host"))
                .await;
        }
    }

    app.on_detach();
    println!("recorded {} feedback entries", feedback.submitted().len());
    Ok(())
}
