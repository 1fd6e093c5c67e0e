use std::sync::Arc;

use futures::Stream;
use iced::Task;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::sync::Mutex;

use crate::application::DownloadCoordinator;
use crate::config::AppConfig;
use crate::domain::{ProgressEvent, SessionId};
use crate::engine::YtDlpEngine;
use crate::ui::{DownloadMessage, DownloadView};

pub struct DownloadApp {
    view: DownloadView,
    coordinator: DownloadCoordinator,
    // Filled by the background session, drained here on the UI side
    events: Arc<Mutex<UnboundedReceiver<ProgressEvent>>>,
}

impl DownloadApp {
    pub fn new(config: Arc<AppConfig>) -> Self {
        let engine = YtDlpEngine::new(config.engine_binary.clone(), config.ffmpeg_location.clone());
        let (tx, rx) = unbounded_channel();
        let coordinator = DownloadCoordinator::new(
            Arc::new(engine),
            config.destination_dir.clone(),
            Arc::new(tx),
        );

        Self {
            view: DownloadView::new(coordinator.destination(), config.default_quality),
            coordinator,
            events: Arc::new(Mutex::new(rx)),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Message {
    UiMessage(DownloadMessage),
    /// Latest state of the running session
    Progress(ProgressEvent),
}

/// Forwards one session's events, ending after its terminal event.
/// Stragglers from an earlier session are dropped.
fn session_events(
    events: Arc<Mutex<UnboundedReceiver<ProgressEvent>>>,
    session: SessionId,
) -> impl Stream<Item = Message> + Send + 'static {
    futures::stream::unfold(Some(events), move |state| async move {
        let events = state?;
        let event = loop {
            let event = events.lock().await.recv().await?;
            if event.belongs_to(session) {
                break event;
            }
            tracing::debug!(session, stale = ?event.session, "Dropping event from another session");
        };
        let next = (!event.is_terminal()).then_some(events);
        Some((Message::Progress(event), next))
    })
}

pub fn update(app: &mut DownloadApp, message: Message) -> Task<Message> {
    match message {
        Message::UiMessage(DownloadMessage::DownloadPressed) => {
            if app.view.is_downloading || app.coordinator.is_active() {
                return Task::none();
            }
            match app.coordinator.submit(app.view.request()) {
                Ok(session) => {
                    app.view.begin();
                    return Task::stream(session_events(Arc::clone(&app.events), session));
                }
                Err(e) => app.view.reject(&e),
            }
        }
        Message::UiMessage(ui_msg) => app.view.update(ui_msg),
        Message::Progress(event) => app.view.apply(&event),
    }
    Task::none()
}

pub fn view(app: &DownloadApp) -> iced::Element<'_, Message> {
    app.view.view().map(Message::UiMessage)
}
