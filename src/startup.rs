//! Chat Client
//!
//! Wires the session services to one chat view. A single dispatch task
//! receives connection outcomes, live events and history batches in order,
//! and is the only writer of the view.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::application::services::{
    EventStream, HistoryEvent, HistoryLoader, SessionManager, TypingDebouncer,
};
use crate::application::ChatView;
use crate::config::Settings;
use crate::domain::entities::{ChatEvent, ConnectionState, PresentUser};
use crate::domain::transport::RealtimeTransport;
use crate::shared::error::{ChatError, ConnectError, Notice, SendError};

/// Notices for the user, in the order they occurred
pub type NoticeStream = mpsc::UnboundedReceiver<Notice>;

/// Live event pump of the current chat entry
type Forwarder = Arc<Mutex<Option<JoinHandle<()>>>>;

/// Work for the dispatch task
#[derive(Debug)]
enum Command {
    Connection(Result<(), ChatError>),
    /// Live event received during entry `epoch`
    Event { epoch: u64, event: ChatEvent },
    History(HistoryEvent),
}

/// A chat client bound to one transport.
pub struct ChatClient {
    session: Arc<SessionManager>,
    debouncer: TypingDebouncer,
    view: Arc<Mutex<ChatView>>,
    commands: mpsc::UnboundedSender<Command>,
    notices: mpsc::UnboundedSender<Notice>,
    forwarder: Forwarder,
    dispatcher: JoinHandle<()>,
}

impl ChatClient {
    /// Build a client and start its dispatch task. Must be called inside a
    /// tokio runtime.
    pub fn build(settings: &Settings, transport: Arc<dyn RealtimeTransport>) -> (Self, NoticeStream) {
        let session = Arc::new(SessionManager::new(transport, settings));
        let view = Arc::new(Mutex::new(ChatView::new(settings.history.direction)));

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (errors_tx, errors_rx) = mpsc::unbounded_channel();
        let (notices_tx, notices_rx) = mpsc::unbounded_channel();

        let debouncer = TypingDebouncer::new(session.clone(), settings.typing.quiet_period())
            .with_error_sink(errors_tx);

        let forwarder = Forwarder::default();
        let dispatcher = Dispatcher {
            session: session.clone(),
            view: view.clone(),
            loader: HistoryLoader::new(settings.history_params()),
            commands: commands_tx.clone(),
            notices: notices_tx.clone(),
            epoch: 0,
            forwarder: forwarder.clone(),
        };
        let dispatcher = tokio::spawn(dispatcher.run(commands_rx, errors_rx));

        let client = Self {
            session,
            debouncer,
            view,
            commands: commands_tx,
            notices: notices_tx,
            forwarder,
            dispatcher,
        };
        (client, notices_rx)
    }

    /// Connect as `client_id`. The chat is entered once the channel attaches.
    pub fn join(&self, client_id: &str) -> Result<(), ConnectError> {
        let commands = self.commands.clone();
        self.session.connect(client_id, move |result| {
            let _ = commands.send(Command::Connection(result));
        })
    }

    /// Publish a message. Failures are also reported as a notice.
    pub async fn send_message(&self, text: &str) -> Result<(), SendError> {
        let result = self.session.send_message(text).await;
        if let Err(e) = &result {
            let _ = self.notices.send(ChatError::from(e.clone()).notice());
        }
        result
    }

    /// Input field changed
    pub fn on_text_changed(&self) {
        if self.session.state() == Some(ConnectionState::Connected) && self.session.is_entered() {
            self.debouncer.on_text_changed();
        }
    }

    /// Leave the chat: drop listeners and close the connection. No live
    /// event reaches the view once this returns.
    pub fn leave(&self) {
        self.debouncer.cancel();
        if let Some(forwarder) = self.forwarder.lock().take() {
            forwarder.abort();
        }
        self.session.disconnect();
    }

    /// Re-open the connection after `leave` or a drop
    pub fn resume(&self) {
        self.session.reconnect();
    }

    /// Leave and stop the dispatch task. No notices follow.
    pub fn shutdown(&self) {
        self.leave();
        self.dispatcher.abort();
    }

    pub fn typing_label(&self) -> String {
        self.view.lock().tracker().currently_typing_label()
    }

    pub fn present_count(&self) -> usize {
        self.view.lock().tracker().present_count()
    }

    pub fn present_users(&self) -> Vec<PresentUser> {
        self.view.lock().tracker().present_users()
    }

    pub fn timeline_lines(&self) -> Vec<String> {
        self.view.lock().timeline().display_lines()
    }

    pub fn mention_candidates(&self) -> Vec<String> {
        self.view.lock().tracker().mention_candidates()
    }

    /// Current entry number; bumped each time the chat is entered
    pub fn epoch(&self) -> u64 {
        self.view.lock().epoch()
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }
}

impl Drop for ChatClient {
    fn drop(&mut self) {
        self.dispatcher.abort();
    }
}

struct Dispatcher {
    session: Arc<SessionManager>,
    view: Arc<Mutex<ChatView>>,
    loader: HistoryLoader,
    commands: mpsc::UnboundedSender<Command>,
    notices: mpsc::UnboundedSender<Notice>,
    epoch: u64,
    forwarder: Forwarder,
}

impl Dispatcher {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut errors: mpsc::UnboundedReceiver<ChatError>,
    ) {
        loop {
            tokio::select! {
                Some(command) = commands.recv() => self.handle(command).await,
                Some(error) = errors.recv() => self.report(error),
                else => break,
            }
        }
        if let Some(forwarder) = self.forwarder.lock().take() {
            forwarder.abort();
        }
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Connection(Ok(())) => {
                if !self.session.is_entered() {
                    self.enter().await;
                }
            }
            Command::Connection(Err(e)) => self.report(e),
            Command::Event { epoch, event } => {
                if epoch != self.epoch || !self.session.is_entered() {
                    tracing::trace!(epoch, current_epoch = self.epoch, "Dropping event after leave");
                    return;
                }
                tracing::trace!(event = %event.to_json(), "Live event");
                self.view.lock().apply(event);
            }
            Command::History(batch) => {
                let error = self.view.lock().merge_history(batch);
                if let Some(e) = error {
                    self.report(e.into());
                }
            }
        }
    }

    /// Subscribe, reset the view, then load presence and history.
    async fn enter(&mut self) {
        let events = match self.session.enter_chat().await {
            Ok(events) => events,
            Err(e) => {
                self.report(e.into());
                return;
            }
        };

        self.epoch += 1;
        let epoch = self.epoch;
        let local_client_id = self.session.client_id().unwrap_or_default();
        self.view.lock().reset(epoch, &local_client_id);
        tracing::debug!(epoch, client_id = %local_client_id, "Chat view reset");

        let present = self.session.get_present_users().await;
        self.view.lock().seed_present(&present);

        self.forward(epoch, events);

        if let Some(channel) = self.session.attached_channel() {
            let commands = self.commands.clone();
            self.loader.spawn(channel, epoch, move |batch| {
                let _ = commands.send(Command::History(batch));
            });
        }
    }

    /// Pump live events onto the dispatch queue
    fn forward(&mut self, epoch: u64, events: EventStream) {
        let commands = self.commands.clone();
        let mut events = events;
        let pump = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if commands.send(Command::Event { epoch, event }).is_err() {
                    break;
                }
            }
        });
        if let Some(previous) = self.forwarder.lock().replace(pump) {
            previous.abort();
        }
    }

    fn report(&self, error: ChatError) {
        let notice = error.notice();
        if notice.is_fatal() {
            tracing::error!(notice = %notice.message(), "Fatal notice");
        } else {
            tracing::warn!(notice = %notice.message(), "Notice");
        }
        let _ = self.notices.send(notice);
    }
}
