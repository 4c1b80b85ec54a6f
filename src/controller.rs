// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Connection state machine and the single consumer of link events.
//!
//! User actions and link events arrive on two queues and are handled one at a
//! time by [`Controller::run`]. Connect attempts run on their own task and
//! report back through the event queue; every link gets a fresh id so events
//! from a link that was already torn down are ignored.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

use crate::bluetooth::constants::EVENT_QUEUE_DEPTH;
use crate::bluetooth::{ActiveLink, Channel, ConnectError, ConnectionEvent, Connector, DeviceCommand};
use crate::config::Config;
use crate::events::EventProcessor;
use crate::mass::ProjectileMass;
use crate::state::{AppState, ConnectionStatus};
use crate::storage::HistoryView;
use crate::ui::{DisplaySink, Notice, UserAction};

enum Step {
    Action(Option<UserAction>),
    Event(ConnectionEvent),
    IdleFlush,
}

/// Drives one chronograph connection.
pub struct Controller<C, D> {
    connector: Arc<C>,
    processor: EventProcessor<D>,
    state: Arc<AppState>,
    config: Config,
    link: Option<ActiveLink>,
    pending_link: Option<u64>,
    next_link_id: u64,
    event_tx: mpsc::Sender<ConnectionEvent>,
    event_rx: mpsc::Receiver<ConnectionEvent>,
    /// History view opened by `ShowHistory`; edits stay in it.
    history: Option<HistoryView>,
    idle_flush: Option<Duration>,
    flush_at: Option<Instant>,
}

impl<C: Connector, D: DisplaySink> Controller<C, D> {
    pub fn new(connector: C, display: D, state: Arc<AppState>, config: Config) -> Self {
        let idle_flush = config.protocol.idle_flush();
        let mass_grams = config.session.mass().grams();
        state.set_mass_grams(mass_grams);
        let processor = EventProcessor::new(display, mass_grams, config.protocol.energy_terminator);
        let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);

        Self {
            connector: Arc::new(connector),
            processor,
            state,
            config,
            link: None,
            pending_link: None,
            next_link_id: 1,
            event_tx,
            event_rx,
            history: None,
            idle_flush,
            flush_at: None,
        }
    }

    pub fn processor(&self) -> &EventProcessor<D> {
        &self.processor
    }

    pub fn status(&self) -> ConnectionStatus {
        self.state.get_status()
    }

    /// Run until `Quit` arrives or the action queue closes.
    pub async fn run(mut self, mut action_rx: mpsc::UnboundedReceiver<UserAction>) -> Result<()> {
        info!("Controller started");

        loop {
            // The event queue never closes: we hold a sender.
            let flush_at = self.flush_at;
            let step = tokio::select! {
                action = action_rx.recv() => Step::Action(action),
                Some(event) = self.event_rx.recv() => Step::Event(event),
                _ = sleep_until(flush_at.unwrap_or_else(Instant::now)), if flush_at.is_some() => {
                    Step::IdleFlush
                }
            };

            match step {
                Step::Action(Some(UserAction::Quit)) | Step::Action(None) => {
                    info!("Quit requested");
                    break;
                }
                Step::Action(Some(action)) => self.handle_action(action).await,
                Step::Event(event) => self.handle_event(event).await,
                Step::IdleFlush => self.flush_idle(),
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// Handle one user action.
    pub async fn handle_action(&mut self, action: UserAction) {
        debug!("Action: {:?}", action);
        match action {
            UserAction::Connect => self.connect(),
            UserAction::Disconnect => self.disconnect().await,
            UserAction::Reset => self.processor.reset_session(),
            UserAction::SetMass(mass) => self.set_mass(mass).await,
            UserAction::ShowStatistics => {
                let stats = self.processor.statistics();
                self.processor.display().show_statistics(&stats);
            }
            UserAction::ShowHistory => {
                let view = HistoryView::from_snapshot(self.processor.snapshot());
                self.processor.display().show_history(&view);
                self.history = Some(view);
            }
            UserAction::RemoveHistoryEntry(position) => self.remove_history_entry(position),
            UserAction::ClearHistory => self.clear_history(),
            UserAction::ShowDetails(position) => self.show_entry(position, HistoryView::details),
            UserAction::ShareEntry(position) => self.show_entry(position, HistoryView::share_text),
            UserAction::Export(target) => self.export(&target),
            UserAction::Quit => {}
        }
    }

    /// Handle one event from a connect task or a reader task.
    pub async fn handle_event(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::ConnectFinished { link_id, result } => {
                self.connect_finished(link_id, result);
            }
            ConnectionEvent::DataReceived { link_id, data } => {
                if self.is_current(link_id) {
                    self.processor.handle_data(&data);
                    self.schedule_flush();
                } else {
                    debug!("Ignoring {} bytes from stale link {}", data.len(), link_id);
                }
            }
            ConnectionEvent::Lost { link_id, reason } => {
                if self.is_current(link_id) {
                    warn!("Link {} lost: {}", link_id, reason);
                    self.teardown().await;
                    self.processor.display().notify(&Notice::LinkLost { reason });
                } else {
                    debug!("Ignoring loss of stale link {}", link_id);
                }
            }
        }
    }

    /// Restart the quiet-period timer while part of a block is buffered.
    fn schedule_flush(&mut self) {
        self.flush_at = match self.idle_flush {
            Some(delay) if self.processor.has_pending() => Some(Instant::now() + delay),
            _ => None,
        };
    }

    /// The link went quiet with a block still buffered.
    pub fn flush_idle(&mut self) {
        self.flush_at = None;
        if self.link.is_none() {
            return;
        }
        let shots = self.processor.flush_idle();
        if !shots.is_empty() {
            debug!("Idle flush recorded {} shots", shots.len());
        }
    }

    fn is_current(&self, link_id: u64) -> bool {
        self.link.as_ref().map(ActiveLink::link_id) == Some(link_id)
    }

    fn connect(&mut self) {
        if self.link.is_some() {
            self.processor.display().notify(&Notice::AlreadyConnected);
            return;
        }
        if self.pending_link.is_some() {
            self.processor.display().notify(&Notice::ConnectInProgress);
            return;
        }

        let link_id = self.next_link_id;
        self.next_link_id += 1;
        self.pending_link = Some(link_id);
        self.set_status(ConnectionStatus::Connecting, None);

        let connector = self.connector.clone();
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            info!("Connect attempt {} started", link_id);
            let result = connector.connect().await;
            if event_tx
                .send(ConnectionEvent::ConnectFinished { link_id, result })
                .await
                .is_err()
            {
                debug!("Controller gone before connect attempt {} finished", link_id);
            }
        });
    }

    fn connect_finished(&mut self, link_id: u64, result: Result<Channel, ConnectError>) {
        if self.pending_link != Some(link_id) {
            // Cancelled by a disconnect; dropping the channel closes it.
            debug!("Discarding result of cancelled connect attempt {}", link_id);
            return;
        }
        self.pending_link = None;

        match result {
            Ok(channel) => {
                let device_name = channel.device_name.clone();
                self.processor.discard_partial();
                self.link = Some(ActiveLink::start(link_id, channel, self.event_tx.clone()));
                self.set_status(ConnectionStatus::Connected, Some(device_name.clone()));
                self.processor.display().notify(&Notice::Connected { device_name });
            }
            Err(e) => {
                error!("Connect attempt {} failed: {}", link_id, e);
                self.set_status(ConnectionStatus::Disconnected, None);
                self.processor.display().notify(&Notice::ConnectFailed(e));
            }
        }
    }

    async fn disconnect(&mut self) {
        if self.link.is_some() {
            self.teardown().await;
        } else if let Some(link_id) = self.pending_link.take() {
            info!("Connect attempt {} cancelled", link_id);
            self.set_status(ConnectionStatus::Disconnected, None);
        } else {
            self.processor.display().notify(&Notice::NotConnected);
            return;
        }
        self.processor.display().notify(&Notice::Disconnected);
    }

    /// Close the active link, if any, and report `Disconnected`.
    async fn teardown(&mut self) {
        if let Some(link) = self.link.take() {
            link.close().await;
        }
        self.flush_at = None;
        self.set_status(ConnectionStatus::Disconnected, None);
    }

    async fn set_mass(&mut self, mass: ProjectileMass) {
        let grams = mass.grams();
        self.processor.set_mass_grams(grams);
        self.state.set_mass_grams(grams);

        let Some(link) = self.link.as_mut() else {
            self.processor.display().notify(&Notice::NotConnected);
            return;
        };

        match link.send(&DeviceCommand::SetMass(grams)).await {
            Ok(()) => {
                info!("Mass set to {}", mass);
                self.processor.display().notify(&Notice::MassSet { grams });
            }
            Err(e) => {
                error!("Failed to send mass: {}", e);
                self.teardown().await;
                self.processor.display().notify(&Notice::LinkLost {
                    reason: e.to_string(),
                });
            }
        }
    }

    fn remove_history_entry(&mut self, position: usize) {
        let Some(view) = self.history.as_mut() else {
            self.processor.display().notify(&Notice::HistoryNotOpen);
            return;
        };
        let notice = match view.remove_at(position) {
            Some(entry) => {
                info!("Shot {} removed from history", entry.shot_number);
                self.processor.display().show_history(view);
                Notice::HistoryEntryRemoved {
                    shot_number: entry.shot_number,
                }
            }
            None => Notice::NoSuchEntry { position },
        };
        self.processor.display().notify(&notice);
    }

    fn clear_history(&mut self) {
        let Some(view) = self.history.as_mut() else {
            self.processor.display().notify(&Notice::HistoryNotOpen);
            return;
        };
        let notice = match view.clear() {
            Ok(count) => Notice::HistoryCleared { count },
            Err(e) => Notice::HistoryFailed(e),
        };
        self.processor.display().notify(&notice);
    }

    fn show_entry(&mut self, position: usize, render: fn(&HistoryView, usize) -> Option<String>) {
        let Some(view) = self.history.as_ref() else {
            self.processor.display().notify(&Notice::HistoryNotOpen);
            return;
        };
        match render(view, position) {
            Some(text) => self.processor.display().show_text(&text),
            None => self.processor.display().notify(&Notice::NoSuchEntry { position }),
        }
    }

    fn export(&mut self, target: &str) {
        let path = self.config.export_path(target);
        let view = self
            .history
            .clone()
            .unwrap_or_else(|| HistoryView::from_snapshot(self.processor.snapshot()));
        let notice = match view.export(&path) {
            Ok(count) => Notice::Exported { count, path },
            Err(e) => {
                warn!("Export to {:?} failed: {}", path, e);
                Notice::ExportFailed {
                    reason: e.to_string(),
                }
            }
        };
        self.processor.display().notify(&notice);
    }

    fn set_status(&mut self, status: ConnectionStatus, device_name: Option<String>) {
        match (status, &device_name) {
            (ConnectionStatus::Connected, Some(name)) => self.state.set_connected(name.clone()),
            (ConnectionStatus::Connecting, _) => self.state.set_connecting(),
            _ => self.state.set_disconnected(),
        }
        self.processor
            .display()
            .connection_changed(status, device_name.as_deref());
    }

    async fn shutdown(&mut self) {
        if self.link.is_some() {
            self.teardown().await;
        }
        self.pending_link = None;
        info!("Controller stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{ShotRecord, Statistics};
    use crate::storage::HistoryError;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

    #[derive(Default)]
    struct Recorder {
        statuses: Vec<ConnectionStatus>,
        notices: Vec<Notice>,
        shots: Vec<ShotRecord>,
        history_sizes: Vec<usize>,
        texts: Vec<String>,
    }

    impl DisplaySink for Recorder {
        fn shot_recorded(&mut self, shot: &ShotRecord, _stats: &Statistics) {
            self.shots.push(shot.clone());
        }
        fn session_cleared(&mut self, _mass_grams: f64) {}
        fn connection_changed(&mut self, status: ConnectionStatus, _device: Option<&str>) {
            self.statuses.push(status);
        }
        fn show_statistics(&mut self, _stats: &Statistics) {}
        fn show_history(&mut self, history: &HistoryView) {
            self.history_sizes.push(history.len());
        }
        fn show_text(&mut self, text: &str) {
            self.texts.push(text.to_string());
        }
        fn notify(&mut self, notice: &Notice) {
            self.notices.push(notice.clone());
        }
    }

    /// Hands out queued results, one per connect call.
    #[derive(Default)]
    struct QueuedConnector {
        results: Mutex<VecDeque<Result<Channel, ConnectError>>>,
    }

    impl QueuedConnector {
        fn push(&self, result: Result<Channel, ConnectError>) {
            self.results.lock().push_back(result);
        }
    }

    impl Connector for QueuedConnector {
        async fn connect(&self) -> Result<Channel, ConnectError> {
            self.results
                .lock()
                .pop_front()
                .unwrap_or(Err(ConnectError::Io("no device".to_string())))
        }
    }

    /// A channel plus the device end of the pipe.
    fn device_pair() -> (Channel, DuplexStream) {
        let (device, host) = tokio::io::duplex(256);
        let (host_read, host_write) = tokio::io::split(host);
        (Channel::new("HC-05", host_read, host_write), device)
    }

    fn controller(connector: QueuedConnector) -> Controller<QueuedConnector, Recorder> {
        Controller::new(connector, Recorder::default(), AppState::new(), Config::default())
    }

    async fn next_event(controller: &mut Controller<QueuedConnector, Recorder>) {
        let event = controller.event_rx.recv().await.unwrap();
        controller.handle_event(event).await;
    }

    /// Record shots straight into the session, as a connected device would.
    fn feed(controller: &mut Controller<QueuedConnector, Recorder>, shots: &[(f64, f64)]) {
        for &(velocity, energy) in shots {
            let block = format!("Shot #1\nSpeed: {velocity}\nEnergy: {energy}\n");
            controller.processor.handle_data(block.as_bytes()).unwrap();
        }
    }

    #[tokio::test]
    async fn test_connect_then_receive_shot() {
        let connector = QueuedConnector::default();
        let (channel, mut device) = device_pair();
        connector.push(Ok(channel));
        let mut controller = controller(connector);

        controller.handle_action(UserAction::Connect).await;
        assert_eq!(controller.status(), ConnectionStatus::Connecting);
        next_event(&mut controller).await;
        assert_eq!(controller.status(), ConnectionStatus::Connected);

        device.write_all(b"Shot #7\nSpeed: 175.32\nEnergy: 3.84\n").await.unwrap();
        while controller.processor().session().count() == 0 {
            next_event(&mut controller).await;
        }

        let shot = controller.processor().session().last_shot().unwrap();
        assert_eq!(shot.index, 1);
        assert_eq!(shot.velocity, 175.32);
        assert_eq!(
            controller.processor.display().statuses,
            vec![ConnectionStatus::Connecting, ConnectionStatus::Connected]
        );
    }

    #[tokio::test]
    async fn test_connect_failure() {
        let connector = QueuedConnector::default();
        connector.push(Err(ConnectError::AdapterOff));
        let mut controller = controller(connector);

        controller.handle_action(UserAction::Connect).await;
        next_event(&mut controller).await;

        assert_eq!(controller.status(), ConnectionStatus::Disconnected);
        assert_eq!(
            controller.processor.display().notices,
            vec![Notice::ConnectFailed(ConnectError::AdapterOff)]
        );
    }

    #[tokio::test]
    async fn test_second_connect_while_pending() {
        let mut controller = controller(QueuedConnector::default());

        controller.handle_action(UserAction::Connect).await;
        controller.handle_action(UserAction::Connect).await;
        assert_eq!(
            controller.processor.display().notices,
            vec![Notice::ConnectInProgress]
        );
    }

    #[tokio::test]
    async fn test_cancelled_connect_is_discarded() {
        let connector = QueuedConnector::default();
        let (channel, _device) = device_pair();
        connector.push(Ok(channel));
        let mut controller = controller(connector);

        controller.handle_action(UserAction::Connect).await;
        controller.handle_action(UserAction::Disconnect).await;
        assert_eq!(controller.status(), ConnectionStatus::Disconnected);

        next_event(&mut controller).await;
        assert_eq!(controller.status(), ConnectionStatus::Disconnected);
        assert!(controller.link.is_none());
    }

    #[tokio::test]
    async fn test_set_mass_sends_command() {
        let connector = QueuedConnector::default();
        let (channel, mut device) = device_pair();
        connector.push(Ok(channel));
        let mut controller = controller(connector);

        controller.handle_action(UserAction::Connect).await;
        next_event(&mut controller).await;

        let mass = ProjectileMass::new(12.5).unwrap();
        controller.handle_action(UserAction::SetMass(mass)).await;

        let mut buf = [0u8; 11];
        device.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"MASS:12.50\n");
        assert_eq!(controller.processor().session().mass_grams(), 12.5);
        assert!(controller
            .processor
            .display()
            .notices
            .contains(&Notice::MassSet { grams: 12.5 }));
    }

    #[tokio::test]
    async fn test_set_mass_while_disconnected() {
        let mut controller = controller(QueuedConnector::default());

        let mass = ProjectileMass::new(0.5).unwrap();
        controller.handle_action(UserAction::SetMass(mass)).await;

        assert_eq!(controller.processor().session().mass_grams(), 0.5);
        assert_eq!(controller.state.get_mass_grams(), 0.5);
        assert_eq!(controller.processor.display().notices, vec![Notice::NotConnected]);
    }

    #[tokio::test]
    async fn test_remote_hangup_and_stale_data() {
        let connector = QueuedConnector::default();
        let (channel, device) = device_pair();
        connector.push(Ok(channel));
        let mut controller = controller(connector);

        controller.handle_action(UserAction::Connect).await;
        next_event(&mut controller).await;

        drop(device);
        next_event(&mut controller).await;
        assert_eq!(controller.status(), ConnectionStatus::Disconnected);
        assert!(matches!(
            controller.processor.display().notices.last(),
            Some(Notice::LinkLost { .. })
        ));

        // Late bytes tagged with the old link id are ignored.
        controller
            .handle_event(ConnectionEvent::DataReceived {
                link_id: 1,
                data: b"Shot #1\nSpeed: 150.0\nEnergy: 2.5\n".to_vec(),
            })
            .await;
        assert_eq!(controller.processor().session().count(), 0);
    }

    #[tokio::test]
    async fn test_disconnect_when_idle() {
        let mut controller = controller(QueuedConnector::default());
        controller.handle_action(UserAction::Disconnect).await;
        assert_eq!(controller.processor.display().notices, vec![Notice::NotConnected]);
        assert!(controller.processor.display().statuses.is_empty());
    }

    #[tokio::test]
    async fn test_history_delete_changes_export_not_session() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            data_dir: dir.path().to_path_buf(),
            ..Config::default()
        };
        let mut controller =
            Controller::new(QueuedConnector::default(), Recorder::default(), AppState::new(), config);
        feed(&mut controller, &[(170.0, 3.0), (180.0, 4.0), (190.0, 5.0)]);

        controller.handle_action(UserAction::ShowHistory).await;
        controller.handle_action(UserAction::RemoveHistoryEntry(1)).await;
        controller.handle_action(UserAction::Export("shots.csv".to_string())).await;

        let csv = std::fs::read_to_string(dir.path().join("shots.csv")).unwrap();
        let rows: Vec<&str> = csv.lines().skip(1).collect();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].starts_with("1;") && rows[0].ends_with(";170.0;3.00"));
        assert!(rows[1].starts_with("3;") && rows[1].ends_with(";190.0;5.00"));

        assert_eq!(controller.processor().session().count(), 3);
        assert_eq!(controller.processor().statistics().count, 3);

        let display = controller.processor.display();
        assert_eq!(display.history_sizes, vec![3, 2]);
        assert!(display.notices.contains(&Notice::HistoryEntryRemoved { shot_number: 2 }));
        assert!(display.notices.contains(&Notice::Exported {
            count: 2,
            path: dir.path().join("shots.csv"),
        }));

        // Reopening starts again from the live session.
        controller.handle_action(UserAction::ShowHistory).await;
        assert_eq!(controller.processor.display().history_sizes, vec![3, 2, 3]);
    }

    #[tokio::test]
    async fn test_history_actions_need_open_view() {
        let mut controller = controller(QueuedConnector::default());
        feed(&mut controller, &[(170.0, 3.0)]);

        controller.handle_action(UserAction::RemoveHistoryEntry(0)).await;
        controller.handle_action(UserAction::ClearHistory).await;
        controller.handle_action(UserAction::ShowDetails(0)).await;
        assert_eq!(
            controller.processor.display().notices,
            vec![Notice::HistoryNotOpen; 3]
        );
        assert_eq!(controller.processor().session().count(), 1);
    }

    #[tokio::test]
    async fn test_history_details_share_and_clear() {
        let mut controller = controller(QueuedConnector::default());
        feed(&mut controller, &[(175.24, 3.834)]);
        controller.handle_action(UserAction::ShowHistory).await;

        controller.handle_action(UserAction::ShowDetails(0)).await;
        controller.handle_action(UserAction::ShareEntry(0)).await;
        controller.handle_action(UserAction::ShareEntry(4)).await;
        controller.handle_action(UserAction::ClearHistory).await;
        controller.handle_action(UserAction::ClearHistory).await;

        let display = controller.processor.display();
        assert_eq!(display.texts.len(), 2);
        assert!(display.texts[0].starts_with("Shot #1\nSpeed: 175.2 m/s"));
        assert!(display.texts[1].starts_with("Shot #1: speed 175.2 m/s, energy 3.83 J"));
        assert_eq!(
            display.notices,
            vec![
                Notice::NoSuchEntry { position: 4 },
                Notice::HistoryCleared { count: 1 },
                Notice::HistoryFailed(HistoryError::AlreadyEmpty),
            ]
        );
        assert_eq!(controller.processor().session().count(), 1);
    }

    #[tokio::test]
    async fn test_idle_flush_records_trailing_block() {
        let connector = QueuedConnector::default();
        let (channel, mut device) = device_pair();
        connector.push(Ok(channel));
        let mut controller = controller(connector);

        controller.handle_action(UserAction::Connect).await;
        next_event(&mut controller).await;

        device
            .write_all(b"Shot #1\nSpeed: 171.0\nEnergy: 3.1Shot #2\nSpeed: 172.0\nEnergy: 3.2")
            .await
            .unwrap();
        // One write lands in one read: the first block is closed by the
        // second one's marker, the second waits for the quiet period.
        while controller.processor().session().count() == 0 {
            next_event(&mut controller).await;
        }
        assert!(controller.processor().has_pending());
        assert!(controller.flush_at.is_some());

        controller.flush_idle();
        assert!(controller.flush_at.is_none());
        assert_eq!(controller.processor().session().count(), 2);
        assert_eq!(controller.processor().session().last_shot().unwrap().energy, 3.2);
    }

    #[tokio::test]
    async fn test_idle_flush_ignored_without_link() {
        let mut controller = controller(QueuedConnector::default());
        controller.processor.handle_data(b"Shot #1\nSpeed: 171.0\nEnergy: 3.1");
        controller.flush_idle();
        assert_eq!(controller.processor().session().count(), 0);
    }

    #[test]
    fn test_out_of_range_configured_mass() {
        let mut config = Config::default();
        config.session.default_mass_grams = 150.0;
        let state = AppState::new();
        let controller =
            Controller::new(QueuedConnector::default(), Recorder::default(), state.clone(), config);

        assert_eq!(controller.processor().session().mass_grams(), 0.25);
        assert_eq!(state.get_mass_grams(), 0.25);
    }
}
