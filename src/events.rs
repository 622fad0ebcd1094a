// Copyright 2022 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

//! Change notifications, one fan-out `broadcast` channel per [`DirectoryHandler`]
//! or [`Drive`](crate::drive::Drive). Mirrors the source's single `OpType`
//! callback, widened to a multi-subscriber channel since a long-lived core
//! may have more than one listener (a FUSE adapter and a change auditor,
//! say) attached at once.

use std::path::PathBuf;
use tokio::sync::broadcast;

/// Mirrors `config.h`'s `OpType`.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum OpKind {
    Created,
    Renamed,
    Added,
    Removed,
    Moved,
    Modified,
}

/// A single filesystem change. `new_path` is set only for `Renamed`/`Moved`.
#[derive(Clone, Debug)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub new_path: Option<PathBuf>,
    pub op: OpKind,
}

impl ChangeEvent {
    pub fn new(path: PathBuf, new_path: Option<PathBuf>, op: OpKind) -> Self {
        Self { path, new_path, op }
    }
}

/// Default channel capacity: generous enough that a slow subscriber
/// doesn't start missing events under ordinary interactive load, without
/// growing unbounded.
const CHANNEL_CAPACITY: usize = 256;

/// Owns the broadcast sender side; cheap to clone, since `broadcast::Sender`
/// already is.
#[derive(Clone)]
pub struct EventSink {
    sender: broadcast::Sender<ChangeEvent>,
}

impl EventSink {
    pub fn new() -> Self {
        let (sender, _receiver) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Registers a new subscriber; it sees only events published after this
    /// call.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    /// Publishes an event. Dropped silently (with a log line) if there are
    /// no subscribers, matching a no-op callback pointer in the source.
    pub fn publish(&self, event: ChangeEvent) {
        if self.sender.receiver_count() == 0 {
            return;
        }
        if self.sender.send(event).is_err() {
            tracing::debug!("change event dropped: no subscribers remaining");
        }
    }
}

impl Default for EventSink {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let sink = EventSink::new();
        let mut rx = sink.subscribe();
        sink.publish(ChangeEvent::new(PathBuf::from("Owner/a.txt"), None, OpKind::Added));
        let event = rx.recv().await.expect("recv");
        assert_eq!(event.op, OpKind::Added);
        assert_eq!(event.path, PathBuf::from("Owner/a.txt"));
    }

    #[tokio::test]
    async fn rename_event_carries_new_path() {
        let sink = EventSink::new();
        let mut rx = sink.subscribe();
        sink.publish(ChangeEvent::new(
            PathBuf::from("Owner/a.txt"),
            Some(PathBuf::from("Owner/b.txt")),
            OpKind::Renamed,
        ));
        let event = rx.recv().await.expect("recv");
        assert_eq!(event.new_path, Some(PathBuf::from("Owner/b.txt")));
    }

    #[test]
    fn publish_without_subscribers_does_not_panic() {
        let sink = EventSink::new();
        sink.publish(ChangeEvent::new(PathBuf::from("Owner/a.txt"), None, OpKind::Added));
    }
}
