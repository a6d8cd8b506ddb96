use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::sync::mpsc::{channel, Receiver, Sender};

use crate::properties::{EdgeId, NodeId, ViewId};

/// A typed structure change, published once per logical change after the
/// write lock has been released. Handlers may re-enter the engine for reads
/// without deadlocking, but must re-validate via the version counters before
/// assuming nothing else happened in between.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GraphEvent {
    NodesAdded(ViewId, Vec<NodeId>),
    NodesRemoved(ViewId, Vec<NodeId>),
    NodesMoved(ViewId, Vec<NodeId>),
    EdgesAdded(ViewId, Vec<EdgeId>),
    EdgesRemoved(ViewId, Vec<EdgeId>),
    Expanded(ViewId, NodeId),
    Retracted(ViewId, NodeId),
    MetaEdgesUpdated(ViewId),
    ViewCreated(ViewId),
    ViewDestroyed(ViewId),
    ViewReset(ViewId),
}

impl GraphEvent {
    /// The view this event concerns.
    pub fn view(&self) -> ViewId {
        match self {
            GraphEvent::NodesAdded(v, _) => *v,
            GraphEvent::NodesRemoved(v, _) => *v,
            GraphEvent::NodesMoved(v, _) => *v,
            GraphEvent::EdgesAdded(v, _) => *v,
            GraphEvent::EdgesRemoved(v, _) => *v,
            GraphEvent::Expanded(v, _) => *v,
            GraphEvent::Retracted(v, _) => *v,
            GraphEvent::MetaEdgesUpdated(v) => *v,
            GraphEvent::ViewCreated(v) => *v,
            GraphEvent::ViewDestroyed(v) => *v,
            GraphEvent::ViewReset(v) => *v,
        }
    }
}

impl Display for GraphEvent {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            GraphEvent::NodesAdded(_, _) => write!(f, "NodesAdded"),
            GraphEvent::NodesRemoved(_, _) => write!(f, "NodesRemoved"),
            GraphEvent::NodesMoved(_, _) => write!(f, "NodesMoved"),
            GraphEvent::EdgesAdded(_, _) => write!(f, "EdgesAdded"),
            GraphEvent::EdgesRemoved(_, _) => write!(f, "EdgesRemoved"),
            GraphEvent::Expanded(_, _) => write!(f, "Expanded"),
            GraphEvent::Retracted(_, _) => write!(f, "Retracted"),
            GraphEvent::MetaEdgesUpdated(_) => write!(f, "MetaEdgesUpdated"),
            GraphEvent::ViewCreated(_) => write!(f, "ViewCreated"),
            GraphEvent::ViewDestroyed(_) => write!(f, "ViewDestroyed"),
            GraphEvent::ViewReset(_) => write!(f, "ViewReset"),
        }
    }
}

/// Outbound fan-out channel for structure change events.
///
/// Subscribers receive every event published after they subscribe, in
/// operation completion order. A subscriber whose receiving end has been
/// dropped is pruned on the next dispatch.
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Vec<Sender<GraphEvent>>,
}

impl EventBus {
    pub fn subscribe(&mut self) -> Receiver<GraphEvent> {
        let (tx, rx) = channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn dispatch(&mut self, events: Vec<GraphEvent>) {
        if self.subscribers.is_empty() {
            return;
        }
        for event in events {
            self.subscribers.retain(|tx| {
                if tx.send(event.clone()).is_err() {
                    tracing::debug!("pruning disconnected event subscriber");
                    false
                } else {
                    true
                }
            });
        }
    }
}
