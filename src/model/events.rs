//! Property-change notification
//!
//! Every effective property write queues a [`PropertyChanged`] event. The queue
//! is drained once the outermost write returns, so listeners always observe a
//! finished mutation. While a node's event is being delivered the node is
//! [`NotifyState::Notifying`]: listeners may still write to it, but those
//! writes don't raise events of their own. Writes to other nodes queue
//! behind the current event, and the nodes that caused them stay
//! `Notifying` while they are delivered, so a chain of listener writes
//! never comes back to a node it started from.

use super::property::PropertyValue;
use super::{NodeId, ShapeTree};
use crate::log::{debug, trace};

/// Event type name of property changes
pub const PROPERTY_CHANGED: &str = "propertyChanged";

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyChanged {
    pub elements: Vec<NodeId>,
    pub name: String,
    pub value: PropertyValue,
    pub old_value: PropertyValue,
}

impl PropertyChanged {
    pub fn event_type(&self) -> &'static str {
        PROPERTY_CHANGED
    }
}

/// Receives property changes. Closures taking `(&mut ShapeTree, &PropertyChanged)` qualify.
pub trait PropertyListener {
    fn property_changed(&mut self, tree: &mut ShapeTree, event: &PropertyChanged);
}

impl<F> PropertyListener for F
where
    F: FnMut(&mut ShapeTree, &PropertyChanged),
{
    fn property_changed(&mut self, tree: &mut ShapeTree, event: &PropertyChanged) {
        self(tree, event)
    }
}

/// Handle returned by [`ShapeTree::add_listener`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);

/// Per-node delivery state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotifyState {
    #[default]
    Idle,
    Notifying,
}

pub(crate) type BoxedListener = Box<dyn PropertyListener>;

/// A queued event and the nodes whose delivery led to it
#[derive(Debug)]
pub(crate) struct PendingEvent {
    event: PropertyChanged,
    cause: Vec<NodeId>,
}

impl ShapeTree {
    pub fn add_listener(&mut self, listener: impl PropertyListener + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listener_ids.insert(id);
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns `false` if the listener was already gone.
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        if !self.listener_ids.remove(&id) {
            return false;
        }
        self.listeners.retain(|(lid, _)| *lid != id);
        if self.dispatching {
            // the listener may be checked out for delivery right now
            self.removed_listeners.push(id);
        }
        true
    }

    pub(crate) fn queue_event(&mut self, event: PropertyChanged) {
        let notifying = event
            .elements
            .iter()
            .any(|id| self.node(*id).is_some_and(|n| n.notify == NotifyState::Notifying));
        if notifying {
            trace!(name = %event.name, "write during delivery, no event");
            return;
        }
        self.pending.push_back(PendingEvent {
            event,
            cause: self.delivering.clone(),
        });
        self.drain_events();
    }

    fn drain_events(&mut self) {
        if self.dispatching {
            return;
        }
        self.dispatching = true;

        while let Some(PendingEvent { event, mut cause }) = self.pending.pop_front() {
            debug!(name = %event.name, listeners = self.listeners.len(), "deliver property change");
            for id in &event.elements {
                if !cause.contains(id) {
                    cause.push(*id);
                }
            }
            self.delivering = cause;
            let active = self.delivering.clone();
            self.set_notify(&active, NotifyState::Notifying);

            let mut listeners = std::mem::take(&mut self.listeners);
            for (id, listener) in listeners.iter_mut() {
                if self.removed_listeners.contains(id) {
                    continue;
                }
                listener.property_changed(self, &event);
            }
            // listeners registered during delivery go after the existing ones
            listeners.append(&mut self.listeners);
            let removed = std::mem::take(&mut self.removed_listeners);
            listeners.retain(|(id, _)| !removed.contains(id));
            self.listeners = listeners;

            self.set_notify(&active, NotifyState::Idle);
            self.delivering.clear();
        }

        self.dispatching = false;
    }

    fn set_notify(&mut self, ids: &[NodeId], state: NotifyState) {
        for id in ids {
            if let Some(node) = self.node_mut(*id) {
                node.notify = state;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::model::stencil::StencilSet;

    const SET: &str = r##"{
        "namespace": "urn:test#",
        "stencils": [
            { "type": "diagram", "id": "Canvas" },
            { "type": "node", "id": "Box", "properties": [
                { "id": "name", "type": "String", "value": "" },
                { "id": "label", "type": "String", "value": "" }
            ] }
        ]
    }"##;

    type Log = Rc<RefCell<Vec<(NodeId, String, PropertyValue)>>>;

    fn setup() -> (ShapeTree, NodeId, NodeId, Log) {
        let set = Rc::new(StencilSet::from_json(SET).unwrap());
        let mut tree = ShapeTree::new(set, "Canvas").unwrap();
        let a = tree.create_shape("Box").unwrap();
        let b = tree.create_shape("Box").unwrap();
        let log: Log = Rc::default();
        let sink = log.clone();
        tree.add_listener(move |_: &mut ShapeTree, event: &PropertyChanged| {
            sink.borrow_mut()
                .push((event.elements[0], event.name.clone(), event.value.clone()));
        });
        (tree, a, b, log)
    }

    #[test]
    fn effective_writes_notify_once() {
        let (mut tree, a, _, log) = setup();
        assert!(tree.set_property(a, "oryx-name", "x").unwrap());
        assert!(!tree.set_property(a, "oryx-name", "x").unwrap());
        assert!(tree.set_property_forced(a, "oryx-name", "x").unwrap());
        assert_eq!(log.borrow().len(), 2);
        assert_eq!(log.borrow()[0], (a, "oryx-name".to_string(), PropertyValue::from("x")));
    }

    #[test]
    fn old_value_is_reported() {
        let (mut tree, a, _, _) = setup();
        let seen = Rc::new(RefCell::new(None));
        let sink = seen.clone();
        tree.add_listener(move |_: &mut ShapeTree, event: &PropertyChanged| {
            *sink.borrow_mut() = Some(event.clone());
        });
        tree.set_property(a, "oryx-name", "first").unwrap();
        tree.set_property(a, "oryx-name", "second").unwrap();
        let event = seen.borrow().clone().unwrap();
        assert_eq!(event.event_type(), "propertyChanged");
        assert_eq!(event.old_value, PropertyValue::from("first"));
        assert_eq!(event.value, PropertyValue::from("second"));
    }

    #[test]
    fn writes_to_the_notifying_node_are_silent() {
        let (mut tree, a, _, log) = setup();
        tree.add_listener(move |tree: &mut ShapeTree, event: &PropertyChanged| {
            if event.name == "oryx-name" {
                tree.set_property(a, "oryx-label", "echo").unwrap();
            }
        });
        tree.set_property(a, "oryx-name", "x").unwrap();

        assert_eq!(log.borrow().len(), 1);
        assert_eq!(tree.property(a, "oryx-label"), Some(&PropertyValue::from("echo")));
        assert_eq!(tree.node(a).unwrap().notify_state(), NotifyState::Idle);
    }

    #[test]
    fn writes_to_other_nodes_queue_in_order() {
        let (mut tree, a, b, log) = setup();
        tree.add_listener(move |tree: &mut ShapeTree, event: &PropertyChanged| {
            if event.elements == [a] && event.name == "oryx-name" {
                tree.set_property(b, "oryx-name", "from a").unwrap();
                tree.set_property(b, "oryx-label", "also from a").unwrap();
            }
        });
        tree.set_property(a, "oryx-name", "x").unwrap();

        let names: Vec<_> = log.borrow().iter().map(|(id, name, _)| (*id, name.clone())).collect();
        assert_eq!(
            names,
            vec![
                (a, "oryx-name".to_string()),
                (b, "oryx-name".to_string()),
                (b, "oryx-label".to_string()),
            ]
        );
    }

    #[test]
    fn ping_pong_between_nodes_stops() {
        let (mut tree, a, b, log) = setup();
        tree.add_listener(move |tree: &mut ShapeTree, event: &PropertyChanged| {
            if event.name != "oryx-name" {
                return;
            }
            let other = if event.elements == [a] { b } else { a };
            let next = format!("{}+", event.value);
            tree.set_property(other, "oryx-name", next).unwrap();
        });
        tree.set_property(a, "oryx-name", "x").unwrap();

        let names: Vec<_> = log.borrow().iter().map(|(id, _, value)| (*id, value.to_string())).collect();
        assert_eq!(names, vec![(a, "x".to_string()), (b, "x+".to_string())]);
        // the write back to `a` is stored without an event
        assert_eq!(tree.property(a, "oryx-name"), Some(&PropertyValue::from("x++")));
        assert_eq!(tree.node(a).unwrap().notify_state(), NotifyState::Idle);
        assert_eq!(tree.node(b).unwrap().notify_state(), NotifyState::Idle);

        // the next outside write starts a fresh chain
        tree.set_property(b, "oryx-name", "y").unwrap();
        assert_eq!(log.borrow().len(), 4);
    }

    #[test]
    fn listeners_change_during_delivery() {
        let (mut tree, a, _, log) = setup();
        let late: Log = Rc::default();
        let late_sink = late.clone();
        let added = Rc::new(RefCell::new(false));
        let added_flag = added.clone();
        tree.add_listener(move |tree: &mut ShapeTree, _: &PropertyChanged| {
            if !*added_flag.borrow() {
                *added_flag.borrow_mut() = true;
                let sink = late_sink.clone();
                tree.add_listener(move |_: &mut ShapeTree, event: &PropertyChanged| {
                    sink.borrow_mut()
                        .push((event.elements[0], event.name.clone(), event.value.clone()));
                });
            }
        });

        tree.set_property(a, "oryx-name", "one").unwrap();
        assert_eq!(log.borrow().len(), 1);
        assert!(late.borrow().is_empty());

        tree.set_property(a, "oryx-name", "two").unwrap();
        assert_eq!(late.borrow().len(), 1);
    }

    #[test]
    fn listener_removed_during_delivery_stops_hearing() {
        let set = Rc::new(StencilSet::from_json(SET).unwrap());
        let mut tree = ShapeTree::new(set, "Canvas").unwrap();
        let a = tree.create_shape("Box").unwrap();
        let b = tree.create_shape("Box").unwrap();

        let hits = Rc::new(RefCell::new(0));
        let counter = hits.clone();
        let victim = Rc::new(RefCell::new(None::<ListenerId>));
        let target = victim.clone();

        tree.add_listener(move |tree: &mut ShapeTree, event: &PropertyChanged| {
            if event.elements == [a] {
                if let Some(id) = target.borrow_mut().take() {
                    assert!(tree.remove_listener(id));
                    assert!(!tree.remove_listener(id));
                }
                tree.set_property(b, "oryx-name", "queued").unwrap();
            }
        });
        let id = tree.add_listener(move |_: &mut ShapeTree, _: &PropertyChanged| {
            *counter.borrow_mut() += 1;
        });
        *victim.borrow_mut() = Some(id);

        tree.set_property(a, "oryx-name", "x").unwrap();
        assert_eq!(*hits.borrow(), 0);
        assert!(!tree.remove_listener(id));
    }

    #[test]
    fn hidden_properties_notify_and_delete() {
        let (mut tree, a, _, log) = setup();
        assert!(tree.set_hidden_property(a, "parentid", Some("p1".into())).unwrap());
        assert_eq!(tree.hidden_property(a, "oryx-parentid"), Some(&PropertyValue::from("p1")));
        assert!(!tree.set_hidden_property(a, "oryx-parentid", Some("p1".into())).unwrap());
        assert!(tree.set_hidden_property(a, "oryx-parentid", None).unwrap());
        assert!(!tree.set_hidden_property(a, "oryx-parentid", None).unwrap());
        assert_eq!(tree.hidden_property(a, "oryx-parentid"), None);

        let log = log.borrow();
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].2, PropertyValue::Null);
    }
}
