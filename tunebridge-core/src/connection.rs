//! Ports to the music page's content script.
//!
//! Only one port drives the coordinator at a time.  Ports of other tabs are
//! parked in arrival order and the earliest one takes over when the live port
//! goes away.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;

pub type TabId = i64;

/// Messages sent from the coordinator to a content script.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PortMessage {
    Connected,
    AlreadyConnected,
    Execute { command: String, options: Value },
}

/// A connection to a content script.  Posting fails once the other side is
/// gone.
pub trait Port {
    fn tab_id(&self) -> TabId;

    fn post(&self, message: &PortMessage) -> Result<(), Error>;

    fn disconnect(&self);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// The port drives the coordinator now.
    Live,
    /// Another port is live, this one waits.
    Parked,
    /// The tab already has a live or parked port.
    AlreadyConnected,
    /// The port went away before it could be told it is connected.
    Gone,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisconnectOutcome {
    /// The live port is gone, the caller should reset state and promote.
    LiveLost,
    ParkedRemoved,
    Unknown,
}

pub struct PortArbiter<P> {
    live: Option<P>,
    parked: VecDeque<P>,
}

impl<P: Port> PortArbiter<P> {
    pub fn new() -> Self {
        Self {
            live: None,
            parked: VecDeque::new(),
        }
    }

    pub fn live_tab(&self) -> Option<TabId> {
        self.live.as_ref().map(Port::tab_id)
    }

    pub fn is_connected(&self) -> bool {
        self.live.is_some()
    }

    pub fn parked_tabs(&self) -> Vec<TabId> {
        self.parked.iter().map(Port::tab_id).collect()
    }

    fn is_known_tab(&self, tab: TabId) -> bool {
        self.live_tab() == Some(tab) || self.parked.iter().any(|port| port.tab_id() == tab)
    }

    pub fn connect(&mut self, port: P) -> ConnectOutcome {
        let tab = port.tab_id();
        if self.is_known_tab(tab) {
            if let Err(err) = port.post(&PortMessage::AlreadyConnected) {
                log::warn!("failed to notify duplicate port of tab {}: {}", tab, err);
            }
            ConnectOutcome::AlreadyConnected
        } else if self.live.is_some() {
            log::info!("parking port of tab {}", tab);
            self.parked.push_back(port);
            ConnectOutcome::Parked
        } else if self.make_live(port) {
            ConnectOutcome::Live
        } else {
            ConnectOutcome::Gone
        }
    }

    pub fn disconnect(&mut self, tab: TabId) -> DisconnectOutcome {
        if self.live_tab() == Some(tab) {
            log::info!("live port of tab {} disconnected", tab);
            self.live = None;
            DisconnectOutcome::LiveLost
        } else if let Some(index) = self.parked.iter().position(|port| port.tab_id() == tab) {
            self.parked.remove(index);
            DisconnectOutcome::ParkedRemoved
        } else {
            DisconnectOutcome::Unknown
        }
    }

    /// Make the earliest parked port live, skipping ports that are gone
    /// already.  Returns the tab of the new live port.
    pub fn promote_next(&mut self) -> Option<TabId> {
        if self.live.is_some() {
            return self.live_tab();
        }
        while let Some(port) = self.parked.pop_front() {
            let tab = port.tab_id();
            if self.make_live(port) {
                return Some(tab);
            }
        }
        None
    }

    pub fn post_to_live(&self, message: &PortMessage) -> Result<(), Error> {
        self.live
            .as_ref()
            .ok_or(Error::PortDisconnected)?
            .post(message)
    }

    /// Drop every port, closing them from our side.
    pub fn disconnect_all(&mut self) {
        for port in self.live.take().into_iter().chain(self.parked.drain(..)) {
            port.disconnect();
        }
    }

    fn make_live(&mut self, port: P) -> bool {
        match port.post(&PortMessage::Connected) {
            Ok(()) => {
                log::info!("port of tab {} is live", port.tab_id());
                self.live = Some(port);
                true
            }
            Err(err) => {
                log::info!("port of tab {} is gone: {}", port.tab_id(), err);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;

    #[derive(Clone)]
    pub struct TestPort {
        pub tab: TabId,
        pub gone: bool,
        pub sent: Rc<RefCell<Vec<PortMessage>>>,
    }

    impl TestPort {
        pub fn new(tab: TabId) -> Self {
            Self {
                tab,
                gone: false,
                sent: Rc::default(),
            }
        }

        pub fn gone(tab: TabId) -> Self {
            Self {
                gone: true,
                ..Self::new(tab)
            }
        }
    }

    impl Port for TestPort {
        fn tab_id(&self) -> TabId {
            self.tab
        }

        fn post(&self, message: &PortMessage) -> Result<(), Error> {
            if self.gone {
                return Err(Error::PortDisconnected);
            }
            self.sent.borrow_mut().push(message.clone());
            Ok(())
        }

        fn disconnect(&self) {}
    }

    #[test]
    fn first_port_goes_live_others_park() {
        let mut ports = PortArbiter::new();
        let first = TestPort::new(1);
        assert_eq!(ports.connect(first.clone()), ConnectOutcome::Live);
        assert_eq!(ports.connect(TestPort::new(2)), ConnectOutcome::Parked);
        assert_eq!(ports.live_tab(), Some(1));
        assert_eq!(ports.parked_tabs(), vec![2]);
        assert_eq!(*first.sent.borrow(), vec![PortMessage::Connected]);
    }

    #[test]
    fn same_tab_is_told_it_is_already_connected() {
        let mut ports = PortArbiter::new();
        ports.connect(TestPort::new(1));
        ports.connect(TestPort::new(2));
        let again = TestPort::new(2);
        assert_eq!(ports.connect(again.clone()), ConnectOutcome::AlreadyConnected);
        assert_eq!(*again.sent.borrow(), vec![PortMessage::AlreadyConnected]);
        assert_eq!(ports.parked_tabs(), vec![2]);
    }

    #[test]
    fn promotion_follows_arrival_order_and_skips_gone_ports() {
        let mut ports = PortArbiter::new();
        ports.connect(TestPort::new(1));
        ports.connect(TestPort::gone(2));
        ports.connect(TestPort::new(3));
        ports.connect(TestPort::new(4));

        assert_eq!(ports.disconnect(1), DisconnectOutcome::LiveLost);
        assert!(!ports.is_connected());
        assert_eq!(ports.promote_next(), Some(3));
        assert_eq!(ports.parked_tabs(), vec![4]);
    }

    #[test]
    fn parked_port_disconnect_leaves_live_alone() {
        let mut ports = PortArbiter::new();
        ports.connect(TestPort::new(1));
        ports.connect(TestPort::new(2));
        assert_eq!(ports.disconnect(2), DisconnectOutcome::ParkedRemoved);
        assert_eq!(ports.disconnect(7), DisconnectOutcome::Unknown);
        assert_eq!(ports.live_tab(), Some(1));
        assert!(ports.parked_tabs().is_empty());
    }

    #[test]
    fn nothing_to_promote() {
        let mut ports: PortArbiter<TestPort> = PortArbiter::new();
        assert_eq!(ports.promote_next(), None);
        assert!(ports.post_to_live(&PortMessage::Connected).is_err());
    }
}
