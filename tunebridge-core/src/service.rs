//! Runs a `Coordinator` on its own thread.
//!
//! All events, whether from pages, UI surfaces or finished background work,
//! go through one channel, so they are handled strictly one after another.
//! The effects of each event are handed to an `EffectHandler` on the same
//! thread.  Handlers doing slow work (network calls) should do it elsewhere
//! and report back by sending an event through the service's sender.

use crossbeam_channel::Sender;

use crate::{
    actor::{Act, Actor, ActorHandle},
    connection::Port,
    coordinator::{Coordinator, Event},
    effect::Effect,
    error::Error,
};

pub trait EffectHandler {
    fn apply(&mut self, effect: Effect) -> Result<(), Error>;
}

struct CoordinatorWorker<P, H> {
    coordinator: Coordinator<P>,
    handler: H,
}

impl<P, H> Actor for CoordinatorWorker<P, H>
where
    P: Port + Send + 'static,
    H: EffectHandler,
{
    type Message = Event<P>;
    type Error = Error;

    fn handle(&mut self, event: Event<P>) -> Result<Act, Error> {
        if let Event::Shutdown = event {
            log::info!("coordinator shutting down");
            return Ok(Act::Shutdown);
        }
        for effect in self.coordinator.dispatch(event) {
            if let Err(err) = self.handler.apply(effect) {
                log::error!("failed to apply effect: {}", err);
            }
        }
        Ok(Act::Continue)
    }
}

/// Handle to the coordinator thread.
pub struct CoordinatorService<P> {
    worker: ActorHandle<Event<P>>,
}

impl<P> CoordinatorService<P>
where
    P: Port + Send + 'static,
{
    /// Spawn the coordinator thread.  `factory` runs on that thread and gets
    /// a sender for posting events back, e.g. results of background work.
    pub fn spawn<F, H>(factory: F) -> Self
    where
        F: FnOnce(Sender<Event<P>>) -> (Coordinator<P>, H) + Send + 'static,
        H: EffectHandler + 'static,
    {
        let worker = CoordinatorWorker::spawn(move |sender| {
            let (coordinator, handler) = factory(sender);
            CoordinatorWorker {
                coordinator,
                handler,
            }
        });
        Self { worker }
    }

    pub fn sender(&self) -> Sender<Event<P>> {
        self.worker.sender()
    }

    pub fn send(&self, event: Event<P>) -> Result<(), Error> {
        self.worker.send(event).map_err(|_| Error::ServiceStopped)
    }

    /// Ask the coordinator to stop and wait for its thread to finish.
    pub fn shutdown(self) {
        if self.send(Event::Shutdown).is_err() {
            log::warn!("coordinator already stopped");
        }
        self.worker.join();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use serde_json::Map;

    use super::*;
    use crate::{
        connection::{PortMessage, TabId},
        coordinator::CoordinatorConfig,
        settings::{LocalSettings, Settings},
        storage::MemoryStorage,
    };

    struct NullPort(TabId);

    impl Port for NullPort {
        fn tab_id(&self) -> TabId {
            self.0
        }

        fn post(&self, _message: &PortMessage) -> Result<(), Error> {
            Ok(())
        }

        fn disconnect(&self) {}
    }

    struct Collect(Arc<Mutex<Vec<Effect>>>);

    impl EffectHandler for Collect {
        fn apply(&mut self, effect: Effect) -> Result<(), Error> {
            self.0.lock().unwrap().push(effect);
            Ok(())
        }
    }

    #[test]
    fn events_are_handled_until_shutdown() {
        let effects = Arc::new(Mutex::new(Vec::new()));
        let service = CoordinatorService::spawn({
            let effects = effects.clone();
            move |_sender| {
                let coordinator = Coordinator::<NullPort>::new(
                    CoordinatorConfig::default(),
                    Settings::new(Map::new()),
                    LocalSettings::new(Map::new()),
                    Box::new(MemoryStorage::new()),
                );
                (coordinator, Collect(effects))
            }
        });
        service.send(Event::Startup).unwrap();
        service.send(Event::Connect(NullPort(1))).unwrap();
        let sender = service.sender();
        service.shutdown();

        assert!(sender.send(Event::OpenPage).is_err());
        let effects = effects.lock().unwrap();
        assert!(effects.contains(&Effect::SetIcon(crate::effect::Icon::Connected)));
        assert!(effects.contains(&Effect::SetSettingsSync(false)));
    }
}
