use std::{
    fmt::Display,
    thread::{self, JoinHandle},
};

use crossbeam_channel::{unbounded, Receiver, SendError, Sender};

pub enum Act {
    Continue,
    Shutdown,
}

/// State owned by a single thread and driven by the messages sent to it.
pub trait Actor: Sized {
    type Message: Send + 'static;
    type Error: Display;

    fn handle(&mut self, msg: Self::Message) -> Result<Act, Self::Error>;

    fn process(mut self, recv: Receiver<Self::Message>) {
        while let Ok(msg) = recv.recv() {
            match self.handle(msg) {
                Ok(Act::Continue) => {}
                Ok(Act::Shutdown) => break,
                Err(err) => {
                    log::error!("error: {}", err);
                    break;
                }
            }
        }
    }

    /// Start the actor on its own thread.  The actor itself is built there by
    /// `factory`, so it does not need to be `Send`.
    fn spawn<F>(factory: F) -> ActorHandle<Self::Message>
    where
        F: FnOnce(Sender<Self::Message>) -> Self + Send + 'static,
    {
        let (send, recv) = unbounded();
        ActorHandle {
            sender: send.clone(),
            thread: thread::spawn(move || {
                factory(send).process(recv);
            }),
        }
    }
}

pub struct ActorHandle<M> {
    thread: JoinHandle<()>,
    sender: Sender<M>,
}

impl<M> ActorHandle<M> {
    pub fn sender(&self) -> Sender<M> {
        self.sender.clone()
    }

    pub fn join(self) {
        let _ = self.thread.join();
    }

    pub fn send(&self, msg: M) -> Result<(), SendError<M>> {
        self.sender.send(msg)
    }
}
