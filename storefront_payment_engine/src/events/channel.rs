//! Simple stateless pub-sub event handler
//!
//! This module provides a simple hook system that allows other components (e-mail notifiers, fulfilment systems) to
//! subscribe to payment engine events and react to them. Handlers only receive the event itself and have no access to
//! engine state.
//!
//! Publishing is fire-and-forget. [`EventProducer::publish_event`] never waits: if the handler's queue is full or the
//! handler has gone away, the event is dropped and an error is logged. Handler failures are logged and never retried.
//! Nothing a handler does can affect the state change that produced the event.
use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc,
    },
};

use log::*;
use tokio::sync::mpsc::{self, error::TrySendError};

pub type HandlerResult = Result<(), String>;

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = HandlerResult> + Send>> + Send + Sync>;

pub struct EventHandler<E: Send + Sync + 'static> {
    name: String,
    listener: mpsc::Receiver<E>,
    sender: mpsc::Sender<E>,
    handler: Handler<E>,
}

impl<E: Send + Sync + 'static> EventHandler<E> {
    pub fn new(buffer_size: usize, name: &str, handler: Handler<E>) -> Self {
        let (sender, receiver) = mpsc::channel(buffer_size);
        Self { name: name.to_string(), listener: receiver, sender, handler }
    }

    pub fn subscribe(&self) -> EventProducer<E> {
        EventProducer::new(self.name.clone(), self.sender.clone())
    }

    pub async fn start_handler(mut self) {
        let name = self.name.clone();
        debug!("📬️ Starting {name} event handler");
        // drop the internal sender so that when the last subscriber is dropped, the handler shuts down
        drop(self.sender);
        let jobs = Arc::new(AtomicI64::new(0));
        while let Some(ev) = self.listener.recv().await {
            trace!("📬️ Handling {name} event");
            let handler = Arc::clone(&self.handler);
            jobs.fetch_add(1, Ordering::SeqCst);
            let job = jobs.clone();
            let job_name = name.clone();
            tokio::spawn(async move {
                if let Err(e) = (handler)(ev).await {
                    error!("📬️ The {job_name} event handler failed: {e}. The event will not be retried.");
                }
                job.fetch_sub(1, Ordering::SeqCst);
                trace!("📬️ {job_name} event handled");
            });
        }
        while jobs.load(Ordering::SeqCst) > 0 {
            debug!("📬️ Waiting for {name} jobs to complete");
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
        }
        debug!("📬️ {name} event handler has shut down");
    }
}

#[derive(Clone)]
pub struct EventProducer<E: Send + Sync> {
    name: String,
    sender: mpsc::Sender<E>,
}

impl<E: Send + Sync> EventProducer<E> {
    pub fn new(name: String, sender: mpsc::Sender<E>) -> Self {
        Self { name, sender }
    }

    /// Queues the event without waiting. Returns false if the event had to be dropped.
    pub fn publish_event(&self, event: E) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                error!("📬️ The {} event queue is full. The event has been dropped.", self.name);
                false
            },
            Err(TrySendError::Closed(_)) => {
                error!("📬️ The {} event handler has shut down. The event has been dropped.", self.name);
                false
            },
        }
    }
}
