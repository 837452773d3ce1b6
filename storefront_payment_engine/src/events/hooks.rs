use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{EventHandler, EventProducer, Handler, HandlerResult, OrderClosedEvent, OrderPaidEvent};

type HookFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send>>;

/// The publishing side of every registered hook. Cloned into each `OrderFlowApi`.
#[derive(Default, Clone)]
pub struct EventProducers {
    pub order_paid_producer: Vec<EventProducer<OrderPaidEvent>>,
    pub order_closed_producer: Vec<EventProducer<OrderClosedEvent>>,
}

impl EventProducers {
    pub fn publish_order_paid(&self, event: OrderPaidEvent) {
        for producer in &self.order_paid_producer {
            producer.publish_event(event.clone());
        }
    }

    pub fn publish_order_closed(&self, event: OrderClosedEvent) {
        for producer in &self.order_closed_producer {
            producer.publish_event(event.clone());
        }
    }
}

pub struct EventHandlers {
    on_order_paid: Option<EventHandler<OrderPaidEvent>>,
    on_order_closed: Option<EventHandler<OrderClosedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_order_paid = hooks.on_order_paid.map(|f| EventHandler::new(buffer_size, "order_paid", f));
        let on_order_closed = hooks.on_order_closed.map(|f| EventHandler::new(buffer_size, "order_closed", f));
        Self { on_order_paid, on_order_closed }
    }

    pub fn producers(&self) -> EventProducers {
        EventProducers {
            order_paid_producer: self.on_order_paid.iter().map(EventHandler::subscribe).collect(),
            order_closed_producer: self.on_order_closed.iter().map(EventHandler::subscribe).collect(),
        }
    }

    /// Spawns one task per registered hook. Each task runs until every producer has been dropped.
    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_order_paid {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_order_closed {
            tokio::spawn(handler.start_handler());
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    on_order_paid: Option<Handler<OrderPaidEvent>>,
    on_order_closed: Option<Handler<OrderClosedEvent>>,
}

impl EventHooks {
    pub fn on_order_paid<F>(&mut self, f: F) -> &mut Self
    where F: Fn(OrderPaidEvent) -> HookFuture + Send + Sync + 'static {
        self.on_order_paid = Some(Arc::new(f));
        self
    }

    pub fn on_order_closed<F>(&mut self, f: F) -> &mut Self
    where F: Fn(OrderClosedEvent) -> HookFuture + Send + Sync + 'static {
        self.on_order_closed = Some(Arc::new(f));
        self
    }
}
