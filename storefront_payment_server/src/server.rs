use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use futures::FutureExt;
use gateway_tools::GatewayRouter;
use log::*;
use storefront_payment_engine::{
    events::{EventHandlers, EventHooks, EventProducers, HandlerResult, OrderClosedEvent, OrderPaidEvent},
    OrderFlowApi,
    SqliteDatabase,
    WebhookDispatcher,
};

use crate::{
    config::ServerConfig,
    errors::ServerError,
    expiry_worker::start_expiry_worker,
    routes::{
        health,
        ApproveOrderRoute,
        AttachGuestOrderRoute,
        CancelOrderRoute,
        CreateOrderRoute,
        OrderByIdRoute,
        PayOrderRoute,
        PaymentWebhookRoute,
        VerifyOrderPaymentRoute,
    },
};

const EVENT_BUFFER_SIZE: usize = 256;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let gateway = GatewayRouter::from_config(config.gateway.clone())
        .map_err(|e| ServerError::ConfigurationError(e.to_string()))?;
    let providers = gateway.configured_providers().iter().map(|p| p.to_string()).collect::<Vec<_>>().join(", ");
    info!("💳️ Payment providers enabled: [{providers}]");
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, create_event_hooks());
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let expiry_api = order_flow_api(&config, db.clone(), gateway.clone(), producers.clone());
    let _expiry_worker = start_expiry_worker(expiry_api, config.expiry_interval, config.unpaid_order_timeout);
    let srv = create_server_instance(config, db, gateway, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    gateway: GatewayRouter,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let host = config.host.clone();
    let port = config.port;
    let srv = HttpServer::new(move || {
        let orders_api = order_flow_api(&config, db.clone(), gateway.clone(), producers.clone());
        let webhook_api = order_flow_api(&config, db.clone(), gateway.clone(), producers.clone());
        let dispatcher = WebhookDispatcher::new(webhook_api);
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("spg::access_log"))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(dispatcher))
            .service(health)
            .service(CreateOrderRoute::<SqliteDatabase, GatewayRouter>::new())
            .service(AttachGuestOrderRoute::<SqliteDatabase, GatewayRouter>::new())
            .service(OrderByIdRoute::<SqliteDatabase, GatewayRouter>::new())
            .service(PayOrderRoute::<SqliteDatabase, GatewayRouter>::new())
            .service(VerifyOrderPaymentRoute::<SqliteDatabase, GatewayRouter>::new())
            .service(CancelOrderRoute::<SqliteDatabase, GatewayRouter>::new())
            .service(ApproveOrderRoute::<SqliteDatabase, GatewayRouter>::new())
            .service(PaymentWebhookRoute::<SqliteDatabase, GatewayRouter>::new())
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}

fn order_flow_api(
    config: &ServerConfig,
    db: SqliteDatabase,
    gateway: GatewayRouter,
    producers: EventProducers,
) -> OrderFlowApi<SqliteDatabase, GatewayRouter> {
    OrderFlowApi::new(db, gateway, producers)
        .with_gateway_timeout(config.gateway.timeout)
        .with_default_currency(&config.default_currency)
}

/// Stands in for the customer notification service. Receipts are not sent from here yet; the hooks only record that
/// a notification is due.
fn create_event_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks.on_order_paid(|ev: OrderPaidEvent| {
        async move {
            let order = &ev.order;
            info!(
                "📬️ Payment receipt due for {} on order {} ({} {}, paid at {})",
                order.buyer,
                order.order_id,
                order.total_price,
                order.currency,
                order.paid_at.map(|t| t.to_rfc3339()).unwrap_or_else(|| "unknown".into())
            );
            HandlerResult::Ok(())
        }
        .boxed()
    });
    hooks.on_order_closed(|ev: OrderClosedEvent| {
        async move {
            let order = &ev.order;
            info!("📬️ Order {} for {} closed ({}). Its stock is back on sale.", order.order_id, order.buyer, ev.reason);
            HandlerResult::Ok(())
        }
        .boxed()
    });
    hooks
}
