use chrono::Duration;
use gateway_tools::GatewayRouter;
use log::*;
use storefront_payment_engine::{
    db_types::Order,
    traits::{PaymentEngineDatabase, PaymentGateway},
    OrderFlowApi,
    SqliteDatabase,
};
use tokio::task::JoinHandle;

/// Starts the expiry worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Every `interval`, orders that are still `Unpaid` after `unpaid_expiry` are cancelled and their stock is returned.
pub fn start_expiry_worker(
    api: OrderFlowApi<SqliteDatabase, GatewayRouter>,
    interval: std::time::Duration,
    unpaid_expiry: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        info!("🕰️ Unpaid order expiry worker started");
        loop {
            timer.tick().await;
            run_expiry_job(&api, unpaid_expiry).await;
        }
    })
}

/// A single pass of the expiry job. Returns the number of orders that were expired.
pub async fn run_expiry_job<B, G>(api: &OrderFlowApi<B, G>, unpaid_expiry: Duration) -> usize
where
    B: PaymentEngineDatabase,
    G: PaymentGateway,
{
    trace!("🕰️ Running unpaid order expiry job");
    match api.expire_unpaid_orders(unpaid_expiry).await {
        Ok(expired) if expired.is_empty() => {
            trace!("🕰️ No orders to expire");
            0
        },
        Ok(expired) => {
            info!("🕰️ {} orders expired", expired.len());
            debug!("🕰️ Expired unpaid orders: {}", order_list(&expired));
            expired.len()
        },
        Err(e) => {
            error!("🕰️ Error running unpaid order expiry job: {e}");
            0
        },
    }
}

fn order_list(orders: &[Order]) -> String {
    orders
        .iter()
        .map(|o| format!("[{}] order_id: {} buyer: {}", o.id, o.order_id, o.buyer))
        .collect::<Vec<String>>()
        .join(", ")
}
