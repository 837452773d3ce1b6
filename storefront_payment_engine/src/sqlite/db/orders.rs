use chrono::{DateTime, Utc};
use log::*;
use sqlx::{FromRow, QueryBuilder, SqliteConnection};

use crate::{
    db_types::{
        parse_or_log,
        Amount,
        Buyer,
        LineItem,
        NewOrder,
        Order,
        OrderId,
        OrderStatus,
        PaymentProvider,
        PaymentStatus,
    },
    traits::StorageError,
};

/// The `orders` table as stored. Statuses are kept as text and converted on the way out.
#[derive(Debug, Clone, FromRow)]
pub struct OrderRow {
    pub id: i64,
    pub order_id: String,
    pub user_id: Option<String>,
    pub guest_id: Option<String>,
    pub total_price: i64,
    pub currency: String,
    pub payment_status: String,
    pub order_status: String,
    pub provider_reference: Option<String>,
    pub payment_method: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub stock_released: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<LineItem>) -> Result<Order, StorageError> {
        let buyer = Buyer::from_parts(self.user_id, self.guest_id)
            .map_err(|e| StorageError::CorruptRecord(format!("Order {}: {e}", self.order_id)))?;
        let payment_method = match self.payment_method {
            Some(m) => Some(
                m.parse::<PaymentProvider>()
                    .map_err(|e| StorageError::CorruptRecord(format!("Order {}: {e}", self.order_id)))?,
            ),
            None => None,
        };
        Ok(Order {
            id: self.id,
            order_id: OrderId(self.order_id),
            buyer,
            items,
            total_price: Amount::from(self.total_price),
            currency: self.currency,
            payment_status: parse_or_log(&self.payment_status, PaymentStatus::Failed),
            order_status: parse_or_log(&self.order_status, OrderStatus::Cancelled),
            provider_reference: self.provider_reference,
            payment_method,
            paid_at: self.paid_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Inserts a new order and its line items. This is not atomic on its own: run it inside a transaction and pass
/// `&mut tx` as the connection so that an order never exists without its items.
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, StorageError> {
    let NewOrder { order_id, buyer, items, total_price, currency, created_at } = order;
    let row: OrderRow = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_id,
                user_id,
                guest_id,
                total_price,
                currency,
                payment_status,
                order_status,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, 'Unpaid', 'PendingFulfillment', $6, $6)
            RETURNING *;
        "#,
    )
    .bind(order_id.as_str())
    .bind(buyer.user_id())
    .bind(buyer.guest_id())
    .bind(total_price.value())
    .bind(currency)
    .bind(created_at)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref d) if d.is_unique_violation() => StorageError::OrderAlreadyExists(order_id.clone()),
        e => StorageError::from(e),
    })?;
    for (position, item) in items.iter().enumerate() {
        sqlx::query(
            r#"
                INSERT INTO order_items (order_id, position, product_id, quantity, unit_price)
                VALUES ($1, $2, $3, $4, $5);
            "#,
        )
        .bind(order_id.as_str())
        .bind(position as i64)
        .bind(item.product_id.as_str())
        .bind(item.quantity)
        .bind(item.unit_price.value())
        .execute(&mut *conn)
        .await?;
    }
    debug!("📝️ Order {order_id} inserted with id {} and {} line items", row.id, items.len());
    row.into_order(items)
}

pub async fn fetch_items(order_id: &str, conn: &mut SqliteConnection) -> Result<Vec<LineItem>, sqlx::Error> {
    let items = sqlx::query_as(
        "SELECT product_id, quantity, unit_price FROM order_items WHERE order_id = $1 ORDER BY position ASC",
    )
    .bind(order_id)
    .fetch_all(conn)
    .await?;
    Ok(items)
}

/// Attaches the line items to a row read from the `orders` table.
async fn hydrate(row: Option<OrderRow>, conn: &mut SqliteConnection) -> Result<Option<Order>, StorageError> {
    match row {
        Some(row) => {
            let items = fetch_items(&row.order_id, conn).await?;
            Ok(Some(row.into_order(items)?))
        },
        None => Ok(None),
    }
}

pub async fn fetch_order(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, StorageError> {
    let row = sqlx::query_as("SELECT * FROM orders WHERE order_id = $1")
        .bind(order_id.as_str())
        .fetch_optional(&mut *conn)
        .await?;
    hydrate(row, conn).await
}

pub async fn fetch_order_by_provider_reference(
    provider: PaymentProvider,
    reference: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, StorageError> {
    let row = sqlx::query_as("SELECT * FROM orders WHERE payment_method = $1 AND provider_reference = $2")
        .bind(provider.as_str())
        .bind(reference)
        .fetch_optional(&mut *conn)
        .await?;
    hydrate(row, conn).await
}

pub async fn try_begin_payment(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, StorageError> {
    let row = sqlx::query_as(
        r#"
            UPDATE orders SET payment_status = 'Pending', updated_at = $1
            WHERE order_id = $2
              AND order_status = 'PendingFulfillment'
              AND (payment_status = 'Unpaid' OR (payment_status = 'Pending' AND provider_reference IS NULL))
            RETURNING *;
        "#,
    )
    .bind(Utc::now())
    .bind(order_id.as_str())
    .fetch_optional(&mut *conn)
    .await?;
    hydrate(row, conn).await
}

pub async fn try_set_provider_reference(
    order_id: &OrderId,
    provider: PaymentProvider,
    reference: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, StorageError> {
    let row = sqlx::query_as(
        r#"
            UPDATE orders SET provider_reference = $1, payment_method = $2, updated_at = $3
            WHERE order_id = $4
              AND order_status = 'PendingFulfillment'
              AND payment_status = 'Pending'
              AND provider_reference IS NULL
            RETURNING *;
        "#,
    )
    .bind(reference)
    .bind(provider.as_str())
    .bind(Utc::now())
    .bind(order_id.as_str())
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| map_reference_conflict(e, reference))?;
    hydrate(row, conn).await
}

pub async fn try_mark_paid(
    order_id: &OrderId,
    provider: PaymentProvider,
    reference: &str,
    paid_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, StorageError> {
    let row = sqlx::query_as(
        r#"
            UPDATE orders SET
                payment_status = 'Paid',
                paid_at = $1,
                updated_at = $2,
                provider_reference = COALESCE(provider_reference, $3),
                payment_method = COALESCE(payment_method, $4)
            WHERE order_id = $5
              AND payment_status IN ('Unpaid', 'Pending')
              AND order_status = 'PendingFulfillment'
              AND (provider_reference IS NULL OR provider_reference = $3)
              AND (payment_method IS NULL OR payment_method = $4)
            RETURNING *;
        "#,
    )
    .bind(paid_at)
    .bind(Utc::now())
    .bind(reference)
    .bind(provider.as_str())
    .bind(order_id.as_str())
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| map_reference_conflict(e, reference))?;
    hydrate(row, conn).await
}

pub async fn try_mark_failed(
    order_id: &OrderId,
    provider: PaymentProvider,
    reference: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, StorageError> {
    let row = sqlx::query_as(
        r#"
            UPDATE orders SET
                payment_status = 'Failed',
                updated_at = $1,
                provider_reference = COALESCE(provider_reference, $2),
                payment_method = COALESCE(payment_method, $3)
            WHERE order_id = $4
              AND payment_status IN ('Unpaid', 'Pending')
              AND order_status = 'PendingFulfillment'
              AND (provider_reference IS NULL OR provider_reference = $2)
              AND (payment_method IS NULL OR payment_method = $3)
            RETURNING *;
        "#,
    )
    .bind(Utc::now())
    .bind(reference)
    .bind(provider.as_str())
    .bind(order_id.as_str())
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| map_reference_conflict(e, reference))?;
    hydrate(row, conn).await
}

pub async fn try_cancel(
    order_id: &OrderId,
    allowed: &[PaymentStatus],
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, StorageError> {
    if allowed.is_empty() {
        return Ok(None);
    }
    let mut builder = QueryBuilder::new("UPDATE orders SET order_status = 'Cancelled', updated_at = ");
    builder.push_bind(Utc::now());
    builder.push(" WHERE order_id = ");
    builder.push_bind(order_id.as_str());
    builder.push(" AND order_status = 'PendingFulfillment' AND payment_status IN (");
    let mut statuses = builder.separated(", ");
    for status in allowed {
        statuses.push_bind(status.to_string());
    }
    statuses.push_unseparated(") RETURNING *");
    trace!("📝️ Executing query: {}", builder.sql());
    let row = builder.build_query_as::<OrderRow>().fetch_optional(&mut *conn).await?;
    hydrate(row, conn).await
}

pub async fn try_approve(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, StorageError> {
    let row = sqlx::query_as(
        r#"
            UPDATE orders SET order_status = 'Approved', updated_at = $1
            WHERE order_id = $2 AND order_status = 'PendingFulfillment' AND payment_status = 'Paid'
            RETURNING *;
        "#,
    )
    .bind(Utc::now())
    .bind(order_id.as_str())
    .fetch_optional(&mut *conn)
    .await?;
    hydrate(row, conn).await
}

pub async fn try_claim_stock_release(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, StorageError> {
    let row = sqlx::query_as(
        r#"
            UPDATE orders SET stock_released = TRUE, updated_at = $1
            WHERE order_id = $2 AND stock_released = FALSE
            RETURNING *;
        "#,
    )
    .bind(Utc::now())
    .bind(order_id.as_str())
    .fetch_optional(&mut *conn)
    .await?;
    hydrate(row, conn).await
}

pub async fn try_attach_guest_order(
    guest_id: &str,
    user_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, StorageError> {
    let row = sqlx::query_as(
        r#"
            UPDATE orders SET user_id = $1, guest_id = NULL, updated_at = $2
            WHERE id = (
                SELECT id FROM orders
                WHERE guest_id = $3 AND payment_status = 'Unpaid' AND order_status = 'PendingFulfillment'
                ORDER BY created_at DESC, id DESC
                LIMIT 1
            )
              AND guest_id = $3
              AND payment_status = 'Unpaid'
            RETURNING *;
        "#,
    )
    .bind(user_id)
    .bind(Utc::now())
    .bind(guest_id)
    .fetch_optional(&mut *conn)
    .await?;
    hydrate(row, conn).await
}

pub async fn fetch_closed_orders_holding_stock(conn: &mut SqliteConnection) -> Result<Vec<Order>, StorageError> {
    let rows: Vec<OrderRow> = sqlx::query_as(
        r#"
            SELECT * FROM orders
            WHERE stock_released = FALSE AND (order_status = 'Cancelled' OR payment_status = 'Failed')
            ORDER BY updated_at ASC;
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;
    let mut orders = Vec::with_capacity(rows.len());
    for row in rows {
        let items = fetch_items(&row.order_id, &mut *conn).await?;
        orders.push(row.into_order(items)?);
    }
    Ok(orders)
}

/// Orders awaiting fulfilment that never got a payment under way: `Unpaid` orders created before the cutoff, and
/// `Pending` orders without a provider reference that were last touched before the cutoff.
fn expirable(cutoff: &str) -> String {
    format!(
        r#"
            order_status = 'PendingFulfillment'
            AND (
                (payment_status = 'Unpaid' AND created_at < {cutoff})
                OR (payment_status = 'Pending' AND provider_reference IS NULL AND updated_at < {cutoff})
            )
        "#
    )
}

pub async fn fetch_expirable_orders(
    cutoff: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, StorageError> {
    let sql = format!("SELECT * FROM orders WHERE {} ORDER BY created_at ASC", expirable("$1"));
    let rows: Vec<OrderRow> = sqlx::query_as(&sql).bind(cutoff).fetch_all(&mut *conn).await?;
    let mut orders = Vec::with_capacity(rows.len());
    for row in rows {
        let items = fetch_items(&row.order_id, &mut *conn).await?;
        orders.push(row.into_order(items)?);
    }
    Ok(orders)
}

pub async fn try_expire(
    order_id: &OrderId,
    cutoff: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, StorageError> {
    let sql = format!(
        "UPDATE orders SET order_status = 'Cancelled', updated_at = $1 WHERE order_id = $2 AND {} RETURNING *",
        expirable("$3")
    );
    let row = sqlx::query_as(&sql)
        .bind(Utc::now())
        .bind(order_id.as_str())
        .bind(cutoff)
        .fetch_optional(&mut *conn)
        .await?;
    hydrate(row, conn).await
}

fn map_reference_conflict(e: sqlx::Error, reference: &str) -> StorageError {
    match e {
        sqlx::Error::Database(ref d) if d.is_unique_violation() => {
            StorageError::DuplicateProviderReference(reference.to_string())
        },
        e => StorageError::from(e),
    }
}
