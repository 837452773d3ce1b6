//! Request handler definitions
//!
//! Define each route and its handler here. Handlers only translate between HTTP and the engine APIs; anything more
//! than that belongs in `storefront_payment_engine`.
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Every engine and gateway call is async for this reason, and the
//! gateway calls carry a timeout so that a slow provider cannot hold a worker indefinitely.
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use log::*;
use storefront_payment_engine::{
    db_types::OrderId,
    order_objects::{ApprovalOutcome, NewOrderRequest},
    traits::{PaymentEngineDatabase, PaymentGateway},
    OrderFlowApi,
    WebhookDispatcher,
};

use crate::{
    data_objects::{AttachParams, AttachResult, JsonResponse, NewOrderParams, PayParams, PaymentRedirect},
    errors::ServerError,
    helpers::callback_headers,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(create_order => Post "/orders" impl PaymentEngineDatabase, PaymentGateway);
/// Checkout.
///
/// Places an order for the given items and reserves their stock. Prices come from the catalog.
///
/// ## Parameters
/// * `user_id` or `guest_id` - who is buying. Exactly one is required.
/// * `items` - a list of `{product_id, quantity}` lines.
/// * `currency` - optional. The server's default currency is used if it is omitted.
///
/// ## Returns
/// * `201` with the new order, `Unpaid`.
/// * `400` if the request is malformed or names an unknown product.
/// * `409` if a product does not have enough stock. Nothing is reserved in that case.
pub async fn create_order<B, G>(
    body: web::Json<NewOrderParams>,
    api: web::Data<OrderFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentEngineDatabase,
    G: PaymentGateway,
{
    let request = NewOrderRequest::try_from(body.into_inner())?;
    debug!("💻️ New order request from {} for {} lines", request.buyer, request.items.len());
    let order = api.create_order(request).await.map_err(|e| {
        debug!("💻️ Could not create order. {e}");
        e
    })?;
    Ok(HttpResponse::Created().json(order))
}

route!(order_by_id => Get "/orders/{order_id}" impl PaymentEngineDatabase, PaymentGateway);
pub async fn order_by_id<B, G>(
    path: web::Path<String>,
    api: web::Data<OrderFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentEngineDatabase,
    G: PaymentGateway,
{
    let order_id = OrderId::from(path.into_inner());
    trace!("💻️ Fetching order {order_id}");
    let order = api.fetch_order(&order_id).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(pay_order => Post "/orders/{order_id}/pay" impl PaymentEngineDatabase, PaymentGateway);
/// Starts a payment with the chosen provider.
///
/// ## Parameters
/// * `provider` - `paystack` or `palmpay`.
///
/// ## Returns
/// The provider's checkout URL and payment reference. The order is `Pending` afterwards.
/// * `409` if the order is not awaiting payment.
/// * `504` if the provider did not answer in time. The order stays `Pending` and the call may be retried.
/// * `502` if the provider refused or could not be reached.
pub async fn pay_order<B, G>(
    path: web::Path<String>,
    body: web::Json<PayParams>,
    api: web::Data<OrderFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentEngineDatabase,
    G: PaymentGateway,
{
    let order_id = OrderId::from(path.into_inner());
    let provider = body.provider()?;
    info!("💻️ Payment request for order {order_id} with {provider}");
    let started = api.begin_payment(&order_id, provider).await.map_err(|e| {
        warn!("💻️ Could not start payment for {order_id}. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(PaymentRedirect::from(started)))
}

route!(verify_order_payment => Post "/orders/{order_id}/verify" impl PaymentEngineDatabase, PaymentGateway);
/// The customer has returned from the provider's checkout page. Asks the provider what happened and applies the
/// answer. Only providers that support polling can be verified this way; the others are confirmed by callback.
pub async fn verify_order_payment<B, G>(
    path: web::Path<String>,
    api: web::Data<OrderFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentEngineDatabase,
    G: PaymentGateway,
{
    let order_id = OrderId::from(path.into_inner());
    debug!("💻️ Verification request for order {order_id}");
    let outcome = api.verify_payment(&order_id).await.map_err(|e| {
        debug!("💻️ Could not verify payment for {order_id}. {e}");
        e
    })?;
    info!("💻️ Payment verification for {order_id}: {outcome}");
    Ok(HttpResponse::Ok().json(outcome))
}

route!(cancel_order => Post "/orders/{order_id}/cancel" impl PaymentEngineDatabase, PaymentGateway);
/// Order cancellation
///
/// Cancels an order that has not been paid and returns its stock. Paid orders cannot be cancelled (`409`).
pub async fn cancel_order<B, G>(
    path: web::Path<String>,
    api: web::Data<OrderFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentEngineDatabase,
    G: PaymentGateway,
{
    let order_id = OrderId::from(path.into_inner());
    info!("💻️ Cancel order request for {order_id}");
    let order = api.cancel_order(&order_id).await.map_err(|e| {
        debug!("💻️ Could not cancel order. {e}");
        e
    })?;
    Ok(HttpResponse::Ok().json(order))
}

route!(approve_order => Post "/orders/{order_id}/approve" impl PaymentEngineDatabase, PaymentGateway);
/// Approves a paid order for fulfilment. An order that is unpaid, cancelled or already approved is rejected with a
/// `409` whose `code` says which.
pub async fn approve_order<B, G>(
    path: web::Path<String>,
    api: web::Data<OrderFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentEngineDatabase,
    G: PaymentGateway,
{
    let order_id = OrderId::from(path.into_inner());
    info!("💻️ Approval request for {order_id}");
    match api.approve_fulfillment(&order_id).await? {
        ApprovalOutcome::Approved(order) => Ok(HttpResponse::Ok().json(order)),
        rejected => {
            debug!("💻️ {rejected}");
            Err(ServerError::approval_rejected(&rejected))
        },
    }
}

route!(attach_guest_order => Post "/orders/attach" impl PaymentEngineDatabase, PaymentGateway);
/// Called when a guest signs up. Their most recent unpaid order is handed over to the new account.
pub async fn attach_guest_order<B, G>(
    body: web::Json<AttachParams>,
    api: web::Data<OrderFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentEngineDatabase,
    G: PaymentGateway,
{
    let AttachParams { guest_id, user_id } = body.into_inner();
    debug!("💻️ Attach request for guest {guest_id} to user {user_id}");
    let order = api.attach_guest_order(&guest_id, &user_id).await?;
    Ok(HttpResponse::Ok().json(AttachResult { attached: order.is_some(), order }))
}

//----------------------------------------------   Webhooks  ----------------------------------------------------
route!(payment_webhook => Post "/payments/webhook/{provider}" impl PaymentEngineDatabase, PaymentGateway);
/// Provider callbacks.
///
/// The body is handed to the dispatcher exactly as it was received, since the signature covers the raw bytes.
///
/// The response is always `200` with the same body, whatever happened to the callback. Providers retry anything
/// else, and a forged callback must not learn whether it got close. The actual outcome is logged and written to the
/// webhook audit log.
pub async fn payment_webhook<B, G>(
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Bytes,
    dispatcher: web::Data<WebhookDispatcher<B, G>>,
) -> HttpResponse
where
    B: PaymentEngineDatabase,
    G: PaymentGateway,
{
    let provider = path.into_inner();
    trace!("💻️ Received {provider} webhook ({} bytes)", body.len());
    let headers = callback_headers(req.headers());
    let outcome = dispatcher.dispatch(&provider, &body, &headers).await;
    if outcome.is_applied() {
        debug!("💻️ {provider} webhook outcome: {outcome}");
    } else {
        warn!("💻️ {provider} webhook was acknowledged but not applied: {outcome}");
    }
    HttpResponse::Ok().json(JsonResponse::success("Webhook received"))
}
