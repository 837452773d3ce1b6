use mockall::mock;
use storefront_payment_engine::{
    db_types::{Order, PaymentConfirmation, PaymentProvider},
    helpers::{CallbackHeaders, SignatureVerifier},
    traits::{GatewayError, PaymentGateway, PaymentInitiation},
};

mock! {
    pub Gateway {}
    impl PaymentGateway for Gateway {
        fn supports(&self, provider: PaymentProvider) -> bool;
        async fn initiate(&self, provider: PaymentProvider, order: &Order) -> Result<PaymentInitiation, GatewayError>;
        async fn verify_payment(&self, provider: PaymentProvider, reference: &str) -> Result<PaymentConfirmation, GatewayError>;
        fn callback_verifier(&self, provider: PaymentProvider) -> Option<SignatureVerifier>;
        fn parse_callback(&self, provider: PaymentProvider, raw_body: &[u8], headers: &CallbackHeaders) -> Result<PaymentConfirmation, GatewayError>;
    }
}
