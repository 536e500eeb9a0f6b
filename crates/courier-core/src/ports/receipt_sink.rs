//! ReceiptSink port - where the vendor client delivers flushed receipts.

use async_trait::async_trait;

use crate::domain::errors::VendorError;
use crate::domain::receipt::DeliveryReceipt;

/// ReceiptSink receives one flushed buffer at a time.
///
/// # Implementations
/// - `HttpReceiptSink`: POST to the ingress route (bearer key)
/// - `IngressSink`: in-process hand-off to `ReceiptIngress`
#[async_trait]
pub trait ReceiptSink: Send + Sync {
    async fn deliver(&self, receipts: Vec<DeliveryReceipt>) -> Result<(), VendorError>;
}
