//! Webhook routing: match one message against the table and fan out.

use futures::future::join_all;
use tracing::{debug, warn};

use crate::{IncomingMessage, OutboundPayload, RoutingRule, RoutingTable, WebhookDelivery};

/// What happened to one message. Informational; failures are already logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RouteSummary {
    /// Rules whose application id matched (one delivery attempt each).
    pub attempted: usize,
    /// Attempts that ended in a [`crate::DeliveryError`].
    pub failed: usize,
}

/// Delivers `message` to every rule in `table` with a matching application id.
///
/// Matching attempts run concurrently and independently: a failing or slow
/// target neither blocks nor cancels its siblings. No match is not an error.
/// Delivery errors are logged here and never returned.
pub async fn route(
    message: &IncomingMessage,
    table: &RoutingTable,
    delivery: &dyn WebhookDelivery,
) -> RouteSummary {
    let attempts = table
        .matching(message.application_id)
        .map(|rule| deliver_one(rule, message, delivery));
    let results = join_all(attempts).await;

    let summary = RouteSummary {
        attempted: results.len(),
        failed: results.iter().filter(|ok| !**ok).count(),
    };
    if summary.attempted == 0 {
        debug!(app_id = %message.application_id, "no webhook matches message");
    }
    summary
}

async fn deliver_one(
    rule: &RoutingRule,
    message: &IncomingMessage,
    delivery: &dyn WebhookDelivery,
) -> bool {
    let payload = OutboundPayload::build(rule.format, message);
    match delivery.deliver(&rule.target, &payload).await {
        Ok(()) => {
            debug!(
                app_id = %rule.application_id,
                webhook = %rule.display_name,
                host = %rule.target.host(),
                "message delivered"
            );
            true
        }
        Err(e) => {
            warn!(
                app_id = %rule.application_id,
                webhook = %rule.display_name,
                host = %rule.target.host(),
                error = %e,
                "unable to send message to webhook"
            );
            false
        }
    }
}
