use crate::{Channel, resolver::FinalityResolver, stream_client::service::Service};

impl<C: Channel, R: FinalityResolver> Service<C, R> {
    /// Replays every accepted request after the channel came back.
    ///
    /// The tracked entries are discarded first together with any queued record that still
    /// references them; each accepted replay is tracked under its new subscription id. Requests
    /// are submitted one at a time, and a failed resubmission does not stop the rest.
    pub(super) async fn resend(&mut self) {
        let (stale, requests) = self.tracker.take_accepted();
        if requests.is_empty() {
            return;
        }

        let purged = self.queue.purge(&stale);
        info!(
            requests = requests.len(),
            purged,
            last_delivered = ?self.last_delivered,
            "Resending saved requests"
        );

        let total = requests.len();
        let mut failed = 0;
        for request in requests {
            let requested = request.start_from();
            match self.submit(request).await {
                Ok(ack) => debug!(
                    subscription_id = %ack.subscription_id,
                    requested = %requested,
                    starting_block = %ack.starting_block,
                    "Request resent"
                ),
                Err(e) => {
                    failed += 1;
                    error!(error = %e, start_from = %requested, "Failed to resend request");
                }
            }
        }

        if failed > 0 {
            warn!(failed, total, "Some requests could not be resent");
        }
    }
}
