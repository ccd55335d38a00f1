use crate::outcome::OutcomeEvent;

/// Receiver of outcome events emitted during a run.
///
/// Engines call `on_outcome` synchronously from the virtual user that produced
/// the event, so implementations must tolerate concurrent calls and keep the
/// order of events coming from one caller.
pub trait OutcomeListener: Send + Sync {
    /// Records one executed sampler or composite controller.
    fn on_outcome(&self, event: OutcomeEvent);
}

impl<F> OutcomeListener for F
where
    F: Fn(OutcomeEvent) + Send + Sync,
{
    fn on_outcome(&self, event: OutcomeEvent) {
        self(event)
    }
}
