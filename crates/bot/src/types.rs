#[derive(Debug, Default)]
pub(crate) struct PollBatchMetrics {
    pub(crate) received_updates: usize,
    pub(crate) skipped_updates: usize,
    pub(crate) dispatched_reminders: usize,
    pub(crate) acknowledgements: usize,
    pub(crate) rejected_inputs: usize,
    pub(crate) failed_events: usize,
}
