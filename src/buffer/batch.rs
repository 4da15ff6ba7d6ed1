use crate::domain::TransformerEvent;
use uuid::Uuid;

/// Contiguous, order-preserving slice of the input events sent in one request.
#[derive(Debug, Clone)]
pub struct Batch {
    id: Uuid,
    index: usize,
    events: Vec<TransformerEvent>,
}

impl Batch {
    pub fn new(index: usize, events: Vec<TransformerEvent>) -> Self {
        Self {
            id: Uuid::new_v4(),
            index,
            events,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Position of this batch in the call, starting at zero.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn size(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[TransformerEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<TransformerEvent> {
        self.events
    }
}

/// Splits `events` into batches of `batch_size`.
///
/// A `batch_size` of zero yields a single batch holding everything. Empty input
/// yields no batches.
pub fn split_into_batches(events: Vec<TransformerEvent>, batch_size: usize) -> Vec<Batch> {
    if events.is_empty() {
        return Vec::new();
    }
    if batch_size == 0 || events.len() <= batch_size {
        return vec![Batch::new(0, events)];
    }

    let mut batches = Vec::with_capacity(events.len().div_ceil(batch_size));
    let mut rest = events.into_iter().peekable();
    while rest.peek().is_some() {
        let chunk: Vec<_> = rest.by_ref().take(batch_size).collect();
        batches.push(Batch::new(batches.len(), chunk));
    }
    batches
}
