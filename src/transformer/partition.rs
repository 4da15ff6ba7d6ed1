use crate::domain::{Response, TransformerResponse};

/// Splits one batch's records by status code.
pub fn partition(records: Vec<TransformerResponse>) -> Response {
    let (events, failed_events) = records.into_iter().partition(TransformerResponse::is_success);
    Response {
        events,
        failed_events,
    }
}

/// Concatenates per-batch results. Order across batches is not meaningful.
pub fn merge<I>(parts: I) -> Response
where
    I: IntoIterator<Item = Response>,
{
    parts.into_iter().fold(Response::default(), |mut total, part| {
        total.merge(part);
        total
    })
}
