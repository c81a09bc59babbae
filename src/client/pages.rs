//! List pagination.
//!
//! A list response carries `count` plus one or more arrays. Pages are
//! fetched in order and their arrays concatenated until a page reports fewer
//! than `page_size` items, or comes back empty.

use std::future::Future;

use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{ClientError, Result};

/// Fetch every page and merge them into one payload.
///
/// `issue_page` runs one fully signed and job-resolved request for the given
/// page number. A page that is not list-shaped ends pagination and is
/// returned as-is.
pub async fn paginate<F, Fut>(
    mut issue_page: F,
    page_size: u32,
    cancel: &CancellationToken,
) -> Result<Value>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Value>>,
{
    let page_size = u64::from(page_size.max(1));
    let mut acc = Map::new();
    let mut total: u64 = 0;
    let mut page: u32 = 1;

    loop {
        if cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }

        let payload = issue_page(page).await?;
        let Value::Object(mut items) = payload else {
            return Ok(payload);
        };

        let Some(count) = items.remove("count") else {
            if items.is_empty() {
                // Nothing (more) to list, e.g. a page past the end.
                return Ok(Value::Object(acc));
            }
            return Ok(Value::Object(items));
        };
        let Some(count) = count.as_u64() else {
            return Err(ClientError::MalformedPage(count));
        };
        let Some(sum) = total.checked_add(count) else {
            return Err(ClientError::MalformedPage(Value::from(count)));
        };
        total = sum;

        for (key, value) in items {
            let merged = acc
                .entry(key)
                .or_insert_with(|| Value::Array(Vec::new()));
            if let Value::Array(merged) = merged {
                match value {
                    Value::Array(elements) => merged.extend(elements),
                    single => merged.push(single),
                }
            }
        }
        acc.insert("count".to_string(), Value::from(total));
        debug!(page, count, total, "accumulated page");

        if count < page_size {
            return Ok(Value::Object(acc));
        }
        page += 1;
    }
}
