use serde::Serialize;

use crate::codec::CursorCodec;
use crate::error::CursorError;

/// One page of a keyset-paginated listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Empty when the fetched rows did not fill the page
    pub next_page_token: String,
    /// Only meaningful on the first page; zero afterwards
    pub collection_count: i64,
}

/// Keyset bounds for one page: rows with `id < before_id`, newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: i64,
    pub before_id: Option<i64>,
}

impl PageRequest {
    pub fn is_first_page(&self) -> bool {
        self.before_id.is_none()
    }
}

/// Sizes outside `(0, max]` fall back to `max`.
pub fn clamp_page_size(requested: i32, max: i32) -> i32 {
    if requested <= 0 || requested > max {
        max
    } else {
        requested
    }
}

/// Turn the caller's page size and token into keyset bounds.
///
/// The empty token is the start-of-collection sentinel and never reaches the
/// codec. Any other token must decode to exactly one row ID.
pub fn parse_page(
    codec: &CursorCodec,
    page_size: i32,
    page_token: &str,
    max_page_size: i32,
) -> Result<PageRequest, CursorError> {
    let limit = i64::from(clamp_page_size(page_size, max_page_size));

    if page_token.is_empty() {
        return Ok(PageRequest {
            limit,
            before_id: None,
        });
    }

    match codec.decode(page_token)?.as_slice() {
        [boundary] => Ok(PageRequest {
            limit,
            before_id: Some(*boundary),
        }),
        _ => Err(CursorError::Malformed),
    }
}

/// Token for the page after this one, or empty when there may be no more rows.
///
/// `last_id` is the surrogate ID of the last row fetched from storage, which is
/// not necessarily the last item returned to the caller.
pub fn next_page_token(
    codec: &CursorCodec,
    fetched: usize,
    limit: i64,
    last_id: Option<i64>,
) -> Result<String, CursorError> {
    if (fetched as i64) < limit {
        return Ok(String::new());
    }
    match last_id {
        Some(id) => codec.encode(&[id]),
        None => Ok(String::new()),
    }
}
