//! Opaque cursor pagination
//!
//! List endpoints page through their tables by keyset: each page holds rows
//! with `id < boundary` ordered by `id DESC`. The boundary row ID travels to the
//! client as an opaque token produced by [`CursorCodec`], a salted reversible
//! number-to-string encoder. Tokens minted under one salt do not decode under
//! another, so they are not portable across deployments.
//!
//! ```rust
//! use cursor_codec::{next_page_token, parse_page, CursorCodec};
//!
//! let codec = CursorCodec::new("deployment salt", 10);
//! let first = parse_page(&codec, 2, "", 50).unwrap();
//! assert!(first.is_first_page());
//!
//! // two rows fetched with a limit of two: there may be more
//! let token = next_page_token(&codec, 2, first.limit, Some(41)).unwrap();
//! let second = parse_page(&codec, 2, &token, 50).unwrap();
//! assert_eq!(second.before_id, Some(41));
//! ```

mod codec;
mod error;
mod page;

pub use codec::CursorCodec;
pub use error::CursorError;
pub use page::{clamp_page_size, next_page_token, parse_page, Page, PageRequest};
