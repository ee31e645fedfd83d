//! Protocol stages of the Doc2X client.
//!
//! Each submodule owns one step of the job lifecycle and performs at most one
//! attempt of its network call(s); retrying is layered on top by
//! [`crate::client::Doc2xClient`].
//!
//! ## Data Flow
//!
//! ```text
//! upload ──▶ status ──▶ decode          export
//! (file→uid) (uid→state) (pages→texts)  (uid→artifact url)
//! ```
//!
//! 1. [`upload`]: probe the local file, pick direct or staged upload,
//!    return the job uid
//! 2. [`status`]: one poll of the job; `success` hands the page array to
//!    [`decode`]
//! 3. [`decode`]: page texts and page locations, with optional
//!    `\(..\)` → `$..$` rewriting
//! 4. [`export`]: request md / tex / docx conversion and fetch its result
//!
//! [`envelope`] is shared by every stage that reads the JSON response body.

pub mod decode;
pub mod envelope;
pub mod export;
pub mod status;
pub mod upload;
