//! # quire-render
//!
//! Layout rendering for quire.
//!
//! Article bodies arrive as HTML from `quire-core`; this crate wraps them in
//! the built-in layouts (`default`, `home`, `page`, `post`) with Askama and
//! renders the generated tag and error pages.

pub mod layouts;
pub mod templates;

pub use layouts::{date_view, RenderError, SiteContext};
pub use templates::{DateView, Link, PageMeta, PostEntry, SiteMeta, TagSummary};
