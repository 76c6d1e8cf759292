//! Askama template definitions.

use askama::Template;

/// A titled link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub url: String,
    pub title: String,
}

/// A date in machine and human form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateView {
    /// `2021-03-14`
    pub iso: String,
    /// `Mar 14, 2021`
    pub display: String,
}

/// Site-wide values shared by every template
#[derive(Debug, Clone)]
pub struct SiteMeta {
    pub title: String,
    pub description: String,
    pub author: Option<String>,
    /// Base path with leading and trailing slash
    pub base_url: String,
    pub feed_url: Option<String>,
    /// Emit description, canonical and Open Graph tags
    pub seo: bool,
    /// Header navigation, usually the site's pages
    pub nav: Vec<Link>,
    pub year: i32,
    pub generator: String,
}

/// Values describing the page being rendered
#[derive(Debug, Clone)]
pub struct PageMeta {
    pub title: String,
    pub description: String,
    pub canonical_url: String,
    /// `article` for posts, `website` otherwise
    pub og_type: String,
    pub published: Option<String>,
}

/// A post in a listing
#[derive(Debug, Clone)]
pub struct PostEntry {
    pub url: String,
    pub title: String,
    pub date: Option<DateView>,
    pub excerpt: Option<String>,
}

/// A tag on the tag index
#[derive(Debug, Clone)]
pub struct TagSummary {
    pub name: String,
    pub url: String,
    pub count: usize,
}

/// `post` layout
#[derive(Template)]
#[template(path = "post.html")]
pub struct PostTemplate {
    pub site: SiteMeta,
    pub page: PageMeta,
    pub date: Option<DateView>,
    pub tags: Vec<Link>,
    pub content: String,
    pub toc_html: Option<String>,
    pub show_toc: bool,
    /// Older post
    pub previous: Option<Link>,
    /// Newer post
    pub next: Option<Link>,
}

/// `page` layout
#[derive(Template)]
#[template(path = "page.html")]
pub struct PageTemplate {
    pub site: SiteMeta,
    pub page: PageMeta,
    pub content: String,
    pub toc_html: Option<String>,
    pub show_toc: bool,
}

/// `default` layout: the body inside the site chrome
#[derive(Template)]
#[template(path = "default.html")]
pub struct DefaultTemplate {
    pub site: SiteMeta,
    pub page: PageMeta,
    pub content: String,
}

/// `home` layout: optional body followed by the post list
#[derive(Template)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub site: SiteMeta,
    pub page: PageMeta,
    pub content: String,
    pub posts: Vec<PostEntry>,
}

#[derive(Template)]
#[template(path = "tag.html")]
pub struct TagTemplate {
    pub site: SiteMeta,
    pub page: PageMeta,
    pub tag: String,
    pub posts: Vec<PostEntry>,
}

#[derive(Template)]
#[template(path = "tags.html")]
pub struct TagsIndexTemplate {
    pub site: SiteMeta,
    pub page: PageMeta,
    pub tags: Vec<TagSummary>,
}

/// 404 error page template
#[derive(Template)]
#[template(path = "404.html")]
pub struct NotFoundTemplate {
    pub site: SiteMeta,
    pub page: PageMeta,
}
