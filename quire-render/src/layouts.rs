//! Wraps rendered articles in their layouts.

use crate::templates::*;
use askama::Template;
use chrono::{Datelike, NaiveDate};
use quire_core::liquid::absolute_url;
use quire_core::permalink::tag_output_path;
use quire_core::{Article, Config, Layout, SiteIndex};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Failed to render {what}: {source}")]
    Template {
        what: String,
        #[source]
        source: askama::Error,
    },
}

pub fn date_view(date: NaiveDate) -> DateView {
    DateView {
        iso: date.format("%Y-%m-%d").to_string(),
        display: date.format("%b %-d, %Y").to_string(),
    }
}

/// Everything the layouts need to know about the site
pub struct SiteContext<'a> {
    config: &'a Config,
    index: &'a SiteIndex,
    site: SiteMeta,
}

impl<'a> SiteContext<'a> {
    pub fn new(config: &'a Config, index: &'a SiteIndex) -> Self {
        let base_url = config.normalized_base_url();

        let mut nav: Vec<Link> = index
            .pages()
            .into_iter()
            .filter(|p| p.output_path != "index.html" && p.output_path != "404.html")
            .filter(|p| p.frontmatter.title().is_some())
            .map(|p| Link {
                url: p.url_with_base(&config.baseurl),
                title: p.title.clone(),
            })
            .collect();
        nav.sort_by(|a, b| a.url.cmp(&b.url));

        let feed_url = index
            .plugins
            .feed
            .then(|| absolute_url(&config.url, &config.baseurl, &config.feed.path));

        let site = SiteMeta {
            title: config.title.clone(),
            description: config.description.clone(),
            author: config.author.clone().filter(|a| !a.trim().is_empty()),
            base_url,
            feed_url,
            seo: index.plugins.seo,
            nav,
            year: chrono::Local::now().year(),
            generator: format!("quire {}", env!("CARGO_PKG_VERSION")),
        };

        Self {
            config,
            index,
            site,
        }
    }

    pub fn site(&self) -> &SiteMeta {
        &self.site
    }

    fn page_meta(&self, title: &str, description: &str, url_path: &str) -> PageMeta {
        PageMeta {
            title: title.to_string(),
            description: description.to_string(),
            canonical_url: absolute_url(&self.config.url, &self.config.baseurl, url_path),
            og_type: "website".to_string(),
            published: None,
        }
    }

    fn article_meta(&self, article: &Article) -> PageMeta {
        let mut meta = self.page_meta(&article.title, &article.description(), &article.url());
        if article.is_post() {
            meta.og_type = "article".to_string();
            meta.published = article.date_string();
        }
        meta
    }

    pub fn post_entry(&self, article: &Article) -> PostEntry {
        PostEntry {
            url: article.url_with_base(&self.config.baseurl),
            title: article.title.clone(),
            date: article.date.map(date_view),
            excerpt: article.excerpt.clone(),
        }
    }

    fn tag_link(&self, tag: &str) -> Link {
        Link {
            url: format!("{}{}", self.site.base_url, tag_output_path(tag)),
            title: tag.to_string(),
        }
    }

    /// Posts for listings: newest first, drafts only when they were built
    fn listed_posts(&self) -> Vec<&'a Article> {
        self.index.posts()
    }

    /// Render an article through its layout
    pub fn render_article(&self, article: &Article) -> Result<String, RenderError> {
        let page = self.article_meta(article);
        let site = self.site.clone();
        let content = article.content_html.clone();

        let result = match article.layout {
            Layout::Post => {
                let posts = self.listed_posts();
                let position = posts.iter().position(|p| p.source_path == article.source_path);
                let link = |p: &&Article| Link {
                    url: p.url_with_base(&self.config.baseurl),
                    title: p.title.clone(),
                };
                let (previous, next) = match position {
                    Some(i) => (
                        posts.get(i + 1).map(link),
                        i.checked_sub(1).and_then(|j| posts.get(j)).map(link),
                    ),
                    None => (None, None),
                };

                PostTemplate {
                    site,
                    page,
                    date: article.date.map(date_view),
                    tags: article.tags.iter().map(|t| self.tag_link(t)).collect(),
                    content,
                    toc_html: article.toc_html.clone(),
                    show_toc: article.show_toc,
                    previous,
                    next,
                }
                .render()
            }
            Layout::Page => PageTemplate {
                site,
                page,
                content,
                toc_html: article.toc_html.clone(),
                show_toc: article.show_toc,
            }
            .render(),
            Layout::Default => DefaultTemplate {
                site,
                page,
                content,
            }
            .render(),
            Layout::Home => HomeTemplate {
                site,
                page,
                content,
                posts: self
                    .listed_posts()
                    .into_iter()
                    .map(|p| self.post_entry(p))
                    .collect(),
            }
            .render(),
        };

        result.map_err(|source| RenderError::Template {
            what: article.source_path.clone(),
            source,
        })
    }

    /// Generated front page, used when no page writes `index.html`
    pub fn render_home(&self) -> Result<String, RenderError> {
        let description = if self.config.description.is_empty() {
            self.config.title.clone()
        } else {
            self.config.description.clone()
        };
        HomeTemplate {
            site: self.site.clone(),
            page: self.page_meta(&self.config.title, &description, ""),
            content: String::new(),
            posts: self
                .listed_posts()
                .into_iter()
                .map(|p| self.post_entry(p))
                .collect(),
        }
        .render()
        .map_err(|source| RenderError::Template {
            what: "home page".to_string(),
            source,
        })
    }

    pub fn render_tag(&self, tag: &str) -> Result<String, RenderError> {
        let title = format!("Posts tagged {}", tag);
        TagTemplate {
            site: self.site.clone(),
            page: self.page_meta(&title, &title, &tag_output_path(tag)),
            tag: tag.to_string(),
            posts: self
                .index
                .tags
                .articles(tag, &self.index.articles)
                .into_iter()
                .map(|p| self.post_entry(p))
                .collect(),
        }
        .render()
        .map_err(|source| RenderError::Template {
            what: format!("tag page '{}'", tag),
            source,
        })
    }

    pub fn render_tags_index(&self) -> Result<String, RenderError> {
        let tags = self
            .index
            .tags
            .tags
            .iter()
            .map(|(name, posts)| TagSummary {
                name: name.clone(),
                url: self.tag_link(name).url,
                count: posts.len(),
            })
            .collect();

        TagsIndexTemplate {
            site: self.site.clone(),
            page: self.page_meta("Tags", "All tags", "tags/"),
            tags,
        }
        .render()
        .map_err(|source| RenderError::Template {
            what: "tag index".to_string(),
            source,
        })
    }

    pub fn render_not_found(&self) -> Result<String, RenderError> {
        NotFoundTemplate {
            site: self.site.clone(),
            page: self.page_meta("Page not found", "Page not found", "404.html"),
        }
        .render()
        .map_err(|source| RenderError::Template {
            what: "404 page".to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_core::{ArticleKind, Frontmatter, PluginSet, TagIndex};

    fn article(id: &str, date: &str, layout: Layout, tags: &[&str]) -> Article {
        let kind = if layout == Layout::Post {
            ArticleKind::Post
        } else {
            ArticleKind::Page
        };
        Article {
            kind,
            id: id.into(),
            slug: id.into(),
            title: format!("Title {}", id),
            layout,
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").ok(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            categories: vec![],
            frontmatter: Frontmatter {
                title: Some(format!("Title {}", id)),
                ..Frontmatter::default()
            },
            source_path: format!("{}.md", id),
            output_path: format!("{}.html", id),
            content_html: format!("<p>Body of {}</p>", id),
            toc_html: Some("<ul id=\"markdown-toc\"></ul>".into()),
            excerpt: Some(format!("About {}", id)),
            show_toc: true,
            raw_body: String::new(),
            body_line: 1,
        }
    }

    fn fixture(seo: bool) -> (Config, SiteIndex) {
        let config = Config::from_yaml(
            "title: Notes & Code\ndescription: A blog\nauthor: Jo\nurl: https://example.com\nbaseurl: /blog\n",
        )
        .unwrap();
        let articles = vec![
            article("old", "2021-01-01", Layout::Post, &["Swift UI"]),
            article("new", "2021-02-01", Layout::Post, &["Swift UI", "uikit"]),
            article("about", "", Layout::Page, &[]),
        ];
        let index = SiteIndex {
            tags: TagIndex::from_articles(&articles),
            articles,
            plugins: PluginSet {
                feed: true,
                sitemap: false,
                seo,
            },
            ..SiteIndex::default()
        };
        (config, index)
    }

    #[test]
    fn test_post_layout() {
        let (config, index) = fixture(true);
        let ctx = SiteContext::new(&config, &index);
        let html = ctx.render_article(&index.articles[0]).unwrap();

        assert!(html.contains("<title>Title old | Notes &amp; Code</title>"));
        assert!(html.contains("<p>Body of old</p>"));
        assert!(html.contains("datetime=\"2021-01-01\">Jan 1, 2021</time>"));
        assert!(html.contains("href=\"/blog/tags/swift-ui.html\""));
        assert!(html.contains("<a class=\"next\" href=\"/blog/new.html\">Title new"));
        assert!(!html.contains("class=\"previous\""));
        assert!(html.contains("id=\"markdown-toc\""));
        assert!(html.contains(
            "<link rel=\"canonical\" href=\"https://example.com/blog/old.html\">"
        ));
        assert!(html.contains("content=\"article\""));
        assert!(html.contains("href=\"https://example.com/blog/feed.xml\""));
        assert!(html.contains("<a class=\"page-link\" href=\"/blog/about.html\">Title about</a>"));
    }

    #[test]
    fn test_seo_tags_follow_plugin() {
        let (config, index) = fixture(false);
        let ctx = SiteContext::new(&config, &index);
        let html = ctx.render_article(&index.articles[2]).unwrap();
        assert!(!html.contains("og:title"));
        assert!(html.contains("<h1 class=\"post-title\">Title about</h1>"));
    }

    #[test]
    fn test_home_lists_newest_first() {
        let (config, index) = fixture(false);
        let ctx = SiteContext::new(&config, &index);
        let html = ctx.render_home().unwrap();
        let new = html.find("Title new").unwrap();
        let old = html.find("Title old").unwrap();
        assert!(new < old);
        assert!(html.contains("About new"));
    }

    #[test]
    fn test_tag_pages() {
        let (config, index) = fixture(false);
        let ctx = SiteContext::new(&config, &index);

        let html = ctx.render_tag("Swift UI").unwrap();
        assert!(html.contains("Posts tagged &ldquo;Swift UI&rdquo;"));
        assert!(html.contains("/blog/new.html"));
        assert!(html.contains("/blog/old.html"));

        let html = ctx.render_tags_index().unwrap();
        assert!(html.contains(
            "<a href=\"/blog/tags/uikit.html\">uikit</a> <span class=\"tag-count\">(1)</span>"
        ));
    }

    #[test]
    fn test_not_found() {
        let (config, index) = fixture(false);
        let html = SiteContext::new(&config, &index).render_not_found().unwrap();
        assert!(html.contains("<h1>404</h1>"));
        assert!(html.contains("href=\"/blog/\""));
    }
}
