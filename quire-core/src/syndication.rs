//! Atom feed and sitemap generation.

use crate::config::Config;
use crate::liquid::absolute_url;
use crate::models::{Article, ArticleKind, SiteIndex};
use chrono::NaiveDate;

/// Atom feed of the newest `feed.posts_limit` posts
pub fn atom_feed(config: &Config, index: &SiteIndex) -> String {
    let posts: Vec<&Article> = index
        .posts()
        .into_iter()
        .filter(|a| a.kind == ArticleKind::Post)
        .take(config.feed.posts_limit)
        .collect();

    let feed_url = absolute_url(&config.url, &config.baseurl, &config.feed.path);
    let site_url = absolute_url(&config.url, &config.baseurl, "");
    let updated = posts
        .iter()
        .filter_map(|p| p.date)
        .max()
        .and_then(|d| rfc3339(&d))
        .unwrap_or_else(|| chrono::Utc::now().to_rfc3339());

    let mut xml = String::new();
    xml.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    xml.push_str("<feed xmlns=\"http://www.w3.org/2005/Atom\">\n");
    xml.push_str(&format!(
        "  <generator uri=\"https://github.com/femtomc/quire\" version=\"{}\">quire</generator>\n",
        env!("CARGO_PKG_VERSION")
    ));
    xml.push_str(&format!(
        "  <link href=\"{}\" rel=\"self\" type=\"application/atom+xml\"/>\n",
        escape_xml(&feed_url)
    ));
    xml.push_str(&format!(
        "  <link href=\"{}\" rel=\"alternate\" type=\"text/html\"/>\n",
        escape_xml(&site_url)
    ));
    xml.push_str(&format!("  <updated>{}</updated>\n", updated));
    xml.push_str(&format!("  <id>{}</id>\n", escape_xml(&feed_url)));
    xml.push_str(&format!(
        "  <title type=\"html\">{}</title>\n",
        escape_xml(&config.title)
    ));
    if !config.description.is_empty() {
        xml.push_str(&format!(
            "  <subtitle>{}</subtitle>\n",
            escape_xml(&config.description)
        ));
    }
    if let Some(author) = config.author.as_deref().filter(|a| !a.is_empty()) {
        xml.push_str(&format!("  <author>\n    <name>{}</name>\n", escape_xml(author)));
        if let Some(email) = config.email.as_deref().filter(|e| !e.is_empty()) {
            xml.push_str(&format!("    <email>{}</email>\n", escape_xml(email)));
        }
        xml.push_str("  </author>\n");
    }

    for post in posts {
        let link = absolute_url(&config.url, &config.baseurl, &post.url());
        xml.push_str("  <entry>\n");
        xml.push_str(&format!(
            "    <title type=\"html\">{}</title>\n",
            escape_xml(&post.title)
        ));
        xml.push_str(&format!(
            "    <link href=\"{}\" rel=\"alternate\" type=\"text/html\" title=\"{}\"/>\n",
            escape_xml(&link),
            escape_xml(&post.title)
        ));
        if let Some(date) = post.date.and_then(|d| rfc3339(&d)) {
            xml.push_str(&format!("    <published>{}</published>\n", date));
            xml.push_str(&format!("    <updated>{}</updated>\n", date));
        }
        xml.push_str(&format!("    <id>{}</id>\n", escape_xml(&link)));
        xml.push_str(&format!(
            "    <content type=\"html\" xml:base=\"{}\">{}</content>\n",
            escape_xml(&link),
            escape_xml(&post.content_html)
        ));
        for category in post.categories.iter().chain(post.tags.iter()) {
            xml.push_str(&format!("    <category term=\"{}\"/>\n", escape_xml(category)));
        }
        if let Some(excerpt) = &post.excerpt {
            xml.push_str(&format!(
                "    <summary type=\"html\">{}</summary>\n",
                escape_xml(excerpt)
            ));
        }
        xml.push_str("  </entry>\n");
    }

    xml.push_str("</feed>\n");
    xml
}

/// Sitemap of the home page and every published article
///
/// Articles with `sitemap: false` in their front matter are left out.
pub fn sitemap(config: &Config, index: &SiteIndex) -> String {
    let mut urls = String::new();

    let writes_home = index.find_by_output_path("index.html").is_some();
    if !writes_home {
        urls.push_str(&format!(
            "  <url><loc>{}</loc></url>\n",
            escape_xml(&absolute_url(&config.url, &config.baseurl, ""))
        ));
    }

    for article in &index.articles {
        if article.kind == ArticleKind::Draft || excluded_from_sitemap(article) {
            continue;
        }
        let loc = absolute_url(&config.url, &config.baseurl, &article.url());
        urls.push_str("  <url>");
        urls.push_str(&format!("<loc>{}</loc>", escape_xml(&loc)));
        if let Some(date) = article.date {
            urls.push_str(&format!("<lastmod>{}</lastmod>", date.format("%Y-%m-%d")));
        }
        urls.push_str("</url>\n");
    }

    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n{}</urlset>\n",
        urls
    )
}

fn excluded_from_sitemap(article: &Article) -> bool {
    matches!(
        article.frontmatter.extra.get("sitemap"),
        Some(serde_yaml::Value::Bool(false))
    )
}

pub fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn rfc3339(date: &NaiveDate) -> Option<String> {
    let datetime = date.and_hms_opt(0, 0, 0)?;
    Some(datetime.and_utc().to_rfc3339())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Frontmatter, Layout};

    fn post(id: &str, date: &str, kind: ArticleKind) -> Article {
        Article {
            kind,
            id: id.into(),
            slug: id.into(),
            title: format!("Post <{}>", id),
            layout: Layout::Post,
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").ok(),
            tags: vec!["swift".into()],
            categories: vec![],
            frontmatter: Frontmatter::default(),
            source_path: format!("_posts/{}.md", id),
            output_path: format!("{}.html", id),
            content_html: "<p>Hi & bye</p>".into(),
            toc_html: None,
            excerpt: Some("Hi".into()),
            show_toc: false,
            raw_body: String::new(),
            body_line: 1,
        }
    }

    fn config() -> Config {
        let mut config =
            Config::from_yaml("title: Notes\nurl: https://example.com\nbaseurl: /blog\n").unwrap();
        config.feed.posts_limit = 2;
        config
    }

    fn index() -> SiteIndex {
        SiteIndex {
            articles: vec![
                post("a", "2021-01-01", ArticleKind::Post),
                post("b", "2021-02-01", ArticleKind::Post),
                post("c", "2021-03-01", ArticleKind::Post),
                post("d", "2021-04-01", ArticleKind::Draft),
            ],
            ..SiteIndex::default()
        }
    }

    #[test]
    fn test_feed_is_limited_and_newest_first() {
        let feed = atom_feed(&config(), &index());
        assert_eq!(feed.matches("<entry>").count(), 2);
        let c = feed.find("https://example.com/blog/c.html").unwrap();
        let b = feed.find("https://example.com/blog/b.html").unwrap();
        assert!(c < b);
        assert!(!feed.contains("/blog/d.html"));
        assert!(feed.contains("<updated>2021-03-01T00:00:00+00:00</updated>"));
        assert!(feed.contains("&lt;p&gt;Hi &amp; bye&lt;/p&gt;"));
        assert!(feed.contains("<title type=\"html\">Post &lt;c&gt;</title>"));
        assert!(feed.contains("rel=\"self\""));
    }

    #[test]
    fn test_sitemap() {
        let mut index = index();
        index.articles[0]
            .frontmatter
            .extra
            .insert("sitemap".into(), serde_yaml::Value::Bool(false));

        let xml = sitemap(&config(), &index);
        assert!(xml.contains("<loc>https://example.com/blog/</loc>"));
        assert!(!xml.contains("a.html"));
        assert!(xml.contains(
            "<loc>https://example.com/blog/b.html</loc><lastmod>2021-02-01</lastmod>"
        ));
        assert!(!xml.contains("d.html"));
    }
}
