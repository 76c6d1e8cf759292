use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

#[allow(deprecated)]
fn quire(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("quire").unwrap();
    cmd.current_dir(dir).env_remove("QUIRE_CONFIG");
    cmd
}

const GEMFILE: &str = r#"source "https://rubygems.org"
gem "jekyll", "~> 4.3.2"
group :jekyll_plugins do
  gem "jekyll-feed", "~> 0.12"
end
platforms :mingw, :x64_mingw, :mswin, :jruby do
  gem "tzinfo", ">= 1", "< 3"
end
gem "wdm", "~> 0.1.1", :platforms => [:mingw, :x64_mingw, :mswin]
"#;

#[test]
fn init_then_build_produces_site() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;

    quire(dir.path())
        .args(["init", "."])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created _config.yml"));

    quire(dir.path()).arg("build").assert().success();

    let site = dir.path().join("_site");
    assert!(site.join("index.html").exists());
    assert!(site.join("about/index.html").exists());
    assert!(site.join("feed.xml").exists());
    assert!(site.join("tags/quire.html").exists());
    assert!(site.join("assets/main.css").exists());

    let home = fs::read_to_string(site.join("index.html"))?;
    assert!(home.contains("Welcome to quire"));

    quire(dir.path()).arg("lint").assert().success();
    Ok(())
}

#[test]
fn lint_reports_problems_as_json() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    write(dir.path(), "_config.yml", "title: Test\n");
    write(
        dir.path(),
        "_posts/2021-03-14-untitled.md",
        "---\nlayout: post\n---\n\n```\nplain\n```\n",
    );
    write(dir.path(), "_posts/notes.md", "---\nlayout: post\ntitle: Notes\n---\n");

    let assert = quire(dir.path())
        .args(["lint", "--json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("lint failed"));

    let value: Value = serde_json::from_slice(&assert.get_output().stdout)?;
    assert_eq!(value["documents"], 2);
    let codes: Vec<&str> = value["diagnostics"]
        .as_array()
        .expect("diagnostics array")
        .iter()
        .filter_map(|d| d["code"].as_str())
        .collect();
    assert!(codes.contains(&"frontmatter.title"));
    assert!(codes.contains(&"code.language"));
    assert!(codes.contains(&"filename.date"));

    let title = value["diagnostics"]
        .as_array()
        .unwrap()
        .iter()
        .find(|d| d["code"] == "frontmatter.title")
        .unwrap();
    assert_eq!(title["source_path"], "_posts/2021-03-14-untitled.md");
    assert_eq!(title["severity"], "error");
    Ok(())
}

#[test]
fn lint_deny_warnings() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    write(
        dir.path(),
        "_posts/2021-03-14-hello.md",
        "---\nlayout: post\ntitle: Hello\n---\n\n{% include footer.html %}\n",
    );

    quire(dir.path())
        .arg("lint")
        .assert()
        .success()
        .stdout(predicate::str::contains("[liquid.unsupported]"));

    quire(dir.path())
        .args(["lint", "--deny-warnings"])
        .assert()
        .failure();
    Ok(())
}

#[test]
fn deps_filters_by_platform() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    write(dir.path(), "Gemfile", GEMFILE);

    let assert = quire(dir.path())
        .args(["deps", "--json", "--platform", "x86_64-linux"])
        .assert()
        .success();
    let value: Value = serde_json::from_slice(&assert.get_output().stdout)?;
    let names: Vec<&str> = value["dependencies"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|d| d["name"].as_str())
        .collect();
    assert_eq!(names, vec!["jekyll", "jekyll-feed"]);
    assert_eq!(value["source"], "https://rubygems.org");

    let assert = quire(dir.path())
        .args(["deps", "--json", "--platform", "x64-mingw-ucrt"])
        .assert()
        .success();
    let value: Value = serde_json::from_slice(&assert.get_output().stdout)?;
    assert_eq!(value["dependencies"].as_array().unwrap().len(), 4);

    quire(dir.path())
        .args(["deps", "--all", "--platform", "x86_64-linux"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(inactive)"))
        .stdout(predicate::str::contains("2 of 4 dependencies active"));
    Ok(())
}

#[test]
fn deps_without_manifest_fails() {
    let dir = tempdir().unwrap();
    quire(dir.path())
        .arg("deps")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No manifest found"));
}

#[test]
fn new_creates_post_and_refuses_overwrite() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;

    quire(dir.path())
        .args(["new", "Collection Views", "--tags", "swift,uikit"])
        .assert()
        .success();

    let posts: Vec<_> = fs::read_dir(dir.path().join("_posts"))?
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(posts.len(), 1);
    assert!(posts[0].ends_with("-collection-views.md"));

    let text = fs::read_to_string(dir.path().join("_posts").join(&posts[0]))?;
    assert!(text.contains("title: \"Collection Views\""));
    assert!(text.contains("tags: [\"swift\", \"uikit\"]"));

    quire(dir.path())
        .args(["new", "Collection Views"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
    Ok(())
}
