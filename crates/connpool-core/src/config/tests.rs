//! Tests for configuration sources

use std::collections::HashMap;
use std::io::Write;

use pretty_assertions::assert_eq;

use super::*;

#[test]
fn test_properties_basic_separators() {
    let props = Properties::parse(
        "db.driver=sqlite\n\
         db.url : sqlite::memory:\n\
         db.user faculty\n\
         db.password=\n",
    )
    .expect("parse");

    assert_eq!(props.get("db.driver").as_deref(), Some("sqlite"));
    assert_eq!(props.get("db.url").as_deref(), Some("sqlite::memory:"));
    assert_eq!(props.get("db.user").as_deref(), Some("faculty"));
    assert_eq!(props.get("db.password").as_deref(), Some(""));
    assert_eq!(props.len(), 4);
}

#[test]
fn test_properties_comments_and_blank_lines() {
    let props = Properties::parse(
        "# database settings\n\
         ! legacy comment\n\
         \n\
         \t   \n\
         db.poolsize = 5\n",
    )
    .expect("parse");

    assert_eq!(props.len(), 1);
    assert_eq!(props.get("db.poolsize").as_deref(), Some("5"));
}

#[test]
fn test_properties_line_continuation() {
    let props = Properties::parse("db.url = jdbc:mysql://localhost:3306/\\\n    admission\n")
        .expect("parse");
    assert_eq!(
        props.get("db.url").as_deref(),
        Some("jdbc:mysql://localhost:3306/admission")
    );
}

#[test]
fn test_properties_escaped_backslash_is_not_continuation() {
    let props = Properties::parse("path = C:\\\\data\\\\\nnext = 1\n").expect("parse");
    assert_eq!(props.get("path").as_deref(), Some("C:\\data\\"));
    assert_eq!(props.get("next").as_deref(), Some("1"));
}

#[test]
fn test_properties_escapes() {
    let props = Properties::parse("key\\=with\\:sep = tab\\there\\u0041\n").expect("parse");
    assert_eq!(props.get("key=with:sep").as_deref(), Some("tab\thereA"));
}

#[test]
fn test_properties_malformed_unicode_escape() {
    let err = Properties::parse("bad = \\u00zz\n").unwrap_err();
    assert!(matches!(err, PoolError::Initialization(_)));
}

#[test]
fn test_properties_later_duplicate_wins() {
    let props = Properties::parse("db.poolsize=5\ndb.poolsize=8\n").expect("parse");
    assert_eq!(props.get("db.poolsize").as_deref(), Some("8"));
}

#[test]
fn test_require_missing_key_is_initialization_failure() {
    let props = Properties::new().with("db.driver", "sqlite");
    assert_eq!(props.require("db.driver").expect("present"), "sqlite");

    let err = props.require("db.url").unwrap_err();
    assert!(matches!(err, PoolError::Initialization(ref msg) if msg.contains("db.url")));
}

#[test]
fn test_hash_map_source() {
    let mut map = HashMap::new();
    map.insert("db.user".to_string(), "registrar".to_string());
    let source: &dyn ConfigSource = &map;
    assert_eq!(source.get("db.user").as_deref(), Some("registrar"));
    assert_eq!(source.get("db.password"), None);
}

#[test]
fn test_toml_nested_and_dotted_keys() {
    let table: toml::Table = r#"
        "db.encoding" = "UTF-8"

        [db]
        driver = "sqlite"
        url = "sqlite::memory:"
        poolsize = 8
    "#
    .parse()
    .expect("toml");

    assert_eq!(ConfigSource::get(&table, "db.driver").as_deref(), Some("sqlite"));
    assert_eq!(ConfigSource::get(&table, "db.poolsize").as_deref(), Some("8"));
    assert_eq!(ConfigSource::get(&table, "db.encoding").as_deref(), Some("UTF-8"));
    assert_eq!(ConfigSource::get(&table, "db.user"), None);
    assert_eq!(ConfigSource::get(&table, "db"), None);
}

#[test]
fn test_load_file_by_extension() {
    let dir = tempfile::tempdir().expect("tempdir");

    let props_path = dir.path().join("database.properties");
    let mut file = std::fs::File::create(&props_path).expect("create");
    writeln!(file, "db.driver=sqlite").expect("write");
    let source = load_file(&props_path).expect("load properties");
    assert_eq!(source.get("db.driver").as_deref(), Some("sqlite"));

    let toml_path = dir.path().join("database.toml");
    std::fs::write(&toml_path, "[db]\ndriver = \"mock\"\n").expect("write");
    let source = load_file(&toml_path).expect("load toml");
    assert_eq!(source.get("db.driver").as_deref(), Some("mock"));
}

#[test]
fn test_load_file_missing() {
    let err = load_file("/nonexistent/connpool/database.properties").err().expect("error");
    assert!(matches!(err, PoolError::Initialization(_)));
}
