use crate::frequency::{FrequencyTable, PostId, PostOperatorCounts, TopicMembership};
use anyhow::{Context, Result};
use indexmap::IndexMap;
use json::JsonValue;
use log::debug;
use regex::RegexBuilder;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A JSON document that parsed fine but does not have the expected shape.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("{}: expected {expected}", file.display())]
    Shape { file: PathBuf, expected: &'static str },
    #[error("{}: count of operator {operator} in {post} is not a non-negative integer", file.display())]
    Count { file: PathBuf, post: String, operator: String },
    #[error("no file matching {library} in {}", dir.display())]
    MissingLibraryFile { library: String, dir: PathBuf },
}

fn shape(source: &Path, expected: &'static str) -> InputError {
    InputError::Shape {
        file: source.to_path_buf(),
        expected,
    }
}

/// Read and parse a JSON file
pub async fn read_json(path: impl AsRef<Path>) -> Result<JsonValue> {
    let path = path.as_ref();
    debug!("reading {}", path.display());
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    json::parse(&text).with_context(|| format!("failed to parse {}", path.display()))
}

/// Interpret `{ "<post>": { "<operator>": <count>, ... }, ... }`.
pub fn parse_post_operator_counts(value: &JsonValue, source: &Path) -> Result<PostOperatorCounts> {
    if !value.is_object() {
        return Err(shape(source, "an object of posts").into());
    }
    let mut counts = PostOperatorCounts::new();
    for (post, operators) in value.entries() {
        if !operators.is_object() {
            return Err(shape(source, "an object of operator counts for every post").into());
        }
        let mut post_counts = IndexMap::new();
        for (operator, count) in operators.entries() {
            let count = count.as_u64().ok_or_else(|| InputError::Count {
                file: source.to_path_buf(),
                post: post.to_owned(),
                operator: operator.to_owned(),
            })?;
            post_counts.insert(operator.to_owned(), count);
        }
        counts.insert(PostId::parse(post), post_counts);
    }
    Ok(counts)
}

pub async fn load_post_operator_counts(path: impl AsRef<Path>) -> Result<PostOperatorCounts> {
    let path = path.as_ref();
    parse_post_operator_counts(&read_json(path).await?, path)
}

/// Interpret `[<post id>, ...]`.
pub fn parse_topic_membership(value: &JsonValue, source: &Path) -> Result<TopicMembership> {
    if !value.is_array() {
        return Err(shape(source, "an array of post ids").into());
    }
    value
        .members()
        .map(|id| id.as_u64().ok_or_else(|| shape(source, "post ids to be non-negative integers").into()))
        .collect()
}

pub async fn load_topic_membership(path: impl AsRef<Path>) -> Result<TopicMembership> {
    let path = path.as_ref();
    parse_topic_membership(&read_json(path).await?, path)
}

/// Interpret `{ "<operator>": <count>, ... }`, keeping the file's order.
pub fn parse_frequency_table(value: &JsonValue, source: &Path) -> Result<FrequencyTable> {
    if !value.is_object() {
        return Err(shape(source, "an object of operator counts").into());
    }
    value
        .entries()
        .map(|(operator, count)| {
            let count = count.as_u64().ok_or_else(|| InputError::Count {
                file: source.to_path_buf(),
                post: String::from("table"),
                operator: operator.to_owned(),
            })?;
            Ok::<_, anyhow::Error>((operator, count))
        })
        .collect()
}

pub async fn load_frequency_table(path: impl AsRef<Path>) -> Result<FrequencyTable> {
    let path = path.as_ref();
    parse_frequency_table(&read_json(path).await?, path)
}

/// Interpret a library manifest: `["<operator>", ...]`.
pub fn parse_manifest(value: &JsonValue, source: &Path) -> Result<Vec<String>> {
    if !value.is_array() {
        return Err(shape(source, "an array of operator names").into());
    }
    value
        .members()
        .map(|operator| {
            operator
                .as_str()
                .map(str::to_owned)
                .ok_or_else(|| shape(source, "operator names to be strings").into())
        })
        .collect()
}

pub async fn load_manifest(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    parse_manifest(&read_json(path).await?, path)
}

/// Find the file in `dir` whose name contains `library`, ignoring case.
/// File names are searched in sorted order and the first match wins.
pub async fn find_library_file(dir: impl AsRef<Path>, library: &str) -> Result<PathBuf> {
    let dir = dir.as_ref();
    let pattern = RegexBuilder::new(&regex::escape(library)).case_insensitive(true).build()?;
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("failed to list {}", dir.display()))?;
    let mut file_names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            file_names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    file_names.sort();
    file_names
        .into_iter()
        .find(|name| pattern.is_match(name))
        .map(|name| dir.join(name))
        .ok_or_else(|| {
            InputError::MissingLibraryFile {
                library: library.to_owned(),
                dir: dir.to_path_buf(),
            }
            .into()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::hashset;

    fn source() -> &'static Path {
        Path::new("test.json")
    }

    #[test]
    fn test_parse_post_operator_counts() {
        let value = json::parse(r#"{"2": {"map": 3}, "1": {"map": 2, "filter": 1}}"#).unwrap();
        let counts = parse_post_operator_counts(&value, source()).unwrap();
        let posts: Vec<_> = counts.iter().map(|(post, ops)| (post.clone(), ops.len())).collect();
        assert_eq!(posts, vec![(PostId::Numeric(1), 2), (PostId::Numeric(2), 1)]);
        let table = crate::frequency::aggregate(&counts, None);
        assert_eq!(table.to_vec(), vec![("map", 5), ("filter", 1)]);
    }

    #[test]
    fn test_parse_post_operator_counts_with_archive_names() {
        let value = json::parse(r#"{"a-v1.tar.gz": {"zip": 1}, "b-v2.tar.gz": {"zip": 0, "scan": 4}}"#).unwrap();
        let counts = parse_post_operator_counts(&value, source()).unwrap();
        assert_eq!(counts.len(), 2);
        assert_eq!(crate::frequency::aggregate(&counts, None).to_vec(), vec![("zip", 1), ("scan", 4)]);
    }

    #[test]
    fn test_parse_post_operator_counts_rejects_bad_counts() {
        for doc in [r#"{"1": {"map": -1}}"#, r#"{"1": {"map": "2"}}"#] {
            let value = json::parse(doc).unwrap();
            let error = parse_post_operator_counts(&value, source()).unwrap_err();
            assert!(matches!(error.downcast_ref::<InputError>(), Some(InputError::Count { .. })));
        }
        let value = json::parse(r#"[1, 2]"#).unwrap();
        assert!(parse_post_operator_counts(&value, source()).is_err());
        let value = json::parse(r#"{"1": [1]}"#).unwrap();
        assert!(parse_post_operator_counts(&value, source()).is_err());
    }

    #[test]
    fn test_parse_topic_membership() {
        let value = json::parse("[10, 42, 10]").unwrap();
        assert_eq!(parse_topic_membership(&value, source()).unwrap(), hashset! {10, 42});
        let value = json::parse(r#"["10"]"#).unwrap();
        assert!(parse_topic_membership(&value, source()).is_err());
    }

    #[test]
    fn test_parse_frequency_table_keeps_order() {
        let value = json::parse(r#"{"zip": 1, "map": 7, "filter": 0}"#).unwrap();
        let table = parse_frequency_table(&value, source()).unwrap();
        assert_eq!(table.to_vec(), vec![("zip", 1), ("map", 7), ("filter", 0)]);
    }

    #[test]
    fn test_parse_manifest() {
        let value = json::parse(r#"["map", "filter"]"#).unwrap();
        assert_eq!(parse_manifest(&value, source()).unwrap(), vec!["map", "filter"]);
        let value = json::parse(r#"{"map": 1}"#).unwrap();
        assert!(parse_manifest(&value, source()).is_err());
    }

    #[tokio::test]
    async fn test_find_library_file() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["rxswift_Swift.json", "rxjs_JSX-JavaScript-TypeScript.json", "rxjava_Java.json"] {
            std::fs::write(dir.path().join(name), "{}").unwrap();
        }
        let found = find_library_file(dir.path(), "RxJS").await.unwrap();
        assert_eq!(found, dir.path().join("rxjs_JSX-JavaScript-TypeScript.json"));
        let found = find_library_file(dir.path(), "RxJava").await.unwrap();
        assert_eq!(found, dir.path().join("rxjava_Java.json"));
        let error = find_library_file(dir.path(), "RxKotlin").await.unwrap_err();
        assert!(matches!(error.downcast_ref::<InputError>(), Some(InputError::MissingLibraryFile { .. })));
    }

    #[tokio::test]
    async fn test_read_json_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_json(dir.path().join("missing.json")).await.is_err());
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{\"1\": ").unwrap();
        assert!(load_post_operator_counts(&path).await.is_err());
    }
}
