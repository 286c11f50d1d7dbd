use crate::frequency::FrequencyTable;
use anyhow::{anyhow, Context, Result};
use json::JsonValue;
use log::{debug, info};
use std::{io::ErrorKind, path::Path};

const BOM: &str = "\u{feff}";
const HEADER: [&str; 2] = ["Operator", "Frequency"];

/// Remove `dir` with everything in it and create it again empty. The parent
/// directory is created when missing.
pub async fn clear_and_recreate(dir: impl AsRef<Path>) -> Result<()> {
    let dir = dir.as_ref();
    if let Some(parent) = dir.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => debug!("removed {}", dir.display()),
        Err(error) if error.kind() == ErrorKind::NotFound => {}
        Err(error) => return Err(error).with_context(|| format!("failed to remove {}", dir.display())),
    }
    tokio::fs::create_dir(dir)
        .await
        .with_context(|| format!("failed to create {}", dir.display()))
}

/// The table as CSV: byte order mark, `Operator,Frequency` header, one row per entry.
pub fn csv_bytes(table: &FrequencyTable) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(BOM.as_bytes().to_vec());
    writer.write_record(HEADER)?;
    for (operator, count) in table.iter() {
        writer.write_record([operator, count.to_string().as_str()])?;
    }
    writer.into_inner().map_err(|error| anyhow!("failed to flush csv: {}", error))
}

pub async fn write_csv(path: impl AsRef<Path>, table: &FrequencyTable) -> Result<()> {
    let path = path.as_ref();
    tokio::fs::write(path, csv_bytes(table)?)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!("wrote {} ({} operators)", path.display(), table.len());
    Ok(())
}

/// The table as a JSON object, in table order.
pub fn to_json(table: &FrequencyTable) -> JsonValue {
    let mut object = JsonValue::new_object();
    for (operator, count) in table.iter() {
        object[operator] = count.into();
    }
    object
}

pub async fn write_json(path: impl AsRef<Path>, table: &FrequencyTable) -> Result<()> {
    let path = path.as_ref();
    tokio::fs::write(path, to_json(table).pretty(2))
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!("wrote {} ({} operators)", path.display(), table.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::parse_frequency_table;

    fn table() -> FrequencyTable {
        vec![("map", 5u64), ("filter, then map", 1), ("zip", 0)].into_iter().collect()
    }

    #[test]
    fn test_csv_bytes() {
        let bytes = csv_bytes(&table()).unwrap();
        assert!(bytes.starts_with(BOM.as_bytes()));
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(
            text.trim_start_matches(BOM),
            "Operator,Frequency\nmap,5\n\"filter, then map\",1\nzip,0\n"
        );
    }

    #[test]
    fn test_json_keeps_order() {
        let value = to_json(&table());
        assert_eq!(value.dump(), r#"{"map":5,"filter, then map":1,"zip":0}"#);
        let parsed = parse_frequency_table(&value, Path::new("table.json")).unwrap();
        assert_eq!(parsed.to_vec(), table().to_vec());
    }

    #[tokio::test]
    async fn test_clear_and_recreate() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("results").join("frequency");
        clear_and_recreate(&dir).await.unwrap();
        assert!(dir.is_dir());
        std::fs::write(dir.join("stale.csv"), "old").unwrap();
        clear_and_recreate(&dir).await.unwrap();
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_clear_and_recreate_fails_visibly() {
        let root = tempfile::tempdir().unwrap();
        let blocker = root.path().join("results");
        std::fs::write(&blocker, "not a directory").unwrap();
        assert!(clear_and_recreate(blocker.join("frequency")).await.is_err());
    }

    #[tokio::test]
    async fn test_write_files() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(dir.path().join("t.csv"), &table()).await.unwrap();
        write_json(dir.path().join("t.json"), &table()).await.unwrap();
        let text = std::fs::read_to_string(dir.path().join("t.json")).unwrap();
        assert_eq!(json::parse(&text).unwrap()["map"].as_u64(), Some(5));
    }
}
