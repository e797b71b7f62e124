use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One parsed row of an uploaded CSV file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRow {
    pub id: i32,
    pub email: String,
    pub name: String,
}

/// A document of the `csv_files` collection.
///
/// Field names on the wire are the ones the index plan refers to
/// (`filename`, `uploadedAt`, `lastModified`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvFileRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub filename: String,
    #[serde(default)]
    pub users: Vec<UserRow>,
    #[serde(default)]
    pub csv_content: String,
    pub uploaded_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

impl CsvFileRecord {
    pub fn new(filename: &str, users: Vec<UserRow>, csv_content: &str) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            filename: filename.to_string(),
            users,
            csv_content: csv_content.to_string(),
            uploaded_at: now,
            last_modified: now,
        }
    }

    /// Replace the parsed rows and raw content, bumping `last_modified`.
    pub fn replace_content(&mut self, users: Vec<UserRow>, csv_content: &str) {
        self.users = users;
        self.csv_content = csv_content.to_string();
        self.last_modified = Utc::now();
    }

    /// Value of a document field by its wire name, `null` when absent.
    pub fn field(&self, name: &str) -> serde_json::Value {
        match name {
            "_id" => self.id.clone().into(),
            "filename" => self.filename.clone().into(),
            "uploadedAt" => self.uploaded_at.to_rfc3339().into(),
            "lastModified" => self.last_modified.to_rfc3339().into(),
            "csvContent" => self.csv_content.clone().into(),
            _ => serde_json::Value::Null,
        }
    }

    /// Timestamp-valued fields, used for expiry.
    pub fn timestamp(&self, name: &str) -> Option<DateTime<Utc>> {
        match name {
            "uploadedAt" => Some(self.uploaded_at),
            "lastModified" => Some(self.last_modified),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_sets_both_timestamps() {
        let record = CsvFileRecord::new("users.csv", Vec::new(), "id,email,name\n");
        assert_eq!(record.uploaded_at, record.last_modified);
        assert!(!record.id.is_empty());
    }

    #[test]
    fn test_replace_content_bumps_last_modified_only() {
        let mut record = CsvFileRecord::new("users.csv", Vec::new(), "");
        let uploaded = record.uploaded_at;
        record.last_modified = uploaded - chrono::Duration::seconds(10);

        record.replace_content(
            vec![UserRow {
                id: 1,
                email: "a@example.com".to_string(),
                name: "A".to_string(),
            }],
            "id,email,name\n1,a@example.com,A\n",
        );

        assert_eq!(record.uploaded_at, uploaded);
        assert!(record.last_modified >= uploaded);
        assert_eq!(record.users.len(), 1);
    }

    #[test]
    fn test_wire_field_names() {
        let record = CsvFileRecord::new("users.csv", Vec::new(), "");
        let value = serde_json::to_value(&record).unwrap();
        assert!(value.get("_id").is_some());
        assert!(value.get("uploadedAt").is_some());
        assert!(value.get("lastModified").is_some());
        assert!(value.get("csvContent").is_some());
        assert_eq!(record.field("filename"), serde_json::json!("users.csv"));
        assert_eq!(record.field("missing"), serde_json::Value::Null);
    }
}
