//! Translation of upstream JSON posts into canonical [`Image`] records.
//!
//! Upstream boards disagree on key names, time encodings, tag shapes and how
//! they spell booleans. A source's [`SourceMapping`] names the key for each
//! canonical field; the coercion helpers here absorb the type differences.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};

use crate::error::FetchError;
use crate::models::*;

/// One element of the upstream array, before normalization.
pub type RawRecord = Map<String, Value>;

/// Gelbooru-style `Sat Oct 01 12:34:56 -0500 2023`.
const CTIME_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// Decode an upstream body that must be a JSON array of objects.
pub fn decode(bytes: &[u8]) -> Result<Vec<RawRecord>, FetchError> {
    serde_json::from_slice::<Vec<RawRecord>>(bytes).map_err(|e| FetchError::Decode(e.to_string()))
}

/// Canonical string form of a JSON scalar. `null`, arrays and objects have none.
pub fn stringify(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// RFC 3339, Unix seconds (string or number, fraction truncated), or ctime-like text.
pub fn parse_time_flexible(v: &Value) -> Option<DateTime<Utc>> {
    match v {
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
                return Some(ts.with_timezone(&Utc));
            }
            if let Ok(secs) = s.parse::<i64>() {
                return Utc.timestamp_opt(secs, 0).single();
            }
            DateTime::parse_from_str(s, CTIME_FORMAT).ok().map(|ts| ts.with_timezone(&Utc))
        }
        Value::Number(n) => {
            let secs = match n.as_i64() {
                Some(i) => i,
                None => n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)?,
            };
            Utc.timestamp_opt(secs, 0).single()
        }
        _ => None,
    }
}

pub fn to_bool_flexible(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::String(s) => matches!(s.trim().to_lowercase().as_str(), "true" | "1" | "yes"),
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        _ => false,
    }
}

/// Tags as a string (whitespace or `split`-delimited) or as an array of scalars.
pub fn extract_tags(v: &Value, split: Option<&str>) -> Vec<String> {
    match v {
        Value::String(s) => match split.filter(|d| !d.is_empty()) {
            Some(delim) => s
                .split(delim)
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect(),
            None => s.split_whitespace().map(str::to_string).collect(),
        },
        Value::Array(items) => items.iter().filter_map(stringify).collect(),
        _ => Vec::new(),
    }
}

/// Result of mapping one upstream batch.
#[derive(Debug, Default)]
pub struct MappedBatch {
    pub images: Vec<Image>,
    pub skipped: usize,
}

/// Per-source translator. Construction checks the required mappings once so
/// a misconfigured source fails the whole batch instead of every record.
pub struct ImageMapper<'a> {
    source: &'a Source,
    id: &'a FieldMapping,
    file_url: &'a FieldMapping,
}

impl<'a> ImageMapper<'a> {
    pub fn new(source: &'a Source) -> Result<Self, FetchError> {
        let id = source
            .mapping
            .field("id")
            .ok_or_else(|| FetchError::Config("mapping for 'id' is missing".into()))?;
        let file_url = source
            .mapping
            .field("file_url")
            .ok_or_else(|| FetchError::Config("mapping for 'file_url' is missing".into()))?;
        Ok(Self { source, id, file_url })
    }

    fn lookup<'r>(&self, raw: &'r RawRecord, field: &str) -> Option<(&'a FieldMapping, &'r Value)> {
        let m = self.source.mapping.field(field)?;
        raw.get(&m.key).map(|v| (m, v))
    }

    fn string_field(&self, raw: &RawRecord, field: &str) -> String {
        self.lookup(raw, field).and_then(|(_, v)| stringify(v)).unwrap_or_default()
    }

    /// `None` when the record lacks a usable `id` or `file_url`.
    pub fn translate(&self, raw: &RawRecord) -> Option<Image> {
        let id = raw.get(&self.id.key).and_then(stringify)?;
        let file_url = raw.get(&self.file_url.key).and_then(stringify)?;

        let rating = self
            .lookup(raw, "rating")
            .and_then(|(_, v)| stringify(v))
            .and_then(|s| Rating::parse_loose(&s));
        let tags = self
            .lookup(raw, "tags")
            .map(|(m, v)| extract_tags(v, m.split.as_deref()))
            .unwrap_or_default();

        Some(Image {
            id,
            source: self.source.code.clone(),
            created_at: self.lookup(raw, "created_at").and_then(|(_, v)| parse_time_flexible(v)),
            rating,
            tags,
            has_children: self.lookup(raw, "has_children").map_or(false, |(_, v)| to_bool_flexible(v)),
            parent_id: self.string_field(raw, "parent_id"),
            md5: self.string_field(raw, "md5"),
            preview_url: self.string_field(raw, "preview_url"),
            sample_url: self.string_field(raw, "sample_url"),
            image_src_url: self.string_field(raw, "image_src_url"),
            file_url,
        })
    }

    pub fn map_all(&self, records: &[RawRecord]) -> MappedBatch {
        let mut batch = MappedBatch { images: Vec::with_capacity(records.len()), skipped: 0 };
        for raw in records {
            match self.translate(raw) {
                Some(img) => batch.images.push(img),
                None => batch.skipped += 1,
            }
        }
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn source(fields: &[(&str, &str)]) -> Source {
        let mut mapping = SourceMapping::default();
        for (canonical, key) in fields {
            mapping.fields.insert(canonical.to_string(), FieldMapping::key(*key));
        }
        Source {
            id: 1,
            code: SourceCode::new("test"),
            name: "Test".into(),
            base_url: "https://example.org".into(),
            enabled: true,
            request: RequestConfig::default(),
            mapping,
            defaults: SourceDefaults::default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn record(v: Value) -> RawRecord {
        match v {
            Value::Object(m) => m,
            other => panic!("not an object: {other}"),
        }
    }

    #[test]
    fn coerces_a_typical_post() {
        let src = source(&[
            ("id", "id"),
            ("file_url", "file_url"),
            ("tags", "tags"),
            ("rating", "rating"),
            ("created_at", "created_at"),
        ]);
        let mapper = ImageMapper::new(&src).unwrap();
        let img = mapper
            .translate(&record(json!({
                "id": 42,
                "file_url": "https://x/1.jpg",
                "tags": "a b c",
                "rating": "Q",
                "created_at": "1696161296"
            })))
            .unwrap();
        assert_eq!(img.id, "42");
        assert_eq!(img.file_url, "https://x/1.jpg");
        assert_eq!(img.tags, vec!["a", "b", "c"]);
        assert_eq!(img.rating, Some(Rating::Questionable));
        assert_eq!(img.created_at.map(|t| t.timestamp()), Some(1696161296));
        assert_eq!(img.source.as_str(), "test");
        assert!(!img.has_children);
        assert_eq!(img.md5, "");
    }

    #[test]
    fn renamed_keys_and_optional_fields() {
        let src = source(&[
            ("id", "post_id"),
            ("file_url", "url"),
            ("md5", "hash"),
            ("parent_id", "parent"),
            ("preview_url", "thumb"),
            ("sample_url", "sample"),
            ("image_src_url", "source"),
            ("has_children", "children"),
        ]);
        let mapper = ImageMapper::new(&src).unwrap();
        let img = mapper
            .translate(&record(json!({
                "post_id": "abc",
                "url": "https://x/2.png",
                "hash": "d41d8cd9",
                "parent": 7,
                "thumb": "https://x/t.png",
                "children": "Yes"
            })))
            .unwrap();
        assert_eq!(img.id, "abc");
        assert_eq!(img.md5, "d41d8cd9");
        assert_eq!(img.parent_id, "7");
        assert_eq!(img.preview_url, "https://x/t.png");
        assert_eq!(img.sample_url, "");
        assert_eq!(img.image_src_url, "");
        assert!(img.has_children);
        assert!(img.tags.is_empty());
        assert_eq!(img.rating, None);
        assert_eq!(img.created_at, None);
    }

    #[test]
    fn missing_required_key_skips_only_that_record() {
        let src = source(&[("id", "id"), ("file_url", "file_url")]);
        let mapper = ImageMapper::new(&src).unwrap();
        let records = vec![
            record(json!({"file_url": "https://x/1.jpg"})),
            record(json!({"id": 2, "file_url": "https://x/2.jpg"})),
            record(json!({"id": 3})),
            record(json!({"id": null, "file_url": "https://x/4.jpg"})),
        ];
        let batch = mapper.map_all(&records);
        assert_eq!(batch.images.len(), 1);
        assert_eq!(batch.images[0].id, "2");
        assert_eq!(batch.skipped, 3);
    }

    #[test]
    fn mapper_requires_id_and_file_url() {
        let src = source(&[("id", "id")]);
        assert!(matches!(ImageMapper::new(&src), Err(FetchError::Config(_))));
        let src = source(&[("id", ""), ("file_url", "file_url")]);
        assert!(matches!(ImageMapper::new(&src), Err(FetchError::Config(_))));
    }

    #[test]
    fn stringify_scalars() {
        assert_eq!(stringify(&json!("x")), Some("x".into()));
        assert_eq!(stringify(&json!(9007199254740993u64)), Some("9007199254740993".into()));
        assert_eq!(stringify(&json!(-5)), Some("-5".into()));
        assert_eq!(stringify(&json!(1.5)), Some("1.5".into()));
        assert_eq!(stringify(&json!(true)), Some("true".into()));
        assert_eq!(stringify(&json!(null)), None);
        assert_eq!(stringify(&json!([1])), None);
    }

    #[test]
    fn time_formats() {
        let want = Utc.with_ymd_and_hms(2023, 10, 1, 12, 34, 56).unwrap();
        assert_eq!(parse_time_flexible(&json!("2023-10-01T12:34:56Z")), Some(want));
        assert_eq!(parse_time_flexible(&json!("2023-10-01T14:34:56+02:00")), Some(want));
        assert_eq!(parse_time_flexible(&json!(want.timestamp())), Some(want));
        assert_eq!(parse_time_flexible(&json!(want.timestamp() as f64 + 0.75)), Some(want));
        assert_eq!(parse_time_flexible(&json!("Sun Oct 01 07:34:56 -0500 2023")), Some(want));
        assert_eq!(parse_time_flexible(&json!("yesterday")), None);
        assert_eq!(parse_time_flexible(&json!("  ")), None);
        assert_eq!(parse_time_flexible(&json!(false)), None);
    }

    #[test]
    fn flexible_bools() {
        assert!(to_bool_flexible(&json!(true)));
        assert!(to_bool_flexible(&json!(" TRUE ")));
        assert!(to_bool_flexible(&json!("1")));
        assert!(to_bool_flexible(&json!("yes")));
        assert!(to_bool_flexible(&json!(2)));
        assert!(!to_bool_flexible(&json!(0)));
        assert!(!to_bool_flexible(&json!("no")));
        assert!(!to_bool_flexible(&json!(null)));
    }

    #[test]
    fn tags_from_arrays_and_delimiters() {
        assert_eq!(extract_tags(&json!(["a", 1, true, null]), None), vec!["a", "1", "true"]);
        assert_eq!(extract_tags(&json!("  a\tb  c "), None), vec!["a", "b", "c"]);
        assert_eq!(extract_tags(&json!("long hair, blue eyes,,"), Some(",")), vec!["long hair", "blue eyes"]);
        assert!(extract_tags(&json!({"general": ["a"]}), None).is_empty());
    }

    #[test]
    fn split_delimiter_comes_from_the_mapping() {
        let mut src = source(&[("id", "id"), ("file_url", "file_url")]);
        src.mapping.fields.insert("tags".into(), FieldMapping { key: "tag_string".into(), split: Some(",".into()) });
        let mapper = ImageMapper::new(&src).unwrap();
        let img = mapper
            .translate(&record(json!({"id": 1, "file_url": "f", "tag_string": "a b,c"})))
            .unwrap();
        assert_eq!(img.tags, vec!["a b", "c"]);
    }

    #[test]
    fn decode_rejects_non_arrays() {
        assert_eq!(decode(br#"[{"id":1},{}]"#).unwrap().len(), 2);
        assert!(decode(b"[]").unwrap().is_empty());
        assert!(matches!(decode(br#"{"posts":[]}"#), Err(FetchError::Decode(_))));
        assert!(matches!(decode(br#"[1,2]"#), Err(FetchError::Decode(_))));
        assert!(matches!(decode(b"<html>"), Err(FetchError::Decode(_))));
    }

    #[test]
    fn translation_is_deterministic() {
        let src = source(&[("id", "id"), ("file_url", "file_url"), ("tags", "tags")]);
        let mapper = ImageMapper::new(&src).unwrap();
        let raw = record(json!({"id": 5, "file_url": "f", "tags": ["x", "y"]}));
        assert_eq!(mapper.translate(&raw), mapper.translate(&raw));
    }
}
