use serde_json::Value;

/// Continuation marker returned with each page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cursor {
    /// More pages follow; send this token to get the next one
    Next(String),

    /// No more pages
    End,
}

impl Cursor {
    /// Interprets an optional cursor field; absent or empty means `End`
    pub fn from_field(token: Option<&str>) -> Self {
        match token {
            Some(token) if !token.is_empty() => Self::Next(token.to_string()),
            _ => Self::End,
        }
    }

    pub fn is_end(&self) -> bool {
        matches!(self, Self::End)
    }
}

/// One decoded response page
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub items: Vec<Value>,
    pub next: Cursor,
}

/// Maps one raw response to its items and continuation cursor
///
/// Returns a description of what was wrong when the response does not have
/// the expected shape.
pub trait PageExtractor {
    fn extract(&self, response: &Value) -> Result<Page, String>;
}

impl<F> PageExtractor for F
where
    F: Fn(&Value) -> Result<Page, String>,
{
    fn extract(&self, response: &Value) -> Result<Page, String> {
        self(response)
    }
}

/// Extractor for responses shaped `{ "<items>": [...], "<cursor>": "..." }`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemsAndCursor {
    items_field: String,
    cursor_field: String,
}

impl ItemsAndCursor {
    pub fn new(items_field: impl Into<String>, cursor_field: impl Into<String>) -> Self {
        Self {
            items_field: items_field.into(),
            cursor_field: cursor_field.into(),
        }
    }
}

impl Default for ItemsAndCursor {
    /// `items` + `nextPageToken`, as used by Google APIs
    fn default() -> Self {
        Self::new("items", "nextPageToken")
    }
}

impl PageExtractor for ItemsAndCursor {
    fn extract(&self, response: &Value) -> Result<Page, String> {
        let items = response
            .get(&self.items_field)
            .ok_or_else(|| format!("missing '{}' field", self.items_field))?
            .as_array()
            .ok_or_else(|| format!("'{}' is not an array", self.items_field))?
            .clone();

        let next = match response.get(&self.cursor_field) {
            None | Some(Value::Null) => Cursor::End,
            Some(Value::String(token)) => Cursor::from_field(Some(token)),
            Some(_) => return Err(format!("'{}' is not a string", self.cursor_field)),
        };

        Ok(Page { items, next })
    }
}

/// Follows a dotted path such as `statistics.commentCount`
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(value, |current, segment| current.get(segment))
}

/// Like `lookup`, for string leaves
pub fn lookup_str<'a>(value: &'a Value, path: &str) -> Option<&'a str> {
    lookup(value, path).and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extracts_items_and_cursor() {
        let page = ItemsAndCursor::default()
            .extract(&json!({"items": [{"id": 1}, {"id": 2}], "nextPageToken": "CAUQAA"}))
            .unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.next, Cursor::Next("CAUQAA".to_string()));
    }

    #[test]
    fn test_missing_or_empty_cursor_is_end() {
        let extractor = ItemsAndCursor::default();
        assert!(extractor.extract(&json!({"items": []})).unwrap().next.is_end());
        assert!(extractor
            .extract(&json!({"items": [], "nextPageToken": ""}))
            .unwrap()
            .next
            .is_end());
        assert!(extractor
            .extract(&json!({"items": [], "nextPageToken": null}))
            .unwrap()
            .next
            .is_end());
    }

    #[test]
    fn test_shape_errors() {
        let extractor = ItemsAndCursor::default();
        assert!(extractor.extract(&json!({"kind": "youtube#videoListResponse"})).is_err());
        assert!(extractor.extract(&json!({"items": {"id": 1}})).is_err());
        assert!(extractor
            .extract(&json!({"items": [], "nextPageToken": 42}))
            .is_err());
    }

    #[test]
    fn test_custom_fields() {
        let extractor = ItemsAndCursor::new("data", "cursor");
        let page = extractor
            .extract(&json!({"data": [1, 2, 3], "cursor": "next"}))
            .unwrap();
        assert_eq!(page.items, vec![json!(1), json!(2), json!(3)]);
    }

    #[test]
    fn test_lookup_paths() {
        let value = json!({
            "id": "abc",
            "statistics": {"commentCount": "12"},
            "contentDetails": {"relatedPlaylists": {"uploads": "UUxyz"}}
        });
        assert_eq!(lookup_str(&value, "id"), Some("abc"));
        assert_eq!(lookup_str(&value, "statistics.commentCount"), Some("12"));
        assert_eq!(
            lookup_str(&value, "contentDetails.relatedPlaylists.uploads"),
            Some("UUxyz")
        );
        assert!(lookup(&value, "statistics.viewCount").is_none());
    }
}
