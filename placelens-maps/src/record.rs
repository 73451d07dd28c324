use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// One `keyword`/`location` pair from the queries file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub keyword: String,
    pub location: String,
}

impl SearchQuery {
    pub fn new(keyword: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            location: location.into(),
        }
    }

    /// Free-text query sent to the search API.
    ///
    /// ```
    /// use placelens_maps::SearchQuery;
    ///
    /// let q = SearchQuery::new("dentist", "Austin, TX");
    /// assert_eq!(q.text(), "dentist in Austin, TX");
    /// ```
    pub fn text(&self) -> String {
        format!("{} in {}", self.keyword, self.location)
    }
}

impl fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{} in {}'", self.keyword, self.location)
    }
}

/// One place entry as returned by the API. Unknown fields pass through untouched.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultRecord(Map<String, Value>);

impl ResultRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Build a record from a JSON value; only objects qualify.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn place_id(&self) -> Option<&str> {
        self.0.get("place_id").and_then(Value::as_str)
    }

    pub fn title(&self) -> Option<&str> {
        self.0.get("title").and_then(Value::as_str)
    }

    pub fn website(&self) -> Option<&str> {
        self.0.get("website").and_then(Value::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for ResultRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Ordered, append-only collection of records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    records: Vec<ResultRecord>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: ResultRecord) {
        self.records.push(record);
    }

    pub fn append(&mut self, mut other: ResultSet) {
        self.records.append(&mut other.records);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ResultRecord> {
        self.records.iter()
    }

    pub fn as_slice(&self) -> &[ResultRecord] {
        &self.records
    }

    pub fn into_vec(self) -> Vec<ResultRecord> {
        self.records
    }

    /// Keep the first record per `place_id`; see [`crate::dedup_by_place_id`].
    pub fn dedup(self) -> (ResultSet, crate::DedupReport) {
        let (records, report) = crate::dedup_by_place_id(self.records);
        (ResultSet { records }, report)
    }
}

impl From<Vec<ResultRecord>> for ResultSet {
    fn from(records: Vec<ResultRecord>) -> Self {
        Self { records }
    }
}

impl Extend<ResultRecord> for ResultSet {
    fn extend<T: IntoIterator<Item = ResultRecord>>(&mut self, iter: T) {
        self.records.extend(iter);
    }
}

impl IntoIterator for ResultSet {
    type Item = ResultRecord;
    type IntoIter = std::vec::IntoIter<ResultRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a ResultRecord;
    type IntoIter = std::slice::Iter<'a, ResultRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
