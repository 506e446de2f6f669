/// Query documents and per-query option bits
use super::Document;
use serde_json::Value;
use std::ops::BitOr;

/// Option bits carried on every query and get-more request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct QueryOptions(i32);

impl QueryOptions {
    pub const NONE: QueryOptions = QueryOptions(0);
    /// Cursor is not closed when the last data is retrieved; it marks the
    /// final document's position and can be resumed later.
    pub const TAILABLE: QueryOptions = QueryOptions(2);
    /// Allow querying a non-master replica
    pub const SLAVE_OK: QueryOptions = QueryOptions(4);
    pub const ALL_MASK: i32 = 6;

    /// Unknown bits are dropped
    pub fn from_bits_truncate(bits: i32) -> Self {
        Self(bits & Self::ALL_MASK)
    }

    pub fn bits(self) -> i32 {
        self.0
    }

    pub fn contains(self, other: QueryOptions) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for QueryOptions {
    type Output = QueryOptions;

    fn bitor(self, rhs: Self) -> Self::Output {
        QueryOptions(self.0 | rhs.0)
    }
}

/// A filter with an optional sort order.
///
/// Without a sort the filter is sent as-is. With one, the request carries
/// `{query: <filter>, order: <sort>}` and the server reads `order` as the
/// sort specification rather than as a filter clause.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    filter: Document,
    order: Option<Document>,
}

impl Query {
    pub fn new(filter: Document) -> Self {
        Self {
            filter,
            order: None,
        }
    }

    pub fn sort(mut self, order: Document) -> Self {
        self.order = Some(order);
        self
    }

    pub fn filter(&self) -> &Document {
        &self.filter
    }

    pub fn order(&self) -> Option<&Document> {
        self.order.as_ref()
    }

    /// Document placed in the request body
    pub fn to_document(&self) -> Document {
        match &self.order {
            None => self.filter.clone(),
            Some(order) => {
                let mut wrapped = Document::new();
                wrapped.insert("query", Value::from(self.filter.clone()));
                wrapped.insert("order", Value::from(order.clone()));
                wrapped
            }
        }
    }

    /// Inverse of [`Query::to_document`]: a document with an object-valued
    /// `query` key is the wrapped form, anything else is a bare filter.
    pub fn from_document(doc: Document) -> Self {
        let wrapped = matches!(doc.get("query"), Some(Value::Object(_)));
        if !wrapped {
            return Self::new(doc);
        }

        let mut map = doc.into_inner();
        let filter = match map.remove("query") {
            Some(Value::Object(f)) => Document::from(f),
            _ => Document::new(),
        };
        let order = match map.remove("order") {
            Some(Value::Object(o)) => Some(Document::from(o)),
            _ => None,
        };
        Self { filter, order }
    }
}

impl From<Document> for Query {
    fn from(filter: Document) -> Self {
        Self::new(filter)
    }
}
