//! N-gram records and the batches they are flushed in

use serde::ser::{Serialize, SerializeTuple, Serializer};

/// Number of tab separated fields in one n-gram line
pub const FIELD_COUNT: usize = 4;

/// One parsed line: `ngram TAB year TAB match_count TAB volume_count`
///
/// Values are kept as text, exactly as they appear in the export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub ngram: String,
    pub year: String,
    pub match_count: String,
    pub volume_count: String,
}

impl Record {
    pub fn new(
        ngram: impl Into<String>,
        year: impl Into<String>,
        match_count: impl Into<String>,
        volume_count: impl Into<String>,
    ) -> Self {
        Self {
            ngram: ngram.into(),
            year: year.into(),
            match_count: match_count.into(),
            volume_count: volume_count.into(),
        }
    }

    /// Build a record from exactly [`FIELD_COUNT`] fields
    pub fn from_fields<'a, I>(fields: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut fields = fields.into_iter();
        let record = Record::new(
            fields.next()?,
            fields.next()?,
            fields.next()?,
            fields.next()?,
        );
        match fields.next() {
            Some(_) => None,
            None => Some(record),
        }
    }

    /// Fields in column order
    pub fn fields(&self) -> [&str; FIELD_COUNT] {
        [
            self.ngram.as_str(),
            self.year.as_str(),
            self.match_count.as_str(),
            self.volume_count.as_str(),
        ]
    }
}

// Mirrored as a positional array, e.g. ["cat","2000","5","3"]
impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(FIELD_COUNT)?;
        for field in self.fields() {
            tuple.serialize_element(field)?;
        }
        tuple.end()
    }
}

/// Records accumulated for a single insert
#[derive(Debug)]
pub struct Batch {
    records: Vec<Record>,
    max_size: usize,
}

impl Batch {
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            records: Vec::with_capacity(max_size),
            max_size,
        }
    }

    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    pub fn is_full(&self) -> bool {
        self.records.len() >= self.max_size
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Hand out the accumulated records and start over empty
    pub fn take(&mut self) -> Vec<Record> {
        std::mem::replace(&mut self.records, Vec::with_capacity(self.max_size))
    }
}
