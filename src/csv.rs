//! Minimal delimited-text reader for the zip reference dataset.
//!
//! Double-quoted spans are literal: a delimiter inside quotes does not end the
//! field. Quote characters are dropped and fields are trimmed.

/// Split one line into fields.
pub fn split_record(line: &str, delimiter: char) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in line.chars() {
        if ch == '"' {
            in_quotes = !in_quotes;
        } else if ch == delimiter && !in_quotes {
            fields.push(current.trim().to_string());
            current.clear();
        } else {
            current.push(ch);
        }
    }
    fields.push(current.trim().to_string());

    fields
}

/// Parsed table with a header row
#[derive(Debug, Clone, Default)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Parse `content`; the first non-blank line is the header.
    pub fn parse(content: &str, delimiter: char) -> Self {
        let mut lines = content
            .lines()
            .map(|l| l.trim_end_matches('\r'))
            .filter(|l| !l.trim().is_empty());

        let headers = match lines.next() {
            Some(header) => split_record(header, delimiter),
            None => return Self::default(),
        };
        let rows = lines.map(|l| split_record(l, delimiter)).collect();

        Self { headers, rows }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(|fields| Row { fields })
    }
}

/// Borrowed view of one record
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    fields: &'a [String],
}

impl<'a> Row<'a> {
    /// Field at `index`, or "" when the row is short
    pub fn get(&self, index: Option<usize>) -> &'a str {
        index
            .and_then(|i| self.fields.get(i))
            .map(String::as_str)
            .unwrap_or("")
    }
}
