//! Header-addressed rows from spreadsheet workbooks.
//!
//! Standards published as workbooks rarely put their header row on the first
//! line, and their header cells carry stray line breaks. A [`Sheet`] finds the
//! row holding every declared header and yields the rows below it, addressed
//! by header name.

use std::{io::Cursor, rc::Rc};

use calamine::{Data, Range, Reader, Sheets, open_workbook_auto_from_rs};

use crate::source::FormatError;

/// An opened workbook.
pub struct Workbook {
    sheets: Sheets<Cursor<Vec<u8>>>,
}

impl std::fmt::Debug for Workbook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workbook")
            .field("sheets", &self.sheets.sheet_names())
            .finish()
    }
}

/// How a worksheet is picked from a workbook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetSelector<'a> {
    /// The zero-based position of the sheet.
    Index(usize),
    /// The name of the sheet.
    Name(&'a str),
}

impl std::fmt::Display for SheetSelector<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Index(index) => write!(f, "#{index}"),
            Self::Name(name) => write!(f, "'{name}'"),
        }
    }
}

impl Workbook {
    /// Opens a workbook (xlsx, xls or ods) from its raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a readable workbook.
    pub fn open(bytes: Vec<u8>) -> Result<Self, FormatError> {
        let sheets = open_workbook_auto_from_rs(Cursor::new(bytes))?;
        Ok(Self { sheets })
    }

    /// Selects a worksheet.
    ///
    /// # Errors
    ///
    /// Returns an error if the sheet does not exist or cannot be read.
    pub fn sheet(&mut self, selector: SheetSelector<'_>) -> Result<Sheet, FormatError> {
        let missing = || FormatError::MissingSheet(selector.to_string());
        let (name, range) = match selector {
            SheetSelector::Index(index) => {
                let name = self
                    .sheets
                    .sheet_names()
                    .get(index)
                    .cloned()
                    .ok_or_else(missing)?;
                let range = self.sheets.worksheet_range_at(index).ok_or_else(missing)??;
                (name, range)
            }
            SheetSelector::Name(name) => {
                if !self.sheets.sheet_names().iter().any(|n| n == name) {
                    return Err(missing());
                }
                (name.to_string(), self.sheets.worksheet_range(name)?)
            }
        };
        tracing::debug!("Selected sheet '{name}' ({:?} cells)", range.get_size());
        Ok(Sheet::from_range(name, range))
    }
}

/// One worksheet's cells.
#[derive(Debug, Clone)]
pub struct Sheet {
    name: String,
    range: Range<Data>,
}

/// Collapses every whitespace run (including line breaks) to a single space.
fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl Sheet {
    /// Wraps an already loaded cell range.
    #[must_use]
    pub fn from_range(name: impl Into<String>, range: Range<Data>) -> Self {
        Self {
            name: name.into(),
            range,
        }
    }

    /// The name of the worksheet.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Locates the first row containing every declared header and returns the
    /// rows below it.
    ///
    /// Headers are compared with whitespace runs collapsed, so `"Notes -\nAbout"`
    /// in the sheet matches a declared `"Notes - About"`.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::MissingHeaders`] if no row contains every
    /// declared header; the error lists the headers absent from the closest
    /// candidate row.
    pub fn locate(&self, headers: &[&str]) -> Result<Rows<'_>, FormatError> {
        let declared: Vec<String> = headers.iter().map(|h| normalize(h)).collect();
        let mut closest: Option<Vec<String>> = None;

        for (position, row) in self.range.rows().enumerate() {
            let cells: Vec<String> = row.iter().map(|cell| normalize(&cell.to_string())).collect();
            let columns: Vec<Option<usize>> = declared
                .iter()
                .map(|header| cells.iter().position(|cell| cell == header))
                .collect();

            if let Some(columns) = columns.iter().copied().collect::<Option<Vec<usize>>>() {
                tracing::debug!(
                    "Found headers of sheet '{}' in row {}",
                    self.name,
                    position + 1
                );
                return Ok(Rows {
                    headers: declared.into(),
                    columns,
                    rows: self.range.rows().skip(position + 1),
                });
            }

            let missing: Vec<String> = declared
                .iter()
                .zip(&columns)
                .filter(|(_, column)| column.is_none())
                .map(|(header, _)| header.clone())
                .collect();
            if closest.as_ref().is_none_or(|best| missing.len() < best.len()) {
                closest = Some(missing);
            }
        }

        Err(FormatError::MissingHeaders {
            sheet: self.name.clone(),
            missing: closest.unwrap_or(declared),
        })
    }
}

/// Rows below a located header row.
///
/// Rows whose declared cells are all blank are skipped.
pub struct Rows<'a> {
    headers: Rc<[String]>,
    columns: Vec<usize>,
    rows: std::iter::Skip<calamine::Rows<'a, Data>>,
}

impl std::fmt::Debug for Rows<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rows")
            .field("headers", &self.headers)
            .field("columns", &self.columns)
            .finish_non_exhaustive()
    }
}

impl Iterator for Rows<'_> {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        for cells in self.rows.by_ref() {
            let values: Vec<String> = self
                .columns
                .iter()
                .map(|&column| {
                    cells
                        .get(column)
                        .map(|cell| cell.to_string().trim().to_string())
                        .unwrap_or_default()
                })
                .collect();
            if values.iter().any(|value| !value.is_empty()) {
                return Some(Row {
                    headers: Rc::clone(&self.headers),
                    values,
                });
            }
        }
        None
    }
}

/// One data row, addressed by declared header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    headers: Rc<[String]>,
    values: Vec<String>,
}

impl Row {
    /// Builds a row directly from header/value pairs.
    #[must_use]
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        Self {
            headers: pairs.iter().map(|(header, _)| normalize(header)).collect(),
            values: pairs.iter().map(|(_, value)| (*value).to_string()).collect(),
        }
    }

    fn position(&self, header: &str) -> Option<usize> {
        let header = normalize(header);
        self.headers.iter().position(|h| *h == header)
    }

    /// The text of the cell under `header`; blank cells and undeclared
    /// headers read as the empty string.
    #[must_use]
    pub fn get(&self, header: &str) -> &str {
        self.position(header)
            .and_then(|position| self.values.get(position))
            .map_or("", String::as_str)
    }

    /// Overwrites the text of the cell under a declared header.
    pub fn set(&mut self, header: &str, value: impl Into<String>) {
        if let Some(position) = self.position(header) {
            self.values[position] = value.into();
        }
    }
}

/// Fills blank cells of hierarchical columns from the rows above.
///
/// `columns` lists the hierarchy outermost first. A blank cell inherits the
/// last value seen in its column, unless an outer column changed since then:
/// a new outer value starts a fresh context for every inner column.
pub fn fill_down<'c, I>(rows: I, columns: &'c [&'c str]) -> impl Iterator<Item = Row> + 'c
where
    I: IntoIterator<Item = Row>,
    I::IntoIter: 'c,
{
    rows.into_iter()
        .scan(vec![String::new(); columns.len()], move |context, mut row| {
            for (level, column) in columns.iter().enumerate() {
                let value = row.get(column);
                if value.is_empty() {
                    row.set(column, context[level].clone());
                } else if value != context[level] {
                    context[level] = value.to_string();
                    for inner in &mut context[level + 1..] {
                        inner.clear();
                    }
                }
            }
            Some(row)
        })
}
