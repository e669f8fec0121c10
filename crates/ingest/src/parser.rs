use std::collections::HashSet;
use std::fmt::Display;
use std::io::Cursor;
use std::str::FromStr;

use calamine::{open_workbook_from_rs, Data, Range, Reader, Xlsx};
use tracing::{debug, warn};

use offerbook_core::OfferId;
use offerbook_products::{field, CandidateUpdate, ProductRecord, RowError};

use crate::error::ParseError;

// Column positions of the fixed layout.
const COL_OFFER_ID: u32 = 0;
const COL_NAME: u32 = 1;
const COL_PRICE: u32 = 2;
const COL_QUANTITY: u32 = 3;
const COL_AVAILABLE: u32 = 4;

/// Result of a successful (possibly partial) parse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedSheet {
    /// Rows that passed every field parse and domain validation, in sheet order.
    pub candidates: Vec<CandidateUpdate>,
    /// `None` when the sheet had no row-level problems.
    pub row_errors: Option<Vec<RowError>>,
}

/// Decodes the first sheet of an xlsx workbook into catalog candidates.
///
/// Stateless; one instance can be shared across threads. The parser knows
/// nothing about sellers: classification happens downstream.
#[derive(Debug, Clone, Copy, Default)]
pub struct TabularParser;

impl TabularParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, bytes: &[u8]) -> Result<ParsedSheet, ParseError> {
        let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes)).map_err(|e| {
            warn!(error = %e, "failed to open workbook");
            ParseError::FailedToRead
        })?;

        let sheet_names = workbook.sheet_names();
        let first = first_sheet(&sheet_names)?;
        let range = workbook.worksheet_range(first).map_err(|e| {
            warn!(error = %e, sheet = first, "failed to read worksheet");
            ParseError::FailedToRead
        })?;

        let sheet = Sheet::new(&range)?;
        sheet.check_offer_ids()?;

        let mut candidates = Vec::with_capacity(sheet.height());
        let mut row_errors = Vec::new();
        for row in 0..sheet.height() as u32 {
            if let Some(candidate) = sheet.parse_row(row, &mut row_errors) {
                candidates.push(candidate);
            }
        }

        debug!(
            candidates = candidates.len(),
            row_errors = row_errors.len(),
            "sheet parsed"
        );

        Ok(ParsedSheet {
            candidates,
            row_errors: if row_errors.is_empty() {
                None
            } else {
                Some(row_errors)
            },
        })
    }
}

fn first_sheet(sheet_names: &[String]) -> Result<&str, ParseError> {
    match sheet_names.first() {
        Some(name) => Ok(name.as_str()),
        None => {
            warn!("workbook has no sheets");
            Err(ParseError::EmptyDoc)
        }
    }
}

/// Text view over a worksheet using absolute (sheet) coordinates, so row
/// numbers always match what the seller sees.
struct Sheet<'a> {
    range: &'a Range<Data>,
    last_row: u32,
}

impl<'a> Sheet<'a> {
    fn new(range: &'a Range<Data>) -> Result<Self, ParseError> {
        match range.end() {
            Some((last_row, _)) if !range.is_empty() => Ok(Self { range, last_row }),
            _ => {
                warn!("first sheet has no rows");
                Err(ParseError::EmptySheet)
            }
        }
    }

    fn height(&self) -> usize {
        self.last_row as usize + 1
    }

    fn text(&self, row: u32, col: u32) -> String {
        self.range
            .get_value((row, col))
            .map(cell_text)
            .unwrap_or_default()
    }

    /// The identifier column must be wholly numeric and duplicate-free before
    /// any row is looked at. Trailing blank cells are not part of the column.
    fn check_offer_ids(&self) -> Result<(), ParseError> {
        let column: Vec<String> = (0..=self.last_row)
            .map(|row| self.text(row, COL_OFFER_ID))
            .collect();
        let len = column
            .iter()
            .rposition(|v| !v.is_empty())
            .map_or(0, |last| last + 1);

        let mut seen = HashSet::with_capacity(len);
        let mut duplicates = false;
        for value in &column[..len] {
            let id = value.parse::<u64>().map_err(|e| {
                warn!(value = %value, error = %e, "non-numeric offer_id");
                ParseError::InvalidIds
            })?;
            duplicates |= !seen.insert(id);
        }

        if duplicates {
            warn!("sheet has offer_id duplicates");
            return Err(ParseError::HasDuplicates);
        }
        Ok(())
    }

    fn parse_row(&self, row: u32, errors: &mut Vec<RowError>) -> Option<CandidateUpdate> {
        let line = u64::from(row) + 1;
        let before = errors.len();

        let offer_id = parse_field::<u64>(line, field::OFFER_ID, &self.text(row, COL_OFFER_ID), errors);
        let name = self.text(row, COL_NAME).trim().to_string();
        let price = parse_field::<u64>(line, field::PRICE, &self.text(row, COL_PRICE), errors);
        let quantity = parse_field::<u64>(line, field::QUANTITY, &self.text(row, COL_QUANTITY), errors);
        let available = parse_field::<bool>(line, field::AVAILABLE, &self.text(row, COL_AVAILABLE), errors);

        let record = ProductRecord {
            offer_id: OfferId::new(offer_id.unwrap_or_default()),
            name,
            price: price.unwrap_or_default(),
            quantity: quantity.unwrap_or_default(),
        };
        if let Err(e) = record.validate() {
            errors.push(RowError::from_domain(line, e));
        }

        if errors.len() > before {
            return None;
        }
        Some(CandidateUpdate::new(record, available?, line))
    }
}

fn parse_field<T>(line: u64, field: &str, raw: &str, errors: &mut Vec<RowError>) -> Option<T>
where
    T: FromStr,
    T::Err: Display,
{
    match raw.parse::<T>() {
        Ok(v) => Some(v),
        Err(e) => {
            errors.push(RowError::new(line, field, e.to_string()));
            None
        }
    }
}

/// Render a cell the way a seller typed it: whole numbers without a
/// fractional part, booleans as `true`/`false`, blanks as "".
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Bool(b) => b.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => f.to_string(),
        other => other.to_string(),
    }
}
