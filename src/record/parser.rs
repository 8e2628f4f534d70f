//! Catalog row parsing
//!
//! Row-level problems never surface as errors: a row missing a gating column,
//! with an unknown `view`/`modality`, or malformed at the CSV level is dropped
//! and counted. Only failures to open the catalog or read its header are errors.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;

use super::{Column, Finding, Modality, Record, Sex, View, YesNo};
use crate::error::{Error, Result};

/// Read access to one row keyed by column
pub trait RowValues {
    /// Raw value of `column`, or `None` when the row has no such key
    fn value(&self, column: Column) -> Option<&str>;
}

impl RowValues for HashMap<String, String> {
    fn value(&self, column: Column) -> Option<&str> {
        self.get(column.header()).map(String::as_str)
    }
}

impl RowValues for BTreeMap<String, String> {
    fn value(&self, column: Column) -> Option<&str> {
        self.get(column.header()).map(String::as_str)
    }
}

/// Convert one row into a [`Record`]
///
/// Returns `None` when any gating column is absent or `view`/`modality` does not
/// match a known value. Numeric and optional enum columns that are present but
/// unparsable become `None` without voiding the row.
pub fn parse_row<R: RowValues + ?Sized>(row: &R) -> Option<Record> {
    let offset = row.value(Column::Offset)?;
    let sex = row.value(Column::Sex)?;
    let age = row.value(Column::Age)?;
    let finding = row.value(Column::Finding)?;
    let survival = row.value(Column::Survival)?;
    let intubated = row.value(Column::Intubated)?;
    let temperature = row.value(Column::Temperature)?;
    let po2_saturation = row.value(Column::Po2Saturation)?;
    let leukocyte_count = row.value(Column::LeukocyteCount)?;
    let neutrophil_count = row.value(Column::NeutrophilCount)?;
    let lymphocyte_count = row.value(Column::LymphocyteCount)?;
    let view = View::from_raw(row.value(Column::View)?)?;
    let modality = Modality::from_raw(row.value(Column::Modality)?)?;

    let text = |column| row.value(column).unwrap_or_default().to_string();
    let flag = |column| row.value(column).and_then(YesNo::from_raw);

    Some(Record {
        patient_id: text(Column::PatientId),
        offset: offset.parse().ok(),
        sex: Sex::from_raw(sex),
        age: age.parse().ok(),
        finding: Finding::classify(finding),
        survival: YesNo::from_raw(survival),
        intubated: YesNo::from_raw(intubated),
        went_icu: flag(Column::WentIcu),
        needed_supplemental_o2: flag(Column::NeededSupplementalO2),
        extubated: flag(Column::Extubated),
        temperature: temperature.parse().ok(),
        po2_saturation: po2_saturation.parse().ok(),
        leukocyte_count: leukocyte_count.parse().ok(),
        neutrophil_count: neutrophil_count.parse().ok(),
        lymphocyte_count: lymphocyte_count.parse().ok(),
        view,
        modality,
        date: text(Column::Date),
        location: text(Column::Location),
        folder: text(Column::Folder),
        filename: row
            .value(Column::Filename)
            .unwrap_or_default()
            .trim()
            .to_string(),
        doi: text(Column::Doi),
        url: text(Column::Url),
        license: text(Column::License),
        clinical_notes: text(Column::ClinicalNotes),
        other_notes: text(Column::OtherNotes),
    })
}

/// Column positions resolved from a header row
///
/// Unknown headers are ignored; when a header name repeats, the first occurrence wins.
#[derive(Clone, Debug, Default)]
pub struct HeaderIndex {
    positions: HashMap<Column, usize>,
}

impl HeaderIndex {
    /// Build an index from header names in file order
    pub fn new<'a, I>(headers: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut positions = HashMap::new();
        for (position, name) in headers.into_iter().enumerate() {
            if let Some(column) = Column::from_header(name) {
                positions.entry(column).or_insert(position);
            }
        }
        Self { positions }
    }

    /// Position of `column` in each row
    pub fn position(&self, column: Column) -> Option<usize> {
        self.positions.get(&column).copied()
    }

    /// Whether the header named `column`
    pub fn contains(&self, column: Column) -> bool {
        self.positions.contains_key(&column)
    }

    /// Gating columns the header does not name (every row will be dropped if non-empty)
    pub fn missing_gating(&self) -> Vec<Column> {
        Column::GATING
            .into_iter()
            .filter(|c| !self.contains(*c))
            .collect()
    }

    /// View a data row through this index
    pub fn row<'a>(&'a self, record: &'a StringRecord) -> CsvRow<'a> {
        CsvRow {
            index: self,
            record,
        }
    }
}

/// One CSV data row addressed by column
///
/// A row shorter than the header has no key for the trailing columns.
#[derive(Clone, Copy, Debug)]
pub struct CsvRow<'a> {
    index: &'a HeaderIndex,
    record: &'a StringRecord,
}

impl RowValues for CsvRow<'_> {
    fn value(&self, column: Column) -> Option<&str> {
        self.index
            .position(column)
            .and_then(|position| self.record.get(position))
    }
}

/// Lazy record reader over a catalog
///
/// Iterating yields parse-valid records in file order. Once iteration ends,
/// [`CatalogReader::finish`] reports the row counters or a read failure.
pub struct CatalogReader<R> {
    reader: csv::Reader<R>,
    index: HeaderIndex,
    buffer: StringRecord,
    total_rows: usize,
    dropped_rows: usize,
    failure: Option<csv::Error>,
    done: bool,
}

impl<R: Read> CatalogReader<R> {
    /// Read the header row and prepare to iterate data rows
    pub fn new(source: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(source);
        let index = HeaderIndex::new(reader.headers()?.iter());

        let missing = index.missing_gating();
        if !missing.is_empty() {
            tracing::debug!(
                missing = ?missing.iter().map(|c| c.header()).collect::<Vec<_>>(),
                "catalog header lacks gating columns, every row will be dropped"
            );
        }

        Ok(Self {
            reader,
            index,
            buffer: StringRecord::new(),
            total_rows: 0,
            dropped_rows: 0,
            failure: None,
            done: false,
        })
    }

    /// Header column positions
    pub fn header_index(&self) -> &HeaderIndex {
        &self.index
    }

    /// Data rows read so far
    pub fn total_rows(&self) -> usize {
        self.total_rows
    }

    /// Rows dropped so far
    pub fn dropped_rows(&self) -> usize {
        self.dropped_rows
    }

    /// Finish reading and return `(total_rows, dropped_rows)`
    ///
    /// Fails if reading stopped on an I/O error rather than end of input.
    pub fn finish(self) -> Result<(usize, usize)> {
        match self.failure {
            Some(e) => Err(Error::Csv(e)),
            None => Ok((self.total_rows, self.dropped_rows)),
        }
    }
}

impl<R: Read> Iterator for CatalogReader<R> {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        while !self.done {
            match self.reader.read_record(&mut self.buffer) {
                Ok(false) => self.done = true,
                Ok(true) => {
                    self.total_rows += 1;
                    match parse_row(&self.index.row(&self.buffer)) {
                        Some(record) => return Some(record),
                        None => {
                            self.dropped_rows += 1;
                            tracing::trace!(row = self.total_rows, "dropped malformed catalog row");
                        }
                    }
                }
                Err(e) if matches!(e.kind(), csv::ErrorKind::Io(_)) => {
                    self.done = true;
                    self.failure = Some(e);
                }
                Err(e) => {
                    // Undecodable row: skip it like any other malformed row
                    self.total_rows += 1;
                    self.dropped_rows += 1;
                    tracing::trace!(row = self.total_rows, error = %e, "dropped unreadable catalog row");
                }
            }
        }
        None
    }
}

/// Records parsed from one catalog snapshot
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    /// Parse-valid records in file order
    pub records: Vec<Record>,
    /// Data rows read
    pub total_rows: usize,
    /// Rows dropped as malformed
    pub dropped_rows: usize,
}

/// Parse a whole catalog from any reader
pub fn parse_catalog<R: Read>(source: R) -> Result<Catalog> {
    let mut reader = CatalogReader::new(source)?;
    let records: Vec<Record> = reader.by_ref().collect();
    let (total_rows, dropped_rows) = reader.finish()?;

    Ok(Catalog {
        records,
        total_rows,
        dropped_rows,
    })
}

/// Parse the catalog stored at `path`
pub fn read_catalog(path: &Path) -> Result<Catalog> {
    let file = File::open(path).map_err(|e| {
        Error::Catalog(format!("failed to open catalog {}: {}", path.display(), e))
    })?;
    parse_catalog(file)
}
