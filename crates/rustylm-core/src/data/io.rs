//! CSV reading and writing for [`DataFrame`].
//!
//! A column is numeric when every non-missing cell parses as `f64`;
//! anything else becomes a factor. Empty cells and `NA` are missing.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use tracing::debug;

use super::{Column, DataFrame};
use crate::error::{Result, RustyLmError};

fn is_missing_token(cell: &str) -> bool {
    let cell = cell.trim();
    cell.is_empty() || cell == "NA" || cell == "NaN"
}

impl DataFrame {
    /// Read a data frame from any CSV source with a header row.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
        if headers.is_empty() {
            return Err(RustyLmError::EmptyInput("CSV has no header".to_string()));
        }

        let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
        for record in rdr.records() {
            let record = record?;
            for (j, cell) in record.iter().enumerate() {
                cells[j].push(cell.to_string());
            }
        }

        let mut df = DataFrame::new();
        for (name, raw) in headers.iter().zip(cells) {
            let parsed: Option<Vec<f64>> = raw
                .iter()
                .map(|c| {
                    if is_missing_token(c) {
                        Some(f64::NAN)
                    } else {
                        c.parse::<f64>().ok()
                    }
                })
                .collect();

            let column = match parsed {
                Some(values) => Column::Numeric(values),
                None => {
                    let labels: Vec<Option<&str>> = raw
                        .iter()
                        .map(|c| if is_missing_token(c) { None } else { Some(c.as_str()) })
                        .collect();
                    Column::factor_from_labels(&labels)
                }
            };
            df = df.with_column(name, column)?;
        }

        debug!(rows = df.n_rows(), cols = df.n_cols(), "read CSV data frame");
        Ok(df)
    }

    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_csv_reader(File::open(path)?)
    }

    /// Write the data frame as CSV with a header row. Missing cells are `NA`.
    pub fn to_csv_writer<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(self.column_names())?;
        for i in 0..self.n_rows() {
            let row: Vec<String> = self.iter().map(|(_, col)| col.cell_string(i)).collect();
            wtr.write_record(&row)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_mixed_columns() {
        let csv = "x,y,group\n1,2.5,a\n2,NA,b\n3,4.5,\n";
        let df = DataFrame::from_csv_reader(csv.as_bytes()).unwrap();

        assert_eq!(df.n_rows(), 3);
        let x = df.numeric("x").unwrap();
        assert_eq!(x, &[1.0, 2.0, 3.0]);
        assert!(df.numeric("y").unwrap()[1].is_nan());

        let group = df.column("group").unwrap();
        assert!(group.is_factor());
        assert!(group.is_missing(2));
    }

    #[test]
    fn test_write_then_read_preserves_values() {
        let df = DataFrame::new()
            .with_numeric("x", vec![0.5, f64::NAN])
            .unwrap()
            .with_factor("g", &["lo", "hi"])
            .unwrap();

        let mut buf = Vec::new();
        df.to_csv_writer(&mut buf).unwrap();
        let text = String::from_utf8(buf.clone()).unwrap();
        assert_eq!(text, "x,g\n0.5,lo\nNA,hi\n");

        let back = DataFrame::from_csv_reader(buf.as_slice()).unwrap();
        assert_eq!(back.column("g").unwrap(), df.column("g").unwrap());
    }

    #[test]
    fn test_ragged_rows_error() {
        let csv = "x,y\n1,2\n3\n";
        assert!(matches!(
            DataFrame::from_csv_reader(csv.as_bytes()),
            Err(RustyLmError::Csv(_))
        ));
    }
}
