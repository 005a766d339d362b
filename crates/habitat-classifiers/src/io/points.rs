//! CSV reader for labelled point observations.
use std::path::Path;

use csv::StringRecord;

use crate::error::{HabitatError, Result};
use crate::training::PointObservation;

/// Configuration for reading point observation CSV files.
#[derive(Debug, Clone)]
pub struct PointReaderConfig {
    pub x_column: String,
    pub y_column: String,
    /// Column holding the categorical class code.
    pub label_column: String,
    pub delimiter: u8,
}

impl Default for PointReaderConfig {
    fn default() -> Self {
        Self {
            x_column: "x".to_string(),
            y_column: "y".to_string(),
            label_column: "CLASS".to_string(),
            delimiter: b',',
        }
    }
}

/// Read a point CSV with `x`, `y` and `CLASS` columns.
pub fn read_points_csv<P: AsRef<Path>>(path: P) -> Result<Vec<PointObservation>> {
    read_points_csv_with_config(path, &PointReaderConfig::default())
}

/// Read a point CSV using a custom configuration.
pub fn read_points_csv_with_config<P: AsRef<Path>>(
    path: P,
    config: &PointReaderConfig,
) -> Result<Vec<PointObservation>> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(config.delimiter)
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let headers = reader.headers()?.clone();
    let column = |name: &str| {
        find_column(&headers, name).ok_or_else(|| {
            HabitatError::configuration(format!(
                "{} has no '{}' column",
                path.display(),
                name
            ))
        })
    };
    let x_idx = column(&config.x_column)?;
    let y_idx = column(&config.y_column)?;
    let label_idx = column(&config.label_column)?;

    let mut points = Vec::new();
    for (row_idx, result) in reader.records().enumerate() {
        let record = result?;
        let line = row_idx + 2;
        let x = parse_field::<f64>(&record, x_idx, "x", line)?;
        let y = parse_field::<f64>(&record, y_idx, "y", line)?;
        let label = parse_label(&record, label_idx, line)?;
        points.push(PointObservation::new(x, y, label));
    }

    log::debug!("Read {} points from {}", points.len(), path.display());
    Ok(points)
}

fn find_column(headers: &StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|header| header.eq_ignore_ascii_case(name))
}

fn parse_field<T: std::str::FromStr>(
    record: &StringRecord,
    idx: usize,
    what: &str,
    line: usize,
) -> Result<T> {
    let raw = record.get(idx).unwrap_or_default();
    raw.parse::<T>().map_err(|_| {
        HabitatError::configuration(format!("invalid {} value '{}' on line {}", what, raw, line))
    })
}

/// Class codes are integers; integral floats such as `1.0` are accepted.
fn parse_label(record: &StringRecord, idx: usize, line: usize) -> Result<i64> {
    let raw = record.get(idx).unwrap_or_default();
    if let Ok(v) = raw.parse::<i64>() {
        return Ok(v);
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() && v.fract() == 0.0 => Ok(v as i64),
        _ => Err(HabitatError::configuration(format!(
            "invalid class label '{}' on line {}",
            raw, line
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_points_with_float_labels() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "id,X,Y,CLASS").unwrap();
        writeln!(file, "1, 10.5, 20.25, 1").unwrap();
        writeln!(file, "2, 11.0, 21.0, 0.0").unwrap();
        file.flush().unwrap();

        let points = read_points_csv(file.path()).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].x, 10.5);
        assert_eq!(points[0].label, 1);
        assert_eq!(points[1].label, 0);
    }

    #[test]
    fn missing_label_column_is_reported() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "x,y,label").unwrap();
        writeln!(file, "1,2,1").unwrap();
        file.flush().unwrap();

        let err = read_points_csv(file.path()).unwrap_err();
        assert!(err.to_string().contains("CLASS"));
    }

    #[test]
    fn fractional_label_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "x,y,CLASS").unwrap();
        writeln!(file, "1,2,0.5").unwrap();
        file.flush().unwrap();

        assert!(read_points_csv(file.path()).is_err());
    }
}
