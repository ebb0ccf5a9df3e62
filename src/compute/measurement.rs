//! Measured sensor series and their binding to the sensor layout.

use std::fs;
use std::path::{Path, PathBuf};

use crate::schema::SensorLayout;

/// Measurement loading errors.
#[derive(Debug, thiserror::Error)]
pub enum MeasurementError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Measurement table has no header row")]
    MissingHeader,
    #[error("Measurement table has no data rows")]
    Empty,
    #[error("Line {line}: expected {expected} fields, found {found}")]
    RaggedRow {
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("Line {line}, column '{column}': cannot parse '{value}' as a number")]
    InvalidValue {
        line: usize,
        column: String,
        value: String,
    },
    #[error("Column '{0}' not found in measurement table")]
    MissingColumn(String),
    #[error("Sensor '{column}' has {found} samples, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },
}

/// Tab-separated measurement table: one header row, then one row per
/// timestamp. Stored column-major.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementTable {
    headers: Vec<String>,
    columns: Vec<Vec<f64>>,
}

impl MeasurementTable {
    /// Load a table from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, MeasurementError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| MeasurementError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse tab-separated text.
    pub fn parse(content: &str) -> Result<Self, MeasurementError> {
        let mut lines = content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty());

        let (_, header) = lines.next().ok_or(MeasurementError::MissingHeader)?;
        let headers: Vec<String> = header
            .split('\t')
            .map(|h| h.trim().to_string())
            .collect();
        let mut columns = vec![Vec::new(); headers.len()];

        for (index, line) in lines {
            let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
            if fields.len() != headers.len() {
                return Err(MeasurementError::RaggedRow {
                    line: index + 1,
                    expected: headers.len(),
                    found: fields.len(),
                });
            }
            for (column, (field, name)) in fields.iter().zip(&headers).enumerate() {
                let value = field
                    .parse::<f64>()
                    .map_err(|_| MeasurementError::InvalidValue {
                        line: index + 1,
                        column: name.clone(),
                        value: field.to_string(),
                    })?;
                columns[column].push(value);
            }
        }

        if columns.first().is_none_or(|c| c.is_empty()) {
            return Err(MeasurementError::Empty);
        }

        Ok(Self { headers, columns })
    }

    /// Column names, in file order.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Number of data rows.
    pub fn rows(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    /// Values of a named column.
    pub fn column(&self, name: &str) -> Result<&[f64], MeasurementError> {
        self.headers
            .iter()
            .position(|h| h == name)
            .map(|i| self.columns[i].as_slice())
            .ok_or_else(|| MeasurementError::MissingColumn(name.to_string()))
    }
}

/// One sensor's measured series.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorSeries {
    /// Column the series came from.
    pub label: String,
    /// Probe position (m).
    pub location: f64,
    /// Instrument weighting `1 / resolution^2`.
    pub weight: f64,
    /// Measured values at the run's timestamps.
    pub measured: Vec<f64>,
}

impl SensorSeries {
    pub fn new(label: impl Into<String>, location: f64, resolution: f64, measured: Vec<f64>) -> Self {
        Self {
            label: label.into(),
            location,
            weight: 1.0 / (resolution * resolution),
            measured,
        }
    }
}

/// All sensors of one measured quantity.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChannelObservations {
    pub sensors: Vec<SensorSeries>,
}

impl ChannelObservations {
    pub fn new(sensors: Vec<SensorSeries>) -> Self {
        Self { sensors }
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }
}

/// Measurements aligned on a common time axis, split by channel.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorObservations {
    /// Measurement timestamps (s).
    pub times: Vec<f64>,
    pub temperature: ChannelObservations,
    pub humidity: ChannelObservations,
    pub flux: ChannelObservations,
}

impl SensorObservations {
    /// Assemble observations, checking every series matches the time axis.
    pub fn new(
        times: Vec<f64>,
        temperature: ChannelObservations,
        humidity: ChannelObservations,
        flux: ChannelObservations,
    ) -> Result<Self, MeasurementError> {
        if times.is_empty() {
            return Err(MeasurementError::Empty);
        }
        for sensor in temperature
            .sensors
            .iter()
            .chain(&humidity.sensors)
            .chain(&flux.sensors)
        {
            if sensor.measured.len() != times.len() {
                return Err(MeasurementError::LengthMismatch {
                    column: sensor.label.clone(),
                    expected: times.len(),
                    found: sensor.measured.len(),
                });
            }
        }
        Ok(Self {
            times,
            temperature,
            humidity,
            flux,
        })
    }

    /// Pick the configured columns out of a measurement table.
    pub fn bind(layout: &SensorLayout, table: &MeasurementTable) -> Result<Self, MeasurementError> {
        let times = table.column(&layout.time_column)?.to_vec();

        let mut temperature = Vec::with_capacity(layout.probes.len());
        let mut humidity = Vec::with_capacity(layout.probes.len());
        for probe in &layout.probes {
            temperature.push(SensorSeries::new(
                &probe.temperature_column,
                probe.location,
                probe.temperature_resolution,
                table.column(&probe.temperature_column)?.to_vec(),
            ));
            humidity.push(SensorSeries::new(
                &probe.humidity_column,
                probe.location,
                probe.humidity_resolution,
                table.column(&probe.humidity_column)?.to_vec(),
            ));
        }

        let flux = layout
            .flux_probes
            .iter()
            .map(|probe| {
                Ok(SensorSeries::new(
                    &probe.column,
                    probe.location,
                    probe.resolution,
                    table.column(&probe.column)?.to_vec(),
                ))
            })
            .collect::<Result<Vec<_>, MeasurementError>>()?;

        Self::new(
            times,
            ChannelObservations::new(temperature),
            ChannelObservations::new(humidity),
            ChannelObservations::new(flux),
        )
    }

    /// Number of timestamps.
    pub fn sample_count(&self) -> usize {
        self.times.len()
    }
}
