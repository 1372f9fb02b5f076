use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use csv::{ReaderBuilder, StringRecord};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use crate::import::{has_extension, ImportFormat};
use crate::models::{Biometrics, Environmental, ImuData, Movement, Position, Sample, Vector3};

/// CSV importer for flat, one-row-per-sample telemetry exports
///
/// Optional sensor columns may be missing or empty. IMU data is kept only
/// when all three accelerometer axes are present.
pub struct CsvImporter {
    column_mapping: HashMap<String, String>,
}

impl CsvImporter {
    pub fn new() -> Self {
        let mut column_mapping = HashMap::new();

        Self::add_mapping(&mut column_mapping, "player_id", &["player_id", "player", "athlete_id"]);
        Self::add_mapping(&mut column_mapping, "session_id", &["session_id", "session"]);
        Self::add_mapping(&mut column_mapping, "timestamp", &["timestamp", "time", "datetime"]);
        Self::add_mapping(&mut column_mapping, "latitude", &["latitude", "lat", "position_lat"]);
        Self::add_mapping(
            &mut column_mapping,
            "longitude",
            &["longitude", "lng", "lon", "position_long"],
        );
        Self::add_mapping(&mut column_mapping, "altitude", &["altitude", "alt", "elevation"]);
        Self::add_mapping(&mut column_mapping, "accuracy", &["accuracy", "hdop_m"]);
        Self::add_mapping(&mut column_mapping, "satellites", &["satellites", "sats"]);
        Self::add_mapping(&mut column_mapping, "speed", &["speed", "speed_kmh", "velocity"]);
        Self::add_mapping(&mut column_mapping, "acceleration", &["acceleration", "accel"]);
        Self::add_mapping(&mut column_mapping, "direction", &["direction", "heading", "bearing"]);
        Self::add_mapping(&mut column_mapping, "heart_rate", &["heart_rate", "hr", "heartrate", "bpm"]);

        for column in [
            "accel_x", "accel_y", "accel_z", "gyro_x", "gyro_y", "gyro_z", "mag_x", "mag_y", "mag_z",
            "body_temperature", "stress_level", "temperature", "pressure", "humidity",
        ] {
            column_mapping.insert(column.to_string(), column.to_string());
        }

        Self { column_mapping }
    }

    fn add_mapping(mapping: &mut HashMap<String, String>, standard: &str, variations: &[&str]) {
        for variation in variations {
            mapping.insert(variation.to_lowercase(), standard.to_string());
        }
    }

    fn normalize_column_name(&self, name: &str) -> String {
        let normalized = name.trim().to_lowercase().replace([' ', '-'], "_");

        self.column_mapping
            .get(&normalized)
            .cloned()
            .unwrap_or(normalized)
    }

    fn parse_datetime(date_str: &str) -> Result<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(date_str) {
            return Ok(dt.with_timezone(&Utc));
        }

        let formats = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];
        for format in &formats {
            if let Ok(naive_dt) = NaiveDateTime::parse_from_str(date_str, format) {
                return Ok(DateTime::from_naive_utc_and_offset(naive_dt, Utc));
            }
        }

        // Epoch milliseconds, as most trackers stream them
        if let Ok(millis) = date_str.parse::<i64>() {
            if let Some(dt) = DateTime::from_timestamp_millis(millis) {
                return Ok(dt);
            }
        }

        anyhow::bail!("Unable to parse datetime: {}", date_str);
    }

    /// Parse samples from any CSV source with a header row
    pub fn read_samples<R: Read>(&self, source: R) -> Result<Vec<Sample>> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(source);

        let columns: HashMap<String, usize> = reader
            .headers()?
            .iter()
            .enumerate()
            .map(|(i, header)| (self.normalize_column_name(header), i))
            .collect();

        for required in ["player_id", "session_id", "timestamp", "latitude", "longitude", "speed"] {
            if !columns.contains_key(required) {
                anyhow::bail!("Missing required column: {}", required);
            }
        }

        let mut samples = Vec::new();
        for (line, result) in reader.records().enumerate() {
            let record = result?;
            let row = Row {
                record: &record,
                columns: &columns,
            };
            let sample = Self::sample_from_row(&row)
                .with_context(|| format!("Invalid sample on data row {}", line + 1))?;
            samples.push(sample);
        }

        Ok(samples)
    }

    fn sample_from_row(row: &Row) -> Result<Sample> {
        let timestamp = Self::parse_datetime(row.required("timestamp")?)?;

        let accelerometer = match (row.f64("accel_x")?, row.f64("accel_y")?, row.f64("accel_z")?) {
            (Some(x), Some(y), Some(z)) => Some(Vector3::new(x, y, z)),
            _ => None,
        };
        let imu = accelerometer.map(|accelerometer| ImuData {
            accelerometer,
            gyroscope: row.vector("gyro").unwrap_or_default(),
            magnetometer: row.vector("mag").unwrap_or_default(),
        });

        let biometrics = match row.parse::<u16>("heart_rate")? {
            Some(heart_rate) => Some(Biometrics {
                heart_rate,
                body_temperature: row.f64("body_temperature")?.unwrap_or(0.0),
                stress_level: row.parse::<u8>("stress_level")?.unwrap_or(0),
            }),
            None => None,
        };

        let environmental = match row.f64("temperature")? {
            Some(temperature) => Some(Environmental {
                temperature,
                pressure: row.f64("pressure")?.unwrap_or(0.0),
                humidity: row.f64("humidity")?.unwrap_or(0.0),
            }),
            None => None,
        };

        Ok(Sample {
            player_id: row.required("player_id")?.to_string(),
            session_id: row.required("session_id")?.to_string(),
            timestamp,
            position: Position {
                latitude: row.required_f64("latitude")?,
                longitude: row.required_f64("longitude")?,
                altitude: row.f64("altitude")?.unwrap_or(0.0),
                accuracy: row.f64("accuracy")?.unwrap_or(0.0),
                satellites: row.parse::<u8>("satellites")?.unwrap_or(0),
            },
            movement: Movement {
                speed: row.required_f64("speed")?,
                acceleration: row.f64("acceleration")?.unwrap_or(0.0),
                direction: row.f64("direction")?.unwrap_or(0.0),
                imu,
            },
            biometrics,
            environmental,
        })
    }
}

impl Default for CsvImporter {
    fn default() -> Self {
        Self::new()
    }
}

/// One CSV record with named, optional cells
struct Row<'a> {
    record: &'a StringRecord,
    columns: &'a HashMap<String, usize>,
}

impl Row<'_> {
    fn get(&self, column: &str) -> Option<&str> {
        self.columns
            .get(column)
            .and_then(|i| self.record.get(*i))
            .filter(|value| !value.is_empty())
    }

    fn required(&self, column: &str) -> Result<&str> {
        self.get(column)
            .with_context(|| format!("Empty required column: {}", column))
    }

    fn parse<T: std::str::FromStr>(&self, column: &str) -> Result<Option<T>> {
        match self.get(column) {
            Some(value) => value
                .parse::<T>()
                .map(Some)
                .map_err(|_| anyhow::anyhow!("Invalid value for {}: {}", column, value)),
            None => Ok(None),
        }
    }

    fn f64(&self, column: &str) -> Result<Option<f64>> {
        self.parse::<f64>(column)
    }

    fn required_f64(&self, column: &str) -> Result<f64> {
        self.f64(column)?
            .with_context(|| format!("Empty required column: {}", column))
    }

    fn vector(&self, prefix: &str) -> Option<Vector3> {
        let axis = |name: &str| self.f64(&format!("{}_{}", prefix, name)).ok().flatten();
        Some(Vector3::new(axis("x")?, axis("y")?, axis("z")?))
    }
}

impl ImportFormat for CsvImporter {
    fn can_import(&self, file_path: &Path) -> bool {
        has_extension(file_path, "csv")
    }

    fn import_file(&self, file_path: &Path) -> Result<Vec<Sample>> {
        let file = std::fs::File::open(file_path)
            .with_context(|| format!("Failed to open sample file: {}", file_path.display()))?;
        self.read_samples(file)
    }

    fn get_format_name(&self) -> &'static str {
        "CSV"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "player_id,session_id,timestamp,lat,lon,altitude,accuracy,satellites,speed,acceleration,direction,accel_x,accel_y,accel_z,heart_rate\n";

    #[test]
    fn test_full_row() {
        let content = format!(
            "{}p1,s1,2024-10-26T15:00:00Z,51.5,-0.12,11,2.5,9,21.4,3.2,180,0.5,0.2,16.1,171\n",
            HEADER
        );

        let samples = CsvImporter::new().read_samples(content.as_bytes()).unwrap();
        assert_eq!(samples.len(), 1);

        let sample = &samples[0];
        assert_eq!(sample.position.satellites, 9);
        assert_eq!(sample.movement.speed, 21.4);
        assert_eq!(sample.heart_rate(), Some(171));
        assert_eq!(sample.accelerometer().unwrap().z, 16.1);
    }

    #[test]
    fn test_optional_columns_empty() {
        let content = format!("{}p1,s1,1729954800000,51.5,-0.12,,,,8.0,,,,,,\n", HEADER);

        let samples = CsvImporter::new().read_samples(content.as_bytes()).unwrap();
        let sample = &samples[0];
        assert!(sample.movement.imu.is_none());
        assert!(sample.biometrics.is_none());
        assert_eq!(sample.position.altitude, 0.0);
        assert_eq!(sample.timestamp.timestamp(), 1_729_954_800);
    }

    #[test]
    fn test_partial_accelerometer_dropped() {
        let content = format!("{}p1,s1,2024-10-26 15:00:00,51.5,-0.12,,,,8.0,,,1.0,,,\n", HEADER);

        let samples = CsvImporter::new().read_samples(content.as_bytes()).unwrap();
        assert!(samples[0].accelerometer().is_none());
    }

    #[test]
    fn test_missing_required_column() {
        let content = "player_id,session_id,timestamp,lat,lon\np1,s1,2024-10-26T15:00:00Z,51.5,-0.12\n";
        let err = CsvImporter::new().read_samples(content.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("speed"));
    }

    #[test]
    fn test_bad_number_reports_row() {
        let content = format!("{}p1,s1,2024-10-26T15:00:00Z,51.5,-0.12,,,,fast,,,,,,\n", HEADER);
        let err = CsvImporter::new().read_samples(content.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("row 1"));
    }
}
