use crate::error::{PitchRsError, Result};
use crate::models::{sort_samples, Sample};
use tracing::debug;

/// Validate and clean imported samples
pub struct SampleValidator;

impl SampleValidator {
    /// Drop unusable samples, clear implausible readings and sort by timestamp
    ///
    /// Returns the number of samples removed.
    pub fn clean(samples: &mut Vec<Sample>) -> usize {
        let before = samples.len();
        samples.retain(|sample| Self::validate(sample).is_ok());

        for sample in samples.iter_mut() {
            Self::clean_sample(sample);
        }
        sort_samples(samples);

        let removed = before - samples.len();
        if removed > 0 {
            debug!(removed, "Dropped invalid samples");
        }
        removed
    }

    /// A sample needs ids, a real position fix and a finite, non-negative speed
    pub fn validate(sample: &Sample) -> Result<()> {
        let position = &sample.position;
        let movement = &sample.movement;

        if sample.player_id.is_empty() || sample.session_id.is_empty() {
            return Err(PitchRsError::Validation(
                "player and session ids are required".to_string(),
            ));
        }
        if !position.latitude.is_finite()
            || !position.longitude.is_finite()
            || !(-90.0..=90.0).contains(&position.latitude)
            || !(-180.0..=180.0).contains(&position.longitude)
        {
            return Err(PitchRsError::Validation(format!(
                "position ({}, {}) is not a valid fix",
                position.latitude, position.longitude
            )));
        }
        if !movement.speed.is_finite() || movement.speed < 0.0 {
            return Err(PitchRsError::Validation(format!(
                "speed {} is not a non-negative number",
                movement.speed
            )));
        }
        if !movement.acceleration.is_finite() {
            return Err(PitchRsError::Validation("acceleration is not finite".to_string()));
        }
        Ok(())
    }

    /// Clear implausible readings that do not invalidate the whole sample
    pub fn clean_sample(sample: &mut Sample) {
        // 0 marks a lost sensor contact
        if let Some(ref mut biometrics) = sample.biometrics {
            if !(30..=220).contains(&biometrics.heart_rate) {
                biometrics.heart_rate = 0;
            }
        }

        // Peak human sprint speed is under 45 km/h
        if sample.movement.speed > 45.0 {
            sample.movement.speed = 45.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Biometrics, Movement, Position};
    use chrono::{Duration, TimeZone, Utc};

    fn create_test_sample(seconds: i64, latitude: f64, speed: f64) -> Sample {
        Sample {
            player_id: "p1".to_string(),
            session_id: "s1".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 10, 26, 15, 0, 0).unwrap()
                + Duration::seconds(seconds),
            position: Position {
                latitude,
                longitude: 0.0,
                altitude: 0.0,
                accuracy: 3.0,
                satellites: 8,
            },
            movement: Movement {
                speed,
                acceleration: 0.0,
                direction: 0.0,
                imu: None,
            },
            biometrics: Some(Biometrics {
                heart_rate: 250,
                body_temperature: 37.0,
                stress_level: 2,
            }),
            environmental: None,
        }
    }

    #[test]
    fn test_clean_drops_and_sorts() {
        let mut samples = vec![
            create_test_sample(2, 0.001, 10.0),
            create_test_sample(1, 95.0, 10.0),
            create_test_sample(0, 0.001, -1.0),
            create_test_sample(3, 0.001, f64::NAN),
            create_test_sample(1, 0.001, 60.0),
        ];

        let removed = SampleValidator::clean(&mut samples);
        assert_eq!(removed, 3);
        assert_eq!(samples.len(), 2);
        assert!(samples[0].timestamp < samples[1].timestamp);
        assert_eq!(samples[0].movement.speed, 45.0);
        assert_eq!(samples[0].heart_rate(), None);
    }

    #[test]
    fn test_validate_reports_reason() {
        assert!(SampleValidator::validate(&create_test_sample(0, 0.001, 10.0)).is_ok());

        match SampleValidator::validate(&create_test_sample(0, 95.0, 10.0)) {
            Err(PitchRsError::Validation(reason)) => assert!(reason.contains("position")),
            other => panic!("expected a validation error, got {:?}", other),
        }

        let mut sample = create_test_sample(0, 0.001, 10.0);
        sample.player_id.clear();
        assert!(matches!(
            SampleValidator::validate(&sample),
            Err(PitchRsError::Validation(_))
        ));
    }
}
