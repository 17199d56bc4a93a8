use thiserror::Error;

use crate::executor::{ExecError, Executor, ExternalCommand};

#[derive(Debug, Error)]
pub enum DaylightError {
    #[error("{0}")]
    Exec(#[from] ExecError),
    #[error("sun elevation tool printed {0:?}, expected degrees")]
    Parse(String),
}

/// Sun elevation in degrees at a Unix timestamp.
pub trait SunElevationSource {
    fn sun_elevation(&self, epoch: i64) -> Result<f64, DaylightError>;
}

/// Asks the external ephemeris tool, which takes the timestamp as its only argument.
pub struct ExternalSunElevation<'a> {
    program: &'a str,
    executor: &'a Executor,
}

impl<'a> ExternalSunElevation<'a> {
    pub fn new(program: &'a str, executor: &'a Executor) -> Self {
        Self { program, executor }
    }
}

impl SunElevationSource for ExternalSunElevation<'_> {
    fn sun_elevation(&self, epoch: i64) -> Result<f64, DaylightError> {
        let output = self
            .executor
            .run(&ExternalCommand::new(self.program).arg(epoch.to_string()))?;
        let text = output.stdout.trim();
        text.parse()
            .map_err(|_| DaylightError::Parse(text.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Daylight {
    /// `None` when the ephemeris tool gave no answer.
    pub sun_elevation_deg: Option<f64>,
    pub is_day: bool,
}

impl Daylight {
    /// Night with unknown sun elevation, used when the ephemeris lookup fails.
    pub fn unknown() -> Self {
        Self {
            sun_elevation_deg: None,
            is_day: false,
        }
    }
}

pub struct DaylightClassifier<S> {
    source: S,
    min_sun_elevation: f64,
}

impl<S: SunElevationSource> DaylightClassifier<S> {
    pub fn new(source: S, min_sun_elevation: f64) -> Self {
        Self {
            source,
            min_sun_elevation,
        }
    }

    /// Daylight iff the sun at `midpoint_epoch` is strictly above the minimum.
    pub fn classify(&self, midpoint_epoch: i64) -> Result<Daylight, DaylightError> {
        let sun_elevation_deg = self.source.sun_elevation(midpoint_epoch)?;
        let daylight = self.classify_elevation(sun_elevation_deg);
        log::info!(
            "Sun elevation at pass midpoint: {:.1}° ({})",
            sun_elevation_deg,
            if daylight.is_day { "day" } else { "night" }
        );
        Ok(daylight)
    }

    pub fn classify_elevation(&self, sun_elevation_deg: f64) -> Daylight {
        Daylight {
            sun_elevation_deg: Some(sun_elevation_deg),
            is_day: sun_elevation_deg > self.min_sun_elevation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::fake::FakeRunner;
    use crate::executor::OnFail;

    struct Fixed(f64);

    impl SunElevationSource for Fixed {
        fn sun_elevation(&self, _epoch: i64) -> Result<f64, DaylightError> {
            Ok(self.0)
        }
    }

    #[test]
    fn test_boundary_is_exclusive() {
        let at = DaylightClassifier::new(Fixed(10.0), 10.0).classify(0).unwrap();
        assert!(!at.is_day);

        let above = DaylightClassifier::new(Fixed(10.01), 10.0).classify(0).unwrap();
        assert!(above.is_day);

        let below = DaylightClassifier::new(Fixed(-12.0), 10.0).classify(0).unwrap();
        assert!(!below.is_day);
    }

    #[test]
    fn test_external_tool_is_keyed_by_timestamp() {
        let runner = FakeRunner::new();
        runner.stdout("sun-elevation", " 23.4\n");
        let executor = runner.executor(OnFail::Continue);
        let source = ExternalSunElevation::new("sun-elevation", &executor);

        let daylight = DaylightClassifier::new(source, 10.0)
            .classify(1_612_553_273)
            .unwrap();
        assert_eq!(daylight.sun_elevation_deg, Some(23.4));
        assert!(daylight.is_day);
        assert_eq!(runner.calls()[0].args, vec!["1612553273"]);
    }

    #[test]
    fn test_garbage_output_is_parse_error() {
        let runner = FakeRunner::new();
        runner.stdout("sun-elevation", "Traceback (most recent call last)");
        let executor = runner.executor(OnFail::Continue);
        let source = ExternalSunElevation::new("sun-elevation", &executor);
        assert!(matches!(
            source.sun_elevation(0),
            Err(DaylightError::Parse(_))
        ));
    }
}
