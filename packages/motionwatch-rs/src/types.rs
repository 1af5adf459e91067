use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One timestamped IMU sample (3-axis linear acceleration + 3-axis angular rate).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub accel: [f32; 3],
    pub gyro: [f32; 3],
    /// Monotonic time since the source started
    pub timestamp: Duration,
}

impl Sample {
    pub fn new(accel: [f32; 3], gyro: [f32; 3], timestamp: Duration) -> Self {
        Self {
            accel,
            gyro,
            timestamp,
        }
    }

    /// Scalar value of one of the six channels.
    pub fn channel(&self, channel: Channel) -> f32 {
        match channel.sensor {
            Sensor::Accel => self.accel[channel.axis.index()],
            Sensor::Gyro => self.gyro[channel.axis.index()],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sensor {
    Accel,
    Gyro,
}

/// One of the six scalar streams carried by a [`Sample`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Channel {
    pub sensor: Sensor,
    pub axis: Axis,
}

impl Channel {
    /// Processing order of the spectral engine: accel x/y/z, then gyro x/y/z.
    pub const ALL: [Channel; 6] = [
        Channel::new(Sensor::Accel, Axis::X),
        Channel::new(Sensor::Accel, Axis::Y),
        Channel::new(Sensor::Accel, Axis::Z),
        Channel::new(Sensor::Gyro, Axis::X),
        Channel::new(Sensor::Gyro, Axis::Y),
        Channel::new(Sensor::Gyro, Axis::Z),
    ];

    pub const fn new(sensor: Sensor, axis: Axis) -> Self {
        Self { sensor, axis }
    }

    /// Position of this channel in [`Channel::ALL`].
    pub fn index(self) -> usize {
        let base = match self.sensor {
            Sensor::Accel => 0,
            Sensor::Gyro => 3,
        };
        base + self.axis.index()
    }
}

/// Monitored movement pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Tremor,
    Dyskinesia,
    FreezingOfGait,
}

impl Condition {
    pub const ALL: [Condition; 3] = [
        Condition::Tremor,
        Condition::Dyskinesia,
        Condition::FreezingOfGait,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Condition::Tremor => "Tremor",
            Condition::Dyskinesia => "Dyskinesia",
            Condition::FreezingOfGait => "FOG",
        }
    }
}

/// Debounced status of all three conditions at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorStatus {
    pub tremor: bool,
    pub dyskinesia: bool,
    pub fog: bool,
}

impl MonitorStatus {
    pub fn get(&self, condition: Condition) -> bool {
        match condition {
            Condition::Tremor => self.tremor,
            Condition::Dyskinesia => self.dyskinesia,
            Condition::FreezingOfGait => self.fog,
        }
    }

    /// Highest-priority active condition (FOG, then dyskinesia, then tremor).
    pub fn dominant(&self) -> Option<Condition> {
        if self.fog {
            Some(Condition::FreezingOfGait)
        } else if self.dyskinesia {
            Some(Condition::Dyskinesia)
        } else if self.tremor {
            Some(Condition::Tremor)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_channel_lookup() {
        let sample = Sample::new([1.0, 2.0, 3.0], [4.0, 5.0, 6.0], Duration::ZERO);
        let values: Vec<f32> = Channel::ALL.iter().map(|&c| sample.channel(c)).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

        for (i, channel) in Channel::ALL.into_iter().enumerate() {
            assert_eq!(channel.index(), i);
        }
    }

    #[test]
    fn test_dominant_priority() {
        let mut status = MonitorStatus::default();
        assert_eq!(status.dominant(), None);

        status.tremor = true;
        assert_eq!(status.dominant(), Some(Condition::Tremor));

        status.dyskinesia = true;
        assert_eq!(status.dominant(), Some(Condition::Dyskinesia));

        status.fog = true;
        assert_eq!(status.dominant(), Some(Condition::FreezingOfGait));
    }

    #[test]
    fn test_status_serializes_flat() {
        let status = MonitorStatus {
            tremor: true,
            dyskinesia: false,
            fog: false,
        };
        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(json, r#"{"tremor":true,"dyskinesia":false,"fog":false}"#);
    }
}
