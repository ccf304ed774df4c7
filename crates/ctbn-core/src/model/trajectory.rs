//! Observed trajectories: timestamped full assignments of every node.

use ctbn_common::{Error, Result};
use serde::{Deserialize, Serialize};

/// One observation: the value of every node from `time` until the next event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub time: f64,
    pub values: Vec<usize>,
}

impl Event {
    pub fn new(time: f64, values: Vec<usize>) -> Self {
        Self { time, values }
    }
}

/// The ordered events observed for one subject.
///
/// Invariants checked at construction and on deserialization: at least one
/// event, the first at time 0, times finite and strictly increasing, and
/// every event assigns the same number of nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTrajectory")]
pub struct Trajectory {
    events: Vec<Event>,
    #[serde(default)]
    label: Option<usize>,
}

/// Wire form of [`Trajectory`] before its invariants are checked.
#[derive(Deserialize)]
struct RawTrajectory {
    events: Vec<Event>,
    #[serde(default)]
    label: Option<usize>,
}

impl TryFrom<RawTrajectory> for Trajectory {
    type Error = Error;

    fn try_from(raw: RawTrajectory) -> Result<Self> {
        let trajectory = Trajectory::new(raw.events)?;
        Ok(match raw.label {
            Some(label) => trajectory.with_label(label),
            None => trajectory,
        })
    }
}

impl Trajectory {
    pub fn new(events: Vec<Event>) -> Result<Self> {
        let trajectory = Self {
            events,
            label: None,
        };
        trajectory.check()?;
        Ok(trajectory)
    }

    /// Re-check the event invariants.
    pub fn check(&self) -> Result<()> {
        let events = &self.events;
        let first = events
            .first()
            .ok_or_else(|| Error::MalformedTrajectory("trajectory has no events".to_string()))?;
        if first.time != 0.0 {
            return Err(Error::MalformedTrajectory(format!(
                "first event must be at time 0, found {}",
                first.time
            )));
        }
        let width = first.values.len();
        for (i, event) in events.iter().enumerate() {
            if !event.time.is_finite() {
                return Err(Error::MalformedTrajectory(format!(
                    "event {} has non-finite time {}",
                    i, event.time
                )));
            }
            if event.values.len() != width {
                return Err(Error::MalformedTrajectory(format!(
                    "event {} assigns {} nodes, expected {}",
                    i,
                    event.values.len(),
                    width
                )));
            }
        }
        for (i, pair) in events.windows(2).enumerate() {
            if pair[1].time <= pair[0].time {
                return Err(Error::MalformedTrajectory(format!(
                    "event {} at time {} does not follow time {}",
                    i + 1,
                    pair[1].time,
                    pair[0].time
                )));
            }
        }
        Ok(())
    }

    /// Attach the ground-truth class, if known. Learning never reads it.
    pub fn with_label(mut self, label: usize) -> Self {
        self.label = Some(label);
        self
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn label(&self) -> Option<usize> {
        self.label
    }

    /// Number of events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Number of nodes each event assigns.
    pub fn width(&self) -> usize {
        self.events.first().map_or(0, |e| e.values.len())
    }

    /// Time of the last event.
    pub fn duration(&self) -> f64 {
        self.events.last().map_or(0.0, |e| e.time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(time: f64, values: &[usize]) -> Event {
        Event::new(time, values.to_vec())
    }

    #[test]
    fn accepts_well_formed_events() {
        let t = Trajectory::new(vec![ev(0.0, &[0, 1]), ev(0.5, &[0, 0]), ev(2.0, &[0, 1])])
            .unwrap()
            .with_label(1);
        assert_eq!(t.len(), 3);
        assert_eq!(t.width(), 2);
        assert_eq!(t.duration(), 2.0);
        assert_eq!(t.label(), Some(1));
    }

    #[test]
    fn rejects_empty() {
        assert!(Trajectory::new(Vec::new()).is_err());
    }

    #[test]
    fn rejects_nonzero_start() {
        let err = Trajectory::new(vec![ev(0.1, &[0])]).unwrap_err();
        assert!(err.to_string().contains("time 0"));
    }

    #[test]
    fn rejects_non_increasing_times() {
        assert!(Trajectory::new(vec![ev(0.0, &[0]), ev(1.0, &[1]), ev(1.0, &[0])]).is_err());
        assert!(Trajectory::new(vec![ev(0.0, &[0]), ev(1.0, &[1]), ev(0.5, &[0])]).is_err());
    }

    #[test]
    fn rejects_ragged_events() {
        assert!(Trajectory::new(vec![ev(0.0, &[0, 0]), ev(1.0, &[1])]).is_err());
    }

    #[test]
    fn deserialization_enforces_invariants() {
        let parsed: Trajectory = serde_json::from_str(
            r#"{"events":[{"time":0.0,"values":[0,1]},{"time":1.5,"values":[1,1]}],"label":1}"#,
        )
        .unwrap();
        assert_eq!(parsed.width(), 2);
        assert_eq!(parsed.label(), Some(1));

        for bad in [
            r#"{"events":[]}"#,
            r#"{"events":[{"time":0.0,"values":[0,1]},{"time":1.0,"values":[1]}]}"#,
            r#"{"events":[{"time":0.0,"values":[0]},{"time":2.0,"values":[1]},{"time":1.0,"values":[0]}]}"#,
            r#"{"events":[{"time":0.5,"values":[0]}]}"#,
        ] {
            let err = serde_json::from_str::<Trajectory>(bad).unwrap_err();
            assert!(err.to_string().contains("malformed trajectory"), "{}: {}", bad, err);
        }
    }

    #[test]
    fn serialized_form_round_trips() {
        let t = Trajectory::new(vec![ev(0.0, &[2]), ev(0.25, &[0])]).unwrap().with_label(0);
        let back: Trajectory = serde_json::from_str(&serde_json::to_string(&t).unwrap()).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn rejects_nan_time() {
        assert!(Trajectory::new(vec![ev(0.0, &[0]), ev(f64::NAN, &[1])]).is_err());
    }
}
