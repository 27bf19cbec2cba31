use std::collections::VecDeque;

use nettray_types::{events::StatusEvent, probe::ProbeResult};

use crate::ChartPoint;

/// Number of samples an observer keeps for display.
pub const CHART_WINDOW: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Sample {
    online: bool,
    value: Option<f64>,
}

/// Rolling display cache owned by a single observer.
///
/// Seeded once from the monitor history, then fed one event at a time.
#[derive(Debug, Clone, Default)]
pub struct ChartWindow {
    samples: VecDeque<Sample>,
}

impl ChartWindow {
    pub fn new() -> Self {
        Self {
            samples: VecDeque::with_capacity(CHART_WINDOW),
        }
    }

    pub fn from_history(history: &[ProbeResult]) -> Self {
        let mut window = Self::new();
        for result in history {
            window.push(result.success(), result.latency_ms());
        }
        window
    }

    pub fn push_event(&mut self, event: &StatusEvent) {
        self.push(event.online, event.latency_ms());
    }

    /// Offline samples never carry a value.
    pub fn push(&mut self, online: bool, value: Option<f64>) {
        if self.samples.len() == CHART_WINDOW {
            self.samples.pop_front();
        }
        self.samples.push_back(Sample {
            online,
            value: if online { value } else { None },
        });
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn points(&self) -> Vec<ChartPoint> {
        self.samples
            .iter()
            .enumerate()
            .map(|(index, sample)| ChartPoint {
                index,
                is_online: sample.online,
                value: sample.value,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;

    use super::*;

    #[test]
    fn seeds_from_the_most_recent_history() {
        let history: Vec<ProbeResult> = (0..30u64)
            .map(|ms| ProbeResult::reachable(Utc::now(), Some(Duration::from_millis(ms))))
            .collect();
        let window = ChartWindow::from_history(&history);

        let points = window.points();
        assert_eq!(points.len(), CHART_WINDOW);
        assert_eq!(points[0].value, Some(10.0));
        assert_eq!(points[19].value, Some(29.0));
        assert!(points.iter().enumerate().all(|(i, p)| p.index == i));
    }

    #[test]
    fn events_evict_the_oldest_sample() {
        let mut window = ChartWindow::new();
        for _ in 0..CHART_WINDOW {
            window.push(true, Some(50.0));
        }
        let offline = StatusEvent::from(&ProbeResult::unreachable(Utc::now()));
        window.push_event(&offline);

        assert_eq!(window.len(), CHART_WINDOW);
        let points = window.points();
        assert!(!points[CHART_WINDOW - 1].is_online);
        assert_eq!(points[CHART_WINDOW - 1].value, None);
        assert!(points[0].is_online);
    }

    #[test]
    fn offline_samples_drop_stray_values() {
        let mut window = ChartWindow::new();
        window.push(false, Some(12.0));
        assert_eq!(window.points()[0].value, None);
    }
}
