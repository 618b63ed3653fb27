use std::fmt;
use std::time::{Duration, Instant};

use lodgen_world::Stage;

pub const DEFAULT_PERF_WINDOW: usize = 50;

/// Fixed-size ring of samples with a running total.
#[derive(Clone, Debug)]
pub struct Rolling {
    samples: Vec<f64>,
    next: usize,
    window: usize,
    total: f64,
}

impl Rolling {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            samples: Vec::with_capacity(window),
            next: 0,
            window,
            total: 0.0,
        }
    }

    pub fn push(&mut self, value: f64) {
        if self.samples.len() < self.window {
            self.samples.push(value);
        } else {
            self.total -= self.samples[self.next];
            self.samples[self.next] = value;
            self.next = (self.next + 1) % self.window;
            if self.next == 0 {
                // re-sum once per lap to drop accumulated rounding
                self.total = self.samples.iter().sum();
                return;
            }
        }
        self.total += value;
    }

    /// Mean of the samples currently in the window; 0 when empty.
    pub fn average(&self) -> f64 {
        if self.samples.is_empty() {
            0.0
        } else {
            self.total / self.samples.len() as f64
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn window(&self) -> usize {
        self.window
    }
}

/// Timings of one request, filled as its stages run.
#[derive(Clone, Debug)]
pub struct PerfEvent {
    started: Instant,
    stages: [Option<Duration>; Stage::PIPELINE.len()],
    total: Option<Duration>,
}

impl PerfEvent {
    pub fn begin() -> Self {
        Self {
            started: Instant::now(),
            stages: [None; Stage::PIPELINE.len()],
            total: None,
        }
    }

    pub fn record(&mut self, stage: Stage, took: Duration) {
        if let Some(i) = stage.pipeline_index() {
            self.stages[i] = Some(took);
        }
    }

    pub fn finish(&mut self) {
        self.total = Some(self.started.elapsed());
    }

    pub fn stage(&self, stage: Stage) -> Option<Duration> {
        stage.pipeline_index().and_then(|i| self.stages[i])
    }
}

/// Rolling per-stage latency for one worker.
#[derive(Clone, Debug)]
pub struct PerfCalculator {
    stages: Vec<Rolling>,
    total: Rolling,
    requests: u64,
}

impl PerfCalculator {
    pub fn new(window: usize) -> Self {
        Self {
            stages: Stage::PIPELINE.iter().map(|_| Rolling::new(window)).collect(),
            total: Rolling::new(window),
            requests: 0,
        }
    }

    /// Folds a finished event in. Stages the request never reached are not sampled.
    pub fn record(&mut self, event: &PerfEvent) {
        for (rolling, took) in self.stages.iter_mut().zip(event.stages.iter()) {
            if let Some(took) = took {
                rolling.push(took.as_secs_f64() * 1000.0);
            }
        }
        if let Some(total) = event.total {
            self.total.push(total.as_secs_f64() * 1000.0);
        }
        self.requests += 1;
    }

    pub fn stage_average_ms(&self, stage: Stage) -> Option<f64> {
        let rolling = &self.stages[stage.pipeline_index()?];
        (!rolling.is_empty()).then(|| rolling.average())
    }

    pub fn total_average_ms(&self) -> f64 {
        self.total.average()
    }

    pub fn requests(&self) -> u64 {
        self.requests
    }
}

impl Default for PerfCalculator {
    fn default() -> Self {
        Self::new(DEFAULT_PERF_WINDOW)
    }
}

impl fmt::Display for PerfCalculator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "requests={} avg_ms(last {})",
            self.requests,
            self.total.window()
        )?;
        for (stage, rolling) in Stage::PIPELINE.iter().zip(&self.stages) {
            if rolling.is_empty() {
                write!(f, " {stage}=-")?;
            } else {
                write!(f, " {stage}={:.3}", rolling.average())?;
            }
        }
        write!(f, " total={:.3}", self.total.average())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rolling_forgets_old_samples() {
        let mut r = Rolling::new(3);
        for v in [100.0, 1.0, 2.0, 3.0] {
            r.push(v);
        }
        assert_eq!(r.len(), 3);
        assert!((r.average() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn empty_rolling_is_zero() {
        assert_eq!(Rolling::new(4).average(), 0.0);
    }

    #[test]
    fn unreached_stages_are_not_sampled() {
        let mut perf = PerfCalculator::new(4);
        let mut event = PerfEvent::begin();
        event.record(Stage::StructureStart, Duration::from_millis(2));
        event.finish();
        perf.record(&event);
        assert!(perf.stage_average_ms(Stage::StructureStart).is_some());
        assert!(perf.stage_average_ms(Stage::Features).is_none());
        assert!(perf.stage_average_ms(Stage::Empty).is_none());
        let text = perf.to_string();
        assert!(text.starts_with("requests=1"));
        assert!(text.contains("features=-"));
    }
}
