/// Telemetry events sent from the loader to the progress reporter
#[derive(Debug, Clone)]
pub enum TelemetryEvent {
    /// Destination table was (re)created
    TableReplaced { columns: usize },
    /// A batch was committed to the destination
    BatchLoaded {
        batch_index: u64,
        records_loaded: u64,
        duration_ms: u64,
    },
}

/// Statistics aggregated from telemetry events
#[derive(Debug, Default, Clone)]
pub struct ProgressStats {
    /// Column count of the created table, once it exists
    pub columns: Option<usize>,
    pub batches_loaded: u64,
    pub records_loaded: u64,
    pub batch_durations_ms: Vec<u64>,
}

impl ProgressStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update stats with a telemetry event
    pub fn update(&mut self, event: &TelemetryEvent) {
        match event {
            TelemetryEvent::TableReplaced { columns } => {
                self.columns = Some(*columns);
            }
            TelemetryEvent::BatchLoaded {
                batch_index,
                records_loaded,
                duration_ms,
            } => {
                self.batches_loaded = self.batches_loaded.max(batch_index + 1);
                self.records_loaded += records_loaded;
                self.batch_durations_ms.push(*duration_ms);
            }
        }
    }

    /// Calculate percentile from batch durations
    pub fn percentile(&self, p: f64) -> Option<u64> {
        if self.batch_durations_ms.is_empty() {
            return None;
        }

        let mut sorted = self.batch_durations_ms.clone();
        sorted.sort_unstable();

        let index = ((p / 100.0) * sorted.len() as f64).ceil() as usize;
        let index = index.saturating_sub(1).min(sorted.len() - 1);

        Some(sorted[index])
    }

    /// Get p50, p90, p99 percentiles
    pub fn get_percentiles(&self) -> (Option<u64>, Option<u64>, Option<u64>) {
        (
            self.percentile(50.0),
            self.percentile(90.0),
            self.percentile(99.0),
        )
    }
}
