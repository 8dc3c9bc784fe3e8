//! Call tracing and statistics
//!
//! Design:
//! - Ring buffer of recent calls (bounded memory)
//! - Performance counters per opcode
//! - Disabled by default; a disabled tracer records nothing

use crate::abi::Opcode;
use crate::call::Args;
use serde::Serialize;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// A single traced call
#[derive(Debug, Clone, Serialize)]
pub struct TraceEvent {
    /// Milliseconds since the tracer started
    pub timestamp: f64,
    /// Raw opcode, including rejected ones
    pub op: u32,
    pub args: Args,
    pub result: isize,
    /// Milliseconds spent in the handler
    pub duration: f64,
}

/// Performance counters for one opcode
#[derive(Debug, Clone, Serialize)]
pub struct PerfCounters {
    /// Successful calls
    pub count: u64,
    /// Total time spent (ms)
    pub total_time: f64,
    /// Minimum call time (ms)
    pub min_time: f64,
    /// Maximum call time (ms)
    pub max_time: f64,
    /// Failed calls
    pub errors: u64,
}

impl PerfCounters {
    pub fn new() -> Self {
        Self {
            count: 0,
            total_time: 0.0,
            min_time: f64::MAX,
            max_time: 0.0,
            errors: 0,
        }
    }

    /// Record a successful operation
    pub fn record(&mut self, duration: f64) {
        self.count += 1;
        self.total_time += duration;
        if duration < self.min_time {
            self.min_time = duration;
        }
        if duration > self.max_time {
            self.max_time = duration;
        }
    }

    pub fn record_error(&mut self) {
        self.errors += 1;
    }

    /// Average time per successful call
    pub fn avg_time(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total_time / self.count as f64
        }
    }
}

impl Default for PerfCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of the tracer's counters
#[derive(Debug, Clone, Serialize)]
pub struct TraceSummary {
    pub uptime: f64,
    pub total_calls: u64,
    pub total_errors: u64,
    /// Calls with an opcode outside the closed set
    pub rejected: u64,
    /// (opcode name, counters), in opcode order
    pub ops: Vec<(&'static str, PerfCounters)>,
    pub recent: Vec<TraceEvent>,
}

#[derive(Debug)]
pub struct Tracer {
    enabled: bool,
    capacity: usize,
    events: VecDeque<TraceEvent>,
    ops: [PerfCounters; Opcode::ALL.len()],
    rejected: u64,
    start: Instant,
}

impl Tracer {
    pub fn new(capacity: usize) -> Self {
        Self {
            enabled: false,
            capacity,
            events: VecDeque::with_capacity(capacity.min(1024)),
            ops: Default::default(),
            rejected: 0,
            start: Instant::now(),
        }
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Record one completed call
    pub fn record(&mut self, op: u32, args: Args, result: isize, elapsed: Duration) {
        if !self.enabled {
            return;
        }
        let duration = elapsed.as_secs_f64() * 1000.0;
        match Opcode::from_u32(op) {
            Some(opcode) => {
                let counters = &mut self.ops[opcode.num() as usize];
                if result < 0 {
                    counters.record_error();
                } else {
                    counters.record(duration);
                }
            }
            None => self.rejected += 1,
        }

        if self.capacity == 0 {
            return;
        }
        if self.events.len() >= self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(TraceEvent {
            timestamp: self.start.elapsed().as_secs_f64() * 1000.0,
            op,
            args,
            result,
            duration,
        });
    }

    pub fn counters(&self, op: Opcode) -> &PerfCounters {
        &self.ops[op.num() as usize]
    }

    pub fn events(&self) -> impl Iterator<Item = &TraceEvent> {
        self.events.iter()
    }

    pub fn summary(&self) -> TraceSummary {
        TraceSummary {
            uptime: self.start.elapsed().as_secs_f64() * 1000.0,
            total_calls: self.ops.iter().map(|c| c.count + c.errors).sum::<u64>() + self.rejected,
            total_errors: self.ops.iter().map(|c| c.errors).sum::<u64>() + self.rejected,
            rejected: self.rejected,
            ops: Opcode::ALL
                .iter()
                .map(|op| (op.name(), self.ops[op.num() as usize].clone()))
                .collect(),
            recent: self.events.iter().cloned().collect(),
        }
    }

    /// Clear events and counters
    pub fn reset(&mut self) {
        self.events.clear();
        self.ops = Default::default();
        self.rejected = 0;
        self.start = Instant::now();
    }
}

impl Default for Tracer {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_TRACE_BUFFER)
    }
}
