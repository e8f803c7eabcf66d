//! Per-method call statistics

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use quarry_json_rpc::{JsonRpcRequest, JsonRpcResponse};

use crate::hooks::{DispatchHook, HookError};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MethodStats {
    pub total_calls: u64,
    pub success_calls: u64,
    pub failed_calls: u64,
    /// Running mean in milliseconds
    pub average_resp_time: f64,
}

impl MethodStats {
    fn record(&mut self, success: bool, elapsed: Duration) {
        self.total_calls += 1;
        if success {
            self.success_calls += 1;
        } else {
            self.failed_calls += 1;
        }
        let sample = elapsed.as_secs_f64() * 1000.0;
        self.average_resp_time += (sample - self.average_resp_time) / self.total_calls as f64;
    }
}

/// Answer of `get_service_stats`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Seconds since the statistics were created
    pub total_runtime: f64,
    /// Calls across every method
    pub method_calls_count: u64,
    pub method_calls: BTreeMap<String, MethodStats>,
}

/// Call counters recorded from the `after_call` hook
#[derive(Debug)]
pub struct CallStats {
    started: Instant,
    methods: Mutex<HashMap<String, MethodStats>>,
}

impl Default for CallStats {
    fn default() -> Self {
        Self::new()
    }
}

impl CallStats {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            methods: Mutex::new(HashMap::new()),
        }
    }

    pub fn record(&self, method: &str, success: bool, elapsed: Duration) {
        self.methods
            .lock()
            .entry(method.to_string())
            .or_default()
            .record(success, elapsed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let method_calls: BTreeMap<_, _> = self
            .methods
            .lock()
            .iter()
            .map(|(name, stats)| (name.clone(), stats.clone()))
            .collect();
        StatsSnapshot {
            total_runtime: self.started.elapsed().as_secs_f64(),
            method_calls_count: method_calls.values().map(|s| s.total_calls).sum(),
            method_calls,
        }
    }
}

#[async_trait]
impl DispatchHook for CallStats {
    async fn after_call(
        &self,
        request: &JsonRpcRequest,
        response: &JsonRpcResponse,
        elapsed: Duration,
    ) -> Result<(), HookError> {
        self.record(&request.method, !response.is_error(), elapsed);
        Ok(())
    }
}
