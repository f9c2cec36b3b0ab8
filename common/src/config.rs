use serde::{Deserialize, Serialize};

/// Node tuning knobs. Defaults follow the deployed hardware: a 16x2
/// character panel, a 100 ms loop period and a 30 ms ultrasonic echo
/// timeout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub http_port: u16,
    pub loop_period_ms: u64,
    pub client_timeout_ms: u64,
    pub recv_buffer_bytes: usize,
    pub display_cols: usize,
    pub display_refresh_s: u64,
    pub echo_timeout_us: u32,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            http_port: 80,
            loop_period_ms: 100,
            client_timeout_ms: 500,
            recv_buffer_bytes: 2048,
            display_cols: 16,
            display_refresh_s: 2,
            echo_timeout_us: 30_000,
        }
    }
}

impl NodeConfig {
    pub fn sanitize(&mut self) {
        if self.loop_period_ms == 0 {
            self.loop_period_ms = 100;
        }
        self.client_timeout_ms = self.client_timeout_ms.clamp(50, 5_000);
        self.recv_buffer_bytes = self.recv_buffer_bytes.clamp(128, 16_384);
        if self.display_cols == 0 {
            self.display_cols = 16;
        }
        if self.display_refresh_s == 0 {
            self.display_refresh_s = 2;
        }
        self.echo_timeout_us = self.echo_timeout_us.clamp(1_000, 1_000_000);
    }
}
