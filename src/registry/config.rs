//! Registry configuration

/// Registry-wide tuning
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Capacity of each path actor inbox
    pub path_inbox_capacity: usize,

    /// Capacity of the registry inbox
    pub registry_inbox_capacity: usize,

    /// Capacity of the channel carrying path readiness events
    pub event_capacity: usize,

    /// Units buffered per reader before it starts lagging
    pub stream_capacity: usize,

    /// RTSP listen address, exported to external commands as `RTSP_PORT`
    pub rtsp_address: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            path_inbox_capacity: 32,
            registry_inbox_capacity: 64,
            event_capacity: 64,
            stream_capacity: 512,
            rtsp_address: ":8554".into(),
        }
    }
}

impl RegistryConfig {
    /// Set the path inbox capacity
    pub fn path_inbox_capacity(mut self, capacity: usize) -> Self {
        self.path_inbox_capacity = capacity.max(1);
        self
    }

    /// Set the registry inbox capacity
    pub fn registry_inbox_capacity(mut self, capacity: usize) -> Self {
        self.registry_inbox_capacity = capacity.max(1);
        self
    }

    /// Set the readiness event capacity
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    /// Set the per-reader stream buffer
    pub fn stream_capacity(mut self, capacity: usize) -> Self {
        self.stream_capacity = capacity.max(1);
        self
    }

    /// Set the RTSP listen address
    pub fn rtsp_address(mut self, addr: impl Into<String>) -> Self {
        self.rtsp_address = addr.into();
        self
    }
}
