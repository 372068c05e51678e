/// Options that control how introspection behaves.
#[derive(Debug, Clone)]
pub struct IntrospectOptions {
    /// Keep views in the snapshot. They rarely accept inserts.
    pub include_views: bool,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for IntrospectOptions {
    fn default() -> Self {
        Self {
            include_views: false,
            max_connections: 5,
            acquire_timeout_secs: 10,
        }
    }
}
