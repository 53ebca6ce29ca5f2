use config::{define_options, Count, Duration as ConfigDuration};

define_options! {
    /// Configuration recognized by the coordinator (§6).
    #[derive(Clone)]
    pub struct CoordinatorConfig {
        /// Capability validity in seconds.
        capability_timeout: ConfigDuration = ConfigDuration(std::time::Duration::from_secs(300)),

        /// Lease-wait sleep before proceeding when no replica
        /// self-identified as primary and not all replicas responded.
        lease_timeout_ms: Count = Count(15_000),

        /// Per-call deadline for OSD RPCs.
        osd_rpc_timeout_ms: Count = Count(30_000),

        /// Capability client-identity default; falls back to the local
        /// hostname if left empty.
        advertised_address: String = String::new(),
    }
}

impl CoordinatorConfig {
    pub fn lease_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.lease_timeout_ms.0)
    }

    pub fn osd_rpc_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.osd_rpc_timeout_ms.0)
    }

    pub fn client_identity(&self) -> String {
        if !self.advertised_address.is_empty() {
            self.advertised_address.clone()
        } else {
            hostname_fallback()
        }
    }
}

fn hostname_fallback() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string())
}
