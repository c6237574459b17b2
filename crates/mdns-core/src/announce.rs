use std::collections::HashMap;

use mdns_sd::{ServiceDaemon, ServiceInfo};

use crate::model::ServiceAnnouncement;
use crate::Result;

/// Handle keeping the service registered; dropping it shuts the daemon
/// down and withdraws the record.
pub struct Announcer {
    daemon: ServiceDaemon,
    fullname: String,
}

impl Announcer {
    pub fn register(announcement: ServiceAnnouncement) -> Result<Self> {
        let daemon = ServiceDaemon::new()?;

        let txt: HashMap<String, String> = announcement.txt.into_iter().collect();
        let info = ServiceInfo::new(
            &ensure_dot(&announcement.service_type),
            &announcement.instance_name,
            &ensure_dot(&announcement.host_name),
            // Addresses are filled from the host interfaces.
            "",
            announcement.port,
            txt,
        )?
        .enable_addr_auto();

        let fullname = info.get_fullname().to_string();
        daemon.register(info)?;
        tracing::debug!(%fullname, "registered mdns service");

        Ok(Self { daemon, fullname })
    }

    pub fn fullname(&self) -> &str {
        &self.fullname
    }
}

impl Drop for Announcer {
    fn drop(&mut self) {
        if let Err(err) = self.daemon.shutdown() {
            tracing::debug!(%err, "shutdown mdns daemon");
        }
    }
}

// mdns-sd expects FQDNs with trailing dots.
fn ensure_dot(s: &str) -> String {
    if s.ends_with('.') {
        s.to_string()
    } else {
        format!("{}.", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_dot_appends_once() {
        assert_eq!(ensure_dot("host.local"), "host.local.");
        assert_eq!(ensure_dot("host.local."), "host.local.");
    }
}
