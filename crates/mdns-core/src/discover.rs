use mdns_sd::{Receiver, ServiceDaemon, ServiceEvent};

use crate::model::DiscoveredService;
use crate::Result;

/// An active browse session. Yields resolved services until dropped.
pub struct Browser {
    daemon: ServiceDaemon,
    receiver: Receiver<ServiceEvent>,
}

impl Browser {
    pub fn browse(service_type: &str) -> Result<Self> {
        let daemon = ServiceDaemon::new()?;
        let service_type = if service_type.ends_with('.') {
            service_type.to_string()
        } else {
            format!("{}.", service_type)
        };
        let receiver = daemon.browse(&service_type)?;

        Ok(Self { daemon, receiver })
    }

    /// The next resolved service, or `None` once the daemon goes away.
    pub async fn recv(&self) -> Option<DiscoveredService> {
        loop {
            match self.receiver.recv_async().await.ok()? {
                ServiceEvent::ServiceResolved(info) => {
                    return Some(DiscoveredService {
                        fullname: info.get_fullname().to_string(),
                        instance_name: instance_of(info.get_fullname()),
                        host_name: info.get_hostname().to_string(),
                        port: info.get_port(),
                        addresses: info.get_addresses().iter().copied().collect(),
                        txt: info
                            .get_properties()
                            .iter()
                            .map(|prop| (prop.key().to_string(), prop.val_str().to_string()))
                            .collect(),
                    });
                }
                ServiceEvent::ServiceFound(service_type, fullname) => {
                    tracing::debug!(%service_type, %fullname, "found service");
                }
                _ => {}
            }
        }
    }
}

impl Drop for Browser {
    fn drop(&mut self) {
        if let Err(err) = self.daemon.shutdown() {
            tracing::debug!(%err, "shutdown mdns daemon");
        }
    }
}

// "instance._type._tcp.local." -> "instance"
fn instance_of(fullname: &str) -> String {
    fullname
        .split_once('.')
        .map(|(instance, _)| instance)
        .unwrap_or(fullname)
        .to_string()
}
