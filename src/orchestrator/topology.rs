//! Locations and their endpoints
//!
//! Each location is an independent cluster reachable through one or more
//! endpoints. Location names are case-insensitive.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::Config;
use crate::gateway::{ClusterGateway, Endpoint, HttpGateway};
use crate::observability::{Event, Logger};

/// One cluster location
#[derive(Clone)]
pub struct Location {
    pub name: String,
    pub repository: String,
    pub gateways: Vec<Arc<dyn ClusterGateway>>,
}

impl Location {
    pub fn new(
        name: impl Into<String>,
        repository: impl Into<String>,
        gateways: Vec<Arc<dyn ClusterGateway>>,
    ) -> Self {
        Self {
            name: name.into().to_lowercase(),
            repository: repository.into(),
            gateways,
        }
    }

    /// The first endpoint whose ping succeeds. Unreachable ones are logged
    /// and skipped.
    pub fn first_reachable(&self) -> Option<&Arc<dyn ClusterGateway>> {
        self.gateways.iter().find(|gw| match gw.ping() {
            Ok(true) => true,
            Ok(false) => false,
            Err(err) => {
                Logger::event(
                    Event::EndpointUnreachable,
                    &[
                        ("location", self.name.as_str()),
                        ("endpoint", &gw.endpoint().to_string()),
                        ("reason", &err.to_string()),
                    ],
                );
                false
            }
        })
    }

    /// The gateway for `endpoint`, if it belongs to this location
    pub fn gateway_for(&self, endpoint: &Endpoint) -> Option<&Arc<dyn ClusterGateway>> {
        self.gateways.iter().find(|gw| gw.endpoint() == endpoint)
    }
}

impl std::fmt::Debug for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let endpoints: Vec<String> = self.gateways.iter().map(|gw| gw.endpoint().to_string()).collect();
        f.debug_struct("Location")
            .field("name", &self.name)
            .field("repository", &self.repository)
            .field("endpoints", &endpoints)
            .finish()
    }
}

/// Every known location, by lowercase name
#[derive(Debug, Clone, Default)]
pub struct Topology {
    locations: BTreeMap<String, Location>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    /// One HTTP gateway per configured port
    pub fn from_config(config: &Config) -> Self {
        let mut topology = Self::new();
        for (name, location) in &config.locations {
            let gateways = config
                .contexts(name)
                .unwrap_or_default()
                .into_iter()
                .map(|context| Arc::new(HttpGateway::new(context)) as Arc<dyn ClusterGateway>)
                .collect();
            topology.add(Location::new(name.as_str(), config.repository_for(location), gateways));
        }
        topology
    }

    pub fn add(&mut self, location: Location) {
        self.locations.insert(location.name.clone(), location);
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.add(location);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Location> {
        self.locations.get(&name.trim().to_lowercase())
    }

    pub fn names(&self) -> Vec<String> {
        self.locations.keys().cloned().collect()
    }

    /// Gateway holding restore records and history: the first answering
    /// endpoint of the first requested location, or of the first location
    /// overall. When none answers the first endpoint is returned so the
    /// store error names it.
    pub fn home_gateway(&self, requested: &[String]) -> Option<Arc<dyn ClusterGateway>> {
        let location = match requested.first() {
            Some(name) => self.get(name)?,
            None => self.locations.values().next()?,
        };
        location.first_reachable().or_else(|| location.gateways.first()).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MemoryGateway;

    fn memory(port: u16) -> Arc<dyn ClusterGateway> {
        Arc::new(MemoryGateway::new(Endpoint::new("es01", port)))
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let topology = Topology::new().with_location(Location::new("DC1", "repo", vec![memory(9200)]));

        assert!(topology.get("dc1").is_some());
        assert!(topology.get(" Dc1 ").is_some());
        assert_eq!(topology.names(), vec!["dc1".to_string()]);
    }

    #[test]
    fn test_gateway_for_endpoint() {
        let location = Location::new("dc1", "repo", vec![memory(9200), memory(9201)]);
        let gw = location.gateway_for(&Endpoint::new("es01", 9201)).unwrap();
        assert_eq!(gw.endpoint().port, 9201);
        assert!(location.gateway_for(&Endpoint::new("es02", 9200)).is_none());
    }

    #[test]
    fn test_home_gateway() {
        let topology = Topology::new()
            .with_location(Location::new("a", "repo", vec![memory(9200)]))
            .with_location(Location::new("b", "repo", vec![memory(9300)]));

        let home = topology.home_gateway(&["b".to_string()]).unwrap();
        assert_eq!(home.endpoint().port, 9300);
        assert_eq!(topology.home_gateway(&[]).unwrap().endpoint().port, 9200);
        assert!(topology.home_gateway(&["zz".to_string()]).is_none());
    }

    #[test]
    fn test_home_gateway_skips_dead_endpoint() {
        let dead = MemoryGateway::new(Endpoint::new("es01", 9200));
        dead.set_unreachable(&Endpoint::new("es01", 9200));
        let alive = dead.at_endpoint(Endpoint::new("es01", 9201));
        let topology = Topology::new().with_location(Location::new(
            "dc1",
            "repo",
            vec![Arc::new(dead) as Arc<dyn ClusterGateway>, Arc::new(alive)],
        ));

        let home = topology.home_gateway(&["dc1".to_string()]).unwrap();
        assert_eq!(home.endpoint().port, 9201);
    }

    #[test]
    fn test_home_gateway_falls_back_when_nothing_answers() {
        let gw = MemoryGateway::new(Endpoint::new("es01", 9200));
        gw.set_unreachable(&Endpoint::new("es01", 9200));
        gw.set_unreachable(&Endpoint::new("es01", 9201));
        let other = gw.at_endpoint(Endpoint::new("es01", 9201));
        let topology = Topology::new().with_location(Location::new(
            "dc1",
            "repo",
            vec![Arc::new(gw) as Arc<dyn ClusterGateway>, Arc::new(other)],
        ));

        let home = topology.home_gateway(&[]).unwrap();
        assert_eq!(home.endpoint().port, 9200);
    }

    #[test]
    fn test_from_config() {
        let config = Config::from_json(
            r#"{ "locations": { "dc1": { "hostname": "es-dc1", "ports": [9200, 9201] } } }"#,
        )
        .unwrap();
        let topology = Topology::from_config(&config);

        let dc1 = topology.get("dc1").unwrap();
        assert_eq!(dc1.gateways.len(), 2);
        assert_eq!(dc1.repository, "default-repo");
    }
}
