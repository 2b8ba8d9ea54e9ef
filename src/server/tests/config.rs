use crate::server::config::{ConfigError, HapServerConfig};
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

#[test]
fn test_default_config() {
    let config = HapServerConfig::default();

    assert_eq!(config.port, 51826);
    assert_eq!(config.pincode, "031-45-154");
    assert_eq!(config.max_pairings, 16);
    assert_eq!(config.max_failed_attempts, 100);
    assert_eq!(config.keepalive_interval, Duration::from_secs(600));
    assert!(!config.allow_insecure);
    assert!(config.validate().is_ok());
}

#[test]
fn test_generated_username_is_mac_format() {
    let config = HapServerConfig::new("Lamp");
    assert_eq!(config.username.len(), 17);
    assert_eq!(config.username.matches(':').count(), 5);
    assert!(config.validate().is_ok());
}

#[test]
fn test_builder() {
    let config = HapServerConfig::new("Lamp")
        .with_username("12:34:56:78:9A:BC")
        .with_pincode("123-45-679")
        .with_bind_address(IpAddr::V4(Ipv4Addr::LOCALHOST))
        .with_port(8080)
        .with_allow_insecure(true)
        .with_max_pairings(4)
        .with_max_failed_attempts(3)
        .with_keepalive_interval(Duration::from_secs(5))
        .with_event_capacity(8);

    assert_eq!(config.name, "Lamp");
    assert_eq!(config.socket_addr(), "127.0.0.1:8080".parse().unwrap());
    assert!(config.allow_insecure);
    assert_eq!(config.max_pairings, 4);
    assert_eq!(config.event_capacity, 8);
    assert!(config.validate().is_ok());
}

#[test]
fn test_invalid_pincodes() {
    for pincode in ["03145154", "031-45-15", "031-45-15a", "031_45_154", ""] {
        let config = HapServerConfig::new("Lamp").with_pincode(pincode);
        assert_eq!(config.validate(), Err(ConfigError::InvalidPincode), "{pincode}");
    }
}

#[test]
fn test_trivial_pincodes() {
    for pincode in ["000-00-000", "111-11-111", "123-45-678", "876-54-321"] {
        let config = HapServerConfig::new("Lamp").with_pincode(pincode);
        assert_eq!(config.validate(), Err(ConfigError::TrivialPincode), "{pincode}");
    }
}

#[test]
fn test_invalid_username() {
    let config = HapServerConfig::new("Lamp").with_username("not-a-mac");
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidUsername(_))
    ));
}

#[test]
fn test_zero_limits() {
    assert_eq!(
        HapServerConfig::new("Lamp").with_max_pairings(0).validate(),
        Err(ConfigError::InvalidLimit("max_pairings"))
    );
    assert_eq!(
        HapServerConfig::new("Lamp").with_event_capacity(0).validate(),
        Err(ConfigError::InvalidLimit("event_capacity"))
    );
    assert_eq!(
        HapServerConfig::new("Lamp")
            .with_keepalive_interval(Duration::ZERO)
            .validate(),
        Err(ConfigError::InvalidLimit("keepalive_interval"))
    );
}
