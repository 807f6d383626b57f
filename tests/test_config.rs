mod common;
use common::*;

use esy::profile::{CandidateRule, RescaleRule};
use esy::{DataLengthWidth, Variant, VariantProfile};
use std::io::Write as _;

#[test]
fn defaults() {
    common_setup();

    let config = Factory::config();

    assert_eq!(config.device.serial(), "ESY1234567");
    assert_eq!(config.device.config_id(), 6);
    assert_eq!(config.loglevel, "info");
    assert!(!config.read_only);

    assert!(!config.cloud.enabled());
    assert_eq!(config.cloud.host(), "abroadtcp.esysunhome.com");
    assert_eq!(config.cloud.port(), 1883);
    assert_eq!(config.cloud.client_id(), "sunhome-bridge");

    assert_eq!(config.mqtt.namespace(), "sunhome");
    assert!(config.mqtt.publish_individual());

    assert_eq!(config.protocol.variant(), Variant::Segmented);
    assert_eq!(config.protocol.definition_file(), &None);

    assert_eq!(config.scheduler.poll_interval(), 15);
    assert_eq!(config.scheduler.poll_segments(), &[0, 1, 3, 6]);
}

#[test]
fn cloud_enabled_by_default() {
    common_setup();

    let config = Config::from_yaml(
        r#"
device:
  serial: ESY1
mqtt:
  host: localhost
"#,
    )
    .unwrap();

    assert!(config.cloud.enabled());
    assert!(config.mqtt.enabled());
    assert!(config.scheduler.enabled());
}

#[test]
fn protocol_overrides() {
    common_setup();

    let config = Config::from_yaml(
        r#"
device:
  serial: ESY1
mqtt:
  host: localhost
protocol:
  variant: legacy
  data_length_width: u32
  power_candidates: first_non_zero
  rescale:
    - key: ratedPower
      below: 10
      factor: 1000
"#,
    )
    .unwrap();

    let profile = config.protocol.profile();
    assert_eq!(profile.variant, Variant::Legacy);
    assert_eq!(profile.data_length_width, DataLengthWidth::U32);
    assert_eq!(profile.rescale, vec![RescaleRule::new("ratedPower", 10.0, 1000.0)]);
    assert_eq!(profile.grid_power_keys, vec!["ct1Power".to_owned()]);
    assert_eq!(profile.power_candidates, CandidateRule::FirstNonZero);
    assert_eq!(
        VariantProfile::legacy().power_candidates,
        CandidateRule::FirstPresent
    );
}

#[test]
fn validation() {
    common_setup();

    let bad = [
        // empty serial
        "device: {serial: ''}\nmqtt: {host: localhost}\n",
        // zero port
        "device: {serial: ESY1}\nmqtt: {host: localhost, port: 0}\n",
        // empty host
        "device: {serial: ESY1}\nmqtt: {host: ''}\n",
        "device: {serial: ESY1}\ncloud: {host: ''}\nmqtt: {host: localhost}\n",
        // zero interval
        "device: {serial: ESY1}\nmqtt: {host: localhost}\nscheduler: {poll_interval: 0}\n",
        // zero rescale factor
        "device: {serial: ESY1}\nmqtt: {host: localhost}\nprotocol: {rescale: [{key: x, below: 1, factor: 0}]}\n",
        // unknown variant
        "device: {serial: ESY1}\nmqtt: {host: localhost}\nprotocol: {variant: hybrid}\n",
        // missing device
        "mqtt: {host: localhost}\n",
    ];

    for yaml in bad {
        assert!(Config::from_yaml(yaml).is_err(), "accepted {:?}", yaml);
    }

    // disabled brokers aren't checked
    assert!(Config::from_yaml(
        "device: {serial: ESY1}\ncloud: {enabled: false, host: ''}\nmqtt: {enabled: false, host: ''}\n"
    )
    .is_ok());

    // non-numeric user ids are only warned about
    assert!(Config::from_yaml(
        "device: {serial: ESY1, user_id: abc}\nmqtt: {host: localhost}\n"
    )
    .is_ok());
}

#[test]
fn from_file() {
    common_setup();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(Factory::config_yaml().as_bytes()).unwrap();

    let config = ConfigWrapper::new(file.path().to_str().unwrap().to_owned()).unwrap();
    assert_eq!(config.device().serial(), Factory::SERIAL);
    assert_eq!(config.device().user_id(), Factory::USER_ID);

    assert!(Config::new("/nonexistent/config.yaml".to_owned()).is_err());
}

#[test]
fn wrapper_targets() {
    common_setup();

    let config = Factory::config_wrapper();

    assert!(config.is_target(&mqtt::Target::All));
    assert!(config.is_target(&mqtt::Target::Serial(Factory::SERIAL.to_owned())));
    assert!(!config.is_target(&mqtt::Target::Serial("ESY7654321".to_owned())));
}

#[test]
fn wrapper_set_definition_file() {
    common_setup();

    let config = Factory::config_wrapper();
    let clone = config.clone();

    config.set_definition_file(Some("/tmp/definition.json".to_owned()));
    assert_eq!(
        clone.protocol().definition_file(),
        &Some("/tmp/definition.json".to_owned())
    );
}
