mod common;
use common::*;

use esy::Variant;
use std::io::Write as _;
use sunhome_bridge::coordinator::commands::reload_definition::ReloadDefinition;

fn definition_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[tokio::test]
async fn happy_path() {
    common_setup();

    let config = Factory::config_wrapper();
    let catalog = Factory::catalog(Variant::Segmented);
    let file = definition_file(Factory::definition_json());
    config.set_definition_file(Some(file.path().to_str().unwrap().to_owned()));

    let subject = ReloadDefinition::new(config, catalog.clone());

    assert_eq!(subject.run().await.unwrap(), 5);
    assert_eq!(catalog.lookup(57, 3).unwrap().data_key, "systemRunMode");
    assert!(catalog.lookup(120, 4).is_none());
}

#[tokio::test]
async fn no_file_configured() {
    common_setup();

    let subject =
        ReloadDefinition::new(Factory::config_wrapper(), Factory::catalog(Variant::Segmented));

    assert_eq!(
        subject.run().await.unwrap_err().to_string(),
        "no protocol.definition_file configured"
    );
}

#[tokio::test]
async fn bad_file_keeps_table() {
    common_setup();

    let config = Factory::config_wrapper();
    let catalog = Factory::catalog(Variant::Segmented);
    let subject = ReloadDefinition::new(config.clone(), catalog.clone());

    let file = definition_file("{not json");
    config.set_definition_file(Some(file.path().to_str().unwrap().to_owned()));
    assert!(subject.run().await.is_err());

    let file = definition_file(r#"{"registers": []}"#);
    config.set_definition_file(Some(file.path().to_str().unwrap().to_owned()));
    assert!(subject.run().await.is_err());

    config.set_definition_file(Some("/nonexistent/definition.json".to_owned()));
    assert!(subject.run().await.is_err());

    assert_eq!(catalog.lookup(120, 4).unwrap().data_key, "pv1voltage");
}
