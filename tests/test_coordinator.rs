mod common;
use common::*;

use esy::header::HEADER_SIZE;
use esy::link::{self, Alarm};
use esy::{FunctionCode, MessageHeader, Variant};
use sunhome_bridge::coordinator::Coordinator;

fn coordinator(config: ConfigWrapper, channels: &Channels) -> Coordinator {
    Coordinator::new(
        config,
        channels.clone(),
        Factory::catalog(Variant::Segmented),
        Factory::encoder(),
    )
}

fn cmd(topic: &str, payload: &str) -> mqtt::Message {
    mqtt::Message {
        topic: topic.to_owned(),
        retain: false,
        payload: payload.to_owned(),
    }
}

fn result(topic: &str, payload: &str) -> mqtt::ChannelData {
    mqtt::ChannelData::Message(mqtt::Message {
        topic: topic.to_owned(),
        retain: false,
        payload: payload.to_owned(),
    })
}

async fn frame(receiver: &mut link::Receiver) -> Vec<u8> {
    match receiver.recv().await.unwrap() {
        link::ChannelData::Frame(frame) => frame,
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn set_hold_command() {
    common_setup();

    let channels = Channels::new();
    let mut to_cloud = channels.to_cloud.subscribe();
    let mut to_mqtt = channels.to_mqtt.subscribe();
    let subject = coordinator(Factory::config_wrapper(), &channels);

    subject
        .process_message(cmd("cmd/ESY1234567/set/hold/57", "5"))
        .await
        .unwrap();

    let sent = frame(&mut to_cloud).await;
    assert_eq!(
        MessageHeader::parse(&sent).unwrap().function(),
        Some(FunctionCode::WriteSingle)
    );
    assert_eq!(&sent[HEADER_SIZE..], &[0x00, 0x39, 0x00, 0x05]);

    assert_eq!(
        to_mqtt.recv().await.unwrap(),
        result("result/ESY1234567/set/hold/57", "OK")
    );
}

#[tokio::test]
async fn command_for_all() {
    common_setup();

    let channels = Channels::new();
    let mut to_cloud = channels.to_cloud.subscribe();
    let mut to_mqtt = channels.to_mqtt.subscribe();
    let subject = coordinator(Factory::config_wrapper(), &channels);

    subject
        .process_message(cmd("cmd/all/read/poll", ""))
        .await
        .unwrap();

    // default segments
    let sent = frame(&mut to_cloud).await;
    assert_eq!(&sent[HEADER_SIZE..], &[0, 4, 0, 0, 0, 1, 0, 3, 0, 6]);

    assert_eq!(
        to_mqtt.recv().await.unwrap(),
        result("result/ESY1234567/read/poll", "OK")
    );
}

#[tokio::test]
async fn command_for_other_device() {
    common_setup();

    let channels = Channels::new();
    let mut to_cloud = channels.to_cloud.subscribe();
    let mut to_mqtt = channels.to_mqtt.subscribe();
    let subject = coordinator(Factory::config_wrapper(), &channels);

    subject
        .process_message(cmd("cmd/ESY7654321/set/mode", "1"))
        .await
        .unwrap();

    assert!(to_cloud.try_recv().is_err());
    assert!(to_mqtt.try_recv().is_err());
}

#[tokio::test]
async fn read_only_refuses_writes() {
    common_setup();

    let channels = Channels::new();
    let mut to_cloud = channels.to_cloud.subscribe();
    let mut to_mqtt = channels.to_mqtt.subscribe();
    let subject = coordinator(Factory::read_only_config_wrapper(), &channels);

    subject
        .process_message(cmd("cmd/all/set/mode", "2"))
        .await
        .unwrap();
    assert_eq!(
        to_mqtt.recv().await.unwrap(),
        result("result/ESY1234567/set/mode", "FAIL")
    );
    assert!(to_cloud.try_recv().is_err());

    // reads still go through
    subject
        .process_message(cmd("cmd/all/read/hold/50", "2"))
        .await
        .unwrap();
    frame(&mut to_cloud).await;
    assert_eq!(
        to_mqtt.recv().await.unwrap(),
        result("result/ESY1234567/read/hold/50", "OK")
    );
}

#[tokio::test]
async fn failed_command() {
    common_setup();

    let channels = Channels::new();
    let mut to_mqtt = channels.to_mqtt.subscribe();
    let subject = coordinator(Factory::config_wrapper(), &channels);

    // unknown mode
    subject
        .process_message(cmd("cmd/all/set/mode", "4"))
        .await
        .unwrap();
    assert_eq!(
        to_mqtt.recv().await.unwrap(),
        result("result/ESY1234567/set/mode", "FAIL")
    );

    // nobody listening on to_cloud
    subject
        .process_message(cmd("cmd/all/set/hold/53", "20"))
        .await
        .unwrap();
    assert_eq!(
        to_mqtt.recv().await.unwrap(),
        result("result/ESY1234567/set/hold/53", "FAIL")
    );

    // no definition file
    subject
        .process_message(cmd("cmd/all/reload_definition", ""))
        .await
        .unwrap();
    assert_eq!(
        to_mqtt.recv().await.unwrap(),
        result("result/ESY1234567/reload_definition", "FAIL")
    );
}

#[tokio::test]
async fn unparseable_command() {
    common_setup();

    let channels = Channels::new();
    let mut to_mqtt = channels.to_mqtt.subscribe();
    let subject = coordinator(Factory::config_wrapper(), &channels);

    assert!(subject
        .process_message(cmd("cmd/all/set/colour", "red"))
        .await
        .is_err());
    assert!(subject
        .process_message(cmd("cmd/all", ""))
        .await
        .is_err());
    assert!(to_mqtt.try_recv().is_err());
}

#[tokio::test]
async fn telemetry_is_published() {
    common_setup();

    let channels = Channels::new();
    let mut to_mqtt = channels.to_mqtt.subscribe();
    let subject = coordinator(Factory::config_wrapper(), &channels);

    let snapshot = Factory::decoder(Variant::Segmented)
        .decode_frame(&Factory::telemetry_frame())
        .unwrap();
    let expected = 1 + snapshot.derived().len();

    subject
        .process_cloud(link::ChannelData::Telemetry(Box::new(snapshot)))
        .await
        .unwrap();

    let mut topics = Vec::new();
    for _ in 0..expected {
        if let mqtt::ChannelData::Message(m) = to_mqtt.recv().await.unwrap() {
            topics.push(m.topic);
        }
    }

    assert_eq!(topics[0], "ESY1234567/telemetry");
    assert!(topics.contains(&"ESY1234567/telemetry/gridPower".to_owned()));
    assert!(to_mqtt.try_recv().is_err());
}

#[tokio::test]
async fn alarm_and_news_are_published() {
    common_setup();

    let channels = Channels::new();
    let mut to_mqtt = channels.to_mqtt.subscribe();
    let subject = coordinator(Factory::config_wrapper(), &channels);

    subject
        .process_cloud(link::ChannelData::Alarm(Alarm::new(None, &[0x0a, 0x0b])))
        .await
        .unwrap();
    assert_eq!(
        to_mqtt.recv().await.unwrap(),
        result("ESY1234567/alarm", "0a0b")
    );

    subject
        .process_cloud(link::ChannelData::News("hi".to_owned()))
        .await
        .unwrap();
    assert_eq!(to_mqtt.recv().await.unwrap(), result("ESY1234567/news", "hi"));
}

#[tokio::test]
async fn connect_triggers_poll() {
    common_setup();

    let channels = Channels::new();
    let mut to_cloud = channels.to_cloud.subscribe();
    let subject = coordinator(Factory::config_wrapper(), &channels);

    subject
        .process_cloud(link::ChannelData::Connected)
        .await
        .unwrap();

    let sent = frame(&mut to_cloud).await;
    assert_eq!(
        MessageHeader::parse(&sent).unwrap().function(),
        Some(FunctionCode::Read)
    );
    assert_eq!(&sent[HEADER_SIZE..HEADER_SIZE + 2], &[0, 4]);

    subject
        .process_cloud(link::ChannelData::Disconnected)
        .await
        .unwrap();
    assert!(to_cloud.try_recv().is_err());
}

#[tokio::test]
async fn start_and_stop() {
    common_setup();

    let channels = Channels::new();
    let subject = coordinator(Factory::config_wrapper(), &channels);

    let sf = async {
        subject.start().await?;
        Ok::<(), anyhow::Error>(())
    };

    let tf = async {
        tokio::task::yield_now().await;
        // process a command through the running loop first
        channels
            .from_mqtt
            .send(mqtt::ChannelData::Message(cmd("cmd/all/set/colour", "red")))?;
        subject.stop();
        Ok::<(), anyhow::Error>(())
    };

    futures::try_join!(sf, tf).unwrap();
}
