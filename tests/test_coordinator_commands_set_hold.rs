mod common;
use common::*;

use esy::header::HEADER_SIZE;
use esy::{FunctionCode, MessageHeader};
use sunhome_bridge::coordinator::commands::set_hold::SetHold;

#[tokio::test]
async fn happy_path() {
    common_setup();

    let channels = Channels::new();
    let subject = SetHold::new(channels.clone(), Factory::encoder(), 53u16, 20);

    let mut to_cloud = channels.to_cloud.subscribe();

    let sf = async {
        let frame = subject.run().await?;
        Ok::<Vec<u8>, anyhow::Error>(frame)
    };

    let tf = async {
        match to_cloud.recv().await? {
            esy::link::ChannelData::Frame(frame) => Ok::<Vec<u8>, anyhow::Error>(frame),
            other => bail!("unexpected {:?}", other),
        }
    };

    let (sent, received) = futures::try_join!(sf, tf).unwrap();
    assert_eq!(sent, received);

    let header = MessageHeader::parse(&sent).unwrap();
    assert_eq!(header.function(), Some(FunctionCode::WriteSingle));
    assert_eq!(header.config_id, 6);
    assert_eq!(&sent[HEADER_SIZE..], &[0, 53, 0, 20]);
}

#[tokio::test]
async fn link_not_receiving() {
    common_setup();

    let channels = Channels::new();
    let subject = SetHold::new(channels.clone(), Factory::encoder(), 53u16, 20);

    let sf = async {
        let result = subject.run().await;
        assert_eq!(
            result.unwrap_err().to_string(),
            "send(to_cloud) failed - channel closed?"
        );
        Ok::<(), anyhow::Error>(())
    };

    futures::try_join!(sf).unwrap();
}
