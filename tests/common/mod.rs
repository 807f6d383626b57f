#![allow(dead_code)]

pub use sunhome_bridge::esy;
pub use sunhome_bridge::prelude::*;

use esy::bytes::encode_identifier;
use esy::{
    CommandEncoder, FrameDecoder, FunctionCode, MessageHeader, RegisterCatalog, Variant,
    VariantProfile,
};
use std::sync::Arc;

pub use esy::segment::{HOLDING, INPUT};

pub fn common_setup() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub struct Factory();
impl Factory {
    pub const SERIAL: &'static str = "ESY1234567";
    pub const USER_ID: &'static str = "1234567";

    pub fn header(data_length: u32) -> MessageHeader {
        MessageHeader {
            config_id: 6,
            msg_id: 1,
            identifier: encode_identifier(Self::USER_ID),
            function_code: FunctionCode::Read.into(),
            source_id: 0x10,
            page_index: 0,
            data_length,
        }
    }

    /// sub-header + register words
    pub fn segment(segment_id: u16, segment_type: u16, address: u16, words: &[u16]) -> Vec<u8> {
        let mut r = Vec::new();
        r.extend_from_slice(&segment_id.to_be_bytes());
        r.extend_from_slice(&segment_type.to_be_bytes());
        r.extend_from_slice(&address.to_be_bytes());
        r.extend_from_slice(&(words.len() as u16).to_be_bytes());
        for w in words {
            r.extend_from_slice(&w.to_be_bytes());
        }
        r
    }

    pub fn payload(segments: &[Vec<u8>]) -> Vec<u8> {
        let mut r = (segments.len() as u16).to_be_bytes().to_vec();
        for s in segments {
            r.extend_from_slice(s);
        }
        r
    }

    pub fn frame(payload: &[u8]) -> Vec<u8> {
        let mut r = Self::header(payload.len() as u32).to_bytes().to_vec();
        r.extend_from_slice(payload);
        r
    }

    /// A typical segmented-firmware UP frame.
    pub fn telemetry_frame() -> Vec<u8> {
        Self::frame(&Self::payload(&[
            Self::segment(1, INPUT, 120, &[3500, 85, 300, 3400, 60, 200]),
            Self::segment(3, INPUT, 130, &[1, 520, 50, 250, 87, 87]),
            Self::segment(6, INPUT, 160, &[500, 250, 650, 900, 2, 2]),
        ]))
    }

    pub fn config_yaml() -> String {
        format!(
            r#"
device:
  serial: "{}"
  user_id: "{}"
  config_id: 6
cloud:
  enabled: false
mqtt:
  enabled: true
  host: localhost
scheduler:
  enabled: false
"#,
            Self::SERIAL,
            Self::USER_ID
        )
    }

    pub fn config() -> Config {
        Config::from_yaml(&Self::config_yaml()).unwrap()
    }

    pub fn config_wrapper() -> ConfigWrapper {
        ConfigWrapper::from_config(Self::config())
    }

    pub fn read_only_config_wrapper() -> ConfigWrapper {
        let mut config = Self::config();
        config.read_only = true;
        ConfigWrapper::from_config(config)
    }

    pub fn definition_json() -> &'static str {
        r#"{
            "version": "2.1",
            "registers": [
                {"address": 57, "functionCode": 3, "key": "systemRunMode", "type": 2, "length": 1, "coefficient": 1},
                {"address": 131, "functionCode": 4, "key": "batteryVoltage", "type": "unsigned", "length": 1, "coefficient": "0.1"},
                {"address": 133, "key": "batteryPower", "type": 1, "length": 1},
                {"address": 190, "functionCode": 4, "key": "totalBattChargeEnergy", "type": 2, "length": 2, "coefficient": 0.1},
                {"address": 200, "functionCode": 4, "key": "firmwareName", "type": 4, "length": 8}
            ]
        }"#
    }

    pub fn catalog(variant: Variant) -> Arc<RegisterCatalog> {
        Arc::new(RegisterCatalog::for_variant(variant))
    }

    pub fn decoder(variant: Variant) -> FrameDecoder {
        FrameDecoder::new(Self::catalog(variant), VariantProfile::for_variant(variant))
    }

    pub fn encoder() -> Arc<CommandEncoder> {
        Arc::new(CommandEncoder::new(Self::USER_ID).with_config_id(6))
    }
}
