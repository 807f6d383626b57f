pub mod bytes;
pub mod catalog;
pub mod codec;
pub mod encoder;
pub mod header;
pub mod link;
pub mod profile;
pub mod segment;
pub mod telemetry;
pub mod topics;

pub use catalog::{ProtocolDefinition, RegisterCatalog, RegisterDefinition, RegisterTable};
pub use codec::FrameDecoder;
pub use encoder::{CommandEncoder, RegisterWrite, Request};
pub use header::{DataLengthWidth, FunctionCode, MessageHeader};
pub use profile::{Variant, VariantProfile};
pub use telemetry::TelemetrySnapshot;
