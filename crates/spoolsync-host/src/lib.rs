//! Runtime around a tracker session: configuration, the telemetry transport
//! seam, the AMS tray scan and the daemon loop that ties them together.

pub mod ams;
pub mod config;
pub mod daemon;
pub mod error;
pub mod replay;
pub mod session;
pub mod status;
pub mod transport;

pub use ams::{AmsScanner, AmsSnapshot, ScanReport};
pub use config::{HostConfig, load_env_file};
pub use daemon::{DaemonStats, TrackerDaemon};
pub use error::{HostError, HostResult};
pub use replay::NdjsonReplay;
pub use session::{http_inventory, open_session};
pub use status::{TrayStatus, tray_status};
pub use transport::{ChannelTransport, Published, TelemetryTransport, report_topic, request_topic};
