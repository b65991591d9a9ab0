//! # Audio-HAL-Core: Routing Engine for a Mobile Primary Audio HAL
//!
//! This library decides which physical sound devices a phone's audio
//! subsystem drives, and keeps the mixer, calibration and transfer endpoints
//! in step as playback, capture and voice call usecases come and go.
//!
//! ## Components
//!
//! - **Device selection**: [`DeviceSelector`] maps mode, requested device
//!   bits, capture source, TTY and dual-mic settings to an output and an
//!   input [`SoundDevice`]
//! - **Usecase registry**: [`UsecaseRegistry`] tracks the active usecases in
//!   start order
//! - **Routing**: [`RoutingController`] moves the hardware from the current
//!   devices to a new selection and re-binds every active usecase
//! - **Streams**: [`AudioHal`] hands out [`OutputStream`] and [`InputStream`]
//!   values that start lazily and fall back to standby on failure
//!
//! The mixer, the PCM driver, the vendor calibration library and the HDMI
//! EDID parser are external. They are reached through the
//! [`MixerPathEngine`], [`TransferEndpoint`], [`CalibrationGateway`] and
//! [`EdidReader`] traits; [`mock`] has in-memory versions of each.
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use audio_hal_core::mock::{FixedEdid, MockPcm, RecordingMixer};
//! use audio_hal_core::{AudioHal, HalBackends, OutputDevices, OutputFlags, PlatformConfig, StreamConfig};
//!
//! let backends = HalBackends {
//!     mixer: Box::new(RecordingMixer::new()),
//!     pcm: Arc::new(MockPcm::new()),
//!     gateway: None,
//!     edid: Arc::new(FixedEdid(2)),
//! };
//! let hal = AudioHal::open(PlatformConfig::default(), backends);
//!
//! let out = hal.open_output_stream(OutputDevices::SPEAKER, OutputFlags::PRIMARY, StreamConfig::default())?;
//! out.write(&[0u8; 960]);
//! assert!(!out.is_standby());
//! # Ok::<(), audio_hal_core::HalError>(())
//! ```

pub mod call;
pub mod capabilities;
pub mod config;
pub mod devices;
pub mod error;
pub mod hal;
pub mod hdmi;
pub mod logging;
pub mod mixer;
pub mod mock;
pub mod pcm;
pub mod registry;
pub mod routing;
pub mod selector;
pub mod sound_device;
pub mod types;
pub mod usecase;

// Re-export commonly used types and traits
pub use call::CallState;
pub use capabilities::{CalibrationGateway, Capabilities, NoopGateway};
pub use config::{PlatformConfig, PropertySource};
pub use devices::{ChannelMask, InputDevices, InputFlags, OutputDevices, OutputFlags};
pub use error::{HalError, Result};
pub use hal::{AudioHal, HalBackends, InputStream, OutputStream, StreamConfig};
pub use hdmi::EdidReader;
pub use logging::{LogFormat, LoggingConfig, parse_log_level, setup_logging};
pub use mixer::MixerPathEngine;
pub use pcm::{PcmConfig, PcmHandle, TransferEndpoint};
pub use registry::{UsecaseEntry, UsecaseRegistry};
pub use routing::{DeviceState, RoutingController};
pub use selector::{DeviceSelector, InputRequest, SelectionInput};
pub use sound_device::{Direction, SoundDevice};
pub use types::{AudioMode, AudioSource, DualMicConfig, SampleFormat, TtyMode};
pub use usecase::{UseCase, UsecaseKind};

/// Version information for the engine
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
