//! JSON scenario replay

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Result, bail};
use audio_hal_core::mock::{
    FixedEdid, GatewayCall, MixerOp, MockGateway, MockPcm, PcmEvent, RecordingMixer,
};
use audio_hal_core::{
    AudioHal, AudioMode, AudioSource, CallState, DeviceState, HalBackends, InputDevices,
    InputFlags, InputStream, OutputDevices, OutputFlags, OutputStream, PlatformConfig,
    StreamConfig, TtyMode, UsecaseEntry,
};
use serde::{Deserialize, Serialize};
use tracing::info;

fn default_edid_channels() -> u32 {
    2
}

fn default_bytes() -> usize {
    960
}

/// A script of device operations
#[derive(Debug, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub platform: PlatformConfig,
    /// Channel count the fake HDMI sink advertises
    #[serde(default = "default_edid_channels")]
    pub edid_channels: u32,
    /// Stop at the first failing step
    #[serde(default)]
    pub stop_on_error: bool,
    pub steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    SetMode { mode: AudioMode },
    SetTtyMode { mode: TtyMode },
    SetVoiceVolume { volume: f32 },
    SetMicMute { muted: bool },
    StartVoiceCall,
    StopVoiceCall,
    OpenOutput {
        name: String,
        #[serde(default)]
        devices: OutputDevices,
        #[serde(default)]
        flags: OutputFlags,
        #[serde(default)]
        config: StreamConfig,
    },
    OpenInput {
        name: String,
        devices: InputDevices,
        config: StreamConfig,
        #[serde(default)]
        flags: InputFlags,
    },
    Write {
        stream: String,
        #[serde(default = "default_bytes")]
        bytes: usize,
    },
    Read {
        stream: String,
        #[serde(default = "default_bytes")]
        bytes: usize,
    },
    Standby { stream: String },
    Close { stream: String },
    RouteOutput { stream: String, devices: OutputDevices },
    RouteInput { stream: String, devices: InputDevices },
    SetInputSource { stream: String, source: AudioSource },
}

#[derive(Debug, Serialize)]
pub struct StepOutcome {
    pub step: usize,
    pub op: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Everything the collaborators saw, plus the final device state
#[derive(Debug, Serialize)]
pub struct Report {
    pub steps: Vec<StepOutcome>,
    pub mixer: Vec<MixerOp>,
    pub gateway: Vec<GatewayCall>,
    pub pcm: Vec<PcmEvent>,
    pub device_state: DeviceState,
    pub call_state: CallState,
    pub active_usecases: Vec<UsecaseEntry>,
}

enum Stream {
    Output(OutputStream),
    Input(InputStream),
}

struct Runner {
    hal: AudioHal,
    streams: HashMap<String, Stream>,
}

impl Runner {
    fn output(&self, name: &str) -> Result<&OutputStream> {
        match self.streams.get(name) {
            Some(Stream::Output(out)) => Ok(out),
            Some(Stream::Input(_)) => bail!("stream '{}' is an input stream", name),
            None => bail!("no stream named '{}'", name),
        }
    }

    fn input(&self, name: &str) -> Result<&InputStream> {
        match self.streams.get(name) {
            Some(Stream::Input(input)) => Ok(input),
            Some(Stream::Output(_)) => bail!("stream '{}' is an output stream", name),
            None => bail!("no stream named '{}'", name),
        }
    }

    fn apply(&mut self, step: &Step) -> Result<()> {
        match step {
            Step::SetMode { mode } => self.hal.set_mode(*mode),
            Step::SetTtyMode { mode } => self.hal.set_tty_mode(*mode)?,
            Step::SetVoiceVolume { volume } => self.hal.set_voice_volume(*volume)?,
            Step::SetMicMute { muted } => self.hal.set_mic_mute(*muted)?,
            Step::StartVoiceCall => self.hal.start_voice_call()?,
            Step::StopVoiceCall => self.hal.stop_voice_call()?,
            Step::OpenOutput { name, devices, flags, config } => {
                if self.streams.contains_key(name) {
                    bail!("stream '{}' already open", name);
                }
                let out = self.hal.open_output_stream(*devices, *flags, *config)?;
                self.streams.insert(name.clone(), Stream::Output(out));
            }
            Step::OpenInput { name, devices, config, flags } => {
                if self.streams.contains_key(name) {
                    bail!("stream '{}' already open", name);
                }
                let input = self.hal.open_input_stream(*devices, *config, *flags)?;
                self.streams.insert(name.clone(), Stream::Input(input));
            }
            Step::Write { stream, bytes } => {
                self.output(stream)?.write(&vec![0u8; *bytes]);
            }
            Step::Read { stream, bytes } => {
                let mut buffer = vec![0u8; *bytes];
                self.input(stream)?.read(&mut buffer);
            }
            Step::Standby { stream } => match self.streams.get(stream) {
                Some(Stream::Output(out)) => out.standby(),
                Some(Stream::Input(input)) => input.standby(),
                None => bail!("no stream named '{}'", stream),
            },
            Step::Close { stream } => match self.streams.remove(stream) {
                Some(Stream::Output(out)) => out.close(),
                Some(Stream::Input(input)) => input.close(),
                None => bail!("no stream named '{}'", stream),
            },
            Step::RouteOutput { stream, devices } => self.output(stream)?.set_routing(*devices)?,
            Step::RouteInput { stream, devices } => self.input(stream)?.set_routing(*devices)?,
            Step::SetInputSource { stream, source } => {
                self.input(stream)?.set_input_source(*source)?
            }
        }
        Ok(())
    }
}

fn op_name(step: &Step) -> String {
    let debug = format!("{:?}", step);
    debug
        .split(|c: char| c == ' ' || c == '{')
        .next()
        .unwrap_or_default()
        .to_string()
}

impl Scenario {
    pub fn run(self) -> Result<Report> {
        let mixer = RecordingMixer::new();
        let pcm = MockPcm::new();
        let gateway = MockGateway::new();
        let backends = HalBackends {
            mixer: Box::new(mixer.clone()),
            pcm: Arc::new(pcm.clone()),
            gateway: Some(Arc::new(gateway.clone())),
            edid: Arc::new(FixedEdid(self.edid_channels)),
        };
        let mut runner = Runner {
            hal: AudioHal::open(self.platform, backends),
            streams: HashMap::new(),
        };

        let mut outcomes = Vec::with_capacity(self.steps.len());
        for (index, step) in self.steps.iter().enumerate() {
            let result = runner.apply(step);
            let failed = result.is_err();
            info!("Step {} {:?}: {}", index, step, if failed { "failed" } else { "ok" });
            outcomes.push(StepOutcome {
                step: index,
                op: op_name(step),
                error: result.err().map(|e| e.to_string()),
            });
            if failed && self.stop_on_error {
                break;
            }
        }

        let report = Report {
            steps: outcomes,
            mixer: mixer.ops(),
            gateway: gateway.calls(),
            pcm: pcm.events(),
            device_state: runner.hal.device_state(),
            call_state: runner.hal.call_state(),
            active_usecases: runner.hal.active_usecases(),
        };
        Ok(report)
    }
}
