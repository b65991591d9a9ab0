//! In-memory collaborators
//!
//! Recording implementations of the mixer, calibration gateway, transfer
//! endpoint and EDID reader. Clones share their log, so a test can keep one
//! handle while the device owns another.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::capabilities::CalibrationGateway;
use crate::error::{HalError, Result};
use crate::hdmi::EdidReader;
use crate::mixer::MixerPathEngine;
use crate::pcm::{PcmConfig, PcmHandle, TransferEndpoint};
use crate::sound_device::Direction;

/// One mixer operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MixerOp {
    Apply(String),
    Reset(String),
    Commit,
    SetEnum(String, String),
}

#[derive(Debug, Default)]
struct MixerLog {
    ops: Vec<MixerOp>,
    failing_paths: Vec<String>,
    failing_once: Vec<String>,
}

/// Mixer that records every operation
#[derive(Debug, Clone, Default)]
pub struct RecordingMixer {
    log: Arc<Mutex<MixerLog>>,
}

impl RecordingMixer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `apply_path` fail for the named path
    pub fn fail_path(&self, name: impl Into<String>) {
        self.log.lock().failing_paths.push(name.into());
    }

    /// Make the next `apply_path` of the named path fail
    pub fn fail_path_once(&self, name: impl Into<String>) {
        self.log.lock().failing_once.push(name.into());
    }

    pub fn ops(&self) -> Vec<MixerOp> {
        self.log.lock().ops.clone()
    }

    pub fn clear(&self) {
        self.log.lock().ops.clear();
    }

    /// Number of times the path was applied
    pub fn applied(&self, name: &str) -> usize {
        self.count(|op| matches!(op, MixerOp::Apply(n) if n == name))
    }

    /// Number of times the path was reset
    pub fn reset(&self, name: &str) -> usize {
        self.count(|op| matches!(op, MixerOp::Reset(n) if n == name))
    }

    pub fn commits(&self) -> usize {
        self.count(|op| *op == MixerOp::Commit)
    }

    fn count(&self, pred: impl Fn(&MixerOp) -> bool) -> usize {
        self.log.lock().ops.iter().filter(|op| pred(op)).count()
    }
}

impl MixerPathEngine for RecordingMixer {
    fn apply_path(&mut self, name: &str) -> Result<()> {
        let mut log = self.log.lock();
        if log.failing_paths.iter().any(|p| p == name) {
            return Err(HalError::invalid_argument(format!("mixer path {} failed", name)));
        }
        if let Some(pos) = log.failing_once.iter().position(|p| p == name) {
            log.failing_once.remove(pos);
            return Err(HalError::invalid_argument(format!("mixer path {} failed", name)));
        }
        log.ops.push(MixerOp::Apply(name.to_string()));
        Ok(())
    }

    fn reset_path(&mut self, name: &str) -> Result<()> {
        self.log.lock().ops.push(MixerOp::Reset(name.to_string()));
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.log.lock().ops.push(MixerOp::Commit);
        Ok(())
    }

    fn set_enum(&mut self, control: &str, value: &str) -> Result<()> {
        self.log
            .lock()
            .ops
            .push(MixerOp::SetEnum(control.to_string(), value.to_string()));
        Ok(())
    }
}

/// One calibration gateway call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GatewayCall {
    InitCalibration,
    DeinitCalibration,
    InitVoiceClient,
    DeinitVoiceClient,
    SendAudioCal { cal_id: i32, direction: Direction },
    EnableVoiceDevice { rx: i32, tx: i32, settings: u32 },
    DisableVoiceDevice,
    StartVoiceCall,
    StopVoiceCall,
    SetVoiceVolumeIndex(i32),
    SetMicMute(bool),
}

impl GatewayCall {
    /// Vendor entry point name
    pub fn entry_point(&self) -> &'static str {
        match self {
            Self::InitCalibration => "acdb_loader_init_ACDB",
            Self::DeinitCalibration => "acdb_loader_deallocate_ACDB",
            Self::InitVoiceClient => "csd_client_init",
            Self::DeinitVoiceClient => "csd_client_deinit",
            Self::SendAudioCal { .. } => "acdb_loader_send_audio_cal",
            Self::EnableVoiceDevice { .. } => "csd_client_enable_device",
            Self::DisableVoiceDevice => "csd_client_disable_device",
            Self::StartVoiceCall => "csd_client_start_voice",
            Self::StopVoiceCall => "csd_client_stop_voice",
            Self::SetVoiceVolumeIndex(_) => "csd_client_volume",
            Self::SetMicMute(_) => "csd_client_mic_mute",
        }
    }
}

#[derive(Debug, Default)]
struct GatewayLog {
    calls: Vec<GatewayCall>,
    failures: HashMap<&'static str, i32>,
    missing: Vec<&'static str>,
}

/// Calibration gateway that records calls and can be scripted to fail
#[derive(Debug, Clone, Default)]
pub struct MockGateway {
    log: Arc<Mutex<GatewayLog>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make an entry point return `status`
    pub fn fail(&self, entry_point: &'static str, status: i32) {
        self.log.lock().failures.insert(entry_point, status);
    }

    /// Make an entry point behave as if the vendor library lacked it
    pub fn remove(&self, entry_point: &'static str) {
        self.log.lock().missing.push(entry_point);
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.log.lock().calls.clone()
    }

    pub fn clear(&self) {
        self.log.lock().calls.clear();
    }

    fn record(&self, call: GatewayCall) -> Result<()> {
        let mut log = self.log.lock();
        let entry_point = call.entry_point();
        if log.missing.contains(&entry_point) {
            return Err(HalError::MissingCapability { entry_point });
        }
        log.calls.push(call);
        match log.failures.get(entry_point) {
            Some(&status) => Err(HalError::GatewayFailure {
                operation: entry_point,
                status,
            }),
            None => Ok(()),
        }
    }
}

impl CalibrationGateway for MockGateway {
    fn init_calibration(&self) -> Result<()> {
        self.record(GatewayCall::InitCalibration)
    }

    fn deinit_calibration(&self) -> Result<()> {
        self.record(GatewayCall::DeinitCalibration)
    }

    fn init_voice_client(&self) -> Result<()> {
        self.record(GatewayCall::InitVoiceClient)
    }

    fn deinit_voice_client(&self) -> Result<()> {
        self.record(GatewayCall::DeinitVoiceClient)
    }

    fn send_audio_cal(&self, cal_id: i32, direction: Direction) -> Result<()> {
        self.record(GatewayCall::SendAudioCal { cal_id, direction })
    }

    fn enable_voice_device(&self, rx: i32, tx: i32, settings: u32) -> Result<()> {
        self.record(GatewayCall::EnableVoiceDevice { rx, tx, settings })
    }

    fn disable_voice_device(&self) -> Result<()> {
        self.record(GatewayCall::DisableVoiceDevice)
    }

    fn start_voice_call(&self) -> Result<()> {
        self.record(GatewayCall::StartVoiceCall)
    }

    fn stop_voice_call(&self) -> Result<()> {
        self.record(GatewayCall::StopVoiceCall)
    }

    fn set_voice_volume_index(&self, index: i32) -> Result<()> {
        self.record(GatewayCall::SetVoiceVolumeIndex(index))
    }

    fn set_mic_mute(&self, muted: bool) -> Result<()> {
        self.record(GatewayCall::SetMicMute(muted))
    }
}

/// One transfer endpoint event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PcmEvent {
    Open { device: u32, direction: Direction, config: PcmConfig },
    Start { device: u32, direction: Direction },
    Write { device: u32, bytes: usize },
    Read { device: u32, bytes: usize },
    Close { device: u32, direction: Direction },
}

#[derive(Debug, Default)]
struct PcmLog {
    events: Vec<PcmEvent>,
    unready: Vec<(u32, Direction)>,
    fail_io: bool,
}

/// Byte value every successful read fills the buffer with
pub const MOCK_CAPTURE_FILL: u8 = 0x5A;

/// Transfer endpoint that records opens and transfers
#[derive(Debug, Clone, Default)]
pub struct MockPcm {
    log: Arc<Mutex<PcmLog>>,
}

impl MockPcm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Endpoints opened on this device and direction report not-ready
    pub fn fail_open(&self, device: u32, direction: Direction) {
        self.log.lock().unready.push((device, direction));
    }

    /// Toggle failure of every write and read
    pub fn fail_io(&self, fail: bool) {
        self.log.lock().fail_io = fail;
    }

    pub fn events(&self) -> Vec<PcmEvent> {
        self.log.lock().events.clone()
    }

    pub fn clear(&self) {
        self.log.lock().events.clear();
    }

    /// Endpoints currently open, as (device, direction)
    pub fn open_endpoints(&self) -> Vec<(u32, Direction)> {
        let mut open = Vec::new();
        for event in &self.log.lock().events {
            match event {
                PcmEvent::Open { device, direction, .. } => open.push((*device, *direction)),
                PcmEvent::Close { device, direction } => {
                    if let Some(pos) = open.iter().position(|e| *e == (*device, *direction)) {
                        open.remove(pos);
                    }
                }
                _ => {}
            }
        }
        open
    }
}

impl TransferEndpoint for MockPcm {
    fn open(
        &self,
        _card: u32,
        device: u32,
        direction: Direction,
        config: &PcmConfig,
    ) -> Result<Box<dyn PcmHandle>> {
        let mut log = self.log.lock();
        log.events.push(PcmEvent::Open {
            device,
            direction,
            config: *config,
        });
        let ready = !log.unready.contains(&(device, direction));
        Ok(Box::new(MockPcmHandle {
            log: Arc::clone(&self.log),
            device,
            direction,
            ready,
        }))
    }
}

struct MockPcmHandle {
    log: Arc<Mutex<PcmLog>>,
    device: u32,
    direction: Direction,
    ready: bool,
}

impl PcmHandle for MockPcmHandle {
    fn is_ready(&self) -> bool {
        self.ready
    }

    fn last_error(&self) -> String {
        format!("cannot open device {} for {:?}", self.device, self.direction)
    }

    fn start(&mut self) -> Result<()> {
        self.log.lock().events.push(PcmEvent::Start {
            device: self.device,
            direction: self.direction,
        });
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        let mut log = self.log.lock();
        if log.fail_io {
            return Err(HalError::io("write failed"));
        }
        log.events.push(PcmEvent::Write {
            device: self.device,
            bytes: data.len(),
        });
        Ok(())
    }

    fn read(&mut self, data: &mut [u8]) -> Result<()> {
        let mut log = self.log.lock();
        if log.fail_io {
            return Err(HalError::io("read failed"));
        }
        data.fill(MOCK_CAPTURE_FILL);
        log.events.push(PcmEvent::Read {
            device: self.device,
            bytes: data.len(),
        });
        Ok(())
    }

    fn close(&mut self) {
        self.log.lock().events.push(PcmEvent::Close {
            device: self.device,
            direction: self.direction,
        });
    }
}

/// EDID reader reporting a fixed channel count
#[derive(Debug, Clone, Copy)]
pub struct FixedEdid(pub u32);

impl EdidReader for FixedEdid {
    fn max_channels(&self) -> u32 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_shot_path_failure() {
        let mut mixer = RecordingMixer::new();
        mixer.fail_path_once("handset-mic");

        assert!(mixer.apply_path("handset-mic").is_err());
        assert!(mixer.apply_path("handset-mic").is_ok());
        assert_eq!(mixer.applied("handset-mic"), 1);
    }

    #[test]
    fn test_gateway_scripting() {
        let gateway = MockGateway::new();
        gateway.fail("csd_client_start_voice", -5);
        gateway.remove("csd_client_volume");

        assert!(gateway.stop_voice_call().is_ok());
        assert_eq!(
            gateway.start_voice_call(),
            Err(HalError::GatewayFailure { operation: "csd_client_start_voice", status: -5 })
        );
        assert_eq!(
            gateway.set_voice_volume_index(3),
            Err(HalError::MissingCapability { entry_point: "csd_client_volume" })
        );
        assert_eq!(
            gateway.calls(),
            vec![GatewayCall::StopVoiceCall, GatewayCall::StartVoiceCall]
        );
    }

    #[test]
    fn test_pcm_open_tracking() {
        let pcm = MockPcm::new();
        pcm.fail_open(14, Direction::Rx);

        let config = PcmConfig::low_latency();
        let mut ok = pcm.open(0, 0, Direction::Rx, &config).unwrap();
        let bad = pcm.open(0, 14, Direction::Rx, &config).unwrap();
        assert!(ok.is_ready());
        assert!(!bad.is_ready());

        assert_eq!(pcm.open_endpoints(), vec![(0, Direction::Rx), (14, Direction::Rx)]);
        ok.close();
        assert_eq!(pcm.open_endpoints(), vec![(14, Direction::Rx)]);
    }
}
