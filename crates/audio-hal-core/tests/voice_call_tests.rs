mod common;

use std::sync::Arc;

use audio_hal_core::mock::{FixedEdid, GatewayCall, MockGateway, MockPcm, RecordingMixer};
use audio_hal_core::{
    AudioHal, AudioMode, CalibrationGateway, Direction, HalBackends, HalError, OutputDevices,
    OutputFlags, OutputStream, PlatformConfig, Result, SoundDevice, StreamConfig, TtyMode,
    UseCase,
};
use common::{Rig, period, voice_platform};
use parking_lot::Mutex;

fn playing(rig: &Rig, devices: OutputDevices) -> OutputStream {
    let out = rig
        .hal
        .open_output_stream(devices, OutputFlags::PRIMARY, StreamConfig::default())
        .unwrap();
    out.write(&period());
    out
}

fn voice_enable(rx: SoundDevice, tx: SoundDevice, settings: u32) -> GatewayCall {
    GatewayCall::EnableVoiceDevice {
        rx: rx.calibration_id().unwrap(),
        tx: tx.calibration_id().unwrap(),
        settings,
    }
}

#[test]
fn call_start_cycles_both_paths_on_same_device() {
    let rig = Rig::voice();
    let out = playing(&rig, OutputDevices::EARPIECE);
    assert_eq!(rig.hal.device_state().current_output, SoundDevice::Handset);
    rig.gateway.clear();

    rig.hal.set_mode(AudioMode::InCall);
    out.set_routing(OutputDevices::EARPIECE).unwrap();

    let state = rig.hal.device_state();
    assert_eq!(state.current_output, SoundDevice::Handset);
    assert_eq!(state.current_input, SoundDevice::HandsetMic);
    assert_eq!(rig.mixer.reset("handset"), 1);
    assert_eq!(rig.mixer.applied("handset"), 2);
    assert_eq!(rig.mixer.applied("voice-call"), 1);

    assert_eq!(
        rig.gateway.calls(),
        vec![
            GatewayCall::DisableVoiceDevice,
            GatewayCall::SendAudioCal { cal_id: 7, direction: Direction::Rx },
            GatewayCall::SendAudioCal { cal_id: 4, direction: Direction::Tx },
            voice_enable(SoundDevice::Handset, SoundDevice::HandsetMic, 0x10),
            GatewayCall::StartVoiceCall,
        ]
    );

    assert!(rig.hal.call_state().in_call);
    let ids: Vec<_> = rig.hal.active_usecases().iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![UseCase::PlaybackLowLatency, UseCase::VoiceCall]);
    let open = rig.pcm.open_endpoints();
    assert!(open.contains(&(12, Direction::Rx)));
    assert!(open.contains(&(12, Direction::Tx)));
}

#[test]
fn leaving_call_mode_stops_the_call() {
    let rig = Rig::voice();
    let out = playing(&rig, OutputDevices::EARPIECE);
    rig.hal.set_mode(AudioMode::InCall);
    out.set_routing(OutputDevices::EARPIECE).unwrap();
    rig.gateway.clear();

    rig.hal.set_mode(AudioMode::Normal);
    out.set_routing(OutputDevices::EARPIECE).unwrap();

    assert!(!rig.hal.call_state().in_call);
    assert_eq!(rig.gateway.calls(), vec![GatewayCall::StopVoiceCall]);
    assert_eq!(rig.mixer.reset("voice-call"), 1);
    assert_eq!(rig.mixer.reset("handset-mic"), 1);
    assert!(!rig.hal.device_state().input_active);
    assert_eq!(rig.pcm.open_endpoints(), vec![(14, Direction::Rx)]);
    let ids: Vec<_> = rig.hal.active_usecases().iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![UseCase::PlaybackLowLatency]);
}

/// Records how many mixer resets had happened when the modem call was stopped
struct OrderProbe {
    mixer: RecordingMixer,
    resets_at_stop: Mutex<Option<usize>>,
}

impl CalibrationGateway for OrderProbe {
    fn stop_voice_call(&self) -> Result<()> {
        *self.resets_at_stop.lock() = Some(self.mixer.reset("voice-call"));
        Ok(())
    }
}

#[test]
fn modem_call_stops_before_mixer_teardown() {
    let mixer = RecordingMixer::new();
    let probe = Arc::new(OrderProbe {
        mixer: mixer.clone(),
        resets_at_stop: Mutex::new(None),
    });
    let backends = HalBackends {
        mixer: Box::new(mixer.clone()),
        pcm: Arc::new(MockPcm::new()),
        gateway: Some(probe.clone()),
        edid: Arc::new(FixedEdid(2)),
    };
    let hal = AudioHal::open(voice_platform(), backends);

    let out = hal
        .open_output_stream(OutputDevices::SPEAKER, OutputFlags::PRIMARY, StreamConfig::default())
        .unwrap();
    out.write(&period());
    hal.set_mode(AudioMode::InCall);
    hal.start_voice_call().unwrap();
    hal.stop_voice_call().unwrap();

    assert_eq!(*probe.resets_at_stop.lock(), Some(0));
    assert_eq!(mixer.reset("voice-call"), 1);
}

#[test]
fn voice_endpoint_failure_unwinds_the_call() {
    let rig = Rig::voice();
    let _out = playing(&rig, OutputDevices::EARPIECE);
    rig.pcm.fail_open(12, Direction::Tx);
    rig.hal.set_mode(AudioMode::InCall);

    let err = rig.hal.start_voice_call().unwrap_err();

    assert!(matches!(err, HalError::IoFailure { .. }));
    assert!(!rig.hal.call_state().in_call);
    assert!(rig.gateway.calls().contains(&GatewayCall::StopVoiceCall));
    assert!(!rig.gateway.calls().contains(&GatewayCall::StartVoiceCall));
    assert_eq!(rig.pcm.open_endpoints(), vec![(14, Direction::Rx)]);
    let ids: Vec<_> = rig.hal.active_usecases().iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![UseCase::PlaybackLowLatency]);
}

#[test]
fn voice_device_failure_restores_the_playback_route() {
    let rig = Rig::voice();
    let out = playing(&rig, OutputDevices::EARPIECE);
    rig.hal.set_mode(AudioMode::InCall);
    rig.mixer.fail_path_once("handset-mic");

    let err = rig.hal.start_voice_call().unwrap_err();

    assert!(matches!(err, HalError::InvalidArgument { .. }));
    assert!(!rig.hal.call_state().in_call);
    assert!(!out.is_standby());
    let state = rig.hal.device_state();
    assert_eq!(state.current_output, SoundDevice::Handset);
    assert!(state.output_active);
    assert_eq!(state.current_input, SoundDevice::HandsetMic);
    assert!(state.input_active);
    assert_eq!(rig.mixer.reset("low-latency-playback"), 1);
    assert_eq!(rig.mixer.applied("low-latency-playback"), 2);
    assert_eq!(rig.mixer.applied("voice-call"), 0);
    assert!(!rig.gateway.calls().contains(&GatewayCall::StartVoiceCall));
    assert_eq!(rig.pcm.open_endpoints(), vec![(14, Direction::Rx)]);
    let ids: Vec<_> = rig.hal.active_usecases().iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![UseCase::PlaybackLowLatency]);
}

#[test]
fn duplicate_voice_call_is_rejected() {
    let rig = Rig::voice();
    let _out = playing(&rig, OutputDevices::EARPIECE);
    rig.hal.set_mode(AudioMode::InCall);
    rig.hal.start_voice_call().unwrap();

    assert_eq!(
        rig.hal.start_voice_call(),
        Err(HalError::AlreadyExists { usecase: UseCase::VoiceCall })
    );
}

#[test]
fn tty_change_in_call_reselects_devices() {
    let rig = Rig::voice();
    let out = playing(&rig, OutputDevices::WIRED_HEADSET);
    rig.hal.set_mode(AudioMode::InCall);
    out.set_routing(OutputDevices::WIRED_HEADSET).unwrap();
    assert_eq!(
        rig.hal.device_state().current_output,
        SoundDevice::VoiceHeadphones
    );
    rig.gateway.clear();

    rig.hal.set_tty_mode(TtyMode::Full).unwrap();

    let state = rig.hal.device_state();
    assert_eq!(state.current_output, SoundDevice::VoiceTtyFullHeadphones);
    assert_eq!(state.current_input, SoundDevice::VoiceTtyFullHeadsetMic);
    assert_eq!(rig.hal.call_state().settings, 0x20);
    assert_eq!(
        rig.gateway.calls().last(),
        Some(&voice_enable(
            SoundDevice::VoiceTtyFullHeadphones,
            SoundDevice::VoiceTtyFullHeadsetMic,
            0x20
        ))
    );
}

#[test]
fn voice_volume_and_mute_reach_the_modem_in_call() {
    let rig = Rig::voice();
    rig.hal.set_voice_volume(0.6).unwrap();
    rig.hal.set_mic_mute(true).unwrap();
    assert!(rig.gateway.calls().is_empty());

    rig.hal.set_mode(AudioMode::InCall);
    rig.hal.set_voice_volume(0.6).unwrap();
    rig.hal.set_voice_volume(1.5).unwrap();
    rig.hal.set_mic_mute(false).unwrap();

    assert_eq!(
        rig.gateway.calls(),
        vec![
            GatewayCall::SetVoiceVolumeIndex(40),
            GatewayCall::SetVoiceVolumeIndex(0),
            GatewayCall::SetMicMute(false),
        ]
    );
}

#[test]
fn missing_start_entry_point_is_not_fatal() {
    let rig = Rig::voice();
    rig.gateway.remove("csd_client_start_voice");
    let _out = playing(&rig, OutputDevices::SPEAKER);
    rig.hal.set_mode(AudioMode::InCall);

    rig.hal.start_voice_call().unwrap();

    assert!(rig.hal.call_state().in_call);
    assert_eq!(rig.hal.device_state().current_output, SoundDevice::VoiceSpeaker);
}

#[test]
fn platform_without_voice_channel_skips_modem() {
    let rig = Rig::basic();
    let _out = playing(&rig, OutputDevices::EARPIECE);
    rig.gateway.clear();
    rig.hal.set_mode(AudioMode::InCall);

    rig.hal.start_voice_call().unwrap();
    rig.hal.set_voice_volume(0.2).unwrap();

    let calls = rig.gateway.calls();
    assert!(!calls.iter().any(|c| matches!(
        c,
        GatewayCall::StartVoiceCall
            | GatewayCall::EnableVoiceDevice { .. }
            | GatewayCall::DisableVoiceDevice
            | GatewayCall::SetVoiceVolumeIndex(_)
    )));
    assert!(rig.hal.call_state().in_call);
}

fn open_with(config: PlatformConfig, gateway: &MockGateway) -> AudioHal {
    let backends = HalBackends {
        mixer: Box::new(RecordingMixer::new()),
        pcm: Arc::new(MockPcm::new()),
        gateway: Some(Arc::new(gateway.clone())),
        edid: Arc::new(FixedEdid(2)),
    };
    AudioHal::open(config, backends)
}

#[test]
fn vendor_libraries_follow_the_device_lifetime() {
    let gateway = MockGateway::new();
    let hal = open_with(voice_platform(), &gateway);
    assert_eq!(
        gateway.calls(),
        vec![GatewayCall::InitCalibration, GatewayCall::InitVoiceClient]
    );

    let out = hal
        .open_output_stream(OutputDevices::SPEAKER, OutputFlags::PRIMARY, StreamConfig::default())
        .unwrap();
    drop(hal);
    // An open stream keeps the device alive
    assert_eq!(gateway.calls().len(), 2);

    drop(out);
    assert_eq!(
        gateway.calls(),
        vec![
            GatewayCall::InitCalibration,
            GatewayCall::InitVoiceClient,
            GatewayCall::DeinitVoiceClient,
            GatewayCall::DeinitCalibration,
        ]
    );
}

#[test]
fn voice_client_is_left_alone_without_a_voice_channel() {
    let gateway = MockGateway::new();
    gateway.remove("acdb_loader_init_ACDB");
    let hal = open_with(PlatformConfig::default(), &gateway);
    assert!(gateway.calls().is_empty());

    drop(hal);
    assert_eq!(gateway.calls(), vec![GatewayCall::DeinitCalibration]);
}
