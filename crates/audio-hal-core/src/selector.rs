//! Sound device selection
//!
//! [`DeviceSelector`] turns the requested device bitmasks and the call state
//! into the pair of physical sound devices that should be enabled. It is a
//! pure decision table: no hardware access and no shared state beyond the
//! carrier flag captured at construction.
//!
//! Output resolution tries, in order, the in-call table, the two-device
//! combinations and the single-device mapping. Input resolution tries the
//! in-call table, the capture-source table, the requested input bits and
//! finally mirrors the output device.

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::call::CallState;
use crate::capabilities::Capabilities;
use crate::devices::{ChannelMask, InputDevices, OutputDevices};
use crate::sound_device::SoundDevice;
use crate::types::{AudioMode, AudioSource, DualMicConfig, TtyMode};

/// The capture request of the active input stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputRequest {
    pub source: AudioSource,
    pub devices: InputDevices,
    pub channel_mask: ChannelMask,
}

impl InputRequest {
    pub fn new(source: AudioSource, devices: InputDevices, channel_mask: ChannelMask) -> Self {
        Self {
            source,
            devices,
            channel_mask,
        }
    }
}

/// Everything the selector looks at
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SelectionInput {
    pub mode: AudioMode,
    /// Aggregate requested output devices
    pub out_devices: OutputDevices,
    /// Active input stream, if any
    pub input: Option<InputRequest>,
    pub tty_mode: TtyMode,
    pub dual_mic: DualMicConfig,
    pub fluence_in_call: bool,
    pub fluence_in_record: bool,
    pub mic_type_analog: bool,
}

impl SelectionInput {
    /// Snapshot the call state together with the current requests
    pub fn from_state(
        call: &CallState,
        out_devices: OutputDevices,
        input: Option<InputRequest>,
    ) -> Self {
        Self {
            mode: call.mode,
            out_devices,
            input,
            tty_mode: call.tty_mode,
            dual_mic: call.dual_mic,
            fluence_in_call: call.fluence_in_call,
            fluence_in_record: call.fluence_in_record,
            mic_type_analog: call.mic_type_analog,
        }
    }

    fn in_call(&self) -> bool {
        self.mode == AudioMode::InCall
    }

    fn source(&self) -> AudioSource {
        self.input.map(|i| i.source).unwrap_or_default()
    }
}

/// Maps requests to physical sound devices
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceSelector {
    carrier_variant: bool,
}

impl DeviceSelector {
    pub fn new(capabilities: &Capabilities) -> Self {
        Self::with_carrier_variant(capabilities.carrier_variant)
    }

    pub fn with_carrier_variant(carrier_variant: bool) -> Self {
        Self { carrier_variant }
    }

    /// Output and input device for the given state
    pub fn select(&self, input: &SelectionInput) -> (SoundDevice, SoundDevice) {
        (self.output_device(input), self.input_device(input))
    }

    /// Resolve the playback sound device
    pub fn output_device(&self, input: &SelectionInput) -> SoundDevice {
        let devices = input.out_devices;
        let device = self.resolve_output(input, devices);
        debug!("Output devices {:?} -> {}", devices, device);
        device
    }

    fn resolve_output(&self, input: &SelectionInput, devices: OutputDevices) -> SoundDevice {
        if devices.is_empty() {
            debug!("No output devices requested");
            return SoundDevice::None;
        }

        if input.in_call() {
            let device = self.in_call_output(input.tty_mode, devices);
            if !device.is_none() {
                return device;
            }
        }

        match devices.count() {
            2 => Self::combo_output(devices),
            1 => Self::single_output(devices),
            _ => {
                error!("Invalid output devices {:?}", devices);
                SoundDevice::None
            }
        }
    }

    fn in_call_output(&self, tty: TtyMode, devices: OutputDevices) -> SoundDevice {
        if devices.is_wired() {
            match tty {
                TtyMode::Full => SoundDevice::VoiceTtyFullHeadphones,
                TtyMode::Vco => SoundDevice::VoiceTtyVcoHeadphones,
                TtyMode::Hco => SoundDevice::VoiceTtyHcoHandset,
                TtyMode::Off => SoundDevice::VoiceHeadphones,
            }
        } else if devices.is_sco() {
            SoundDevice::BtSco
        } else if devices.intersects(OutputDevices::SPEAKER) {
            SoundDevice::VoiceSpeaker
        } else if devices.intersects(OutputDevices::EARPIECE) {
            if self.carrier_variant {
                SoundDevice::VoiceHandsetTmus
            } else {
                SoundDevice::Handset
            }
        } else {
            SoundDevice::None
        }
    }

    fn combo_output(devices: OutputDevices) -> SoundDevice {
        let speaker = OutputDevices::SPEAKER;
        if devices == OutputDevices::WIRED_HEADPHONE | speaker
            || devices == OutputDevices::WIRED_HEADSET | speaker
        {
            SoundDevice::SpeakerAndHeadphones
        } else if devices == OutputDevices::AUX_DIGITAL | speaker {
            SoundDevice::SpeakerAndHdmi
        } else {
            error!("Invalid combo device {:?}", devices);
            SoundDevice::None
        }
    }

    fn single_output(devices: OutputDevices) -> SoundDevice {
        if devices.is_wired() {
            SoundDevice::Headphones
        } else if devices.intersects(OutputDevices::SPEAKER) {
            SoundDevice::Speaker
        } else if devices.is_sco() {
            SoundDevice::BtSco
        } else if devices.intersects(OutputDevices::AUX_DIGITAL) {
            SoundDevice::Hdmi
        } else if devices.intersects(OutputDevices::EARPIECE) {
            SoundDevice::Handset
        } else {
            error!("Unknown output device {:?}", devices);
            SoundDevice::None
        }
    }

    /// Resolve the capture sound device
    pub fn input_device(&self, input: &SelectionInput) -> SoundDevice {
        let device = self.resolve_input(input);
        debug!(
            "Input for out {:?} request {:?} -> {}",
            input.out_devices, input.input, device
        );
        device
    }

    fn resolve_input(&self, input: &SelectionInput) -> SoundDevice {
        let out = input.out_devices;
        let mut in_devices = input.input.map(|i| i.devices).unwrap_or_default();

        if input.in_call() {
            if out.is_empty() {
                error!("No output device set for voice call");
                return SoundDevice::None;
            }
            if input.tty_mode != TtyMode::Off && out.is_wired() {
                return match input.tty_mode {
                    TtyMode::Full => SoundDevice::VoiceTtyFullHeadsetMic,
                    TtyMode::Vco => SoundDevice::VoiceTtyVcoHandsetMic,
                    TtyMode::Hco => SoundDevice::VoiceTtyHcoHeadsetMic,
                    TtyMode::Off => SoundDevice::None,
                };
            }
            let device = self.in_call_input(input, out);
            if !device.is_none() {
                return device;
            }
        } else {
            match input.source() {
                AudioSource::Camcorder => {
                    if in_devices.intersects(InputDevices::BUILTIN_MIC | InputDevices::BACK_MIC) {
                        return SoundDevice::CamcorderMic;
                    }
                }
                AudioSource::VoiceRecognition => {
                    if in_devices.intersects(InputDevices::BUILTIN_MIC) {
                        return Self::voice_rec_input(input);
                    }
                }
                AudioSource::VoiceCommunication => {
                    if out.intersects(OutputDevices::SPEAKER) {
                        in_devices = InputDevices::BACK_MIC;
                    }
                }
                AudioSource::Default if input.input.is_none() => {
                    debug!("No active input");
                    return SoundDevice::None;
                }
                _ => {}
            }
        }

        if !in_devices.is_empty()
            && !in_devices.intersects(InputDevices::VOICE_CALL | InputDevices::COMMUNICATION)
        {
            Self::requested_input(input.mic_type_analog, in_devices)
        } else {
            Self::mirrored_input(out)
        }
    }

    fn in_call_input(&self, input: &SelectionInput, out: OutputDevices) -> SoundDevice {
        if out.intersects(OutputDevices::EARPIECE | OutputDevices::WIRED_HEADPHONE) {
            if input.mic_type_analog || !input.fluence_in_call {
                return SoundDevice::HandsetMic;
            }
            match input.dual_mic {
                DualMicConfig::Endfire if self.carrier_variant => SoundDevice::VoiceDmicEfTmus,
                DualMicConfig::Endfire => SoundDevice::VoiceDmicEf,
                DualMicConfig::Broadside => SoundDevice::VoiceDmicBs,
                DualMicConfig::None => SoundDevice::HandsetMic,
            }
        } else if out.intersects(OutputDevices::WIRED_HEADSET) {
            SoundDevice::VoiceHeadsetMic
        } else if out.is_sco() {
            SoundDevice::BtScoMic
        } else if out.intersects(OutputDevices::SPEAKER) {
            match (input.fluence_in_call, input.dual_mic) {
                (true, DualMicConfig::Endfire) => SoundDevice::VoiceSpeakerDmicEf,
                (true, DualMicConfig::Broadside) => SoundDevice::VoiceSpeakerDmicBs,
                _ => SoundDevice::VoiceSpeakerMic,
            }
        } else {
            SoundDevice::None
        }
    }

    fn voice_rec_input(input: &SelectionInput) -> SoundDevice {
        let front_back = input
            .input
            .is_some_and(|i| i.channel_mask == ChannelMask::IN_FRONT_BACK);

        match input.dual_mic {
            DualMicConfig::Endfire if front_back => SoundDevice::VoiceRecDmicEf,
            DualMicConfig::Endfire if input.fluence_in_record => SoundDevice::VoiceRecDmicEfFluence,
            DualMicConfig::Broadside if front_back => SoundDevice::VoiceRecDmicBs,
            DualMicConfig::Broadside if input.fluence_in_record => {
                SoundDevice::VoiceRecDmicBsFluence
            }
            _ => SoundDevice::VoiceRecMic,
        }
    }

    fn requested_input(mic_type_analog: bool, devices: InputDevices) -> SoundDevice {
        if devices.intersects(InputDevices::BUILTIN_MIC) {
            SoundDevice::HandsetMic
        } else if devices.intersects(InputDevices::BACK_MIC) {
            if mic_type_analog {
                SoundDevice::HandsetMic
            } else {
                SoundDevice::SpeakerMic
            }
        } else if devices.intersects(InputDevices::WIRED_HEADSET) {
            SoundDevice::HeadsetMic
        } else if devices.intersects(InputDevices::BLUETOOTH_SCO_HEADSET) {
            SoundDevice::BtScoMic
        } else if devices.intersects(InputDevices::AUX_DIGITAL) {
            SoundDevice::HdmiMic
        } else {
            error!("Unknown input devices {:?}", devices);
            warn!("Using default handset-mic");
            SoundDevice::HandsetMic
        }
    }

    fn mirrored_input(out: OutputDevices) -> SoundDevice {
        if out.intersects(OutputDevices::EARPIECE) {
            SoundDevice::HandsetMic
        } else if out.intersects(OutputDevices::WIRED_HEADSET) {
            SoundDevice::HeadsetMic
        } else if out.intersects(OutputDevices::SPEAKER) {
            SoundDevice::SpeakerMic
        } else if out.intersects(OutputDevices::WIRED_HEADPHONE) {
            SoundDevice::HandsetMic
        } else if out.intersects(OutputDevices::BLUETOOTH_SCO_HEADSET) {
            SoundDevice::BtScoMic
        } else if out.intersects(OutputDevices::AUX_DIGITAL) {
            SoundDevice::HdmiMic
        } else {
            error!("Unknown output devices {:?}", out);
            warn!("Using default handset-mic");
            SoundDevice::HandsetMic
        }
    }
}
