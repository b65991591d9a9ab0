use audio_hal_core::{
    AudioMode, AudioSource, ChannelMask, DeviceSelector, DualMicConfig, InputDevices,
    InputRequest, OutputDevices, SelectionInput, SoundDevice, TtyMode,
};
use proptest::prelude::*;

const OUTPUT_BITS: [OutputDevices; 9] = [
    OutputDevices::EARPIECE,
    OutputDevices::SPEAKER,
    OutputDevices::WIRED_HEADSET,
    OutputDevices::WIRED_HEADPHONE,
    OutputDevices::BLUETOOTH_SCO,
    OutputDevices::BLUETOOTH_SCO_HEADSET,
    OutputDevices::BLUETOOTH_SCO_CARKIT,
    OutputDevices::BLUETOOTH_A2DP,
    OutputDevices::AUX_DIGITAL,
];

fn state(mode: AudioMode, out: OutputDevices) -> SelectionInput {
    SelectionInput {
        mode,
        out_devices: out,
        input: None,
        tty_mode: TtyMode::Off,
        dual_mic: DualMicConfig::None,
        fluence_in_call: false,
        fluence_in_record: false,
        mic_type_analog: false,
    }
}

fn expected_combo(out: OutputDevices) -> SoundDevice {
    let speaker = OutputDevices::SPEAKER;
    if out == speaker | OutputDevices::WIRED_HEADSET || out == speaker | OutputDevices::WIRED_HEADPHONE
    {
        SoundDevice::SpeakerAndHeadphones
    } else if out == speaker | OutputDevices::AUX_DIGITAL {
        SoundDevice::SpeakerAndHdmi
    } else {
        SoundDevice::None
    }
}

proptest! {
    #[test]
    fn two_bit_outputs_follow_combo_table(a in 0usize..9, b in 0usize..9) {
        prop_assume!(a != b);
        let out = OUTPUT_BITS[a] | OUTPUT_BITS[b];
        let device = DeviceSelector::default().output_device(&state(AudioMode::Normal, out));
        prop_assert_eq!(device, expected_combo(out));
    }

    #[test]
    fn three_bit_outputs_are_rejected(a in 0usize..9, b in 0usize..9, c in 0usize..9) {
        prop_assume!(a != b && b != c && a != c);
        let out = OUTPUT_BITS[a] | OUTPUT_BITS[b] | OUTPUT_BITS[c];
        let device = DeviceSelector::default().output_device(&state(AudioMode::Normal, out));
        prop_assert_eq!(device, SoundDevice::None);
    }

    #[test]
    fn selection_is_deterministic(bits in 0u32..0x800, carrier in any::<bool>()) {
        let selector = DeviceSelector::with_carrier_variant(carrier);
        let input = state(AudioMode::InCall, OutputDevices::from_bits(bits));
        prop_assert_eq!(selector.select(&input), selector.select(&input));
    }

    #[test]
    fn selected_devices_face_the_right_way(bits in 0u32..0x800, in_call in any::<bool>()) {
        let mode = if in_call { AudioMode::InCall } else { AudioMode::Normal };
        let mut input = state(mode, OutputDevices::from_bits(bits));
        input.input = Some(InputRequest::new(
            AudioSource::Mic,
            InputDevices::BUILTIN_MIC,
            ChannelMask::IN_MONO,
        ));
        let (out, inp) = DeviceSelector::default().select(&input);
        prop_assert!(out.is_none() || out.is_output());
        prop_assert!(inp.is_none() || inp.is_input());
    }
}

#[test]
fn documented_combos() {
    let selector = DeviceSelector::default();
    let cases = [
        (
            OutputDevices::WIRED_HEADSET | OutputDevices::SPEAKER,
            SoundDevice::SpeakerAndHeadphones,
        ),
        (
            OutputDevices::AUX_DIGITAL | OutputDevices::SPEAKER,
            SoundDevice::SpeakerAndHdmi,
        ),
        (
            OutputDevices::WIRED_HEADSET | OutputDevices::BLUETOOTH_SCO,
            SoundDevice::None,
        ),
    ];
    for (out, expected) in cases {
        assert_eq!(selector.output_device(&state(AudioMode::Normal, out)), expected);
    }
}

#[test]
fn tty_mapping_for_headset_calls() {
    let selector = DeviceSelector::default();
    let mut input = state(AudioMode::InCall, OutputDevices::WIRED_HEADSET);

    input.tty_mode = TtyMode::Full;
    assert_eq!(
        selector.select(&input),
        (SoundDevice::VoiceTtyFullHeadphones, SoundDevice::VoiceTtyFullHeadsetMic)
    );

    input.tty_mode = TtyMode::Off;
    assert_eq!(
        selector.select(&input),
        (SoundDevice::VoiceHeadphones, SoundDevice::VoiceHeadsetMic)
    );
}

#[test]
fn tty_ignored_without_wired_output() {
    let selector = DeviceSelector::default();
    let mut input = state(AudioMode::InCall, OutputDevices::EARPIECE);
    input.tty_mode = TtyMode::Full;
    assert_eq!(
        selector.select(&input),
        (SoundDevice::Handset, SoundDevice::HandsetMic)
    );
}

#[test]
fn no_active_input_outside_call() {
    let selector = DeviceSelector::default();
    let input = state(AudioMode::Normal, OutputDevices::SPEAKER);
    assert_eq!(selector.input_device(&input), SoundDevice::None);
}
