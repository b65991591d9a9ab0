//! Host-side simulator for the audio HAL routing engine
//!
//! `select` prints the sound devices chosen for a request. `scenario` replays
//! a JSON script against in-memory collaborators and prints what the mixer,
//! the calibration gateway and the PCM driver were asked to do.

mod scenario;

use std::path::PathBuf;

use anyhow::{Context, Result};
use audio_hal_core::{
    AudioMode, AudioSource, ChannelMask, DeviceSelector, DualMicConfig, InputDevices,
    InputRequest, LoggingConfig, OutputDevices, SelectionInput, TtyMode, parse_log_level,
    setup_logging,
};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn", env = "AUDIO_HAL_LOG")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    /// Tag log lines with their source file and line
    #[arg(long, global = true)]
    log_source: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the output and input sound devices for a request
    Select {
        /// Audio mode: normal, ringtone, in_call, in_communication
        #[arg(long, default_value = "normal", value_parser = parse_named::<AudioMode>)]
        mode: AudioMode,

        /// Output devices, as names joined with `|` or a hex mask
        #[arg(long = "out", default_value = "speaker", value_parser = parse_output_devices)]
        out_devices: OutputDevices,

        /// Input devices of an active capture stream
        #[arg(long = "in", value_parser = parse_input_devices)]
        in_devices: Option<InputDevices>,

        /// Capture source of the active input
        #[arg(long, default_value = "default", value_parser = parse_named::<AudioSource>)]
        source: AudioSource,

        /// Use the front-back input channel mask
        #[arg(long)]
        front_back: bool,

        /// TTY mode: off, full, vco, hco
        #[arg(long, default_value = "off", value_parser = parse_named::<TtyMode>)]
        tty: TtyMode,

        /// Dual-mic geometry: none, endfire, broadside
        #[arg(long, default_value = "none", value_parser = parse_named::<DualMicConfig>)]
        dual_mic: DualMicConfig,

        /// Fluence in voice calls and voice recognition
        #[arg(long)]
        fluence: bool,

        /// Handset mic is analog
        #[arg(long)]
        analog_mic: bool,

        /// SIM belongs to the carrier variant
        #[arg(long)]
        carrier_variant: bool,
    },

    /// Replay a JSON scenario against mock collaborators
    Scenario {
        /// Scenario file
        file: PathBuf,
    },
}

/// Parse a unit enum through its serde name
fn parse_named<T: DeserializeOwned>(value: &str) -> std::result::Result<T, String> {
    serde_json::from_value(serde_json::Value::String(value.to_string()))
        .map_err(|_| format!("unknown value '{}'", value))
}

fn parse_mask(
    value: &str,
    names: &[(&str, u32)],
) -> std::result::Result<u32, String> {
    if let Some(hex) = value.strip_prefix("0x") {
        return u32::from_str_radix(hex, 16).map_err(|e| e.to_string());
    }
    value
        .split('|')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .try_fold(0, |bits, part| {
            names
                .iter()
                .find(|(name, _)| *name == part)
                .map(|(_, bit)| bits | bit)
                .ok_or_else(|| format!("unknown device '{}'", part))
        })
}

fn parse_output_devices(value: &str) -> std::result::Result<OutputDevices, String> {
    const NAMES: &[(&str, u32)] = &[
        ("earpiece", OutputDevices::EARPIECE.bits()),
        ("speaker", OutputDevices::SPEAKER.bits()),
        ("wired_headset", OutputDevices::WIRED_HEADSET.bits()),
        ("wired_headphone", OutputDevices::WIRED_HEADPHONE.bits()),
        ("bt_sco", OutputDevices::BLUETOOTH_SCO.bits()),
        ("bt_sco_headset", OutputDevices::BLUETOOTH_SCO_HEADSET.bits()),
        ("bt_sco_carkit", OutputDevices::BLUETOOTH_SCO_CARKIT.bits()),
        ("a2dp", OutputDevices::BLUETOOTH_A2DP.bits()),
        ("hdmi", OutputDevices::AUX_DIGITAL.bits()),
    ];
    parse_mask(value, NAMES).map(OutputDevices::from_bits)
}

fn parse_input_devices(value: &str) -> std::result::Result<InputDevices, String> {
    const NAMES: &[(&str, u32)] = &[
        ("communication", InputDevices::COMMUNICATION.bits()),
        ("ambient", InputDevices::AMBIENT.bits()),
        ("builtin_mic", InputDevices::BUILTIN_MIC.bits()),
        ("bt_sco_headset", InputDevices::BLUETOOTH_SCO_HEADSET.bits()),
        ("wired_headset", InputDevices::WIRED_HEADSET.bits()),
        ("hdmi", InputDevices::AUX_DIGITAL.bits()),
        ("voice_call", InputDevices::VOICE_CALL.bits()),
        ("back_mic", InputDevices::BACK_MIC.bits()),
    ];
    parse_mask(value, NAMES).map(InputDevices::from_bits)
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Select {
            mode,
            out_devices,
            in_devices,
            source,
            front_back,
            tty,
            dual_mic,
            fluence,
            analog_mic,
            carrier_variant,
        } => {
            let channel_mask = if front_back {
                ChannelMask::IN_FRONT_BACK
            } else {
                ChannelMask::IN_MONO
            };
            let input = SelectionInput {
                mode,
                out_devices,
                input: in_devices.map(|devices| InputRequest::new(source, devices, channel_mask)),
                tty_mode: tty,
                dual_mic,
                fluence_in_call: fluence && dual_mic.is_dual(),
                fluence_in_record: fluence && dual_mic.is_dual(),
                mic_type_analog: analog_mic,
            };
            let (output, input_device) =
                DeviceSelector::with_carrier_variant(carrier_variant).select(&input);
            println!("output: {}", output);
            println!("input:  {}", input_device);
            Ok(())
        }
        Command::Scenario { file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let scenario: scenario::Scenario = serde_json::from_str(&text)
                .with_context(|| format!("parsing {}", file.display()))?;
            let report = scenario.run()?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = parse_log_level(&cli.log_level)?;
    let mut logging = LoggingConfig::new(level);
    if cli.log_json {
        logging = logging.json();
    }
    if cli.log_source {
        logging = logging.with_source_location();
    }
    setup_logging(logging)?;

    run(cli)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_output_devices() {
        assert_eq!(
            parse_output_devices("speaker|wired_headset").unwrap(),
            OutputDevices::SPEAKER | OutputDevices::WIRED_HEADSET
        );
        assert_eq!(parse_output_devices("0x400").unwrap(), OutputDevices::AUX_DIGITAL);
        assert!(parse_output_devices("loudspeaker").is_err());
    }

    #[test]
    fn test_parse_named() {
        assert_eq!(parse_named::<AudioMode>("in_call").unwrap(), AudioMode::InCall);
        assert_eq!(parse_named::<TtyMode>("hco").unwrap(), TtyMode::Hco);
        assert!(parse_named::<TtyMode>("loud").is_err());
    }

    #[test]
    fn test_cli_parses_select() {
        let cli = Cli::try_parse_from([
            "audio-hal",
            "select",
            "--mode",
            "in_call",
            "--out",
            "wired_headset",
            "--tty",
            "full",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Command::Select { mode: AudioMode::InCall, tty: TtyMode::Full, .. }
        ));
    }
}
