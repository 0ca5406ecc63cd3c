//! Frame tooling for the gateway CLI

use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use bytes::Bytes;
use icn_gateway_common::{MeshAddress, SensorFrame};
use icn_gateway_mesh::{tx_line, MeshLine};
use log::debug;

use crate::utils::print_header;
use crate::{FrameCommands, SignalArg};

/// Handle frame-related commands
pub fn handle_command(cmd: FrameCommands) -> Result<()> {
    match cmd {
        FrameCommands::Encode {
            signal,
            hops,
            name,
            content,
            dest,
        } => encode_frame(signal, hops, name, content, dest),
        FrameCommands::Decode { input } => decode_frame(&input),
    }
}

/// Encode a frame and print it
fn encode_frame(
    signal: SignalArg,
    hops: Option<u8>,
    name: String,
    content: Option<String>,
    dest: Option<String>,
) -> Result<()> {
    let mut frame = match signal {
        SignalArg::Data => SensorFrame::data(name, Bytes::new()),
        SignalArg::Interest => SensorFrame::interest(name),
    };
    if let Some(hops) = hops {
        frame.hop_count = hops;
    }
    if let Some(content) = content {
        frame.content = Bytes::from(content);
    }

    let encoded = frame.encode().context("Cannot encode frame")?;
    debug!("Encoded {} byte {} frame", encoded.len(), frame.signal_code);
    println!("{}", BASE64_STANDARD.encode(&encoded));

    if let Some(dest) = dest {
        let dest = MeshAddress::new(dest)?;
        print!("{}", tx_line(&dest, &encoded));
    }

    Ok(())
}

/// Decode a base64 frame or a mesh protocol line and print its fields
fn decode_frame(input: &str) -> Result<()> {
    let input = input.trim();

    let (address, raw) = match MeshLine::parse(input)? {
        Some(MeshLine::Rx(packet)) => (Some(packet.source), packet.payload),
        Some(MeshLine::Tx { dest, payload }) => (Some(dest), payload),
        None => {
            let raw = BASE64_STANDARD
                .decode(input)
                .map_err(|e| anyhow!("Invalid base64 input: {}", e))?;
            (None, Bytes::from(raw))
        }
    };

    let frame = SensorFrame::decode(&raw)?;

    print_header("Sensor frame");
    if let Some(address) = address {
        println!("Mesh address: {}", address);
    }
    println!("Signal code:  {}", frame.signal_code);
    println!("Hop count:    {}", frame.hop_count);
    println!("Content name: {}", frame.content_name);
    println!("Content:      {}", String::from_utf8_lossy(&frame.content));

    Ok(())
}
