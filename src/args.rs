// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::frame::PixelFormat;
use clap::Parser;

/// Frame acquisition backends.
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq)]
pub enum SourceKind {
    /// V4L2 camera capture (requires the `v4l2` build feature)
    V4l2,
    /// Synthetic moving color bars, no camera required
    Pattern,
}

/// Pixel channel ordering at the capture/encode boundary.
///
/// The capture source writes and the encoder channel reads the same
/// blocks; if the two disagree on channel order the stream plays with red
/// and blue swapped, so the ordering is a single shared setting.
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq)]
pub enum PixelOrder {
    Bgr,
    Rgb,
}

impl From<PixelOrder> for PixelFormat {
    fn from(order: PixelOrder) -> Self {
        match order {
            PixelOrder::Bgr => PixelFormat::Bgr888,
            PixelOrder::Rgb => PixelFormat::Rgb888,
        }
    }
}

/// Command-line arguments for the EdgeFirst RTSP Streamer.
///
/// Arguments can be specified via command line or environment variables.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Frame source
    #[arg(long, env = "SOURCE", default_value = "v4l2", value_enum)]
    pub source: SourceKind,

    /// Camera capture device index (v4l2 source)
    #[arg(short, long, env = "CAMERA_DEVICE", default_value = "0")]
    pub device: usize,

    /// Capture resolution in pixels (width height)
    #[arg(
        long,
        env = "CAMERA_SIZE",
        default_value = "720 480",
        value_delimiter = ' ',
        num_args = 2
    )]
    pub camera_size: Vec<u32>,

    /// RTSP server port
    #[arg(short, long, env = "RTSP_PORT", default_value = "554")]
    pub port: u16,

    /// RTSP mount path
    #[arg(long, env = "STREAM_PATH", default_value = "/live/0")]
    pub stream_path: String,

    /// H.264 target bitrate in kbps (constant bitrate mode)
    #[arg(short, long, env = "BITRATE", default_value = "3072")]
    pub bitrate: u32,

    /// Group-of-pictures length; 1 keeps every frame independently
    /// decodable for the lowest end-to-end latency
    #[arg(long, env = "GOP", default_value = "1")]
    pub gop: u32,

    /// Pixel channel order shared by capture and encode
    #[arg(long, env = "PIXEL_ORDER", default_value = "bgr", value_enum)]
    pub pixel_order: PixelOrder,

    /// Hardware encoder channel id
    #[arg(long, env = "CHANNEL", default_value = "0")]
    pub channel: i32,

    /// Encoder poll timeout in microseconds
    #[arg(long, env = "POLL_TIMEOUT_US", default_value = "1000")]
    pub poll_timeout_us: i64,

    /// Stop after this many frames (runs until interrupted when unset)
    #[arg(long, env = "FRAMES")]
    pub frames: Option<u64>,

    /// Command that stops the vendor's auto-launched streamer before we
    /// claim the encoder
    #[arg(long, env = "STOP_COMMAND", default_value = "RkLunch-stop.sh")]
    pub stop_command: String,

    /// Skip the vendor service stop command
    #[arg(long, env = "NO_STOP_COMMAND")]
    pub no_stop_command: bool,

    /// Verbose debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    pub fn width(&self) -> u32 {
        self.camera_size[0]
    }

    pub fn height(&self) -> u32 {
        self.camera_size[1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_reference_deployment() {
        let args = Args::try_parse_from(["edgefirst-rtsp"]).unwrap();
        assert_eq!(args.width(), 720);
        assert_eq!(args.height(), 480);
        assert_eq!(args.port, 554);
        assert_eq!(args.stream_path, "/live/0");
        assert_eq!(args.bitrate, 3072);
        assert_eq!(args.gop, 1);
        assert_eq!(args.pixel_order, PixelOrder::Bgr);
        assert_eq!(args.channel, 0);
    }

    #[test]
    fn camera_size_parses_as_pair() {
        let args = Args::try_parse_from(["edgefirst-rtsp", "--camera-size", "1920 1080"]).unwrap();
        assert_eq!((args.width(), args.height()), (1920, 1080));
    }
}
