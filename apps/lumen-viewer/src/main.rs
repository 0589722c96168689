//! Lumen Viewer
//!
//! Draws a textured mesh with an FPS-style camera.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p lumen-viewer -- [OPTIONS]
//! ```
//!
//! ## Controls
//!
//! - `W`/`A`/`S`/`D`: Move
//! - `Shift`: Move faster
//! - `Ctrl`: Move slower
//! - Mouse: Look around
//! - `Escape`: Release or capture the cursor
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Set log level (e.g., info, debug, trace)

mod args;

use lumen_app::run_app;

use crate::args::{parse_args, Command};

fn main() -> anyhow::Result<()> {
    match parse_args(std::env::args().skip(1))? {
        Command::Help => {
            print_help();
            Ok(())
        }
        Command::Run(config) => run_app(config),
    }
}

fn print_help() {
    eprintln!(
        "Lumen Viewer

USAGE:
    cargo run -p lumen-viewer -- [OPTIONS]

OPTIONS:
    --width <N>             Initial window width (default: 800)
    --height <N>            Initial window height (default: 600)
    --vsync / --no-vsync    FIFO presentation, or the lowest latency mode available
                            (default: vsync)
    --validation            Enable Vulkan validation layers (default in debug builds)
    --no-validation         Disable Vulkan validation layers
    -m, --model <PATH>      Wavefront OBJ model to draw (default: two textured quads)
    -t, --texture <PATH>    Texture image (default: generated checkerboard)
    -h, --help              Print this help message

CONTROLS:
    W/A/S/D                 Move
    Shift / Ctrl            Move faster / slower
    Mouse                   Look around
    Escape                  Release or capture the cursor

EXAMPLES:
    # Built-in quads
    cargo run -p lumen-viewer

    # A textured model
    cargo run -p lumen-viewer -- --model viking_room.obj --texture viking_room.png

ENVIRONMENT VARIABLES:
    RUST_LOG                Set log level (e.g., info, debug, trace)"
    );
}
