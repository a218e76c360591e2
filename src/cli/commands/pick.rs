//! Image picker commands

use anyhow::Result;
use clap::Subcommand;
use crate::app::Services;
use crate::cli::output::{format_asset, print_formatted, print_success, OutputFormat};
use crate::config::Config;
use crate::permission::PermissionGate;
use crate::state::{ImagePicker, PickOutcome};

#[derive(Subcommand, Debug)]
pub enum PickCommands {
    /// Choose an image from the photo library
    Gallery,

    /// Capture an image with the camera
    Camera,
}

pub async fn run(command: PickCommands, format: OutputFormat, quiet: bool) -> Result<()> {
    let config = Config::load()?;
    let services = Services::detect(&config)?;
    let mut picker = ImagePicker::new(
        services.media,
        PermissionGate::new(services.permissions, services.alerts),
        services.capabilities.camera_permission,
    );

    let outcome = match command {
        PickCommands::Gallery => picker.pick_from_gallery().await,
        PickCommands::Camera => picker.capture_from_camera().await,
    };

    match outcome {
        PickOutcome::Picked(asset) => {
            print_formatted(&asset, format, format_asset);
            Ok(())
        }
        PickOutcome::Cancelled => {
            print_success("Picker cancelled", quiet);
            Ok(())
        }
        // The alert was already shown
        PickOutcome::NotPermitted(_) => Ok(()),
        PickOutcome::Failed(e) => Err(e.into()),
    }
}
