//! meshview command line

use anyhow::{anyhow, Context, Result};
use clap::{CommandFactory, Parser};
use meshview::gpu::{ShaderFallback, TextureQuality};
use meshview::io::supported_extensions_list;
use meshview::visualization::{InteractiveViewer, Viewer, ViewerConfig};
use std::path::PathBuf;
use std::process::ExitCode;

const CONTROLS: &str = "\
Controls:
  Ctrl-Q        quit
  Ctrl-R        toggle rotation
  Ctrl-S        toggle stereo
  Ctrl-T        next stereo type
  r             reset camera
  s / w         surface / wireframe
  mouse drag    orbit
  mouse wheel   zoom
With --no-modifier the Ctrl shortcuts also work as plain q, r, s and t;
camera reset moves to c and surface to f.";

#[derive(Parser, Debug)]
#[command(name = "meshview")]
#[command(about = "Stereoscopic viewer for VTK, PLY, OBJ, STL and PDB files")]
struct Cli {
    /// Mesh files to show
    files: Vec<PathBuf>,

    /// Volume (.vtk or .vti) sampled as a 3D texture by the meshes
    #[arg(long)]
    volume: Option<PathBuf>,

    /// Scale from object coordinates to texture coordinates
    #[arg(long, default_value_t = 1.0)]
    texture_scale: f32,

    /// Texel precision in bits
    #[arg(long, default_value_t = 16, value_parser = clap::value_parser!(u32).range(16..=32))]
    texture_quality: u32,

    /// Nearest-neighbor texture sampling
    #[arg(long)]
    no_interpolate: bool,

    /// What to draw when the texture shader fails to compile: default or skip
    #[arg(long, default_value = "default")]
    shader_fallback: ShaderFallback,

    /// Shortcuts without holding Ctrl
    #[arg(long)]
    no_modifier: bool,

    /// Start in stereo
    #[arg(long)]
    stereo: bool,
}

fn usage() -> String {
    format!(
        "{}\nSupported formats: {}\n\n{}",
        Cli::command().render_usage(),
        supported_extensions_list(),
        CONTROLS
    )
}

fn config_from(cli: &Cli) -> Result<ViewerConfig> {
    let mut config = ViewerConfig::default();
    config.texture.quality = TextureQuality::from_bits(cli.texture_quality)
        .ok_or_else(|| anyhow!("texture quality must be 16 or 32, got {}", cli.texture_quality))?;
    config.texture.interpolate = !cli.no_interpolate;
    config.texture_scale = cli.texture_scale;
    config.shader_fallback = cli.shader_fallback;
    config.require_modifier = !cli.no_modifier;
    config.stereo = cli.stereo;
    Ok(config)
}

fn load(cli: &Cli) -> Result<Viewer> {
    let config = config_from(cli)?;
    let texture_scale = config.texture_scale;
    let mut viewer = Viewer::new(config);

    if let Some(path) = &cli.volume {
        let field = meshview::io::read_volume(path)
            .with_context(|| format!("cannot load volume {}", path.display()))?;
        viewer.attach_volume(field, texture_scale);
    }
    for path in &cli.files {
        viewer
            .add_file(path)
            .with_context(|| format!("cannot load {}", path.display()))?;
    }
    Ok(viewer)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if cli.files.is_empty() {
        eprintln!("{}", usage());
        return ExitCode::FAILURE;
    }

    let viewer = match load(&cli) {
        Ok(viewer) => viewer,
        Err(e) => {
            eprintln!("meshview: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    match InteractiveViewer::new(viewer).run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("meshview: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["meshview", "a.ply"]);
        let config = config_from(&cli).unwrap();
        assert_eq!(config.texture.quality, TextureQuality::Half);
        assert!(config.texture.interpolate);
        assert!(config.require_modifier);
        assert_eq!(config.shader_fallback, ShaderFallback::DefaultShading);
        assert_eq!(config.texture_scale, 1.0);
    }

    #[test]
    fn test_cli_options() {
        let cli = Cli::parse_from([
            "meshview",
            "--texture-quality",
            "32",
            "--no-interpolate",
            "--shader-fallback",
            "skip",
            "--no-modifier",
            "--stereo",
            "a.ply",
        ]);
        let config = config_from(&cli).unwrap();
        assert_eq!(config.texture.quality, TextureQuality::Full);
        assert!(!config.texture.interpolate);
        assert_eq!(config.shader_fallback, ShaderFallback::SkipItem);
        assert!(!config.require_modifier);
        assert!(config.stereo);
    }

    #[test]
    fn test_unsupported_extension_fails_before_window() {
        let cli = Cli::parse_from(["meshview", "missing.xyz"]);
        assert!(load(&cli).is_err());
    }

    #[test]
    fn test_usage_lists_formats() {
        let text = usage();
        assert!(text.contains("Ctrl-Q"));
        assert!(text.contains("PDB"));
    }
}
