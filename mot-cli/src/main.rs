use anyhow::{Context, Result};
use log::*;
use outbreak_mot::archive::{extract, scan_table};
use outbreak_mot::read::decode_clip_with;
use outbreak_mot::*;
use structopt::StructOpt;

use std::fs;
use std::path::{Path, PathBuf};

mod descriptor;

use descriptor::{Config, KeySheet, Mode, SheetPolicy};

#[derive(Debug, StructOpt)]
#[structopt(
    name = "outbreak-mot",
    about = "reads, rebuilds and exports Outbreak motion clips. made by: Waelwindows"
)]
struct Opt {
    #[structopt(short, long, parse(from_os_str), default_value = "config.toml")]
    config: PathBuf,

    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(Debug, StructOpt)]
enum Command {
    /// Split a .bin motion archive into .mot clips
    Depack {
        #[structopt(parse(from_os_str))]
        archive: PathBuf,

        /// Defaults to `<stem>_Exported_Mots` next to the archive
        #[structopt(short, long, parse(from_os_str))]
        output: Option<PathBuf>,
    },
    /// Print every section, node and track of a clip
    Info {
        #[structopt(parse(from_os_str))]
        mot: PathBuf,
    },
    /// Write a clip out as JSON
    Dump {
        #[structopt(parse(from_os_str))]
        mot: PathBuf,

        #[structopt(short, long, parse(from_os_str))]
        output: Option<PathBuf>,
    },
    /// Re-encode a template clip with keys from a sheet
    Rebuild {
        #[structopt(parse(from_os_str))]
        template: PathBuf,

        #[structopt(parse(from_os_str))]
        keys: PathBuf,

        #[structopt(short, long, parse(from_os_str))]
        output: PathBuf,

        #[structopt(long)]
        loop_frame: Option<f32>,
    },
    /// Export a new clip from a key sheet alone
    Build {
        #[structopt(parse(from_os_str))]
        keys: PathBuf,

        #[structopt(short, long, parse(from_os_str))]
        output: PathBuf,

        /// Also write the face section
        #[structopt(long)]
        face: bool,

        #[structopt(long)]
        loop_frame: Option<f32>,
    },
}

fn main() -> Result<()> {
    env_logger::init();

    let opt = Opt::from_args();
    let config = Config::load(&opt.config)?;
    debug!("{:?}", config);

    match opt.cmd {
        Command::Depack { archive, output } => depack_archive(&archive, output),
        Command::Info { mot } => info_clip(&mot, &config),
        Command::Dump { mot, output } => dump_clip(&mot, output, &config),
        Command::Rebuild {
            template,
            keys,
            output,
            loop_frame,
        } => {
            let data = fs::read(&template).context("failed to open template")?;
            let decoded = decode_clip_with(&data, &config.decode_options())?;
            if !decoded.diagnostics.is_empty() {
                warn!("template has {} problems", decoded.diagnostics.len());
            }
            let mut clip = decoded.clip;
            if let Some(frame) = loop_frame.or(config.loop_frame) {
                clip.set_loop(Some(frame));
            }
            let sheet = KeySheet::load(&keys)?;
            let policy = SheetPolicy {
                sheet: &sheet,
                config: &config,
                mode: Mode::Rebuild,
            };
            write_clip(&output, &clip, &policy)
        }
        Command::Build {
            keys,
            output,
            face,
            loop_frame,
        } => {
            let mut regions = vec![BodyRegion::Lower, BodyRegion::Upper];
            if face {
                regions.push(BodyRegion::Face);
            }
            let clip = AnimationClip::layout(&regions, loop_frame.or(config.loop_frame));
            let sheet = KeySheet::load(&keys)?;
            let policy = SheetPolicy {
                sheet: &sheet,
                config: &config,
                mode: Mode::Build,
            };
            write_clip(&output, &clip, &policy)
        }
    }
}

fn write_clip(path: &Path, clip: &AnimationClip, policy: &SheetPolicy) -> Result<()> {
    let bytes = encode_clip(clip, policy)?;
    fs::write(path, &bytes).with_context(|| format!("failed to write {}", path.display()))?;
    info!("wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

fn depack_archive(path: &Path, output: Option<PathBuf>) -> Result<()> {
    let data = fs::read(path).context("failed to open archive")?;
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .context("archive has no file name")?;

    let table = scan_table(&data)?;
    info!(
        "table at {:#x}, data from {:#x}, {} rows",
        table.start,
        table.data_start,
        table.records.len()
    );
    let clips = extract(&data, &table);
    if clips.is_empty() {
        warn!("no clips found in {}", path.display());
        return Ok(());
    }

    let dir = output.unwrap_or_else(|| path.with_file_name(format!("{}_Exported_Mots", stem)));
    fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
    for clip in &clips {
        let out = dir.join(clip.file_name(stem));
        fs::write(&out, &clip.bytes).with_context(|| format!("failed to write {}", out.display()))?;
        debug!(
            "row {}: {} sections, {} bytes",
            clip.row, clip.sections, clip.bytes.len()
        );
    }
    println!("{} clips written to {}", clips.len(), dir.display());
    Ok(())
}

fn info_clip(path: &Path, config: &Config) -> Result<()> {
    let data = fs::read(path).context("failed to open clip")?;
    let decoded = decode_clip_with(&data, &config.decode_options())?;
    for section in &decoded.clip.sections {
        println!(
            "{:?}: {} nodes, {} bytes, loop {} at {}",
            section.region,
            section.node_count,
            section.byte_size,
            if section.loop_enabled { "on" } else { "off" },
            section.loop_frame
        );
        for node in &section.nodes {
            if !node.active {
                println!("  Node{}: inert", node.global_index);
                continue;
            }
            println!("  Node{}: mask {:#06x}", node.global_index, node.channel_mask);
            for track in &node.tracks {
                let (first, last) = track.frame_range().unwrap_or_default();
                println!(
                    "    {} {:?}: {} keys, frames {}-{}",
                    track.channel.label(),
                    track.format,
                    track.keyframes.len(),
                    first,
                    last
                );
            }
        }
    }
    for diagnostic in &decoded.diagnostics {
        println!("! {}", diagnostic);
    }
    Ok(())
}

fn dump_clip(path: &Path, output: Option<PathBuf>, config: &Config) -> Result<()> {
    let data = fs::read(path).context("failed to open clip")?;
    let decoded = decode_clip_with(&data, &config.decode_options())?;
    let json = serde_json::to_string_pretty(&decoded.clip)?;
    match output {
        Some(out) => fs::write(&out, json).with_context(|| format!("failed to write {}", out.display()))?,
        None => println!("{}", json),
    }
    Ok(())
}
