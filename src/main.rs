use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use clap::Parser;

use narrator_lib::audio::segment_file_name;
use narrator_lib::processing::{append_style, combined_instructions, segment};
use narrator_lib::settings::{load_settings, save_settings, settings_path};
use narrator_lib::synthesis::is_api_key_configured;
use narrator_lib::{
    style_tag, GeminiBackend, NarratorSettings, Pace, Project, RunOutcome, StatusKind, Voice,
};

#[derive(Parser, Debug)]
#[command(name = "narrate", version, about = "Narrate Bengali text with Gemini text-to-speech")]
struct Cli {
    /// Text file to narrate, or `-` to read stdin
    #[arg(required_unless_present_any = ["preview", "save_settings"])]
    input: Option<PathBuf>,

    /// Voice: Zephyr, Puck, Charon, Kore or Fenrir
    #[arg(long, default_value = "Zephyr", value_parser = parse_voice)]
    voice: Voice,

    /// Speaking pace, e.g. 0.8, 1.5x, slow, normal, fast
    #[arg(long, default_value = "1.0")]
    pace: Pace,

    /// Free-form style instruction
    #[arg(long, default_value = "")]
    style: String,

    /// Style preset to append (repeatable)
    #[arg(long = "tag", value_name = "TAG")]
    tags: Vec<String>,

    /// Concurrent generation requests
    #[arg(long)]
    concurrency: Option<usize>,

    /// Maximum characters per segment
    #[arg(long)]
    limit: Option<usize>,

    /// Directory to write audio into
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Project name used for the merged file
    #[arg(long, default_value = "")]
    name: String,

    /// Write one file per segment instead of a single merged file
    #[arg(long)]
    no_merge: bool,

    /// Print the segments that would be generated and exit
    #[arg(long)]
    dry_run: bool,

    /// Synthesize a short sample with the chosen voice and exit
    #[arg(long)]
    preview: bool,

    /// Settings file (defaults to the user config directory)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Write the effective settings (file plus flag overrides) back to the
    /// settings file
    #[arg(long)]
    save_settings: bool,
}

fn parse_voice(value: &str) -> Result<Voice, String> {
    Voice::from_id(value).ok_or_else(|| {
        let known: Vec<_> = Voice::all().iter().map(Voice::id).collect();
        format!("unknown voice '{}' (expected one of {})", value, known.join(", "))
    })
}

fn read_input(path: &Path) -> anyhow::Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("failed to read text from stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(path).with_context(|| format!("failed to read '{}'", path.display()))
}

fn resolve_settings(cli: &Cli, path: Option<&Path>) -> NarratorSettings {
    let mut settings = path.map(load_settings).unwrap_or_default();

    if let Some(concurrency) = cli.concurrency {
        settings.concurrency = concurrency;
    }
    if let Some(limit) = cli.limit {
        settings.segment_char_limit = limit;
    }
    if let Some(output) = &cli.output {
        settings.output_dir = Some(output.clone());
    }
    settings
}

fn style_instructions(cli: &Cli) -> anyhow::Result<String> {
    cli.tags.iter().try_fold(cli.style.trim().to_string(), |acc, id| {
        let tag = style_tag(id).ok_or_else(|| anyhow!("unknown style tag '{}'", id))?;
        Ok(append_style(&acc, tag.prompt))
    })
}

fn print_dry_run(cli: &Cli, settings: &NarratorSettings, text: &str, instructions: &str) {
    let chunks = segment(text, settings.segment_char_limit);
    if chunks.is_empty() {
        println!("Dry run: no segments would be generated.");
        return;
    }
    println!(
        "Dry run: would generate {} segment(s) with {} at {}:",
        chunks.len(),
        cli.voice,
        cli.pace
    );
    let combined = combined_instructions(instructions, cli.pace);
    if !combined.is_empty() {
        println!("  instructions: {}", combined);
    }
    for (n, chunk) in chunks.iter().enumerate() {
        let preview: String = chunk.chars().take(60).collect();
        println!("  {:>3}. [{} chars] {}", n + 1, chunk.chars().count(), preview);
    }
}

async fn preview(project: &Project, voice: Voice, dir: &Path) -> anyhow::Result<()> {
    let clip = project
        .preview_voice(voice)
        .await
        .with_context(|| format!("failed to preview voice {}", voice.id()))?;
    std::fs::create_dir_all(dir).with_context(|| format!("failed to create '{}'", dir.display()))?;
    let path = dir.join(format!("preview_{}.wav", voice.id()));
    std::fs::write(&path, clip.to_wav()?)
        .with_context(|| format!("failed to write '{}'", path.display()))?;
    println!("Preview ({}): {}", clip.duration_label(), path.display());
    Ok(())
}

/// Run generation until done, or until Ctrl-C stops it.
async fn generate(project: &Project) -> RunOutcome {
    let run = project.generate_all();
    tokio::pin!(run);
    tokio::select! {
        outcome = &mut run => outcome,
        _ = tokio::signal::ctrl_c() => {
            log::warn!("Interrupted, stopping generation");
            eprintln!("Stopping... waiting for in-flight requests");
            project.stop().await;
            run.await
        }
    }
}

fn export(project: &Project, dir: &Path, no_merge: bool) -> anyhow::Result<()> {
    if no_merge {
        for item in project.store().snapshot() {
            if item.status().kind() != StatusKind::Completed {
                continue;
            }
            let path = project
                .export_segment(item.id(), dir)
                .with_context(|| format!("failed to export {}", segment_file_name(item.id())))?;
            println!("  {}", path.display());
        }
        return Ok(());
    }

    match project
        .export_merged(dir)
        .context("failed to export merged audio")?
    {
        Some(path) => println!("Merged audio: {}", path.display()),
        None => println!("No completed segments to export."),
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (for development convenience)
    let _ = dotenvy::dotenv();
    env_logger::init();

    let cli = Cli::parse();
    let path = settings_path(cli.settings.as_deref())
        .map_err(|e| log::warn!("Using default settings: {}", e))
        .ok();
    let settings = resolve_settings(&cli, path.as_deref());

    if cli.save_settings {
        let path = path.context("no settings file location available")?;
        save_settings(&path, &settings)
            .with_context(|| format!("failed to save settings to '{}'", path.display()))?;
        println!("Settings saved: {}", path.display());
        if cli.input.is_none() && !cli.preview {
            return Ok(());
        }
    }

    let instructions = style_instructions(&cli)?;

    let text = match &cli.input {
        Some(path) => Some(read_input(path)?),
        None => None,
    };

    if cli.dry_run {
        if let Some(text) = &text {
            print_dry_run(&cli, &settings, text, &instructions);
        }
        return Ok(());
    }

    if !is_api_key_configured() {
        bail!("Gemini API key not configured. Set GEMINI_API_KEY (or API_KEY).");
    }

    let backend = GeminiBackend::new(settings.model.clone(), settings.request_timeout());
    let project = Project::new(cli.name.clone(), Arc::new(backend), settings);
    let dir = project.export_dir();

    if cli.preview {
        return preview(&project, cli.voice, &dir).await;
    }

    let Some(text) = text else {
        bail!("no input given");
    };
    let ids = project.submit(&text, cli.voice, cli.pace, &instructions);
    if ids.is_empty() {
        println!("Nothing to narrate.");
        return Ok(());
    }
    println!("Narrating {} segment(s) with {}", ids.len(), cli.voice);

    let outcome = generate(&project).await;
    log::info!("Generation ended: {:?}", outcome);

    for (n, item) in project.store().snapshot().iter().enumerate() {
        match item.status().kind() {
            StatusKind::Completed => {
                if let Some(clip) = item.clip() {
                    println!("  {:>3}. done ({})", n + 1, clip.duration_label());
                }
            }
            StatusKind::Error => println!(
                "  {:>3}. failed: {}",
                n + 1,
                item.error_message().unwrap_or("unknown error")
            ),
            StatusKind::Idle | StatusKind::Generating => println!("  {:>3}. not generated", n + 1),
        }
    }

    export(&project, &dir, cli.no_merge)?;

    let counts = project.counts();
    if counts.error > 0 {
        bail!("{} of {} segment(s) failed", counts.error, counts.total());
    }
    if matches!(outcome, RunOutcome::Cancelled { .. }) {
        bail!("generation was interrupted");
    }
    Ok(())
}
