use anyhow::Result;
use std::fmt::Write as _;
use std::path::Path;

use crate::analysis::CompositeAnalysis;
use crate::cli::OutputFormat;
use crate::utils::{format_duration, format_file_size, format_timestamp};

/// Render an analysis in the requested format
pub fn render(analysis: &CompositeAnalysis, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => format_as_json(analysis),
        OutputFormat::Yaml => format_as_yaml(analysis),
        OutputFormat::Text => Ok(format_as_text(analysis)),
    }
}

/// Save analysis to file
pub async fn save_to_file(
    analysis: &CompositeAnalysis,
    path: &Path,
    format: OutputFormat,
) -> Result<()> {
    let content = render(analysis, format)?;
    fs_err::write(path, content)?;
    Ok(())
}

/// Print analysis to console
pub fn print_to_console(analysis: &CompositeAnalysis, format: OutputFormat) -> Result<()> {
    let content = render(analysis, format)?;
    println!("{}", content);
    Ok(())
}

pub fn format_as_json(analysis: &CompositeAnalysis) -> Result<String> {
    Ok(serde_json::to_string_pretty(analysis)?)
}

pub fn format_as_yaml(analysis: &CompositeAnalysis) -> Result<String> {
    Ok(serde_yaml::to_string(analysis)?)
}

/// Human-readable report: header, summary, scenes, transcript
pub fn format_as_text(analysis: &CompositeAnalysis) -> String {
    let metadata = &analysis.metadata;
    let mut out = String::new();

    let _ = writeln!(out, "{}", metadata.title);
    let _ = writeln!(out, "{}", "=".repeat(metadata.title.chars().count().max(3)));

    if let Some(author) = &metadata.author {
        let _ = writeln!(out, "Author:     {}", author);
    }
    if let Some(seconds) = metadata.duration_seconds {
        let _ = writeln!(out, "Duration:   {}", format_duration(seconds as f64));
    }
    if let Some(views) = metadata.views {
        let _ = writeln!(out, "Views:      {}", views);
    }
    if let Some(date) = &metadata.upload_date {
        let _ = writeln!(out, "Uploaded:   {}", date);
    }
    if let Some(resolution) = &metadata.resolution {
        let _ = writeln!(out, "Resolution: {}", resolution);
    }
    if let Some(size) = metadata.file_size {
        let _ = writeln!(out, "File size:  {}", format_file_size(size));
    }

    let _ = writeln!(out, "\nSummary\n-------\n{}", analysis.analysis.summary.trim());

    let _ = writeln!(out, "\nScenes\n------");
    if analysis.analysis.scenes.is_empty() {
        let _ = writeln!(out, "(none)");
    }
    for (index, scene) in analysis.analysis.scenes.iter().enumerate() {
        let _ = writeln!(
            out,
            "{}. [{} - {}] {}",
            index + 1,
            format_timestamp(scene.start_time),
            format_timestamp(scene.end_time),
            scene.description.trim()
        );
        if !scene.mood.is_empty() {
            let _ = writeln!(out, "   Mood: {}", scene.mood);
        }
        write_list(&mut out, "Visual", &scene.visual_elements);
        write_list(&mut out, "Audio", &scene.audio_elements);
        write_list(&mut out, "Actions", &scene.key_actions);
    }

    let _ = writeln!(out, "\nTranscript\n----------");
    if analysis.transcript.segments.is_empty() {
        let _ = writeln!(out, "{}", analysis.transcript.text.trim());
    }
    for segment in &analysis.transcript.segments {
        let start = segment.start_time.map(format_timestamp);
        let end = segment.end_time.map(format_timestamp);
        let _ = writeln!(
            out,
            "[{} - {}] {}",
            start.as_deref().unwrap_or("--:--"),
            end.as_deref().unwrap_or("--:--"),
            segment.text.trim()
        );
    }

    out
}

fn write_list(out: &mut String, label: &str, items: &[String]) {
    if !items.is_empty() {
        let _ = writeln!(out, "   {}: {}", label, items.join(", "));
    }
}
