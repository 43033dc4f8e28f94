/// Format file size in human-readable format
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let bytes_f = bytes as f64;
    let unit_index = (bytes_f.log10() / THRESHOLD.log10()).floor() as usize;
    let unit_index = unit_index.min(UNITS.len() - 1);

    let size = bytes_f / THRESHOLD.powi(unit_index as i32);

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

/// Format duration in human-readable format
pub fn format_duration(seconds: f64) -> String {
    let total_seconds = seconds as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// `MM:SS` position inside a video; minutes keep counting past the hour
pub fn format_timestamp(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// Map a language name or regional code to the two-letter code speech models expect
pub fn normalize_language_code(lang: &str) -> String {
    let lower = lang.trim().to_lowercase();
    let normalized = match lower.as_str() {
        "en" | "english" | "en-us" | "en-gb" => "en",
        "es" | "spanish" | "es-es" => "es",
        "fr" | "french" | "fr-fr" => "fr",
        "de" | "german" | "de-de" => "de",
        "it" | "italian" | "it-it" => "it",
        "pt" | "portuguese" | "pt-br" | "pt-pt" => "pt",
        "ja" | "japanese" | "ja-jp" => "ja",
        "ko" | "korean" | "ko-kr" => "ko",
        "zh" | "chinese" | "zh-cn" => "zh",
        "ar" | "arabic" | "ar-sa" => "ar",
        "hi" | "hindi" | "hi-in" => "hi",
        "ru" | "russian" | "ru-ru" => "ru",
        _ => return lower,
    };

    normalized.to_string()
}

/// Check if the current environment has required tools
pub async fn check_dependencies(yt_dlp_path: &str) -> Vec<String> {
    let mut missing = Vec::new();

    if !check_command_available(yt_dlp_path).await {
        missing.push(format!("{} - required to resolve and download videos", yt_dlp_path));
    }

    // Only the local whisper backend decodes audio itself
    if cfg!(feature = "whisper") && !check_command_available("ffmpeg").await {
        missing.push("ffmpeg - required by the whisper speech backend".to_string());
    }

    missing
}

/// Check if a command is available in PATH
pub async fn check_command_available(command: &str) -> bool {
    use tokio::process::Command;

    Command::new(command)
        .arg("--version")
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}
