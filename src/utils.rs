// utils.rs - FFmpeg/FFprobe process helpers
use std::process::Command;

/// Execute an FFmpeg command and return its raw stdout.
pub fn execute_ffmpeg_command(mut command: Command) -> Result<Vec<u8>, String> {
    tracing::trace!("Executing FFmpeg: {:?}", command);

    let output = command
        .output()
        .map_err(|e| format!("Failed to execute FFmpeg: {}", e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("FFmpeg error: {}", stderr.trim()));
    }

    Ok(output.stdout)
}

/// Execute FFprobe for media analysis
pub fn execute_ffprobe_command(args: &[&str]) -> Result<String, String> {
    let output = Command::new("ffprobe")
        .args(args)
        .output()
        .map_err(|e| format!("Failed to execute FFprobe: {}", e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("FFprobe error: {}", stderr.trim()));
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Check if FFmpeg and FFprobe are available
pub fn check_ffmpeg_available() -> Result<(), String> {
    Command::new("ffmpeg")
        .args(["-version"])
        .output()
        .map_err(|_| "FFmpeg not found. Please install FFmpeg.")?;

    Command::new("ffprobe")
        .args(["-version"])
        .output()
        .map_err(|_| "FFprobe not found. Please install FFmpeg with FFprobe.")?;

    Ok(())
}

/// Parse the first line of ffprobe `csv=p=0` output as a frame count.
/// `N/A` and empty output yield `None`.
pub fn parse_frame_count(output: &str) -> Option<u64> {
    output
        .lines()
        .map(|line| line.trim().trim_end_matches(','))
        .find(|line| !line.is_empty())
        .and_then(|line| line.parse::<u64>().ok())
}

/// Parse an ffprobe frame rate such as `30000/1001` or `25`. Zero and
/// unknown (`0/0`) rates yield `None`.
pub fn parse_frame_rate(output: &str) -> Option<f64> {
    let line = output
        .lines()
        .map(|line| line.trim().trim_end_matches(','))
        .find(|line| !line.is_empty())?;
    let fps = match line.split_once('/') {
        Some((num, den)) => {
            let den: f64 = den.parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num.parse::<f64>().ok()? / den
        }
        None => line.parse().ok()?,
    };
    (fps.is_finite() && fps > 0.0).then_some(fps)
}

/// Lower-cased extension of a declared filename, without the dot.
/// Names without a dot have no extension.
pub fn file_extension(filename: &str) -> String {
    match filename.rsplit_once('.') {
        Some((_, ext)) => ext.to_lowercase(),
        None => String::new(),
    }
}
