use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc;

use super::models::{EngineOptions, EngineOutput, PostProcessor, RawProgress};
use super::{EngineError, MediaEngine, Result};

const PROGRESS_MARKER: &str = "[smd-progress]";
const SAVED_MARKER: &str = "[smd-saved]";
const STDERR_TAIL: usize = 20;

/// Drives the `yt-dlp` executable as a child process.
#[derive(Debug, Clone)]
pub struct YtDlpEngine {
    binary: PathBuf,
    ffmpeg_location: Option<PathBuf>,
}

/// One line of engine output after decoding.
#[derive(Debug, Clone, PartialEq)]
enum EngineLine {
    Progress(RawProgress),
    Saved(PathBuf),
    Text(String),
}

#[derive(Debug, Clone, Copy)]
enum Source {
    Stdout,
    Stderr,
}

impl YtDlpEngine {
    pub fn new(binary: PathBuf, ffmpeg_location: Option<PathBuf>) -> Self {
        Self {
            binary,
            ffmpeg_location,
        }
    }

    fn build_args(&self, urls: &[String], options: &EngineOptions) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-f".into(),
            options.format.as_str().into(),
            "-o".into(),
            options.output_template.clone(),
        ];

        if options.quiet {
            args.push("--quiet".into());
        }
        if options.no_warnings {
            args.push("--no-warnings".into());
        }

        // Progress lines survive --quiet only with --progress.
        args.extend(
            [
                "--progress",
                "--newline",
                "--no-colors",
                "--no-playlist",
                "--progress-template",
            ]
            .map(String::from),
        );
        args.push(format!("download:{}%(progress)j", PROGRESS_MARKER));
        args.push("--print".into());
        args.push(format!("after_move:{}%(filepath)s", SAVED_MARKER));
        args.push("--no-simulate".into());

        if let Some(location) = &self.ffmpeg_location {
            args.push("--ffmpeg-location".into());
            args.push(location.to_string_lossy().into_owned());
        }

        for post_processor in &options.post_processors {
            match post_processor {
                PostProcessor::ExtractAudio {
                    codec,
                    bitrate_kbps,
                } => {
                    args.extend([
                        "-x".into(),
                        "--audio-format".into(),
                        codec.clone(),
                        "--audio-quality".into(),
                        format!("{}K", bitrate_kbps),
                    ]);
                }
            }
        }

        args.push("--".into());
        args.extend(urls.iter().cloned());
        args
    }
}

fn parse_line(line: &str) -> EngineLine {
    if let Some(pos) = line.find(PROGRESS_MARKER) {
        let payload = &line[pos + PROGRESS_MARKER.len()..];
        match serde_json::from_str::<RawProgress>(payload.trim()) {
            Ok(progress) => return EngineLine::Progress(progress),
            Err(e) => tracing::debug!("Skipping progress line: {}", e),
        }
    } else if let Some(path) = line.strip_prefix(SAVED_MARKER) {
        return EngineLine::Saved(PathBuf::from(path.trim()));
    }
    EngineLine::Text(line.to_string())
}

/// Boils the collected stderr down to the text worth classifying.
fn failure_text(stderr_tail: &VecDeque<String>, status: ExitStatus) -> String {
    let errors: Vec<&str> = stderr_tail
        .iter()
        .map(String::as_str)
        .filter(|line| line.starts_with("ERROR:"))
        .collect();

    if !errors.is_empty() {
        return errors.join("\n");
    }
    if !stderr_tail.is_empty() {
        return stderr_tail.iter().cloned().collect::<Vec<_>>().join("\n");
    }
    format!("yt-dlp exited with {}", status)
}

/// Kills and reaps the child unless it was waited on, so an unwinding
/// progress callback cannot leave yt-dlp running.
struct ChildGuard(Option<Child>);

impl ChildGuard {
    fn wait(mut self) -> std::io::Result<ExitStatus> {
        match self.0.take() {
            Some(mut child) => child.wait(),
            None => Err(std::io::Error::other("child already reaped")),
        }
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if let Some(mut child) = self.0.take() {
            tracing::warn!(pid = child.id(), "Killing abandoned yt-dlp process");
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

fn forward_lines<R: Read + Send + 'static>(
    reader: R,
    source: Source,
    tx: mpsc::Sender<(Source, String)>,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        for line in BufReader::new(reader).lines() {
            let line = match line {
                Ok(line) => line,
                // Undecodable bytes in a title must not end the stream.
                Err(e) if e.kind() == std::io::ErrorKind::InvalidData => continue,
                Err(_) => break,
            };
            if tx.send((source, line)).is_err() {
                break;
            }
        }
    })
}

impl MediaEngine for YtDlpEngine {
    fn download(
        &self,
        urls: &[String],
        options: &EngineOptions,
        on_progress: &mut dyn FnMut(RawProgress),
    ) -> Result<EngineOutput> {
        let args = self.build_args(urls, options);
        tracing::debug!(binary = %self.binary.display(), ?args, "Launching engine");

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| EngineError::Launch {
                program: self.binary.display().to_string(),
                source,
            })?;

        let (tx, rx) = mpsc::channel();
        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(forward_lines(stdout, Source::Stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(forward_lines(stderr, Source::Stderr, tx.clone()));
        }
        drop(tx);
        let child = ChildGuard(Some(child));

        let mut output = EngineOutput::default();
        let mut stderr_tail = VecDeque::with_capacity(STDERR_TAIL);

        // Drained on this thread so progress callbacks stay on the caller's stack.
        for (source, line) in rx {
            match parse_line(&line) {
                EngineLine::Progress(progress) => on_progress(progress),
                EngineLine::Saved(path) => output.saved_files.push(path),
                EngineLine::Text(text) => {
                    tracing::debug!("yt-dlp: {}", text);
                    if let Source::Stderr = source {
                        if stderr_tail.len() == STDERR_TAIL {
                            stderr_tail.pop_front();
                        }
                        stderr_tail.push_back(text);
                    }
                }
            }
        }

        for reader in readers {
            let _ = reader.join();
        }

        let status = child.wait()?;
        if status.success() {
            Ok(output)
        } else {
            Err(EngineError::Failed(failure_text(&stderr_tail, status)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ErrorKind, FormatSpec};
    use crate::engine::RawStatus;
    use std::path::Path;

    fn engine() -> YtDlpEngine {
        YtDlpEngine::new(PathBuf::from("yt-dlp"), None)
    }

    #[test]
    fn test_build_args_video() {
        let options = EngineOptions::new(
            FormatSpec::new("bestvideo+bestaudio[ext=m4a]/best[ext=mp4]/best"),
            Path::new("/tmp/out"),
        );
        let args = engine().build_args(&["https://valid.example/video".into()], &options);

        assert_eq!(args[0], "-f");
        assert_eq!(args[1], "bestvideo+bestaudio[ext=m4a]/best[ext=mp4]/best");
        assert_eq!(args[2], "-o");
        assert_eq!(args[3], "/tmp/out/%(title)s.%(ext)s");
        assert!(args.contains(&"--quiet".to_string()));
        assert!(args.contains(&"--no-warnings".to_string()));
        assert!(args.contains(&"--progress".to_string()));
        assert!(!args.contains(&"-x".to_string()));
        assert_eq!(args.last().unwrap(), "https://valid.example/video");
        assert_eq!(args[args.len() - 2], "--");
    }

    #[test]
    fn test_build_args_audio_and_ffmpeg_location() {
        let engine = YtDlpEngine::new(PathBuf::from("yt-dlp"), Some(PathBuf::from("/opt/ffmpeg")));
        let options = EngineOptions::new(FormatSpec::new("bestaudio/best"), Path::new("/tmp/out"))
            .with_post_processors(vec![PostProcessor::ExtractAudio {
                codec: "mp3".into(),
                bitrate_kbps: 192,
            }]);
        let args = engine.build_args(&["u".into()], &options);
        let joined = args.join(" ");

        assert!(joined.contains("-x --audio-format mp3 --audio-quality 192K"));
        assert!(joined.contains("--ffmpeg-location /opt/ffmpeg"));
    }

    #[test]
    fn test_parse_progress_line() {
        let line = r#"[smd-progress]{"status": "downloading", "downloaded_bytes": 1024, "total_bytes": 4096, "_percent_str": " 25.0%", "_speed_str": "1.00MiB/s", "eta": 3}"#;
        match parse_line(line) {
            EngineLine::Progress(progress) => {
                assert_eq!(progress.status, RawStatus::Downloading);
                assert_eq!(progress.downloaded_bytes, Some(1024.0));
                assert_eq!(progress.total_bytes, Some(4096.0));
                assert_eq!(progress.speed_display.as_deref(), Some("1.00MiB/s"));
            }
            other => panic!("unexpected line: {:?}", other),
        }
    }

    #[test]
    fn test_parse_finished_and_null_fields() {
        let line = r#"[smd-progress]{"status": "finished", "total_bytes": null, "downloaded_bytes": 4096}"#;
        assert_eq!(
            parse_line(line),
            EngineLine::Progress(RawProgress {
                downloaded_bytes: Some(4096.0),
                ..RawProgress::finished()
            })
        );
    }

    #[test]
    fn test_parse_unknown_status_is_text() {
        let line = r#"[smd-progress]{"status": "error"}"#;
        assert!(matches!(parse_line(line), EngineLine::Text(_)));
    }

    #[test]
    fn test_parse_saved_line() {
        assert_eq!(
            parse_line("[smd-saved]/tmp/out/Clip.mp4"),
            EngineLine::Saved(PathBuf::from("/tmp/out/Clip.mp4"))
        );
        assert_eq!(
            parse_line("[youtube] abc: Downloading webpage"),
            EngineLine::Text("[youtube] abc: Downloading webpage".into())
        );
    }

    #[test]
    fn test_launch_failure_is_reported() {
        let engine = YtDlpEngine::new(PathBuf::from("/nonexistent/smd-yt-dlp"), None);
        let options = EngineOptions::new(FormatSpec::new("best"), Path::new("/tmp"));
        let result = engine.download(&["u".into()], &options, &mut |_: RawProgress| {});
        assert!(matches!(result, Err(EngineError::Launch { .. })));
    }

    #[cfg(unix)]
    fn fake_engine(dir: &Path, body: &str) -> YtDlpEngine {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("yt-dlp");
        std::fs::write(&script, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        YtDlpEngine::new(script, None)
    }

    #[cfg(unix)]
    fn run(engine: &YtDlpEngine) -> (Result<EngineOutput>, Vec<RawProgress>) {
        let options = EngineOptions::new(FormatSpec::new("best"), Path::new("/tmp/out"));
        let mut seen = Vec::new();
        let result = engine.download(
            &["https://valid.example/video".into()],
            &options,
            &mut |raw: RawProgress| seen.push(raw),
        );
        (result, seen)
    }

    #[cfg(unix)]
    #[test]
    fn test_child_progress_and_saved_path() {
        let dir = tempfile::tempdir().unwrap();
        let engine = fake_engine(
            dir.path(),
            r#"echo '[youtube] abc: Downloading webpage'
echo '[smd-progress]{"status": "downloading", "downloaded_bytes": 10, "total_bytes": 100}'
echo '[smd-progress]{"status": "finished", "downloaded_bytes": 100, "total_bytes": 100}'
echo '[smd-saved]/tmp/out/Clip.mp4'"#,
        );

        let (result, seen) = run(&engine);
        let output = result.unwrap();
        assert_eq!(
            seen.iter().map(|raw| raw.status).collect::<Vec<_>>(),
            vec![RawStatus::Downloading, RawStatus::Finished]
        );
        assert_eq!(seen[0].downloaded_bytes, Some(10.0));
        assert_eq!(output.saved_files, vec![PathBuf::from("/tmp/out/Clip.mp4")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_child_error_line_picked_from_noisy_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let engine = fake_engine(
            dir.path(),
            r#"i=0
while [ $i -lt 30 ]; do echo "noise line $i" >&2; i=$((i+1)); done
echo 'ERROR: [generic] Unsupported URL: https://nope.example/' >&2
exit 1"#,
        );

        match run(&engine).0 {
            Err(EngineError::Failed(text)) => {
                assert_eq!(text, "ERROR: [generic] Unsupported URL: https://nope.example/");
                assert_eq!(ErrorKind::classify(&text), ErrorKind::UnsupportedSource);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_child_silent_failure_reports_exit_status() {
        let dir = tempfile::tempdir().unwrap();
        let engine = fake_engine(dir.path(), "exit 3");

        match run(&engine).0 {
            Err(EngineError::Failed(text)) => {
                assert_eq!(text, "yt-dlp exited with exit status: 3")
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_panicking_callback_kills_child() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("still-running");
        let engine = fake_engine(
            dir.path(),
            &format!(
                r#"echo '[smd-progress]{{"status": "downloading", "downloaded_bytes": 1}}'
sleep 1
touch '{}'"#,
                marker.display()
            ),
        );
        let options = EngineOptions::new(FormatSpec::new("best"), Path::new("/tmp/out"));

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            engine.download(&["u".into()], &options, &mut |_: RawProgress| {
                panic!("observer failed")
            })
        }));
        assert!(outcome.is_err());

        std::thread::sleep(std::time::Duration::from_millis(1500));
        assert!(!marker.exists());
    }
}
