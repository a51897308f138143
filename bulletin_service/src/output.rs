/// Report persistence, speech synthesis, and repeater playback config.
///
/// Each report lands in `{dir}/{id}.txt`. With speech enabled it is then
/// spoken by `flite` into `{id}.source.wav`, resampled by `sox` to the
/// 8 kHz mono `{id}.wav` Asterisk can play, and the intermediate wav is
/// removed. File names are keyed by source id, so workers for different
/// sources never touch the same files.

use crate::config::{Configuration, SpeechSettings};
use crate::logging::{self, DataSource};
use crate::model::Report;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Cannot write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{program} failed for {id}: {detail}")]
    Command {
        program: String,
        id: String,
        detail: String,
    },
}

/// Receives every finished report. Called concurrently from workers.
pub trait ReportSink: Sync {
    fn deliver(&self, report: &Report) -> Result<(), OutputError>;
}

/// Writes text files and, when configured, the spoken audio.
pub struct SpeechOutput {
    dir: PathBuf,
    speech: Option<SpeechSettings>,
}

impl SpeechOutput {
    pub fn new(dir: impl Into<PathBuf>, speech: Option<SpeechSettings>) -> Self {
        Self {
            dir: dir.into(),
            speech,
        }
    }

    /// Honors `settings.speech.enabled` unless `text_only` forces it off.
    pub fn from_config(config: &Configuration, text_only: bool) -> Self {
        let speech = &config.settings.speech;
        let speech = (speech.enabled && !text_only).then(|| speech.clone());
        Self::new(config.output_dir(), speech)
    }

    pub fn text_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.txt", id))
    }

    fn source_wav_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.source.wav", id))
    }

    pub fn wav_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.wav", id))
    }

    fn write_text(&self, report: &Report) -> Result<(), OutputError> {
        let path = self.text_path(&report.source_id);
        logging::debug(
            DataSource::Output,
            Some(&report.source_id),
            &format!("Writing {}", path.display()),
        );
        std::fs::write(&path, &report.text).map_err(|source| OutputError::Io { path, source })
    }

    fn synthesize(&self, speech: &SpeechSettings, id: &str) -> Result<(), OutputError> {
        let text = self.text_path(id);
        let source_wav = self.source_wav_path(id);

        let mut flite = Command::new(&speech.flite);
        flite
            .arg("-f")
            .arg(&text)
            .arg("-o")
            .arg(&source_wav)
            .arg("-voice")
            .arg(&speech.voice);
        run(&mut flite, &speech.flite, id)?;

        let wav = self.wav_path(id);
        let mut sox = Command::new(&speech.sox);
        sox.arg(&source_wav)
            .args(["-r", "8k", "-c", "1"])
            .arg(&wav);
        run(&mut sox, &speech.sox, id)?;

        std::fs::remove_file(&source_wav).map_err(|source| OutputError::Io {
            path: source_wav,
            source,
        })
    }
}

impl ReportSink for SpeechOutput {
    fn deliver(&self, report: &Report) -> Result<(), OutputError> {
        self.write_text(report)?;
        if let Some(speech) = &self.speech {
            self.synthesize(speech, &report.source_id)?;
        }
        Ok(())
    }
}

fn run(command: &mut Command, program: &str, id: &str) -> Result<(), OutputError> {
    let output = command.output().map_err(|e| OutputError::Command {
        program: program.to_string(),
        id: id.to_string(),
        detail: e.to_string(),
    })?;

    if !output.status.success() {
        return Err(OutputError::Command {
            program: program.to_string(),
            id: id.to_string(),
            detail: format!(
                "{}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }

    logging::debug(
        DataSource::Output,
        Some(id),
        &format!("{} ok: {}", program, String::from_utf8_lossy(&output.stdout).trim()),
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Repeater playback conf
// ---------------------------------------------------------------------------

/// One `code=playback,path` line per source, gauges then stations.
pub fn render_playback_conf(config: &Configuration) -> String {
    let playback_dir = config.settings.playback_dir.trim_end_matches('/');
    let mut conf = String::new();

    for gauge in &config.usgsriver.gauges {
        let code = gauge.cmd_code.for_conf();
        let _ = writeln!(conf, "{}=playback,{}/{}", code, playback_dir, gauge.id);
    }
    for station in &config.wxunder.stations {
        let code = station.cmd_code.for_conf();
        let _ = writeln!(conf, "{}=playback,{}/{}", code, playback_dir, station.id);
    }

    conf
}

/// Replaces the playback conf in the output directory and returns its path.
pub fn write_playback_conf(config: &Configuration) -> Result<PathBuf, OutputError> {
    let path = Path::new(&config.settings.relative_outputdir).join(&config.settings.conf_filename);
    logging::info(DataSource::Output, None, &format!("Writing {}", path.display()));

    std::fs::write(&path, render_playback_conf(config)).map_err(|source| OutputError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
