//! One-shot diagnostics: environment report plus a detection snapshot.
//!
//! The snapshot is a pure read of the current screen and audio-session
//! state. It builds its own throwaway collaborators, never touches the
//! watcher's state, and never actuates; running it twice in a row changes
//! nothing.

use crate::actuate::SessionBackend;
use crate::config::AppConfig;
use crate::detect::classify;
use crate::vision::{match_single, Frame, FrameSource, ReferenceImage, ReferenceLibrary};
use crate::{crash_log_path, log_file_path};
use serde::Serialize;
use std::{env, fmt::Display};

pub struct DoctorReport {
    lines: Vec<String>,
}

impl DoctorReport {
    pub fn new(title: &str) -> Self {
        Self {
            lines: vec![title.to_string()],
        }
    }

    pub fn section(&mut self, title: &str) {
        self.lines.push(String::new());
        self.lines.push(format!("{title}:"));
    }

    pub fn push_kv(&mut self, key: &str, value: impl Display) {
        self.lines.push(format!("  {key}: {value}"));
    }

    pub fn push_line(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn render(&self) -> String {
        self.lines.join("\n")
    }
}

/// Per-reference-image status: does the file exist and load, and how well
/// does it match the frame captured for this snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceDiagnostic {
    pub name: String,
    pub path: String,
    pub loaded: bool,
    pub confidence: Option<f32>,
    pub matched: bool,
}

/// Read-only snapshot of everything an operator needs to debug detection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticSnapshot {
    pub mute_method: String,
    pub target_process: String,
    pub confidence_threshold: f32,
    pub session_found: bool,
    pub session_names: Vec<String>,
    pub capture_ok: bool,
    pub audio_state: String,
    pub ad_references: Vec<ReferenceDiagnostic>,
    pub volume_references: Vec<ReferenceDiagnostic>,
}

/// Collect a snapshot against a freshly captured frame.
pub fn collect_snapshot(
    config: &AppConfig,
    library: &ReferenceLibrary,
    source: &mut dyn FrameSource,
    backend: &mut dyn SessionBackend,
) -> DiagnosticSnapshot {
    let session_names = backend.session_names().unwrap_or_default();
    let session_found = backend
        .find_session(&config.process)
        .ok()
        .flatten()
        .is_some();

    let frame = source
        .capture()
        .ok()
        .filter(|frame| frame.width() > 0 && frame.height() > 0);
    let capture_ok = frame.is_some();

    let ad_references = reference_diagnostics(
        library.ad_records().iter().map(|r| (r.path.clone(), r.loaded)),
        library.ads(),
        frame.as_ref(),
        config.confidence,
    );

    let volume = library.volume();
    let volume_refs: Vec<Option<&ReferenceImage>> = vec![volume.unmuted(), volume.muted()];
    let mut volume_references = Vec::new();
    for (index, reference) in volume_refs.iter().enumerate() {
        let record = library.volume_records().get(index);
        let (path, loaded) = match record {
            Some(record) => (record.path.display().to_string(), record.loaded),
            None => (String::new(), reference.is_some()),
        };
        let confidence = match (reference, frame.as_ref()) {
            (Some(reference), Some(frame)) => {
                Some(match_single(frame, reference, config.confidence).confidence)
            }
            _ => None,
        };
        volume_references.push(ReferenceDiagnostic {
            name: reference.map_or_else(
                || if index == 0 { "volume" } else { "mute" }.to_string(),
                |r| r.name().to_string(),
            ),
            path,
            loaded,
            matched: confidence.map_or(false, |c| c >= config.confidence),
            confidence,
        });
    }

    let unmuted_conf = volume_references[0].confidence.unwrap_or(0.0);
    let muted_conf = volume_references[1].confidence.unwrap_or(0.0);
    let audio_state = classify(muted_conf, unmuted_conf, config.confidence);

    DiagnosticSnapshot {
        mute_method: config.mute_method.label().to_string(),
        target_process: config.process.clone(),
        confidence_threshold: config.confidence,
        session_found,
        session_names,
        capture_ok,
        audio_state: audio_state.label().to_string(),
        ad_references,
        volume_references,
    }
}

fn reference_diagnostics(
    records: impl Iterator<Item = (std::path::PathBuf, bool)>,
    loaded_refs: &[ReferenceImage],
    frame: Option<&Frame>,
    threshold: f32,
) -> Vec<ReferenceDiagnostic> {
    let mut diagnostics = Vec::new();
    let mut loaded_index = 0;
    for (path, loaded) in records {
        let reference = loaded.then(|| &loaded_refs[loaded_index]);
        if loaded {
            loaded_index += 1;
        }
        let confidence = match (reference, frame) {
            (Some(reference), Some(frame)) => {
                Some(match_single(frame, reference, threshold).confidence)
            }
            _ => None,
        };
        diagnostics.push(ReferenceDiagnostic {
            name: reference.map_or_else(
                || {
                    path.file_stem()
                        .map(|stem| stem.to_string_lossy().into_owned())
                        .unwrap_or_default()
                },
                |r| r.name().to_string(),
            ),
            path: path.display().to_string(),
            loaded,
            matched: confidence.map_or(false, |c| c >= threshold),
            confidence,
        });
    }
    // A library assembled without records (tests, probes) still reports its
    // loaded references.
    if diagnostics.is_empty() {
        for reference in loaded_refs {
            let confidence =
                frame.map(|frame| match_single(frame, reference, threshold).confidence);
            diagnostics.push(ReferenceDiagnostic {
                name: reference.name().to_string(),
                path: String::new(),
                loaded: true,
                matched: confidence.map_or(false, |c| c >= threshold),
                confidence,
            });
        }
    }
    diagnostics
}

/// Environment + config half of the report, shared by `--doctor` and the
/// menu's Diagnose entry.
pub fn base_doctor_report(config: &AppConfig, binary_name: &str) -> DoctorReport {
    let mut report = DoctorReport::new("AdHush Doctor");
    report.push_kv("version", env!("CARGO_PKG_VERSION"));
    report.push_kv("binary", binary_name);
    report.push_kv("os", format!("{}/{}", env::consts::OS, env::consts::ARCH));

    report.section("Config");
    report.push_kv("images_dir", config.images_dir.display());
    report.push_kv("process", &config.process);
    report.push_kv("mute_method", config.mute_method.label());
    report.push_kv("confidence", config.confidence);
    report.push_kv(
        "poll_intervals",
        format!("{}ms (ad) / {}ms (idle)", config.fast_poll_ms, config.slow_poll_ms),
    );
    report.push_kv("menu", if config.no_menu { "disabled" } else { "enabled" });
    let logs_enabled = config.logs && !config.no_logs;
    report.push_kv("logs", if logs_enabled { "enabled" } else { "disabled" });
    report.push_kv("log_file", log_file_path().display());
    report.push_kv("crash_log", crash_log_path().display());

    report
}

/// Append the detection snapshot sections to a report.
pub fn append_snapshot(report: &mut DoctorReport, snapshot: &DiagnosticSnapshot) {
    report.section("Audio");
    report.push_kv("mute_method", &snapshot.mute_method);
    report.push_kv("target_process", &snapshot.target_process);
    report.push_kv("session_found", snapshot.session_found);
    if snapshot.session_names.is_empty() {
        report.push_kv("sessions", "none");
    } else {
        report.push_line("  sessions:");
        for name in &snapshot.session_names {
            report.push_line(format!("    - {name}"));
        }
    }

    report.section("Screen");
    report.push_kv("capture", if snapshot.capture_ok { "ok" } else { "failed" });
    report.push_kv("audio_state", &snapshot.audio_state);

    report.section("References");
    report.push_kv("threshold", snapshot.confidence_threshold);
    for (label, group) in [
        ("ad", &snapshot.ad_references),
        ("volume", &snapshot.volume_references),
    ] {
        if group.is_empty() {
            report.push_kv(label, "none");
            continue;
        }
        for reference in group.iter() {
            let confidence = reference
                .confidence
                .map_or_else(|| "n/a".to_string(), |c| format!("{c:.2}"));
            report.push_line(format!(
                "  [{label}] {} loaded={} confidence={} matched={}",
                reference.name, reference.loaded, confidence, reference.matched
            ));
        }
    }
}
