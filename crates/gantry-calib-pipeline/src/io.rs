//! Loaders for the raw take files and small JSON side files.
//!
//! Motion-capture exports start with a metadata line of `key,value` pairs,
//! followed by a multi-row header and one row per frame. Blank lines are
//! ignored throughout. Among the remaining lines, 1, 2, 4 and 5 (0-based)
//! hold the column type, name, quantity ("Position" or "Rotation") and
//! axis. The first two columns are frame and time.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail, ensure};
use chrono::{Local, NaiveDateTime, TimeZone};
use gantry_calib_core::{
    AlignmentParams, BadFrameRanges, CalibrationParams, MarkerCapture, PositionSeries, Real, Vec3,
    undefined_vec3,
};
use log::info;
use serde::{Deserialize, Serialize};

use crate::sync::SyncedDataset;

const START_TIME_FORMAT: &str = "%Y-%m-%d %I.%M.%S%.f %p";

/// Take metadata from the first line of a motion-capture export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MocapMetadata {
    pub take_name: String,
    pub capture_frame_rate: Real,
    pub export_frame_rate: Real,
    pub capture_start_frame: i64,
    pub total_frames: usize,
    pub total_exported_frames: usize,
    /// Wall-clock start of the capture, as recorded (no zone).
    pub capture_start_time: NaiveDateTime,
}

impl MocapMetadata {
    /// Parse the metadata line.
    ///
    /// The start time is written on a 12-hour clock without AM/PM; the
    /// marker is taken from the end of the take name.
    pub fn parse(line: &str) -> Result<Self> {
        let items: Vec<&str> = line.split(',').map(clean_cell).collect();
        let fields: HashMap<&str, &str> = items
            .chunks(2)
            .filter_map(|kv| match kv {
                [k, v] if !k.is_empty() => Some((*k, *v)),
                _ => None,
            })
            .collect();
        let get = |key: &str| {
            fields
                .get(key)
                .copied()
                .ok_or_else(|| anyhow!("metadata field '{key}' is missing"))
        };
        let number = |key: &str| -> Result<Real> {
            get(key)?
                .parse()
                .with_context(|| format!("metadata field '{key}' is not a number"))
        };
        let integer = |key: &str| -> Result<i64> {
            get(key)?
                .parse()
                .with_context(|| format!("metadata field '{key}' is not an integer"))
        };

        let take_name = get("Take Name")?.to_string();
        let meridiem = if take_name.ends_with("PM") { "PM" } else { "AM" };
        let start = format!("{} {meridiem}", get("Capture Start Time")?);
        let capture_start_time = NaiveDateTime::parse_from_str(&start, START_TIME_FORMAT)
            .with_context(|| format!("invalid capture start time '{start}'"))?;

        Ok(Self {
            take_name,
            capture_frame_rate: number("Capture Frame Rate")?,
            export_frame_rate: number("Export Frame Rate")?,
            capture_start_frame: integer("Capture Start Frame")?,
            total_frames: usize::try_from(integer("Total Frames in Take")?)?,
            total_exported_frames: usize::try_from(integer("Total Exported Frames")?)?,
            capture_start_time,
        })
    }

    /// Capture start as a Unix timestamp, reading the wall clock in the
    /// local time zone.
    pub fn capture_start_timestamp(&self) -> Result<Real> {
        let local = Local
            .from_local_datetime(&self.capture_start_time)
            .earliest()
            .ok_or_else(|| {
                anyhow!(
                    "capture start time {} does not exist in the local time zone",
                    self.capture_start_time
                )
            })?;
        Ok(local.timestamp_micros() as Real / 1e6)
    }
}

/// A parsed motion-capture export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MocapTake {
    pub metadata: MocapMetadata,
    pub capture: MarkerCapture,
}

fn clean_cell(cell: &str) -> &str {
    cell.trim().trim_matches('"')
}

fn split_row(line: &str) -> Vec<&str> {
    line.split(',').map(clean_cell).collect()
}

/// Parse a numeric cell; empty cells are undefined.
fn parse_value(cell: &str, line_no: usize) -> Result<Real> {
    if cell.is_empty() {
        return Ok(Real::NAN);
    }
    cell.parse()
        .with_context(|| format!("line {line_no}: '{cell}' is not a number"))
}

fn axis_index(axis: &str) -> Option<usize> {
    match axis {
        "X" | "x" => Some(0),
        "Y" | "y" => Some(1),
        "Z" | "z" => Some(2),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy)]
enum Column {
    RigidBody(usize),
    Raw { marker: usize, axis: usize },
    Fitted { marker: usize, axis: usize },
}

/// Parse a motion-capture export held in memory.
///
/// Keeps the positions of `rigid_body` (the first rigid body in the file
/// when `None`), its raw markers `<name>:Marker<n>` and the matching
/// rigid-body markers.
pub fn parse_mocap_csv(text: &str, rigid_body: Option<&str>) -> Result<MocapTake> {
    let lines: Vec<(usize, &str)> = text
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l))
        .filter(|(_, l)| !l.trim().is_empty())
        .collect();
    ensure!(lines.len() >= 6, "motion capture file has an incomplete header");

    let metadata = MocapMetadata::parse(lines[0].1)?;
    let types = split_row(lines[1].1);
    let names = split_row(lines[2].1);
    let kinds = split_row(lines[4].1);
    let axes = split_row(lines[5].1);
    let width = [types.len(), names.len(), kinds.len(), axes.len()]
        .into_iter()
        .min()
        .unwrap_or(0);
    ensure!(width > 2, "motion capture file has no position columns");

    let rb_name = match rigid_body {
        Some(name) => name.to_string(),
        None => {
            info!("found rigid body name: {}", names[2]);
            names[2].to_string()
        }
    };
    let marker_prefix = format!("{rb_name}:Marker");

    let mut columns = Vec::new();
    let (mut raw_count, mut fitted_count) = (0, 0);
    for c in 2..width {
        if kinds[c] != "Position" {
            continue;
        }
        let axis = axis_index(axes[c])
            .ok_or_else(|| anyhow!("column {c}: unknown axis '{}'", axes[c]))?;
        if names[c] == rb_name {
            columns.push((c, Column::RigidBody(axis)));
        } else if let Some(n) = names[c].strip_prefix(&marker_prefix) {
            let Ok(marker) = n.parse::<usize>() else {
                continue;
            };
            ensure!(marker > 0, "column {c}: marker numbers start at 1");
            match types[c] {
                "Marker" => {
                    raw_count = raw_count.max(marker);
                    columns.push((c, Column::Raw { marker, axis }));
                }
                "Rigid Body Marker" => {
                    fitted_count = fitted_count.max(marker);
                    columns.push((c, Column::Fitted { marker, axis }));
                }
                other => bail!("column {c}: unknown column type '{other}'"),
            }
        }
    }
    ensure!(
        columns.iter().any(|(_, col)| matches!(col, Column::RigidBody(_))),
        "rigid body '{rb_name}' has no position columns"
    );

    let mut frame = Vec::new();
    let mut time = Vec::new();
    let mut rb = Vec::new();
    let mut raw: Vec<Vec<Vec3>> = vec![Vec::new(); raw_count];
    let mut fitted: Vec<Vec<Vec3>> = vec![Vec::new(); fitted_count];

    for &(line_no, line) in &lines[6..] {
        let cells = split_row(line);
        let cell = |c: usize| cells.get(c).copied().unwrap_or("");
        frame.push(
            cell(0)
                .parse::<usize>()
                .with_context(|| format!("line {line_no}: invalid frame '{}'", cell(0)))?,
        );
        time.push(parse_value(cell(1), line_no)?);
        rb.push(undefined_vec3());
        raw.iter_mut().for_each(|m| m.push(undefined_vec3()));
        fitted.iter_mut().for_each(|m| m.push(undefined_vec3()));

        let row = frame.len() - 1;
        for &(c, col) in &columns {
            let v = parse_value(cell(c), line_no)?;
            match col {
                Column::RigidBody(axis) => rb[row][axis] = v,
                Column::Raw { marker, axis } => raw[marker - 1][row][axis] = v,
                Column::Fitted { marker, axis } => fitted[marker - 1][row][axis] = v,
            }
        }
    }

    let capture = MarkerCapture::new(rb_name, frame, time, rb, raw, fitted)?;
    info!(
        "loaded {} capture frames with {} markers",
        capture.len(),
        capture.marker_count()
    );
    Ok(MocapTake { metadata, capture })
}

/// Load a motion-capture export from disk.
pub fn load_mocap_csv(path: impl AsRef<Path>, rigid_body: Option<&str>) -> Result<MocapTake> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_mocap_csv(&text, rigid_body).with_context(|| format!("in {}", path.display()))
}

/// Parse a gantry log with a header naming at least `time`, `x`, `y`, `z`.
/// Other columns are ignored.
pub fn parse_gantry_csv(text: &str) -> Result<PositionSeries> {
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l))
        .filter(|(_, l)| !l.trim().is_empty());
    let (_, header) = lines.next().ok_or_else(|| anyhow!("gantry log is empty"))?;
    let header = split_row(header);
    let find = |name: &str| {
        header
            .iter()
            .position(|h| *h == name)
            .ok_or_else(|| anyhow!("gantry log has no '{name}' column"))
    };
    let cols = [find("time")?, find("x")?, find("y")?, find("z")?];

    let mut time = Vec::new();
    let mut points = Vec::new();
    for (line_no, line) in lines {
        let cells = split_row(line);
        let mut v = [0.0; 4];
        for (slot, &c) in v.iter_mut().zip(&cols) {
            *slot = parse_value(cells.get(c).copied().unwrap_or(""), line_no)?;
        }
        time.push(v[0]);
        points.push(Vec3::new(v[1], v[2], v[3]));
    }
    info!("loaded {} gantry samples", time.len());
    Ok(PositionSeries::single(time, points)?)
}

pub fn load_gantry_csv(path: impl AsRef<Path>) -> Result<PositionSeries> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_gantry_csv(&text).with_context(|| format!("in {}", path.display()))
}

/// Load `{"ranges": [[start, end], ...]}`.
pub fn load_bad_frames(path: impl AsRef<Path>) -> Result<BadFrameRanges> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let ranges: BadFrameRanges = serde_json::from_str(&text)
        .with_context(|| format!("invalid bad frame file {}", path.display()))?;
    ranges.validate()?;
    Ok(ranges)
}

/// Load an initial alignment guess stored as a JSON array of 7 numbers.
pub fn load_alignment_init(path: impl AsRef<Path>) -> Result<AlignmentParams> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let values: Vec<Real> = serde_json::from_str(&text)
        .with_context(|| format!("invalid alignment init file {}", path.display()))?;
    Ok(AlignmentParams::from_slice(&values)?)
}

/// Load a fitted model stored as a JSON array of 18 numbers.
pub fn load_calibration(path: impl AsRef<Path>) -> Result<CalibrationParams> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let values: Vec<Real> = serde_json::from_str(&text)
        .with_context(|| format!("invalid calibration file {}", path.display()))?;
    Ok(CalibrationParams::from_slice(&values)?)
}

/// Write the synchronized dataset as one CSV row per sample.
///
/// Columns: `frame,time`, then `<track>.x,<track>.y,<track>.z` per track,
/// then the gantry error columns. Undefined values are written empty.
pub fn write_synced_csv(dataset: &SyncedDataset, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let mut out = String::from("frame,time");
    let names: Vec<&str> = dataset.positions.track_names().collect();
    for name in &names {
        let _ = write!(out, ",{name}.x,{name}.y,{name}.z");
    }
    for prefix in ["gantry_error", "gantry_calibrated_error"] {
        let _ = write!(out, ",{prefix}.x,{prefix}.y,{prefix}.z,{prefix}.abs");
    }
    out.push('\n');

    let cell = |v: Real| if v.is_nan() { String::new() } else { v.to_string() };
    let tracks = names
        .iter()
        .map(|n| dataset.positions.track(n))
        .collect::<Result<Vec<_>, _>>()?;
    for i in 0..dataset.len() {
        let _ = write!(out, "{},{}", dataset.frame[i], dataset.positions.time()[i]);
        for track in &tracks {
            for k in 0..3 {
                let _ = write!(out, ",{}", cell(track[i][k]));
            }
        }
        for err in [&dataset.gantry_error, &dataset.gantry_calibrated_error] {
            for k in 0..3 {
                let _ = write!(out, ",{}", cell(err.signed[i][k]));
            }
            let _ = write!(out, ",{}", cell(err.abs[i]));
        }
        out.push('\n');
    }

    fs::write(path, out).with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use gantry_calib_core::DEFAULT_TRACK;
    use std::io::Write;

    const MOCAP: &str = "\
Format Version,1.23,Take Name,Take 2025-02-21 03.15.07 PM,Capture Frame Rate,120.000000,Export Frame Rate,120.000000,Capture Start Time,2025-02-21 03.15.07.250,Capture Start Frame,0,Total Frames in Take,3,Total Exported Frames,3,Rotation Type,Quaternion

,Type,Rigid Body,Rigid Body,Rigid Body,Rigid Body,Rigid Body,Rigid Body,Rigid Body,Rigid Body Marker,Rigid Body Marker,Rigid Body Marker,Marker,Marker,Marker,Rigid Body Marker,Rigid Body Marker,Rigid Body Marker,Marker,Marker,Marker
,Name,tool,tool,tool,tool,tool,tool,tool,tool:Marker1,tool:Marker1,tool:Marker1,tool:Marker1,tool:Marker1,tool:Marker1,tool:Marker2,tool:Marker2,tool:Marker2,tool:Marker2,tool:Marker2,tool:Marker2
,ID,1,1,1,1,1,1,1,1,1,1,1,1,1,2,2,2,2,2,2
,,,Rotation,Rotation,Rotation,Rotation,Position,Position,Position,Position,Position,Position,Position,Position,Position,Position,Position,Position,Position,Position,Position
Frame,Time (Seconds),X,Y,Z,W,X,Y,Z,X,Y,Z,X,Y,Z,X,Y,Z,X,Y,Z
0,0.000000,0,0,0,1,1.0,2.0,3.0,1.1,2.0,3.0,1.1,2.1,3.0,0.9,2.0,3.0,0.9,2.0,3.1
1,0.008333,0,0,0,1,1.5,2.0,3.0,1.6,2.0,3.0,1.6,2.1,3.0,1.4,2.0,3.0,1.4,2.0,3.1
2,0.016667,0,0,0,1,2.0,2.0,3.0,2.1,2.0,3.0,,,,1.9,2.0,3.0,,,
";

    #[test]
    fn parses_metadata_with_take_meridiem() {
        let take = parse_mocap_csv(MOCAP, None).unwrap();
        let meta = &take.metadata;
        assert_eq!(meta.capture_frame_rate, 120.0);
        assert_eq!(meta.total_frames, 3);
        assert_eq!(meta.capture_start_time.hour(), 15);
        assert_eq!(meta.capture_start_time.minute(), 15);
        assert_eq!(meta.capture_start_time.nanosecond(), 250_000_000);

        let expected = Local
            .from_local_datetime(&meta.capture_start_time)
            .earliest()
            .unwrap()
            .timestamp_micros() as Real
            / 1e6;
        assert_eq!(meta.capture_start_timestamp().unwrap(), expected);
    }

    #[test]
    fn parses_capture_columns() {
        let take = parse_mocap_csv(MOCAP, None).unwrap();
        let cap = &take.capture;
        assert_eq!(cap.rigid_body_name, "tool");
        assert_eq!(cap.len(), 3);
        assert_eq!(cap.marker_count(), 2);
        assert_eq!(cap.frame, vec![0, 1, 2]);
        assert_eq!(cap.rigid_body[1], Vec3::new(1.5, 2.0, 3.0));
        assert_eq!(cap.raw_markers[0][0], Vec3::new(1.1, 2.1, 3.0));
        assert_eq!(cap.fitted_markers[1][0], Vec3::new(0.9, 2.0, 3.0));
        assert!(cap.raw_markers[1][2].x.is_nan());
        assert!(cap.undetected(2));
    }

    #[test]
    fn unknown_rigid_body_is_rejected() {
        let err = parse_mocap_csv(MOCAP, Some("other")).unwrap_err();
        assert!(err.to_string().contains("other"));
    }

    #[test]
    fn mismatched_marker_counts_are_rejected() {
        let text = MOCAP.replace(
            "tool:Marker2,tool:Marker2,tool:Marker2,tool:Marker2,tool:Marker2,tool:Marker2",
            "tool:Marker2,tool:Marker2,tool:Marker2,tool:Marker3,tool:Marker3,tool:Marker3",
        );
        let err = parse_mocap_csv(&text, None).unwrap_err();
        assert!(err.to_string().contains("does not match"), "{err}");
    }

    #[test]
    fn parses_gantry_log_with_extra_columns() {
        let text = "time,x,y,z,feed\n100.0,1,2,3,500\n100.5,1.5,2,3,500\n";
        let series = parse_gantry_csv(text).unwrap();
        assert_eq!(series.time(), &[100.0, 100.5]);
        assert_eq!(series.track(DEFAULT_TRACK).unwrap()[1], Vec3::new(1.5, 2.0, 3.0));
        assert!(parse_gantry_csv("t,x,y,z\n0,0,0,0\n").is_err());
    }

    #[test]
    fn loads_side_files() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("bad_frames.json");
        fs::File::create(&bad)
            .unwrap()
            .write_all(br#"{"ranges": [[10, 20], [40, 41]]}"#)
            .unwrap();
        assert_eq!(load_bad_frames(&bad).unwrap().ranges, vec![(10, 20), (40, 41)]);

        let init = dir.path().join("alignment_init.json");
        fs::write(&init, "[1, 2, 3, 0.1, 0.2, 0.3, 0.5]").unwrap();
        let params = load_alignment_init(&init).unwrap();
        assert_eq!(params.time_shift, 0.5);

        fs::write(&init, "[1, 2, 3]").unwrap();
        assert!(load_alignment_init(&init).is_err());

        let calib = dir.path().join("calibration_params.json");
        let identity = CalibrationParams::identity();
        fs::write(&calib, serde_json::to_string(&identity.to_vec()).unwrap()).unwrap();
        assert_eq!(load_calibration(&calib).unwrap(), identity);
    }
}
