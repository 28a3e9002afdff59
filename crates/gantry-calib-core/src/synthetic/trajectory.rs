//! Waypoint paths for measurement runs and synthetic datasets.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::math::{Real, Vec3};
use crate::series::PositionSeries;

/// Direction of the long legs of a snake path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnakeDirection {
    /// Long legs along x, stepping in y.
    Horizontal,
    /// Long legs along y, stepping in x.
    Vertical,
}

/// Boustrophedon waypoints covering the rectangle from `start` to `end`.
///
/// With `turns == 0` the path is a single L (two legs). Otherwise it has
/// `1 + 2·turns` legs and finishes on the far corner. `turns` must be even.
pub fn snake_path(
    start: (Real, Real),
    end: (Real, Real),
    turns: usize,
    direction: SnakeDirection,
) -> Result<Vec<(Real, Real)>, CoreError> {
    if turns % 2 != 0 {
        return Err(CoreError::Invalid(format!(
            "snake path turns must be even, got {turns}"
        )));
    }

    let moves: [(Real, Real); 4] = match direction {
        SnakeDirection::Horizontal => [(1.0, 0.0), (0.0, 1.0), (-1.0, 0.0), (0.0, 1.0)],
        SnakeDirection::Vertical => [(0.0, 1.0), (1.0, 0.0), (0.0, -1.0), (1.0, 0.0)],
    };
    let legs = if turns == 0 { 2 } else { 1 + 2 * turns };

    let mut unit = Vec::with_capacity(legs + 1);
    unit.push((0.0, 0.0));
    for i in 0..legs {
        let (px, py) = unit[unit.len() - 1];
        let (mx, my) = moves[i % 4];
        unit.push((px + mx, py + my));
    }

    let steps = turns.max(1) as Real;
    let (mut fx, mut fy) = (end.0 - start.0, end.1 - start.1);
    match direction {
        SnakeDirection::Horizontal => fy /= steps,
        SnakeDirection::Vertical => fx /= steps,
    }

    Ok(unit
        .into_iter()
        .map(|(x, y)| (start.0 + x * fx, start.1 + y * fy))
        .collect())
}

/// Sample a polyline traversed at constant `speed`, at `rate` samples per
/// time unit starting at `t0`. The last waypoint is always included.
pub fn sample_path(
    waypoints: &[Vec3],
    speed: Real,
    rate: Real,
    t0: Real,
) -> Result<PositionSeries, CoreError> {
    if waypoints.is_empty() {
        return Err(CoreError::Invalid("path has no waypoints".to_string()));
    }
    if speed <= 0.0 || rate <= 0.0 {
        return Err(CoreError::Invalid(format!(
            "speed and rate must be positive, got {speed} and {rate}"
        )));
    }

    // cumulative arc length at each waypoint
    let mut arc = Vec::with_capacity(waypoints.len());
    arc.push(0.0);
    for w in waypoints.windows(2) {
        let last = arc[arc.len() - 1];
        arc.push(last + (w[1] - w[0]).norm());
    }
    let total = arc[arc.len() - 1];
    let duration = total / speed;
    let dt = 1.0 / rate;

    let mut time = Vec::new();
    let mut points = Vec::new();
    let mut seg = 0;
    let mut k = 0usize;
    loop {
        let t = (k as Real * dt).min(duration);
        let s = t * speed;
        while seg + 2 < waypoints.len() && arc[seg + 1] < s {
            seg += 1;
        }
        let p = if waypoints.len() == 1 {
            waypoints[0]
        } else {
            let len = arc[seg + 1] - arc[seg];
            let w = if len > 0.0 { ((s - arc[seg]) / len).clamp(0.0, 1.0) } else { 1.0 };
            waypoints[seg] + (waypoints[seg + 1] - waypoints[seg]) * w
        };
        time.push(t0 + t);
        points.push(p);
        if t >= duration {
            break;
        }
        k += 1;
    }

    PositionSeries::single(time, points)
}
