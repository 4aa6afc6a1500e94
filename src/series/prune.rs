//! Polyline and point pruning.
//!
//! Pruning removes data points that do not contribute visibly to the
//! rendering. For polylines, a running collection keeps its start/end
//! points (`p1`/`p2`), the extreme points of the underlying line
//! (`e1`/`e2`), and the furthest left/right deviations (`d1`/`d2`) from the
//! `e1`-`e2` line; a new point is integrated while both deviations stay
//! within the prune distance and no axis-parallel segment would get tilted.
//! Isolated points (markers, scatter) de-duplicate on a grid of the prune
//! distance. Preserved points (extremes and snap anchors) are reported to
//! the interactive-document sink before they could be dropped.

use ahash::AHashMap;

use crate::geom::Point;
use crate::html::HtmlSink;
use crate::value::EPSILON;

/// Below this prune distance, pruning is disabled.
pub const PRUNE_DIST_MIN: f64 = 0.001;

/// The per-series pruning parameters.
#[derive(Debug, Clone, Copy)]
pub struct PruneCfg {
    pub prune_dist: f64,
    pub prune_dist_inv: f64,
    pub is_scatter: bool,
}

impl PruneCfg {
    pub fn new(prune_dist: f64, is_scatter: bool) -> Self {
        Self {
            prune_dist,
            prune_dist_inv: if prune_dist > 0.0 { 1.0 / prune_dist } else { 0.0 },
            is_scatter,
        }
    }

    pub fn active(&self) -> bool {
        self.prune_dist >= PRUNE_DIST_MIN
    }

    fn key(&self, p: Point) -> u64 {
        let x = (p.x * self.prune_dist_inv) as i64 as u64;
        let y = (p.y * self.prune_dist_inv) as i64 as u64;
        (y << 32) | (x & 0xffff_ffff)
    }
}

/// Running prune state for one polyline or point cloud.
#[derive(Default)]
pub struct PruneState {
    pub cnt: usize,

    /// Surviving points.
    pub points: Vec<Point>,

    // Start and end of the current collection (both inclusive).
    p1: Point,
    p2: Point,

    // Extreme points of the line covering the collection. Keeping them
    // separate from p1/p2 allows pruning dense zigzag runs along the line.
    e1: Point,
    e2: Point,

    // Furthest deviation to the left/right of the e1-e2 line.
    d1: f64,
    d2: f64,

    // Isolated-point de-duplication.
    iso_exists: AHashMap<u64, Point>,
    iso_points: Vec<Point>,

    pub html_enable: bool,
}

/// Signed distance from `p` to the line from `e1` to `e2`; positive means
/// `p` lies to the left.
fn dist2line(e1: Point, e2: Point, p: Point) -> f64 {
    let dx = e2.x - e1.x;
    let dy = e2.y - e1.y;
    let px = p.x - e1.x;
    let py = p.y - e1.y;
    let cross = dx * py - dy * px;
    cross / (dx * dx + dy * dy).sqrt()
}

impl PruneState {
    pub fn new(html_enable: bool) -> Self {
        Self { html_enable, ..Self::default() }
    }

    fn preserve_run(&self, html: &mut Option<&mut HtmlSink>, final_commit: bool) {
        if self.html_enable {
            if let Some(h) = html.as_deref_mut() {
                h.preserve(self.p1);
                h.preserve(self.e1);
                h.preserve(self.p2);
                h.preserve(self.e2);
                h.commit(final_commit);
            }
        }
    }

    /// Try to integrate `p` into the current collection; false means the
    /// collection must be flushed first.
    fn try_prune(&mut self, cfg: &PruneCfg, p: Point) -> bool {
        let mut new_e1 = self.e1;
        let mut new_e2 = self.e2;

        let vex = self.e2.x - self.e1.x;
        let vey = self.e2.y - self.e1.y;

        let vex_tiny = vex.abs() < EPSILON;
        let vey_tiny = vey.abs() < EPSILON;

        if vex_tiny && vey_tiny {
            new_e2 = p;
        } else {
            let dot1 = (p.x - self.e1.x) * vex + (p.y - self.e1.y) * vey;
            let dot2 = (p.x - self.e2.x) * vex + (p.y - self.e2.y) * vey;
            let d;
            if dot1 < 0.0 || dot2 > 0.0 {
                // p extends the run beyond one of the extremes.
                if dot2 > 0.0 {
                    d = dist2line(self.e1, p, self.e2);
                } else {
                    d = dist2line(self.e2, p, self.e1);
                    std::mem::swap(&mut self.d1, &mut self.d2);
                    new_e1 = self.e2;
                }
                new_e2 = p;
                // Never let an axis-parallel segment become slightly skewed;
                // that artifact is much more visible than the pruning win.
                if (vex_tiny || vey_tiny) && d.abs() > EPSILON {
                    return false;
                }
                // Update d1/d2 from the distance of the old extreme to the
                // extended line. Not exact (all collected points would have
                // to be re-examined), but close enough and O(1).
                if d > 0.0 {
                    self.d1 += d;
                    self.d2 = (self.d2 - d).max(0.0);
                } else {
                    self.d1 = (self.d1 + d).max(0.0);
                    self.d2 -= d;
                }
            } else {
                d = dist2line(self.e1, self.e2, p);
                if d > 0.0 {
                    self.d1 = self.d1.max(d);
                } else {
                    self.d2 = self.d2.max(-d);
                }
            }
            if self.d1 > cfg.prune_dist || self.d2 > cfg.prune_dist {
                return false;
            }
        }

        self.e1 = new_e1;
        self.e2 = new_e2;
        self.p2 = p;
        true
    }

    /// Feed the next polyline point.
    pub fn poly_add(&mut self, cfg: &PruneCfg, html: &mut Option<&mut HtmlSink>, p: Point) {
        self.cnt += 1;

        if self.cnt > 2 {
            if !cfg.active() || !self.try_prune(cfg, p) {
                self.preserve_run(html, false);
                if self.e1 != self.p1 {
                    self.points.push(self.e1);
                }
                if self.e2 != self.p2 {
                    self.points.push(self.e2);
                }
                self.p1 = self.p2;
                self.e1 = self.p2;
                self.points.push(self.p1);
                self.p2 = p;
                self.e2 = p;
                self.d1 = 0.0;
                self.d2 = 0.0;
            }
        } else if self.cnt == 1 {
            self.points.clear();
            self.p1 = p;
            self.e1 = p;
            self.points.push(self.p1);
        } else {
            self.p2 = p;
            self.e2 = p;
            self.d1 = 0.0;
            self.d2 = 0.0;
        }
    }

    /// Flush the polyline; the surviving points are left in `points`.
    pub fn poly_end(&mut self, html: &mut Option<&mut HtmlSink>) {
        self.preserve_run(html, true);
        if self.cnt > 0 {
            if self.cnt > 1 {
                if self.e1 != self.p1 {
                    self.points.push(self.e1);
                }
                if self.e2 != self.p2 {
                    self.points.push(self.e2);
                }
                self.points.push(self.p2);
            }
        } else {
            self.points.clear();
        }
        self.cnt = 0;
    }

    /// Feed the next isolated point (marker or scatter dot).
    pub fn points_add(&mut self, cfg: &PruneCfg, html: &mut Option<&mut HtmlSink>, p: Point) {
        if !cfg.is_scatter && cfg.active() {
            // Route through the polyline pruner so extremes are kept; for a
            // scatter cloud the points are unordered and this has no value.
            self.poly_add(cfg, html, p);
        } else {
            self.cnt += 1;
            if self.cnt == 1 {
                self.points.clear();
            }
            if self.html_enable {
                if let Some(h) = html.as_deref_mut() {
                    h.commit(false);
                }
            }
        }
        if self.cnt == 1 {
            self.iso_exists.clear();
            self.iso_points.clear();
        }
        if cfg.active() {
            let key = cfg.key(p);
            if let std::collections::hash_map::Entry::Vacant(e) = self.iso_exists.entry(key) {
                e.insert(p);
                self.iso_points.push(p);
                if self.html_enable {
                    if let Some(h) = html.as_deref_mut() {
                        h.preserve(p);
                    }
                }
            }
        } else {
            self.iso_points.push(p);
            if self.html_enable {
                if let Some(h) = html.as_deref_mut() {
                    h.preserve(p);
                }
            }
        }
    }

    /// Flush the point cloud; the surviving points are left in `points`.
    pub fn points_end(&mut self, cfg: &PruneCfg, html: &mut Option<&mut HtmlSink>) {
        if self.cnt == 0 {
            self.points.clear();
            self.iso_exists.clear();
            self.iso_points.clear();
        }
        if !cfg.is_scatter && cfg.active() {
            self.poly_end(html);
        } else if self.html_enable {
            if let Some(h) = html.as_deref_mut() {
                h.commit(true);
            }
        }
        self.cnt = 0;
        for p in &self.points {
            let key = cfg.key(*p);
            let dup = self.iso_exists.get(&key).map(|q| *q == *p).unwrap_or(false);
            if !dup {
                self.iso_points.push(*p);
            }
        }
        self.points = std::mem::take(&mut self.iso_points);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_poly(cfg: &PruneCfg, pts: &[Point]) -> Vec<Point> {
        let mut ps = PruneState::new(false);
        let mut none: Option<&mut HtmlSink> = None;
        for p in pts {
            ps.poly_add(cfg, &mut none, *p);
        }
        ps.poly_end(&mut none);
        ps.points
    }

    #[test]
    fn collinear_run_collapses_to_endpoints() {
        let cfg = PruneCfg::new(0.3, false);
        let pts: Vec<Point> = (0..100).map(|i| Point::new(i as f64, 2.0 * i as f64)).collect();
        let out = run_poly(&cfg, &pts);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], pts[0]);
        assert_eq!(out[out.len() - 1], pts[99]);
    }

    #[test]
    fn deviating_points_survive_within_prune_dist() {
        let cfg = PruneCfg::new(0.3, false);
        let pts = vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 5.0),
            Point::new(2.0, 0.0),
            Point::new(3.0, 5.0),
        ];
        let out = run_poly(&cfg, &pts);
        assert_eq!(out, pts, "large deviations must not be pruned");
    }

    #[test]
    fn pruned_curve_stays_within_distance() {
        // A gentle arc: all pruned points must be within prune_dist of the
        // emitted polyline (checked against the chord through neighbors).
        let cfg = PruneCfg::new(0.5, false);
        let pts: Vec<Point> = (0..200)
            .map(|i| {
                let x = i as f64 * 0.1;
                Point::new(x, (x * 0.05).sin() * 2.0)
            })
            .collect();
        let out = run_poly(&cfg, &pts);
        assert!(out.len() < pts.len());
        for p in &pts {
            let mut best = f64::MAX;
            for w in out.windows(2) {
                let d = dist_point_segment(*p, w[0], w[1]);
                best = best.min(d);
            }
            assert!(best <= 0.5 + 1e-6, "point {:?} is {best} away", p);
        }
    }

    fn dist_point_segment(p: Point, a: Point, b: Point) -> f64 {
        let vx = b.x - a.x;
        let vy = b.y - a.y;
        let len2 = vx * vx + vy * vy;
        let t = if len2 > 0.0 {
            (((p.x - a.x) * vx + (p.y - a.y) * vy) / len2).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let cx = a.x + t * vx - p.x;
        let cy = a.y + t * vy - p.y;
        (cx * cx + cy * cy).sqrt()
    }

    #[test]
    fn coincident_isolated_points_deduplicate() {
        let cfg = PruneCfg::new(0.3, true);
        let mut ps = PruneState::new(false);
        let mut none: Option<&mut HtmlSink> = None;
        for _ in 0..10 {
            ps.points_add(&cfg, &mut none, Point::new(5.0, 5.0));
        }
        ps.points_add(&cfg, &mut none, Point::new(50.0, 50.0));
        ps.points_end(&cfg, &mut none);
        assert_eq!(ps.points.len(), 2);
    }
}
