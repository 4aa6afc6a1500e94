//! Per-series value tags with collision avoidance.
//!
//! Tags for line/point style series are placed by scoring the eight compass
//! directions around the data point, preferring the side facing away from
//! the incoming and outgoing line segments, with up to three concentric
//! passes of relaxed collision requirements. Tags for bar style series are
//! placed at the bar end (beyond, inside, at the base, or centered).
//! Previously placed tags are recorded so later tags avoid them.

use crate::geom::{AnchorX, AnchorY, BoundaryBox, Point, Pos};
use crate::legend::{update_legend_boxes, LegendBox};
use crate::scene::{NodeId, Scene, Shape};
use crate::series::clip::ClipEps;
use crate::series::SeriesType;
use crate::value::TAG_SPACING;

/// Minimal distance from the bar base for base-anchored tags.
const MIN_BASE_DIST: f64 = 2.0;

/// The visual/placement parameters a tag placement needs from its series.
#[derive(Debug, Clone)]
pub struct TagSpec {
    pub series_type: SeriesType,
    pub tag_pos: Pos,
    pub tag_box: bool,
    pub tag_size: f64,
    pub tag_dist_x: f64,
    pub tag_dist_y: f64,
    pub unit_x: String,
    pub unit_y: String,
    pub chart_area: BoundaryBox,
    pub x_axis_angle: i32,
    pub max_tag_y_len: usize,
}

impl TagSpec {
    fn is_xy(&self) -> bool {
        matches!(self.series_type, SeriesType::XY | SeriesType::Scatter)
    }

    fn is_bar_type(&self) -> bool {
        matches!(
            self.series_type,
            SeriesType::Bar
                | SeriesType::StackedBar
                | SeriesType::LayeredBar
                | SeriesType::Lollipop
        )
    }
}

#[derive(Clone)]
struct Pending {
    spec: TagSpec,
    tag_g: NodeId,
    p: Point,
    sx: String,
    sy: String,
    datum_valid: bool,
    dir_bst: i32,
    dir_prv: i32,
    dir_nxt: i32,
}

/// The tag placer: records placed tags and holds the one-point lookahead
/// used to know the outgoing direction of line tags.
#[derive(Default)]
pub struct TagPlacer {
    recorded_tags: Vec<BoundaryBox>,
    pending: Option<Pending>,
}

/// Build the tag contents (text plus optional box) under `tag_g`; returns
/// the new group and the corner radius derived from the text height.
fn build_tag(
    scene: &mut Scene,
    spec: &TagSpec,
    tag_g: NodeId,
    sx: &str,
    sy: &str,
) -> (NodeId, f64) {
    let g = scene.add_group(tag_g);
    let s = if spec.is_xy() {
        format!("({}{},{}{})", sx, spec.unit_x, sy, spec.unit_y)
    } else {
        format!("{}{}", sy, spec.unit_y)
    };
    let text = scene.add(g, Shape::label(s));
    let bb = scene.bbox(text);
    let r = bb.height() / 3.0;
    if spec.tag_box {
        let d = r * 0.75;
        scene.add(
            g,
            Shape::rounded_rect(bb.min.x - d, bb.min.y - d, bb.max.x + d, bb.max.y + d, r),
        );
        scene.front_to_back(g);
    }
    (g, r)
}

/// Apply the measuring part of the tag style (font only) to a group.
fn apply_tag_font(scene: &mut Scene, g: NodeId, tag_size: f64) {
    scene.attr_mut(g).text_font().set_size(12.0 * tag_size).set_bold();
}

/// How much room beyond the bar end a bar tag needs; zero when tags do not
/// extend beyond the end. Used when auto-expanding the Y-range.
pub fn get_beyond(scene: &mut Scene, spec: &TagSpec, tag_g: NodeId) -> f64 {
    let mut tag_pos = spec.tag_pos;
    if tag_pos != Pos::Base && tag_pos != Pos::End && tag_pos != Pos::Center {
        tag_pos = Pos::Beyond;
    }
    if !spec.is_bar_type() || tag_pos != Pos::Beyond {
        return 0.0;
    }

    let s: String = std::iter::repeat('0').take(spec.max_tag_y_len).collect();
    let g = scene.add_group(tag_g);
    apply_tag_font(scene, g, spec.tag_size);
    build_tag(scene, spec, g, "", &s);
    let bb = scene.bbox(g);
    scene.pop_child(tag_g);

    let mut beyond =
        if spec.x_axis_angle == 0 { bb.height() } else { bb.width() } + TAG_SPACING;
    if spec.series_type == SeriesType::Lollipop {
        beyond += if spec.x_axis_angle == 0 { spec.tag_dist_y } else { spec.tag_dist_x };
    }
    beyond + MIN_BASE_DIST
}

impl TagPlacer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, bb: BoundaryBox) {
        self.recorded_tags.push(bb);
    }

    /// Search backwards since the most recently added tag is the most
    /// likely to collide.
    pub fn collision(&self, bb: &BoundaryBox) -> bool {
        self.recorded_tags.iter().rev().any(|t| {
            bb.max.x > t.min.x && bb.min.x < t.max.x && bb.max.y > t.min.y && bb.min.y < t.max.y
        })
    }

    /// Queue a tag for a line/point datum. The actual placement happens
    /// when the next point (or `end_line_tag`) reveals the outgoing
    /// direction. `connected` tells whether this point continues a line.
    #[allow(clippy::too_many_arguments)]
    pub fn line_tag(
        &mut self,
        scene: &mut Scene,
        lb_list: &mut [LegendBox],
        eps: &ClipEps,
        spec: &TagSpec,
        tag_g: NodeId,
        p: Point,
        tag_x: &str,
        tag_y: &str,
        datum_valid: bool,
        connected: bool,
        direction: Pos,
    ) {
        let mut dir_nxt = direction_of(p.x - self.pending.as_ref().map_or(0.0, |t| t.p.x),
                                       p.y - self.pending.as_ref().map_or(0.0, |t| t.p.y));
        if !(self.pending.is_some() && connected) {
            dir_nxt = -1;
        }
        if let Some(pending) = &mut self.pending {
            pending.dir_nxt = dir_nxt;
        }
        self.end_line_tag(scene, lb_list, eps);

        let dir_bst = match direction {
            Pos::Left => 4,
            Pos::Right => 0,
            Pos::Bottom => 6,
            _ => 2,
        };
        self.pending = Some(Pending {
            spec: spec.clone(),
            tag_g,
            p,
            sx: tag_x.to_string(),
            sy: tag_y.to_string(),
            datum_valid,
            dir_bst,
            dir_prv: if dir_nxt < 0 { -1 } else { (dir_nxt + 4) % 8 },
            dir_nxt: -1,
        });
    }

    /// Flush the queued line tag, if any.
    pub fn end_line_tag(
        &mut self,
        scene: &mut Scene,
        lb_list: &mut [LegendBox],
        eps: &ClipEps,
    ) {
        if let Some(t) = self.pending.take() {
            if t.datum_valid {
                self.add_line_tag(scene, lb_list, eps, &t);
            }
        }
    }

    fn place_line(
        &self,
        scene: &mut Scene,
        g: NodeId,
        t: &Pending,
        r: f64,
        dir: i32,
        check_tag_collision: bool,
    ) -> (bool, BoundaryBox) {
        let ax = if dir < 0 || dir == 2 || dir == 6 {
            AnchorX::Mid
        } else if dir > 2 && dir < 6 {
            AnchorX::Max
        } else {
            AnchorX::Min
        };
        let ay = if dir < 0 || dir == 0 || dir == 4 {
            AnchorY::Mid
        } else if dir > 4 {
            AnchorY::Max
        } else {
            AnchorY::Min
        };
        let mut x = t.p.x;
        let mut y = t.p.y;

        let mut dx = t.spec.tag_dist_x + TAG_SPACING;
        let mut dy = t.spec.tag_dist_y + TAG_SPACING;
        if dir % 2 != 0 {
            let d = dx * dy / (dx * dx + dy * dy).sqrt();
            dx = d;
            dy = d;
        }
        if t.spec.tag_box && dir % 2 == 1 {
            dx -= r * 0.3;
            dy -= r * 0.3;
        }

        if ax == AnchorX::Min {
            x += dx;
        }
        if ax == AnchorX::Max {
            x -= dx;
        }
        if ay == AnchorY::Min {
            y += dy;
        }
        if ay == AnchorY::Max {
            y -= dy;
        }
        scene.move_to(g, ax, ay, x, y);

        let bb = scene.bbox(g);
        let area = &t.spec.chart_area;
        let mut ok = bb.min.x > area.min.x
            && bb.max.x < area.max.x
            && bb.min.y > area.min.y
            && bb.max.y < area.max.y;
        if check_tag_collision && ok {
            ok = !self.collision(&bb);
        }
        (ok, bb)
    }

    fn add_line_tag(
        &mut self,
        scene: &mut Scene,
        lb_list: &mut [LegendBox],
        eps: &ClipEps,
        t: &Pending,
    ) {
        let dir_bst = t.dir_bst;
        let dir_ops = (t.dir_bst + 4) % 8;

        let (g, r) = build_tag(scene, &t.spec, t.tag_g, &t.sx, &t.sy);

        let cx = (t.spec.chart_area.min.x + t.spec.chart_area.max.x) / 2.0;
        let cy = (t.spec.chart_area.min.y + t.spec.chart_area.max.y) / 2.0;

        let mut pos_ok1 = [true; 8];
        let mut pos_ok2 = [true; 8];
        let mut dir_cur: i32;
        let mut dir_inc: i32;
        let mut pos_auto = false;
        let mut placed: Option<BoundaryBox> = None;

        match t.spec.tag_pos {
            Pos::Left => {
                dir_cur = 4;
                dir_inc = if t.p.y < cy { -1 } else { 1 };
            }
            Pos::Right => {
                dir_cur = 0;
                dir_inc = if t.p.y < cy { 1 } else { -1 };
            }
            Pos::Bottom => {
                dir_cur = 6;
                dir_inc = if t.p.x < cx { 1 } else { -1 };
            }
            Pos::Center | Pos::Top => {
                if t.spec.tag_pos == Pos::Center {
                    let (ok, bb) = self.place_line(scene, g, t, r, -1, false);
                    if ok {
                        placed = Some(bb);
                    }
                }
                dir_cur = 2;
                dir_inc = if t.p.x < cx { -1 } else { 1 };
            }
            _ => {
                pos_auto = true;
                dir_cur = dir_bst;
                if t.dir_prv >= 0 || t.dir_nxt >= 0 {
                    let d1 = if t.dir_prv >= 0 { t.dir_prv } else { t.dir_nxt };
                    let d2 = if t.dir_nxt >= 0 { t.dir_nxt } else { t.dir_prv };
                    let mut dir = (d1 + d2) / 2;
                    if d1 - d2 > 4 || d2 - d1 > 4 {
                        dir = (dir + 4) % 8;
                    }
                    if (d1 + d1) % 2 != 0 && dir_cmp(dir, dir_bst, 3) {
                        dir += 1;
                    }
                    dir_cur = (dir + 4) % 8;
                    if d1 == (d2 + 4) % 8 {
                        if t.p.x < cx {
                            if dir_cmp(dir_cur, 3, 2) {
                                dir_cur = (dir_cur + 4) % 8;
                            }
                        } else if dir_cmp(dir_cur, 1, -2) {
                            dir_cur = (dir_cur + 4) % 8;
                        }
                    }
                }
                if t.dir_prv >= 0 {
                    let d = t.dir_prv as usize;
                    pos_ok1[d] = false;
                    pos_ok2[d] = false;
                    pos_ok2[(d + 1) % 8] = false;
                    pos_ok2[(d + 7) % 8] = false;
                }
                if t.dir_nxt >= 0 {
                    let d = t.dir_nxt as usize;
                    pos_ok1[d] = false;
                    pos_ok2[d] = false;
                    pos_ok2[(d + 1) % 8] = false;
                    pos_ok2[(d + 7) % 8] = false;
                }
                if pos_ok2[dir_bst as usize] {
                    dir_cur = dir_bst;
                } else if pos_ok2[((dir_ops + 7) % 8) as usize]
                    && pos_ok2[((dir_ops + 1) % 8) as usize]
                {
                    dir_cur = dir_ops;
                }
                dir_inc = if t.p.x < cx {
                    if dir_cmp(dir_cur, dir_bst - 1, -3) { 1 } else { -1 }
                } else if dir_cmp(dir_cur, dir_bst + 1, 3) {
                    -1
                } else {
                    1
                };
            }
        }

        if placed.is_none() {
            if pos_auto {
                'outer: for check_tag_collision in [true, false] {
                    for _ in 0..8 {
                        if pos_ok2[dir_cur.rem_euclid(8) as usize] {
                            let (ok, bb) =
                                self.place_line(scene, g, t, r, dir_cur, check_tag_collision);
                            if ok {
                                placed = Some(bb);
                                break 'outer;
                            }
                        }
                        dir_cur = (dir_cur + dir_inc).rem_euclid(8);
                        dir_inc = (if dir_inc < 0 { 1 } else { -1 }) - dir_inc;
                    }
                    dir_cur = (dir_cur + 4) % 8;
                    for _ in 0..8 {
                        if pos_ok1[dir_cur.rem_euclid(8) as usize] {
                            let (ok, bb) =
                                self.place_line(scene, g, t, r, dir_cur, check_tag_collision);
                            if ok {
                                placed = Some(bb);
                                break 'outer;
                            }
                        }
                        dir_cur = (dir_cur + dir_inc).rem_euclid(8);
                        dir_inc = (if dir_inc < 0 { 1 } else { -1 }) - dir_inc;
                    }
                    dir_cur = (dir_cur + 4) % 8;
                    for _ in 0..8 {
                        let (ok, bb) =
                            self.place_line(scene, g, t, r, dir_cur, check_tag_collision);
                        if ok {
                            placed = Some(bb);
                            break 'outer;
                        }
                        dir_cur = (dir_cur + dir_inc).rem_euclid(8);
                        dir_inc = (if dir_inc < 0 { 1 } else { -1 }) - dir_inc;
                    }
                    dir_cur = (dir_cur + 4) % 8;
                }
            } else {
                for _ in 0..8 {
                    let (ok, bb) = self.place_line(scene, g, t, r, dir_cur, false);
                    if ok {
                        placed = Some(bb);
                        break;
                    }
                    dir_cur = (dir_cur + dir_inc).rem_euclid(8);
                    dir_inc = (if dir_inc < 0 { 1 } else { -1 }) - dir_inc;
                }
            }
        }

        // Give up, just place at the data point.
        let bb = placed.unwrap_or_else(|| self.place_line(scene, g, t, r, -1, false).1);

        self.record(bb);
        update_legend_boxes(lb_list, eps, bb.min, bb.max, true, true);
        update_legend_boxes(
            lb_list,
            eps,
            Point::new(bb.min.x, bb.max.y),
            Point::new(bb.max.x, bb.min.y),
            true,
            true,
        );
    }

    /// Place a bar tag. `p1` is the bar base and `p2` the bar end;
    /// `direction` tells which way the bar points (needed for zero-size
    /// bars).
    #[allow(clippy::too_many_arguments)]
    pub fn bar_tag(
        &mut self,
        scene: &mut Scene,
        lb_list: &mut [LegendBox],
        eps: &ClipEps,
        spec: &TagSpec,
        tag_g: NodeId,
        p1: Point,
        p2: Point,
        tag_y: &str,
        direction: Pos,
    ) {
        let (g, _r) = build_tag(scene, spec, tag_g, "", tag_y);

        let (dax, day) = match direction {
            Pos::Right => (AnchorX::Min, AnchorY::Mid),
            Pos::Left => (AnchorX::Max, AnchorY::Mid),
            Pos::Top => (AnchorX::Mid, AnchorY::Min),
            Pos::Bottom => (AnchorX::Mid, AnchorY::Max),
            _ => (AnchorX::Mid, AnchorY::Mid),
        };

        let tag_dist = if direction == Pos::Left || direction == Pos::Right {
            spec.tag_dist_x
        } else {
            spec.tag_dist_y
        };
        let mut base_dist = (2.0 * tag_dist).max(MIN_BASE_DIST);
        let mut end_dist = 2.0 * tag_dist;
        let mut beyond_dist = 0.0;
        if spec.series_type == SeriesType::Lollipop {
            base_dist = MIN_BASE_DIST;
            end_dist = tag_dist;
            beyond_dist = tag_dist;
        }

        let spc = TAG_SPACING;
        let area = &spec.chart_area;

        let mut place = |scene: &mut Scene, pos: Pos| -> (bool, BoundaryBox) {
            let mut x = p2.x;
            let mut y = p2.y;
            let mut ax = dax;
            let mut ay = day;
            if pos == Pos::Center {
                x = (p1.x + p2.x) / 2.0;
                y = (p1.y + p2.y) / 2.0;
                ax = AnchorX::Mid;
                ay = AnchorY::Mid;
            } else {
                if pos == Pos::End {
                    if dax != AnchorX::Mid {
                        ax = if dax == AnchorX::Max { AnchorX::Min } else { AnchorX::Max };
                    }
                    if day != AnchorY::Mid {
                        ay = if day == AnchorY::Max { AnchorY::Min } else { AnchorY::Max };
                    }
                } else if pos == Pos::Base {
                    x = p1.x;
                    y = p1.y;
                }
                match direction {
                    Pos::Right => {
                        if pos == Pos::Base {
                            x += spc + base_dist;
                        }
                        if pos == Pos::End {
                            x -= spc + end_dist;
                        }
                        if pos == Pos::Beyond {
                            x += spc + beyond_dist;
                        }
                    }
                    Pos::Left => {
                        if pos == Pos::Base {
                            x -= spc + base_dist;
                        }
                        if pos == Pos::End {
                            x += spc + end_dist;
                        }
                        if pos == Pos::Beyond {
                            x -= spc + beyond_dist;
                        }
                    }
                    Pos::Top => {
                        if pos == Pos::Base {
                            y += spc + base_dist;
                        }
                        if pos == Pos::End {
                            y -= spc + end_dist;
                        }
                        if pos == Pos::Beyond {
                            y += spc + beyond_dist;
                        }
                    }
                    Pos::Bottom => {
                        if pos == Pos::Base {
                            y -= spc + base_dist;
                        }
                        if pos == Pos::End {
                            y += spc + end_dist;
                        }
                        if pos == Pos::Beyond {
                            y -= spc + beyond_dist;
                        }
                    }
                    _ => {}
                }
            }
            scene.move_to(g, ax, ay, x, y);
            let bb = scene.bbox(g);
            let ok = (direction == Pos::Top
                || direction == Pos::Bottom
                || (bb.min.x > area.min.x && bb.max.x < area.max.x))
                && (direction == Pos::Right
                    || direction == Pos::Left
                    || (bb.min.y > area.min.y && bb.max.y < area.max.y))
                && (pos == Pos::Base
                    || pos == Pos::Center
                    || (!(direction == Pos::Right && bb.min.x < p1.x + spc + base_dist)
                        && !(direction == Pos::Left && bb.max.x > p1.x - spc - base_dist)
                        && !(direction == Pos::Top && bb.min.y < p1.y + spc + base_dist)
                        && !(direction == Pos::Bottom && bb.max.y > p1.y - spc - base_dist)));
            (ok, bb)
        };

        let mut tag_pos = spec.tag_pos;
        if tag_pos != Pos::Base && tag_pos != Pos::End && tag_pos != Pos::Center {
            tag_pos = Pos::Beyond;
        }

        let mut candidates = vec![tag_pos];
        if tag_pos == Pos::Beyond {
            candidates.push(Pos::End);
        }
        if tag_pos != Pos::Base {
            candidates.push(Pos::Base);
        }

        let mut bb = BoundaryBox::new();
        for pos in candidates {
            let (ok, b) = place(scene, pos);
            bb = b;
            if ok {
                break;
            }
        }

        self.record(bb);
        update_legend_boxes(lb_list, eps, bb.min, bb.max, true, true);
        update_legend_boxes(
            lb_list,
            eps,
            Point::new(bb.min.x, bb.max.y),
            Point::new(bb.max.x, bb.min.y),
            true,
            true,
        );
    }
}

/// The direction of a vector as an octant 0..7, where 0 is east and the
/// octants proceed counterclockwise; -1 when undefined (zero vector).
pub fn direction_of(x: f64, y: f64) -> i32 {
    const Q: f64 = 2.4142; // tan(90deg - 45deg/2)

    let ax = x.abs();
    let ay = y.abs();

    let mut dir = 1i32;
    dir >>= i32::from(ax > ay * Q);
    dir <<= i32::from(ay > ax * Q);

    if x < 0.0 {
        dir = 4 - dir;
    }
    if y < 0.0 {
        dir = 8 - dir;
    }

    (dir & 0x7) - 2 * i32::from(x == 0.0 && y == 0.0)
}

/// Cyclic direction range test: is `dir1` within `[dir2; dir2+ofs]`
/// (or `[dir2+ofs; dir2]` for negative `ofs`)?
pub fn dir_cmp(dir1: i32, dir2: i32, ofs: i32) -> bool {
    let num = if ofs >= 0 { dir1 - dir2 } else { dir2 - dir1 };
    (num & 7) <= ofs.abs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn octant_directions() {
        assert_eq!(direction_of(1.0, 0.0), 0);
        assert_eq!(direction_of(1.0, 1.0), 1);
        assert_eq!(direction_of(0.0, 1.0), 2);
        assert_eq!(direction_of(-1.0, 0.0), 4);
        assert_eq!(direction_of(0.0, -1.0), 6);
        assert_eq!(direction_of(1.0, -1.0), 7);
        assert_eq!(direction_of(0.0, 0.0), -1);
    }

    #[test]
    fn cyclic_range_compare() {
        assert!(dir_cmp(1, 7, 3));
        assert!(!dir_cmp(3, 7, 3));
        assert!(dir_cmp(6, 0, -3));
        assert!(!dir_cmp(2, 0, -3));
    }
}
