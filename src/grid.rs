//! The chart grid solver.
//!
//! Charts occupy rectangular spans of grid cells. Each cell has two edges
//! per axis direction; an edge carries a live coordinate, a padding
//! requirement derived from decorations spilling outside the plot
//! rectangle, and constraint flags. The solver relaxes edge coordinates
//! iteratively (damped by 0.3 per step) until the total adjustment falls
//! under the convergence limit, in three phases: an unconstrained solve, a
//! tightening pass with the outer edges locked, and an expansion pass that
//! grows empty cells for shared legends. Padding starts out ignored so plot
//! rectangles align first; edges whose paddings still overlap after
//! convergence activate their padding and iterate again, with up to five
//! trials before all padding is forced on.

use log::debug;

use crate::geom::{AnchorX, AnchorY, BoundaryBox};
use crate::value::{EPSILON, NUM_HI};

/// One occupant of the grid: a chart or the shared legend placeholder.
#[derive(Debug, Clone)]
pub struct GridElement {
    /// Index into the ensemble chart list; `None` marks the shared legend.
    pub chart: Option<usize>,
    pub full_bb: BoundaryBox,
    pub area_bb: BoundaryBox,
    pub grid_x1: u32,
    pub grid_y1: u32,
    pub grid_x2: u32,
    pub grid_y2: u32,
    pub anchor_x_defined: bool,
    pub anchor_y_defined: bool,
    pub anchor_x: AnchorX,
    pub anchor_y: AnchorY,
}

impl Default for GridElement {
    fn default() -> Self {
        Self {
            chart: None,
            full_bb: BoundaryBox::new(),
            area_bb: BoundaryBox::new(),
            grid_x1: 0,
            grid_y1: 0,
            grid_x2: 0,
            grid_y2: 0,
            anchor_x_defined: false,
            anchor_y_defined: false,
            anchor_x: AnchorX::Mid,
            anchor_y: AnchorY::Mid,
        }
    }
}

impl GridElement {
    fn span(&self, is_x: bool) -> (usize, usize) {
        if is_x {
            (self.grid_x1 as usize, self.grid_x2 as usize)
        } else {
            (self.grid_y1 as usize, self.grid_y2 as usize)
        }
    }

    fn full_range(&self, is_x: bool) -> (f64, f64) {
        if is_x {
            (self.full_bb.min.x, self.full_bb.max.x)
        } else {
            (self.full_bb.min.y, self.full_bb.max.y)
        }
    }

    fn area_range(&self, is_x: bool) -> (f64, f64) {
        if is_x {
            (self.area_bb.min.x, self.area_bb.max.x)
        } else {
            (self.area_bb.min.y, self.area_bb.max.y)
        }
    }

    fn anchored_min(&self, is_x: bool) -> bool {
        if is_x {
            self.anchor_x == AnchorX::Min
        } else {
            self.anchor_y == AnchorY::Min
        }
    }

    fn anchored_max(&self, is_x: bool) -> bool {
        if is_x {
            self.anchor_x == AnchorX::Max
        } else {
            self.anchor_y == AnchorY::Max
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Edge {
    /// Coordinate of this plot-rectangle edge.
    pub coor: f64,
    /// Iterative adjustment to `coor`.
    pub adj: f64,
    /// Padding caused by decorations outside the plot rectangle.
    pub pad: f64,
    pub pad_use: bool,
    pub slack: f64,
    pub constrained: bool,
    pub locked: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Cell {
    pub e1: Edge,
    pub e2: Edge,
}

/// An empty rectangular grid region.
#[derive(Debug, Clone, Copy, Default)]
pub struct Hole {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
    pub bb: BoundaryBox,
}

#[derive(Default)]
pub struct Grid {
    pub max_x: u32,
    pub max_y: u32,
    pub cell_margin: f64,
    pub area_padding: f64,
    pub element_list: Vec<GridElement>,
    pub cell_list_x: Vec<Cell>,
    pub cell_list_y: Vec<Cell>,
}

impl Grid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn init(&mut self, cell_margin: f64, area_padding: f64) {
        self.cell_margin = cell_margin;
        self.area_padding = area_padding;
        self.max_x = 0;
        self.max_y = 0;
        for elem in &mut self.element_list {
            if elem.grid_x1 > elem.grid_x2 {
                std::mem::swap(&mut elem.grid_x1, &mut elem.grid_x2);
            }
            if elem.grid_y1 > elem.grid_y2 {
                std::mem::swap(&mut elem.grid_y1, &mut elem.grid_y2);
            }
            self.max_x = self.max_x.max(elem.grid_x2);
            self.max_y = self.max_y.max(elem.grid_y2);
        }
        self.cell_list_x = vec![Cell::default(); self.max_x as usize + 1];
        self.cell_list_y = vec![Cell::default(); self.max_y as usize + 1];
    }

    pub fn solve(&mut self) {
        let mut cells = std::mem::take(&mut self.cell_list_x);
        let iter_x = self.solve_axis(&mut cells, true);
        self.cell_list_x = cells;
        let mut cells = std::mem::take(&mut self.cell_list_y);
        let iter_y = self.solve_axis(&mut cells, false);
        self.cell_list_y = cells;
        debug!("grid solved: {iter_x} x-iterations, {iter_y} y-iterations");
    }

    fn update_pad(&self, cell_list: &mut [Cell], is_x: bool) {
        for elem in &self.element_list {
            let (g1, g2) = elem.span(is_x);
            let (mut f1, mut f2) = elem.full_range(is_x);
            let (a1, a2) = elem.area_range(is_x);

            f1 -= self.cell_margin;
            f2 += self.cell_margin;

            let ar = (a2 - a1) / 2.0;

            let mut c = (cell_list[g1].e1.coor + cell_list[g2].e2.coor) / 2.0;
            if elem.anchored_min(is_x) {
                c = cell_list[g1].e1.coor + ar;
            }
            if elem.anchored_max(is_x) {
                c = cell_list[g2].e2.coor - ar;
            }

            cell_list[g1].e1.pad = cell_list[g1]
                .e1
                .pad
                .max(cell_list[g1].e1.coor - (c - ar - (a1 - f1)));
            cell_list[g2].e2.pad =
                cell_list[g2].e2.pad.max((c + ar + (f2 - a2)) - cell_list[g2].e2.coor);
        }
    }

    fn solve_axis(&mut self, cell_list: &mut [Cell], is_x: bool) -> u32 {
        for cell in cell_list.iter_mut() {
            *cell = Cell::default();
        }

        // Phase 1: unconstrained solve.
        // Phase 2: minimize occupied cell widths.
        // Phase 3: expand empty cell sides so shared legends can be placed
        //          in empty grid cells.
        let mut phase = 1u32;

        for elem in &self.element_list {
            let (g1, g2) = elem.span(is_x);
            if g1 == g2 {
                let (a1, a2) = elem.area_range(is_x);
                cell_list[g2].e2.coor = cell_list[g2].e2.coor.max(a2 - a1);
            } else {
                cell_list[g1].e1.constrained = true;
                cell_list[g2].e2.constrained = true;
            }
        }

        // Element order by grid position gives faster initial placement.
        let mut sorted_indices: Vec<usize> = (0..self.element_list.len()).collect();
        sorted_indices.sort_by_key(|i| self.element_list[*i].span(is_x));

        let mut tot_iter = 0u32;
        let max_trial = 5u32;
        let mut cur_trial = 0u32;
        let mut solved = false;

        while cur_trial < max_trial {
            if solved {
                if phase == 3 {
                    break;
                }
                phase += 1;
                solved = false;
                cur_trial = 0;
                cell_list.first_mut().unwrap().e1.locked = true;
                cell_list.last_mut().unwrap().e2.locked = true;
                if phase == 3 {
                    for elem in &self.element_list {
                        let (g1, g2) = elem.span(is_x);
                        cell_list[g1].e1.locked = true;
                        cell_list[g2].e2.locked = true;
                    }
                    for i in 1..cell_list.len() {
                        let prv_locked2 = cell_list[i - 1].e2.locked;
                        let cur_locked1 = cell_list[i].e1.locked;
                        cell_list[i - 1].e2.pad_use = prv_locked2 || cur_locked1;
                        cell_list[i].e1.pad_use = cur_locked1 || prv_locked2;
                    }
                }
            }
            cur_trial += 1;

            if cur_trial == max_trial {
                // Last trial: include all padding so it has a chance to
                // take effect before bailing out.
                for cell in cell_list.iter_mut() {
                    cell.e1.pad_use = true;
                    cell.e2.pad_use = true;
                }
            }

            // Initial placement: not required, but converges much faster.
            if phase < 3 {
                for _ in 0..self.element_list.len() {
                    let mut moved = false;

                    for i in &sorted_indices {
                        let elem = &self.element_list[*i];
                        let (g1, g2) = elem.span(is_x);
                        let (a1, a2) = elem.area_range(is_x);
                        let d = cell_list[g1].e1.coor + (a2 - a1) - cell_list[g2].e2.coor;
                        if d > 0.0 {
                            cell_list[g2].e1.coor += d;
                            cell_list[g2].e2.coor += d;
                            moved = d > EPSILON;
                        }
                    }

                    for cell in cell_list.iter_mut() {
                        cell.e1.pad = self.cell_margin;
                        cell.e2.pad = self.cell_margin;
                    }
                    self.update_pad(cell_list, is_x);

                    for i in 1..cell_list.len() {
                        let gap_area = (cell_list[i].e1.coor - self.area_padding)
                            - (cell_list[i - 1].e2.coor + self.area_padding);
                        let pad1 =
                            if cell_list[i].e1.pad_use { cell_list[i].e1.pad } else { 0.0 };
                        let pad2 = if cell_list[i - 1].e2.pad_use {
                            cell_list[i - 1].e2.pad
                        } else {
                            0.0
                        };
                        let gap_full = (cell_list[i].e1.coor - pad1)
                            - (cell_list[i - 1].e2.coor + pad2);
                        let gap = gap_area.min(gap_full);
                        if gap < 0.0 {
                            cell_list[i].e1.coor -= gap;
                            cell_list[i].e2.coor -= gap;
                            moved = gap < -EPSILON;
                        }
                    }

                    if !moved {
                        break;
                    }
                }
            }

            let max_iter = 100_000u32;
            let mut cur_iter = 0u32;

            while !solved && cur_iter < max_iter {
                cur_iter += 1;
                tot_iter += 1;

                for cell in cell_list.iter_mut() {
                    cell.e1.pad = self.cell_margin;
                    cell.e2.pad = self.cell_margin;
                    cell.e1.adj = if phase == 3 {
                        0.0
                    } else {
                        (cell.e2.coor - cell.e1.coor) / 2.0
                    };
                    cell.e2.adj = if phase == 3 {
                        0.0
                    } else {
                        (cell.e1.coor - cell.e2.coor) / 2.0
                    };
                    cell.e1.slack = NUM_HI;
                    cell.e2.slack = -NUM_HI;
                }
                self.update_pad(cell_list, is_x);

                if phase < 3 {
                    for elem in &self.element_list {
                        let (g1, g2) = elem.span(is_x);
                        let (a1, a2) = elem.area_range(is_x);
                        let aw = a2 - a1;
                        let sw = cell_list[g2].e2.coor - cell_list[g1].e1.coor;
                        let d = (sw - aw) / 2.0;
                        if g2 > g1 {
                            cell_list[g1].e1.slack = cell_list[g1].e1.slack.min(d);
                            cell_list[g2].e2.slack = cell_list[g2].e2.slack.max(-d);
                        } else {
                            cell_list[g1].e1.adj = cell_list[g1].e1.adj.min(d);
                            cell_list[g2].e2.adj = cell_list[g2].e2.adj.max(-d);
                        }
                    }
                }

                for i in 0..cell_list.len() {
                    if cell_list[i].e1.slack < 0.0 {
                        let s = cell_list[i].e1.slack;
                        cell_list[i].e1.adj += s;
                        cell_list[i].e2.adj += s;
                    }
                    if cell_list[i].e2.slack > 0.0 {
                        let s = cell_list[i].e2.slack;
                        cell_list[i].e1.adj += s;
                        cell_list[i].e2.adj += s;
                    }
                    if i > 0 {
                        let gap_area = (cell_list[i].e1.coor - self.area_padding)
                            - (cell_list[i - 1].e2.coor + self.area_padding);
                        let pad1 =
                            if cell_list[i].e1.pad_use { cell_list[i].e1.pad } else { 0.0 };
                        let pad2 = if cell_list[i - 1].e2.pad_use {
                            cell_list[i - 1].e2.pad
                        } else {
                            0.0
                        };
                        let gap_full = (cell_list[i].e1.coor - pad1)
                            - (cell_list[i - 1].e2.coor + pad2);
                        let gap = gap_area.min(gap_full);
                        let adj = gap / 2.0;
                        if phase == 3 {
                            let prv_w = cell_list[i - 1].e2.coor - cell_list[i - 1].e1.coor;
                            let cur_w = cell_list[i].e2.coor - cell_list[i].e1.coor;
                            cell_list[i - 1].e2.adj += adj.max(-prv_w);
                            cell_list[i].e1.adj -= adj.max(-cur_w);
                            if !cell_list[i - 1].e2.locked && !cell_list[i].e1.locked {
                                let adj = cur_w - prv_w;
                                cell_list[i - 1].e2.adj += adj;
                                cell_list[i].e1.adj += adj;
                            }
                        } else if adj < 0.0 {
                            cell_list[i - 1].e1.adj += adj;
                            cell_list[i - 1].e2.adj += adj;
                            cell_list[i].e1.adj -= adj;
                            cell_list[i].e2.adj -= adj;
                        } else {
                            let mut p_ok = !cell_list[i - 1].e2.constrained
                                || cell_list[i - 1].e1.constrained;
                            let mut c_ok =
                                !cell_list[i].e1.constrained || cell_list[i].e2.constrained;
                            p_ok = p_ok || phase == 1;
                            c_ok = c_ok || phase == 1;
                            if cell_list[i - 1].e1.slack > 0.0 && p_ok {
                                let a = adj.min(cell_list[i - 1].e1.slack);
                                cell_list[i - 1].e1.adj += a;
                                cell_list[i - 1].e2.adj += a;
                            }
                            if cell_list[i].e2.slack < 0.0 && c_ok {
                                let a = adj.min(-cell_list[i].e2.slack);
                                cell_list[i].e1.adj -= a;
                                cell_list[i].e2.adj -= a;
                            }
                        }
                    }
                }

                let mut acu_adj = 0.0;
                for cell in cell_list.iter_mut() {
                    if cell.e1.locked {
                        cell.e1.adj = 0.0;
                    }
                    if cell.e2.locked {
                        cell.e2.adj = 0.0;
                    }
                    cell.e1.coor += cell.e1.adj * 0.3;
                    cell.e2.coor += cell.e2.adj * 0.3;
                    acu_adj += cell.e1.adj.abs();
                    acu_adj += cell.e2.adj.abs();
                }

                let converge_limit = 1e-4;

                // Plot rectangles align first; when converged, check
                // whether any neighboring paddings still overlap, and if
                // so activate them and iterate more.
                solved = acu_adj < converge_limit;
                if solved || cur_iter == max_iter {
                    if phase < 3 {
                        for i in 1..cell_list.len() {
                            let overlap = (cell_list[i - 1].e2.coor + cell_list[i - 1].e2.pad)
                                - (cell_list[i].e1.coor - cell_list[i].e1.pad);
                            if overlap > 4.0 * converge_limit {
                                cell_list[i - 1].e2.pad_use = true;
                                cell_list[i].e1.pad_use = true;
                                solved = false;
                            }
                        }
                    }
                    break;
                }
            }
        }

        tot_iter
    }

    /// Enumerate the maximal empty rectangles of the grid.
    pub fn get_holes(&self) -> Vec<Hole> {
        let w = self.max_x as usize + 1;
        let h = self.max_y as usize + 1;
        let mut grid = vec![vec![false; h]; w];
        for elem in &self.element_list {
            for x in elem.grid_x1..=elem.grid_x2 {
                for y in elem.grid_y1..=elem.grid_y2 {
                    grid[x as usize][y as usize] = true;
                }
            }
        }

        let bar_len = |x: usize, y: usize| {
            let mut len = 0usize;
            let mut x = x;
            while x < w && !grid[x][y] {
                len += 1;
                x += 1;
            }
            len
        };

        let mut holes: Vec<Hole> = Vec::new();
        let mut add_hole = |holes: &mut Vec<Hole>, x1: usize, y1: usize, x2: usize, y2: usize| {
            for hl in holes.iter() {
                if x1 as u32 >= hl.x1
                    && x2 as u32 <= hl.x2
                    && y1 as u32 >= hl.y1
                    && y2 as u32 <= hl.y2
                {
                    return;
                }
            }
            holes.push(Hole {
                x1: x1 as u32,
                y1: y1 as u32,
                x2: x2 as u32,
                y2: y2 as u32,
                bb: BoundaryBox::new(),
            });
        };

        for cx in 0..w {
            for cy in 0..h {
                let mut cur_bl = 0usize;
                for by in cy..h {
                    let mut new_bl = bar_len(cx, by);
                    if by > cy {
                        new_bl = new_bl.min(cur_bl);
                        if new_bl < cur_bl {
                            add_hole(&mut holes, cx, cy, cx + cur_bl - 1, by - 1);
                        }
                    }
                    if new_bl == 0 {
                        break;
                    }
                    if by == h - 1 {
                        add_hole(&mut holes, cx, cy, cx + new_bl - 1, by);
                    }
                    cur_bl = new_bl;
                }
            }
        }

        for hole in &mut holes {
            hole.bb.update_xy(
                self.cell_list_x[hole.x1 as usize].e1.coor,
                self.cell_list_y[hole.y1 as usize].e1.coor,
            );
            hole.bb.update_xy(
                self.cell_list_x[hole.x2 as usize].e2.coor,
                self.cell_list_y[hole.y2 as usize].e2.coor,
            );
        }
        holes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Point;

    fn elem(w: f64, x1: u32, x2: u32, pad1: f64, pad2: f64) -> GridElement {
        let mut e = GridElement {
            grid_x1: x1,
            grid_x2: x2,
            ..GridElement::default()
        };
        e.full_bb.update(Point::new(0.0, 0.0));
        e.full_bb.update(Point::new(w, 0.0));
        e.area_bb.update_box(&e.full_bb);
        e.full_bb.min.x -= pad1;
        e.full_bb.max.x += pad2;
        e
    }

    #[test]
    fn single_row_packs_with_padding() {
        let mut grid = Grid::new();
        grid.element_list.push(elem(400.0, 0, 0, 20.0, 20.0));
        grid.element_list.push(elem(600.0, 1, 1, 20.0, 20.0));
        grid.init(12.0, 0.0);
        grid.solve();
        let c0 = &grid.cell_list_x[0];
        let c1 = &grid.cell_list_x[1];
        assert!((c0.e2.coor - c0.e1.coor - 400.0).abs() < 0.01);
        assert!((c1.e2.coor - c1.e1.coor - 600.0).abs() < 0.01);
        // Neighboring cells must not overlap including decoration padding
        // and the cell margin.
        assert!(c1.e1.coor - c0.e2.coor >= 12.0 - 0.05);
    }

    #[test]
    fn spanning_chart_aligns_cells() {
        let mut grid = Grid::new();
        grid.element_list.push(elem(100.0, 0, 0, 0.0, 0.0));
        grid.element_list.push(elem(100.0, 1, 1, 0.0, 0.0));
        grid.element_list.push(elem(300.0, 0, 1, 0.0, 0.0));
        grid.init(0.0, 0.0);
        grid.solve();
        let c0 = &grid.cell_list_x[0];
        let c1 = &grid.cell_list_x[1];
        // The spanning chart forces the two cells to cover its width.
        assert!(c1.e2.coor - c0.e1.coor >= 300.0 - 0.05);
    }

    #[test]
    fn holes_are_found_and_ranked_largest() {
        let mut grid = Grid::new();
        grid.element_list.push(GridElement {
            grid_x1: 0,
            grid_y1: 0,
            grid_x2: 1,
            grid_y2: 1,
            ..GridElement::default()
        });
        grid.element_list.push(GridElement {
            grid_x1: 3,
            grid_y1: 0,
            grid_x2: 4,
            grid_y2: 1,
            ..GridElement::default()
        });
        grid.element_list.push(GridElement {
            grid_x1: 0,
            grid_y1: 3,
            grid_x2: 2,
            grid_y2: 4,
            ..GridElement::default()
        });
        grid.init(0.0, 0.0);
        let holes = grid.get_holes();
        assert!(!holes.is_empty());
        // Column 2 rows 0..2 is empty, as is the whole of row 2.
        assert!(holes
            .iter()
            .any(|hole| hole.x1 == 2 && hole.x2 == 2 && hole.y1 == 0));
        assert!(holes.iter().any(|hole| hole.y1 == 2 && hole.y2 == 2));
    }
}
