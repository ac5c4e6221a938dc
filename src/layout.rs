//! # Page Layout
//!
//! Packs badges into a fixed grid of cells on each page.
//!
//! All values are PDF points (1/72 inch) with the origin at the **bottom-left**
//! of the page. Rows are counted top-down, so row 0 is the topmost row:
//!
//! ```text
//!  page_h ┌───────────────────────────┐
//!         │ margin                    │
//!         │  ┌──────┐ sp ┌──────┐     │  row 0
//!         │  │ cell │    │ cell │     │
//!         │  └──────┘    └──────┘     │
//!         │     spacing               │
//!         │  ┌──────┐    ┌──────┐     │  row 1
//!         │  └──────┘    └──────┘     │
//!       0 └───────────────────────────┘
//!         0                        page_w
//! ```
//!
//! Each badge is scaled to fit its cell with the aspect ratio preserved and
//! centered inside the cell.

use serde::Serialize;

use crate::template::Template;

/// Millimetres to PDF points.
pub const MM_TO_PT: f32 = 72.0 / 25.4;

/// Grid geometry shared by every page of an export.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CellLayout {
    pub page_width: f32,
    pub page_height: f32,
    pub margin: f32,
    pub spacing: f32,
    pub usable_width: f32,
    pub usable_height: f32,
    pub columns: u32,
    pub rows: u32,
    pub cell_width: f32,
    pub cell_height: f32,
    /// Badge size inside a cell, aspect preserved.
    pub draw_width: f32,
    pub draw_height: f32,
}

/// Where one badge goes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Placement {
    /// Global badge index across the batch.
    pub index: usize,
    pub page: usize,
    pub col: u32,
    pub row_on_page: u32,
    /// Bottom-left corner of the drawn badge.
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl CellLayout {
    /// Compute the grid for a template's page options.
    ///
    /// Run [`Template::validate`] first for a meaningful grid; a zero grid
    /// dimension is treated as 1 so packing never divides by zero.
    pub fn compute(template: &Template) -> Self {
        let (page_width, page_height) = template.page_size.dimensions_pt();
        let margin = template.margin_mm * MM_TO_PT;
        let spacing = template.spacing_mm * MM_TO_PT;

        let usable_width = page_width - 2.0 * margin;
        let usable_height = page_height - 2.0 * margin;

        let columns = template.columns_per_page.max(1);
        let rows = template.rows_per_page.max(1);

        let cell_width = (usable_width - (columns as f32 - 1.0) * spacing) / columns as f32;
        let cell_height = (usable_height - (rows as f32 - 1.0) * spacing) / rows as f32;

        let badge_w = template.width as f32;
        let badge_h = template.height.max(1) as f32;

        // badge_w/badge_h > cell_w/cell_h, cross-multiplied
        let (draw_width, draw_height) = if badge_w * cell_height > badge_h * cell_width {
            (cell_width, cell_width * badge_h / badge_w)
        } else {
            (cell_height * badge_w / badge_h, cell_height)
        };

        Self {
            page_width,
            page_height,
            margin,
            spacing,
            usable_width,
            usable_height,
            columns,
            rows,
            cell_width,
            cell_height,
            draw_width,
            draw_height,
        }
    }

    /// Badges per page. Saturates instead of overflowing on huge grids.
    pub fn badges_per_page(&self) -> usize {
        (self.columns as usize)
            .checked_mul(self.rows as usize)
            .unwrap_or(usize::MAX)
    }

    /// Pages needed for `count` badges. Zero badges need zero pages.
    pub fn page_count(&self, count: usize) -> usize {
        count.div_ceil(self.badges_per_page())
    }

    /// Placement of badge `index`.
    pub fn place(&self, index: usize) -> Placement {
        let per_page = self.badges_per_page();
        let local = index % per_page;
        let col = (local % self.columns as usize) as u32;
        let row_on_page = (local / self.columns as usize) as u32;

        let x = self.margin
            + col as f32 * (self.cell_width + self.spacing)
            + (self.cell_width - self.draw_width) / 2.0;
        let y = self.page_height
            - self.margin
            - (row_on_page as f32 + 1.0) * self.cell_height
            - row_on_page as f32 * self.spacing
            + (self.cell_height - self.draw_height) / 2.0;

        Placement {
            index,
            page: index / per_page,
            col,
            row_on_page,
            x,
            y,
            width: self.draw_width,
            height: self.draw_height,
        }
    }

    /// True when badge `index` fills the last cell of its page and more
    /// badges follow, i.e. a new page must be started after it.
    pub fn page_break_after(&self, index: usize, total: usize) -> bool {
        let per_page = self.badges_per_page();
        index % per_page == per_page - 1 && index + 1 < total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::PageSize;
    use pretty_assertions::assert_eq;

    const EPS: f32 = 1e-2;

    fn grid(columns: u32, rows: u32) -> Template {
        Template {
            columns_per_page: columns,
            rows_per_page: rows,
            ..Default::default()
        }
    }

    #[test]
    fn test_letter_two_by_four_geometry() {
        let layout = CellLayout::compute(&grid(2, 4));
        assert_eq!((layout.page_width, layout.page_height), (612.0, 792.0));
        assert!((layout.margin - 28.3465).abs() < EPS);
        assert!((layout.spacing - 5.6693).abs() < EPS);
        assert!((layout.cell_width - (612.0 - 2.0 * layout.margin - layout.spacing) / 2.0).abs() < EPS);

        // 1050x600 is wider than a ~275x180 cell: width-constrained.
        assert!((layout.draw_width - layout.cell_width).abs() < EPS);
        assert!(layout.draw_height < layout.cell_height);
        assert!((layout.draw_width / layout.draw_height - 1050.0 / 600.0).abs() < 1e-3);
    }

    #[test]
    fn test_tall_badge_is_height_constrained() {
        let template = Template {
            width: 600,
            height: 1050,
            columns_per_page: 1,
            rows_per_page: 4,
            ..Default::default()
        };
        let layout = CellLayout::compute(&template);
        assert!((layout.draw_height - layout.cell_height).abs() < EPS);
        assert!(layout.draw_width <= layout.cell_width + EPS);
    }

    #[test]
    fn test_scenario_ten_badges_two_by_four() {
        let layout = CellLayout::compute(&grid(2, 4));
        assert_eq!(layout.page_count(10), 2);

        let p7 = layout.place(7);
        assert_eq!((p7.page, p7.col, p7.row_on_page), (0, 1, 3));
        let p8 = layout.place(8);
        assert_eq!((p8.page, p8.col, p8.row_on_page), (1, 0, 0));

        assert!(layout.page_break_after(7, 10));
        assert!(!layout.page_break_after(8, 10));
        assert!(!layout.page_break_after(9, 10));
        // A full final page is not followed by an empty one.
        assert!(!layout.page_break_after(7, 8));
    }

    #[test]
    fn test_page_count_and_page_index_coverage() {
        for (cols, rows) in [(1, 1), (1, 5), (3, 1), (2, 4), (3, 3)] {
            let layout = CellLayout::compute(&grid(cols, rows));
            let per_page = (cols * rows) as usize;
            for count in 0..30usize {
                assert_eq!(layout.page_count(count), count.div_ceil(per_page));
                let breaks = (0..count).filter(|&i| layout.page_break_after(i, count)).count();
                assert_eq!(breaks + usize::from(count > 0), layout.page_count(count));
            }
            for i in 0..30usize {
                assert_eq!(layout.place(i).page, i / per_page);
            }
        }
    }

    #[test]
    fn test_rows_are_top_down_and_fill_usable_area() {
        let layout = CellLayout::compute(&grid(2, 4));
        let top = layout.place(0);
        let bottom = layout.place(6);
        let vpad = (layout.cell_height - layout.draw_height) / 2.0;

        // Row 0 cell top touches the top margin; last row cell bottom touches the bottom margin.
        assert!((top.y - vpad + layout.cell_height - (792.0 - layout.margin)).abs() < EPS);
        assert!((bottom.y - vpad - layout.margin).abs() < EPS);
        assert!(top.y > bottom.y);

        let right = layout.place(1);
        let hpad = (layout.cell_width - layout.draw_width) / 2.0;
        assert!((right.x - hpad + layout.cell_width - (612.0 - layout.margin)).abs() < EPS);
        assert!((top.x - hpad - layout.margin).abs() < EPS);
    }

    #[test]
    fn test_single_column_strip() {
        let template = Template {
            columns_per_page: 1,
            rows_per_page: 3,
            page_size: PageSize::A4,
            margin_mm: 0.0,
            spacing_mm: 0.0,
            ..Default::default()
        };
        let layout = CellLayout::compute(&template);
        assert_eq!(layout.cell_width, layout.page_width);
        for i in 0..6 {
            let p = layout.place(i);
            assert_eq!(p.col, 0);
            assert_eq!(p.row_on_page, (i % 3) as u32);
        }
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_huge_grid_does_not_overflow() {
        let layout = CellLayout::compute(&grid(65536, 65536));
        assert_eq!(layout.badges_per_page(), 65536usize * 65536);
        assert_eq!(layout.page_count(1), 1);
        let p = layout.place(70_000);
        assert_eq!((p.page, p.col, p.row_on_page), (0, 70_000 - 65536, 1));
        assert!(!layout.page_break_after(0, 2));
    }

    #[test]
    fn test_zero_grid_is_treated_as_one() {
        let layout = CellLayout::compute(&grid(0, 0));
        assert_eq!(layout.badges_per_page(), 1);
        assert_eq!(layout.place(3).page, 3);
    }

    #[test]
    fn test_badges_stay_inside_their_cells() {
        let layout = CellLayout::compute(&grid(3, 5));
        for i in 0..15 {
            let p = layout.place(i);
            let cell_x = layout.margin + p.col as f32 * (layout.cell_width + layout.spacing);
            assert!(p.x >= cell_x - EPS);
            assert!(p.x + p.width <= cell_x + layout.cell_width + EPS);
            assert!(p.y >= layout.margin - EPS);
            assert!(p.y + p.height <= layout.page_height - layout.margin + EPS);
        }
    }
}
