//! Page sinks: where placed badges end up.
//!
//! The export driver only decides *what* goes *where*; a [`PageSink`] turns
//! that into a document. Pages are opened lazily: the first placement with a
//! new page index opens that page.

use image::RgbaImage;

use crate::error::BadgeError;
use crate::layout::Placement;

/// A multi-page, fixed-page-size document being assembled.
pub trait PageSink {
    /// Put a badge at `placement`, opening `placement.page` if needed.
    fn place(&mut self, badge: &RgbaImage, placement: &Placement) -> Result<(), BadgeError>;

    /// Close the current page. A no-op when no page is open.
    fn end_page(&mut self) -> Result<(), BadgeError>;

    /// Close any open page and write the document out.
    fn finish(&mut self) -> Result<(), BadgeError>;
}

/// One page as seen by a [`RecordingSink`].
#[cfg(any(test, feature = "testing"))]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordedPage {
    pub placements: Vec<Placement>,
    /// Pixel dimensions of each placed badge, parallel to `placements`.
    pub badge_sizes: Vec<(u32, u32)>,
    pub closed: bool,
}

/// In-memory sink that records geometry instead of producing a file.
///
/// `fail_on_place` injects a write failure at the given badge index. Only
/// built for tests or with the `testing` feature.
#[cfg(any(test, feature = "testing"))]
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub pages: Vec<RecordedPage>,
    pub finished: bool,
    pub fail_on_place: Option<usize>,
}

#[cfg(any(test, feature = "testing"))]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_at(index: usize) -> Self {
        Self {
            fail_on_place: Some(index),
            ..Self::default()
        }
    }

    /// Every placement across all pages, in order.
    pub fn placements(&self) -> impl Iterator<Item = &Placement> {
        self.pages.iter().flat_map(|p| p.placements.iter())
    }
}

#[cfg(any(test, feature = "testing"))]
impl PageSink for RecordingSink {
    fn place(&mut self, badge: &RgbaImage, placement: &Placement) -> Result<(), BadgeError> {
        if self.fail_on_place == Some(placement.index) {
            return Err(BadgeError::Pdf(format!(
                "Injected write failure at badge {}",
                placement.index
            )));
        }
        let needs_page = match self.pages.last() {
            Some(page) => page.closed || self.pages.len() <= placement.page,
            None => true,
        };
        if needs_page {
            self.pages.push(RecordedPage::default());
        }
        if let Some(page) = self.pages.last_mut() {
            page.placements.push(*placement);
            page.badge_sizes.push(badge.dimensions());
        }
        Ok(())
    }

    fn end_page(&mut self) -> Result<(), BadgeError> {
        if let Some(page) = self.pages.last_mut() {
            page.closed = true;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), BadgeError> {
        self.end_page()?;
        self.finished = true;
        Ok(())
    }
}
