//! PDF page sink.
//!
//! Each badge becomes an 8-bit DeviceRGB image XObject (Flate-compressed)
//! drawn into its cell with a `cm` transform. Alpha is flattened onto white
//! first. Objects accumulate in memory as pages close; nothing reaches the
//! writer until [`finish`](PageSink::finish), so a large batch holds every
//! compressed badge until then and the output file stays empty.
//!
//! Object numbering: 1 = catalog, 2 = page tree, then sequential.

use flate2::Compression;
use flate2::write::ZlibEncoder;
use image::RgbaImage;
use pdf_writer::{Content, Filter, Name, Pdf, Rect, Ref};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::debug;

use super::sink::PageSink;
use crate::error::BadgeError;
use crate::layout::Placement;

struct OpenPage {
    index: usize,
    content: Content,
    /// XObject resource names used on this page.
    images: Vec<(String, Ref)>,
}

/// Writes placed badges as a PDF document to `W`.
pub struct PdfSink<W: Write> {
    out: W,
    finished: bool,
    pdf: Pdf,
    catalog_id: Ref,
    page_tree_id: Ref,
    next_ref: i32,
    page_width: f32,
    page_height: f32,
    pages: Vec<Ref>,
    current: Option<OpenPage>,
}

impl PdfSink<File> {
    /// Create the output file immediately; it stays on disk (possibly empty)
    /// even if the export later fails.
    pub fn create(path: &Path, page_width: f32, page_height: f32) -> Result<Self, BadgeError> {
        let file = File::create(path)?;
        Ok(Self::new(file, page_width, page_height))
    }
}

impl PdfSink<Vec<u8>> {
    pub fn in_memory(page_width: f32, page_height: f32) -> Self {
        Self::new(Vec::new(), page_width, page_height)
    }
}

impl<W: Write> PdfSink<W> {
    pub fn new(out: W, page_width: f32, page_height: f32) -> Self {
        Self {
            out,
            finished: false,
            pdf: Pdf::new(),
            catalog_id: Ref::new(1),
            page_tree_id: Ref::new(2),
            next_ref: 3,
            page_width,
            page_height,
            pages: Vec::new(),
            current: None,
        }
    }

    /// Number of pages closed so far.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// The underlying writer. Holds the document once
    /// [`finish`](PageSink::finish) has run.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn alloc(&mut self) -> Ref {
        let id = Ref::new(self.next_ref);
        self.next_ref += 1;
        id
    }

    fn write_image(&mut self, badge: &RgbaImage) -> Result<Ref, BadgeError> {
        let (width, height) = badge.dimensions();
        let rgb = flatten_on_white(badge);

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&rgb)?;
        let compressed = encoder.finish()?;

        let image_id = self.alloc();
        {
            let mut image = self.pdf.image_xobject(image_id, &compressed);
            image.filter(Filter::FlateDecode);
            image.width(width as i32);
            image.height(height as i32);
            image.color_space().device_rgb();
            image.bits_per_component(8);
        }
        Ok(image_id)
    }

    fn write_page(&mut self, open: OpenPage) {
        let content_id = self.alloc();
        let page_id = self.alloc();

        let bytes = open.content.finish();
        self.pdf.stream(content_id, &bytes);

        let mut page = self.pdf.page(page_id);
        page.media_box(Rect::new(0.0, 0.0, self.page_width, self.page_height));
        page.parent(self.page_tree_id);
        page.contents(content_id);
        {
            let mut resources = page.resources();
            let mut x_objects = resources.x_objects();
            for (name, id) in &open.images {
                x_objects.pair(Name(name.as_bytes()), *id);
            }
        }
        drop(page);

        debug!(page = open.index, images = open.images.len(), "Wrote PDF page");
        self.pages.push(page_id);
    }
}

/// Composite RGBA over white and drop alpha.
fn flatten_on_white(badge: &RgbaImage) -> Vec<u8> {
    let mut rgb = Vec::with_capacity((badge.width() * badge.height() * 3) as usize);
    for pixel in badge.pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = a as u32;
        for channel in [r, g, b] {
            let value = (channel as u32 * alpha + 255 * (255 - alpha) + 127) / 255;
            rgb.push(value as u8);
        }
    }
    rgb
}

impl<W: Write> PageSink for PdfSink<W> {
    fn place(&mut self, badge: &RgbaImage, placement: &Placement) -> Result<(), BadgeError> {
        if self.current.as_ref().is_some_and(|p| p.index != placement.page) {
            self.end_page()?;
        }

        let image_id = self.write_image(badge)?;

        let open = self.current.get_or_insert_with(|| OpenPage {
            index: placement.page,
            content: Content::new(),
            images: Vec::new(),
        });
        let name = format!("Im{}", open.images.len());
        open.content.save_state();
        open.content.transform([
            placement.width,
            0.0,
            0.0,
            placement.height,
            placement.x,
            placement.y,
        ]);
        open.content.x_object(Name(name.as_bytes()));
        open.content.restore_state();
        open.images.push((name, image_id));
        Ok(())
    }

    fn end_page(&mut self) -> Result<(), BadgeError> {
        if let Some(open) = self.current.take() {
            self.write_page(open);
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), BadgeError> {
        if self.finished {
            return Err(BadgeError::Pdf("Document already finished".to_string()));
        }
        self.end_page()?;

        // An empty batch still produces a valid one-page document.
        if self.pages.is_empty() {
            self.write_page(OpenPage {
                index: 0,
                content: Content::new(),
                images: Vec::new(),
            });
        }

        let count = self.pages.len() as i32;
        self.pdf
            .pages(self.page_tree_id)
            .kids(self.pages.iter().copied())
            .count(count);
        self.pdf.catalog(self.catalog_id).pages(self.page_tree_id);

        let pdf = std::mem::replace(&mut self.pdf, Pdf::new());
        let bytes = pdf.finish();

        self.finished = true;
        self.out.write_all(&bytes)?;
        self.out.flush()?;
        Ok(())
    }
}
