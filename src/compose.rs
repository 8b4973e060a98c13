//! Page compositor: draw page bands of a bitmap onto fixed-size PDF pages.
//!
//! Pages are built into an in-memory `lopdf` object graph. Nothing is
//! serialized until [`PdfComposer::to_bytes`], so a failure halfway through
//! composition never yields a partial file.

use crate::paginate::PageBand;
use crate::rendering::Bitmap;
use crate::{Error, Result};
use image::RgbImage;
use log::debug;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use serde::{Deserialize, Serialize};

const POINTS_PER_MM: f32 = 72.0 / 25.4;

/// Physical page size and uniform margin, in millimetres
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageFormat {
    pub width_mm: f32,
    pub height_mm: f32,
    pub margin_mm: f32,
}

impl Default for PageFormat {
    fn default() -> Self {
        Self::a4()
    }
}

impl PageFormat {
    /// A4 portrait with a 5 mm margin
    pub fn a4() -> Self {
        Self {
            width_mm: 210.0,
            height_mm: 297.0,
            margin_mm: 5.0,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let finite = [self.width_mm, self.height_mm, self.margin_mm]
            .iter()
            .all(|v| v.is_finite());
        if !finite || self.margin_mm < 0.0 {
            return Err(Error::Config(format!("invalid page format {:?}", self)));
        }
        if self.printable_width_mm() <= 0.0 || self.printable_height_mm() <= 0.0 {
            return Err(Error::Config(format!(
                "margin {} mm leaves no printable area on a {}x{} mm page",
                self.margin_mm, self.width_mm, self.height_mm
            )));
        }
        Ok(())
    }

    pub fn printable_width_mm(&self) -> f32 {
        self.width_mm - 2.0 * self.margin_mm
    }

    pub fn printable_height_mm(&self) -> f32 {
        self.height_mm - 2.0 * self.margin_mm
    }

    /// Bitmap rows that fit on one page when the bitmap is printed at the
    /// printable width
    pub fn capacity_px(&self, bitmap_width: u32) -> u32 {
        let rows = (self.printable_height_mm() as f64 * bitmap_width as f64
            / self.printable_width_mm() as f64)
            .floor();
        rows.max(0.0) as u32
    }

    /// Printed height in mm of a band `band_height` rows tall
    pub fn printed_height_mm(&self, band_height: u32, bitmap_width: u32) -> f32 {
        if bitmap_width == 0 {
            return 0.0;
        }
        band_height as f32 * self.printable_width_mm() / bitmap_width as f32
    }

    fn size_pt(&self) -> (f32, f32) {
        (self.width_mm * POINTS_PER_MM, self.height_mm * POINTS_PER_MM)
    }
}

/// A multi-page PDF under construction.
///
/// The document always holds a current page; the first band draws onto the
/// initial page and every later band is preceded by [`PdfComposer::add_page`].
pub struct PdfComposer {
    document: Document,
    pages_id: ObjectId,
    page_ids: Vec<ObjectId>,
    current: Vec<Operation>,
    current_images: Vec<(String, ObjectId)>,
    format: PageFormat,
}

impl PdfComposer {
    pub fn new(format: PageFormat) -> Self {
        let mut document = Document::with_version("1.7");
        let pages_id = document.new_object_id();
        Self {
            document,
            pages_id,
            page_ids: Vec::new(),
            current: Vec::new(),
            current_images: Vec::new(),
            format,
        }
    }

    pub fn format(&self) -> &PageFormat {
        &self.format
    }

    /// Pages composed so far, counting the one in progress
    pub fn page_count(&self) -> usize {
        self.page_ids.len() + 1
    }

    /// Finish the current page and start a blank one
    pub fn add_page(&mut self) -> Result<()> {
        self.flush_page()
    }

    /// Draw `pixels` on the current page at the top-left margin, scaled to
    /// the printable width with its aspect ratio preserved
    pub fn draw_band(&mut self, pixels: &RgbImage) -> Result<()> {
        let (w, h) = pixels.dimensions();
        if w == 0 || h == 0 {
            return Err(Error::EncodingFailure("cannot place an empty band".into()));
        }

        let image = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => w as i64,
                "Height" => h as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            },
            pixels.as_raw().clone(),
        );
        let image_id = self.document.add_object(image);
        let name = format!("Im{}", self.current_images.len() + 1);

        let (_, page_h) = self.format.size_pt();
        let margin = self.format.margin_mm * POINTS_PER_MM;
        let draw_w = self.format.printable_width_mm() * POINTS_PER_MM;
        let draw_h = self.format.printed_height_mm(h, w) * POINTS_PER_MM;
        // PDF user space grows upward from the bottom-left corner
        let y = page_h - margin - draw_h;

        self.current.extend([
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    draw_w.into(),
                    0.into(),
                    0.into(),
                    draw_h.into(),
                    margin.into(),
                    y.into(),
                ],
            ),
            Operation::new("Do", vec![Object::Name(name.as_bytes().to_vec())]),
            Operation::new("Q", vec![]),
        ]);
        self.current_images.push((name, image_id));
        Ok(())
    }

    fn flush_page(&mut self) -> Result<()> {
        let content = Content {
            operations: std::mem::take(&mut self.current),
        };
        let content_id = self
            .document
            .add_object(Stream::new(dictionary! {}, content.encode()?));

        let mut xobjects = lopdf::Dictionary::new();
        for (name, id) in self.current_images.drain(..) {
            xobjects.set(name, id);
        }

        let (page_w, page_h) = self.format.size_pt();
        let page_id = self.document.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![0.into(), 0.into(), page_w.into(), page_h.into()],
            "Contents" => content_id,
            "Resources" => dictionary! { "XObject" => xobjects },
        });
        self.page_ids.push(page_id);
        Ok(())
    }

    /// Close the last page and serialize the whole document
    pub fn to_bytes(mut self) -> Result<Vec<u8>> {
        self.flush_page()?;

        let kids: Vec<Object> = self.page_ids.iter().map(|id| Object::from(*id)).collect();
        let pages_dict = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => self.page_ids.len() as i64,
        };
        self.document
            .objects
            .insert(self.pages_id, Object::Dictionary(pages_dict));

        let catalog_id = self.document.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.document.trailer.set("Root", catalog_id);
        self.document.compress();

        let mut out = Vec::new();
        self.document.save_to(&mut out)?;
        Ok(out)
    }
}

/// Draw every band of `bitmap` on its own page, in order.
///
/// An empty `bands` slice leaves the initial page blank.
pub fn compose(bitmap: &Bitmap, bands: &[PageBand], format: &PageFormat) -> Result<PdfComposer> {
    format.validate()?;
    let mut composer = PdfComposer::new(*format);
    for (i, band) in bands.iter().enumerate() {
        if i > 0 {
            composer.add_page()?;
        }
        composer.draw_band(&bitmap.slice(*band))?;
    }
    debug!(
        "composed {} page(s) from a {}x{} bitmap",
        composer.page_count(),
        bitmap.width(),
        bitmap.height()
    );
    Ok(composer)
}
