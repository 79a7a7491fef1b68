//! PDF audit reports.
//!
//! The layout is fixed: a header with the optional logo, a details table,
//! the items table with up to three linked thumbnails per row, and a
//! sign-off block with the signature and selfie. Images are fetched by URL
//! beforehand (see [`fetch_report_images`]) so rendering itself is pure.

mod pdf;

use crate::media::flatten_on_white;
use crate::{AuditError, Result};
use chrono::{DateTime, Utc};
use fieldops_backend::ObjectStore;
use fieldops_protocol::{Checklist, ChecklistItem, EvidenceType, MediaRef, QuestionType, User};
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use pdf::{wrap, JpegImage, PdfWriter, PAGE_HEIGHT, PAGE_WIDTH};
use std::collections::HashMap;

/// Raw image bytes keyed by URL.
pub type ReportImages = HashMap<String, Vec<u8>>;

/// Thumbnails shown per item row.
pub const MAX_THUMBNAILS: usize = 3;

const MARGIN: f32 = 40.0;
const FOOTER: f32 = 50.0;
const CONTENT_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN;
const THUMB: f32 = 32.0;
const THUMB_GAP: f32 = 4.0;
const LINE: f32 = 11.0;
const BODY: f32 = 9.0;

/// Column x offsets and widths for `#`, Question, Answer, Notes, Photos.
const COLUMNS: [(f32, f32); 5] = [
    (0.0, 25.0),
    (25.0, 170.0),
    (195.0, 80.0),
    (275.0, 130.0),
    (405.0, 110.0),
];
const HEADINGS: [&str; 5] = ["#", "Question", "Answer", "Notes", "Photos"];

/// Everything a report is drawn from.
#[derive(Debug, Clone, Copy)]
pub struct ReportContext<'a> {
    pub checklist: &'a Checklist,
    pub auditor: Option<&'a User>,
    pub logo: Option<&'a [u8]>,
    pub generated_at: DateTime<Utc>,
}

/// URLs of every image the report embeds, in drawing order.
pub fn report_image_urls(checklist: &Checklist) -> Vec<String> {
    let mut urls = Vec::new();
    for item in &checklist.items {
        if item.definition.evidence_type == EvidenceType::Photo {
            urls.extend(
                item.evidence
                    .iter()
                    .filter_map(MediaRef::url)
                    .take(MAX_THUMBNAILS)
                    .map(str::to_string),
            );
        }
    }
    for media in [&checklist.auditor_signature, &checklist.selfie].into_iter().flatten() {
        if let Some(url) = media.url() {
            urls.push(url.to_string());
        }
    }
    urls
}

/// Download the images a report needs, reusing bytes already at hand.
///
/// A failed download is logged and the image is drawn as an empty box.
pub async fn fetch_report_images(
    checklist: &Checklist,
    objects: &dyn ObjectStore,
    mut known: ReportImages,
) -> ReportImages {
    for url in report_image_urls(checklist) {
        if known.contains_key(&url) {
            continue;
        }
        match objects.download(&url).await {
            Ok(bytes) => {
                known.insert(url, bytes);
            }
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Could not fetch image for report");
            }
        }
    }
    known
}

/// Decode, shrink and re-encode an image for embedding.
fn thumbnail(bytes: &[u8], max_px: u32) -> Option<JpegImage> {
    let img = image::load_from_memory(bytes).ok()?;
    let small = img.thumbnail(max_px, max_px);
    let flat = DynamicImage::ImageRgb8(flatten_on_white(&small));
    let mut buf = Vec::new();
    flat.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, 75))
        .ok()?;
    Some(JpegImage {
        bytes: buf,
        width: flat.width(),
        height: flat.height(),
    })
}

/// Scale an image into a box, keeping its aspect ratio. Returns offsets and size.
fn fit(image: &JpegImage, box_w: f32, box_h: f32) -> (f32, f32, f32, f32) {
    let (iw, ih) = (image.width.max(1) as f32, image.height.max(1) as f32);
    let scale = (box_w / iw).min(box_h / ih);
    let (w, h) = (iw * scale, ih * scale);
    ((box_w - w) / 2.0, (box_h - h) / 2.0, w, h)
}

fn format_time(value: Option<DateTime<Utc>>) -> String {
    value
        .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn answer_text(item: &ChecklistItem) -> String {
    let base = match (&item.value, item.question_type()) {
        (_, QuestionType::Photo) => format!("{} photo(s)", item.evidence.len()),
        (Some(answer), QuestionType::Signature) if !answer.is_blank() => {
            format!("Signed: {}", answer.display())
        }
        (Some(answer), _) if !answer.is_blank() => answer.display(),
        _ => "-".to_string(),
    };
    match &item.finding {
        Some(finding) => format!(
            "{} [{} priority, due {}]",
            base,
            finding.priority.as_str(),
            finding.due_date
        ),
        None => base,
    }
}

struct Renderer<'a> {
    writer: PdfWriter,
    images: &'a ReportImages,
    thumbs: HashMap<String, Option<JpegImage>>,
    top: f32,
}

impl<'a> Renderer<'a> {
    fn ensure_space(&mut self, height: f32) -> bool {
        if self.top + height > PAGE_HEIGHT - FOOTER {
            self.writer.new_page();
            self.top = MARGIN;
            true
        } else {
            false
        }
    }

    fn jpeg_for(&mut self, url: &str, max_px: u32) -> Option<JpegImage> {
        if !self.thumbs.contains_key(url) {
            let thumb = self.images.get(url).and_then(|bytes| thumbnail(bytes, max_px));
            if thumb.is_none() {
                tracing::debug!(url, "No image available for report, drawing placeholder");
            }
            self.thumbs.insert(url.to_string(), thumb);
        }
        self.thumbs.get(url).cloned().flatten()
    }

    fn draw_image_box(&mut self, url: &str, x: f32, top: f32, w: f32, h: f32, max_px: u32) {
        match self.jpeg_for(url, max_px) {
            Some(jpeg) => {
                let name = self.writer.register_jpeg(url, &jpeg);
                let (dx, dy, iw, ih) = fit(&jpeg, w, h);
                self.writer.image(&name, x + dx, top + dy, iw, ih);
            }
            None => {
                self.writer.fill_rect(x, top, w, h, 0.92);
                self.writer.stroke_rect(x, top, w, h);
            }
        }
        self.writer.link(x, top, w, h, url);
    }

    fn header(&mut self, checklist: &Checklist, logo: Option<&[u8]>) {
        let mut text_x = MARGIN;
        if let Some(jpeg) = logo.and_then(|bytes| thumbnail(bytes, 256)) {
            let name = self.writer.register_jpeg("logo", &jpeg);
            let (dx, dy, w, h) = fit(&jpeg, 48.0, 48.0);
            self.writer.image(&name, MARGIN + dx, self.top + dy, w, h);
            text_x += 60.0;
        }
        self.writer.text(text_x, self.top + 22.0, 20.0, true, "Audit Report");
        self.writer
            .text(text_x, self.top + 40.0, 11.0, false, &checklist.title);
        self.top += 58.0;
        self.writer
            .line(MARGIN, self.top, MARGIN + CONTENT_WIDTH, self.top, 1.0);
        self.top += 14.0;
    }

    fn details(&mut self, checklist: &Checklist, auditor: Option<&User>) {
        let rows = [
            ("Checklist", checklist.title.clone()),
            (
                "Location",
                checklist.location.clone().unwrap_or_else(|| "-".into()),
            ),
            (
                "Auditor",
                auditor
                    .map(|u| u.display_name().to_string())
                    .unwrap_or_else(|| "Unknown".into()),
            ),
            (
                "Due date",
                checklist
                    .due_date
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "-".into()),
            ),
            ("Check-in", format_time(checklist.check_in_time)),
            ("Check-out", format_time(checklist.check_out_time)),
            ("Status", checklist.status.as_str().to_string()),
        ];
        for (index, (label, value)) in rows.iter().enumerate() {
            if index % 2 == 0 {
                self.writer
                    .fill_rect(MARGIN, self.top, CONTENT_WIDTH, 16.0, 0.95);
            }
            self.writer
                .text(MARGIN + 4.0, self.top + 11.0, BODY, true, label);
            self.writer
                .text(MARGIN + 110.0, self.top + 11.0, BODY, false, value);
            self.top += 16.0;
        }
        self.top += 18.0;
    }

    fn table_header(&mut self) {
        self.writer
            .fill_rect(MARGIN, self.top, CONTENT_WIDTH, 18.0, 0.85);
        for ((x, _), heading) in COLUMNS.iter().zip(HEADINGS) {
            self.writer
                .text(MARGIN + x + 4.0, self.top + 12.0, BODY, true, heading);
        }
        self.top += 18.0;
    }

    fn item_row(&mut self, number: usize, item: &ChecklistItem) {
        let cell = |col: usize| COLUMNS[col].1 - 8.0;
        let question = wrap(&item.definition.question, BODY, cell(1));
        let answer = wrap(&answer_text(item), BODY, cell(2));
        let notes = wrap(item.note_text(), BODY, cell(3));
        let media: Vec<&str> = item
            .evidence
            .iter()
            .filter_map(MediaRef::url)
            .take(MAX_THUMBNAILS)
            .collect();

        let lines = question.len().max(answer.len()).max(notes.len());
        let text_height = lines as f32 * LINE + 8.0;
        let media_height = if media.is_empty() { 0.0 } else { THUMB + 8.0 };
        let height = text_height.max(media_height).max(20.0);

        if self.ensure_space(height) {
            self.table_header();
        }
        if number % 2 == 0 {
            self.writer
                .fill_rect(MARGIN, self.top, CONTENT_WIDTH, height, 0.97);
        }

        let number_text = number.to_string();
        let columns = [
            (1, question.as_slice()),
            (2, answer.as_slice()),
            (3, notes.as_slice()),
        ];
        self.writer
            .text(MARGIN + 4.0, self.top + 12.0, BODY, false, &number_text);
        for (col, text) in columns {
            for (i, line) in text.iter().enumerate() {
                self.writer.text(
                    MARGIN + COLUMNS[col].0 + 4.0,
                    self.top + 12.0 + i as f32 * LINE,
                    BODY,
                    false,
                    line,
                );
            }
        }

        let mut x = MARGIN + COLUMNS[4].0 + 4.0;
        for url in media {
            match item.definition.evidence_type {
                EvidenceType::Photo => self.draw_image_box(url, x, self.top + 4.0, THUMB, THUMB, 128),
                EvidenceType::Video => {
                    self.writer.fill_rect(x, self.top + 4.0, THUMB, THUMB, 0.3);
                    self.writer.play_glyph(x, self.top + 4.0, THUMB, THUMB);
                    self.writer.link(x, self.top + 4.0, THUMB, THUMB, url);
                }
            }
            x += THUMB + THUMB_GAP;
        }

        self.top += height;
        self.writer
            .line(MARGIN, self.top, MARGIN + CONTENT_WIDTH, self.top, 0.3);
    }

    fn sign_off(&mut self, checklist: &Checklist, auditor: Option<&User>) {
        self.top += 20.0;
        self.ensure_space(130.0);
        self.writer
            .text(MARGIN, self.top + 12.0, 13.0, true, "Sign-off");
        self.top += 22.0;

        let boxes = [
            ("Auditor Signature", &checklist.auditor_signature, MARGIN, 160.0),
            ("Selfie", &checklist.selfie, MARGIN + 200.0, 70.0),
        ];
        for (label, media, x, width) in boxes {
            self.writer.text(x, self.top + 9.0, BODY, true, label);
            let url = media.as_ref().and_then(|m| m.url());
            match url {
                Some(url) => self.draw_image_box(url, x, self.top + 14.0, width, 70.0, 320),
                None => {
                    self.writer.stroke_rect(x, self.top + 14.0, width, 70.0);
                    self.writer
                        .text(x + 6.0, self.top + 52.0, BODY, false, "Not provided");
                }
            }
        }
        self.top += 94.0;

        let name = auditor
            .map(|u| u.display_name().to_string())
            .unwrap_or_else(|| "Unknown auditor".into());
        self.writer.text(MARGIN, self.top + 10.0, BODY, false, &name);
        self.writer.text(
            MARGIN,
            self.top + 10.0 + LINE,
            BODY,
            false,
            &format!("Checked out {}", format_time(checklist.check_out_time)),
        );
        self.top += 30.0;
    }

    fn footers(&mut self, generated_at: DateTime<Utc>) {
        let total = self.writer.page_count();
        let stamp = format!("Generated {}", format_time(Some(generated_at)));
        for page in 0..total {
            let top = PAGE_HEIGHT - 24.0;
            self.writer.text_on(Some(page), MARGIN, top, 8.0, false, &stamp);
            self.writer.text_on(
                Some(page),
                PAGE_WIDTH - MARGIN - 60.0,
                top,
                8.0,
                false,
                &format!("Page {} of {}", page + 1, total),
            );
        }
    }
}

/// Render the report for a persisted checklist.
pub fn render_report(ctx: &ReportContext<'_>, images: &ReportImages) -> Result<Vec<u8>> {
    let checklist = ctx.checklist;
    let mut renderer = Renderer {
        writer: PdfWriter::new(),
        images,
        thumbs: HashMap::new(),
        top: MARGIN,
    };

    renderer.header(checklist, ctx.logo);
    renderer.details(checklist, ctx.auditor);

    renderer
        .writer
        .text(MARGIN, renderer.top, 13.0, true, "Checklist Items");
    renderer.top += 10.0;
    renderer.table_header();
    for (index, item) in checklist.items.iter().enumerate() {
        renderer.item_row(index + 1, item);
    }

    renderer.sign_off(checklist, ctx.auditor);
    renderer.footers(ctx.generated_at);

    let pages = renderer.writer.page_count();
    let bytes = renderer.writer.finish().map_err(AuditError::Report)?;
    tracing::debug!(
        checklist_id = %checklist.id,
        pages,
        size = bytes.len(),
        "Rendered audit report"
    );
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use fieldops_ids::{ChecklistId, ItemId, UserId};
    use fieldops_protocol::{
        Answer, ChecklistStatus, Finding, ItemDefinition, Role, TaskPriority, TaskStatus, YesNo,
    };
    use image::{ImageFormat, Rgb, RgbImage};
    use lopdf::Document;
    use std::io::Cursor;

    fn png() -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 30, Rgb([10, 120, 200])))
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    fn contains(haystack: &[u8], needle: &str) -> bool {
        haystack
            .windows(needle.len())
            .any(|w| w == needle.as_bytes())
    }

    fn checklist(items: usize) -> Checklist {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let items = (0..items)
            .map(|i| {
                let mut item = ChecklistItem::from_definition(ItemDefinition::new(
                    ItemId::parse(&format!("q{}", i)).unwrap(),
                    format!("Is station {} clean and stocked for the morning shift?", i),
                    QuestionType::YesNo,
                ));
                item.value = Some(Answer::YesNo(YesNo::Yes));
                item
            })
            .collect();
        Checklist {
            id: ChecklistId::new(),
            title: "Opening checklist".into(),
            location: Some("Jakarta-1".into()),
            assigned_to: None,
            due_date: now.date_naive().into(),
            status: ChecklistStatus::Completed,
            items,
            check_in_time: Some(now),
            check_out_time: Some(now),
            auditor_signature: Some(MediaRef::Url("https://cdn.test/sig.jpg".into())),
            selfie: None,
            report_url: None,
            created_at: None,
        }
    }

    fn auditor() -> User {
        User {
            id: UserId::new(),
            name: Some("Dewi".into()),
            email: "dewi@example.com".into(),
            role: Role::Auditor,
            avatar_url: None,
            location: None,
        }
    }

    #[test]
    fn test_report_embeds_thumbnails_and_links() {
        let mut list = checklist(2);
        let photo_url = "https://cdn.test/q0/1.jpg".to_string();
        let video_url = "https://cdn.test/q1/1.webm".to_string();
        list.items[0].value = Some(Answer::YesNo(YesNo::No));
        list.items[0].evidence = vec![MediaRef::Url(photo_url.clone())];
        list.items[0].finding = Some(Finding {
            id: None,
            title: "Issue with: station".into(),
            checklist_item_id: list.items[0].id().clone(),
            checklist_id: list.id.clone(),
            priority: TaskPriority::Medium,
            assigned_to: None,
            due_date: chrono::NaiveDate::from_ymd_opt(2024, 3, 8).unwrap(),
            status: TaskStatus::Open,
            description: String::new(),
            photo: None,
            proof_of_fix: None,
            created_at: Utc::now(),
        });
        list.items[1].definition.evidence_type = EvidenceType::Video;
        list.items[1].evidence = vec![MediaRef::Url(video_url.clone())];

        let mut images = ReportImages::new();
        images.insert(photo_url.clone(), png());
        images.insert("https://cdn.test/sig.jpg".into(), png());

        let user = auditor();
        let logo = png();
        let ctx = ReportContext {
            checklist: &list,
            auditor: Some(&user),
            logo: Some(&logo),
            generated_at: Utc::now(),
        };
        let bytes = render_report(&ctx, &images).unwrap();

        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
        assert!(contains(&bytes, "Audit Report"));
        assert!(contains(&bytes, &photo_url));
        assert!(contains(&bytes, &video_url));
        assert!(contains(&bytes, "DCTDecode"));
        assert!(contains(&bytes, "Dewi"));
    }

    #[test]
    fn test_long_checklist_paginates() {
        let list = checklist(60);
        let ctx = ReportContext {
            checklist: &list,
            auditor: None,
            logo: None,
            generated_at: Utc::now(),
        };
        let bytes = render_report(&ctx, &ReportImages::new()).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        assert!(doc.get_pages().len() > 1);
        assert!(contains(&bytes, "Unknown"));
    }

    #[test]
    fn test_undecodable_image_draws_placeholder() {
        let mut list = checklist(1);
        list.items[0].evidence = vec![MediaRef::Url("https://cdn.test/broken.jpg".into())];
        let mut images = ReportImages::new();
        images.insert("https://cdn.test/broken.jpg".into(), b"junk".to_vec());

        let ctx = ReportContext {
            checklist: &list,
            auditor: None,
            logo: Some(&b"also junk"[..]),
            generated_at: Utc::now(),
        };
        let bytes = render_report(&ctx, &images).unwrap();
        assert!(Document::load_mem(&bytes).is_ok());
        assert!(!contains(&bytes, "DCTDecode"));
    }

    #[test]
    fn test_image_urls_skip_video_and_cap_thumbnails() {
        let mut list = checklist(2);
        list.items[0].evidence = (0..5)
            .map(|i| MediaRef::Url(format!("https://cdn.test/{}.jpg", i)))
            .collect();
        list.items[1].definition.evidence_type = EvidenceType::Video;
        list.items[1].evidence = vec![MediaRef::Url("https://cdn.test/v.webm".into())];

        let urls = report_image_urls(&list);
        assert_eq!(urls.len(), MAX_THUMBNAILS + 1);
        assert!(!urls.iter().any(|u| u.ends_with(".webm")));
        assert_eq!(urls.last().unwrap(), "https://cdn.test/sig.jpg");
    }
}
