//! Small media payloads and rows for tests.

use fieldops_ids::{ItemId, UserId};
use fieldops_protocol::{
    ChecklistTemplate, ItemDefinition, MediaRef, QuestionType, Role, TemplateId, User,
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

/// A solid-colour PNG of the given size.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([200, 40, 40]));
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, ImageFormat::Png)
        .expect("encode fixture png");
    buf.into_inner()
}

/// A PNG as a local `data:` payload.
pub fn png_media(width: u32, height: u32) -> MediaRef {
    MediaRef::from_bytes(&png_bytes(width, height), "image/png")
}

/// Bytes that no image decoder accepts.
pub fn garbage_media() -> MediaRef {
    MediaRef::from_bytes(b"definitely not an image", "image/jpeg")
}

/// A fake video payload of `len` bytes.
pub fn video_media(len: usize) -> MediaRef {
    MediaRef::from_bytes(&vec![0x1a; len], "video/webm")
}

pub fn user(role: Role, name: &str) -> User {
    User {
        id: UserId::new(),
        name: Some(name.to_string()),
        email: format!("{}@fieldops.test", name.to_lowercase().replace(' ', ".")),
        role,
        avatar_url: None,
        location: None,
    }
}

pub fn item_definition(id: &str, question: &str, question_type: QuestionType) -> ItemDefinition {
    ItemDefinition::new(
        ItemId::parse(id).expect("fixture item id"),
        question,
        question_type,
    )
}

/// One required yes/no item that needs a photo.
pub fn floor_template() -> ChecklistTemplate {
    let mut item = item_definition("q1", "Is the floor clean?", QuestionType::YesNo);
    item.required = true;
    item.min_photos = Some(1);
    ChecklistTemplate {
        id: TemplateId::new(),
        title: "Store Opening".to_string(),
        items: vec![item],
    }
}

/// A mixed template covering every question type the flow validates.
pub fn opening_template() -> ChecklistTemplate {
    let mut floor = item_definition("floor", "Is the floor clean?", QuestionType::YesNo);
    floor.required = true;
    floor.min_photos = Some(1);

    let mut fridge = item_definition("fridge", "Fridge temperature", QuestionType::Number);
    fridge.required = true;

    let mut remarks = item_definition("remarks", "Remarks", QuestionType::Text);
    remarks.require_note = true;

    let mut shelf = item_definition("shelf", "Shelf photo", QuestionType::Photo);
    shelf.required = true;

    ChecklistTemplate {
        id: TemplateId::new(),
        title: "Opening Checklist".to_string(),
        items: vec![floor, fridge, remarks, shelf],
    }
}
