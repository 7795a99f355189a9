//! Deterministic compositing of signature marks into PDF page content.
//!
//! Marks are drawn as new content streams appended to each target page, so
//! the original streams are untouched and the result is stable for a given
//! input set. Coordinates arrive already in page space (bottom-left anchor);
//! no flipping happens here.

use chrono::{DateTime, Local, Utc};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

use crate::error::SignError;
use crate::geometry::{NativeRect, PageGeometry};
use crate::records::SignatureRecord;

/// Resource name for the label font.
const FONT_KEY: &str = "FsD";
const LABEL_SIZE: f32 = 10.0;
const STAMP_SIZE: f32 = 8.0;
/// Accent border for the box fallback (#E33636), 2pt stroke.
const FALLBACK_BORDER: (f32, f32, f32) = (0.89, 0.21, 0.21);
const FALLBACK_BORDER_WIDTH: f32 = 2.0;

/// Result of a compositing pass: the modified document plus how many marks
/// were actually drawn (placements referencing missing pages are skipped).
#[derive(Debug)]
pub struct StampedDocument {
    pub bytes: Vec<u8>,
    pub stamped: usize,
}

/// Burn every signature into the document and re-serialize it.
///
/// A placement referencing a page outside the document is skipped with a
/// warning rather than aborting the batch; stale placements must not block
/// the remaining marks.
pub fn burn_marks(
    pdf_bytes: &[u8],
    signatures: &[SignatureRecord],
    signed_at: DateTime<Utc>,
) -> Result<StampedDocument, SignError> {
    let mut doc = Document::load_mem(pdf_bytes)
        .map_err(|e| SignError::FinalizeFailed(format!("failed to parse document: {e}")))?;
    let pages = doc.get_pages();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut stamped = 0;
    for sig in signatures {
        let Some(&page_id) = pages.get(&sig.page) else {
            tracing::warn!(
                signature = %sig.id,
                page = sig.page,
                "placement references a missing page, skipping"
            );
            continue;
        };
        stamp_signature(&mut doc, page_id, font_id, sig, signed_at)?;
        stamped += 1;
    }

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| SignError::FinalizeFailed(format!("failed to serialize document: {e}")))?;
    Ok(StampedDocument { bytes, stamped })
}

/// Number of pages in a PDF, for upload-time metadata.
pub fn page_count(bytes: &[u8]) -> Result<u32, SignError> {
    let doc = Document::load_mem(bytes)
        .map_err(|e| SignError::Validation(format!("not a valid PDF: {e}")))?;
    Ok(doc.get_pages().len() as u32)
}

/// Native size of every page, in document order. The rendering layer uses
/// these to build its coordinate transforms.
pub fn page_geometries(bytes: &[u8]) -> Result<Vec<PageGeometry>, SignError> {
    let doc = Document::load_mem(bytes)
        .map_err(|e| SignError::Validation(format!("not a valid PDF: {e}")))?;
    Ok(doc
        .get_pages()
        .values()
        .map(|&page_id| media_box(&doc, page_id))
        .collect())
}

/// Resolve a page's MediaBox, following the inheritable Parent chain.
/// Falls back to US letter when the document omits it.
fn media_box(doc: &Document, page_id: ObjectId) -> PageGeometry {
    let mut current = Some(page_id);
    let mut depth = 0;
    while let Some(id) = current {
        depth += 1;
        if depth > 32 {
            break;
        }
        let Ok(dict) = doc.get_object(id).and_then(|o| o.as_dict()) else {
            break;
        };
        if let Ok(Object::Array(values)) = dict.get(b"MediaBox") {
            let nums: Vec<f64> = values.iter().filter_map(as_f64).collect();
            if nums.len() == 4 {
                return PageGeometry {
                    width: nums[2] - nums[0],
                    height: nums[3] - nums[1],
                };
            }
        }
        current = match dict.get(b"Parent") {
            Ok(Object::Reference(parent)) => Some(*parent),
            _ => None,
        };
    }
    PageGeometry::letter()
}

fn as_f64(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

/// Draw one signature onto its page: the mark image (or the bordered box
/// fallback), the signer label, and the signing timestamp.
fn stamp_signature(
    doc: &mut Document,
    page_id: ObjectId,
    font_id: ObjectId,
    sig: &SignatureRecord,
    signed_at: DateTime<Utc>,
) -> Result<(), SignError> {
    // A decode failure downgrades to the box fallback; it never aborts the
    // finalize operation.
    let xobject = match sig.mark_image.as_deref() {
        Some(bytes) => match embed_mark_image(doc, bytes) {
            Ok(id) => Some((format!("Sig{}", id.0), id)),
            Err(err) => {
                tracing::warn!(signature = %sig.id, error = %err, "mark image rejected, using box fallback");
                None
            }
        },
        None => None,
    };

    ensure_stamp_resources(doc, page_id, font_id, xobject.clone())?;

    let NativeRect {
        x,
        y,
        width,
        height,
    } = sig.rect;
    let (x, y, w, h) = (x as f32, y as f32, width as f32, height as f32);

    let mut ops: Vec<Operation> = Vec::new();
    match &xobject {
        Some((name, _)) => {
            ops.push(Operation::new("q", vec![]));
            ops.push(Operation::new(
                "cm",
                vec![
                    w.into(),
                    0.0f32.into(),
                    0.0f32.into(),
                    h.into(),
                    x.into(),
                    y.into(),
                ],
            ));
            ops.push(Operation::new("Do", vec![name.as_str().into()]));
            ops.push(Operation::new("Q", vec![]));
        }
        None => {
            let (r, g, b) = FALLBACK_BORDER;
            ops.push(Operation::new("q", vec![]));
            ops.push(Operation::new("w", vec![FALLBACK_BORDER_WIDTH.into()]));
            ops.push(Operation::new("RG", vec![r.into(), g.into(), b.into()]));
            ops.push(Operation::new(
                "re",
                vec![x.into(), y.into(), w.into(), h.into()],
            ));
            ops.push(Operation::new("S", vec![]));
            ops.push(Operation::new("Q", vec![]));
        }
    }

    // Signer label in the rect's lower band, timestamp right below it.
    let label_y = y + h / 2.0;
    ops.extend(text_ops(
        LABEL_SIZE,
        (0.0, 0.0, 0.0),
        x + 5.0,
        label_y,
        sig.display_name(),
    ));
    let stamp = format!(
        "Signed: {}",
        signed_at.with_timezone(&Local).format("%Y-%m-%d %H:%M")
    );
    ops.extend(text_ops(
        STAMP_SIZE,
        (0.5, 0.5, 0.5),
        x + 5.0,
        label_y - 15.0,
        &stamp,
    ));

    append_page_content(doc, page_id, ops)
}

fn text_ops(size: f32, color: (f32, f32, f32), x: f32, y: f32, text: &str) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec![FONT_KEY.into(), size.into()]),
        Operation::new("rg", vec![color.0.into(), color.1.into(), color.2.into()]),
        Operation::new("Td", vec![x.into(), y.into()]),
        Operation::new("Tj", vec![Object::string_literal(text)]),
        Operation::new("ET", vec![]),
    ]
}

/// Decode a raster mark payload and register it as an image XObject.
fn embed_mark_image(doc: &mut Document, bytes: &[u8]) -> Result<ObjectId, SignError> {
    let decoded =
        image::load_from_memory(bytes).map_err(|e| SignError::ImageDecode(e.to_string()))?;
    let rgb = decoded.to_rgb8();
    let (width, height) = rgb.dimensions();
    let stream = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
        },
        rgb.into_raw(),
    );
    Ok(doc.add_object(stream))
}

fn pdf_err(e: lopdf::Error) -> SignError {
    SignError::FinalizeFailed(e.to_string())
}

fn page_dict(doc: &mut Document, page_id: ObjectId) -> Result<&mut Dictionary, SignError> {
    doc.get_object_mut(page_id)
        .and_then(|o| o.as_dict_mut())
        .map_err(pdf_err)
}

/// Make the label font (and the mark image, when present) reachable from the
/// page's resources.
fn ensure_stamp_resources(
    doc: &mut Document,
    page_id: ObjectId,
    font_id: ObjectId,
    xobject: Option<(String, ObjectId)>,
) -> Result<(), SignError> {
    let resources_id = resolve_resources(doc, page_id)?;
    set_resource_entry(doc, page_id, resources_id, b"Font", FONT_KEY, font_id)?;
    if let Some((name, id)) = xobject {
        set_resource_entry(doc, page_id, resources_id, b"XObject", &name, id)?;
    }
    Ok(())
}

/// Ensure the page has a resources dictionary and return its indirect id,
/// or None when it is inline in the page dictionary.
///
/// Resources is inheritable: a page-level dictionary shadows one on the
/// Pages tree, so a page without its own gets a copy of the inherited
/// dictionary, never an empty one that would break the existing content
/// stream's lookups.
fn resolve_resources(
    doc: &mut Document,
    page_id: ObjectId,
) -> Result<Option<ObjectId>, SignError> {
    let missing = !matches!(
        page_dict(doc, page_id)?.get(b"Resources"),
        Ok(Object::Reference(_)) | Ok(Object::Dictionary(_))
    );
    if missing {
        let inherited = inherited_resources(doc, page_id).unwrap_or_else(Dictionary::new);
        page_dict(doc, page_id)?.set("Resources", inherited);
    }
    let page = page_dict(doc, page_id)?;
    match page.get(b"Resources") {
        Ok(Object::Reference(id)) => Ok(Some(*id)),
        _ => Ok(None),
    }
}

/// Copy of the Resources dictionary a page inherits through its Parent
/// chain, resolving an indirect dictionary along the way.
fn inherited_resources(doc: &Document, page_id: ObjectId) -> Option<Dictionary> {
    let mut current = Some(page_id);
    let mut depth = 0;
    while let Some(id) = current {
        depth += 1;
        if depth > 32 {
            return None;
        }
        let dict = doc.get_object(id).and_then(|o| o.as_dict()).ok()?;
        match dict.get(b"Resources") {
            Ok(Object::Dictionary(resources)) => return Some(resources.clone()),
            Ok(Object::Reference(resources_id)) => {
                return doc
                    .get_object(*resources_id)
                    .and_then(|o| o.as_dict())
                    .ok()
                    .cloned();
            }
            _ => {}
        }
        current = match dict.get(b"Parent") {
            Ok(Object::Reference(parent)) => Some(*parent),
            _ => None,
        };
    }
    None
}

fn resources_dict_mut<'a>(
    doc: &'a mut Document,
    page_id: ObjectId,
    resources_id: Option<ObjectId>,
) -> Result<&'a mut Dictionary, SignError> {
    match resources_id {
        Some(id) => doc
            .get_object_mut(id)
            .and_then(|o| o.as_dict_mut())
            .map_err(pdf_err),
        None => page_dict(doc, page_id)?
            .get_mut(b"Resources")
            .and_then(|o| o.as_dict_mut())
            .map_err(pdf_err),
    }
}

/// Insert `name -> target` into a resource category (`Font`, `XObject`),
/// resolving an indirect category dictionary when the document uses one.
fn set_resource_entry(
    doc: &mut Document,
    page_id: ObjectId,
    resources_id: Option<ObjectId>,
    category: &[u8],
    name: &str,
    target: ObjectId,
) -> Result<(), SignError> {
    let category_ref = {
        let resources = resources_dict_mut(doc, page_id, resources_id)?;
        match resources.get(category) {
            Ok(Object::Reference(id)) => Some(*id),
            _ => None,
        }
    };

    if let Some(id) = category_ref {
        let dict = doc
            .get_object_mut(id)
            .and_then(|o| o.as_dict_mut())
            .map_err(pdf_err)?;
        dict.set(name, Object::Reference(target));
        return Ok(());
    }

    let resources = resources_dict_mut(doc, page_id, resources_id)?;
    let has_dict = matches!(resources.get(category), Ok(Object::Dictionary(_)));
    if !has_dict {
        resources.set(category, Dictionary::new());
    }
    if let Ok(Object::Dictionary(dict)) = resources.get_mut(category) {
        dict.set(name, Object::Reference(target));
    }
    Ok(())
}

/// Append `operations` as a fresh content stream referenced from the page's
/// Contents, which may be a single reference, an array, an inline stream, or
/// missing entirely.
fn append_page_content(
    doc: &mut Document,
    page_id: ObjectId,
    operations: Vec<Operation>,
) -> Result<(), SignError> {
    let encoded = Content { operations }
        .encode()
        .map_err(|e| SignError::FinalizeFailed(format!("failed to encode content: {e}")))?;
    let new_id = doc.add_object(Stream::new(dictionary! {}, encoded));

    // Hoist an inline stream into an indirect object first so the Contents
    // entry can become an array of references.
    let inline = matches!(
        page_dict(doc, page_id)?.get(b"Contents"),
        Ok(Object::Stream(_))
    );
    if inline {
        if let Some(stream) = page_dict(doc, page_id)?.remove(b"Contents") {
            let hoisted = doc.add_object(stream);
            page_dict(doc, page_id)?.set("Contents", Object::Reference(hoisted));
        }
    }

    enum Existing {
        Array,
        Single(ObjectId),
        Missing,
    }
    let existing = {
        let page = page_dict(doc, page_id)?;
        match page.get(b"Contents") {
            Ok(Object::Array(_)) => Existing::Array,
            Ok(Object::Reference(id)) => Existing::Single(*id),
            _ => Existing::Missing,
        }
    };

    let page = page_dict(doc, page_id)?;
    match existing {
        Existing::Array => {
            if let Ok(Object::Array(array)) = page.get_mut(b"Contents") {
                array.push(Object::Reference(new_id));
            }
        }
        Existing::Single(old) => {
            page.set(
                "Contents",
                Object::Array(vec![Object::Reference(old), Object::Reference(new_id)]),
            );
        }
        Existing::Missing => {
            page.set("Contents", Object::Reference(new_id));
        }
    }
    Ok(())
}

/// Minimal multi-page PDF for tests, shared with the service tests.
#[cfg(test)]
pub(crate) fn test_pdf(page_count: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let mut page_ids = Vec::new();
    for _ in 0..page_count {
        page_ids.push(doc.add_object(dictionary! {
            "Type" => "Page",
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }));
    }
    let kids: Vec<Object> = page_ids.iter().map(|id| Object::Reference(*id)).collect();
    let pages_id = doc.add_object(dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => page_count as i64,
    });
    for id in &page_ids {
        if let Ok(page) = doc.get_object_mut(*id) {
            if let Ok(dict) = page.as_dict_mut() {
                dict.set("Parent", Object::Reference(pages_id));
            }
        }
    }
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}
